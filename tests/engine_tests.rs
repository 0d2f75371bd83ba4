//! End-to-end tests for the schema engine
//!
//! Loads the fixture store and device schema, then runs conversion,
//! validation, merge and export against the fixture data files.

use std::path::PathBuf;

use fabric_schema::export::{compile_json_schema, to_json_schema};
use fabric_schema::store::read_document;
use fabric_schema::{
    convert_and_validate, extend_schema, load_schema, merge, subschema, Kind, ListMergeStrategy,
    Mode, Schema, SchemaError, SchemaLoader, SchemaStore, SchemaTools, ValidationErrorKind,
};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use serde_json::{json, Value};

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn data(name: &str) -> Value {
    read_document(&fixtures_path().join("data").join(name)).unwrap()
}

#[fixture]
fn device_schema() -> Schema {
    let store = SchemaStore::load_dir(&fixtures_path().join("schemas")).unwrap();
    SchemaLoader::new()
        .with_store(store)
        .load_file(&fixtures_path().join("device.schema.yml"))
        .unwrap()
}

fn vlan_schema() -> Schema {
    load_schema(&json!({
        "type": "dict",
        "keys": {
            "vlans": {
                "type": "list",
                "primary_key": "id",
                "items": {
                    "type": "dict",
                    "keys": {
                        "id": {"type": "integer", "required": true},
                        "name": {"type": "string"}
                    }
                }
            }
        }
    }))
    .unwrap()
}

// =============================================================================
// Loading
// =============================================================================

#[rstest]
fn test_fixture_schema_resolves(device_schema: Schema) {
    assert!(device_schema.source().has_references());
    assert!(!device_schema.root().has_references());

    let id = subschema(&device_schema, &["vlans", "0", "id"]).unwrap();
    assert_eq!(
        id.to_value().unwrap(),
        json!({"type": "int", "required": true, "min": 1, "max": 4094})
    );

    let mtu = device_schema.subschema(&["mtu"]).unwrap();
    assert_eq!(mtu.meta.default, Some(json!(1500)));
    assert_eq!(mtu.meta.description.as_deref(), Some("Default interface MTU"));
}

#[rstest]
#[case::missing_type(json!({"keys": {}}))]
#[case::unknown_kind(json!({"type": "float"}))]
#[case::field_of_other_kind(json!({"type": "str", "min": 1}))]
#[case::bad_child(json!({"type": "dict", "keys": {"a": {"type": "int", "valid_values": ["x"]}}}))]
#[case::unknown_format(json!({"type": "str", "format": "hostname"}))]
#[case::bad_pattern(json!({"type": "str", "pattern": "[a-"}))]
#[case::undeclared_primary_key(json!({"type": "list", "primary_key": "id", "items": {"type": "dict"}}))]
#[case::missing_store_entry(json!({"type": "dict", "$ref": "nowhere#/keys/x"}))]
fn test_invalid_schemas_are_rejected(#[case] document: Value) {
    assert!(load_schema(&document).is_err());
}

#[test]
fn test_reference_kind_conflict() {
    let store = SchemaStore::new()
        .with_document("base", json!({"type": "dict", "keys": {"vlan": {"type": "dict"}}}))
        .unwrap();
    let err = SchemaLoader::new()
        .with_store(store)
        .load(&json!({"type": "dict", "keys": {"v": {"type": "list", "$ref": "base#/keys/vlan"}}}))
        .unwrap_err();
    assert!(matches!(
        err,
        SchemaError::TypeConflict { base: Kind::Dict, overlay: Kind::List, .. }
    ));
}

#[test]
fn test_reference_cycle_across_entries() {
    let store = SchemaStore::new()
        .with_document("a", json!({"type": "dict", "keys": {"x": {"type": "dict", "$ref": "b#/keys/y"}}}))
        .unwrap()
        .with_document("b", json!({"type": "dict", "keys": {"y": {"type": "dict", "$ref": "a#/keys/x"}}}))
        .unwrap();
    let err = SchemaLoader::new()
        .with_store(store)
        .load(&json!({"type": "dict", "$ref": "a#/keys/x"}))
        .unwrap_err();
    match err {
        SchemaError::CyclicReference { chain } => {
            assert_eq!(chain, vec!["a#/keys/x", "b#/keys/y", "a#/keys/x"]);
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
}

#[rstest]
fn test_extend_schema_revalidates(device_schema: Schema) {
    let extended = extend_schema(
        &device_schema,
        &json!({"type": "dict", "keys": {"platform": {"type": "str", "convert_to_lower_case": true}}}),
    )
    .unwrap();
    assert_eq!(extended.subschema(&["platform"]).unwrap().kind(), Kind::Str);

    let err = extend_schema(&device_schema, &json!({"type": "dict", "keys": {"x": {"type": "str", "max": 3}}}));
    assert!(err.is_err());
}

// =============================================================================
// Conversion and validation
// =============================================================================

#[test]
fn test_converted_vlan_is_valid() {
    let schema = vlan_schema();
    let mut instance = json!({"vlans": [{"id": "10", "name": "A"}]});
    let (notes, errors) = convert_and_validate(&schema, &mut instance);
    assert_eq!(notes.len(), 1);
    assert!(errors.is_empty());
}

#[test]
fn test_missing_required_vlan_id() {
    let schema = vlan_schema();
    let errors = schema.validate(&json!({"vlans": [{"name": "A"}]})).errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ValidationErrorKind::MissingRequired);
    assert_eq!(serde_json::to_value(&errors[0].path).unwrap(), json!(["vlans", 0, "id"]));
}

#[rstest]
fn test_valid_device_after_conversion(device_schema: Schema) {
    let mut instance = data("leaf1.yml");
    let (notes, errors) = convert_and_validate(&device_schema, &mut instance);

    let paths: Vec<_> = notes.iter().map(|n| n.path.to_string()).collect();
    assert_eq!(paths, vec!["mtu", "vlans[0].id"]);
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(instance["mtu"], json!(9000));
}

#[rstest]
fn test_invalid_device_reports_everything(device_schema: Schema) {
    let instance = data("invalid.yml");
    let errors = device_schema.validate(&instance).errors();

    let found: Vec<_> = errors.iter().map(|e| (e.path.to_string(), e.kind)).collect();
    assert_eq!(
        found,
        vec![
            ("hostname".to_string(), ValidationErrorKind::PatternMismatch),
            ("mgmt_ip".to_string(), ValidationErrorKind::PatternMismatch),
            ("mtu".to_string(), ValidationErrorKind::OutOfRange),
            ("vlans[0].id".to_string(), ValidationErrorKind::MissingRequired),
            ("vlans[1].id".to_string(), ValidationErrorKind::OutOfRange),
            ("vlan".to_string(), ValidationErrorKind::UnknownKey),
        ]
    );
    assert!(errors[5].message.contains("Did you mean 'vlans'"));

    // A second walk yields the same sequence
    assert_eq!(device_schema.validate(&instance).errors(), errors);
}

#[rstest]
fn test_schema_tools_error_mode(device_schema: Schema) {
    let tools = SchemaTools::new(std::sync::Arc::new(device_schema), "leaf9").with_validation_mode(Mode::Error);

    let mut bad = data("invalid.yml");
    assert!(tools.convert_and_validate(&mut bad).failed);

    let mut good = data("leaf1.yml");
    let report = tools.convert_and_validate(&mut good);
    assert!(!report.failed);
    assert_eq!(report.conversions.len(), 2);
}

// =============================================================================
// Merge
// =============================================================================

#[test]
fn test_keyed_merge_example() {
    let schema = vlan_schema();
    let merged = merge(
        &schema,
        json!({"vlans": [{"id": 10, "name": "A"}]}),
        json!({"vlans": [{"id": 10, "name": "B"}, {"id": 20, "name": "C"}]}),
        ListMergeStrategy::Append,
    )
    .unwrap();
    assert_eq!(merged, json!({"vlans": [{"id": 10, "name": "B"}, {"id": 20, "name": "C"}]}));
}

#[rstest]
fn test_merge_fixture_documents(device_schema: Schema) {
    let mut base = data("leaf1.yml");
    device_schema.convert(&mut base);

    let merged = merge(&device_schema, base, data("leaf1_overlay.yml"), ListMergeStrategy::Append).unwrap();
    assert_eq!(
        merged,
        json!({
            "hostname": "leaf1",
            "mgmt_ip": "192.168.0.11/24",
            "mtu": 9000,
            "vlans": [
                {"id": 10, "name": "SERVERS"},
                {"id": 20, "name": "STORAGE", "trunk_groups": ["mlag", "uplink"]},
                {"id": 30, "name": "BACKUP"}
            ],
            "tags": {"rack": "r1", "pod": "p1"}
        })
    );
    assert!(device_schema.validate(&merged).is_valid());
}

#[rstest]
#[case(ListMergeStrategy::Append, json!(["mlag", "uplink"]))]
#[case(ListMergeStrategy::Prepend, json!(["uplink", "mlag"]))]
#[case(ListMergeStrategy::Replace, json!(["uplink"]))]
#[case(ListMergeStrategy::Keep, json!(["mlag"]))]
fn test_unkeyed_strategy_inside_keyed_list(
    device_schema: Schema,
    #[case] strategy: ListMergeStrategy,
    #[case] expected: Value,
) {
    let merged = merge(&device_schema, data("leaf1.yml"), data("leaf1_overlay.yml"), strategy).unwrap();
    assert_eq!(merged["vlans"][1]["trunk_groups"], expected);
}

#[rstest]
fn test_keyed_merge_is_idempotent(device_schema: Schema) {
    let mut doc = data("leaf1.yml");
    device_schema.convert(&mut doc);
    for strategy in [ListMergeStrategy::Replace, ListMergeStrategy::Keep] {
        let merged = merge(&device_schema, doc.clone(), doc.clone(), strategy).unwrap();
        assert_eq!(merged, doc);
    }
}

#[rstest]
#[case::append(ListMergeStrategy::Append)]
#[case::prepend(ListMergeStrategy::Prepend)]
#[case::replace(ListMergeStrategy::Replace)]
#[case::keep(ListMergeStrategy::Keep)]
fn test_keyed_only_document_merges_onto_itself(#[case] strategy: ListMergeStrategy) {
    let schema = vlan_schema();
    let doc = json!({"vlans": [{"id": 1, "name": "a"}, {"id": 2}]});
    let merged = merge(&schema, doc.clone(), doc.clone(), strategy).unwrap();
    assert_eq!(merged, doc);
}

#[test]
fn test_merge_rejects_dict_against_list() {
    let schema = vlan_schema();
    let err = merge(&schema, json!({"vlans": []}), json!({"vlans": {}}), ListMergeStrategy::Append);
    assert!(err.is_err());
}

// =============================================================================
// Export
// =============================================================================

#[rstest]
fn test_json_schema_export_agrees_with_validator(device_schema: Schema) {
    let compiled = compile_json_schema(&to_json_schema(device_schema.root())).unwrap();

    let mut good = data("leaf1.yml");
    device_schema.convert(&mut good);
    assert!(compiled.is_valid(&good));
    assert!(!compiled.is_valid(&data("invalid.yml")));
}
