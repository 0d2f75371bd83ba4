//! Instance validation
//!
//! [`Validation`] is a restartable view over one instance: every call to
//! [`Validation::iter`] walks the whole tree again and yields errors lazily,
//! depth-first, keys in declaration order, so the first error is stable across
//! runs. Nothing is cached between walks and the instance is never modified.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::loader::Schema;
use crate::path::DataPath;
use crate::schema::{
    BoolSchema, DictSchema, IntSchema, ListSchema, NodeKind, SchemaNode, StrSchema, ValueKind,
};

/// Category of a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    TypeMismatch,
    MissingRequired,
    OutOfRange,
    PatternMismatch,
    NotInValidValues,
    UnknownKey,
    /// Two elements of a keyed list share a primary key value
    DuplicateKey,
    /// The schema could not be applied (e.g. nesting limit reached)
    SchemaError,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TypeMismatch => "type mismatch",
            Self::MissingRequired => "missing required",
            Self::OutOfRange => "out of range",
            Self::PatternMismatch => "pattern mismatch",
            Self::NotInValidValues => "not in valid values",
            Self::UnknownKey => "unknown key",
            Self::DuplicateKey => "duplicate key",
            Self::SchemaError => "schema error",
        };
        write!(f, "{}", name)
    }
}

/// One problem found in an instance
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("'{path}': {message}")]
pub struct ValidationError {
    pub path: DataPath,
    pub kind: ValidationErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offending_value: Option<Value>,
}

impl ValidationError {
    fn new(
        path: DataPath,
        kind: ValidationErrorKind,
        message: impl Into<String>,
        offending_value: Option<&Value>,
    ) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
            offending_value: offending_value.cloned(),
        }
    }
}

/// Validate `instance` against the root of `schema`
pub fn validate<'a>(schema: &'a Schema, instance: &'a Value) -> Validation<'a> {
    Validation::new(schema, instance)
}

/// A finite, restartable sequence of validation errors
#[derive(Debug, Clone, Copy)]
pub struct Validation<'a> {
    schema: &'a Schema,
    node: &'a SchemaNode,
    instance: &'a Value,
}

impl<'a> Validation<'a> {
    pub fn new(schema: &'a Schema, instance: &'a Value) -> Self {
        Self {
            schema,
            node: schema.root(),
            instance,
        }
    }

    /// Validate against a node of `schema` other than the root
    pub fn at(schema: &'a Schema, node: &'a SchemaNode, instance: &'a Value) -> Self {
        Self {
            schema,
            node,
            instance,
        }
    }

    /// Start a fresh walk
    pub fn iter(&self) -> ValidationIter<'a> {
        ValidationIter {
            schema: self.schema,
            stack: vec![Work::Visit(Visit {
                node: self.node,
                value: self.instance,
                path: DataPath::root(),
                depth: 0,
                implicit_required: None,
            })],
        }
    }

    pub fn errors(&self) -> Vec<ValidationError> {
        self.iter().collect()
    }

    pub fn is_valid(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<'a> IntoIterator for &Validation<'a> {
    type Item = ValidationError;
    type IntoIter = ValidationIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for Validation<'a> {
    type Item = ValidationError;
    type IntoIter = ValidationIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

struct Visit<'a> {
    node: &'a SchemaNode,
    value: &'a Value,
    path: DataPath,
    depth: usize,
    /// Primary key of the enclosing list, required on every element
    implicit_required: Option<&'a str>,
}

enum Work<'a> {
    Visit(Visit<'a>),
    Emit(ValidationError),
}

/// Iterator produced by [`Validation::iter`]
pub struct ValidationIter<'a> {
    schema: &'a Schema,
    stack: Vec<Work<'a>>,
}

impl<'a> Iterator for ValidationIter<'a> {
    type Item = ValidationError;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.pop()? {
                Work::Emit(error) => return Some(error),
                Work::Visit(visit) => {
                    let work = self.visit(visit);
                    self.stack.extend(work.into_iter().rev());
                }
            }
        }
    }
}

impl<'a> ValidationIter<'a> {
    /// Expand one node into its own errors and child visits, in document order
    fn visit(&self, visit: Visit<'a>) -> Vec<Work<'a>> {
        let Visit {
            node,
            value,
            path,
            depth,
            implicit_required,
        } = visit;
        let mut work = Vec::new();

        if value.is_null() {
            return work;
        }

        let limit = self.schema.max_depth();
        if depth > limit {
            work.push(Work::Emit(ValidationError::new(
                path,
                ValidationErrorKind::SchemaError,
                format!("Maximum nesting depth {} exceeded", limit),
                None,
            )));
            return work;
        }

        if !node.kind().matches(value) {
            work.push(Work::Emit(ValidationError::new(
                path,
                ValidationErrorKind::TypeMismatch,
                format!(
                    "Invalid type '{}'. Expected a '{}'",
                    ValueKind::of(value),
                    node.kind()
                ),
                Some(value),
            )));
            return work;
        }

        match (&node.kind, value) {
            (NodeKind::Str(schema), Value::String(s)) => {
                self.check_str(schema, s, value, &path, &mut work)
            }
            (NodeKind::Int(schema), _) => match value.as_i64() {
                Some(i) => check_int(schema, i, value, &path, &mut work),
                None => work.push(emit(
                    &path,
                    ValidationErrorKind::OutOfRange,
                    format!("{} is higher than the largest supported integer {}", value, i64::MAX),
                    value,
                )),
            },
            (NodeKind::Bool(schema), Value::Bool(b)) => {
                check_bool(schema, *b, value, &path, &mut work)
            }
            (NodeKind::Dict(schema), Value::Object(map)) => {
                visit_dict(schema, map, &path, depth, implicit_required, &mut work)
            }
            (NodeKind::List(schema), Value::Array(items)) => {
                visit_list(schema, items, &path, depth, &mut work)
            }
            _ => {}
        }
        work
    }

    fn check_str(
        &self,
        schema: &StrSchema,
        s: &str,
        value: &Value,
        path: &DataPath,
        work: &mut Vec<Work<'a>>,
    ) {
        let length = s.chars().count() as u64;
        if let Some(min) = schema.min_length {
            if length < min {
                work.push(emit(
                    path,
                    ValidationErrorKind::OutOfRange,
                    format!("The value '{}' is shorter than min_length {}", s, min),
                    value,
                ));
            }
        }
        if let Some(max) = schema.max_length {
            if length > max {
                work.push(emit(
                    path,
                    ValidationErrorKind::OutOfRange,
                    format!("The value '{}' is longer than max_length {}", s, max),
                    value,
                ));
            }
        }
        if let (Some(pattern), Some(source)) = (&schema.pattern, schema.pattern_source()) {
            match self.schema.pattern(&source) {
                Some(regex) if !regex.is_match(s) => work.push(emit(
                    path,
                    ValidationErrorKind::PatternMismatch,
                    format!("The value '{}' does not match the pattern '{}'", s, pattern),
                    value,
                )),
                Some(_) => {}
                None => work.push(emit(
                    path,
                    ValidationErrorKind::SchemaError,
                    format!("The pattern '{}' was not compiled for this schema", pattern),
                    value,
                )),
            }
        }
        if let Some(format) = &schema.format {
            match self.schema.formats().check(format, s) {
                Some(true) => {}
                Some(false) => work.push(emit(
                    path,
                    ValidationErrorKind::PatternMismatch,
                    format!("The value '{}' is not a valid {}", s, format),
                    value,
                )),
                None => work.push(emit(
                    path,
                    ValidationErrorKind::SchemaError,
                    format!("Unknown format '{}'", format),
                    value,
                )),
            }
        }
        if let Some(valid_values) = &schema.valid_values {
            if !schema.is_valid_value(s) {
                work.push(emit(
                    path,
                    ValidationErrorKind::NotInValidValues,
                    format!("'{}' is not one of {:?}", s, valid_values),
                    value,
                ));
            }
        }
    }
}

fn emit<'a>(
    path: &DataPath,
    kind: ValidationErrorKind,
    message: String,
    value: &Value,
) -> Work<'a> {
    Work::Emit(ValidationError::new(path.clone(), kind, message, Some(value)))
}

fn check_int(schema: &IntSchema, i: i64, value: &Value, path: &DataPath, work: &mut Vec<Work<'_>>) {
    if let Some(min) = schema.min {
        if i < min {
            work.push(emit(
                path,
                ValidationErrorKind::OutOfRange,
                format!("{} is lower than the allowed minimum {}", i, min),
                value,
            ));
        }
    }
    if let Some(max) = schema.max {
        if i > max {
            work.push(emit(
                path,
                ValidationErrorKind::OutOfRange,
                format!("{} is higher than the allowed maximum {}", i, max),
                value,
            ));
        }
    }
    if let Some(valid_values) = &schema.valid_values {
        if !valid_values.contains(&i) {
            work.push(emit(
                path,
                ValidationErrorKind::NotInValidValues,
                format!("{} is not one of {:?}", i, valid_values),
                value,
            ));
        }
    }
}

fn check_bool(schema: &BoolSchema, b: bool, value: &Value, path: &DataPath, work: &mut Vec<Work<'_>>) {
    if let Some(valid_values) = &schema.valid_values {
        if !valid_values.contains(&b) {
            work.push(emit(
                path,
                ValidationErrorKind::NotInValidValues,
                format!("{} is not one of {:?}", b, valid_values),
                value,
            ));
        }
    }
}

fn visit_dict<'a>(
    schema: &'a DictSchema,
    map: &'a Map<String, Value>,
    path: &DataPath,
    depth: usize,
    implicit_required: Option<&'a str>,
    work: &mut Vec<Work<'a>>,
) {
    if let Some(keys) = &schema.keys {
        for (key, child) in keys {
            match map.get(key) {
                Some(value) if !value.is_null() => work.push(Work::Visit(Visit {
                    node: child,
                    value,
                    path: path.join(key.as_str()),
                    depth: depth + 1,
                    implicit_required: None,
                })),
                _ => {
                    if child.is_required() || implicit_required == Some(key.as_str()) {
                        work.push(Work::Emit(ValidationError::new(
                            path.join(key.as_str()),
                            ValidationErrorKind::MissingRequired,
                            format!("Required key '{}' is not set", key),
                            None,
                        )));
                    }
                }
            }
        }
    }

    for (key, value) in map {
        if schema.static_key(key).is_some() {
            continue;
        }
        if let Some(dynamic) = schema.dynamic_keys.as_deref() {
            work.push(Work::Visit(Visit {
                node: dynamic,
                value,
                path: path.join(key.as_str()),
                depth: depth + 1,
                implicit_required: None,
            }));
        } else if !schema.allows_other_keys() {
            let message = match suggest_key(schema, key) {
                Some(suggestion) => {
                    format!("Unknown key '{}'. Did you mean '{}'?", key, suggestion)
                }
                None => format!("Unknown key '{}'", key),
            };
            work.push(Work::Emit(ValidationError::new(
                path.join(key.as_str()),
                ValidationErrorKind::UnknownKey,
                message,
                Some(value),
            )));
        }
    }
}

fn visit_list<'a>(
    schema: &'a ListSchema,
    items: &'a [Value],
    path: &DataPath,
    depth: usize,
    work: &mut Vec<Work<'a>>,
) {
    let count = items.len() as u64;
    if let Some(min) = schema.min_length {
        if count < min {
            work.push(Work::Emit(ValidationError::new(
                path.clone(),
                ValidationErrorKind::OutOfRange,
                format!("The list has {} items, fewer than min_length {}", count, min),
                None,
            )));
        }
    }
    if let Some(max) = schema.max_length {
        if count > max {
            work.push(Work::Emit(ValidationError::new(
                path.clone(),
                ValidationErrorKind::OutOfRange,
                format!("The list has {} items, more than max_length {}", count, max),
                None,
            )));
        }
    }

    let primary_key = schema.primary_key.as_deref();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (index, item) in items.iter().enumerate() {
        let item_path = path.join(index);

        if let Some(item_schema) = schema.items.as_deref() {
            if item.is_null() {
                work.push(Work::Emit(ValidationError::new(
                    item_path.clone(),
                    ValidationErrorKind::TypeMismatch,
                    format!("Invalid type 'null'. Expected a '{}'", item_schema.kind()),
                    Some(item),
                )));
            } else {
                work.push(Work::Visit(Visit {
                    node: item_schema,
                    value: item,
                    path: item_path.clone(),
                    depth: depth + 1,
                    implicit_required: primary_key,
                }));
            }
        }

        let Some(key) = primary_key else { continue };
        let Some(key_value) = item.get(key).filter(|v| !v.is_null()) else {
            continue;
        };
        let canonical = key_value.to_string();
        match seen.get(&canonical) {
            Some(first) => work.push(Work::Emit(ValidationError::new(
                item_path.join(key),
                ValidationErrorKind::DuplicateKey,
                format!(
                    "The value {} of primary key '{}' is already used at index {}",
                    canonical, key, first
                ),
                Some(key_value),
            ))),
            None => {
                seen.insert(canonical, index);
            }
        }
    }
}

/// Closest declared key for an unknown key, if any is a fuzzy match
fn suggest_key<'s>(schema: &'s DictSchema, unknown: &str) -> Option<&'s str> {
    let keys = schema.keys.as_ref()?;
    let matcher = SkimMatcherV2::default();
    keys.keys()
        .filter_map(|candidate| {
            matcher
                .fuzzy_match(candidate, unknown)
                .or_else(|| matcher.fuzzy_match(unknown, candidate))
                .map(|score| (score, candidate.as_str()))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_schema;
    use crate::path::PathSegment;
    use serde_json::json;

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
                            "id": {"type": "int", "required": true, "min": 1, "max": 4094},
                            "name": {"type": "str", "max_length": 8},
                            "mode": {"type": "str", "valid_values": ["access", "trunk"]},
                            "gateway": {"type": "str", "format": "ipv4"}
                        }
                    }
                },
                "hostname": {"type": "str", "pattern": "^[a-z][a-z0-9-]*$"},
                "enabled": {"type": "bool", "valid_values": [true]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_instance() {
        let schema = vlan_schema();
        let instance = json!({
            "hostname": "leaf1",
            "vlans": [{"id": 10, "name": "A", "mode": "trunk", "gateway": "10.0.0.1"}]
        });
        assert!(validate(&schema, &instance).is_valid());
    }

    #[test]
    fn test_missing_required() {
        let schema = vlan_schema();
        let instance = json!({"vlans": [{"name": "A"}]});
        let errors = validate(&schema, &instance).errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::MissingRequired);
        assert_eq!(
            errors[0].path.segments(),
            &[PathSegment::from("vlans"), 0.into(), "id".into()]
        );
    }

    #[test]
    fn test_type_mismatch_stops_descent() {
        let schema = vlan_schema();
        let instance = json!({"vlans": {"id": "nope"}});
        let errors = validate(&schema, &instance).errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::TypeMismatch);
        assert_eq!(errors[0].path.to_string(), "vlans");
    }

    #[test]
    fn test_scalar_constraints() {
        let schema = vlan_schema();
        let instance = json!({
            "hostname": "Leaf_1",
            "enabled": false,
            "vlans": [{"id": 5000, "name": "much-too-long", "mode": "hybrid", "gateway": "10.0.0"}]
        });
        let kinds: Vec<_> = validate(&schema, &instance).iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ValidationErrorKind::OutOfRange,
                ValidationErrorKind::OutOfRange,
                ValidationErrorKind::NotInValidValues,
                ValidationErrorKind::PatternMismatch,
                ValidationErrorKind::PatternMismatch,
                ValidationErrorKind::NotInValidValues,
            ]
        );
    }

    #[test]
    fn test_integer_beyond_i64_is_out_of_range() {
        let schema = vlan_schema();
        let instance = json!({"vlans": [{"id": u64::MAX}]});
        let errors = validate(&schema, &instance).errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::OutOfRange);
        assert_eq!(errors[0].path.to_string(), "vlans[0].id");
    }

    #[test]
    fn test_duplicate_primary_key() {
        let schema = vlan_schema();
        let instance = json!({"vlans": [{"id": 10}, {"id": 20}, {"id": 10}]});
        let errors = validate(&schema, &instance).errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::DuplicateKey);
        assert_eq!(errors[0].path.to_string(), "vlans[2].id");
    }

    #[test]
    fn test_unknown_key_with_suggestion() {
        let schema = vlan_schema();
        let instance = json!({"vlan": []});
        let errors = validate(&schema, &instance).errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::UnknownKey);
        assert!(errors[0].message.contains("Did you mean 'vlans'"));
    }

    #[test]
    fn test_dynamic_and_other_keys() {
        let schema = load_schema(&json!({
            "type": "dict",
            "keys": {
                "static": {"type": "str"},
                "open": {"type": "dict", "allow_other_keys": true}
            },
            "dynamic_keys": {"type": "int"}
        }))
        .unwrap();
        let instance = json!({"static": "x", "open": {"anything": [1]}, "extra": "nope"});
        let errors = validate(&schema, &instance).errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path.to_string(), "extra");
        assert_eq!(errors[0].kind, ValidationErrorKind::TypeMismatch);
    }

    #[test]
    fn test_restartable() {
        let schema = vlan_schema();
        let instance = json!({"hostname": 1, "vlans": [{"name": 2}, {"id": 1}, {"id": 1}]});
        let validation = validate(&schema, &instance);
        let first: Vec<_> = validation.iter().collect();
        let second: Vec<_> = (&validation).into_iter().collect();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_null_is_unset() {
        let schema = vlan_schema();
        let instance = json!({"hostname": null, "vlans": [{"id": 1, "name": null}]});
        assert!(validate(&schema, &instance).is_valid());
    }
}
