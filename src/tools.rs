//! Conversion and validation for a host document, reported through tracing
//!
//! Callers that process many documents (one per device, say) wrap a shared
//! [`Schema`] in [`SchemaTools`] and pick how loudly each kind of finding is
//! reported. In [`Mode::Error`] a finding also fails the run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::converter::ConversionNote;
use crate::loader::Schema;
use crate::validator::ValidationError;

/// Reporting level for conversion notes or validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Skip the pass entirely
    Disabled,
    Error,
    Warning,
    Info,
    Debug,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Disabled, Mode::Error, Mode::Warning, Mode::Info, Mode::Debug];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self != Self::Disabled
    }

    fn report(&self, host: &str, message: &str) {
        match self {
            Self::Disabled => {}
            Self::Error => error!(host, "{}", message),
            Self::Warning => warn!(host, "{}", message),
            Self::Info => info!(host, "{}", message),
            Self::Debug => debug!(host, "{}", message),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown mode '{}', expected one of disabled, error, warning, info, debug", s))
    }
}

/// Findings for one host document
#[derive(Debug, Default, Serialize)]
pub struct ToolReport {
    pub host: String,
    pub conversions: Vec<ConversionNote>,
    pub errors: Vec<ValidationError>,
    /// A finding was reported in [`Mode::Error`]
    pub failed: bool,
}

impl ToolReport {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn absorb(&mut self, other: ToolReport) {
        self.conversions.extend(other.conversions);
        self.errors.extend(other.errors);
        self.failed |= other.failed;
    }
}

/// A shared schema plus the reporting modes for one host
#[derive(Debug, Clone)]
pub struct SchemaTools {
    schema: Arc<Schema>,
    host: String,
    conversion_mode: Mode,
    validation_mode: Mode,
}

impl SchemaTools {
    pub fn new(schema: Arc<Schema>, host: impl Into<String>) -> Self {
        Self {
            schema,
            host: host.into(),
            conversion_mode: Mode::Debug,
            validation_mode: Mode::Warning,
        }
    }

    pub fn with_conversion_mode(mut self, mode: Mode) -> Self {
        self.conversion_mode = mode;
        self
    }

    pub fn with_validation_mode(mut self, mode: Mode) -> Self {
        self.validation_mode = mode;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn conversion_mode(&self) -> Mode {
        self.conversion_mode
    }

    pub fn validation_mode(&self) -> Mode {
        self.validation_mode
    }

    pub fn convert_data(&self, data: &mut Value) -> ToolReport {
        let mut report = ToolReport::new(&self.host);
        if !self.conversion_mode.is_enabled() {
            return report;
        }

        report.conversions = self.schema.convert(data);
        for note in &report.conversions {
            self.conversion_mode.report(&self.host, &note.to_string());
        }
        report.failed = self.conversion_mode == Mode::Error
            && report.conversions.iter().any(ConversionNote::is_failure);
        report
    }

    pub fn validate_data(&self, data: &Value) -> ToolReport {
        let mut report = ToolReport::new(&self.host);
        if !self.validation_mode.is_enabled() {
            return report;
        }

        for error in &self.schema.validate(data) {
            self.validation_mode.report(&self.host, &error.to_string());
            report.errors.push(error);
        }
        report.failed = self.validation_mode == Mode::Error && !report.errors.is_empty();
        report
    }

    pub fn convert_and_validate(&self, data: &mut Value) -> ToolReport {
        let mut report = self.convert_data(data);
        report.absorb(self.validate_data(data));
        report
    }
}
