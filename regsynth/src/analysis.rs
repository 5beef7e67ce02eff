//! Normalized register descriptions.
//!
//! Analyzers (heuristic or model-backed) hand back loosely shaped records. This
//! module is the single boundary where those records are validated and every
//! missing or garbage field is mapped to its documented default, so the
//! synthesis engine only ever sees a well-formed [`RegisterAnalysis`].

use model::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Register name used when the analyzer could not identify one.
pub const UNKNOWN_REGISTER: &str = "UnknownRegister";

/// Address used when the analyzer reported none.
pub const DEFAULT_ADDRESS: &str = "0x0000";

/// Reset-value spellings that mean "not known".
const UNKNOWN_RESET_VALUES: [&str; 2] = ["none", "unknown"];

/// Errors raised while turning a table into a [`RegisterAnalysis`].
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analyzer returned an empty response")]
    EmptyResponse,

    #[error("Malformed analysis response: {reason}")]
    MalformedResponse { reason: String },

    #[error("Table does not describe a register: {reason}")]
    Unrecognized { reason: String },

    #[error("Model provider error: {0}")]
    Provider(#[from] ModelError),
}

impl AnalysisError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Provider(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Access mode of a register.
///
/// Tokens outside the `RO`/`WO`/`RW` vocabulary are kept verbatim so that a
/// datasheet spelling such as `R/W` or `W1C` is not lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccessType {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    Other(String),
}

impl AccessType {
    /// Parses an access token case-insensitively. Blank input means read/write.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match token.to_ascii_uppercase().as_str() {
            "" | "RW" => AccessType::ReadWrite,
            "RO" => AccessType::ReadOnly,
            "WO" => AccessType::WriteOnly,
            _ => AccessType::Other(token.to_string()),
        }
    }

    /// True when the token contains a `w` in any case.
    pub fn is_writable(&self) -> bool {
        match self {
            AccessType::ReadOnly => false,
            AccessType::WriteOnly | AccessType::ReadWrite => true,
            AccessType::Other(raw) => raw.to_lowercase().contains('w'),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AccessType::ReadOnly => "RO",
            AccessType::WriteOnly => "WO",
            AccessType::ReadWrite => "RW",
            AccessType::Other(raw) => raw,
        }
    }
}

impl Default for AccessType {
    fn default() -> Self {
        AccessType::ReadWrite
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for AccessType {
    fn from(value: String) -> Self {
        AccessType::parse(&value)
    }
}

impl From<AccessType> for String {
    fn from(value: AccessType) -> Self {
        value.as_str().to_string()
    }
}

/// Normalized description of a single hardware register.
///
/// Fields are private: once built, an analysis is read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterAnalysis {
    register_name: String,
    address: String,
    access_type: AccessType,
    reset_value: Option<String>,
    boundary_conditions: Vec<String>,
    test_scenarios: Vec<String>,
    notes: Option<String>,
}

impl Default for RegisterAnalysis {
    fn default() -> Self {
        Self::new(UNKNOWN_REGISTER)
    }
}

impl RegisterAnalysis {
    /// Create an analysis for `register_name`; a blank name becomes
    /// [`UNKNOWN_REGISTER`].
    pub fn new(register_name: impl Into<String>) -> Self {
        let register_name = register_name.into().trim().to_string();
        Self {
            register_name: if register_name.is_empty() {
                UNKNOWN_REGISTER.to_string()
            } else {
                register_name
            },
            address: DEFAULT_ADDRESS.to_string(),
            access_type: AccessType::ReadWrite,
            reset_value: None,
            boundary_conditions: Vec::new(),
            test_scenarios: Vec::new(),
            notes: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        let address = address.into().trim().to_string();
        if !address.is_empty() {
            self.address = address;
        }
        self
    }

    pub fn with_access_type(mut self, access_type: AccessType) -> Self {
        self.access_type = access_type;
        self
    }

    pub fn with_reset_value(mut self, reset_value: impl Into<String>) -> Self {
        self.reset_value = Some(reset_value.into());
        self
    }

    pub fn with_boundary_conditions(mut self, conditions: Vec<String>) -> Self {
        self.boundary_conditions = conditions;
        self
    }

    pub fn with_test_scenarios(mut self, scenarios: Vec<String>) -> Self {
        self.test_scenarios = scenarios;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn register_name(&self) -> &str {
        &self.register_name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn access_type(&self) -> &AccessType {
        &self.access_type
    }

    /// The reset value exactly as reported, including placeholder spellings.
    pub fn reset_value(&self) -> Option<&str> {
        self.reset_value.as_deref()
    }

    /// The reset value, unless it is blank or one of the "not known" spellings.
    pub fn known_reset_value(&self) -> Option<&str> {
        self.reset_value
            .as_deref()
            .filter(|value| is_known_reset_value(value))
    }

    pub fn boundary_conditions(&self) -> &[String] {
        &self.boundary_conditions
    }

    pub fn test_scenarios(&self) -> &[String] {
        &self.test_scenarios
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Validate a loosely shaped record into an analysis.
    ///
    /// The record may be the analysis object itself or an envelope holding it
    /// under an `"analysis"` key. Anything that is not a JSON object is
    /// rejected, as is an envelope with `"status": "error"` or without an
    /// object under `"analysis"`. Inside an object, every field falls back to
    /// its default.
    pub fn from_value(value: &Value) -> Result<Self, AnalysisError> {
        let object = value
            .as_object()
            .ok_or_else(|| AnalysisError::MalformedResponse {
                reason: format!("expected a JSON object, found {}", json_kind(value)),
            })?;

        let failed = object
            .get("status")
            .and_then(Value::as_str)
            .is_some_and(|status| status.trim().eq_ignore_ascii_case("error"));
        match object.get("analysis") {
            Some(inner) if inner.is_object() && !failed => return Self::from_value(inner),
            Some(_) => return Err(envelope_failure(object)),
            None if failed => return Err(envelope_failure(object)),
            None => {}
        }

        let mut analysis =
            Self::new(text_field(object, "register_name").unwrap_or_default());

        if let Some(address) = text_field(object, "address") {
            analysis = analysis.with_address(address);
        }
        if let Some(access) = text_field(object, "access_type") {
            analysis = analysis.with_access_type(AccessType::parse(&access));
        }
        if let Some(reset) = text_field(object, "reset_value").filter(|v| is_known_reset_value(v))
        {
            analysis = analysis.with_reset_value(reset);
        }
        if let Some(notes) = text_field(object, "notes") {
            analysis = analysis.with_notes(notes);
        }

        Ok(analysis
            .with_boundary_conditions(text_list(object, "boundary_conditions"))
            .with_test_scenarios(text_list(object, "test_scenarios")))
    }
}

fn is_known_reset_value(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !UNKNOWN_RESET_VALUES
            .iter()
            .any(|sentinel| value.eq_ignore_ascii_case(sentinel))
}

/// Error for an envelope that reports a failed analysis.
fn envelope_failure(object: &Map<String, Value>) -> AnalysisError {
    let reason = match text_field(object, "error") {
        Some(error) => format!("analyzer reported failure: {}", error),
        None => "envelope carries no analysis object".to_string(),
    };
    AnalysisError::MalformedResponse { reason }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Scalar text of a field; numbers and booleans are stringified, blanks dropped.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(scalar_text)
}

/// A list of free-text entries. A lone string counts as a one-entry list;
/// nested structures and blank entries are skipped.
fn text_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    match object.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}
