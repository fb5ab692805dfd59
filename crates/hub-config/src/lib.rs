//! Configuration-file loading for the data hub.
//!
//! A config document is a single JSON object with two top-level keys:
//! `"o"` (observations to create/reconfigure) and `"s"` (state defaults
//! and overrides to push). [`load_config_file`] and [`load_config_str`]
//! parse that document; applying it to a running hub is the `hub`
//! crate's job, keeping this crate a pure parse-and-hand-off layer that
//! never mutates a hub itself.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use hub_types::SampleType;

/// A parse failure in a config document, with enough position
/// information for a caller to point a human at the bad byte.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub byte_offset: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config error at byte {}: {}", self.byte_offset, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// How an observation's circular buffer collapses accepted samples
/// before they're delivered, per the `"f"` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum FilterKind {
    #[default]
    None,
    Mean,
    #[serde(rename = "stddev")]
    StdDev,
    Min,
    Max,
}


/// One entry under `"o"`: the reconfiguration of a single observation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservationSpec {
    /// `"r"` — path of the source this observation routes from.
    pub r: Option<String>,
    /// `"d"` — destination label or path samples are forwarded to.
    pub d: Option<String>,
    /// `"p"` — minimum period, in seconds, between accepted pushes.
    pub p: Option<f64>,
    /// `"st"` — maximum number of buffered samples retained.
    pub st: Option<usize>,
    /// `"lt"` — low limit; samples below this are rejected.
    pub lt: Option<f64>,
    /// `"gt"` — high limit; samples above this are rejected.
    pub gt: Option<f64>,
    /// `"b"` — backup period, in seconds, for the on-disk buffer mirror.
    pub b: Option<f64>,
    /// `"f"` — buffer collapse transform applied before delivery.
    pub f: Option<FilterKind>,
    /// `"s"` — JSON sub-extraction spec applied to incoming samples.
    pub s: Option<String>,
}

/// One entry under `"s"`: a default or override value to push onto a
/// path's state.
#[derive(Debug, Clone, Deserialize)]
pub struct StateSpec {
    /// `"v"` — the value itself, still untyped JSON at this layer.
    pub v: Value,
    /// `"dt"` — the data type `v` should be coerced into. Optional;
    /// when absent, the type is inferred from the shape of `v`.
    pub dt: Option<String>,
}

impl StateSpec {
    pub fn data_type(&self) -> Result<SampleType, ConfigError> {
        match &self.dt {
            Some(dt) => SampleType::parse(dt).map_err(|e| ConfigError { byte_offset: 0, message: e.to_string() }),
            None => Ok(infer_data_type(&self.v)),
        }
    }
}

/// Infer a `"s"` entry's data type from its JSON value's own shape
/// when `"dt"` is left unset.
fn infer_data_type(v: &Value) -> SampleType {
    match v {
        Value::Null => SampleType::Trigger,
        Value::Bool(_) => SampleType::Bool,
        Value::Number(_) => SampleType::Numeric,
        Value::String(_) => SampleType::String,
        Value::Array(_) | Value::Object(_) => SampleType::Json,
    }
}

/// A fully parsed config document, ready to be applied to a `Hub`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    #[serde(default, rename = "o")]
    pub observations: BTreeMap<String, ObservationSpec>,
    #[serde(default, rename = "s")]
    pub state: BTreeMap<String, StateSpec>,
}

/// Load and parse a config document from a file on disk.
pub fn load_config_file(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError {
        byte_offset: 0,
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    load_config_str(&content)
}

/// Parse a config document from an in-memory JSON string.
pub fn load_config_str(content: &str) -> Result<ConfigDocument, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError {
        byte_offset: byte_offset_of(content, e.line(), e.column()),
        message: e.to_string(),
    })
}

/// `serde_json` reports errors as 1-indexed (line, column); translate
/// that back into a byte offset into `content` by re-scanning the
/// lines up to it, turning a generic parser error into a position a
/// caller can act on directly.
fn byte_offset_of(content: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (idx, l) in content.split('\n').enumerate() {
        if idx + 1 == line {
            return offset + column.saturating_sub(1).min(l.len());
        }
        offset += l.len() + 1;
    }
    content.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_parses() {
        let doc = load_config_str("{}").expect("parse");
        assert!(doc.observations.is_empty());
        assert!(doc.state.is_empty());
    }

    #[test]
    fn parses_observation_fields() {
        let doc = load_config_str(
            r#"{"o": {"/avg/temp": {"r": "/sensors/temp", "d": "/out/temp", "p": 1.5,
                 "st": 10, "lt": -40.0, "gt": 120.0, "b": 30.0, "f": "mean"}}}"#,
        )
        .expect("parse");
        let obs = doc.observations.get("/avg/temp").expect("present");
        assert_eq!(obs.r.as_deref(), Some("/sensors/temp"));
        assert_eq!(obs.d.as_deref(), Some("/out/temp"));
        assert_eq!(obs.p, Some(1.5));
        assert_eq!(obs.st, Some(10));
        assert_eq!(obs.f, Some(FilterKind::Mean));
    }

    #[test]
    fn parses_state_fields() {
        let doc = load_config_str(r#"{"s": {"/cfg/enabled": {"v": true, "dt": "bool"}}}"#)
            .expect("parse");
        let st = doc.state.get("/cfg/enabled").expect("present");
        assert_eq!(st.v, Value::Bool(true));
        assert_eq!(st.data_type().expect("data type"), SampleType::Bool);
    }

    #[test]
    fn rejects_unknown_filter_kind() {
        let err = load_config_str(r#"{"o": {"/x": {"f": "median"}}}"#).unwrap_err();
        assert!(err.message.contains("median") || err.message.contains("unknown"));
    }

    #[test]
    fn malformed_json_reports_byte_offset() {
        let err = load_config_str("{\"o\": }").unwrap_err();
        assert!(err.byte_offset > 0);
    }

    #[test]
    fn state_dt_is_optional_and_inferred_from_the_value() {
        let doc = load_config_str(r#"{"s": {"/x": {"v": 1}}}"#).expect("parse");
        let st = doc.state.get("/x").expect("present");
        assert_eq!(st.dt, None);
        assert_eq!(st.data_type().expect("data type"), SampleType::Numeric);
    }

    #[test]
    fn rejects_unknown_state_data_type() {
        let doc = load_config_str(r#"{"s": {"/x": {"v": 1, "dt": "blob"}}}"#).expect("parse");
        assert!(doc.state.get("/x").unwrap().data_type().is_err());
    }

    #[test]
    fn byte_offset_lands_on_correct_line() {
        let content = "{\n  \"o\": {\n    \"/x\": BAD\n  }\n}";
        let err = load_config_str(content).unwrap_err();
        assert_eq!(&content[err.byte_offset..err.byte_offset + 1], "B");
    }
}
