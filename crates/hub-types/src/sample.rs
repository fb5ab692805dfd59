//! The data sample: an immutable, reference-counted, tagged value with a
//! timestamp. This is the unit of currency flowing through the hub —
//! every current value, buffered entry, default, override, and handler
//! delivery is a [`DataSample`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Maximum length, in bytes, of a string or JSON sample payload.
pub const MAX_PAYLOAD_LEN: usize = 1023;

/// The declared shape of a resource's value, independent of any
/// particular sample. Inputs, Outputs, Observations, and Placeholders
/// each carry one of these as their "data type".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Trigger,
    Bool,
    Numeric,
    String,
    Json,
}

impl SampleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::Trigger => "trigger",
            SampleType::Bool => "bool",
            SampleType::Numeric => "numeric",
            SampleType::String => "string",
            SampleType::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Result<Self, HubError> {
        match s {
            "trigger" => Ok(SampleType::Trigger),
            "bool" => Ok(SampleType::Bool),
            "numeric" => Ok(SampleType::Numeric),
            "string" => Ok(SampleType::String),
            "json" => Ok(SampleType::Json),
            other => Err(HubError::BadParameter(format!("unknown data type '{other}'"))),
        }
    }
}

/// The tagged value carried by a [`DataSample`].
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Trigger,
    Bool(bool),
    Numeric(f64),
    String(Arc<str>),
    Json(Arc<str>),
}

impl DataValue {
    pub fn sample_type(&self) -> SampleType {
        match self {
            DataValue::Trigger => SampleType::Trigger,
            DataValue::Bool(_) => SampleType::Bool,
            DataValue::Numeric(_) => SampleType::Numeric,
            DataValue::String(_) => SampleType::String,
            DataValue::Json(_) => SampleType::Json,
        }
    }

    fn new_string(s: impl Into<Arc<str>>) -> Result<Self, HubError> {
        let s = s.into();
        if s.len() > MAX_PAYLOAD_LEN {
            return Err(HubError::Overflow);
        }
        Ok(DataValue::String(s))
    }

    fn new_json(s: impl Into<Arc<str>>) -> Result<Self, HubError> {
        let s = s.into();
        if s.len() > MAX_PAYLOAD_LEN {
            return Err(HubError::Overflow);
        }
        Ok(DataValue::Json(s))
    }
}

#[derive(Debug, PartialEq)]
struct Inner {
    timestamp: f64,
    value: DataValue,
}

/// An immutable, reference-counted telemetry sample.
///
/// Cloning a `DataSample` is a cheap refcount bump (`Arc::clone`); the
/// inner value is freed exactly when the last clone is dropped. The C
/// original's in-place timestamp-rewrite escape (used when a sample is
/// reused as a trigger-derived child) is modeled here as
/// [`DataSample::with_timestamp`], which returns a *new* handle sharing
/// nothing mutable with the original — functionally equivalent from every
/// caller's point of view, since the original is otherwise immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSample(Arc<Inner>);

impl DataSample {
    pub fn new(timestamp: f64, value: DataValue) -> Self {
        Self(Arc::new(Inner { timestamp, value }))
    }

    pub fn trigger(timestamp: f64) -> Self {
        Self::new(timestamp, DataValue::Trigger)
    }

    pub fn bool(timestamp: f64, v: bool) -> Self {
        Self::new(timestamp, DataValue::Bool(v))
    }

    pub fn numeric(timestamp: f64, v: f64) -> Self {
        Self::new(timestamp, DataValue::Numeric(v))
    }

    pub fn string(timestamp: f64, v: impl Into<Arc<str>>) -> Result<Self, HubError> {
        Ok(Self::new(timestamp, DataValue::new_string(v)?))
    }

    pub fn json(timestamp: f64, v: impl Into<Arc<str>>) -> Result<Self, HubError> {
        Ok(Self::new(timestamp, DataValue::new_json(v)?))
    }

    pub fn timestamp(&self) -> f64 {
        self.0.timestamp
    }

    pub fn value(&self) -> &DataValue {
        &self.0.value
    }

    pub fn sample_type(&self) -> SampleType {
        self.0.value.sample_type()
    }

    /// Return a new sample carrying the same value but a different
    /// timestamp. Used when a sample is re-sourced through a trigger
    /// conversion or replayed with the hub's "now" substitution.
    pub fn with_timestamp(&self, timestamp: f64) -> Self {
        Self::new(timestamp, self.0.value.clone())
    }

    /// The printable-string conversion: trigger -> "", bool ->
    /// "true"/"false", numeric -> locale-independent `%lf`-style decimal,
    /// string -> verbatim, JSON -> verbatim.
    pub fn to_printable_string(&self) -> String {
        match &self.0.value {
            DataValue::Trigger => String::new(),
            DataValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            DataValue::Numeric(n) => format_numeric(*n),
            DataValue::String(s) => s.to_string(),
            DataValue::Json(s) => s.to_string(),
        }
    }

    /// The JSON-form conversion: trigger -> `null`, bool ->
    /// `true`/`false`, numeric -> `%lf`, string -> quoted, JSON -> verbatim.
    pub fn to_json_string(&self) -> String {
        match &self.0.value {
            DataValue::Trigger => "null".to_string(),
            DataValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            DataValue::Numeric(n) => format_numeric(*n),
            DataValue::String(s) => quote_json_string(s),
            DataValue::Json(s) => s.to_string(),
        }
    }

    /// Coerce this sample into the declared `target` type, per the
    /// exhaustive 5x5 matrix. The returned sample keeps this
    /// sample's timestamp.
    pub fn coerce(&self, target: SampleType) -> Result<DataSample, HubError> {
        let ts = self.timestamp();
        if self.sample_type() == target {
            return Ok(self.clone());
        }
        let value = match (&self.0.value, target) {
            (_, SampleType::Trigger) => DataValue::Trigger,

            (DataValue::Trigger, SampleType::Bool) => DataValue::Bool(false),
            (DataValue::Numeric(n), SampleType::Bool) => DataValue::Bool(*n != 0.0),
            (DataValue::String(s), SampleType::Bool) => DataValue::Bool(!s.is_empty()),
            (DataValue::Json(s), SampleType::Bool) => DataValue::Bool(json_truthy(s)?),

            (DataValue::Trigger, SampleType::Numeric) => DataValue::Numeric(f64::NAN),
            (DataValue::Bool(b), SampleType::Numeric) => {
                DataValue::Numeric(if *b { 1.0 } else { 0.0 })
            }
            (DataValue::String(s), SampleType::Numeric) => {
                DataValue::Numeric(s.trim().parse::<f64>().unwrap_or(f64::NAN))
            }
            (DataValue::Json(s), SampleType::Numeric) => DataValue::Numeric(json_numeric(s)?),

            (DataValue::Trigger, SampleType::String) => DataValue::new_string("")?,
            (DataValue::Bool(b), SampleType::String) => {
                DataValue::new_string(if *b { "true" } else { "false" })?
            }
            (DataValue::Numeric(n), SampleType::String) => DataValue::new_string(format_numeric(*n))?,
            (DataValue::Json(s), SampleType::String) => DataValue::new_string(s.clone())?,

            (DataValue::Trigger, SampleType::Json) => DataValue::new_json("null")?,
            (DataValue::Bool(b), SampleType::Json) => {
                DataValue::new_json(if *b { "true" } else { "false" })?
            }
            (DataValue::Numeric(n), SampleType::Json) => DataValue::new_json(format_numeric(*n))?,
            (DataValue::String(s), SampleType::Json) => DataValue::new_json(quote_json_string(s))?,

            // Same-type pairs are handled by the early-return above.
            (DataValue::Bool(_), SampleType::Bool)
            | (DataValue::Numeric(_), SampleType::Numeric)
            | (DataValue::String(_), SampleType::String)
            | (DataValue::Json(_), SampleType::Json) => unreachable!(),
        };
        Ok(DataSample::new(ts, value))
    }
}

/// `%lf`-equivalent formatting: fixed 6 fractional digits, as C's
/// `printf("%lf", v)` produces with no explicit precision.
fn format_numeric(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    format!("{v:.6}")
}

fn quote_json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn json_truthy(s: &str) -> Result<bool, HubError> {
    let parsed: serde_json::Value =
        serde_json::from_str(s).map_err(|e| HubError::BadParameter(e.to_string()))?;
    Ok(match parsed {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    })
}

fn json_numeric(s: &str) -> Result<f64, HubError> {
    let parsed: serde_json::Value =
        serde_json::from_str(s).map_err(|e| HubError::BadParameter(e.to_string()))?;
    Ok(match parsed {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::Bool(b) => if b { 1.0 } else { 0.0 },
        _ => f64::NAN,
    })
}
