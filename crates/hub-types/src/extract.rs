//! JSON sub-extraction: given a sample and a spec like `x`, `x.y`, `[3]`,
//! `x[3].y`, produce a fresh sample of the appropriate type or fail.
//!
//! Selecting a sub-value by a path/index spec is a filtering rule an
//! Observation applies to every accepted sample, so it lives here in
//! the value layer rather than behind an outside collaborator.

use crate::error::HubError;
use crate::sample::DataSample;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
}

/// A parsed extraction spec, ready to apply against any number of JSON
/// samples without re-parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractSpec(Vec<Segment>);

impl ExtractSpec {
    /// Parse a spec string such as `x.y` or `x[3].y`.
    pub fn parse(spec: &str) -> Result<Self, HubError> {
        let mut segments = Vec::new();
        let mut chars = spec.chars().peekable();
        let mut current = String::new();

        let flush = |current: &mut String, segments: &mut Vec<Segment>| {
            if !current.is_empty() {
                segments.push(Segment::Field(std::mem::take(current)));
            }
        };

        while let Some(c) = chars.next() {
            match c {
                '.' => flush(&mut current, &mut segments),
                '[' => {
                    flush(&mut current, &mut segments);
                    let mut digits = String::new();
                    for d in chars.by_ref() {
                        if d == ']' {
                            break;
                        }
                        digits.push(d);
                    }
                    let index: usize = digits
                        .parse()
                        .map_err(|_| HubError::BadParameter(format!("bad index in '{spec}'")))?;
                    segments.push(Segment::Index(index));
                }
                _ => current.push(c),
            }
        }
        flush(&mut current, &mut segments);

        if segments.is_empty() {
            return Err(HubError::BadParameter(format!("empty extraction spec '{spec}'")));
        }
        Ok(Self(segments))
    }

    /// Render this spec back to its textual suffix form, e.g. for
    /// appending to an observation path when forwarding to an external
    /// destination.
    pub fn as_suffix(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                Segment::Field(name) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Segment::Index(idx) => out.push_str(&format!("[{idx}]")),
            }
        }
        out
    }

    /// Apply this spec to a JSON sample, producing a fresh, appropriately
    /// typed sample (timestamp preserved) or [`HubError::BadParameter`]
    /// if the sample isn't JSON or the path doesn't resolve.
    pub fn extract(&self, sample: &DataSample) -> Result<DataSample, HubError> {
        let crate::sample::DataValue::Json(raw) = sample.value() else {
            return Err(HubError::BadParameter("extraction requires a JSON sample".into()));
        };
        let mut cursor: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| HubError::BadParameter(e.to_string()))?;

        for seg in &self.0 {
            cursor = match seg {
                Segment::Field(name) => cursor
                    .as_object_mut()
                    .and_then(|o| o.remove(name))
                    .ok_or_else(|| HubError::BadParameter(format!("no field '{name}'")))?,
                Segment::Index(idx) => cursor
                    .as_array_mut()
                    .filter(|a| *idx < a.len())
                    .map(|a| a.remove(*idx))
                    .ok_or_else(|| HubError::BadParameter(format!("no index [{idx}]")))?,
            };
        }

        value_to_sample(sample.timestamp(), cursor)
    }
}

fn value_to_sample(timestamp: f64, value: serde_json::Value) -> Result<DataSample, HubError> {
    Ok(match value {
        serde_json::Value::Null => DataSample::trigger(timestamp),
        serde_json::Value::Bool(b) => DataSample::bool(timestamp, b),
        serde_json::Value::Number(n) => DataSample::numeric(timestamp, n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => DataSample::string(timestamp, s)?,
        other => DataSample::json(timestamp, other.to_string())?,
    })
}
