//! Per-observation backup persistence for the data hub.
//!
//! An observation with a non-zero backup period mirrors its circular
//! buffer to disk as a sequence of `{timestamp, value}` records, one
//! file per resource path under a hub-private directory. This crate
//! owns only the "append a record" / "restore a sequence" shape and
//! stays agnostic of what callers put in the records.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use hub_types::{DataSample, DataValue, SampleType};

/// One persisted record: a sample's timestamp and value, stripped of
/// the `Arc` wrapper `DataSample` carries at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub timestamp: f64,
    #[serde(flatten)]
    pub value: RecordValue,
}

/// The wire shape of a [`DataSample`]'s value: a type tag plus payload,
/// since JSON alone can't distinguish `DataValue::Bool` from
/// `DataValue::Trigger`'s absence of payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordValue {
    pub dt: SampleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<serde_json::Value>,
}

impl BackupRecord {
    pub fn from_sample(sample: &DataSample) -> Self {
        let value = match sample.value() {
            DataValue::Trigger => RecordValue { dt: SampleType::Trigger, v: None },
            DataValue::Bool(b) => RecordValue { dt: SampleType::Bool, v: Some((*b).into()) },
            DataValue::Numeric(n) => RecordValue { dt: SampleType::Numeric, v: Some((*n).into()) },
            DataValue::String(s) => {
                RecordValue { dt: SampleType::String, v: Some(s.as_ref().into()) }
            }
            DataValue::Json(s) => {
                let parsed = serde_json::from_str(s).unwrap_or(serde_json::Value::Null);
                RecordValue { dt: SampleType::Json, v: Some(parsed) }
            }
        };
        BackupRecord { timestamp: sample.timestamp(), value }
    }

    pub fn to_sample(&self) -> Result<DataSample> {
        let sample = match self.value.dt {
            SampleType::Trigger => DataSample::trigger(self.timestamp),
            SampleType::Bool => {
                let b = self.value.v.as_ref().and_then(|v| v.as_bool()).unwrap_or(false);
                DataSample::bool(self.timestamp, b)
            }
            SampleType::Numeric => {
                let n = self.value.v.as_ref().and_then(|v| v.as_f64()).unwrap_or(0.0);
                DataSample::numeric(self.timestamp, n)
            }
            SampleType::String => {
                let s = self.value.v.as_ref().and_then(|v| v.as_str()).unwrap_or("");
                DataSample::string(self.timestamp, s)?
            }
            SampleType::Json => {
                let s = self.value.v.clone().unwrap_or(serde_json::Value::Null).to_string();
                DataSample::json(self.timestamp, s)?
            }
        };
        Ok(sample)
    }
}

/// Where an observation's backup records live: one file per resource
/// path, named from a filesystem-safe encoding of the path.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, resource_path: &str) -> PathBuf {
        let name = resource_path.trim_start_matches('/').replace('/', "__");
        let name = if name.is_empty() { "__root".to_string() } else { name };
        self.dir.join(format!("{name}.backup.json"))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)
                .with_context(|| format!("failed to create backup dir: {}", self.dir.display()))?;
        }
        Ok(())
    }

    /// Append one record to the file backing `resource_path`, creating
    /// it on first use.
    pub fn append(&self, resource_path: &str, sample: &DataSample) -> Result<()> {
        self.ensure_dir()?;
        let mut records = self.restore(resource_path)?;
        records.push(BackupRecord::from_sample(sample));
        let path = self.file_path(resource_path);
        let content = serde_json::to_string_pretty(&records)
            .context("failed to serialize backup records")?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("failed to write backup file: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to install backup file: {}", path.display()))?;
        Ok(())
    }

    /// Read the full record sequence for `resource_path`, or an empty
    /// sequence if no backup file exists yet.
    pub fn restore(&self, resource_path: &str) -> Result<Vec<BackupRecord>> {
        let path = self.file_path(resource_path);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read(&path)
            .with_context(|| format!("failed to read backup file: {}", path.display()))?;
        let records: Vec<BackupRecord> = serde_json::from_slice(&content)
            .with_context(|| format!("failed to parse backup file: {}", path.display()))?;
        Ok(records)
    }

    /// Keep only the most recent `max` records, truncating the file in
    /// place — mirrors an observation's circular buffer eviction.
    pub fn truncate(&self, resource_path: &str, max: usize) -> Result<()> {
        let mut records = self.restore(resource_path)?;
        if records.len() <= max {
            return Ok(());
        }
        let drop = records.len() - max;
        records.drain(0..drop);
        let path = self.file_path(resource_path);
        let content = serde_json::to_string_pretty(&records)
            .context("failed to serialize backup records")?;
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write backup file: {}", path.display()))?;
        Ok(())
    }

    /// Remove the backup file for `resource_path`, if any.
    pub fn clear(&self, resource_path: &str) -> Result<()> {
        let path = self.file_path(resource_path);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("failed to delete backup file: {}", path.display()))?;
        }
        Ok(())
    }

    pub fn has_backup(&self, resource_path: &str) -> bool {
        self.file_path(resource_path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_numeric_sample() {
        let td = tempdir().expect("tempdir");
        let store = BackupStore::new(td.path().to_path_buf());
        let sample = DataSample::numeric(1.0, 42.5);
        store.append("/sensors/temp", &sample).expect("append");

        let records = store.restore("/sensors/temp").expect("restore");
        assert_eq!(records.len(), 1);
        let restored = records[0].to_sample().expect("to_sample");
        assert_eq!(restored.timestamp(), 1.0);
        assert_eq!(restored.value(), &DataValue::Numeric(42.5));
    }

    #[test]
    fn appends_accumulate_in_order() {
        let td = tempdir().expect("tempdir");
        let store = BackupStore::new(td.path().to_path_buf());
        for i in 0..5 {
            store
                .append("/x", &DataSample::numeric(i as f64, i as f64))
                .expect("append");
        }
        let records = store.restore("/x").expect("restore");
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].timestamp, 4.0);
    }

    #[test]
    fn restore_of_missing_path_is_empty() {
        let td = tempdir().expect("tempdir");
        let store = BackupStore::new(td.path().to_path_buf());
        assert!(store.restore("/never/written").expect("restore").is_empty());
        assert!(!store.has_backup("/never/written"));
    }

    #[test]
    fn truncate_keeps_most_recent() {
        let td = tempdir().expect("tempdir");
        let store = BackupStore::new(td.path().to_path_buf());
        for i in 0..10 {
            store.append("/buf", &DataSample::numeric(i as f64, i as f64)).expect("append");
        }
        store.truncate("/buf", 3).expect("truncate");
        let records = store.restore("/buf").expect("restore");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].timestamp, 7.0);
        assert_eq!(records[2].timestamp, 9.0);
    }

    #[test]
    fn clear_removes_the_file() {
        let td = tempdir().expect("tempdir");
        let store = BackupStore::new(td.path().to_path_buf());
        store.append("/x", &DataSample::trigger(0.0)).expect("append");
        assert!(store.has_backup("/x"));
        store.clear("/x").expect("clear");
        assert!(!store.has_backup("/x"));
    }

    #[test]
    fn trigger_round_trips_without_payload() {
        let td = tempdir().expect("tempdir");
        let store = BackupStore::new(td.path().to_path_buf());
        store.append("/evt", &DataSample::trigger(3.0)).expect("append");
        let records = store.restore("/evt").expect("restore");
        let restored = records[0].to_sample().expect("to_sample");
        assert_eq!(restored.value(), &DataValue::Trigger);
    }

    #[test]
    fn json_round_trips_through_value() {
        let td = tempdir().expect("tempdir");
        let store = BackupStore::new(td.path().to_path_buf());
        store
            .append("/obj", &DataSample::json(0.0, r#"{"a":1}"#).expect("json"))
            .expect("append");
        let records = store.restore("/obj").expect("restore");
        let restored = records[0].to_sample().expect("to_sample");
        assert_eq!(restored.to_json_string(), r#"{"a":1}"#);
    }
}
