//! Applies a parsed [`hub_config::ConfigDocument`] to a running hub:
//! reconfigures every named observation (marking it config-provenance)
//! and pushes defaults/overrides from the state section. Reapplying a
//! document fully replaces the previous config-provenance observation
//! set — observations this call no longer names are deleted;
//! observations created through the admin API are left alone.

use std::collections::HashSet;

use hub_config::{ConfigDocument, ObservationSpec};
use hub_types::{DataSample, HubError};
use serde_json::Value;
use tracing::info;

use crate::Hub;

pub fn apply(hub: &Hub, doc: &ConfigDocument) -> Result<(), HubError> {
    let new_paths: HashSet<String> = doc.observations.keys().cloned().collect();

    let previous = hub.config_observation_paths.borrow().clone();
    for stale in previous.difference(&new_paths) {
        if hub.admin().delete_observation(stale).is_ok() {
            info!(path = %stale, "config reapply removed observation no longer present");
        }
    }

    for (path, spec) in &doc.observations {
        apply_observation(hub, path, spec)?;
    }
    *hub.config_observation_paths.borrow_mut() = new_paths;

    for (path, spec) in &doc.state {
        let dt = spec.data_type().map_err(|e| HubError::BadParameter(e.to_string()))?;
        let sample = json_to_sample(0.0, &spec.v)?.coerce(dt)?;
        hub.admin().set_default(path, sample)?;
    }

    Ok(())
}

fn apply_observation(hub: &Hub, path: &str, spec: &ObservationSpec) -> Result<(), HubError> {
    hub.admin().create_observation(path)?;
    hub.admin().mark_config_provenance(path, true)?;
    hub.admin().configure_observation(
        path,
        crate::hub::ObservationConfig {
            min_period: spec.p,
            change_by: None,
            low_limit: spec.lt,
            high_limit: spec.gt,
            buffer_max: spec.st,
            backup_period: spec.b,
            transform: spec.f,
            extraction: spec.s.clone(),
        },
    )?;
    if let Some(source) = &spec.r {
        hub.admin().set_source(path, source)?;
    }
    if let Some(destination) = &spec.d {
        hub.admin().set_destination(path, destination)?;
    }
    Ok(())
}

fn json_to_sample(ts: f64, value: &Value) -> Result<DataSample, HubError> {
    match value {
        Value::Null => Ok(DataSample::trigger(ts)),
        Value::Bool(b) => Ok(DataSample::bool(ts, *b)),
        Value::Number(n) => Ok(DataSample::numeric(ts, n.as_f64().unwrap_or(f64::NAN))),
        Value::String(s) => DataSample::string(ts, s.clone()),
        other => DataSample::json(ts, other.to_string()),
    }
}
