//! The push pipeline: barrier check → namespace drop → coercion →
//! filter → transform → accept → handler dispatch → buffer/backup →
//! downstream propagation.

use std::time::{SystemTime, UNIX_EPOCH};

use hub_config::FilterKind;
use hub_types::{DataSample, DataValue, HubError, SampleType};
use tracing::{debug, trace, warn};

use crate::entry::Entry;
use crate::resource::{ObservationState, ResourceVariant};
use crate::Hub;

/// Timestamp 0 on a push means "now".
pub fn resolve_timestamp(ts: f64) -> f64 {
    if ts == 0.0 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
    } else {
        ts
    }
}

/// Push `value` at `ts` onto `entry`. `ts` must already be resolved
/// (non-zero) — callers at the facade boundary call
/// [`resolve_timestamp`] first so a barrier-collapsed replay carries
/// the timestamp it was originally pushed with, not a later "now".
pub fn push_resolved(hub: &Hub, entry: &Entry, ts: f64, value: DataValue) -> Result<(), HubError> {
    let span = tracing::info_span!("hub.push", path = %entry.full_path());
    let _enter = span.enter();

    if hub.barrier_active() {
        let sample = DataSample::new(ts, value);
        entry.with_resource_mut(|r| r.common.pending = Some(sample));
        trace!("buffered behind update barrier");
        return Ok(());
    }

    if entry.is_namespace() {
        trace!("dropped push to namespace");
        return Ok(());
    }
    if entry.with_resource(|r| matches!(r.variant, ResourceVariant::Placeholder(_))).unwrap_or(false) {
        trace!("dropped push to placeholder");
        return Ok(());
    }

    let incoming = DataSample::new(ts, value);
    let accepted = match entry.with_resource(|r| matches!(r.variant, ResourceVariant::Observation(_))).unwrap_or(false)
    {
        true => match accept_observation(entry, &incoming)? {
            Some(s) => s,
            None => return Ok(()),
        },
        false => match accept_io(entry, &incoming) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "coercion failed, push rejected");
                return Err(e);
            }
        },
    };

    finalize_accept(hub, entry, accepted)
}

fn accept_io(entry: &Entry, incoming: &DataSample) -> Result<DataSample, HubError> {
    let target_type = entry.with_resource(|r| r.data_type()).flatten().expect("io resource has a type");
    incoming.coerce(target_type)
}

/// Run an Observation's filter chain and, if the sample survives,
/// its transform. Returns `None` on silent rejection (not an error).
fn accept_observation(entry: &Entry, incoming: &DataSample) -> Result<Option<DataSample>, HubError> {
    let mut candidate = incoming.clone();

    // JSON extraction happens first: a rejection here (missing field,
    // non-JSON input) is a silent drop like every other filter.
    let extraction = entry.with_resource(|r| r.as_observation().and_then(|o| o.extraction.clone())).flatten();
    if let Some(spec) = extraction {
        candidate = match spec.extract(&candidate) {
            Ok(s) => s,
            Err(e) => {
                trace!(error = %e, "json extraction rejected sample");
                return Ok(None);
            }
        };
    }

    let reject = entry
        .with_resource(|r| {
            let obs = r.as_observation().expect("observation variant");
            filter_rejects(obs, &candidate)
        })
        .unwrap_or(true);
    if reject {
        debug!("observation filter rejected sample");
        return Ok(None);
    }

    let transformed = entry
        .with_resource_mut(|r| {
            let obs = r.as_observation_mut().expect("observation variant");
            obs.buffer.push(candidate.clone());
            obs.last_accepted = Some(candidate.clone());
            apply_transform(obs.transform, &obs.buffer, &candidate)
        })
        .expect("observation variant");

    entry.with_resource_mut(|r| r.as_observation_mut().unwrap().data_type = Some(transformed.sample_type()));

    Ok(Some(transformed))
}

fn filter_rejects(obs: &ObservationState, candidate: &DataSample) -> bool {
    if let Some(last) = &obs.last_accepted {
        if obs.min_period > 0.0 && candidate.timestamp() - last.timestamp() < obs.min_period {
            return true;
        }
        if let Some(change_by) = obs.change_by
            && values_too_close(last, candidate, change_by) {
                return true;
            }
    }
    if matches!(candidate.value(), DataValue::Numeric(_) | DataValue::Bool(_)) {
        let numeric = candidate.coerce(SampleType::Numeric).ok().and_then(|s| match s.value() {
            DataValue::Numeric(n) => Some(*n),
            _ => None,
        });
        if let Some(n) = numeric {
            if let Some(low) = obs.low_limit
                && n < low {
                    return true;
                }
            if let Some(high) = obs.high_limit
                && n > high {
                    return true;
                }
        }
    }
    false
}

fn values_too_close(last: &DataSample, candidate: &DataSample, change_by: f64) -> bool {
    match (last.value(), candidate.value()) {
        (DataValue::Trigger, DataValue::Trigger) => false,
        (DataValue::Numeric(a), DataValue::Numeric(b)) => (b - a).abs() < change_by,
        _ if change_by != 0.0 => {
            last.to_printable_string() == candidate.to_printable_string()
        }
        _ => false,
    }
}

fn apply_transform(
    transform: FilterKind,
    buffer: &crate::handler::SampleBuffer,
    candidate: &DataSample,
) -> DataSample {
    if matches!(transform, FilterKind::None) {
        return candidate.clone();
    }
    let values: Vec<f64> = buffer
        .iter()
        .filter_map(|s| s.coerce(SampleType::Numeric).ok())
        .filter_map(|s| match s.value() {
            DataValue::Numeric(n) => Some(*n),
            _ => None,
        })
        .collect();
    let stat = match transform {
        FilterKind::None => unreachable!(),
        FilterKind::Mean => mean(&values),
        FilterKind::StdDev => std_dev(&values),
        FilterKind::Min => values.iter().cloned().fold(f64::NAN, f64::min),
        FilterKind::Max => values.iter().cloned().fold(f64::NAN, f64::max),
    };
    DataSample::numeric(candidate.timestamp(), stat)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn finalize_accept(hub: &Hub, entry: &Entry, accepted: DataSample) -> Result<(), HubError> {
    let now = accepted.timestamp();
    entry.with_resource_mut(|r| r.common.current = Some(accepted.clone()));
    entry.mark_modified(now);
    debug!("push accepted");

    entry
        .with_resource(|r| r.common.handlers.dispatch(&accepted))
        .transpose()?;

    hub.schedule_backup_if_due(entry, &accepted);
    hub.dispatch_destination_label(entry, &accepted);

    let downstream_units = entry.with_resource(|r| r.units_for_routing()).unwrap_or_default();
    let downstream = entry.with_resource(|r| r.common.downstream.clone()).unwrap_or_default();
    for weak in downstream {
        let Some(target) = Entry::from_weak(&weak) else { continue };
        if target.with_resource(|r| matches!(r.variant, ResourceVariant::Input(_))).unwrap_or(false) {
            trace!(path = %target.full_path(), "source route into input ignored");
            continue;
        }
        let target_units = target.with_resource(|r| r.units_for_routing()).unwrap_or_default();
        if !downstream_units.is_empty() && !target_units.is_empty() && downstream_units != target_units {
            warn!(path = %target.full_path(), "unit mismatch, downstream push dropped");
            continue;
        }
        push_resolved(hub, &target, accepted.timestamp(), accepted.value().clone())?;
    }

    Ok(())
}
