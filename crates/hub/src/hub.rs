//! The hub context and its four client-facing facades: I/O, Admin,
//! Query, and Config. A singleton `Hub` replaces module-level globals
//! (root entry, handler counters, destination registry) with one value
//! every facade borrows.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;

use hub_config::{ConfigDocument, FilterKind};
use hub_storage::BackupStore;
use hub_types::{DataSample, DataValue, ExtractSpec, HubError, HubResult, SampleType};
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::barrier::{BarrierState, UpdateHandlerId};
use crate::entry::{Entry, EntryKind, ResourceTree};
use crate::handler::HandlerId;
use crate::push::{mean, push_resolved, resolve_timestamp, std_dev};
use crate::resource::{ObservationState, Resource, ResourceVariant};
use crate::routing;
use crate::snapshot::{self, Format, SnapshotFlags};

/// A callback registered for an opaque (non-path) destination label.
pub type DestinationCallback = Rc<dyn Fn(&str, &DataSample)>;

pub struct Hub {
    pub(crate) tree: RefCell<ResourceTree>,
    pub(crate) barrier: RefCell<BarrierState>,
    pub(crate) config_observation_paths: RefCell<HashSet<String>>,
    backup: Option<BackupStore>,
    destinations: RefCell<IndexMap<String, DestinationCallback>>,
    /// Whether this deployment is "hosted" (multiple sandboxed client
    /// apps behind one hub, each confined to its own namespace) or a
    /// standalone embedding where a client may rebase its own I/O
    /// namespace. Only the latter permits [`IoService::set_namespace`].
    hosted: bool,
    /// The client app namespace relative I/O paths resolve against.
    /// Absolute paths (leading `/`) bypass it entirely.
    namespace: RefCell<String>,
}

impl Hub {
    pub fn new() -> Self {
        let now = resolve_timestamp(0.0);
        Hub {
            tree: RefCell::new(ResourceTree::new(now)),
            barrier: RefCell::new(BarrierState::default()),
            config_observation_paths: RefCell::new(HashSet::new()),
            backup: None,
            destinations: RefCell::new(IndexMap::new()),
            hosted: true,
            namespace: RefCell::new(String::from("/")),
        }
    }

    /// A standalone (non-hosted) embedding, where the single client app
    /// is permitted to rebase its own I/O namespace via
    /// [`IoService::set_namespace`].
    pub fn new_non_hosted() -> Self {
        Hub { hosted: false, ..Self::new() }
    }

    pub fn with_backup(backup_dir: impl Into<std::path::PathBuf>) -> Self {
        Hub { backup: Some(BackupStore::new(backup_dir.into())), ..Self::new() }
    }

    pub fn io(&self) -> IoService<'_> {
        IoService { hub: self }
    }

    pub fn admin(&self) -> AdminService<'_> {
        AdminService { hub: self }
    }

    pub fn query(&self) -> QueryService<'_> {
        QueryService { hub: self }
    }

    pub fn config(&self) -> ConfigService<'_> {
        ConfigService { hub: self }
    }

    pub(crate) fn barrier_active(&self) -> bool {
        self.barrier.borrow().is_active()
    }

    pub(crate) fn schedule_backup_if_due(&self, entry: &Entry, accepted: &DataSample) {
        let Some(store) = &self.backup else { return };
        let due = entry
            .with_resource_mut(|r| {
                let obs = r.as_observation_mut()?;
                if obs.buffer.capacity() == 0 || obs.backup_period <= 0.0 {
                    return None;
                }
                if accepted.timestamp() - obs.last_backup < obs.backup_period {
                    return None;
                }
                obs.last_backup = accepted.timestamp();
                Some(())
            })
            .flatten();
        if due.is_some() {
            let path = entry.full_path();
            if let Err(e) = store.append(&path, accepted) {
                warn!(path = %path, error = %e, "observation backup write failed");
            }
        }
    }

    pub(crate) fn dispatch_destination_label(&self, entry: &Entry, accepted: &DataSample) {
        let label =
            entry.with_resource(|r| r.as_observation().and_then(|o| o.destination_label.clone())).flatten();
        let Some(label) = label else { return };
        if label.starts_with('/') {
            return; // installed as a source link at set_destination time
        }
        if let Some(callback) = self.destinations.borrow().get(&label) {
            let suffix = entry
                .with_resource(|r| r.as_observation().and_then(|o| o.extraction.as_ref().map(|e| e.as_suffix())))
                .flatten()
                .unwrap_or_default();
            callback(&format!("{}{}", entry.full_path(), suffix), accepted);
        }
    }

    /// Register the callback invoked when an observation's destination
    /// label (a non-path-shaped string) fires.
    pub fn register_destination(&self, label: impl Into<String>, callback: DestinationCallback) {
        self.destinations.borrow_mut().insert(label.into(), callback);
    }

    fn restore_observation_buffer(&self, entry: &Entry, path: &str) {
        let Some(store) = &self.backup else { return };
        if !store.has_backup(path) {
            return;
        }
        match store.restore(path) {
            Ok(records) => {
                entry.with_resource_mut(|r| {
                    if let Some(obs) = r.as_observation_mut() {
                        for record in &records {
                            if let Ok(sample) = record.to_sample() {
                                obs.buffer.push(sample);
                            }
                        }
                    }
                });
            }
            Err(e) => warn!(path = %path, error = %e, "failed to restore observation backup"),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Hub::new()
    }
}

/// Per-client-namespace producer/consumer facade: create Inputs and
/// Outputs, push values, read the current state, and subscribe
/// handlers.
pub struct IoService<'a> {
    hub: &'a Hub,
}

impl<'a> IoService<'a> {
    /// Rebase this client's I/O namespace — every relative (non-`/`
    /// leading) path passed to this service resolves under it from now
    /// on. Permitted only on a non-hosted deployment; a hosted
    /// deployment confines each client to its identifier-derived
    /// namespace and rejects an override with `NotPermitted`.
    pub fn set_namespace(&self, path: &str) -> HubResult<()> {
        if self.hub.hosted {
            return Err(HubError::NotPermitted);
        }
        hub_types::path::split_segments(path)?;
        *self.hub.namespace.borrow_mut() = path.to_string();
        Ok(())
    }

    fn namespaced(&self, path: &str) -> String {
        hub_types::path::join(&self.hub.namespace.borrow(), path)
    }

    fn resolve(&self, path: &str) -> HubResult<Entry> {
        let path = self.namespaced(path);
        let tree = self.hub.tree.borrow();
        tree.find(&tree.root(), &path, false)?.ok_or(HubError::NotFound)
    }

    pub fn create_input(&self, path: &str, data_type: SampleType, units: impl Into<String>) -> HubResult<()> {
        self.create_io(path, "input", data_type, units.into(), |u| Resource::input(data_type, u))
    }

    pub fn create_output(
        &self,
        path: &str,
        data_type: SampleType,
        units: impl Into<String>,
        mandatory: bool,
    ) -> HubResult<()> {
        self.create_io(path, "output", data_type, units.into(), move |u| Resource::output(data_type, u, mandatory))
    }

    fn create_io(
        &self,
        path: &str,
        kind_name: &'static str,
        data_type: SampleType,
        units: String,
        build: impl FnOnce(String) -> Resource,
    ) -> HubResult<()> {
        let path = self.namespaced(path);
        let now = resolve_timestamp(0.0);
        let tree = self.hub.tree.borrow();
        let entry = tree.get(&tree.root(), &path, now)?;
        drop(tree);

        let existing = entry.with_resource(|r| (r.kind_name(), r.data_type(), r.common.units.clone()));
        match existing {
            None if entry.is_namespace() => {
                entry.set_kind(EntryKind::Resource(build(units)), now);
                info!(path = %path, kind_name, "resource created");
                Ok(())
            }
            Some((kind, dt, existing_units)) if kind == kind_name && dt == Some(data_type) && existing_units == units => {
                Ok(()) // idempotent re-create of the same input/output
            }
            Some(("placeholder", _, _)) => {
                entry.with_resource_mut(|r| {
                    let placeholder = std::mem::replace(r, Resource::placeholder());
                    *r = Resource::promote_from_placeholder(placeholder, build(units).variant);
                });
                self.hub.restore_observation_buffer(&entry, &path);
                info!(path = %path, kind_name, "placeholder promoted to io resource");
                Ok(())
            }
            _ => Err(HubError::Duplicate),
        }
    }

    pub fn delete_resource(&self, path: &str) -> HubResult<()> {
        let entry = self.resolve(path)?;
        let now = resolve_timestamp(0.0);
        self.hub.tree.borrow().delete_io(&entry, now);
        Ok(())
    }

    pub fn push_trigger(&self, path: &str, ts: f64) -> HubResult<()> {
        self.push(path, ts, DataValue::Trigger)
    }
    pub fn push_bool(&self, path: &str, ts: f64, value: bool) -> HubResult<()> {
        self.push(path, ts, DataValue::Bool(value))
    }
    pub fn push_numeric(&self, path: &str, ts: f64, value: f64) -> HubResult<()> {
        self.push(path, ts, DataValue::Numeric(value))
    }
    pub fn push_string(&self, path: &str, ts: f64, value: impl Into<String>) -> HubResult<()> {
        let value: String = value.into();
        if value.len() > hub_types::MAX_PAYLOAD_LEN {
            return Err(HubError::Overflow);
        }
        self.push(path, ts, DataValue::String(value.into()))
    }
    pub fn push_json(&self, path: &str, ts: f64, value: impl Into<String>) -> HubResult<()> {
        let value: String = value.into();
        if value.len() > hub_types::MAX_PAYLOAD_LEN {
            return Err(HubError::Overflow);
        }
        self.push(path, ts, DataValue::Json(value.into()))
    }

    fn push(&self, path: &str, ts: f64, value: DataValue) -> HubResult<()> {
        let entry = self.resolve(path)?;
        push_resolved(self.hub, &entry, resolve_timestamp(ts), value)
    }

    pub fn mark_optional(&self, path: &str) -> HubResult<()> {
        let entry = self.resolve(path)?;
        entry
            .with_resource_mut(|r| match &mut r.variant {
                ResourceVariant::Output(o) => {
                    o.mandatory = false;
                    Ok(())
                }
                _ => Err(HubError::BadParameter("mark_optional only applies to outputs".into())),
            })
            .ok_or(HubError::NotFound)?
    }

    pub fn get_timestamp(&self, path: &str) -> HubResult<f64> {
        let entry = self.resolve(path)?;
        entry
            .with_resource(|r| r.common.effective_value().map(|s| s.timestamp()))
            .flatten()
            .ok_or(HubError::Unavailable)
    }

    pub fn get_bool(&self, path: &str) -> HubResult<bool> {
        self.get_as(path, SampleType::Bool).map(|s| matches!(s.value(), DataValue::Bool(true)))
    }
    pub fn get_numeric(&self, path: &str) -> HubResult<f64> {
        self.get_as(path, SampleType::Numeric).map(|s| match s.value() {
            DataValue::Numeric(n) => *n,
            _ => f64::NAN,
        })
    }
    pub fn get_string(&self, path: &str) -> HubResult<String> {
        self.get_as(path, SampleType::String).map(|s| s.to_printable_string())
    }
    pub fn get_json(&self, path: &str) -> HubResult<String> {
        self.get_as(path, SampleType::Json).map(|s| s.to_json_string())
    }

    fn get_as(&self, path: &str, target: SampleType) -> HubResult<DataSample> {
        let entry = self.resolve(path)?;
        let sample =
            entry.with_resource(|r| r.common.effective_value().cloned()).flatten().ok_or(HubError::Unavailable)?;
        sample.coerce(target)
    }

    pub fn add_push_handler(
        &self,
        path: &str,
        requested_type: SampleType,
        callback: Rc<dyn Fn(&DataSample)>,
    ) -> HubResult<HandlerId> {
        let entry = self.resolve(path)?;
        let replay = entry.with_resource(|r| r.common.effective_value().cloned()).flatten();
        let id = entry
            .with_resource_mut(|r| r.common.handlers.add(requested_type, callback.clone()))
            .ok_or(HubError::NotFound)?;
        if let Some(sample) = replay {
            let converted = sample.coerce(requested_type)?;
            callback(&converted);
        }
        Ok(id)
    }

    pub fn remove_push_handler(&self, path: &str, id: HandlerId) -> HubResult<()> {
        let entry = self.resolve(path)?;
        entry.with_resource_mut(|r| r.common.handlers.remove(id)).ok_or(HubError::NotFound)
    }

    pub fn add_update_handler(&self, callback: Rc<dyn Fn(bool)>) -> UpdateHandlerId {
        self.hub.barrier.borrow_mut().add_handler(callback)
    }

    pub fn remove_update_handler(&self, id: UpdateHandlerId) {
        self.hub.barrier.borrow_mut().remove_handler(id);
    }
}

/// Fields an admin can set on an observation in one call; every field
/// is optional so a config reapply and a one-field admin tweak share
/// the same entry point.
#[derive(Debug, Clone, Default)]
pub struct ObservationConfig {
    pub min_period: Option<f64>,
    pub change_by: Option<f64>,
    pub low_limit: Option<f64>,
    pub high_limit: Option<f64>,
    pub buffer_max: Option<usize>,
    pub backup_period: Option<f64>,
    pub transform: Option<FilterKind>,
    pub extraction: Option<String>,
}

/// Administrative facade: create/delete/reconfigure observations,
/// route sources, and bracket the update barrier.
pub struct AdminService<'a> {
    hub: &'a Hub,
}

impl<'a> AdminService<'a> {
    fn resolve(&self, path: &str) -> HubResult<Entry> {
        let tree = self.hub.tree.borrow();
        tree.find(&tree.root(), path, false)?.ok_or(HubError::NotFound)
    }

    pub fn create_observation(&self, path: &str) -> HubResult<()> {
        let now = resolve_timestamp(0.0);
        let tree = self.hub.tree.borrow();
        let entry = tree.get(&tree.root(), path, now)?;
        drop(tree);

        let kind = entry.with_resource(|r| r.kind_name());
        match kind {
            Some("observation") => Ok(()),
            Some("placeholder") => {
                entry.with_resource_mut(|r| {
                    let placeholder = std::mem::replace(r, Resource::placeholder());
                    *r = Resource::promote_from_placeholder(
                        placeholder,
                        ResourceVariant::Observation(ObservationState::default()),
                    );
                });
                self.hub.restore_observation_buffer(&entry, path);
                Ok(())
            }
            None if entry.is_namespace() => {
                entry.set_kind(EntryKind::Resource(Resource::observation()), now);
                self.hub.restore_observation_buffer(&entry, path);
                info!(path, "observation created");
                Ok(())
            }
            _ => Err(HubError::Duplicate),
        }
    }

    pub fn delete_observation(&self, path: &str) -> HubResult<()> {
        let entry = self.resolve(path)?;
        self.hub.tree.borrow().delete_observation(&entry, resolve_timestamp(0.0));
        Ok(())
    }

    pub fn configure_observation(&self, path: &str, cfg: ObservationConfig) -> HubResult<()> {
        let entry = self.resolve(path)?;
        let extraction = cfg.extraction.as_deref().map(ExtractSpec::parse).transpose()?;
        entry
            .with_resource_mut(|r| {
                let obs = r.as_observation_mut().ok_or_else(|| HubError::BadParameter("not an observation".into()))?;
                if let Some(p) = cfg.min_period {
                    obs.min_period = p;
                }
                if cfg.change_by.is_some() {
                    obs.change_by = cfg.change_by;
                }
                if cfg.low_limit.is_some() {
                    obs.low_limit = cfg.low_limit;
                }
                if cfg.high_limit.is_some() {
                    obs.high_limit = cfg.high_limit;
                }
                if let Some(max) = cfg.buffer_max {
                    obs.buffer.set_capacity(max);
                }
                if let Some(b) = cfg.backup_period {
                    obs.backup_period = b;
                }
                if let Some(t) = cfg.transform {
                    obs.transform = t;
                }
                if let Some(spec) = extraction {
                    obs.extraction = Some(spec);
                }
                Ok(())
            })
            .unwrap_or(Err(HubError::NotFound))
    }

    pub fn set_source(&self, dest_path: &str, source_path: &str) -> HubResult<()> {
        let dest = self.resolve(dest_path)?;
        let source = self.resolve(source_path)?;
        routing::set_source(&dest, &source)
    }

    pub fn set_default(&self, path: &str, sample: DataSample) -> HubResult<()> {
        let tree = self.hub.tree.borrow();
        let entry = tree.get(&tree.root(), path, resolve_timestamp(0.0))?;
        drop(tree);
        entry.with_resource_mut(|r| r.common.default = Some(sample)).ok_or(HubError::NotFound)
    }

    pub fn set_override(&self, path: &str, sample: Option<DataSample>) -> HubResult<()> {
        let entry = self.resolve(path)?;
        entry.with_resource_mut(|r| r.common.override_value = sample).ok_or(HubError::NotFound)
    }

    pub fn set_json_example(&self, path: &str, value: impl Into<String>) -> HubResult<()> {
        let entry = self.resolve(path)?;
        entry
            .with_resource_mut(|r| r.common.json_example = Some(value.into()))
            .ok_or(HubError::NotFound)?;
        entry.mark_json_example_changed();
        entry.mark_modified(resolve_timestamp(0.0));
        Ok(())
    }

    pub fn mark_config_provenance(&self, path: &str, config_provenance: bool) -> HubResult<()> {
        let entry = self.resolve(path)?;
        entry
            .with_resource_mut(|r| r.as_observation_mut().map(|o| o.config_provenance = config_provenance))
            .flatten()
            .ok_or(HubError::NotFound)
    }

    /// Path-shaped destination labels are installed as an implicit
    /// source link on the referenced resource; opaque labels are
    /// stored for [`Hub::dispatch_destination_label`] to look up.
    pub fn set_destination(&self, path: &str, destination: &str) -> HubResult<()> {
        let entry = self.resolve(path)?;
        if destination.starts_with('/') {
            let tree = self.hub.tree.borrow();
            let target = tree.get(&tree.root(), destination, resolve_timestamp(0.0))?;
            drop(tree);
            routing::set_source(&target, &entry)
        } else {
            entry
                .with_resource_mut(|r| r.as_observation_mut().map(|o| o.destination_label = Some(destination.to_string())))
                .flatten()
                .ok_or(HubError::NotFound)
        }
    }

    pub fn start_update(&self) {
        crate::barrier::start_update(self.hub);
    }

    pub fn end_update(&self) {
        crate::barrier::end_update(self.hub);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Min,
    Max,
    Mean,
    StdDev,
}

/// 30 years in seconds — the rule of thumb for telling a
/// relative-from-now `start_time` apart from an absolute epoch one.
const THIRTY_YEARS_SECS: f64 = 30.0 * 365.25 * 24.0 * 3600.0;

pub struct QueryService<'a> {
    hub: &'a Hub,
}

impl<'a> QueryService<'a> {
    fn resolve(&self, path: &str) -> HubResult<Entry> {
        let tree = self.hub.tree.borrow();
        tree.find(&tree.root(), path, false)?.ok_or(HubError::NotFound)
    }

    pub fn get_current(&self, path: &str) -> HubResult<DataSample> {
        let entry = self.resolve(path)?;
        entry.with_resource(|r| r.common.effective_value().cloned()).flatten().ok_or(HubError::Unavailable)
    }

    pub fn get_buffer(&self, path: &str) -> HubResult<Vec<DataSample>> {
        let entry = self.resolve(path)?;
        entry
            .with_resource(|r| r.as_observation().map(|o| o.buffer.iter().cloned().collect()))
            .flatten()
            .ok_or_else(|| HubError::BadParameter("not an observation".into()))
    }

    /// `start_time` under [`THIRTY_YEARS_SECS`] is relative-from-now;
    /// otherwise it is treated as an absolute epoch timestamp.
    pub fn stat(&self, path: &str, kind: Stat, start_time: f64) -> HubResult<f64> {
        let now = resolve_timestamp(0.0);
        let cutoff = if start_time < THIRTY_YEARS_SECS { now - start_time } else { start_time };
        let buffer = self.get_buffer(path)?;
        let values: Vec<f64> = buffer
            .iter()
            .filter(|s| s.timestamp() >= cutoff)
            .filter_map(|s| s.coerce(SampleType::Numeric).ok())
            .filter_map(|s| match s.value() {
                DataValue::Numeric(n) => Some(*n),
                _ => None,
            })
            .collect();
        Ok(match kind {
            Stat::Mean => mean(&values),
            Stat::StdDev => std_dev(&values),
            Stat::Min => values.iter().cloned().fold(f64::NAN, f64::min),
            Stat::Max => values.iter().cloned().fold(f64::NAN, f64::max),
        })
    }

    pub fn set_deletion_tracking(&self, enabled: bool) {
        self.hub.tree.borrow_mut().set_deletion_tracking(enabled);
    }

    pub fn snapshot(
        &self,
        root_path: &str,
        since: f64,
        flags: SnapshotFlags,
        format: Format,
        out: &mut dyn std::io::Write,
    ) -> HubResult<()> {
        let tree = self.hub.tree.borrow();
        let root = tree.find(&tree.root(), root_path, true)?.ok_or(HubError::NotFound)?;
        let deletion_tracking = tree.deletion_tracking();
        drop(tree);
        snapshot::write_snapshot(&root, since, flags, format, deletion_tracking, out)
    }
}

pub struct ConfigService<'a> {
    hub: &'a Hub,
}

impl<'a> ConfigService<'a> {
    pub fn load_file(&self, path: &Path) -> HubResult<()> {
        let doc = hub_config::load_config_file(path)
            .map_err(|e| HubError::BadParameter(format!("{e} (byte {})", e.byte_offset)))?;
        self.apply(&doc)
    }

    pub fn load_str(&self, content: &str) -> HubResult<()> {
        let doc = hub_config::load_config_str(content)
            .map_err(|e| HubError::BadParameter(format!("{e} (byte {})", e.byte_offset)))?;
        self.apply(&doc)
    }

    pub fn apply(&self, doc: &ConfigDocument) -> HubResult<()> {
        crate::config_apply::apply(self.hub, doc)
    }
}
