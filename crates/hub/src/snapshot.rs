//! Snapshot/delta engine: streams an encoded view of a subtree,
//! including only entries that are new, modified since a timestamp,
//! or tombstoned, and manages the tombstone flush/flag-clear that
//! follows a successful scan.

use std::io::Write;

use hub_types::HubError;
use serde_json::{json, Value};

use crate::entry::Entry;

/// `since == BEGINNING_OF_TIME` requests a full dump rather than a
/// delta.
pub const BEGINNING_OF_TIME: f64 = 0.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotFlags {
    pub flush_deletions_after: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Octave,
    /// Reserved for an externally-defined encoding; the core does not
    /// own this format.
    Custom,
}

/// Write an encoded view of the subtree rooted at `root` to `out`,
/// including only entries whose relevance test passes (new since last
/// scan, modified after `since`, or a tombstone when deletion tracking
/// is on). Clears the "new"/"json-example-changed" flags on every
/// entry the scan visited, and — if requested — flushes tombstones
/// afterward.
pub fn write_snapshot(
    root: &Entry,
    since: f64,
    flags: SnapshotFlags,
    format: Format,
    deletion_tracking: bool,
    out: &mut dyn Write,
) -> Result<(), HubError> {
    let tree = collect(root, since, deletion_tracking);
    match format {
        Format::Json => {
            let value = tree.unwrap_or_else(|| json!({}));
            let text = serde_json::to_string(&value)
                .map_err(|e| HubError::Fault(format!("snapshot encode failed: {e}")))?;
            out.write_all(text.as_bytes()).map_err(|e| HubError::Fault(e.to_string()))?;
        }
        Format::Octave => {
            let mut text = String::new();
            write_octave(root, "", &mut text);
            out.write_all(text.as_bytes()).map_err(|e| HubError::Fault(e.to_string()))?;
        }
        Format::Custom => {
            return Err(HubError::BadParameter("custom snapshot formats are an external collaborator".into()));
        }
    }

    clear_flags(root);
    if flags.flush_deletions_after {
        crate::entry::flush_tombstones(root);
    }
    Ok(())
}

fn is_relevant(entry: &Entry, since: f64, deletion_tracking: bool) -> bool {
    let state = entry.snapshot_state();
    state.new || state.last_modified > since || (deletion_tracking && state.deleted)
}

fn collect(entry: &Entry, since: f64, deletion_tracking: bool) -> Option<Value> {
    let self_relevant = is_relevant(entry, since, deletion_tracking);
    let state = entry.snapshot_state();

    if state.deleted {
        return self_relevant.then(|| json!({"deleted": true}));
    }

    let mut children_obj = serde_json::Map::new();
    for child in entry.children(deletion_tracking) {
        if let Some(v) = collect(&child, since, deletion_tracking) {
            children_obj.insert(child.name(), v);
        }
    }
    let any_descendant_relevant = !children_obj.is_empty();

    if !self_relevant && !any_descendant_relevant {
        return None;
    }

    let mut obj = entry
        .with_resource(|r| {
            let mut obj = json!({
                "kind": r.kind_name(),
                "units": r.common.units,
                "value": r.common.effective_value().map(|s| {
                    serde_json::from_str::<Value>(&s.to_json_string()).unwrap_or(Value::Null)
                }),
            });
            if let Some(example) = &r.common.json_example {
                obj["json_example"] = serde_json::from_str::<Value>(example).unwrap_or(Value::Null);
            }
            obj
        })
        .unwrap_or_else(|| json!({"kind": "namespace"}));

    if !children_obj.is_empty() {
        obj["children"] = Value::Object(children_obj);
    }
    Some(obj)
}

fn write_octave(entry: &Entry, prefix: &str, out: &mut String) {
    if entry.is_deleted() {
        return;
    }
    if let Some(line) = entry.with_resource(|r| {
        r.common.effective_value().map(|s| format!("{prefix} = {};\n", s.to_printable_string()))
    }).flatten() {
        out.push_str(&line);
    }
    for child in entry.children(false) {
        let child_prefix = if prefix.is_empty() { child.name() } else { format!("{prefix}.{}", child.name()) };
        write_octave(&child, &child_prefix, out);
    }
}

fn clear_flags(entry: &Entry) {
    entry.clear_new_flags();
    for child in entry.children(true) {
        clear_flags(&child);
    }
}
