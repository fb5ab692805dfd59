//! The resource tree: named entries forming an ownership hierarchy,
//! path resolution, and tombstone lifecycle.
//!
//! Entries are reference-counted (`Rc`) rather than `Arc` — the whole
//! hub runs on one cooperative event loop (see the crate root), so
//! there is never a second thread that could race a mutation against a
//! drop. Source links are the one place a back-reference is needed
//! without keeping the referent alive, so those use `Weak`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use hub_types::path::{self, MAX_SEGMENT_LEN};
use hub_types::HubError;

use crate::resource::Resource;

/// Bookkeeping the snapshot/delta engine uses to decide whether an
/// entry belongs in a given scan, independent of which resource kind
/// (or namespace) the entry currently holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotState {
    pub new: bool,
    pub last_modified: f64,
    pub deleted: bool,
    pub json_example_changed: bool,
}

impl SnapshotState {
    fn fresh(now: f64) -> Self {
        SnapshotState { new: true, last_modified: now, deleted: false, json_example_changed: false }
    }
}

/// The closed set of kinds an entry can hold. A `Namespace` carries no
/// resource body at all; only a resource variant does.
pub enum EntryKind {
    Namespace,
    Resource(Resource),
}

pub struct EntryData {
    pub name: String,
    pub parent: Option<Weak<RefCell<EntryData>>>,
    pub children: IndexMap<String, Entry>,
    pub kind: EntryKind,
    pub snapshot: SnapshotState,
}

/// A handle to one tree node. Cloning an `Entry` bumps the `Rc`
/// refcount; the node is dropped once the tree and every outstanding
/// handle (including weak source links that have upgraded) release it.
#[derive(Clone)]
pub struct Entry(Rc<RefCell<EntryData>>);

impl Entry {
    fn new(name: String, parent: Option<&Entry>, now: f64) -> Self {
        Entry(Rc::new(RefCell::new(EntryData {
            name,
            parent: parent.map(|p| Rc::downgrade(&p.0)),
            children: IndexMap::new(),
            kind: EntryKind::Namespace,
            snapshot: SnapshotState::fresh(now),
        })))
    }

    pub fn downgrade(&self) -> Weak<RefCell<EntryData>> {
        Rc::downgrade(&self.0)
    }

    pub fn from_weak(weak: &Weak<RefCell<EntryData>>) -> Option<Entry> {
        weak.upgrade().map(Entry)
    }

    pub fn ptr_eq(&self, other: &Entry) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn parent(&self) -> Option<Entry> {
        self.0.borrow().parent.as_ref().and_then(Entry::from_weak)
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.0.borrow().kind, EntryKind::Namespace)
    }

    pub fn is_deleted(&self) -> bool {
        self.0.borrow().snapshot.deleted
    }

    pub fn snapshot_state(&self) -> SnapshotState {
        self.0.borrow().snapshot
    }

    pub fn mark_modified(&self, now: f64) {
        let mut data = self.0.borrow_mut();
        data.snapshot.last_modified = now;
    }

    pub fn clear_new_flags(&self) {
        let mut data = self.0.borrow_mut();
        data.snapshot.new = false;
        data.snapshot.json_example_changed = false;
    }

    pub fn mark_json_example_changed(&self) {
        self.0.borrow_mut().snapshot.json_example_changed = true;
    }

    pub fn with_resource<R>(&self, f: impl FnOnce(&Resource) -> R) -> Option<R> {
        match &self.0.borrow().kind {
            EntryKind::Resource(r) => Some(f(r)),
            EntryKind::Namespace => None,
        }
    }

    pub fn with_resource_mut<R>(&self, f: impl FnOnce(&mut Resource) -> R) -> Option<R> {
        match &mut self.0.borrow_mut().kind {
            EntryKind::Resource(r) => Some(f(r)),
            EntryKind::Namespace => None,
        }
    }

    pub fn set_kind(&self, kind: EntryKind, now: f64) {
        let mut data = self.0.borrow_mut();
        data.kind = kind;
        data.snapshot.last_modified = now;
    }

    pub fn child(&self, name: &str, include_tombstones: bool) -> Option<Entry> {
        let data = self.0.borrow();
        data.children.get(name).filter(|c| include_tombstones || !c.is_deleted()).cloned()
    }

    pub fn children(&self, include_tombstones: bool) -> Vec<Entry> {
        self.0
            .borrow()
            .children
            .values()
            .filter(|c| include_tombstones || !c.is_deleted())
            .cloned()
            .collect()
    }

    /// Full absolute path from the tree root, not including the root's
    /// own (empty) name.
    pub fn full_path(&self) -> String {
        let mut segments = Vec::new();
        let mut cur = self.clone();
        while let Some(parent) = cur.parent() {
            segments.push(cur.name());
            cur = parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    fn insert_child(&self, name: String, now: f64) -> Entry {
        let child = Entry::new(name.clone(), Some(self), now);
        self.0.borrow_mut().children.insert(name, child.clone());
        child
    }

    pub(crate) fn remove_child(&self, name: &str) {
        self.0.borrow_mut().children.shift_remove(name);
    }
}

/// Owns the tree root and the deletion-tracking toggle; every path
/// operation goes through here.
pub struct ResourceTree {
    root: Entry,
    deletion_tracking: bool,
}

impl ResourceTree {
    pub fn new(now: f64) -> Self {
        ResourceTree { root: Entry::new(String::new(), None, now), deletion_tracking: false }
    }

    pub fn root(&self) -> Entry {
        self.root.clone()
    }

    pub fn deletion_tracking(&self) -> bool {
        self.deletion_tracking
    }

    /// Toggling deletion tracking off flushes every accumulated
    /// tombstone immediately.
    pub fn set_deletion_tracking(&mut self, enabled: bool) {
        if self.deletion_tracking && !enabled {
            flush_tombstones(&self.root);
        }
        self.deletion_tracking = enabled;
    }

    /// Resolve `path` (relative to `base`), returning `None` if any
    /// segment is missing. Tombstoned leaves are excluded unless
    /// `include_tombstones` is set.
    pub fn find(&self, base: &Entry, path: &str, include_tombstones: bool) -> Result<Option<Entry>, HubError> {
        let segments = path::split_segments(path)?;
        let start = if path::is_absolute(path) { self.root.clone() } else { base.clone() };
        let mut cur = start;
        for (idx, seg) in segments.iter().enumerate() {
            let last = idx + 1 == segments.len();
            match cur.child(seg, include_tombstones || !last) {
                Some(next) => cur = next,
                None => return Ok(None),
            }
        }
        Ok(Some(cur))
    }

    /// Resolve `path`, creating intermediate namespace entries (and
    /// reviving tombstoned ones) as needed.
    pub fn get(&self, base: &Entry, path: &str, now: f64) -> Result<Entry, HubError> {
        if path::is_absolute(path) && path.len() > hub_types::path::MAX_PATH_LEN {
            return Err(HubError::BadParameter("path too long".into()));
        }
        let segments = path::split_segments(path)?;
        let start = if path::is_absolute(path) { self.root.clone() } else { base.clone() };
        let mut cur = start;
        for seg in segments {
            if seg.len() > MAX_SEGMENT_LEN {
                return Err(HubError::BadParameter(format!("segment '{seg}' too long")));
            }
            cur = match cur.child(seg, true) {
                Some(existing) => {
                    if existing.is_deleted() {
                        existing.0.borrow_mut().snapshot = SnapshotState::fresh(now);
                    }
                    existing
                }
                None => cur.insert_child(seg.to_string(), now),
            };
        }
        Ok(cur)
    }

    /// Path of `entry` relative to `base`, or `None` if `entry` is not
    /// a descendant of `base`.
    pub fn relative_path(&self, entry: &Entry, base: &Entry) -> Option<String> {
        let mut segments = Vec::new();
        let mut cur = entry.clone();
        loop {
            if cur.ptr_eq(base) {
                segments.reverse();
                return Some(segments.join("/"));
            }
            match cur.parent() {
                Some(parent) => {
                    segments.push(cur.name());
                    cur = parent;
                }
                None => return None,
            }
        }
    }

    /// Delete an Input/Output. Downgrades to a Placeholder if the
    /// resource carries admin settings worth preserving (a source
    /// link, default, override, or handlers); otherwise tombstones
    /// outright.
    pub fn delete_io(&self, entry: &Entry, now: f64) {
        let keep_as_placeholder = entry
            .with_resource(|r| r.common.source.is_some() || r.common.default.is_some() || r.common.override_value.is_some() || !r.common.handlers.is_empty())
            .unwrap_or(false);

        if keep_as_placeholder {
            entry.with_resource_mut(|r| r.demote_to_placeholder());
            entry.mark_modified(now);
        } else {
            self.tombstone(entry, now);
        }
    }

    /// Delete an Observation: tombstoned immediately, no placeholder
    /// survives an observation.
    pub fn delete_observation(&self, entry: &Entry, now: f64) {
        self.tombstone(entry, now);
    }

    fn tombstone(&self, entry: &Entry, now: f64) {
        entry.set_kind(EntryKind::Namespace, now);
        let mut data = entry.0.borrow_mut();
        data.snapshot.deleted = true;
        data.snapshot.last_modified = now;
        drop(data);
        if !self.deletion_tracking
            && let Some(parent) = entry.parent() {
                parent.remove_child(&entry.name());
            }
    }
}

pub(crate) fn flush_tombstones(entry: &Entry) {
    let deleted_names: Vec<String> =
        entry.children(true).into_iter().filter(|c| c.is_deleted()).map(|c| c.name()).collect();
    for name in deleted_names {
        entry.remove_child(&name);
    }
    for child in entry.children(false) {
        flush_tombstones(&child);
    }
}
