//! Source-link routing: single upstream per resource, cycle rejection
//! by walking the proposed source's own chain back toward the
//! destination before installing the link.

use hub_types::HubError;
use tracing::warn;

use crate::entry::Entry;

fn upstream_of(entry: &Entry) -> Option<Entry> {
    entry.with_resource(|r| r.common.source.clone()).flatten().and_then(|w| Entry::from_weak(&w))
}

fn would_create_cycle(source: &Entry, dest: &Entry) -> bool {
    let mut cur = Some(source.clone());
    while let Some(node) = cur {
        if node.ptr_eq(dest) {
            return true;
        }
        cur = upstream_of(&node);
    }
    false
}

/// Install `source` as `dest`'s upstream. Rejects with
/// [`HubError::Duplicate`] if doing so would create a routing cycle,
/// leaving `dest`'s existing source (if any) unchanged.
pub fn set_source(dest: &Entry, source: &Entry) -> Result<(), HubError> {
    if dest.ptr_eq(source) || would_create_cycle(source, dest) {
        warn!(dest = %dest.full_path(), source = %source.full_path(), "rejected source assignment: would create a cycle");
        return Err(HubError::Duplicate);
    }

    if let Some(old_source) = upstream_of(dest) {
        old_source.with_resource_mut(|r| {
            r.common.downstream.retain(|w| Entry::from_weak(w).map(|e| !e.ptr_eq(dest)).unwrap_or(false));
        });
    }

    dest.with_resource_mut(|r| r.common.source = Some(source.downgrade()));
    source.with_resource_mut(|r| r.common.downstream.push(dest.downgrade()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ResourceTree;
    use crate::resource::Resource;
    use hub_types::SampleType;

    fn make_observation(tree: &ResourceTree, path: &str) -> Entry {
        let e = tree.get(&tree.root(), path, 0.0).expect("get");
        e.set_kind(crate::entry::EntryKind::Resource(Resource::observation()), 0.0);
        e
    }

    fn make_input(tree: &ResourceTree, path: &str) -> Entry {
        let e = tree.get(&tree.root(), path, 0.0).expect("get");
        e.set_kind(crate::entry::EntryKind::Resource(Resource::input(SampleType::Numeric, String::new())), 0.0);
        e
    }

    #[test]
    fn rejects_three_node_cycle() {
        let tree = ResourceTree::new(0.0);
        let a = make_input(&tree, "/a");
        let b = make_observation(&tree, "/b");
        let c = make_observation(&tree, "/c");

        set_source(&b, &a).expect("b<-a");
        set_source(&c, &b).expect("c<-b");
        let err = set_source(&a, &c).unwrap_err();
        assert_eq!(err, HubError::Duplicate);
    }

    #[test]
    fn rejects_self_source() {
        let tree = ResourceTree::new(0.0);
        let a = make_observation(&tree, "/a");
        assert_eq!(set_source(&a, &a).unwrap_err(), HubError::Duplicate);
    }

    #[test]
    fn replacing_source_detaches_from_old_upstream() {
        let tree = ResourceTree::new(0.0);
        let a = make_input(&tree, "/a");
        let b = make_input(&tree, "/b");
        let obs = make_observation(&tree, "/obs");

        set_source(&obs, &a).expect("obs<-a");
        set_source(&obs, &b).expect("obs<-b");

        let a_downstream = a.with_resource(|r| r.common.downstream.len()).unwrap();
        assert_eq!(a_downstream, 0);
    }
}
