//! The update barrier: a two-call protocol bracketing admin mutations.
//! While active, pushes to affected resources collapse to the single
//! latest pending sample instead of flowing through the pipeline; the
//! collapsed samples flush in tree-discovery order on `end_update`.

use std::rc::Rc;

use tracing::info;

use crate::entry::Entry;
use crate::push::push_resolved;
use crate::Hub;

pub type UpdateHandlerId = u64;

#[derive(Default)]
pub struct BarrierState {
    active: bool,
    next_handler_id: UpdateHandlerId,
    handlers: Vec<(UpdateHandlerId, Rc<dyn Fn(bool)>)>,
}

impl BarrierState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn add_handler(&mut self, callback: Rc<dyn Fn(bool)>) -> UpdateHandlerId {
        let id = self.next_handler_id;
        self.next_handler_id += 1;
        self.handlers.push((id, callback));
        id
    }

    pub fn remove_handler(&mut self, id: UpdateHandlerId) {
        self.handlers.retain(|(h, _)| *h != id);
    }

    fn notify(&self, starting: bool) {
        for (_, cb) in &self.handlers {
            cb(starting);
        }
    }
}

pub fn start_update(hub: &Hub) {
    hub.barrier.borrow_mut().active = true;
    hub.barrier.borrow().notify(true);
    info!("update barrier started");
}

pub fn end_update(hub: &Hub) {
    hub.barrier.borrow_mut().active = false;
    flush_pending(hub, &hub.tree.borrow().root());
    hub.barrier.borrow().notify(false);
    info!("update barrier ended");
}

fn flush_pending(hub: &Hub, entry: &Entry) {
    let pending = entry.with_resource_mut(|r| r.common.pending.take()).flatten();
    if let Some(sample) = pending {
        let _ = push_resolved(hub, entry, sample.timestamp(), sample.value().clone());
    }
    for child in entry.children(false) {
        flush_pending(hub, &child);
    }
}
