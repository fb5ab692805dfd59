//! Push-handler registration: ordered, typed callbacks invoked on
//! acceptance, plus the update-barrier start/end callback list.

use std::collections::VecDeque;
use std::rc::Rc;

use hub_types::{DataSample, HubError, SampleType};

pub type HandlerId = u64;

struct Handler {
    id: HandlerId,
    requested_type: SampleType,
    callback: Rc<dyn Fn(&DataSample)>,
}

/// Callbacks registered on a single resource, invoked synchronously in
/// registration order on every accepted push.
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: HandlerId,
    handlers: Vec<Handler>,
}

impl HandlerRegistry {
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn add(&mut self, requested_type: SampleType, callback: Rc<dyn Fn(&DataSample)>) -> HandlerId {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.push(Handler { id, requested_type, callback });
        id
    }

    pub fn remove(&mut self, id: HandlerId) {
        self.handlers.retain(|h| h.id != id);
    }

    /// Dispatch `sample` to every handler whose requested type matches
    /// the sample's native type, or who asked for the two "universal"
    /// encodings (string, JSON) that any type can be coerced into. A
    /// trigger sample carries no type of its own to mismatch against, so
    /// it dispatches to every registered handler, coerced to whatever
    /// type each one asked for.
    pub fn dispatch(&self, sample: &DataSample) -> Result<(), HubError> {
        for handler in &self.handlers {
            if sample.sample_type() == SampleType::Trigger
                || handler.requested_type == sample.sample_type()
                || handler.requested_type == SampleType::String
                || handler.requested_type == SampleType::Json
            {
                let converted = sample.coerce(handler.requested_type)?;
                (handler.callback)(&converted);
            }
        }
        Ok(())
    }
}

/// A fixed-capacity FIFO of accepted samples, oldest evicted first.
/// Capacity 0 disables retention without disabling delivery.
#[derive(Default)]
pub struct SampleBuffer {
    capacity: usize,
    samples: VecDeque<DataSample>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        SampleBuffer { capacity, samples: VecDeque::new() }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, sample: DataSample) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
