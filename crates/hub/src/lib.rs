//! # Hub
//!
//! An in-process data hub: a single-threaded broker that routes
//! timestamped telemetry between producers and consumers, with
//! filtering, buffering, transformation, and administrative overrides.
//!
//! Every core operation runs to completion before the next one starts
//! — there is one cooperative event loop, so the tree is `Rc`/`RefCell`
//! throughout rather than `Arc`/`Mutex`. Source links are the one place
//! a back-reference is needed without keeping the referent alive, so
//! those use `Weak`.
//!
//! ## Pipeline
//!
//! A push flows **barrier check → namespace/placeholder drop → type
//! coercion or observation filter chain → transform → accept → handler
//! dispatch → backup → destination routing → downstream propagation**:
//!
//! 1. [`entry`] — the resource tree: named entries, path resolution,
//!    tombstone lifecycle.
//! 2. [`resource`] — the Resource body: Input, Output, Observation, and
//!    Placeholder variants over a shared common core.
//! 3. [`handler`] — push-handler registration and the circular sample
//!    buffer.
//! 4. [`push`] — the push pipeline itself.
//! 5. [`routing`] — source-link assignment with cycle rejection.
//! 6. [`barrier`] — the update barrier that collapses pending pushes
//!    during a batch of admin mutations.
//! 7. [`snapshot`] — the snapshot/delta encoder.
//! 8. [`config_apply`] — applying a parsed configuration document.
//! 9. [`hub`] — the `Hub` context and its four facades: [`hub::IoService`],
//!    [`hub::AdminService`], [`hub::QueryService`], [`hub::ConfigService`].

pub mod barrier;
pub mod config_apply;
pub mod entry;
pub mod handler;
pub mod hub;
pub mod push;
pub mod resource;
pub mod routing;
pub mod snapshot;

pub use hub::{AdminService, ConfigService, DestinationCallback, Hub, IoService, ObservationConfig, QueryService, Stat};
pub use hub_types::{DataSample, DataValue, HubError, HubResult, SampleType};
pub use snapshot::{Format, SnapshotFlags, BEGINNING_OF_TIME};

#[cfg(test)]
mod scenario_tests;

#[cfg(test)]
mod property_tests;
