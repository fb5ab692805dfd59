//! # Hub Types
//!
//! Core value types for the data hub: the tagged, reference-counted
//! [`DataSample`], the 5x5 type-coercion matrix, JSON sub-extraction, path
//! rules, and the uniform [`HubError`] taxonomy returned by every facade
//! in the `hub` crate.
//!
//! This crate has no tree, no I/O, and no notion of a resource — it is
//! the pure value layer the rest of the hub is built on.

pub mod error;
pub mod extract;
pub mod path;
pub mod sample;

pub use error::{HubError, HubResult};
pub use extract::ExtractSpec;
pub use sample::{DataSample, DataValue, SampleType, MAX_PAYLOAD_LEN};
