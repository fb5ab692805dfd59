use thiserror::Error;

/// The uniform error taxonomy used across every Data Hub facade.
///
/// Every client-facing operation (I/O, Admin, Query, Config) returns
/// `Result<T, HubError>`. There is no explicit "Ok" member — success is
/// `Result::Ok`, not a variant of this enum, unlike the C original's
/// integer status codes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HubError {
    /// No entry exists at the given path.
    #[error("not found")]
    NotFound,
    /// The entry exists but holds no value yet (no current, no default).
    #[error("unavailable")]
    Unavailable,
    /// Conflicting definition at a path, or the change would create a
    /// routing cycle.
    #[error("duplicate")]
    Duplicate,
    /// Malformed path, wrong type, invalid JSON, or a unit mismatch.
    #[error("bad parameter: {0}")]
    BadParameter(String),
    /// Allocation failed; the pushed sample was dropped, prior value kept.
    #[error("no memory")]
    NoMemory,
    /// The caller-supplied buffer was too small for the result.
    #[error("overflow")]
    Overflow,
    /// The target resource is behind an active update barrier.
    #[error("in progress")]
    InProgress,
    /// Namespace reassignment attempted on a hosted build.
    #[error("not permitted")]
    NotPermitted,
    /// A typed getter was called against a resource of a different type.
    #[error("format error")]
    FormatError,
    /// Unclassified internal failure.
    #[error("fault: {0}")]
    Fault(String),
}

pub type HubResult<T> = Result<T, HubError>;
