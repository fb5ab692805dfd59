//! Path rules shared by every resource-tree operation.
//!
//! A path is a sequence of non-empty segments separated by `/`. Segments
//! may not contain `.`, `[`, or `]` (those are reserved for JSON
//! extraction specs, which are parsed separately; see [`crate::extract`]).
//! A path beginning with `/` is absolute; otherwise it is resolved
//! relative to whatever base the caller's facade operates against (root,
//! an observation namespace, or a client app namespace).

use crate::error::HubError;

/// Maximum length, in bytes, of a single path segment.
pub const MAX_SEGMENT_LEN: usize = 32;

/// Maximum length, in bytes, of a fully-resolved path.
pub const MAX_PATH_LEN: usize = 512;

const FORBIDDEN: [char; 3] = ['.', '[', ']'];

/// Split a path into its segments, validating each one.
///
/// Returns [`HubError::BadParameter`] if any segment is empty, too long,
/// contains a forbidden character, or if the whole path exceeds
/// [`MAX_PATH_LEN`].
pub fn split_segments(path: &str) -> Result<Vec<&str>, HubError> {
    if path.len() > MAX_PATH_LEN {
        return Err(HubError::BadParameter(format!(
            "path exceeds {MAX_PATH_LEN} bytes"
        )));
    }
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        validate_segment(segment)?;
        segments.push(segment);
    }
    Ok(segments)
}

/// Validate a single path segment in isolation.
pub fn validate_segment(segment: &str) -> Result<(), HubError> {
    if segment.is_empty() {
        return Err(HubError::BadParameter("empty path segment".into()));
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(HubError::BadParameter(format!(
            "segment '{segment}' exceeds {MAX_SEGMENT_LEN} bytes"
        )));
    }
    if segment.chars().any(|c| FORBIDDEN.contains(&c)) {
        return Err(HubError::BadParameter(format!(
            "segment '{segment}' contains a forbidden character"
        )));
    }
    Ok(())
}

/// Whether `path` is rooted (begins with `/`).
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Join a base path and a relative path into one normalized path string.
pub fn join(base: &str, relative: &str) -> String {
    if is_absolute(relative) {
        return relative.to_string();
    }
    if base.is_empty() || base == "/" {
        return format!("/{relative}");
    }
    format!("{}/{}", base.trim_end_matches('/'), relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_absolute_path() {
        assert_eq!(split_segments("/app/a/temp").unwrap(), vec!["app", "a", "temp"]);
    }

    #[test]
    fn splits_relative_path() {
        assert_eq!(split_segments("a/temp").unwrap(), vec!["a", "temp"]);
    }

    #[test]
    fn root_is_empty_segments() {
        assert_eq!(split_segments("/").unwrap(), Vec::<&str>::new());
        assert_eq!(split_segments("").unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn rejects_forbidden_characters() {
        assert!(split_segments("/app/a.b").is_err());
        assert!(split_segments("/app/a[0]").is_err());
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(split_segments("/app//temp").is_err());
    }

    #[test]
    fn rejects_oversized_segment() {
        let long = "x".repeat(MAX_SEGMENT_LEN + 1);
        assert!(split_segments(&format!("/{long}")).is_err());
    }

    #[test]
    fn join_handles_absolute_relative() {
        assert_eq!(join("/app", "/x/y"), "/x/y");
        assert_eq!(join("/app", "sub"), "/app/sub");
        assert_eq!(join("/", "sub"), "/sub");
    }
}
