//! # Types Security
//!
//! ## Security Invariants
//!
//! - Volume paths never climb out of their configured location
//! - A volume is configured at most once

use crate::domain::errors::ConfigError;
use std::collections::HashSet;
use std::path::{Component, Path};

/// Validate a configured volume path.
pub fn validate_volume_path(path: &Path) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidVolumePath {
        path: path.display().to_string(),
        reason,
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(invalid("path contains '..'"));
    }
    Ok(())
}

/// Reject the same path appearing twice across all tiers.
pub fn validate_unique_paths<'a>(
    paths: impl IntoIterator<Item = &'a Path>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for path in paths {
        if !seen.insert(path) {
            return Err(ConfigError::InvalidVolumePath {
                path: path.display().to_string(),
                reason: "path configured more than once",
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_volume_path() {
        assert!(validate_volume_path(Path::new("/mnt/hot1")).is_ok());
        assert!(validate_volume_path(Path::new("")).is_err());
        assert!(validate_volume_path(Path::new("/mnt/../etc")).is_err());
    }

    #[test]
    fn test_validate_unique_paths() {
        let a = Path::new("/mnt/a");
        let b = Path::new("/mnt/b");
        assert!(validate_unique_paths([a, b]).is_ok());
        assert!(validate_unique_paths([a, b, a]).is_err());
    }
}
