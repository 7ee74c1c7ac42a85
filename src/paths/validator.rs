//! Containment check for resolved model paths.
//!
//! This is the last check before a path is persisted or handed out. It is
//! deliberately independent from the resolver so that paths which needed no
//! rebasing are still checked.

use super::normalizer::canonicalize_lenient;
use super::{PathError, RootKind, TrustedRoots};
use std::path::Path;

/// Confirm that `path` is a strict descendant of a trusted root.
///
/// ## Rules:
/// - the path must be absolute
/// - symlinks in existing prefixes are resolved and `..` is folded first
/// - containment is a component-wise prefix match, so `/srv/models2` is not
///   inside `/srv/models`
/// - a root itself is rejected; model sets live *inside* a root
///
/// Returns the root that contains the path. Nothing is logged here; callers
/// that refuse a write report the rejection themselves.
pub fn validate(path: &Path, roots: &TrustedRoots) -> Result<RootKind, PathError> {
    if !path.is_absolute() {
        return Err(PathError::invalid(path, "path is not absolute"));
    }

    let canonical = canonicalize_lenient(path)
        .map_err(|e| PathError::invalid(path, format!("cannot canonicalize: {}", e)))?;

    match roots.containing_root(&canonical) {
        Some(kind) => Ok(kind),
        None => {
            let reason = if roots.iter().any(|(_, root)| canonical == root) {
                "a trusted root itself cannot hold a model set".to_string()
            } else {
                format!(
                    "resolves to '{}', outside '{}' and '{}'",
                    canonical.display(),
                    roots.current().display(),
                    roots.legacy().display()
                )
            };
            Err(PathError::invalid(path, reason))
        }
    }
}
