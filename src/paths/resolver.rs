//! # Path Resolution
//!
//! Decides whether a candidate path is already usable on this host, and if
//! not, relocates it under the current models root.
//!
//! ## Algorithm:
//! 1. **Local check**: an absolute host path that canonicalizes to a strict
//!    descendant of either trusted root is returned as-is (canonical form)
//! 2. **Anchor search**: otherwise the normalized components are scanned from
//!    the end for the last anchor (`models` by default)
//! 3. **Rebase**: the components after that anchor are joined under the
//!    *current* root, never the legacy one
//!
//! The rightmost anchor wins. Earlier matches tend to be coincidental, such
//! as a username or clone directory that happens to contain the anchor word.
//! No anchor means no answer: the resolver never invents a suffix.

use super::normalizer::{canonicalize_lenient, normalize};
use super::{PathError, RootKind, TrustedRoots};
use serde::Serialize;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    /// Absolute path under one of the trusted roots
    pub path: PathBuf,

    /// Root the path was found under, or `Current` for rebased paths
    pub root: RootKind,

    /// True when the candidate was foreign and had to be rebased
    pub rebased: bool,
}

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

/// Resolve `candidate` against `roots`.
///
/// ## Returns:
/// - **Ok(ResolvedPath)**: local path, or the rebased location under the
///   current root (which does not need to exist yet)
/// - **Err(PathError::Unresolvable)**: empty input, no anchor component, or
///   nothing after the anchor
///
/// The result still has to go through [`super::validate`] before it is
/// stored; rebasing alone does not prove containment.
pub fn resolve(candidate: &str, roots: &TrustedRoots) -> Result<ResolvedPath, PathError> {
    if candidate.trim().is_empty() {
        return Err(PathError::unresolvable(candidate, "path is empty"));
    }

    if let Some(local) = local_path(candidate, roots) {
        tracing::trace!(candidate, path = %local.path.display(), root = %local.root, "path already local");
        return Ok(local);
    }

    let normalized = normalize(candidate);
    let anchor_index = normalized.rfind_anchor(roots.anchors()).ok_or_else(|| {
        let mut reason = format!("no '{}' component to rebase on", roots.anchors().join("' or '"));
        if normalized.escapes > 0 {
            reason.push_str(" (path climbs above its starting directory)");
        }
        PathError::unresolvable(candidate, reason)
    })?;

    let suffix = normalized.suffix_after(anchor_index).unwrap_or_default();
    if suffix.is_empty() {
        return Err(PathError::unresolvable(
            candidate,
            "path points at a models root itself, not a model set inside it",
        ));
    }

    let mut rebased = roots.current().to_path_buf();
    rebased.extend(suffix);

    tracing::debug!(
        candidate,
        absolute = normalized.absolute,
        drive = ?normalized.drive,
        anchor = %normalized.components[anchor_index],
        rebased = %rebased.display(),
        "rebased foreign model path"
    );

    Ok(ResolvedPath {
        path: rebased,
        root: RootKind::Current,
        rebased: true,
    })
}

/// The candidate as a path on this host, if it already sits inside a root.
///
/// Both separators are honoured here too, so `<root>/whisper\base` and
/// `<root>\whisper\base` name the same location.
fn local_path(candidate: &str, roots: &TrustedRoots) -> Option<ResolvedPath> {
    let host_path = PathBuf::from(candidate.trim().replace(['/', '\\'], MAIN_SEPARATOR_STR));
    if !host_path.is_absolute() {
        return None;
    }

    // A path we cannot canonicalize is treated as foreign; the validator
    // gets another look at the rebased result.
    let canonical = canonicalize_lenient(&host_path).ok()?;
    let root = roots.containing_root(&canonical)?;

    Some(ResolvedPath {
        path: canonical,
        root,
        rebased: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Trusted roots inside a temp dir: `<tmp>/app/models` and `<tmp>/old/models`.
    fn temp_roots() -> (TempDir, TrustedRoots) {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("app").join("models");
        let legacy = dir.path().join("old").join("models");
        std::fs::create_dir_all(&current).unwrap();
        std::fs::create_dir_all(&legacy).unwrap();
        let roots = TrustedRoots::new(&current, &legacy, &[]).unwrap();
        (dir, roots)
    }

    #[test]
    fn test_rebases_windows_path_onto_current_root() {
        let roots = TrustedRoots::new("/srv/models", "/srv/legacy/models", &[]).unwrap();
        let resolved = resolve(r"C:\Users\x\OtherClone\backend\models\whisper\base", &roots).unwrap();

        assert!(resolved.rebased);
        assert_eq!(resolved.root, RootKind::Current);
        assert_eq!(resolved.path, roots.current().join("whisper").join("base"));
    }

    #[test]
    fn test_local_paths_are_returned_unchanged() {
        let (_dir, roots) = temp_roots();
        let local = roots.current().join("whisper").join("base");
        let candidate = local.to_str().unwrap();

        let first = resolve(candidate, &roots).unwrap();
        let second = resolve(first.path.to_str().unwrap(), &roots).unwrap();

        assert!(!first.rebased);
        assert_eq!(first.path, local);
        assert_eq!(second, first);
    }

    #[test]
    fn test_legacy_local_path_stays_under_legacy() {
        let (_dir, roots) = temp_roots();
        let local = roots.legacy().join("pyannote").join("segmentation");

        let resolved = resolve(local.to_str().unwrap(), &roots).unwrap();
        assert_eq!(resolved.root, RootKind::Legacy);
        assert_eq!(resolved.path, local);
    }

    #[test]
    fn test_foreign_legacy_layout_rebases_to_current() {
        let (_dir, roots) = temp_roots();
        let resolved = resolve("/home/someone/old/models/pyannote/segmentation", &roots).unwrap();

        assert_eq!(resolved.root, RootKind::Current);
        assert_eq!(resolved.path, roots.current().join("pyannote").join("segmentation"));
    }

    #[test]
    fn test_rightmost_anchor_wins() {
        let roots = TrustedRoots::new("/srv/models", "/srv/legacy/models", &[]).unwrap();
        let resolved = resolve("/home/models/work/backend/models/whisper/small", &roots).unwrap();
        assert_eq!(resolved.path, roots.current().join("whisper").join("small"));
    }

    #[test]
    fn test_unanchored_candidate_is_unresolvable() {
        let (_dir, roots) = temp_roots();
        let err = resolve(r"D:\weights\whisper\base", &roots).unwrap_err();
        assert!(matches!(err, PathError::Unresolvable { .. }));

        let err = resolve("", &roots).unwrap_err();
        assert!(matches!(err, PathError::Unresolvable { .. }));
    }

    #[test]
    fn test_anchor_without_suffix_is_unresolvable() {
        let (_dir, roots) = temp_roots();
        let err = resolve(r"E:\clone\backend\models\", &roots).unwrap_err();
        assert!(matches!(err, PathError::Unresolvable { .. }));
    }

    #[test]
    fn test_escaping_candidate_does_not_resolve() {
        let (_dir, roots) = temp_roots();
        let escaping = format!("{}/../../etc/passwd", roots.current().display());
        assert!(resolve(&escaping, &roots).is_err());
    }

    #[test]
    fn test_backslash_spellings_name_the_same_local_path() {
        let (_dir, roots) = temp_roots();
        let expected = roots.current().join("whisper").join("base");
        let current = roots.current().display().to_string();

        for candidate in [format!(r"{}/whisper\base", current), format!(r"{}\whisper\base", current)] {
            let resolved = resolve(&candidate, &roots).unwrap();
            assert_eq!(resolved.path, expected, "{}", candidate);
            assert_eq!(resolved.root, RootKind::Current);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_behind_missing_directory_is_not_local() {
        let (dir, roots) = temp_roots();
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, roots.current().join("sneaky")).unwrap();

        let detour = format!("{}/nope/../sneaky/model", roots.current().display());
        let resolved = resolve(&detour, &roots).unwrap();
        assert!(resolved.rebased);
        assert!(crate::paths::validate(&resolved.path, &roots).is_err());
    }
}
