//! # Path Normalization
//!
//! Turns an untrusted path string into an ordered list of components that can
//! be compared without caring which machine wrote it. Both `/` and `\` count
//! as separators on every host, drive letters and UNC markers are stripped,
//! and `.`/`..` segments are folded lexically.
//!
//! Nothing in [`normalize`] touches the filesystem. [`canonicalize_lenient`]
//! is the one helper here that does, and it only reads metadata.

use std::io;
use std::path::{Component, Path, PathBuf};

/// A candidate path broken into comparable components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    /// Started with a separator or a drive prefix
    pub absolute: bool,

    /// Drive letter if the candidate carried one (`C:` → `'C'`)
    pub drive: Option<char>,

    /// Path segments with `.` removed and `..` folded
    pub components: Vec<String>,

    /// Number of `..` segments that climbed above the first component
    pub escapes: usize,
}

impl NormalizedPath {
    /// Index of the rightmost component matching any of `anchors`.
    ///
    /// Matching is ASCII case-insensitive: paths coming from Windows hosts
    /// routinely differ only in case (`Models` vs `models`).
    pub fn rfind_anchor<S: AsRef<str>>(&self, anchors: &[S]) -> Option<usize> {
        self.components.iter().rposition(|component| {
            anchors
                .iter()
                .any(|anchor| component.eq_ignore_ascii_case(anchor.as_ref()))
        })
    }

    /// Components after `index`, or `None` when `index` is out of range.
    pub fn suffix_after(&self, index: usize) -> Option<&[String]> {
        self.components.get(index + 1..)
    }
}

/// Split a candidate path into components regardless of host conventions.
///
/// ## Rules:
/// - `/` and `\` are both separators; runs of them collapse
/// - `\\?\` and `\\.\` verbatim/device markers are dropped
/// - a leading `X:` drive prefix is recorded then dropped
/// - `.` is skipped, `..` pops the previous component
/// - `..` with nothing left to pop is counted in `escapes`
pub fn normalize(candidate: &str) -> NormalizedPath {
    let trimmed = candidate.trim();
    let mut rest = trimmed;

    for marker in [r"\\?\", r"\\.\", "//?/", "//./"] {
        if let Some(stripped) = rest.strip_prefix(marker) {
            rest = stripped;
            break;
        }
    }

    let mut absolute = trimmed.starts_with(['/', '\\']);
    let mut drive = None;

    let bytes = rest.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        drive = Some(bytes[0].to_ascii_uppercase() as char);
        absolute = true;
        rest = &rest[2..];
    }

    let mut components: Vec<String> = Vec::new();
    let mut escapes = 0;

    for segment in rest.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if components.pop().is_none() {
                    escapes += 1;
                }
            }
            other => components.push(other.to_string()),
        }
    }

    NormalizedPath {
        absolute,
        drive,
        components,
        escapes,
    }
}

/// Fold `.` and `..` in a host path without touching the filesystem.
///
/// `..` at the root stays at the root, matching POSIX.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !path.is_absolute() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve symlinks in every existing prefix of `path`.
///
/// The path is walked one component at a time. While the prefix exists on
/// disk it is replaced by its `std::fs::canonicalize` form, so a `..` after a
/// symlink climbs out of the link target, not the link's parent. Components
/// below a missing entry are appended lexically; a `..` that climbs back
/// above the missing entry puts the walk back on disk, so later symlinks are
/// still resolved.
///
/// An entry that exists but cannot be canonicalized (a dangling symlink, a
/// permission error) is an error. Guessing there could let a link escape a
/// trusted root.
pub fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut resolved = PathBuf::new();
    // Trailing components of `resolved` that do not exist on disk
    let mut missing = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
                missing = missing.saturating_sub(1);
            }
            Component::Normal(name) => {
                resolved.push(name);
                if missing > 0 {
                    missing += 1;
                    continue;
                }
                match std::fs::symlink_metadata(&resolved) {
                    Ok(_) => resolved = std::fs::canonicalize(&resolved)?,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => missing = 1,
                    Err(err) => return Err(err),
                }
            }
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_path_with_drive() {
        let normalized = normalize(r"C:\Users\x\OtherClone\backend\models\whisper\base");
        assert!(normalized.absolute);
        assert_eq!(normalized.drive, Some('C'));
        assert_eq!(
            normalized.components,
            vec!["Users", "x", "OtherClone", "backend", "models", "whisper", "base"]
        );
    }

    #[test]
    fn test_mixed_separators_and_dots() {
        let normalized = normalize(r"/srv\models/./whisper//tiny\..\base/");
        assert!(normalized.absolute);
        assert_eq!(normalized.drive, None);
        assert_eq!(normalized.components, vec!["srv", "models", "whisper", "base"]);
        assert_eq!(normalized.escapes, 0);
    }

    #[test]
    fn test_unc_and_verbatim_prefixes() {
        let unc = normalize(r"\\fileserver\share\models\pyannote");
        assert!(unc.absolute);
        assert_eq!(unc.components, vec!["fileserver", "share", "models", "pyannote"]);

        let verbatim = normalize(r"\\?\D:\models\whisper");
        assert_eq!(verbatim.drive, Some('D'));
        assert_eq!(verbatim.components, vec!["models", "whisper"]);
    }

    #[test]
    fn test_relative_escapes_are_counted() {
        let normalized = normalize("../../models/whisper");
        assert!(!normalized.absolute);
        assert_eq!(normalized.escapes, 2);
        assert_eq!(normalized.components, vec!["models", "whisper"]);
    }

    #[test]
    fn test_rfind_anchor_prefers_rightmost() {
        let normalized = normalize("/home/models/clones/app/models/whisper/base");
        assert_eq!(normalized.rfind_anchor(&["models"]), Some(4));
        assert_eq!(
            normalized.suffix_after(4).map(<[String]>::to_vec),
            Some(vec!["whisper".to_string(), "base".to_string()])
        );
    }

    #[test]
    fn test_rfind_anchor_is_case_insensitive_and_whole_component() {
        let normalized = normalize(r"D:\Backup\Models\whisper");
        assert_eq!(normalized.rfind_anchor(&["models"]), Some(1));

        let sibling = normalize("/srv/models2/whisper");
        assert_eq!(sibling.rfind_anchor(&["models"]), None);
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(
            lexical_normalize(Path::new("/srv/models/../../etc/passwd")),
            PathBuf::from("/etc/passwd")
        );
        assert_eq!(lexical_normalize(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn test_canonicalize_lenient_missing_tail() {
        let dir = tempfile::tempdir().unwrap();
        let base = std::fs::canonicalize(dir.path()).unwrap();

        let missing = base.join("whisper").join("base");
        assert_eq!(canonicalize_lenient(&missing).unwrap(), missing);

        let dotted = base.join("whisper").join("..").join("pyannote");
        assert_eq!(canonicalize_lenient(&dotted).unwrap(), base.join("pyannote"));
    }

    #[cfg(unix)]
    #[test]
    fn test_canonicalize_lenient_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let base = std::fs::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(base.join("real/whisper")).unwrap();
        std::os::unix::fs::symlink(base.join("real"), base.join("link")).unwrap();

        let through_link = base.join("link").join("whisper").join("base");
        assert_eq!(
            canonicalize_lenient(&through_link).unwrap(),
            base.join("real").join("whisper").join("base")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_canonicalize_lenient_resolves_links_after_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let base = std::fs::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(base.join("real")).unwrap();
        std::os::unix::fs::symlink(base.join("real"), base.join("link")).unwrap();

        let detour = base.join("nope").join("deeper").join("..").join("..").join("link").join("x");
        assert_eq!(canonicalize_lenient(&detour).unwrap(), base.join("real").join("x"));
    }

    #[cfg(unix)]
    #[test]
    fn test_canonicalize_lenient_rejects_dangling_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let base = std::fs::canonicalize(dir.path()).unwrap();
        std::os::unix::fs::symlink(base.join("nowhere"), base.join("dangling")).unwrap();

        assert!(canonicalize_lenient(&base.join("dangling").join("x")).is_err());
    }
}
