//! Trusted model storage roots.

use super::normalizer::canonicalize_lenient;
use super::PathError;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Which trusted root a path lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    Current,
    Legacy,
}

impl std::fmt::Display for RootKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RootKind::Current => write!(f, "current"),
            RootKind::Legacy => write!(f, "legacy"),
        }
    }
}

/// The two directories model sets may live under, plus the anchor names used
/// to find the rebasing point in foreign paths.
///
/// Both roots are stored canonicalized (symlinks resolved where the
/// directories exist). The value is immutable; swapping roots at runtime
/// means building a new `TrustedRoots` and handing it to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedRoots {
    current: PathBuf,
    legacy: PathBuf,
    anchors: Vec<String>,
}

impl TrustedRoots {
    /// Build trusted roots from configured paths.
    ///
    /// ## Parameters:
    /// - **current**: where new and rebased model sets go
    /// - **legacy**: deprecated location still accepted for lookups
    /// - **anchors**: component names marking the rebasing point; when empty
    ///   the final segments of both roots are used
    ///
    /// Relative roots are taken relative to the process working directory.
    pub fn new(
        current: impl AsRef<Path>,
        legacy: impl AsRef<Path>,
        anchors: &[String],
    ) -> Result<Self, PathError> {
        let current = Self::canonical_root(current.as_ref())?;
        let legacy = Self::canonical_root(legacy.as_ref())?;

        let mut names: Vec<String> = anchors
            .iter()
            .map(|anchor| anchor.trim().to_string())
            .filter(|anchor| !anchor.is_empty())
            .collect();

        if names.is_empty() {
            for root in [&current, &legacy] {
                if let Some(name) = root.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));

        if names.is_empty() {
            return Err(PathError::invalid(&current, "no anchor component configured"));
        }

        Ok(Self {
            current,
            legacy,
            anchors: names,
        })
    }

    fn canonical_root(root: &Path) -> Result<PathBuf, PathError> {
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| PathError::invalid(root, format!("no working directory: {}", e)))?
                .join(root)
        };

        let canonical = canonicalize_lenient(&absolute)
            .map_err(|e| PathError::invalid(&absolute, format!("cannot canonicalize root: {}", e)))?;

        if canonical.parent().is_none() {
            return Err(PathError::invalid(canonical, "a filesystem root cannot be a model root"));
        }
        Ok(canonical)
    }

    pub fn current(&self) -> &Path {
        &self.current
    }

    pub fn legacy(&self) -> &Path {
        &self.legacy
    }

    pub fn anchors(&self) -> &[String] {
        &self.anchors
    }

    /// Roots in lookup order: current first.
    pub fn iter(&self) -> impl Iterator<Item = (RootKind, &Path)> {
        [
            (RootKind::Current, self.current.as_path()),
            (RootKind::Legacy, self.legacy.as_path()),
        ]
        .into_iter()
    }

    /// The root `path` is a strict descendant of, compared component-wise.
    ///
    /// `path` must already be canonical; this does no filesystem access.
    pub fn containing_root(&self, path: &Path) -> Option<RootKind> {
        self.iter()
            .find(|(_, root)| path != *root && path.starts_with(root))
            .map(|(kind, _)| kind)
    }
}
