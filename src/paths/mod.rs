//! # Model Path Handling
//!
//! Everything that decides where a model set is allowed to live on disk.
//!
//! Catalog rows can be written on one machine and read on another (a copied
//! database, a different clone location, another username or drive letter).
//! This module recognizes such *foreign* paths, rebases them onto the local
//! models directory and refuses anything that would end up outside the two
//! trusted roots.
//!
//! ## Pipeline:
//! 1. **normalizer**: candidate string → separator-agnostic components
//! 2. **resolver**: already local? keep it. Otherwise rebase after the anchor
//! 3. **validator**: strict containment check inside a trusted root
//!
//! All of it is synchronous and free of shared state; the trusted roots are
//! passed in explicitly as a [`TrustedRoots`] value.

pub mod normalizer;
pub mod resolver;
pub mod roots;
pub mod validator;

pub use resolver::{resolve, ResolvedPath};
pub use roots::{RootKind, TrustedRoots};
pub use validator::validate;

use std::fmt;
use std::path::PathBuf;

/// Reasons a candidate path is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// No anchor component to rebase on; the caller has to supply a better path
    Unresolvable { candidate: String, reason: String },

    /// The path resolved outside of both trusted roots
    Invalid { path: PathBuf, reason: String },
}

impl PathError {
    pub(crate) fn unresolvable(candidate: &str, reason: impl Into<String>) -> Self {
        PathError::Unresolvable {
            candidate: candidate.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PathError::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Unresolvable { candidate, reason } => {
                write!(f, "cannot resolve '{}': {}", candidate, reason)
            }
            PathError::Invalid { path, reason } => {
                write!(f, "invalid model path '{}': {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for PathError {}
