//! # Catalog Types
//!
//! Model sets and the artifacts they contain, as stored in the catalog.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// What kind of models a set provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Speech recognition (Whisper and friends)
    Asr,
    /// Speaker diarization
    Diarizer,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Asr => "asr",
            Provider::Diarizer => "diarizer",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asr" | "whisper" | "speech" => Ok(Provider::Asr),
            "diarizer" | "diarization" | "pyannote" => Ok(Provider::Diarizer),
            _ => Err(anyhow!("Unknown provider: {}", s)),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One concrete model artifact inside a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,

    /// Resolved on-disk location
    pub path: PathBuf,

    /// Needs a GPU or other accelerator to run
    pub requires_accelerator: bool,

    pub notes: Option<String>,
}

/// A named, provider-scoped collection of model artifacts.
///
/// `(provider, key)` is unique in the catalog and `path` has always been
/// through resolution and validation before the row was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSet {
    pub id: Uuid,
    pub provider: Provider,
    pub key: String,
    pub display_name: String,
    pub path: PathBuf,
    pub entries: Vec<ModelEntry>,

    /// Bumped on every write; used for optimistic concurrency
    pub revision: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelSet {
    /// True if `other` would write the same catalog content.
    ///
    /// Identity and bookkeeping fields (id, revision, timestamps) are ignored.
    pub fn same_content(&self, other: &ModelSet) -> bool {
        self.provider == other.provider
            && self.key == other.key
            && self.display_name == other.display_name
            && self.path == other.path
            && self.entries == other.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("asr".parse::<Provider>().unwrap(), Provider::Asr);
        assert_eq!("Whisper".parse::<Provider>().unwrap(), Provider::Asr);
        assert_eq!("diarization".parse::<Provider>().unwrap(), Provider::Diarizer);
        assert!("tts".parse::<Provider>().is_err());
        assert_eq!(Provider::Diarizer.to_string(), "diarizer");
    }

    #[test]
    fn test_same_content_ignores_bookkeeping() {
        let now = Utc::now();
        let set = ModelSet {
            id: Uuid::new_v4(),
            provider: Provider::Asr,
            key: "base".to_string(),
            display_name: "Whisper base".to_string(),
            path: PathBuf::from("/srv/models/whisper/base"),
            entries: vec![],
            revision: 1,
            created_at: now,
            updated_at: now,
        };
        let mut other = set.clone();
        other.id = Uuid::new_v4();
        other.revision = 7;
        assert!(set.same_content(&other));

        other.display_name = "Whisper base (en)".to_string();
        assert!(!set.same_content(&other));
    }
}
