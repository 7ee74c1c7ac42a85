//! # Model Registry
//!
//! Catalog of on-disk model sets for the speech-recognition and diarization
//! providers.
//!
//! ## Key Components:
//! - **model**: catalog row types (`ModelSet`, `ModelEntry`, `Provider`)
//! - **store**: persistence port with the `(provider, key)` uniqueness rule
//! - **events**: append-only registry event log, fed after each commit
//! - **service**: the registry operations, with path checks in front

pub mod events;
pub mod model;
pub mod service;
pub mod store;

pub use events::FileEventLog;
pub use model::{ModelSet, Provider};
pub use service::{EntryRequest, ModelRegistryService, UpsertSetRequest};
pub use store::{InMemoryCatalog, StoreError};
