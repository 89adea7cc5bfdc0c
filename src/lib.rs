//! # convprefs - Async preference store with legacy schema migrations
//!
//! This library provides the configuration core of a mail-client extension:
//! a single source of truth for named, typed settings, persisted as one JSON
//! blob through a pluggable storage backend. Old persisted shapes are
//! upgraded transparently by an ordered chain of legacy migration steps, and
//! every accessor waits for that load-and-migrate pass to finish, so readers
//! never observe a partially migrated set.
//!
//! ## Features
//!
//! - Flat preference model: boolean, integer, and string values
//! - Compiled-in default table; stored values win, defaults fill the gaps
//! - Versioned legacy migrations (key renames, forced overrides, removals)
//!   applied strictly in ascending order, never backward
//! - One-shot async initialization; concurrent callers share the same run
//! - Writes persist the full set before returning, serialized per store
//! - Injected [`StorageBackend`] for test isolation and host integration
//! - Glob-pattern queries over the resolved set (e.g. `"hide_*"`)
//!
//! ## Quick Start
//!
//! ```rust
//! use convprefs::{MemoryBackend, PrefStore};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = PrefStore::new(MemoryBackend::new());
//! store.init().await?;
//!
//! // fresh installs resolve to the compiled-in defaults
//! assert_eq!(store.get_i64("hide_quote_length").await?, 5);
//!
//! store.set("hide_quote_length", 12).await?;
//! assert_eq!(store.get_i64("hide_quote_length").await?, 12);
//! # Ok::<(), convprefs::Error>(())
//! # }).unwrap();
//! ```
//!
//! ## Custom schemas
//!
//! The shipped default table and migration chain live in
//! [`PrefSchema::builtin`]. Embedders and tests can supply their own:
//!
//! ```rust
//! use convprefs::{
//!     set_pref, MemoryBackend, MigrationStep, PrefMap, PrefSchema, PrefStore, PrefValue,
//! };
//!
//! fn enable_logging(values: &mut PrefMap) -> Result<(), String> {
//!     set_pref(values, "logging_enabled", true);
//!     Ok(())
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let mut defaults = PrefMap::new();
//! defaults.insert("logging_enabled".into(), PrefValue::Bool(false));
//!
//! let schema = PrefSchema::new(
//!     defaults,
//!     vec![MigrationStep { version: 1, run: enable_logging }],
//! );
//! let store = PrefStore::with_schema(MemoryBackend::new(), schema);
//! store.init().await?;
//! # Ok::<(), convprefs::Error>(())
//! # }).unwrap();
//! ```
//!
//! ## Storage contract
//!
//! The store performs I/O only at the backend boundary: one
//! [`load`](StorageBackend::load) during initialization and one
//! [`save`](StorageBackend::save) per mutation (plus the post-migration
//! write-back). Backend failures surface as
//! [`Error::StorageUnavailable`] to the calling operation; the store never
//! retries on its own. [`JsonFileBackend`] persists to a JSON file with
//! atomic replacement; [`MemoryBackend`] keeps everything in memory.
//!
//! ## Error Handling
//!
//! All functions return [`Result<T, Error>`]. The [`Error`] enum separates
//! backend outages from programmer errors and migration failures:
//!
//! ```rust
//! use convprefs::{Error, MemoryBackend, PrefStore};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = PrefStore::new(MemoryBackend::new());
//! match store.get("does_not_exist").await {
//!     Err(Error::UnknownPreference { key }) => eprintln!("no such preference: {}", key),
//!     other => panic!("expected UnknownPreference, got {:?}", other),
//! }
//! # });
//! ```

// Re-export all public types at crate root
pub use types::{PrefMap, PrefSet, PrefValue, MIGRATED_LEGACY_FIELD};

// Re-export error types
pub use error::{Error, Result};

// Re-export the store and its storage seam
pub use storage::{JsonFileBackend, MemoryBackend, StorageBackend};
pub use store::{PrefStore, STORAGE_KEY};

// Re-export schema and migration building blocks
pub use migration::{remove_pref, rename_pref, set_pref, MigrationFn, MigrationStep};
pub use schema::{PrefSchema, CURRENT_LEGACY_MIGRATION};

// Re-export queries
pub use query::query_preferences;

// All modules are private - use re-exports above for public API
mod error;
mod migration;
mod query;
mod schema;
mod storage;
mod store;
mod types;
