//! Error types for preference loading, migration, and storage operations
//!
//! This module defines the error types used throughout the convprefs library.
//! All public functions return [`Result<T, Error>`] for consistent error handling.

/// Errors that can occur during preference loading, migration, and storage
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The storage backend could not be reached or its call failed.
    ///
    /// Fatal to the calling operation; never swallowed. Retry policy is the
    /// caller's responsibility.
    #[error("storage backend unavailable: {message}")]
    StorageUnavailable { message: String },

    /// A key that is neither in the default table nor in the resolved set
    #[error("unknown preference '{key}'")]
    UnknownPreference { key: String },

    /// A migration step failed; the chain is aborted at this version
    #[error("migration to version {version} failed: {message}")]
    Migration { version: u32, message: String },

    /// Invalid persisted preference blob or value
    #[error("invalid preference: {0}")]
    InvalidPreference(String),

    /// Invalid glob pattern in query
    #[error("invalid glob pattern: {0}")]
    InvalidGlobPattern(String),
}

/// Result type alias for convenience
///
/// All public functions in the convprefs library return this type alias for
/// consistent error handling.
///
/// # Example
///
/// ```rust
/// use convprefs::{MemoryBackend, PrefStore, Result};
///
/// async fn load_store() -> Result<PrefStore<MemoryBackend>> {
///     let store = PrefStore::new(MemoryBackend::new());
///     store.init().await?;
///     Ok(store)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;
