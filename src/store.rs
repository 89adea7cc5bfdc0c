//! The preference store
//!
//! [`PrefStore`] is the single source of truth for extension configuration.
//! On first use it loads the persisted blob from its storage backend, merges
//! it over the schema defaults, runs any outstanding legacy migrations, and
//! writes the resolved set back. Every accessor awaits that one-shot
//! initialization, so no caller can observe a partially migrated set.

use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::error::{Error, Result};
use crate::migration::run_migrations;
use crate::query::query_preferences;
use crate::schema::PrefSchema;
use crate::storage::StorageBackend;
use crate::types::{PrefMap, PrefSet, PrefValue};

/// Fixed key the serialized preference set is stored under
pub const STORAGE_KEY: &str = "preferences";

/// Async preference store over an injected storage backend
///
/// The store is designed to live for the whole extension context, but it is
/// an ordinary constructible value: tests build one per case over a
/// [`MemoryBackend`](crate::MemoryBackend) instead of sharing global state.
///
/// # Example
///
/// ```rust
/// use convprefs::{MemoryBackend, PrefStore};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = PrefStore::new(MemoryBackend::new());
/// store.init().await?;
///
/// assert!(store.get_bool("compose_in_tab").await?);
/// store.set("compose_in_tab", false).await?;
/// assert!(!store.get_bool("compose_in_tab").await?);
/// # Ok::<(), convprefs::Error>(())
/// # }).unwrap();
/// ```
pub struct PrefStore<B> {
    backend: B,
    schema: PrefSchema,
    // set exactly once by the first successful load+migrate
    state: OnceCell<Mutex<PrefSet>>,
}

impl<B: StorageBackend> PrefStore<B> {
    /// Creates a store over `backend` using the shipped schema
    pub fn new(backend: B) -> Self {
        PrefStore::with_schema(backend, PrefSchema::builtin())
    }

    /// Creates a store over `backend` with a caller-supplied schema
    pub fn with_schema(backend: B, schema: PrefSchema) -> Self {
        PrefStore {
            backend,
            schema,
            state: OnceCell::new(),
        }
    }

    pub fn schema(&self) -> &PrefSchema {
        &self.schema
    }

    /// Loads, merges, and migrates the persisted set.
    ///
    /// Idempotent: the first call does the work, concurrent and later calls
    /// await the same one-shot run and never re-run migrations. Accessors
    /// invoked before `init` resolves suspend on the same run, so there is no
    /// window where an unmigrated set is visible.
    ///
    /// Fails with [`Error::StorageUnavailable`] if the backend cannot be
    /// reached, [`Error::InvalidPreference`] if the stored blob is malformed,
    /// or [`Error::Migration`] if a migration step fails; in each case
    /// nothing is written back and the error is the caller's to handle.
    pub async fn init(&self) -> Result<()> {
        self.ready().await.map(|_| ())
    }

    /// Returns the current value for `key`
    pub async fn get(&self, key: &str) -> Result<PrefValue> {
        let state = self.ready().await?;
        let set = state.lock().await;
        set.values
            .get(key)
            .cloned()
            .ok_or_else(|| Error::UnknownPreference {
                key: key.to_string(),
            })
    }

    /// Returns the boolean value for `key`, failing fast on a type mismatch
    pub async fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get(key).await?;
        value.as_bool().ok_or_else(|| type_mismatch(key, "bool", &value))
    }

    /// Returns the integer value for `key`, failing fast on a type mismatch
    pub async fn get_i64(&self, key: &str) -> Result<i64> {
        let value = self.get(key).await?;
        value.as_i64().ok_or_else(|| type_mismatch(key, "int", &value))
    }

    /// Returns the string value for `key`, failing fast on a type mismatch
    pub async fn get_str(&self, key: &str) -> Result<String> {
        let value = self.get(key).await?;
        match value {
            PrefValue::Str(s) => Ok(s),
            other => Err(type_mismatch(key, "string", &other)),
        }
    }

    /// Updates `key` and persists the full set before returning.
    ///
    /// The in-memory set stays locked across the backend save, so concurrent
    /// `set` calls serialize and the last write to complete is the one on
    /// disk. Keys outside the resolved set are rejected with
    /// [`Error::UnknownPreference`].
    pub async fn set(&self, key: &str, value: impl Into<PrefValue>) -> Result<()> {
        let state = self.ready().await?;
        let mut set = state.lock().await;
        if !set.values.contains_key(key) && self.schema.default_for(key).is_none() {
            return Err(Error::UnknownPreference {
                key: key.to_string(),
            });
        }
        set.values.insert(key.to_string(), value.into());
        self.backend.save(STORAGE_KEY, &set.to_blob()).await
    }

    /// Restores `key` to its compiled-in default and persists the set
    pub async fn reset(&self, key: &str) -> Result<PrefValue> {
        let default = self
            .schema
            .default_for(key)
            .cloned()
            .ok_or_else(|| Error::UnknownPreference {
                key: key.to_string(),
            })?;
        let state = self.ready().await?;
        let mut set = state.lock().await;
        set.values.insert(key.to_string(), default.clone());
        self.backend.save(STORAGE_KEY, &set.to_blob()).await?;
        Ok(default)
    }

    /// Clone of the resolved preference map, for bulk display
    pub async fn snapshot(&self) -> Result<PrefMap> {
        let state = self.ready().await?;
        Ok(state.lock().await.values.clone())
    }

    /// Resolved preferences whose keys match any of the glob `patterns`
    pub async fn query(&self, patterns: &[&str]) -> Result<PrefMap> {
        let state = self.ready().await?;
        let set = state.lock().await;
        query_preferences(&set.values, patterns)
    }

    /// Highest legacy migration version applied to the resolved set
    pub async fn migrated_legacy(&self) -> Result<u32> {
        let state = self.ready().await?;
        Ok(state.lock().await.migrated_legacy)
    }

    async fn ready(&self) -> Result<&Mutex<PrefSet>> {
        self.state
            .get_or_try_init(|| self.load_and_migrate())
            .await
    }

    async fn load_and_migrate(&self) -> Result<Mutex<PrefSet>> {
        let current = self.schema.current_version();
        let set = match self.backend.load(STORAGE_KEY).await? {
            None => {
                // fresh install: defaults only, chain already at current
                debug!(version = current, "no stored preferences, starting fresh");
                PrefSet::from_defaults(self.schema.defaults(), current)
            }
            Some(blob) => {
                let stored = PrefSet::from_blob(&blob)?;
                // stored values win; defaults fill in missing keys
                let mut values = self.schema.defaults().clone();
                values.extend(stored.values);
                let mut set = PrefSet {
                    values,
                    migrated_legacy: stored.migrated_legacy,
                };
                run_migrations(&mut set, self.schema.migrations(), current)?;
                set
            }
        };
        self.backend.save(STORAGE_KEY, &set.to_blob()).await?;
        Ok(Mutex::new(set))
    }
}

fn type_mismatch(key: &str, expected: &str, found: &PrefValue) -> Error {
    Error::InvalidPreference(format!(
        "'{}' is not a {} (found {})",
        key,
        expected,
        found.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{set_pref, MigrationStep};
    use crate::storage::MemoryBackend;
    use async_trait::async_trait;
    use serde_json::json;

    fn two_step_schema() -> PrefSchema {
        fn step_one(values: &mut PrefMap) -> std::result::Result<(), String> {
            set_pref(values, "trail", "one");
            Ok(())
        }
        fn step_two(values: &mut PrefMap) -> std::result::Result<(), String> {
            let prior = values
                .get("trail")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            set_pref(values, "trail", format!("{},two", prior));
            Ok(())
        }

        let mut defaults = PrefMap::new();
        defaults.insert("trail".into(), PrefValue::Str("default".into()));
        defaults.insert("count".into(), PrefValue::Int(10));
        PrefSchema::new(
            defaults,
            vec![
                MigrationStep {
                    version: 1,
                    run: step_one,
                },
                MigrationStep {
                    version: 2,
                    run: step_two,
                },
            ],
        )
    }

    #[tokio::test]
    async fn test_fresh_install_uses_defaults_without_migrating() {
        let backend = MemoryBackend::new();
        let store = PrefStore::with_schema(backend.clone(), two_step_schema());
        store.init().await.unwrap();

        // chain skipped entirely: the steps would have written a trail
        assert_eq!(store.get_str("trail").await.unwrap(), "default");
        assert_eq!(store.migrated_legacy().await.unwrap(), 2);

        // resolved set was written back
        let blob = backend.load(STORAGE_KEY).await.unwrap().unwrap();
        assert_eq!(blob["migratedLegacy"], json!(2));
        assert_eq!(blob["count"], json!(10));
    }

    #[tokio::test]
    async fn test_stored_values_win_and_defaults_fill() {
        let backend = MemoryBackend::new();
        backend
            .save(STORAGE_KEY, &json!({"count": 99, "migratedLegacy": 2}))
            .await
            .unwrap();

        let store = PrefStore::with_schema(backend, two_step_schema());
        assert_eq!(store.get_i64("count").await.unwrap(), 99);
        assert_eq!(store.get_str("trail").await.unwrap(), "default");
    }

    #[tokio::test]
    async fn test_chain_runs_from_stored_watermark() {
        let backend = MemoryBackend::new();
        backend
            .save(STORAGE_KEY, &json!({"migratedLegacy": 0}))
            .await
            .unwrap();

        let store = PrefStore::with_schema(backend, two_step_schema());
        assert_eq!(store.get_str("trail").await.unwrap(), "one,two");
        assert_eq!(store.migrated_legacy().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_watermark_means_version_zero() {
        let backend = MemoryBackend::new();
        backend.save(STORAGE_KEY, &json!({})).await.unwrap();

        let store = PrefStore::with_schema(backend, two_step_schema());
        assert_eq!(store.get_str("trail").await.unwrap(), "one,two");
    }

    #[tokio::test]
    async fn test_newer_blob_is_left_alone() {
        let backend = MemoryBackend::new();
        backend
            .save(
                STORAGE_KEY,
                &json!({"migratedLegacy": 5, "from_the_future": true}),
            )
            .await
            .unwrap();

        let store = PrefStore::with_schema(backend, two_step_schema());
        store.init().await.unwrap();
        // never migrate backward, never drop unknown keys
        assert_eq!(store.migrated_legacy().await.unwrap(), 5);
        assert_eq!(store.get_str("trail").await.unwrap(), "default");
        assert!(store.get_bool("from_the_future").await.unwrap());
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let backend = MemoryBackend::new();
        backend
            .save(STORAGE_KEY, &json!({"migratedLegacy": 1}))
            .await
            .unwrap();

        let store = PrefStore::with_schema(backend, two_step_schema());
        let (first, second) = tokio::join!(store.init(), store.init());
        first.unwrap();
        second.unwrap();
        store.init().await.unwrap();

        // step two ran exactly once
        assert_eq!(store.get_str("trail").await.unwrap(), "default,two");
        assert_eq!(store.migrated_legacy().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_accessors_drive_initialization() {
        let store = PrefStore::with_schema(MemoryBackend::new(), two_step_schema());
        // no explicit init() call
        assert_eq!(store.get_i64("count").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_unknown_key_get_and_set() {
        let store = PrefStore::with_schema(MemoryBackend::new(), two_step_schema());
        assert!(matches!(
            store.get("does_not_exist").await,
            Err(Error::UnknownPreference { .. })
        ));
        assert!(matches!(
            store.set("does_not_exist", true).await,
            Err(Error::UnknownPreference { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_persists_full_set() {
        let backend = MemoryBackend::new();
        let store = PrefStore::with_schema(backend.clone(), two_step_schema());
        store.set("count", 42).await.unwrap();

        let blob = backend.load(STORAGE_KEY).await.unwrap().unwrap();
        assert_eq!(blob["count"], json!(42));
        assert_eq!(blob["trail"], json!("default"));
    }

    #[tokio::test]
    async fn test_reset_restores_default() {
        let store = PrefStore::with_schema(MemoryBackend::new(), two_step_schema());
        store.set("count", 42).await.unwrap();
        let restored = store.reset("count").await.unwrap();
        assert_eq!(restored, PrefValue::Int(10));
        assert_eq!(store.get_i64("count").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_typed_getter_mismatch_fails_fast() {
        let store = PrefStore::with_schema(MemoryBackend::new(), two_step_schema());
        assert!(matches!(
            store.get_bool("count").await,
            Err(Error::InvalidPreference(_))
        ));
        assert!(matches!(
            store.get_str("count").await,
            Err(Error::InvalidPreference(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_migration_aborts_without_write_back() {
        fn explodes(_values: &mut PrefMap) -> std::result::Result<(), String> {
            Err("unrepresentable state".to_string())
        }

        let schema = PrefSchema::new(
            PrefMap::new(),
            vec![MigrationStep {
                version: 1,
                run: explodes,
            }],
        );
        let backend = MemoryBackend::new();
        let original = json!({"migratedLegacy": 0, "orphan": 1});
        backend.save(STORAGE_KEY, &original).await.unwrap();

        let store = PrefStore::with_schema(backend.clone(), schema);
        let err = store.init().await.unwrap_err();
        assert!(matches!(err, Error::Migration { version: 1, .. }));

        // the half-migrated set never reached storage
        let blob = backend.load(STORAGE_KEY).await.unwrap().unwrap();
        assert_eq!(blob, original);
    }

    struct UnreachableBackend;

    #[async_trait]
    impl StorageBackend for UnreachableBackend {
        async fn load(&self, _key: &str) -> Result<Option<serde_json::Value>> {
            Err(Error::StorageUnavailable {
                message: "host storage is gone".to_string(),
            })
        }

        async fn save(&self, _key: &str, _blob: &serde_json::Value) -> Result<()> {
            Err(Error::StorageUnavailable {
                message: "host storage is gone".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_to_caller() {
        let store = PrefStore::with_schema(UnreachableBackend, two_step_schema());
        assert!(matches!(
            store.init().await,
            Err(Error::StorageUnavailable { .. })
        ));
        assert!(matches!(
            store.get("count").await,
            Err(Error::StorageUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_blob_fails_init() {
        let backend = MemoryBackend::new();
        backend
            .save(STORAGE_KEY, &json!({"count": {"nested": true}}))
            .await
            .unwrap();
        let store = PrefStore::with_schema(backend, two_step_schema());
        assert!(matches!(
            store.init().await,
            Err(Error::InvalidPreference(_))
        ));
    }
}
