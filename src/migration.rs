//! Legacy schema migrations
//!
//! Persisted preference sets carry a `migratedLegacy` watermark. When a blob
//! from an older extension version is loaded, every migration step with a
//! target version above the watermark (and at or below the current version)
//! is applied in ascending order, each step seeing the set as left by the
//! previous one. Fresh installs start at the current version and never run
//! the chain; blobs written by a newer version are left untouched.

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{PrefMap, PrefSet, PrefValue};

/// Transform applied by a single migration step.
///
/// Steps report failure as a plain message; the chain runner attaches the
/// target version and converts it into [`Error::Migration`].
pub type MigrationFn = fn(&mut PrefMap) -> std::result::Result<(), String>;

/// One step of the legacy migration chain
///
/// A step upgrades a preference set from `version - 1` to `version` by
/// renaming keys, overriding values, or removing retired keys. Steps must be
/// deterministic; the same input set always yields the same output set.
#[derive(Clone, Copy)]
pub struct MigrationStep {
    /// Target schema version this step upgrades to
    pub version: u32,
    pub run: MigrationFn,
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .finish()
    }
}

/// Applies every step in `(set.migrated_legacy, current]` in ascending order.
///
/// The watermark is bumped after each successful step, so a failing step
/// leaves `migrated_legacy` at the last version that fully applied and the
/// error carries the version that did not. Steps whose target version exceeds
/// `current` are never run, and a set already at or past `current` is
/// returned unchanged (migrations never run backward).
pub fn run_migrations(set: &mut PrefSet, steps: &[MigrationStep], current: u32) -> Result<()> {
    for step in steps {
        if step.version <= set.migrated_legacy || step.version > current {
            continue;
        }
        (step.run)(&mut set.values).map_err(|message| Error::Migration {
            version: step.version,
            message,
        })?;
        set.migrated_legacy = step.version;
        debug!(version = step.version, "applied legacy migration step");
    }
    Ok(())
}

/// Moves the value stored under `from` to `to`.
///
/// No-op when `from` is absent. When both keys are present the old value
/// wins under the new name, matching a straight `map[to] = map[from]`.
pub fn rename_pref(values: &mut PrefMap, from: &str, to: &str) {
    if let Some(value) = values.remove(from) {
        values.insert(to.to_string(), value);
    }
}

/// Sets `key` to `value`, overriding whatever an upgrading user had
pub fn set_pref(values: &mut PrefMap, key: &str, value: impl Into<PrefValue>) {
    values.insert(key.to_string(), value.into());
}

/// Removes a retired key from the set
pub fn remove_pref(values: &mut PrefMap, key: &str) {
    values.remove(key);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_at(version: u32) -> PrefSet {
        let mut values = PrefMap::new();
        values.insert("alpha".to_string(), PrefValue::Int(1));
        PrefSet {
            values,
            migrated_legacy: version,
        }
    }

    fn bump_alpha(values: &mut PrefMap) -> std::result::Result<(), String> {
        let next = values.get("alpha").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
        set_pref(values, "alpha", next);
        Ok(())
    }

    fn always_fails(_values: &mut PrefMap) -> std::result::Result<(), String> {
        Err("boom".to_string())
    }

    const CHAIN: &[MigrationStep] = &[
        MigrationStep {
            version: 1,
            run: bump_alpha,
        },
        MigrationStep {
            version: 2,
            run: bump_alpha,
        },
        MigrationStep {
            version: 3,
            run: bump_alpha,
        },
    ];

    #[test]
    fn test_runs_only_steps_above_watermark() {
        let mut set = set_at(1);
        run_migrations(&mut set, CHAIN, 3).unwrap();
        // steps 2 and 3 ran, step 1 did not
        assert_eq!(set.values.get("alpha"), Some(&PrefValue::Int(3)));
        assert_eq!(set.migrated_legacy, 3);
    }

    #[test]
    fn test_never_runs_backward() {
        let mut set = set_at(7);
        run_migrations(&mut set, CHAIN, 3).unwrap();
        assert_eq!(set.values.get("alpha"), Some(&PrefValue::Int(1)));
        assert_eq!(set.migrated_legacy, 7);
    }

    #[test]
    fn test_caps_at_current_version() {
        let mut set = set_at(0);
        run_migrations(&mut set, CHAIN, 2).unwrap();
        assert_eq!(set.values.get("alpha"), Some(&PrefValue::Int(3)));
        assert_eq!(set.migrated_legacy, 2);
    }

    #[test]
    fn test_failure_keeps_watermark_at_last_success() {
        let chain = [
            MigrationStep {
                version: 1,
                run: bump_alpha,
            },
            MigrationStep {
                version: 2,
                run: always_fails,
            },
            MigrationStep {
                version: 3,
                run: bump_alpha,
            },
        ];

        let mut set = set_at(0);
        let err = run_migrations(&mut set, &chain, 3).unwrap_err();
        assert!(matches!(err, Error::Migration { version: 2, .. }));
        assert_eq!(set.migrated_legacy, 1);
        // step 3 never ran
        assert_eq!(set.values.get("alpha"), Some(&PrefValue::Int(2)));
    }

    #[test]
    fn test_rename_moves_value() {
        let mut values = PrefMap::new();
        values.insert("old_name".to_string(), PrefValue::Bool(true));
        rename_pref(&mut values, "old_name", "new_name");
        assert!(!values.contains_key("old_name"));
        assert_eq!(values.get("new_name"), Some(&PrefValue::Bool(true)));
    }

    #[test]
    fn test_rename_absent_key_is_noop() {
        let mut values = PrefMap::new();
        values.insert("other".to_string(), PrefValue::Int(1));
        rename_pref(&mut values, "missing", "target");
        assert!(!values.contains_key("target"));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_rename_collision_keeps_old_value() {
        let mut values = PrefMap::new();
        values.insert("old_name".to_string(), PrefValue::Int(1));
        values.insert("new_name".to_string(), PrefValue::Int(2));
        rename_pref(&mut values, "old_name", "new_name");
        assert_eq!(values.get("new_name"), Some(&PrefValue::Int(1)));
    }
}
