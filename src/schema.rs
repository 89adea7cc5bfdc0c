//! Compiled-in preference schema
//!
//! The schema bundles the default table with the ordered legacy migration
//! chain. [`PrefSchema::builtin`] is the schema the extension ships;
//! embedders and tests can construct their own and feed it to
//! [`PrefStore::with_schema`](crate::PrefStore::with_schema).

use crate::migration::{remove_pref, rename_pref, set_pref, MigrationStep};
use crate::types::{PrefMap, PrefValue};

/// Highest legacy migration version the shipped schema knows about
pub const CURRENT_LEGACY_MIGRATION: u32 = 3;

/// A default table plus its legacy migration chain
#[derive(Debug, Clone)]
pub struct PrefSchema {
    defaults: PrefMap,
    migrations: Vec<MigrationStep>,
    current_version: u32,
}

impl PrefSchema {
    /// Builds a schema from a default table and a migration chain.
    ///
    /// Steps are sorted by target version; the schema's current version is
    /// the highest step version, or 0 for a schema with no migrations.
    pub fn new(defaults: PrefMap, mut migrations: Vec<MigrationStep>) -> Self {
        migrations.sort_by_key(|step| step.version);
        let current_version = migrations.last().map(|step| step.version).unwrap_or(0);
        PrefSchema {
            defaults,
            migrations,
            current_version,
        }
    }

    /// The schema shipped with the extension
    pub fn builtin() -> Self {
        let mut defaults = PrefMap::new();
        defaults.insert("hide_quote_length".into(), PrefValue::Int(5));
        defaults.insert("expand_who".into(), PrefValue::Int(4));
        defaults.insert("no_friendly_date".into(), PrefValue::Bool(false));
        defaults.insert("logging_enabled".into(), PrefValue::Bool(false));
        defaults.insert("tweak_bodies".into(), PrefValue::Bool(true));
        defaults.insert("tweak_chrome".into(), PrefValue::Bool(true));
        defaults.insert("operate_on_conversations".into(), PrefValue::Bool(false));
        defaults.insert("extra_attachments".into(), PrefValue::Bool(false));
        defaults.insert("compose_in_tab".into(), PrefValue::Bool(true));
        defaults.insert("unwanted_recipients".into(), PrefValue::Str("{}".into()));
        defaults.insert("uninstall_infos".into(), PrefValue::Str("{}".into()));
        defaults.insert("hide_sigs".into(), PrefValue::Bool(false));
        defaults.insert("hide_quick_reply".into(), PrefValue::Bool(true));

        let migrations = vec![
            MigrationStep {
                version: 1,
                run: migrate_v1,
            },
            MigrationStep {
                version: 2,
                run: migrate_v2,
            },
            MigrationStep {
                version: 3,
                run: migrate_v3,
            },
        ];

        let schema = PrefSchema::new(defaults, migrations);
        debug_assert_eq!(schema.current_version, CURRENT_LEGACY_MIGRATION);
        schema
    }

    pub fn defaults(&self) -> &PrefMap {
        &self.defaults
    }

    pub fn migrations(&self) -> &[MigrationStep] {
        &self.migrations
    }

    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    /// Compiled-in default for `key`, if the schema defines one
    pub fn default_for(&self, key: &str) -> Option<&PrefValue> {
        self.defaults.get(key)
    }
}

impl Default for PrefSchema {
    fn default() -> Self {
        PrefSchema::builtin()
    }
}

fn migrate_v1(values: &mut PrefMap) -> Result<(), String> {
    rename_pref(values, "disable_friendly_date", "no_friendly_date");
    // one-shot onboarding flag, retired
    remove_pref(values, "seen_first_run");
    Ok(())
}

fn migrate_v2(values: &mut PrefMap) -> Result<(), String> {
    let had_old = values.contains_key("compose_in_new_tab");
    rename_pref(values, "compose_in_new_tab", "compose_in_tab");
    if !had_old {
        // no explicit choice under the old name; adopt the new default
        set_pref(values, "compose_in_tab", true);
    }
    Ok(())
}

fn migrate_v3(values: &mut PrefMap) -> Result<(), String> {
    // quick reply is hidden for new installs only; users upgrading from a
    // version that always showed it keep it visible
    set_pref(values, "hide_quick_reply", false);
    Ok(())
}
