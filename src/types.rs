//! Core value and set types for the preference store

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Field inside the persisted blob that records the highest applied
/// legacy-migration version. Reserved; never a preference key.
pub const MIGRATED_LEGACY_FIELD: &str = "migratedLegacy";

/// Resolved mapping from preference key to value
pub type PrefMap = BTreeMap<String, PrefValue>;

/// A single preference value
///
/// Preferences are flat primitives: booleans, integers, or strings.
/// Structured values (e.g. per-sender overrides) are stored as JSON-encoded
/// strings by the callers that need them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl PrefValue {
    /// Returns the boolean value, or `None` if this is not a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, or `None` if this is not an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PrefValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string value, or `None` if this is not a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrefValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Human-readable name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            PrefValue::Bool(_) => "bool",
            PrefValue::Int(_) => "int",
            PrefValue::Str(_) => "string",
        }
    }
}

impl From<bool> for PrefValue {
    fn from(b: bool) -> Self {
        PrefValue::Bool(b)
    }
}

impl From<i64> for PrefValue {
    fn from(i: i64) -> Self {
        PrefValue::Int(i)
    }
}

impl From<&str> for PrefValue {
    fn from(s: &str) -> Self {
        PrefValue::Str(s.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(s: String) -> Self {
        PrefValue::Str(s)
    }
}

impl std::fmt::Display for PrefValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefValue::Bool(b) => write!(f, "{}", b),
            PrefValue::Int(i) => write!(f, "{}", i),
            PrefValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A fully resolved preference set together with its migration watermark
///
/// After [`PrefStore::init`](crate::PrefStore::init) completes, `values`
/// contains every key of the default table plus any forward-compatible keys
/// a newer extension version persisted. `migrated_legacy` records the highest
/// legacy-migration step applied to this set and never decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefSet {
    pub values: PrefMap,
    pub migrated_legacy: u32,
}

impl PrefSet {
    /// Builds a fresh set from a default table, marked at `version`
    pub fn from_defaults(defaults: &PrefMap, version: u32) -> Self {
        PrefSet {
            values: defaults.clone(),
            migrated_legacy: version,
        }
    }

    /// Decodes a persisted blob into a preference set.
    ///
    /// The blob must be a flat JSON object of primitive values. A missing
    /// `migratedLegacy` field means the blob predates migration tracking and
    /// is treated as version 0.
    pub fn from_blob(blob: &serde_json::Value) -> Result<Self> {
        let object = blob.as_object().ok_or_else(|| {
            Error::InvalidPreference(format!(
                "stored blob is not an object (found {})",
                json_type_name(blob)
            ))
        })?;

        let migrated_legacy = match object.get(MIGRATED_LEGACY_FIELD) {
            None => 0,
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    Error::InvalidPreference(format!(
                        "'{}' is not a non-negative integer: {}",
                        MIGRATED_LEGACY_FIELD, v
                    ))
                })?,
        };

        let mut values = PrefMap::new();
        for (key, value) in object {
            if key == MIGRATED_LEGACY_FIELD {
                continue;
            }
            values.insert(key.clone(), json_to_pref(key, value)?);
        }

        Ok(PrefSet {
            values,
            migrated_legacy,
        })
    }

    /// Encodes the set as the flat JSON object persisted to the backend
    pub fn to_blob(&self) -> serde_json::Value {
        let mut object = serde_json::Map::with_capacity(self.values.len() + 1);
        object.insert(
            MIGRATED_LEGACY_FIELD.to_string(),
            serde_json::Value::from(self.migrated_legacy),
        );
        for (key, value) in &self.values {
            object.insert(key.clone(), pref_to_json(value));
        }
        serde_json::Value::Object(object)
    }
}

fn json_to_pref(key: &str, value: &serde_json::Value) -> Result<PrefValue> {
    match value {
        serde_json::Value::Bool(b) => Ok(PrefValue::Bool(*b)),
        serde_json::Value::Number(n) => n.as_i64().map(PrefValue::Int).ok_or_else(|| {
            Error::InvalidPreference(format!("'{}' is not an integer: {}", key, n))
        }),
        serde_json::Value::String(s) => Ok(PrefValue::Str(s.clone())),
        other => Err(Error::InvalidPreference(format!(
            "'{}' has unsupported type {}",
            key,
            json_type_name(other)
        ))),
    }
}

fn pref_to_json(value: &PrefValue) -> serde_json::Value {
    match value {
        PrefValue::Bool(b) => serde_json::Value::Bool(*b),
        PrefValue::Int(i) => serde_json::Value::from(*i),
        PrefValue::Str(s) => serde_json::Value::String(s.clone()),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
