use std::path::Path;

use convprefs::{JsonFileBackend, PrefMap, PrefStore, PrefValue};
use serde::Serialize;

/// Representation for array output format
#[derive(Debug, Serialize)]
struct PrefEntry<'a> {
    key: &'a str,
    value: &'a PrefValue,
}

fn open_store(file: &Path) -> PrefStore<JsonFileBackend> {
    PrefStore::new(JsonFileBackend::new(file))
}

/// Show the resolved preference set, optionally filtered by glob patterns
pub async fn show(
    file: &Path,
    query_patterns: &[&str],
    array: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(file);
    let prefs: PrefMap = if query_patterns.is_empty() {
        store.snapshot().await.map_err(|e| {
            anyhow::anyhow!(
                "Failed to load preferences from {}: {e}",
                file.display()
            )
        })?
    } else {
        store
            .query(query_patterns)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to apply query: {}", e))?
    };

    let json = if array {
        let entries: Vec<PrefEntry> = prefs
            .iter()
            .map(|(key, value)| PrefEntry { key, value })
            .collect();
        serde_json::to_string_pretty(&entries)?
    } else {
        serde_json::to_string_pretty(&prefs)?
    };

    println!("{}", json);
    Ok(())
}

/// Print a single preference value in raw form (no JSON wrapping)
pub async fn get(file: &Path, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(file);
    let value = store.get(key).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read '{}' from {}: {e}. Use 'convprefs show' to list known preferences.",
            key,
            file.display()
        )
    })?;
    println!("{}", value);
    Ok(())
}

/// Set a preference and persist the full set
pub async fn set(file: &Path, key: &str, raw: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(file);
    let value = parse_value(raw);
    store.set(key, value.clone()).await.map_err(|e| {
        anyhow::anyhow!("Failed to set '{}' in {}: {e}", key, file.display())
    })?;
    println!("{}", value);
    Ok(())
}

/// Restore a preference to its compiled-in default
pub async fn reset(file: &Path, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(file);
    let restored = store.reset(key).await.map_err(|e| {
        anyhow::anyhow!("Failed to reset '{}' in {}: {e}", key, file.display())
    })?;
    println!("{}", restored);
    Ok(())
}

/// Load the stored set, apply outstanding migrations, and persist the result
pub async fn migrate(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(file);
    store.init().await.map_err(|e| {
        anyhow::anyhow!("Failed to migrate {}: {e}", file.display())
    })?;
    let version = store.migrated_legacy().await?;
    println!("{} is at schema version {}", file.display(), version);
    Ok(())
}

/// Parse a command-line value as a JSON scalar, falling back to a bare string
fn parse_value(raw: &str) -> PrefValue {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Bool(b)) => PrefValue::Bool(b),
        Ok(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => PrefValue::Int(i),
            None => PrefValue::Str(raw.to_string()),
        },
        Ok(serde_json::Value::String(s)) => PrefValue::Str(s),
        _ => PrefValue::Str(raw.to_string()),
    }
}
