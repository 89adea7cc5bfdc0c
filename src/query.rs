use glob::Pattern;

use crate::error::{Error, Result};
use crate::types::PrefMap;

/// Query resolved preferences by glob patterns (OR logic)
/// Returns preferences matching any of the provided patterns
pub fn query_preferences(preferences: &PrefMap, patterns: &[&str]) -> Result<PrefMap> {
    // Compile all patterns first to fail fast on invalid patterns
    let compiled_patterns: Vec<Pattern> = patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| Error::InvalidGlobPattern(format!("'{}': {}", p, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    // Query preferences: keep if ANY pattern matches
    let queried: PrefMap = preferences
        .iter()
        .filter(|(key, _)| compiled_patterns.iter().any(|pattern| pattern.matches(key)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(queried)
}
