//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`WordspotSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `WORDSPOT_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use wordspot_classifier::FrameOverflow;

use crate::errors::{Result, SettingsError};
use crate::types::WordspotSettings;

/// Settings file looked up when no path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "wordspot.json";

/// Resolve the default settings file path (`./wordspot.json`).
pub fn settings_path() -> PathBuf {
    PathBuf::from(".").join(DEFAULT_SETTINGS_FILE)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<WordspotSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<WordspotSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<WordspotSettings> {
    let defaults = serde_json::to_value(WordspotSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut WordspotSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`, keyed by `WORDSPOT_*` variable name.
pub fn apply_overrides(settings: &mut WordspotSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read_string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let read_usize = |name: &str, min: usize, max: usize| {
        let val = lookup(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    };

    // ── Artifacts ───────────────────────────────────────────────────
    if let Some(v) = read_string("WORDSPOT_MODEL_PATH") {
        settings.artifacts.model_path = v.into();
    }
    if let Some(v) = read_string("WORDSPOT_LABELS_PATH") {
        settings.artifacts.labels_path = v.into();
    }
    if let Some(v) = read_usize("WORDSPOT_INTRA_THREADS", 1, 64) {
        settings.artifacts.intra_threads = v;
    }

    // ── Features ────────────────────────────────────────────────────
    if let Some(v) = read_usize("WORDSPOT_MAX_FRAMES", 1, 4096) {
        settings.features.max_frames = v;
    }
    if let Some(val) = read_string("WORDSPOT_FRAME_OVERFLOW") {
        match parse_overflow(&val) {
            Some(mode) => settings.features.overflow = mode,
            None => {
                tracing::warn!(key = "WORDSPOT_FRAME_OVERFLOW", value = %val, "invalid overflow mode, ignoring");
            }
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_string("WORDSPOT_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject settings no predictor could be built from.
pub fn validate(settings: &WordspotSettings) -> Result<()> {
    if settings.artifacts.intra_threads == 0 {
        return Err(SettingsError::InvalidValue(
            "artifacts.intraThreads must be at least 1".into(),
        ));
    }
    settings
        .features
        .validate()
        .map_err(|e| SettingsError::InvalidValue(format!("features: {e}")))
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a frame overflow policy (`reject` or `truncate`, case-insensitive).
pub fn parse_overflow(val: &str) -> Option<FrameOverflow> {
    match val.to_lowercase().as_str() {
        "reject" => Some(FrameOverflow::Reject),
        "truncate" => Some(FrameOverflow::Truncate),
        _ => None,
    }
}
