//! Settings loading.
//!
//! Layers, lowest priority first:
//! 1. [`GateSettings::default()`]
//! 2. `~/.popgate/settings.json`, deep-merged over the defaults
//! 3. `POPGATE_*` environment variables
//!
//! Objects merge per key. Arrays and scalars in the file replace the default
//! outright. `null` in the file keeps the default.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::GateSettings;

/// `~/.popgate/settings.json`, or `/tmp/.popgate/settings.json` without `HOME`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".popgate").join("settings.json")
}

/// Load settings from [`settings_path`] with env overrides applied.
pub fn load_settings() -> Result<GateSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env overrides applied.
///
/// A missing file yields the defaults. Unreadable files, malformed JSON and
/// out-of-range values are errors.
pub fn load_settings_from_path(path: &Path) -> Result<GateSettings> {
    let defaults = serde_json::to_value(GateSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "no settings file, using defaults");
        defaults
    };

    let mut settings: GateSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Merge `source` over `target`, recursing into objects.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `POPGATE_*` overrides. Values that fail to parse or fall outside
/// their range are logged and ignored.
pub fn apply_env_overrides(settings: &mut GateSettings) {
    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("POPGATE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("POPGATE_LOG_JSON") {
        settings.logging.json = v;
    }

    // ── Hooks ───────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("POPGATE_CACHE_TTL_MS", 1, 86_400_000) {
        settings.hooks.cache_ttl_ms = v;
    }
    if let Some(v) = read_env_u64("POPGATE_HOOK_TIMEOUT_MS", 1, 600_000) {
        settings.hooks.default_timeout_ms = v;
    }

    // ── Triggers ────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("POPGATE_SCROLL_DEBOUNCE_MS", 0, 10_000) {
        settings.triggers.scroll_debounce_ms = v;
    }
    if let Some(v) = read_env_u64("POPGATE_EXIT_INTENT_DELAY_MS", 0, 600_000) {
        settings.triggers.exit_intent_delay_ms = v;
    }
    if let Some(v) = read_env_bool("POPGATE_EXIT_INTENT_ALLOW_MOBILE") {
        settings.triggers.exit_intent_allow_mobile = v;
    }

    // ── Signals ─────────────────────────────────────────────────────
    if let Some(v) = read_env_usize("POPGATE_SIGNAL_CAPACITY", 1, 65_536) {
        settings.signals.capacity = v;
    }
}

// ── Parsers ─────────────────────────────────────────────────────────────────

/// Parse `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, case-insensitive.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u64` within `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `usize` within `min..=max`.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Env readers ─────────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
