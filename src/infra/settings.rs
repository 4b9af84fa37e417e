//! Usage: Persisted handoff settings (schema + read/write helpers).

use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 3;
const SCHEMA_VERSION_ADD_FAILURE_REDIRECT_DELAY: u32 = 2;
const SCHEMA_VERSION_ADD_LOOPBACK_PORT: u32 = 3;

pub const DEFAULT_EXCHANGE_URL: &str = "https://saviau.onrender.com/api/auth/google/finish";
pub const DEFAULT_PROFILE_STATUS_URL: &str = "https://saviau.onrender.com/api/auth/profile/status";
pub const DEFAULT_LOOPBACK_PORT: u16 = 8081;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 400;
pub const DEFAULT_DISCOVERY_DEADLINE_MS: u64 = 3000;
pub const DEFAULT_SUCCESS_REDIRECT_DELAY_MS: u64 = 1200;
pub const DEFAULT_FAILURE_REDIRECT_DELAY_MS: u64 = 900;

const MIN_POLL_INTERVAL_MS: u64 = 50;
const MAX_POLL_INTERVAL_MS: u64 = 10_000;
const MAX_DISCOVERY_DEADLINE_MS: u64 = 60_000;
const MAX_REDIRECT_DELAY_MS: u64 = 60_000;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffSettings {
    pub schema_version: u32,
    pub exchange_url: String,
    pub profile_status_url: String,
    pub loopback_port: u16,
    pub poll_interval_ms: u64,
    pub discovery_deadline_ms: u64,
    pub success_redirect_delay_ms: u64,
    pub failure_redirect_delay_ms: u64,
}

impl Default for HandoffSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            exchange_url: DEFAULT_EXCHANGE_URL.to_string(),
            profile_status_url: DEFAULT_PROFILE_STATUS_URL.to_string(),
            loopback_port: DEFAULT_LOOPBACK_PORT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            discovery_deadline_ms: DEFAULT_DISCOVERY_DEADLINE_MS,
            success_redirect_delay_ms: DEFAULT_SUCCESS_REDIRECT_DELAY_MS,
            failure_redirect_delay_ms: DEFAULT_FAILURE_REDIRECT_DELAY_MS,
        }
    }
}

fn sanitize_poll_interval(settings: &mut HandoffSettings) -> bool {
    let mut changed = false;

    if settings.poll_interval_ms < MIN_POLL_INTERVAL_MS {
        settings.poll_interval_ms = MIN_POLL_INTERVAL_MS;
        changed = true;
    }
    if settings.poll_interval_ms > MAX_POLL_INTERVAL_MS {
        settings.poll_interval_ms = MAX_POLL_INTERVAL_MS;
        changed = true;
    }

    changed
}

fn sanitize_discovery_deadline(settings: &mut HandoffSettings) -> bool {
    let mut changed = false;

    // The deadline must outlive at least one poll tick.
    if settings.discovery_deadline_ms < settings.poll_interval_ms {
        settings.discovery_deadline_ms = settings.poll_interval_ms;
        changed = true;
    }
    if settings.discovery_deadline_ms > MAX_DISCOVERY_DEADLINE_MS {
        settings.discovery_deadline_ms = MAX_DISCOVERY_DEADLINE_MS;
        changed = true;
    }

    changed
}

fn sanitize_redirect_delays(settings: &mut HandoffSettings) -> bool {
    let mut changed = false;

    if settings.success_redirect_delay_ms > MAX_REDIRECT_DELAY_MS {
        settings.success_redirect_delay_ms = MAX_REDIRECT_DELAY_MS;
        changed = true;
    }
    if settings.failure_redirect_delay_ms > MAX_REDIRECT_DELAY_MS {
        settings.failure_redirect_delay_ms = MAX_REDIRECT_DELAY_MS;
        changed = true;
    }

    changed
}

/// Generic schema migration helper for versions that only bump `schema_version`.
///
/// Returns `true` if the settings were modified (i.e. migration was applied).
fn migrate_bump_schema_version(
    settings: &mut HandoffSettings,
    schema_version_present: bool,
    target_version: u32,
) -> bool {
    if schema_version_present && settings.schema_version >= target_version {
        return false;
    }

    let mut changed = false;

    // If schema_version is missing, force a write to persist schema_version so we don't keep
    // "migrating" on every startup.
    if !schema_version_present {
        changed = true;
    }

    if settings.schema_version != target_version {
        settings.schema_version = target_version;
        changed = true;
    }

    changed
}

fn migrate_add_failure_redirect_delay(
    settings: &mut HandoffSettings,
    schema_version_present: bool,
) -> bool {
    // v2: Add failure_redirect_delay_ms (default 900).
    migrate_bump_schema_version(
        settings,
        schema_version_present,
        SCHEMA_VERSION_ADD_FAILURE_REDIRECT_DELAY,
    )
}

fn migrate_add_loopback_port(settings: &mut HandoffSettings, schema_version_present: bool) -> bool {
    // v3: Add loopback_port (default 8081).
    migrate_bump_schema_version(
        settings,
        schema_version_present,
        SCHEMA_VERSION_ADD_LOOPBACK_PORT,
    )
}

fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE)
}

fn parse_settings_json(content: &str) -> AppResult<(HandoffSettings, bool)> {
    let raw: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("failed to parse settings.json: {e}"))?;
    let schema_version_present = raw.get("schema_version").is_some();
    let settings: HandoffSettings =
        serde_json::from_value(raw).map_err(|e| format!("failed to parse settings.json: {e}"))?;
    Ok((settings, schema_version_present))
}

fn repair(settings: &mut HandoffSettings, schema_version_present: bool) -> bool {
    let mut repaired = false;
    repaired |= migrate_add_failure_redirect_delay(settings, schema_version_present);
    repaired |= migrate_add_loopback_port(settings, schema_version_present);
    repaired |= sanitize_poll_interval(settings);
    repaired |= sanitize_discovery_deadline(settings);
    repaired |= sanitize_redirect_delays(settings);
    repaired
}

pub fn read(dir: &Path) -> AppResult<HandoffSettings> {
    let path = settings_path(dir);

    if !path.exists() {
        let settings = HandoffSettings::default();
        // Best-effort: create default settings.json on first read to make the config discoverable/editable.
        let _ = write(dir, &settings);
        return Ok(settings);
    }

    let content =
        std::fs::read_to_string(&path).map_err(|e| format!("failed to read settings: {e}"))?;
    let (mut settings, schema_version_present) = parse_settings_json(&content)?;

    if repair(&mut settings, schema_version_present) {
        // Best-effort: persist repaired values while keeping read semantics.
        let _ = write(dir, &settings);
    }

    Ok(settings)
}

pub fn write(dir: &Path, settings: &HandoffSettings) -> AppResult<HandoffSettings> {
    if reqwest::Url::parse(&settings.exchange_url).is_err() {
        return Err("SEC_INVALID_INPUT: exchange_url must be a valid URL".into());
    }
    if reqwest::Url::parse(&settings.profile_status_url).is_err() {
        return Err("SEC_INVALID_INPUT: profile_status_url must be a valid URL".into());
    }
    if settings.poll_interval_ms < MIN_POLL_INTERVAL_MS {
        return Err(format!(
            "SEC_INVALID_INPUT: poll_interval_ms must be >= {MIN_POLL_INTERVAL_MS}"
        )
        .into());
    }
    if settings.poll_interval_ms > MAX_POLL_INTERVAL_MS {
        return Err(format!(
            "SEC_INVALID_INPUT: poll_interval_ms must be <= {MAX_POLL_INTERVAL_MS}"
        )
        .into());
    }
    if settings.discovery_deadline_ms < settings.poll_interval_ms {
        return Err("SEC_INVALID_INPUT: discovery_deadline_ms must be >= poll_interval_ms".into());
    }
    if settings.discovery_deadline_ms > MAX_DISCOVERY_DEADLINE_MS {
        return Err(format!(
            "SEC_INVALID_INPUT: discovery_deadline_ms must be <= {MAX_DISCOVERY_DEADLINE_MS}"
        )
        .into());
    }
    if settings.success_redirect_delay_ms > MAX_REDIRECT_DELAY_MS {
        return Err(format!(
            "SEC_INVALID_INPUT: success_redirect_delay_ms must be <= {MAX_REDIRECT_DELAY_MS}"
        )
        .into());
    }
    if settings.failure_redirect_delay_ms > MAX_REDIRECT_DELAY_MS {
        return Err(format!(
            "SEC_INVALID_INPUT: failure_redirect_delay_ms must be <= {MAX_REDIRECT_DELAY_MS}"
        )
        .into());
    }

    let path = settings_path(dir);
    let tmp_path = path.with_file_name("settings.json.tmp");
    let backup_path = path.with_file_name("settings.json.bak");

    let content = serde_json::to_vec_pretty(settings)
        .map_err(|e| format!("failed to serialize settings: {e}"))?;

    std::fs::write(&tmp_path, content)
        .map_err(|e| format!("failed to write temp settings file: {e}"))?;

    if backup_path.exists() {
        let _ = std::fs::remove_file(&backup_path);
    }

    if path.exists() {
        std::fs::rename(&path, &backup_path)
            .map_err(|e| format!("failed to create settings backup: {e}"))?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, &path) {
        let _ = std::fs::rename(&backup_path, &path);
        return Err(format!("failed to finalize settings: {e}").into());
    }

    if backup_path.exists() {
        let _ = std::fs::remove_file(&backup_path);
    }

    Ok(settings.clone())
}
