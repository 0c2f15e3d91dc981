//! Shared configuration for floodwatch tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `floodwatch_core::SyncConfig`. The CLI layers its
//! flag overrides on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use floodwatch_core::{SyncConfig, TlsVerification};

/// Environment variable that points at an alternate config file.
pub const CONFIG_PATH_ENV: &str = "FLOODWATCH_CONFIG";

/// Keyring service name for stored tokens.
pub const KEYRING_SERVICE: &str = "floodwatch";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_resync")]
    pub resync_on_reconnect: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            resync_on_reconnect: default_resync(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_resync() -> bool {
    true
}

/// A named backend profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// REST API base URL (e.g., "https://backend.example/api").
    pub api_url: String,

    /// Event-stream endpoint. Defaults to the API host when absent.
    pub stream_url: Option<String>,

    /// Bearer token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS verification.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Override reload-after-reconnect.
    pub resync_on_reconnect: Option<bool>,

    /// Periodic snapshot reload in seconds. 0 or absent = off.
    pub refresh_interval: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `FLOODWATCH_CONFIG` if set, otherwise
/// XDG / platform conventions.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("org", "floodwatch", "floodwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("floodwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file path. A missing file yields the defaults
/// (plus whatever the environment sets).
///
/// Environment keys nest on a double underscore:
/// `FLOODWATCH_DEFAULTS__TIMEOUT=10`, `FLOODWATCH_DEFAULT_PROFILE=prod`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FLOODWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is
/// unreadable.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the bearer token from the credential chain (no CLI flag step).
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Keyring account name for a profile's token.
pub fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/token")
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse a URL-valued field, naming the field on failure.
pub fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Stream endpoint used when a profile names none: the API origin with
/// the path replaced by `/`. The channel maps `http(s)` to `ws(s)`.
pub fn default_stream_url(api_url: &url::Url) -> url::Url {
    let mut url = api_url.clone();
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Pick the TLS mode from a profile, with an extra insecure override.
pub fn profile_tls(profile: &Profile, force_insecure: bool) -> TlsVerification {
    if force_insecure || profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

/// Build a `SyncConfig` from a profile, no CLI flag overrides.
///
/// `defaults` fills whatever the profile leaves unset.
pub fn profile_to_sync_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SyncConfig, ConfigError> {
    let api_url = parse_url("api_url", &profile.api_url)?;
    let stream_url = match profile.stream_url.as_deref() {
        Some(raw) => parse_url("stream_url", raw)?,
        None => default_stream_url(&api_url),
    };

    let credential = resolve_token(profile, profile_name)?;

    let mut config = SyncConfig::new(api_url, stream_url, credential);
    config.tls = profile_tls(profile, false);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.resync_on_reconnect = profile
        .resync_on_reconnect
        .unwrap_or(defaults.resync_on_reconnect);
    config.refresh_interval_secs = profile.refresh_interval.unwrap_or(0);
    Ok(config)
}
