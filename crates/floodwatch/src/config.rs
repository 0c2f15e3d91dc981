//! CLI configuration, a thin wrapper around `floodwatch_config`.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--api-url, --token, etc.).

use std::time::Duration;

use secrecy::SecretString;

use floodwatch_core::SyncConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use floodwatch_config::{
    Config, Profile, config_path, keyring_user, load_config, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated sorted profile names, or `(none)`.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

/// Build a `SyncConfig` from the config file, profile, and CLI overrides.
pub fn build_sync_config(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, &cfg, global);
    }

    // An explicitly requested profile must exist.
    if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
        });
    }

    // No profile: build from flags / env vars alone.
    let api_raw = global.api_url.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let profile = Profile {
        api_url: api_raw.to_owned(),
        ..Profile::default()
    };
    resolve_profile(&profile, &profile_name, &cfg, global)
}

/// Translate a `Profile` + global flags into a `SyncConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<SyncConfig, CliError> {
    // 1. Endpoints (flag > env > profile)
    let api_raw = global.api_url.as_deref().unwrap_or(&profile.api_url);
    let api_url = floodwatch_config::parse_url("api_url", api_raw)?;
    let stream_url = match global.stream_url.as_deref().or(profile.stream_url.as_deref()) {
        Some(raw) => floodwatch_config::parse_url("stream_url", raw)?,
        None => floodwatch_config::default_stream_url(&api_url),
    };

    // 2. Credential (flag first, then the shared chain)
    let credential = resolve_token_with_flag(profile, profile_name, global)?;

    let mut sync = SyncConfig::new(api_url, stream_url, credential);

    // 3. TLS verification
    sync.tls = floodwatch_config::profile_tls(profile, global.insecure);

    // 4. Timeout and refresh behavior
    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(cfg.defaults.timeout);
    sync.timeout = Duration::from_secs(timeout);
    sync.resync_on_reconnect = profile
        .resync_on_reconnect
        .unwrap_or(cfg.defaults.resync_on_reconnect);
    sync.refresh_interval_secs = profile.refresh_interval.unwrap_or(0);

    Ok(sync)
}

/// Resolve the token with CLI flag override, then fall through to
/// shared resolution.
fn resolve_token_with_flag(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<SecretString, CliError> {
    if let Some(ref token) = global.token {
        return Ok(SecretString::from(token.clone()));
    }
    Ok(floodwatch_config::resolve_token(profile, profile_name)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["floodwatch"];
        argv.extend_from_slice(args);
        argv.push("summary");
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn flags_override_profile() {
        let profile = Profile {
            api_url: "https://profile.example/api".into(),
            stream_url: Some("wss://profile.example/events".into()),
            token: Some("profile-token".into()),
            timeout: Some(5),
            ..Profile::default()
        };
        let opts = global(&[
            "--api-url",
            "http://127.0.0.1:3000/api",
            "--token",
            "flag-token",
            "--timeout",
            "9",
        ]);

        let sync = resolve_profile(&profile, "test", &Config::default(), &opts).unwrap();
        assert_eq!(sync.api_url.as_str(), "http://127.0.0.1:3000/api");
        assert_eq!(sync.stream_url.as_str(), "wss://profile.example/events");
        assert_eq!(sync.credential.expose_secret(), "flag-token");
        assert_eq!(sync.timeout, Duration::from_secs(9));
    }

    #[test]
    fn profile_fills_unset_flags() {
        let profile = Profile {
            api_url: "https://profile.example/api".into(),
            token: Some("profile-token".into()),
            timeout: Some(5),
            refresh_interval: Some(300),
            ..Profile::default()
        };
        let opts = global(&["--token", "t"]);

        let sync = resolve_profile(&profile, "test", &Config::default(), &opts).unwrap();
        assert_eq!(sync.stream_url.as_str(), "https://profile.example/");
        assert_eq!(sync.timeout, Duration::from_secs(5));
        assert_eq!(sync.refresh_interval_secs, 300);
        assert!(sync.resync_on_reconnect);
    }
}
