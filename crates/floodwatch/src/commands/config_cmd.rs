//! Config subcommand handlers.

use std::io::BufRead;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(
        out,
        "resync_on_reconnect = {}",
        cfg.defaults.resync_on_reconnect
    );

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "api_url = \"{}\"", p.api_url);
        if let Some(ref stream) = p.stream_url {
            let _ = writeln!(out, "stream_url = \"{stream}\"");
        }
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(resync) = p.resync_on_reconnect {
            let _ = writeln!(out, "resync_on_reconnect = {resync}");
        }
        if let Some(refresh) = p.refresh_interval {
            let _ = writeln!(out, "refresh_interval = {refresh}");
        }
    }

    out
}

/// Copy of the config with plaintext tokens masked, for structured output.
fn redacted(cfg: &Config) -> Config {
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: floodwatch_config::Defaults {
            output: cfg.defaults.output.clone(),
            timeout: cfg.defaults.timeout,
            resync_on_reconnect: cfg.defaults.resync_on_reconnect,
        },
        profiles: cfg
            .profiles
            .iter()
            .map(|(name, p)| {
                let mut p = p.clone();
                if p.token.is_some() {
                    p.token = Some("****".into());
                }
                (name.clone(), p)
            })
            .collect(),
    }
}

/// First non-empty line of stdin, trimmed.
fn read_secret_line() -> Result<String, CliError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let secret = line.trim().to_owned();
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(secret)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), false);
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!(
                    "No profiles configured. Add one to {}",
                    config::config_path().display()
                );
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                let lines: Vec<String> = names
                    .into_iter()
                    .map(|name| {
                        let marker = if name == default { " *" } else { "" };
                        format!("{name}{marker}")
                    })
                    .collect();
                output::print_output(&lines.join("\n"), global.quiet);
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        // ── SetToken ────────────────────────────────────────────────
        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name: profile_name,
                });
            }

            let secret = read_secret_line()?;
            let entry = keyring::Entry::new(
                floodwatch_config::KEYRING_SERVICE,
                &config::keyring_user(&profile_name),
            )
            .map_err(|e| CliError::Keyring(e.to_string()))?;
            entry
                .set_password(&secret)
                .map_err(|e| CliError::Keyring(e.to_string()))?;

            if !global.quiet {
                eprintln!("Token for '{profile_name}' stored in the system keyring");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use floodwatch_config::Profile;

    use super::*;

    #[test]
    fn show_masks_plaintext_tokens() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "jakarta".into(),
            Profile {
                api_url: "https://backend.example/api".into(),
                token: Some("s3cret".into()),
                token_env: Some("JKT_TOKEN".into()),
                ..Profile::default()
            },
        );

        let text = format_config_redacted(&redacted(&cfg));
        assert!(text.contains("[profiles.jakarta]"));
        assert!(text.contains("token = \"****\""));
        assert!(text.contains("token_env = \"JKT_TOKEN\""));
        assert!(!text.contains("s3cret"));
    }
}
