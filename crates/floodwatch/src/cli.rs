//! Clap derive structures for the `floodwatch` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use floodwatch_core::{AlertType, FloodLevel};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// floodwatch -- live view of flood and water quality sensor stations
#[derive(Debug, Parser)]
#[command(
    name = "floodwatch",
    version,
    about = "Monitor flood and water quality sensors from the command line",
    long_about = "Reads device, connectivity and alert state from a floodwatch backend.\n\n\
        One-shot commands list the current snapshot; `watch` attaches to the\n\
        live event stream and prints every change.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "FLOODWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// REST API base URL (overrides profile)
    #[arg(long, env = "FLOODWATCH_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Event stream URL (overrides profile)
    #[arg(long, env = "FLOODWATCH_STREAM_URL", global = true)]
    pub stream_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "FLOODWATCH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLOODWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FLOODWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FLOODWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Online,
    Offline,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List devices with connectivity and alert state
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Show one device in detail
    Device {
        /// Device id
        id: String,
    },

    /// List active alerts
    #[command(alias = "a")]
    Alerts(AlertsArgs),

    /// Fleet-wide counts
    Summary,

    /// Attach to the event stream and print every change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Filter Arguments ──────────────────────────────────────────

/// Device selection shared by `devices` and `watch`.
#[derive(Debug, Args)]
pub struct DeviceFilterArgs {
    /// Only devices with these ids
    #[arg(long = "id", value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Only online or offline devices
    #[arg(long)]
    pub status: Option<StatusArg>,

    /// Only devices with a visible active alert
    #[arg(long)]
    pub alerting: bool,

    /// Only devices with a visible active alert of this type
    #[arg(long = "alert-type")]
    pub alert_type: Option<AlertType>,

    /// Only devices at or above this flood level (normal, waspada, siaga, awas)
    #[arg(long = "min-level")]
    pub min_level: Option<FloodLevel>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(flatten)]
    pub filter: DeviceFilterArgs,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ALERTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct AlertsArgs {
    /// Only alerts of this type (flood, rapid_rise, critical_water_quality)
    #[arg(long = "type")]
    pub alert_type: Option<AlertType>,

    /// Only alerts for this device
    #[arg(long)]
    pub device: Option<String>,

    /// Include alerts of offline devices, which are normally hidden
    #[arg(long)]
    pub include_offline: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: DeviceFilterArgs,

    /// Print the fleet summary after each change
    #[arg(long)]
    pub summary: bool,

    /// Reload the snapshot every N seconds (overrides profile)
    #[arg(long)]
    pub refresh: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current configuration (secrets masked)
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a token in the system keyring (read from stdin)
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
