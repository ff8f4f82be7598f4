pub mod commands;
pub mod config;

use std::path::Path;

use clap::{Args, Parser, Subcommand};
use gs_domain::config::Config;

/// gardena — query and control a Gardena smart system from the shell.
#[derive(Debug, Parser)]
#[command(name = "gardena", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check whether an access token can be obtained.
    LoginStatus,
    /// List locations (id → name). Cached after the first call.
    Locations,
    /// Fetch the device graph of every location.
    Devices,
    /// Fetch the device graph of one location.
    Location {
        /// Location id.
        id: String,
    },
    /// Send a VALVE_CONTROL command.
    Valve(ControlArgs),
    /// Send a MOWER_CONTROL command.
    Mower(ControlArgs),
    /// Send a POWER_SOCKET_CONTROL command.
    PowerSocket(ControlArgs),
    /// Print the current status of one service.
    ServiceStatus {
        /// Service id.
        id: String,
        /// Service type (e.g. VALVE, MOWER, POWER_SOCKET, SENSOR).
        #[arg(value_name = "TYPE")]
        service_type: String,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Args)]
pub struct ControlArgs {
    /// Service id the command is sent to.
    pub service_id: String,
    /// Operation, e.g. START_SECONDS_TO_OVERRIDE or STOP_UNTIL_NEXT_TASK.
    pub operation: String,
    /// Duration in minutes (required for START_SECONDS_TO_OVERRIDE).
    #[arg(long)]
    pub minutes: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `GARDENA_CONFIG` (or
/// `gardena.toml` by default). Returns the parsed [`Config`] and the path
/// that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("GARDENA_CONFIG").unwrap_or_else(|_| "gardena.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

/// Parse the config at `path`; a missing file yields the defaults.
pub fn load_config_from(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        return Ok(Config::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))
}
