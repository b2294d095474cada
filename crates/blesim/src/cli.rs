//! Clap derive structures for the `blesim` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// blesim -- configurable BLE peripheral simulator
#[derive(Debug, Parser)]
#[command(
    name = "blesim",
    version,
    about = "Simulate a BLE peripheral from a JSON device configuration",
    long_about = "Turns a declarative JSON description of GATT services into a live\n\
        simulated peripheral, with an HTTP control plane for inspecting and\n\
        changing its state and hot-reloading its configuration.",
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
    /// Settings file (TOML); defaults to the platform config directory
    #[arg(long, short = 's', env = "BLESIM_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Device configuration (JSON); overrides settings and BLE_DEVICE_CONFIG
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Advertised device name; overrides the configuration
    #[arg(long, global = true)]
    pub device_name: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the simulator and its HTTP control plane
    #[command(alias = "run")]
    Serve(ServeArgs),

    /// Validate a device configuration and list its characteristics
    Check,

    /// Print the effective settings
    Settings,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// HTTP bind host
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP bind port
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Disable the simulated value drift
    #[arg(long)]
    pub no_drift: bool,

    /// Start with the radio powered off
    #[arg(long)]
    pub powered_off: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
