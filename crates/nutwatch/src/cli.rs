//! Clap derive structures for the `nutwatch` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this module may
//! only depend on clap and clap_complete.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// nutwatch -- watch UPS devices through a Network UPS Tools server
#[derive(Debug, Parser)]
#[command(
    name = "nutwatch",
    version,
    about = "Monitor UPS devices through a Network UPS Tools (upsd) server",
    long_about = "Polls a NUT upsd over its TCP protocol and reports battery level,\n\
        charging state, load, voltages and fault status for each UPS.",
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
    /// upsd host (overrides config)
    #[arg(long, short = 'H', global = true)]
    pub host: Option<String>,

    /// upsd port (overrides config)
    #[arg(long, short = 'P', global = true)]
    pub port: Option<u16>,

    /// Polling interval in seconds, 0 disables polling (overrides config)
    #[arg(long, global = true)]
    pub polling: Option<u64>,

    /// Low-battery threshold in percent (overrides config)
    #[arg(long, global = true)]
    pub threshold: Option<i64>,

    /// Connect/request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "NUTWATCH_OUTPUT",
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

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
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

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the UPS devices upsd knows about
    #[command(alias = "ls")]
    List,

    /// Check each UPS once and show its status
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Dump every variable reported for a UPS
    Vars(VarsArgs),

    /// Poll continuously and print each status change until Ctrl-C
    Watch(WatchArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// UPS names to check (default: all)
    #[arg(value_name = "UPS")]
    pub ups: Vec<String>,
}

#[derive(Debug, Args)]
pub struct VarsArgs {
    /// UPS name as known to upsd
    #[arg(value_name = "UPS")]
    pub ups: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// UPS names to watch (default: all)
    #[arg(value_name = "UPS")]
    pub ups: Vec<String>,

    /// Polling interval in seconds when none is configured
    #[arg(
        long,
        short = 'i',
        default_value = "5",
        value_parser = clap::value_parser!(u64).range(1..=86_400)
    )]
    pub interval: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Store the upsd password for the configured host in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
