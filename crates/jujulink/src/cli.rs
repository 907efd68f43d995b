//! Clap derive structures for the `jujulink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jujulink_core::ProtocolGeneration;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// jujulink -- talk to Juju controllers over their WebSocket API
#[derive(Debug, Parser)]
#[command(
    name = "jujulink",
    version,
    about = "Drive Juju controllers from the command line",
    long_about = "A client for the Juju controller API.\n\n\
        Speaks both the current (2.x) and the legacy (1.x) RPC generations,\n\
        streams model changes from the mega-watcher, and wraps common\n\
        model operations.",
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
    /// Controller profile to use
    #[arg(long, short = 'p', env = "JUJULINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller address or API URL (overrides profile)
    #[arg(long, short = 'c', env = "JUJULINK_CONTROLLER", global = true)]
    pub controller: Option<String>,

    /// Model UUID (overrides profile)
    #[arg(long, short = 'm', env = "JUJULINK_MODEL", global = true)]
    pub model: Option<String>,

    /// User name (overrides profile)
    #[arg(long, short = 'u', env = "JUJULINK_USERNAME", global = true)]
    pub user: Option<String>,

    /// API generation spoken by the controller (overrides profile)
    #[arg(long, value_enum, env = "JUJULINK_PROTOCOL", global = true)]
    pub protocol: Option<ProtocolArg>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "JUJULINK_OUTPUT",
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

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "JUJULINK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "JUJULINK_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
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

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProtocolArg {
    /// Juju 2.x and later (kebab-case wire format)
    Modern,
    /// Juju 1.x (PascalCase wire format)
    Legacy,
}

impl From<ProtocolArg> for ProtocolGeneration {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Modern => Self::Modern,
            ProtocolArg::Legacy => Self::Legacy,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in to a controller and optionally remember the password
    Login(LoginArgs),

    /// Stream model changes from the mega-watcher
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// List models visible to the current user
    Models,

    /// Deploy a charm as a new application
    Deploy(DeployArgs),

    /// Manage cross-model offers
    Offers(OffersArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LOGIN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Store the password in the system keyring and the profile in the config file
    #[arg(long)]
    pub save: bool,

    /// Log in with a one-time token instead of a password (legacy controllers)
    #[arg(long, conflicts_with = "save")]
    pub token: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only show deltas for these entity kinds (application, unit, machine, ...)
    #[arg(long, short = 'K', value_delimiter = ',')]
    pub kinds: Vec<String>,

    /// Stop after this many batches
    #[arg(long, short = 'n')]
    pub batches: Option<usize>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEPLOY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Charm URL (e.g. `cs:xenial/mysql-55`); omit with --archive
    #[arg(required_unless_present = "archive")]
    pub charm: Option<String>,

    /// Application name (defaults to the charm name)
    #[arg(long, short = 'a')]
    pub application: Option<String>,

    /// Upload this zipped local charm and deploy it
    #[arg(long, conflicts_with = "charm", requires = "series")]
    pub archive: Option<PathBuf>,

    /// Series to deploy on
    #[arg(long)]
    pub series: Option<String>,

    /// Number of units
    #[arg(long, short = 'n', default_value = "1")]
    pub num_units: u32,

    /// Constraints, e.g. "cpu-cores=2 mem=4096"
    #[arg(long)]
    pub constraints: Option<String>,

    /// Placement, e.g. "lxd:2"
    #[arg(long)]
    pub to: Option<String>,

    /// Config option (repeatable)
    #[arg(long = "config", value_name = "KEY=VALUE")]
    pub config: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  OFFERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct OffersArgs {
    #[command(subcommand)]
    pub command: OffersCommand,
}

#[derive(Debug, Subcommand)]
pub enum OffersCommand {
    /// List offers of the current model
    #[command(alias = "ls")]
    List,

    /// Show one offer by URL
    Show {
        /// Offer URL, e.g. `local:/u/admin/default/mysql`
        url: String,
    },

    /// Offer application endpoints to other models
    Create {
        /// Application to offer
        application: String,

        /// Endpoints to expose
        #[arg(required = true)]
        endpoints: Vec<String>,

        /// Explicit offer URL
        #[arg(long)]
        url: Option<String>,

        /// Offer description
        #[arg(long)]
        description: Option<String>,

        /// Users allowed to consume the offer (default: everyone)
        #[arg(long = "allow", value_name = "USER")]
        allowed_users: Vec<String>,
    },
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
    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn archive_requires_series() {
        let err = Cli::try_parse_from(["jujulink", "deploy", "--archive", "x.zip"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn watch_kinds_split_on_commas() {
        let cli = Cli::try_parse_from(["jujulink", "watch", "--kinds", "unit,machine"]).unwrap();
        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.kinds, ["unit", "machine"]);
    }
}
