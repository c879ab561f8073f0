//! Clap derive structures for the `iotdata` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ───────────────────────────────────────────────────

/// iotdata — operations console for the IoTData telemetry platform
#[derive(Debug, Parser)]
#[command(
    name = "iotdata",
    version,
    about = "Watch device telemetry, manage access, and audit actions",
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

// ── Global Options ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "IOTDATA_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend URL (overrides profile and stored session)
    #[arg(long, short = 's', env = "IOTDATA_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token (overrides the stored session)
    #[arg(long, env = "IOTDATA_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Role to assume with --token (user, support, admin, master)
    #[arg(long, env = "IOTDATA_ROLE", global = true)]
    pub role: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "IOTDATA_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "IOTDATA_INSECURE", global = true)]
    pub insecure: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ──────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session token
    Login(LoginArgs),

    /// Discard the stored session
    Logout,

    /// Watch inbound messages grouped by device
    #[command(alias = "mon", alias = "m")]
    Monitor(MonitorArgs),

    /// List and rename devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Manage per-device access grants
    #[command(alias = "acl")]
    Access(AccessArgs),

    /// Manage user accounts
    #[command(alias = "u")]
    Users(UsersArgs),

    /// Show the audit trail
    Audit(AuditArgs),
}

// ── Login ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username (prompted when omitted)
    pub username: Option<String>,
}

// ── Monitor ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Filter groups by device name or ESN
    #[arg(long)]
    pub search: Option<String>,

    /// Print one snapshot and exit instead of watching
    #[arg(long)]
    pub once: bool,

    /// Messages to show per device group
    #[arg(long, default_value = "5")]
    pub tail: usize,
}

// ── Devices ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices with message counts
    #[command(alias = "ls")]
    List,

    /// Rename a device
    Rename {
        /// Device ESN
        esn: String,
        /// New display name
        name: String,
    },
}

// ── Access ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AccessArgs {
    #[command(subcommand)]
    pub command: AccessCommand,
}

#[derive(Debug, Subcommand)]
pub enum AccessCommand {
    /// Show the permission matrix for one user (granted devices first)
    Show {
        /// Username to inspect
        username: String,
    },

    /// Grant a user access to a device
    Grant {
        username: String,
        /// Device ESN
        esn: String,
    },

    /// Revoke a user's access to a device
    Revoke {
        username: String,
        /// Device ESN
        esn: String,
    },
}

// ── Users ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RoleArg {
    User,
    Support,
    Admin,
    Master,
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// List user accounts
    #[command(alias = "ls")]
    List,

    /// Create a user account (password is prompted)
    Create {
        username: String,

        #[arg(long, value_enum, default_value = "user")]
        role: RoleArg,

        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        state: Option<String>,
    },

    /// Update an existing account's details
    Update {
        username: String,

        #[arg(long, value_enum)]
        role: Option<RoleArg>,

        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        state: Option<String>,

        /// Prompt for a new password
        #[arg(long)]
        password: bool,
    },

    /// Delete a user account
    #[command(alias = "rm")]
    Delete { username: String },
}

// ── Audit ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Filter entries by username, action, or details
    #[arg(long)]
    pub search: Option<String>,
}
