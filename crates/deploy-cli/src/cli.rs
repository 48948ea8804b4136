//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Deployment tools - flush, switch environments, fix permissions, dump the database
#[derive(Parser, Debug)]
#[command(name = "deploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Application base directory (defaults to the current directory)
    #[arg(long, global = true, env = "DEPLOY_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Config file, relative to the base directory (defaults to deploy.toml)
    #[arg(long, global = true, env = "DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Empty the runtime and asset directories
    Flush,

    /// Manage environments
    ///
    /// Examples:
    ///   deploy environment change prod     # Activate the "prod" environment
    ///   deploy environment create qa --from dev
    ///   deploy environment list
    Environment {
        #[command(subcommand)]
        action: EnvironmentAction,
    },

    /// Apply the configured owners, groups and modes
    Permissions {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Dump the database into a file with mysqldump
    Mysqldump {
        /// Path to the mysqldump binary
        #[arg(long)]
        bin_path: Option<String>,

        /// Dump directory, relative to the base directory
        #[arg(long)]
        dump_path: Option<String>,

        /// Name of the dump file
        #[arg(long)]
        dump_file: Option<String>,

        /// Database to dump instead of the one in the connection string
        #[arg(long)]
        database: Option<String>,
    },
}

/// Environment subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentAction {
    /// Flush directories and copy an environment over the base directory
    Change {
        /// Environment id (a directory under the environments dir)
        id: String,

        /// Do not reconcile permissions after copying
        #[arg(long)]
        no_permissions: bool,
    },

    /// Create a new environment directory
    Create {
        /// Environment id
        id: String,

        /// Copy the files of an existing environment
        #[arg(long)]
        from: Option<String>,
    },

    /// List available environments
    List,
}
