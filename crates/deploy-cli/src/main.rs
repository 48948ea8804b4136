//! Deployment tools CLI
//!
//! Flushes runtime directories, switches environments, reconciles
//! permissions and dumps the database of an application checkout.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands, EnvironmentAction};
use commands::DumpOverrides;
use context::Context;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber).map_err(|e| {
            CliError::user(format!("Failed to set tracing subscriber: {e}"))
        })?;
        tracing::debug!("Verbose mode enabled");
    }

    let Some(cmd) = cli.command else {
        println!("{} Deployment tools", "deploy".green().bold());
        println!();
        println!("Run {} for available commands.", "deploy --help".cyan());
        return Ok(());
    };

    let ctx = Context::load(cli.base_path.as_deref(), cli.config.as_deref())?;
    execute_command(&ctx, cmd)
}

fn execute_command(ctx: &Context, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Flush => commands::run_flush(ctx),
        Commands::Environment { action } => match action {
            EnvironmentAction::Change { id, no_permissions } => {
                commands::run_environment_change(ctx, &id, no_permissions)
            }
            EnvironmentAction::Create { id, from } => {
                commands::run_environment_create(ctx, &id, from.as_deref())
            }
            EnvironmentAction::List => commands::run_environment_list(ctx),
        },
        Commands::Permissions { json } => commands::run_permissions(ctx, json),
        Commands::Mysqldump {
            bin_path,
            dump_path,
            dump_file,
            database,
        } => commands::run_mysqldump(
            ctx,
            DumpOverrides {
                bin_path,
                dump_path,
                dump_file,
                database,
            },
        ),
    }
}
