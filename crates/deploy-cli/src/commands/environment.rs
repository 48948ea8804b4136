//! Environment change, create and list commands

use colored::Colorize;

use crate::commands::permissions::print_report;
use crate::context::Context;
use crate::error::Result;

/// Run `environment change <id>`
///
/// Flushes, copies the environment over the base directory and, unless
/// `skip_permissions` is set, reconciles the configured permissions.
pub fn run_environment_change(ctx: &Context, id: &str, skip_permissions: bool) -> Result<()> {
    let mut manager = ctx.environments();
    let rules = (!skip_permissions).then(|| ctx.permission_rules());

    println!(
        "{} Changing environment to '{}'...",
        "=>".blue().bold(),
        id.cyan()
    );
    let report = manager.change(id, rules.as_deref())?;

    for path in &report.flushed {
        println!("   {} flushed {}", "-".green(), path);
    }
    println!("   {} copied {} entries", "+".green(), report.copied);
    if let Some(permissions) = &report.permissions {
        print_report(permissions);
    }

    println!(
        "{} Environment successfully changed to '{}'.",
        "OK".green().bold(),
        report.id
    );
    Ok(())
}

/// Run `environment create <id> [--from <other>]`
pub fn run_environment_create(ctx: &Context, id: &str, from: Option<&str>) -> Result<()> {
    let path = ctx.environments().create(id, from)?;
    match from {
        Some(from) => println!(
            "{} Created environment '{}' from '{}' at {}",
            "OK".green().bold(),
            id.cyan(),
            from,
            path
        ),
        None => println!(
            "{} Created environment '{}' at {}",
            "OK".green().bold(),
            id.cyan(),
            path
        ),
    }
    Ok(())
}

/// Run `environment list`
pub fn run_environment_list(ctx: &Context) -> Result<()> {
    let manager = ctx.environments();
    let ids = manager.list()?;

    if ids.is_empty() {
        println!(
            "No environments found in {}. Use {} to add one.",
            manager.environments_root(),
            "deploy environment create <id>".cyan()
        );
        return Ok(());
    }

    println!("{}", "Available Environments".bold());
    for id in &ids {
        println!("  {}", id.green());
    }
    Ok(())
}
