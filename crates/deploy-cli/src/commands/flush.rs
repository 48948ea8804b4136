//! Flush command

use colored::Colorize;

use crate::context::Context;
use crate::error::Result;

/// Run the flush command
///
/// Empties every configured flush path and makes sure it exists afterwards.
pub fn run_flush(ctx: &Context) -> Result<()> {
    println!("{} Flushing directories...", "=>".blue().bold());

    let flushed = ctx.environments().flush_all()?;
    for path in &flushed {
        println!("   {} {}", "-".green(), path);
    }

    println!("{} done", "OK".green().bold());
    Ok(())
}
