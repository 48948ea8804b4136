//! Permissions command and report rendering

use colored::Colorize;

use deploy_fs::{PermissionEntry, PermissionOutcome, PermissionReport, reconcile_permissions};

use crate::context::Context;
use crate::error::Result;

/// Run the permissions command
///
/// Problems with individual paths are reported but never fail the command.
pub fn run_permissions(ctx: &Context, json: bool) -> Result<()> {
    let rules = ctx.permission_rules();
    let report = reconcile_permissions(&ctx.base, &rules);

    if json {
        println!("{}", serde_json::to_string_pretty(&report.entries)?);
        return Ok(());
    }

    println!("{} Changing permissions...", "=>".blue().bold());
    print_report(&report);
    Ok(())
}

/// Print one line per change or problem, then a summary.
pub fn print_report(report: &PermissionReport) {
    for entry in &report.entries {
        if let Some(line) = describe(entry) {
            println!("   {line}");
        }
    }

    let failures = report.failures().count();
    if failures == 0 {
        println!("{} Permissions successfully changed.", "OK".green().bold());
    } else {
        println!(
            "{} Permissions applied with {} problem(s).",
            "WARN".yellow().bold(),
            failures
        );
    }
}

/// Human-readable line for an entry; `None` when nothing happened.
pub fn describe(entry: &PermissionEntry) -> Option<String> {
    let path = &entry.path;
    match &entry.outcome {
        PermissionOutcome::NotFound => Some(format!(
            "Failed to change permissions for {path}. File does not exist!"
        )),
        PermissionOutcome::Unchanged { .. } => None,
        PermissionOutcome::Changed {
            attribute,
            old,
            new,
        } => Some(format!(
            "Changing {attribute} for {path} ({old} => {new})... {}",
            "done".green()
        )),
        PermissionOutcome::Failed {
            attribute,
            old,
            new,
            message,
        } => Some(format!(
            "Changing {attribute} for {path} ({} => {new})... {}: {message}",
            old.as_deref().unwrap_or("?"),
            "failed".red()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_fs::{Attribute, NormalizedPath};

    fn entry(outcome: PermissionOutcome) -> PermissionEntry {
        PermissionEntry {
            path: NormalizedPath::new("/app/assets"),
            outcome,
        }
    }

    #[test]
    fn describes_mode_change() {
        colored::control::set_override(false);
        let line = describe(&entry(PermissionOutcome::Changed {
            attribute: Attribute::Mode,
            old: "0644".into(),
            new: "0777".into(),
        }));
        assert_eq!(
            line.as_deref(),
            Some("Changing mode for /app/assets (0644 => 0777)... done")
        );
    }

    #[test]
    fn describes_missing_path() {
        let line = describe(&entry(PermissionOutcome::NotFound)).unwrap();
        assert_eq!(
            line,
            "Failed to change permissions for /app/assets. File does not exist!"
        );
    }

    #[test]
    fn unchanged_is_silent() {
        let line = describe(&entry(PermissionOutcome::Unchanged {
            attribute: Attribute::Owner,
            value: "www-data".into(),
        }));
        assert_eq!(line, None);
    }

    #[test]
    fn json_uses_outcome_tag() {
        let json = serde_json::to_value(entry(PermissionOutcome::Changed {
            attribute: Attribute::Group,
            old: "root".into(),
            new: "www-data".into(),
        }))
        .unwrap();
        assert_eq!(json["path"], "/app/assets");
        assert_eq!(json["outcome"], "changed");
        assert_eq!(json["attribute"], "group");
        assert_eq!(json["new"], "www-data");
    }
}
