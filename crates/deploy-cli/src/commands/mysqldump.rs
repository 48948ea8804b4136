//! Mysqldump command

use colored::Colorize;

use deploy_process::{Mysqldump, ProcessRunner};

use crate::context::Context;
use crate::error::Result;

/// Command-line overrides for the `[mysqldump]` config section.
#[derive(Debug, Default)]
pub struct DumpOverrides {
    pub bin_path: Option<String>,
    pub dump_path: Option<String>,
    pub dump_file: Option<String>,
    pub database: Option<String>,
}

/// Build the configured dump with command-line overrides applied.
pub fn build_dump(ctx: &Context, overrides: DumpOverrides) -> Mysqldump {
    let mut config = ctx.config.mysqldump.clone();
    if overrides.bin_path.is_some() {
        config.bin_path = overrides.bin_path;
    }
    if let Some(dump_path) = overrides.dump_path {
        config.dump_path = dump_path;
    }
    if let Some(dump_file) = overrides.dump_file {
        config.dump_file = dump_file;
    }

    let dump = Mysqldump::new(config, ctx.config.database.clone(), ctx.base.clone());
    match overrides.database {
        Some(database) => dump.with_database(database),
        None => dump,
    }
}

/// Run the mysqldump command
///
/// A non-zero exit of mysqldump becomes the exit code of this command.
pub fn run_mysqldump(ctx: &Context, overrides: DumpOverrides) -> Result<()> {
    let dump = build_dump(ctx, overrides);
    println!(
        "{} Running command: {} ...",
        "=>".blue().bold(),
        dump.command_line()?.to_string().dimmed()
    );

    let report = dump.run(&mut ProcessRunner::new())?;
    println!(
        "{} Database dumped to {}",
        "OK".green().bold(),
        report.path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_test_utils::TestTree;

    #[test]
    fn overrides_replace_config_values() {
        let tree = TestTree::new();
        tree.write(
            "deploy.toml",
            "[mysqldump]\nbin_path = \"/usr/bin/mysqldump\"\ndump_file = \"a.sql\"\n\n[database]\ndsn = \"mysql:host=db;dbname=app\"\n",
        );
        let ctx = Context::load(Some(tree.root()), None).unwrap();

        let dump = build_dump(
            &ctx,
            DumpOverrides {
                dump_file: Some("b.sql".into()),
                database: Some("other".into()),
                ..DumpOverrides::default()
            },
        );

        assert_eq!(dump.resolve_bin_path(), "/usr/bin/mysqldump");
        assert_eq!(dump.config().dump_file, "b.sql");
        assert_eq!(dump.config().dump_path, "protected/data");
        assert_eq!(dump.resolve_database_name().unwrap(), "other");
    }
}
