//! mysqldump integration
//!
//! Builds a mysqldump command line from [`MysqldumpConfig`] and a
//! [`ConnectionConfig`], then runs it with stdout redirected to the dump file.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, info};

use deploy_fs::{DirectorySync, Error as FsError, NormalizedPath, OrderedMap};

use crate::descriptor::{DescriptorMap, Redirect};
use crate::error::{ProcessError, Result};
use crate::runner::{CommandLine, ProcessRunner, ProcessSpec};

const DEFAULT_BIN: &str = "mysqldump";

fn default_dump_path() -> String {
    "protected/data".to_string()
}

fn default_dump_file() -> String {
    "dump.sql".to_string()
}

/// `[mysqldump]` section of the deployment config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MysqldumpConfig {
    /// Binary to run; looked up on `PATH` when unset.
    pub bin_path: Option<String>,
    /// Directory for the dump, relative to the base directory.
    pub dump_path: String,
    pub dump_file: String,
    /// Extra `--name=value` options, rendered in document order.
    pub options: OrderedMap<String>,
}

impl Default for MysqldumpConfig {
    fn default() -> Self {
        Self {
            bin_path: None,
            dump_path: default_dump_path(),
            dump_file: default_dump_file(),
            options: OrderedMap::new(),
        }
    }
}

/// `[database]` section: how to reach the database being dumped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Connection string, e.g. `mysql:host=localhost;dbname=app`.
    pub dsn: String,
    pub username: String,
    pub password: String,
}

/// Parsed connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dsn {
    pub driver: String,
    pub host: Option<String>,
    pub database: Option<String>,
    /// Every `key=value` pair, in order, including `host` and `dbname`.
    pub params: Vec<(String, String)>,
}

/// Parse `driver:key=value;key=value`.
///
/// # Errors
///
/// Returns [`ProcessError::Config`] if there is no `driver:` prefix or a
/// parameter has no `=`.
pub fn parse_dsn(dsn: &str) -> Result<Dsn> {
    let (driver, rest) = dsn
        .split_once(':')
        .ok_or_else(|| ProcessError::config(format!("Invalid connection string '{dsn}'")))?;
    if driver.trim().is_empty() {
        return Err(ProcessError::config(format!(
            "Invalid connection string '{dsn}': missing driver"
        )));
    }

    let mut parsed = Dsn {
        driver: driver.trim().to_string(),
        ..Dsn::default()
    };
    for part in rest.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part.split_once('=').ok_or_else(|| {
            ProcessError::config(format!(
                "Invalid connection string '{dsn}': expected key=value, got '{part}'"
            ))
        })?;
        let (key, value) = (key.trim(), value.trim());
        match key {
            "host" => parsed.host = Some(value.to_string()),
            "dbname" => parsed.database = Some(value.to_string()),
            _ => {}
        }
        parsed.params.push((key.to_string(), value.to_string()));
    }
    Ok(parsed)
}

/// Outcome of a successful dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpReport {
    pub path: PathBuf,
    pub exit_code: i32,
}

/// A configured mysqldump run against one base directory.
#[derive(Debug, Clone)]
pub struct Mysqldump {
    config: MysqldumpConfig,
    connection: ConnectionConfig,
    base: NormalizedPath,
    database_override: Option<String>,
}

impl Mysqldump {
    pub fn new(
        config: MysqldumpConfig,
        connection: ConnectionConfig,
        base: impl Into<NormalizedPath>,
    ) -> Self {
        Self {
            config,
            connection,
            base: base.into(),
            database_override: None,
        }
    }

    /// Dump `database` instead of the one named in the connection string.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database_override = Some(database.into());
        self
    }

    pub fn config(&self) -> &MysqldumpConfig {
        &self.config
    }

    pub fn resolve_bin_path(&self) -> &str {
        self.config.bin_path.as_deref().unwrap_or(DEFAULT_BIN)
    }

    /// Configured options with `user`, `password` and `host` filled in from
    /// the connection when not set explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Config`] if `host` must come from a connection
    /// string that cannot be parsed.
    pub fn resolve_options(&self) -> Result<OrderedMap<String>> {
        let mut options = self.config.options.clone();
        if !options.contains_key("user") {
            options.insert("user", self.connection.username.clone());
        }
        if !options.contains_key("password") {
            options.insert("password", self.connection.password.clone());
        }
        if !options.contains_key("host") {
            let host = parse_dsn(&self.connection.dsn)?.host.unwrap_or_default();
            options.insert("host", host);
        }
        Ok(options)
    }

    /// Options as they would be typed in a shell: `--name="value"`.
    ///
    /// # Errors
    ///
    /// See [`Mysqldump::resolve_options`].
    pub fn option_string(&self) -> Result<String> {
        let options = self.resolve_options()?;
        let rendered: Vec<String> = options
            .iter()
            .map(|(name, value)| format!("--{name}=\"{value}\""))
            .collect();
        Ok(rendered.join(" "))
    }

    /// Database to dump.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Config`] if neither an override nor a `dbname`
    /// in the connection string is available.
    pub fn resolve_database_name(&self) -> Result<String> {
        if let Some(db) = &self.database_override {
            return Ok(db.clone());
        }
        parse_dsn(&self.connection.dsn)?
            .database
            .filter(|db| !db.is_empty())
            .ok_or_else(|| {
                ProcessError::config(
                    "Failed to resolve database name. Set dbname in the connection string or pass a database",
                )
            })
    }

    /// Absolute path of the dump file; creates the dump directory if needed.
    ///
    /// # Errors
    ///
    /// Returns a filesystem error if the directory cannot be created or resolved.
    pub fn resolve_dump_path(&self) -> Result<PathBuf> {
        let sync = DirectorySync::new(self.base.clone());
        let dir = sync.resolve(&self.config.dump_path);
        sync.ensure_directory(&dir)?;
        let native = dir.to_native();
        let canonical = native
            .canonicalize()
            .map_err(|e| FsError::io(&native, e))?;
        Ok(canonical.join(&self.config.dump_file))
    }

    /// `<bin> --name=value ... <database>`, with the password masked on display.
    ///
    /// # Errors
    ///
    /// See [`Mysqldump::resolve_options`] and [`Mysqldump::resolve_database_name`].
    pub fn command_line(&self) -> Result<CommandLine> {
        let mut cmd = CommandLine::new(self.resolve_bin_path());
        for (name, value) in self.resolve_options()?.iter() {
            let arg = format!("--{name}={value}");
            cmd = if name == "password" {
                cmd.secret_arg(arg)
            } else {
                cmd.arg(arg)
            };
        }
        Ok(cmd.arg(self.resolve_database_name()?))
    }

    /// Full process description: stdin piped, stdout to the dump file,
    /// stderr piped for the failure message.
    ///
    /// # Errors
    ///
    /// See [`Mysqldump::command_line`] and [`Mysqldump::resolve_dump_path`].
    pub fn spec(&self) -> Result<(ProcessSpec, PathBuf)> {
        let command = self.command_line()?;
        let dump_path = self.resolve_dump_path()?;
        let descriptors = DescriptorMap::new()
            .stdin(Redirect::Pipe)
            .stdout(Redirect::file_write(&dump_path))
            .stderr(Redirect::Pipe);
        Ok((ProcessSpec::new(command, descriptors), dump_path))
    }

    /// Run the dump.
    ///
    /// # Errors
    ///
    /// Configuration and filesystem errors before the process starts, or
    /// [`ProcessError::Failed`] carrying mysqldump's stderr and exit code.
    pub fn run(&self, runner: &mut ProcessRunner) -> Result<DumpReport> {
        let (spec, path) = self.spec()?;
        debug!(path = %path.display(), "Dumping database");
        let exit_code = runner.run(spec)?;
        info!(path = %path.display(), "Database dumped");
        Ok(DumpReport { path, exit_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn connection() -> ConnectionConfig {
        ConnectionConfig {
            dsn: "mysql:host=db.internal;dbname=shop".into(),
            username: "deploy".into(),
            password: "s3cret".into(),
        }
    }

    #[test]
    fn parses_host_and_database() {
        let dsn = parse_dsn("mysql:host=localhost;port=3307;dbname=app").unwrap();
        assert_eq!(dsn.driver, "mysql");
        assert_eq!(dsn.host.as_deref(), Some("localhost"));
        assert_eq!(dsn.database.as_deref(), Some("app"));
        assert_eq!(dsn.params[1], ("port".to_string(), "3307".to_string()));
    }

    #[test]
    fn rejects_connection_string_without_driver() {
        assert!(matches!(parse_dsn("host=localhost"), Err(ProcessError::Config { .. })));
        assert!(matches!(
            parse_dsn("mysql:host"),
            Err(ProcessError::Config { .. })
        ));
    }

    #[test]
    fn fills_credentials_after_explicit_options() {
        let mut config = MysqldumpConfig::default();
        config.options.insert("single-transaction", "1".to_string());
        config.options.insert("host", "replica".to_string());
        let dump = Mysqldump::new(config, connection(), "/srv/app");

        insta::assert_snapshot!(
            dump.option_string().unwrap(),
            @r#"--single-transaction="1" --host="replica" --user="deploy" --password="s3cret""#
        );
    }

    #[test]
    fn command_line_masks_password() {
        let dump = Mysqldump::new(MysqldumpConfig::default(), connection(), "/srv/app");
        let cmd = dump.command_line().unwrap();
        assert_eq!(cmd.program(), "mysqldump");
        assert_eq!(
            cmd.get_args(),
            &["--user=deploy", "--password=s3cret", "--host=db.internal", "shop"]
        );
        assert!(!cmd.to_string().contains("s3cret"));
    }

    #[test]
    fn database_override_wins() {
        let dump = Mysqldump::new(MysqldumpConfig::default(), connection(), "/srv/app")
            .with_database("archive");
        assert_eq!(dump.resolve_database_name().unwrap(), "archive");
    }

    #[test]
    fn missing_database_is_config_error() {
        let conn = ConnectionConfig {
            dsn: "mysql:host=localhost".into(),
            ..ConnectionConfig::default()
        };
        let dump = Mysqldump::new(MysqldumpConfig::default(), conn, "/srv/app");
        assert!(matches!(
            dump.resolve_database_name(),
            Err(ProcessError::Config { .. })
        ));
    }

    #[test]
    fn config_defaults() {
        let config: MysqldumpConfig = toml::from_str("").unwrap();
        assert_eq!(config, MysqldumpConfig::default());
        assert_eq!(config.dump_path, "protected/data");
        assert_eq!(config.dump_file, "dump.sql");
        let dump = Mysqldump::new(config, ConnectionConfig::default(), "/srv/app");
        assert_eq!(dump.resolve_bin_path(), "mysqldump");
    }
}
