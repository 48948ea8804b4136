//! Base directory and configuration for a CLI invocation

use std::path::Path;

use serde::Deserialize;

use deploy_fs::{
    ConfigStore, DirectorySync, EnvironmentManager, EnvironmentsConfig, FlushConfig,
    NormalizedPath, OrderedMap, PermissionRule, PermissionSpec, permission_rules,
};
use deploy_process::{ConnectionConfig, MysqldumpConfig};

use crate::error::{CliError, Result};

/// Config file looked up in the base directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "deploy.toml";

/// Everything in the deployment config file. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub flush: FlushConfig,
    pub environments: EnvironmentsConfig,
    pub permissions: OrderedMap<PermissionSpec>,
    pub mysqldump: MysqldumpConfig,
    pub database: ConnectionConfig,
}

/// Resolved base directory plus loaded config.
#[derive(Debug)]
pub struct Context {
    pub base: NormalizedPath,
    pub config: DeployConfig,
}

impl Context {
    /// Resolve the base directory and load the config.
    ///
    /// A missing default config means all defaults; a missing explicit
    /// `--config` file is an error.
    pub fn load(base_path: Option<&Path>, config: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let base = match base_path {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => cwd.join(p),
            None => cwd,
        };
        if !base.is_dir() {
            return Err(CliError::user(format!(
                "Base directory {} does not exist",
                base.display()
            )));
        }
        let base = NormalizedPath::new(base);

        let store = ConfigStore::new();
        let config = match config {
            Some(path) => {
                let path = base.resolve(path);
                if !path.exists() {
                    return Err(CliError::user(format!("Config file {} not found", path)));
                }
                store.load(&path)?
            }
            None => store.load_or_default(&base.join(DEFAULT_CONFIG_FILE))?,
        };
        tracing::debug!(base = %base, "Loaded deployment config");

        Ok(Self { base, config })
    }

    pub fn sync(&self) -> DirectorySync {
        DirectorySync::new(self.base.clone()).with_exclusions(self.config.flush.exclusions())
    }

    pub fn environments(&self) -> EnvironmentManager {
        EnvironmentManager::new(
            self.sync(),
            self.config.environments.dir.clone(),
            self.config.flush.paths.clone(),
        )
    }

    /// Configured permission rules, or the built-in defaults.
    pub fn permission_rules(&self) -> Vec<PermissionRule> {
        permission_rules(&self.config.permissions)
    }
}
