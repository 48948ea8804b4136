//! Environment bundles and the switch workflow
//!
//! An environment is a directory under `<base>/<environments dir>/<id>/` whose
//! layout mirrors the base directory. Switching to it runs
//! `Idle -> Flushing -> Copying -> ReconcilingPermissions -> Done`.
//! Flushing and copying abort the switch on the first error and leave the
//! base directory as far as it got; permission reconciliation never aborts.

use std::fs;

use tracing::info;

use crate::path::validate_path_identifier;
use crate::permissions::{
    PermissionOps, PermissionReport, PermissionRule, SystemPermissions, reconcile_permissions_with,
};
use crate::{DirectorySync, Error, NormalizedPath, Result};

/// Where an environment switch currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchStage {
    Idle,
    Flushing,
    Copying,
    ReconcilingPermissions,
    Done,
}

/// Summary of a completed switch.
#[derive(Debug, Clone)]
pub struct SwitchReport {
    pub id: String,
    pub flushed: Vec<NormalizedPath>,
    pub copied: usize,
    /// `None` when no rules were passed.
    pub permissions: Option<PermissionReport>,
}

/// Manages the environments directory of one base directory.
#[derive(Debug)]
pub struct EnvironmentManager {
    sync: DirectorySync,
    environments_dir: String,
    flush_paths: Vec<String>,
    stage: SwitchStage,
}

impl EnvironmentManager {
    pub fn new(
        sync: DirectorySync,
        environments_dir: impl Into<String>,
        flush_paths: Vec<String>,
    ) -> Self {
        Self {
            sync,
            environments_dir: environments_dir.into(),
            flush_paths,
            stage: SwitchStage::Idle,
        }
    }

    pub fn sync(&self) -> &DirectorySync {
        &self.sync
    }

    /// Stage reached by the last switch; stays on the failing stage after an error.
    pub fn stage(&self) -> SwitchStage {
        self.stage
    }

    pub fn environments_root(&self) -> NormalizedPath {
        self.sync.resolve(&self.environments_dir)
    }

    /// Path of environment `id`, whether or not it exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] if `id` is not a single path component.
    pub fn environment_path(&self, id: &str) -> Result<NormalizedPath> {
        validate_path_identifier("environment id", id)?;
        Ok(self.environments_root().join(id))
    }

    /// Ids of all environments, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the environments directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        let root = self.environments_root();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let native = root.to_native();
        let mut ids = Vec::new();
        for entry in fs::read_dir(&native).map_err(|e| Error::io(&native, e))? {
            let entry = entry.map_err(|e| Error::io(&native, e))?;
            if entry.path().is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Flush every configured flush path, keeping and re-ensuring its root.
    ///
    /// # Errors
    ///
    /// Returns the first flush or directory creation error.
    pub fn flush_all(&self) -> Result<Vec<NormalizedPath>> {
        let mut flushed = Vec::with_capacity(self.flush_paths.len());
        for dir in &self.flush_paths {
            let path = self.sync.resolve(dir);
            info!(path = %path, "Flushing directory");
            self.sync.flush(&path, true)?;
            self.sync.ensure_directory(&path)?;
            flushed.push(path);
        }
        Ok(flushed)
    }

    /// Switch the base directory to environment `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEnvironment`] before touching anything if the
    /// environment is not a directory, or the first flush/copy error.
    pub fn change(&mut self, id: &str, rules: Option<&[PermissionRule]>) -> Result<SwitchReport> {
        self.change_with(&SystemPermissions, id, rules)
    }

    /// [`EnvironmentManager::change`] with an explicit permission backend.
    ///
    /// # Errors
    ///
    /// See [`EnvironmentManager::change`].
    pub fn change_with(
        &mut self,
        ops: &dyn PermissionOps,
        id: &str,
        rules: Option<&[PermissionRule]>,
    ) -> Result<SwitchReport> {
        self.stage = SwitchStage::Idle;
        let source = self.environment_path(id)?;
        if !source.is_dir() {
            return Err(Error::UnknownEnvironment { id: id.to_string() });
        }

        self.enter(SwitchStage::Flushing);
        let flushed = self.flush_all()?;

        self.enter(SwitchStage::Copying);
        let base = self.sync.base().clone();
        let entries = self.sync.build_file_list(&source, &base)?;
        let copied = self.sync.copy_files(&entries)?;

        let permissions = match rules {
            Some(rules) => {
                self.enter(SwitchStage::ReconcilingPermissions);
                Some(reconcile_permissions_with(ops, &base, rules))
            }
            None => None,
        };

        self.enter(SwitchStage::Done);
        info!(id, copied, "Environment successfully changed");
        Ok(SwitchReport {
            id: id.to_string(),
            flushed,
            copied,
            permissions,
        })
    }

    /// Scaffold a new environment, optionally seeded from an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnvironmentExists`] if `id` is taken, or
    /// [`Error::UnknownEnvironment`] if `from` does not exist.
    pub fn create(&self, id: &str, from: Option<&str>) -> Result<NormalizedPath> {
        let target = self.environment_path(id)?;
        if target.exists() {
            return Err(Error::EnvironmentExists {
                id: id.to_string(),
                path: target.to_native(),
            });
        }

        let seed = match from {
            Some(from) => {
                let seed = self.environment_path(from)?;
                if !seed.is_dir() {
                    return Err(Error::UnknownEnvironment {
                        id: from.to_string(),
                    });
                }
                Some(seed)
            }
            None => None,
        };

        self.sync.ensure_directory(&target)?;
        if let Some(seed) = seed {
            self.sync.copy_tree(&seed, &target)?;
        }
        info!(id, path = %target, "Created environment");
        Ok(target)
    }

    fn enter(&mut self, stage: SwitchStage) {
        tracing::debug!(from = ?self.stage, to = ?stage, "Environment switch stage");
        self.stage = stage;
    }
}
