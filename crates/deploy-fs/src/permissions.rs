//! Ownership and mode reconciliation
//!
//! Rules are applied in order. For every attribute a rule names, the current
//! value is read and only changed when it differs, so a converged tree
//! produces no OS-level changes. Nothing in here aborts: a missing path or a
//! rejected chmod/chown becomes a [`PermissionOutcome`] and processing moves
//! on to the next attribute or rule.

use std::fmt;
use std::io;
use std::path::Path;

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::NormalizedPath;

/// Attribute a rule can reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Owner,
    Group,
    Mode,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Owner => "owner",
            Self::Group => "group",
            Self::Mode => "mode",
        };
        f.write_str(s)
    }
}

/// Desired state for one base-relative (or absolute) path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRule {
    pub path: String,
    pub mode: Option<u32>,
    pub owner: Option<String>,
    pub group: Option<String>,
}

impl PermissionRule {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: None,
            owner: None,
            group: None,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// The rule set used when no rules are configured.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("protected/runtime").with_mode(0o777),
            Self::new("protected/yiic").with_mode(0o755),
            Self::new("assets").with_mode(0o777),
        ]
    }
}

/// A user or group as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: u32,
    pub name: Option<String>,
}

impl Principal {
    /// Whether `desired` (a name or a numeric id) refers to this principal.
    pub fn matches(&self, desired: &str) -> bool {
        let desired = desired.trim();
        self.name.as_deref() == Some(desired) || desired.parse::<u32>().ok() == Some(self.id)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Result of reconciling one attribute of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PermissionOutcome {
    /// The rule's path does not exist; the whole rule was skipped.
    NotFound,
    /// Already at the desired value; nothing was issued.
    Unchanged { attribute: Attribute, value: String },
    /// The change was issued and accepted.
    Changed {
        attribute: Attribute,
        old: String,
        new: String,
    },
    /// Reading or changing the attribute was rejected by the OS.
    Failed {
        attribute: Attribute,
        old: Option<String>,
        new: String,
        message: String,
    },
}

impl PermissionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::NotFound | Self::Failed { .. })
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// One path/outcome pair in a [`PermissionReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionEntry {
    #[serde(serialize_with = "serialize_path")]
    pub path: NormalizedPath,
    #[serde(flatten)]
    pub outcome: PermissionOutcome,
}

fn serialize_path<S: Serializer>(path: &NormalizedPath, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(path.as_str())
}

/// Ordered outcomes of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionReport {
    pub entries: Vec<PermissionEntry>,
}

impl PermissionReport {
    fn push(&mut self, path: &NormalizedPath, outcome: PermissionOutcome) {
        self.entries.push(PermissionEntry {
            path: path.clone(),
            outcome,
        });
    }

    pub fn changes(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.entries.iter().filter(|e| e.outcome.is_change())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }

    /// True when nothing had to change and nothing failed.
    pub fn is_converged(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.outcome, PermissionOutcome::Unchanged { .. }))
    }
}

/// OS access needed for reconciliation.
///
/// [`SystemPermissions`] is the real implementation; the trait exists so the
/// comparison logic can be exercised without privileges.
pub trait PermissionOps {
    /// Permission bits (`0o7777` mask).
    fn mode(&self, path: &Path) -> io::Result<u32>;
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;
    fn owner(&self, path: &Path) -> io::Result<Principal>;
    fn set_owner(&self, path: &Path, owner: &str) -> io::Result<()>;
    fn group(&self, path: &Path) -> io::Result<Principal>;
    fn set_group(&self, path: &Path, group: &str) -> io::Result<()>;
}

/// [`PermissionOps`] backed by the local filesystem and user database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPermissions;

#[cfg(unix)]
impl PermissionOps for SystemPermissions {
    fn mode(&self, path: &Path) -> io::Result<u32> {
        use std::os::unix::fs::PermissionsExt;
        Ok(std::fs::metadata(path)?.permissions().mode() & 0o7777)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }

    fn owner(&self, path: &Path) -> io::Result<Principal> {
        use nix::unistd::{Uid, User};
        use std::os::unix::fs::MetadataExt;

        let uid = std::fs::metadata(path)?.uid();
        let name = User::from_uid(Uid::from_raw(uid))
            .ok()
            .flatten()
            .map(|user| user.name);
        Ok(Principal { id: uid, name })
    }

    fn set_owner(&self, path: &Path, owner: &str) -> io::Result<()> {
        use nix::unistd::{Uid, User, chown};

        let owner = owner.trim();
        let uid = match owner.parse::<u32>() {
            Ok(id) => Uid::from_raw(id),
            Err(_) => User::from_name(owner)
                .map_err(io::Error::from)?
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("unknown user '{owner}'"))
                })?
                .uid,
        };
        chown(path, Some(uid), None).map_err(io::Error::from)
    }

    fn group(&self, path: &Path) -> io::Result<Principal> {
        use nix::unistd::{Gid, Group};
        use std::os::unix::fs::MetadataExt;

        let gid = std::fs::metadata(path)?.gid();
        let name = Group::from_gid(Gid::from_raw(gid))
            .ok()
            .flatten()
            .map(|group| group.name);
        Ok(Principal { id: gid, name })
    }

    fn set_group(&self, path: &Path, group: &str) -> io::Result<()> {
        use nix::unistd::{Gid, Group, chown};

        let group = group.trim();
        let gid = match group.parse::<u32>() {
            Ok(id) => Gid::from_raw(id),
            Err(_) => Group::from_name(group)
                .map_err(io::Error::from)?
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("unknown group '{group}'"))
                })?
                .gid,
        };
        chown(path, None, Some(gid)).map_err(io::Error::from)
    }
}

#[cfg(not(unix))]
impl PermissionOps for SystemPermissions {
    fn mode(&self, _path: &Path) -> io::Result<u32> {
        Err(unsupported())
    }

    fn set_mode(&self, _path: &Path, _mode: u32) -> io::Result<()> {
        Err(unsupported())
    }

    fn owner(&self, _path: &Path) -> io::Result<Principal> {
        Err(unsupported())
    }

    fn set_owner(&self, _path: &Path, _owner: &str) -> io::Result<()> {
        Err(unsupported())
    }

    fn group(&self, _path: &Path) -> io::Result<Principal> {
        Err(unsupported())
    }

    fn set_group(&self, _path: &Path, _group: &str) -> io::Result<()> {
        Err(unsupported())
    }
}

#[cfg(not(unix))]
fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "ownership and modes are unix only")
}

/// Format a mode the way it is displayed and compared: four octal digits.
pub fn format_mode(mode: u32) -> String {
    format!("{:04o}", mode & 0o7777)
}

/// Reconcile `rules` under `base` against the real filesystem.
pub fn reconcile_permissions(base: &NormalizedPath, rules: &[PermissionRule]) -> PermissionReport {
    reconcile_permissions_with(&SystemPermissions, base, rules)
}

/// Reconcile `rules` under `base` through `ops`.
///
/// Attributes are handled owner, group, then mode. Every rule produces at
/// least one entry; a missing path produces exactly one `NotFound` entry.
pub fn reconcile_permissions_with(
    ops: &dyn PermissionOps,
    base: &NormalizedPath,
    rules: &[PermissionRule],
) -> PermissionReport {
    let mut report = PermissionReport::default();

    for rule in rules {
        let path = base.resolve(&rule.path);
        let real = match std::fs::canonicalize(path.to_native()) {
            Ok(real) => real,
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to change permissions, file does not exist");
                report.push(&path, PermissionOutcome::NotFound);
                continue;
            }
        };

        if let Some(owner) = &rule.owner {
            let outcome = reconcile_principal(
                Attribute::Owner,
                owner,
                || ops.owner(&real),
                || ops.set_owner(&real, owner),
            );
            log_outcome(&path, &outcome);
            report.push(&path, outcome);
        }

        if let Some(group) = &rule.group {
            let outcome = reconcile_principal(
                Attribute::Group,
                group,
                || ops.group(&real),
                || ops.set_group(&real, group),
            );
            log_outcome(&path, &outcome);
            report.push(&path, outcome);
        }

        if let Some(mode) = rule.mode {
            let outcome = reconcile_mode(ops, &real, mode);
            log_outcome(&path, &outcome);
            report.push(&path, outcome);
        }
    }

    report
}

fn reconcile_principal(
    attribute: Attribute,
    desired: &str,
    current: impl FnOnce() -> io::Result<Principal>,
    apply: impl FnOnce() -> io::Result<()>,
) -> PermissionOutcome {
    let current = match current() {
        Ok(current) => current,
        Err(e) => {
            return PermissionOutcome::Failed {
                attribute,
                old: None,
                new: desired.to_string(),
                message: e.to_string(),
            };
        }
    };

    if current.matches(desired) {
        return PermissionOutcome::Unchanged {
            attribute,
            value: current.to_string(),
        };
    }

    match apply() {
        Ok(()) => PermissionOutcome::Changed {
            attribute,
            old: current.to_string(),
            new: desired.to_string(),
        },
        Err(e) => PermissionOutcome::Failed {
            attribute,
            old: Some(current.to_string()),
            new: desired.to_string(),
            message: e.to_string(),
        },
    }
}

fn reconcile_mode(ops: &dyn PermissionOps, path: &Path, desired: u32) -> PermissionOutcome {
    let new = format_mode(desired);
    let current = match ops.mode(path) {
        Ok(mode) => mode & 0o7777,
        Err(e) => {
            return PermissionOutcome::Failed {
                attribute: Attribute::Mode,
                old: None,
                new,
                message: e.to_string(),
            };
        }
    };

    if current == desired & 0o7777 {
        return PermissionOutcome::Unchanged {
            attribute: Attribute::Mode,
            value: new,
        };
    }

    let old = format_mode(current);
    match ops.set_mode(path, desired) {
        Ok(()) => PermissionOutcome::Changed {
            attribute: Attribute::Mode,
            old,
            new,
        },
        Err(e) => PermissionOutcome::Failed {
            attribute: Attribute::Mode,
            old: Some(old),
            new,
            message: e.to_string(),
        },
    }
}

fn log_outcome(path: &NormalizedPath, outcome: &PermissionOutcome) {
    match outcome {
        PermissionOutcome::Changed { attribute, old, new } => {
            info!(path = %path, %attribute, %old, %new, "Changed attribute");
        }
        PermissionOutcome::Unchanged { attribute, value } => {
            debug!(path = %path, %attribute, %value, "Attribute already matches");
        }
        PermissionOutcome::Failed {
            attribute, message, ..
        } => {
            warn!(path = %path, %attribute, %message, "Failed to change attribute");
        }
        PermissionOutcome::NotFound => {}
    }
}
