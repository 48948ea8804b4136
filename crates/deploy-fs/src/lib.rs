//! Filesystem layer for the deployment tools
//!
//! Brings directory trees into a desired state: flushing runtime and asset
//! directories, overlaying environment bundles onto the base directory and
//! reconciling ownership and permissions against a declarative rule set.

pub mod config;
pub mod environment;
pub mod error;
pub mod exclusion;
pub mod ordered;
pub mod path;
pub mod permissions;
pub mod sync;

pub use config::{
    ConfigStore, EnvironmentsConfig, FlushConfig, PermissionSpec, parse_octal_mode, permission_rules,
};
pub use environment::{EnvironmentManager, SwitchReport, SwitchStage};
pub use error::{Error, Result};
pub use exclusion::ExclusionSet;
pub use ordered::OrderedMap;
pub use path::{NormalizedPath, validate_path_identifier};
pub use permissions::{
    Attribute, PermissionEntry, PermissionOps, PermissionOutcome, PermissionReport, PermissionRule,
    Principal, SystemPermissions, format_mode, reconcile_permissions, reconcile_permissions_with,
};
pub use sync::{DirectorySync, FileListEntry};
