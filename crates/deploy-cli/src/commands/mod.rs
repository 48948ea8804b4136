//! Command implementations for deploy-cli

pub mod environment;
pub mod flush;
pub mod mysqldump;
pub mod permissions;

pub use environment::{run_environment_change, run_environment_create, run_environment_list};
pub use flush::run_flush;
pub use mysqldump::{DumpOverrides, run_mysqldump};
pub use permissions::run_permissions;
