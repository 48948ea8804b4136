//! Shared test utilities for the deployment-tools workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`tree`]: [`tree::TestTree`] builder for application base directories

pub mod tree;

pub use tree::{TestTree, is_root};
