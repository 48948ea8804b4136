//! Literal name exclusions for flush and copy traversal

use std::collections::BTreeSet;

/// Set of literal entry names skipped while flushing and copying.
///
/// Names are compared verbatim against a directory entry's file name; they are
/// not patterns and never match nested paths. The self and parent entries
/// (`.` and `..`) are always excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
    skip_hidden: bool,
}

impl ExclusionSet {
    /// An exclusion set containing only the implicit self/parent entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a list of literal names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            skip_hidden: false,
        }
    }

    /// Also skip every entry whose name starts with `.`.
    pub fn with_hidden_skipped(mut self, skip_hidden: bool) -> Self {
        self.skip_hidden = skip_hidden;
        self
    }

    /// Add a literal name.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Whether an entry with this file name must be skipped.
    pub fn is_excluded(&self, name: &str) -> bool {
        if name == "." || name == ".." {
            return true;
        }
        if self.skip_hidden && name.starts_with('.') {
            return true;
        }
        self.names.contains(name)
    }
}
