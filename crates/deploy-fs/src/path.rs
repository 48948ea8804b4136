//! Normalized path handling
//!
//! Every path handed to the filesystem layer is a [`NormalizedPath`]: forward
//! slashes internally, no trailing separators, resolved against a single base
//! directory before use.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A path normalized to use forward slashes and no trailing separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    ///
    /// Converts backslashes to forward slashes and strips trailing
    /// separators. The filesystem root stays `/`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        let normalized = path_str.replace('\\', "/");
        let trimmed = normalized.trim_end_matches('/');
        let inner = if trimmed.is_empty() && normalized.starts_with('/') {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        Self { inner }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Whether the path is absolute.
    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/') || self.to_native().is_absolute()
    }

    /// Join this path with a segment.
    pub fn join(&self, segment: &str) -> Self {
        let segment_normalized = segment.replace('\\', "/");
        let segment_trimmed = segment_normalized.trim_matches('/');
        if segment_trimmed.is_empty() {
            return self.clone();
        }
        if self.inner.is_empty() {
            return Self::new(segment_trimmed);
        }
        let joined = if self.inner.ends_with('/') {
            format!("{}{}", self.inner, segment_trimmed)
        } else {
            format!("{}/{}", self.inner, segment_trimmed)
        };
        Self::new(joined)
    }

    /// Resolve `path` against this path as a base directory.
    ///
    /// Absolute inputs are returned as-is (normalized); relative inputs are
    /// joined onto the base.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Self {
        let candidate = Self::new(path);
        if candidate.is_absolute() {
            candidate
        } else {
            self.join(candidate.as_str())
        }
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        match self.inner.rfind('/') {
            Some(idx) if idx > 0 => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            Some(0) if self.inner.len() > 1 => Some(Self {
                inner: "/".to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }
}

/// Validate that `value` is usable as a single path component.
///
/// Used for identifiers that become directory names, such as environment ids.
pub fn validate_path_identifier(kind: &'static str, value: &str) -> Result<()> {
    let reason = if value.trim().is_empty() {
        Some("must not be empty")
    } else if value.contains('/') || value.contains('\\') {
        Some("must not contain path separators")
    } else if value == "." || value == ".." {
        Some("must not be a relative directory reference")
    } else if value.contains('\0') {
        Some("must not contain NUL bytes")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}
