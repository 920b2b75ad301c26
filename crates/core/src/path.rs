//! Path parsing and resolution
//!
//! Two kinds of path meet here. Filesystem paths are absolute, slash
//! separated and start at the root that lists buckets: `/bucket/key...`.
//! Command-line paths name an alias first: `alias/bucket[/key]`, with
//! `alias/` alone meaning the root. Local paths are passed through as-is.

use crate::error::{Error, Result};

/// Filesystem root; lists buckets
pub const ROOT: &str = "/";

/// Whether a filesystem path is the root
pub fn is_root(path: &str) -> bool {
    path.trim_end_matches('/').is_empty()
}

/// Drop a trailing slash (the root stays `/`)
pub fn exclude_trailing_slash(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some("") | None => path,
        Some(trimmed) => trimmed,
    }
}

/// Resolve `path` against `cwd`, folding `.` and `..` segments
pub fn absolute_path(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", exclude_trailing_slash(cwd), path)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut result = format!("/{}", segments.join("/"));
    if joined.ends_with('/') && result.len() > 1 {
        result.push('/');
    }
    result
}

/// Split an absolute filesystem path into bucket and key
///
/// The key keeps any trailing slash; the root yields an empty bucket.
pub fn split_path(path: &str) -> (&str, &str) {
    let path = path.strip_prefix('/').unwrap_or(path);
    match path.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (path, ""),
    }
}

/// Key of the zero-byte marker object that stands for a folder
pub fn folder_key(key: &str) -> String {
    format!("{key}/")
}

/// Split a path into its parent directory and last segment
pub fn split_name(path: &str) -> (&str, &str) {
    let path = exclude_trailing_slash(path);
    match path.rfind('/') {
        Some(0) => (ROOT, &path[1..]),
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => (ROOT, path),
    }
}

/// A parsed remote path: an alias plus a location behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    /// Alias name
    pub alias: String,
    /// Bucket name (empty for the alias root)
    pub bucket: String,
    /// Object key (empty for bucket root)
    pub key: String,
    /// Whether the path ends with a slash (directory semantics)
    pub is_dir: bool,
}

impl RemotePath {
    /// Create a new RemotePath
    pub fn new(
        alias: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let is_dir = key.ends_with('/') || key.is_empty();
        Self {
            alias: alias.into(),
            bucket: bucket.into(),
            key,
            is_dir,
        }
    }

    /// The alias root, which lists buckets
    pub fn root(alias: impl Into<String>) -> Self {
        Self::new(alias, "", "")
    }

    pub fn is_root(&self) -> bool {
        self.bucket.is_empty()
    }

    /// Filesystem path behind the alias: `/bucket/key`
    pub fn fs_path(&self) -> String {
        match (self.bucket.is_empty(), self.key.is_empty()) {
            (true, _) => ROOT.to_string(),
            (false, true) => format!("/{}", self.bucket),
            (false, false) => format!("/{}/{}", self.bucket, self.key),
        }
    }

    /// Get the full path as a string (alias/bucket/key)
    pub fn to_full_path(&self) -> String {
        format!("{}{}", self.alias, self.fs_path())
    }

    /// Get the parent path (one level up)
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        if self.key.is_empty() {
            return Some(Self::root(&self.alias));
        }
        let key = self.key.trim_end_matches('/');
        let parent_key = match key.rfind('/') {
            Some(pos) => format!("{}/", &key[..pos]),
            None => String::new(),
        };
        Some(Self::new(&self.alias, &self.bucket, parent_key))
    }

    /// Join a child path component
    pub fn join(&self, child: &str) -> Self {
        if self.is_root() {
            return Self::new(&self.alias, child.trim_end_matches('/'), "");
        }
        let base = self.key.trim_end_matches('/');
        let key = if base.is_empty() {
            child.to_string()
        } else {
            format!("{base}/{child}")
        };
        let is_dir = child.ends_with('/');
        Self {
            alias: self.alias.clone(),
            bucket: self.bucket.clone(),
            key,
            is_dir,
        }
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_full_path())
    }
}

/// Parsed path that can be either local or remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    /// Local filesystem path
    Local(std::path::PathBuf),
    /// Remote path behind an alias
    Remote(RemotePath),
}

impl ParsedPath {
    /// Check if this is a remote path
    pub fn is_remote(&self) -> bool {
        matches!(self, ParsedPath::Remote(_))
    }

    /// Check if this is a local path
    pub fn is_local(&self) -> bool {
        matches!(self, ParsedPath::Local(_))
    }

    /// Get the remote path if this is a remote path
    pub fn as_remote(&self) -> Option<&RemotePath> {
        match self {
            ParsedPath::Remote(p) => Some(p),
            ParsedPath::Local(_) => None,
        }
    }

    /// Get the local path if this is a local path
    pub fn as_local(&self) -> Option<&std::path::PathBuf> {
        match self {
            ParsedPath::Local(p) => Some(p),
            ParsedPath::Remote(_) => None,
        }
    }
}

/// Parse a path string into a ParsedPath
///
/// Remote paths have the format: alias/[bucket[/key]]
/// Local paths are anything that:
/// - Starts with / (absolute path)
/// - Starts with ./ or ../ (relative path)
/// - Contains no / and looks like a file name
/// - Or doesn't match the alias/bucket pattern
pub fn parse_path(path: &str) -> Result<ParsedPath> {
    // Empty path is invalid
    if path.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }

    // Absolute paths are local
    if path.starts_with('/') {
        return Ok(ParsedPath::Local(std::path::PathBuf::from(path)));
    }

    // Explicit relative paths are local
    if path.starts_with("./") || path.starts_with("../") {
        return Ok(ParsedPath::Local(std::path::PathBuf::from(path)));
    }

    // Windows absolute paths
    #[cfg(windows)]
    if path.len() >= 2 && path.chars().nth(1) == Some(':') {
        return Ok(ParsedPath::Local(std::path::PathBuf::from(path)));
    }

    let Some((alias, rest)) = path.split_once('/') else {
        if path.contains('.') || path.contains('\\') {
            return Ok(ParsedPath::Local(std::path::PathBuf::from(path)));
        }
        return Err(Error::InvalidPath(format!(
            "Path '{path}' is incomplete. Use format: alias/[bucket[/key]]"
        )));
    };

    // Validate alias name (alphanumeric, underscore, hyphen)
    if !is_valid_alias_name(alias) {
        return Ok(ParsedPath::Local(std::path::PathBuf::from(path)));
    }

    let (bucket, key) = match rest.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (rest, ""),
    };

    if bucket.is_empty() && !key.is_empty() {
        return Err(Error::InvalidPath("Bucket name cannot be empty".into()));
    }

    Ok(ParsedPath::Remote(RemotePath::new(alias, bucket, key)))
}

/// Check if a string is a valid alias name
pub fn is_valid_alias_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
