//! # Raw node data and change notifications.
//!
//! [`RawRecord`] is what a watcher knows about one node: its path, its payload
//! (`None` when the node has no data or does not exist) and opaque [`Stat`] metadata.
//! [`WatchEvent`] pairs a record with the kind of change that produced it.

use std::collections::BTreeMap;

use bytes::Bytes;

/// Full-path → payload map of every node strictly below a tree root.
///
/// Nodes that exist without data map to empty [`Bytes`].
pub type TreeSnapshot = BTreeMap<String, Bytes>;

/// Opaque node metadata reported by the watcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    /// Data version; increases on every update of the node.
    pub version: u64,
    /// Length of the payload in bytes.
    pub data_length: usize,
}

/// Raw state of one node as seen by the watcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    /// Absolute path of the node.
    pub path: String,
    /// Payload; `None` means "no data" or "node does not exist".
    pub data: Option<Bytes>,
    /// Metadata, when the watcher has any.
    pub stat: Option<Stat>,
}

impl RawRecord {
    /// Creates a record carrying `data` with no metadata.
    pub fn new(path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            data: Some(data.into()),
            stat: None,
        }
    }

    /// Creates a record for a node without data.
    pub fn absent(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: None,
            stat: None,
        }
    }

    /// Attaches metadata.
    #[inline]
    pub fn with_stat(mut self, stat: Stat) -> Self {
        self.stat = Some(stat);
        self
    }

    /// Returns the payload bytes, if any.
    #[inline]
    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// `true` when the record carries a payload.
    #[inline]
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

/// Classification of a namespace change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// Node was created.
    Created,
    /// Node data was replaced.
    Updated,
    /// Node was removed.
    Deleted,
}

impl WatchEventKind {
    /// `true` for kinds that carry new data worth rebuilding from.
    #[inline]
    pub fn carries_data(self) -> bool {
        matches!(self, WatchEventKind::Created | WatchEventKind::Updated)
    }
}

/// A single change notification delivered by a watcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened.
    pub kind: WatchEventKind,
    /// The affected node after the change (data is `None` for deletions).
    pub record: RawRecord,
}

impl WatchEvent {
    /// Creates an event.
    pub fn new(kind: WatchEventKind, record: RawRecord) -> Self {
        Self { kind, record }
    }

    /// Path of the affected node.
    #[inline]
    pub fn path(&self) -> &str {
        &self.record.path
    }
}

/// Returns `true` when `path` lies strictly below `root`.
///
/// ```
/// use zkresource::watcher::is_descendant;
///
/// assert!(is_descendant("/app", "/app/a/b"));
/// assert!(!is_descendant("/app", "/app"));
/// assert!(!is_descendant("/app", "/apple"));
/// assert!(is_descendant("/", "/app"));
/// ```
pub fn is_descendant(root: &str, path: &str) -> bool {
    if root == "/" {
        return path.len() > 1 && path.starts_with('/');
    }
    path.len() > root.len() + 1
        && path.starts_with(root)
        && path.as_bytes()[root.len()] == b'/'
}

/// Returns `true` when `path` is `root` itself or lies below it.
#[inline]
pub fn is_within(root: &str, path: &str) -> bool {
    path == root || is_descendant(root, path)
}
