//! # In-process namespace.
//!
//! [`MemoryWatcher`] keeps a hierarchical path → data map in memory and implements
//! [`Watcher`] over it. Writers mutate the tree and the resulting events are delivered
//! synchronously on the writing thread, after the tree lock is released.
//!
//! ## Rules
//! - `set` creates missing parents (without data), emitting `Created` for each of them.
//! - `delete` removes the whole subtree, emitting `Deleted` deepest-first.
//! - The root `/` always exists and cannot be deleted.
//! - Each data write bumps the node's [`Stat::version`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use zkresource::watcher::{MemoryWatcher, Watcher};
//!
//! let zk = Arc::new(MemoryWatcher::new());
//! zk.set("/app/conf", "42");
//! let rec = zk.current_data("/app/conf").unwrap();
//! assert_eq!(rec.bytes(), Some(&b"42"[..]));
//! assert!(zk.current_data("/app").unwrap().data.is_none());
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use crate::watcher::record::{
    is_descendant, is_within, RawRecord, Stat, TreeSnapshot, WatchEvent, WatchEventKind,
};
use crate::watcher::watch::{SubscriptionId, WatchListener, Watcher};

#[derive(Clone, Debug, Default)]
struct Node {
    data: Option<Bytes>,
    version: u64,
}

impl Node {
    fn record(&self, path: &str) -> RawRecord {
        RawRecord {
            path: path.to_string(),
            data: self.data.clone(),
            stat: Some(Stat {
                version: self.version,
                data_length: self.data.as_ref().map_or(0, Bytes::len),
            }),
        }
    }
}

struct Registration {
    id: SubscriptionId,
    path: String,
    listener: Arc<dyn WatchListener>,
}

/// Hierarchical in-memory namespace with change notifications.
pub struct MemoryWatcher {
    nodes: RwLock<BTreeMap<String, Node>>,
    listeners: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl Default for MemoryWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWatcher {
    /// Creates a namespace containing only the root node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::default());
        Self {
            nodes: RwLock::new(nodes),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates the node at `path` or replaces its data, creating missing parents.
    ///
    /// Relative paths and paths with a trailing `/` are ignored.
    pub fn set(&self, path: &str, data: impl Into<Bytes>) {
        if !is_node_path(path) {
            warn!(path, "ignoring write to malformed path");
            return;
        }
        let events = {
            let mut nodes = self.nodes.write();
            let mut events = create_parents(&mut nodes, path);
            let data = data.into();
            let kind = match nodes.get_mut(path) {
                Some(node) => {
                    node.data = Some(data);
                    node.version += 1;
                    WatchEventKind::Updated
                }
                None => {
                    nodes.insert(
                        path.to_string(),
                        Node {
                            data: Some(data),
                            version: 0,
                        },
                    );
                    WatchEventKind::Created
                }
            };
            let record = nodes[path].record(path);
            events.push(WatchEvent::new(kind, record));
            events
        };
        self.dispatch(&events);
    }

    /// Creates a data-less node (and missing parents). Existing nodes are left untouched.
    pub fn create_empty(&self, path: &str) {
        if !is_node_path(path) {
            warn!(path, "ignoring write to malformed path");
            return;
        }
        let events = {
            let mut nodes = self.nodes.write();
            let mut events = create_parents(&mut nodes, path);
            if !nodes.contains_key(path) {
                let node = Node::default();
                events.push(WatchEvent::new(
                    WatchEventKind::Created,
                    node.record(path),
                ));
                nodes.insert(path.to_string(), node);
            }
            events
        };
        self.dispatch(&events);
    }

    /// Removes `path` and its whole subtree. Returns `false` if nothing was removed.
    pub fn delete(&self, path: &str) -> bool {
        if path == "/" {
            return false;
        }
        let events = {
            let mut nodes = self.nodes.write();
            let doomed: Vec<String> = nodes
                .keys()
                .filter(|p| is_within(path, p))
                .cloned()
                .collect();
            let mut events = Vec::with_capacity(doomed.len());
            // Deepest first so children are reported before their parent.
            for p in doomed.into_iter().rev() {
                nodes.remove(&p);
                events.push(WatchEvent::new(WatchEventKind::Deleted, RawRecord::absent(p)));
            }
            events
        };
        let removed = !events.is_empty();
        self.dispatch(&events);
        removed
    }

    /// Returns the payload of `path`, if the node exists and has data.
    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.nodes.read().get(path).and_then(|n| n.data.clone())
    }

    /// `true` if the node exists.
    pub fn exists(&self, path: &str) -> bool {
        self.nodes.read().contains_key(path)
    }

    /// Number of active listener registrations.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn dispatch(&self, events: &[WatchEvent]) {
        for ev in events {
            let targets: Vec<Arc<dyn WatchListener>> = self
                .listeners
                .lock()
                .iter()
                .filter(|r| is_within(&r.path, ev.path()))
                .map(|r| Arc::clone(&r.listener))
                .collect();
            trace!(path = ev.path(), kind = ?ev.kind, listeners = targets.len(), "dispatching watch event");
            for listener in targets {
                listener.on_event(ev);
            }
        }
    }
}

fn is_node_path(path: &str) -> bool {
    path == "/" || (path.starts_with('/') && !path.ends_with('/'))
}

fn create_parents(nodes: &mut BTreeMap<String, Node>, path: &str) -> Vec<WatchEvent> {
    let mut events = Vec::new();
    let mut end = 0;
    while let Some(pos) = path[end + 1..].find('/') {
        end += pos + 1;
        let parent = &path[..end];
        if !nodes.contains_key(parent) {
            let node = Node::default();
            events.push(WatchEvent::new(WatchEventKind::Created, node.record(parent)));
            nodes.insert(parent.to_string(), node);
        }
    }
    events
}

impl Watcher for MemoryWatcher {
    fn current_data(&self, path: &str) -> Option<RawRecord> {
        self.nodes.read().get(path).map(|n| n.record(path))
    }

    fn descendants(&self, path: &str) -> TreeSnapshot {
        self.nodes
            .read()
            .iter()
            .filter(|(p, _)| is_descendant(path, p))
            .map(|(p, n)| (p.clone(), n.data.clone().unwrap_or_default()))
            .collect()
    }

    fn subscribe(&self, path: &str, listener: Arc<dyn WatchListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push(Registration {
            id,
            path: path.to_string(),
            listener,
        });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|r| r.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(zk: &MemoryWatcher, path: &str) -> (SubscriptionId, Arc<Mutex<Vec<WatchEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = zk.subscribe(
            path,
            Arc::new(move |ev: &WatchEvent| sink.lock().push(ev.clone())),
        );
        (id, seen)
    }

    #[test]
    fn set_creates_parents_and_bumps_versions() {
        let zk = MemoryWatcher::new();
        let (_, seen) = recorder(&zk, "/");
        zk.set("/a/b/c", "1");
        zk.set("/a/b/c", "2");

        let kinds: Vec<_> = seen.lock().iter().map(|e| (e.path().to_string(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("/a".to_string(), WatchEventKind::Created),
                ("/a/b".to_string(), WatchEventKind::Created),
                ("/a/b/c".to_string(), WatchEventKind::Created),
                ("/a/b/c".to_string(), WatchEventKind::Updated),
            ]
        );
        let rec = zk.current_data("/a/b/c").unwrap();
        assert_eq!(rec.stat.unwrap().version, 1);
        assert_eq!(rec.bytes(), Some(&b"2"[..]));
    }

    #[test]
    fn listeners_only_see_their_subtree() {
        let zk = MemoryWatcher::new();
        let (_, seen) = recorder(&zk, "/x");
        zk.set("/y", "1");
        zk.set("/xy", "1");
        zk.set("/x/1", "1");
        let paths: Vec<_> = seen.lock().iter().map(|e| e.path().to_string()).collect();
        assert_eq!(paths, vec!["/x".to_string(), "/x/1".to_string()]);
    }

    #[test]
    fn malformed_paths_are_ignored() {
        let zk = MemoryWatcher::new();
        let (_, seen) = recorder(&zk, "/");
        zk.set("", "x");
        zk.create_empty("");
        zk.set("relative", "x");
        zk.set("/trailing/", "x");
        assert!(seen.lock().is_empty());
        assert!(!zk.exists("/trailing"));

        zk.set("/", "root");
        assert_eq!(zk.get("/").as_deref(), Some(&b"root"[..]));
    }

    #[test]
    fn delete_is_recursive_and_deepest_first() {
        let zk = MemoryWatcher::new();
        zk.set("/t/a", "1");
        zk.set("/t/a/b", "2");
        let (_, seen) = recorder(&zk, "/t");
        assert!(zk.delete("/t/a"));
        assert!(!zk.delete("/t/a"));
        assert!(!zk.delete("/"));
        let paths: Vec<_> = seen.lock().iter().map(|e| e.path().to_string()).collect();
        assert_eq!(paths, vec!["/t/a/b".to_string(), "/t/a".to_string()]);
        assert!(zk.exists("/t"));
        assert!(zk.descendants("/t").is_empty());
    }

    #[test]
    fn descendants_map_empty_nodes_to_empty_bytes() {
        let zk = MemoryWatcher::new();
        zk.create_empty("/r/empty");
        zk.set("/r/full", "x");
        let snap = zk.descendants("/r");
        assert_eq!(snap.len(), 2);
        assert!(snap["/r/empty"].is_empty());
        assert_eq!(&snap["/r/full"][..], b"x");
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let zk = MemoryWatcher::new();
        let (id, seen) = recorder(&zk, "/");
        assert_eq!(zk.listener_count(), 1);
        zk.unsubscribe(id);
        assert_eq!(zk.listener_count(), 0);
        zk.set("/a", "1");
        assert!(seen.lock().is_empty());
    }
}
