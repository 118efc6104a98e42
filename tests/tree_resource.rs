use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use zkresource::watcher::{MemoryWatcher, TreeSnapshot};
use zkresource::{BuildError, EventKind, TreeResource};

fn decode(snap: &TreeSnapshot) -> Result<BTreeMap<String, String>, BuildError> {
    snap.iter()
        .map(|(k, v)| -> Result<(String, String), BuildError> {
            let name = k.rsplit('/').next().unwrap_or_default().to_string();
            Ok((name, std::str::from_utf8(v)?.to_string()))
        })
        .collect()
}

#[test]
fn tree_tracks_children_until_closed() {
    let zk = Arc::new(MemoryWatcher::new());
    zk.set("/members/a", "host-a");
    let builds = Arc::new(AtomicUsize::new(0));
    let b = Arc::clone(&builds);

    let members = TreeResource::<BTreeMap<String, String>>::builder()
        .with_path("/members")
        .with_watcher(zk.clone())
        .with_factory(move |snap: &TreeSnapshot| {
            b.fetch_add(1, Ordering::SeqCst);
            decode(snap)
        })
        .build()
        .unwrap();

    let first = members.get().unwrap().unwrap();
    assert_eq!(first.get("a").map(String::as_str), Some("host-a"));

    zk.set("/members/b", "host-b");
    assert_eq!(members.get().unwrap().unwrap().len(), 2);

    zk.delete("/members/a");
    let now = members.get().unwrap().unwrap();
    assert_eq!(now.keys().collect::<Vec<_>>(), vec!["b"]);

    members.close();
    let builds_at_close = builds.load(Ordering::SeqCst);
    zk.set("/members/c", "host-c");
    assert_eq!(builds.load(Ordering::SeqCst), builds_at_close);
    assert!(members.get().unwrap_err().is_closed());
    members.close();
}

#[test]
fn events_outside_the_subtree_are_ignored() {
    let zk = Arc::new(MemoryWatcher::new());
    let builds = Arc::new(AtomicUsize::new(0));
    let b = Arc::clone(&builds);
    let tree = TreeResource::<usize>::builder()
        .with_path("/a")
        .with_watcher(zk.clone())
        .with_factory(move |snap: &TreeSnapshot| -> Result<usize, BuildError> {
            b.fetch_add(1, Ordering::SeqCst);
            Ok(snap.len())
        })
        .build()
        .unwrap();
    tree.get().unwrap();
    zk.set("/ab/x", "1");
    zk.set("/a", "root only");
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_tree_refresh() {
    let zk = Arc::new(MemoryWatcher::new());
    let tree = TreeResource::<usize>::builder()
        .with_path("/jobs")
        .with_watcher(zk.clone())
        .with_factory(|snap: &TreeSnapshot| -> Result<usize, BuildError> { Ok(snap.len()) })
        .async_refresh(Handle::current())
        .build()
        .unwrap();
    assert_eq!(tree.get().unwrap().as_deref(), Some(&0));
    let mut events = tree.events();

    zk.set("/jobs/1", "x");
    zk.set("/jobs/2", "y");
    for _ in 0..400 {
        if tree.get().unwrap().as_deref() == Some(&2) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(tree.get().unwrap().as_deref(), Some(&2));
    assert_eq!(events.recv().await.unwrap().kind, EventKind::RefreshScheduled);

    tree.close();
    assert!(tree.is_closed());
}
