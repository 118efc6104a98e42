//! # Demo: hot_reload
//!
//! A connection-string resource that is rebuilt whenever its node changes, with the
//! displaced value retired once no reader holds it any more.
//!
//! ## Flow
//! ```text
//! MemoryWatcher.set("/db/url") ──► CachedResource (executor refresh)
//!     ├─► factory(&str) ──► swap ──► ResourceBuilt
//!     └─► old value ──► retirement task ──► ResourceRetired
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example hot_reload
//! ```

use std::sync::Arc;
use std::time::Duration;

use zkresource::watcher::MemoryWatcher;
use zkresource::{BuildError, CachedResource, Event, Subscribe};

struct Console;

#[async_trait::async_trait]
impl Subscribe for Console {
    async fn on_event(&self, ev: &Event) {
        println!(
            "[event] {:?} path={} attempt={:?} reason={}",
            ev.kind,
            ev.path.as_deref().unwrap_or("-"),
            ev.attempt,
            ev.reason.as_deref().unwrap_or("")
        );
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[derive(Debug)]
struct DbConfig {
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let zk = Arc::new(MemoryWatcher::new());
    zk.set("/db/url", "postgres://primary:5432/app");

    let db = CachedResource::<DbConfig>::builder()
        .with_path("/db/url")
        .with_watcher(zk.clone())
        .with_string_factory(|s| -> Result<DbConfig, BuildError> {
            if !s.starts_with("postgres://") {
                return Err(format!("unsupported url {s:?}").into());
            }
            Ok(DbConfig { url: s.to_string() })
        })
        .async_refresh(tokio::runtime::Handle::current())
        .with_retirement(
            |old: &Arc<DbConfig>| Arc::strong_count(old) == 1,
            Duration::from_millis(200),
        )
        .add_failure_listener(|rec, err| {
            println!("[listener] rejected {:?}: {err}", rec.bytes());
        })
        .with_subscribers(vec![Arc::new(Console)])
        .build()?;

    let in_flight = db.get();
    println!("current: {:?}", in_flight.as_deref().map(|c| &c.url));

    zk.set("/db/url", "mysql://nope");
    tokio::time::sleep(Duration::from_millis(100)).await;
    zk.set("/db/url", "postgres://replica:5432/app");
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("current: {:?}", db.get().as_deref().map(|c| &c.url));

    // Releasing the last reader lets the old value retire.
    drop(in_flight);
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
