//! # LogWriter: events as tracing records
//!
//! A subscriber that renders every [`Event`] as a `tracing` record under the
//! `zkresource::events` target. Failures log at `warn`, everything else at `info`/`debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO zkresource::events: built path="/app/conf" version=Some(3)
//! WARN zkresource::events: build failed path="/app/conf" err="invalid digit found in string"
//! DEBUG zkresource::events: retirement deferred path="/app/db" attempt=2 delay_ms=1000
//! INFO zkresource::events: retired path="/app/db" attempt=3
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let path = e.path.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ResourceBuilt => {
                info!(target: "zkresource::events", path, version = ?e.version, "built");
            }
            EventKind::BuildFailed => {
                warn!(target: "zkresource::events", path, err = reason, "build failed");
            }
            EventKind::ResourceReset => {
                info!(target: "zkresource::events", path, "reset to empty value");
            }
            EventKind::RefreshScheduled => {
                debug!(target: "zkresource::events", path, "refresh scheduled");
            }
            EventKind::RetirementScheduled => {
                debug!(target: "zkresource::events", path, "retirement scheduled");
            }
            EventKind::RetirementDeferred => {
                debug!(
                    target: "zkresource::events",
                    path, attempt = ?e.attempt, delay_ms = ?e.delay_ms, "retirement deferred"
                );
            }
            EventKind::ResourceRetired => {
                info!(target: "zkresource::events", path, attempt = ?e.attempt, "retired");
            }
            EventKind::ResourceClosed => {
                info!(target: "zkresource::events", path, "closed");
            }
            EventKind::ListenerPanicked => {
                warn!(target: "zkresource::events", path, info = reason, "failure listener panicked");
            }
            EventKind::SubscriberPanicked => {
                warn!(
                    target: "zkresource::events",
                    subscriber = e.subscriber.unwrap_or("unknown"), info = reason, "subscriber panicked"
                );
            }
            EventKind::SubscriberOverflow => {
                warn!(
                    target: "zkresource::events",
                    subscriber = e.subscriber.unwrap_or("unknown"), reason, "subscriber overflow"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
