//! # Non-blocking event fan-out to multiple subscribers.
//!
//! ```text
//! Bus ──► forwarder ──► emit(event)
//!                          ├──► [queue 1] ──► worker 1 ──► sub1.on_event()
//!                          └──► [queue N] ──► worker N ──► subN.on_event()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit()` uses `try_send` and returns immediately.
//! - **Overflow**: the event is dropped for that subscriber only and
//!   `SubscriberOverflow` is published (never recursively).
//! - **Isolation**: a panicking subscriber is logged and reported as `SubscriberPanicked`
//!   on the bus; its worker keeps running. The forwarder never feeds
//!   `SubscriberPanicked` back into the set.
//! - **Per-subscriber FIFO**, no cross-subscriber ordering.

use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for resource event subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per subscriber on `rt`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus, rt: &Handle) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            let worker_bus = bus.clone();

            let handle = rt.spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = panic_message(panic.as_ref());
                        warn!(subscriber = sub.name(), info = %info, "subscriber panicked");
                        worker_bus.publish(Event::subscriber_panicked(sub.name(), info));
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// `true` when no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emits an event to all subscribers without waiting for them.
    pub fn emit(&self, event: Arc<Event>) {
        let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// Drops all queues and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }
}

/// Spawns the task that pumps `bus` into `set` until `token` is cancelled.
///
/// On cancellation, events already on the bus are forwarded and the set is shut down,
/// so queued events are still delivered.
pub(crate) fn spawn_forwarder(
    rt: &Handle,
    bus: &Bus,
    set: SubscriberSet,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    rt.spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        forward(&set, ev);
                    }
                    break;
                }
                msg = rx.recv() => match msg {
                    Ok(ev) => forward(&set, ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "event forwarder lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        set.shutdown().await;
    })
}

fn forward(set: &SubscriberSet, ev: Event) {
    if ev.kind != EventKind::SubscriberPanicked {
        set.emit(Arc::new(ev));
    }
}
