//! # Fail-safe build pipeline.
//!
//! Runs a factory over some input (`RawRecord` for nodes, `TreeSnapshot` for trees)
//! and absorbs every failure:
//!
//! ```text
//! factory(input)
//!   ├─ Ok(v)     ─► Some(Arc<v>)
//!   ├─ Err(e)    ─┐
//!   └─ panic     ─┴► warn!, BuildFailed, listeners(input, e) each under catch_unwind ─► None
//! ```
//!
//! The pipeline never touches the published value, so by the time listeners run the
//! previous value is known to still be live.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::warn;

use crate::error::{panic_message, BuildError};
use crate::events::{Bus, Event, EventKind};

/// Fallible conversion from raw input to a typed value.
pub(crate) type Factory<I, T> = Arc<dyn Fn(&I) -> Result<T, BuildError> + Send + Sync>;

/// Callback invoked once per failed build with the offending input and the error.
pub type FailureListener<I> = Arc<dyn Fn(&I, &BuildError) + Send + Sync>;

pub(crate) struct Pipeline<I, T> {
    path: Arc<str>,
    factory: Factory<I, T>,
    listeners: Arc<[FailureListener<I>]>,
    bus: Bus,
}

impl<I, T> Pipeline<I, T> {
    pub(crate) fn new(
        path: Arc<str>,
        factory: Factory<I, T>,
        listeners: Arc<[FailureListener<I>]>,
        bus: Bus,
    ) -> Self {
        Self {
            path,
            factory,
            listeners,
            bus,
        }
    }

    /// Same listeners and bus, different factory.
    pub(crate) fn with_factory(&self, factory: Factory<I, T>) -> Self {
        Self {
            path: Arc::clone(&self.path),
            factory,
            listeners: Arc::clone(&self.listeners),
            bus: self.bus.clone(),
        }
    }

    /// Builds a value from `input`; `None` when the factory failed.
    ///
    /// `version` only decorates events and logs.
    pub(crate) fn build(&self, input: &I, version: Option<u64>) -> Option<Arc<T>> {
        let res = std::panic::catch_unwind(AssertUnwindSafe(|| (self.factory)(input)))
            .unwrap_or_else(|panic| {
                Err(format!("factory panicked: {}", panic_message(panic.as_ref())).into())
            });
        match res {
            Ok(v) => Some(Arc::new(v)),
            Err(err) => {
                self.fail(input, &err, version);
                None
            }
        }
    }

    fn fail(&self, input: &I, err: &BuildError, version: Option<u64>) {
        warn!(path = %self.path, version = ?version, error = %err, "failed to build resource, keeping previous value");
        self.bus.publish(
            Event::new(EventKind::BuildFailed)
                .with_path(Arc::clone(&self.path))
                .with_reason(err.to_string())
                .with_version(version),
        );

        for listener in self.listeners.iter() {
            let res = std::panic::catch_unwind(AssertUnwindSafe(|| listener(input, err)));
            if let Err(panic) = res {
                let info = panic_message(panic.as_ref());
                warn!(path = %self.path, info = %info, "failure listener panicked");
                self.bus.publish(
                    Event::new(EventKind::ListenerPanicked)
                        .with_path(Arc::clone(&self.path))
                        .with_reason(info),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parse_pipeline(listeners: Vec<FailureListener<String>>, bus: &Bus) -> Pipeline<String, i32> {
        Pipeline::new(
            Arc::from("/n"),
            Arc::new(|s: &String| -> Result<i32, BuildError> { Ok(s.parse::<i32>()?) }),
            listeners.into(),
            bus.clone(),
        )
    }

    #[test]
    fn success_builds_value() {
        let bus = Bus::new(8);
        let p = parse_pipeline(Vec::new(), &bus);
        assert_eq!(p.build(&"12".to_string(), None).as_deref(), Some(&12));
    }

    #[test]
    fn failure_runs_every_listener_even_after_a_panic() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let listeners: Vec<FailureListener<String>> = vec![
            Arc::new(|_: &String, _: &BuildError| panic!("listener broke")),
            Arc::new(move |input: &String, err: &BuildError| {
                assert_eq!(input, "nope");
                assert!(!err.to_string().is_empty());
                h.fetch_add(1, Ordering::SeqCst);
            }),
        ];
        let p = parse_pipeline(listeners, &bus);

        assert!(p.build(&"nope".to_string(), Some(4)).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let failed = rx.try_recv().unwrap();
        assert_eq!(failed.kind, EventKind::BuildFailed);
        assert_eq!(failed.version, Some(4));
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::ListenerPanicked);
    }

    #[test]
    fn factory_panic_is_a_build_failure() {
        let bus = Bus::new(8);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let p: Pipeline<String, i32> = Pipeline::new(
            Arc::from("/n"),
            Arc::new(|_: &String| -> Result<i32, BuildError> { panic!("bad input") }),
            vec![Arc::new(move |_: &String, err: &BuildError| {
                assert!(err.to_string().contains("bad input"));
                h.fetch_add(1, Ordering::SeqCst);
            }) as FailureListener<String>]
            .into(),
            bus,
        );
        assert!(p.build(&String::new(), None).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
