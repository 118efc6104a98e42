//! # Resource builders.
//!
//! [`ResourceBuilder`] assembles the immutable configuration of a
//! [`CachedResource`](crate::CachedResource); with the input type set to
//! [`TreeSnapshot`] (alias [`TreeResourceBuilder`]) it assembles a
//! [`TreeResource`](crate::TreeResource) instead.
//!
//! ## Required
//! - `with_path` (absolute, starting with `/`)
//! - `with_watcher`
//! - a factory (`with_factory`, or `with_bytes_factory` / `with_string_factory` for nodes)
//!
//! ## Runtime
//! Retirement loops and subscriber workers run on tokio. They use the handle given to
//! `with_runtime`, or the ambient runtime at `build()` time; without either, `build()`
//! fails with [`ResourceError::Configuration`]. Resources without retirement or
//! subscribers need no runtime at all.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use zkresource::watcher::MemoryWatcher;
//! use zkresource::CachedResource;
//!
//! let zk = Arc::new(MemoryWatcher::new());
//! let port = CachedResource::<u16>::builder()
//!     .with_path("/app/port")
//!     .with_watcher(zk.clone())
//!     .with_string_factory(|s| s.trim().parse::<u16>())
//!     .with_empty_value(8080)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(*port.get().unwrap(), 8080);
//! zk.set("/app/port", "9090");
//! assert_eq!(*port.get().unwrap(), 9090);
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::node::CachedResource;
use crate::core::pipeline::{FailureListener, Factory, Pipeline};
use crate::core::retire::{RetirePredicate, RetirementPolicy, Retirer};
use crate::core::slot::Slot;
use crate::core::tree::TreeResource;
use crate::error::{BuildError, ResourceError};
use crate::events::Bus;
use crate::policies::BackoffPolicy;
use crate::refresh::{Executor, RefreshStrategy};
use crate::subscribers::{spawn_forwarder, Subscribe, SubscriberSet};
use crate::watcher::{RawRecord, TreeSnapshot, Watcher};

/// Builder for a [`TreeResource`].
pub type TreeResourceBuilder<T> = ResourceBuilder<T, TreeSnapshot>;

/// Builder for cached resources; `I` is the factory input.
pub struct ResourceBuilder<T, I = RawRecord> {
    path: Option<String>,
    watcher: Option<Arc<dyn Watcher>>,
    factory: Option<Factory<I, T>>,
    refresh_factory: Option<Factory<I, T>>,
    empty: Option<Arc<T>>,
    strategy: RefreshStrategy,
    listeners: Vec<FailureListener<I>>,
    retirement: Option<(RetirePredicate<T>, Option<BackoffPolicy>)>,
    runtime: Option<Handle>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    config: Config,
}

/// Validated parts shared by node and tree resources.
pub(crate) struct Assembly<I, T> {
    pub(crate) path: Arc<str>,
    pub(crate) watcher: Arc<dyn Watcher>,
    pub(crate) empty: Option<Arc<T>>,
    pub(crate) initial: Pipeline<I, T>,
    pub(crate) refresh: Pipeline<I, T>,
    pub(crate) strategy: RefreshStrategy,
    pub(crate) slot: Slot<T>,
    pub(crate) bus: Bus,
    pub(crate) forwarder: Option<CancellationToken>,
}

impl<T, I> Default for ResourceBuilder<T, I> {
    fn default() -> Self {
        Self {
            path: None,
            watcher: None,
            factory: None,
            refresh_factory: None,
            empty: None,
            strategy: RefreshStrategy::Inline,
            listeners: Vec::new(),
            retirement: None,
            runtime: None,
            subscribers: Vec::new(),
            config: Config::default(),
        }
    }
}

impl<T, I> ResourceBuilder<T, I>
where
    T: Send + Sync + 'static,
    I: 'static,
{
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the monitored path (node) or subtree root (tree).
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the watcher the resource subscribes to.
    pub fn with_watcher(mut self, watcher: Arc<dyn Watcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Sets the factory used to build values.
    ///
    /// It is also used for change-driven refreshes unless a refresh factory is set.
    pub fn with_factory<F, E>(mut self, factory: F) -> Self
    where
        F: Fn(&I) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BuildError>,
    {
        self.factory = Some(Arc::new(move |input: &I| factory(input).map_err(Into::into)));
        self
    }

    /// Value returned while there is no data (or no successful build yet).
    pub fn with_empty_value(mut self, empty: T) -> Self {
        self.empty = Some(Arc::new(empty));
        self
    }

    /// Selects where change-driven rebuilds run. Default: [`RefreshStrategy::Inline`].
    pub fn with_refresh_strategy(mut self, strategy: RefreshStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for `with_refresh_strategy(RefreshStrategy::executor(exec))`.
    pub fn async_refresh(self, exec: impl Executor) -> Self {
        self.with_refresh_strategy(RefreshStrategy::executor(exec))
    }

    /// Uses a distinct factory, run on `exec`, for change-driven refreshes.
    ///
    /// First-time materialization still uses the main factory on the calling thread.
    pub fn with_refresh_factory<F, E>(mut self, exec: impl Executor, factory: F) -> Self
    where
        F: Fn(&I) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BuildError>,
    {
        self.refresh_factory = Some(Arc::new(move |input: &I| factory(input).map_err(Into::into)));
        self.async_refresh(exec)
    }

    /// Adds a listener invoked once per failed build. Listeners run in registration order.
    pub fn add_failure_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&I, &BuildError) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Retires displaced values by probing `predicate` every `period`.
    pub fn with_retirement<F>(self, predicate: F, period: Duration) -> Self
    where
        F: Fn(&Arc<T>) -> bool + Send + Sync + 'static,
    {
        self.with_retirement_backoff(predicate, BackoffPolicy::constant(period))
    }

    /// Retires displaced values by probing `predicate` with waits from `backoff`.
    pub fn with_retirement_backoff<F>(self, predicate: F, backoff: BackoffPolicy) -> Self
    where
        F: Fn(&Arc<T>) -> bool + Send + Sync + 'static,
    {
        self.with_retirement_policy(RetirementPolicy::new(predicate, backoff))
    }

    /// Retires displaced values according to a prepared `policy`.
    ///
    /// Policies are cheap to clone, so one policy can be shared by many builders.
    pub fn with_retirement_policy(mut self, policy: RetirementPolicy<T>) -> Self {
        let (predicate, wait) = policy.into_parts();
        self.retirement = Some((predicate, Some(wait)));
        self
    }

    /// Retires displaced values by probing `predicate` with [`Config::retire_backoff`].
    pub fn with_retirement_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Arc<T>) -> bool + Send + Sync + 'static,
    {
        self.retirement = Some((Arc::new(predicate), None));
        self
    }

    /// Runtime for retirement loops and subscriber workers.
    pub fn with_runtime(mut self, rt: Handle) -> Self {
        self.runtime = Some(rt);
        self
    }

    /// Registers lifecycle event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the shared defaults.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn assemble(self) -> Result<Assembly<I, T>, ResourceError> {
        let path = self
            .path
            .ok_or_else(|| ResourceError::config("path is required"))?;
        if !path.starts_with('/') {
            return Err(ResourceError::config(format!(
                "path must be absolute, got {path:?}"
            )));
        }
        if path.len() > 1 && path.ends_with('/') {
            return Err(ResourceError::config(format!(
                "path must not end with '/', got {path:?}"
            )));
        }
        let watcher = self
            .watcher
            .ok_or_else(|| ResourceError::config("watcher is required"))?;
        let factory = self
            .factory
            .ok_or_else(|| ResourceError::config("factory is required"))?;

        let needs_runtime = self.retirement.is_some() || !self.subscribers.is_empty();
        let rt = self.runtime.or_else(|| Handle::try_current().ok());
        if needs_runtime && rt.is_none() {
            return Err(ResourceError::config(
                "retirement and subscribers need a tokio runtime; call with_runtime or build inside one",
            ));
        }

        let path: Arc<str> = Arc::from(path);
        let bus = Bus::new(self.config.bus_capacity_clamped());

        let retirement = self.retirement.map(|(predicate, backoff)| {
            RetirementPolicy::from_parts(predicate, backoff.unwrap_or(self.config.retire_backoff))
        });
        let retirer = Retirer::new(retirement, rt.clone(), bus.clone(), Arc::clone(&path));
        let slot = Slot::new(Arc::clone(&path), retirer, bus.clone());

        let refresh_factory = self
            .refresh_factory
            .unwrap_or_else(|| Arc::clone(&factory));
        let initial = Pipeline::new(
            Arc::clone(&path),
            factory,
            self.listeners.into(),
            bus.clone(),
        );
        let refresh = initial.with_factory(refresh_factory);

        let forwarder = match (rt, self.subscribers.is_empty()) {
            (Some(rt), false) => {
                let set = SubscriberSet::new(self.subscribers, bus.clone(), &rt);
                let token = CancellationToken::new();
                spawn_forwarder(&rt, &bus, set, token.clone());
                Some(token)
            }
            _ => None,
        };

        Ok(Assembly {
            path,
            watcher,
            empty: self.empty,
            initial,
            refresh,
            strategy: self.strategy,
            slot,
            bus,
            forwarder,
        })
    }
}

impl<T: Send + Sync + 'static> ResourceBuilder<T, RawRecord> {
    /// Factory over the node payload. Records without data never reach it.
    pub fn with_bytes_factory<F, E>(self, factory: F) -> Self
    where
        F: Fn(&[u8]) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BuildError> + 'static,
    {
        self.with_factory(bytes_factory(factory))
    }

    /// Factory over the node payload decoded as UTF-8.
    pub fn with_string_factory<F, E>(self, factory: F) -> Self
    where
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BuildError> + 'static,
    {
        self.with_factory(string_factory(factory))
    }

    /// String factory variant of [`with_refresh_factory`](Self::with_refresh_factory).
    pub fn with_refresh_string_factory<F, E>(self, exec: impl Executor, factory: F) -> Self
    where
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BuildError> + 'static,
    {
        self.with_refresh_factory(exec, string_factory(factory))
    }

    /// Validates the configuration and creates the resource. Nothing is read yet.
    pub fn build(self) -> Result<CachedResource<T>, ResourceError> {
        Ok(CachedResource::from_assembly(self.assemble()?))
    }
}

impl<T: Send + Sync + 'static> ResourceBuilder<T, TreeSnapshot> {
    /// Validates the configuration and creates the tree resource. Nothing is read yet.
    pub fn build(self) -> Result<TreeResource<T>, ResourceError> {
        Ok(TreeResource::from_assembly(self.assemble()?))
    }
}

fn payload(rec: &RawRecord) -> Result<&[u8], BuildError> {
    rec.bytes()
        .ok_or_else(|| BuildError::from(format!("no data at {}", rec.path)))
}

fn bytes_factory<T, F, E>(factory: F) -> impl Fn(&RawRecord) -> Result<T, BuildError>
where
    F: Fn(&[u8]) -> Result<T, E>,
    E: Into<BuildError>,
{
    move |rec: &RawRecord| factory(payload(rec)?).map_err(Into::into)
}

fn string_factory<T, F, E>(factory: F) -> impl Fn(&RawRecord) -> Result<T, BuildError>
where
    F: Fn(&str) -> Result<T, E>,
    E: Into<BuildError>,
{
    move |rec: &RawRecord| {
        let s = std::str::from_utf8(payload(rec)?)?;
        factory(s).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::MemoryWatcher;

    fn zk() -> Arc<dyn Watcher> {
        Arc::new(MemoryWatcher::new())
    }

    fn reason(err: ResourceError) -> String {
        match err {
            ResourceError::Configuration { reason } => reason,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn path_watcher_and_factory_are_mandatory() {
        let err = ResourceBuilder::<i32>::new()
            .with_watcher(zk())
            .with_string_factory(|s| s.parse::<i32>())
            .build()
            .err()
            .unwrap();
        assert_eq!(reason(err), "path is required");

        let err = ResourceBuilder::<i32>::new()
            .with_path("/a")
            .with_string_factory(|s| s.parse::<i32>())
            .build()
            .err()
            .unwrap();
        assert_eq!(reason(err), "watcher is required");

        let err = ResourceBuilder::<i32>::new()
            .with_path("/a")
            .with_watcher(zk())
            .build()
            .err()
            .unwrap();
        assert_eq!(reason(err), "factory is required");

        let err = TreeResourceBuilder::<usize>::new()
            .with_path("/t")
            .with_watcher(zk())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "resource_configuration");
    }

    #[test]
    fn relative_path_is_rejected() {
        let err = ResourceBuilder::<i32>::new()
            .with_path("a/b")
            .with_watcher(zk())
            .with_string_factory(|s| s.parse::<i32>())
            .build()
            .err()
            .unwrap();
        assert!(reason(err).contains("absolute"));
    }

    #[test]
    fn retirement_without_runtime_is_rejected() {
        let err = ResourceBuilder::<i32>::new()
            .with_path("/a")
            .with_watcher(zk())
            .with_string_factory(|s| s.parse::<i32>())
            .with_retirement(|_| true, Duration::from_millis(10))
            .build()
            .err()
            .unwrap();
        assert!(reason(err).contains("tokio runtime"));
    }

    #[test]
    fn trailing_slash_is_rejected() {
        let err = TreeResourceBuilder::<usize>::new()
            .with_path("/app/")
            .with_watcher(zk())
            .with_factory(|snap: &TreeSnapshot| -> Result<usize, BuildError> { Ok(snap.len()) })
            .build()
            .err()
            .unwrap();
        assert!(reason(err).contains("must not end with '/'"));

        let root = TreeResourceBuilder::<usize>::new()
            .with_path("/")
            .with_watcher(zk())
            .with_factory(|snap: &TreeSnapshot| -> Result<usize, BuildError> { Ok(snap.len()) })
            .build();
        assert!(root.is_ok());
    }

    #[test]
    fn retirement_policy_needs_runtime_too() {
        let policy = RetirementPolicy::<i32>::constant(|_| true, Duration::from_millis(1));
        let err = ResourceBuilder::<i32>::new()
            .with_path("/a")
            .with_watcher(zk())
            .with_string_factory(|s| s.parse::<i32>())
            .with_retirement_policy(policy)
            .build()
            .err()
            .unwrap();
        assert!(reason(err).contains("tokio runtime"));
    }

    #[tokio::test]
    async fn retirement_uses_ambient_runtime() {
        let res = ResourceBuilder::<i32>::new()
            .with_path("/a")
            .with_watcher(zk())
            .with_string_factory(|s| s.parse::<i32>())
            .with_retirement_predicate(|_| true)
            .build();
        assert!(res.is_ok());
    }

    #[test]
    fn string_factory_rejects_bad_utf8_and_missing_data() {
        let f = string_factory(|s: &str| Ok::<_, BuildError>(s.len()));
        assert_eq!(f(&RawRecord::new("/a", "abc")).unwrap(), 3);
        assert!(f(&RawRecord::new("/a", vec![0xff, 0xfe])).is_err());
        let err = f(&RawRecord::absent("/a")).unwrap_err();
        assert_eq!(err.to_string(), "no data at /a");
    }

    #[test]
    fn bytes_factory_sees_raw_payload() {
        let f = bytes_factory(|b: &[u8]| Ok::<_, BuildError>(b.to_vec()));
        assert_eq!(f(&RawRecord::new("/a", vec![1u8, 2])).unwrap(), vec![1, 2]);
    }
}
