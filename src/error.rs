//! Error types used by cached resources.
//!
//! This module defines:
//!
//! - [`ResourceError`]: errors surfaced to callers (builder validation, access after close).
//! - [`BuildError`]: the boxed error a factory returns when it cannot build a value.
//!
//! Construction failures never surface as [`ResourceError`]: they are absorbed at the
//! resource boundary, routed to failure listeners and logged, while the last good value
//! stays live.

use thiserror::Error;

/// Error returned by a factory that failed to build a value from raw data.
///
/// Any `std::error::Error + Send + Sync` converts into it with `?` or `.into()`.
pub type BuildError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors surfaced by cached resources.
///
/// Only configuration mistakes and post-close access reach the caller.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A builder was missing a mandatory field or had an unusable combination of options.
    #[error("invalid resource configuration: {reason}")]
    Configuration {
        /// What was missing or inconsistent.
        reason: String,
    },

    /// The resource was closed; it will never produce a value again.
    #[error("resource at {path} is closed")]
    Closed {
        /// Monitored path of the closed resource.
        path: String,
    },
}

impl ResourceError {
    /// Shorthand for [`ResourceError::Configuration`].
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        ResourceError::Configuration {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use zkresource::ResourceError;
    ///
    /// let err = ResourceError::Closed { path: "/app/conf".into() };
    /// assert_eq!(err.as_label(), "resource_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ResourceError::Configuration { .. } => "resource_configuration",
            ResourceError::Closed { .. } => "resource_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ResourceError::Configuration { reason } => format!("configuration: {reason}"),
            ResourceError::Closed { path } => format!("closed: {path}"),
        }
    }

    /// Indicates whether the error is terminal for the resource that produced it.
    ///
    /// Only [`ResourceError::Closed`] is terminal; configuration errors happen before a
    /// resource exists.
    pub fn is_closed(&self) -> bool {
        matches!(self, ResourceError::Closed { .. })
    }
}

/// Converts a caught panic payload into a readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            ResourceError::config("path is required").as_label(),
            "resource_configuration"
        );
        let closed = ResourceError::Closed { path: "/a".into() };
        assert_eq!(closed.as_label(), "resource_closed");
        assert!(closed.is_closed());
        assert_eq!(closed.to_string(), "resource at /a is closed");
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
