//! Error types used by the bus, its publishers and handler chains.
//!
//! This module defines two main error enums:
//!
//! - [`HandlerError`]: failures of a single handler invocation (or an aggregate of them).
//! - [`BuildError`]: chain configuration errors, raised while a chain is built and never at publish time.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use thiserror::Error;

/// # Errors produced by handler invocations.
///
/// Returned by handlers, decorators and publish strategies. Parallel publishers and
/// branch-out decorators combine several failures into [`HandlerError::Aggregate`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handler failed but may succeed if retried.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable error (retry decorators give up immediately).
    #[error("fatal handler error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Handler panicked; the panic was caught by the worker that ran it.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Handler observed the cancellation token and gave up.
    #[error("handler cancelled")]
    Canceled,

    /// The worker pool owning the message was shut down before the message ran.
    #[error("worker pool shut down before the message was handled")]
    Shutdown,

    /// More than one concurrent invocation failed.
    #[error("{} handlers failed", .errors.len())]
    Aggregate {
        /// Individual failures, in handler order.
        errors: Vec<HandlerError>,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`HandlerError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        HandlerError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use chainbus::HandlerError;
    ///
    /// assert_eq!(HandlerError::fail("boom").as_label(), "handler_failed");
    /// assert_eq!(HandlerError::Shutdown.as_label(), "handler_shutdown");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Fatal { .. } => "handler_fatal",
            HandlerError::Panicked { .. } => "handler_panicked",
            HandlerError::Canceled => "handler_canceled",
            HandlerError::Shutdown => "handler_shutdown",
            HandlerError::Aggregate { .. } => "handler_aggregate",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Fatal { error } => format!("fatal: {error}"),
            HandlerError::Panicked { info } => format!("panic: {info}"),
            HandlerError::Canceled => "context cancelled".to_string(),
            HandlerError::Shutdown => "worker pool shut down".to_string(),
            HandlerError::Aggregate { errors } => {
                let parts: Vec<String> = errors.iter().map(HandlerError::as_message).collect();
                format!("{} failures: [{}]", errors.len(), parts.join("; "))
            }
        }
    }

    /// Indicates whether the failure is worth another attempt.
    ///
    /// Returns `true` for [`HandlerError::Fail`] and [`HandlerError::Panicked`], and
    /// for an [`HandlerError::Aggregate`] whose members are all retryable.
    /// `false` otherwise.
    ///
    /// # Example
    /// ```
    /// use chainbus::HandlerError;
    ///
    /// assert!(HandlerError::fail("flaky").is_retryable());
    /// assert!(!HandlerError::fatal("nope").is_retryable());
    ///
    /// let both = HandlerError::Aggregate {
    ///     errors: vec![HandlerError::fail("a"), HandlerError::fail("b")],
    /// };
    /// assert!(both.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            HandlerError::Fail { .. } | HandlerError::Panicked { .. } => true,
            HandlerError::Aggregate { errors } => errors.iter().all(HandlerError::is_retryable),
            _ => false,
        }
    }

    /// Folds a batch of results into one, keeping every failure.
    ///
    /// - no failures → `Ok(())`
    /// - one failure → that error, unchanged
    /// - several → [`HandlerError::Aggregate`] in input order
    pub fn collect<I>(results: I) -> Result<(), HandlerError>
    where
        I: IntoIterator<Item = Result<(), HandlerError>>,
    {
        let mut errors: Vec<HandlerError> = results.into_iter().filter_map(Result::err).collect();
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(HandlerError::Aggregate { errors }),
        }
    }
}

/// # Errors produced while building a handler chain.
///
/// Decorator configuration is validated when the chain is frozen, so a bad
/// chain never reaches a bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A key-based decorator was configured without a key selector.
    #[error("decorator `{decorator}` requires a key selector")]
    KeySelectorMissing {
        /// Decorator name.
        decorator: String,
    },

    /// Declarative wiring referenced a decorator nobody registered.
    #[error("unknown decorator `{name}`")]
    UnknownDecorator {
        /// Requested decorator name.
        name: String,
    },

    /// Decorator options could not be interpreted.
    #[error("invalid configuration for `{decorator}`: {reason}")]
    InvalidConfig {
        /// Decorator name.
        decorator: String,
        /// What was wrong.
        reason: String,
    },

    /// A decorator that spawns workers was built outside a tokio runtime.
    #[error("decorator `{decorator}` must be built inside a tokio runtime")]
    NoRuntime {
        /// Decorator name.
        decorator: String,
    },
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::KeySelectorMissing { .. } => "build_key_selector_missing",
            BuildError::UnknownDecorator { .. } => "build_unknown_decorator",
            BuildError::InvalidConfig { .. } => "build_invalid_config",
            BuildError::NoRuntime { .. } => "build_no_runtime",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_without_failures_is_ok() {
        assert_eq!(HandlerError::collect(vec![Ok(()), Ok(())]), Ok(()));
        assert_eq!(HandlerError::collect(Vec::new()), Ok(()));
    }

    #[test]
    fn collect_single_failure_is_passed_through() {
        let res = HandlerError::collect(vec![Ok(()), Err(HandlerError::fail("a")), Ok(())]);
        assert_eq!(res, Err(HandlerError::fail("a")));
    }

    #[test]
    fn collect_many_failures_aggregates_in_order() {
        let res = HandlerError::collect(vec![
            Err(HandlerError::fail("a")),
            Ok(()),
            Err(HandlerError::Canceled),
        ]);
        match res {
            Err(HandlerError::Aggregate { errors }) => {
                assert_eq!(errors, vec![HandlerError::fail("a"), HandlerError::Canceled]);
            }
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[test]
    fn aggregate_message_lists_every_failure() {
        let err = HandlerError::Aggregate {
            errors: vec![HandlerError::fail("x"), HandlerError::Shutdown],
        };
        assert_eq!(err.to_string(), "2 handlers failed");
        assert_eq!(err.as_message(), "2 failures: [error: x; worker pool shut down]");
        assert!(!err.is_retryable());
    }

    #[test]
    fn aggregate_is_retryable_only_if_every_member_is() {
        let flaky = HandlerError::Aggregate {
            errors: vec![
                HandlerError::fail("a"),
                HandlerError::Panicked { info: "b".into() },
            ],
        };
        assert!(flaky.is_retryable());

        let mixed = HandlerError::Aggregate {
            errors: vec![HandlerError::fail("a"), HandlerError::fatal("b")],
        };
        assert!(!mixed.is_retryable());

        let nested = HandlerError::Aggregate {
            errors: vec![flaky, HandlerError::fail("c")],
        };
        assert!(nested.is_retryable());
    }

    #[test]
    fn build_error_labels_are_stable() {
        let err = BuildError::KeySelectorMissing {
            decorator: "Distinct".into(),
        };
        assert_eq!(err.as_label(), "build_key_selector_missing");
        assert_eq!(err.to_string(), "decorator `Distinct` requires a key selector");
    }
}
