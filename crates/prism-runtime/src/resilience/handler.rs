//! The error handler: the single place failures are routed through.
//!
//! `log_error` and `handle_error` never panic and never return errors,
//! whatever the context looks like. Each handler owns its ledger; share one
//! across subsystems with an `Arc`.

use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::kind::ErrorKind;
use super::ledger::{ErrorEvent, ErrorLedger, ErrorStats};
use super::recovery::{self, RecoveryStrategy};
use crate::config::ResilienceConfig;

/// Prefix tag on every log line emitted by the handler.
pub const LOG_PREFIX: &str = "[prism]";

/// Context recorded when the caller's context cannot be serialized.
pub const UNSERIALIZABLE_CONTEXT: &str = "[Unserializable context]";

/// Suffix marking a truncated context in the log.
pub const TRUNCATION_MARKER: &str = "...";

/// Observer notified of every logged error.
pub type ErrorCallback = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

/// Handle returned by [`ErrorHandler::on_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Whether the system can still recover, and why not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAssessment {
    pub can_recover: bool,
    pub issues: Vec<String>,
}

/// Classifies, records and fans out failures.
pub struct ErrorHandler {
    config: ResilienceConfig,
    ledger: RwLock<ErrorLedger>,
    callbacks: RwLock<Vec<(CallbackId, ErrorCallback)>>,
    next_callback_id: AtomicU64,
}

impl ErrorHandler {
    /// Create a handler with its own, empty ledger.
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            ledger: RwLock::new(ErrorLedger::new(config.max_recent_events)),
            callbacks: RwLock::new(Vec::new()),
            next_callback_id: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Compute the recovery strategy for `kind`. Pure; see [`crate::resilience::handle_error`].
    pub fn handle_error(&self, kind: ErrorKind, context: &Value) -> RecoveryStrategy {
        recovery::handle_error(kind, context)
    }

    /// Record a failure, log it, and notify every callback.
    pub fn log_error<C>(&self, kind: ErrorKind, message: impl Into<String>, context: &C)
    where
        C: Serialize + ?Sized,
    {
        let event = ErrorEvent {
            kind,
            message: message.into(),
            context: context_to_json(context),
            timestamp: Utc::now(),
        };

        let count = self.ledger.write().record(event.clone());

        let rendered = render_context(&event.context, self.config.max_context_chars);
        tracing::error!(
            kind = %kind,
            context = %rendered,
            "{} {}",
            LOG_PREFIX,
            event.message
        );
        if count > 1 {
            tracing::warn!(
                kind = %kind,
                count,
                "{} Error '{}' has occurred {} times",
                LOG_PREFIX,
                kind,
                count
            );
        }

        self.notify(&event);
    }

    /// Register an observer. Callbacks run in registration order.
    pub fn on_error<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_callback_id.fetch_add(1, Ordering::SeqCst));
        self.callbacks.write().push((id, Arc::new(callback)));
        id
    }

    /// Unregister an observer. Returns false if it was not registered.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn get_error_stats(&self) -> ErrorStats {
        self.ledger.read().stats()
    }

    pub fn clear_error_stats(&self) {
        self.ledger.write().clear();
        tracing::info!("{} Error statistics cleared", LOG_PREFIX);
    }

    pub fn error_count(&self, kind: ErrorKind) -> u32 {
        self.ledger.read().count(kind)
    }

    /// Recent events, oldest first.
    pub fn recent_events(&self) -> Vec<ErrorEvent> {
        self.ledger.read().recent()
    }

    /// Whether `kind` has reached the configured frequent threshold.
    pub fn is_error_frequent(&self, kind: ErrorKind) -> bool {
        self.is_error_frequent_with(kind, self.config.frequent_threshold)
    }

    pub fn is_error_frequent_with(&self, kind: ErrorKind, threshold: u32) -> bool {
        self.error_count(kind) >= threshold
    }

    /// Report conditions under which automatic recovery should not be trusted:
    /// a kind at or above the critical threshold, or no registered observer.
    pub fn validate_recovery_capabilities(&self) -> RecoveryAssessment {
        let critical = self
            .ledger
            .read()
            .kinds_at_or_above(self.config.critical_threshold);

        let mut issues: Vec<String> = critical
            .into_iter()
            .map(|(kind, count)| {
                format!(
                    "High error frequency: '{}' has occurred {} times (limit {})",
                    kind, count, self.config.critical_threshold
                )
            })
            .collect();

        if self.callback_count() == 0 {
            issues.push("Recovery unavailable: no callbacks registered to observe errors".to_string());
        }

        RecoveryAssessment {
            can_recover: issues.is_empty(),
            issues,
        }
    }

    /// Run `operation`; log any error or panic under `kind` and return `None`.
    pub fn with_error_handling<T, E, F, C>(
        &self,
        kind: ErrorKind,
        context: &C,
        operation: F,
    ) -> Option<T>
    where
        F: FnOnce() -> Result<T, E>,
        E: fmt::Display,
        C: Serialize + ?Sized,
    {
        match panic::catch_unwind(AssertUnwindSafe(operation)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.log_error(kind, err.to_string(), context);
                None
            }
            Err(payload) => {
                self.log_error(kind, panic_message(payload.as_ref()), context);
                None
            }
        }
    }

    /// Await `operation`; log any error or panic under `kind` and return `None`.
    pub async fn with_async_error_handling<T, E, Fut, C>(
        &self,
        kind: ErrorKind,
        context: &C,
        operation: Fut,
    ) -> Option<T>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        C: Serialize + ?Sized,
    {
        match AssertUnwindSafe(operation).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.log_error(kind, err.to_string(), context);
                None
            }
            Err(payload) => {
                self.log_error(kind, panic_message(payload.as_ref()), context);
                None
            }
        }
    }

    fn notify(&self, event: &ErrorEvent) {
        // Snapshot so callbacks may register, remove or log without deadlocking.
        let callbacks: Vec<ErrorCallback> = self
            .callbacks
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| (*callback)(event))).is_err() {
                tracing::warn!(kind = %event.kind, "{} Error callback panicked", LOG_PREFIX);
            }
        }
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("config", &self.config)
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

/// Convert any context to JSON. Serialization failures and panics yield
/// [`UNSERIALIZABLE_CONTEXT`].
pub fn context_to_json<C: Serialize + ?Sized>(context: &C) -> Value {
    match panic::catch_unwind(AssertUnwindSafe(|| serde_json::to_value(context))) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "Context could not be serialized");
            Value::String(UNSERIALIZABLE_CONTEXT.to_string())
        }
        Err(_) => Value::String(UNSERIALIZABLE_CONTEXT.to_string()),
    }
}

/// Render a context for logging, cut to `max_chars` characters plus
/// [`TRUNCATION_MARKER`].
pub fn render_context(context: &Value, max_chars: usize) -> String {
    let rendered = context.to_string();
    match rendered.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &rendered[..cut], TRUNCATION_MARKER),
        None => rendered,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("operation panicked: {}", detail)
}
