//! # prism-runtime
//!
//! Error resilience for the Prism prompt pipeline.
//!
//! Every subsystem (template resolution, configuration, presentation,
//! provider calls) routes its failures through an [`ErrorHandler`] to get:
//! - A human-readable message and a recovery strategy per error kind
//! - Per-kind counts and timestamps in an in-memory ledger
//! - Notification of registered observers
//!
//! ## Guarantees
//!
//! `log_error` and `handle_error` never panic and never fail, however
//! malformed their input. The wrapping helpers convert an operation's error
//! or panic into a logged event plus `None`, so callers degrade instead of
//! crashing.
//!
//! ## Example
//!
//! ```rust
//! use prism_runtime::{ErrorHandler, ErrorKind};
//! use serde_json::json;
//!
//! let handler = ErrorHandler::default();
//! handler.on_error(|event| eprintln!("observed {}", event.kind));
//!
//! let parsed: Option<u32> = handler.with_error_handling(
//!     ErrorKind::Configuration,
//!     &json!({ "setting": "max_tokens" }),
//!     || "many".parse::<u32>(),
//! );
//! assert!(parsed.is_none());
//! assert_eq!(handler.error_count(ErrorKind::Configuration), 1);
//!
//! let strategy = handler.handle_error(ErrorKind::Configuration, &json!({ "setting": "max_tokens" }));
//! assert!(strategy.error_message.contains("max_tokens"));
//! ```

pub mod config;
pub mod resilience;

pub use config::ResilienceConfig;
pub use resilience::{
    handle_error, CallbackId, ErrorEvent, ErrorHandler, ErrorKind, ErrorStats, KindStats,
    RecoveryAssessment, RecoveryStrategy,
};

use thiserror::Error;

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
