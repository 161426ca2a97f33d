//! Error resilience for Prism.
//!
//! This module provides:
//! - A closed error taxonomy
//! - Pure recovery strategies per error kind
//! - An error ledger with per-kind statistics
//! - Wrapping helpers that turn failures into logged events

mod handler;
mod kind;
mod ledger;
mod recovery;

pub use handler::{
    context_to_json, render_context, CallbackId, ErrorCallback, ErrorHandler, RecoveryAssessment,
    LOG_PREFIX, TRUNCATION_MARKER, UNSERIALIZABLE_CONTEXT,
};
pub use kind::ErrorKind;
pub use ledger::{ErrorEvent, ErrorLedger, ErrorStats, KindStats};
pub use recovery::{handle_error, RecoveryStrategy};
