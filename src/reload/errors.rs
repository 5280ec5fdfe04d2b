//! Error Surface
//!
//! Converts compiler exceptions and warnings into messages every connected
//! client receives. Delivery is best-effort through the same bus as reload
//! messages; nothing is retried.

use anyhow::Error;

use crate::server::state::ServerState;

use super::message::{ExceptionData, Payload};

impl ExceptionData {
    /// Structured rendering of an error and its cause chain.
    pub fn from_error(error: &Error) -> Self {
        Self {
            message: error.to_string(),
            cause_chain: error.chain().skip(1).map(|cause| cause.to_string()).collect(),
        }
    }
}

/// Human-readable multi-line rendering of an error and its causes.
pub fn format_exception(error: &Error) -> String {
    let mut rendered = error.to_string();
    for cause in error.chain().skip(1) {
        rendered.push_str("\n  caused by: ");
        rendered.push_str(&cause.to_string());
    }
    rendered
}

/// Publish a compile failure to all clients.
pub async fn report_compile_error(state: &ServerState, error: &Error) {
    let payload = Payload::CompileFailed {
        exception_data: ExceptionData::from_error(error),
        formatted_exception: format_exception(error),
    };
    state.bus.publish(state.envelope(payload)).await;
}

/// Publish a compile warning to all clients.
pub async fn report_compile_warning(state: &ServerState, message: &str) {
    let payload = Payload::CompileWarning {
        message: message.to_string(),
    };
    state.bus.publish(state.envelope(payload)).await;
}
