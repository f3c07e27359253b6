// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User-facing progress reporting.
//!
//! Managers tell the user what happened through a [`Reporter`] handed to
//! them at construction. Diagnostic logging still goes through `tracing`
//! directly; a reporter is only for messages meant for the person running
//! the tool.

use std::error::Error as StdError;
use tracing::{error, info, warn};

/// Sink for user-facing messages.
pub trait Reporter: Send + Sync {
    /// Something was changed successfully.
    fn success(&self, message: &str);

    /// Something worth knowing, but nothing went wrong.
    fn note(&self, message: &str);

    /// Something went wrong.
    fn failure(&self, message: &str);
}

/// Reporter that forwards messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn success(&self, message: &str) {
        info!("{message}");
    }

    fn note(&self, message: &str) {
        warn!("{message}");
    }

    fn failure(&self, message: &str) {
        error!("{message}");
    }
}

/// Reporter that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuietReporter;

impl Reporter for QuietReporter {
    fn success(&self, _: &str) {}

    fn note(&self, _: &str) {}

    fn failure(&self, _: &str) {}
}

/// Render error followed by every cause in its source chain.
pub fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }

    message
}

/// Reporter that keeps every failure message for later inspection.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    failures: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub(crate) fn failures(&self) -> Vec<String> {
        self.failures
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn success(&self, _: &str) {}

    fn note(&self, _: &str) {}

    fn failure(&self, message: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, thiserror::Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn error_chain_joins_every_cause() {
        assert_eq!(error_chain(&Outer(Inner)), "outer: inner");
        assert_eq!(error_chain(&Inner), "inner");
    }
}
