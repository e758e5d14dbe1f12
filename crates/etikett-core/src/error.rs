// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Etikett.

use std::time::Duration;

use thiserror::Error;

use crate::types::PrintOutcome;

/// Top-level error type for all Etikett operations.
///
/// Every variant maps onto one host-visible error kind via [`EtikettError::kind`].
#[derive(Debug, Error)]
pub enum EtikettError {
    // -- Image locator --
    #[error("{0}")]
    File(String),

    // -- Device channel --
    #[error("Failed to open channel: {0}")]
    Channel(String),

    // -- Job outcomes --
    #[error(
        "Print operation timed out after {}. The printer may not be responding correctly.",
        describe_deadline(.deadline)
    )]
    Timeout { deadline: Duration },

    #[error("Print failed: {0}")]
    Print(PrintOutcome),

    #[error("{0}")]
    Unexpected(String),

    // -- Discovery --
    #[error("Failed to discover printers: {0}")]
    Discovery(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EtikettError {
    /// Error-kind string handed to the host runtime alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "FILE_ERROR",
            Self::Channel(_) => "CHANNEL_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Print(_) => "PRINT_ERROR",
            Self::Discovery(_) => "DISCOVERY_ERROR",
            Self::Unexpected(_) | Self::Io(_) | Self::Serialization(_) => "EXCEPTION",
        }
    }
}

/// Render a deadline for messages: milliseconds below one second, otherwise
/// whole seconds rounded up.
fn describe_deadline(deadline: &Duration) -> String {
    let deadline = *deadline;
    if deadline < Duration::from_secs(1) {
        return format!("{} ms", deadline.as_millis());
    }
    let secs = deadline.as_secs() + u64::from(deadline.subsec_nanos() > 0);
    format!("{secs} seconds")
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EtikettError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_host_contract() {
        assert_eq!(EtikettError::File("x".into()).kind(), "FILE_ERROR");
        assert_eq!(EtikettError::Channel("x".into()).kind(), "CHANNEL_ERROR");
        assert_eq!(EtikettError::Timeout {
                deadline: Duration::from_secs(30)
            }
            .kind(), "TIMEOUT");
        assert_eq!(EtikettError::Print(PrintOutcome::PaperEmpty).kind(), "PRINT_ERROR");
        assert_eq!(EtikettError::Discovery("x".into()).kind(), "DISCOVERY_ERROR");
        assert_eq!(EtikettError::Unexpected("x".into()).kind(), "EXCEPTION");
    }

    #[test]
    fn timeout_message_keeps_sub_second_and_fractional_deadlines() {
        let timeout = |deadline| EtikettError::Timeout { deadline }.to_string();
        assert_eq!(
            timeout(Duration::from_secs(30)),
            "Print operation timed out after 30 seconds. The printer may not be responding correctly."
        );
        assert!(timeout(Duration::from_millis(100)).contains("after 100 ms."));
        assert!(timeout(Duration::from_millis(1500)).contains("after 2 seconds."));
    }

    #[test]
    fn print_error_message_names_the_code() {
        let err = EtikettError::Print(PrintOutcome::PaperEmpty);
        assert_eq!(err.to_string(), "Print failed: PaperEmpty");
    }

    #[test]
    fn io_errors_surface_as_exceptions() {
        let err: EtikettError = std::io::Error::other("disk gone").into();
        assert_eq!(err.kind(), "EXCEPTION");
    }
}
