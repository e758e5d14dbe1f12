// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Driver-facing capability traits.
//
// The printer driver (channel handling, print data, network search) is opaque
// to Etikett. These traits are the only surface the rest of the crate sees;
// the passthrough driver in `raw_channel` and the mDNS backend in `discovery`
// are the bundled implementations. All methods block.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use etikett_core::types::{PrintOutcome, PrintSettings};

/// Identity of a device reported by a network search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Address usable with [`ChannelProvider::open_channel`].
    pub address: String,
    pub model_name: Option<String>,
    pub serial_number: Option<String>,
}

/// Why a channel could not be opened.
#[derive(Debug, Error)]
pub enum OpenChannelError {
    #[error("InvalidAddress ({0})")]
    InvalidAddress(String),
    #[error("OpenStreamFailure ({0})")]
    OpenStreamFailure(String),
    #[error("Timeout")]
    Timeout,
}

impl OpenChannelError {
    /// Bare error code, without detail.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "InvalidAddress",
            Self::OpenStreamFailure(_) => "OpenStreamFailure",
            Self::Timeout => "Timeout",
        }
    }
}

/// Why a network search failed as a whole.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("NetworkUnavailable ({0})")]
    NetworkUnavailable(String),
    #[error("SearchFailed ({0})")]
    SearchFailed(String),
}

impl SearchError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkUnavailable(_) => "NetworkUnavailable",
            Self::SearchFailed(_) => "SearchFailed",
        }
    }
}

/// An open connection to one printer.
///
/// `print_image` and `close` may be called from different threads at the same
/// time: the runner closes the channel from its cleanup hook while a timed-out
/// worker can still be printing.
pub trait PrinterChannel: Send + Sync {
    /// Address this channel was opened against.
    fn address(&self) -> &str;

    /// Print one image. Implementations should check `cancel` wherever they
    /// can stop safely and report [`PrintOutcome::Canceled`].
    fn print_image(
        &self,
        image: &Path,
        settings: &PrintSettings,
        cancel: &CancellationToken,
    ) -> PrintOutcome;

    /// Close the channel. Idempotent.
    fn close(&self);
}

/// Opens channels to printers by address.
pub trait ChannelProvider: Send + Sync {
    fn open_channel(&self, address: &str) -> Result<Arc<dyn PrinterChannel>, OpenChannelError>;
}

/// Searches the network for printers.
///
/// `on_found` may be invoked from several threads; the search returns once
/// `timeout` has elapsed.
pub trait PrinterSearcher: Send + Sync {
    fn search(
        &self,
        timeout: Duration,
        on_found: &(dyn Fn(ChannelInfo) + Send + Sync),
    ) -> Result<(), SearchError>;
}
