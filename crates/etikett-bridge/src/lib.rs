// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Etikett — host runtime bridge.
//!
//! Exposes the label printer operations to a host application runtime as a
//! promise-style native module. The host supplies a [`traits::Promise`] per
//! call; the module schedules the work on a tokio runtime and settles the
//! promise with either a JSON payload or an error kind and message.

pub mod module;
pub mod traits;

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use etikett_core::BridgeConfig;
use etikett_print::{
    DirectoryContentSource, ImageResolver, LabelPrinter, MdnsSearcher, RawChannelProvider,
};

pub use module::{LabelPrinterModule, PrintReceipt};
pub use traits::{ChannelPromise, Promise, Settlement};

/// Build the module wired to the bundled drivers.
///
/// Channels go through the raw TCP passthrough on `config.raw_port`, search
/// goes through mDNS, and `content://` locators are served from
/// `content_root` when one is given.
pub fn label_printer_module(
    config: BridgeConfig,
    content_root: Option<std::path::PathBuf>,
    runtime: Handle,
) -> LabelPrinterModule {
    let provider = RawChannelProvider::new(config.raw_port, config.connect_timeout());
    let mut resolver = ImageResolver::new(&config.cache_dir);
    if let Some(root) = content_root {
        resolver = resolver.with_content_source(Arc::new(DirectoryContentSource::new(root)));
    }
    info!(
        port = config.raw_port,
        deadline_secs = config.print_deadline_secs,
        "label printer module ready"
    );
    let printer = LabelPrinter::new(
        Arc::new(provider),
        Arc::new(MdnsSearcher::new()),
        resolver,
        config,
    );
    LabelPrinterModule::new(printer, runtime)
}
