// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host-facing label printer module.
//
// Each operation exists twice: as a plain async method for Rust callers, and
// as a `*_with_promise` variant for host runtimes. The promise variants
// schedule the work on the module's tokio runtime and return at once; the
// promise is settled exactly once when the work finishes, even if the task
// panics.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{DiscoveredPrinter, PingReport};
use etikett_print::LabelPrinter;

use crate::traits::Promise;

/// Name the module registers under in the host runtime.
pub const MODULE_NAME: &str = "EtikettPrintModule";

/// Payload resolved by a successful print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintReceipt {
    pub status: &'static str,
    pub message: &'static str,
}

impl PrintReceipt {
    fn success() -> Self {
        Self {
            status: "success",
            message: "Print job completed successfully",
        }
    }
}

pub struct LabelPrinterModule {
    printer: Arc<LabelPrinter>,
    runtime: Handle,
}

impl LabelPrinterModule {
    pub fn new(printer: LabelPrinter, runtime: Handle) -> Self {
        Self {
            printer: Arc::new(printer),
            runtime,
        }
    }

    pub fn name(&self) -> &'static str {
        MODULE_NAME
    }

    pub async fn print_image(
        &self,
        ip_address: &str,
        image_uri: &str,
        printer_model: Option<&str>,
        label_size: Option<&str>,
    ) -> Result<PrintReceipt> {
        self.printer
            .print_image(ip_address, image_uri, printer_model, label_size)
            .await?;
        Ok(PrintReceipt::success())
    }

    pub async fn discover_printers(
        &self,
        timeout_seconds: Option<u32>,
    ) -> Result<Vec<DiscoveredPrinter>> {
        self.printer.discover(timeout_seconds).await
    }

    pub async fn ping_printer(&self, ip_address: &str) -> Result<PingReport> {
        self.printer.ping(ip_address).await
    }

    pub fn print_image_with_promise(
        &self,
        ip_address: String,
        image_uri: String,
        printer_model: Option<String>,
        label_size: Option<String>,
        promise: Box<dyn Promise>,
    ) {
        let printer = Arc::clone(&self.printer);
        self.spawn_settled("Print", promise, async move {
            printer
                .print_image(
                    &ip_address,
                    &image_uri,
                    printer_model.as_deref(),
                    label_size.as_deref(),
                )
                .await
                .map(|()| PrintReceipt::success())
        });
    }

    pub fn discover_printers_with_promise(
        &self,
        timeout_seconds: Option<u32>,
        promise: Box<dyn Promise>,
    ) {
        let printer = Arc::clone(&self.printer);
        self.spawn_settled("Discovery", promise, async move {
            printer.discover(timeout_seconds).await
        });
    }

    pub fn ping_printer_with_promise(&self, ip_address: String, promise: Box<dyn Promise>) {
        let printer = Arc::clone(&self.printer);
        self.spawn_settled("Ping", promise, async move { printer.ping(&ip_address).await });
    }

    /// Run `work` on the runtime and settle `promise` with its result.
    fn spawn_settled<T, Fut>(&self, operation: &'static str, promise: Box<dyn Promise>, work: Fut)
    where
        T: Serialize + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let task = self.runtime.spawn(work);
        self.runtime.spawn(async move {
            let result = task.await.unwrap_or_else(|e| {
                Err(EtikettError::Unexpected(format!("{operation} exception: {e}")))
            });
            settle(operation, promise, result);
        });
    }
}

/// Hand a finished operation to the host.
fn settle<T: Serialize>(operation: &str, promise: Box<dyn Promise>, result: Result<T>) {
    match result.and_then(|value| serde_json::to_value(value).map_err(EtikettError::from)) {
        Ok(value) => {
            debug!(operation, "resolving promise");
            promise.resolve(value);
        }
        Err(e) => {
            warn!(operation, kind = e.kind(), error = %e, "rejecting promise");
            promise.reject(e.kind(), &e.to_string());
        }
    }
}
