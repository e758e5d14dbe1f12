// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The three label printer operations: print, discover, ping.
//
// Every blocking driver call is moved off the async executor: locator
// resolution, channel opening, and network search run on the blocking pool,
// and the print itself goes through the bounded job runner so it can never
// outlive its deadline from the caller's point of view.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{
    DiscoveredPrinter, JobId, PingReport, PrintSettings, parse_or,
};
use etikett_core::BridgeConfig;

use crate::driver::{ChannelInfo, ChannelProvider, PrinterSearcher};
use crate::resolver::ImageResolver;
use crate::runner::run_bounded;

/// Label printer front end over a channel provider and a searcher.
#[derive(Clone)]
pub struct LabelPrinter {
    provider: Arc<dyn ChannelProvider>,
    searcher: Arc<dyn PrinterSearcher>,
    resolver: ImageResolver,
    config: BridgeConfig,
    deadline: Duration,
}

impl LabelPrinter {
    pub fn new(
        provider: Arc<dyn ChannelProvider>,
        searcher: Arc<dyn PrinterSearcher>,
        resolver: ImageResolver,
        config: BridgeConfig,
    ) -> Self {
        let deadline = config.print_deadline();
        Self {
            provider,
            searcher,
            resolver,
            config,
            deadline,
        }
    }

    /// Override the print deadline taken from the config.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Print the image behind `locator` on the printer at `address`.
    ///
    /// Unknown or missing model and label strings fall back to the configured
    /// defaults. The channel is closed on every path once a job has started.
    #[instrument(skip(self), fields(job_id = tracing::field::Empty))]
    pub async fn print_image(
        &self,
        address: &str,
        locator: &str,
        model: Option<&str>,
        label: Option<&str>,
    ) -> Result<()> {
        let job_id = JobId::new();
        tracing::Span::current().record("job_id", tracing::field::display(job_id));
        info!("starting print job");

        let resolver = self.resolver.clone();
        let owned_locator = locator.to_owned();
        let validate = self.config.validate_images;
        let image = tokio::task::spawn_blocking(move || {
            let image = resolver.resolve(&owned_locator)?;
            let size = image.verify(validate)?;
            debug!(path = %image.path().display(), size, "image resolved");
            Ok::<_, EtikettError>(image)
        })
        .await
        .map_err(join_failure)??;

        let provider = Arc::clone(&self.provider);
        let owned_address = address.to_owned();
        let channel = tokio::task::spawn_blocking(move || provider.open_channel(&owned_address))
            .await
            .map_err(join_failure)?
            .map_err(|e| EtikettError::Channel(e.to_string()))?;
        debug!(address = channel.address(), "channel opened");

        let settings = PrintSettings::new(
            parse_or(model, self.config.default_model),
            parse_or(label, self.config.default_label),
            self.config.cache_dir.clone(),
        );
        info!(model = %settings.model, label = %settings.label_size, "print settings configured");

        let cancel = CancellationToken::new();
        let op = {
            let channel = Arc::clone(&channel);
            let path = image.path().to_path_buf();
            let cancel = cancel.clone();
            move || channel.print_image(&path, &settings, &cancel)
        };
        let result = run_bounded(job_id, op, self.deadline, cancel, move |result| {
            debug!(address = channel.address(), outcome = result.label(), "closing channel");
            channel.close();
        })
        .await;

        drop(image);
        result.into_print_result(self.deadline)
    }

    /// Search the network for printers for `timeout_secs` (or the configured
    /// default) and return them in the order they were found.
    #[instrument(skip(self))]
    pub async fn discover(&self, timeout_secs: Option<u32>) -> Result<Vec<DiscoveredPrinter>> {
        let secs = timeout_secs.unwrap_or(self.config.default_discovery_timeout_secs);
        info!(secs, "starting printer discovery");

        let found = Arc::new(Mutex::new(Vec::<DiscoveredPrinter>::new()));
        let searcher = Arc::clone(&self.searcher);
        let sink = Arc::clone(&found);
        tokio::task::spawn_blocking(move || {
            searcher.search(Duration::from_secs(u64::from(secs)), &|info: ChannelInfo| {
                record_found(&sink, info);
            })
        })
        .await
        .map_err(join_failure)?
        .map_err(|e| EtikettError::Discovery(e.code().to_owned()))?;

        let printers = found
            .lock()
            .map(|mut list| std::mem::take(&mut *list))
            .unwrap_or_default();
        info!(count = printers.len(), "printer discovery completed");
        Ok(printers)
    }

    /// Check whether a channel to `address` can be opened.
    #[instrument(skip(self))]
    pub async fn ping(&self, address: &str) -> Result<PingReport> {
        let provider = Arc::clone(&self.provider);
        let owned_address = address.to_owned();
        let opened = tokio::task::spawn_blocking(move || provider.open_channel(&owned_address))
            .await
            .map_err(join_failure)?;

        Ok(match opened {
            Ok(channel) => {
                channel.close();
                info!("ping successful");
                PingReport::available(address)
            }
            Err(e) => {
                info!(error = %e, "ping failed");
                PingReport::unavailable(e.code())
            }
        })
    }
}

/// Append a search hit unless its address was already reported.
fn record_found(found: &Mutex<Vec<DiscoveredPrinter>>, info: ChannelInfo) {
    let Ok(mut list) = found.lock() else {
        warn!(address = %info.address, "discovery list poisoned, dropping printer");
        return;
    };
    if list.iter().any(|p| p.ip_address == info.address) {
        debug!(address = %info.address, "duplicate printer ignored");
        return;
    }
    list.push(DiscoveredPrinter {
        ip_address: info.address,
        model_name: info.model_name,
        serial_number: info.serial_number,
    });
}

fn join_failure(e: JoinError) -> EtikettError {
    EtikettError::Unexpected(format!("worker task failed: {e}"))
}
