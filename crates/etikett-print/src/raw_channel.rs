// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Passthrough printer channel over a raw TCP data stream (port 9100).
//
// The simplest possible driver: connect, read the printer's status block if it
// sends one, stream the image file as-is, flush. No print data is generated
// here; the printer (or a print server in front of it) must accept the file
// format directly. Runs on the job runner's worker thread, so everything in
// this module blocks.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use etikett_core::types::{OutcomeCode, PrintOutcome, PrintSettings};

use crate::driver::{ChannelProvider, OpenChannelError, PrinterChannel};
use crate::status;

/// Default raw TCP port (JetDirect).
pub const RAW_PORT: u16 = 9100;

/// Bytes written per chunk; cancellation is checked between chunks.
const CHUNK_SIZE: usize = 8192;

/// How long to wait for the status block after connecting.
const DEFAULT_STATUS_WAIT: Duration = Duration::from_millis(500);

/// Opens [`RawChannel`]s.
#[derive(Debug, Clone)]
pub struct RawChannelProvider {
    port: u16,
    connect_timeout: Duration,
    status_wait: Duration,
}

impl Default for RawChannelProvider {
    fn default() -> Self {
        Self::new(RAW_PORT, Duration::from_secs(5))
    }
}

impl RawChannelProvider {
    /// `port` applies to addresses given without one.
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
            status_wait: DEFAULT_STATUS_WAIT,
        }
    }

    /// Zero disables the status read.
    pub fn with_status_wait(mut self, wait: Duration) -> Self {
        self.status_wait = wait;
        self
    }
}

impl ChannelProvider for RawChannelProvider {
    fn open_channel(&self, address: &str) -> Result<Arc<dyn PrinterChannel>, OpenChannelError> {
        let targets = resolve_targets(address, self.port)?;

        let mut last_err = None;
        for target in targets {
            debug!(%target, "connecting via raw TCP");
            match TcpStream::connect_timeout(&target, self.connect_timeout) {
                Ok(stream) => {
                    info!(address, %target, "raw channel opened");
                    let channel = RawChannel::new(address, stream, self.status_wait)?;
                    return Ok(Arc::new(channel));
                }
                Err(e) => {
                    debug!(%target, error = %e, "raw TCP connect failed");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) if e.kind() == ErrorKind::TimedOut => OpenChannelError::Timeout,
            Some(e) => OpenChannelError::OpenStreamFailure(e.to_string()),
            None => OpenChannelError::InvalidAddress(format!("{address} resolved to nothing")),
        })
    }
}

/// Accepts `ip`, `ip:port`, `[v6]:port`, `host`, or `host:port`.
fn resolve_targets(address: &str, default_port: u16) -> Result<Vec<SocketAddr>, OpenChannelError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(OpenChannelError::InvalidAddress("empty address".into()));
    }
    if let Ok(target) = address.parse::<SocketAddr>() {
        return Ok(vec![target]);
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, default_port)]);
    }
    let resolved = match address.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => address.to_socket_addrs(),
        _ => (address, default_port).to_socket_addrs(),
    };
    resolved
        .map(Iterator::collect)
        .map_err(|e| OpenChannelError::InvalidAddress(format!("{address}: {e}")))
}

/// A connected raw data stream to one printer.
pub struct RawChannel {
    address: String,
    stream: Mutex<TcpStream>,
    /// Second handle on the same socket so `close` never waits on `stream`.
    control: TcpStream,
    closed: AtomicBool,
    status_wait: Duration,
}

impl RawChannel {
    fn new(address: &str, stream: TcpStream, status_wait: Duration) -> Result<Self, OpenChannelError> {
        let control = stream
            .try_clone()
            .map_err(|e| OpenChannelError::OpenStreamFailure(format!("clone socket: {e}")))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle");
        }
        Ok(Self {
            address: address.to_owned(),
            stream: Mutex::new(stream),
            control,
            closed: AtomicBool::new(false),
            status_wait,
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Read the status block the printer sends on connect, if any.
    fn read_status(&self, stream: &mut TcpStream, settings: &PrintSettings) -> Option<PrintOutcome> {
        if self.status_wait.is_zero() || stream.set_read_timeout(Some(self.status_wait)).is_err() {
            return None;
        }

        let mut block = [0u8; status::STATUS_LEN];
        let mut filled = 0;
        while filled < block.len() {
            match stream.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = stream.set_read_timeout(None);

        if filled < block.len() {
            debug!(address = %self.address, received = filled, "no status block from printer");
            return None;
        }
        let outcome = status::decode(&block);
        debug!(address = %self.address, ?outcome, "printer status received");
        if let Some(loaded) = loaded_width_mismatch(&block, settings) {
            // The printer decides whether it can cut this; only report it.
            warn!(
                address = %self.address,
                loaded_mm = loaded,
                label = %settings.label_size,
                "loaded media width differs from the requested label"
            );
        }
        outcome
    }
}

/// Media width the printer reports, when it is not the requested label's width.
fn loaded_width_mismatch(block: &[u8], settings: &PrintSettings) -> Option<u8> {
    let loaded = status::media_width_mm(block)?;
    (u32::from(loaded) != settings.label_size.dimensions_mm().0).then_some(loaded)
}

impl PrinterChannel for RawChannel {
    fn address(&self) -> &str {
        &self.address
    }

    fn print_image(
        &self,
        image: &Path,
        settings: &PrintSettings,
        cancel: &CancellationToken,
    ) -> PrintOutcome {
        if self.is_closed() {
            return PrintOutcome::CommunicationError;
        }
        if !settings.media_fits_model() {
            warn!(
                model = %settings.model,
                label = %settings.label_size,
                "label size not supported by model"
            );
            return PrintOutcome::SetLabelSizeError;
        }

        let mut file = match File::open(image) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %image.display(), error = %e, "cannot open image");
                return PrintOutcome::FilePathError;
            }
        };

        let Ok(mut stream) = self.stream.lock() else {
            return PrintOutcome::UnknownError;
        };

        if let Some(outcome) = self.read_status(&mut stream, settings)
            && !outcome.is_success()
        {
            return outcome;
        }

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut sent: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                info!(address = %self.address, sent, "print cancelled");
                return PrintOutcome::Canceled;
            }
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(path = %image.display(), error = %e, "image read failed");
                    return PrintOutcome::FilePathError;
                }
            };
            if let Err(e) = stream.write_all(&buf[..n]) {
                if self.is_closed() || cancel.is_cancelled() {
                    return PrintOutcome::Canceled;
                }
                warn!(address = %self.address, sent, error = %e, "raw TCP send failed");
                return PrintOutcome::CommunicationError;
            }
            sent += n as u64;
            debug!(sent, "raw TCP progress");
        }

        if let Err(e) = stream.flush() {
            warn!(address = %self.address, error = %e, "raw TCP flush failed");
            return PrintOutcome::CommunicationError;
        }

        info!(address = %self.address, bytes = sent, "image sent");
        PrintOutcome::NoError
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.control.shutdown(Shutdown::Both) {
            Ok(()) => debug!(address = %self.address, "raw channel closed"),
            Err(e) if e.kind() == ErrorKind::NotConnected => {}
            Err(e) => debug!(address = %self.address, error = %e, "raw channel shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    use etikett_core::types::{LabelSize, PrinterModel};

    use super::*;

    /// Accept one connection, optionally send `greeting`, then collect
    /// everything the client sends until it closes.
    fn fake_printer(greeting: Option<Vec<u8>>) -> (String, mpsc::Receiver<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            if let Some(bytes) = greeting {
                socket.write_all(&bytes).unwrap();
            }
            let mut received = Vec::new();
            let _ = socket.read_to_end(&mut received);
            let _ = tx.send(received);
        });
        (addr, rx)
    }

    fn settings(dir: &Path) -> PrintSettings {
        PrintSettings::new(PrinterModel::QL_820NWB, LabelSize::DieCutW17H54, dir.to_path_buf())
    }

    fn provider() -> RawChannelProvider {
        RawChannelProvider::new(RAW_PORT, Duration::from_secs(2))
            .with_status_wait(Duration::from_millis(200))
    }

    #[test]
    fn streams_whole_file_after_ready_status() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("label.png");
        let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&image, &payload).unwrap();

        let (addr, received) = fake_printer(Some(status::ready_block().to_vec()));
        let channel = provider().open_channel(&addr).unwrap();
        let outcome = channel.print_image(&image, &settings(dir.path()), &CancellationToken::new());
        channel.close();

        assert_eq!(outcome, PrintOutcome::NoError);
        assert_eq!(received.recv().unwrap(), payload);
    }

    #[test]
    fn printer_without_status_still_receives_data() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("label.png");
        std::fs::write(&image, b"label bytes").unwrap();

        let (addr, received) = fake_printer(None);
        let channel = provider().open_channel(&addr).unwrap();
        let outcome = channel.print_image(&image, &settings(dir.path()), &CancellationToken::new());
        channel.close();

        assert_eq!(outcome, PrintOutcome::NoError);
        assert_eq!(received.recv().unwrap(), b"label bytes");
    }

    #[test]
    fn error_status_stops_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("label.png");
        std::fs::write(&image, b"label bytes").unwrap();

        let mut block = status::ready_block();
        block[8] = 0x01;
        let (addr, received) = fake_printer(Some(block.to_vec()));
        let channel = provider().open_channel(&addr).unwrap();
        let outcome = channel.print_image(&image, &settings(dir.path()), &CancellationToken::new());
        channel.close();

        assert_eq!(outcome, PrintOutcome::PaperEmpty);
        assert!(received.recv().unwrap().is_empty());
    }

    #[test]
    fn media_width_mismatch_is_reported_not_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let wide = PrintSettings::new(PrinterModel::QL_820NWB, LabelSize::RollW62, dir.path().to_path_buf());
        let block = status::ready_block();
        assert_eq!(loaded_width_mismatch(&block, &settings(dir.path())), Some(62));
        assert_eq!(loaded_width_mismatch(&block, &wide), None);
        assert_eq!(loaded_width_mismatch(&[0u8; 4], &settings(dir.path())), None);

        let image = dir.path().join("label.png");
        std::fs::write(&image, b"label bytes").unwrap();
        let mut narrow = status::ready_block();
        narrow[10] = 29;
        let (addr, received) = fake_printer(Some(narrow.to_vec()));
        let channel = provider().open_channel(&addr).unwrap();
        let outcome = channel.print_image(&image, &settings(dir.path()), &CancellationToken::new());
        channel.close();

        assert_eq!(outcome, PrintOutcome::NoError);
        assert_eq!(received.recv().unwrap(), b"label bytes");
    }

    #[test]
    fn cancelled_token_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("label.png");
        std::fs::write(&image, b"label bytes").unwrap();

        let (addr, received) = fake_printer(None);
        let channel = provider().with_status_wait(Duration::ZERO).open_channel(&addr).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = channel.print_image(&image, &settings(dir.path()), &cancel);
        channel.close();

        assert_eq!(outcome, PrintOutcome::Canceled);
        assert!(received.recv().unwrap().is_empty());
    }

    #[test]
    fn close_unblocks_a_stalled_send() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("big.bin");
        std::fs::write(&image, vec![0u8; 32 * 1024 * 1024]).unwrap();

        // Accepts but never reads, so the send buffer fills up.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let holder = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
            drop(socket);
        });

        let channel = provider().with_status_wait(Duration::ZERO).open_channel(&addr).unwrap();
        let closer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(200));
                channel.close();
            })
        };
        let outcome = channel.print_image(&image, &settings(dir.path()), &CancellationToken::new());

        closer.join().unwrap();
        holder.join().unwrap();
        assert_eq!(outcome, PrintOutcome::Canceled);
    }

    #[test]
    fn closed_channel_refuses_to_print() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("label.png");
        std::fs::write(&image, b"x").unwrap();

        let (addr, _received) = fake_printer(None);
        let channel = provider().open_channel(&addr).unwrap();
        channel.close();
        channel.close();
        let outcome = channel.print_image(&image, &settings(dir.path()), &CancellationToken::new());
        assert_eq!(outcome, PrintOutcome::CommunicationError);
    }

    #[test]
    fn wide_label_on_narrow_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("label.png");
        std::fs::write(&image, b"x").unwrap();

        let (addr, _received) = fake_printer(None);
        let channel = provider().open_channel(&addr).unwrap();
        let wide = PrintSettings::new(
            PrinterModel::QL_800,
            LabelSize::DieCutW102H152,
            dir.path().to_path_buf(),
        );
        let outcome = channel.print_image(&image, &wide, &CancellationToken::new());
        channel.close();
        assert_eq!(outcome, PrintOutcome::SetLabelSizeError);
    }

    #[test]
    fn refused_connection_is_open_stream_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = provider()
            .open_channel(&format!("127.0.0.1:{port}"))
            .err()
            .unwrap();
        assert_eq!(err.code(), "OpenStreamFailure");
    }

    #[test]
    fn address_forms() {
        assert!(matches!(
            resolve_targets("  ", RAW_PORT),
            Err(OpenChannelError::InvalidAddress(_))
        ));
        assert_eq!(
            resolve_targets("192.168.1.40", RAW_PORT).unwrap(),
            vec!["192.168.1.40:9100".parse::<SocketAddr>().unwrap()]
        );
        assert_eq!(
            resolve_targets("192.168.1.40:9200", RAW_PORT).unwrap(),
            vec!["192.168.1.40:9200".parse::<SocketAddr>().unwrap()]
        );
        assert_eq!(
            resolve_targets("[::1]:9100", RAW_PORT).unwrap(),
            vec!["[::1]:9100".parse::<SocketAddr>().unwrap()]
        );
    }
}
