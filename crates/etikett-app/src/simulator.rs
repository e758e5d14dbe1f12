// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw-port label printer simulator.
//
// Behaves like a QL-820NWB listening on its raw data port: it sends a ready
// status block when a client connects, answers status and initialise commands
// with the same block, and stores everything it receives in a capture file
// once the client goes away or falls silent.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use etikett_print::status;

const ESC: u8 = 0x1B;
const CMD_STATUS: u8 = b'i';
const CMD_INIT: u8 = b'@';
const STATUS_EVERY: usize = 8192;

/// Simulator settings.
#[derive(Debug, Clone)]
pub struct Simulator {
    pub capture_dir: PathBuf,
    /// A connection with no traffic for this long is treated as finished.
    pub idle_timeout: Duration,
}

/// What one connection delivered.
#[derive(Debug)]
pub struct Capture {
    pub path: Option<PathBuf>,
    pub bytes: usize,
}

impl Simulator {
    pub fn new(capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            capture_dir: capture_dir.into(),
            idle_timeout: Duration::from_secs(300),
        }
    }

    /// Accept connections forever, one task per client.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        info!(addr = %listener.local_addr()?, "printer simulator listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            let sim = self.clone();
            tokio::spawn(async move {
                match sim.handle_client(stream, peer).await {
                    Ok(capture) => info!(%peer, bytes = capture.bytes, "connection finished"),
                    Err(e) => warn!(%peer, error = %e, "connection failed"),
                }
            });
        }
    }

    async fn handle_client(&self, mut stream: TcpStream, peer: SocketAddr) -> std::io::Result<Capture> {
        info!(%peer, "client connected");
        let ready = status::ready_block();
        stream.write_all(&ready).await?;

        let mut received = Vec::new();
        let mut buf = vec![0u8; 4096];
        loop {
            let n = match tokio::time::timeout(self.idle_timeout, stream.read(&mut buf)).await {
                Ok(Ok(0)) => {
                    debug!(%peer, "client closed the connection");
                    break;
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    warn!(%peer, error = %e, "read failed");
                    break;
                }
                Err(_) => {
                    warn!(%peer, idle_secs = self.idle_timeout.as_secs(), "client went idle");
                    break;
                }
            };
            let packet = &buf[..n];
            debug!(%peer, bytes = n, first = ?&packet[..n.min(16)], "packet received");

            let before = received.len();
            received.extend_from_slice(packet);
            if wants_status(packet) || crossed_boundary(before, received.len()) {
                stream.write_all(&ready).await?;
            }
        }

        if received.is_empty() {
            info!(%peer, "no data received");
            return Ok(Capture {
                path: None,
                bytes: 0,
            });
        }

        let path = save_capture(&self.capture_dir, &received).await?;
        info!(%peer, bytes = received.len(), path = %path.display(), "capture saved");
        // The client may already be gone.
        if let Err(e) = stream.write_all(&ready).await {
            debug!(%peer, error = %e, "final status not delivered");
        }
        Ok(Capture {
            path: Some(path),
            bytes: received.len(),
        })
    }
}

/// Status request, initialise, or invalidate.
fn wants_status(packet: &[u8]) -> bool {
    match packet {
        [ESC, CMD_STATUS | CMD_INIT, ..] => true,
        [0x00, _, ..] => true,
        _ => false,
    }
}

fn crossed_boundary(before: usize, after: usize) -> bool {
    before / STATUS_EVERY != after / STATUS_EVERY
}

async fn save_capture(dir: &Path, data: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("capture-{}.bin", Utc::now().timestamp_millis()));
    let partial = path.with_extension("part");
    tokio::fs::write(&partial, data).await?;
    tokio::fs::rename(&partial, &path).await?;
    Ok(path)
}
