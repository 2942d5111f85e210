//! Channel transport owning the connection to the collector agent.
//!
//! Delivery is strictly best-effort, at-most-once. Callers hand frames to a
//! bounded queue and move on; a single background writer task owns the
//! socket, reconnects with a rate limit while the agent is unreachable, and
//! drops frames it cannot deliver. Drops are counted, never surfaced as
//! errors.

use crate::core::config::{AgentEndpoint, TransportConfig};
use bytes::Bytes;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

/// Destination for encoded frames.
///
/// The seam between the tracker and the transport: production code wires in
/// [`AgentTransport`], tests can wire in a capturing sink. `send` must be
/// non-blocking and must never fail; an implementation that cannot deliver
/// discards the frame.
pub trait FrameSink: Send + Sync + 'static {
    /// Fire-and-forget frame delivery.
    fn send(&self, frame: Bytes);
}

/// Snapshot of transport counters, for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Frames successfully written to the socket
    pub sent: u64,
    /// Frames dropped (queue full, disconnected, or write failure)
    pub dropped: u64,
    /// Whether the writer currently holds a live connection
    pub connected: bool,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
    connected: AtomicBool,
}

/// Best-effort transport to the collector agent.
///
/// Spawning starts the background writer; [`shutdown`](Self::shutdown)
/// stops it and releases the socket. Dropping the transport without calling
/// `shutdown` signals the writer to exit as well.
pub struct AgentTransport {
    tx: mpsc::Sender<Bytes>,
    shutdown_tx: watch::Sender<bool>,
    counters: Arc<Counters>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl AgentTransport {
    /// Spawns the background writer and returns the caller-side handle.
    ///
    /// Must be called within a Tokio runtime. An eager connect is attempted
    /// immediately; failure is non-fatal and frames drop until the agent
    /// becomes reachable.
    pub fn spawn(endpoint: AgentEndpoint, config: TransportConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());

        let writer = Writer {
            endpoint,
            config,
            counters: Arc::clone(&counters),
            stream: None,
            last_attempt: None,
        };
        let worker = tokio::spawn(writer.run(rx, shutdown_rx));

        Self {
            tx,
            shutdown_tx,
            counters,
            worker: parking_lot::Mutex::new(Some(worker)),
        }
    }

    /// Returns a snapshot of the delivery counters.
    pub fn stats(&self) -> TransportStats {
        TransportStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            connected: self.counters.connected.load(Ordering::Relaxed),
        }
    }

    /// Returns true if the writer currently holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.counters.connected.load(Ordering::Relaxed)
    }

    /// Stops the background writer and waits for the socket to be released.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

impl FrameSink for AgentTransport {
    fn send(&self, frame: Bytes) {
        // Non-blocking: a full queue or a stopped worker costs the frame,
        // never caller latency
        if self.tx.try_send(frame).is_err() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for AgentTransport {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

enum AgentStream {
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl AgentStream {
    async fn connect(endpoint: &AgentEndpoint) -> io::Result<Self> {
        match endpoint {
            AgentEndpoint::Unix(path) => UnixStream::connect(path).await.map(AgentStream::Unix),
            AgentEndpoint::Tcp(addr) => TcpStream::connect(addr).await.map(AgentStream::Tcp),
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            AgentStream::Unix(stream) => stream.write_all(buf).await,
            AgentStream::Tcp(stream) => stream.write_all(buf).await,
        }
    }
}

/// Background writer: sole owner of the socket, so concurrent senders can
/// never interleave partial frames.
struct Writer {
    endpoint: AgentEndpoint,
    config: TransportConfig,
    counters: Arc<Counters>,
    stream: Option<AgentStream>,
    last_attempt: Option<Instant>,
}

impl Writer {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Bytes>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.try_connect().await;
        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(frame) => self.deliver(frame).await,
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        self.disconnect();
        tracing::debug!("transport writer stopped");
    }

    async fn deliver(&mut self, frame: Bytes) {
        if self.stream.is_none() {
            self.try_connect().await;
        }
        let Some(stream) = self.stream.as_mut() else {
            self.drop_frame("agent unreachable");
            return;
        };

        match timeout(self.config.write_timeout, stream.write_all(&frame)).await {
            Ok(Ok(())) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
            },
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "write to agent failed");
                self.disconnect();
                self.drop_frame("write failure");
            },
            Err(_) => {
                tracing::debug!(
                    timeout_ms = self.config.write_timeout.as_millis() as u64,
                    "write to agent timed out"
                );
                self.disconnect();
                self.drop_frame("write timeout");
            },
        }
    }

    async fn try_connect(&mut self) {
        if self.stream.is_some() {
            return;
        }
        // Rate-limit attempts so an absent agent is not hammered
        if let Some(last) = self.last_attempt {
            if last.elapsed() < self.config.reconnect_interval {
                return;
            }
        }
        self.last_attempt = Some(Instant::now());

        match timeout(
            self.config.connect_timeout,
            AgentStream::connect(&self.endpoint),
        )
        .await
        {
            Ok(Ok(stream)) => {
                tracing::debug!(endpoint = %self.endpoint, "connected to agent");
                self.stream = Some(stream);
                self.counters.connected.store(true, Ordering::Relaxed);
            },
            Ok(Err(err)) => {
                tracing::debug!(endpoint = %self.endpoint, error = %err, "agent connect failed");
            },
            Err(_) => {
                tracing::debug!(endpoint = %self.endpoint, "agent connect timed out");
            },
        }
    }

    fn disconnect(&mut self) {
        self.stream = None;
        self.counters.connected.store(false, Ordering::Relaxed);
    }

    fn drop_frame(&self, reason: &'static str) {
        let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        // Only the first drop warns; the rest stay at debug
        if dropped == 1 {
            tracing::warn!(reason, "dropping trace frame");
        } else {
            tracing::debug!(reason, dropped, "dropping trace frame");
        }
    }
}
