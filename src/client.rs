//! Public instrumentation facade.
//!
//! [`TracewireClient`] is the thin surface framework integrations call at
//! request/operation boundaries. It owns the wiring from configuration to
//! transport to tracker and forwards lifecycle calls; it holds no state of
//! its own. The client is cheap to clone and safe to share across tasks.

use crate::core::{Config, RequestHandle, Result, SpanHandle};
use crate::tracker::RequestTracker;
use crate::transport::{AgentTransport, FrameSink, TransportStats};
use std::sync::Arc;

/// Handle to the tracing client.
///
/// Created with [`connect`](Self::connect) inside a Tokio runtime. Call
/// [`register`](Self::register) once before the first request, and
/// [`shutdown`](Self::shutdown) at process exit to release the agent
/// socket.
#[derive(Clone)]
pub struct TracewireClient {
    config: Arc<Config>,
    transport: Arc<AgentTransport>,
    tracker: Arc<RequestTracker>,
}

impl TracewireClient {
    /// Validates the configuration, spawns the transport, and returns a
    /// ready client.
    ///
    /// The connection itself is established in the background; an
    /// unreachable agent does not fail `connect`, it only costs trace data
    /// until the agent appears.
    pub fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(AgentTransport::spawn(
            config.endpoint.clone(),
            config.transport.clone(),
        ));
        let sink: Arc<dyn FrameSink> = Arc::clone(&transport) as Arc<dyn FrameSink>;
        let tracker = Arc::new(RequestTracker::new(sink, config.tracker.clone()));
        Ok(Self {
            config: Arc::new(config),
            transport,
            tracker,
        })
    }

    /// Performs the one-time `Register` handshake using the configured
    /// application name and key. Subsequent calls are no-ops.
    pub fn register(&self) {
        self.tracker.register(&self.config.app_name, &self.config.key);
    }

    /// Begins a traced request and returns its handle.
    pub fn begin_request(&self) -> RequestHandle {
        self.tracker.start_request()
    }

    /// Begins a named span within a request.
    ///
    /// The first span of a request should name the entry point with a
    /// `Controller/` prefix, per the agent's convention.
    pub fn begin_span(&self, request: &RequestHandle, operation: &str) -> Result<SpanHandle> {
        self.tracker.start_span(request, operation)
    }

    /// Ends a span previously returned by [`begin_span`](Self::begin_span).
    pub fn end_span(&self, span: &SpanHandle) -> Result<()> {
        self.tracker.stop_span(span)
    }

    /// Ends a traced request, auto-closing any spans left open.
    pub fn end_request(&self, request: &RequestHandle) -> Result<()> {
        self.tracker.finish_request(request)
    }

    /// Returns a snapshot of transport delivery counters.
    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Stops the transport writer and releases the agent socket.
    pub async fn shutdown(self) {
        self.transport.shutdown().await;
    }
}
