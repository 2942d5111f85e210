//! Tracewire - embeddable tracing client for a co-located collector agent.
//!
//! Tracewire instruments application request handling and streams structured
//! request/span events to an out-of-process collector (the "agent") over a
//! local socket. The client is send-only and strictly best-effort: a slow,
//! absent, or restarting collector costs trace completeness, never
//! application latency.
//!
//! # Features
//!
//! - **Lifecycle Tracking**: Correct nested span boundaries under concurrent
//!   requests, with typed errors for integration mistakes
//! - **Non-blocking Delivery**: Fire-and-forget frame queue with a single
//!   background writer, bounded caller latency
//! - **Transparent Reconnect**: Rate-limited reconnection while the
//!   collector is down, frames dropped and counted in the meantime
//! - **Injectable Transport**: The tracker emits through a [`FrameSink`]
//!   seam, so tests can capture frames without a socket
//!
//! # Architecture
//!
//! Tracewire is built with a modular architecture:
//! - `core`: Domain models, errors, and configuration
//! - `protocol`: Command types and the length-prefixed wire codec
//! - `transport`: Socket ownership, reconnect, and frame delivery
//! - `tracker`: The request/span lifecycle state machine
//! - `client`: The public instrumentation facade
//!
//! # Example
//!
//! ```no_run
//! use tracewire::{ConfigBuilder, TracewireClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigBuilder::new()
//!         .app_name("MyApp")
//!         .key("KEY123")
//!         .build()?;
//!     let client = TracewireClient::connect(config)?;
//!     client.register();
//!
//!     let request = client.begin_request();
//!     let span = client.begin_span(&request, "Controller/users/edit")?;
//!     // ... the work being instrumented ...
//!     client.end_span(&span)?;
//!     client.end_request(&request)?;
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! [`FrameSink`]: crate::transport::FrameSink

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod client;
pub mod core;
pub mod protocol;
pub mod tracker;
pub mod transport;

// Re-export the surface most integrations need
pub use crate::client::TracewireClient;
pub use crate::core::{
    AgentEndpoint, Config, ConfigBuilder, RequestHandle, Result, SpanHandle, TracewireError,
};
