//! Wire protocol spoken to the collector agent.
//!
//! The protocol is one-directional: the client frames each command as a
//! 4-byte big-endian length prefix followed by a UTF-8 JSON payload. The
//! payload is a single-key object keyed by the command tag, e.g.
//! `{"StartRequest":{"request_id":"..."}}`. No responses are read.

use crate::core::{RequestId, Result, SpanId};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// Fixed protocol version reported in `Register`.
pub const API_VERSION: &str = "1.0";

/// Byte length of the frame length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// A single protocol command.
///
/// Serde's externally tagged representation produces exactly the single-key
/// wire shape the agent expects, so the enum doubles as the wire schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Command {
    /// One-time process handshake
    Register {
        /// Application name
        app: String,
        /// Agent key/credential
        key: String,
        /// Protocol version, always [`API_VERSION`]
        api_version: String,
    },
    /// A traced unit of work has begun
    StartRequest {
        /// Id of the new request
        request_id: RequestId,
    },
    /// A named sub-operation within a request has begun
    StartSpan {
        /// Id of the owning request
        request_id: RequestId,
        /// Id of the new span
        span_id: SpanId,
        /// Name of the instrumented operation
        operation: String,
        /// Id of the enclosing span, when nested
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_span_id: Option<SpanId>,
    },
    /// A span has completed
    StopSpan {
        /// Id of the owning request
        request_id: RequestId,
        /// Id of the completed span
        span_id: SpanId,
    },
    /// A traced unit of work has completed
    FinishRequest {
        /// Id of the finished request
        request_id: RequestId,
    },
}

impl Command {
    /// Builds a `Register` command with the fixed protocol version.
    pub fn register<S: Into<String>>(app: S, key: S) -> Self {
        Command::Register {
            app: app.into(),
            key: key.into(),
            api_version: API_VERSION.to_owned(),
        }
    }

    /// Returns the wire tag of this command.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Register { .. } => "Register",
            Command::StartRequest { .. } => "StartRequest",
            Command::StartSpan { .. } => "StartSpan",
            Command::StopSpan { .. } => "StopSpan",
            Command::FinishRequest { .. } => "FinishRequest",
        }
    }
}

/// Encodes a command into a length-prefixed frame.
///
/// Failure means the command could not be serialized, which is a
/// programming-contract violation; it is never retried.
pub fn encode(command: &Command) -> Result<Bytes> {
    let payload = serde_json::to_vec(command)?;
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.extend_from_slice(&payload);
    Ok(frame.freeze())
}
