//! Common test utilities and fixtures.
#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracewire::protocol::FRAME_HEADER_LEN;
use tracewire::transport::FrameSink;

/// Decodes one frame, asserting the length prefix is consistent.
pub fn decode_frame(frame: &[u8]) -> Value {
    assert!(frame.len() >= FRAME_HEADER_LEN, "frame shorter than header");
    let len = u32::from_be_bytes(frame[..FRAME_HEADER_LEN].try_into().unwrap()) as usize;
    assert_eq!(
        len,
        frame.len() - FRAME_HEADER_LEN,
        "length prefix does not match payload length"
    );
    serde_json::from_slice(&frame[FRAME_HEADER_LEN..]).expect("frame payload is valid JSON")
}

/// Returns the single tag key of a decoded command.
pub fn command_tag(value: &Value) -> String {
    let object = value.as_object().expect("command is an object");
    assert_eq!(object.len(), 1, "command carries exactly one tag key");
    object.keys().next().unwrap().clone()
}

/// Frame sink capturing everything the tracker emits, in order.
pub struct CaptureSink {
    frames: Mutex<Vec<Bytes>>,
}

impl CaptureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
        })
    }

    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().clone()
    }

    /// Decoded commands in emission order.
    pub fn commands(&self) -> Vec<Value> {
        self.frames().iter().map(|frame| decode_frame(frame)).collect()
    }

    /// Command tags in emission order.
    pub fn tags(&self) -> Vec<String> {
        self.commands().iter().map(command_tag).collect()
    }
}

impl FrameSink for CaptureSink {
    fn send(&self, frame: Bytes) {
        self.frames.lock().push(frame);
    }
}
