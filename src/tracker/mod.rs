//! Request/span lifecycle tracking.
//!
//! The tracker is the state machine between the instrumentation facade and
//! the wire: it validates lifecycle transitions, assigns ids, and emits the
//! corresponding protocol commands through a [`FrameSink`]. Requests live in
//! a concurrent map, so calls for different requests never contend and calls
//! for the same request serialize on its entry.

use crate::core::config::TrackerConfig;
use crate::core::{RequestHandle, RequestId, Result, SpanHandle, SpanId, TracewireError};
use crate::protocol::{self, Command};
use crate::transport::FrameSink;
use dashmap::DashMap;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Per-request tracking state.
struct RequestState {
    /// Open span ids in start order; the last entry is the innermost span
    /// and the default parent for the next one.
    open: SmallVec<[SpanId; 4]>,
    /// Ids of spans already stopped, kept until the request finishes so a
    /// second stop is distinguishable from a stop of a never-started span.
    stopped: HashSet<SpanId>,
    /// When the request was started, for diagnostics and eviction order.
    started_at: SystemTime,
}

impl RequestState {
    fn new() -> Self {
        Self {
            open: SmallVec::new(),
            stopped: HashSet::new(),
            started_at: SystemTime::now(),
        }
    }
}

/// Tracks active requests and their nested spans, emitting protocol
/// commands as lifecycle boundaries are crossed.
pub struct RequestTracker {
    requests: DashMap<RequestId, RequestState>,
    sink: Arc<dyn FrameSink>,
    registered: AtomicBool,
    config: TrackerConfig,
}

impl RequestTracker {
    /// Creates a tracker emitting through the given sink.
    pub fn new(sink: Arc<dyn FrameSink>, config: TrackerConfig) -> Self {
        Self {
            requests: DashMap::new(),
            sink,
            registered: AtomicBool::new(false),
            config,
        }
    }

    /// Emits the one-time `Register` handshake.
    ///
    /// Registration is process-wide; calls after the first are no-ops.
    pub fn register(&self, app: &str, key: &str) {
        if self.registered.swap(true, Ordering::SeqCst) {
            tracing::debug!("register called more than once, ignoring");
            return;
        }
        if app.is_empty() {
            tracing::warn!("registering with an empty application name");
        }
        self.emit(Command::register(app, key));
    }

    /// Starts tracking a new request and emits `StartRequest`.
    ///
    /// Never fails: when the active-request cap is reached the oldest
    /// active request is finished and evicted to make room.
    pub fn start_request(&self) -> RequestHandle {
        if self.requests.len() >= self.config.max_active_requests {
            self.evict_oldest();
        }
        let request_id = RequestId::generate();
        self.requests.insert(request_id.clone(), RequestState::new());
        self.emit(Command::StartRequest {
            request_id: request_id.clone(),
        });
        RequestHandle::new(request_id)
    }

    /// Starts a span within an active request and emits `StartSpan`.
    ///
    /// The span nests under the innermost open span, if any. By convention
    /// the first span of a request names the entry point with a
    /// `Controller/` prefix; the tracker does not inspect the name.
    pub fn start_span(&self, request: &RequestHandle, operation: &str) -> Result<SpanHandle> {
        let Some(mut state) = self.requests.get_mut(request.id()) else {
            return Err(TracewireError::UnknownRequest(request.id().to_string()));
        };
        let span_id = SpanId::generate();
        let parent_span_id = state.open.last().cloned();
        state.open.push(span_id.clone());
        // Emitting while the entry is held keeps this request's frames in
        // lifecycle order even under concurrent callers.
        self.emit(Command::StartSpan {
            request_id: request.id().clone(),
            span_id: span_id.clone(),
            operation: operation.to_owned(),
            parent_span_id,
        });
        Ok(SpanHandle::new(request.id().clone(), span_id, operation))
    }

    /// Stops an open span and emits `StopSpan`.
    ///
    /// Open spans form a multiset, not a strict stack: siblings may stop in
    /// any order. Stopping the same handle twice fails with `DoubleStop`
    /// and emits nothing.
    pub fn stop_span(&self, span: &SpanHandle) -> Result<()> {
        let Some(mut state) = self.requests.get_mut(span.request_id()) else {
            return Err(TracewireError::UnknownSpan(span.span_id().to_string()));
        };
        if let Some(position) = state.open.iter().position(|id| id == span.span_id()) {
            state.open.remove(position);
            state.stopped.insert(span.span_id().clone());
            self.emit(Command::StopSpan {
                request_id: span.request_id().clone(),
                span_id: span.span_id().clone(),
            });
            Ok(())
        } else if state.stopped.contains(span.span_id()) {
            Err(TracewireError::DoubleStop(span.span_id().to_string()))
        } else {
            Err(TracewireError::UnknownSpan(span.span_id().to_string()))
        }
    }

    /// Finishes a request: auto-closes any still-open spans innermost
    /// first, then emits `FinishRequest` and forgets the request.
    ///
    /// Leaving spans open at finish is an integration smell, so each
    /// auto-close is logged; the trace itself is preserved rather than
    /// rejected.
    pub fn finish_request(&self, request: &RequestHandle) -> Result<()> {
        let Some((request_id, state)) = self.requests.remove(request.id()) else {
            return Err(TracewireError::UnknownRequest(request.id().to_string()));
        };
        self.finish_entry(request_id, state);
        Ok(())
    }

    /// Number of currently active requests.
    pub fn active_requests(&self) -> usize {
        self.requests.len()
    }

    /// Number of open spans for a request, if it is active.
    pub fn open_spans(&self, request: &RequestHandle) -> Option<usize> {
        self.requests.get(request.id()).map(|state| state.open.len())
    }

    fn finish_entry(&self, request_id: RequestId, mut state: RequestState) {
        while let Some(span_id) = state.open.pop() {
            tracing::warn!(
                request_id = %request_id,
                span_id = %span_id,
                "auto-closing span left open at request finish"
            );
            self.emit(Command::StopSpan {
                request_id: request_id.clone(),
                span_id,
            });
        }
        self.emit(Command::FinishRequest { request_id });
    }

    /// Drops the oldest active request to stay within the configured cap.
    /// The evicted request is finished on the wire so the agent does not
    /// see a dangling `StartRequest`.
    fn evict_oldest(&self) {
        let oldest = self
            .requests
            .iter()
            .min_by_key(|entry| entry.value().started_at)
            .map(|entry| entry.key().clone());
        let Some(request_id) = oldest else { return };
        if let Some((request_id, state)) = self.requests.remove(&request_id) {
            tracing::warn!(
                request_id = %request_id,
                max_active_requests = self.config.max_active_requests,
                "active request cap reached, evicting oldest request"
            );
            self.finish_entry(request_id, state);
        }
    }

    fn emit(&self, command: Command) {
        match protocol::encode(&command) {
            Ok(frame) => self.sink.send(frame),
            Err(err) => {
                tracing::error!(command = command.tag(), error = %err, "failed to encode command")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use serde_json::Value;

    struct CaptureSink {
        frames: Mutex<Vec<Bytes>>,
    }

    impl CaptureSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
            })
        }

        fn tags(&self) -> Vec<String> {
            self.frames
                .lock()
                .iter()
                .map(|frame| {
                    let value: Value =
                        serde_json::from_slice(&frame[crate::protocol::FRAME_HEADER_LEN..])
                            .unwrap();
                    value.as_object().unwrap().keys().next().unwrap().clone()
                })
                .collect()
        }
    }

    impl FrameSink for CaptureSink {
        fn send(&self, frame: Bytes) {
            self.frames.lock().push(frame);
        }
    }

    fn tracker(sink: &Arc<CaptureSink>) -> RequestTracker {
        RequestTracker::new(
            Arc::clone(sink) as Arc<dyn FrameSink>,
            TrackerConfig::default(),
        )
    }

    #[test]
    fn test_register_is_idempotent() {
        let sink = CaptureSink::new();
        let tracker = tracker(&sink);
        tracker.register("MyApp", "KEY123");
        tracker.register("MyApp", "KEY123");
        assert_eq!(sink.tags(), vec!["Register"]);
    }

    #[test]
    fn test_unknown_request_rejected() {
        let sink = CaptureSink::new();
        let tracker = tracker(&sink);
        let other = tracker.start_request();
        tracker.finish_request(&other).unwrap();
        let err = tracker.start_span(&other, "Controller/x").unwrap_err();
        assert!(matches!(err, TracewireError::UnknownRequest(_)));
        let err = tracker.finish_request(&other).unwrap_err();
        assert!(matches!(err, TracewireError::UnknownRequest(_)));
    }

    #[test]
    fn test_double_stop_rejected_without_duplicate_frame() {
        let sink = CaptureSink::new();
        let tracker = tracker(&sink);
        let request = tracker.start_request();
        let span = tracker.start_span(&request, "Controller/x").unwrap();
        tracker.stop_span(&span).unwrap();
        let err = tracker.stop_span(&span).unwrap_err();
        assert!(matches!(err, TracewireError::DoubleStop(_)));
        assert_eq!(sink.tags(), vec!["StartRequest", "StartSpan", "StopSpan"]);
    }

    #[test]
    fn test_stop_span_of_foreign_request_is_unknown() {
        let sink = CaptureSink::new();
        let tracker = tracker(&sink);
        let request = tracker.start_request();
        let span = tracker.start_span(&request, "Controller/x").unwrap();
        tracker.finish_request(&request).unwrap();
        // Request is gone, so the span cannot be open anymore
        let err = tracker.stop_span(&span).unwrap_err();
        assert!(matches!(err, TracewireError::UnknownSpan(_)));
    }

    #[test]
    fn test_sibling_spans_stop_in_any_order() {
        let sink = CaptureSink::new();
        let tracker = tracker(&sink);
        let request = tracker.start_request();
        let first = tracker.start_span(&request, "Controller/x").unwrap();
        let second = tracker.start_span(&request, "SQL/query").unwrap();
        tracker.stop_span(&first).unwrap();
        tracker.stop_span(&second).unwrap();
        tracker.finish_request(&request).unwrap();
        assert_eq!(
            sink.tags(),
            vec!["StartRequest", "StartSpan", "StartSpan", "StopSpan", "StopSpan", "FinishRequest"]
        );
    }

    #[test]
    fn test_finish_auto_closes_open_spans() {
        let sink = CaptureSink::new();
        let tracker = tracker(&sink);
        let request = tracker.start_request();
        tracker.start_span(&request, "Controller/x").unwrap();
        tracker.start_span(&request, "SQL/query").unwrap();
        tracker.finish_request(&request).unwrap();
        assert_eq!(
            sink.tags(),
            vec!["StartRequest", "StartSpan", "StartSpan", "StopSpan", "StopSpan", "FinishRequest"]
        );
        assert_eq!(tracker.active_requests(), 0);
    }

    #[test]
    fn test_eviction_keeps_cap_and_finishes_on_wire() {
        let sink = CaptureSink::new();
        let tracker = RequestTracker::new(
            Arc::clone(&sink) as Arc<dyn FrameSink>,
            TrackerConfig {
                max_active_requests: 2,
            },
        );
        let first = tracker.start_request();
        let _second = tracker.start_request();
        let _third = tracker.start_request();
        assert_eq!(tracker.active_requests(), 2);
        // The first (oldest) request was evicted and finished
        assert!(tracker.open_spans(&first).is_none());
        let tags = sink.tags();
        assert_eq!(
            tags,
            vec!["StartRequest", "StartRequest", "FinishRequest", "StartRequest"]
        );
    }
}
