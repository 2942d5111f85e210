use crate::core::error::{Result, TracewireError};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum accepted length for externally supplied identifiers.
const MAX_ID_LEN: usize = 64;

/// Unique identifier for a traced request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

/// Unique identifier for a span within a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(String);

impl RequestId {
    /// Creates a new RequestId after validation
    pub fn new(id: String) -> Result<Self> {
        validate_id("RequestId", &id)?;
        Ok(RequestId(id))
    }

    /// Generates a fresh, collision-resistant request id.
    ///
    /// Ids are 128-bit random UUIDs; safe to call concurrently from any
    /// number of threads, never reused within the process lifetime.
    pub fn generate() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }

    /// Returns the string representation of the request id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SpanId {
    /// Creates a new SpanId after validation
    pub fn new(id: String) -> Result<Self> {
        validate_id("SpanId", &id)?;
        Ok(SpanId(id))
    }

    /// Generates a fresh, collision-resistant span id.
    pub fn generate() -> Self {
        SpanId(Uuid::new_v4().to_string())
    }

    /// Returns the string representation of the span id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(TracewireError::InvalidId(format!("{} cannot be empty", kind)));
    }
    if id.len() > MAX_ID_LEN {
        return Err(TracewireError::InvalidId(format!(
            "{} cannot exceed {} characters, got {}",
            kind,
            MAX_ID_LEN,
            id.len()
        )));
    }
    Ok(())
}

/// Opaque handle identifying an active request.
///
/// Returned by `begin_request` and passed back to `begin_span` and
/// `end_request`. Cheap to clone; cloning does not extend the request's
/// lifetime in the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle {
    id: RequestId,
}

impl RequestHandle {
    pub(crate) fn new(id: RequestId) -> Self {
        Self { id }
    }

    /// Returns the request id this handle refers to
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

/// Opaque handle identifying a span started within a request.
///
/// Returned by `begin_span` and passed back to `end_span`. Carries the
/// operation name for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanHandle {
    request_id: RequestId,
    span_id: SpanId,
    operation: String,
}

impl SpanHandle {
    pub(crate) fn new(request_id: RequestId, span_id: SpanId, operation: &str) -> Self {
        Self {
            request_id,
            span_id,
            operation: operation.to_owned(),
        }
    }

    /// Returns the id of the request this span belongs to
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Returns the span id this handle refers to
    pub fn span_id(&self) -> &SpanId {
        &self.span_id
    }

    /// Returns the operation name the span was started with
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_request_id_validation() {
        assert!(RequestId::new("valid_id".to_string()).is_ok());
        assert!(RequestId::new(String::new()).is_err());
        assert!(RequestId::new("a".repeat(65)).is_err());
    }

    #[test]
    fn test_generated_ids_are_valid() {
        let id = RequestId::generate();
        assert!(RequestId::new(id.as_str().to_string()).is_ok());
        let id = SpanId::generate();
        assert!(SpanId::new(id.into_inner()).is_ok());
    }

    #[test]
    fn test_id_uniqueness_smoke() {
        let mut seen = HashSet::with_capacity(100_000);
        for _ in 0..100_000 {
            assert!(seen.insert(SpanId::generate().into_inner()));
        }
    }

    #[test]
    #[ignore = "long-running: 10M id generation"]
    fn test_id_uniqueness_10m() {
        let mut seen: HashSet<u128> = HashSet::with_capacity(10_000_000);
        for _ in 0..10_000_000 {
            let id = SpanId::generate();
            let raw = Uuid::parse_str(id.as_str()).expect("generated id parses").as_u128();
            assert!(seen.insert(raw));
        }
    }

    #[test]
    fn test_span_handle_accessors() {
        let handle = SpanHandle::new(
            RequestId::generate(),
            SpanId::generate(),
            "Controller/users/edit",
        );
        assert_eq!(handle.operation(), "Controller/users/edit");
        assert_ne!(handle.request_id().as_str(), handle.span_id().as_str());
    }
}
