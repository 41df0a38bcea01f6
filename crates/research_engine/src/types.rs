use std::fmt;

use serde::Deserialize;

/// Client-side generation number of a search session, echoed back on every
/// event so the consumer can drop output from superseded sessions.
pub type Ticket = u64;

/// Decoded progress stream message in wire vocabulary.
///
/// Every field is optional: a missing or wrong-typed field is treated as
/// absent so the rest of the message still renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressPayload {
    pub phase: Option<String>,
    pub status: Option<String>,
    /// Rounded and clamped to 0..=100.
    pub progress_pct: Option<u8>,
    pub message: Option<String>,
    pub sources: Option<Vec<SourcePayload>>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl ProgressPayload {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_deref(), Some("complete") | Some("error"))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourcePayload {
    pub url: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub relevance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryItem {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub summary: String,
    /// Unix seconds; the backend sends fractional values.
    #[serde(default)]
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SessionStarted {
        ticket: Ticket,
        session_id: String,
    },
    SubmissionFailed {
        ticket: Ticket,
        error: RequestError,
    },
    Progress {
        ticket: Ticket,
        payload: ProgressPayload,
    },
    StreamClosed {
        ticket: Ticket,
        end: StreamEnd,
    },
    SnapshotLoaded {
        session_id: String,
        result: Result<ProgressPayload, RequestError>,
    },
    HistoryLoaded(Result<Vec<HistoryItem>, RequestError>),
    HistoryCleared(Result<bool, RequestError>),
}

/// How a progress subscription ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEnd {
    /// A `complete` or `error` payload arrived.
    Terminal,
    /// The subscription was closed locally.
    Cancelled,
    /// The connection failed before any terminal payload.
    TransportFailed(RequestError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RequestError {
    pub kind: FailureKind,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error text supplied by the backend itself, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self.kind {
            FailureKind::Rejected => Some(&self.message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// The backend answered with an explicit `error` field.
    Rejected,
    MalformedResponse,
    /// The stream ended before a terminal payload.
    StreamEnded,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Rejected => write!(f, "rejected by backend"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
            FailureKind::StreamEnded => write!(f, "stream ended early"),
        }
    }
}
