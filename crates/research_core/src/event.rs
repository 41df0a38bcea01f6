use std::fmt;

/// Client-side generation number of a search session. Every message that
/// originates from the engine carries the ticket of the session it belongs to.
pub type SessionTicket = u64;

/// Backend-issued session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend-reported pipeline stage, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    QueryAnalysis,
    WebSearch,
    AnalyzingContent,
    Synthesis,
    /// Vocabulary the client does not know; leaves step states untouched.
    Unknown(String),
}

impl Phase {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "query_analysis" | "initialization" => Phase::QueryAnalysis,
            "web_search" => Phase::WebSearch,
            "analyzing_content" => Phase::AnalyzingContent,
            "synthesis" => Phase::Synthesis,
            other => Phase::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    AnalyzingQuery,
    Complete,
    Error,
    /// Pass-through display text (`searching`, `synthesizing`, ...).
    Other(String),
}

impl Status {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "analyzing_query" => Status::AnalyzingQuery,
            "complete" => Status::Complete,
            "error" => Status::Error,
            other => Status::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Complete | Status::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceStatus {
    #[default]
    Pending,
    Processing,
    Analyzed,
}

impl SourceStatus {
    /// Unknown values are treated as not yet started.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "processing" => SourceStatus::Processing,
            "analyzed" => SourceStatus::Analyzed,
            _ => SourceStatus::Pending,
        }
    }

    pub fn is_visible(self) -> bool {
        matches!(self, SourceStatus::Processing | SourceStatus::Analyzed)
    }
}

/// One discovered web source as reported by the backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Source {
    pub url: String,
    pub title: Option<String>,
    pub status: SourceStatus,
    pub relevance: Option<f64>,
}

/// One decoded progress stream message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub status: Status,
    /// `None` when the message carried no usable percentage.
    pub progress_pct: Option<u8>,
    pub message: Option<String>,
    /// Full source snapshot; `None` when the message carried no list.
    pub sources: Option<Vec<Source>>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn new(phase: Phase, status: Status, progress_pct: u8) -> Self {
        Self {
            phase,
            status,
            progress_pct: Some(progress_pct.min(100)),
            message: None,
            sources: None,
            result: None,
            error: None,
        }
    }

    /// Drops the percentage, as for a message whose value was missing or unusable.
    pub fn without_progress(mut self) -> Self {
        self.progress_pct = None;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Message text with surrounding whitespace removed; blank counts as absent.
    pub fn message_text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// One past research run as stored by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub query: String,
    pub summary: String,
    /// Unix seconds.
    pub timestamp: f64,
}
