use crate::{HistoryEntry, ProgressEvent, SessionId, SessionTicket};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User edited the query input.
    QueryChanged(String),
    /// User submitted the current query input.
    SearchSubmitted,
    /// Backend accepted the query for the session with this ticket.
    SessionStarted {
        ticket: SessionTicket,
        session_id: SessionId,
    },
    /// Query submission failed; `reason` is the backend's error text if it sent one.
    SubmissionFailed {
        ticket: SessionTicket,
        reason: Option<String>,
    },
    /// One decoded progress stream message.
    ProgressReceived {
        ticket: SessionTicket,
        event: ProgressEvent,
    },
    /// Progress stream broke before a terminal event.
    StreamFailed { ticket: SessionTicket },
    /// User asked for the history list.
    HistoryRequested,
    HistoryLoaded(Vec<HistoryEntry>),
    HistoryLoadFailed,
    /// User asked to research a history entry again (0-based index).
    HistoryRepeatClicked { index: usize },
    ClearHistoryClicked,
    HistoryCleared { success: bool },
    /// User rated the finished report.
    FeedbackGiven(crate::Feedback),
    /// Fallback for engine notifications that need no state change.
    NoOp,
}
