use crate::{SessionId, SessionTicket};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SubmitQuery {
        ticket: SessionTicket,
        query: String,
    },
    OpenStream {
        ticket: SessionTicket,
        session_id: SessionId,
    },
    CloseStream {
        ticket: SessionTicket,
    },
    LoadHistory,
    ClearHistory,
}
