use crate::state::{CONNECTION_LOST_MESSAGE, DEFAULT_ERROR_MESSAGE, SUBMISSION_FAILED_MESSAGE};
use crate::{Effect, Msg, ProgressEvent, SessionTicket, Status, UiState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: UiState, msg: Msg) -> (UiState, Vec<Effect>) {
    let effects = match msg {
        Msg::QueryChanged(text) => {
            state.set_query_input(text);
            Vec::new()
        }
        Msg::SearchSubmitted => {
            let query = state.query_input().trim().to_string();
            start_search(&mut state, query)
        }
        Msg::HistoryRepeatClicked { index } => match state.history_query(index) {
            Some(query) => {
                state.set_query_input(query.clone());
                start_search(&mut state, query.trim().to_string())
            }
            None => Vec::new(),
        },
        Msg::SessionStarted { ticket, session_id } => {
            if state.awaits_session_id(ticket) {
                state.attach_session_id(session_id.clone());
                vec![Effect::OpenStream { ticket, session_id }]
            } else {
                Vec::new()
            }
        }
        Msg::SubmissionFailed { ticket, reason } => {
            if state.accepts(ticket) {
                let message = non_blank(reason).unwrap_or_else(|| SUBMISSION_FAILED_MESSAGE.into());
                state.fail_session(message);
            }
            Vec::new()
        }
        Msg::ProgressReceived { ticket, event } => {
            if state.accepts(ticket) {
                apply_progress(&mut state, ticket, event)
            } else {
                Vec::new()
            }
        }
        Msg::StreamFailed { ticket } => {
            if state.accepts(ticket) {
                state.fail_session(CONNECTION_LOST_MESSAGE.to_string());
                vec![Effect::CloseStream { ticket }]
            } else {
                Vec::new()
            }
        }
        Msg::HistoryRequested => {
            state.set_history_loading();
            vec![Effect::LoadHistory]
        }
        Msg::HistoryLoaded(entries) => {
            state.set_history(entries);
            Vec::new()
        }
        Msg::HistoryLoadFailed => {
            state.set_history(Vec::new());
            Vec::new()
        }
        Msg::ClearHistoryClicked => vec![Effect::ClearHistory],
        Msg::HistoryCleared { success } => {
            if success {
                state.set_history(Vec::new());
            }
            Vec::new()
        }
        Msg::FeedbackGiven(feedback) => {
            state.give_feedback(feedback);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start_search(state: &mut UiState, query: String) -> Vec<Effect> {
    if query.is_empty() {
        return Vec::new();
    }

    // Invariant: at most one live subscription; the superseded one is closed
    // before the new session's state exists.
    let mut effects = Vec::with_capacity(2);
    if let Some(previous) = state.active_ticket() {
        effects.push(Effect::CloseStream { ticket: previous });
    }
    let ticket = state.begin_session(query.clone());
    effects.push(Effect::SubmitQuery { ticket, query });
    effects
}

fn apply_progress(state: &mut UiState, ticket: SessionTicket, event: ProgressEvent) -> Vec<Effect> {
    state.apply_progress(&event);

    match event.status {
        Status::Complete => {
            state.complete_session(event.result.unwrap_or_default());
            state.set_history_loading();
            vec![Effect::CloseStream { ticket }, Effect::LoadHistory]
        }
        Status::Error => {
            let message = non_blank(event.error).unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.into());
            state.fail_session(message);
            vec![Effect::CloseStream { ticket }]
        }
        Status::AnalyzingQuery | Status::Other(_) => Vec::new(),
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|value| !value.trim().is_empty())
}
