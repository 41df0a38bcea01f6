use crate::phase::{reduce_steps, Step, StepBoard};
use crate::sources::{self, SourceRow};
use crate::view_model::{AppViewModel, HistoryRowView, StepView};
use crate::{HistoryEntry, ProgressEvent, SessionId, SessionTicket};

pub const DEFAULT_ERROR_MESSAGE: &str = "Sorry, we encountered an error while researching your query. Please try again later or with a different query.";
pub const CONNECTION_LOST_MESSAGE: &str = "Connection to server lost. Please try again.";
pub const SUBMISSION_FAILED_MESSAGE: &str = "Failed to start research process. Please try again.";
pub const STARTING_MESSAGE: &str = "Starting research...";

/// The one search session the UI currently reflects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub ticket: SessionTicket,
    pub id: Option<SessionId>,
    pub query: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Idle,
    Researching,
    Succeeded {
        content: String,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Helpful,
    NotHelpful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackState {
    #[default]
    Hidden,
    Enabled,
    Acknowledged(Feedback),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UiState {
    query_input: String,
    next_ticket: SessionTicket,
    session: Option<Session>,
    steps: StepBoard,
    progress_pct: u8,
    progress_text: String,
    sources: Vec<SourceRow>,
    outcome: Outcome,
    feedback: FeedbackState,
    history: Vec<HistoryEntry>,
    history_loading: bool,
    dirty: bool,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            outcome: self.outcome.clone(),
            ticket: self.session.as_ref().map(|s| s.ticket),
            query: self.session.as_ref().map(|s| s.query.clone()),
            session_id: self
                .session
                .as_ref()
                .and_then(|s| s.id.as_ref())
                .map(|id| id.to_string()),
            progress_pct: self.progress_pct,
            progress_text: self.progress_text.clone(),
            steps: Step::ALL
                .into_iter()
                .map(|step| StepView {
                    step,
                    label: step.label(),
                    state: self.steps.state(step),
                    detail: self.steps.detail(step).map(ToOwned::to_owned),
                })
                .collect(),
            source_count: self.sources.len(),
            sources: self.sources.clone(),
            search_enabled: !self.is_session_active(),
            feedback: self.feedback,
            history: self
                .history
                .iter()
                .enumerate()
                .map(|(position, entry)| HistoryRowView {
                    number: position + 1,
                    query: entry.query.clone(),
                    summary: entry.summary.clone(),
                    timestamp: entry.timestamp,
                })
                .collect(),
            history_loading: self.history_loading,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn query_input(&self) -> &str {
        &self.query_input
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn steps(&self) -> &StepBoard {
        &self.steps
    }

    pub fn is_session_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.active)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_query_input(&mut self, text: String) {
        if self.query_input != text {
            self.query_input = text;
            self.mark_dirty();
        }
    }

    pub(crate) fn active_ticket(&self) -> Option<SessionTicket> {
        self.session
            .as_ref()
            .filter(|session| session.active)
            .map(|session| session.ticket)
    }

    /// True when `ticket` names the current session and it still accepts input.
    pub(crate) fn accepts(&self, ticket: SessionTicket) -> bool {
        self.active_ticket() == Some(ticket)
    }

    /// True while the current session waits for its backend id.
    pub(crate) fn awaits_session_id(&self, ticket: SessionTicket) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.active && s.ticket == ticket && s.id.is_none())
    }

    /// Replaces the current session with a fresh one and resets all
    /// per-session view state.
    pub(crate) fn begin_session(&mut self, query: String) -> SessionTicket {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.session = Some(Session {
            ticket,
            id: None,
            query,
            active: true,
        });
        self.steps = StepBoard::for_new_session();
        self.progress_pct = 0;
        self.progress_text = STARTING_MESSAGE.to_string();
        self.sources.clear();
        self.outcome = Outcome::Researching;
        self.feedback = FeedbackState::Hidden;
        self.mark_dirty();
        ticket
    }

    pub(crate) fn attach_session_id(&mut self, session_id: SessionId) {
        if let Some(session) = self.session.as_mut() {
            session.id = Some(session_id);
            self.mark_dirty();
        }
    }

    pub(crate) fn apply_progress(&mut self, event: &ProgressEvent) {
        // A message without a usable percentage leaves the bar where it was.
        if let Some(pct) = event.progress_pct {
            self.progress_pct = pct.min(100);
        }
        self.progress_text = event
            .message_text()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("Research {}% complete", self.progress_pct));
        self.steps = reduce_steps(&self.steps, event);
        if let Some(snapshot) = event.sources.as_deref().filter(|list| !list.is_empty()) {
            self.sources = sources::rebuild(snapshot);
        }
        self.mark_dirty();
    }

    pub(crate) fn complete_session(&mut self, content: String) {
        self.deactivate_session();
        self.outcome = Outcome::Succeeded { content };
        self.feedback = FeedbackState::Enabled;
        self.mark_dirty();
    }

    /// Terminal failure: the error panel replaces any partial progress marks.
    pub(crate) fn fail_session(&mut self, message: String) {
        self.deactivate_session();
        self.steps = StepBoard::default();
        self.outcome = Outcome::Failed { message };
        self.mark_dirty();
    }

    fn deactivate_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.active = false;
        }
    }

    pub(crate) fn history_query(&self, index: usize) -> Option<String> {
        self.history.get(index).map(|entry| entry.query.clone())
    }

    pub(crate) fn set_history_loading(&mut self) {
        self.history_loading = true;
        self.mark_dirty();
    }

    pub(crate) fn set_history(&mut self, entries: Vec<HistoryEntry>) {
        self.history = entries;
        self.history_loading = false;
        self.mark_dirty();
    }

    /// Feedback only counts once per successful report.
    pub(crate) fn give_feedback(&mut self, feedback: Feedback) {
        if self.feedback == FeedbackState::Enabled {
            self.feedback = FeedbackState::Acknowledged(feedback);
            self.mark_dirty();
        }
    }
}
