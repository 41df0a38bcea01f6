use crate::phase::{Step, StepState};
use crate::sources::SourceRow;
use crate::{FeedbackState, Outcome, SessionTicket};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub outcome: Outcome,
    /// Ticket of the session shown; changes whenever a search starts.
    pub ticket: Option<SessionTicket>,
    pub query: Option<String>,
    pub session_id: Option<String>,
    pub progress_pct: u8,
    pub progress_text: String,
    pub steps: Vec<StepView>,
    pub sources: Vec<SourceRow>,
    pub source_count: usize,
    pub search_enabled: bool,
    pub feedback: FeedbackState,
    pub history: Vec<HistoryRowView>,
    pub history_loading: bool,
}

impl AppViewModel {
    pub fn step(&self, step: Step) -> Option<&StepView> {
        self.steps.iter().find(|view| view.step == step)
    }

    pub fn step_states(&self) -> Vec<StepState> {
        self.steps.iter().map(|view| view.state).collect()
    }

    /// Rendered report content, present once the session succeeded.
    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Succeeded { content } => Some(content),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { message } => Some(message),
            _ => None,
        }
    }

    /// True once the session reached an outcome and no history refresh is pending.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Succeeded { .. } | Outcome::Failed { .. }
        ) && !self.history_loading
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub step: Step,
    pub label: &'static str,
    pub state: StepState,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRowView {
    pub number: usize,
    pub query: String,
    pub summary: String,
    pub timestamp: f64,
}
