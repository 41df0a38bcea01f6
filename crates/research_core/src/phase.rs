//! Step reducer: maps backend phases onto the five visible pipeline steps.
//!
//! The backend reports four phases; the UI shows five steps because the
//! `analyzing_content` phase is split into extraction and analysis.

use crate::{Phase, ProgressEvent, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Query,
    Search,
    Extraction,
    Analysis,
    Synthesis,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Query,
        Step::Search,
        Step::Extraction,
        Step::Analysis,
        Step::Synthesis,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Query => "Query analysis",
            Step::Search => "Web search",
            Step::Extraction => "Content extraction",
            Step::Analysis => "Source analysis",
            Step::Synthesis => "Synthesis",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Pending,
    Active,
    Completed,
}

/// State and detail text of all five steps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepBoard {
    states: [StepState; 5],
    details: [Option<String>; 5],
}

impl StepBoard {
    /// Board shown while a fresh session waits for its first event.
    pub fn for_new_session() -> Self {
        let mut board = Self::default();
        board.states[Step::Query.index()] = StepState::Active;
        board
    }

    pub fn state(&self, step: Step) -> StepState {
        self.states[step.index()]
    }

    pub fn detail(&self, step: Step) -> Option<&str> {
        self.details[step.index()].as_deref()
    }

    pub fn states(&self) -> [StepState; 5] {
        self.states
    }

    /// Marks a step active unless it already completed.
    fn activate(&mut self, step: Step) {
        let slot = &mut self.states[step.index()];
        if *slot != StepState::Completed {
            *slot = StepState::Active;
        }
    }

    /// Clears an active mark; completed steps stay completed.
    fn deactivate(&mut self, step: Step) {
        let slot = &mut self.states[step.index()];
        if *slot == StepState::Active {
            *slot = StepState::Pending;
        }
    }

    fn complete(&mut self, step: Step) {
        self.states[step.index()] = StepState::Completed;
    }

    fn complete_through(&mut self, last: Step) {
        for step in Step::ALL.into_iter().filter(|step| *step <= last) {
            self.complete(step);
        }
    }

    fn set_detail(&mut self, step: Step, text: impl Into<String>) {
        self.details[step.index()] = Some(text.into());
    }
}

/// Sub-phase signal inside `analyzing_content`.
///
/// The backend has no structured field for it yet, so the per-source analysis
/// is recognised by its message prefix.
pub fn is_analyzing_source(event: &ProgressEvent) -> bool {
    event
        .message
        .as_deref()
        .is_some_and(|message| message.contains("Analyzing source"))
}

/// Pure reducer from the current board and one event to the next board.
pub fn reduce_steps(board: &StepBoard, event: &ProgressEvent) -> StepBoard {
    if event.status == Status::Error {
        return StepBoard::default();
    }

    let mut next = board.clone();
    let message = event.message_text();

    match &event.phase {
        Phase::QueryAnalysis => {
            next.activate(Step::Query);
            if event.status == Status::AnalyzingQuery {
                next.set_detail(
                    Step::Query,
                    format!(
                        "Analyzing: \"{}\"",
                        message.unwrap_or("Processing your query...")
                    ),
                );
            }
        }
        Phase::WebSearch => {
            next.complete(Step::Query);
            next.activate(Step::Search);
            next.set_detail(Step::Query, "Query optimized for search");
            next.set_detail(
                Step::Search,
                message.unwrap_or("Searching for relevant sources..."),
            );
        }
        Phase::AnalyzingContent => {
            next.complete_through(Step::Search);
            if is_analyzing_source(event) {
                next.deactivate(Step::Extraction);
                next.activate(Step::Analysis);
                let found = event.sources.as_ref().map_or(0, Vec::len);
                next.set_detail(Step::Search, format!("Found {found} potential sources"));
                next.set_detail(Step::Extraction, "Extracting content from web pages");
                next.set_detail(Step::Analysis, message.unwrap_or_default());
            } else {
                next.activate(Step::Extraction);
                next.deactivate(Step::Analysis);
                next.set_detail(
                    Step::Extraction,
                    message.unwrap_or("Processing web content..."),
                );
            }
        }
        Phase::Synthesis => {
            next.complete_through(Step::Analysis);
            next.activate(Step::Synthesis);
            next.set_detail(
                Step::Synthesis,
                message.unwrap_or("Creating comprehensive report..."),
            );
        }
        Phase::Unknown(_) => {}
    }

    if event.status == Status::Complete {
        next.complete_through(Step::Synthesis);
        next.set_detail(Step::Synthesis, "Synthesis complete");
    }

    next
}
