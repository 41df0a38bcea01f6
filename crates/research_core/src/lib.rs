//! Research core: pure session state machine and view-model helpers.
mod effect;
mod event;
mod msg;
pub mod phase;
pub mod sources;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use event::{
    HistoryEntry, Phase, ProgressEvent, SessionId, SessionTicket, Source, SourceStatus, Status,
};
pub use msg::Msg;
pub use phase::{reduce_steps, Step, StepBoard, StepState};
pub use sources::SourceRow;
pub use state::{
    Feedback, FeedbackState, Outcome, Session, UiState, CONNECTION_LOST_MESSAGE,
    DEFAULT_ERROR_MESSAGE, STARTING_MESSAGE, SUBMISSION_FAILED_MESSAGE,
};
pub use update::update;
pub use view_model::{AppViewModel, HistoryRowView, StepView};
