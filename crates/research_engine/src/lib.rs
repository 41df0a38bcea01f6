//! Research engine: backend IO, progress stream consumption and effect execution.
mod backend;
mod decode;
mod engine;
mod report;
mod settings;
mod sse;
mod stream;
mod types;

pub use backend::{ProgressStream, ReqwestBackend, ResearchBackend};
pub use decode::decode_progress;
pub use engine::{EngineError, EngineEvents, EngineHandle};
pub use report::{MarkdownReportRenderer, ReportRenderer};
pub use settings::{ClientSettings, DEFAULT_SERVER_URL};
pub use sse::{SseDecoder, SseMessage};
pub use stream::{ChannelEventSink, EventSink, StreamConsumer};
pub use types::{
    EngineEvent, FailureKind, HistoryItem, ProgressPayload, RequestError, SourcePayload,
    StreamEnd, Ticket,
};
