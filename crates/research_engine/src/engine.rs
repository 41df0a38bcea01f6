use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use research_logging::{research_debug, research_info, research_warn};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::stream::{ChannelEventSink, EventSink, StreamConsumer};
use crate::{ClientSettings, EngineEvent, RequestError, ReqwestBackend, ResearchBackend, Ticket};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("backend client: {0}")]
    Backend(#[from] RequestError),
    #[error("async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

enum EngineCommand {
    Submit { ticket: Ticket, query: String },
    OpenStream { ticket: Ticket, session_id: String },
    CloseStream { ticket: Ticket },
    Snapshot { session_id: String },
    LoadHistory,
    ClearHistory,
}

/// Command side of the engine; cheap to clone.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

/// Event side of the engine.
pub struct EngineEvents {
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineEvents {
    /// Blocks until the next event; `None` once the engine has stopped.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

struct LiveStream {
    ticket: Ticket,
    cancel: CancellationToken,
}

impl EngineHandle {
    pub fn new(settings: ClientSettings) -> Result<(Self, EngineEvents), EngineError> {
        let backend = Arc::new(ReqwestBackend::new(settings.clone())?);
        Self::with_backend(backend, settings)
    }

    pub fn with_backend(
        backend: Arc<dyn ResearchBackend>,
        settings: ClientSettings,
    ) -> Result<(Self, EngineEvents), EngineError> {
        let runtime = Runtime::new()?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let sink = Arc::new(ChannelEventSink::new(event_tx));

        thread::spawn(move || run_engine(runtime, backend, settings, cmd_rx, sink));

        Ok((Self { cmd_tx }, EngineEvents { event_rx }))
    }

    pub fn submit(&self, ticket: Ticket, query: impl Into<String>) {
        self.send(EngineCommand::Submit {
            ticket,
            query: query.into(),
        });
    }

    /// Opens the progress subscription for `ticket`, closing any other one.
    pub fn open_stream(&self, ticket: Ticket, session_id: impl Into<String>) {
        self.send(EngineCommand::OpenStream {
            ticket,
            session_id: session_id.into(),
        });
    }

    /// Closes the subscription for `ticket`; a no-op if it is not the live one.
    pub fn close_stream(&self, ticket: Ticket) {
        self.send(EngineCommand::CloseStream { ticket });
    }

    pub fn snapshot(&self, session_id: impl Into<String>) {
        self.send(EngineCommand::Snapshot {
            session_id: session_id.into(),
        });
    }

    pub fn load_history(&self) {
        self.send(EngineCommand::LoadHistory);
    }

    pub fn clear_history(&self) {
        self.send(EngineCommand::ClearHistory);
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            research_warn!("Engine thread has stopped; command dropped");
        }
    }
}

fn run_engine(
    runtime: Runtime,
    backend: Arc<dyn ResearchBackend>,
    settings: ClientSettings,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    sink: Arc<ChannelEventSink>,
) {
    // The backend keys history by its session cookie, so obtain it before
    // the first submission goes out.
    if let Err(err) = runtime.block_on(backend.establish_session()) {
        research_warn!("Could not establish backend session: {}", err);
    }

    let consumer = Arc::new(StreamConsumer::new(backend.clone(), settings));
    let mut live: Option<LiveStream> = None;

    while let Ok(command) = cmd_rx.recv() {
        match command {
            EngineCommand::Submit { ticket, query } => {
                let backend = backend.clone();
                let sink = sink.clone();
                runtime.spawn(async move {
                    let event = match backend.submit(&query).await {
                        Ok(session_id) => {
                            research_info!("Session {} started for ticket {}", session_id, ticket);
                            EngineEvent::SessionStarted { ticket, session_id }
                        }
                        Err(error) => {
                            research_warn!("Submission for ticket {} failed: {}", ticket, error);
                            EngineEvent::SubmissionFailed { ticket, error }
                        }
                    };
                    sink.emit(event);
                });
            }
            EngineCommand::OpenStream { ticket, session_id } => {
                if let Some(previous) = live.take() {
                    research_debug!("Closing stream for ticket {}", previous.ticket);
                    previous.cancel.cancel();
                }
                let cancel = CancellationToken::new();
                live = Some(LiveStream {
                    ticket,
                    cancel: cancel.clone(),
                });

                let consumer = consumer.clone();
                let sink = sink.clone();
                runtime.spawn(async move {
                    let end = consumer
                        .run(ticket, &session_id, sink.as_ref(), &cancel)
                        .await;
                    sink.emit(EngineEvent::StreamClosed { ticket, end });
                });
            }
            EngineCommand::CloseStream { ticket } => match live.take() {
                Some(current) if current.ticket == ticket => {
                    research_debug!("Closing stream for ticket {}", ticket);
                    current.cancel.cancel();
                }
                other => {
                    live = other;
                    research_debug!("Close for ticket {} ignored; not the live stream", ticket);
                }
            },
            EngineCommand::Snapshot { session_id } => {
                let backend = backend.clone();
                let sink = sink.clone();
                runtime.spawn(async move {
                    let result = backend.progress_snapshot(&session_id).await;
                    sink.emit(EngineEvent::SnapshotLoaded { session_id, result });
                });
            }
            EngineCommand::LoadHistory => {
                let backend = backend.clone();
                let sink = sink.clone();
                runtime.spawn(async move {
                    sink.emit(EngineEvent::HistoryLoaded(backend.history().await));
                });
            }
            EngineCommand::ClearHistory => {
                let backend = backend.clone();
                let sink = sink.clone();
                runtime.spawn(async move {
                    sink.emit(EngineEvent::HistoryCleared(backend.clear_history().await));
                });
            }
        }
    }

    if let Some(current) = live.take() {
        current.cancel.cancel();
    }
}
