use std::sync::{mpsc, Arc};

use futures_util::StreamExt;
use research_logging::{research_debug, research_info, research_warn};
use tokio_util::sync::CancellationToken;

use crate::{
    ClientSettings, EngineEvent, FailureKind, RequestError, ResearchBackend, StreamEnd, Ticket,
};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        // The receiver only disappears when the application is shutting down.
        let _ = self.tx.send(event);
    }
}

/// Follows one session's progress stream until a terminal payload, a local
/// close, or a transport failure.
pub struct StreamConsumer {
    backend: Arc<dyn ResearchBackend>,
    settings: ClientSettings,
}

impl StreamConsumer {
    pub fn new(backend: Arc<dyn ResearchBackend>, settings: ClientSettings) -> Self {
        Self { backend, settings }
    }

    /// Forwards every payload to `sink` and reports how the stream ended.
    ///
    /// Transport failures are retried up to `max_reconnects` times with
    /// exponential backoff; cancellation wins over both reading and waiting.
    pub async fn run(
        &self,
        ticket: Ticket,
        session_id: &str,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> StreamEnd {
        let mut reconnects = 0;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamEnd::Cancelled,
                outcome = self.follow(ticket, session_id, sink) => outcome,
            };

            let err = match outcome {
                Ok(()) => return StreamEnd::Terminal,
                Err(err) => err,
            };
            if reconnects >= self.settings.max_reconnects {
                research_warn!("Progress stream for session {} failed: {}", session_id, err);
                return StreamEnd::TransportFailed(err);
            }

            reconnects += 1;
            let delay = self.settings.backoff_for(reconnects);
            research_info!(
                "Progress stream for session {} failed ({}); reconnect {}/{} in {:?}",
                session_id,
                err,
                reconnects,
                self.settings.max_reconnects,
                delay
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamEnd::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn follow(
        &self,
        ticket: Ticket,
        session_id: &str,
        sink: &dyn EventSink,
    ) -> Result<(), RequestError> {
        let mut stream = self.backend.open_stream(session_id).await?;
        research_debug!("Progress stream open for session {}", session_id);

        while let Some(item) = stream.next().await {
            let payload = item?;
            let terminal = payload.is_terminal();
            sink.emit(EngineEvent::Progress { ticket, payload });
            if terminal {
                return Ok(());
            }
        }

        Err(RequestError::new(
            FailureKind::StreamEnded,
            "progress stream closed before a terminal event",
        ))
    }
}
