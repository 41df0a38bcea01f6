use std::sync::mpsc;
use std::thread;

use research_core::{
    Effect, HistoryEntry, Msg, Phase, ProgressEvent, SessionId, Source, SourceStatus, Status,
};
use research_engine::{
    ClientSettings, EngineError, EngineEvent, EngineEvents, EngineHandle, HistoryItem,
    ProgressPayload, StreamEnd,
};
use research_logging::{research_debug, research_info, research_warn};

/// Executes core effects on the engine and feeds engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(settings: ClientSettings, msg_tx: mpsc::Sender<Msg>) -> Result<Self, EngineError> {
        let (engine, events) = EngineHandle::new(settings)?;
        spawn_event_loop(events, msg_tx);
        Ok(Self { engine })
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SubmitQuery { ticket, query } => {
                    research_info!("SubmitQuery ticket={} query_len={}", ticket, query.len());
                    self.engine.submit(ticket, query);
                }
                Effect::OpenStream { ticket, session_id } => {
                    self.engine.open_stream(ticket, session_id.as_str());
                }
                Effect::CloseStream { ticket } => self.engine.close_stream(ticket),
                Effect::LoadHistory => self.engine.load_history(),
                Effect::ClearHistory => self.engine.clear_history(),
            }
        }
    }
}

fn spawn_event_loop(events: EngineEvents, msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        while let Some(event) = events.recv() {
            if msg_tx.send(map_event(event)).is_err() {
                break;
            }
        }
    });
}

pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::SessionStarted { ticket, session_id } => Msg::SessionStarted {
            ticket,
            session_id: SessionId::new(session_id),
        },
        EngineEvent::SubmissionFailed { ticket, error } => Msg::SubmissionFailed {
            ticket,
            reason: error.backend_message().map(ToOwned::to_owned),
        },
        EngineEvent::Progress { ticket, payload } => Msg::ProgressReceived {
            ticket,
            event: progress_event(payload),
        },
        EngineEvent::StreamClosed { ticket, end } => match end {
            StreamEnd::TransportFailed(err) => {
                research_warn!("Stream for ticket {} failed: {}", ticket, err);
                Msg::StreamFailed { ticket }
            }
            StreamEnd::Terminal | StreamEnd::Cancelled => {
                research_debug!("Stream for ticket {} closed: {:?}", ticket, end);
                Msg::NoOp
            }
        },
        EngineEvent::HistoryLoaded(Ok(items)) => {
            Msg::HistoryLoaded(items.into_iter().map(history_entry).collect())
        }
        EngineEvent::HistoryLoaded(Err(err)) => {
            research_warn!("Loading history failed: {}", err);
            Msg::HistoryLoadFailed
        }
        EngineEvent::HistoryCleared(Ok(success)) => Msg::HistoryCleared { success },
        EngineEvent::HistoryCleared(Err(err)) => {
            research_warn!("Clearing history failed: {}", err);
            Msg::HistoryCleared { success: false }
        }
        EngineEvent::SnapshotLoaded { session_id, .. } => {
            research_debug!("Snapshot for {} not requested by the session view", session_id);
            Msg::NoOp
        }
    }
}

/// Lifts a wire payload into the core's vocabulary.
pub(crate) fn progress_event(payload: ProgressPayload) -> ProgressEvent {
    let phase = Phase::from_wire(payload.phase.as_deref().unwrap_or_default());
    let status = Status::from_wire(payload.status.as_deref().unwrap_or_default());
    let mut event = ProgressEvent::new(phase, status, 0);
    event.progress_pct = payload.progress_pct;
    event.message = payload.message;
    event.result = payload.result;
    event.error = payload.error;
    event.sources = payload.sources.map(|sources| {
        sources
            .into_iter()
            .map(|source| Source {
                url: source.url,
                title: source.title,
                status: SourceStatus::from_wire(source.status.as_deref().unwrap_or_default()),
                relevance: source.relevance,
            })
            .collect()
    });
    event
}

fn history_entry(item: HistoryItem) -> HistoryEntry {
    HistoryEntry {
        query: item.query,
        summary: item.summary,
        timestamp: item.timestamp,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use research_engine::{FailureKind, RequestError, SourcePayload};

    use super::*;

    #[test]
    fn payload_maps_to_core_vocabulary() {
        let payload = ProgressPayload {
            phase: Some("initialization".to_string()),
            status: Some("analyzing_query".to_string()),
            progress_pct: Some(12),
            message: Some("Understanding the question".to_string()),
            sources: Some(vec![SourcePayload {
                url: "https://a.example/x".to_string(),
                title: None,
                status: Some("queued".to_string()),
                relevance: Some(0.4),
            }]),
            result: None,
            error: None,
        };

        let event = progress_event(payload);
        assert_eq!(event.phase, Phase::QueryAnalysis);
        assert_eq!(event.status, Status::AnalyzingQuery);
        assert_eq!(event.progress_pct, Some(12));
        assert_eq!(event.message_text(), Some("Understanding the question"));
        let sources = event.sources.unwrap();
        assert_eq!(sources[0].status, SourceStatus::Pending);
        assert_eq!(sources[0].relevance, Some(0.4));
    }

    #[test]
    fn empty_payload_is_an_unknown_non_terminal_event() {
        let event = progress_event(ProgressPayload::default());
        assert_eq!(event.phase, Phase::Unknown(String::new()));
        assert!(!event.status.is_terminal());
        assert_eq!(event.progress_pct, None);
        assert_eq!(event.sources, None);
    }

    #[test]
    fn wrong_typed_percentage_does_not_reset_progress() {
        use research_core::{update, UiState};
        use research_engine::decode_progress;

        let state = UiState::new();
        let (state, _) = update(state, Msg::QueryChanged("rust".to_string()));
        let (state, _) = update(state, Msg::SearchSubmitted);
        let ticket = state.session().unwrap().ticket;

        let mut state = state;
        for body in [
            r#"{"phase":"synthesis","status":"synthesizing","progress_pct":85}"#,
            r#"{"phase":"synthesis","status":"synthesizing","progress_pct":"90"}"#,
        ] {
            let event = progress_event(decode_progress(body).unwrap());
            state = update(state, Msg::ProgressReceived { ticket, event }).0;
        }

        assert_eq!(state.view().progress_pct, 85);
        assert_eq!(state.view().progress_text, "Research 85% complete");
    }

    #[test]
    fn only_transport_failures_become_stream_failures() {
        let failed = map_event(EngineEvent::StreamClosed {
            ticket: 3,
            end: StreamEnd::TransportFailed(RequestError::new(FailureKind::Network, "reset")),
        });
        assert_eq!(failed, Msg::StreamFailed { ticket: 3 });

        for end in [StreamEnd::Terminal, StreamEnd::Cancelled] {
            assert_eq!(map_event(EngineEvent::StreamClosed { ticket: 3, end }), Msg::NoOp);
        }
    }

    #[test]
    fn submission_failure_keeps_only_backend_text() {
        let rejected = map_event(EngineEvent::SubmissionFailed {
            ticket: 1,
            error: RequestError::new(FailureKind::Rejected, "No query provided"),
        });
        assert_eq!(
            rejected,
            Msg::SubmissionFailed {
                ticket: 1,
                reason: Some("No query provided".to_string()),
            }
        );

        let network = map_event(EngineEvent::SubmissionFailed {
            ticket: 1,
            error: RequestError::new(FailureKind::Network, "connection refused"),
        });
        assert_eq!(network, Msg::SubmissionFailed { ticket: 1, reason: None });
    }

    #[test]
    fn history_results_map_to_messages() {
        let loaded = map_event(EngineEvent::HistoryLoaded(Ok(vec![HistoryItem {
            query: "q".to_string(),
            summary: "s".to_string(),
            timestamp: 10.5,
        }])));
        assert_eq!(
            loaded,
            Msg::HistoryLoaded(vec![HistoryEntry {
                query: "q".to_string(),
                summary: "s".to_string(),
                timestamp: 10.5,
            }])
        );

        let error = RequestError::new(FailureKind::HttpStatus(500), "boom");
        assert_eq!(
            map_event(EngineEvent::HistoryLoaded(Err(error.clone()))),
            Msg::HistoryLoadFailed
        );
        assert_eq!(
            map_event(EngineEvent::HistoryCleared(Err(error))),
            Msg::HistoryCleared { success: false }
        );
        assert_eq!(
            map_event(EngineEvent::HistoryCleared(Ok(true))),
            Msg::HistoryCleared { success: true }
        );
    }
}
