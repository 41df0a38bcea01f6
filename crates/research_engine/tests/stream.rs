use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use pretty_assertions::assert_eq;
use research_engine::{
    ClientSettings, EngineEvent, EventSink, FailureKind, HistoryItem, ProgressPayload,
    ProgressStream, RequestError, ResearchBackend, ReqwestBackend, StreamConsumer, StreamEnd,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn new() -> Self {
        Self::default()
    }

    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }

    fn statuses(&self) -> Vec<Option<String>> {
        self.take()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Progress { payload, .. } => Some(payload.status),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

type Connection = Result<Vec<Result<ProgressPayload, RequestError>>, RequestError>;

/// Serves one scripted connection per `open_stream` call.
struct ScriptedBackend {
    connections: Mutex<VecDeque<Connection>>,
    opened: Mutex<u32>,
    hang_after_script: bool,
}

impl ScriptedBackend {
    fn new(connections: Vec<Connection>) -> Self {
        Self {
            connections: Mutex::new(connections.into()),
            opened: Mutex::new(0),
            hang_after_script: false,
        }
    }

    fn hanging(connections: Vec<Connection>) -> Self {
        Self {
            hang_after_script: true,
            ..Self::new(connections)
        }
    }

    fn opened(&self) -> u32 {
        *self.opened.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ResearchBackend for ScriptedBackend {
    async fn establish_session(&self) -> Result<(), RequestError> {
        Ok(())
    }

    async fn submit(&self, _query: &str) -> Result<String, RequestError> {
        Ok("scripted".to_string())
    }

    async fn open_stream(&self, _session_id: &str) -> Result<ProgressStream, RequestError> {
        *self.opened.lock().unwrap() += 1;
        let next = self.connections.lock().unwrap().pop_front();
        let items = match next {
            Some(connection) => connection?,
            None => Vec::new(),
        };
        if self.hang_after_script {
            Ok(stream::iter(items).chain(stream::pending()).boxed())
        } else {
            Ok(stream::iter(items).boxed())
        }
    }

    async fn progress_snapshot(&self, _session_id: &str) -> Result<ProgressPayload, RequestError> {
        Ok(ProgressPayload::default())
    }

    async fn history(&self) -> Result<Vec<HistoryItem>, RequestError> {
        Ok(Vec::new())
    }

    async fn clear_history(&self) -> Result<bool, RequestError> {
        Ok(true)
    }
}

fn status(status: &str) -> Result<ProgressPayload, RequestError> {
    Ok(ProgressPayload {
        status: Some(status.to_string()),
        ..ProgressPayload::default()
    })
}

fn network_error() -> RequestError {
    RequestError::new(FailureKind::Network, "connection reset")
}

fn settings(max_reconnects: u32) -> ClientSettings {
    ClientSettings {
        max_reconnects,
        reconnect_backoff: Duration::from_millis(5),
        ..ClientSettings::default()
    }
}

#[tokio::test]
async fn stops_at_terminal_payload() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok(vec![
        status("analyzing_query"),
        status("complete"),
        status("searching"),
    ])]));
    let consumer = StreamConsumer::new(backend, settings(0));
    let sink = TestSink::new();

    let end = consumer
        .run(4, "s", &sink, &CancellationToken::new())
        .await;

    assert_eq!(end, StreamEnd::Terminal);
    assert_eq!(
        sink.statuses(),
        vec![Some("analyzing_query".to_string()), Some("complete".to_string())]
    );
}

#[tokio::test]
async fn events_carry_the_ticket() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok(vec![status("error")])]));
    let consumer = StreamConsumer::new(backend, settings(0));
    let sink = TestSink::new();

    consumer.run(9, "s", &sink, &CancellationToken::new()).await;

    let tickets: Vec<_> = sink
        .take()
        .into_iter()
        .map(|event| match event {
            EngineEvent::Progress { ticket, .. } => ticket,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(tickets, vec![9]);
}

#[tokio::test]
async fn end_of_stream_without_terminal_is_a_transport_failure() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok(vec![status("searching")])]));
    let consumer = StreamConsumer::new(backend, settings(0));
    let sink = TestSink::new();

    let end = consumer.run(1, "s", &sink, &CancellationToken::new()).await;

    match end {
        StreamEnd::TransportFailed(err) => assert_eq!(err.kind, FailureKind::StreamEnded),
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert_eq!(sink.statuses(), vec![Some("searching".to_string())]);
}

#[tokio::test]
async fn default_settings_do_not_reconnect() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Err(network_error()),
        Ok(vec![status("complete")]),
    ]));
    let consumer = StreamConsumer::new(backend.clone(), settings(0));
    let sink = TestSink::new();

    let end = consumer.run(1, "s", &sink, &CancellationToken::new()).await;

    assert_eq!(end, StreamEnd::TransportFailed(network_error()));
    assert_eq!(backend.opened(), 1);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn reconnects_until_terminal_within_budget() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Err(network_error()),
        Ok(vec![status("searching"), Err(network_error())]),
        Ok(vec![status("complete")]),
    ]));
    let consumer = StreamConsumer::new(backend.clone(), settings(2));
    let sink = TestSink::new();

    let end = consumer.run(1, "s", &sink, &CancellationToken::new()).await;

    assert_eq!(end, StreamEnd::Terminal);
    assert_eq!(backend.opened(), 3);
    assert_eq!(
        sink.statuses(),
        vec![Some("searching".to_string()), Some("complete".to_string())]
    );
}

#[tokio::test]
async fn gives_up_after_reconnect_budget() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Err(network_error()),
        Err(network_error()),
        Err(network_error()),
    ]));
    let consumer = StreamConsumer::new(backend.clone(), settings(1));
    let sink = TestSink::new();

    let end = consumer.run(1, "s", &sink, &CancellationToken::new()).await;

    assert_eq!(end, StreamEnd::TransportFailed(network_error()));
    assert_eq!(backend.opened(), 2);
}

#[tokio::test]
async fn cancelled_token_ends_without_opening() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok(vec![status("complete")])]));
    let consumer = StreamConsumer::new(backend.clone(), settings(0));
    let sink = TestSink::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let end = consumer.run(1, "s", &sink, &cancel).await;

    assert_eq!(end, StreamEnd::Cancelled);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn cancel_interrupts_an_idle_stream() {
    let backend = Arc::new(ScriptedBackend::hanging(vec![Ok(vec![status("searching")])]));
    let consumer = StreamConsumer::new(backend, settings(0));
    let sink = TestSink::new();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let end = tokio::time::timeout(
        Duration::from_secs(2),
        consumer.run(1, "s", &sink, &cancel),
    )
    .await
    .expect("cancel should end the stream");

    assert_eq!(end, StreamEnd::Cancelled);
    assert_eq!(sink.statuses(), vec![Some("searching".to_string())]);
}

#[tokio::test]
async fn cancel_interrupts_reconnect_backoff() {
    let backend = Arc::new(ScriptedBackend::new(vec![Err(network_error())]));
    let settings = ClientSettings {
        max_reconnects: 3,
        reconnect_backoff: Duration::from_secs(30),
        ..ClientSettings::default()
    };
    let consumer = StreamConsumer::new(backend.clone(), settings);
    let sink = TestSink::new();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let end = tokio::time::timeout(
        Duration::from_secs(2),
        consumer.run(1, "s", &sink, &cancel),
    )
    .await
    .expect("cancel should end the backoff");

    assert_eq!(end, StreamEnd::Cancelled);
    assert_eq!(backend.opened(), 1);
}

#[tokio::test]
async fn follows_a_real_event_stream() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"phase\":\"web_search\",\"status\":\"searching\",\"progress_pct\":20}\n\n",
        "data: {\"status\":\"error\",\"error\":\"rate limited\"}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/research_stream/live"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let settings = ClientSettings {
        server_url: server.uri(),
        ..ClientSettings::default()
    };
    let backend = Arc::new(ReqwestBackend::new(settings.clone()).unwrap());
    let consumer = StreamConsumer::new(backend, settings);
    let sink = TestSink::new();

    let end = consumer
        .run(2, "live", &sink, &CancellationToken::new())
        .await;

    assert_eq!(end, StreamEnd::Terminal);
    let events = sink.take();
    assert_eq!(events.len(), 2);
    match &events[1] {
        EngineEvent::Progress { payload, .. } => {
            assert_eq!(payload.error.as_deref(), Some("rate limited"))
        }
        other => panic!("unexpected event {other:?}"),
    }
}
