use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use research_logging::{research_debug, research_warn};
use serde::Deserialize;
use url::Url;

use crate::decode::{decode_progress, progress_from_object};
use crate::sse::{SseDecoder, SseMessage};
use crate::{ClientSettings, FailureKind, HistoryItem, ProgressPayload, RequestError};

/// Decoded progress messages of one subscription, in send order.
pub type ProgressStream = BoxStream<'static, Result<ProgressPayload, RequestError>>;

/// The research backend's HTTP surface.
#[async_trait::async_trait]
pub trait ResearchBackend: Send + Sync {
    /// Obtains the backend's session cookie; history is keyed by it.
    async fn establish_session(&self) -> Result<(), RequestError>;

    /// Submits a query and returns the backend-issued session id.
    async fn submit(&self, query: &str) -> Result<String, RequestError>;

    /// Opens the server-push progress stream for a session.
    async fn open_stream(&self, session_id: &str) -> Result<ProgressStream, RequestError>;

    /// One-shot snapshot of a session's latest progress.
    async fn progress_snapshot(&self, session_id: &str) -> Result<ProgressPayload, RequestError>;

    async fn history(&self) -> Result<Vec<HistoryItem>, RequestError>;

    /// Returns whether the backend reported success.
    async fn clear_history(&self) -> Result<bool, RequestError>;
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClearResponse {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    base: Url,
    settings: ClientSettings,
}

impl ReqwestBackend {
    pub fn new(settings: ClientSettings) -> Result<Self, RequestError> {
        let base = settings
            .base_url()
            .map_err(|err| RequestError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(RequestError::new(
                FailureKind::InvalidUrl,
                format!("unsupported server url {base}"),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .cookie_store(true)
            .build()
            .map_err(|err| RequestError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            base,
            settings,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn read_body(response: reqwest::Response) -> Result<(StatusCode, Bytes), RequestError> {
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl ResearchBackend for ReqwestBackend {
    async fn establish_session(&self) -> Result<(), RequestError> {
        let response = self
            .client
            .get(self.endpoint(&[]))
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_status_error(status));
        }
        Ok(())
    }

    async fn submit(&self, query: &str) -> Result<String, RequestError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("query", query)
            .finish();
        let response = self
            .client
            .post(self.endpoint(&["research"]))
            .timeout(self.settings.request_timeout)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let (status, body) = Self::read_body(response).await?;

        // The backend reports failures as `{ "error": ... }` with any status code.
        let parsed = serde_json::from_slice::<SubmitResponse>(&body).ok();
        if let Some(error) = parsed.as_ref().and_then(|p| p.error.clone()) {
            return Err(RequestError::new(FailureKind::Rejected, error));
        }
        if !status.is_success() {
            return Err(http_status_error(status));
        }
        match parsed.and_then(|p| p.session_id) {
            Some(session_id) if !session_id.trim().is_empty() => Ok(session_id),
            _ => Err(RequestError::new(
                FailureKind::MalformedResponse,
                "response carries no session_id",
            )),
        }
    }

    async fn open_stream(&self, session_id: &str) -> Result<ProgressStream, RequestError> {
        let response = self
            .client
            .get(self.endpoint(&["research_stream", session_id]))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_status_error(status));
        }

        let state = StreamState {
            bytes: response.bytes_stream().boxed(),
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
            finished: false,
        };
        Ok(stream::unfold(state, StreamState::next_item).boxed())
    }

    async fn progress_snapshot(&self, session_id: &str) -> Result<ProgressPayload, RequestError> {
        let response = self
            .client
            .get(self.endpoint(&["research_progress", session_id]))
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let (status, body) = Self::read_body(response).await?;
        let value: serde_json::Value = serde_json::from_slice(&body).map_err(|err| {
            if status.is_success() {
                RequestError::new(FailureKind::MalformedResponse, err.to_string())
            } else {
                http_status_error(status)
            }
        })?;
        let object = value.as_object().ok_or_else(|| {
            RequestError::new(FailureKind::MalformedResponse, "snapshot is not an object")
        })?;

        if !status.is_success() {
            return Err(match object.get("error").and_then(|v| v.as_str()) {
                Some(error) => RequestError::new(FailureKind::Rejected, error),
                None => http_status_error(status),
            });
        }
        Ok(progress_from_object(object))
    }

    async fn history(&self) -> Result<Vec<HistoryItem>, RequestError> {
        let response = self
            .client
            .get(self.endpoint(&["conversation_history"]))
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let (status, body) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(http_status_error(status));
        }
        serde_json::from_slice(&body)
            .map_err(|err| RequestError::new(FailureKind::MalformedResponse, err.to_string()))
    }

    async fn clear_history(&self) -> Result<bool, RequestError> {
        let response = self
            .client
            .post(self.endpoint(&["clear_history"]))
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let (status, body) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(http_status_error(status));
        }
        let parsed: ClearResponse = serde_json::from_slice(&body)
            .map_err(|err| RequestError::new(FailureKind::MalformedResponse, err.to_string()))?;
        Ok(parsed.status.as_deref() == Some("success"))
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    ready: VecDeque<Result<ProgressPayload, RequestError>>,
    finished: bool,
}

impl StreamState {
    async fn next_item(mut self) -> Option<(Result<ProgressPayload, RequestError>, Self)> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some((item, self));
            }
            if self.finished {
                return None;
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    for message in self.decoder.push(&chunk) {
                        self.accept(message);
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    self.ready.push_back(Err(map_reqwest_error(err)));
                }
                None => {
                    self.finished = true;
                    if let Some(message) = self.decoder.finish() {
                        self.accept(message);
                    }
                }
            }
        }
    }

    fn accept(&mut self, message: SseMessage) {
        if message.event.as_deref().is_some_and(|event| event != "message") {
            research_debug!("Ignoring stream event type {:?}", message.event);
            return;
        }
        match decode_progress(&message.data) {
            Ok(payload) => self.ready.push_back(Ok(payload)),
            Err(err) => research_warn!("Skipping malformed progress message: {}", err),
        }
    }
}

fn http_status_error(status: StatusCode) -> RequestError {
    RequestError::new(FailureKind::HttpStatus(status.as_u16()), status.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        return RequestError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return RequestError::new(FailureKind::InvalidUrl, err.to_string());
    }
    if err.is_decode() {
        return RequestError::new(FailureKind::MalformedResponse, err.to_string());
    }
    RequestError::new(FailureKind::Network, err.to_string())
}
