use serde_json::{Map, Value};

use crate::{FailureKind, ProgressPayload, RequestError, SourcePayload};

/// Decode one stream message body.
///
/// Only a body that is not a JSON object is an error; individual fields with
/// the wrong type are dropped.
pub fn decode_progress(data: &str) -> Result<ProgressPayload, RequestError> {
    let value: Value = serde_json::from_str(data)
        .map_err(|err| RequestError::new(FailureKind::MalformedResponse, err.to_string()))?;
    let object = value.as_object().ok_or_else(|| {
        RequestError::new(FailureKind::MalformedResponse, "progress message is not an object")
    })?;
    Ok(progress_from_object(object))
}

pub(crate) fn progress_from_object(object: &Map<String, Value>) -> ProgressPayload {
    ProgressPayload {
        phase: string_field(object, "phase"),
        status: string_field(object, "status"),
        progress_pct: object.get("progress_pct").and_then(percent),
        message: string_field(object, "message"),
        sources: object
            .get("sources")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(source_from_value).collect()),
        result: string_field(object, "result"),
        error: string_field(object, "error"),
    }
}

fn source_from_value(value: &Value) -> Option<SourcePayload> {
    let object = value.as_object()?;
    Some(SourcePayload {
        url: string_field(object, "url").unwrap_or_default(),
        title: string_field(object, "title"),
        status: string_field(object, "status"),
        relevance: object.get("relevance").and_then(Value::as_f64),
    })
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}

fn percent(value: &Value) -> Option<u8> {
    let raw = value.as_f64()?;
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}
