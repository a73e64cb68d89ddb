//! Shared helpers for catalog calls and request descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::adapter::{FetchError, ModelRecord, RequestDescriptor};
use crate::chat::ChatPayload;

pub(crate) type Headers = HashMap<String, String>;

pub(crate) fn headers(pairs: &[(&str, String)]) -> Headers {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub(crate) fn json_headers() -> Headers {
    headers(&[("content-type", "application/json".to_string())])
}

pub(crate) fn bearer_headers(key: &str) -> Headers {
    headers(&[
        ("content-type", "application/json".to_string()),
        ("authorization", format!("Bearer {key}")),
    ])
}

/// GET a model catalog and unwrap the provider's list envelope
/// (`data` for OpenAI-shaped APIs, `models` for Gemini).
pub(crate) async fn get_catalog(
    url: Url,
    headers: Headers,
    list_key: &str,
) -> Result<Vec<ModelRecord>, FetchError> {
    let mut request = Client::new().get(url);

    for (name, value) in &headers {
        request = request.header(name, value);
    }

    let response = request
        .send()
        .await
        .map_err(|err| FetchError::Transport(Arc::new(err)))?;

    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("unknown status");
    let body = response
        .text()
        .await
        .map_err(|err| FetchError::Transport(Arc::new(err)))?;

    parse_catalog_response(status.as_u16(), reason, &body, list_key)
}

pub(crate) fn parse_catalog_response(
    status: u16,
    reason: &str,
    body: &str,
    list_key: &str,
) -> Result<Vec<ModelRecord>, FetchError> {
    if !(200..300).contains(&status) {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
                return Err(FetchError::Upstream(message.to_string()));
            }
        }

        return Err(FetchError::Status(status, reason.to_string()));
    }

    let envelope: Value =
        serde_json::from_str(body).map_err(|err| FetchError::Decode(Arc::new(err)))?;

    let list = envelope.get(list_key).cloned().unwrap_or(Value::Null);

    serde_json::from_value(list).map_err(|err| FetchError::Decode(Arc::new(err)))
}

/// Assemble the wire body: the canonical payload with `model` set to the
/// resolved id (a caller-supplied `model` field wins, as in a JS-style
/// spread) and, when the provider honors it, usage reporting on streams.
pub(crate) fn wire_body(
    model_id: &str,
    payload: &ChatPayload,
    stream_usage: bool,
) -> Result<String, serde_json::Error> {
    let mut body = match serde_json::to_value(payload)? {
        Value::Object(map) => map,
        _ => unreachable!("a payload serializes to an object"),
    };

    body.entry("model".to_string())
        .or_insert_with(|| Value::String(model_id.to_string()));

    if stream_usage && payload.stream == Some(true) {
        body.insert(
            "stream_options".to_string(),
            json!({ "include_usage": true }),
        );
    }

    serde_json::to_string(&Value::Object(body))
}

pub(crate) fn post_json(url: impl Into<String>, headers: Headers, body: String) -> RequestDescriptor {
    RequestDescriptor {
        url: url.into(),
        method: "POST".to_string(),
        headers,
        body,
    }
}
