//! The Gemini provider.
//!
//! Gemini attaches an opaque "thought signature" to assistant tool
//! calls. It arrives in an `extra_content.google.thought_signature` side
//! channel, must live inside the tool call's JSON-encoded arguments
//! while the conversation is held in canonical form, and must move back
//! to the side channel on the way out so the argument payload sent
//! upstream does not leak it. Both moves share one pair of transforms
//! over the arguments sub-document, so the signature round-trips
//! losslessly across turns.

use futures_util::FutureExt;
use serde_json::{json, Value};
use url::Url;

use super::wire;
use crate::adapter::{Adapter, CatalogFuture, ExecError, ModelRecord, RequestDescriptor};
use crate::chat::{ChatPayload, Message, ToolCall};

const MODELS_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const CHAT_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";

/// Key carrying the signature inside the arguments document.
const SIGNATURE_KEY: &str = "google_thought_signature";

pub const API_KEY_ENV: &str = "GEMINI_KEY";

pub fn adapter() -> Adapter {
    Adapter {
        name: "gemini",
        api_key_env: API_KEY_ENV,
        fetch_catalog,
        match_name: None,
        filter_catalog: None,
        build_request,
        outgoing_message: Some(extract_signatures),
        incoming_message: Some(embed_signatures),
    }
}

fn fetch_catalog(credential: String) -> CatalogFuture {
    async move {
        let url = Url::parse_with_params(
            MODELS_URL,
            &[("key", credential.as_str()), ("pageSize", "200")],
        )?;

        let mut models = wire::get_catalog(url, wire::json_headers(), "models").await?;

        // The catalog reports namespaced names ("models/gemini-..."); the
        // short id is what callers match against.
        for model in &mut models {
            if model.id.is_empty() {
                if let Some(name) = &model.name {
                    model.id = short_id(name).to_string();
                }
            }
        }

        Ok(models)
    }
    .boxed()
}

fn short_id(name: &str) -> &str {
    name.split_once('/').map(|(_, rest)| rest).unwrap_or(name)
}

fn build_request(
    model: &ModelRecord,
    payload: ChatPayload,
    key: &str,
) -> Result<RequestDescriptor, ExecError> {
    let mut payload = payload;

    // The API rejects null content.
    for message in &mut payload.messages {
        if message.content.is_null() {
            message.content = Value::Array(Vec::new());
        }
    }

    let body = wire::wire_body(&model.id, &payload, true)?;

    Ok(wire::post_json(CHAT_URL, wire::bearer_headers(key), body))
}

/// Outgoing direction: move the signature out of each tool call's
/// arguments into the side channel.
fn extract_signatures(mut message: Message) -> Message {
    for call in &mut message.tool_calls {
        signature_to_side_channel(call);
    }

    message
}

/// Incoming direction: move the side-channel signature back into the
/// arguments, so a later turn that resends the call still carries it.
fn embed_signatures(mut message: Message) -> Message {
    for call in &mut message.tool_calls {
        signature_into_arguments(call);
    }

    message
}

fn signature_to_side_channel(call: &mut ToolCall) {
    let mut arguments = match parse_arguments(call) {
        Some(arguments) => arguments,
        None => return,
    };

    let signature = match arguments.remove(SIGNATURE_KEY) {
        Some(signature) => signature,
        None => return,
    };

    call.function.arguments = encode_arguments(arguments);
    call.extra_content = Some(json!({ "google": { "thought_signature": signature } }));
}

fn signature_into_arguments(call: &mut ToolCall) {
    let signature = match call
        .extra_content
        .as_ref()
        .and_then(|extra| extra.pointer("/google/thought_signature"))
    {
        Some(signature) => signature.clone(),
        None => return,
    };

    let mut arguments = match parse_arguments(call) {
        Some(arguments) => arguments,
        None => return,
    };

    arguments.insert(SIGNATURE_KEY.to_string(), signature);
    call.function.arguments = encode_arguments(arguments);
}

fn parse_arguments(call: &ToolCall) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str(&call.function.arguments) {
        Ok(Value::Object(arguments)) => Some(arguments),
        _ => {
            tracing::debug!(
                "tool call {} arguments are not a JSON object; leaving them as-is",
                call.id
            );
            None
        }
    }
}

fn encode_arguments(arguments: serde_json::Map<String, Value>) -> String {
    serde_json::to_string(&Value::Object(arguments)).expect("a JSON value serializes")
}
