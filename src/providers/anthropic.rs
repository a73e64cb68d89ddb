//! The Anthropic provider.
//!
//! Chat requests go through Anthropic's OpenAI-compatible endpoint; only
//! the catalog call uses the native `x-api-key` authentication.

use futures_util::FutureExt;
use url::Url;

use super::wire;
use crate::adapter::{Adapter, CatalogFuture, ExecError, ModelRecord, RequestDescriptor};
use crate::chat::ChatPayload;

const MODELS_URL: &str = "https://api.anthropic.com/v1/models";
const CHAT_URL: &str = "https://api.anthropic.com/v1/chat/completions";
const API_VERSION: &str = "2023-06-01";

pub const API_KEY_ENV: &str = "ANTHROPIC_KEY";

pub fn adapter() -> Adapter {
    Adapter {
        name: "anthropic",
        api_key_env: API_KEY_ENV,
        fetch_catalog,
        match_name: None,
        filter_catalog: None,
        build_request,
        outgoing_message: None,
        incoming_message: None,
    }
}

fn fetch_catalog(credential: String) -> CatalogFuture {
    async move {
        let url = Url::parse(MODELS_URL)?;
        let headers = wire::headers(&[
            ("x-api-key", credential),
            ("anthropic-version", API_VERSION.to_string()),
        ]);

        wire::get_catalog(url, headers, "data").await
    }
    .boxed()
}

fn build_request(
    model: &ModelRecord,
    payload: ChatPayload,
    key: &str,
) -> Result<RequestDescriptor, ExecError> {
    let body = wire::wire_body(&model.id, &payload, true)?;

    Ok(wire::post_json(CHAT_URL, wire::bearer_headers(key), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{Message, Role};
    use serde_json::Value;

    #[test]
    fn chat_requests_use_the_compat_endpoint() {
        let payload = ChatPayload::from_messages(vec![Message::new(Role::User, "hi")]);

        let descriptor =
            build_request(&ModelRecord::new("claude-sonnet"), payload, "sk-ant").unwrap();

        assert_eq!(descriptor.url, CHAT_URL);
        assert_eq!(descriptor.headers["authorization"], "Bearer sk-ant");

        let body: Value = serde_json::from_str(&descriptor.body).unwrap();
        assert_eq!(body["model"], "claude-sonnet");
    }
}
