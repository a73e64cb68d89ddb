//! The Ollama provider.
//!
//! Ollama has no API key: the "credential" is the API base URL itself
//! (`OLLAMA_URL`), so a reachable server is configured exactly like a
//! key would be, and an unset variable makes the resolver decline.

use futures_util::FutureExt;
use url::Url;

use super::wire;
use crate::adapter::{Adapter, CatalogFuture, ExecError, ModelRecord, RequestDescriptor};
use crate::chat::ChatPayload;

pub const API_KEY_ENV: &str = "OLLAMA_URL";

pub fn adapter() -> Adapter {
    Adapter {
        name: "ollama",
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
        let url = Url::parse(&credential)?.join("/v1/models")?;

        wire::get_catalog(url, wire::json_headers(), "data").await
    }
    .boxed()
}

fn build_request(
    model: &ModelRecord,
    payload: ChatPayload,
    api_base: &str,
) -> Result<RequestDescriptor, ExecError> {
    let url = Url::parse(api_base)?.join("/v1/chat/completions")?;
    let body = wire::wire_body(&model.id, &payload, false)?;

    Ok(wire::post_json(url.to_string(), wire::json_headers(), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{Message, Role};
    use serde_json::Value;

    #[test]
    fn chat_url_derives_from_the_credential() {
        let payload = ChatPayload::from_messages(vec![Message::new(Role::User, "hi")]);

        let descriptor =
            build_request(&ModelRecord::new("llama3"), payload, "http://localhost:11434")
                .unwrap();

        assert_eq!(descriptor.url, "http://localhost:11434/v1/chat/completions");
        assert!(descriptor.headers.get("authorization").is_none());
    }

    #[test]
    fn streaming_payloads_carry_no_usage_option() {
        let mut payload = ChatPayload::from_messages(vec![Message::new(Role::User, "hi")]);
        payload.stream = Some(true);

        let descriptor =
            build_request(&ModelRecord::new("llama3"), payload, "http://localhost:11434")
                .unwrap();

        let body: Value = serde_json::from_str(&descriptor.body).unwrap();
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn an_unparsable_api_base_fails_request_building() {
        let result = build_request(
            &ModelRecord::new("llama3"),
            ChatPayload::default(),
            "not a url",
        );

        assert!(matches!(result, Err(ExecError::InvalidApiBase(_))));
    }
}
