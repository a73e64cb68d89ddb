//! The OpenAI provider.

use futures_util::FutureExt;
use url::Url;

use super::wire;
use crate::adapter::{Adapter, CatalogFuture, ExecError, ModelRecord, RequestDescriptor};
use crate::chat::ChatPayload;

const MODELS_URL: &str = "https://api.openai.com/v1/models";
const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const API_KEY_ENV: &str = "OPENAI_KEY";

pub fn adapter() -> Adapter {
    Adapter {
        name: "openai",
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

        wire::get_catalog(url, wire::bearer_headers(&credential), "data").await
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
