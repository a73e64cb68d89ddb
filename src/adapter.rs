//! The provider adapter: a data-driven description of one upstream API.
//!
//! An [`Adapter`] is a plain configuration record, not a trait object. Each
//! upstream (OpenAI, Anthropic, Gemini, ...) is described by a value naming
//! its credential variable and supplying plain functions for the four
//! operations the resolver needs: fetching the model catalog, optionally
//! pre-filtering names, building the wire request, and transforming
//! messages for provider quirks that must survive a multi-turn
//! conversation. New providers are added by supplying a new record, never a
//! new type.

use std::collections::HashMap;
use std::sync::Arc;

use futures_core::future::BoxFuture;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::chat::{ChatPayload, Message};
use crate::resolver::{MatchMode, ResolveArgs};

/// One entry of a provider's model catalog.
///
/// Provider-reported and opaque beyond `id` and `name`: any other fields
/// ride along in `extra`. `id` defaults to empty on deserialization so
/// providers whose catalog reports only a namespaced `name` can derive it
/// in their fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelRecord {
    pub fn new(id: impl Into<String>) -> ModelRecord {
        ModelRecord {
            id: id.into(),
            name: None,
            extra: Map::new(),
        }
    }

    /// The identifier shown in listings: `id`, falling back to `name`.
    pub fn display_name(&self) -> &str {
        if !self.id.is_empty() {
            &self.id
        } else {
            self.name.as_deref().unwrap_or_default()
        }
    }
}

/// A fully formed, transport-agnostic HTTP request. Executing it is the
/// caller's job.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// A model catalog request failed upstream.
///
/// This is the only error that crosses the resolver boundary: every other
/// negative outcome is a decline. Cloneable so a single in-flight fetch
/// can fan its failure out to every waiter.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The upstream error body supplied a human-readable message; it is
    /// passed through verbatim.
    #[error("{0}")]
    Upstream(String),

    /// The upstream returned a failure status without a usable message.
    #[error("{0} {1}")]
    Status(u16, String),

    /// The request never produced a response.
    #[error("catalog request failed")]
    Transport(#[source] Arc<reqwest::Error>),

    /// The response body violated the expected catalog shape.
    #[error("malformed catalog response")]
    Decode(#[source] Arc<serde_json::Error>),

    /// The configured API base is not a usable URL.
    #[error("invalid api base")]
    InvalidApiBase(
        #[from]
        #[source]
        url::ParseError,
    ),
}

/// A resolved handle failed to produce a request descriptor.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The credential disappeared between resolution and execution.
    #[error("no credential available in {0}")]
    MissingCredential(String),

    #[error("failed to encode request body")]
    Encode(
        #[from]
        #[source]
        serde_json::Error,
    ),

    #[error("invalid api base")]
    InvalidApiBase(
        #[from]
        #[source]
        url::ParseError,
    ),
}

pub type CatalogFuture = BoxFuture<'static, Result<Vec<ModelRecord>, FetchError>>;

/// Fetch the provider's model catalog with the given credential.
pub type FetchCatalog = fn(String) -> CatalogFuture;

/// Build the wire request for one model from an already-prepared payload.
pub type BuildRequest = fn(&ModelRecord, ChatPayload, &str) -> Result<RequestDescriptor, ExecError>;

/// Rewrite one message for a provider quirk.
pub type MessageHook = fn(Message) -> Message;

/// Name-level pre-filter, independent of the catalog.
pub type NameFilter = fn(&str) -> bool;

/// Catalog filter overriding the default exact/regex matching.
pub type CatalogFilter = fn(&[ModelRecord], &str, &ResolveArgs) -> Vec<ModelRecord>;

/// The configuration record describing one upstream provider.
pub struct Adapter {
    /// Stable provider name, used for cache files and listing sources.
    pub name: &'static str,
    /// Environment variable consulted for the credential when no explicit
    /// key is configured.
    pub api_key_env: &'static str,
    pub fetch_catalog: FetchCatalog,
    pub match_name: Option<NameFilter>,
    pub filter_catalog: Option<CatalogFilter>,
    pub build_request: BuildRequest,
    /// Applied to each message during request building, after repair and
    /// comment stripping.
    pub outgoing_message: Option<MessageHook>,
    /// Exposed on the handle for history composition; the inverse of
    /// `outgoing_message`.
    pub incoming_message: Option<MessageHook>,
}

/// Select catalog entries for a resolved name.
///
/// The adapter's `filter_catalog` wins when present. Otherwise `exact`
/// compares ids, `regex` compiles the name as a pattern, and an absent
/// match mode selects nothing: callers opt in to a matching mode.
pub(crate) fn match_catalog(
    adapter: &Adapter,
    models: &[ModelRecord],
    name: &str,
    args: &ResolveArgs,
) -> Vec<ModelRecord> {
    if let Some(filter) = adapter.filter_catalog {
        return filter(models, name, args);
    }

    match args.match_mode {
        Some(MatchMode::Exact) => models.iter().filter(|m| m.id == name).cloned().collect(),
        Some(MatchMode::Regex) => match Regex::new(name) {
            Ok(pattern) => models
                .iter()
                .filter(|m| pattern.is_match(&m.id))
                .cloned()
                .collect(),
            Err(err) => {
                tracing::warn!("model pattern \"{name}\" does not compile: {err}");
                Vec::new()
            }
        },
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::OutputMode;
    use futures_util::FutureExt;

    fn catalog(ids: &[&str]) -> Vec<ModelRecord> {
        ids.iter().map(|id| ModelRecord::new(*id)).collect()
    }

    fn empty_fetch(_credential: String) -> CatalogFuture {
        async { Ok(Vec::new()) }.boxed()
    }

    fn no_request(
        _model: &ModelRecord,
        _payload: ChatPayload,
        _key: &str,
    ) -> Result<RequestDescriptor, ExecError> {
        unimplemented!("matching tests never build requests")
    }

    fn bare_adapter() -> Adapter {
        Adapter {
            name: "test",
            api_key_env: "TEST_KEY",
            fetch_catalog: empty_fetch,
            match_name: None,
            filter_catalog: None,
            build_request: no_request,
            outgoing_message: None,
            incoming_message: None,
        }
    }

    fn args(match_mode: Option<MatchMode>) -> ResolveArgs {
        ResolveArgs {
            match_mode,
            output: OutputMode::First,
            ..ResolveArgs::default()
        }
    }

    #[test]
    fn exact_match_selects_by_id() {
        let models = catalog(&["a", "b", "a"]);

        let matched = match_catalog(&bare_adapter(), &models, "a", &args(Some(MatchMode::Exact)));

        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|m| m.id == "a"));
    }

    #[test]
    fn regex_match_preserves_catalog_order() {
        let models = catalog(&["name-a", "other", "name-b"]);

        let matched = match_catalog(
            &bare_adapter(),
            &models,
            "name.*",
            &args(Some(MatchMode::Regex)),
        );

        let ids: Vec<&str> = matched.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["name-a", "name-b"]);
    }

    #[test]
    fn absent_match_mode_selects_nothing() {
        let models = catalog(&["a"]);

        assert!(match_catalog(&bare_adapter(), &models, "a", &args(None)).is_empty());
    }

    #[test]
    fn uncompilable_pattern_selects_nothing() {
        let models = catalog(&["a"]);

        let matched = match_catalog(&bare_adapter(), &models, "(", &args(Some(MatchMode::Regex)));

        assert!(matched.is_empty());
    }

    #[test]
    fn filter_catalog_overrides_default_matching() {
        fn take_last(models: &[ModelRecord], _name: &str, _args: &ResolveArgs) -> Vec<ModelRecord> {
            models.last().cloned().into_iter().collect()
        }

        let mut adapter = bare_adapter();
        adapter.filter_catalog = Some(take_last);

        let matched = match_catalog(&adapter, &catalog(&["a", "b"]), "ignored", &args(None));

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "b");
    }

    #[test]
    fn record_keeps_provider_fields() {
        let record: ModelRecord = serde_json::from_str(
            r#"{ "id": "m", "context_length": 8192, "owned_by": "acme" }"#,
        )
        .unwrap();

        assert_eq!(record.id, "m");
        assert_eq!(record.extra["context_length"], 8192);
    }

    #[test]
    fn display_name_falls_back_to_name() {
        let record: ModelRecord =
            serde_json::from_str(r#"{ "name": "models/gemini-x" }"#).unwrap();

        assert_eq!(record.display_name(), "models/gemini-x");
    }
}
