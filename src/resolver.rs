//! Name resolution: from a logical model name to a provider handle.
//!
//! A [`Resolver`] wraps one [`Adapter`] with the name-resolution pipeline.
//! Given `(name, args)` it either declines (this resolver has no opinion,
//! and an aggregator is free to try the next one) or produces a
//! [`Resolution`]: a single executable [`ModelHandle`], or a listing of
//! every matching model. The pipeline, in order:
//!
//! 1. decline unless the request type is `llm` or `any`;
//! 2. decline names shaped like environment variables (`^[A-Z_0-9]+$`,
//!    reserved for key references);
//! 3. require and strip the mount prefix, when one is configured;
//! 4. substitute the configured default model for the literal name
//!    `"default"` on llm requests;
//! 5. apply alias substitution (exact key match);
//! 6. consult the adapter's name pre-filter;
//! 7. enforce the expose allow-list;
//! 8. resolve the credential (explicit key, else the key source);
//!    no credential means decline, not failure;
//! 9. fetch the catalog through the cache (the one hard-failure point);
//! 10. restrict to the configured model allow-list;
//! 11. match the name against the catalog;
//! 12. return the first candidate as a handle, or all of them as a
//!     listing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::adapter::{
    self, Adapter, BuildRequest, ExecError, FetchError, MessageHook, ModelRecord,
    RequestDescriptor,
};
use crate::cache::ModelCache;
use crate::chat::{ChatPayload, Message, Role};
use crate::config::{ConfigError, ResolverOptions};
use crate::keys::KeySource;
use crate::repair::auto_fix_messages;

lazy_static! {
    // Names of this shape are key references, never model names.
    static ref ENV_TOKEN: Regex = Regex::new("^[A-Z_0-9]+$").expect("static pattern compiles");
}

/// The resource class of a resolution request.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Default,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum RequestKind {
    Llm,
    #[default]
    Any,
    /// Any other resource class; resolvers here serve none of them.
    #[strum(default)]
    Other(String),
}

/// How a resolved name is matched against the catalog.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum MatchMode {
    /// The name must equal a catalog id.
    Exact,
    /// The name compiles to a pattern tested against catalog ids.
    Regex,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum OutputMode {
    /// Return a handle for the first candidate in catalog order.
    #[default]
    First,
    /// Return a listing entry for every candidate.
    All,
}

/// Arguments accompanying a resolution request.
#[derive(Debug, Clone, Default)]
pub struct ResolveArgs {
    pub kind: RequestKind,
    /// Catalog matching mode. `None` matches nothing: callers opt in to
    /// a matching mode.
    pub match_mode: Option<MatchMode>,
    pub output: OutputMode,
}

impl ResolveArgs {
    pub fn llm() -> ResolveArgs {
        ResolveArgs {
            kind: RequestKind::Llm,
            ..ResolveArgs::default()
        }
    }

    pub fn exact(mut self) -> ResolveArgs {
        self.match_mode = Some(MatchMode::Exact);
        self
    }

    pub fn regex(mut self) -> ResolveArgs {
        self.match_mode = Some(MatchMode::Regex);
        self
    }

    pub fn listing(mut self) -> ResolveArgs {
        self.output = OutputMode::All;
        self
    }
}

/// One row of a listing-mode result.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub kind: RequestKind,
    /// The provider that serves this model.
    pub source: String,
    /// Model name, qualified with the mount prefix when one is
    /// configured.
    pub name: String,
}

/// The outcome of offering a request to a resolver.
#[derive(Debug)]
pub enum Resolution {
    /// This resolver has no opinion; try the next one.
    Decline,
    Handle(ModelHandle),
    Listing(Vec<ListingEntry>),
}

impl Resolution {
    pub fn is_decline(&self) -> bool {
        matches!(self, Resolution::Decline)
    }
}

/// A resolved model, bound to its provider and credential lookup.
///
/// `exec` may be called any number of times and re-resolves the
/// credential on each call, so keys rotated after resolution are picked
/// up.
pub struct ModelHandle {
    source: String,
    model: ModelRecord,
    api_key_env: String,
    explicit_key: Option<String>,
    keys: Arc<dyn KeySource>,
    build_request: BuildRequest,
    outgoing_message: Option<MessageHook>,
    incoming_message: Option<MessageHook>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("source", &self.source)
            .field("model", &self.model.id)
            .finish()
    }
}

impl ModelHandle {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn model(&self) -> &ModelRecord {
        &self.model
    }

    /// Build the wire request for a canonical payload.
    ///
    /// Runs the dispatch pipeline: message repair, comment stripping,
    /// the provider's outgoing quirk hook, then the adapter's request
    /// builder.
    pub fn exec(&self, payload: ChatPayload) -> Result<RequestDescriptor, ExecError> {
        let key = self
            .explicit_key
            .clone()
            .or_else(|| self.keys.read(&self.api_key_env))
            .ok_or_else(|| ExecError::MissingCredential(self.api_key_env.clone()))?;

        let mut messages = auto_fix_messages(&payload.messages);
        messages.retain(|msg| msg.role != Role::Comment);

        if let Some(hook) = self.outgoing_message {
            messages = messages.into_iter().map(hook).collect();
        }

        let payload = ChatPayload { messages, ..payload };

        (self.build_request)(&self.model, payload, &key)
    }

    /// Apply the provider's history-composition hook to a message
    /// received from upstream, so provider quirks survive the next turn.
    pub fn transform_incoming(&self, message: Message) -> Message {
        match self.incoming_message {
            Some(hook) => hook(message),
            None => message,
        }
    }
}

/// The interface an aggregator dispatches over.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Stable provider name.
    fn source(&self) -> &str;

    /// Offer a request to this resolver.
    ///
    /// `Ok(Resolution::Decline)` means "not mine"; an `Err` is a real
    /// upstream failure and the only hard error this can produce.
    async fn resolve(
        &self,
        name: &str,
        args: &ResolveArgs,
        keys: &Arc<dyn KeySource>,
    ) -> Result<Resolution, FetchError>;
}

pub struct Resolver {
    adapter: Adapter,
    cache: ModelCache,
    api_key: Option<String>,
    allowed_models: Option<HashSet<String>>,
    mount: Option<String>,
    expose: Option<HashSet<String>>,
    alias: HashMap<String, String>,
    default_model: Option<String>,
}

impl Resolver {
    pub fn new(adapter: Adapter, options: ResolverOptions) -> Result<Resolver, ConfigError> {
        if let Some(mount) = &options.mount {
            if mount.is_empty() || mount.contains('/') {
                return Err(ConfigError::InvalidMount(mount.clone()));
            }
        }

        let cache = ModelCache::new(adapter.name, adapter.fetch_catalog, options.cache_mode());

        // An empty model allow-list means "no restriction".
        let allowed_models = options
            .models
            .filter(|models| !models.is_empty())
            .map(HashSet::from_iter);

        Ok(Resolver {
            cache,
            api_key: options.api_key,
            allowed_models,
            mount: options.mount,
            expose: options.expose.map(HashSet::from_iter),
            alias: options.alias,
            default_model: options.default_model,
            adapter,
        })
    }

    fn listing(&self, matched: Vec<ModelRecord>) -> Vec<ListingEntry> {
        matched
            .iter()
            .map(|model| ListingEntry {
                kind: RequestKind::Llm,
                source: self.adapter.name.to_string(),
                name: match &self.mount {
                    Some(mount) => format!("{}/{}", mount, model.display_name()),
                    None => model.display_name().to_string(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl Resolve for Resolver {
    fn source(&self) -> &str {
        self.adapter.name
    }

    async fn resolve(
        &self,
        name: &str,
        args: &ResolveArgs,
        keys: &Arc<dyn KeySource>,
    ) -> Result<Resolution, FetchError> {
        if args.kind != RequestKind::Llm && args.kind != RequestKind::Any {
            return Ok(Resolution::Decline);
        }

        if ENV_TOKEN.is_match(name) {
            return Ok(Resolution::Decline);
        }

        let mut name = match &self.mount {
            Some(mount) => match name
                .strip_prefix(mount.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
            {
                Some(rest) => rest,
                None => return Ok(Resolution::Decline),
            },
            None => name,
        };

        if name == "default" && args.kind == RequestKind::Llm {
            if let Some(default) = &self.default_model {
                name = default;
            }
        }

        if let Some(target) = self.alias.get(name) {
            name = target;
        }

        if let Some(match_name) = self.adapter.match_name {
            if !match_name(name) {
                return Ok(Resolution::Decline);
            }
        }

        if let Some(expose) = &self.expose {
            if !expose.contains(name) {
                return Ok(Resolution::Decline);
            }
        }

        let credential = match &self.api_key {
            Some(key) => Some(key.clone()),
            None => keys.read(self.adapter.api_key_env),
        };

        let credential = match credential {
            Some(credential) => credential,
            None => return Ok(Resolution::Decline),
        };

        let models = self.cache.get_models(&credential).await?;

        let models: Vec<ModelRecord> = match &self.allowed_models {
            Some(allowed) => models
                .iter()
                .filter(|model| {
                    allowed.contains(&model.id)
                        || model
                            .name
                            .as_ref()
                            .map_or(false, |name| allowed.contains(name))
                })
                .cloned()
                .collect(),
            None => models.to_vec(),
        };

        let mut matched = adapter::match_catalog(&self.adapter, &models, name, args);

        if matched.is_empty() {
            return Ok(Resolution::Decline);
        }

        if args.output == OutputMode::All {
            return Ok(Resolution::Listing(self.listing(matched)));
        }

        let model = matched.swap_remove(0);

        Ok(Resolution::Handle(ModelHandle {
            source: self.adapter.name.to_string(),
            model,
            api_key_env: self.adapter.api_key_env.to_string(),
            explicit_key: self.api_key.clone(),
            keys: Arc::clone(keys),
            build_request: self.adapter.build_request,
            outgoing_message: self.adapter.outgoing_message,
            incoming_message: self.adapter.incoming_message,
        }))
    }
}
