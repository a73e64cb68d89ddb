//! First-match composition of resolvers.
//!
//! An [`Aggregator`] owns an ordered list of resolvers and offers each
//! request to them in turn; the first resolver that does not decline
//! wins. Declines carry no error information, so falling through to the
//! next provider needs no special-casing; a real upstream failure
//! ([`FetchError`]) short-circuits the scan instead.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::adapter::FetchError;
use crate::config::{AggregatorOptions, ConfigError};
use crate::keys::KeySource;
use crate::providers;
use crate::resolver::{RequestKind, Resolution, Resolve, ResolveArgs, Resolver};

pub struct Aggregator {
    resolvers: Vec<Box<dyn Resolve>>,
    default_model: Option<String>,
    alias: HashMap<String, String>,
    expose: Option<HashSet<String>>,
}

impl Aggregator {
    /// Compose resolvers with no aggregator-level name handling.
    pub fn new(resolvers: Vec<Box<dyn Resolve>>) -> Aggregator {
        Aggregator::with_options(resolvers, AggregatorOptions::default())
    }

    pub fn with_options(resolvers: Vec<Box<dyn Resolve>>, options: AggregatorOptions) -> Aggregator {
        Aggregator {
            resolvers,
            default_model: options.default_model,
            alias: options.alias,
            expose: options.expose.map(HashSet::from_iter),
        }
    }

    /// Assemble the standard provider stack: openai, anthropic, gemini,
    /// ollama, in that order, sharing the cache settings and taking
    /// per-provider keys from `api_keys`.
    pub fn standard(options: AggregatorOptions) -> Result<Aggregator, ConfigError> {
        let resolvers: Vec<Box<dyn Resolve>> = vec![
            Box::new(Resolver::new(
                providers::openai::adapter(),
                options.resolver_options("openai"),
            )?),
            Box::new(Resolver::new(
                providers::anthropic::adapter(),
                options.resolver_options("anthropic"),
            )?),
            Box::new(Resolver::new(
                providers::gemini::adapter(),
                options.resolver_options("gemini"),
            )?),
            Box::new(Resolver::new(
                providers::ollama::adapter(),
                options.resolver_options("ollama"),
            )?),
        ];

        Ok(Aggregator::with_options(resolvers, options))
    }

    /// Resolve a name against the composed providers.
    ///
    /// The literal name `"default"` is replaced by the aggregator-level
    /// default model on llm requests (bypassing the expose check, since
    /// the operator configured it explicitly); aliases are applied next,
    /// then the expose allow-list, then the providers are tried in
    /// order.
    pub async fn resolve(
        &self,
        name: &str,
        args: &ResolveArgs,
        keys: &Arc<dyn KeySource>,
    ) -> Result<Resolution, FetchError> {
        if name == "default" && args.kind == RequestKind::Llm {
            if let Some(default) = &self.default_model {
                return self.offer(default, args, keys).await;
            }
        }

        let name = self.alias.get(name).map(String::as_str).unwrap_or(name);

        if let Some(expose) = &self.expose {
            if !expose.contains(name) {
                return Ok(Resolution::Decline);
            }
        }

        self.offer(name, args, keys).await
    }

    async fn offer(
        &self,
        name: &str,
        args: &ResolveArgs,
        keys: &Arc<dyn KeySource>,
    ) -> Result<Resolution, FetchError> {
        for resolver in &self.resolvers {
            match resolver.resolve(name, args, keys).await? {
                Resolution::Decline => continue,
                resolution => return Ok(resolution),
            }
        }

        Ok(Resolution::Decline)
    }
}
