use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use toml;

use crate::cache::CacheMode;

/// Catalog entries older than this are refetched in durable cache mode.
pub const DEFAULT_CACHE_TTL_MS: u64 = 3_600_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A mount must be a single path segment; it is stripped together
    /// with the following `/`.
    #[error("mount \"{0}\" must be a non-empty name without '/'")]
    InvalidMount(String),
    #[error("failed to parse options")]
    Parse(
        #[from]
        #[source]
        toml::de::Error,
    ),
}

/// Constructor options for a single [`crate::resolver::Resolver`].
///
/// All fields are optional. Host applications can embed this in their own
/// serde config; `alias`, `expose` and friends deserialize from TOML
/// tables and arrays.
#[derive(Deserialize, Default, Debug, Clone)]
#[serde(default)]
pub struct ResolverOptions {
    /// Enable the durable cache. Off by default: the catalog is then
    /// fetched once per process and kept in memory.
    pub cache: bool,
    /// Durable cache TTL in milliseconds.
    pub cache_ttl: Option<u64>,
    /// Durable cache directory. Defaults to `$HOME/.cache/modelmux`,
    /// falling back to `.cache` when `HOME` is unset.
    pub cache_dir: Option<PathBuf>,
    /// Explicit API key, taking precedence over the environment lookup.
    pub api_key: Option<String>,
    /// Allow-list restricting the catalog by model id or name.
    pub models: Option<Vec<String>>,
    /// Mount prefix. When set, only names of the form `<mount>/<rest>`
    /// are considered.
    pub mount: Option<String>,
    /// Allow-list restricting which resolved names are served at all.
    pub expose: Option<Vec<String>>,
    /// Exact-match name substitutions, applied after mount stripping.
    pub alias: HashMap<String, String>,
    /// Model substituted for the literal name `"default"` on llm requests.
    #[serde(rename = "default")]
    pub default_model: Option<String>,
}

impl ResolverOptions {
    pub fn from_toml(raw: &str) -> Result<ResolverOptions, ConfigError> {
        Ok(toml::de::from_str(raw)?)
    }

    pub(crate) fn cache_mode(&self) -> CacheMode {
        if !self.cache {
            return CacheMode::Memory;
        }

        CacheMode::Durable {
            ttl: Duration::from_millis(self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL_MS)),
            dir: self.cache_dir.clone().unwrap_or_else(default_cache_dir),
        }
    }
}

/// Constructor options for [`crate::aggregator::Aggregator::standard`].
///
/// `cache`, `cache_ttl` and `cache_dir` are shared by every assembled
/// resolver; `api_keys` maps provider names to explicit keys.
#[derive(Deserialize, Default, Debug, Clone)]
#[serde(default)]
pub struct AggregatorOptions {
    pub cache: bool,
    pub cache_ttl: Option<u64>,
    pub cache_dir: Option<PathBuf>,
    #[serde(rename = "default")]
    pub default_model: Option<String>,
    pub api_keys: HashMap<String, String>,
    pub expose: Option<Vec<String>>,
    pub alias: HashMap<String, String>,
}

impl AggregatorOptions {
    pub fn from_toml(raw: &str) -> Result<AggregatorOptions, ConfigError> {
        Ok(toml::de::from_str(raw)?)
    }

    pub(crate) fn resolver_options(&self, provider: &str) -> ResolverOptions {
        ResolverOptions {
            cache: self.cache,
            cache_ttl: self.cache_ttl,
            cache_dir: self.cache_dir.clone(),
            api_key: self.api_keys.get(provider).cloned(),
            ..ResolverOptions::default()
        }
    }
}

fn default_cache_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".cache/modelmux"),
        None => PathBuf::from(".cache"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_use_defaults() {
        let options = ResolverOptions::from_toml("").unwrap();

        assert!(!options.cache);
        assert!(options.mount.is_none());
        assert!(options.alias.is_empty());
        assert!(matches!(options.cache_mode(), CacheMode::Memory));
    }

    #[test]
    fn full_options_parse() {
        let options = ResolverOptions::from_toml(
            r#"
            cache = true
            cache_ttl = 60000
            api_key = "sk-test"
            models = ["m-1", "m-2"]
            mount = "acme"
            expose = ["m-1"]
            default = "m-1"

            [alias]
            fast = "m-2"
            "#,
        )
        .unwrap();

        assert_eq!(options.api_key.as_deref(), Some("sk-test"));
        assert_eq!(options.mount.as_deref(), Some("acme"));
        assert_eq!(options.alias["fast"], "m-2");
        assert_eq!(options.default_model.as_deref(), Some("m-1"));

        match options.cache_mode() {
            CacheMode::Durable { ttl, .. } => assert_eq!(ttl, Duration::from_millis(60000)),
            CacheMode::Memory => panic!("expected durable mode"),
        }
    }

    #[test]
    fn aggregator_options_fan_out_to_resolvers() {
        let options = AggregatorOptions::from_toml(
            r#"
            cache = true
            default = "gpt-4.1-mini"

            [api_keys]
            openai = "sk-openai"
            "#,
        )
        .unwrap();

        let openai = options.resolver_options("openai");
        assert!(openai.cache);
        assert_eq!(openai.api_key.as_deref(), Some("sk-openai"));

        let anthropic = options.resolver_options("anthropic");
        assert!(anthropic.api_key.is_none());
    }

    #[test]
    fn unparsable_options_error() {
        assert!(matches!(
            ResolverOptions::from_toml("cache = \"maybe\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
