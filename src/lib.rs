//! Routing and request building for chat models.
//!
//! modelmux lets a hosting application address "a chat model" by a
//! logical name without knowing which upstream provider serves it. A
//! [`Resolver`] wraps one provider [`Adapter`] with name resolution
//! (mount prefixes, aliases, allow-lists, exact/regex catalog matching)
//! and a per-provider catalog cache; an [`Aggregator`] composes
//! resolvers in order and the first one that claims a name wins. The
//! result of a resolution is a [`ModelHandle`] whose `exec` repairs the
//! message history, applies provider quirks, and emits a transport-
//! agnostic [`RequestDescriptor`]. Executing the request is the
//! caller's job.
//!
//! ```no_run
//! use std::sync::Arc;
//! use modelmux::{Aggregator, AggregatorOptions, EnvKeySource, KeySource, ResolveArgs, Resolution};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let aggregator = Aggregator::standard(AggregatorOptions::default())?;
//! let keys: Arc<dyn KeySource> = Arc::new(EnvKeySource);
//!
//! if let Resolution::Handle(handle) =
//!     aggregator.resolve("gpt-4.1-mini", &ResolveArgs::llm().exact(), &keys).await?
//! {
//!     let request = handle.exec(Default::default())?;
//!     println!("{} {}", request.method, request.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod aggregator;
pub mod cache;
pub mod chat;
pub mod config;
pub mod keys;
pub mod providers;
pub mod repair;
pub mod resolver;

pub use adapter::{Adapter, ExecError, FetchError, ModelRecord, RequestDescriptor};
pub use aggregator::Aggregator;
pub use cache::{CacheMode, ModelCache};
pub use chat::{ChatPayload, FunctionCall, Message, Role, ToolCall};
pub use config::{AggregatorOptions, ConfigError, ResolverOptions};
pub use keys::{EnvKeySource, KeySource, MapKeySource};
pub use repair::auto_fix_messages;
pub use resolver::{
    ListingEntry, MatchMode, ModelHandle, OutputMode, RequestKind, Resolution, Resolve,
    ResolveArgs, Resolver,
};
