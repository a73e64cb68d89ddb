//! Adapter definitions for the supported upstream providers.
//!
//! Each provider is a plain [`crate::adapter::Adapter`] value built by its
//! module's `adapter()` function: configuration, not subclassing. The
//! four shipped providers cover the corners of the abstraction:
//!
//! - [`openai`]: bearer-token catalog and chat calls, models under `data`.
//! - [`anthropic`]: same wire shape, but the catalog call authenticates
//!   with `x-api-key` and a pinned `anthropic-version`.
//! - [`gemini`]: key-in-query catalog URL, models under `models` with
//!   namespaced `models/<id>` names, null content rewritten to `[]`, and
//!   a per-tool-call thought signature that must round-trip between the
//!   arguments document and an `extra_content` side channel.
//! - [`ollama`]: the credential is the API base URL itself; the catalog
//!   call carries no authentication.
//!
//! ## Error Handling
//!
//! Catalog calls fail with [`crate::adapter::FetchError`]. When the
//! upstream error body carries a human-readable `error.message`, it is
//! propagated verbatim; otherwise the status line stands in.

pub(crate) mod wire;

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
