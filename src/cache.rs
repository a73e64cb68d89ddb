//! Per-provider model catalog caching.
//!
//! Each resolver owns one [`ModelCache`]. In memory mode the catalog is
//! fetched once per process and kept forever. In durable mode a JSON file
//! per provider backs the memory copy; the file's mtime is the freshness
//! signal and both the file and the memory copy expire after the
//! configured TTL. Concurrent misses collapse into a single in-flight
//! fetch whose result or failure is shared by every waiter.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::Shared;
use futures_util::FutureExt;
use thiserror::Error;

use crate::adapter::{CatalogFuture, FetchCatalog, FetchError, ModelRecord};

#[derive(Debug, Clone)]
pub enum CacheMode {
    /// Fetch once per process, keep in memory indefinitely.
    Memory,
    /// Back the memory copy with a file under `dir`, expiring after `ttl`.
    Durable { ttl: Duration, dir: PathBuf },
}

/// A durable cache entry could not be used. Recovered locally by treating
/// the entry as a miss; never propagated.
#[derive(Debug, Error)]
enum CacheReadError {
    #[error("failed to read cache file")]
    Io(
        #[from]
        #[source]
        std::io::Error,
    ),
    #[error("cache file is not a model catalog")]
    Parse(
        #[from]
        #[source]
        serde_json::Error,
    ),
}

type SharedFetch = Shared<BoxedFetch>;
type BoxedFetch = futures_core::future::BoxFuture<'static, Result<Arc<Vec<ModelRecord>>, FetchError>>;

#[derive(Default)]
struct CacheState {
    models: Option<Arc<Vec<ModelRecord>>>,
    fetched_at: Option<Instant>,
    in_flight: Option<SharedFetch>,
}

pub struct ModelCache {
    provider: String,
    mode: CacheMode,
    fetch: FetchCatalog,
    state: Mutex<CacheState>,
}

impl ModelCache {
    pub fn new(provider: impl Into<String>, fetch: FetchCatalog, mode: CacheMode) -> ModelCache {
        ModelCache {
            provider: provider.into(),
            mode,
            fetch,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Return the provider's catalog, fetching it if necessary.
    ///
    /// Fails with [`FetchError`] only when an upstream fetch fails; cache
    /// corruption is logged and refetched.
    pub async fn get_models(&self, credential: &str) -> Result<Arc<Vec<ModelRecord>>, FetchError> {
        let fut = {
            let mut state = self.state.lock().expect("cache state poisoned");

            if let (Some(models), Some(fetched_at)) = (&state.models, state.fetched_at) {
                if self.fresh(fetched_at) {
                    return Ok(Arc::clone(models));
                }
            }

            if let Some(in_flight) = &state.in_flight {
                in_flight.clone()
            } else {
                if let CacheMode::Durable { ttl, dir } = &self.mode {
                    match read_durable(&durable_file(dir, &self.provider), *ttl) {
                        Ok(Some(models)) => {
                            let models = Arc::new(models);
                            state.models = Some(Arc::clone(&models));
                            state.fetched_at = Some(Instant::now());
                            return Ok(models);
                        }
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(
                                "discarding unreadable model cache for {}: {err}",
                                self.provider
                            );
                        }
                    }
                }

                let fut = start_fetch(self.fetch, credential.to_string(), self.persist_target());
                state.in_flight = Some(fut.clone());
                fut
            }
        };

        let result = fut.await;

        let mut state = self.state.lock().expect("cache state poisoned");
        state.in_flight = None;

        let models = result?;
        state.models = Some(Arc::clone(&models));
        state.fetched_at = Some(Instant::now());

        Ok(models)
    }

    fn fresh(&self, fetched_at: Instant) -> bool {
        match &self.mode {
            CacheMode::Memory => true,
            CacheMode::Durable { ttl, .. } => fetched_at.elapsed() < *ttl,
        }
    }

    fn persist_target(&self) -> Option<PathBuf> {
        match &self.mode {
            CacheMode::Memory => None,
            CacheMode::Durable { dir, .. } => Some(durable_file(dir, &self.provider)),
        }
    }
}

fn durable_file(dir: &Path, provider: &str) -> PathBuf {
    dir.join(format!("{provider}_models.json"))
}

fn start_fetch(fetch: FetchCatalog, credential: String, persist: Option<PathBuf>) -> SharedFetch {
    let fut: CatalogFuture = fetch(credential);

    async move {
        let models = fut.await?;

        if let Some(path) = persist {
            if let Err(err) = write_durable(&path, &models) {
                tracing::warn!("failed to persist model cache to {}: {err}", path.display());
            }
        }

        Ok(Arc::new(models))
    }
    .boxed()
    .shared()
}

fn read_durable(file: &Path, ttl: Duration) -> Result<Option<Vec<ModelRecord>>, CacheReadError> {
    if !file.exists() {
        return Ok(None);
    }

    let modified = fs::metadata(file)?.modified()?;
    let age = modified.elapsed().unwrap_or(Duration::ZERO);

    if age >= ttl {
        return Ok(None);
    }

    let raw = fs::read_to_string(file)?;
    let models = serde_json::from_str(&raw)?;

    Ok(Some(models))
}

fn write_durable(file: &Path, models: &[ModelRecord]) -> std::io::Result<()> {
    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)?;
    }

    let raw = serde_json::to_string_pretty(models)?;

    fs::write(file, raw)
}
