use std::path::PathBuf;
use std::sync::Arc;

use crate::app::Result;
use crate::cache::CacheStore;
use crate::config::Config;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::Fetcher;
use crate::queue::FetchQueue;

/// Wires configuration, cache, HTTP client and queue together.
pub struct AppContext {
    pub config: Config,
    pub cache: Arc<CacheStore>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let cache_dir = config.cache_directory()?;
        Self::with_cache_dir(config, cache_dir)
    }

    pub fn with_cache_dir(config: Config, cache_dir: PathBuf) -> Result<Self> {
        let cache = Arc::new(CacheStore::open(&cache_dir, config.cache_max_files)?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::with_options(config.timeout(), &config.user_agent)?);

        Ok(Self {
            config,
            cache,
            fetcher,
        })
    }

    /// Starts a queue on the current tokio runtime.
    pub fn queue<R: Send + 'static>(&self) -> FetchQueue<R> {
        FetchQueue::spawn(self.cache.clone(), self.fetcher.clone(), self.config.workers)
    }
}
