//! Media resolution: turns a row's media reference into embeddable bytes.
//!
//! Remote references are downloaded with a bounded number of attempts and a
//! linearly growing pause between them; local references are read relative to
//! the base directory. Everything that resolves goes through the
//! [`ResourceCache`], so a reference is fetched or read at most once per run.

use crate::cache::{DirStore, ResourceCache};
use crate::config::{Config, FetchConfig};
use crate::error::{FetchError, ResolveError};
use crate::types::MediaReference;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One HTTP GET, without retries.
pub trait Fetch {
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP transport with a fixed timeout and browser-like user agent.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

/// Attempt budget and pause schedule for downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Never zero.
    pub max_attempts: u32,

    /// Pause after the first failed attempt; attempt `n` is followed by `n × base_delay`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay())
    }

    /// Pause after the failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Bytes plus the advisory MIME type they will be embedded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedResource {
    pub mime: &'static str,
    pub bytes: Arc<[u8]>,
}

impl EmbeddedResource {
    /// Wrap bytes resolved for `reference`, guessing the MIME type from its extension.
    pub fn new(reference: &str, bytes: Arc<[u8]>) -> Self {
        Self {
            mime: mime_for_reference(reference),
            bytes,
        }
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Guess an image MIME type from the extension of a path or URL.
///
/// Query strings and fragments are ignored. Unknown or missing extensions
/// fall back to JPEG; the bytes themselves are never inspected.
pub fn mime_for_reference(reference: &str) -> &'static str {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "image/jpeg",
    }
}

/// Resolves media references into embeddable resources.
pub struct ResourceResolver {
    base_dir: PathBuf,
    cache: ResourceCache,
    fetcher: Box<dyn Fetch>,
    retry: RetryPolicy,
    sleep: Box<dyn Fn(Duration)>,
}

impl ResourceResolver {
    /// Create a resolver. Local references resolve against `base_dir`.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        cache: ResourceCache,
        fetcher: Box<dyn Fetch>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache,
            fetcher,
            retry,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Resolver wired from configuration: HTTP transport and either an
    /// in-memory or a directory-backed cache.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = if config.cache.persist {
            ResourceCache::new(Box::new(DirStore::open(config.resource_dir_path())?))
        } else {
            ResourceCache::in_memory()
        };

        Ok(Self::new(
            config.base_dir.clone(),
            cache,
            Box::new(HttpFetcher::new(&config.fetch)?),
            RetryPolicy::from_config(&config.fetch),
        ))
    }

    /// Replace the function used to pause between attempts.
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Resolve `reference` for the row at `row_index` (0-based).
    ///
    /// An empty reference resolves to `Ok(None)`.
    pub fn resolve(
        &mut self,
        reference: &str,
        row_index: usize,
    ) -> std::result::Result<Option<EmbeddedResource>, ResolveError> {
        let reference = reference.trim();
        let kind = MediaReference::classify(reference);
        if kind == MediaReference::Empty {
            return Ok(None);
        }

        if let Some(bytes) = self.cache.get(reference) {
            log::debug!("Row {}: cache hit for {}", row_index + 1, reference);
            return Ok(Some(EmbeddedResource::new(reference, bytes)));
        }

        let bytes: Arc<[u8]> = match kind {
            MediaReference::Empty => return Ok(None),
            MediaReference::Remote(url) => self.download(url, row_index)?.into(),
            MediaReference::Local(path) => self.read_local(path, row_index)?.into(),
        };

        self.cache.insert(reference, bytes.clone());
        Ok(Some(EmbeddedResource::new(reference, bytes)))
    }

    fn download(
        &self,
        url: &str,
        row_index: usize,
    ) -> std::result::Result<Vec<u8>, ResolveError> {
        let max = self.retry.max_attempts;
        let mut attempt = 1;

        loop {
            log::debug!("Row {}: GET {} (attempt {}/{})", row_index + 1, url, attempt, max);

            match self.fetcher.fetch(url) {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < max => {
                    let delay = self.retry.delay_after(attempt);
                    log::warn!(
                        "Row {}: attempt {}/{} for {} failed ({}), retrying in {:?}",
                        row_index + 1,
                        attempt,
                        max,
                        url,
                        e,
                        delay
                    );
                    (self.sleep)(delay);
                    attempt += 1;
                }
                Err(e) => {
                    log::warn!(
                        "Row {}: failed to download {} after {} attempt(s): {}",
                        row_index + 1,
                        url,
                        attempt,
                        e
                    );
                    return Err(ResolveError::RetriesExhausted {
                        reference: url.to_string(),
                        attempts: attempt,
                        last_error: e,
                    });
                }
            }
        }
    }

    fn read_local(
        &self,
        reference: &str,
        row_index: usize,
    ) -> std::result::Result<Vec<u8>, ResolveError> {
        let path = Path::new(reference);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };

        if !path.exists() {
            log::warn!("Row {}: image not found: {}", row_index + 1, path.display());
            return Err(ResolveError::NotFound(path));
        }

        std::fs::read(&path).map_err(|e| ResolveError::Unreadable {
            path,
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for ResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver")
            .field("base_dir", &self.base_dir)
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .finish()
    }
}
