//! The fetch engine: scheme dispatch plus the redirect-following loop.
//!
//! `FetchEngine` owns the transport (and through it the connection pool) and
//! the response cache. A fetch classifies the URL once, resolves `file:` and
//! `data:` locally, and for http/https runs the hop loop: cache check,
//! transport call, redirect resolution, conditional cache population.

use crate::cache::{CachePolicy, ResponseCache};
use crate::dns::{DnsResolver, SystemDnsResolver};
use crate::errors::FetchError;
use crate::schemes::{self, SchemeHandler};
use crate::target::RequestTarget;
use crate::transport::HttpTransport;
use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound on TCP connection establishment.
    pub connect_timeout: Duration,
    /// Maximum redirect hops before a fetch is abandoned.
    pub max_redirects: usize,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// File opened when no URL is supplied.
    pub default_file: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(6),
            max_redirects: 10,
            user_agent: concat!("tinyfetch/", env!("CARGO_PKG_VERSION")).to_string(),
            default_file: PathBuf::from("test.html"),
        }
    }
}

/// A fetched resource plus its presentation flag.
#[derive(Debug, Clone)]
pub struct Document {
    pub body: Vec<u8>,
    /// Set when the URL carried a `view-source:` prefix. The engine passes
    /// this through; raw rendering is the presentation layer's business.
    pub view_source: bool,
}

impl Document {
    /// The body decoded as UTF-8, invalid sequences replaced.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Synchronous URL fetching engine.
///
/// One engine instance serves one fetch at a time; the pool and cache it
/// owns live until [`FetchEngine::shutdown`].
pub struct FetchEngine<R: DnsResolver = SystemDnsResolver> {
    config: EngineConfig,
    transport: HttpTransport<R>,
    cache: ResponseCache,
}

impl FetchEngine<SystemDnsResolver> {
    /// Engine with system DNS resolution and default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SystemDnsResolver, EngineConfig::default())
    }
}

impl Default for FetchEngine<SystemDnsResolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DnsResolver> FetchEngine<R> {
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        Self::with_config(resolver, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(resolver: R, config: EngineConfig) -> Self {
        let transport = HttpTransport::new(
            resolver,
            config.connect_timeout,
            config.user_agent.clone(),
        );
        Self {
            config,
            transport,
            cache: ResponseCache::new(),
        }
    }

    /// Overrides the redirect hop bound.
    #[must_use]
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    /// Fetches a URL, or the configured default file when none is given.
    ///
    /// # Errors
    ///
    /// Connect, parse, redirect and URL-classification failures per
    /// [`FetchError`]. File read errors and decompression failures are
    /// recovered into degraded bodies and never surface here.
    pub fn fetch(&self, raw_url: Option<&str>) -> Result<Document, FetchError> {
        let owned_default;
        let raw = match raw_url {
            Some(url) => url,
            None => {
                owned_default = self.default_file_url();
                tracing::info!(url = %owned_default, "no url supplied, opening default file");
                &owned_default
            }
        };

        let (raw, view_source) = schemes::strip_view_source(raw);

        let body = match SchemeHandler::classify(raw)? {
            SchemeHandler::File => schemes::read_file_url(raw),
            SchemeHandler::Data => schemes::decode_data_url(raw)?,
            SchemeHandler::Network => self.fetch_http(raw)?,
        };

        Ok(Document { body, view_source })
    }

    /// The http/https path: cache lookup, transport call, redirect
    /// following, cache population. Every hop re-enters the cache check, so
    /// a cached redirect target short-circuits mid-chain.
    fn fetch_http(&self, raw: &str) -> Result<Vec<u8>, FetchError> {
        let mut url =
            Url::parse(raw).map_err(|err| FetchError::InvalidUrl(format!("{raw}: {err}")))?;
        let mut redirects = 0usize;

        loop {
            if redirects > self.config.max_redirects {
                return Err(FetchError::TooManyRedirects(redirects));
            }

            if let Some(body) = self.cache.get(url.as_str()) {
                tracing::info!(url = %url, "cache hit");
                return Ok(body);
            }

            let target = RequestTarget::from_url(&url)?;
            let outcome = self.transport.request(&target)?;

            if (300..400).contains(&outcome.status) {
                let location = outcome
                    .headers
                    .get("location")
                    .ok_or(FetchError::RedirectMissingLocation(outcome.status))?;
                url = url.join(location).map_err(|err| {
                    FetchError::InvalidLocation(format!("{location}: {err}"))
                })?;
                redirects += 1;
                tracing::info!(status = outcome.status, next = %url, hop = redirects, "redirect");
                continue;
            }

            if outcome.status == 200 {
                let policy = CachePolicy::from_header(outcome.headers.get("cache-control"));
                if policy.no_store {
                    tracing::debug!(url = %url, "no-store, skipping cache");
                } else {
                    self.cache
                        .put(url.as_str().to_string(), outcome.body.clone(), policy.max_age);
                }
            }

            return Ok(outcome.body);
        }
    }

    fn default_file_url(&self) -> String {
        let path = &self.config.default_file;
        let absolute = if path.is_absolute() {
            path.clone()
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        };
        Url::from_file_path(&absolute)
            .map_or_else(|()| format!("file:///{}", absolute.display()), String::from)
    }

    /// Tears the engine down, closing every pooled connection. The cache
    /// needs no teardown beyond dropping.
    pub fn shutdown(&self) {
        self.transport.pool().close_all();
    }
}
