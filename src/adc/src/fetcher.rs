// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A [TokenFetcher] returns cached access tokens, and refreshes them when
//! they expire.
//!
//! Concurrent callers that need the same token share a single exchange with
//! the token endpoint. Failed exchanges are reported to every caller waiting
//! on them, and are never cached.

use crate::Result;
use crate::credentials::Credentials;
use crate::discovery::{Clock, SystemClock};
use crate::headers_util::build_bearer_headers;
use crate::scopes::Scopes;
use crate::token::Token;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use http::HeaderMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time::Instant;

// Refresh tokens slightly before they expire. A request using a token that
// expires in transit fails.
const EXPIRY_SKEW: Duration = Duration::from_secs(10);

// Tokens without an expiration are cached for this long, unless the
// configured ttl is shorter.
const DEFAULT_CACHE_LIFETIME: Duration = Duration::from_secs(300);

/// Configures how a [TokenFetcher] caches tokens.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheConfig {
    /// Caps how long a token stays in the cache.
    ///
    /// If `None`, tokens are cached until shortly before they expire. Tokens
    /// without an expiration are cached for 5 minutes.
    pub ttl: Option<Duration>,

    /// Prepended to every cache key.
    ///
    /// Use different prefixes to keep applications sharing a [CacheBackend]
    /// apart.
    pub key_prefix: String,
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_key_prefix<S: Into<String>>(mut self, key_prefix: S) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }
}

/// A token as stored in a [CacheBackend].
#[derive(Clone, Debug, PartialEq)]
pub struct CachedToken {
    pub token: Token,
    /// When the cache entry expires, this may be earlier than the token
    /// expiration. `None` means the entry never expires, the fetcher never
    /// stores such entries.
    pub expires_at: Option<Instant>,
}

impl CachedToken {
    fn new(token: Token, ttl: Option<Duration>, now: Instant) -> Self {
        let expires_at = match (token.expires_at, ttl) {
            (Some(e), Some(ttl)) => Some(e.min(now + ttl)),
            (None, Some(ttl)) => Some(now + ttl.min(DEFAULT_CACHE_LIFETIME)),
            (Some(e), None) => Some(e),
            (None, None) => Some(now + DEFAULT_CACHE_LIFETIME),
        };
        Self { token, expires_at }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|e| now + EXPIRY_SKEW < e)
    }
}

/// Storage for cached tokens.
///
/// Implementations must replace entries atomically: a `get()` returns either
/// the previous or the new value of a concurrent `put()`.
#[async_trait::async_trait]
pub trait CacheBackend: std::fmt::Debug + Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedToken>;
    async fn put(&self, key: &str, value: CachedToken);
}

/// A [CacheBackend] keeping tokens in the memory of the current process.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Option<CachedToken> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    async fn put(&self, key: &str, value: CachedToken) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Token>>>;

struct Flight {
    id: u64,
    fetch: SharedFetch,
}

type Flights = Mutex<HashMap<String, Flight>>;

/// Returns access tokens for a [Credentials], caching them until they expire.
///
/// The fetcher is cheap to clone, clones share the cache and the in-flight
/// exchanges.
///
/// # Example
/// ```
/// # use google_cloud_adc::credentials::mds;
/// # use google_cloud_adc::fetcher::{CacheConfig, TokenFetcher};
/// # use std::time::Duration;
/// let credentials = mds::Builder::default().build();
/// let fetcher = TokenFetcher::builder(credentials)
///     .with_scopes("https://www.googleapis.com/auth/cloud-platform")
///     .with_cache_config(CacheConfig::default().with_ttl(Duration::from_secs(600)))
///     .build();
/// ```
#[derive(Clone)]
pub struct TokenFetcher {
    credentials: Credentials,
    scopes: Scopes,
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    flights: Arc<Flights>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for TokenFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenFetcher")
            .field("credentials", &self.credentials)
            .field("scopes", &self.scopes)
            .field("config", &self.config)
            .field("backend", &self.backend)
            .finish()
    }
}

/// A builder for [TokenFetcher].
pub struct Builder {
    credentials: Credentials,
    scopes: Option<Scopes>,
    config: CacheConfig,
    backend: Option<Arc<dyn CacheBackend>>,
    clock: Arc<dyn Clock>,
}

impl Builder {
    /// The scopes used by [TokenFetcher::token].
    ///
    /// Defaults to the scopes of the credentials.
    pub fn with_scopes<S: Into<Scopes>>(mut self, scopes: S) -> Self {
        self.scopes = Some(scopes.into());
        self
    }

    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Stores tokens in `backend`.
    ///
    /// Defaults to a new [InMemoryCache], private to this fetcher and its
    /// clones.
    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// The clock used to decide if a cached token is fresh.
    ///
    /// Use the clock of the credentials, their token expirations come from it.
    pub fn with_clock<T: Clock + 'static>(self, clock: T) -> Self {
        self.with_shared_clock(Arc::new(clock))
    }

    pub(crate) fn with_shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> TokenFetcher {
        let scopes = self
            .scopes
            .unwrap_or_else(|| self.credentials.scopes().clone());
        TokenFetcher {
            credentials: self.credentials,
            scopes,
            config: self.config,
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(InMemoryCache::new())),
            clock: self.clock,
            flights: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl TokenFetcher {
    pub fn builder(credentials: Credentials) -> Builder {
        Builder {
            credentials,
            scopes: None,
            config: CacheConfig::default(),
            backend: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns a fresh access token for the configured scopes.
    ///
    /// # Errors
    ///
    /// Returns the error of the token exchange, if one was needed and failed.
    /// Use [CredentialsError::is_retryable] to decide whether to retry.
    ///
    /// [CredentialsError::is_retryable]: crate::errors::CredentialsError::is_retryable
    pub async fn token(&self) -> Result<Token> {
        self.token_with_scopes(&self.scopes).await
    }

    /// Returns a fresh access token for `scopes`.
    ///
    /// Tokens for different scopes are cached, and refreshed, independently.
    pub async fn token_with_scopes(&self, scopes: &Scopes) -> Result<Token> {
        let key = self.cache_key(scopes);
        if let Some(cached) = self.backend.get(&key).await {
            if cached.is_fresh(self.clock.now()) {
                tracing::debug!("token cache hit for {key}");
                return Ok(cached.token);
            }
        }
        tracing::debug!("token cache miss for {key}");
        self.join_flight(key, scopes).await
    }

    /// Returns the headers to attach to a request: the `Authorization` header,
    /// and `x-goog-user-project` if the credentials have a quota project.
    pub async fn headers(&self) -> Result<HeaderMap> {
        let token = self.token().await?;
        let quota_project_id = self.credentials.quota_project_id().map(str::to_string);
        build_bearer_headers(&token, &quota_project_id)
    }

    fn cache_key(&self, scopes: &Scopes) -> String {
        format!(
            "{}{}:{}:{}",
            self.config.key_prefix,
            self.credentials.kind(),
            self.credentials.cache_identity(),
            scopes
        )
    }

    /// Waits on the exchange for `key`, starting one if none is in flight.
    fn join_flight(&self, key: String, scopes: &Scopes) -> SharedFetch {
        let mut flights = self.flights.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(flight) = flights.get(&key) {
            tracing::debug!("joining token exchange in flight for {key}");
            return flight.fetch.clone();
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fetch = self.exchange(key.clone(), scopes.clone(), id).boxed().shared();
        flights.insert(
            key,
            Flight {
                id,
                fetch: fetch.clone(),
            },
        );
        fetch
    }

    // The future only holds a weak reference to the flights, which own it.
    //
    // A caller may miss the cache, then start a new flight after the previous
    // flight for the same key stored its token. The cache is checked again
    // before the exchange.
    fn exchange(
        &self,
        key: String,
        scopes: Scopes,
        id: u64,
    ) -> impl Future<Output = Result<Token>> + Send + 'static {
        let credentials = self.credentials.clone();
        let backend = self.backend.clone();
        let clock = self.clock.clone();
        let ttl = self.config.ttl;
        let flights = Arc::downgrade(&self.flights);
        async move {
            if let Some(cached) = backend.get(&key).await {
                if cached.is_fresh(clock.now()) {
                    tracing::debug!("token for {key} refreshed by a previous exchange");
                    remove_flight(&flights, &key, id);
                    return Ok(cached.token);
                }
            }
            let result = credentials.fetch_token(&scopes).await;
            match &result {
                Ok(token) => {
                    let cached = CachedToken::new(token.clone(), ttl, clock.now());
                    backend.put(&key, cached).await;
                }
                Err(e) => tracing::warn!("token exchange for {key} failed: {e}"),
            }
            remove_flight(&flights, &key, id);
            result
        }
    }
}

fn remove_flight(flights: &Weak<Flights>, key: &str, id: u64) {
    let Some(flights) = flights.upgrade() else {
        return;
    };
    let mut flights = flights.lock().unwrap_or_else(|e| e.into_inner());
    if flights.get(key).is_some_and(|f| f.id == id) {
        flights.remove(key);
    }
}
