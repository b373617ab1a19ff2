// Copyright 2024 Google LLC
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

//! Google Cloud Client Libraries for Rust - Application Default Credentials
//!
//! This crate finds the credentials an application should use to call Google
//! Cloud services, and wraps them in a [TokenFetcher][fetcher::TokenFetcher]
//! that an HTTP client layer can call before each request.
//!
//! The search is known as [Application Default Credentials] (ADC). It looks,
//! in order, at:
//!
//! 1. The file named by the `GOOGLE_APPLICATION_CREDENTIALS` environment
//!    variable.
//! 2. The well-known file created by `gcloud auth application-default login`.
//! 3. The [metadata server] available on Google Cloud compute environments.
//!
//! ```no_run
//! # use google_cloud_adc::make_token_fetcher;
//! # tokio_test::block_on(async {
//! let fetcher = make_token_fetcher(
//!     "https://www.googleapis.com/auth/cloud-platform",
//!     None,
//!     None,
//! )
//! .await?;
//! let token = fetcher.token().await?;
//! println!("token type: {}", token.token_type);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials
//! [metadata server]: https://cloud.google.com/compute/docs/metadata/overview

pub mod build_errors;
pub mod errors;

/// Types and functions to work with Google Cloud authentication [Credentials].
///
/// [Credentials]: https://cloud.google.com/docs/authentication#credentials
pub mod credentials;

/// The ordered search for configured credentials.
pub mod discovery;

/// Token caching and single-flight refreshes.
pub mod fetcher;

/// Parses credential files into a typed [CredentialMaterial][material::CredentialMaterial].
pub mod material;

pub mod scopes;

/// Types and functions to work with auth [Tokens].
///
/// [Tokens]: https://cloud.google.com/docs/authentication#token
pub mod token;

pub(crate) mod constants;
pub(crate) mod headers_util;
pub(crate) mod mds;

/// A `Result` alias where the `Err` case is
/// `google_cloud_adc::errors::CredentialsError`.
pub(crate) type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;

use crate::credentials::Credentials;
use crate::discovery::Resolver;
use crate::fetcher::{CacheBackend, CacheConfig, TokenFetcher};
use crate::scopes::Scopes;
use std::sync::Arc;

/// Finds the [Application Default Credentials] for this process.
///
/// This uses the process environment, the local file system, and the real
/// metadata server. Use [Resolver] to replace any of them.
///
/// [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials
pub async fn resolve_credential<S>(scopes: S) -> build_errors::Result<Credentials>
where
    S: Into<Scopes>,
{
    Resolver::new().resolve(scopes).await
}

/// Finds the default credentials and wraps them in a [TokenFetcher].
///
/// If `cache_config` is `None` the fetcher uses [CacheConfig::default()]. If
/// `cache_backend` is `None` the fetcher uses a private in-memory cache.
pub async fn make_token_fetcher<S>(
    scopes: S,
    cache_config: Option<CacheConfig>,
    cache_backend: Option<Arc<dyn CacheBackend>>,
) -> build_errors::Result<TokenFetcher>
where
    S: Into<Scopes>,
{
    Resolver::new()
        .make_token_fetcher(scopes, cache_config, cache_backend)
        .await
}
