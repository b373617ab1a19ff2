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

use crate::Result;
use crate::scopes::Scopes;
// Using tokio's wrapper makes expirations testable without relying on clock times.
use tokio::time::Instant;

/// Represents an auth token.
#[derive(Clone, PartialEq)]
pub struct Token {
    /// The actual token string.
    ///
    /// This is the value used in `Authorization:` header.
    pub token: String,

    /// The type of the token.
    ///
    /// The most common type is `"Bearer"` but other types may appear in the
    /// future.
    pub token_type: String,

    /// The instant at which the token expires.
    ///
    /// If `None`, the token does not expire.
    ///
    /// Note that the `Instant` is not valid across processes. It is
    /// recommended to let the [TokenFetcher] refresh tokens within a process
    /// instead of handling expirations yourself.
    ///
    /// [TokenFetcher]: crate::fetcher::TokenFetcher
    pub expires_at: Option<Instant>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token", &"[censored]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Performs the credential-specific token exchange.
///
/// Implementations do not cache, the [TokenFetcher] does.
///
/// [TokenFetcher]: crate::fetcher::TokenFetcher
#[async_trait::async_trait]
pub(crate) trait TokenProvider: std::fmt::Debug + Send + Sync {
    async fn token(&self, scopes: &Scopes) -> Result<Token>;
}

/// Token responses from the OAuth 2.0 endpoints and the metadata server.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    pub(crate) fn into_token(self, now: Instant) -> Token {
        Token {
            token: self.access_token,
            token_type: self.token_type,
            expires_at: self
                .expires_in
                .map(|secs| now + std::time::Duration::from_secs(secs)),
        }
    }
}
