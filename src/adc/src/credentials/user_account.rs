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

//! [User Account] Credentials type.
//!
//! User accounts represent a developer, administrator, or any other person
//! who interacts with Google APIs and services. The credentials hold an
//! OAuth 2.0 refresh token, exchanged for access tokens as needed.
//!
//! These credentials are typically created by running
//! `gcloud auth application-default login`.
//!
//! [User Account]: https://cloud.google.com/docs/authentication#user-accounts

use crate::Result;
use crate::build_errors::{Error as BuildError, Result as BuildResult};
use crate::constants::{OAUTH2_TOKEN_ENDPOINT, REFRESH_TOKEN_GRANT_TYPE};
use crate::credentials::{CredentialKind, Credentials};
use crate::discovery::{Clock, SystemClock};
use crate::errors::{self, CredentialsError};
use crate::scopes::Scopes;
use crate::token::{Token, TokenProvider, TokenResponse};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const CREDENTIAL_TYPE: &str = "authorized_user";

/// A builder for user account [Credentials].
///
/// # Example
/// ```
/// # use google_cloud_adc::credentials::user_account::Builder;
/// let authorized_user = serde_json::json!({
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "refresh_token": "YOUR_REFRESH_TOKEN",
///     "type": "authorized_user",
/// });
/// let credentials = Builder::new(authorized_user).build()?;
/// assert_eq!(credentials.identity(), "YOUR_CLIENT_ID.apps.googleusercontent.com");
/// # Ok::<(), google_cloud_adc::build_errors::Error>(())
/// ```
pub struct Builder {
    authorized_user: Value,
    scopes: Scopes,
    token_uri: Option<String>,
    quota_project_id: Option<String>,
    clock: Arc<dyn Clock>,
}

impl Builder {
    /// Creates a new builder using `authorized_user` JSON value.
    pub fn new(authorized_user: Value) -> Self {
        Self {
            authorized_user,
            scopes: Scopes::none(),
            token_uri: None,
            quota_project_id: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the default [scopes] for these credentials.
    ///
    /// With no scopes the token has the scopes granted when the refresh token
    /// was created.
    ///
    /// [scopes]: https://developers.google.com/identity/protocols/oauth2/scopes
    pub fn with_scopes<S: Into<Scopes>>(mut self, scopes: S) -> Self {
        self.scopes = scopes.into();
        self
    }

    /// Sets the URI for the token endpoint used to fetch access tokens.
    ///
    /// Any value provided here overrides a `token_uri` value from the input
    /// `authorized_user` JSON. Defaults to `https://oauth2.googleapis.com/token`.
    pub fn with_token_uri<S: Into<String>>(mut self, token_uri: S) -> Self {
        self.token_uri = Some(token_uri.into());
        self
    }

    /// Sets the [quota project] for these credentials.
    ///
    /// [quota project]: https://cloud.google.com/docs/quotas/quota-project
    pub fn with_quota_project_id<S: Into<String>>(mut self, quota_project_id: S) -> Self {
        self.quota_project_id = Some(quota_project_id.into());
        self
    }

    pub(crate) fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a [Credentials] instance with the configured settings.
    ///
    /// # Errors
    ///
    /// Fails if the JSON is missing `client_id`, `client_secret` or
    /// `refresh_token`, or if any field has the wrong type.
    pub fn build(self) -> BuildResult<Credentials> {
        let authorized_user = serde_json::from_value::<AuthorizedUser>(self.authorized_user)
            .map_err(|e| BuildError::invalid_material(CREDENTIAL_TYPE, e))?;
        let endpoint = self
            .token_uri
            .or(authorized_user.token_uri)
            .unwrap_or_else(|| OAUTH2_TOKEN_ENDPOINT.to_string());
        let quota_project_id = self.quota_project_id.or(authorized_user.quota_project_id);

        let fingerprint = refresh_token_fingerprint(&authorized_user.refresh_token);
        let token_provider = UserTokenProvider {
            client_id: authorized_user.client_id.clone(),
            client_secret: authorized_user.client_secret,
            refresh_token: authorized_user.refresh_token,
            endpoint,
            clock: self.clock,
            client: reqwest::Client::new(),
        };
        Ok(Credentials::with_fingerprint(
            CredentialKind::UserAccount,
            authorized_user.client_id,
            Some(fingerprint),
            self.scopes,
            quota_project_id,
            token_provider,
        ))
    }
}

// All users of `gcloud auth application-default login` share one OAuth client
// id. The refresh token tells them apart.
fn refresh_token_fingerprint(refresh_token: &str) -> String {
    let digest = Sha256::digest(refresh_token.as_bytes());
    hex::encode(&digest[..8])
}

#[derive(serde::Deserialize)]
struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    quota_project_id: Option<String>,
}

struct UserTokenProvider {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    endpoint: String,
    clock: Arc<dyn Clock>,
    client: reqwest::Client,
}

impl std::fmt::Debug for UserTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserTokenProvider")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[censored]")
            .field("refresh_token", &"[censored]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait::async_trait]
impl TokenProvider for UserTokenProvider {
    async fn token(&self, scopes: &Scopes) -> Result<Token> {
        let mut form = vec![
            ("grant_type", REFRESH_TOKEN_GRANT_TYPE.to_string()),
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
            ("refresh_token", self.refresh_token.clone()),
        ];
        if !scopes.is_empty() {
            form.push(("scope", scopes.join(" ")));
        }
        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(errors::retryable)?;
        if !response.status().is_success() {
            return Err(
                errors::from_http_response(response, "failed to refresh user access token").await,
            );
        }
        let response = response.json::<TokenResponse>().await.map_err(|e| {
            let retryable = !e.is_decode();
            CredentialsError::new(retryable, e)
        })?;
        Ok(response.into_token(self.clock.now()))
    }
}
