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

pub mod mds;
pub mod service_account;
pub mod user_account;

use crate::Result;
use crate::build_errors::Result as BuildResult;
use crate::discovery::{Clock, SystemClock};
use crate::material::CredentialMaterial;
use crate::scopes::Scopes;
use crate::token::{Token, TokenProvider};
use std::sync::Arc;

/// The kinds of credentials produced by discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// A service account key file.
    ServiceAccount,
    /// A user refresh token, usually from `gcloud auth application-default login`.
    UserAccount,
    /// The default service account of a Google Cloud compute environment.
    ComputeEngine,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceAccount => "service_account",
            Self::UserAccount => "authorized_user",
            Self::ComputeEngine => "compute_engine",
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved credentials, ready to exchange their material for access tokens.
///
/// Credentials are cheap to clone, all clones share the same underlying
/// provider.
///
/// Most applications do not create `Credentials` directly, they use
/// [resolve_credential][crate::resolve_credential] or
/// [make_token_fetcher][crate::make_token_fetcher]. Each submodule has a
/// `Builder` for applications that know which kind of credentials they need.
#[derive(Clone, Debug)]
pub struct Credentials {
    inner: Arc<CredentialsInner>,
}

#[derive(Debug)]
struct CredentialsInner {
    kind: CredentialKind,
    identity: String,
    // Distinguishes principals that share an identity, such as users of the
    // same OAuth client. Never the secret itself.
    fingerprint: Option<String>,
    scopes: Scopes,
    quota_project_id: Option<String>,
    token_provider: Box<dyn TokenProvider>,
}

impl Credentials {
    pub(crate) fn new<T>(
        kind: CredentialKind,
        identity: String,
        scopes: Scopes,
        quota_project_id: Option<String>,
        token_provider: T,
    ) -> Self
    where
        T: TokenProvider + 'static,
    {
        Self::with_fingerprint(kind, identity, None, scopes, quota_project_id, token_provider)
    }

    pub(crate) fn with_fingerprint<T>(
        kind: CredentialKind,
        identity: String,
        fingerprint: Option<String>,
        scopes: Scopes,
        quota_project_id: Option<String>,
        token_provider: T,
    ) -> Self
    where
        T: TokenProvider + 'static,
    {
        Self {
            inner: Arc::new(CredentialsInner {
                kind,
                identity,
                fingerprint,
                scopes,
                quota_project_id,
                token_provider: Box::new(token_provider),
            }),
        }
    }

    /// Creates credentials from parsed material.
    ///
    /// `scopes` are the default scopes, used by [Credentials::token].
    ///
    /// # Errors
    ///
    /// Returns an error if the material is missing required fields, or if they
    /// are malformed. See [build_errors::Error::is_invalid_material].
    ///
    /// [build_errors::Error::is_invalid_material]: crate::build_errors::Error::is_invalid_material
    pub fn from_material<S>(material: CredentialMaterial, scopes: S) -> BuildResult<Self>
    where
        S: Into<Scopes>,
    {
        Self::from_material_with_clock(material, scopes.into(), Arc::new(SystemClock))
    }

    pub(crate) fn from_material_with_clock(
        material: CredentialMaterial,
        scopes: Scopes,
        clock: Arc<dyn Clock>,
    ) -> BuildResult<Self> {
        match material {
            CredentialMaterial::ServiceAccount(json) => service_account::Builder::new(json)
                .with_scopes(scopes)
                .with_clock(clock)
                .build(),
            CredentialMaterial::AuthorizedUser(json) => user_account::Builder::new(json)
                .with_scopes(scopes)
                .with_clock(clock)
                .build(),
        }
    }

    pub fn kind(&self) -> CredentialKind {
        self.inner.kind
    }

    /// A stable identifier for the principal behind these credentials.
    ///
    /// This is the client email for service accounts, the OAuth client id for
    /// user credentials, and the service account name for the metadata server.
    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    /// The identity used in cache keys.
    ///
    /// This is the [identity][Credentials::identity], qualified by a digest of
    /// the secret when several principals can share the same identity.
    pub(crate) fn cache_identity(&self) -> String {
        match &self.inner.fingerprint {
            Some(fingerprint) => format!("{}#{fingerprint}", self.inner.identity),
            None => self.inner.identity.clone(),
        }
    }

    /// The scopes requested by [Credentials::token].
    pub fn scopes(&self) -> &Scopes {
        &self.inner.scopes
    }

    /// The [quota project] charged for requests using these credentials.
    ///
    /// [quota project]: https://cloud.google.com/docs/quotas/quota-project
    pub fn quota_project_id(&self) -> Option<&str> {
        self.inner.quota_project_id.as_deref()
    }

    /// Exchanges the credential material for a new access token.
    ///
    /// This always contacts the token endpoint. Use a [TokenFetcher] to cache
    /// the results.
    ///
    /// [TokenFetcher]: crate::fetcher::TokenFetcher
    pub async fn fetch_token(&self, scopes: &Scopes) -> Result<Token> {
        self.inner.token_provider.token(scopes).await
    }

    /// Exchanges the credential material for a token with the default scopes.
    pub async fn token(&self) -> Result<Token> {
        self.fetch_token(&self.inner.scopes).await
    }

    /// Replaces the quota project, used with `GOOGLE_CLOUD_QUOTA_PROJECT`.
    ///
    /// Only valid on freshly built credentials, which are not shared yet.
    pub(crate) fn with_quota_project_override(self, quota_project_id: Option<String>) -> Self {
        let Some(project) = quota_project_id else {
            return self;
        };
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.quota_project_id = Some(project);
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => Self { inner },
        }
    }
}
