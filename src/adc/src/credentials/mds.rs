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

//! [Metadata Service] Credentials type.
//!
//! Google Cloud environments such as [Google Compute Engine (GCE)][gce-link],
//! [Google Kubernetes Engine (GKE)][gke-link], or [Cloud Run] provide a
//! metadata service. This is a local service to the VM (or pod) which
//! provides access tokens for the [default service account] of the VM.
//!
//! These credentials never hold secrets, the metadata service does.
//!
//! ```
//! # use google_cloud_adc::credentials::mds::Builder;
//! let credentials = Builder::default()
//!     .with_quota_project_id("my-quota-project")
//!     .build();
//! assert_eq!(credentials.identity(), "default");
//! ```
//!
//! [Cloud Run]: https://cloud.google.com/run
//! [default service account]: https://cloud.google.com/iam/docs/service-account-types#default
//! [gce-link]: https://cloud.google.com/products/compute
//! [gke-link]: https://cloud.google.com/kubernetes-engine
//! [Metadata Service]: https://cloud.google.com/compute/docs/metadata/overview

use crate::Result;
use crate::credentials::{CredentialKind, Credentials};
use crate::discovery::{Clock, Environment, ProcessEnvironment, SystemClock};
use crate::mds::Client;
use crate::scopes::Scopes;
use crate::token::{Token, TokenProvider};
use std::sync::Arc;

// The metadata server only hands out tokens for the default account.
const DEFAULT_ACCOUNT: &str = "default";

/// A builder for metadata server [Credentials].
pub struct Builder {
    endpoint: Option<String>,
    scopes: Scopes,
    quota_project_id: Option<String>,
    env: Arc<dyn Environment>,
    clock: Arc<dyn Clock>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            endpoint: None,
            scopes: Scopes::none(),
            quota_project_id: None,
            env: Arc::new(ProcessEnvironment),
            clock: Arc::new(SystemClock),
        }
    }
}

impl Builder {
    /// Sets the endpoint for the metadata service.
    ///
    /// Defaults to `http://metadata.google.internal`. The `GCE_METADATA_HOST`
    /// environment variable takes precedence over this value.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the default [scopes] for these credentials.
    ///
    /// With no scopes the metadata service uses the scopes configured for the
    /// VM.
    ///
    /// [scopes]: https://developers.google.com/identity/protocols/oauth2/scopes
    pub fn with_scopes<S: Into<Scopes>>(mut self, scopes: S) -> Self {
        self.scopes = scopes.into();
        self
    }

    /// Sets the [quota project] for these credentials.
    ///
    /// [quota project]: https://cloud.google.com/docs/quotas/quota-project
    pub fn with_quota_project_id<S: Into<String>>(mut self, quota_project_id: S) -> Self {
        self.quota_project_id = Some(quota_project_id.into());
        self
    }

    pub(crate) fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub(crate) fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a [Credentials] instance with the configured settings.
    pub fn build(self) -> Credentials {
        let token_provider = MdsTokenProvider {
            client: Client::new(self.env.as_ref(), self.endpoint),
            clock: self.clock,
        };
        Credentials::new(
            CredentialKind::ComputeEngine,
            DEFAULT_ACCOUNT.to_string(),
            self.scopes,
            self.quota_project_id,
            token_provider,
        )
    }
}

struct MdsTokenProvider {
    client: Client,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MdsTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MdsTokenProvider")
            .field("endpoint", &self.client.endpoint())
            .finish()
    }
}

#[async_trait::async_trait]
impl TokenProvider for MdsTokenProvider {
    async fn token(&self, scopes: &Scopes) -> Result<Token> {
        self.client.access_token(scopes, self.clock.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::tests::FakeEnvironment;
    use crate::mds::{GCE_METADATA_HOST_ENV_VAR, MDS_DEFAULT_URI};
    use httptest::matchers::{all_of, contains, request, url_decoded};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use serde_json::json;

    type TestResult = anyhow::Result<()>;

    fn token_path() -> String {
        format!("{MDS_DEFAULT_URI}/token")
    }

    #[test]
    fn build_defaults() {
        let credentials = Builder::default()
            .with_environment(Arc::new(FakeEnvironment::default()))
            .build();
        assert_eq!(credentials.kind(), CredentialKind::ComputeEngine);
        assert_eq!(credentials.identity(), "default");
        assert!(credentials.scopes().is_empty());
        assert_eq!(credentials.quota_project_id(), None);
        let fmt = format!("{credentials:?}");
        assert!(fmt.contains("http://metadata.google.internal"), "{fmt}");
    }

    #[tokio::test]
    async fn token_with_scopes() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", token_path()),
                request::query(url_decoded(contains(("scopes", "scope.a,scope.b")))),
            ])
            .times(1)
            .respond_with(json_encoded(json!({
                "access_token": "test-access-token",
                "expires_in": 3600,
                "token_type": "Bearer",
            }))),
        );

        let credentials = Builder::default()
            .with_environment(Arc::new(FakeEnvironment::default()))
            .with_endpoint(format!("http://{}", server.addr()))
            .with_scopes(["scope.a", "scope.b"])
            .with_quota_project_id("test-quota-project")
            .build();
        assert_eq!(credentials.quota_project_id(), Some("test-quota-project"));
        let token = credentials.token().await?;
        assert_eq!(token.token, "test-access-token");
        Ok(())
    }

    #[tokio::test]
    async fn token_uses_metadata_host_env() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", token_path()))
                .times(1)
                .respond_with(json_encoded(json!({
                    "access_token": "test-access-token",
                    "token_type": "Bearer",
                }))),
        );

        let env = FakeEnvironment::default()
            .with_var(GCE_METADATA_HOST_ENV_VAR, server.addr().to_string());
        let credentials = Builder::default()
            .with_environment(Arc::new(env))
            .with_endpoint("http://127.0.0.1:1")
            .build();
        let token = credentials.token().await?;
        assert_eq!(token.token, "test-access-token");
        Ok(())
    }

    #[tokio::test]
    async fn token_not_found() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", token_path()))
                .respond_with(status_code(404)),
        );

        let credentials = Builder::default()
            .with_environment(Arc::new(FakeEnvironment::default()))
            .with_endpoint(format!("http://{}", server.addr()))
            .build();
        let err = credentials.token().await.unwrap_err();
        assert!(!err.is_retryable(), "{err:?}");
        assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
        Ok(())
    }
}
