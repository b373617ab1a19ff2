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

use crate::discovery::{Clock, Environment, MetadataProbe};
use crate::errors::{self, CredentialsError};
use crate::scopes::Scopes;
use crate::token::{Token, TokenResponse};
use reqwest::{Client as ReqwestClient, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const MDS_DEFAULT_URI: &str = "/computeMetadata/v1/instance/service-accounts/default";
pub(crate) const METADATA_FLAVOR_VALUE: &str = "Google";
pub(crate) const METADATA_FLAVOR: &str = "metadata-flavor";
pub(crate) const METADATA_ROOT: &str = "http://metadata.google.internal";
pub(crate) const GCE_METADATA_HOST_ENV_VAR: &str = "GCE_METADATA_HOST";

// The metadata server answers in a few milliseconds when present. Off Google
// Cloud the name usually fails to resolve, or the connection hangs.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// A client for the GCP Compute Engine Metadata Service (MDS).
#[derive(Clone, Debug)]
pub(crate) struct Client {
    endpoint: String,
    inner: ReqwestClient,
}

impl Client {
    /// Creates a new client for the Metadata Service.
    ///
    /// `GCE_METADATA_HOST` wins over `endpoint_override`, which wins over the
    /// default metadata root.
    pub(crate) fn new(env: &dyn Environment, endpoint_override: Option<String>) -> Self {
        let endpoint = resolve_endpoint(env, endpoint_override);
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            inner: ReqwestClient::new(),
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Creates a GET request to the MDS service with the correct headers.
    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        self.inner
            .get(url)
            .header(METADATA_FLAVOR, METADATA_FLAVOR_VALUE)
    }

    /// Fetches an access token for the default service account.
    ///
    /// With no scopes the metadata server uses the scopes configured for
    /// the VM.
    pub(crate) async fn access_token(
        &self,
        scopes: &Scopes,
        clock: &dyn Clock,
    ) -> crate::Result<Token> {
        let path = format!("{MDS_DEFAULT_URI}/token");
        let mut request = self.get(&path);
        if !scopes.is_empty() {
            request = request.query(&[("scopes", scopes.join(","))]);
        }

        let error_message = "failed to fetch access token from the metadata server";
        // Connection errors are retryable, the metadata server may be
        // starting up.
        let response = request.send().await.map_err(errors::retryable)?;
        if !response.status().is_success() {
            return Err(errors::from_http_response(response, error_message).await);
        }

        let response = response.json::<TokenResponse>().await.map_err(|e| {
            // Decoding errors are not transient. Typically they indicate a badly
            // configured MDS endpoint, or DNS redirecting the request to a random
            // server, e.g., ISPs that redirect unknown services to HTTP.
            CredentialsError::new(!e.is_decode(), e)
        })?;
        Ok(response.into_token(clock.now()))
    }

    /// Returns true if the metadata server answers at `endpoint`.
    pub(crate) async fn ping(&self) -> bool {
        let request = self.get("/").timeout(PROBE_TIMEOUT);
        match request.send().await {
            Ok(response) => response
                .headers()
                .get(METADATA_FLAVOR)
                .is_some_and(|v| v == METADATA_FLAVOR_VALUE),
            Err(e) => {
                tracing::debug!("metadata server not detected at {}: {e}", self.endpoint);
                false
            }
        }
    }
}

fn resolve_endpoint(env: &dyn Environment, endpoint_override: Option<String>) -> String {
    if let Some(host) = env.var(GCE_METADATA_HOST_ENV_VAR) {
        return format!("http://{}", host.to_string_lossy());
    }
    endpoint_override.unwrap_or_else(|| METADATA_ROOT.to_string())
}

/// Detects the metadata server used by [ComputeEngine] credentials.
///
/// Setting `GCE_METADATA_HOST` counts as a positive detection, the variable
/// is how emulators and tests announce themselves.
///
/// [ComputeEngine]: crate::credentials::CredentialKind::ComputeEngine
#[derive(Debug)]
pub struct MetadataServerProbe {
    env: Arc<dyn Environment>,
    endpoint: Option<String>,
}

impl MetadataServerProbe {
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self {
            env,
            endpoint: None,
        }
    }

    /// Probe a different endpoint.
    ///
    /// Credentials found through a [Resolver] only use this endpoint if it is
    /// also set with [Resolver::with_metadata_endpoint].
    ///
    /// [Resolver]: crate::discovery::Resolver
    /// [Resolver::with_metadata_endpoint]: crate::discovery::Resolver::with_metadata_endpoint
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub(crate) fn with_optional_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait::async_trait]
impl MetadataProbe for MetadataServerProbe {
    async fn is_available(&self) -> bool {
        if self.env.var(GCE_METADATA_HOST_ENV_VAR).is_some() {
            return true;
        }
        Client::new(self.env.as_ref(), self.endpoint.clone())
            .ping()
            .await
    }
}
