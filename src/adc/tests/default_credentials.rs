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

use google_cloud_adc::credentials::CredentialKind;
use google_cloud_adc::fetcher::{CacheBackend, CacheConfig, InMemoryCache};
use google_cloud_adc::{make_token_fetcher, resolve_credential};
use httptest::matchers::{all_of, contains, request, url_decoded};
use httptest::responders::json_encoded;
use httptest::{Expectation, Server};
use serde_json::json;
use std::sync::Arc;

type TestResult = anyhow::Result<()>;

#[cfg(test)]
mod tests {
    use super::*;
    use scoped_env::ScopedEnv;
    use std::error::Error as _;

    const MDS_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

    fn write_credentials(contents: &str) -> anyhow::Result<tempfile::TempPath> {
        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    fn path_str(path: &tempfile::TempPath) -> anyhow::Result<&str> {
        path.to_str()
            .ok_or_else(|| anyhow::anyhow!("temporary path is not UTF-8: {path:?}"))
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn env_var_authorized_user() -> TestResult {
        let contents = json!({
            "type": "authorized_user",
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "refresh_token": "test-refresh-token",
            "quota_project_id": "test-quota-project",
        });
        let path = write_credentials(&contents.to_string())?;
        let _e1 = ScopedEnv::set("GOOGLE_APPLICATION_CREDENTIALS", path_str(&path)?);
        let _e2 = ScopedEnv::remove("GOOGLE_CLOUD_QUOTA_PROJECT");

        let credentials = resolve_credential("scope.a scope.b").await?;
        assert_eq!(credentials.kind(), CredentialKind::UserAccount);
        assert_eq!(credentials.identity(), "test-client-id");
        assert_eq!(credentials.scopes().as_slice(), &["scope.a", "scope.b"]);
        assert_eq!(credentials.quota_project_id(), Some("test-quota-project"));
        Ok(())
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn env_var_missing_file() {
        let _e = ScopedEnv::set("GOOGLE_APPLICATION_CREDENTIALS", "file-does-not-exist.json");
        let err = resolve_credential("scope.a").await.unwrap_err();
        assert!(err.is_loading(), "{err:?}");
        assert!(err.source().is_some(), "{err:?}");
        let msg = err.to_string();
        assert!(msg.contains("file-does-not-exist.json"), "{msg}");
        assert!(msg.contains("GOOGLE_APPLICATION_CREDENTIALS"), "{msg}");
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn env_var_malformed_file() -> TestResult {
        for contents in ["{}", r#"{"type": 42}"#] {
            let path = write_credentials(contents)?;
            let _e = ScopedEnv::set("GOOGLE_APPLICATION_CREDENTIALS", path_str(&path)?);
            let err = resolve_credential("scope.a").await.unwrap_err();
            assert!(err.is_missing_type(), "{err:?}");
            assert!(err.to_string().contains("`type` field"), "{err}");
        }
        Ok(())
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn env_var_unknown_type() -> TestResult {
        let path = write_credentials(r#"{"type": "some_unknown_credential_type"}"#)?;
        let _e = ScopedEnv::set("GOOGLE_APPLICATION_CREDENTIALS", path_str(&path)?);
        let err = resolve_credential("scope.a").await.unwrap_err();
        assert!(err.is_unknown_type(), "{err:?}");
        assert!(
            err.to_string().contains("some_unknown_credential_type"),
            "{err}"
        );
        Ok(())
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn quota_project_env_override() -> TestResult {
        let contents = json!({
            "type": "authorized_user",
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "refresh_token": "test-refresh-token",
            "quota_project_id": "from-file",
        });
        let path = write_credentials(&contents.to_string())?;
        let _e1 = ScopedEnv::set("GOOGLE_APPLICATION_CREDENTIALS", path_str(&path)?);
        let _e2 = ScopedEnv::set("GOOGLE_CLOUD_QUOTA_PROJECT", "from-env");

        let credentials = resolve_credential("scope.a").await?;
        assert_eq!(credentials.quota_project_id(), Some("from-env"));
        Ok(())
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn fallback_to_metadata_server() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", MDS_TOKEN_PATH),
                request::headers(contains(("metadata-flavor", "Google"))),
                request::query(url_decoded(contains(("scopes", "scope.a")))),
            ])
            .times(1)
            .respond_with(json_encoded(json!({
                "access_token": "test-mds-token",
                "expires_in": 3600,
                "token_type": "Bearer",
            }))),
        );

        let _e1 = ScopedEnv::remove("GOOGLE_APPLICATION_CREDENTIALS");
        let _e2 = ScopedEnv::remove("HOME"); // For posix
        let _e3 = ScopedEnv::remove("APPDATA"); // For windows
        let _e4 = ScopedEnv::remove("GOOGLE_CLOUD_QUOTA_PROJECT");
        let host = server.addr().to_string();
        let _e5 = ScopedEnv::set("GCE_METADATA_HOST", host.as_str());

        let fetcher = make_token_fetcher("scope.a", None, None).await?;
        assert_eq!(fetcher.credentials().kind(), CredentialKind::ComputeEngine);
        let token = fetcher.token().await?;
        assert_eq!(token.token, "test-mds-token");
        // Served from the cache, the server expects a single request.
        let token = fetcher.token().await?;
        assert_eq!(token.token, "test-mds-token");
        Ok(())
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn token_fetcher_end_to_end() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/token"),
                request::body(url_decoded(contains(("grant_type", "refresh_token")))),
                request::body(url_decoded(contains(("scope", "scope.a scope.b")))),
            ])
            .times(1)
            .respond_with(json_encoded(json!({
                "access_token": "test-user-token",
                "expires_in": 3600,
                "token_type": "Bearer",
            }))),
        );
        let contents = json!({
            "type": "authorized_user",
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "refresh_token": "test-refresh-token",
            "token_uri": server.url("/token").to_string(),
        });
        let path = write_credentials(&contents.to_string())?;
        let _e1 = ScopedEnv::set("GOOGLE_APPLICATION_CREDENTIALS", path_str(&path)?);
        let _e2 = ScopedEnv::set("GOOGLE_CLOUD_QUOTA_PROJECT", "test-quota-project");

        let backend: Arc<dyn CacheBackend> = Arc::new(InMemoryCache::new());
        let config = CacheConfig::default().with_key_prefix("integration:");
        let fetcher =
            make_token_fetcher(["scope.a", "scope.b"], Some(config), Some(backend.clone())).await?;

        let headers = fetcher.headers().await?;
        assert_eq!(
            headers.get("authorization").map(|v| v.as_bytes()),
            Some(b"Bearer test-user-token".as_slice())
        );
        assert_eq!(
            headers.get("x-goog-user-project").map(|v| v.as_bytes()),
            Some(b"test-quota-project".as_slice())
        );

        // The client id is qualified by a digest of the refresh token.
        let cached = backend
            .get("integration:authorized_user:test-client-id#0a9b110d5e553bd9:scope.a scope.b")
            .await;
        let cached = cached.ok_or_else(|| anyhow::anyhow!("token not cached"))?;
        assert_eq!(cached.token.token, "test-user-token");
        Ok(())
    }
}
