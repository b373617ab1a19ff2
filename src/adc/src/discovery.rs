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

//! The [Resolver] looks for credentials in three places, in order:
//!
//! 1. The file named by `GOOGLE_APPLICATION_CREDENTIALS`.
//! 2. The well-known file written by `gcloud auth application-default login`:
//!    `$HOME/.config/gcloud/application_default_credentials.json`, or
//!    `%APPDATA%\gcloud\application_default_credentials.json` on Windows.
//! 3. The metadata server.
//!
//! The resolver reads the environment, the file system, and the metadata
//! server through the [Environment], [FileSystem], and [MetadataProbe]
//! traits. Tests and embedding applications can replace any of them.

use crate::build_errors::{Error as BuildError, Result as BuildResult};
use crate::constants::{
    ADC_FILE_NAME, GOOGLE_APPLICATION_CREDENTIALS_VAR, GOOGLE_CLOUD_QUOTA_PROJECT_VAR,
    UNIX_HOME_VAR, WINDOWS_APPDATA_VAR,
};
use crate::credentials::{Credentials, mds};
use crate::fetcher::{CacheBackend, CacheConfig, TokenFetcher};
use crate::material;
use crate::scopes::Scopes;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Instant;

pub use crate::mds::MetadataServerProbe;

const WELL_KNOWN_FILE_ORIGIN: &str = "well-known file";

/// Read access to environment variables.
pub trait Environment: std::fmt::Debug + Send + Sync {
    /// Returns the value of `key`, or `None` if the variable is unset.
    ///
    /// A variable set to the empty string is *set*.
    fn var(&self, key: &str) -> Option<OsString>;
}

/// The environment of the current process.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }
}

/// Read access to credential files.
#[async_trait::async_trait]
pub trait FileSystem: std::fmt::Debug + Send + Sync {
    /// Reads the full contents of `path`.
    ///
    /// Must return an error of kind [std::io::ErrorKind::NotFound] when the
    /// file does not exist.
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// The local file system.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFileSystem;

#[async_trait::async_trait]
impl FileSystem for LocalFileSystem {
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

/// Detects whether a metadata server is reachable.
#[async_trait::async_trait]
pub trait MetadataProbe: std::fmt::Debug + Send + Sync {
    async fn is_available(&self) -> bool;
}

/// A monotonic clock, used to compute token expirations.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now(&self) -> Instant;
}

/// Uses [tokio::time::Instant::now], so paused tokio test runtimes control it.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Finds the [Application Default Credentials].
///
/// # Example
/// ```no_run
/// # use google_cloud_adc::discovery::Resolver;
/// # tokio_test::block_on(async {
/// let credentials = Resolver::new()
///     .resolve("https://www.googleapis.com/auth/cloud-platform")
///     .await?;
/// println!("found {} credentials", credentials.kind());
/// # Ok::<(), google_cloud_adc::build_errors::Error>(())
/// # });
/// ```
///
/// [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials
#[derive(Clone, Debug)]
pub struct Resolver {
    env: Arc<dyn Environment>,
    fs: Arc<dyn FileSystem>,
    probe: Option<Arc<dyn MetadataProbe>>,
    metadata_endpoint: Option<String>,
    clock: Arc<dyn Clock>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// A resolver using the process environment, the local file system, and
    /// the real metadata server.
    pub fn new() -> Self {
        Self {
            env: Arc::new(ProcessEnvironment),
            fs: Arc::new(LocalFileSystem),
            probe: None,
            metadata_endpoint: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_environment<T: Environment + 'static>(mut self, env: T) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn with_file_system<T: FileSystem + 'static>(mut self, fs: T) -> Self {
        self.fs = Arc::new(fs);
        self
    }

    /// Replaces the metadata server detection.
    ///
    /// The default is a [MetadataServerProbe] reading `GCE_METADATA_HOST` from
    /// the resolver's [Environment].
    pub fn with_metadata_probe<T: MetadataProbe + 'static>(mut self, probe: T) -> Self {
        self.probe = Some(Arc::new(probe));
        self
    }

    /// Sets the metadata server endpoint, for both detection and tokens.
    ///
    /// Defaults to `http://metadata.google.internal`. The `GCE_METADATA_HOST`
    /// environment variable takes precedence over this value.
    pub fn with_metadata_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.metadata_endpoint = Some(endpoint.into());
        self
    }

    /// The clock used by the resolved credentials to compute expirations.
    ///
    /// Fetchers created by [Resolver::make_token_fetcher] use the same clock
    /// to decide if a cached token is fresh.
    pub fn with_clock<T: Clock + 'static>(mut self, clock: T) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Resolves the credentials and wraps them in a [TokenFetcher].
    ///
    /// See [crate::make_token_fetcher] for the defaults.
    pub async fn make_token_fetcher<S>(
        &self,
        scopes: S,
        cache_config: Option<CacheConfig>,
        cache_backend: Option<Arc<dyn CacheBackend>>,
    ) -> BuildResult<TokenFetcher>
    where
        S: Into<Scopes>,
    {
        let scopes = scopes.into();
        let credentials = self.resolve(scopes.clone()).await?;
        let mut builder = TokenFetcher::builder(credentials)
            .with_scopes(scopes)
            .with_cache_config(cache_config.unwrap_or_default())
            .with_shared_clock(self.clock.clone());
        if let Some(backend) = cache_backend {
            builder = builder.with_cache_backend(backend);
        }
        Ok(builder.build())
    }

    /// Runs the discovery stages and returns the first credentials found.
    ///
    /// `scopes` are forwarded unchanged to the credentials.
    ///
    /// A stage that is *configured but broken* stops the search: if
    /// `GOOGLE_APPLICATION_CREDENTIALS` is set (even to an empty string) the
    /// file it names must be readable and valid. Likewise an existing
    /// well-known file must be valid. A stage that is not configured (unset
    /// variable, missing well-known file) falls through to the next stage.
    ///
    /// `GOOGLE_CLOUD_QUOTA_PROJECT`, if set, overrides the quota project of the
    /// credentials found.
    ///
    /// # Errors
    ///
    /// Returns [BuildError::is_not_found] if no stage finds credentials. The
    /// message lists what each stage found. Errors from a configured stage
    /// carry the offending file in [BuildError::path].
    pub async fn resolve<S: Into<Scopes>>(&self, scopes: S) -> BuildResult<Credentials> {
        let scopes = scopes.into();
        let credentials = self.discover(scopes).await?;
        let quota_project_id = self
            .env
            .var(GOOGLE_CLOUD_QUOTA_PROJECT_VAR)
            .map(|v| v.to_string_lossy().into_owned());
        Ok(credentials.with_quota_project_override(quota_project_id))
    }

    async fn discover(&self, scopes: Scopes) -> BuildResult<Credentials> {
        let mut findings = Vec::new();

        if let Some(path) = self.env.var(GOOGLE_APPLICATION_CREDENTIALS_VAR) {
            let path = PathBuf::from(path);
            tracing::debug!(
                "loading credentials from {GOOGLE_APPLICATION_CREDENTIALS_VAR}={}",
                path.display()
            );
            let contents = self.fs.read(&path).await.map_err(|e| {
                BuildError::loading(e).in_file(&path, GOOGLE_APPLICATION_CREDENTIALS_VAR)
            })?;
            return self
                .load_contents(&contents, scopes)
                .map_err(|e| e.in_file(&path, GOOGLE_APPLICATION_CREDENTIALS_VAR));
        }
        findings.push(format!("{GOOGLE_APPLICATION_CREDENTIALS_VAR} is not set"));

        match well_known_path(self.env.as_ref(), cfg!(windows)) {
            None => {
                let var = if cfg!(windows) {
                    WINDOWS_APPDATA_VAR
                } else {
                    UNIX_HOME_VAR
                };
                tracing::debug!("skipping the well-known file, {var} is not set");
                findings.push(format!("{var} is not set"));
            }
            Some(path) => match self.fs.read(&path).await {
                Ok(contents) => {
                    tracing::debug!("loading credentials from {}", path.display());
                    return self
                        .load_contents(&contents, scopes)
                        .map_err(|e| e.in_file(&path, WELL_KNOWN_FILE_ORIGIN));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("the well-known file {} does not exist", path.display());
                    findings.push(format!("{} does not exist", path.display()));
                }
                Err(e) => {
                    return Err(BuildError::loading(e).in_file(&path, WELL_KNOWN_FILE_ORIGIN));
                }
            },
        }

        let available = match &self.probe {
            Some(probe) => probe.is_available().await,
            None => {
                MetadataServerProbe::new(self.env.clone())
                    .with_optional_endpoint(self.metadata_endpoint.clone())
                    .is_available()
                    .await
            }
        };
        if available {
            tracing::debug!("using the metadata server credentials");
            let mut builder = mds::Builder::default()
                .with_environment(self.env.clone())
                .with_clock(self.clock.clone())
                .with_scopes(scopes);
            if let Some(endpoint) = &self.metadata_endpoint {
                builder = builder.with_endpoint(endpoint);
            }
            return Ok(builder.build());
        }
        tracing::debug!("the metadata server is not available");
        findings.push("the metadata server is not available".to_string());

        Err(BuildError::not_found(findings.join(", ")))
    }

    fn load_contents(&self, contents: &[u8], scopes: Scopes) -> BuildResult<Credentials> {
        let material = material::parse(contents)?;
        Credentials::from_material_with_clock(material, scopes, self.clock.clone())
    }
}

/// The path of the file created by `gcloud auth application-default login`.
///
/// Returns `None` if the home directory variable for the platform is unset.
pub(crate) fn well_known_path(env: &dyn Environment, windows: bool) -> Option<PathBuf> {
    let mut path = if windows {
        PathBuf::from(env.var(WINDOWS_APPDATA_VAR)?)
    } else {
        let mut path = PathBuf::from(env.var(UNIX_HOME_VAR)?);
        path.push(".config");
        path
    };
    path.push("gcloud");
    path.push(ADC_FILE_NAME);
    Some(path)
}
