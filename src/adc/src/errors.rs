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

//! Errors returned when using [Credentials] to obtain tokens.
//!
//! [Credentials]: crate::credentials::Credentials

use http::StatusCode;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result};
use std::sync::Arc;

type SharedError = Arc<dyn Error + Send + Sync>;

/// Represents an error using [Credentials] to exchange credential material
/// for an access token.
///
/// The error is cheap to clone. A token exchange shared by several callers
/// reports the same error to all of them.
///
/// [Credentials]: crate::credentials::Credentials
#[derive(Clone, Debug)]
pub struct CredentialsError {
    /// A boolean value indicating whether the error is retryable.
    ///
    /// If `true`, the operation that resulted in this error might succeed upon
    /// retry. Applications and client libraries should use
    /// [Exponential backoff] and [retry budgets] in their retry loops.
    ///
    /// [Exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff
    /// [retry budgets]: https://docs.rs/tower/latest/tower/retry/budget/index.html
    is_retryable: bool,

    /// The HTTP status returned by the token endpoint, if any.
    status: Option<StatusCode>,

    message: Option<String>,

    source: Option<SharedError>,
}

impl CredentialsError {
    /// Creates a new `CredentialsError` from an underlying error.
    pub(crate) fn new<T>(is_retryable: bool, source: T) -> Self
    where
        T: Error + Send + Sync + 'static,
    {
        Self {
            is_retryable,
            status: None,
            message: None,
            source: Some(Arc::new(source)),
        }
    }

    /// Creates a new `CredentialsError` with only a message.
    ///
    /// Applications rarely need this. The exception is application tests
    /// that mock a credentials provider.
    pub fn from_str<T: Into<String>>(is_retryable: bool, message: T) -> Self {
        Self {
            is_retryable,
            status: None,
            message: Some(message.into()),
            source: None,
        }
    }

    /// Returns `true` if the error is retryable; otherwise returns `false`.
    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    /// The HTTP status code returned by the upstream service, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub(crate) fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

/// A helper to create a retryable error.
pub(crate) fn retryable<T: Error + Send + Sync + 'static>(source: T) -> CredentialsError {
    CredentialsError::new(true, source)
}

/// A helper to create a non-retryable error.
pub(crate) fn non_retryable<T: Error + Send + Sync + 'static>(source: T) -> CredentialsError {
    CredentialsError::new(false, source)
}

pub(crate) fn non_retryable_from_str<T: Into<String>>(message: T) -> CredentialsError {
    CredentialsError::from_str(false, message)
}

/// Converts a failed token endpoint response into an error.
///
/// The error keeps the status code and the response body, the body usually
/// explains why the exchange was rejected.
pub(crate) async fn from_http_response(
    response: reqwest::Response,
    message: &str,
) -> CredentialsError {
    let status = response.status();
    let error = match response.text().await {
        Ok(body) => CredentialsError::from_str(
            is_retryable(status),
            format!("{message}, status={status}, body=<{body}>"),
        ),
        Err(e) => CredentialsError::new(is_retryable(status), e),
    };
    error.with_status(status)
}

const RETRYABLE_MSG: &str = "but future attempts may succeed";
const NON_RETRYABLE_MSG: &str = "and future attempts will not succeed";

impl Display for CredentialsError {
    /// Formats the error message to include retryability and source.
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let msg = if self.is_retryable {
            RETRYABLE_MSG
        } else {
            NON_RETRYABLE_MSG
        };
        write!(f, "cannot create access token, {msg}")?;
        if let Some(message) = &self.message {
            write!(f, ", {message}")?;
        }
        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }
        Ok(())
    }
}

impl Error for CredentialsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|arc| arc.as_ref() as &(dyn Error + 'static))
    }
}

pub(crate) fn is_retryable(c: StatusCode) -> bool {
    match c {
        // Internal server errors do not indicate that there is anything wrong
        // with our request, so we retry them.
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => true,
        _ => false,
    }
}
