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

//! Errors created during credentials construction and discovery.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A `Result` alias where the `Err` case is [Error].
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for credentials builders and for the discovery [Resolver].
///
/// Errors found while loading a credentials file carry the file path, see
/// [Error::path].
///
/// [Resolver]: crate::discovery::Resolver
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    path: Option<PathBuf>,
    origin: Option<&'static str>,
}

impl Error {
    /// A problem finding or opening the credentials file.
    pub fn is_loading(&self) -> bool {
        matches!(self.kind, ErrorKind::Loading(_))
    }

    /// The credentials file is not a valid JSON object.
    pub fn is_malformed_json(&self) -> bool {
        matches!(self.kind, ErrorKind::MalformedJson(_))
    }

    /// The credentials JSON has no `type` field.
    pub fn is_missing_type(&self) -> bool {
        matches!(self.kind, ErrorKind::MissingType)
    }

    /// The credentials type is not recognized.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self.kind, ErrorKind::UnknownType(_))
    }

    /// The credentials JSON is missing required fields, or they are malformed.
    pub fn is_invalid_material(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidMaterial { .. })
    }

    /// No discovery stage found credentials.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }

    /// The credentials file that caused this error, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn new(kind: ErrorKind) -> Error {
        Error {
            kind,
            path: None,
            origin: None,
        }
    }

    pub(crate) fn loading<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error::new(ErrorKind::Loading(source.into()))
    }

    pub(crate) fn malformed_json<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error::new(ErrorKind::MalformedJson(source.into()))
    }

    pub(crate) fn missing_type() -> Error {
        Error::new(ErrorKind::MissingType)
    }

    pub(crate) fn unknown_type<T: Into<String>>(credential_type: T) -> Error {
        Error::new(ErrorKind::UnknownType(credential_type.into()))
    }

    pub(crate) fn invalid_material<T>(credential_type: &'static str, source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error::new(ErrorKind::InvalidMaterial {
            credential_type,
            source: source.into(),
        })
    }

    pub(crate) fn not_found<T: Into<String>>(details: T) -> Error {
        Error::new(ErrorKind::NotFound(details.into()))
    }

    /// Records the file and the discovery stage that produced the error.
    pub(crate) fn in_file<P: Into<PathBuf>>(mut self, path: P, origin: &'static str) -> Error {
        self.path = Some(path.into());
        self.origin = Some(origin);
        self
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.path, self.origin) {
            (Some(path), Some(origin)) => {
                write!(f, "{} (from {origin}): {}", path.display(), self.kind)
            }
            (Some(path), None) => write!(f, "{}: {}", path.display(), self.kind),
            _ => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("could not find or open the credentials file: {0}")]
    Loading(#[source] BoxError),
    #[error("cannot parse the credentials file as a JSON object: {0}")]
    MalformedJson(#[source] BoxError),
    #[error("the credentials JSON is missing the `type` field")]
    MissingType,
    #[error(
        "unknown credentials type `{0}`, expected one of `service_account` or `authorized_user`"
    )]
    UnknownType(String),
    #[error("invalid `{credential_type}` credentials: {source}")]
    InvalidMaterial {
        credential_type: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("{prefix}; {0}", prefix = crate::constants::ADC_NOT_FOUND_MESSAGE)]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn constructors() {
        let error = Error::loading("test message");
        assert!(error.is_loading(), "{error:?}");
        assert!(error.source().is_some(), "{error:?}");
        assert!(error.to_string().contains("test message"), "{error}");

        let error = Error::malformed_json("test message");
        assert!(error.is_malformed_json(), "{error:?}");
        assert!(error.source().is_some(), "{error:?}");
        assert!(error.to_string().contains("test message"), "{error}");

        let error = Error::missing_type();
        assert!(error.is_missing_type(), "{error:?}");
        assert!(error.source().is_none(), "{error:?}");
        assert!(error.to_string().contains("`type`"), "{error}");

        let error = Error::unknown_type("test-only-type");
        assert!(error.is_unknown_type(), "{error:?}");
        assert!(error.source().is_none(), "{error:?}");
        assert!(error.to_string().contains("test-only-type"), "{error}");

        let error = Error::invalid_material("service_account", "test message");
        assert!(error.is_invalid_material(), "{error:?}");
        assert!(error.source().is_some(), "{error:?}");
        assert!(error.to_string().contains("service_account"), "{error}");
        assert!(error.to_string().contains("test message"), "{error}");

        let error = Error::not_found("test details");
        assert!(error.is_not_found(), "{error:?}");
        assert!(error.source().is_none(), "{error:?}");
        assert!(error.to_string().contains("test details"), "{error}");
    }

    #[test]
    fn not_found_points_to_documentation() {
        let error = Error::not_found("test details");
        let got = error.to_string();
        assert!(
            got.starts_with(crate::constants::ADC_NOT_FOUND_MESSAGE),
            "{got}"
        );
        assert!(
            got.contains("https://cloud.google.com/docs/authentication/external/set-up-adc"),
            "{got}"
        );
    }

    #[test]
    fn in_file() {
        let error = Error::missing_type().in_file("/test-only/creds.json", "test-origin");
        assert!(error.is_missing_type(), "{error:?}");
        assert_eq!(error.path(), Some(Path::new("/test-only/creds.json")));
        let got = error.to_string();
        assert!(got.contains("/test-only/creds.json"), "{got}");
        assert!(got.contains("test-origin"), "{got}");

        let error = Error::missing_type();
        assert_eq!(error.path(), None);
    }
}
