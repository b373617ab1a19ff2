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

//! OAuth 2.0 [scopes] requested for an access token.
//!
//! [scopes]: https://developers.google.com/identity/protocols/oauth2/scopes

/// An ordered list of non-empty OAuth 2.0 scopes.
///
/// Scopes can be created from a single space-delimited string, or from any
/// sequence of strings. Empty elements are dropped, the order is preserved.
///
/// ```
/// # use google_cloud_adc::scopes::Scopes;
/// let scopes = Scopes::from("scope.a  scope.b");
/// assert_eq!(scopes.as_slice(), &["scope.a", "scope.b"]);
///
/// let scopes = Scopes::from(["scope.a", "", "scope.b"]);
/// assert_eq!(scopes.as_slice(), &["scope.a", "scope.b"]);
/// ```
///
/// An empty `Scopes` means no scope is requested. Each credential type
/// decides how to handle that case.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Scopes(Vec<String>);

impl Scopes {
    /// Explicitly request no scopes.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// The scopes joined by `sep`, as expected by the different token endpoints.
    pub(crate) fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }

    fn collect_scopes<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            iter.into_iter()
                .flat_map(|s| {
                    s.as_ref()
                        .split_whitespace()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .collect(),
        )
    }
}

impl From<&str> for Scopes {
    fn from(value: &str) -> Self {
        Self::collect_scopes([value])
    }
}

impl From<String> for Scopes {
    fn from(value: String) -> Self {
        Self::collect_scopes([value])
    }
}

impl From<&String> for Scopes {
    fn from(value: &String) -> Self {
        Self::collect_scopes([value])
    }
}

impl<S: AsRef<str>> From<Vec<S>> for Scopes {
    fn from(value: Vec<S>) -> Self {
        Self::collect_scopes(value)
    }
}

impl<S: AsRef<str>> From<&[S]> for Scopes {
    fn from(value: &[S]) -> Self {
        Self::collect_scopes(value)
    }
}

impl<S: AsRef<str>, const N: usize> From<[S; N]> for Scopes {
    fn from(value: [S; N]) -> Self {
        Self::collect_scopes(value)
    }
}

impl<S: AsRef<str>> From<Option<S>> for Scopes {
    fn from(value: Option<S>) -> Self {
        Self::collect_scopes(value)
    }
}

impl std::fmt::Display for Scopes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}
