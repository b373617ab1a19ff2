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

use crate::build_errors::{Error as BuildError, Result as BuildResult};
use serde_json::Value;

const SERVICE_ACCOUNT: &str = "service_account";
const AUTHORIZED_USER: &str = "authorized_user";

/// The contents of a credentials file, classified by its `type` field.
///
/// Each variant holds the full JSON object. The fields required by each kind
/// are validated when the material is turned into [Credentials].
///
/// [Credentials]: crate::credentials::Credentials
#[derive(Clone, PartialEq)]
pub enum CredentialMaterial {
    /// A [service account key], `"type": "service_account"`.
    ///
    /// [service account key]: https://cloud.google.com/iam/docs/keys-create-delete
    ServiceAccount(Value),
    /// A user refresh token, `"type": "authorized_user"`.
    ///
    /// Typically created by `gcloud auth application-default login`.
    AuthorizedUser(Value),
}

impl CredentialMaterial {
    /// The `type` discriminant of this material.
    pub fn credential_type(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => SERVICE_ACCOUNT,
            Self::AuthorizedUser(_) => AUTHORIZED_USER,
        }
    }
}

// The material holds private keys and refresh tokens.
impl std::fmt::Debug for CredentialMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CredentialMaterial")
            .field(&self.credential_type())
            .field(&"[censored]")
            .finish()
    }
}

/// Parses the contents of a credentials file.
///
/// # Errors
///
/// Fails if `contents` is not a JSON object, if the object has no `type`
/// field, or if the `type` is not recognized. Nothing is returned on failure.
///
/// # Example
/// ```
/// # use google_cloud_adc::material::{parse, CredentialMaterial};
/// let contents = br#"{"type": "authorized_user", "client_id": "x"}"#;
/// let material = parse(contents)?;
/// assert!(matches!(material, CredentialMaterial::AuthorizedUser(_)));
/// # Ok::<(), google_cloud_adc::build_errors::Error>(())
/// ```
pub fn parse(contents: &[u8]) -> BuildResult<CredentialMaterial> {
    let json = serde_json::from_slice::<Value>(contents).map_err(BuildError::malformed_json)?;
    from_json(json)
}

/// Classifies an already decoded credentials JSON value.
pub fn from_json(json: Value) -> BuildResult<CredentialMaterial> {
    if !json.is_object() {
        return Err(BuildError::malformed_json(format!(
            "expected a JSON object, found `{}`",
            value_kind(&json)
        )));
    }
    let credential_type = match json.get("type") {
        Some(Value::String(t)) => t.clone(),
        _ => return Err(BuildError::missing_type()),
    };
    match credential_type.as_str() {
        SERVICE_ACCOUNT => Ok(CredentialMaterial::ServiceAccount(json)),
        AUTHORIZED_USER => Ok(CredentialMaterial::AuthorizedUser(json)),
        other => Err(BuildError::unknown_type(other)),
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
