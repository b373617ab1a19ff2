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

use crate::Result;
use crate::errors;
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;

// Token endpoints reject assertions with `iat` in the future, and every
// machine has some clock skew.
pub(crate) const CLOCK_SKEW_FUDGE: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(3600);

/// The claims of the assertion exchanged for an access token.
#[derive(Serialize)]
pub(crate) struct JwsClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub scope: String,
    #[serde(with = "time::serde::timestamp")]
    pub iat: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub exp: OffsetDateTime,
}

impl JwsClaims {
    pub(crate) fn encode(&self) -> Result<String> {
        if self.exp < self.iat {
            return Err(errors::non_retryable_from_str(format!(
                "expiration time {:?}, must be later than issued time {:?}",
                self.exp, self.iat
            )));
        }
        encode_json(self)
    }
}

/// The header that describes who, what, and how a token was created.
#[derive(Serialize)]
pub(crate) struct JwsHeader<'a> {
    pub alg: &'a str,
    pub typ: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<&'a str>,
}

impl JwsHeader<'_> {
    pub(crate) fn encode(&self) -> Result<String> {
        encode_json(self)
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(errors::non_retryable)?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(json))
}
