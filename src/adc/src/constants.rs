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

pub(crate) const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub(crate) const GOOGLE_APPLICATION_CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub(crate) const GOOGLE_CLOUD_QUOTA_PROJECT_VAR: &str = "GOOGLE_CLOUD_QUOTA_PROJECT";
pub(crate) const OAUTH2_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
/// JWT bearer OAuth grant type, used by service account assertions.
pub(crate) const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub(crate) const REFRESH_TOKEN_GRANT_TYPE: &str = "refresh_token";
pub(crate) const QUOTA_PROJECT_KEY: &str = "x-goog-user-project";

// The file `gcloud auth application-default login` creates.
pub(crate) const ADC_FILE_NAME: &str = "application_default_credentials.json";
pub(crate) const WINDOWS_APPDATA_VAR: &str = "APPDATA";
pub(crate) const UNIX_HOME_VAR: &str = "HOME";

/// Operator tooling greps for this prefix, do not change it.
pub(crate) const ADC_NOT_FOUND_MESSAGE: &str = "could not find Application Default Credentials. \
     See https://cloud.google.com/docs/authentication/external/set-up-adc for more information";
