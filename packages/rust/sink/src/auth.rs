//! Google API credentials.
//!
//! Two credential files are accepted: a service-account key, exchanged for an
//! access token with a signed RS256 assertion, or a file holding a pre-issued
//! `{"access_token": "..."}`.

use std::path::Path;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use jobflow_shared::{JobflowError, Result};

/// OAuth scope for reading and writing spreadsheets.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Assertion lifetime in seconds (the token endpoint caps it at one hour).
const ASSERTION_TTL_SECS: i64 = 3600;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    ServiceAccount {
        client_email: String,
        private_key: String,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
    AccessToken {
        access_token: String,
    },
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

/// Claims of the service-account assertion.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl Credentials {
    /// Read a credentials file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| JobflowError::io(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| JobflowError::parse(format!("unrecognized credentials file: {e}")))
    }

    /// Produce a bearer token for the spreadsheets scope.
    pub async fn access_token(&self, client: &Client) -> Result<String> {
        match self {
            Self::AccessToken { access_token } => Ok(access_token.clone()),
            Self::ServiceAccount {
                client_email,
                private_key,
                token_uri,
            } => {
                let assertion = sign_assertion(client_email, private_key, token_uri)?;
                debug!(client_email = %client_email, "exchanging service-account assertion");

                let response = client
                    .post(token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                    .send()
                    .await
                    .map_err(|e| JobflowError::Sink(format!("token exchange: {e}")))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(JobflowError::Sink(format!(
                        "token exchange: HTTP {status}: {body}"
                    )));
                }

                let token: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| JobflowError::Sink(format!("token exchange: {e}")))?;
                Ok(token.access_token)
            }
        }
    }
}

/// Signs the RS256 assertion for a service account.
fn sign_assertion(client_email: &str, private_key: &str, token_uri: &str) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: client_email,
        scope: SPREADSHEETS_SCOPE,
        aud: token_uri,
        iat: now,
        exp: now + ASSERTION_TTL_SECS,
    };
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
        .map_err(|e| JobflowError::config(format!("invalid service-account key: {e}")))?;
    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| JobflowError::Sink(format!("failed to sign assertion: {e}")))
}
