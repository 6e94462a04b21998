//! Identity provider exchange: authorization code in, verified identity out.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Providers known to the principal directory schema. Only Google is wired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentityProvider {
    Google,
    Kakao,
}

impl IdentityProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "GOOGLE",
            Self::Kakao => "KAKAO",
        }
    }
}

/// Identity asserted by the provider after a successful code exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub provider: IdentityProvider,
    /// Provider-scoped subject id, stable across logins.
    pub subject: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("identity provider transport failure")]
    Transport(#[from] reqwest::Error),
    #[error("identity provider rejected the request: {status}")]
    Rejected { status: StatusCode },
    #[error("identity provider response missing {0}")]
    MissingField(&'static str),
}

/// Exchange an authorization code for a verified external identity.
#[async_trait]
pub trait IdentityExchange: Send + Sync {
    async fn exchange(&self, code: &str) -> Result<VerifiedIdentity, ExchangeError>;
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

pub struct GoogleIdentityExchange {
    client: Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleIdentityExchange {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        redirect_uri: String,
    ) -> Result<Self, ExchangeError> {
        let client = Client::builder().user_agent(crate::APP_USER_AGENT).build()?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            redirect_uri,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_endpoints(mut self, token_url: String, userinfo_url: String) -> Self {
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    async fn request_provider_token(&self, code: &str) -> Result<String, ExchangeError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self.client.post(&self.token_url).form(&params).send().await?;
        if !response.status().is_success() {
            return Err(ExchangeError::Rejected {
                status: response.status(),
            });
        }

        let token: GoogleTokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn request_user_info(&self, provider_token: &str) -> Result<GoogleUserInfo, ExchangeError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(provider_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExchangeError::Rejected {
                status: response.status(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl IdentityExchange for GoogleIdentityExchange {
    async fn exchange(&self, code: &str) -> Result<VerifiedIdentity, ExchangeError> {
        let provider_token = self.request_provider_token(code).await?;
        let info = self.request_user_info(&provider_token).await?;

        debug!("resolved provider subject {}", info.id);

        let email = info.email.ok_or(ExchangeError::MissingField("email"))?;
        // Some accounts expose no display name; fall back to the email.
        let display_name = info.name.unwrap_or_else(|| email.clone());

        Ok(VerifiedIdentity {
            provider: IdentityProvider::Google,
            subject: info.id,
            email,
            display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_match_directory_schema() {
        assert_eq!(IdentityProvider::Google.as_str(), "GOOGLE");
        assert_eq!(IdentityProvider::Kakao.as_str(), "KAKAO");
    }

    #[test]
    fn userinfo_deserializes_with_missing_name() {
        let info: GoogleUserInfo =
            serde_json::from_str(r#"{"id":"sub-1","email":"alice@example.com"}"#)
                .expect("valid userinfo json");
        assert_eq!(info.id, "sub-1");
        assert_eq!(info.email.as_deref(), Some("alice@example.com"));
        assert_eq!(info.name, None);
    }
}
