//! Auth configuration shared by the session manager and the HTTP surface.

use secrecy::SecretString;

const DEFAULT_ACCESS_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: u64 = 14 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    frontend_base_url: String,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
    google_client_id: String,
    google_client_secret: SecretString,
    google_redirect_uri: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_secret: SecretString, frontend_base_url: String) -> Self {
        Self {
            token_secret,
            frontend_base_url,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            google_client_id: String::new(),
            google_client_secret: SecretString::default(),
            google_redirect_uri: String::new(),
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: u64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: u64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_google_client(
        mut self,
        client_id: String,
        client_secret: SecretString,
        redirect_uri: String,
    ) -> Self {
        self.google_client_id = client_id;
        self.google_client_secret = client_secret;
        self.google_redirect_uri = redirect_uri;
        self
    }

    #[must_use]
    pub fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> u64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> u64 {
        self.refresh_ttl_seconds
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    #[must_use]
    pub fn google_client_id(&self) -> &str {
        &self.google_client_id
    }

    #[must_use]
    pub fn google_client_secret(&self) -> &SecretString {
        &self.google_client_secret
    }

    #[must_use]
    pub fn google_redirect_uri(&self) -> &str {
        &self.google_redirect_uri
    }
}
