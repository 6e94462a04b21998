use crate::auth::AuthConfig;
use crate::cli::actions::Action;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let token_secret = matches
        .get_one::<String>("token-secret")
        .cloned()
        .context("missing required argument: --token-secret")?;

    let frontend_url = matches
        .get_one::<String>("frontend-url")
        .cloned()
        .unwrap_or_else(|| "http://localhost:3000".to_string());

    let google_client_id = matches
        .get_one::<String>("google-client-id")
        .cloned()
        .context("missing required argument: --google-client-id")?;

    let google_client_secret = matches
        .get_one::<String>("google-client-secret")
        .cloned()
        .context("missing required argument: --google-client-secret")?;

    let google_redirect_uri = matches
        .get_one::<String>("google-redirect-uri")
        .cloned()
        .context("missing required argument: --google-redirect-uri")?;

    let mut config = AuthConfig::new(SecretString::from(token_secret), frontend_url)
        .with_google_client(
            google_client_id,
            SecretString::from(google_client_secret),
            google_redirect_uri,
        );

    if let Some(ttl) = matches.get_one::<u64>("access-token-ttl").copied() {
        config = config.with_access_ttl_seconds(ttl);
    }

    if let Some(ttl) = matches.get_one::<u64>("refresh-token-ttl").copied() {
        config = config.with_refresh_ttl_seconds(ttl);
    }

    Ok(Action::Server { port, dsn, config })
}
