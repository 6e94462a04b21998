//! Login, reissue, and logout endpoints.
//!
//! The refresh token travels in an `HttpOnly` cookie only; the access token
//! rides in response bodies and `Authorization` headers. Login failures are
//! surfaced as a generic server error so provider detail never leaks to
//! clients.

use axum::{
    extract::{Extension, Query},
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthError, IssuedSession, SessionManager};

const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    code: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[utoipa::path(
    get,
    path = "/auth/google",
    params(
        ("code" = Option<String>, Query, description = "Authorization code returned by the provider")
    ),
    responses(
        (status = 200, description = "Login succeeded, refresh cookie set", body = LoginResponse),
        (status = 400, description = "Missing authorization code"),
        (status = 500, description = "Login failed")
    ),
    tag = "auth"
)]
pub async fn login(
    Query(query): Query<LoginQuery>,
    manager: Extension<Arc<SessionManager>>,
    config: Extension<AuthConfig>,
) -> Response {
    let Some(code) = query.code.filter(|code| !code.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "authorization code required"})),
        )
            .into_response();
    };

    match manager.login(&code).await {
        Ok(session) => match session_response(&session, &config) {
            Ok((headers, session)) => (
                StatusCode::OK,
                headers,
                Json(LoginResponse {
                    access_token: session.access_token,
                    token_type: "Bearer".to_string(),
                    expires_in: session.access_ttl_seconds,
                }),
            )
                .into_response(),
            Err(err) => {
                error!("failed to build refresh cookie: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(err) => {
            // Generic body: provider errors stay in the logs.
            error!("login failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "login failed"})),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/reissue",
    responses(
        (status = 200, description = "Token pair rotated, refresh cookie replaced", body = TokenResponse),
        (status = 401, description = "Refresh credential missing, invalid, or superseded")
    ),
    tag = "auth"
)]
pub async fn reissue(
    headers: HeaderMap,
    manager: Extension<Arc<SessionManager>>,
    config: Extension<AuthConfig>,
) -> Response {
    let presented = refresh_token_from_cookie(&headers);

    match manager.reissue(presented.as_deref()).await {
        Ok(session) => match session_response(&session, &config) {
            Ok((headers, session)) => (
                StatusCode::OK,
                headers,
                Json(TokenResponse {
                    access_token: session.access_token,
                    refresh_token: session.refresh_token,
                }),
            )
                .into_response(),
            Err(err) => {
                error!("failed to build refresh cookie: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(err @ (AuthError::Store(_) | AuthError::Directory(_))) => {
            error!("reissue failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            // Client-held credential problem, not a server fault.
            warn!("reissue rejected: {err}");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid refresh credential"})),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Session cleared, refresh cookie removed")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    manager: Extension<Arc<SessionManager>>,
    config: Extension<AuthConfig>,
) -> Response {
    let presented = refresh_token_from_cookie(&headers);
    manager.logout(presented.as_deref()).await;

    // Always clear the cookie, even when there was no session to clear.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_refresh_cookie(config.cookie_secure()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

fn session_response(
    session: &IssuedSession,
    config: &AuthConfig,
) -> Result<(HeaderMap, IssuedSession), InvalidHeaderValue> {
    let cookie = refresh_cookie(
        &session.refresh_token,
        config.refresh_ttl_seconds(),
        config.cookie_secure(),
    )?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((headers, session.clone()))
}

/// Build the `HttpOnly` cookie carrying the refresh token.
fn refresh_cookie(
    token: &str,
    max_age_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{REFRESH_TOKEN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_refresh_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{REFRESH_TOKEN_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn refresh_token_from_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == REFRESH_TOKEN_COOKIE {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_shape() -> Result<(), InvalidHeaderValue> {
        let cookie = refresh_cookie("token-value", 1_209_600, false)?;
        assert_eq!(
            cookie.to_str().ok(),
            Some("refreshToken=token-value; Path=/; HttpOnly; SameSite=Lax; Max-Age=1209600")
        );

        let secure = refresh_cookie("token-value", 60, true)?;
        assert!(secure.to_str().ok().is_some_and(|s| s.ends_with("; Secure")));
        Ok(())
    }

    #[test]
    fn clear_cookie_expires_immediately() -> Result<(), InvalidHeaderValue> {
        let cookie = clear_refresh_cookie(false)?;
        assert!(cookie.to_str().ok().is_some_and(|s| s.contains("Max-Age=0")));
        Ok(())
    }

    #[test]
    fn reads_refresh_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; refreshToken=abc.def.ghi; lang=en"),
        );
        assert_eq!(
            refresh_token_from_cookie(&headers).as_deref(),
            Some("abc.def.ghi")
        );

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(refresh_token_from_cookie(&headers), None);

        assert_eq!(refresh_token_from_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn login_response_uses_wire_names() {
        let response = LoginResponse {
            access_token: "token".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        };
        let value = serde_json::to_value(&response).expect("serializes");
        assert_eq!(value["accessToken"], "token");
        assert_eq!(value["tokenType"], "Bearer");
        assert_eq!(value["expiresIn"], 3600);
    }
}
