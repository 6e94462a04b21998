//! Request-level authentication, split into two stages.
//!
//! Stage one attaches an identity when a valid access token is presented and
//! otherwise leaves the request unauthenticated; it never rejects. Stage two
//! turns "no attached identity" into 401 for routes that demand one. Keeping
//! the stages separate keeps public routes working and both decisions
//! independently testable.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::session::SessionManager;
use super::token::{Claims, TokenCodec};
use super::{unix_now, PrincipalId};

/// Authorization role attached to every authenticated request.
pub const DEFAULT_ROLE: &str = "user";

/// Identity attached to a request that presented a valid access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestIdentity {
    pub principal_id: PrincipalId,
    pub email: String,
    pub role: &'static str,
}

/// Extract the token from a standard `Authorization: Bearer` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Stage one: resolve the bearer header into an identity, if possible.
///
/// Absence of the header is not an error; an invalid or non-access token is
/// logged and the request stays unauthenticated.
#[must_use]
pub fn authenticate(
    headers: &HeaderMap,
    codec: &TokenCodec,
    now_unix_seconds: i64,
) -> Option<RequestIdentity> {
    let token = bearer_token(headers)?;
    match codec.verify(&token, now_unix_seconds) {
        Ok(Claims::Access(claims)) => match claims.sub.parse::<PrincipalId>() {
            Ok(principal_id) => Some(RequestIdentity {
                principal_id,
                email: claims.email,
                role: DEFAULT_ROLE,
            }),
            Err(_) => {
                warn!("bearer token subject is not a principal id");
                None
            }
        },
        Ok(Claims::Refresh(_)) => {
            warn!("refresh token presented as bearer credential");
            None
        }
        Err(err) => {
            debug!("bearer token rejected: {err}");
            None
        }
    }
}

/// Stage two: demand an identity, mapping its absence to 401.
///
/// # Errors
///
/// Returns `401 Unauthorized` when stage one attached nothing.
pub fn require_identity(
    identity: Option<RequestIdentity>,
) -> Result<RequestIdentity, StatusCode> {
    identity.ok_or(StatusCode::UNAUTHORIZED)
}

/// Axum middleware running stage one before routing. Handlers read the
/// identity back from request extensions.
pub async fn attach_identity(
    State(manager): State<Arc<SessionManager>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(identity) = authenticate(request.headers(), manager.codec(), unix_now()) {
        request.extensions_mut().insert(identity);
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(&SecretString::from("test-secret".to_string()))
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("ascii"));
        headers
    }

    #[test]
    fn bearer_token_strips_prefix() {
        assert_eq!(
            bearer_token(&headers_with("Bearer abc")).as_deref(),
            Some("abc")
        );
        assert_eq!(
            bearer_token(&headers_with("bearer abc")).as_deref(),
            Some("abc")
        );
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn authenticate_attaches_identity_for_valid_access_token() {
        let codec = codec();
        let token = codec
            .issue_access(42, "alice@example.com", Duration::from_secs(60), NOW)
            .expect("signing succeeds");

        let identity = authenticate(&headers_with(&format!("Bearer {token}")), &codec, NOW)
            .expect("identity attached");
        assert_eq!(identity.principal_id, 42);
        assert_eq!(identity.email, "alice@example.com");
        assert_eq!(identity.role, DEFAULT_ROLE);
    }

    #[test]
    fn authenticate_fails_open() {
        let codec = codec();

        // No header: unauthenticated, not an error.
        assert_eq!(authenticate(&HeaderMap::new(), &codec, NOW), None);

        // Garbage token: unauthenticated.
        assert_eq!(
            authenticate(&headers_with("Bearer junk"), &codec, NOW),
            None
        );

        // Expired access token: unauthenticated.
        let expired = codec
            .issue_access(42, "alice@example.com", Duration::from_secs(60), NOW - 120)
            .expect("signing succeeds");
        assert_eq!(
            authenticate(&headers_with(&format!("Bearer {expired}")), &codec, NOW),
            None
        );
    }

    #[test]
    fn authenticate_rejects_refresh_token_as_bearer() {
        let codec = codec();
        let refresh = codec
            .issue_refresh(42, Duration::from_secs(60), NOW)
            .expect("signing succeeds");

        assert_eq!(
            authenticate(&headers_with(&format!("Bearer {refresh}")), &codec, NOW),
            None
        );
    }

    #[test]
    fn require_identity_maps_absence_to_unauthorized() {
        assert_eq!(require_identity(None), Err(StatusCode::UNAUTHORIZED));

        let identity = RequestIdentity {
            principal_id: 42,
            email: "alice@example.com".to_string(),
            role: DEFAULT_ROLE,
        };
        assert_eq!(require_identity(Some(identity.clone())), Ok(identity));
    }
}
