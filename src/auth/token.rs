//! Signed session tokens (JWT, HS256).
//!
//! Both token kinds are self-contained: validity is purely a function of the
//! shared signing secret and the embedded expiry. The refresh kind has a
//! server-side shadow in the session store; that check lives in the session
//! manager, not here. The codec holds the initialized key and nothing else,
//! so it is reentrant and safe to share across tasks.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

use super::PrincipalId;

const ALG_HS256: &str = "HS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG_HS256.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by an access token: subject plus the email shown by clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token: subject and lifetime only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// One fixed claims shape per token kind; the `typ` claim tags the kind on the
/// wire, so an access token can never pass where a refresh token is required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "typ", rename_all = "lowercase")]
pub enum Claims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

impl Claims {
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Access(claims) => &claims.sub,
            Self::Refresh(claims) => &claims.sub,
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> i64 {
        match self {
            Self::Access(claims) => claims.exp,
            Self::Refresh(claims) => claims.exp,
        }
    }

    /// Subject parsed as a principal id, `None` when the subject does not
    /// carry one.
    #[must_use]
    pub fn principal_id(&self) -> Option<PrincipalId> {
        self.subject().parse().ok()
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Wrong shape, wrong encoding, or wrong signature.
    #[error("malformed token")]
    Malformed,
    /// Signature checks out but the token is past its expiry. The claims are
    /// carried so logout-style flows can still identify the session.
    #[error("token expired")]
    Expired(Claims),
    #[error("unsupported signing scheme: {0}")]
    Unsupported(String),
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|_| TokenError::Malformed)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

/// Stateless signer/verifier seeded from the shared token secret.
#[derive(Clone)]
pub struct TokenCodec {
    key: Vec<u8>,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        Self {
            key: secret.expose_secret().as_bytes().to_vec(),
        }
    }

    fn mac(&self) -> Hmac<Sha256> {
        // HMAC accepts keys of any length.
        Hmac::<Sha256>::new_from_slice(&self.key).expect("HMAC accepts any key length")
    }

    /// Sign a prepared claims set.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(signature.as_slice());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Mint an access token for `principal_id`, expiring `ttl` after `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_access(
        &self,
        principal_id: PrincipalId,
        email: &str,
        ttl: Duration,
        now_unix_seconds: i64,
    ) -> Result<String, TokenError> {
        self.sign(&Claims::Access(AccessClaims {
            sub: principal_id.to_string(),
            email: email.to_string(),
            iat: now_unix_seconds,
            exp: now_unix_seconds + ttl.as_secs() as i64,
        }))
    }

    /// Mint a refresh token for `principal_id`, expiring `ttl` after `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_refresh(
        &self,
        principal_id: PrincipalId,
        ttl: Duration,
        now_unix_seconds: i64,
    ) -> Result<String, TokenError> {
        self.sign(&Claims::Refresh(RefreshClaims {
            sub: principal_id.to_string(),
            iat: now_unix_seconds,
            exp: now_unix_seconds + ttl.as_secs() as i64,
        }))
    }

    /// Verify a token and return its decoded claims.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the token is malformed, carries invalid base64/json, or the
    ///   signature does not verify,
    /// - the signing scheme is not HS256,
    /// - the token is at or past its expiry (`Expired` still carries the
    ///   authenticated claims).
    pub fn verify(&self, token: &str, now_unix_seconds: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let claims_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let signature_b64 = parts.next().ok_or(TokenError::Malformed)?;
        if parts.next().is_some() {
            return Err(TokenError::Malformed);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != ALG_HS256 {
            return Err(TokenError::Unsupported(header.alg));
        }

        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature =
            Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Malformed)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if claims.expires_at() <= now_unix_seconds {
            return Err(TokenError::Expired(claims));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fixed clock for stable assertions.
    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(&SecretString::from(
            "0123456789abcdef0123456789abcdef".to_string(),
        ))
    }

    #[test]
    fn access_round_trip_before_ttl() -> Result<(), TokenError> {
        let codec = codec();
        let token = codec.issue_access(42, "alice@example.com", Duration::from_secs(120), NOW)?;

        let claims = codec.verify(&token, NOW + 119)?;
        assert_eq!(
            claims,
            Claims::Access(AccessClaims {
                sub: "42".to_string(),
                email: "alice@example.com".to_string(),
                iat: NOW,
                exp: NOW + 120,
            })
        );
        assert_eq!(claims.principal_id(), Some(42));
        Ok(())
    }

    #[test]
    fn refresh_round_trip_keeps_kind() -> Result<(), TokenError> {
        let codec = codec();
        let token = codec.issue_refresh(42, Duration::from_secs(3600), NOW)?;

        let claims = codec.verify(&token, NOW)?;
        assert!(matches!(claims, Claims::Refresh(_)));
        assert_eq!(claims.subject(), "42");
        Ok(())
    }

    #[test]
    fn rejects_exactly_at_expiry() -> Result<(), TokenError> {
        let codec = codec();
        let token = codec.issue_access(7, "bob@example.com", Duration::from_secs(60), NOW)?;

        // One second before the boundary is still valid.
        assert!(codec.verify(&token, NOW + 59).is_ok());

        let result = codec.verify(&token, NOW + 60);
        let Err(TokenError::Expired(claims)) = result else {
            panic!("expected Expired, got {result:?}");
        };
        assert_eq!(claims.principal_id(), Some(7));
        Ok(())
    }

    #[test]
    fn expired_still_carries_claims() -> Result<(), TokenError> {
        let codec = codec();
        let token = codec.issue_refresh(9, Duration::from_secs(10), NOW)?;

        match codec.verify(&token, NOW + 9999) {
            Err(TokenError::Expired(claims)) => {
                assert_eq!(claims.principal_id(), Some(9));
            }
            other => panic!("expected Expired, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn rejects_tampered_signature() -> Result<(), TokenError> {
        let codec = codec();
        let token = codec.issue_access(42, "alice@example.com", Duration::from_secs(60), NOW)?;

        let last = if token.ends_with('x') { 'y' } else { 'x' };
        let mut tampered = token[..token.len() - 1].to_string();
        tampered.push(last);

        assert!(matches!(
            codec.verify(&tampered, NOW),
            Err(TokenError::Malformed)
        ));
        Ok(())
    }

    #[test]
    fn rejects_foreign_key() -> Result<(), TokenError> {
        let token = codec().issue_refresh(42, Duration::from_secs(60), NOW)?;
        let other = TokenCodec::new(&SecretString::from("another-secret".to_string()));

        assert!(matches!(
            other.verify(&token, NOW),
            Err(TokenError::Malformed)
        ));
        Ok(())
    }

    #[test]
    fn rejects_unsupported_alg() -> Result<(), TokenError> {
        let header = TokenHeader {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        };
        let claims = Claims::Refresh(RefreshClaims {
            sub: "42".to_string(),
            iat: NOW,
            exp: NOW + 60,
        });
        let token = format!("{}.{}.", b64e_json(&header)?, b64e_json(&claims)?);

        assert!(matches!(
            codec().verify(&token, NOW),
            Err(TokenError::Unsupported(alg)) if alg == "none"
        ));
        Ok(())
    }

    #[test]
    fn rejects_wrong_shape() {
        let codec = codec();
        assert!(matches!(codec.verify("", NOW), Err(TokenError::Malformed)));
        assert!(matches!(
            codec.verify("a.b", NOW),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            codec.verify("a.b.c.d", NOW),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            codec.verify("not base64.at all.%%%", NOW),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn subject_must_be_numeric_for_principal_id() -> Result<(), TokenError> {
        let codec = codec();
        let token = codec.sign(&Claims::Refresh(RefreshClaims {
            sub: "not-a-number".to_string(),
            iat: NOW,
            exp: NOW + 60,
        }))?;

        let claims = codec.verify(&token, NOW)?;
        assert_eq!(claims.principal_id(), None);
        Ok(())
    }
}
