//! Connection handshake authentication.
//!
//! Runs exactly once per connection, against the CONNECT frame that opens it.
//! Later frames on an admitted connection inherit the attached identity and
//! are never re-verified. Rejection happens before any subscribe or publish
//! frame is processed, so there is no partial state to clean up.

use thiserror::Error;

use crate::auth::token::{Claims, TokenCodec};
use crate::auth::PrincipalId;

use super::frame::{Command, Frame};

const AUTHORIZATION_HEADER: &str = "Authorization";

/// Identity a connection carries for its whole lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionIdentity {
    pub principal_id: PrincipalId,
    pub email: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("expected a CONNECT frame to open the session")]
    ExpectedConnect,
    #[error("missing Authorization header on CONNECT")]
    MissingCredential,
    #[error("connect credential rejected")]
    InvalidCredential,
}

/// Verify the handshake frame and produce the connection's identity.
///
/// # Errors
///
/// Returns an error when the frame is not CONNECT, carries no bearer
/// credential, or carries one that fails access-token verification.
pub fn admit(
    frame: &Frame,
    codec: &TokenCodec,
    now_unix_seconds: i64,
) -> Result<ConnectionIdentity, HandshakeError> {
    if frame.command != Command::Connect {
        return Err(HandshakeError::ExpectedConnect);
    }

    let header = frame
        .header(AUTHORIZATION_HEADER)
        .ok_or(HandshakeError::MissingCredential)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(HandshakeError::MissingCredential)?
        .trim();

    match codec.verify(token, now_unix_seconds) {
        Ok(Claims::Access(claims)) => {
            let principal_id = claims
                .sub
                .parse::<PrincipalId>()
                .map_err(|_| HandshakeError::InvalidCredential)?;
            Ok(ConnectionIdentity {
                principal_id,
                email: claims.email,
            })
        }
        Ok(Claims::Refresh(_)) | Err(_) => Err(HandshakeError::InvalidCredential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(&SecretString::from("test-secret".to_string()))
    }

    fn connect_frame(authorization: &str) -> Frame {
        Frame::new(Command::Connect).with_header(AUTHORIZATION_HEADER, authorization)
    }

    #[test]
    fn admits_valid_access_token() {
        let codec = codec();
        let token = codec
            .issue_access(42, "alice@example.com", Duration::from_secs(60), NOW)
            .expect("signing succeeds");

        let identity =
            admit(&connect_frame(&format!("Bearer {token}")), &codec, NOW).expect("admitted");
        assert_eq!(identity.principal_id, 42);
        assert_eq!(identity.email, "alice@example.com");
    }

    #[test]
    fn rejects_tampered_token() {
        let codec = codec();
        let token = codec
            .issue_access(42, "alice@example.com", Duration::from_secs(60), NOW)
            .expect("signing succeeds");

        let last = if token.ends_with('x') { 'y' } else { 'x' };
        let mut tampered = token[..token.len() - 1].to_string();
        tampered.push(last);

        assert_eq!(
            admit(&connect_frame(&format!("Bearer {tampered}")), &codec, NOW),
            Err(HandshakeError::InvalidCredential)
        );
    }

    #[test]
    fn rejects_missing_or_non_bearer_header() {
        let codec = codec();

        assert_eq!(
            admit(&Frame::new(Command::Connect), &codec, NOW),
            Err(HandshakeError::MissingCredential)
        );
        assert_eq!(
            admit(&connect_frame("Basic abc"), &codec, NOW),
            Err(HandshakeError::MissingCredential)
        );
    }

    #[test]
    fn rejects_expired_and_refresh_tokens() {
        let codec = codec();

        let expired = codec
            .issue_access(42, "alice@example.com", Duration::from_secs(60), NOW - 120)
            .expect("signing succeeds");
        assert_eq!(
            admit(&connect_frame(&format!("Bearer {expired}")), &codec, NOW),
            Err(HandshakeError::InvalidCredential)
        );

        let refresh = codec
            .issue_refresh(42, Duration::from_secs(60), NOW)
            .expect("signing succeeds");
        assert_eq!(
            admit(&connect_frame(&format!("Bearer {refresh}")), &codec, NOW),
            Err(HandshakeError::InvalidCredential)
        );
    }

    #[test]
    fn rejects_non_connect_first_frame() {
        let codec = codec();
        let frame = Frame::new(Command::Subscribe).with_header("destination", "/topic/room.1");

        assert_eq!(
            admit(&frame, &codec, NOW),
            Err(HandshakeError::ExpectedConnect)
        );
    }
}
