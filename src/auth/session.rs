//! Session manager: login, reissue, logout.
//!
//! Invariant: at most one refresh token is valid for a principal at any time.
//! The session store holds the authoritative value; rotation removes the old
//! entry and writes the new one through a single conditional take, so two
//! concurrent reissue calls for the same principal cannot both succeed and a
//! crash mid-rotation forces a fresh login instead of leaving two valid
//! refresh tokens outstanding.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::config::AuthConfig;
use super::directory::{DirectoryError, PrincipalDirectory};
use super::identity::{ExchangeError, IdentityExchange};
use super::store::{SessionStore, StoreError, TakeOutcome};
use super::token::{Claims, TokenCodec, TokenError};
use super::{unix_now, PrincipalId};

#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider was unreachable or rejected the code. Fatal to
    /// login; not retried within the call.
    #[error("identity provider exchange failed")]
    UpstreamAuthFailure(#[from] ExchangeError),
    #[error("no refresh credential presented")]
    MissingCredential,
    #[error("presented credential failed verification")]
    InvalidCredential,
    #[error("credential carries no usable principal id")]
    SubjectMissing,
    #[error("no principal found for id {0}")]
    PrincipalNotFound(PrincipalId),
    /// The presented refresh token is not the one the store holds for its
    /// principal (superseded, revoked, or never issued by us).
    #[error("presented credential does not match the active session")]
    SessionMismatch,
    #[error("session store operation failed")]
    Store(#[from] StoreError),
    #[error("principal directory operation failed")]
    Directory(#[from] DirectoryError),
}

/// Token pair minted by a successful login or reissue.
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub principal_id: PrincipalId,
    pub access_token: String,
    pub refresh_token: String,
    pub access_ttl_seconds: u64,
}

pub struct SessionManager {
    codec: TokenCodec,
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn PrincipalDirectory>,
    exchange: Arc<dyn IdentityExchange>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn PrincipalDirectory>,
        exchange: Arc<dyn IdentityExchange>,
    ) -> Self {
        Self {
            codec: TokenCodec::new(config.token_secret()),
            store,
            directory,
            exchange,
            access_ttl: Duration::from_secs(config.access_ttl_seconds()),
            refresh_ttl: Duration::from_secs(config.refresh_ttl_seconds()),
        }
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Exchange an authorization code for a fresh token pair.
    ///
    /// A prior session for the same principal is overwritten: login always
    /// wins over a stale session.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamAuthFailure` when the provider exchange fails, or an
    /// infrastructure error from the directory/store.
    pub async fn login(&self, code: &str) -> Result<IssuedSession, AuthError> {
        let identity = self.exchange.exchange(code).await?;
        let principal = self.directory.find_or_create(&identity).await?;

        // Reconcile cached profile fields with the freshly fetched identity.
        // Best-effort: a failure here must not abort the login.
        if principal.email != identity.email || principal.display_name != identity.display_name {
            if let Err(err) = self
                .directory
                .update_profile(principal.id, &identity.email, &identity.display_name)
                .await
            {
                warn!(
                    "failed to reconcile profile for principal {}: {err}",
                    principal.id
                );
            }
        }

        let session = self.mint(principal.id, &identity.email).await?;
        info!("login issued session for principal {}", session.principal_id);
        Ok(session)
    }

    /// Rotate a refresh token: verify it, conditionally remove the stored
    /// value, and mint a fresh pair.
    ///
    /// # Errors
    ///
    /// Returns a credential-class error (`MissingCredential`,
    /// `InvalidCredential`, `SubjectMissing`, `SessionMismatch`,
    /// `PrincipalNotFound`) when the presented token cannot be rotated, or an
    /// infrastructure error from the directory/store.
    pub async fn reissue(&self, presented: Option<&str>) -> Result<IssuedSession, AuthError> {
        let presented = presented.ok_or(AuthError::MissingCredential)?;

        let claims = match self.codec.verify(presented, unix_now()) {
            Ok(claims) => claims,
            Err(err) => {
                debug!("reissue rejected: {err}");
                return Err(AuthError::InvalidCredential);
            }
        };
        let Claims::Refresh(refresh) = claims else {
            debug!("reissue rejected: access token presented as refresh");
            return Err(AuthError::InvalidCredential);
        };
        let principal_id = refresh
            .sub
            .parse::<PrincipalId>()
            .map_err(|_| AuthError::SubjectMissing)?;

        // Rotation: a single conditional take against the store. Exactly one
        // of several concurrent callers presenting the same token gets
        // `Removed`; a stale or foreign token never disturbs the live entry.
        match self.store.take_matching(principal_id, presented).await? {
            TakeOutcome::Removed => {}
            TakeOutcome::Mismatch => {
                warn!("reissue for principal {principal_id}: presented token is not the active one");
                return Err(AuthError::SessionMismatch);
            }
            TakeOutcome::Missing => {
                warn!("reissue for principal {principal_id}: no active session");
                return Err(AuthError::SessionMismatch);
            }
        }

        let principal = self
            .directory
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::PrincipalNotFound(principal_id))?;

        let session = self.mint(principal.id, &principal.email).await?;
        debug!("rotated refresh token for principal {principal_id}");
        Ok(session)
    }

    /// Clear the server-side session for the presented refresh token.
    ///
    /// Best-effort by contract: a missing, unverifiable, or subject-less
    /// token degrades to a no-op so clients can always clear their local
    /// state. An expired but authentic token still identifies the session to
    /// delete.
    pub async fn logout(&self, presented: Option<&str>) {
        let Some(token) = presented else {
            debug!("logout without refresh credential");
            return;
        };

        let claims = match self.codec.verify(token, unix_now()) {
            Ok(claims) => claims,
            Err(TokenError::Expired(claims)) => claims,
            Err(err) => {
                warn!("logout: refresh credential rejected: {err}");
                return;
            }
        };
        let Some(principal_id) = claims.principal_id() else {
            warn!("logout: credential carries no principal id");
            return;
        };

        match self.store.delete(principal_id).await {
            Ok(()) => info!("logout cleared session for principal {principal_id}"),
            Err(err) => error!("logout: failed to clear session for principal {principal_id}: {err}"),
        }
    }

    async fn mint(
        &self,
        principal_id: PrincipalId,
        email: &str,
    ) -> Result<IssuedSession, AuthError> {
        let now = unix_now();
        let access_token = self
            .codec
            .issue_access(principal_id, email, self.access_ttl, now)
            .map_err(|_| AuthError::InvalidCredential)?;
        let refresh_token = self
            .codec
            .issue_refresh(principal_id, self.refresh_ttl, now)
            .map_err(|_| AuthError::InvalidCredential)?;

        self.store
            .put(principal_id, &refresh_token, self.refresh_ttl)
            .await?;

        Ok(IssuedSession {
            principal_id,
            access_token,
            refresh_token,
            access_ttl_seconds: self.access_ttl.as_secs(),
        })
    }
}
