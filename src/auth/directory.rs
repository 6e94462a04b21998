//! Principal directory: maps provider identities to local principals.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::Instrument;

use super::identity::VerifiedIdentity;
use super::PrincipalId;

/// Local identity record. The directory assigns the id; the auth core only
/// reads id and email to embed them in credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("principal directory query failed")]
    Database(#[from] sqlx::Error),
}

/// Lookup and registration keyed by (provider, provider-subject-id).
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Resolve the principal for a verified identity, creating one on first
    /// sight.
    async fn find_or_create(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<Principal, DirectoryError>;

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, DirectoryError>;

    /// Overwrite the cached email/display-name with freshly fetched values.
    async fn update_profile(
        &self,
        id: PrincipalId,
        email: &str,
        display_name: &str,
    ) -> Result<(), DirectoryError>;
}

pub struct PgPrincipalDirectory {
    pool: PgPool,
}

impl PgPrincipalDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_subject(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<Option<Principal>, DirectoryError> {
        let query =
            "SELECT id, email, display_name FROM principals WHERE provider = $1 AND subject_id = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identity.provider.as_str())
            .bind(&identity.subject)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| Principal {
            id: row.get("id"),
            email: row.get("email"),
            display_name: row.get("display_name"),
        }))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl PrincipalDirectory for PgPrincipalDirectory {
    async fn find_or_create(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<Principal, DirectoryError> {
        if let Some(principal) = self.find_by_subject(identity).await? {
            return Ok(principal);
        }

        let query = r"
            INSERT INTO principals
                (provider, subject_id, email, display_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identity.provider.as_str())
            .bind(&identity.subject)
            .bind(&identity.email)
            .bind(&identity.display_name)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(Principal {
                id: row.get("id"),
                email: identity.email.clone(),
                display_name: identity.display_name.clone(),
            }),
            Err(err) if is_unique_violation(&err) => {
                // A concurrent first login won the insert; read its row.
                match self.find_by_subject(identity).await? {
                    Some(principal) => Ok(principal),
                    None => Err(DirectoryError::Database(err)),
                }
            }
            Err(err) => Err(DirectoryError::Database(err)),
        }
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, DirectoryError> {
        let query = "SELECT id, email, display_name FROM principals WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| Principal {
            id: row.get("id"),
            email: row.get("email"),
            display_name: row.get("display_name"),
        }))
    }

    async fn update_profile(
        &self,
        id: PrincipalId,
        email: &str,
        display_name: &str,
    ) -> Result<(), DirectoryError> {
        let query = r"
            UPDATE principals
            SET email = $2, display_name = $3, updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(email)
            .bind(display_name)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }
}
