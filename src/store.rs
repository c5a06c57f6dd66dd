use sqlx::PgPool;

use crate::domain::VerificationToken;

/// Single table of interest registrations, one row per email address.
///
/// Each operation is a single auto-committing statement; the unique key on
/// `email` plus the affected-row-count assertions are the only concurrency
/// guards this service needs.
pub struct RegistrationStore {
    pool: PgPool,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database query failed")]
    Database(#[from] sqlx::Error),
    #[error("expected exactly one row to be affected, got {0}")]
    RowCount(u64),
}

impl RegistrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(name = "Check for an already verified email", skip(self))]
    pub async fn is_verified(&self, email: &str) -> Result<bool, StoreError> {
        let found: i64 = sqlx::query_scalar(
            "SELECT count(email) FROM registrations WHERE email = $1 AND token_verified = true",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(found != 0)
    }

    /// Insert a pending registration, or rotate the token and challenge flag
    /// of an existing unverified one.
    #[tracing::instrument(name = "Store pending registration", skip(self, token))]
    pub async fn upsert_pending(
        &self,
        email: &str,
        token: &VerificationToken,
        passed_challenge: bool,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"INSERT INTO registrations (email, token, passed_challenge_check, created_at)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (email)
                   DO UPDATE
                       SET token = $2, passed_challenge_check = $3"#,
        )
        .bind(email)
        .bind(token.as_str())
        .bind(passed_challenge)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        single_row(result.rows_affected())
    }

    /// Whether the token exists, and if so whether it is already verified.
    #[tracing::instrument(name = "Look up verification token", skip(self, token))]
    pub async fn token_state(
        &self,
        token: &VerificationToken,
    ) -> Result<Option<bool>, StoreError> {
        let state: Option<bool> =
            sqlx::query_scalar("SELECT token_verified FROM registrations WHERE token = $1")
                .bind(token.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(state)
    }

    #[tracing::instrument(name = "Mark registration verified", skip(self, token))]
    pub async fn mark_verified(&self, token: &VerificationToken) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE registrations SET token_verified = true WHERE token = $1")
                .bind(token.as_str())
                .execute(&self.pool)
                .await?;

        single_row(result.rows_affected())
    }

    #[tracing::instrument(name = "Retrieve email for verified token", skip(self, token))]
    pub async fn email_for_token(&self, token: &VerificationToken) -> Result<String, StoreError> {
        let email: String = sqlx::query_scalar("SELECT email FROM registrations WHERE token = $1")
            .bind(token.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(email)
    }
}

// Anything other than exactly one affected row on a keyed write is a logic or
// concurrency bug, not an I/O failure.
fn single_row(affected: u64) -> Result<(), StoreError> {
    if affected != 1 {
        return Err(StoreError::RowCount(affected));
    }
    Ok(())
}
