use crate::{
    crypto::{CipherError, FieldCipher},
    domain::{NewSubscriber, SubscriberEmail},
    state::AppState,
};
use axum::extract::FromRef;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Persistence of newsletter subscribers.
///
/// Names and emails go through the [`FieldCipher`] on the way in and out, so
/// every lookup is done on the derived `ident` or on the verification token.
#[derive(Debug, Clone)]
pub struct SubscriberService {
    db_pool: Arc<PgPool>,
    cipher: Arc<FieldCipher>,
}

/// A subscriber with its details decrypted.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub validated: bool,
}

/// A validated subscriber that can receive newsletter issues.
#[derive(Debug)]
pub struct ValidatedSubscriber {
    pub email: SubscriberEmail,
}

#[derive(sqlx::FromRow)]
struct SubscriberRow {
    id: Uuid,
    full_name: String,
    email: String,
    validated: bool,
}

impl SubscriberService {
    pub fn new(db_pool: Arc<PgPool>, cipher: Arc<FieldCipher>) -> Self {
        Self { db_pool, cipher }
    }

    /// Check if anyone is registered with the given identifier.
    #[tracing::instrument(name = "Check for existing subscriber", skip(self))]
    pub async fn ident_exists(&self, ident: &str) -> Result<bool, SubscriberServiceError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as(r#"SELECT id FROM subscribers WHERE ident = $1 LIMIT 1"#)
                .bind(ident)
                .fetch_optional(self.db_pool.as_ref())
                .await
                .map_err(SubscriberServiceError::DbError)?;

        Ok(row.is_some())
    }

    /// Insert a new, not yet validated, subscriber.
    #[tracing::instrument(
        name = "Saving new subscriber details in database",
        skip(self, new_subscriber, token)
    )]
    pub async fn insert(
        &self,
        new_subscriber: &NewSubscriber,
        ident: &str,
        token: &str,
    ) -> Result<Uuid, SubscriberServiceError> {
        let full_name = self
            .cipher
            .encrypt(new_subscriber.name.as_ref())
            .map_err(SubscriberServiceError::CipherError)?;
        let email = self
            .cipher
            .encrypt(new_subscriber.email.as_ref())
            .map_err(SubscriberServiceError::CipherError)?;

        let subscriber_id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO subscribers (id, full_name, email, ident, validated, token, subscribed_at)
               VALUES ($1, $2, $3, $4, FALSE, $5, $6)"#,
        )
        .bind(subscriber_id)
        .bind(full_name)
        .bind(email)
        .bind(ident)
        .bind(token)
        .bind(Utc::now())
        .execute(self.db_pool.as_ref())
        .await
        .map_err(|e| {
            tracing::error!("Failed to execute query: {e:?}");
            SubscriberServiceError::DbError(e)
        })?;
        tracing::info!("New subscriber details have been saved");

        Ok(subscriber_id)
    }

    /// Retrieve the ids of every subscriber holding exactly this token.
    /// Tokens are not constrained to be unique, so this can be more than one.
    #[tracing::instrument(name = "Get subscriber ids from token", skip(self, token))]
    pub async fn ids_with_token(&self, token: &str) -> Result<Vec<Uuid>, SubscriberServiceError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(r#"SELECT id FROM subscribers WHERE token = $1"#)
            .bind(token)
            .fetch_all(self.db_pool.as_ref())
            .await
            .map_err(SubscriberServiceError::DbError)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Mark the subscriber as validated and consume their token.
    #[tracing::instrument(name = "Mark subscriber as validated", skip(self))]
    pub async fn mark_validated(&self, subscriber_id: Uuid) -> Result<(), SubscriberServiceError> {
        sqlx::query(r#"UPDATE subscribers SET validated = TRUE, token = NULL WHERE id = $1"#)
            .bind(subscriber_id)
            .execute(self.db_pool.as_ref())
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {e:?}");
                SubscriberServiceError::DbError(e)
            })?;
        Ok(())
    }

    /// Delete every subscriber registered with the identifier. Returns how
    /// many were removed.
    #[tracing::instrument(name = "Delete subscribers", skip(self))]
    pub async fn delete_by_ident(&self, ident: &str) -> Result<u64, SubscriberServiceError> {
        let result = sqlx::query(r#"DELETE FROM subscribers WHERE ident = $1"#)
            .bind(ident)
            .execute(self.db_pool.as_ref())
            .await
            .map_err(SubscriberServiceError::DbError)?;

        tracing::info!("Removed {} subscriber(s)", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Get all validated subscribers. Entries whose stored details cannot be
    /// decrypted or are not a valid email are returned as errors, so the
    /// caller can decide to skip them.
    #[tracing::instrument(name = "Get validated subscribers", skip(self))]
    pub async fn validated_subscribers(
        &self,
    ) -> Result<Vec<Result<ValidatedSubscriber, anyhow::Error>>, SubscriberServiceError> {
        let rows: Vec<(String,)> =
            sqlx::query_as(r#"SELECT email FROM subscribers WHERE validated = TRUE"#)
                .fetch_all(self.db_pool.as_ref())
                .await
                .map_err(SubscriberServiceError::DbError)?;

        let validated_subscribers = rows
            .into_iter()
            .map(|(email,)| {
                let email = self
                    .cipher
                    .decrypt(&email)
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                SubscriberEmail::parse(email)
                    .map(|email| ValidatedSubscriber { email })
                    .map_err(|e| anyhow::anyhow!(e))
            })
            .collect();

        Ok(validated_subscribers)
    }

    /// List every subscriber for the admin console.
    #[tracing::instrument(name = "List subscribers", skip(self))]
    pub async fn all(&self) -> Result<Vec<Result<Subscriber, CipherError>>, SubscriberServiceError> {
        let rows: Vec<SubscriberRow> = sqlx::query_as(
            r#"SELECT id, full_name, email, validated FROM subscribers ORDER BY subscribed_at"#,
        )
        .fetch_all(self.db_pool.as_ref())
        .await
        .map_err(SubscriberServiceError::DbError)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                Ok(Subscriber {
                    id: row.id,
                    full_name: self.cipher.decrypt(&row.full_name)?,
                    email: self.cipher.decrypt(&row.email)?,
                    validated: row.validated,
                })
            })
            .collect())
    }
}

impl FromRef<AppState> for SubscriberService {
    fn from_ref(state: &AppState) -> Self {
        SubscriberService::new(state.db_pool().clone(), state.field_cipher().clone())
    }
}

#[derive(thiserror::Error)]
pub enum SubscriberServiceError {
    #[error("Unexpected database error")]
    DbError(#[source] sqlx::Error),
    #[error("Failed to protect the subscriber's details")]
    CipherError(#[source] CipherError),
}
