use crate::{domain::ContentBlock, state::AppState};
use axum::extract::FromRef;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{types::Json, PgPool};
use std::sync::Arc;
use uuid::Uuid;

/// The singleton newsletter index page. Holds the texts shown on the
/// subscription pages and the address newsletter emails are sent from.
#[derive(Debug, Clone, sqlx::FromRow, serde::Deserialize)]
pub struct NewsletterIndex {
    pub intro_text: String,
    pub subscription_from_email: String,
    pub organization_name: String,
    pub subscribe_heading: String,
    pub subscribe_text: String,
    pub subscribe_success_heading: String,
    pub subscribe_success_text: String,
    pub subscribe_fail_heading: String,
    pub subscribe_fail_text: String,
    pub unsubscribe_heading: String,
    pub unsubscribe_text: String,
    pub unsubscribe_success_heading: String,
    pub unsubscribe_success_text: String,
    pub validate_success_heading: String,
    pub validate_success_text: String,
    pub validate_fail_heading: String,
    pub validate_fail_text: String,
}

/// One newsletter issue page. An alias page carries a copy of its target's
/// fields and points back to it through `alias_of`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NewsletterIssue {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub date: NaiveDate,
    pub teaser: String,
    pub email_text: String,
    pub body: Json<Vec<ContentBlock>>,
    pub notify_subscribers: bool,
    pub live: bool,
    pub alias_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsletterIssue {
    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.body
    }
}

/// Fields needed to create a draft issue.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub slug: String,
    pub author: String,
    pub date: NaiveDate,
    pub teaser: String,
    pub email_text: String,
    pub body: Vec<ContentBlock>,
    pub notify_subscribers: bool,
}

const ISSUE_COLUMNS: &str = "id, title, slug, author, date, teaser, email_text, body, \
    notify_subscribers, live, alias_of, created_at, published_at";

/// Service around the newsletter index and issue pages.
#[derive(Debug, Clone)]
pub struct PageService {
    db_pool: Arc<PgPool>,
}

impl PageService {
    pub fn new(db_pool: Arc<PgPool>) -> Self {
        Self { db_pool }
    }

    /// Create the newsletter index if it does not exist yet.
    #[tracing::instrument(name = "Ensure newsletter index exists", skip(self))]
    pub async fn ensure_index(&self, default_sender: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO newsletter_index (id, subscription_from_email)
               VALUES (TRUE, $1)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(default_sender)
        .execute(self.db_pool.as_ref())
        .await?;
        Ok(())
    }

    #[tracing::instrument(name = "Get newsletter index", skip(self))]
    pub async fn index(&self) -> Result<NewsletterIndex, sqlx::Error> {
        sqlx::query_as(r#"SELECT * FROM newsletter_index WHERE id"#)
            .fetch_one(self.db_pool.as_ref())
            .await
    }

    /// Replace the editable fields of the newsletter index.
    #[tracing::instrument(name = "Update newsletter index", skip_all)]
    pub async fn update_index(&self, index: &NewsletterIndex) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE newsletter_index SET
                intro_text = $1,
                subscription_from_email = $2,
                organization_name = $3,
                subscribe_heading = $4,
                subscribe_text = $5,
                subscribe_success_heading = $6,
                subscribe_success_text = $7,
                subscribe_fail_heading = $8,
                subscribe_fail_text = $9,
                unsubscribe_heading = $10,
                unsubscribe_text = $11,
                unsubscribe_success_heading = $12,
                unsubscribe_success_text = $13,
                validate_success_heading = $14,
                validate_success_text = $15,
                validate_fail_heading = $16,
                validate_fail_text = $17
            WHERE id"#,
        )
        .bind(&index.intro_text)
        .bind(&index.subscription_from_email)
        .bind(&index.organization_name)
        .bind(&index.subscribe_heading)
        .bind(&index.subscribe_text)
        .bind(&index.subscribe_success_heading)
        .bind(&index.subscribe_success_text)
        .bind(&index.subscribe_fail_heading)
        .bind(&index.subscribe_fail_text)
        .bind(&index.unsubscribe_heading)
        .bind(&index.unsubscribe_text)
        .bind(&index.unsubscribe_success_heading)
        .bind(&index.unsubscribe_success_text)
        .bind(&index.validate_success_heading)
        .bind(&index.validate_success_text)
        .bind(&index.validate_fail_heading)
        .bind(&index.validate_fail_text)
        .execute(self.db_pool.as_ref())
        .await?;
        Ok(())
    }

    /// Live issues, excluding aliases, newest first.
    #[tracing::instrument(name = "Get live newsletter issues", skip(self))]
    pub async fn live_issues(&self) -> Result<Vec<NewsletterIssue>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {ISSUE_COLUMNS} FROM newsletter_issues \
             WHERE live AND alias_of IS NULL \
             ORDER BY date DESC, published_at DESC"
        ))
        .fetch_all(self.db_pool.as_ref())
        .await
    }

    #[tracing::instrument(name = "Get latest newsletter issue", skip(self))]
    pub async fn latest_issue(&self) -> Result<Option<NewsletterIssue>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {ISSUE_COLUMNS} FROM newsletter_issues \
             WHERE live AND alias_of IS NULL \
             ORDER BY date DESC, published_at DESC \
             LIMIT 1"
        ))
        .fetch_optional(self.db_pool.as_ref())
        .await
    }

    #[tracing::instrument(name = "Get live newsletter issue by slug", skip(self))]
    pub async fn live_issue_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<NewsletterIssue>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {ISSUE_COLUMNS} FROM newsletter_issues WHERE live AND slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.db_pool.as_ref())
        .await
    }

    #[tracing::instrument(name = "Get newsletter issue", skip(self))]
    pub async fn issue(&self, issue_id: Uuid) -> Result<Option<NewsletterIssue>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {ISSUE_COLUMNS} FROM newsletter_issues WHERE id = $1"
        ))
        .bind(issue_id)
        .fetch_optional(self.db_pool.as_ref())
        .await
    }

    /// All issues, drafts and aliases included, for the admin console.
    #[tracing::instrument(name = "List newsletter issues", skip(self))]
    pub async fn all_issues(&self) -> Result<Vec<NewsletterIssue>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {ISSUE_COLUMNS} FROM newsletter_issues ORDER BY date DESC, created_at DESC"
        ))
        .fetch_all(self.db_pool.as_ref())
        .await
    }

    /// Insert a draft issue.
    #[tracing::instrument(
        name = "Insert newsletter issue",
        skip(self, issue),
        fields(slug = %issue.slug)
    )]
    pub async fn insert_issue(&self, issue: &NewIssue) -> Result<Uuid, sqlx::Error> {
        let issue_id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO newsletter_issues (
                id, title, slug, author, date, teaser, email_text, body,
                notify_subscribers, live, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, now())"#,
        )
        .bind(issue_id)
        .bind(&issue.title)
        .bind(&issue.slug)
        .bind(&issue.author)
        .bind(issue.date)
        .bind(&issue.teaser)
        .bind(&issue.email_text)
        .bind(Json(issue.body.clone()))
        .bind(issue.notify_subscribers)
        .execute(self.db_pool.as_ref())
        .await?;

        Ok(issue_id)
    }

    /// Create a draft alias of an existing issue under a new slug.
    /// The alias copies every field of its target. Returns `None` if the
    /// target does not exist.
    #[tracing::instrument(name = "Insert newsletter issue alias", skip(self))]
    pub async fn insert_alias(
        &self,
        target_id: Uuid,
        slug: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let alias_id = Uuid::new_v4();
        let result = sqlx::query(
            r#"INSERT INTO newsletter_issues (
                id, title, slug, author, date, teaser, email_text, body,
                notify_subscribers, live, alias_of, created_at
            )
            SELECT $1, title, $2, author, date, teaser, email_text, body,
                notify_subscribers, FALSE, id, now()
            FROM newsletter_issues
            WHERE id = $3"#,
        )
        .bind(alias_id)
        .bind(slug)
        .bind(target_id)
        .execute(self.db_pool.as_ref())
        .await?;

        Ok((result.rows_affected() == 1).then_some(alias_id))
    }

    /// Make an issue live. Returns the issue as it is after publishing, or
    /// `None` if it does not exist.
    #[tracing::instrument(name = "Mark newsletter issue as published", skip(self))]
    pub async fn mark_published(
        &self,
        issue_id: Uuid,
    ) -> Result<Option<NewsletterIssue>, sqlx::Error> {
        sqlx::query_as(&format!(
            "UPDATE newsletter_issues SET live = TRUE, published_at = now() \
             WHERE id = $1 \
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(issue_id)
        .fetch_optional(self.db_pool.as_ref())
        .await
    }

    /// Reset the one-shot notify flag once subscribers have been notified.
    #[tracing::instrument(name = "Clear notify flag", skip(self))]
    pub async fn clear_notify_flag(&self, issue_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(r#"UPDATE newsletter_issues SET notify_subscribers = FALSE WHERE id = $1"#)
            .bind(issue_id)
            .execute(self.db_pool.as_ref())
            .await?;
        Ok(())
    }
}

impl FromRef<AppState> for PageService {
    fn from_ref(state: &AppState) -> Self {
        PageService::new(state.db_pool().clone())
    }
}
