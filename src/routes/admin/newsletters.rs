use crate::{
    authorization::AdminUser,
    routes::newsletter::RESERVED_SLUGS,
    domain::ContentBlock,
    email_client::EmailClient,
    notification::{on_page_event, NotificationError, NotificationSummary, PageEvent},
    service::{NewIssue, NewsletterIssue, PageService, SubscriberService},
};
use askama::Template;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use http::StatusCode;
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

const MAX_TEASER_LENGTH: usize = 150;

#[derive(Template)]
#[template(path = "admin/newsletters.html")]
struct NewslettersTemplate {
    issues: Vec<NewsletterIssue>,
}

/// List every issue with its date and teaser.
#[tracing::instrument(name = "Admin newsletter list", skip(pages))]
pub async fn list_newsletters(
    _admin: AdminUser,
    State(pages): State<PageService>,
) -> Result<impl IntoResponse, AdminNewsletterError> {
    let issues = pages
        .all_issues()
        .await
        .map_err(AdminNewsletterError::DbError)?;
    Ok(NewslettersTemplate { issues })
}

#[derive(Debug, serde::Deserialize)]
pub struct NewIssueData {
    title: String,
    slug: Option<String>,
    author: String,
    date: Option<NaiveDate>,
    teaser: String,
    email_text: String,
    #[serde(default)]
    body: Vec<ContentBlock>,
    #[serde(default)]
    notify_subscribers: bool,
}

impl TryFrom<NewIssueData> for NewIssue {
    type Error = String;

    fn try_from(value: NewIssueData) -> Result<Self, Self::Error> {
        if value.title.trim().is_empty() {
            return Err("The title cannot be empty.".to_string());
        }
        if value.author.trim().is_empty() {
            return Err("The author cannot be empty.".to_string());
        }
        if value.teaser.graphemes(true).count() > MAX_TEASER_LENGTH {
            return Err(format!(
                "The teaser cannot be longer than {MAX_TEASER_LENGTH} characters."
            ));
        }
        for block in &value.body {
            block.validate()?;
        }

        let slug = parse_slug(value.slug.as_deref().unwrap_or(&value.title))?;

        Ok(Self {
            title: value.title,
            slug,
            author: value.author,
            date: value.date.unwrap_or_else(|| Utc::now().date_naive()),
            teaser: value.teaser,
            email_text: value.email_text,
            body: value.body,
            notify_subscribers: value.notify_subscribers,
        })
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CreatedIssue {
    id: Uuid,
    slug: String,
}

/// Create a draft issue. It is not visible until published.
#[tracing::instrument(
    name = "Create newsletter issue",
    skip(pages, body),
    fields(title = %body.title)
)]
pub async fn create_newsletter(
    _admin: AdminUser,
    State(pages): State<PageService>,
    Json(body): Json<NewIssueData>,
) -> Result<impl IntoResponse, AdminNewsletterError> {
    let new_issue: NewIssue = body.try_into().map_err(AdminNewsletterError::InvalidIssue)?;

    let id = pages.insert_issue(&new_issue).await.map_err(|e| {
        if is_unique_violation(&e) {
            AdminNewsletterError::SlugTaken(new_issue.slug.clone())
        } else {
            AdminNewsletterError::DbError(e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedIssue {
            id,
            slug: new_issue.slug,
        }),
    ))
}

#[derive(Debug, serde::Deserialize)]
pub struct AliasData {
    slug: String,
}

/// Create a draft page that shows an existing issue under another slug.
#[tracing::instrument(name = "Create newsletter issue alias", skip(pages))]
pub async fn create_alias(
    _admin: AdminUser,
    State(pages): State<PageService>,
    Path(issue_id): Path<Uuid>,
    Json(body): Json<AliasData>,
) -> Result<impl IntoResponse, AdminNewsletterError> {
    let slug = parse_slug(&body.slug).map_err(AdminNewsletterError::InvalidIssue)?;

    let id = pages
        .insert_alias(issue_id, &slug)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AdminNewsletterError::SlugTaken(slug.clone())
            } else {
                AdminNewsletterError::DbError(e)
            }
        })?
        .ok_or(AdminNewsletterError::NotFound(issue_id))?;

    Ok((StatusCode::CREATED, Json(CreatedIssue { id, slug })))
}

#[derive(Debug, serde::Serialize)]
pub struct PublishedIssue {
    id: Uuid,
    slug: String,
    notification: Option<NotificationSummary>,
}

/// Make an issue live and let the notification hook react to it.
#[tracing::instrument(name = "Publish newsletter issue", skip(pages, subscribers, email_client))]
pub async fn publish_newsletter(
    _admin: AdminUser,
    State(pages): State<PageService>,
    State(subscribers): State<SubscriberService>,
    State(email_client): State<Arc<EmailClient>>,
    Path(issue_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminNewsletterError> {
    let issue = pages
        .mark_published(issue_id)
        .await
        .map_err(AdminNewsletterError::DbError)?
        .ok_or(AdminNewsletterError::NotFound(issue_id))?;
    tracing::info!(slug = %issue.slug, "Newsletter issue is live");

    let id = issue.id;
    let slug = issue.slug.clone();
    let event = PageEvent::Published(issue);
    let notification = on_page_event(&event, &pages, &subscribers, &email_client)
        .await
        .map_err(AdminNewsletterError::NotificationError)?;

    Ok(Json(PublishedIssue {
        id,
        slug,
        notification,
    }))
}

/// Turn a title into a url friendly slug: lowercase letters and digits
/// separated by single dashes.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Slugify a value and check it can be served as an issue page.
fn parse_slug(value: &str) -> Result<String, String> {
    let slug = slugify(value);
    if slug.is_empty() {
        return Err("The slug must contain at least one letter or digit.".to_string());
    }
    if RESERVED_SLUGS.contains(&slug.as_str()) {
        return Err(format!("The slug '{slug}' is reserved."));
    }
    Ok(slug)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_error) if db_error.is_unique_violation())
}

#[derive(thiserror::Error)]
pub enum AdminNewsletterError {
    #[error("{0}")]
    InvalidIssue(String),
    #[error("Newsletter issue {0} does not exist")]
    NotFound(Uuid),
    #[error("The slug '{0}' is already in use")]
    SlugTaken(String),
    #[error("Unexpected database error")]
    DbError(#[source] sqlx::Error),
    #[error("Failed to notify subscribers")]
    NotificationError(#[source] NotificationError),
}

impl IntoResponse for AdminNewsletterError {
    fn into_response(self) -> Response {
        tracing::error!("{self:?}");
        match self {
            Self::InvalidIssue(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()).into_response()
            }
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            Self::SlugTaken(_) => (StatusCode::CONFLICT, self.to_string()).into_response(),
            Self::DbError(_) | Self::NotificationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
