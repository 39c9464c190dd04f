use super::{PageError, INDEX_PATH};
use crate::service::{NewsletterIndex, NewsletterIssue, PageService};
use askama::Template;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use http::StatusCode;

#[derive(Template)]
#[template(path = "newsletter/index.html")]
struct IndexTemplate {
    index: NewsletterIndex,
    issues: Vec<NewsletterIssue>,
}

#[derive(Template)]
#[template(path = "newsletter/issue.html")]
struct IssueTemplate {
    issue: NewsletterIssue,
}

/// The newsletter index page with every live issue, newest first.
#[tracing::instrument(name = "Newsletter index page", skip(pages))]
pub async fn index(State(pages): State<PageService>) -> Result<impl IntoResponse, PageError> {
    let index = pages.index().await.map_err(PageError::DbError)?;
    let issues = pages.live_issues().await.map_err(PageError::DbError)?;

    Ok(IndexTemplate { index, issues })
}

/// Redirect to the newest live issue.
#[tracing::instrument(name = "Latest newsletter issue", skip(pages))]
pub async fn latest(State(pages): State<PageService>) -> Result<Response, PageError> {
    let response = match pages.latest_issue().await.map_err(PageError::DbError)? {
        Some(issue) => Redirect::to(&format!("{INDEX_PATH}/{}", issue.slug)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    };
    Ok(response)
}

/// Render a live issue. An alias renders the content of the issue it points
/// to, as long as that issue is live too.
#[tracing::instrument(name = "Newsletter issue page", skip(pages))]
pub async fn issue(
    State(pages): State<PageService>,
    Path(slug): Path<String>,
) -> Result<Response, PageError> {
    let Some(issue) = pages
        .live_issue_by_slug(&slug)
        .await
        .map_err(PageError::DbError)?
    else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let issue = match issue.alias_of {
        Some(target_id) => match pages.issue(target_id).await.map_err(PageError::DbError)? {
            Some(target) if target.live => target,
            _ => return Ok(StatusCode::NOT_FOUND.into_response()),
        },
        None => issue,
    };

    Ok(IssueTemplate { issue }.into_response())
}
