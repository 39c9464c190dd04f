//! Notify subscribers when a newsletter issue is published.

use crate::{
    domain::SubscriberEmail,
    email_client::{EmailClient, EmailContent},
    service::{NewsletterIssue, PageService, SubscriberService, SubscriberServiceError},
};
use askama::Template;

/// Events emitted by the newsletter pages.
#[derive(Debug)]
pub enum PageEvent {
    /// An issue has just been made live.
    Published(NewsletterIssue),
}

/// What happened when subscribers were notified about an issue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct NotificationSummary {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Body of the notification email.
#[derive(Template)]
#[template(path = "email/newsletter.html")]
struct NewsletterEmailTemplate<'a> {
    email_content: &'a str,
}

/// Handle a page event. Returns `None` when nothing was sent because the
/// issue is an alias or does not ask for subscribers to be notified.
///
/// Each delivery failure is logged and counted, never returned.
#[tracing::instrument(
    name = "Notify subscribers of published issue",
    skip_all,
    fields(issue_id = tracing::field::Empty, slug = tracing::field::Empty)
)]
pub async fn on_page_event(
    event: &PageEvent,
    pages: &PageService,
    subscribers: &SubscriberService,
    email_client: &EmailClient,
) -> Result<Option<NotificationSummary>, NotificationError> {
    let PageEvent::Published(issue) = event;
    tracing::Span::current()
        .record("issue_id", &tracing::field::display(&issue.id))
        .record("slug", &tracing::field::display(&issue.slug));

    if issue.is_alias() {
        tracing::debug!("Published page is an alias, not notifying");
        return Ok(None);
    }
    if !issue.notify_subscribers {
        tracing::debug!("Issue does not ask for subscribers to be notified");
        return Ok(None);
    }

    let index = pages.index().await.map_err(NotificationError::DbError)?;
    let sender = match SubscriberEmail::parse(index.subscription_from_email.clone()) {
        Ok(sender) => sender,
        Err(e) => {
            tracing::warn!("Invalid sender on the newsletter index, using the default: {e}");
            email_client.default_sender().clone()
        }
    };

    let subject = format!("New newsletter from {}", index.organization_name);
    let text_body = strip_tags(&issue.email_text);
    let html_body = NewsletterEmailTemplate {
        email_content: &issue.email_text,
    }
    .render()
    .map_err(NotificationError::TemplateError)?;
    let content = EmailContent {
        subject: &subject,
        html_body: &html_body,
        text_body: &text_body,
    };

    let mut summary = NotificationSummary::default();
    for subscriber in subscribers
        .validated_subscribers()
        .await
        .map_err(NotificationError::SubscriberError)?
    {
        match subscriber {
            Ok(subscriber) => {
                match email_client
                    .send_email(&sender, &subscriber.email, &content)
                    .await
                {
                    Ok(()) => summary.sent += 1,
                    Err(e) => {
                        summary.failed += 1;
                        tracing::error!(
                            error.cause_chain = ?e,
                            error.message = %e,
                            "Failed to deliver issue to a validated subscriber. Skipping",
                        );
                    }
                }
            }
            Err(error) => {
                summary.skipped += 1;
                tracing::warn!(
                    error.cause_chain = ?error,
                    "Skipping a validated subscriber. \
                    Their stored contact details are invalid"
                );
            }
        }
    }

    pages
        .clear_notify_flag(issue.id)
        .await
        .map_err(NotificationError::DbError)?;
    tracing::info!(?summary, "Subscribers have been notified");

    Ok(Some(summary))
}

/// Turn rich text into plain text by removing tags and decoding HTML
/// entities, named and numeric. Text with a malformed entity keeps its
/// entities as they are.
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let text = match htmlescape::decode_html(&text) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::debug!("Leaving HTML entities undecoded: {e:?}");
            text
        }
    };
    text.replace('\u{a0}', " ")
}

#[derive(thiserror::Error)]
pub enum NotificationError {
    #[error("Unexpected database error")]
    DbError(#[source] sqlx::Error),
    #[error("Failed to get validated subscribers")]
    SubscriberError(#[source] SubscriberServiceError),
    #[error("Failed to render the newsletter email")]
    TemplateError(#[source] askama::Error),
}
