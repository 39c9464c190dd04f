use super::MessageTemplate;
use crate::{
    crypto::HmacSecret,
    domain::SubscriberEmail,
    service::{NewsletterIndex, PageService, SubscriberService, SubscriberServiceError},
};
use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Form,
};
use http::StatusCode;
use std::sync::Arc;

#[derive(Debug, serde::Deserialize)]
pub struct FormData {
    email: String,
}

#[derive(Template)]
#[template(path = "newsletter/unsubscribe.html")]
struct UnsubscribeTemplate {
    index: NewsletterIndex,
}

/// Render the form to unsubscribe from the newsletter.
#[tracing::instrument(name = "Unsubscribe page", skip(pages))]
pub async fn unsubscribe_form(
    State(pages): State<PageService>,
) -> Result<impl IntoResponse, UnsubscribeError> {
    let index = pages.index().await.map_err(UnsubscribeError::DbError)?;
    Ok(UnsubscribeTemplate { index })
}

/// Remove every subscriber registered with the given email. The success page
/// is shown whether or not anyone was registered.
#[tracing::instrument(name = "Removing a subscriber", skip_all)]
pub async fn unsubscribe(
    State(pages): State<PageService>,
    State(subscribers): State<SubscriberService>,
    State(hmac_secret): State<Arc<HmacSecret>>,
    Form(form): Form<FormData>,
) -> Result<Response, UnsubscribeError> {
    let index = pages.index().await.map_err(UnsubscribeError::DbError)?;

    // Only valid emails are ever stored, so an invalid one has nothing to remove.
    match SubscriberEmail::parse(form.email) {
        Ok(email) => {
            let ident = hmac_secret.derive_ident(&email);
            subscribers
                .delete_by_ident(&ident)
                .await
                .map_err(UnsubscribeError::SubscriberError)?;
        }
        Err(e) => tracing::debug!("Nothing to unsubscribe: {e}"),
    }

    Ok(MessageTemplate {
        heading: &index.unsubscribe_success_heading,
        text: &index.unsubscribe_success_text,
    }
    .into_response())
}

#[derive(thiserror::Error)]
pub enum UnsubscribeError {
    #[error("Failed to load the newsletter index")]
    DbError(#[source] sqlx::Error),
    #[error("Failed to remove the subscriber")]
    SubscriberError(#[source] SubscriberServiceError),
}

impl IntoResponse for UnsubscribeError {
    fn into_response(self) -> Response {
        tracing::error!("{self:?}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
