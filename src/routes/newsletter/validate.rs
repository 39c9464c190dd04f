use super::{MessageTemplate, INDEX_PATH};
use crate::service::{PageService, SubscriberService, SubscriberServiceError};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use http::StatusCode;

#[derive(Debug, serde::Deserialize)]
pub struct Parameters {
    token: Option<String>,
}

/// Endpoint for subscribers to hit when validating their email address.
///
/// Without a token the visitor is sent back to the index page. A token
/// matching one subscriber validates them and is consumed, so replaying it
/// shows the fail page.
#[tracing::instrument(
    name = "Validate a pending subscriber",
    skip(pages, subscribers, parameters)
)]
pub async fn validate(
    State(pages): State<PageService>,
    State(subscribers): State<SubscriberService>,
    Query(parameters): Query<Parameters>,
) -> Result<Response, ValidateError> {
    let Some(token) = parameters.token else {
        return Ok(Redirect::to(INDEX_PATH).into_response());
    };

    let index = pages.index().await.map_err(ValidateError::DbError)?;
    let subscriber_ids = subscribers
        .ids_with_token(&token)
        .await
        .map_err(ValidateError::SubscriberError)?;

    let template = match subscriber_ids.as_slice() {
        [] => {
            tracing::info!("No subscriber holds the token");
            MessageTemplate {
                heading: &index.validate_fail_heading,
                text: &index.validate_fail_text,
            }
        }
        [subscriber_id] => {
            subscribers
                .mark_validated(*subscriber_id)
                .await
                .map_err(ValidateError::SubscriberError)?;
            MessageTemplate {
                heading: &index.validate_success_heading,
                text: &index.validate_success_text,
            }
        }
        _ => return Err(ValidateError::AmbiguousToken(subscriber_ids.len())),
    };

    Ok(template.into_response())
}

#[derive(thiserror::Error)]
pub enum ValidateError {
    #[error("Failed to load the newsletter index")]
    DbError(#[source] sqlx::Error),
    #[error("Failed to look up the subscriber")]
    SubscriberError(#[source] SubscriberServiceError),
    #[error("{0} subscribers hold the same token")]
    AmbiguousToken(usize),
}

impl IntoResponse for ValidateError {
    fn into_response(self) -> Response {
        tracing::error!("{self:?}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
