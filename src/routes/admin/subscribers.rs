use crate::{
    authorization::AdminUser,
    service::{subscribers::Subscriber, SubscriberService, SubscriberServiceError},
};
use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use http::StatusCode;

#[derive(Template)]
#[template(path = "admin/subscribers.html")]
struct SubscribersTemplate {
    subscribers: Vec<Subscriber>,
    unreadable: usize,
}

/// List every subscriber with their email and name.
#[tracing::instrument(name = "Admin subscriber list", skip(subscribers))]
pub async fn list_subscribers(
    _admin: AdminUser,
    State(subscribers): State<SubscriberService>,
) -> Result<impl IntoResponse, ListSubscribersError> {
    let mut readable = vec![];
    let mut unreadable = 0;
    for subscriber in subscribers
        .all()
        .await
        .map_err(ListSubscribersError::SubscriberError)?
    {
        match subscriber {
            Ok(subscriber) => readable.push(subscriber),
            Err(e) => {
                unreadable += 1;
                tracing::warn!(error.cause_chain = ?e, "Failed to decrypt a subscriber");
            }
        }
    }

    Ok(SubscribersTemplate {
        subscribers: readable,
        unreadable,
    })
}

#[derive(thiserror::Error)]
pub enum ListSubscribersError {
    #[error("Failed to list subscribers")]
    SubscriberError(#[source] SubscriberServiceError),
}

impl IntoResponse for ListSubscribersError {
    fn into_response(self) -> Response {
        tracing::error!("{self:?}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
