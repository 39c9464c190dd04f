//! Public newsletter pages: the index, the issues and the subscription flows.

mod pages;
mod subscribe;
mod unsubscribe;
mod validate;

pub use subscribe::SubscribeError;
pub use unsubscribe::UnsubscribeError;
pub use validate::ValidateError;

use crate::state::AppState;
use askama::Template;
use axum::{
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use http::StatusCode;

/// Path the newsletter index page is served under.
pub const INDEX_PATH: &str = "/newsletter";

/// Paths under the index that are routes of their own and cannot be used as
/// an issue slug.
pub const RESERVED_SLUGS: [&str; 4] = ["latest", "subscribe", "unsubscribe", "validate"];

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/latest", get(pages::latest))
        .route(
            "/subscribe",
            get(subscribe::subscribe_form).post(subscribe::subscribe),
        )
        .route(
            "/unsubscribe",
            get(unsubscribe::unsubscribe_form).post(unsubscribe::unsubscribe),
        )
        .route("/validate", get(validate::validate))
        .route("/:slug", get(pages::issue))
}

/// A heading and a rich text, e.g. the page shown after subscribing.
#[derive(Template)]
#[template(path = "newsletter/message.html")]
struct MessageTemplate<'a> {
    heading: &'a str,
    text: &'a str,
}

#[derive(thiserror::Error)]
pub enum PageError {
    #[error("Failed to load newsletter pages")]
    DbError(#[source] sqlx::Error),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        tracing::error!("{self:?}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
