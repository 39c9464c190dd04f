//! Management console for subscribers, issues and the index page texts.
//! Every endpoint requires an [`AdminUser`](crate::authorization::AdminUser).

mod newsletters;
mod settings;
mod subscribers;

pub use newsletters::AdminNewsletterError;
pub use settings::SettingsError;
pub use subscribers::ListSubscribersError;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/subscribers", get(subscribers::list_subscribers))
        .route(
            "/newsletters",
            get(newsletters::list_newsletters).post(newsletters::create_newsletter),
        )
        .route("/newsletters/:issue_id/alias", post(newsletters::create_alias))
        .route(
            "/newsletters/:issue_id/publish",
            post(newsletters::publish_newsletter),
        )
        .route(
            "/settings",
            get(settings::settings_form).post(settings::update_settings),
        )
}
