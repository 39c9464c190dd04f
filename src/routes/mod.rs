use crate::state::AppState;
use axum::Router;

pub mod admin;
pub mod health;
pub mod newsletter;

pub fn build_router(app_state: &AppState) -> Router {
    Router::new()
        .nest(newsletter::INDEX_PATH, newsletter::create_router())
        .nest("/admin", admin::create_router())
        .merge(health::create_router())
        .with_state(app_state.clone())
}
