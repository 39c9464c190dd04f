use crate::{
    authorization::AdminUser,
    domain::SubscriberEmail,
    service::{NewsletterIndex, PageService},
};
use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use http::StatusCode;

#[derive(Template)]
#[template(path = "admin/settings.html")]
struct SettingsTemplate {
    index: NewsletterIndex,
}

/// Form with the texts and headings of the subscription pages.
#[tracing::instrument(name = "Admin settings page", skip(pages))]
pub async fn settings_form(
    _admin: AdminUser,
    State(pages): State<PageService>,
) -> Result<impl IntoResponse, SettingsError> {
    let index = pages.index().await.map_err(SettingsError::DbError)?;
    Ok(SettingsTemplate { index })
}

/// Save the texts and headings of the subscription pages.
#[tracing::instrument(name = "Update admin settings", skip(pages, form))]
pub async fn update_settings(
    _admin: AdminUser,
    State(pages): State<PageService>,
    Form(form): Form<NewsletterIndex>,
) -> Result<Response, SettingsError> {
    SubscriberEmail::parse(form.subscription_from_email.clone())
        .map_err(SettingsError::InvalidSender)?;

    pages
        .update_index(&form)
        .await
        .map_err(SettingsError::DbError)?;
    tracing::info!("Newsletter index has been updated");

    Ok(Redirect::to("/admin/settings").into_response())
}

#[derive(thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid sender address: {0}")]
    InvalidSender(String),
    #[error("Unexpected database error")]
    DbError(#[source] sqlx::Error),
}

impl IntoResponse for SettingsError {
    fn into_response(self) -> Response {
        tracing::error!("{self:?}");
        match self {
            Self::InvalidSender(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()).into_response()
            }
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}
