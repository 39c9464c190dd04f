use super::{MessageTemplate, INDEX_PATH};
use crate::{
    crypto::HmacSecret,
    domain::{NewSubscriber, SubscriberEmail, SubscriberName},
    email_client::{EmailClient, EmailContent},
    service::{NewsletterIndex, PageService, SubscriberService, SubscriberServiceError},
    state::ApplicationBaseUrl,
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
    name: String,
}

impl TryFrom<FormData> for NewSubscriber {
    type Error = String;

    fn try_from(value: FormData) -> Result<Self, Self::Error> {
        let name = SubscriberName::parse(value.name)?;
        let email = SubscriberEmail::parse(value.email)?;

        Ok(Self { email, name })
    }
}

#[derive(Template)]
#[template(path = "newsletter/subscribe.html")]
struct SubscribeTemplate {
    index: NewsletterIndex,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "email/verification.html")]
struct VerificationHtmlTemplate<'a> {
    validation_link: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification.txt")]
struct VerificationTextTemplate<'a> {
    validation_link: &'a str,
}

/// Render the form to subscribe to the newsletter.
#[tracing::instrument(name = "Subscribe page", skip(pages))]
pub async fn subscribe_form(
    State(pages): State<PageService>,
) -> Result<impl IntoResponse, SubscribeError> {
    let index = pages.index().await.map_err(SubscribeError::DbError)?;
    Ok(SubscribeTemplate { index, error: None })
}

/// Subscribe to the newsletter with an email and name.
///
/// Someone already registered with the same email gets the fail page, and
/// nothing is stored or sent. Otherwise the subscriber is stored unvalidated
/// and a verification link is emailed to them.
#[tracing::instrument(
    name = "Adding a new subscriber",
    skip_all,
    fields(subscriber_name = %form.name)
)]
pub async fn subscribe(
    State(pages): State<PageService>,
    State(subscribers): State<SubscriberService>,
    State(hmac_secret): State<Arc<HmacSecret>>,
    State(base_url): State<Arc<ApplicationBaseUrl>>,
    State(email_client): State<Arc<EmailClient>>,
    Form(form): Form<FormData>,
) -> Result<Response, SubscribeError> {
    let index = pages.index().await.map_err(SubscribeError::DbError)?;
    let new_subscriber: NewSubscriber = match form.try_into() {
        Ok(x) => x,
        Err(e) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                SubscribeTemplate {
                    index,
                    error: Some(e),
                },
            )
                .into_response())
        }
    };

    let ident = hmac_secret.derive_ident(&new_subscriber.email);
    if subscribers
        .ident_exists(&ident)
        .await
        .map_err(SubscribeError::SubscriberError)?
    {
        tracing::info!("A subscriber with the same email is already registered");
        return Ok(MessageTemplate {
            heading: &index.subscribe_fail_heading,
            text: &index.subscribe_fail_text,
        }
        .into_response());
    }

    let token = hmac_secret.derive_token(&new_subscriber);
    subscribers
        .insert(&new_subscriber, &ident, &token)
        .await
        .map_err(SubscribeError::SubscriberError)?;

    send_verification_email(
        &email_client,
        &index,
        &new_subscriber.email,
        &base_url.0,
        &token,
    )
    .await
    .map_err(SubscribeError::TemplateError)?;

    Ok(MessageTemplate {
        heading: &index.subscribe_success_heading,
        text: &index.subscribe_success_text,
    }
    .into_response())
}

/// Send an email to the new subscriber with a link for them to validate
/// their address. Delivery failures are logged and otherwise ignored.
#[tracing::instrument(
    name = "Send a verification email to a new subscriber",
    skip(email_client, index, recipient, base_url, token)
)]
async fn send_verification_email(
    email_client: &EmailClient,
    index: &NewsletterIndex,
    recipient: &SubscriberEmail,
    base_url: &str,
    token: &str,
) -> Result<(), askama::Error> {
    let validation_link = format!("{base_url}{INDEX_PATH}/validate?token={token}");
    let html_body = VerificationHtmlTemplate {
        validation_link: &validation_link,
    }
    .render()?;
    let text_body = VerificationTextTemplate {
        validation_link: &validation_link,
    }
    .render()?;

    let sender = SubscriberEmail::parse(index.subscription_from_email.clone())
        .unwrap_or_else(|_| email_client.default_sender().clone());
    let content = EmailContent {
        subject: "Please verify your Email Address",
        html_body: &html_body,
        text_body: &text_body,
    };

    if let Err(e) = email_client.send_email(&sender, recipient, &content).await {
        tracing::warn!(
            error.cause_chain = ?e,
            error.message = %e,
            "Failed to send the verification email"
        );
    }

    Ok(())
}

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("Failed to load the newsletter index")]
    DbError(#[source] sqlx::Error),
    #[error("Failed to store the subscriber")]
    SubscriberError(#[source] SubscriberServiceError),
    #[error("Failed to render the verification email")]
    TemplateError(#[source] askama::Error),
}

impl IntoResponse for SubscribeError {
    fn into_response(self) -> Response {
        tracing::error!("{self:?}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
