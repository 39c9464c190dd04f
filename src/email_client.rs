//! Client for the HTTP email delivery API (Postmark compatible).

use crate::{configuration::EmailClientSettings, domain::SubscriberEmail};
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, Secret};

/// A message with a plain text body and an HTML alternative.
#[derive(Debug, Clone)]
pub struct EmailContent<'a> {
    pub subject: &'a str,
    pub html_body: &'a str,
    pub text_body: &'a str,
}

#[derive(Debug)]
pub struct EmailClient {
    base_url: Url,
    default_sender: SubscriberEmail,
    http_client: Client,
    authorization_token: Secret<String>,
}

impl EmailClient {
    /// Create a new email client.
    pub fn new(
        base_url: Url,
        default_sender: SubscriberEmail,
        authorization_token: Secret<String>,
        timeout: std::time::Duration,
    ) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build email http client with timeout: {e}");
                Client::new()
            });

        Self {
            base_url,
            default_sender,
            http_client,
            authorization_token,
        }
    }

    /// The sender used when nothing else is configured.
    pub fn default_sender(&self) -> &SubscriberEmail {
        &self.default_sender
    }

    /// Send a single message. Non-success responses from the API are errors.
    #[tracing::instrument(
        name = "Send email",
        skip(self, sender, recipient, content),
        fields(recipient = %recipient)
    )]
    pub async fn send_email(
        &self,
        sender: &SubscriberEmail,
        recipient: &SubscriberEmail,
        content: &EmailContent<'_>,
    ) -> Result<(), reqwest::Error> {
        let url = self
            .base_url
            .join("email")
            .expect("url to always be valid at this point");
        let request_body = SendEmailRequest {
            from: sender.as_ref(),
            to: recipient.as_ref(),
            subject: content.subject,
            text_body: content.text_body,
            html_body: content.html_body,
        };

        self.http_client
            .post(url)
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

impl TryFrom<&EmailClientSettings> for EmailClient {
    type Error = String;

    fn try_from(config: &EmailClientSettings) -> Result<Self, Self::Error> {
        Ok(Self::new(
            config.base_url().map_err(|e| {
                tracing::error!("Unable to parse email client's base url: {e}");
                "Email base url is invalid".to_string()
            })?,
            config.sender()?,
            config.authorization_token.clone(),
            config.timeout(),
        ))
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    html_body: &'a str,
}
