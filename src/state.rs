use crate::{
    crypto::{FieldCipher, HmacSecret},
    email_client::EmailClient,
};
use axum::extract::FromRef;
use derive_getters::Getters;
use duplicate::duplicate_item;
use sqlx::PgPool;
use std::sync::Arc;

/// Public base url of the application, used to build links in emails.
#[derive(Debug, Clone)]
pub struct ApplicationBaseUrl(pub String);

#[derive(Debug, Clone, Getters)]
pub struct AppState {
    db_pool: Arc<PgPool>,
    email_client: Arc<EmailClient>,
    base_url: Arc<ApplicationBaseUrl>,
    hmac_secret: Arc<HmacSecret>,
    field_cipher: Arc<FieldCipher>,
}

impl AppState {
    pub fn create(
        db_pool: PgPool,
        email_client: EmailClient,
        base_url: ApplicationBaseUrl,
        hmac_secret: HmacSecret,
        field_cipher: FieldCipher,
    ) -> Self {
        Self {
            db_pool: Arc::new(db_pool),
            email_client: Arc::new(email_client),
            base_url: Arc::new(base_url),
            hmac_secret: Arc::new(hmac_secret),
            field_cipher: Arc::new(field_cipher),
        }
    }
}

#[duplicate_item(
    service_type            field;
    [ PgPool ]              [ db_pool ];
    [ EmailClient ]         [ email_client ];
    [ ApplicationBaseUrl ]  [ base_url ];
    [ HmacSecret ]          [ hmac_secret ];
    [ FieldCipher ]         [ field_cipher ];
)]
impl FromRef<AppState> for Arc<service_type> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.field.clone()
    }
}
