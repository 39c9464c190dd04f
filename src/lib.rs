pub mod authorization;
pub mod configuration;
pub mod crypto;
pub mod domain;
pub mod email_client;
mod error;
pub mod notification;
mod routes;
pub mod service;
mod state;
pub mod telemetry;

use anyhow::Context;
use axum::{routing::IntoMakeService, Router, Server};
use configuration::{DatabaseSettings, Settings};
use crypto::{FieldCipher, HmacSecret};
use email_client::EmailClient;
use hyper::server::conn::AddrIncoming;
use service::PageService;
use sqlx::{postgres::PgPoolOptions, PgPool};
use state::{AppState, ApplicationBaseUrl};
use std::{net::TcpListener, sync::Arc, time::Duration};

pub struct App {
    port: u16,
    server: Server<AddrIncoming, IntoMakeService<Router>>,
}

impl App {
    /// Prepare the database and bind the server to the configured address.
    pub async fn build(configuration: Settings) -> anyhow::Result<Self> {
        let db_pool = get_connection_pool(configuration.database());
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to migrate the database")?;

        let email_client = EmailClient::try_from(configuration.email_client())
            .map_err(anyhow::Error::msg)?;
        let field_cipher = FieldCipher::new(&configuration.application().encryption_key)
            .context("Invalid encryption key")?;

        PageService::new(Arc::new(db_pool.clone()))
            .ensure_index(email_client.default_sender().as_ref())
            .await
            .context("Failed to create the newsletter index")?;

        let listener = TcpListener::bind(configuration.application().address())?;
        let port = listener.local_addr()?.port();
        tracing::info!("Server running at {}", listener.local_addr()?);

        let app_state = AppState::create(
            db_pool,
            email_client,
            ApplicationBaseUrl(configuration.application().base_url.clone()),
            HmacSecret(configuration.application().hmac_secret.clone()),
            field_cipher,
        );
        let router = Self::build_router(&app_state);
        let server = Server::from_tcp(listener)?.serve(router.into_make_service());

        Ok(Self { port, server })
    }

    /// The port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        self.server.await?;
        Ok(())
    }

    /// Builder the router for the application.
    fn build_router(app_state: &AppState) -> Router {
        use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
        use tracing::Level;

        routes::build_router(app_state).layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy_with(configuration.with_db())
}
