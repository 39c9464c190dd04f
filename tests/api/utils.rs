use argon2::{password_hash::SaltString, Algorithm, Argon2, Params, PasswordHasher, Version};
use derive_getters::Getters;
use newsletter::{
    configuration::{get_configuration, DatabaseSettings},
    telemetry::{get_subscriber, init_subscriber},
    App,
};
use once_cell::sync::Lazy;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, MockBuilder, MockServer, ResponseTemplate,
};

static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber("test".into(), std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber("test".into(), std::io::sink);
        init_subscriber(subscriber);
    };
});

/// Links sent to a new subscriber in their verification email.
pub struct ValidationLinks {
    pub html: reqwest::Url,
    pub plain_text: reqwest::Url,
}

#[derive(Debug, Getters)]
pub struct TestUser {
    user_id: Uuid,
    username: String,
    password: String,
}

impl TestUser {
    pub fn generate() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            username: Uuid::new_v4().to_string(),
            password: Uuid::new_v4().to_string(),
        }
    }

    async fn store(&self, db_pool: &PgPool) {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let password_hash = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(15000, 2, 1, None).unwrap(),
        )
        .hash_password(self.password.as_bytes(), &salt)
        .unwrap()
        .to_string();

        sqlx::query("INSERT INTO users (user_id, username, password_hash) VALUES ($1, $2, $3)")
            .bind(self.user_id)
            .bind(&self.username)
            .bind(password_hash)
            .execute(db_pool)
            .await
            .expect("Failed to store test user");
    }
}

#[derive(Getters)]
pub struct TestApp {
    address: String,
    port: u16,
    db_pool: PgPool,
    email_server: MockServer,
    test_user: TestUser,
    api_client: reqwest::Client,
}

/// Spawn a instance of the app on a random port, with its own database and
/// a mock email server.
pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);
    let email_server = MockServer::start().await;

    let config = {
        let mut c = get_configuration().expect("Failed to read configuration");

        // Generate a unique name for each DB.
        c.database.name = Uuid::new_v4().to_string();
        // Make OS choose random port
        c.application.port = 0;
        c.email_client.base_url = email_server.uri();

        c
    };

    // Setup database
    let db_pool = configure_database(config.database()).await;

    let app = App::build(config).await.expect("Failed to build app");
    let port = app.port();

    // Start server
    let _ = tokio::spawn(app.run_until_stopped());

    let api_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let test_app = TestApp {
        address: format!("http://127.0.0.1:{port}"),
        port,
        db_pool,
        email_server,
        test_user: TestUser::generate(),
        api_client,
    };
    test_app.test_user.store(&test_app.db_pool).await;

    test_app
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");

    connection
        .execute(format!(r#"CREATE DATABASE "{}";"#, config.name()).as_str())
        .await
        .expect("Failed to create database.");

    // Migrate the database
    let db_pool = PgPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to Postgres");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to migrate the database");

    db_pool
}

pub fn when_sending_an_email() -> MockBuilder {
    Mock::given(path("/email")).and(method("POST"))
}

pub fn assert_is_redirect_to(response: &reqwest::Response, location: &str) {
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(response.headers().get("Location").unwrap(), location);
}

impl TestApp {
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(format!("{}{path}", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn health_check(&self) -> reqwest::Response {
        self.get("/health").await
    }

    pub async fn post_subscribe(&self, body: String) -> reqwest::Response {
        self.api_client
            .post(format!("{}/newsletter/subscribe", self.address))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_unsubscribe(&self, body: String) -> reqwest::Response {
        self.api_client
            .post(format!("{}/newsletter/unsubscribe", self.address))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Extract the validation links from a request to the email API.
    pub fn get_validation_links(&self, email_request: &wiremock::Request) -> ValidationLinks {
        let body: serde_json::Value = serde_json::from_slice(&email_request.body).unwrap();

        let get_link = |s: &str| {
            let links: Vec<_> = linkify::LinkFinder::new()
                .links(s)
                .filter(|l| *l.kind() == linkify::LinkKind::Url)
                .collect();
            assert_eq!(links.len(), 1);
            let mut validation_link = reqwest::Url::parse(links[0].as_str()).unwrap();
            // Make sure we don't call random APIs on the web
            assert_eq!(validation_link.host_str().unwrap(), "127.0.0.1");
            validation_link.set_port(Some(self.port)).unwrap();
            validation_link
        };

        ValidationLinks {
            html: get_link(body["HtmlBody"].as_str().unwrap()),
            plain_text: get_link(body["TextBody"].as_str().unwrap()),
        }
    }

    /// Subscribe through the public form and return the links from the
    /// verification email.
    pub async fn create_unvalidated_subscriber(&self, name: &str, email: &str) -> ValidationLinks {
        let body = serde_urlencoded::to_string([("name", name), ("email", email)]).unwrap();

        let _mock_guard = when_sending_an_email()
            .respond_with(ResponseTemplate::new(200))
            .named("Create unvalidated subscriber")
            .expect(1)
            .mount_as_scoped(&self.email_server)
            .await;
        let response = self.post_subscribe(body).await;
        assert_eq!(response.status().as_u16(), 200);

        let email_request = self
            .email_server
            .received_requests()
            .await
            .unwrap()
            .pop()
            .unwrap();
        self.get_validation_links(&email_request)
    }

    pub async fn create_validated_subscriber(&self, name: &str, email: &str) {
        let links = self.create_unvalidated_subscriber(name, email).await;
        let response = self.api_client.get(links.html).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    pub async fn admin_get(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(format!("{}/admin{path}", self.address))
            .basic_auth(&self.test_user.username, Some(&self.test_user.password))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn admin_post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.api_client
            .post(format!("{}/admin{path}", self.address))
            .basic_auth(&self.test_user.username, Some(&self.test_user.password))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Create a draft issue through the admin console and return its id.
    pub async fn create_issue(&self, title: &str, notify_subscribers: bool) -> Uuid {
        let response = self
            .admin_post_json("/newsletters", &issue_body(title, notify_subscribers))
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: serde_json::Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn create_alias(&self, issue_id: Uuid, slug: &str) -> reqwest::Response {
        self.admin_post_json(
            &format!("/newsletters/{issue_id}/alias"),
            &serde_json::json!({ "slug": slug }),
        )
        .await
    }

    pub async fn publish(&self, issue_id: Uuid) -> reqwest::Response {
        self.admin_post_json(
            &format!("/newsletters/{issue_id}/publish"),
            &serde_json::json!({}),
        )
        .await
    }
}

pub fn issue_body(title: &str, notify_subscribers: bool) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "author": "The Editor",
        "date": "2023-10-01",
        "teaser": "<p>A short <b>teaser</b></p>",
        "email_text": "<p>Our newest issue is out</p>",
        "body": [{
            "heading": "Welcome",
            "sub_heading": "To this issue",
            "text_content": "<p>Lots of news</p>"
        }],
        "notify_subscribers": notify_subscribers,
    })
}
