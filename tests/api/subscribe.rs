use crate::utils::{spawn_app, when_sending_an_email};
use pretty_assertions::assert_eq;
use rstest::*;
use wiremock::ResponseTemplate;

#[tokio::test]
async fn subscribe_page_shows_the_form() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get("/newsletter/subscribe").await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let html = response.text().await.unwrap();
    assert!(html.contains("Subscribe to our newsletter"));
    assert!(html.contains(r#"name="email""#));
}

#[tokio::test]
async fn subscribe_returns_a_200_for_valid_form_data() {
    // Arrange
    let app = spawn_app().await;
    when_sending_an_email()
        .respond_with(ResponseTemplate::new(200))
        .mount(app.email_server())
        .await;

    // Act
    let body = "name=le%20guin&email=ursula_le_guin%40gmail.com";
    let response = app.post_subscribe(body.into()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let html = response.text().await.unwrap();
    assert!(html.contains("Thank you for subscribing"));
}

#[tokio::test]
async fn subscribe_stores_the_subscriber_unvalidated_and_encrypted() {
    // Arrange
    let app = spawn_app().await;
    when_sending_an_email()
        .respond_with(ResponseTemplate::new(200))
        .mount(app.email_server())
        .await;

    // Act
    let body = "name=le%20guin&email=ursula_le_guin%40gmail.com";
    app.post_subscribe(body.into()).await;

    // Assert
    let (full_name, email, validated, token): (String, String, bool, Option<String>) =
        sqlx::query_as("SELECT full_name, email, validated, token FROM subscribers")
            .fetch_one(app.db_pool())
            .await
            .expect("Failed to fetch saved subscriber");
    assert!(!validated);
    assert!(token.is_some());
    assert_ne!(full_name, "le guin");
    assert!(!email.contains("ursula_le_guin"));
}

#[tokio::test]
async fn subscribe_sends_a_verification_email_with_a_link() {
    // Arrange
    let app = spawn_app().await;
    when_sending_an_email()
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(app.email_server())
        .await;

    // Act
    let body = "name=le%20guin&email=ursula_le_guin%40gmail.com";
    app.post_subscribe(body.into()).await;

    // Assert
    let email_request = &app.email_server().received_requests().await.unwrap()[0];
    let body: serde_json::Value = serde_json::from_slice(&email_request.body).unwrap();
    assert_eq!(body["Subject"], "Please verify your Email Address");
    assert_eq!(body["To"], "ursula_le_guin@gmail.com");

    let links = app.get_validation_links(email_request);
    assert_eq!(links.html, links.plain_text);
    assert_eq!(links.html.path(), "/newsletter/validate");
}

#[tokio::test]
async fn subscribe_succeeds_even_if_the_verification_email_fails() {
    // Arrange
    let app = spawn_app().await;
    when_sending_an_email()
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(app.email_server())
        .await;

    // Act
    let body = "name=le%20guin&email=ursula_le_guin%40gmail.com";
    let response = app.post_subscribe(body.into()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn subscribing_twice_with_the_same_email_shows_the_fail_page() {
    // Arrange
    let app = spawn_app().await;
    app.create_unvalidated_subscriber("Ursula", "ursula_le_guin@gmail.com")
        .await;
    when_sending_an_email()
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(app.email_server())
        .await;

    // Act
    let body = "name=Someone%20else&email=ursula_le_guin%40gmail.com";
    let response = app.post_subscribe(body.into()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let html = response.text().await.unwrap();
    assert!(html.contains("may be already registered"));

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscribers")
        .fetch_one(app.db_pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[rstest]
#[case("name=le%20guin", "missing the email")]
#[case("email=ursula_le_guin%40gmail.com", "missing the name")]
#[case("", "missing both name and email")]
#[tokio::test]
async fn subscribe_returns_a_422_when_data_is_missing(
    #[case] body: String,
    #[case] error_message: String,
) {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.post_subscribe(body).await;

    // Assert
    assert_eq!(
        response.status().as_u16(),
        422,
        "The API did not fail with 422 Unprocessable Entity when the payload was {}.",
        error_message
    );
}

#[rstest]
#[case("name=&email=ursula_le_guin%40gmail.com", "empty name")]
#[case("name=Ursula&email=", "empty email")]
#[case("name=Ursula&email=definitely-not-a-valid-email", "invalid email")]
#[tokio::test]
async fn subscribe_rerenders_the_form_when_fields_are_invalid(
    #[case] body: String,
    #[case] description: String,
) {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.post_subscribe(body).await;

    // Assert
    assert_eq!(
        response.status().as_u16(),
        422,
        "The API did not return a 422 when the payload was {}.",
        description
    );
    let html = response.text().await.unwrap();
    assert!(html.contains(r#"name="email""#));
}
