use crate::utils::{assert_is_redirect_to, spawn_app};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn validation_without_token_redirects_to_the_index() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get("/newsletter/validate").await;

    // Assert
    assert_is_redirect_to(&response, "/newsletter");
}

#[tokio::test]
async fn validation_with_an_unknown_token_shows_the_fail_page() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get("/newsletter/validate?token=not-a-real-token").await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let html = response.text().await.unwrap();
    assert!(html.contains("could not be validated"));
}

#[tokio::test]
async fn clicking_the_validation_link_validates_the_subscriber() {
    // Arrange
    let app = spawn_app().await;
    let links = app
        .create_unvalidated_subscriber("Ursula", "ursula_le_guin@gmail.com")
        .await;

    // Act
    let response = app.api_client().get(links.html).send().await.unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let html = response.text().await.unwrap();
    assert!(html.contains("has been validated"));

    let (validated, token): (bool, Option<String>) =
        sqlx::query_as("SELECT validated, token FROM subscribers")
            .fetch_one(app.db_pool())
            .await
            .unwrap();
    assert!(validated);
    assert_eq!(token, None);
}

#[tokio::test]
async fn replaying_a_validation_link_shows_the_fail_page() {
    // Arrange
    let app = spawn_app().await;
    let links = app
        .create_unvalidated_subscriber("Ursula", "ursula_le_guin@gmail.com")
        .await;
    app.api_client()
        .get(links.html.clone())
        .send()
        .await
        .unwrap();

    // Act
    let response = app.api_client().get(links.html).send().await.unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let html = response.text().await.unwrap();
    assert!(html.contains("could not be validated"));
}

#[tokio::test]
async fn a_token_shared_by_two_subscribers_is_an_error() {
    // Arrange
    let app = spawn_app().await;
    let links = app
        .create_unvalidated_subscriber("Ursula", "ursula_le_guin@gmail.com")
        .await;
    app.create_unvalidated_subscriber("Le Guin", "le_guin@gmail.com")
        .await;
    sqlx::query("UPDATE subscribers SET token = (SELECT token FROM subscribers LIMIT 1)")
        .execute(app.db_pool())
        .await
        .unwrap();
    let (token,): (String,) = sqlx::query_as("SELECT token FROM subscribers LIMIT 1")
        .fetch_one(app.db_pool())
        .await
        .unwrap();
    let mut link = links.html;
    link.set_query(Some(&format!("token={token}")));

    // Act
    let response = app.api_client().get(link).send().await.unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 500);
}
