mod common;

use common::spawn_app;

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app.get("/health_check", None).await;

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = spawn_app().await;

    let response = app.get("/api/auth/does-not-exist", None).await;

    assert_eq!(404, response.status().as_u16());
}
