//! The follow graph: follow/unfollow actions and the personalized feed.

mod common;

use axum::http::{StatusCode, header};
use common::{body_string, test_app};

fn location(response: &axum::http::Response<axum::body::Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn follow_then_unfollow_returns_edge_to_absent() {
    let app = test_app();
    let ada = app.repos.seed_user("ada", "password123");
    let bob = app.repos.seed_user("bob", "password123");
    let token = app.repos.open_session(&bob);

    let response = app.get_as("/ada/follow", token).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/ada");
    assert!(app.repos.follow_exists(bob.id, ada.id));

    let response = app.get_as("/ada/unfollow", token).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/ada");
    assert!(!app.repos.follow_exists(bob.id, ada.id));
}

#[tokio::test]
async fn duplicate_follow_is_a_noop() {
    let app = test_app();
    app.repos.seed_user("ada", "password123");
    let bob = app.repos.seed_user("bob", "password123");
    let token = app.repos.open_session(&bob);

    app.get_as("/ada/follow", token).await;
    app.get_as("/ada/follow", token).await;
    assert_eq!(app.repos.follow_count(), 1);
}

#[tokio::test]
async fn self_follow_is_skipped() {
    let app = test_app();
    let ada = app.repos.seed_user("ada", "password123");
    let token = app.repos.open_session(&ada);

    let response = app.get_as("/ada/follow", token).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.repos.follow_count(), 0);
}

#[tokio::test]
async fn unfollow_without_an_edge_is_not_found() {
    let app = test_app();
    app.repos.seed_user("ada", "password123");
    let bob = app.repos.seed_user("bob", "password123");
    let token = app.repos.open_session(&bob);

    let response = app.get_as("/ada/unfollow", token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn following_an_unknown_author_is_not_found() {
    let app = test_app();
    let bob = app.repos.seed_user("bob", "password123");
    let token = app.repos.open_session(&bob);

    let response = app.get_as("/ghost/follow", token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn personalized_feed_tracks_followed_authors() {
    let app = test_app();
    let ada = app.repos.seed_user("ada", "password123");
    let carol = app.repos.seed_user("carol", "password123");
    let bob = app.repos.seed_user("bob", "password123");
    app.repos.seed_post(&ada, "ada on compilers", None);
    app.repos.seed_post(&carol, "carol on gardens", None);
    let token = app.repos.open_session(&bob);

    // Nothing followed yet: empty feed.
    let body = body_string(app.get_as("/follow", token).await).await;
    assert!(!body.contains("ada on compilers"));
    assert!(!body.contains("carol on gardens"));

    app.get_as("/ada/follow", token).await;
    let body = body_string(app.get_as("/follow", token).await).await;
    assert!(body.contains("ada on compilers"));
    assert!(!body.contains("carol on gardens"));

    app.get_as("/ada/unfollow", token).await;
    let body = body_string(app.get_as("/follow", token).await).await;
    assert!(!body.contains("ada on compilers"));
}

#[tokio::test]
async fn follow_routes_require_login() {
    let app = test_app();
    app.repos.seed_user("ada", "password123");

    let response = app.get("/follow").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?next=/follow");

    let response = app.get("/ada/follow").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login"));
}

#[tokio::test]
async fn profile_shows_follow_state_to_the_viewer() {
    let app = test_app();
    app.repos.seed_user("ada", "password123");
    let bob = app.repos.seed_user("bob", "password123");
    let token = app.repos.open_session(&bob);

    let body = body_string(app.get_as("/ada", token).await).await;
    assert!(body.contains("/ada/follow"));

    app.get_as("/ada/follow", token).await;
    let body = body_string(app.get_as("/ada", token).await).await;
    assert!(body.contains("/ada/unfollow"));

    // Anonymous viewers get no follow controls.
    let body = body_string(app.get("/ada").await).await;
    assert!(!body.contains("/ada/follow"));
}
