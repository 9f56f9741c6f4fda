//! Integration tests for backend wire formats
//!
//! Decodes payloads shaped like real backend responses and checks that
//! outgoing payloads carry exactly the fields the backend expects.

use quill_domain::{
    AuthSession, ClientConfig, Comment, Like, NewComment, NewPost, Post, Role, User,
};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Scenario: a login response embedding the user profile
#[test]
fn test_login_response_with_user() {
    let session: AuthSession = serde_json::from_value(json!({
        "accessToken": "eyJhbGciOi.access",
        "refreshToken": "eyJhbGciOi.refresh",
        "expiresIn": 900,
        "user": { "id": 1, "name": "Ana", "email": "ana@example.com", "role": "admin" }
    }))
    .unwrap();

    let user = session.user.expect("user embedded");
    assert_eq!(user.role, Role::Admin);
    assert_eq!(session.expires_in, Some(900));
}

/// Scenario: a backend reporting an absurd token lifetime
#[test]
fn test_login_response_with_oversized_lifetime() {
    let session: AuthSession = serde_json::from_value(json!({
        "accessToken": "a",
        "expiresIn": u64::MAX
    }))
    .unwrap();

    let issued = Utc::now();
    let expires_at = session.expires_at(issued);
    assert!(expires_at > issued);
    assert!(expires_at.to_rfc3339().parse::<DateTime<Utc>>().is_ok());
}

/// Scenario: a post listing page followed by its comments and likes
#[test]
fn test_post_listing_with_children() {
    let posts: Vec<Post> = serde_json::from_value(json!([
        { "id": 1, "title": "Uno", "content": "...", "authorId": 1 },
        { "id": 2, "title": "Dos", "content": "...", "authorId": 2, "commentsCount": 1 }
    ]))
    .unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[1].comments_count, 1);

    let comments: Vec<Comment> = serde_json::from_value(json!([
        { "id": 9, "content": "Buen post", "postId": 2, "authorId": 1,
          "createdAt": "2024-06-01T08:30:00.000Z" }
    ]))
    .unwrap();
    assert_eq!(comments[0].post_id, 2);

    let likes: Vec<Like> =
        serde_json::from_value(json!([{ "id": 4, "postId": 2, "userId": 1 }])).unwrap();
    assert_eq!(likes[0].user_id, 1);
}

/// Scenario: outgoing create payloads contain only user-supplied fields
#[test]
fn test_create_payloads() {
    let post = NewPost { title: "Hola".into(), content: "Mundo".into() };
    assert_eq!(serde_json::to_value(&post).unwrap(), json!({ "title": "Hola", "content": "Mundo" }));

    let comment = NewComment { content: "Gracias".into() };
    assert_eq!(serde_json::to_value(&comment).unwrap(), json!({ "content": "Gracias" }));
}

/// Scenario: user listing round-trips through the admin screen
#[test]
fn test_user_role_change_payload() {
    let user: User = serde_json::from_value(json!({
        "id": 5, "name": "Luis", "email": "luis@example.com", "role": "author"
    }))
    .unwrap();
    assert!(!user.role.can_moderate());
    assert_eq!(serde_json::to_value(Role::Editor).unwrap(), json!("editor"));
}

/// Scenario: a TOML-like flat config decoded from JSON keeps defaults
#[test]
fn test_config_from_partial_document() {
    let config: ClientConfig = serde_json::from_value(json!({
        "endpoints": ["http://192.168.1.20:3000/", "http://localhost:3000"],
        "auth": { "refresh_skew_secs": 60 }
    }))
    .unwrap();

    assert!(config.validate().is_ok());
    assert_eq!(config.normalized_endpoints()[0], "http://192.168.1.20:3000");
    assert_eq!(config.auth.refresh_skew_secs, 60);
    assert_eq!(config.request_timeout_ms, 15_000);
}
