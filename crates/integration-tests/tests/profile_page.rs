//! Profile page rendering, avatar signing, and the profile form.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use techplement_integration_tests::{
    FailOn, FakeBackend, STORAGE_ROOT, TestApp, body_text, location,
};

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "correct-horse";
const STORED_AVATAR: &str =
    "https://backend.test/storage/v1/object/public/avatars/u123-1699999999999.png";

fn user() -> FakeBackend {
    FakeBackend::new().with_user("u123", EMAIL, PASSWORD, Some("Ada Lovelace"))
}

/// Markup of every avatar slot on `page`, from its opening tag onwards.
fn avatar_slots(page: &str) -> Vec<&str> {
    page.split(r#"<span class="avatar "#).skip(1).collect()
}

// ============================================================================
// Avatar Resolution
// ============================================================================

#[tokio::test]
async fn test_signed_url_requested_for_sixty_seconds_on_every_load() {
    let app = TestApp::new(user().with_avatar("u123", STORED_AVATAR));
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    let first = app.backend.sign_requests();
    assert!(!first.is_empty());
    assert!(
        first
            .iter()
            .all(|r| r.object_key == "u123-1699999999999.png" && r.ttl_secs == 60)
    );
    assert!(page.contains(&format!(
        "{STORAGE_ROOT}/sign/avatars/u123-1699999999999.png?token=signed-60"
    )));

    app.get("/profile", Some(&cookie)).await;
    let second = app.backend.sign_requests();
    assert!(second.len() > first.len());
    assert!(second.iter().all(|r| r.ttl_secs == 60));
}

#[tokio::test]
async fn test_stored_reference_never_rendered_directly() {
    let app = TestApp::new(user().with_avatar("u123", STORED_AVATAR));
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(!page.contains(STORED_AVATAR));
}

#[tokio::test]
async fn test_signing_failure_still_renders_name_and_email() {
    let app = TestApp::new(user().with_avatar("u123", STORED_AVATAR));
    let cookie = app.sign_in(EMAIL, PASSWORD).await;
    app.backend.fail(FailOn::SignUrl);

    let response = app.get("/profile", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains(r#"value="Ada Lovelace""#));
    assert!(page.contains(r#"value="ada@example.com""#));
    assert!(page.contains(r#"<span class="avatar-initials">AL</span>"#));
    assert!(!page.contains("data-avatar-image"));
    // Signing problems are logged, not shown
    assert!(!page.contains("Error loading profile"));
}

#[tokio::test]
async fn test_no_stored_avatar_shows_initials_without_signing() {
    let app = TestApp::new(user());
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;

    assert!(app.backend.sign_requests().is_empty());
    assert!(page.contains(r#"<span class="avatar-initials">AL</span>"#));
    assert!(!page.contains("data-avatar-image"));
}

#[tokio::test]
async fn test_home_header_resolves_avatar_on_each_render() {
    let app = TestApp::new(user().with_avatar("u123", STORED_AVATAR));
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let page = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(page.contains("Welcome back, Ada Lovelace!"));
    assert_eq!(app.backend.sign_requests().len(), 1);

    app.get("/", Some(&cookie)).await;
    assert_eq!(app.backend.sign_requests().len(), 2);
    assert_eq!(app.backend.profile_fetches(), 2);
}

#[tokio::test]
async fn test_every_avatar_image_ships_with_its_fallback() {
    let app = TestApp::new(user().with_avatar("u123", STORED_AVATAR));
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    let slots = avatar_slots(&page);

    // Header, mobile menu, and the profile card
    assert_eq!(slots.len(), 3);
    for slot in slots {
        let (image, rest) = slot.split_once("data-avatar-image").unwrap();
        assert!(image.contains(r#"data-avatar-status="idle""#));
        let fallback = &rest[..rest.find("</span>").unwrap()];
        assert!(fallback.contains("data-avatar-fallback"));
        assert!(fallback.contains(" hidden"));
        assert!(slot.contains(r#"<span class="avatar-initials">AL</span>"#));
    }
}

#[tokio::test]
async fn test_avatar_alt_and_mobile_menu_use_full_name() {
    let app = TestApp::new(user().with_avatar("u123", STORED_AVATAR));
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(!page.contains(r#"alt="Profile""#));
    assert_eq!(page.matches(r#" alt="Ada Lovelace""#).count(), 3);
    assert!(page.contains(r#"<span class="mobile-user-name">Ada Lovelace</span>"#));
}

#[tokio::test]
async fn test_upload_input_carries_client_side_limits() {
    let app = TestApp::new(user());
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(page.contains(r#"data-max-bytes="5242880""#));
    assert!(page.contains(r#"data-size-message="Image size should be less than 5MB""#));
    assert!(page.contains(r#"data-type-message="Please upload an image file""#));
}

#[tokio::test]
async fn test_missing_profile_row_renders_degraded_page() {
    let app = TestApp::new(user().without_profile("u123"));
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let response = app.get("/profile", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains("Error loading profile"));
    assert!(page.contains(r#"value="""#));
    assert!(app.backend.sign_requests().is_empty());
}

// ============================================================================
// Profile Form
// ============================================================================

#[tokio::test]
async fn test_save_persists_exactly_name_and_timestamp() {
    let app = TestApp::new(user());
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let response = app
        .post_form("/profile", Some(&cookie), "full_name=Grace+Hopper")
        .await;
    assert_eq!(location(&response), Some("/profile"));

    let patches = app.backend.patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].user_id.as_str(), "u123");
    assert_eq!(
        patches[0].body,
        json!({
            "full_name": "Grace Hopper",
            "updated_at": "2023-11-14T22:13:20Z",
        })
    );
    assert!(patches[0].body.get("email").is_none());

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(page.contains("Profile updated successfully!"));
    assert!(page.contains(r#"value="Grace Hopper""#));
}

#[tokio::test]
async fn test_save_rejects_blank_name_without_backend_call() {
    let app = TestApp::new(user());
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    app.post_form("/profile", Some(&cookie), "full_name=+++")
        .await;
    assert!(app.backend.patches().is_empty());

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(page.contains("Please enter your full name"));
}

#[tokio::test]
async fn test_save_failure_keeps_entered_name() {
    let app = TestApp::new(user());
    let cookie = app.sign_in(EMAIL, PASSWORD).await;
    app.backend.fail(FailOn::UpdateProfile);

    app.post_form("/profile", Some(&cookie), "full_name=Grace+Hopper")
        .await;

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(page.contains("Error updating profile"));
    assert!(page.contains(r#"value="Grace Hopper""#));
    assert_eq!(
        app.backend.profile("u123").unwrap().full_name.as_deref(),
        Some("Ada Lovelace")
    );
}
