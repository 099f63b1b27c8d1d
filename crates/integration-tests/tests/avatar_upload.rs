//! Avatar upload workflow, through the service and through the router.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;

use techplement_core::{UploadCandidate, UserId};
use techplement_integration_tests::{
    FailOn, FakeBackend, NOW_MILLIS, STORAGE_ROOT, TestApp, body_text, location, token_for,
};
use techplement_web::backend::{AccessToken, UploadOptions};
use techplement_web::services::UploadWorkflowError;

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "correct-horse";

fn app() -> TestApp {
    TestApp::new(FakeBackend::new().with_user("u123", EMAIL, PASSWORD, Some("Ada Lovelace")))
}

fn token() -> AccessToken {
    AccessToken::new(token_for(&UserId::new("u123")))
}

// ============================================================================
// Service
// ============================================================================

#[tokio::test]
async fn test_upload_stores_under_user_and_time_key() {
    let app = app();
    let user = UserId::new("u123");

    let outcome = app
        .state
        .avatar_uploads()
        .handle_image_selected(
            &token(),
            &user,
            UploadCandidate::new("photo.png", "image/png", vec![0x89, b'P', b'N', b'G']),
        )
        .await
        .unwrap();

    let expected_key = format!("u123-{NOW_MILLIS}.png");
    assert_eq!(outcome.key.as_str(), expected_key);

    let uploads = app.backend.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].key, expected_key);
    assert_eq!(uploads[0].content_type, "image/png");
    assert_eq!(uploads[0].len, 4);
    assert_eq!(
        uploads[0].options,
        UploadOptions {
            cache_control_secs: 3600,
            upsert: true,
        }
    );
}

#[tokio::test]
async fn test_upload_persists_public_reference_not_signed_url() {
    let app = app();
    let user = UserId::new("u123");

    let outcome = app
        .state
        .avatar_uploads()
        .handle_image_selected(
            &token(),
            &user,
            UploadCandidate::new("photo.png", "image/png", vec![1, 2, 3]),
        )
        .await
        .unwrap();

    let public = format!("{STORAGE_ROOT}/public/avatars/u123-{NOW_MILLIS}.png");
    assert_eq!(outcome.public_url, public);

    let stored = app.backend.profile("u123").unwrap().avatar_url.unwrap();
    assert_eq!(stored, public);
    assert!(!stored.contains("/sign/"));
    assert!(!stored.contains("token="));

    // Nothing was signed during the upload itself
    assert!(app.backend.sign_requests().is_empty());
}

#[tokio::test]
async fn test_six_mebibyte_jpeg_rejected_before_network() {
    let app = app();
    let six_mib = vec![0u8; 6 * 1024 * 1024];

    let failure = app
        .state
        .avatar_uploads()
        .handle_image_selected(
            &token(),
            &UserId::new("u123"),
            UploadCandidate::new("big.jpg", "image/jpeg", six_mib),
        )
        .await
        .unwrap_err();

    assert_eq!(
        failure.error.user_message(),
        "Image size should be less than 5MB"
    );
    assert!(failure.preview.is_none());
    assert!(app.backend.uploads().is_empty());
    assert!(app.backend.patches().is_empty());
}

#[tokio::test]
async fn test_non_image_rejected_before_network() {
    let app = app();

    let failure = app
        .state
        .avatar_uploads()
        .handle_image_selected(
            &token(),
            &UserId::new("u123"),
            UploadCandidate::new("notes.txt", "text/plain", b"hello".to_vec()),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.error.user_message(), "Please upload an image file");
    assert!(app.backend.uploads().is_empty());
    assert!(app.backend.patches().is_empty());
}

#[tokio::test]
async fn test_upload_failure_keeps_preview_and_row() {
    let app = app();
    app.backend.fail(FailOn::Upload);

    let failure = app
        .state
        .avatar_uploads()
        .handle_image_selected(
            &token(),
            &UserId::new("u123"),
            UploadCandidate::new("photo.png", "image/png", vec![1, 2, 3]),
        )
        .await
        .unwrap_err();

    assert!(matches!(failure.error, UploadWorkflowError::Upload(_)));
    assert_eq!(
        failure.preview.unwrap().as_str(),
        "data:image/png;base64,AQID"
    );
    assert!(app.backend.patches().is_empty());
    assert!(app.backend.profile("u123").unwrap().avatar_url.is_none());
}

#[tokio::test]
async fn test_persist_failure_leaves_row_unchanged() {
    let app = TestApp::new(
        FakeBackend::new()
            .with_user("u123", EMAIL, PASSWORD, Some("Ada Lovelace"))
            .with_avatar("u123", "avatars/u123-1.png"),
    );
    app.backend.fail(FailOn::UpdateProfile);

    let failure = app
        .state
        .avatar_uploads()
        .handle_image_selected(
            &token(),
            &UserId::new("u123"),
            UploadCandidate::new("photo.png", "image/png", vec![1, 2, 3]),
        )
        .await
        .unwrap_err();

    assert!(matches!(failure.error, UploadWorkflowError::Persist(_)));
    assert!(failure.preview.is_some());
    assert_eq!(app.backend.uploads().len(), 1);
    assert_eq!(
        app.backend.profile("u123").unwrap().avatar_url.as_deref(),
        Some("avatars/u123-1.png")
    );
}

#[tokio::test]
async fn test_uploading_flag_cleared_after_every_outcome() {
    let app = app();
    let user = UserId::new("u123");
    let service = app.state.avatar_uploads();

    app.backend.fail(FailOn::Upload);
    let _ = service
        .handle_image_selected(
            &token(),
            &user,
            UploadCandidate::new("photo.png", "image/png", vec![1]),
        )
        .await;
    assert!(!app.state.uploads().is_uploading(&user));

    app.backend.recover(FailOn::Upload);
    service
        .handle_image_selected(
            &token(),
            &user,
            UploadCandidate::new("photo.png", "image/png", vec![1]),
        )
        .await
        .unwrap();
    assert!(!app.state.uploads().is_uploading(&user));
}

#[tokio::test]
async fn test_second_upload_refused_while_first_in_flight() {
    let app = app();
    let user = UserId::new("u123");

    let _in_flight = app.state.uploads().begin(&user).unwrap();
    let failure = app
        .state
        .avatar_uploads()
        .handle_image_selected(
            &token(),
            &user,
            UploadCandidate::new("photo.png", "image/png", vec![1]),
        )
        .await
        .unwrap_err();

    assert!(matches!(failure.error, UploadWorkflowError::InProgress));
    assert!(app.backend.uploads().is_empty());
}

// ============================================================================
// Router
// ============================================================================

#[tokio::test]
async fn test_upload_route_success_shows_toast_and_new_avatar() {
    let app = app();
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let response = app
        .upload_avatar(&cookie, "photo.png", "image/png", &[1, 2, 3])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/profile"));

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(page.contains("Profile picture updated successfully!"));
    assert!(page.contains(&format!(
        "{STORAGE_ROOT}/sign/avatars/u123-{NOW_MILLIS}.png?token=signed-60"
    )));
}

#[tokio::test]
async fn test_upload_route_rejects_oversized_image() {
    let app = app();
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    let response = app
        .upload_avatar(&cookie, "big.jpg", "image/jpeg", &vec![0u8; 6 * 1024 * 1024])
        .await;
    assert_eq!(location(&response), Some("/profile"));
    assert!(app.backend.uploads().is_empty());

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(page.contains("Image size should be less than 5MB"));
}

#[tokio::test]
async fn test_upload_route_rejects_non_image() {
    let app = app();
    let cookie = app.sign_in(EMAIL, PASSWORD).await;

    app.upload_avatar(&cookie, "notes.txt", "text/plain", b"hello")
        .await;
    assert!(app.backend.uploads().is_empty());

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(page.contains("Please upload an image file"));
}

#[tokio::test]
async fn test_upload_route_failure_keeps_preview_for_one_render() {
    let app = app();
    let cookie = app.sign_in(EMAIL, PASSWORD).await;
    app.backend.fail(FailOn::Upload);

    app.upload_avatar(&cookie, "photo.png", "image/png", &[1, 2, 3])
        .await;

    let page = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(page.contains("Error uploading image"));
    assert!(page.contains("data:image/png;base64,AQID"));

    let reloaded = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(!reloaded.contains("data:image/png;base64,AQID"));
    assert!(!reloaded.contains("Error uploading image"));
}

#[tokio::test]
async fn test_upload_route_requires_sign_in() {
    let app = app();
    let (content_type, body) =
        techplement_integration_tests::multipart_file("avatar", "photo.png", "image/png", &[1]);

    let request = axum::http::Request::post("/profile/avatar")
        .header(axum::http::header::CONTENT_TYPE, content_type)
        .body(axum::body::Body::from(body))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).unwrap().starts_with("/auth/login"));
    assert!(app.backend.uploads().is_empty());
}
