//! One-shot session values.
//!
//! Toasts, the preview of a failed upload, and a name whose save failed are
//! written by one request and read, then removed, by the next rendered page.
//!
//! Notifications are fire-and-forget: a session write failure is logged and
//! otherwise ignored, since nothing depends on the toast being shown.

use tower_sessions::Session;

use techplement_core::PreviewUrl;

use crate::models::{Toast, keys};

/// Queue a notification for the next rendered page.
pub async fn push_toast(session: &Session, toast: Toast) {
    let mut toasts: Vec<Toast> = session
        .get(keys::TOASTS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    toasts.push(toast);

    if let Err(e) = session.insert(keys::TOASTS, toasts).await {
        tracing::warn!(error = %e, "Failed to queue notification");
    }
}

/// Take all queued notifications.
pub async fn take_toasts(session: &Session) -> Vec<Toast> {
    session
        .remove::<Vec<Toast>>(keys::TOASTS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Keep the preview of an upload that did not complete for one more render.
pub async fn set_pending_preview(session: &Session, preview: &PreviewUrl) {
    if let Err(e) = session.insert(keys::PENDING_PREVIEW, preview).await {
        tracing::warn!(error = %e, "Failed to keep upload preview");
    }
}

/// Take the preview left by a failed upload, if any.
pub async fn take_pending_preview(session: &Session) -> Option<PreviewUrl> {
    session
        .remove::<PreviewUrl>(keys::PENDING_PREVIEW)
        .await
        .ok()
        .flatten()
}

/// Keep a display name whose save failed, so the form shows what was typed.
pub async fn set_pending_name(session: &Session, full_name: &str) {
    if let Err(e) = session.insert(keys::PENDING_NAME, full_name).await {
        tracing::warn!(error = %e, "Failed to keep entered name");
    }
}

/// Take the display name left by a failed save, if any.
pub async fn take_pending_name(session: &Session) -> Option<String> {
    session
        .remove::<String>(keys::PENDING_NAME)
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_toasts_are_consumed_once() {
        let session = session();
        push_toast(&session, Toast::success("Profile updated successfully!")).await;
        push_toast(&session, Toast::error("Error uploading image")).await;

        let toasts = take_toasts(&session).await;
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].message, "Profile updated successfully!");
        assert!(take_toasts(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_pending_preview_is_consumed_once() {
        let session = session();
        assert!(take_pending_preview(&session).await.is_none());

        let preview =
            techplement_core::UploadCandidate::new("a.gif", "image/gif", b"GIF89a".to_vec())
                .validate()
                .unwrap()
                .preview();
        set_pending_preview(&session, &preview).await;

        assert_eq!(take_pending_preview(&session).await, Some(preview));
        assert!(take_pending_preview(&session).await.is_none());
    }
}
