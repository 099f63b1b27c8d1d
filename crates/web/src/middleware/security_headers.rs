//! Security headers middleware.
//!
//! Adds restrictive security headers to all responses. The only loosening
//! is for images: avatars are served from the backend's storage origin, and
//! upload previews are `data:` URLs.

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

/// Precomputed header values.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    csp: HeaderValue,
}

impl SecurityHeaders {
    /// Build the policy allowing images from `image_origin`.
    ///
    /// Falls back to a policy without the extra origin if it cannot be put
    /// in a header.
    #[must_use]
    pub fn new(image_origin: &str) -> Self {
        let csp = HeaderValue::from_str(&content_security_policy(image_origin))
            .unwrap_or_else(|_| HeaderValue::from_static(BASE_POLICY));
        Self { csp }
    }
}

const BASE_POLICY: &str = "default-src 'none'; \
     script-src 'self'; \
     style-src 'self'; \
     font-src 'self'; \
     img-src 'self' data: blob:; \
     connect-src 'self'; \
     frame-src 'none'; \
     object-src 'none'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'none'";

fn content_security_policy(image_origin: &str) -> String {
    BASE_POLICY.replace(
        "img-src 'self' data: blob:;",
        &format!("img-src 'self' data: blob: {image_origin};"),
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY` - Prevent clickjacking
/// - `X-Content-Type-Options: nosniff` - Prevent MIME sniffing
/// - `Referrer-Policy: no-referrer` - Zero referrer leakage
/// - `Content-Security-Policy` - Strict CSP, images also from the backend
/// - `Cache-Control: no-store, max-age=0` - Signed URLs and toasts must not be cached
/// - `Cross-Origin-Opener-Policy: same-origin` - Process isolation
/// - `X-DNS-Prefetch-Control: off` - Prevent DNS prefetch leakage
pub async fn security_headers_middleware(
    State(policy): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let is_static = request.uri().path().starts_with("/static/");
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(CONTENT_SECURITY_POLICY, policy.csp);

    if !is_static {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_allows_backend_images() {
        let csp = content_security_policy("https://abc.supabase.co");
        assert!(csp.contains("img-src 'self' data: blob: https://abc.supabase.co;"));
        assert!(csp.contains("script-src 'self';"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }

    #[test]
    fn test_header_value_builds() {
        let headers = SecurityHeaders::new("https://abc.supabase.co");
        assert!(
            headers
                .csp
                .to_str()
                .is_ok_and(|v| v.contains("abc.supabase.co"))
        );
    }
}
