//! Response builders shared by the guard and handlers.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use gatehouse_auth::Challenge;

/// `302 Found` to `location`, optionally setting a cookie.
pub fn found(location: &str, cookie: Option<HeaderValue>) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    match HeaderValue::from_str(location) {
        Ok(value) => {
            headers.insert(header::LOCATION, value);
        }
        Err(_) => {
            tracing::warn!(location, "Redirect location is not a valid header value");
            headers.insert(header::LOCATION, HeaderValue::from_static("/"));
        }
    }
    if let Some(cookie) = cookie {
        headers.append(header::SET_COOKIE, cookie);
    }
    response
}

/// `401` with a Basic challenge and body `Unauthorized`.
pub fn basic_challenge(realm: &str) -> Response {
    let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm.replace('"', "'")))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"));

    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, challenge)
        .body(Body::from("Unauthorized"))
        .unwrap_or_else(|_| StatusCode::UNAUTHORIZED.into_response())
}

/// Render an authenticator challenge.
pub fn challenge(challenge: &Challenge) -> Response {
    match challenge {
        Challenge::Redirect { location } => found(location, None),
        Challenge::Basic { realm } => basic_challenge(realm),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_found_sets_location_and_cookie() {
        let response = found("/members", Some(HeaderValue::from_static("sid=x")));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/members");
        assert_eq!(response.headers()[header::SET_COOKIE], "sid=x");
    }

    #[tokio::test]
    async fn test_basic_challenge() {
        let response = basic_challenge("members");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"members\""
        );
        let body = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&body[..], b"Unauthorized");
    }
}
