//! Caller session extraction

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Header carrying the caller's session id
pub const SESSION_HEADER: &str = "x-session-id";

/// The caller's session id, if the request carried a non-blank one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session(pub Option<String>);

impl Session {
    pub fn owner(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Session(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Session {
        let (mut parts, _) = request.into_parts();
        Session::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_session_from_header() {
        let request = Request::builder().header(SESSION_HEADER, " abc ").body(()).unwrap();
        assert_eq!(extract(request).await.owner(), Some("abc"));
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_is_anonymous() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await, Session(None));

        let request = Request::builder().header(SESSION_HEADER, "   ").body(()).unwrap();
        assert_eq!(extract(request).await, Session(None));
    }
}
