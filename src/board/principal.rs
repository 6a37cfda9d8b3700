use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::api::ApiError;

/// Header naming the caller. Authentication happens upstream; this service
/// only scopes data by the id it is handed.
pub const PRINCIPAL_HEADER: &str = "x-user-id";

/// The principal a request acts for. Every board lookup is filtered by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

impl Principal {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        match value {
            Some(id) => Ok(Principal(id.to_string())),
            None => Err(ApiError::Unauthorized(format!(
                "missing {} header",
                PRINCIPAL_HEADER
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Principal, ApiError> {
        let (mut parts, _) = request.into_parts();
        Principal::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_reads_trimmed_header() {
        let request = Request::builder()
            .header(PRINCIPAL_HEADER, "  alice ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap().as_str(), "alice");
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_is_unauthorized() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(extract(missing).await, Err(ApiError::Unauthorized(_))));

        let blank = Request::builder()
            .header(PRINCIPAL_HEADER, "   ")
            .body(())
            .unwrap();
        assert!(matches!(extract(blank).await, Err(ApiError::Unauthorized(_))));
    }
}
