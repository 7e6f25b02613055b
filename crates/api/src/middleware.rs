use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use facturo_auth::JwtValidator;
use facturo_infra::ServiceError;

use crate::app::errors::{json_error, service_error_to_response};
use crate::app::services::AppServices;
use crate::context::UserContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub services: Arc<AppServices>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).map_err(unauthorized)?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        unauthorized("invalid or expired token")
    })?;

    match state.services.users.get_user(claims.sub).await {
        Ok(_) => {}
        Err(ServiceError::NotFound(_)) => return Err(unauthorized("user no longer exists")),
        Err(e) => return Err(service_error_to_response(e)),
    }

    req.extensions_mut().insert(UserContext::new(claims.sub));

    Ok(next.run(req).await)
}

fn unauthorized(message: &'static str) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, &'static str> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("missing authentication token")?;

    let header = header.to_str().map_err(|_| "invalid token format")?;

    let header = header.strip_prefix("Bearer ").ok_or("invalid token format")?;

    let token = header.trim();
    if token.is_empty() {
        return Err("invalid token format");
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn rejects_missing_or_malformed_headers() {
        assert_eq!(extract_bearer(&HeaderMap::new()).unwrap_err(), "missing authentication token");
        assert_eq!(extract_bearer(&headers("Basic abc")).unwrap_err(), "invalid token format");
        assert_eq!(extract_bearer(&headers("Bearer   ")).unwrap_err(), "invalid token format");
    }
}
