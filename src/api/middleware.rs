//! API Middleware
//!
//! Principal/context extraction and request logging. Authentication
//! itself lives outside this service; the gateway hands us an
//! already-resolved principal in the X-Principal-Id header.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::domain::OperationContext;

/// The authenticated account on whose behalf a request runs.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub account_id: Uuid,
}

/// Build the operation context from trusted gateway headers.
///
/// A missing principal is fine here (registration and card payments
/// have none); handlers that need one check for it themselves.
pub async fn context_middleware(
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let mut context = OperationContext::new();

    if let Some(principal_str) = headers.get("X-Principal-Id").and_then(|v| v.to_str().ok()) {
        match Uuid::parse_str(principal_str) {
            Ok(account_id) => {
                request.extensions_mut().insert(Principal { account_id });
                context = context.with_principal(account_id);
            }
            Err(_) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Invalid X-Principal-Id header format",
                        "error_code": "invalid_principal_id"
                    })),
                )
                    .into_response());
            }
        }
    }

    let correlation_id = headers
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    context = context.with_correlation_id(correlation_id);
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let headers = mask_headers_for_logging(request.headers());

    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("cookie", "session=secret".parse().unwrap());
        headers.insert("x-principal-id", "abc".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);

        let cookie = masked.iter().find(|(k, _)| k == "cookie");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");
        let principal = masked.iter().find(|(k, _)| k == "x-principal-id");

        assert_eq!(cookie.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
        assert_eq!(principal.unwrap().1, "abc");
    }

    #[test]
    fn test_sensitive_headers_list() {
        assert!(SENSITIVE_HEADERS.contains(&"authorization"));
        assert!(!SENSITIVE_HEADERS.contains(&"content-type"));
    }
}
