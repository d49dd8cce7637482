//! Public API gateway: IP rate limiting followed by API-key authentication.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::services::rate_limit::RateDecision;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_QUERY_PARAM: &str = "apiKey";

/// Identity resolved by [`api_key_middleware`], available to handlers as an
/// `Extension`.
#[derive(Debug, Clone)]
pub struct AuthenticatedKey {
    pub key_id: i64,
    pub user_id: String,
    pub name: String,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Candidate token in precedence order: `X-API-Key`, then
/// `Authorization: Bearer`, then the `apiKey` query parameter.
pub fn extract_candidate(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(non_empty);

    let from_bearer = || {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim_start().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .and_then(|(_, token)| non_empty(token))
    };

    let from_query = || {
        let params: HashMap<String, String> = serde_urlencoded::from_str(query?).ok()?;
        params.get(API_KEY_QUERY_PARAM).and_then(|v| non_empty(v))
    };

    from_header.or_else(from_bearer).or_else(from_query)
}

/// First hop of the trusted proxy header, else the socket peer.
pub fn client_ip(req: &Request, trusted_header: &str) -> String {
    req.headers()
        .get(trusted_header)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(non_empty)
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req, &state.config.trusted_ip_header);

    match state.rate_limiter.check(&ip).await {
        Ok(RateDecision::Allowed) => {}
        Ok(RateDecision::Limited { retry_after_secs }) => {
            warn!(%ip, "Rate limit exceeded");
            return ApiError::RateLimited { retry_after_secs }.into_response();
        }
        Err(e) => {
            // Fail open: a limiter outage must not take the API down.
            error!("Rate limit check failed: {:#}", e);
        }
    }

    next.run(req).await
}

pub async fn api_key_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let candidate = extract_candidate(req.headers(), req.uri().query());

    let key = match state.keys.authenticate(candidate.as_deref()).await {
        Ok(key) => key,
        Err(e) => return ApiError::from(e).into_response(),
    };

    req.extensions_mut().insert(AuthenticatedKey {
        key_id: key.id,
        user_id: key.user_id,
        name: key.name,
    });
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn header_beats_bearer_and_query() {
        let h = headers(&[("x-api-key", "oa_header"), ("authorization", "Bearer oa_bearer")]);
        assert_eq!(extract_candidate(&h, Some("apiKey=oa_query")).as_deref(), Some("oa_header"));
    }

    #[test]
    fn bearer_beats_query() {
        let h = headers(&[("authorization", "Bearer oa_bearer")]);
        assert_eq!(extract_candidate(&h, Some("apiKey=oa_query")).as_deref(), Some("oa_bearer"));
    }

    #[test]
    fn empty_values_fall_through() {
        let h = headers(&[("x-api-key", "  "), ("authorization", "Bearer ")]);
        assert_eq!(
            extract_candidate(&h, Some("dimension=Gender&apiKey=oa_query")).as_deref(),
            Some("oa_query")
        );
        assert_eq!(extract_candidate(&h, Some("apiKey=")), None);
        assert_eq!(extract_candidate(&HeaderMap::new(), None), None);
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        for value in ["bearer oa_token", "BEARER oa_token", "Bearer  oa_token"] {
            let h = headers(&[("authorization", value)]);
            assert_eq!(extract_candidate(&h, None).as_deref(), Some("oa_token"), "{value}");
        }
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let h = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert_eq!(extract_candidate(&h, None), None);
    }

    #[test]
    fn client_ip_prefers_the_trusted_header() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req, "x-forwarded-for"), "203.0.113.7");

        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_ip(&req, "x-forwarded-for"), "192.0.2.1");
    }
}
