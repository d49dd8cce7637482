//! Browser-session gate for `/api/user` routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::warn;

use crate::error::{ApiError, MutationError};
use crate::state::AppState;

pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = jar
        .get(&state.config.session_cookie)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
    else {
        return MutationError(ApiError::Unauthorized("Unauthorized")).into_response();
    };

    let user = match state.sessions.find_session(&token, Utc::now()).await {
        Ok(Some(user)) => user,
        Ok(None) => return MutationError(ApiError::Unauthorized("Unauthorized")).into_response(),
        Err(e) => return MutationError(ApiError::Internal(e)).into_response(),
    };

    if let Some(domain) = &state.config.allowed_email_domain {
        if !user.has_email_domain(domain) {
            warn!(user_id = %user.user_id, "Session rejected: e-mail outside allowed domain");
            return MutationError(ApiError::Unauthorized("Unauthorized")).into_response();
        }
    }

    req.extensions_mut().insert(user);
    next.run(req).await
}
