use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::jwt::JwtKeys,
    error::{AppError, AppResult},
};

/// Identity of the caller, placed in request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub expires_at: i64,
}

/// Reads `Authorization: Bearer <token>` and verifies it as an access token.
pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> AppResult<AuthUser> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthenticated("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::Unauthenticated("Invalid Authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthenticated(
            "Authorization header must be 'Bearer <token>'",
        ))?;

    let claims = keys.verify_access(token)?;
    Ok(AuthUser {
        id: claims.sub,
        email: claims.email,
        expires_at: claims.exp,
    })
}

/// Rejects the request with 401 unless it carries a valid access token.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(req.headers(), &keys)?;
    debug!(user_id = %user.id, "authenticated");
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
