use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, SignupRequest, VerifyResponse},
        middleware::AuthUser,
    },
    error::AppResult,
    extract::JsonBody,
    state::AppState,
};

fn today() -> time::Date {
    OffsetDateTime::now_utc().date()
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

/// Expects `require_auth` to be layered on by the caller.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/verify", get(verify))
        .route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> AppResult<Json<AuthResponse>> {
    state.auth().signup(payload, today()).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    state.auth().login(payload, today()).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    state
        .auth()
        .refresh(&payload.refresh_token, today())
        .await
        .map(Json)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn verify(Extension(user): Extension<AuthUser>) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        expires_at: user.expires_at,
    })
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<PublicUser>> {
    state.auth().current_user(user.id, today()).await.map(Json)
}
