use axum::{
    extract::State,
    http::{header::LOCATION, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::middleware::AuthUser,
    error::AppResult,
    extract::{JsonBody, PathParam},
    reminders::dto::{DeletedReminder, Reminder, ReminderPayload},
    state::AppState,
};

/// All routes here require an authenticated caller.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reminders", get(list_reminders).post(create_reminder))
        .route(
            "/reminders/:id",
            get(get_reminder).put(update_reminder).delete(delete_reminder),
        )
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_reminders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Reminder>>> {
    state.reminders().list(user.id).await.map(Json)
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_reminder(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<Reminder>> {
    state.reminders().get(user.id, id).await.map(Json)
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_reminder(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<ReminderPayload>,
) -> AppResult<impl IntoResponse> {
    let reminder = state.reminders().create(user.id, payload).await?;
    let location = format!("/api/reminders/{}", reminder.id);
    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(reminder)))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_reminder(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<ReminderPayload>,
) -> AppResult<Json<Reminder>> {
    state.reminders().update(user.id, id, payload).await.map(Json)
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_reminder(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<DeletedReminder>> {
    state.reminders().delete(user.id, id).await.map(Json)
}
