use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use parley_types::api::{SearchQuery, SendMessageRequest, UpdateMessageRequest};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Principal;

/// `POST /messages` — validate, persist, fan out. The response does not wait
/// on delivery; pushes are a latency optimization over the REST history.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.chat.submit(principal.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /messages/{id}` — participants only.
pub async fn get_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.chat.get(principal.user_id, id).await?;
    Ok(Json(message))
}

/// `GET /messages` — the caller's history, newest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.chat.list(principal.user_id).await?;
    Ok(Json(messages))
}

/// `GET /messages/search?query=` — caller-scoped substring search.
pub async fn search_messages(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.chat.search(principal.user_id, params.query).await?;
    Ok(Json(messages))
}

/// `PUT /messages/{id}` — sender-only edit; not pushed in real time.
pub async fn update_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.chat.edit(principal.user_id, id, req.body).await?;
    Ok(Json(message))
}

/// `DELETE /messages/{id}` — sender or receiver may delete.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.chat.remove(principal.user_id, id).await?;
    Ok(Json(serde_json::json!({ "message": "message deleted" })))
}
