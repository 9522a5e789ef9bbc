use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use parley_db::models::UserRow;
use parley_types::UserId;
use parley_types::models::User;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::ingress::run_db;

/// `GET /users` — directory of registered users, sorted by username, so a
/// client can pick a receiver. Password hashes never leave the row type.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state.db, |db| db.list_users()).await?;
    let users: Vec<User> = rows.into_iter().map(user_from_row).collect();
    Ok(Json(users))
}

/// `GET /users/{id}`.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state.db, move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(|| ApiError::custom(StatusCode::NOT_FOUND, "user not found"))?;
    Ok(Json(user_from_row(row)))
}

fn user_from_row(row: UserRow) -> User {
    User {
        id: row.id,
        username: row.username,
        created_at: parse_created(&row.created_at, row.id),
    }
}

// User rows carry SQLite's own datetime('now') format, not RFC 3339.
fn parse_created(raw: &str, user_id: i64) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .or_else(|_| raw.parse::<DateTime<Utc>>())
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on user {}: {}", raw, user_id, e);
            DateTime::default()
        })
}
