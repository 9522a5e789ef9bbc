use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::error;

use parley_db::Database;
use parley_types::UserId;
use parley_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use parley_types::token::Claims;

use crate::error::ApiError;
use crate::ingress::{ChatService, run_db};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub chat: ChatService,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::custom(
            StatusCode::BAD_REQUEST,
            "username must be between 3 and 32 characters",
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::custom(
            StatusCode::BAD_REQUEST,
            "password must be at least 8 characters",
        ));
    }

    // Check if username is taken
    let username = req.username.clone();
    if run_db(&state.db, move |db| db.get_user_by_username(&username))
        .await?
        .is_some()
    {
        return Err(ApiError::custom(
            StatusCode::CONFLICT,
            "username already taken",
        ));
    }

    // Argon2id is deliberately slow; hash off the async runtime.
    let password = req.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        registration_failed()
    })?
    .map_err(|e| {
        error!("password hashing failed: {}", e);
        registration_failed()
    })?;

    let username = req.username.clone();
    let user_id = run_db(&state.db, move |db| {
        db.create_user(&username, &password_hash)
    })
    .await?;

    let token = issue_token(&state.jwt_secret, user_id).map_err(internal)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = run_db(&state.db, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or_else(unauthorized)?;

    // Verify password off the runtime too. An unreadable stored hash is an
    // internal fault; a mismatch is a plain 401.
    let stored_hash = user.password.clone();
    let password = req.password.clone();
    let verified = tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)?;
        Ok::<bool, argon2::password_hash::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        login_failed()
    })?
    .map_err(|e| {
        error!("stored password hash unreadable for user {}: {}", user.id, e);
        login_failed()
    })?;

    if !verified {
        return Err(unauthorized());
    }

    let token = issue_token(&state.jwt_secret, user.id).map_err(internal)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

/// 30-day HS256 token. Verified by `TokenVerifier` at both boundaries.
pub fn issue_token(secret: &str, user_id: UserId) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn internal(e: anyhow::Error) -> ApiError {
    error!("auth error: {:#}", e);
    ApiError::custom(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

fn registration_failed() -> ApiError {
    ApiError::custom(StatusCode::INTERNAL_SERVER_ERROR, "registration failed")
}

fn login_failed() -> ApiError {
    ApiError::custom(StatusCode::INTERNAL_SERVER_ERROR, "login failed")
}

fn unauthorized() -> ApiError {
    ApiError::custom(StatusCode::UNAUTHORIZED, "invalid username or password")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::token::TokenVerifier;

    #[test]
    fn issued_token_verifies_back_to_the_same_user() {
        let token = issue_token("secret", 7).unwrap();
        let claims = TokenVerifier::new("secret").verify(&token).unwrap();
        assert_eq!(claims.sub, 7);
    }
}
