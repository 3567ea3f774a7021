use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::db::users::{self, NewUser};
use crate::errors::{is_unique_violation, AppError, AppResult};
use crate::extract::ApiJson;
use crate::mail::OutgoingMail;
use crate::models::user::{DbUser, SignupRequest, SignupResponse, TokenRequest, TokenResponse};
use crate::utils::{generate_confirmation_code, hash_secret, verify_secret};
use crate::validation::FieldErrors;

#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Confirmation code sent to the email address", body = SignupResponse),
        (status = 400, description = "Invalid or reserved username, or username/email taken")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> AppResult<Json<SignupResponse>> {
    let mut errors = FieldErrors::new();
    let username = errors.required("username", payload.username);
    let email = errors.required("email", payload.email);
    if let Some(username) = username.as_deref() {
        errors.username("username", username);
    }
    if let Some(email) = email.as_deref() {
        errors.email("email", email);
    }
    errors.into_result()?;

    let (Some(username), Some(email)) = (username, email) else {
        return Err(AppError::internal("validated fields missing"));
    };

    let user = find_or_register(&state, &username, &email).await?;

    let code = generate_confirmation_code();
    users::set_confirmation_code_hash(&state.pool, user.id, &hash_secret(&code)?).await?;

    // The code is stored either way; a failed delivery can be retried by
    // signing up again with the same pair.
    let mail = OutgoingMail::confirmation_code(state.mailer.from_address(), &user.email, &code);
    if let Err(err) = state.mailer.send(mail).await {
        tracing::warn!(user_id = %user.id, error = %err, "failed to deliver confirmation code");
    }

    tracing::info!(user_id = %user.id, username = %user.username, "confirmation code issued");
    Ok(Json(SignupResponse {
        username: user.username,
        email: user.email,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    tag = "Auth",
    request_body = TokenRequest,
    responses(
        (status = 201, description = "Access token issued", body = TokenResponse),
        (status = 400, description = "Missing fields or wrong confirmation code"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TokenRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let mut errors = FieldErrors::new();
    let username = errors.required("username", payload.username);
    let code = errors.required("confirmation_code", payload.confirmation_code);
    errors.into_result()?;

    let (Some(username), Some(code)) = (username, code) else {
        return Err(AppError::internal("validated fields missing"));
    };

    let user = users::find_by_username(&state.pool, &username)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let code_matches = match user.confirmation_code_hash.as_deref() {
        Some(hash) => verify_secret(code.trim(), hash)?,
        None => false,
    };
    if !code_matches {
        tracing::debug!(user_id = %user.id, "confirmation code mismatch");
        return Err(AppError::validation("confirmation_code", "invalid confirmation code"));
    }

    let token = state.jwt.encode(user.id)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// Returns the account for this exact username/email pair, creating it when
/// neither is known. Any partial match is a validation error.
async fn find_or_register(state: &AppState, username: &str, email: &str) -> AppResult<DbUser> {
    if let Some(user) = existing_pair(state, username, email).await? {
        return Ok(user);
    }

    let new_user = NewUser {
        username: username.to_string(),
        email: email.to_string(),
        ..NewUser::default()
    };
    match users::insert(&state.pool, &new_user).await {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, username = %username, "user signed up");
            users::find_by_id(&state.pool, user_id)
                .await?
                .ok_or_else(|| AppError::internal("registered user not found"))
        }
        // a concurrent signup got there first; same pair means a resend
        Err(AppError::Database(ref db_err)) if is_unique_violation(db_err) => existing_pair(state, username, email)
            .await?
            .ok_or_else(|| AppError::validation("non_field_errors", "username or email already in use")),
        Err(err) => Err(err),
    }
}

/// The account holding exactly this pair, `None` when neither is taken.
async fn existing_pair(state: &AppState, username: &str, email: &str) -> AppResult<Option<DbUser>> {
    let by_username = users::find_by_username(&state.pool, username).await?;
    let by_email = users::find_by_email(&state.pool, email).await?;

    match (by_username, by_email) {
        (Some(user), Some(same)) if user.id == same.id => Ok(Some(user)),
        (None, None) => Ok(None),
        (by_username, by_email) => {
            let mut errors = FieldErrors::new();
            if by_username.is_some() {
                errors.add("username", "a user with that username already exists");
            }
            if by_email.is_some() {
                errors.add("email", "a user with that email already exists");
            }
            Err(AppError::Validation(errors))
        }
    }
}
