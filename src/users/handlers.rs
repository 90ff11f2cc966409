use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    error::{method_not_allowed, AppError, FieldErrors, REQUIRED, NON_FIELD},
    extract::ApiJson,
    state::AppState,
    users::{
        dto::{RegisterRequest, TokenRequest, TokenResponse, UpdateUserRequest, UserResponse},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::hash_password,
        repo::DUPLICATE_EMAIL,
        services::{
            authenticate, create_user, normalize_email, validate_email, validate_name,
            validate_password, BAD_CREDENTIALS, BLANK,
        },
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/create", post(register).fallback(method_not_allowed))
        .route("/user/token", post(issue_token).fallback(method_not_allowed))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route(
        "/user/me",
        get(get_me)
            .put(update_me)
            .patch(update_me)
            .fallback(method_not_allowed),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let mut errors = FieldErrors::new();
    if payload.email.is_none() {
        errors.add("email", REQUIRED);
    }
    if payload.password.is_none() {
        errors.add("password", REQUIRED);
    }
    errors.into_result()?;

    let user = create_user(
        &*state.users,
        payload.email.as_deref().unwrap_or_default(),
        payload.password.as_deref().unwrap_or_default(),
        payload.name.as_deref().unwrap_or_default(),
    )
    .await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

#[instrument(skip(state, payload))]
pub async fn issue_token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let mut errors = FieldErrors::new();
    for (field, value) in [("email", &payload.email), ("password", &payload.password)] {
        match value.as_deref() {
            None => errors.add(field, REQUIRED),
            Some(v) if v.trim().is_empty() => errors.add(field, BLANK),
            Some(_) => {}
        }
    }
    errors.into_result()?;

    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    let user = authenticate(&*state.users, &email, &password)
        .await?
        .ok_or_else(|| AppError::validation(NON_FIELD, BAD_CREDENTIALS))?;

    let token = JwtKeys::from_ref(&state).sign(user.id)?;
    info!(user_id = user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

/// Serves both PUT and PATCH; only provided fields change.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let mut errors = FieldErrors::new();

    let email = payload.email.as_deref().map(normalize_email);
    if let Some(email) = &email {
        validate_email(email, &mut errors);
    }
    if let Some(name) = &payload.name {
        validate_name(name, &mut errors);
    }
    if let Some(password) = &payload.password {
        validate_password(password, &mut errors);
    }
    errors.into_result()?;

    if let Some(email) = email {
        if email != user.email {
            if state.users.find_by_email(&email).await?.is_some() {
                return Err(AppError::validation("email", DUPLICATE_EMAIL));
            }
            user.email = email;
        }
    }
    if let Some(name) = payload.name {
        user.name = name;
    }
    if let Some(password) = payload.password {
        user.password_hash = hash_password(&password)?;
    }

    let user = state.users.update(&user).await?;
    info!(user_id = user.id, "profile updated");
    Ok(Json(UserResponse::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_response_never_contains_password() {
        let response = UserResponse {
            email: "test@gmail.com".to_string(),
            name: "name".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["email"], "test@gmail.com");
        assert_eq!(json["name"], "name");
        assert!(json.get("password").is_none());
    }
}
