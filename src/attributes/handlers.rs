use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{info, instrument};

use super::{
    dto::{AttributeResponse, CreateAttributeRequest},
    repo::AttributeKind,
};
use crate::{
    error::{method_not_allowed, AppError, FieldErrors, REQUIRED},
    extract::ApiJson,
    state::AppState,
    users::{
        extractors::AuthUser,
        repo_types::User,
        services::{too_long, BLANK, MAX_FIELD_LEN},
    },
};

pub fn attribute_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/recipe/tags",
            get(list_tags).post(create_tag).fallback(method_not_allowed),
        )
        .route(
            "/recipe/ingredients",
            get(list_ingredients)
                .post(create_ingredient)
                .fallback(method_not_allowed),
        )
}

pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<AttributeResponse>>, AppError> {
    list_attributes(&state, &user, AttributeKind::Tag).await
}

pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<CreateAttributeRequest>,
) -> Result<(StatusCode, Json<AttributeResponse>), AppError> {
    create_attribute(&state, &user, AttributeKind::Tag, payload).await
}

pub async fn list_ingredients(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<AttributeResponse>>, AppError> {
    list_attributes(&state, &user, AttributeKind::Ingredient).await
}

pub async fn create_ingredient(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<CreateAttributeRequest>,
) -> Result<(StatusCode, Json<AttributeResponse>), AppError> {
    create_attribute(&state, &user, AttributeKind::Ingredient, payload).await
}

#[instrument(skip(state, user), fields(user_id = user.id))]
async fn list_attributes(
    state: &AppState,
    user: &User,
    kind: AttributeKind,
) -> Result<Json<Vec<AttributeResponse>>, AppError> {
    let rows = state.attributes.list(kind, user.id).await?;
    Ok(Json(rows.into_iter().map(AttributeResponse::from).collect()))
}

#[instrument(skip(state, user, payload), fields(user_id = user.id))]
async fn create_attribute(
    state: &AppState,
    user: &User,
    kind: AttributeKind,
    payload: CreateAttributeRequest,
) -> Result<(StatusCode, Json<AttributeResponse>), AppError> {
    let name = validate_attribute_name(payload.name.as_deref())?;
    let created = state.attributes.create(kind, user.id, &name).await?;
    info!(id = created.id, ?kind, "attribute created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Trimmed name, or a field error on `name`.
pub fn validate_attribute_name(raw: Option<&str>) -> Result<String, AppError> {
    let mut errors = FieldErrors::new();
    let name = raw.map(str::trim).unwrap_or_default();
    match raw {
        None => errors.add("name", REQUIRED),
        Some(_) if name.is_empty() => errors.add("name", BLANK),
        Some(_) if name.chars().count() > MAX_FIELD_LEN => {
            errors.add("name", too_long(MAX_FIELD_LEN))
        }
        Some(_) => {}
    }
    errors.into_result()?;
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed() {
        assert_eq!(validate_attribute_name(Some("  Vegan ")).unwrap(), "Vegan");
    }

    #[test]
    fn blank_or_missing_name_rejected() {
        assert!(validate_attribute_name(Some("")).is_err());
        assert!(validate_attribute_name(Some("   ")).is_err());
        assert!(validate_attribute_name(None).is_err());
    }

    #[test]
    fn overlong_name_rejected() {
        let name = "x".repeat(MAX_FIELD_LEN + 1);
        assert!(validate_attribute_name(Some(&name)).is_err());
        let name = "x".repeat(MAX_FIELD_LEN);
        assert!(validate_attribute_name(Some(&name)).is_ok());
    }
}
