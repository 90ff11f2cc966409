use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{
        RecipeDetailResponse, RecipeImageResponse, RecipeListParams, RecipePayload,
        RecipeResponse,
    },
    images::{image_url, remove_image, upload_recipe_image, IMAGE_FIELD},
    repo_types::Recipe,
    services::{build_filter, ensure_relations_owned, merge_payload},
};
use crate::{
    attributes::{dto::AttributeResponse, repo::AttributeKind},
    error::{method_not_allowed, AppError, NON_FIELD},
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
    users::extractors::AuthUser,
};

pub fn recipe_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/recipe/recipes",
            get(list_recipes)
                .post(create_recipe)
                .fallback(method_not_allowed),
        )
        .route(
            "/recipe/recipes/:id",
            get(get_recipe)
                .put(update_recipe)
                .patch(partial_update_recipe)
                .delete(delete_recipe)
                .fallback(method_not_allowed),
        )
        .route(
            "/recipe/recipes/:id/upload-image",
            post(upload_image)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<RecipeListParams>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    let filter = build_filter(params.tags.as_deref(), params.ingredients.as_deref())?;
    let recipes = state.recipes.list(user.id, &filter).await?;
    Ok(Json(recipes.into_iter().map(RecipeResponse::from).collect()))
}

#[instrument(skip(state, user, payload), fields(user_id = user.id))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<(StatusCode, Json<RecipeResponse>), AppError> {
    let data = merge_payload(payload, None)?;
    ensure_relations_owned(&*state.attributes, user.id, &data).await?;

    let recipe = state.recipes.create(user.id, &data).await?;
    info!(recipe_id = recipe.id, "recipe created");
    Ok((StatusCode::CREATED, Json(recipe.into())))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let recipe = state
        .recipes
        .find(user.id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(detail(&state, recipe).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = user.id))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<Json<RecipeResponse>, AppError> {
    write_recipe(&state, user.id, id, payload, false).await
}

#[instrument(skip(state, user, payload), fields(user_id = user.id))]
pub async fn partial_update_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<Json<RecipeResponse>, AppError> {
    write_recipe(&state, user.id, id, payload, true).await
}

async fn write_recipe(
    state: &AppState,
    user_id: i64,
    id: i64,
    payload: RecipePayload,
    partial: bool,
) -> Result<Json<RecipeResponse>, AppError> {
    let current = state
        .recipes
        .find(user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let data = merge_payload(payload, partial.then_some(&current))?;
    ensure_relations_owned(&*state.attributes, user_id, &data).await?;

    let recipe = state
        .recipes
        .update(user_id, id, &data)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(recipe_id = recipe.id, partial, "recipe updated");
    Ok(Json(recipe.into()))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, AppError> {
    let recipe = state
        .recipes
        .find(user.id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !state.recipes.delete(user.id, id).await? {
        return Err(AppError::NotFound);
    }
    if let Some(key) = recipe.image {
        remove_image(&state, &key).await;
    }
    info!(recipe_id = id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST multipart with a single `image` file field.
#[instrument(skip(state, user, multipart), fields(user_id = user.id))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecipeImageResponse>, AppError> {
    let current = state
        .recipes
        .find(user.id, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut multipart = multipart?;
    let mut body = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::multipart(NON_FIELD, e))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::multipart(IMAGE_FIELD, e))?;
            body = Some(bytes);
        }
    }
    let body =
        body.ok_or_else(|| AppError::validation(IMAGE_FIELD, "No file was submitted."))?;

    let recipe = upload_recipe_image(&state, current, body).await?;
    let key = recipe
        .image
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("recipe {} has no image after upload", recipe.id))?;
    Ok(Json(RecipeImageResponse {
        id: recipe.id,
        image: image_url(&state, key).await?,
    }))
}

/// Resolves relation ids to `{id, name}` and presigns the image.
async fn detail(state: &AppState, recipe: Recipe) -> Result<RecipeDetailResponse, AppError> {
    let tags = state
        .attributes
        .find_owned(AttributeKind::Tag, recipe.user_id, &recipe.tag_ids)
        .await?;
    let ingredients = state
        .attributes
        .find_owned(AttributeKind::Ingredient, recipe.user_id, &recipe.ingredient_ids)
        .await?;
    let image = match recipe.image.as_deref() {
        Some(key) => Some(image_url(state, key).await?),
        None => None,
    };

    Ok(RecipeDetailResponse {
        id: recipe.id,
        title: recipe.title,
        ingredients: ingredients.into_iter().map(AttributeResponse::from).collect(),
        tags: tags.into_iter().map(AttributeResponse::from).collect(),
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link,
        image,
    })
}
