use anyhow::Context;
use bytes::Bytes;
use image::ImageFormat;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo_types::Recipe;
use crate::{error::AppError, state::AppState};

pub const IMAGE_FIELD: &str = "image";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Sniffs and fully decodes the payload; only formats we can serve back pass.
pub fn validate_image(body: &[u8]) -> Result<ImageFormat, AppError> {
    let invalid = || AppError::validation(IMAGE_FIELD, INVALID_IMAGE);
    if body.is_empty() {
        return Err(AppError::validation(IMAGE_FIELD, "The submitted file is empty."));
    }
    let format = image::guess_format(body).map_err(|_| invalid())?;
    if ext_from_format(format).is_none() {
        return Err(invalid());
    }
    image::load_from_memory_with_format(body, format).map_err(|_| invalid())?;
    Ok(format)
}

fn ext_from_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}

/// `uploads/recipe/<uuid>.<ext>`
pub fn recipe_image_key(ext: &str) -> String {
    format!("uploads/recipe/{}.{}", Uuid::new_v4(), ext)
}

/// Stores the image, points `current` at it and drops the previous object.
pub async fn upload_recipe_image(
    st: &AppState,
    current: Recipe,
    body: Bytes,
) -> Result<Recipe, AppError> {
    let format = validate_image(&body)?;
    let ext = ext_from_format(format).unwrap_or("bin");
    let key = recipe_image_key(ext);
    st.storage
        .put_object(&key, body, format.to_mime_type())
        .await
        .with_context(|| format!("put_object {}", key))
        .map_err(AppError::Storage)?;

    let Some(updated) = st
        .recipes
        .set_image(current.user_id, current.id, Some(&key))
        .await?
    else {
        // recipe vanished between lookup and write
        remove_image(st, &key).await;
        return Err(AppError::NotFound);
    };
    info!(recipe_id = current.id, %key, "recipe image stored");

    if let Some(old) = current.image {
        remove_image(st, &old).await;
    }
    Ok(updated)
}

/// Best effort; a dangling object is only logged.
pub async fn remove_image(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, %key, "failed to delete recipe image");
    }
}

pub async fn image_url(st: &AppState, key: &str) -> Result<String, AppError> {
    st.storage
        .presign_get(key, st.config.storage.url_ttl_secs)
        .await
        .with_context(|| format!("presign url for key {}", key))
        .map_err(AppError::Storage)
}
