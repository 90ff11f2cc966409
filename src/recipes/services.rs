use rust_decimal::Decimal;

use super::{
    dto::RecipePayload,
    repo::sorted_unique,
    repo_types::{Recipe, RecipeData, RecipeFilter},
};
use crate::{
    attributes::repo::{AttributeKind, AttributeRepository},
    error::{AppError, FieldErrors, REQUIRED},
    users::services::{too_long, BLANK, MAX_FIELD_LEN},
};

const MAX_PRICE_DIGITS: u32 = 5;
const PRICE_DECIMAL_PLACES: u32 = 2;

/// Parses `"1, 2,3"`. Empty input means no filter.
pub fn parse_id_list(field: &str, raw: &str) -> Result<Option<Vec<i64>>, AppError> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = part.parse::<i64>().map_err(|_| {
            AppError::validation(field, format!("\"{part}\" is not a valid id."))
        })?;
        ids.push(id);
    }
    Ok(if ids.is_empty() { None } else { Some(ids) })
}

pub fn build_filter(tags: Option<&str>, ingredients: Option<&str>) -> Result<RecipeFilter, AppError> {
    Ok(RecipeFilter {
        tag_ids: tags.map(|raw| parse_id_list("tags", raw)).transpose()?.flatten(),
        ingredient_ids: ingredients
            .map(|raw| parse_id_list("ingredients", raw))
            .transpose()?
            .flatten(),
    })
}

/// Two decimal places, at most five digits in total.
pub fn normalize_price(price: Decimal) -> Result<Decimal, String> {
    let normalized = price.normalize();
    if normalized.scale() > PRICE_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."
        ));
    }
    let whole_digits = MAX_PRICE_DIGITS - PRICE_DECIMAL_PLACES;
    if normalized.abs() >= Decimal::from(10i64.pow(whole_digits)) {
        return Err(format!(
            "Ensure that there are no more than {whole_digits} digits before the decimal point."
        ));
    }
    let mut out = normalized;
    out.rescale(PRICE_DECIMAL_PLACES);
    Ok(out)
}

fn check_text(field: &str, value: &str, allow_blank: bool, errors: &mut FieldErrors) {
    if !allow_blank && value.trim().is_empty() {
        errors.add(field, BLANK);
    } else if value.chars().count() > MAX_FIELD_LEN {
        errors.add(field, too_long(MAX_FIELD_LEN));
    }
}

/// Merges `payload` over `current` (PATCH) or validates it as a full body
/// (POST/PUT, `current = None` for required-field checks). Relation ids are
/// not ownership-checked here.
pub fn merge_payload(
    payload: RecipePayload,
    current: Option<&Recipe>,
) -> Result<RecipeData, AppError> {
    let mut errors = FieldErrors::new();

    let title = match (payload.title, current) {
        (Some(title), _) => {
            check_text("title", &title, false, &mut errors);
            title.trim().to_string()
        }
        (None, Some(current)) => current.title.clone(),
        (None, None) => {
            errors.add("title", REQUIRED);
            String::new()
        }
    };

    let time_minutes = match (payload.time_minutes, current) {
        (Some(minutes), _) => i32::try_from(minutes).unwrap_or_else(|_| {
            errors.add("time_minutes", "A valid integer is required.");
            0
        }),
        (None, Some(current)) => current.time_minutes,
        (None, None) => {
            errors.add("time_minutes", REQUIRED);
            0
        }
    };

    let price = match (payload.price, current) {
        (Some(price), _) => normalize_price(price).unwrap_or_else(|msg| {
            errors.add("price", msg);
            Decimal::ZERO
        }),
        (None, Some(current)) => current.price,
        (None, None) => {
            errors.add("price", REQUIRED);
            Decimal::ZERO
        }
    };

    let link = match (payload.link, current) {
        (Some(link), _) => {
            check_text("link", &link, true, &mut errors);
            link.trim().to_string()
        }
        (None, Some(current)) => current.link.clone(),
        (None, None) => String::new(),
    };

    let tag_ids = match (payload.tags, current) {
        (Some(ids), _) => sorted_unique(&ids),
        (None, Some(current)) => current.tag_ids.clone(),
        (None, None) => Vec::new(),
    };
    let ingredient_ids = match (payload.ingredients, current) {
        (Some(ids), _) => sorted_unique(&ids),
        (None, Some(current)) => current.ingredient_ids.clone(),
        (None, None) => Vec::new(),
    };

    errors.into_result()?;
    Ok(RecipeData {
        title,
        time_minutes,
        price,
        link,
        tag_ids,
        ingredient_ids,
    })
}

/// Every id must name a record of `kind` owned by `user_id`.
pub async fn ensure_owned(
    attributes: &dyn AttributeRepository,
    kind: AttributeKind,
    user_id: i64,
    ids: &[i64],
    errors: &mut FieldErrors,
) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }
    let owned = attributes.find_owned(kind, user_id, ids).await?;
    for id in ids {
        if !owned.iter().any(|a| a.id == *id) {
            errors.add(
                kind.field(),
                format!("Invalid pk \"{id}\" - object does not exist."),
            );
        }
    }
    Ok(())
}

pub async fn ensure_relations_owned(
    attributes: &dyn AttributeRepository,
    user_id: i64,
    data: &RecipeData,
) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    ensure_owned(attributes, AttributeKind::Tag, user_id, &data.tag_ids, &mut errors).await?;
    ensure_owned(
        attributes,
        AttributeKind::Ingredient,
        user_id,
        &data.ingredient_ids,
        &mut errors,
    )
    .await?;
    errors.into_result()
}
