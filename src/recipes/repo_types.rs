use rust_decimal::Decimal;
use sqlx::FromRow;
use time::OffsetDateTime;

/// `recipes` row without its relations.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>, // storage key
    pub created_at: OffsetDateTime,
}

/// Recipe with tag and ingredient ids, each sorted ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub tag_ids: Vec<i64>,
    pub ingredient_ids: Vec<i64>,
}

impl Recipe {
    pub fn from_row(row: RecipeRow, tag_ids: Vec<i64>, ingredient_ids: Vec<i64>) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            time_minutes: row.time_minutes,
            price: row.price,
            link: row.link,
            image: row.image,
            created_at: row.created_at,
            tag_ids,
            ingredient_ids,
        }
    }
}

/// Validated writable fields; relations are already ownership-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeData {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tag_ids: Vec<i64>,
    pub ingredient_ids: Vec<i64>,
}

/// A recipe matches when it references any listed id; both filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tag_ids: Option<Vec<i64>>,
    pub ingredient_ids: Option<Vec<i64>>,
}

impl RecipeFilter {
    pub fn matches(&self, tag_ids: &[i64], ingredient_ids: &[i64]) -> bool {
        fn any_of(wanted: &Option<Vec<i64>>, have: &[i64]) -> bool {
            wanted
                .as_ref()
                .map_or(true, |ids| ids.iter().any(|id| have.contains(id)))
        }
        any_of(&self.tag_ids, tag_ids) && any_of(&self.ingredient_ids, ingredient_ids)
    }
}
