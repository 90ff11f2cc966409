use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::repo_types::{Recipe, RecipeData, RecipeFilter, RecipeRow};
use crate::error::AppError;

#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Caller's recipes matching `filter`, newest id first.
    async fn list(&self, user_id: i64, filter: &RecipeFilter) -> Result<Vec<Recipe>, AppError>;
    async fn find(&self, user_id: i64, id: i64) -> Result<Option<Recipe>, AppError>;
    async fn create(&self, user_id: i64, data: &RecipeData) -> Result<Recipe, AppError>;
    /// Replaces every writable field and both relation sets.
    async fn update(
        &self,
        user_id: i64,
        id: i64,
        data: &RecipeData,
    ) -> Result<Option<Recipe>, AppError>;
    async fn set_image(
        &self,
        user_id: i64,
        id: i64,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, AppError>;
    /// `false` when nothing owned by `user_id` had that id.
    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, AppError>;
}

const RECIPE_COLUMNS: &str =
    "id, user_id, title, time_minutes, price, link, image, created_at";

pub struct PgRecipeRepository {
    pool: PgPool,
}

impl PgRecipeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads relation ids for many recipes in two queries.
    async fn attach_relations(&self, rows: Vec<RecipeRow>) -> Result<Vec<Recipe>, AppError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut tags = group_pairs(
            sqlx::query_as::<_, (i64, i64)>(
                "SELECT recipe_id, tag_id FROM recipe_tags WHERE recipe_id = ANY($1) ORDER BY tag_id",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?,
        );
        let mut ingredients = group_pairs(
            sqlx::query_as::<_, (i64, i64)>(
                "SELECT recipe_id, ingredient_id FROM recipe_ingredients WHERE recipe_id = ANY($1) ORDER BY ingredient_id",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?,
        );

        Ok(rows
            .into_iter()
            .map(|row| {
                let tag_ids = tags.remove(&row.id).unwrap_or_default();
                let ingredient_ids = ingredients.remove(&row.id).unwrap_or_default();
                Recipe::from_row(row, tag_ids, ingredient_ids)
            })
            .collect())
    }

    async fn attach_one(&self, row: Option<RecipeRow>) -> Result<Option<Recipe>, AppError> {
        match row {
            Some(row) => Ok(self.attach_relations(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

fn group_pairs(pairs: Vec<(i64, i64)>) -> HashMap<i64, Vec<i64>> {
    let mut out: HashMap<i64, Vec<i64>> = HashMap::new();
    for (recipe_id, other_id) in pairs {
        out.entry(recipe_id).or_default().push(other_id);
    }
    out
}

/// Rewrites both join tables for one recipe.
async fn replace_relations_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    data: &RecipeData,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("clear recipe tags")?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("clear recipe ingredients")?;

    if !data.tag_ids.is_empty() {
        sqlx::query(
            "INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(&data.tag_ids)
        .execute(&mut **tx)
        .await
        .context("insert recipe tags")?;
    }
    if !data.ingredient_ids.is_empty() {
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(&data.ingredient_ids)
        .execute(&mut **tx)
        .await
        .context("insert recipe ingredients")?;
    }
    Ok(())
}

#[async_trait]
impl RecipeRepository for PgRecipeRepository {
    async fn list(&self, user_id: i64, filter: &RecipeFilter) -> Result<Vec<Recipe>, AppError> {
        let sql = format!(
            r#"
            SELECT {RECIPE_COLUMNS}
              FROM recipes r
             WHERE r.user_id = $1
               AND ($2::bigint[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_tags rt
                     WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)))
               AND ($3::bigint[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_ingredients ri
                     WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)))
             ORDER BY r.id DESC
            "#
        );
        let rows = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(user_id)
            .bind(filter.tag_ids.as_deref())
            .bind(filter.ingredient_ids.as_deref())
            .fetch_all(&self.pool)
            .await?;
        self.attach_relations(rows).await
    }

    async fn find(&self, user_id: i64, id: i64) -> Result<Option<Recipe>, AppError> {
        let sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        self.attach_one(row).await
    }

    async fn create(&self, user_id: i64, data: &RecipeData) -> Result<Recipe, AppError> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let sql = format!(
            r#"
            INSERT INTO recipes (user_id, title, time_minutes, price, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RECIPE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(user_id)
            .bind(&data.title)
            .bind(data.time_minutes)
            .bind(data.price)
            .bind(&data.link)
            .fetch_one(&mut *tx)
            .await?;
        replace_relations_tx(&mut tx, row.id, data).await?;
        tx.commit().await.context("commit tx")?;

        Ok(Recipe::from_row(
            row,
            sorted_unique(&data.tag_ids),
            sorted_unique(&data.ingredient_ids),
        ))
    }

    async fn update(
        &self,
        user_id: i64,
        id: i64,
        data: &RecipeData,
    ) -> Result<Option<Recipe>, AppError> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let sql = format!(
            r#"
            UPDATE recipes
               SET title = $3, time_minutes = $4, price = $5, link = $6
             WHERE id = $1 AND user_id = $2
            RETURNING {RECIPE_COLUMNS}
            "#
        );
        let Some(row) = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&data.title)
            .bind(data.time_minutes)
            .bind(data.price)
            .bind(&data.link)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        replace_relations_tx(&mut tx, row.id, data).await?;
        tx.commit().await.context("commit tx")?;

        Ok(Some(Recipe::from_row(
            row,
            sorted_unique(&data.tag_ids),
            sorted_unique(&data.ingredient_ids),
        )))
    }

    async fn set_image(
        &self,
        user_id: i64,
        id: i64,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, AppError> {
        let sql = format!(
            "UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2 RETURNING {RECIPE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(image)
            .fetch_optional(&self.pool)
            .await?;
        self.attach_one(row).await
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, AppError> {
        // join rows go with ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub fn sorted_unique(ids: &[i64]) -> Vec<i64> {
    let mut out = ids.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}
