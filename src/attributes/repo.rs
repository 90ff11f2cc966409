use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::AppError;

/// Tags and ingredients share one shape and lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    pub fn table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    /// Recipe field holding the relation.
    pub fn field(self) -> &'static str {
        self.table()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Attribute {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

#[async_trait]
pub trait AttributeRepository: Send + Sync {
    /// Caller's records ordered by name descending.
    async fn list(&self, kind: AttributeKind, user_id: i64) -> Result<Vec<Attribute>, AppError>;
    async fn create(
        &self,
        kind: AttributeKind,
        user_id: i64,
        name: &str,
    ) -> Result<Attribute, AppError>;
    /// Subset of `ids` owned by `user_id`, ordered by id.
    async fn find_owned(
        &self,
        kind: AttributeKind,
        user_id: i64,
        ids: &[i64],
    ) -> Result<Vec<Attribute>, AppError>;
}

pub struct PgAttributeRepository {
    pool: PgPool,
}

impl PgAttributeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttributeRepository for PgAttributeRepository {
    async fn list(&self, kind: AttributeKind, user_id: i64) -> Result<Vec<Attribute>, AppError> {
        let sql = format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = $1 ORDER BY name DESC, id DESC",
            kind.table()
        );
        let rows = sqlx::query_as::<_, Attribute>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create(
        &self,
        kind: AttributeKind,
        user_id: i64,
        name: &str,
    ) -> Result<Attribute, AppError> {
        let sql = format!(
            "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name",
            kind.table()
        );
        let row = sqlx::query_as::<_, Attribute>(&sql)
            .bind(user_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_owned(
        &self,
        kind: AttributeKind,
        user_id: i64,
        ids: &[i64],
    ) -> Result<Vec<Attribute>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = $1 AND id = ANY($2) ORDER BY id",
            kind.table()
        );
        let rows = sqlx::query_as::<_, Attribute>(&sql)
            .bind(user_id)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
