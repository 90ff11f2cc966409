use serde::{Deserialize, Serialize};

use super::repo::Attribute;

#[derive(Debug, Deserialize)]
pub struct CreateAttributeRequest {
    pub name: Option<String>,
}

/// `{id, name}`; used on its own and nested in recipe details.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttributeResponse {
    pub id: i64,
    pub name: String,
}

impl From<Attribute> for AttributeResponse {
    fn from(a: Attribute) -> Self {
        Self {
            id: a.id,
            name: a.name,
        }
    }
}
