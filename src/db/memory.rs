//! Process-local store backing every repository trait, used by `AppState::fake()`.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    attributes::repo::{Attribute, AttributeKind, AttributeRepository},
    error::AppError,
    recipes::{
        repo::{sorted_unique, RecipeRepository},
        repo_types::{Recipe, RecipeData, RecipeFilter},
    },
    users::{
        repo::{UserRepository, DUPLICATE_EMAIL},
        repo_types::{NewUser, User},
    },
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tags: Vec<Attribute>,
    ingredients: Vec<Attribute>,
    recipes: Vec<Recipe>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn attributes(&self, kind: AttributeKind) -> &Vec<Attribute> {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }

    fn attributes_mut(&mut self, kind: AttributeKind) -> &mut Vec<Attribute> {
        match kind {
            AttributeKind::Tag => &mut self.tags,
            AttributeKind::Ingredient => &mut self.ingredients,
        }
    }

    fn recipe_mut(&mut self, user_id: i64, id: i64) -> Option<&mut Recipe> {
        self.recipes
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("memory store poisoned")))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: &NewUser) -> Result<User, AppError> {
        let mut t = self.lock()?;
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::validation("email", DUPLICATE_EMAIL));
        }
        let created = User {
            id: t.next_id(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            name: user.name.clone(),
            is_active: true,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let mut t = self.lock()?;
        if t.users
            .iter()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(AppError::validation("email", DUPLICATE_EMAIL));
        }
        let stored = t
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(AppError::NotFound)?;
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.name = user.name.clone();
        stored.is_active = user.is_active;
        stored.is_staff = user.is_staff;
        stored.is_superuser = user.is_superuser;
        Ok(stored.clone())
    }
}

#[async_trait]
impl AttributeRepository for MemoryStore {
    async fn list(&self, kind: AttributeKind, user_id: i64) -> Result<Vec<Attribute>, AppError> {
        let t = self.lock()?;
        let mut out: Vec<Attribute> = t
            .attributes(kind)
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.name.cmp(&a.name).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn create(
        &self,
        kind: AttributeKind,
        user_id: i64,
        name: &str,
    ) -> Result<Attribute, AppError> {
        let mut t = self.lock()?;
        let attribute = Attribute {
            id: t.next_id(),
            user_id,
            name: name.to_string(),
        };
        t.attributes_mut(kind).push(attribute.clone());
        Ok(attribute)
    }

    async fn find_owned(
        &self,
        kind: AttributeKind,
        user_id: i64,
        ids: &[i64],
    ) -> Result<Vec<Attribute>, AppError> {
        let t = self.lock()?;
        let mut out: Vec<Attribute> = t
            .attributes(kind)
            .iter()
            .filter(|a| a.user_id == user_id && ids.contains(&a.id))
            .cloned()
            .collect();
        out.sort_by_key(|a| a.id);
        Ok(out)
    }
}

#[async_trait]
impl RecipeRepository for MemoryStore {
    async fn list(&self, user_id: i64, filter: &RecipeFilter) -> Result<Vec<Recipe>, AppError> {
        let t = self.lock()?;
        let mut out: Vec<Recipe> = t
            .recipes
            .iter()
            .filter(|r| r.user_id == user_id && filter.matches(&r.tag_ids, &r.ingredient_ids))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(out)
    }

    async fn find(&self, user_id: i64, id: i64) -> Result<Option<Recipe>, AppError> {
        Ok(self
            .lock()?
            .recipes
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .cloned())
    }

    async fn create(&self, user_id: i64, data: &RecipeData) -> Result<Recipe, AppError> {
        let mut t = self.lock()?;
        let recipe = Recipe {
            id: t.next_id(),
            user_id,
            title: data.title.clone(),
            time_minutes: data.time_minutes,
            price: data.price,
            link: data.link.clone(),
            image: None,
            created_at: OffsetDateTime::now_utc(),
            tag_ids: sorted_unique(&data.tag_ids),
            ingredient_ids: sorted_unique(&data.ingredient_ids),
        };
        t.recipes.push(recipe.clone());
        Ok(recipe)
    }

    async fn update(
        &self,
        user_id: i64,
        id: i64,
        data: &RecipeData,
    ) -> Result<Option<Recipe>, AppError> {
        let mut t = self.lock()?;
        let Some(recipe) = t.recipe_mut(user_id, id) else {
            return Ok(None);
        };
        recipe.title = data.title.clone();
        recipe.time_minutes = data.time_minutes;
        recipe.price = data.price;
        recipe.link = data.link.clone();
        recipe.tag_ids = sorted_unique(&data.tag_ids);
        recipe.ingredient_ids = sorted_unique(&data.ingredient_ids);
        Ok(Some(recipe.clone()))
    }

    async fn set_image(
        &self,
        user_id: i64,
        id: i64,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, AppError> {
        let mut t = self.lock()?;
        Ok(t.recipe_mut(user_id, id).map(|recipe| {
            recipe.image = image.map(str::to_string);
            recipe.clone()
        }))
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, AppError> {
        let mut t = self.lock()?;
        let before = t.recipes.len();
        t.recipes.retain(|r| !(r.id == id && r.user_id == user_id));
        Ok(t.recipes.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn data(title: &str, tag_ids: Vec<i64>, ingredient_ids: Vec<i64>) -> RecipeData {
        RecipeData {
            title: title.into(),
            time_minutes: 5,
            price: Decimal::new(500, 2),
            link: String::new(),
            tag_ids,
            ingredient_ids,
        }
    }

    #[tokio::test]
    async fn attributes_are_scoped_and_ordered() {
        let store = MemoryStore::default();
        AttributeRepository::create(&store, AttributeKind::Tag, 1, "Dessert").await.unwrap();
        AttributeRepository::create(&store, AttributeKind::Tag, 1, "Vegan").await.unwrap();
        AttributeRepository::create(&store, AttributeKind::Tag, 2, "Other").await.unwrap();
        AttributeRepository::create(&store, AttributeKind::Ingredient, 1, "Salt")
            .await
            .unwrap();

        let tags = AttributeRepository::list(&store, AttributeKind::Tag, 1).await.unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Vegan", "Dessert"]);
    }

    #[tokio::test]
    async fn recipes_filter_and_delete() {
        let store = MemoryStore::default();
        let a = RecipeRepository::create(&store, 1, &data("A", vec![10], vec![]))
            .await
            .unwrap();
        let b = RecipeRepository::create(&store, 1, &data("B", vec![11], vec![20]))
            .await
            .unwrap();
        RecipeRepository::create(&store, 2, &data("C", vec![10], vec![]))
            .await
            .unwrap();

        let all = RecipeRepository::list(&store, 1, &RecipeFilter::default())
            .await
            .unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        let filter = RecipeFilter {
            tag_ids: Some(vec![10]),
            ingredient_ids: None,
        };
        let only_a = RecipeRepository::list(&store, 1, &filter).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].id, a.id);

        assert!(!RecipeRepository::delete(&store, 2, a.id).await.unwrap());
        assert!(RecipeRepository::delete(&store, 1, a.id).await.unwrap());
        assert!(RecipeRepository::find(&store, 1, a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_field_error() {
        let store = MemoryStore::default();
        let new_user = NewUser {
            email: "a@example.com".into(),
            password_hash: "x".into(),
            name: String::new(),
            is_staff: false,
            is_superuser: false,
        };
        UserRepository::create(&store, &new_user).await.unwrap();
        match UserRepository::create(&store, &new_user).await {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("email"), Some(&[DUPLICATE_EMAIL.to_string()][..]));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
