use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::{Database, LiveQuery, TableChange};
use crate::error::AppError;
use crate::models::{Category, CategoryId, NewCategory};

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn insert(&self, category: NewCategory) -> Result<Category, AppError>;
    async fn update(&self, category: &Category) -> Result<bool, AppError>;
    /// Deleting a category also deletes every task in it.
    async fn delete(&self, category: &Category) -> Result<bool, AppError>;
    async fn count(&self) -> Result<i64, AppError>;

    fn all(&self) -> LiveQuery<Vec<Category>>;
    fn by_id(&self, id: CategoryId) -> LiveQuery<Option<Category>>;
}

#[derive(Debug, Clone)]
pub struct SqliteCategoryStore {
    db: Database,
}

impl SqliteCategoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryStore for SqliteCategoryStore {
    async fn insert(&self, category: NewCategory) -> Result<Category, AppError> {
        let id = sqlx::query("INSERT INTO categories (name, color) VALUES (?1, ?2)")
            .bind(&category.name)
            .bind(&category.color)
            .execute(self.db.pool())
            .await?
            .last_insert_rowid();

        debug!(category_id = id, "category inserted");
        self.db.changes().notify(&[TableChange::Categories]);
        Ok(Category {
            id,
            name: category.name,
            color: category.color,
        })
    }

    async fn update(&self, category: &Category) -> Result<bool, AppError> {
        let affected = sqlx::query("UPDATE categories SET name = ?1, color = ?2 WHERE id = ?3")
            .bind(&category.name)
            .bind(&category.color)
            .bind(category.id)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        debug!(category_id = category.id, affected, "category updated");
        if affected > 0 {
            self.db.changes().notify(&[TableChange::Categories]);
        }
        Ok(affected > 0)
    }

    async fn delete(&self, category: &Category) -> Result<bool, AppError> {
        let affected = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(category.id)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        if affected > 0 {
            info!("Deleted category {} and its tasks", category.id);
            self.db
                .changes()
                .notify(&[TableChange::Categories, TableChange::Tasks]);
        }
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    fn all(&self) -> LiveQuery<Vec<Category>> {
        self.db.live(TableChange::Categories, |pool| async move {
            fetch_categories(&pool).await
        })
    }

    fn by_id(&self, id: CategoryId) -> LiveQuery<Option<Category>> {
        self.db.live(TableChange::Categories, move |pool| async move {
            find_category_by_id(&pool, id).await
        })
    }
}

async fn fetch_categories(db: &SqlitePool) -> Result<Vec<Category>, AppError> {
    let categories = sqlx::query_as::<_, Category>("SELECT id, name, color FROM categories ORDER BY id")
        .fetch_all(db)
        .await?;
    Ok(categories)
}

async fn find_category_by_id(db: &SqlitePool, id: CategoryId) -> Result<Option<Category>, AppError> {
    let category = sqlx::query_as::<_, Category>("SELECT id, name, color FROM categories WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(category)
}
