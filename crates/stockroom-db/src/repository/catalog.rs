//! # Catalog Repository
//!
//! Minimal access to categories and catalog products. Full CRUD lives in
//! an external module; the engines only need the foreign-key targets to
//! exist and to look a product up by id.

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use stockroom_core::{CatalogProduct, Category};

use crate::error::{DbError, DbResult};

/// Whether a catalog product exists.
pub async fn product_exists<'e, E>(executor: E, product_id: i64) -> DbResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM product WHERE product_id = ?1)")
            .bind(product_id)
            .fetch_one(executor)
            .await?;
    Ok(found)
}

/// Repository for categories and catalog products.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts a category and returns it with its generated id.
    pub async fn insert_category(&self, name: &str) -> DbResult<Category> {
        debug!(name = %name, "Inserting category");

        let category_id: i64 =
            sqlx::query_scalar("INSERT INTO category (name) VALUES (?1) RETURNING category_id")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;

        Ok(Category {
            category_id,
            name: name.to_string(),
        })
    }

    /// Inserts a catalog product and returns it with its generated id.
    pub async fn insert_product(
        &self,
        category_id: i64,
        name: &str,
        characteristics: &str,
    ) -> DbResult<CatalogProduct> {
        debug!(category_id, name = %name, "Inserting catalog product");

        let product_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO product (category_id, name, characteristics)
            VALUES (?1, ?2, ?3)
            RETURNING product_id
            "#,
        )
        .bind(category_id)
        .bind(name)
        .bind(characteristics)
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogProduct {
            product_id,
            category_id,
            name: name.to_string(),
            characteristics: characteristics.to_string(),
        })
    }

    /// Gets a catalog product by id.
    pub async fn get_product(&self, product_id: i64) -> DbResult<CatalogProduct> {
        let row: Option<(i64, i64, String, String)> = sqlx::query_as(
            "SELECT product_id, category_id, name, characteristics FROM product WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(product_id, category_id, name, characteristics)| CatalogProduct {
            product_id,
            category_id,
            name,
            characteristics,
        })
        .ok_or_else(|| DbError::not_found("Product", product_id.to_string()))
    }

    /// All catalog products ordered by name.
    pub async fn list_products(&self) -> DbResult<Vec<CatalogProduct>> {
        let rows: Vec<(i64, i64, String, String)> = sqlx::query_as(
            "SELECT product_id, category_id, name, characteristics FROM product ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, category_id, name, characteristics)| CatalogProduct {
                product_id,
                category_id,
                name,
                characteristics,
            })
            .collect())
    }
}
