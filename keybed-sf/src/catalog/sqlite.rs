//! SQLite-backed catalog
//!
//! Reads for browsing and comparison, writes for the admin surface. JSON
//! columns (`specs`, `specifications`, `faq`, `buy_links`) are decoded here;
//! callers only see typed records.

use async_trait::async_trait;
use keybed_common::catalog::{
    Brand, CatalogRecord, ProductDetails, SpecBag, SpecificationDocument, PLACEHOLDER_IMAGE,
};
use keybed_common::{time, Error, Result};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::filters::{FilterOptions, SortOption};
use super::CatalogAccessor;
use crate::compare::codec::is_valid_item_id;

/// Rating shown for records stored without one
const DEFAULT_RATING: f64 = 4.5;

const SELECT_INSTRUMENTS: &str = "SELECT id, name, brand, image, price, rating, release_year, \
     description, specs, compare_count, popularity_score FROM instruments";

/// Admin-supplied instrument fields
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentInput {
    /// Generated when omitted on create; ignored on update
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub brand: Brand,
    #[serde(default)]
    pub image: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(alias = "releaseYear")]
    pub release_year: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub specs: SpecBag,
    #[serde(default, alias = "popularityScore")]
    pub popularity_score: Option<i64>,
}

impl InstrumentInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("name must not be empty".to_string()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::InvalidInput(format!("Invalid price: {}", self.price)));
        }
        if let Some(rating) = self.rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(Error::InvalidInput(format!(
                    "rating must be between 0 and 5, got {}",
                    rating
                )));
            }
        }
        if let Some(id) = &self.id {
            if !is_valid_item_id(id) {
                return Err(Error::InvalidInput(format!("Invalid instrument id: {:?}", id)));
            }
        }
        Ok(())
    }
}

/// Catalog store over a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn get(&self, id: &str) -> Result<Option<CatalogRecord>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_INSTRUMENTS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    pub async fn details(&self, id: &str) -> Result<Option<ProductDetails>> {
        let row = sqlx::query(
            "SELECT specifications, faq, buy_links FROM product_details WHERE instrument_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let specifications = row
            .get::<Option<String>, _>("specifications")
            .map(|json| serde_json::from_str::<SpecificationDocument>(&json))
            .transpose()?;

        Ok(Some(ProductDetails {
            specifications,
            faq: serde_json::from_str(&row.get::<String, _>("faq"))?,
            buy_links: serde_json::from_str(&row.get::<String, _>("buy_links"))?,
        }))
    }

    /// Number of records matching `filters`
    pub async fn count(&self, filters: &FilterOptions) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM instruments");
        filters.push_where(&mut qb);

        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    /// One page of records matching `filters`
    pub async fn list(
        &self,
        filters: &FilterOptions,
        sort: Option<SortOption>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CatalogRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_INSTRUMENTS);
        filters.push_where(&mut qb);
        qb.push(SortOption::order_by(sort));
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    pub async fn by_brand(&self, brand: Brand) -> Result<Vec<CatalogRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE brand = ? ORDER BY created_at DESC, id ASC",
            SELECT_INSTRUMENTS
        ))
        .bind(brand.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Most recent releases first
    pub async fn latest(&self, limit: i64) -> Result<Vec<CatalogRecord>> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY release_year DESC, created_at DESC, id ASC LIMIT ?",
            SELECT_INSTRUMENTS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Returns whether a record was found
    pub async fn increment_compare_count(&self, id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE instruments SET compare_count = compare_count + 1 WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn insert(&self, input: &InstrumentInput) -> Result<CatalogRecord> {
        input.validate()?;

        let id = input
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = time::to_storage_string(&time::now());

        let result = sqlx::query(
            r#"
            INSERT INTO instruments
                (id, name, brand, image, price, rating, release_year, description,
                 specs, popularity_score, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&input.name)
        .bind(input.brand.as_str())
        .bind(&input.image)
        .bind(input.price)
        .bind(input.rating)
        .bind(input.release_year)
        .bind(&input.description)
        .bind(serde_json::to_string(&input.specs)?)
        .bind(input.popularity_score.unwrap_or(50))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(Error::InvalidInput(format!("Instrument {} already exists", id)));
            }
            Err(e) => return Err(e.into()),
        }

        debug!("Inserted instrument {}", id);
        self.get(&id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Instrument {} vanished after insert", id)))
    }

    /// Replace all editable fields; `None` if the record doesn't exist
    pub async fn update(&self, id: &str, input: &InstrumentInput) -> Result<Option<CatalogRecord>> {
        input.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE instruments
            SET name = ?, brand = ?, image = ?, price = ?, rating = ?, release_year = ?,
                description = ?, specs = ?, popularity_score = COALESCE(?, popularity_score),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.name)
        .bind(input.brand.as_str())
        .bind(&input.image)
        .bind(input.price)
        .bind(input.rating)
        .bind(input.release_year)
        .bind(&input.description)
        .bind(serde_json::to_string(&input.specs)?)
        .bind(input.popularity_score)
        .bind(time::to_storage_string(&time::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Returns whether a record was deleted; details go with it
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM instruments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert or replace the product details of an existing record
    pub async fn upsert_details(&self, id: &str, details: &ProductDetails) -> Result<()> {
        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM instruments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("Instrument {}", id)));
        }

        let specifications = details
            .specifications
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO product_details (instrument_id, specifications, faq, buy_links, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(instrument_id) DO UPDATE SET
                specifications = excluded.specifications,
                faq = excluded.faq,
                buy_links = excluded.buy_links,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(specifications)
        .bind(serde_json::to_string(&details.faq)?)
        .bind(serde_json::to_string(&details.buy_links)?)
        .bind(time::to_storage_string(&time::now()))
        .execute(&self.pool)
        .await?;

        debug!("Stored product details for {}", id);
        Ok(())
    }
}

#[async_trait]
impl CatalogAccessor for SqliteCatalog {
    async fn get_basic_record(&self, id: &str) -> Result<Option<CatalogRecord>> {
        self.get(id).await
    }

    async fn get_product_details(&self, id: &str) -> Result<Option<ProductDetails>> {
        self.details(id).await
    }
}

fn record_from_row(row: &SqliteRow) -> Result<CatalogRecord> {
    let id: String = row.get("id");
    let brand =
        Brand::from_str(&row.get::<String, _>("brand")).map_err(|e| Error::corrupt(&id, e))?;
    let specs = serde_json::from_str(&row.get::<String, _>("specs"))
        .map_err(|e| Error::corrupt(&id, e))?;
    let image = row
        .get::<Option<String>, _>("image")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string());

    Ok(CatalogRecord {
        id,
        name: row.get("name"),
        brand,
        image,
        price: row.get("price"),
        rating: row.get::<Option<f64>, _>("rating").unwrap_or(DEFAULT_RATING),
        release_year: row.get("release_year"),
        description: row.get("description"),
        specs,
        compare_count: row.get("compare_count"),
        popularity_score: row.get("popularity_score"),
    })
}
