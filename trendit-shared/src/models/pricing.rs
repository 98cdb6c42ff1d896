//! Price list shown to advertisers (per-platform advert and engagement prices)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Pricing {
    pub id: Uuid,

    /// Unique, e.g. `instagram-follow`
    pub item_name: String,

    /// Minor units
    pub price: i64,

    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePricing {
    pub item_name: String,
    pub price: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePricing {
    pub item_name: Option<String>,
    pub price: Option<i64>,
    pub description: Option<String>,
}

impl Pricing {
    pub async fn create(pool: &PgPool, data: CreatePricing) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Pricing>(
            r#"
            INSERT INTO pricing (item_name, price, description)
            VALUES ($1, $2, $3)
            RETURNING id, item_name, price, description, created_at, updated_at
            "#,
        )
        .bind(data.item_name)
        .bind(data.price)
        .bind(data.description)
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Pricing>(
            "SELECT id, item_name, price, description, created_at, updated_at FROM pricing ORDER BY item_name",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdatePricing,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Pricing>(
            r#"
            UPDATE pricing
            SET item_name = COALESCE($2, item_name),
                price = COALESCE($3, price),
                description = COALESCE($4, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, item_name, price, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.item_name)
        .bind(data.price)
        .bind(data.description)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pricing WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
