use async_trait::async_trait;
use sqlx::{types::Json, PgPool};

use crate::error::Result;
use crate::models::listing::{Counter, Listing, ListingKind};

/// A remote collection of listing documents keyed by id.
///
/// Implementations only move documents; validation, id assignment,
/// filtering and retention live in the services.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn insert(&self, listing: &Listing) -> Result<()>;

    /// Writes every listing or none of them.
    async fn insert_batch(&self, listings: &[Listing]) -> Result<()>;

    async fn fetch(&self, id: &str) -> Result<Option<Listing>>;

    /// Active listings of one kind, newest first, at most `cap` of them.
    async fn fetch_active(&self, kind: ListingKind, cap: usize) -> Result<Vec<Listing>>;

    /// Every listing of one kind including inactive ones, in insertion order.
    async fn fetch_all(&self, kind: ListingKind) -> Result<Vec<Listing>>;

    /// Overwrites the stored document except for its counters, which keep
    /// their stored values. Returns the document as stored, or `None` when
    /// the id is unknown.
    async fn save(&self, listing: &Listing) -> Result<Option<Listing>>;

    async fn set_active(&self, id: &str, active: bool) -> Result<bool>;

    async fn increment(&self, id: &str, counter: Counter) -> Result<bool>;

    async fn deactivate_many(&self, ids: &[String]) -> Result<u64>;

    async fn deactivate_kind(&self, kind: ListingKind) -> Result<u64>;

    /// Physically removes inactive listings of one kind.
    async fn purge_inactive(&self, kind: ListingKind) -> Result<u64>;
}

#[derive(Clone)]
pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn insert(&self, listing: &Listing) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO listings (id, kind, is_active, added_timestamp, doc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&listing.id)
        .bind(listing.kind.as_str())
        .bind(listing.is_active)
        .bind(listing.added_timestamp)
        .bind(Json(listing))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_batch(&self, listings: &[Listing]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for listing in listings {
            sqlx::query(
                r#"
                INSERT INTO listings (id, kind, is_active, added_timestamp, doc)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&listing.id)
            .bind(listing.kind.as_str())
            .bind(listing.is_active)
            .bind(listing.added_timestamp)
            .bind(Json(listing))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Listing>> {
        let row = sqlx::query_scalar::<_, Json<Listing>>("SELECT doc FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(listing)| listing))
    }

    async fn fetch_active(&self, kind: ListingKind, cap: usize) -> Result<Vec<Listing>> {
        let rows = sqlx::query_scalar::<_, Json<Listing>>(
            r#"
            SELECT doc
            FROM listings
            WHERE kind = $1 AND is_active
            ORDER BY added_timestamp DESC, seq ASC
            LIMIT $2
            "#,
        )
        .bind(kind.as_str())
        .bind(cap as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(listing)| listing).collect())
    }

    async fn fetch_all(&self, kind: ListingKind) -> Result<Vec<Listing>> {
        let rows = sqlx::query_scalar::<_, Json<Listing>>(
            "SELECT doc FROM listings WHERE kind = $1 ORDER BY seq ASC",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(listing)| listing).collect())
    }

    async fn save(&self, listing: &Listing) -> Result<Option<Listing>> {
        let row = sqlx::query_scalar::<_, Json<Listing>>(
            r#"
            UPDATE listings
            SET doc = $2::jsonb || jsonb_build_object(
                    'views', COALESCE(doc->'views', '0'::jsonb),
                    'shares', COALESCE(doc->'shares', '0'::jsonb),
                    'applications', COALESCE(doc->'applications', '0'::jsonb),
                    'saves', COALESCE(doc->'saves', '0'::jsonb)
                ),
                is_active = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING doc
            "#,
        )
        .bind(&listing.id)
        .bind(Json(listing))
        .bind(listing.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|Json(listing)| listing))
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE listings
            SET is_active = $2,
                doc = jsonb_set(doc, '{isActive}', to_jsonb($2::boolean)),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(active)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn increment(&self, id: &str, counter: Counter) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE listings
            SET doc = jsonb_set(
                doc,
                ARRAY[$2::text],
                to_jsonb(COALESCE((doc->>$2::text)::bigint, 0) + 1)
            )
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(counter.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn deactivate_many(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let res = sqlx::query(
            r#"
            UPDATE listings
            SET is_active = FALSE,
                doc = jsonb_set(doc, '{isActive}', 'false'::jsonb),
                updated_at = NOW()
            WHERE id = ANY($1) AND is_active
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn deactivate_kind(&self, kind: ListingKind) -> Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE listings
            SET is_active = FALSE,
                doc = jsonb_set(doc, '{isActive}', 'false'::jsonb),
                updated_at = NOW()
            WHERE kind = $1 AND is_active
            "#,
        )
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn purge_inactive(&self, kind: ListingKind) -> Result<u64> {
        let res = sqlx::query("DELETE FROM listings WHERE kind = $1 AND NOT is_active")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}
