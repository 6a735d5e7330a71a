use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AppliedLine, Catalog, CatalogProduct, ClaimOutcome, ClaimToken, Ledger, LineKey, OrderId,
    ProductId, Result, StoreError,
};

/// PostgreSQL-backed catalog and ledger.
///
/// Stock decrements are a single conditional `UPDATE … RETURNING`, so
/// concurrent decrements of the same product serialize on the row lock.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<CatalogProduct> {
        Ok(CatalogProduct {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            stock: row.try_get("stock")?,
        })
    }

    fn row_to_line(row: PgRow) -> Result<AppliedLine> {
        let key = LineKey::new(
            ProductId::new(row.try_get::<String, _>("product_id")?),
            u32_column(&row, "quantity")?,
            u32_column(&row, "occurrence")?,
        );
        Ok(AppliedLine {
            line_index: u32_column(&row, "line_index")?,
            key,
            new_stock: row.try_get("new_stock")?,
            applied_at: row.try_get::<DateTime<Utc>, _>("applied_at")?,
        })
    }
}

#[async_trait]
impl Catalog for PostgresStore {
    #[tracing::instrument(skip(self))]
    async fn find_by_name(&self, name: &str) -> Result<Vec<CatalogProduct>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, stock
            FROM products
            WHERE name = $1
            ORDER BY id ASC
            LIMIT 2
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    #[tracing::instrument(skip(self, product_id), fields(product_id = %product_id))]
    async fn decrement_stock(&self, product_id: &ProductId, quantity: u32) -> Result<i64> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = GREATEST(stock - $2, 0), updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        stock.ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<Option<CatalogProduct>> {
        let row: Option<PgRow> = sqlx::query("SELECT id, name, stock FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }
}

#[async_trait]
impl Ledger for PostgresStore {
    async fn is_marked(&self, order_id: &OrderId) -> Result<bool> {
        let marked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reconciliation_ledger WHERE order_id = $1)",
        )
        .bind(order_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(marked)
    }

    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    async fn mark(&self, order_id: &OrderId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO reconciliation_ledger (order_id, marked_at)
            VALUES ($1, $2)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(order_id.as_str())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM reconciliation_claims WHERE order_id = $1")
            .bind(order_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    async fn try_claim(&self, order_id: &OrderId, lease: Duration) -> Result<ClaimOutcome> {
        if self.is_marked(order_id).await? {
            return Ok(ClaimOutcome::AlreadyApplied);
        }

        let now = Utc::now();
        // Insert-or-take-over-expired in one statement; no row back means an
        // unexpired claim is held elsewhere.
        let claimed: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO reconciliation_claims (order_id, token, claimed_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id) DO UPDATE
                SET token = EXCLUDED.token,
                    claimed_at = EXCLUDED.claimed_at,
                    expires_at = EXCLUDED.expires_at
                WHERE reconciliation_claims.expires_at <= $3
            RETURNING token
            "#,
        )
        .bind(order_id.as_str())
        .bind(ClaimToken::generate().as_uuid())
        .bind(now)
        .bind(now + lease)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match claimed {
            Some(token) => ClaimOutcome::Acquired(ClaimToken::from_uuid(token)),
            None => ClaimOutcome::InProgress,
        })
    }

    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    async fn release(&self, order_id: &OrderId, token: ClaimToken) -> Result<()> {
        let released =
            sqlx::query("DELETE FROM reconciliation_claims WHERE order_id = $1 AND token = $2")
                .bind(order_id.as_str())
                .bind(token.as_uuid())
                .execute(&self.pool)
                .await?
                .rows_affected();

        if released == 0 {
            tracing::debug!(%token, "claim already taken over, nothing to release");
        }
        Ok(())
    }

    async fn applied_lines(&self, order_id: &OrderId) -> Result<Vec<AppliedLine>> {
        let rows = sqlx::query(
            r#"
            SELECT line_index, product_id, quantity, occurrence, new_stock, applied_at
            FROM reconciliation_lines
            WHERE order_id = $1
            ORDER BY line_index ASC
            "#,
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_line).collect()
    }

    async fn mark_line(&self, order_id: &OrderId, line: AppliedLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_lines
                (order_id, product_id, quantity, occurrence, line_index, new_stock, applied_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (order_id, product_id, quantity, occurrence) DO NOTHING
            "#,
        )
        .bind(order_id.as_str())
        .bind(line.key.product_id.as_str())
        .bind(i64::from(line.key.quantity))
        .bind(i64::from(line.key.occurrence))
        .bind(i64::from(line.line_index))
        .bind(line.new_stock)
        .bind(line.applied_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Reads a `BIGINT` column that must hold a `u32`.
fn u32_column(row: &PgRow, column: &'static str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| StoreError::InvalidRow { column, value })
}
