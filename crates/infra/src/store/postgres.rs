//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | duplicate invoice number or email |
//! | Database (foreign key violation) | `23503` | `NotFound` | line for a deleted invoice, unknown user |
//! | Database (other) | Any other | `Backend` | check constraints, etc. |
//! | Other | N/A | `Backend` | pool closed, network errors, decode errors |
//!
//! Lines reference invoices with `ON DELETE CASCADE`, so deleting an invoice is a
//! single statement.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use facturo_auth::User;
use facturo_core::{Entity, InvoiceId, InvoiceLineId, UserId};
use facturo_invoicing::{Invoice, InvoiceDetails, InvoiceLine, InvoiceNumber, InvoiceStatus};

use super::{InvoiceLineStore, InvoiceStore, StoreError, StoreResult, UserStore};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url` and apply pending migrations.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;

        tracing::info!("postgres store ready");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, name, issuer_name, issuer_address, client_name, client_address,
    invoice_date, due_date, vat_active, vat_rate, status, total_amount, user_id,
    created_at, updated_at
"#;

const LINE_COLUMNS: &str =
    "id, invoice_id, description, quantity, unit_price, total, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

#[async_trait]
impl InvoiceStore for PostgresStore {
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id()), err)]
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let d = invoice.details();
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, name, issuer_name, issuer_address, client_name,
                client_address, invoice_date, due_date, vat_active, vat_rate, status,
                total_amount, user_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(invoice.id().as_uuid())
        .bind(invoice.invoice_number().as_str())
        .bind(&d.name)
        .bind(&d.issuer_name)
        .bind(&d.issuer_address)
        .bind(&d.client_name)
        .bind(&d.client_address)
        .bind(d.invoice_date)
        .bind(d.due_date)
        .bind(d.vat_active)
        .bind(d.vat_rate)
        .bind(invoice.status().as_str())
        .bind(invoice.total_amount())
        .bind(d.user_id.map(Uuid::from))
        .bind(invoice.created_at())
        .bind(invoice.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        Ok(())
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id()), err)]
    async fn update_invoice_details(&self, invoice: &Invoice) -> StoreResult<()> {
        let d = invoice.details();
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                name = $2, issuer_name = $3, issuer_address = $4, client_name = $5,
                client_address = $6, invoice_date = $7, due_date = $8, vat_active = $9,
                vat_rate = $10, user_id = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(invoice.id().as_uuid())
        .bind(&d.name)
        .bind(&d.issuer_name)
        .bind(&d.issuer_address)
        .bind(&d.client_name)
        .bind(&d.client_address)
        .bind(d.invoice_date)
        .bind(d.due_date)
        .bind(d.vat_active)
        .bind(d.vat_rate)
        .bind(d.user_id.map(Uuid::from))
        .bind(invoice.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_invoice_details", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("invoice"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn set_invoice_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query("UPDATE invoices SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(updated_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_invoice_status", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("invoice"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn set_invoice_total(
        &self,
        id: InvoiceId,
        total: f64,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE invoices SET total_amount = $2, updated_at = $3 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(total)
                .bind(updated_at)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("set_invoice_total", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("invoice"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        let row: Option<InvoiceRow> =
            sqlx::query_as(&format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_invoice", e))?;
        row.map(Invoice::try_from).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_invoices(&self) -> StoreResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_invoices", e))?;
        rows.into_iter().map(Invoice::try_from).collect()
    }

    #[instrument(skip(self), err)]
    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_invoice", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn latest_invoice_number(&self, prefix: &str) -> StoreResult<Option<InvoiceNumber>> {
        // Prefixes are `FACT-YYYYMM`: no LIKE wildcards to escape.
        let number: Option<String> = sqlx::query_scalar(
            r#"
            SELECT invoice_number
            FROM invoices
            WHERE invoice_number LIKE $1 || '%'
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(prefix)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_invoice_number", e))?;
        Ok(number.map(InvoiceNumber::from_stored))
    }
}

#[async_trait]
impl InvoiceLineStore for PostgresStore {
    #[instrument(skip(self, line), fields(line_id = %line.id()), err)]
    async fn insert_line(&self, line: &InvoiceLine) -> StoreResult<()> {
        bind_line(sqlx::query(INSERT_LINE), line)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_line", e))?;
        Ok(())
    }

    #[instrument(skip(self, lines), fields(count = lines.len()), err)]
    async fn insert_lines(&self, lines: &[InvoiceLine]) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_lines", e))?;
        for line in lines {
            bind_line(sqlx::query(INSERT_LINE), line)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_lines", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_lines", e))?;
        Ok(())
    }

    #[instrument(skip(self, line), fields(line_id = %line.id()), err)]
    async fn update_line(&self, line: &InvoiceLine) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invoice_lines
            SET description = $2, quantity = $3, unit_price = $4, total = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(line.id().as_uuid())
        .bind(line.description())
        .bind(line.quantity())
        .bind(line.unit_price())
        .bind(line.total())
        .bind(line.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_line", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("line"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_line(&self, id: InvoiceLineId) -> StoreResult<Option<InvoiceLine>> {
        let row: Option<LineRow> =
            sqlx::query_as(&format!("SELECT {LINE_COLUMNS} FROM invoice_lines WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_line", e))?;
        Ok(row.map(InvoiceLine::from))
    }

    #[instrument(skip(self), err)]
    async fn lines_for_invoice(&self, invoice_id: InvoiceId) -> StoreResult<Vec<InvoiceLine>> {
        let rows: Vec<LineRow> = sqlx::query_as(&format!(
            "SELECT {LINE_COLUMNS} FROM invoice_lines WHERE invoice_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(invoice_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("lines_for_invoice", e))?;
        Ok(rows.into_iter().map(InvoiceLine::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn delete_line(&self, id: InvoiceLineId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM invoice_lines WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_line", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id()), err)]
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.name())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id()), err)]
    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET name = $2, email = $3, password_hash = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.name())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_user", e))?;
        Ok(row.map(User::from))
    }

    #[instrument(skip(self, email), err)]
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        Ok(row.map(User::from))
    }
}

const INSERT_LINE: &str = r#"
    INSERT INTO invoice_lines
        (id, invoice_id, description, quantity, unit_price, total, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

fn bind_line<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    line: &'q InvoiceLine,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(line.id().as_uuid())
        .bind(*line.invoice_id().as_uuid())
        .bind(line.description())
        .bind(line.quantity())
        .bind(line.unit_price())
        .bind(line.total())
        .bind(line.created_at())
        .bind(line.updated_at())
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound("referenced record"),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: Uuid,
    invoice_number: String,
    name: String,
    issuer_name: Option<String>,
    issuer_address: Option<String>,
    client_name: Option<String>,
    client_address: Option<String>,
    invoice_date: NaiveDate,
    due_date: NaiveDate,
    vat_active: bool,
    vat_rate: f64,
    status: String,
    total_amount: f64,
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = StoreError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let status = InvoiceStatus::parse(&row.status)
            .map_err(|e| StoreError::Backend(format!("corrupt invoice row {}: {e}", row.id)))?;
        Ok(Invoice::restore(
            InvoiceId::from_uuid(row.id),
            InvoiceNumber::from_stored(row.invoice_number),
            status,
            row.total_amount,
            InvoiceDetails {
                name: row.name,
                issuer_name: row.issuer_name,
                issuer_address: row.issuer_address,
                client_name: row.client_name,
                client_address: row.client_address,
                invoice_date: row.invoice_date,
                due_date: row.due_date,
                vat_active: row.vat_active,
                vat_rate: row.vat_rate,
                user_id: row.user_id.map(UserId::from_uuid),
            },
            row.created_at,
            row.updated_at,
        ))
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    id: Uuid,
    invoice_id: Uuid,
    description: String,
    quantity: f64,
    unit_price: f64,
    #[allow(dead_code)] // recomputed from quantity × unit_price on load
    total: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LineRow> for InvoiceLine {
    fn from(row: LineRow) -> Self {
        InvoiceLine::restore(
            InvoiceLineId::from_uuid(row.id),
            InvoiceId::from_uuid(row.invoice_id),
            row.description,
            row.quantity,
            row.unit_price,
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::restore(
            UserId::from_uuid(row.id),
            row.name,
            row.email,
            row.password_hash,
            row.created_at,
            row.updated_at,
        )
    }
}
