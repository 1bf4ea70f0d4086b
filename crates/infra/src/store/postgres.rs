//! Postgres-backed stores.
//!
//! Money columns hold minor units (`BIGINT`); line items and tax lines are
//! stored as `JSONB`. Every number column carries a unique constraint.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Postgres, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use tillbook_core::{CustomerId, DocumentId, DomainError, Money, PayableId};
use tillbook_customers::{CUSTOMER_FILTERS, Customer, CustomerKind, CustomerStatus};
use tillbook_documents::{
    INVOICE_FILTERS, Invoice, InvoiceStatus, LineItem, MoneyTotal, QUOTATION_FILTERS, Quotation, QuotationStatus,
    TaxBreakdown,
};
use tillbook_listing::{ListQuery, Page};
use tillbook_numbering::DocumentNumber;
use tillbook_payables::{PAYABLE_FILTERS, Payable, PayableStatus};

use super::sql::{fetch_all, fetch_page};
use super::{CustomerStore, InvoiceStore, NOT_CONVERTIBLE, PayableStore, QuotationStore};
use crate::StoreError;
use crate::error::map_sqlx_error;

/// All four stores over one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply the bundled migrations.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        info!("connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
        info!("database ready");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_err(column: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Database(format!("cannot decode column {column}: {err}"))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| decode_err(column, e))
}

fn parse_enum<T>(column: &str, value: String, parse: fn(&str) -> Option<T>) -> Result<T, StoreError> {
    parse(&value).ok_or_else(|| decode_err(column, format!("unknown value '{value}'")))
}

fn money(row: &PgRow, column: &str) -> Result<Money, StoreError> {
    get::<i64>(row, column).map(Money::from_minor)
}

fn totals(row: &PgRow) -> Result<MoneyTotal, StoreError> {
    Ok(MoneyTotal {
        subtotal: money(row, "subtotal")?,
        discount: money(row, "discount")?,
        tax: money(row, "tax")?,
        total: money(row, "total")?,
    })
}

fn customer_from_row(row: &PgRow) -> Result<Customer, StoreError> {
    Ok(Customer {
        id: CustomerId::from_uuid(get(row, "id")?),
        number: DocumentNumber::from_stored(get::<String>(row, "customer_number")?),
        name: get(row, "name")?,
        email: get(row, "email")?,
        phone: get(row, "phone")?,
        address: get(row, "address")?,
        kind: parse_enum("customer_type", get(row, "customer_type")?, CustomerKind::parse)?,
        status: parse_enum("status", get(row, "status")?, CustomerStatus::parse)?,
        is_walk_in: get(row, "is_walk_in")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn quotation_from_row(row: &PgRow) -> Result<Quotation, StoreError> {
    Ok(Quotation {
        id: DocumentId::from_uuid(get(row, "id")?),
        number: DocumentNumber::from_stored(get::<String>(row, "quotation_number")?),
        customer_id: CustomerId::from_uuid(get(row, "customer_id")?),
        status: parse_enum("status", get(row, "status")?, QuotationStatus::parse)?,
        lines: get::<Json<Vec<LineItem>>>(row, "lines")?.0,
        tax_lines: get::<Json<TaxBreakdown>>(row, "tax_lines")?.0,
        totals: totals(row)?,
        valid_until: get(row, "valid_until")?,
        notes: get(row, "notes")?,
        invoice_id: get::<Option<Uuid>>(row, "invoice_id")?.map(DocumentId::from_uuid),
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn invoice_from_row(row: &PgRow) -> Result<Invoice, StoreError> {
    Ok(Invoice {
        id: DocumentId::from_uuid(get(row, "id")?),
        number: DocumentNumber::from_stored(get::<String>(row, "invoice_number")?),
        customer_id: CustomerId::from_uuid(get(row, "customer_id")?),
        quotation_id: get::<Option<Uuid>>(row, "quotation_id")?.map(DocumentId::from_uuid),
        status: parse_enum("status", get(row, "status")?, InvoiceStatus::parse)?,
        lines: get::<Json<Vec<LineItem>>>(row, "lines")?.0,
        tax_lines: get::<Json<TaxBreakdown>>(row, "tax_lines")?.0,
        totals: totals(row)?,
        issued_at: get(row, "issued_at")?,
        due_date: get(row, "due_date")?,
        paid_at: get(row, "paid_at")?,
    })
}

fn payable_from_row(row: &PgRow) -> Result<Payable, StoreError> {
    Ok(Payable {
        id: PayableId::from_uuid(get(row, "id")?),
        supplier_name: get(row, "supplier_name")?,
        supplier_invoice_no: get(row, "supplier_invoice_no")?,
        purchase_order_ref: get(row, "purchase_order_ref")?,
        amount: money(row, "amount")?,
        paid: money(row, "paid")?,
        due_date: get(row, "due_date")?,
        received_at: get(row, "received_at")?,
        status: parse_enum("status", get(row, "status")?, PayableStatus::parse)?,
    })
}

fn affected_one(operation: &str, result: sqlx::postgres::PgQueryResult) -> Result<(), StoreError> {
    if result.rows_affected() == 0 {
        tracing::debug!(operation, "no row affected");
        return Err(StoreError::NotFound);
    }
    Ok(())
}

fn insert_invoice(invoice: &Invoice) -> Query<'_, Postgres, PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, invoice_number, customer_id, quotation_id, status, lines, tax_lines,
            subtotal, discount, tax, total, issued_at, due_date, paid_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(invoice.id.as_uuid())
    .bind(invoice.number.as_str())
    .bind(invoice.customer_id.as_uuid())
    .bind(invoice.quotation_id.map(Uuid::from))
    .bind(invoice.status.as_str())
    .bind(Json(&invoice.lines))
    .bind(Json(&invoice.tax_lines))
    .bind(invoice.totals.subtotal.minor())
    .bind(invoice.totals.discount.minor())
    .bind(invoice.totals.tax.minor())
    .bind(invoice.totals.total.minor())
    .bind(invoice.issued_at)
    .bind(invoice.due_date)
    .bind(invoice.paid_at)
}

#[async_trait]
impl CustomerStore for PostgresStore {
    #[instrument(skip(self, customer), fields(number = %customer.number), err)]
    async fn insert(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, customer_number, name, email, phone, address,
                customer_type, status, is_walk_in, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(customer.number.as_str())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.kind.as_str())
        .bind(customer.status.as_str())
        .bind(customer.is_walk_in)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        Ok(())
    }

    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT * FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_customer", e))?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT * FROM customers WHERE customer_number = $1")
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_customer", e))?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn update(&self, customer: &Customer) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = $2, email = $3, phone = $4, address = $5,
                customer_type = $6, status = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.kind.as_str())
        .bind(customer.status.as_str())
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_customer", e))?;
        affected_one("update_customer", result)
    }

    async fn delete(&self, id: CustomerId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_customer", e))?;
        affected_one("delete_customer", result)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Customer>, StoreError> {
        fetch_page(&self.pool, "customers", &CUSTOMER_FILTERS, query, customer_from_row).await
    }

    async fn list_all(&self, query: &ListQuery) -> Result<Vec<Customer>, StoreError> {
        fetch_all(&self.pool, "customers", &CUSTOMER_FILTERS, query, customer_from_row).await
    }

    async fn numbers_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT customer_number FROM customers WHERE starts_with(customer_number, $1)")
            .bind(prefix)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("customer_numbers", e))
    }
}

#[async_trait]
impl QuotationStore for PostgresStore {
    #[instrument(skip(self, quotation), fields(number = %quotation.number), err)]
    async fn insert(&self, quotation: &Quotation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO quotations (
                id, quotation_number, customer_id, status, lines, tax_lines,
                subtotal, discount, tax, total, valid_until, notes, invoice_id,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(quotation.id.as_uuid())
        .bind(quotation.number.as_str())
        .bind(quotation.customer_id.as_uuid())
        .bind(quotation.status.as_str())
        .bind(Json(&quotation.lines))
        .bind(Json(&quotation.tax_lines))
        .bind(quotation.totals.subtotal.minor())
        .bind(quotation.totals.discount.minor())
        .bind(quotation.totals.tax.minor())
        .bind(quotation.totals.total.minor())
        .bind(quotation.valid_until)
        .bind(&quotation.notes)
        .bind(quotation.invoice_id.map(Uuid::from))
        .bind(quotation.created_at)
        .bind(quotation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_quotation", e))?;
        Ok(())
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Quotation>, StoreError> {
        let row = sqlx::query("SELECT * FROM quotations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_quotation", e))?;
        row.as_ref().map(quotation_from_row).transpose()
    }

    async fn update(&self, quotation: &Quotation) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE quotations SET
                customer_id = $2, status = $3, lines = $4, tax_lines = $5,
                subtotal = $6, discount = $7, tax = $8, total = $9,
                valid_until = $10, notes = $11, invoice_id = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(quotation.id.as_uuid())
        .bind(quotation.customer_id.as_uuid())
        .bind(quotation.status.as_str())
        .bind(Json(&quotation.lines))
        .bind(Json(&quotation.tax_lines))
        .bind(quotation.totals.subtotal.minor())
        .bind(quotation.totals.discount.minor())
        .bind(quotation.totals.tax.minor())
        .bind(quotation.totals.total.minor())
        .bind(quotation.valid_until)
        .bind(&quotation.notes)
        .bind(quotation.invoice_id.map(Uuid::from))
        .bind(quotation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_quotation", e))?;
        affected_one("update_quotation", result)
    }

    #[instrument(skip(self, converted, invoice), fields(quotation_id = %converted.id, number = %invoice.number), err)]
    async fn record_conversion(&self, converted: &Quotation, invoice: &Invoice) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_conversion", e))?;

        // The row lock makes a concurrent conversion wait, then see the new status.
        let claimed = sqlx::query(
            r#"
            UPDATE quotations SET status = $2, invoice_id = $3, updated_at = $4
            WHERE id = $1 AND status IN ($5, $6)
            "#,
        )
        .bind(converted.id.as_uuid())
        .bind(converted.status.as_str())
        .bind(converted.invoice_id.map(Uuid::from))
        .bind(converted.updated_at)
        .bind(QuotationStatus::Sent.as_str())
        .bind(QuotationStatus::Accepted.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("claim_quotation", e))?;
        if claimed.rows_affected() == 0 {
            return Err(DomainError::conflict(NOT_CONVERTIBLE).into());
        }

        insert_invoice(invoice)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_conversion", e))?;
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Quotation>, StoreError> {
        fetch_page(&self.pool, "quotations", &QUOTATION_FILTERS, query, quotation_from_row).await
    }
}

#[async_trait]
impl InvoiceStore for PostgresStore {
    #[instrument(skip(self, invoice), fields(number = %invoice.number), err)]
    async fn insert(&self, invoice: &Invoice) -> Result<(), StoreError> {
        insert_invoice(invoice)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        Ok(())
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Invoice>, StoreError> {
        let row = sqlx::query("SELECT * FROM invoices WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_invoice", e))?;
        row.as_ref().map(invoice_from_row).transpose()
    }

    async fn update(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE invoices SET status = $2, paid_at = $3 WHERE id = $1")
            .bind(invoice.id.as_uuid())
            .bind(invoice.status.as_str())
            .bind(invoice.paid_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_invoice", e))?;
        affected_one("update_invoice", result)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Invoice>, StoreError> {
        fetch_page(&self.pool, "invoices", &INVOICE_FILTERS, query, invoice_from_row).await
    }
}

#[async_trait]
impl PayableStore for PostgresStore {
    async fn insert(&self, payable: &Payable) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payables (
                id, supplier_name, supplier_invoice_no, purchase_order_ref,
                amount, paid, due_date, received_at, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payable.id.as_uuid())
        .bind(&payable.supplier_name)
        .bind(&payable.supplier_invoice_no)
        .bind(&payable.purchase_order_ref)
        .bind(payable.amount.minor())
        .bind(payable.paid.minor())
        .bind(payable.due_date)
        .bind(payable.received_at)
        .bind(payable.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_payable", e))?;
        Ok(())
    }

    async fn get(&self, id: PayableId) -> Result<Option<Payable>, StoreError> {
        let row = sqlx::query("SELECT * FROM payables WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_payable", e))?;
        row.as_ref().map(payable_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn apply_payment(&self, id: PayableId, amount: Money) -> Result<Payable, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_payment", e))?;

        let row = sqlx::query("SELECT * FROM payables WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_payable", e))?;
        let mut payable = row.as_ref().map(payable_from_row).transpose()?.ok_or(StoreError::NotFound)?;
        payable.register_payment(amount)?;

        sqlx::query("UPDATE payables SET paid = $2, status = $3 WHERE id = $1")
            .bind(payable.id.as_uuid())
            .bind(payable.paid.minor())
            .bind(payable.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_payable", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_payment", e))?;
        Ok(payable)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Payable>, StoreError> {
        fetch_page(&self.pool, "payables", &PAYABLE_FILTERS, query, payable_from_row).await
    }

    async fn open(&self) -> Result<Vec<Payable>, StoreError> {
        let rows = sqlx::query("SELECT * FROM payables WHERE status <> 'paid'")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("open_payables", e))?;
        rows.iter().map(payable_from_row).collect()
    }
}
