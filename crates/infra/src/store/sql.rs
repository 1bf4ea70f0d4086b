//! Rendering a list predicate into Postgres SQL.
//!
//! One predicate feeds both the count and the page query, so totals always
//! agree with the rows returned.

use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder};

use tillbook_listing::{Condition, FilterSchema, ListQuery, Page, Predicate, like_pattern};

use crate::StoreError;
use crate::error::map_sqlx_error;

pub(crate) fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    for (i, condition) in predicate.conditions().iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match condition {
            Condition::Contains { columns, needle } => {
                let pattern = like_pattern(needle);
                qb.push("(");
                for (j, column) in columns.iter().enumerate() {
                    if j > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(*column)
                        .push(" ILIKE ")
                        .push_bind(pattern.clone())
                        .push(" ESCAPE '\\'");
                }
                qb.push(")");
            }
            Condition::Equals { column, value } => {
                qb.push(*column).push(" = ").push_bind(value.clone());
            }
            Condition::OnOrAfter { column, date } => {
                qb.push("(").push(*column).push(" AT TIME ZONE 'UTC')::date >= ").push_bind(*date);
            }
            Condition::OnOrBefore { column, date } => {
                qb.push("(").push(*column).push(" AT TIME ZONE 'UTC')::date <= ").push_bind(*date);
            }
        }
    }
}

fn order_clause(qb: &mut QueryBuilder<'_, Postgres>, schema: &FilterSchema) {
    qb.push(" ORDER BY ")
        .push(schema.date_column)
        .push(" DESC, id DESC");
}

/// Count and fetch one page of `table` for `query`.
pub(crate) async fn fetch_page<T>(
    pool: &PgPool,
    table: &'static str,
    schema: &FilterSchema,
    query: &ListQuery,
    map: fn(&PgRow) -> Result<T, StoreError>,
) -> Result<Page<T>, StoreError> {
    let predicate = Predicate::from_query(query, schema);

    let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {table}"));
    push_predicate(&mut count, &predicate);
    let total: i64 = count
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(|e| map_sqlx_error("count", e))?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT * FROM {table}"));
    push_predicate(&mut select, &predicate);
    order_clause(&mut select, schema);
    select
        .push(" LIMIT ")
        .push_bind(i64::try_from(query.page.limit()).unwrap_or(i64::MAX))
        .push(" OFFSET ")
        .push_bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX));

    let rows = select
        .build()
        .fetch_all(pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;
    let items = rows.iter().map(map).collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(items, u64::try_from(total).unwrap_or(0), &query.page))
}

/// Every row of `table` matching the query filters, newest first.
pub(crate) async fn fetch_all<T>(
    pool: &PgPool,
    table: &'static str,
    schema: &FilterSchema,
    query: &ListQuery,
    map: fn(&PgRow) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    let predicate = Predicate::from_query(query, schema);
    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT * FROM {table}"));
    push_predicate(&mut select, &predicate);
    order_clause(&mut select, schema);

    let rows = select
        .build()
        .fetch_all(pool)
        .await
        .map_err(|e| map_sqlx_error("list_all", e))?;
    rows.iter().map(map).collect()
}
