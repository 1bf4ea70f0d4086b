use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use tillbook_core::{CustomerId, DocumentId, DomainError, Entity, Money, PayableId};
use tillbook_customers::{CUSTOMER_FILTERS, Customer};
use tillbook_documents::{INVOICE_FILTERS, Invoice, QUOTATION_FILTERS, Quotation};
use tillbook_listing::{FilterSchema, ListQuery, Listable, Page, paginate, select};
use tillbook_payables::{PAYABLE_FILTERS, Payable, PayableStatus};

use super::{CustomerStore, InvoiceStore, NOT_CONVERTIBLE, PayableStore, QuotationStore, REFERENCED};
use crate::StoreError;

/// One unique column of a record: `(column name, value)`, or `None` when unset.
type UniqueKey<V> = fn(&V) -> Option<(&'static str, String)>;

/// Lock-guarded rows with their unique columns.
struct Table<V: Listable + 'static> {
    rows: RwLock<HashMap<V::Id, V>>,
    unique: &'static [UniqueKey<V>],
    schema: FilterSchema,
}

type Rows<V> = HashMap<<V as Entity>::Id, V>;

impl<V> Table<V>
where
    V: Listable + Clone + Send + Sync + 'static,
    V::Id: Hash,
{
    fn new(unique: &'static [UniqueKey<V>], schema: FilterSchema) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            unique,
            schema,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Rows<V>>, StoreError> {
        self.rows
            .read()
            .map_err(|_| StoreError::Database("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Rows<V>>, StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Database("store lock poisoned".to_string()))
    }

    fn check_unique(&self, rows: &Rows<V>, record: &V) -> Result<(), StoreError> {
        for key in self.unique {
            let Some((field, value)) = key(record) else {
                continue;
            };
            let taken = rows
                .values()
                .any(|r| r.id() != record.id() && key(r).is_some_and(|(_, v)| v == value));
            if taken {
                return Err(StoreError::unique_violation(field, value));
            }
        }
        Ok(())
    }

    fn insert_locked(&self, rows: &mut Rows<V>, record: &V) -> Result<(), StoreError> {
        if rows.contains_key(record.id()) {
            return Err(StoreError::duplicate("id", format!("{:?}", record.id())));
        }
        self.check_unique(rows, record)?;
        rows.insert(record.id().clone(), record.clone());
        Ok(())
    }

    fn insert(&self, record: &V) -> Result<(), StoreError> {
        let mut rows = self.write()?;
        self.insert_locked(&mut rows, record)
    }

    fn get(&self, id: &V::Id) -> Result<Option<V>, StoreError> {
        Ok(self.read()?.get(id).cloned())
    }

    fn update(&self, record: &V) -> Result<(), StoreError> {
        let mut rows = self.write()?;
        if !rows.contains_key(record.id()) {
            return Err(StoreError::NotFound);
        }
        self.check_unique(&rows, record)?;
        rows.insert(record.id().clone(), record.clone());
        Ok(())
    }

    fn find(&self, mut pred: impl FnMut(&V) -> bool) -> Result<Vec<V>, StoreError> {
        Ok(self.read()?.values().filter(|r| pred(r)).cloned().collect())
    }

    fn page(&self, query: &ListQuery) -> Result<Page<V>, StoreError> {
        let rows = self.read()?;
        Ok(paginate(rows.values().cloned(), query, &self.schema))
    }

    fn select(&self, query: &ListQuery) -> Result<Vec<V>, StoreError> {
        let rows = self.read()?;
        Ok(select(rows.values().cloned(), query, &self.schema))
    }
}

fn customer_number(c: &Customer) -> Option<(&'static str, String)> {
    Some(("customer_number", c.number.to_string()))
}

fn quotation_number(q: &Quotation) -> Option<(&'static str, String)> {
    Some(("quotation_number", q.number.to_string()))
}

fn invoice_number(i: &Invoice) -> Option<(&'static str, String)> {
    Some(("invoice_number", i.number.to_string()))
}

fn invoice_quotation(i: &Invoice) -> Option<(&'static str, String)> {
    i.quotation_id.map(|q| ("quotation_id", q.to_string()))
}

fn supplier_invoice(p: &Payable) -> Option<(&'static str, String)> {
    Some((
        "supplier_invoice",
        format!("{}/{}", p.supplier_name.to_lowercase(), p.supplier_invoice_no),
    ))
}

const CUSTOMER_KEYS: &[UniqueKey<Customer>] = &[customer_number];
const QUOTATION_KEYS: &[UniqueKey<Quotation>] = &[quotation_number];
const INVOICE_KEYS: &[UniqueKey<Invoice>] = &[invoice_number, invoice_quotation];
const PAYABLE_KEYS: &[UniqueKey<Payable>] = &[supplier_invoice];

/// All four stores in process memory, for tests and local runs.
///
/// Mirrors the Postgres schema: unique number columns, one invoice per
/// quotation, and customers that cannot be deleted while documents
/// reference them. Tables are locked customers, quotations, invoices, in
/// that order, whenever more than one is held.
pub struct InMemoryStore {
    customers: Table<Customer>,
    quotations: Table<Quotation>,
    invoices: Table<Invoice>,
    payables: Table<Payable>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            customers: Table::new(CUSTOMER_KEYS, CUSTOMER_FILTERS),
            quotations: Table::new(QUOTATION_KEYS, QUOTATION_FILTERS),
            invoices: Table::new(INVOICE_KEYS, INVOICE_FILTERS),
            payables: Table::new(PAYABLE_KEYS, PAYABLE_FILTERS),
        }
    }

    fn delete_customer(&self, id: CustomerId) -> Result<(), StoreError> {
        let mut customers = self.customers.write()?;
        if !customers.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        let referenced = self.quotations.read()?.values().any(|q| q.customer_id == id)
            || self.invoices.read()?.values().any(|i| i.customer_id == id);
        if referenced {
            return Err(DomainError::conflict(REFERENCED).into());
        }
        customers.remove(&id);
        Ok(())
    }

    fn convert_quotation(&self, converted: &Quotation, invoice: &Invoice) -> Result<(), StoreError> {
        let mut quotations = self.quotations.write()?;
        let mut invoices = self.invoices.write()?;

        let stored = quotations.get(&converted.id).ok_or(StoreError::NotFound)?;
        if !stored.status.is_convertible() {
            return Err(DomainError::conflict(NOT_CONVERTIBLE).into());
        }
        self.invoices.insert_locked(&mut invoices, invoice)?;
        quotations.insert(converted.id, converted.clone());
        Ok(())
    }

    fn settle_payment(&self, id: PayableId, amount: Money) -> Result<Payable, StoreError> {
        let mut payables = self.payables.write()?;
        let payable = payables.get_mut(&id).ok_or(StoreError::NotFound)?;
        payable.register_payment(amount)?;
        Ok(payable.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn insert(&self, customer: &Customer) -> Result<(), StoreError> {
        self.customers.insert(customer)
    }

    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.customers.get(&id)
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.find(|c| c.number.as_str() == number)?.into_iter().next())
    }

    async fn update(&self, customer: &Customer) -> Result<(), StoreError> {
        self.customers.update(customer)
    }

    async fn delete(&self, id: CustomerId) -> Result<(), StoreError> {
        self.delete_customer(id)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Customer>, StoreError> {
        self.customers.page(query)
    }

    async fn list_all(&self, query: &ListQuery) -> Result<Vec<Customer>, StoreError> {
        self.customers.select(query)
    }

    async fn numbers_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .customers
            .find(|c| c.number.as_str().starts_with(prefix))?
            .into_iter()
            .map(|c| c.number.into_string())
            .collect())
    }
}

#[async_trait]
impl QuotationStore for InMemoryStore {
    async fn insert(&self, quotation: &Quotation) -> Result<(), StoreError> {
        self.quotations.insert(quotation)
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Quotation>, StoreError> {
        self.quotations.get(&id)
    }

    async fn update(&self, quotation: &Quotation) -> Result<(), StoreError> {
        self.quotations.update(quotation)
    }

    async fn record_conversion(&self, converted: &Quotation, invoice: &Invoice) -> Result<(), StoreError> {
        self.convert_quotation(converted, invoice)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Quotation>, StoreError> {
        self.quotations.page(query)
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn insert(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.invoices.insert(invoice)
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Invoice>, StoreError> {
        self.invoices.get(&id)
    }

    async fn update(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.invoices.update(invoice)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Invoice>, StoreError> {
        self.invoices.page(query)
    }
}

#[async_trait]
impl PayableStore for InMemoryStore {
    async fn insert(&self, payable: &Payable) -> Result<(), StoreError> {
        self.payables.insert(payable)
    }

    async fn get(&self, id: PayableId) -> Result<Option<Payable>, StoreError> {
        self.payables.get(&id)
    }

    async fn apply_payment(&self, id: PayableId, amount: Money) -> Result<Payable, StoreError> {
        self.settle_payment(id, amount)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Payable>, StoreError> {
        self.payables.page(query)
    }

    async fn open(&self) -> Result<Vec<Payable>, StoreError> {
        self.payables.find(|p| p.status != PayableStatus::Paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tillbook_customers::CustomerForm;
    use tillbook_documents::{LineItem, QuotationDraft, QuotationStatus, TaxBreakdown};
    use tillbook_listing::{PageRequest, RawListParams};
    use tillbook_numbering::DocumentNumber;
    use tillbook_payables::PayableDraft;

    fn customer(number: &str, name: &str, minutes_ago: i64) -> Customer {
        let draft = CustomerForm {
            name: name.to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        Customer::create(
            CustomerId::new(),
            DocumentNumber::from_stored(number),
            draft,
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }

    fn sent_quotation(customer_id: CustomerId) -> Quotation {
        let draft = QuotationDraft {
            customer_id,
            lines: vec![LineItem::new("Widget", 2, Money::from_minor(10_000)).unwrap()],
            discount: Money::zero(),
            valid_until: None,
            notes: None,
        };
        let mut q = Quotation::create(
            DocumentId::new(),
            DocumentNumber::from_stored("QT2025030001"),
            draft,
            TaxBreakdown::zero(),
            Utc::now(),
        )
        .unwrap();
        q.transition(QuotationStatus::Sent, Utc::now()).unwrap();
        q
    }

    fn converted(q: &Quotation, number: &str) -> (Quotation, Invoice) {
        let mut q = q.clone();
        let invoice = q
            .convert(DocumentId::new(), DocumentNumber::from_stored(number), 30, Utc::now())
            .unwrap();
        (q, invoice)
    }

    async fn seeded() -> (InMemoryStore, Customer, Quotation) {
        let store = InMemoryStore::new();
        let c = customer("CUST202500001", "Ann", 0);
        CustomerStore::insert(&store, &c).await.unwrap();
        let q = sent_quotation(c.id);
        QuotationStore::insert(&store, &q).await.unwrap();
        (store, c, q)
    }

    fn payable(amount: &str) -> Payable {
        let draft = PayableDraft {
            supplier_name: "Acme Supplies".to_string(),
            supplier_invoice_no: "SI-1".to_string(),
            amount: amount.to_string(),
            due_date: "2025-03-31".to_string(),
            ..Default::default()
        };
        Payable::record(PayableId::new(), &draft, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn duplicate_numbers_are_rejected() {
        let store = InMemoryStore::new();
        CustomerStore::insert(&store, &customer("CUST202500001", "Ann", 0)).await.unwrap();
        let err = CustomerStore::insert(&store, &customer("CUST202500001", "Bob", 0))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::duplicate("customer_number", "CUST202500001"));
    }

    #[tokio::test]
    async fn update_and_delete_require_existing_rows() {
        let store = InMemoryStore::new();
        let mut c = customer("CUST202500001", "Ann", 0);
        assert_eq!(CustomerStore::update(&store, &c).await, Err(StoreError::NotFound));
        CustomerStore::insert(&store, &c).await.unwrap();

        c.name = "Anne".to_string();
        CustomerStore::update(&store, &c).await.unwrap();
        assert_eq!(CustomerStore::get(&store, c.id).await.unwrap().unwrap().name, "Anne");

        store.delete(c.id).await.unwrap();
        assert_eq!(store.delete(c.id).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn customers_with_documents_cannot_be_deleted() {
        let (store, c, _) = seeded().await;
        let err = store.delete(c.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));
        assert!(CustomerStore::get(&store, c.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_filters_and_pages_consistently() {
        let store = InMemoryStore::new();
        for i in 0..25 {
            let name = if i % 2 == 0 { format!("Acme {i}") } else { format!("Other {i}") };
            CustomerStore::insert(&store, &customer(&format!("CUST2025{:05}", i + 1), &name, i))
                .await
                .unwrap();
        }

        let params = RawListParams {
            search: Some("acme".to_string()),
            per_page: Some("10".to_string()),
            ..Default::default()
        };
        let query = ListQuery::from_params(&params);
        let first = CustomerStore::list(&store, &query).await.unwrap();
        assert_eq!(first.total, 13);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].name, "Acme 0");

        let second = CustomerStore::list(&store, &query.clone().with_page(PageRequest::new(2, 10)))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 3);
        assert_eq!(store.list_all(&query).await.unwrap().len(), 13);
    }

    #[tokio::test]
    async fn numbers_with_prefix_selects_one_scope() {
        let store = InMemoryStore::new();
        CustomerStore::insert(&store, &customer("CUST202400009", "Old", 0)).await.unwrap();
        CustomerStore::insert(&store, &customer("CUST202500003", "New", 0)).await.unwrap();
        let numbers = store.numbers_with_prefix("CUST2025").await.unwrap();
        assert_eq!(numbers, vec!["CUST202500003".to_string()]);
    }

    #[tokio::test]
    async fn a_quotation_converts_at_most_once() {
        let (store, _, q) = seeded().await;
        let (first_q, first_inv) = converted(&q, "INV2025030001");
        let (second_q, second_inv) = converted(&q, "INV2025030002");

        let (a, b) = tokio::join!(
            store.record_conversion(&first_q, &first_inv),
            store.record_conversion(&second_q, &second_inv),
        );
        assert!(a.is_ok());
        assert!(matches!(b, Err(StoreError::Domain(DomainError::Conflict(_)))));

        let invoices = InvoiceStore::list(&store, &ListQuery::default()).await.unwrap();
        assert_eq!(invoices.total, 1);
        let stored = QuotationStore::get(&store, q.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QuotationStatus::Converted);
        assert_eq!(stored.invoice_id, Some(first_inv.id));
    }

    #[tokio::test]
    async fn taken_invoice_number_leaves_the_quotation_open() {
        let (store, c, q) = seeded().await;
        let mut other = sent_quotation(c.id);
        other.number = DocumentNumber::from_stored("QT2025030002");
        QuotationStore::insert(&store, &other).await.unwrap();
        let (other_q, other_inv) = converted(&other, "INV2025030001");
        store.record_conversion(&other_q, &other_inv).await.unwrap();

        let (q2, inv) = converted(&q, "INV2025030001");
        let err = store.record_conversion(&q2, &inv).await.unwrap_err();
        assert_eq!(err, StoreError::duplicate("invoice_number", "INV2025030001"));
        let stored = QuotationStore::get(&store, q.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QuotationStatus::Sent);
        assert_eq!(stored.invoice_id, None);
    }

    #[tokio::test]
    async fn second_invoice_for_a_quotation_is_a_conflict() {
        let (store, _, q) = seeded().await;
        let (_, first) = converted(&q, "INV2025030001");
        let (_, second) = converted(&q, "INV2025030002");
        InvoiceStore::insert(&store, &first).await.unwrap();
        let err = InvoiceStore::insert(&store, &second).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn concurrent_payments_are_both_applied() {
        let store = InMemoryStore::new();
        let p = payable("100.00");
        PayableStore::insert(&store, &p).await.unwrap();

        let (a, b) = tokio::join!(
            store.apply_payment(p.id, Money::from_minor(4_000)),
            store.apply_payment(p.id, Money::from_minor(4_000)),
        );
        a.unwrap();
        b.unwrap();

        let stored = PayableStore::get(&store, p.id).await.unwrap().unwrap();
        assert_eq!(stored.paid, Money::from_minor(8_000));
        assert_eq!(stored.status, PayableStatus::Partial);
    }

    #[tokio::test]
    async fn overpayment_leaves_the_balance_untouched() {
        let store = InMemoryStore::new();
        let p = payable("100.00");
        PayableStore::insert(&store, &p).await.unwrap();
        store.apply_payment(p.id, Money::from_minor(6_000)).await.unwrap();

        let err = store.apply_payment(p.id, Money::from_minor(6_000)).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
        let stored = PayableStore::get(&store, p.id).await.unwrap().unwrap();
        assert_eq!(stored.paid, Money::from_minor(6_000));
        assert_eq!(
            store.apply_payment(PayableId::new(), Money::from_minor(1)).await,
            Err(StoreError::NotFound)
        );
    }
}
