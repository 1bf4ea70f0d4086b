//! Service wiring: stores, number allocation, the tax collaborator and the
//! edit rate limiter behind one handle shared by every handler.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use tillbook_core::{CustomerId, DocumentId, Money, PayableId};
use tillbook_customers::{Customer, CustomerDraft, WALK_IN_NUMBER};
use tillbook_documents::{
    Invoice, Quotation, QuotationDraft, QuotationStatus, TaxCalculator, TaxError, TaxRequest, assess_tax,
    compute_totals,
};
use tillbook_infra::store::{
    CustomerStore, InMemoryStore, InvoiceStore, PayableStore, PostgresStore, QuotationStore,
};
use tillbook_infra::sequence::PostgresSequenceAllocator;
use tillbook_infra::tax::{DisabledTaxCalculator, HttpTaxCalculator};
use tillbook_infra::{AppConfig, CustomerNumbering, RateDecision, RateLimiter, StoreError};
use tillbook_listing::{ListQuery, Page};
use tillbook_numbering::{
    DocumentNumber, InMemorySequenceAllocator, NumberFormat, RandomSuffixGenerator, SequenceAllocator,
    allocate_with_retry,
};
use tillbook_payables::{Payable, PayableDraft, PayablesDashboard, dashboard};

/// Stale rate-limit windows are swept once this many keys are tracked.
const RATE_LIMIT_PURGE_AT: usize = 4096;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("tax client: {0}")]
    Tax(#[from] TaxError),
}

/// Knobs taken from [`AppConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub customer_numbering: CustomerNumbering,
    pub max_attempts: u32,
    pub invoice_due_days: i64,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            customer_numbering: config.numbering.customer_strategy,
            max_attempts: config.numbering.max_attempts,
            invoice_due_days: config.invoice_due_days,
        }
    }
}

/// Storage handles, one per record kind.
#[derive(Clone)]
pub struct Stores {
    pub customers: Arc<dyn CustomerStore>,
    pub quotations: Arc<dyn QuotationStore>,
    pub invoices: Arc<dyn InvoiceStore>,
    pub payables: Arc<dyn PayableStore>,
    pub sequences: Arc<dyn SequenceAllocator>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            customers: store.clone(),
            quotations: store.clone(),
            invoices: store.clone(),
            payables: store,
            sequences: Arc::new(InMemorySequenceAllocator::new()),
        }
    }

    pub fn postgres(store: PostgresStore) -> Self {
        let sequences = Arc::new(PostgresSequenceAllocator::new(store.pool().clone()));
        let store = Arc::new(store);
        Self {
            customers: store.clone(),
            quotations: store.clone(),
            invoices: store.clone(),
            payables: store,
            sequences,
        }
    }
}

/// A quotation together with the non-blocking tax warning, if any.
#[derive(Debug, Clone)]
pub struct Priced<T> {
    pub record: T,
    pub tax_warning: Option<String>,
}

pub struct AppServices {
    stores: Stores,
    tax: Arc<dyn TaxCalculator>,
    edit_limiter: RateLimiter,
    settings: ServiceSettings,
}

impl AppServices {
    pub fn new(stores: Stores, tax: Arc<dyn TaxCalculator>, config: &AppConfig) -> Self {
        Self {
            stores,
            tax,
            edit_limiter: RateLimiter::new(
                config.rate_limit.customer_edits,
                Duration::seconds(i64::try_from(config.rate_limit.window_secs).unwrap_or(i64::MAX)),
            ),
            settings: ServiceSettings::from_config(config),
        }
    }

    /// Wire stores from config: Postgres when `database_url` is set, in-memory otherwise.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let stores = match config.database_url.as_deref() {
            Some(url) => {
                info!("using postgres stores");
                Stores::postgres(PostgresStore::connect(url).await?)
            }
            None => {
                warn!("database_url not set; records live in memory only");
                Stores::in_memory()
            }
        };
        let services = Self::new(stores, tax_calculator(config)?, config);
        services.ensure_walk_in(Utc::now()).await?;
        Ok(services)
    }

    /// Count one customer edit for `user_key`.
    pub fn check_edit_rate(&self, user_key: &str, now: DateTime<Utc>) -> RateDecision {
        if self.edit_limiter.tracked() >= RATE_LIMIT_PURGE_AT {
            self.edit_limiter.purge_expired(now);
        }
        self.edit_limiter.check(user_key, now)
    }

    /// Seed the reserved walk-in customer when it is missing.
    pub async fn ensure_walk_in(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        if self.stores.customers.find_by_number(WALK_IN_NUMBER).await?.is_none() {
            match self.stores.customers.insert(&Customer::walk_in(now)).await {
                Ok(()) => info!("seeded walk-in customer"),
                // Another instance seeded it first.
                Err(StoreError::Duplicate { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // --- customers ---

    pub async fn list_customers(&self, query: &ListQuery) -> Result<Page<Customer>, StoreError> {
        self.stores.customers.list(query).await
    }

    pub async fn export_customers(&self, query: &ListQuery) -> Result<Vec<Customer>, StoreError> {
        self.stores.customers.list_all(query).await
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, StoreError> {
        self.stores.customers.get(id).await?.ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self, draft), fields(strategy = ?self.settings.customer_numbering))]
    pub async fn create_customer(&self, draft: CustomerDraft, now: DateTime<Utc>) -> Result<Customer, StoreError> {
        let format = &NumberFormat::CUSTOMER;
        let today = now.date_naive();
        let customers = &self.stores.customers;
        let draft = &draft;
        let insert = move |number: DocumentNumber| {
            let customer = Customer::create(CustomerId::new(), number, draft.clone(), now);
            async move { customers.insert(&customer).await.map(|()| customer) }
        };

        let customer = match self.settings.customer_numbering {
            CustomerNumbering::Sequential => {
                let sequences = &self.stores.sequences;
                allocate_with_retry(
                    self.settings.max_attempts,
                    move || async move { sequences.allocate(format, today).await.map_err(StoreError::from) },
                    insert,
                )
                .await?
            }
            CustomerNumbering::Random => {
                let existing: HashSet<String> = customers
                    .numbers_with_prefix(&format.scope_prefix(today))
                    .await?
                    .into_iter()
                    .collect();
                let existing = &existing;
                let generator = RandomSuffixGenerator::default();
                allocate_with_retry(
                    self.settings.max_attempts,
                    move || {
                        let number = generator
                            .generate(format, today, &mut rand::thread_rng(), |n| existing.contains(n))
                            .map_err(StoreError::from);
                        async move { number }
                    },
                    insert,
                )
                .await?
            }
        };

        info!(customer_id = %customer.id, number = %customer.number, "customer created");
        Ok(customer)
    }

    #[instrument(skip(self, draft))]
    pub async fn update_customer(
        &self,
        id: CustomerId,
        draft: CustomerDraft,
        now: DateTime<Utc>,
    ) -> Result<Customer, StoreError> {
        let mut customer = self.get_customer(id).await?;
        customer.apply_update(draft, now)?;
        self.stores.customers.update(&customer).await?;
        Ok(customer)
    }

    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: CustomerId) -> Result<(), StoreError> {
        let customer = self.get_customer(id).await?;
        customer.ensure_deletable()?;
        self.stores.customers.delete(id).await?;
        info!(customer_id = %id, number = %customer.number, "customer deleted");
        Ok(())
    }

    async fn require_customer(&self, id: CustomerId) -> Result<(), StoreError> {
        match self.stores.customers.get(id).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::Domain(tillbook_core::DomainError::validation(format!(
                "customer {id} does not exist"
            )))),
        }
    }

    // --- quotations ---

    pub async fn list_quotations(&self, query: &ListQuery) -> Result<Page<Quotation>, StoreError> {
        self.stores.quotations.list(query).await
    }

    pub async fn get_quotation(&self, id: DocumentId) -> Result<Quotation, StoreError> {
        self.stores.quotations.get(id).await?.ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self, draft), fields(customer_id = %draft.customer_id))]
    pub async fn create_quotation(
        &self,
        draft: QuotationDraft,
        now: DateTime<Utc>,
    ) -> Result<Priced<Quotation>, StoreError> {
        self.require_customer(draft.customer_id).await?;
        let request = TaxRequest::for_lines(draft.customer_id, &draft.lines)?;
        let assessment = assess_tax(self.tax.as_ref(), &request).await;
        // Reject bad totals before a number is spent.
        compute_totals(&draft.lines, draft.discount, assessment.tax)?;

        let format = &NumberFormat::QUOTATION;
        let today = now.date_naive();
        let sequences = &self.stores.sequences;
        let quotations = &self.stores.quotations;
        let draft = &draft;
        let breakdown = &assessment.breakdown;

        let quotation = allocate_with_retry(
            self.settings.max_attempts,
            move || async move { sequences.allocate(format, today).await.map_err(StoreError::from) },
            move |number| {
                let quotation = Quotation::create(DocumentId::new(), number, draft.clone(), breakdown.clone(), now);
                async move {
                    let quotation = quotation?;
                    quotations.insert(&quotation).await?;
                    Ok::<_, StoreError>(quotation)
                }
            },
        )
        .await?;

        info!(quotation_id = %quotation.id, number = %quotation.number, total = %quotation.totals.total, "quotation created");
        Ok(Priced {
            record: quotation,
            tax_warning: assessment.warning,
        })
    }

    #[instrument(skip(self, draft))]
    pub async fn update_quotation(
        &self,
        id: DocumentId,
        draft: QuotationDraft,
        now: DateTime<Utc>,
    ) -> Result<Priced<Quotation>, StoreError> {
        let mut quotation = self.get_quotation(id).await?;
        self.require_customer(draft.customer_id).await?;
        let request = TaxRequest::for_lines(draft.customer_id, &draft.lines)?;
        let assessment = assess_tax(self.tax.as_ref(), &request).await;
        quotation.revise(draft, assessment.breakdown, now)?;
        self.stores.quotations.update(&quotation).await?;
        Ok(Priced {
            record: quotation,
            tax_warning: assessment.warning,
        })
    }

    #[instrument(skip(self))]
    pub async fn transition_quotation(
        &self,
        id: DocumentId,
        to: QuotationStatus,
        now: DateTime<Utc>,
    ) -> Result<Quotation, StoreError> {
        let mut quotation = self.get_quotation(id).await?;
        quotation.transition(to, now)?;
        self.stores.quotations.update(&quotation).await?;
        Ok(quotation)
    }

    /// Issue an invoice for a sent or accepted quotation.
    #[instrument(skip(self))]
    pub async fn convert_quotation(&self, id: DocumentId, now: DateTime<Utc>) -> Result<(Quotation, Invoice), StoreError> {
        let quotation = self.get_quotation(id).await?;
        quotation.ensure_convertible(now.date_naive())?;

        let format = &NumberFormat::INVOICE;
        let today = now.date_naive();
        let sequences = &self.stores.sequences;
        let quotations = &self.stores.quotations;
        let source = &quotation;
        let due_days = self.settings.invoice_due_days;

        let (converted, invoice) = allocate_with_retry(
            self.settings.max_attempts,
            move || async move { sequences.allocate(format, today).await.map_err(StoreError::from) },
            move |number| {
                let mut converted = source.clone();
                let invoice = converted.convert(DocumentId::new(), number, due_days, now);
                async move {
                    let invoice = invoice?;
                    quotations.record_conversion(&converted, &invoice).await?;
                    Ok::<_, StoreError>((converted, invoice))
                }
            },
        )
        .await?;

        info!(quotation_id = %converted.id, invoice_id = %invoice.id, number = %invoice.number, "quotation converted");
        Ok((converted, invoice))
    }

    // --- invoices ---

    pub async fn list_invoices(&self, query: &ListQuery) -> Result<Page<Invoice>, StoreError> {
        self.stores.invoices.list(query).await
    }

    pub async fn get_invoice(&self, id: DocumentId) -> Result<Invoice, StoreError> {
        self.stores.invoices.get(id).await?.ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn pay_invoice(&self, id: DocumentId, now: DateTime<Utc>) -> Result<Invoice, StoreError> {
        let mut invoice = self.get_invoice(id).await?;
        invoice.mark_paid(now)?;
        self.stores.invoices.update(&invoice).await?;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn void_invoice(&self, id: DocumentId) -> Result<Invoice, StoreError> {
        let mut invoice = self.get_invoice(id).await?;
        invoice.void()?;
        self.stores.invoices.update(&invoice).await?;
        Ok(invoice)
    }

    // --- payables ---

    pub async fn list_payables(&self, query: &ListQuery) -> Result<Page<Payable>, StoreError> {
        self.stores.payables.list(query).await
    }

    #[instrument(skip(self, draft))]
    pub async fn record_payable(&self, draft: &PayableDraft, now: DateTime<Utc>) -> Result<Payable, StoreError> {
        let payable = Payable::record(PayableId::new(), draft, now)?;
        self.stores.payables.insert(&payable).await?;
        info!(payable_id = %payable.id, supplier = %payable.supplier_name, amount = %payable.amount, "payable recorded");
        Ok(payable)
    }

    #[instrument(skip(self))]
    pub async fn register_payment(&self, id: PayableId, amount: Money) -> Result<Payable, StoreError> {
        let payable = self.stores.payables.apply_payment(id, amount).await?;
        info!(payable_id = %payable.id, paid = %payable.paid, status = payable.status.as_str(), "payment applied");
        Ok(payable)
    }

    pub async fn payables_dashboard(&self, now: DateTime<Utc>) -> Result<PayablesDashboard, StoreError> {
        let open = self.stores.payables.open().await?;
        Ok(dashboard(&open, now.date_naive())?)
    }
}

fn tax_calculator(config: &AppConfig) -> Result<Arc<dyn TaxCalculator>, TaxError> {
    match config.tax.endpoint.as_deref() {
        Some(endpoint) => Ok(Arc::new(HttpTaxCalculator::new(endpoint, config.tax.timeout())?)),
        None => {
            warn!("tax.endpoint not set; documents will carry zero tax");
            Ok(Arc::new(DisabledTaxCalculator))
        }
    }
}
