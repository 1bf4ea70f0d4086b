use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{CustomerId, DomainError, DomainResult, Entity, FieldErrors};
use tillbook_listing::{EnumColumn, FilterSchema, Listable};
use tillbook_numbering::DocumentNumber;

/// Number reserved for the anonymous point-of-sale customer.
pub const WALK_IN_NUMBER: &str = "WALKIN";

const MAX_NAME: usize = 120;
const MAX_EMAIL: usize = 254;
const MAX_ADDRESS: usize = 500;

/// Customer kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerKind {
    #[default]
    Individual,
    Business,
}

impl CustomerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomerKind::Individual => "individual",
            CustomerKind::Business => "business",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "individual" => Some(CustomerKind::Individual),
            "business" => Some(CustomerKind::Business),
            _ => None,
        }
    }
}

/// Customer status lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
}

impl CustomerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomerStatus::Active => "active",
            CustomerStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(CustomerStatus::Active),
            "inactive" => Some(CustomerStatus::Inactive),
            _ => None,
        }
    }
}

/// Filters available on the customer list.
pub const CUSTOMER_FILTERS: FilterSchema = FilterSchema {
    search_columns: &["customer_number", "name", "email", "phone"],
    status: Some(EnumColumn {
        column: "status",
        values: &["active", "inactive"],
    }),
    kind: Some(EnumColumn {
        column: "customer_type",
        values: &["individual", "business"],
    }),
    date_column: "created_at",
};

/// Column names of the CSV export, in order.
pub const CSV_HEADERS: [&str; 9] = [
    "Customer Number",
    "Name",
    "Email",
    "Phone",
    "Address",
    "Type",
    "Status",
    "Created At",
    "Updated At",
];

/// Raw add/edit form, echoed back when validation fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: String,
}

/// Validated customer input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerDraft {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub kind: CustomerKind,
    pub status: CustomerStatus,
}

impl CustomerForm {
    /// Validate every field, collecting all messages at once.
    pub fn validate(&self) -> Result<CustomerDraft, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "name is required");
        } else if name.chars().count() > MAX_NAME {
            errors.add("name", format!("name must be at most {MAX_NAME} characters"));
        }

        let email = optional(&self.email);
        if let Some(email) = email.as_deref() {
            if email.len() > MAX_EMAIL || !is_valid_email(email) {
                errors.add("email", "email address is invalid");
            }
        }

        let phone = optional(&self.phone);
        if let Some(phone) = phone.as_deref() {
            if !is_valid_phone(phone) {
                errors.add("phone", "phone number is invalid");
            }
        }

        let address = optional(&self.address);
        if address.as_deref().is_some_and(|a| a.chars().count() > MAX_ADDRESS) {
            errors.add("address", format!("address must be at most {MAX_ADDRESS} characters"));
        }

        let kind = match optional(&self.kind) {
            None => Some(CustomerKind::default()),
            Some(k) => CustomerKind::parse(&k),
        };
        if kind.is_none() {
            errors.add("type", "type must be individual or business");
        }

        let status = match optional(&self.status) {
            None => Some(CustomerStatus::default()),
            Some(s) => CustomerStatus::parse(&s),
        };
        if status.is_none() {
            errors.add("status", "status must be active or inactive");
        }

        match (errors.is_empty(), kind, status) {
            (true, Some(kind), Some(status)) => Ok(CustomerDraft {
                name: name.to_string(),
                email: email.map(|e| e.to_lowercase()),
                phone,
                address,
                kind,
                status,
            }),
            _ => Err(errors),
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let v = value.trim();
    (!v.is_empty()).then(|| v.to_string())
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn is_valid_phone(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    allowed && (7..=15).contains(&digits)
}

/// Customer record (persisted shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub number: DocumentNumber,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub kind: CustomerKind,
    pub status: CustomerStatus,
    pub is_walk_in: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn create(id: CustomerId, number: DocumentNumber, draft: CustomerDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            number,
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            kind: draft.kind,
            status: draft.status,
            is_walk_in: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The reserved anonymous point-of-sale customer.
    pub fn walk_in(now: DateTime<Utc>) -> Self {
        Self {
            id: CustomerId::new(),
            number: DocumentNumber::from_stored(WALK_IN_NUMBER),
            name: "Walk-in Customer".to_string(),
            email: None,
            phone: None,
            address: None,
            kind: CustomerKind::Individual,
            status: CustomerStatus::Active,
            is_walk_in: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Invariant: the walk-in customer is never edited.
    pub fn ensure_editable(&self) -> DomainResult<()> {
        if self.is_walk_in {
            return Err(DomainError::conflict("the walk-in customer cannot be edited"));
        }
        Ok(())
    }

    /// Invariant: the walk-in customer is never deleted.
    pub fn ensure_deletable(&self) -> DomainResult<()> {
        if self.is_walk_in {
            return Err(DomainError::conflict("the walk-in customer cannot be deleted"));
        }
        Ok(())
    }

    /// Replace the editable fields; number, identity and creation time are kept.
    pub fn apply_update(&mut self, draft: CustomerDraft, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_editable()?;
        self.name = draft.name;
        self.email = draft.email;
        self.phone = draft.phone;
        self.address = draft.address;
        self.kind = draft.kind;
        self.status = draft.status;
        self.updated_at = now;
        Ok(())
    }

    /// Form pre-filled with the current values (edit view).
    pub fn to_form(&self) -> CustomerForm {
        CustomerForm {
            name: self.name.clone(),
            email: self.email.clone().unwrap_or_default(),
            phone: self.phone.clone().unwrap_or_default(),
            address: self.address.clone().unwrap_or_default(),
            kind: self.kind.as_str().to_string(),
            status: self.status.as_str().to_string(),
        }
    }

    /// One export row, aligned with [`CSV_HEADERS`].
    pub fn csv_row(&self) -> [String; 9] {
        [
            self.number.to_string(),
            self.name.clone(),
            self.email.clone().unwrap_or_default(),
            self.phone.clone().unwrap_or_default(),
            self.address.clone().unwrap_or_default(),
            self.kind.as_str().to_string(),
            self.status.as_str().to_string(),
            self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &CustomerId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Listable for Customer {
    fn field(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            "customer_number" => Some(Cow::Borrowed(self.number.as_str())),
            "name" => Some(Cow::Borrowed(self.name.as_str())),
            "email" => self.email.as_deref().map(Cow::Borrowed),
            "phone" => self.phone.as_deref().map(Cow::Borrowed),
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            "customer_type" => Some(Cow::Borrowed(self.kind.as_str())),
            _ => None,
        }
    }

    fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        match column {
            "created_at" => Some(self.created_at),
            "updated_at" => Some(self.updated_at),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillbook_listing::{ListQuery, RawListParams, paginate};

    fn form(name: &str) -> CustomerForm {
        CustomerForm {
            name: name.to_string(),
            email: "Jane@Example.com".to_string(),
            phone: "+1 (555) 010-2000".to_string(),
            address: "1 Main St".to_string(),
            kind: "business".to_string(),
            status: String::new(),
        }
    }

    fn customer(name: &str) -> Customer {
        Customer::create(
            CustomerId::new(),
            DocumentNumber::from_stored("CUST202500001"),
            form(name).validate().unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn valid_form_normalizes_values() {
        let draft = form("  Jane Doe ").validate().unwrap();
        assert_eq!(draft.name, "Jane Doe");
        assert_eq!(draft.email.as_deref(), Some("jane@example.com"));
        assert_eq!(draft.kind, CustomerKind::Business);
        assert_eq!(draft.status, CustomerStatus::Active);
    }

    #[test]
    fn invalid_form_reports_every_field() {
        let bad = CustomerForm {
            name: " ".to_string(),
            email: "not-an-email".to_string(),
            phone: "12ab".to_string(),
            address: String::new(),
            kind: "robot".to_string(),
            status: "paused".to_string(),
        };
        let errors = bad.validate().unwrap_err();
        for field in ["name", "email", "phone", "type", "status"] {
            assert!(errors.get(field).is_some(), "missing error for {field}");
        }
        assert!(errors.get("address").is_none());
    }

    #[test]
    fn optional_fields_may_be_blank() {
        let draft = CustomerForm {
            name: "Cash Buyer".to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(draft.email, None);
        assert_eq!(draft.phone, None);
        assert_eq!(draft.kind, CustomerKind::Individual);
    }

    #[test]
    fn email_and_phone_rules() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@b@c.co"));

        assert!(is_valid_phone("0712 345 678"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("1234567890123456"));
    }

    #[test]
    fn walk_in_customer_is_protected() {
        let mut walk_in = Customer::walk_in(Utc::now());
        assert!(matches!(walk_in.ensure_deletable(), Err(DomainError::Conflict(_))));

        let draft = form("Renamed").validate().unwrap();
        assert!(walk_in.apply_update(draft, Utc::now()).is_err());
        assert_eq!(walk_in.name, "Walk-in Customer");
    }

    #[test]
    fn update_keeps_identity_and_number() {
        let mut c = customer("Old Name");
        let (id, number, created) = (c.id, c.number.clone(), c.created_at);

        let mut f = c.to_form();
        f.name = "New Name".to_string();
        c.apply_update(f.validate().unwrap(), Utc::now()).unwrap();

        assert_eq!(c.name, "New Name");
        assert_eq!((c.id, c.number.clone(), c.created_at), (id, number, created));
        assert!(c.updated_at >= created);
    }

    #[test]
    fn csv_row_matches_headers() {
        let c = customer("Acme");
        let row = c.csv_row();
        assert_eq!(row.len(), CSV_HEADERS.len());
        assert_eq!(row[0], "CUST202500001");
        assert_eq!(row[5], "business");
    }

    #[test]
    fn customer_list_filters_by_type_and_search() {
        let mut a = customer("Acme Traders");
        a.kind = CustomerKind::Business;
        let mut b = customer("Bob");
        b.kind = CustomerKind::Individual;

        let q = ListQuery::from_params(&RawListParams {
            kind: Some("individual".to_string()),
            ..Default::default()
        });
        let page = paginate(vec![a.clone(), b.clone()], &q, &CUSTOMER_FILTERS);
        assert_eq!(page.items, vec![b.clone()]);

        let q = ListQuery::from_params(&RawListParams {
            search: Some("cust2025".to_string()),
            ..Default::default()
        });
        assert_eq!(paginate(vec![a, b], &q, &CUSTOMER_FILTERS).total, 2);
    }
}
