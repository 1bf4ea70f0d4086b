use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier (e.g. "customers.read").
///
/// The wildcard `"*"` allows everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission::from_static("*");

    pub const CUSTOMERS_READ: Permission = Permission::from_static("customers.read");
    pub const CUSTOMERS_WRITE: Permission = Permission::from_static("customers.write");
    pub const CUSTOMERS_DELETE: Permission = Permission::from_static("customers.delete");
    pub const CUSTOMERS_EXPORT: Permission = Permission::from_static("customers.export");
    pub const QUOTATIONS_READ: Permission = Permission::from_static("quotations.read");
    pub const QUOTATIONS_WRITE: Permission = Permission::from_static("quotations.write");
    pub const INVOICES_READ: Permission = Permission::from_static("invoices.read");
    pub const INVOICES_WRITE: Permission = Permission::from_static("invoices.write");
    pub const PAYABLES_READ: Permission = Permission::from_static("payables.read");
    pub const PAYABLES_WRITE: Permission = Permission::from_static("payables.write");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
