use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role→permission policy.
///
/// `admin` grants everything; `clerk` works the customer and quotation
/// screens. Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == "admin") {
        return vec![Permission::WILDCARD];
    }

    let mut out = Vec::new();
    if roles.iter().any(|r| r.as_str() == "clerk") {
        out.extend([
            Permission::CUSTOMERS_READ,
            Permission::CUSTOMERS_WRITE,
            Permission::CUSTOMERS_DELETE,
            Permission::CUSTOMERS_EXPORT,
            Permission::QUOTATIONS_READ,
            Permission::QUOTATIONS_WRITE,
        ]);
    }
    out
}
