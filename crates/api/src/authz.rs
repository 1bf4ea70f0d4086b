//! API-side authorization guard.
//!
//! Handlers call [`require`] before touching a store, which keeps the domain
//! crates and infra auth-agnostic.

use tillbook_auth::{AuthzError, Permission, authorize};

use crate::context::PrincipalContext;

/// Check that the current principal holds `permission`.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), AuthzError> {
    authorize(&principal.principal(), permission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillbook_auth::Role;
    use tillbook_core::UserId;

    #[test]
    fn clerk_cannot_touch_payables() {
        let clerk = PrincipalContext::new(UserId::new(), vec![Role::new("clerk")]);
        assert!(require(&clerk, &Permission::CUSTOMERS_WRITE).is_ok());
        assert!(require(&clerk, &Permission::PAYABLES_WRITE).is_err());
    }

    #[test]
    fn no_roles_means_no_access() {
        let nobody = PrincipalContext::new(UserId::new(), vec![]);
        assert!(require(&nobody, &Permission::CUSTOMERS_READ).is_err());
    }
}
