use thiserror::Error;

use tillbook_core::UserId;

use crate::{Permission, Role, permissions_for_roles};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Resolve permissions from roles with the static policy.
    pub fn from_roles(user_id: UserId, roles: Vec<Role>) -> Self {
        let permissions = permissions_for_roles(&roles);
        Self {
            user_id,
            roles,
            permissions,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let allowed = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if allowed {
        Ok(())
    } else {
        tracing::debug!(user_id = %principal.user_id, permission = %required, "permission denied");
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_allows_everything() {
        let admin = Principal::from_roles(UserId::new(), vec![Role::new("admin")]);
        assert!(authorize(&admin, &Permission::PAYABLES_WRITE).is_ok());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let clerk = Principal::from_roles(UserId::new(), vec![Role::new("clerk")]);
        assert!(authorize(&clerk, &Permission::CUSTOMERS_READ).is_ok());
        assert_eq!(
            authorize(&clerk, &Permission::INVOICES_READ),
            Err(AuthzError::Forbidden("invoices.read".to_string()))
        );
    }
}
