use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permissions carried by an authenticated seller account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// May see and manage offers across all businesses.
    AdminOffers,
    /// May run the offer export/import endpoints for other users.
    ExportOffers,
    /// May publish (activate) offers.
    Sell,
}

impl Permission {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN_OFFERS" => Some(Self::AdminOffers),
            "EXPORT_OFFERS" => Some(Self::ExportOffers),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// The caller a request is executed on behalf of. Built by the auth
/// middleware and injected into every handler; services never consult
/// ambient global state for identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub permissions: Vec<Permission>,
}

impl Actor {
    pub fn new(user_id: Uuid, business_id: Uuid, permissions: Vec<Permission>) -> Self {
        Self {
            user_id,
            business_id,
            permissions,
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Admins see every business; everyone else only their own.
    pub fn business_scope(&self) -> Option<Uuid> {
        if self.has(Permission::AdminOffers) {
            None
        } else {
            Some(self.business_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_actor_is_unscoped() {
        let admin = Actor::new(Uuid::new_v4(), Uuid::new_v4(), vec![Permission::AdminOffers]);
        assert_eq!(admin.business_scope(), None);

        let seller = Actor::new(Uuid::new_v4(), Uuid::new_v4(), vec![Permission::Sell]);
        assert_eq!(seller.business_scope(), Some(seller.business_id));
    }

    #[test]
    fn permission_parse_rejects_unknown() {
        assert_eq!(Permission::parse("ADMIN_OFFERS"), Some(Permission::AdminOffers));
        assert_eq!(Permission::parse("admin_offers"), None);
        assert_eq!(Permission::parse("ROOT"), None);
    }
}
