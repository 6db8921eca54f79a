use serde::{Deserialize, Serialize};

use studiodesk_core::{DomainResult, Entity, Money, PackageId, Percent, TenantId, TenantScoped};

use crate::split::DepositPolicy;

/// A priced offering. The authoritative source of deposit policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub tenant_id: TenantId,
    pub name: String,
    pub price: Money,
    pub duration_minutes: Option<u32>,
    pub included_images: Option<u32>,
    pub require_deposit: bool,
    pub deposit_percent: Option<Percent>,
}

impl Entity for Package {
    type Id = PackageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Package {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Package {
    /// Resolve the deposit policy from this record.
    pub fn deposit_policy(&self) -> DomainResult<DepositPolicy> {
        if !self.require_deposit {
            return Ok(DepositPolicy::single_invoice());
        }
        DepositPolicy::deposit(
            self.deposit_percent
                .unwrap_or(DepositPolicy::DEFAULT_PERCENT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(require_deposit: bool, pct: Option<Percent>) -> Package {
        Package {
            id: PackageId::new(),
            tenant_id: TenantId::new(),
            name: "Family Session".to_string(),
            price: Money::from_major(450),
            duration_minutes: Some(60),
            included_images: Some(20),
            require_deposit,
            deposit_percent: pct,
        }
    }

    #[test]
    fn deposit_percent_defaults_to_twenty_five() {
        let policy = package(true, None).deposit_policy().unwrap();
        assert!(policy.requires_deposit);
        assert_eq!(policy.deposit_percent, Percent::whole(25));
    }

    #[test]
    fn packages_without_deposit_bill_once() {
        let policy = package(false, Some(Percent::whole(50))).deposit_policy().unwrap();
        assert!(!policy.requires_deposit);
    }

    #[test]
    fn out_of_range_percent_is_rejected() {
        assert!(package(true, Some(Percent::whole(120))).deposit_policy().is_err());
    }
}
