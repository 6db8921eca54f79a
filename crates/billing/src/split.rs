//! Deposit/final split and per-line tax.
//!
//! Reconciliation rule: the final amount is always `total - deposit`, never
//! re-rounded on its own, so `deposit + final == total` to the cent for every
//! input. Tax is computed independently per line from that line's own amount.

use serde::{Deserialize, Serialize};

use studiodesk_core::{DomainError, DomainResult, Money, Percent};

use crate::invoice::InvoiceType;

/// Deposit policy resolved from the authoritative package record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositPolicy {
    pub requires_deposit: bool,
    pub deposit_percent: Percent,
}

impl DepositPolicy {
    /// Deposit share used when a package does not specify one.
    pub const DEFAULT_PERCENT: Percent = Percent::whole(25);

    pub fn single_invoice() -> Self {
        Self {
            requires_deposit: false,
            deposit_percent: Self::DEFAULT_PERCENT,
        }
    }

    pub fn deposit(percent: Percent) -> DomainResult<Self> {
        Ok(Self {
            requires_deposit: true,
            deposit_percent: percent.ensure_at_most_hundred("deposit_percent")?,
        })
    }
}

/// One computed charge before it is turned into an invoice.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeLine {
    pub invoice_type: InvoiceType,
    /// Pre-tax amount.
    pub amount: Money,
    pub tax: Money,
    /// `amount + tax`
    pub total: Money,
}

impl ChargeLine {
    fn taxed(invoice_type: InvoiceType, amount: Money, tax_rate: Percent) -> DomainResult<Self> {
        let tax = amount.percent_of(tax_rate);
        let total = amount
            .checked_add(tax)
            .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
        Ok(Self {
            invoice_type,
            amount,
            tax,
            total,
        })
    }
}

/// Split `package_total` into one or two taxed charges.
///
/// - no deposit: a single `final` line for the whole amount
/// - deposit: a `deposit` line of `round2(total × pct)` followed by a `final`
///   line for the exact remainder
pub fn split_charges(
    package_total: Money,
    policy: DepositPolicy,
    tax_rate: Percent,
) -> DomainResult<Vec<ChargeLine>> {
    if package_total.is_negative() {
        return Err(DomainError::validation("package amount cannot be negative"));
    }

    if !policy.requires_deposit {
        return Ok(vec![ChargeLine::taxed(
            InvoiceType::Final,
            package_total,
            tax_rate,
        )?]);
    }

    let deposit_percent = policy
        .deposit_percent
        .ensure_at_most_hundred("deposit_percent")?;
    let deposit_amount = package_total.percent_of(deposit_percent);
    let final_amount = package_total
        .checked_sub(deposit_amount)
        .ok_or_else(|| DomainError::invariant("final amount underflow"))?;

    Ok(vec![
        ChargeLine::taxed(InvoiceType::Deposit, deposit_amount, tax_rate)?,
        ChargeLine::taxed(InvoiceType::Final, final_amount, tax_rate)?,
    ])
}
