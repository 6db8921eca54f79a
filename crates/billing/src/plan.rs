//! Invoice plan: turns a job's package price into the ordered list of invoice
//! specs to persist. Pure; no ids are assigned here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use studiodesk_core::{DomainError, DomainResult, JobNumber, Money, Percent};

use crate::due::{balance_due_date, deposit_due_date, format_long_date};
use crate::invoice::{InvoiceStatus, InvoiceType};
use crate::split::{ChargeLine, DepositPolicy, split_charges};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

impl LineItem {
    fn single(description: String, amount: Money) -> Self {
        Self {
            description,
            quantity: 1,
            unit_price: amount,
            total: amount,
        }
    }
}

/// Everything needed to persist one invoice, minus identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSpec {
    pub invoice_number: String,
    pub invoice_type: InvoiceType,
    pub status: InvoiceStatus,
    pub amount: Money,
    pub tax: Money,
    pub total: Money,
    pub due_date: NaiveDate,
    pub line_items: Vec<LineItem>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoicePlanRequest {
    pub job_number: JobNumber,
    /// Human label of the job, e.g. its title.
    pub job_label: String,
    pub package_label: Option<String>,
    pub package_total: Money,
    pub policy: DepositPolicy,
    pub tax_rate: Percent,
    pub today: NaiveDate,
    pub event_date: Option<NaiveDate>,
}

impl InvoicePlanRequest {
    fn label(&self) -> String {
        match self.package_label.as_deref().map(str::trim) {
            Some(pkg) if !pkg.is_empty() && pkg != self.job_label.trim() => {
                format!("{} - {}", self.job_label, pkg)
            }
            _ => self.job_label.clone(),
        }
    }
}

/// Invoice number for a job, optionally suffixed (`DEP`, `FIN`).
pub fn invoice_number(job_number: JobNumber, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("INV-{}-{}", job_number.padded(), suffix),
        None => format!("INV-{}", job_number.padded()),
    }
}

/// Plan the invoices for a job.
///
/// With a deposit: `INV-nnnn-DEP` (sent, due today) then `INV-nnnn-FIN`
/// (draft, due two weeks before the session). Without: one `INV-nnnn`
/// invoice, sent, on the balance due date.
pub fn plan_invoices(req: &InvoicePlanRequest) -> DomainResult<Vec<InvoiceSpec>> {
    let charges = split_charges(req.package_total, req.policy, req.tax_rate)?;
    let label = req.label();
    let balance_due = balance_due_date(req.today, req.event_date);

    if !req.policy.requires_deposit {
        let [charge] = charges.as_slice() else {
            return Err(DomainError::invariant(
                "single invoice plan must have one charge",
            ));
        };
        return Ok(vec![spec(
            charge,
            invoice_number(req.job_number, None),
            InvoiceStatus::Sent,
            balance_due,
            label,
            format!("Payment due {}.", format_long_date(balance_due)),
        )]);
    }

    let mut specs = Vec::with_capacity(charges.len());
    for charge in &charges {
        let next = match charge.invoice_type {
            InvoiceType::Deposit => {
                let due = deposit_due_date(req.today);
                spec(
                    charge,
                    invoice_number(req.job_number, Some("DEP")),
                    InvoiceStatus::Sent,
                    due,
                    format!("{label} ({}% deposit)", req.policy.deposit_percent),
                    format!(
                        "Deposit due {} to secure your booking.",
                        format_long_date(due)
                    ),
                )
            }
            _ => spec(
                charge,
                invoice_number(req.job_number, Some("FIN")),
                InvoiceStatus::Draft,
                balance_due,
                format!("{label} (remaining balance)"),
                format!("Remaining balance due {}.", format_long_date(balance_due)),
            ),
        };
        specs.push(next);
    }
    Ok(specs)
}

fn spec(
    charge: &ChargeLine,
    invoice_number: String,
    status: InvoiceStatus,
    due_date: NaiveDate,
    description: String,
    notes: String,
) -> InvoiceSpec {
    InvoiceSpec {
        invoice_number,
        invoice_type: charge.invoice_type,
        status,
        amount: charge.amount,
        tax: charge.tax,
        total: charge.total,
        due_date,
        line_items: vec![LineItem::single(description, charge.amount)],
        notes: Some(notes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn request(policy: DepositPolicy) -> InvoicePlanRequest {
        InvoicePlanRequest {
            job_number: JobNumber::new(7).unwrap(),
            job_label: "Smith Wedding".to_string(),
            package_label: Some("Gold".to_string()),
            package_total: Money::from_major(1000),
            policy,
            tax_rate: Percent::whole(10),
            today: d(2026, 1, 10),
            event_date: Some(d(2026, 3, 20)),
        }
    }

    #[test]
    fn deposit_plan_numbers_statuses_and_due_dates() {
        let specs =
            plan_invoices(&request(DepositPolicy::deposit(Percent::whole(25)).unwrap())).unwrap();
        assert_eq!(specs.len(), 2);

        let dep = &specs[0];
        assert_eq!(dep.invoice_number, "INV-0007-DEP");
        assert_eq!(dep.invoice_type, InvoiceType::Deposit);
        assert_eq!(dep.status, InvoiceStatus::Sent);
        assert_eq!(dep.due_date, d(2026, 1, 10));
        assert_eq!(dep.total, Money::from_cents(27_500));
        assert_eq!(
            dep.line_items[0].description,
            "Smith Wedding - Gold (25% deposit)"
        );
        assert_eq!(dep.line_items[0].unit_price, Money::from_major(250));

        let fin = &specs[1];
        assert_eq!(fin.invoice_number, "INV-0007-FIN");
        assert_eq!(fin.status, InvoiceStatus::Draft);
        assert_eq!(fin.due_date, d(2026, 3, 6));
        assert_eq!(fin.total, Money::from_cents(82_500));
        assert_eq!(
            fin.line_items[0].description,
            "Smith Wedding - Gold (remaining balance)"
        );
        assert_eq!(
            fin.notes.as_deref(),
            Some("Remaining balance due 6 March 2026.")
        );
    }

    #[test]
    fn single_invoice_plan() {
        let mut req = request(DepositPolicy::single_invoice());
        req.package_label = Some("Smith Wedding".to_string());
        req.event_date = None;

        let specs = plan_invoices(&req).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].invoice_number, "INV-0007");
        assert_eq!(specs[0].status, InvoiceStatus::Sent);
        assert_eq!(specs[0].due_date, d(2026, 1, 24));
        assert_eq!(specs[0].line_items[0].description, "Smith Wedding");
        assert_eq!(specs[0].total, Money::from_major(1100));
    }

    #[test]
    fn line_item_totals_match_pre_tax_amounts() {
        let specs =
            plan_invoices(&request(DepositPolicy::deposit(Percent::whole(30)).unwrap())).unwrap();
        let sum: Money = specs
            .iter()
            .fold(Money::ZERO, |acc, s| acc + s.line_items[0].total);
        assert_eq!(sum, Money::from_major(1000));
    }
}
