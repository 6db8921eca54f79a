use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use studiodesk_core::{
    ClientId, DomainError, DomainResult, Entity, InvoiceId, JobId, Money, TenantId, TenantScoped,
};

use crate::plan::{InvoiceSpec, LineItem};

/// Currency used when a tenant has not configured one.
pub const DEFAULT_CURRENCY: &str = "AUD";

/// What an invoice bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceType {
    Deposit,
    Final,
    Custom,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Deposit => "deposit",
            InvoiceType::Final => "final",
            InvoiceType::Custom => "custom",
        }
    }
}

impl core::str::FromStr for InvoiceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(InvoiceType::Deposit),
            "final" => Ok(InvoiceType::Final),
            "custom" => Ok(InvoiceType::Custom),
            other => Err(DomainError::validation(format!(
                "unknown invoice type: {other}"
            ))),
        }
    }
}

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Viewed,
    PartiallyPaid,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Viewed => "viewed",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Void => "void",
        }
    }

    /// Statuses in which the client has been asked to pay.
    fn is_payable(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Sent
                | InvoiceStatus::Viewed
                | InvoiceStatus::Overdue
                | InvoiceStatus::PartiallyPaid
        )
    }
}

impl core::str::FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "viewed" => Ok(InvoiceStatus::Viewed),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "void" => Ok(InvoiceStatus::Void),
            other => Err(DomainError::validation(format!(
                "unknown invoice status: {other}"
            ))),
        }
    }
}

/// A persisted invoice.
///
/// Amounts are copied verbatim from the [`InvoiceSpec`] the money engine
/// produced; nothing here recomputes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub tenant_id: TenantId,
    pub job_id: Option<JobId>,
    pub client_id: Option<ClientId>,
    pub invoice_number: String,
    pub invoice_type: InvoiceType,
    pub status: InvoiceStatus,
    pub amount: Money,
    pub tax: Money,
    pub total: Money,
    pub paid_amount: Money,
    pub currency: String,
    pub due_date: NaiveDate,
    pub line_items: Vec<LineItem>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Invoice {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Invoice {
    /// Materialise a planned invoice for a job.
    pub fn from_spec(
        id: InvoiceId,
        tenant_id: TenantId,
        job_id: Option<JobId>,
        client_id: Option<ClientId>,
        spec: InvoiceSpec,
        currency: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            job_id,
            client_id,
            invoice_number: spec.invoice_number,
            invoice_type: spec.invoice_type,
            status: spec.status,
            amount: spec.amount,
            tax: spec.tax,
            total: spec.total,
            paid_amount: Money::ZERO,
            currency: currency.into(),
            due_date: spec.due_date,
            line_items: spec.line_items,
            notes: spec.notes,
            created_at,
            paid_at: None,
        }
    }

    pub fn outstanding(&self) -> Money {
        self.total - self.paid_amount
    }

    /// Invariant: cannot pay void, draft or settled invoices.
    pub fn can_accept_payment(&self) -> bool {
        self.status.is_payable() && self.outstanding().is_positive()
    }

    /// Release a draft to the client.
    pub fn mark_sent(&mut self) -> DomainResult<()> {
        match self.status {
            InvoiceStatus::Draft => {
                self.status = InvoiceStatus::Sent;
                Ok(())
            }
            InvoiceStatus::Sent => Ok(()),
            other => Err(DomainError::conflict(format!(
                "cannot send invoice in status {}",
                other.as_str()
            ))),
        }
    }

    /// The client opened the invoice. Only moves `sent` forward.
    pub fn mark_viewed(&mut self) {
        if self.status == InvoiceStatus::Sent {
            self.status = InvoiceStatus::Viewed;
        }
    }

    /// Flag an unpaid invoice whose due date has passed. Returns whether the
    /// status changed.
    pub fn mark_overdue(&mut self, today: NaiveDate) -> bool {
        let unpaid = matches!(
            self.status,
            InvoiceStatus::Sent | InvoiceStatus::Viewed | InvoiceStatus::PartiallyPaid
        );
        if unpaid && today > self.due_date {
            self.status = InvoiceStatus::Overdue;
            return true;
        }
        false
    }

    pub fn register_payment(&mut self, amount: Money, at: DateTime<Utc>) -> DomainResult<()> {
        if !amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if !self.can_accept_payment() {
            return Err(DomainError::invariant(
                "cannot register payment on a draft, void or fully paid invoice",
            ));
        }

        let new_paid = self
            .paid_amount
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("payment total overflow"))?;
        if new_paid > self.total {
            return Err(DomainError::invariant("cannot overpay invoice"));
        }

        self.paid_amount = new_paid;
        if new_paid == self.total {
            self.status = InvoiceStatus::Paid;
            self.paid_at = Some(at);
        } else {
            self.status = InvoiceStatus::PartiallyPaid;
        }
        Ok(())
    }

    pub fn void(&mut self) -> DomainResult<()> {
        match self.status {
            InvoiceStatus::Void => Err(DomainError::conflict("invoice is already void")),
            InvoiceStatus::Paid => Err(DomainError::invariant("cannot void a paid invoice")),
            _ => {
                self.status = InvoiceStatus::Void;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn sent_invoice(total: i64) -> Invoice {
        let spec = InvoiceSpec {
            invoice_number: "INV-0001".to_string(),
            invoice_type: InvoiceType::Final,
            status: InvoiceStatus::Sent,
            amount: Money::from_cents(total),
            tax: Money::ZERO,
            total: Money::from_cents(total),
            due_date: due(),
            line_items: vec![],
            notes: None,
        };
        Invoice::from_spec(
            InvoiceId::new(),
            TenantId::new(),
            Some(JobId::new()),
            None,
            spec,
            DEFAULT_CURRENCY,
            at(),
        )
    }

    #[test]
    fn paying_to_total_marks_invoice_paid() {
        let mut invoice = sent_invoice(200);

        invoice.register_payment(Money::from_cents(50), at()).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.outstanding(), Money::from_cents(150));

        invoice.register_payment(Money::from_cents(150), at()).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.paid_at, Some(at()));
        assert!(!invoice.can_accept_payment());
    }

    #[test]
    fn cannot_overpay_invoice() {
        let mut invoice = sent_invoice(200);
        let err = invoice
            .register_payment(Money::from_cents(201), at())
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("overpay") => {}
            other => panic!("expected overpay violation, got {other:?}"),
        }
        assert_eq!(invoice.paid_amount, Money::ZERO);
    }

    #[test]
    fn cannot_pay_void_or_draft_invoice() {
        let mut invoice = sent_invoice(200);
        invoice.void().unwrap();
        assert!(invoice.register_payment(Money::from_cents(10), at()).is_err());
        assert!(matches!(invoice.void(), Err(DomainError::Conflict(_))));

        let mut draft = sent_invoice(200);
        draft.status = InvoiceStatus::Draft;
        assert!(draft.register_payment(Money::from_cents(10), at()).is_err());
        draft.mark_sent().unwrap();
        assert!(draft.register_payment(Money::from_cents(10), at()).is_ok());
    }

    #[test]
    fn paid_invoices_cannot_be_voided() {
        let mut invoice = sent_invoice(100);
        invoice.register_payment(Money::from_cents(100), at()).unwrap();
        assert!(invoice.void().is_err());
    }

    #[test]
    fn overdue_only_when_unpaid_and_past_due() {
        let mut invoice = sent_invoice(100);
        assert!(!invoice.mark_overdue(due()));
        assert!(invoice.mark_overdue(due().succ_opt().unwrap()));
        assert_eq!(invoice.status, InvoiceStatus::Overdue);

        // overdue invoices still accept payment
        invoice.register_payment(Money::from_cents(100), at()).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(!invoice.mark_overdue(due().succ_opt().unwrap()));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::PartiallyPaid,
            InvoiceStatus::Void,
        ] {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), status);
        }
        assert!("open".parse::<InvoiceStatus>().is_err());
    }
}
