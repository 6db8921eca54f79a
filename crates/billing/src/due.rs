//! Due-date policy.

use chrono::{Days, NaiveDate};

/// Days before the session that the final balance falls due.
pub const FINAL_PAYMENT_LEAD_DAYS: u64 = 14;

/// Deposits are due on the day they are issued.
pub fn deposit_due_date(today: NaiveDate) -> NaiveDate {
    today
}

/// Final (or only) invoice due date.
///
/// `event_date - 14 days`, never earlier than `today`. Without an event date
/// the balance is due `today + 14 days`.
pub fn balance_due_date(today: NaiveDate, event_date: Option<NaiveDate>) -> NaiveDate {
    match event_date {
        Some(event_date) => event_date
            .checked_sub_days(Days::new(FINAL_PAYMENT_LEAD_DAYS))
            .map_or(today, |due| due.max(today)),
        None => today
            .checked_add_days(Days::new(FINAL_PAYMENT_LEAD_DAYS))
            .unwrap_or(today),
    }
}

/// `14 March 2026`
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}
