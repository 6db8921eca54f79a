use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use studiodesk_core::{Money, Percent};

use crate::template::render;

/// The contract that ships with the engine.
pub const DEFAULT_CONTRACT_TEMPLATE: &str = include_str!("default_contract.txt");

/// Rendered in place of unknown dates, times and locations.
pub const TO_BE_CONFIRMED: &str = "TBC";

/// Condition keys that are declared but not yet driven by any data.
pub const RESERVED_CONDITIONS: [&str; 2] = ["second_shooter", "minors"];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositTerms {
    pub amount: Money,
    pub percent: Percent,
}

/// Facts about one engagement that a contract is rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub client_name: String,
    pub client_email: String,
    pub job_date: Option<NaiveDate>,
    pub job_time: Option<NaiveTime>,
    pub job_location: Option<String>,
    pub package_name: Option<String>,
    pub package_amount: Money,
    pub included_images: Option<u32>,
    pub business_name: String,
    pub photographer_name: String,
    pub today: NaiveDate,
    pub deposit: Option<DepositTerms>,
}

impl ContractTerms {
    pub fn final_amount(&self) -> Money {
        match self.deposit {
            Some(deposit) => self.package_amount - deposit.amount,
            None => self.package_amount,
        }
    }

    pub fn tags(&self) -> HashMap<String, String> {
        let (deposit_amount, deposit_percent) = match self.deposit {
            Some(d) => (d.amount, d.percent),
            None => (Money::ZERO, Percent::ZERO),
        };

        let job_date = self
            .job_date
            .map(|d| d.format("%A, %-d %B %Y").to_string())
            .unwrap_or_else(|| TO_BE_CONFIRMED.to_string());
        let job_time = self
            .job_time
            .map(|t| t.format("%-I:%M %p").to_string())
            .unwrap_or_else(|| TO_BE_CONFIRMED.to_string());
        let job_location = self
            .job_location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(TO_BE_CONFIRMED)
            .to_string();

        [
            ("client_name", self.client_name.clone()),
            ("client_email", self.client_email.clone()),
            ("job_date", job_date),
            ("job_time", job_time),
            ("job_location", job_location),
            (
                "package_name",
                self.package_name.clone().unwrap_or_else(|| "Custom".to_string()),
            ),
            ("package_amount", self.package_amount.format_compact()),
            (
                "included_images",
                self.included_images
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "as per package".to_string()),
            ),
            ("business_name", self.business_name.clone()),
            ("photographer_name", self.photographer_name.clone()),
            ("today_date", self.today.format("%-d %B %Y").to_string()),
            ("deposit_amount", deposit_amount.format_compact()),
            ("deposit_percent", deposit_percent.to_string()),
            ("final_amount", self.final_amount().format_compact()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// `deposit`, `no_deposit` and the reserved keys (always false).
    pub fn conditions(&self) -> HashMap<String, bool> {
        let has_deposit = self.deposit.is_some_and(|d| d.amount.is_positive());
        let mut conditions: HashMap<String, bool> = RESERVED_CONDITIONS
            .iter()
            .map(|k| (k.to_string(), false))
            .collect();
        conditions.insert("deposit".to_string(), has_deposit);
        conditions.insert("no_deposit".to_string(), !has_deposit);
        conditions
    }

    pub fn render(&self, template: &str) -> String {
        render(template, &self.tags(), &self.conditions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(deposit: Option<DepositTerms>) -> ContractTerms {
        ContractTerms {
            client_name: "Sarah Jones".to_string(),
            client_email: "sarah@example.com".to_string(),
            job_date: NaiveDate::from_ymd_opt(2026, 3, 14),
            job_time: NaiveTime::from_hms_opt(14, 30, 0),
            job_location: None,
            package_name: Some("Gold".to_string()),
            package_amount: Money::from_major(1000),
            included_images: Some(50),
            business_name: "Lumen Studio".to_string(),
            photographer_name: "Alex Reed".to_string(),
            today: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            deposit,
        }
    }

    #[test]
    fn tags_format_money_dates_and_placeholders() {
        let tags = terms(Some(DepositTerms {
            amount: Money::from_major(250),
            percent: Percent::whole(25),
        }))
        .tags();

        assert_eq!(tags["job_date"], "Saturday, 14 March 2026");
        assert_eq!(tags["job_time"], "2:30 PM");
        assert_eq!(tags["job_location"], "TBC");
        assert_eq!(tags["package_amount"], "$1,000");
        assert_eq!(tags["deposit_amount"], "$250");
        assert_eq!(tags["deposit_percent"], "25");
        assert_eq!(tags["final_amount"], "$750");
        assert_eq!(tags["today_date"], "10 January 2026");
    }

    #[test]
    fn default_contract_with_deposit() {
        let out = terms(Some(DepositTerms {
            amount: Money::from_major(250),
            percent: Percent::whole(25),
        }))
        .render(DEFAULT_CONTRACT_TEMPLATE);

        assert!(out.contains("Client: Sarah Jones (sarah@example.com)"));
        assert!(out.contains("A non-refundable deposit of $250 (25% of the total fee)"));
        assert!(out.contains("remaining balance of $750"));
        assert!(!out.contains("Full payment of"));
        assert!(!out.contains("SECOND SHOOTER"));
        assert!(!out.contains("MINORS"));
        assert!(!out.contains("{{"));
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn default_contract_without_deposit() {
        let t = terms(None);
        let conditions = t.conditions();
        assert!(!conditions["deposit"]);
        assert!(conditions["no_deposit"]);
        assert!(!conditions["minors"]);

        let out = t.render(DEFAULT_CONTRACT_TEMPLATE);
        assert!(out.contains("Full payment of $1,000 is due"));
        assert!(out.contains("Full refund minus a $50 administration fee."));
        assert!(!out.contains("DEPOSIT & PAYMENT SCHEDULE"));
    }
}
