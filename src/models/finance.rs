use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Monetary amounts travel as integer minor units (cents). Rendering
/// them in a locale is the console's job, not this crate's.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Contribution {
    pub id: i64,
    #[serde(rename = "memberId")]
    pub member_id: Option<i64>,
    #[serde(rename = "memberName")]
    pub member_name: Option<String>,
    pub fund: Option<String>,
    #[serde(rename = "amountCents")]
    pub amount_cents: i64,
    #[serde(rename = "receivedOn")]
    pub received_on: Option<NaiveDate>,
    pub method: Option<String>,
    pub note: Option<String>,
}

impl Contribution {
    /// Contributions without a member id were received anonymously
    pub fn is_attributed(&self) -> bool {
        self.member_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Expense {
    pub id: i64,
    pub payee: String,
    pub category: Option<String>,
    #[serde(rename = "amountCents")]
    pub amount_cents: i64,
    #[serde(rename = "incurredOn")]
    pub incurred_on: Option<NaiveDate>,
    #[serde(rename = "approvedBy")]
    pub approved_by: Option<String>,
    pub note: Option<String>,
}

impl Expense {
    pub fn is_approved(&self) -> bool {
        self.approved_by.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Payout {
    pub id: i64,
    pub recipient: String,
    #[serde(rename = "amountCents")]
    pub amount_cents: i64,
    #[serde(rename = "requestedOn")]
    pub requested_on: Option<NaiveDate>,
    #[serde(rename = "settledOn")]
    pub settled_on: Option<NaiveDate>,
    pub reference: Option<String>,
}

impl Payout {
    pub fn is_settled(&self) -> bool {
        self.settled_on.is_some()
    }
}

/// Aggregated totals for a reporting period, as returned by the
/// report-summary endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ReportSummary {
    #[serde(rename = "fromDate")]
    pub from_date: Option<NaiveDate>,
    #[serde(rename = "toDate")]
    pub to_date: Option<NaiveDate>,
    #[serde(rename = "contributionsCents")]
    pub contributions_cents: i64,
    #[serde(rename = "expensesCents")]
    pub expenses_cents: i64,
    #[serde(rename = "payoutsCents")]
    pub payouts_cents: i64,
    #[serde(rename = "contributionCount")]
    pub contribution_count: i64,
    #[serde(rename = "expenseCount")]
    pub expense_count: i64,
    #[serde(rename = "payoutCount")]
    pub payout_count: i64,
}

impl ReportSummary {
    /// Contributions less expenses and payouts for the period
    pub fn net_cents(&self) -> i64 {
        self.contributions_cents - self.expenses_cents - self.payouts_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contribution() {
        let json = r#"{
            "id": 41,
            "memberId": 7,
            "memberName": "Dana Whitfield",
            "fund": "General",
            "amountCents": 12500,
            "receivedOn": "2025-03-02",
            "method": "transfer",
            "note": null
        }"#;

        let parsed: Contribution = serde_json::from_str(json).expect("parse contribution");
        assert_eq!(parsed.amount_cents, 12500);
        assert_eq!(
            parsed.received_on,
            Some(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap())
        );
        assert!(parsed.is_attributed());
    }

    #[test]
    fn test_anonymous_contribution() {
        let json = r#"{"id": 42, "amountCents": 5000}"#;
        let parsed: Contribution = serde_json::from_str(json).expect("parse contribution");
        assert!(!parsed.is_attributed());
        assert!(parsed.fund.is_none());
    }

    #[test]
    fn test_summary_net() {
        let summary = ReportSummary {
            contributions_cents: 100_000,
            expenses_cents: 35_000,
            payouts_cents: 20_000,
            ..Default::default()
        };
        assert_eq!(summary.net_cents(), 45_000);
    }
}
