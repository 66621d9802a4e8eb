//! Investment (capital commitment) models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::loan::Page;

/// Whether a commitment counts toward its loan's funding
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentStatus {
    Active,
    Inactive,
}

/// Investment model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Investment {
    pub id: i64,
    pub investor_id: i64,
    pub loan_id: i64,
    pub amount: i64,
    pub roi: f64, // copied from the loan's rate at commitment time
    pub status: InvestmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Investment {
    /// Amount returned to the investor once the loan is repaid
    pub fn final_amount(&self) -> f64 {
        let amount = self.amount as f64;
        amount + (amount * self.roi / 100.0)
    }
}

/// Request to commit capital to a loan
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvestmentRequest {
    pub investor_id: i64,
    pub loan_id: i64,
    pub amount: i64,
}

impl CreateInvestmentRequest {
    pub fn is_valid(&self) -> bool {
        self.investor_id > 0 && self.loan_id > 0 && self.amount > 0
    }
}

/// Query for listing investments
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvestmentFilter {
    pub id: Option<i64>,
    pub investor_id: Option<i64>,
    pub loan_id: Option<i64>,
    pub status: Option<InvestmentStatus>,
    #[serde(default)]
    pub page: Page,
}

impl InvestmentFilter {
    /// Every active commitment on a loan
    pub fn active_for_loan(loan_id: i64) -> Self {
        Self {
            loan_id: Some(loan_id),
            status: Some(InvestmentStatus::Active),
            page: Page::all(),
            ..Default::default()
        }
    }

    pub fn matches(&self, investment: &Investment) -> bool {
        self.id.map_or(true, |id| investment.id == id)
            && self.investor_id.map_or(true, |id| investment.investor_id == id)
            && self.loan_id.map_or(true, |id| investment.loan_id == id)
            && self.status.map_or(true, |status| investment.status == status)
    }
}
