//! Loan models for the loan service
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::loan::state;

/// Loan status, persisted as its integer code
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(try_from = "i16", into = "i16")]
pub enum LoanStatus {
    Proposed,
    Approved,
    Invested,
    Disbursed,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 4] = [
        LoanStatus::Proposed,
        LoanStatus::Approved,
        LoanStatus::Invested,
        LoanStatus::Disbursed,
    ];

    /// Integer code stored alongside the loan
    pub fn code(self) -> i16 {
        match self {
            LoanStatus::Proposed => 1,
            LoanStatus::Approved => 2,
            LoanStatus::Invested => 3,
            LoanStatus::Disbursed => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Proposed => "proposed",
            LoanStatus::Approved => "approved",
            LoanStatus::Invested => "invested",
            LoanStatus::Disbursed => "disbursed",
        }
    }
}

impl TryFrom<i16> for LoanStatus {
    type Error = ServiceError;

    fn try_from(code: i16) -> ServiceResult<Self> {
        state::resolve(code)
    }
}

impl From<LoanStatus> for i16 {
    fn from(status: LoanStatus) -> Self {
        status.code()
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions that move a loan through its lifecycle
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoanAction {
    Approve,
    Invest,
    Disburse,
}

impl LoanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanAction::Approve => "approve",
            LoanAction::Invest => "invest",
            LoanAction::Disburse => "disburse",
        }
    }
}

impl std::fmt::Display for LoanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Loan {
    pub id: i64,
    pub borrower_id: i64,
    pub amount: i64, // principal, whole currency units
    pub rate: f64,   // percent
    pub status: LoanStatus,
    pub approval_proof_url: Option<String>,
    pub agreement_letter_url: Option<String>,
    pub created_by: Option<i64>,
    pub approved_by: Option<i64>,
    pub disbursed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub invested_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
}

/// Request to create a new loan
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLoanRequest {
    pub borrower_id: i64,
    pub amount: i64,
    pub rate: f64,
    pub created_by: Option<i64>,
}

impl CreateLoanRequest {
    pub fn is_valid(&self) -> bool {
        self.borrower_id > 0 && self.amount > 0 && self.rate > 0.0
    }
}

/// Query for listing loans
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanFilter {
    pub id: Option<i64>,
    pub borrower_id: Option<i64>,
    pub status: Option<LoanStatus>,
    pub approved_by: Option<i64>,
    pub disbursed_by: Option<i64>,
    #[serde(default)]
    pub page: Page,
}

impl LoanFilter {
    pub fn matches(&self, loan: &Loan) -> bool {
        self.id.map_or(true, |id| loan.id == id)
            && self.borrower_id.map_or(true, |id| loan.borrower_id == id)
            && self.status.map_or(true, |status| loan.status == status)
            && self.approved_by.map_or(true, |id| loan.approved_by == Some(id))
            && self.disbursed_by.map_or(true, |id| loan.disbursed_by == Some(id))
    }
}

/// Pagination shared by list queries
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub unpaginated: bool,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Fetch every matching row
    pub fn all() -> Self {
        Self {
            page: None,
            limit: None,
            unpaginated: true,
        }
    }

    /// Resolve to (offset, limit); `None` when pagination is disabled
    pub fn window(&self) -> Option<(usize, usize)> {
        if self.unpaginated {
            return None;
        }
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        let limit = limit as usize;
        let offset = (page as usize - 1).saturating_mul(limit);
        Some((offset, limit))
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: None,
            limit: None,
            unpaginated: false,
        }
    }
}

/// A file sent along with a lifecycle action
#[derive(Debug, Clone, Default)]
pub struct FileAttachment {
    pub content: Vec<u8>,
    pub extension: String, // including the leading dot, e.g. ".png"
}

impl FileAttachment {
    pub fn new(content: impl Into<Vec<u8>>, extension: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            extension: extension.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Exact match against the allowed extensions
    pub fn has_extension(&self, allowed: &[&str]) -> bool {
        allowed.contains(&self.extension.as_str())
    }
}

/// Fields supplied by the actor performing a lifecycle action
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActorFields {
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub invested_at: Option<DateTime<Utc>>,
    pub disbursed_by: Option<i64>,
    pub disbursed_at: Option<DateTime<Utc>>,
}

impl ActorFields {
    /// Overlay the supplied fields onto a snapshot of the persisted loan
    pub fn apply_to(&self, loan: &mut Loan) {
        if let Some(id) = self.approved_by {
            loan.approved_by = Some(id);
        }
        if let Some(at) = self.approved_at {
            loan.approved_at = Some(at);
        }
        if let Some(at) = self.invested_at {
            loan.invested_at = Some(at);
        }
        if let Some(id) = self.disbursed_by {
            loan.disbursed_by = Some(id);
        }
        if let Some(at) = self.disbursed_at {
            loan.disbursed_at = Some(at);
        }
    }
}

/// Caller-facing request to move a loan through its lifecycle
#[derive(Debug, Clone)]
pub struct ProceedLoan {
    pub loan_id: i64,
    pub action: LoanAction,
    pub actor: ActorFields,
    pub attachment: Option<FileAttachment>,
}

/// Action-and-payload envelope handed to the action executor
///
/// `data` is always a snapshot of the persisted loan with the actor's fields
/// applied, so transition logic never sees a partially filled payload.
#[derive(Debug, Clone)]
pub struct LoanProceedRequest {
    pub action: LoanAction,
    pub data: Loan,
    pub attachment: Option<FileAttachment>,
}

impl LoanProceedRequest {
    pub fn is_valid(&self) -> bool {
        self.data.id > 0
    }
}
