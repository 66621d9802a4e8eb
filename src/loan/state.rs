//! Loan lifecycle states and the transition table
//!
//! | State     | Approve  | Invest   | Disburse |
//! |-----------|----------|----------|----------|
//! | Proposed  | approve  | -        | -        |
//! | Approved  | -        | invest   | -        |
//! | Invested  | -        | -        | disburse |
//! | Disbursed | -        | -        | -        |
//!
//! States carry no data; every call is dispatched on the status persisted with the
//! loan, so they can be shared freely across concurrent callers.

use crate::error::{ServiceError, ServiceResult};
use crate::loan::executor::LoanActions;
use crate::models::{Loan, LoanAction, LoanProceedRequest, LoanStatus};

/// Map a persisted status code onto its lifecycle state
pub fn resolve(code: i16) -> ServiceResult<LoanStatus> {
    match code {
        // Initial state once the loan has been created, may only be approved
        1 => Ok(LoanStatus::Proposed),
        // Ready to be offered to investors until fully funded
        2 => Ok(LoanStatus::Approved),
        // Fully funded, may only be disbursed
        3 => Ok(LoanStatus::Invested),
        // Terminal
        4 => Ok(LoanStatus::Disbursed),
        _ => Err(ServiceError::UnknownState(code)),
    }
}

impl LoanStatus {
    /// The single action legal from this state, if any
    pub fn eligible_action(self) -> Option<LoanAction> {
        match self {
            LoanStatus::Proposed => Some(LoanAction::Approve),
            LoanStatus::Approved => Some(LoanAction::Invest),
            LoanStatus::Invested => Some(LoanAction::Disburse),
            LoanStatus::Disbursed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.eligible_action().is_none()
    }
}

/// Run `request.action` from `status` through the executor, or reject it
pub async fn dispatch(
    status: LoanStatus,
    actions: &dyn LoanActions,
    request: LoanProceedRequest,
) -> ServiceResult<Loan> {
    match (status, request.action) {
        (LoanStatus::Proposed, LoanAction::Approve) => actions.approve(request).await,
        (LoanStatus::Approved, LoanAction::Invest) => actions.invest(request).await,
        (LoanStatus::Invested, LoanAction::Disburse) => actions.disburse(request).await,
        (status, action) => Err(ServiceError::IneligibleAction { status, action }),
    }
}
