//! Loan service layer - drives loans through their lifecycle

use std::sync::Arc;

use chrono::Utc;

use crate::error::{ServiceError, ServiceResult};
use crate::loan::executor::LoanActions;
use crate::loan::state;
use crate::models::{
    CreateLoanRequest, Loan, LoanFilter, LoanProceedRequest, LoanStatus, ProceedLoan,
};
use crate::repository::LoanRepository;

/// Loan service for managing the loan lifecycle
#[derive(Clone)]
pub struct LoanService {
    loans: Arc<dyn LoanRepository>,
    actions: Arc<dyn LoanActions>,
}

impl LoanService {
    pub fn new(loans: Arc<dyn LoanRepository>, actions: Arc<dyn LoanActions>) -> Self {
        Self { loans, actions }
    }

    /// Register a new loan in the Proposed state
    pub async fn create(&self, request: CreateLoanRequest) -> ServiceResult<Loan> {
        if !request.is_valid() {
            return Err(ServiceError::invalid("invalid parameter values"));
        }

        let loan = self
            .loans
            .create(Loan {
                id: 0,
                borrower_id: request.borrower_id,
                amount: request.amount,
                rate: request.rate,
                status: LoanStatus::Proposed,
                approval_proof_url: None,
                agreement_letter_url: None,
                created_by: request.created_by,
                approved_by: None,
                disbursed_by: None,
                created_at: Utc::now(),
                updated_at: None,
                approved_at: None,
                invested_at: None,
                disbursed_at: None,
            })
            .await?;

        tracing::info!(
            loan_id = loan.id,
            borrower_id = loan.borrower_id,
            amount = loan.amount,
            "Loan proposed"
        );
        Ok(loan)
    }

    /// Get loan by ID
    pub async fn get(&self, id: i64) -> ServiceResult<Loan> {
        self.loans.get_detail(id).await
    }

    /// List loans with filters
    pub async fn list(&self, filter: &LoanFilter) -> ServiceResult<Vec<Loan>> {
        self.loans.list(filter).await
    }

    /// Move a loan one step through its lifecycle
    pub async fn proceed(&self, request: ProceedLoan) -> ServiceResult<Loan> {
        if request.loan_id <= 0 {
            return Err(ServiceError::invalid("invalid parameter values"));
        }

        // Transition logic always works on the persisted snapshot; the caller only
        // contributes the actor fields and the attachment.
        let existing = self.loans.get_detail(request.loan_id).await?;
        let status = existing.status;
        let mut data = existing;
        request.actor.apply_to(&mut data);

        let proceed = LoanProceedRequest {
            action: request.action,
            data,
            attachment: request.attachment,
        };
        if !proceed.is_valid() {
            return Err(ServiceError::invalid("invalid parameter values"));
        }

        tracing::debug!(
            loan_id = request.loan_id,
            status = %status,
            action = %request.action,
            "Proceeding loan"
        );

        state::dispatch(status, self.actions.as_ref(), proceed)
            .await
            .map_err(|e| {
                if e.is_invalid() {
                    tracing::warn!(
                        loan_id = request.loan_id,
                        status = %status,
                        action = %request.action,
                        error = %e,
                        "Loan transition rejected"
                    );
                }
                e
            })
    }
}
