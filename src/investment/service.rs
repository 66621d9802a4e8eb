//! Investment service layer - capital commitments against a loan's principal

use std::sync::Arc;

use chrono::Utc;

use crate::error::{ServiceError, ServiceResult};
use crate::investment::funding::FundingQueue;
use crate::lock::KeyedLock;
use crate::models::{
    CreateInvestmentRequest, Investment, InvestmentFilter, InvestmentStatus, LoanStatus,
};
use crate::repository::{InvestmentRepository, LoanRepository};

/// Coordinates concurrent commitments so a loan is never over-funded
#[derive(Clone)]
pub struct InvestmentService {
    investments: Arc<dyn InvestmentRepository>,
    loans: Arc<dyn LoanRepository>,
    locks: KeyedLock,
    funding: FundingQueue,
}

impl InvestmentService {
    pub fn new(
        investments: Arc<dyn InvestmentRepository>,
        loans: Arc<dyn LoanRepository>,
        locks: KeyedLock,
        funding: FundingQueue,
    ) -> Self {
        Self {
            investments,
            loans,
            locks,
            funding,
        }
    }

    /// List investments with filters
    pub async fn list(&self, filter: &InvestmentFilter) -> ServiceResult<Vec<Investment>> {
        self.investments.list(filter).await
    }

    /// Commit capital to an approved loan
    ///
    /// The capacity check and the insert run under the loan's lock, so of two racing
    /// commitments the second always sees the first. When this commitment completes
    /// the funding, the Invest transition is queued; its outcome never affects the
    /// commitment, which has already been stored.
    pub async fn create_commitment(
        &self,
        request: CreateInvestmentRequest,
    ) -> ServiceResult<Investment> {
        let _guard = self.locks.acquire(&lock_key(request.loan_id)).await;

        if !request.is_valid() {
            return Err(ServiceError::invalid("invalid parameter values"));
        }

        let loan = self.loans.get_detail(request.loan_id).await?;
        if loan.status != LoanStatus::Approved {
            return Err(ServiceError::invalid("loan status must be approved"));
        }

        let committed = self
            .investments
            .amount_sum(&InvestmentFilter::active_for_loan(loan.id))
            .await?;
        let total = match request.amount.checked_add(committed) {
            Some(total) if total <= loan.amount => total,
            _ => {
                tracing::warn!(
                    loan_id = loan.id,
                    investor_id = request.investor_id,
                    amount = request.amount,
                    remaining = loan.amount.saturating_sub(committed),
                    "Investment rejected, principal would be exceeded"
                );
                return Err(ServiceError::invalid(
                    "investment amount exceeds remaining principal amount",
                ));
            }
        };

        let investment = self
            .investments
            .create(Investment {
                id: 0,
                investor_id: request.investor_id,
                loan_id: loan.id,
                amount: request.amount,
                roi: loan.rate,
                status: InvestmentStatus::Active,
                created_at: Utc::now(),
                updated_at: None,
            })
            .await?;

        tracing::info!(
            loan_id = loan.id,
            investment_id = investment.id,
            investor_id = investment.investor_id,
            amount = investment.amount,
            committed = total,
            principal = loan.amount,
            "Investment committed"
        );

        if total == loan.amount {
            self.funding.schedule(loan.id, Utc::now());
        }

        Ok(investment)
    }
}

fn lock_key(loan_id: i64) -> String {
    format!("investment:invest:{}", loan_id)
}
