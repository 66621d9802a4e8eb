//! Funding completion: queue, worker and reconciler
//!
//! A commitment that fills a loan's principal only enqueues the Invest transition.
//! A single worker drains the queue, so Invest transitions never race each other,
//! and the reconciler re-derives "fully funded" from persisted sums to pick up
//! anything the queue dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::{ServiceError, ServiceResult};
use crate::loan::LoanService;
use crate::models::{
    ActorFields, InvestmentFilter, LoanAction, LoanFilter, LoanStatus, Page, ProceedLoan,
};
use crate::repository::{InvestmentRepository, LoanRepository};

/// A loan whose active commitments reached its principal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingRequest {
    pub loan_id: i64,
    pub invested_at: DateTime<Utc>,
}

/// Sending half of the funding queue
#[derive(Clone)]
pub struct FundingQueue {
    sender: mpsc::Sender<FundingRequest>,
}

impl FundingQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FundingRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue the Invest transition without waiting; returns whether it was queued
    pub fn schedule(&self, loan_id: i64, invested_at: DateTime<Utc>) -> bool {
        match self.sender.try_send(FundingRequest {
            loan_id,
            invested_at,
        }) {
            Ok(()) => {
                tracing::debug!(loan_id, "Funding completion queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(loan_id, "Funding queue full, leaving loan to the reconciler");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!(loan_id, "Funding queue closed, leaving loan to the reconciler");
                false
            }
        }
    }
}

/// Single consumer applying queued Invest transitions
pub struct FundingWorker {
    loans: LoanService,
    receiver: mpsc::Receiver<FundingRequest>,
}

impl FundingWorker {
    pub fn new(loans: LoanService, receiver: mpsc::Receiver<FundingRequest>) -> Self {
        Self { loans, receiver }
    }

    /// Process requests until every queue handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Funding worker started");
        while let Some(request) = self.receiver.recv().await {
            self.complete(request).await;
        }
        tracing::info!("Funding queue closed, worker exiting");
    }

    // Failures are logged and dropped; the commitment that triggered this has
    // already been stored.
    async fn complete(&self, request: FundingRequest) {
        let result = self
            .loans
            .proceed(ProceedLoan {
                loan_id: request.loan_id,
                action: LoanAction::Invest,
                actor: ActorFields {
                    invested_at: Some(request.invested_at),
                    ..Default::default()
                },
                attachment: None,
            })
            .await;

        match result {
            Ok(loan) => {
                tracing::info!(loan_id = loan.id, "Loan moved to invested");
            }
            Err(ServiceError::IneligibleAction { status, .. }) => {
                tracing::debug!(
                    loan_id = request.loan_id,
                    status = %status,
                    "Funding completion already applied"
                );
            }
            Err(e) => {
                tracing::error!(
                    loan_id = request.loan_id,
                    error = %e,
                    code = e.error_code(),
                    "Error proceeding loan to invested"
                );
            }
        }
    }
}

/// Finds approved loans whose persisted commitments already fill the principal
#[derive(Clone)]
pub struct FundingReconciler {
    loans: Arc<dyn LoanRepository>,
    investments: Arc<dyn InvestmentRepository>,
    queue: FundingQueue,
}

impl FundingReconciler {
    pub fn new(
        loans: Arc<dyn LoanRepository>,
        investments: Arc<dyn InvestmentRepository>,
        queue: FundingQueue,
    ) -> Self {
        Self {
            loans,
            investments,
            queue,
        }
    }

    /// One sweep; returns the loans queued for completion
    pub async fn reconcile_once(&self) -> ServiceResult<Vec<i64>> {
        let approved = self
            .loans
            .list(&LoanFilter {
                status: Some(LoanStatus::Approved),
                page: Page::all(),
                ..Default::default()
            })
            .await?;

        let mut queued = Vec::new();
        for loan in approved {
            let committed = self
                .investments
                .amount_sum(&InvestmentFilter::active_for_loan(loan.id))
                .await?;
            if committed == loan.amount && self.queue.schedule(loan.id, Utc::now()) {
                queued.push(loan.id);
            }
        }

        if !queued.is_empty() {
            tracing::warn!(loans = ?queued, "Re-queued fully funded loans still approved");
        }
        Ok(queued)
    }

    /// Background job sweeping every `interval`
    pub async fn run(self, interval: Duration) {
        tracing::info!(interval_secs = interval.as_secs(), "Starting funding reconciler");

        loop {
            tokio::time::sleep(interval).await;

            if let Err(e) = self.reconcile_once().await {
                tracing::error!(error = %e, "Error reconciling funded loans");
            }
        }
    }
}
