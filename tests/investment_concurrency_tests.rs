//! Concurrent commitments, funding completion and investor notification

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use common::Harness;
use loan_service::models::{
    CreateInvestmentRequest, Investment, InvestmentFilter, InvestmentStatus, LoanStatus,
    Notification,
};
use loan_service::repository::{InMemoryNotifier, InvestmentRepository, Notifier};
use loan_service::{ErrorKind, ServiceError, ServiceResult};

fn commitment(investor_id: i64, loan_id: i64, amount: i64) -> CreateInvestmentRequest {
    CreateInvestmentRequest {
        investor_id,
        loan_id,
        amount,
    }
}

/// Refuses delivery to one address and records the rest
struct FlakyNotifier {
    failing: String,
    recorder: Arc<InMemoryNotifier>,
}

#[async_trait]
impl Notifier for FlakyNotifier {
    async fn notify(&self, notification: &Notification) -> ServiceResult<()> {
        if notification.to.contains(&self.failing) {
            return Err(ServiceError::internal("smtp unavailable"));
        }
        self.recorder.notify(notification).await
    }
}

// ============================================================================
// Capacity under contention
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_commitments_never_overfund() {
    let harness = Harness::new();
    harness.add_investor(1, "Ana").await;
    harness.add_investor(2, "Budi").await;
    let loan = harness.approved_loan(1_200_000, 10.0).await;
    let loan_id = loan.id;

    let first = {
        let service = harness.state.investment_service.clone();
        tokio::spawn(async move {
            service
                .create_commitment(commitment(1, loan_id, 700_000))
                .await
        })
    };
    let second = {
        let service = harness.state.investment_service.clone();
        tokio::spawn(async move {
            service
                .create_commitment(commitment(2, loan_id, 700_000))
                .await
        })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);

    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(rejected.kind(), ErrorKind::Invalid);
    assert_eq!(
        rejected.to_string(),
        "investment amount exceeds remaining principal amount"
    );

    let committed = harness
        .investments
        .amount_sum(&InvestmentFilter::active_for_loan(loan.id))
        .await
        .unwrap();
    assert_eq!(committed, 700_000);
    assert_eq!(harness.status_of(loan.id).await, LoanStatus::Approved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_small_commitments_fill_exactly_once() {
    let harness = Harness::new();
    for id in 1..=20 {
        harness.add_investor(id, &format!("Investor{}", id)).await;
    }
    let loan = harness.approved_loan(1_000, 8.0).await;
    let loan_id = loan.id;

    let handles: Vec<_> = (1..=20)
        .map(|investor_id| {
            let service = harness.state.investment_service.clone();
            tokio::spawn(async move {
                service
                    .create_commitment(commitment(investor_id, loan_id, 100))
                    .await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Invalid),
        }
    }

    // Ten fill the principal; anything after the loan turns Invested is rejected too.
    assert_eq!(accepted, 10);
    let loan = harness.wait_for_status(loan_id, LoanStatus::Invested).await;
    assert_eq!(loan.status, LoanStatus::Invested);

    let sent = harness.wait_for_notifications(10).await;
    assert_eq!(sent.len(), 10);
}

// ============================================================================
// Funding completion
// ============================================================================

#[tokio::test]
async fn test_completing_commitment_invests_loan_and_notifies_each_investor() {
    let harness = Harness::new();
    harness.add_investor(1, "Ana").await;
    harness.add_investor(2, "Budi").await;
    let loan = harness.approved_loan(1_200_000, 10.0).await;

    let partial = harness
        .state
        .investment_service
        .create_commitment(commitment(1, loan.id, 500_000))
        .await
        .unwrap();
    assert_eq!(partial.status, InvestmentStatus::Active);
    assert_eq!(harness.status_of(loan.id).await, LoanStatus::Approved);

    harness
        .state
        .investment_service
        .create_commitment(commitment(2, loan.id, 700_000))
        .await
        .unwrap();

    let invested = harness.wait_for_status(loan.id, LoanStatus::Invested).await;
    assert_eq!(invested.status, LoanStatus::Invested);
    assert!(invested.invested_at.is_some());

    let mut sent = harness.wait_for_notifications(2).await;
    sent.sort_by(|a, b| a.to.cmp(&b.to));
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, vec!["ana@example.com".to_string()]);
    assert_eq!(sent[1].to, vec!["budi@example.com".to_string()]);

    for notification in &sent {
        assert_eq!(
            notification.subject,
            format!("Agreement Letter - Loan ID {}", loan.id)
        );
        let attachment = notification.attachment.as_ref().unwrap();
        assert!(!attachment.content.is_empty());
        assert!(attachment.file_name.ends_with(".pdf"));
    }
    let ana_letter = String::from_utf8_lossy(&sent[0].attachment.as_ref().unwrap().content)
        .to_string();
    assert!(ana_letter.contains("500,000.00"));

    // No second round of letters.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.notifier.sent().await.len(), 2);
}

#[tokio::test]
async fn test_commitment_copies_loan_rate_as_roi() {
    let harness = Harness::new();
    let loan = harness.approved_loan(1_000_000, 12.5).await;

    let investment = harness
        .state
        .investment_service
        .create_commitment(commitment(1, loan.id, 400_000))
        .await
        .unwrap();

    assert!(investment.id > 0);
    assert_eq!(investment.roi, 12.5);
    assert_eq!(investment.final_amount(), 450_000.0);

    let listed = harness
        .state
        .investment_service
        .list(&InvestmentFilter {
            loan_id: Some(loan.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed, vec![investment]);
}

#[tokio::test]
async fn test_failed_delivery_does_not_block_others_or_roll_back() {
    let recorder = Arc::new(InMemoryNotifier::new());
    let harness = Harness::with_notifier(
        Arc::new(FlakyNotifier {
            failing: "ana@example.com".to_string(),
            recorder: recorder.clone(),
        }),
        recorder,
    );
    harness.add_investor(1, "Ana").await;
    harness.add_investor(2, "Budi").await;
    // Investor 3 has no record, so their letter cannot be addressed.
    harness.add_investor(4, "Citra").await;
    let loan = harness.approved_loan(900, 6.0).await;

    for investor_id in [1, 2, 3, 4] {
        harness
            .state
            .investment_service
            .create_commitment(commitment(investor_id, loan.id, 225))
            .await
            .unwrap();
    }

    let invested = harness.wait_for_status(loan.id, LoanStatus::Invested).await;
    assert_eq!(invested.status, LoanStatus::Invested);

    let sent = harness.wait_for_notifications(2).await;
    let mut recipients: Vec<_> = sent.iter().flat_map(|n| n.to.clone()).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["budi@example.com", "citra@example.com"]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.status_of(loan.id).await, LoanStatus::Invested);
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn test_commitment_requires_approved_loan() {
    let harness = Harness::new();
    let loan = harness.proposed_loan(1_000, 5.0).await;

    let err = harness
        .state
        .investment_service
        .create_commitment(commitment(1, loan.id, 100))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "loan status must be approved");
}

#[tokio::test]
async fn test_commitment_on_invested_loan_is_rejected() {
    let harness = Harness::new();
    harness.add_investor(1, "Ana").await;
    let loan = harness.approved_loan(1_000, 5.0).await;
    harness
        .state
        .investment_service
        .create_commitment(commitment(1, loan.id, 1_000))
        .await
        .unwrap();
    harness.wait_for_status(loan.id, LoanStatus::Invested).await;

    let err = harness
        .state
        .investment_service
        .create_commitment(commitment(1, loan.id, 1))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "loan status must be approved");
}

#[tokio::test]
async fn test_invalid_commitment_request() {
    let harness = Harness::new();
    let loan = harness.approved_loan(1_000, 5.0).await;

    for request in [
        commitment(0, loan.id, 100),
        commitment(1, 0, 100),
        commitment(1, loan.id, 0),
        commitment(1, loan.id, -5),
    ] {
        let err = harness
            .state
            .investment_service
            .create_commitment(request)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid parameter values");
    }
}

#[tokio::test]
async fn test_oversized_commitment_cannot_wrap_past_principal() {
    let harness = Harness::new();
    let loan = harness.approved_loan(1_000, 5.0).await;
    harness
        .state
        .investment_service
        .create_commitment(commitment(1, loan.id, 500))
        .await
        .unwrap();

    for amount in [i64::MAX, i64::MAX - 499, 501] {
        let err = harness
            .state
            .investment_service
            .create_commitment(commitment(2, loan.id, amount))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(
            err.to_string(),
            "investment amount exceeds remaining principal amount"
        );
    }

    let committed = harness
        .investments
        .amount_sum(&InvestmentFilter::active_for_loan(loan.id))
        .await
        .unwrap();
    assert_eq!(committed, 500);
    assert_eq!(harness.status_of(loan.id).await, LoanStatus::Approved);
}

#[tokio::test]
async fn test_commitment_on_unknown_loan_is_not_found() {
    let harness = Harness::new();
    let err = harness
        .state
        .investment_service
        .create_commitment(commitment(1, 42, 100))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_inactive_investments_do_not_count() {
    let harness = Harness::new();
    let loan = harness.approved_loan(1_000, 5.0).await;
    harness
        .investments
        .create(Investment {
            id: 0,
            investor_id: 9,
            loan_id: loan.id,
            amount: 800,
            roi: 5.0,
            status: InvestmentStatus::Inactive,
            created_at: Utc::now(),
            updated_at: None,
        })
        .await
        .unwrap();

    // Would exceed the principal if the withdrawn 800 still counted.
    harness
        .state
        .investment_service
        .create_commitment(commitment(1, loan.id, 700))
        .await
        .unwrap();
    assert_eq!(harness.status_of(loan.id).await, LoanStatus::Approved);
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_reconciler_completes_loan_left_approved() {
    let harness = Harness::new();
    harness.add_investor(1, "Ana").await;
    let funded = harness.approved_loan(1_000, 5.0).await;
    let partial = harness.approved_loan(2_000, 5.0).await;

    // Written straight to storage, so nothing queued the completion.
    for (loan_id, amount) in [(funded.id, 1_000), (partial.id, 500)] {
        harness
            .investments
            .create(Investment {
                id: 0,
                investor_id: 1,
                loan_id,
                amount,
                roi: 5.0,
                status: InvestmentStatus::Active,
                created_at: Utc::now(),
                updated_at: None,
            })
            .await
            .unwrap();
    }
    assert_eq!(harness.status_of(funded.id).await, LoanStatus::Approved);

    let queued = harness.state.reconciler.reconcile_once().await.unwrap();
    assert_eq!(queued, vec![funded.id]);

    let loan = harness.wait_for_status(funded.id, LoanStatus::Invested).await;
    assert_eq!(loan.status, LoanStatus::Invested);
    assert_eq!(harness.status_of(partial.id).await, LoanStatus::Approved);

    // Nothing left to do on the next sweep.
    let queued = harness.state.reconciler.reconcile_once().await.unwrap();
    assert!(queued.is_empty());
}
