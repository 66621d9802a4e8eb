//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use loan_service::config::Config;
use loan_service::models::{
    ActorFields, CreateLoanRequest, FileAttachment, Investor, Loan, LoanAction, LoanStatus,
    Notification, ProceedLoan,
};
use loan_service::repository::{
    InMemoryInvestmentRepository, InMemoryInvestorRepository, InMemoryLoanRepository,
    InMemoryNotifier, InMemoryUploadService, Notifier, TextDocumentRenderer,
};
use loan_service::{AppState, BackgroundTasks, Collaborators};

pub const WAIT: Duration = Duration::from_secs(5);

pub struct Harness {
    pub state: AppState,
    pub tasks: BackgroundTasks,
    pub loans: Arc<InMemoryLoanRepository>,
    pub investments: Arc<InMemoryInvestmentRepository>,
    pub investors: Arc<InMemoryInvestorRepository>,
    pub upload: Arc<InMemoryUploadService>,
    pub notifier: Arc<InMemoryNotifier>,
}

/// Route service logs through the test harness so they only show for failing tests
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("loan_service=debug"))
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> Config {
    Config {
        funding_reconcile_interval_secs: 3600,
        ..Config::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_collaborators(|_| {})
    }

    /// Deliver through `delivery` while still exposing a recording notifier
    pub fn with_notifier(delivery: Arc<dyn Notifier>, recorder: Arc<InMemoryNotifier>) -> Self {
        Self::build(recorder, move |collaborators| collaborators.notifier = delivery)
    }

    /// Start over in-memory collaborators after `configure` swaps or wraps any of them
    pub fn with_collaborators(configure: impl FnOnce(&mut Collaborators)) -> Self {
        Self::build(Arc::new(InMemoryNotifier::new()), configure)
    }

    fn build(
        recorder: Arc<InMemoryNotifier>,
        configure: impl FnOnce(&mut Collaborators),
    ) -> Self {
        init_test_tracing();

        let config = test_config();
        let loans = Arc::new(InMemoryLoanRepository::new());
        let investments = Arc::new(InMemoryInvestmentRepository::new());
        let investors = Arc::new(InMemoryInvestorRepository::new());
        let upload = Arc::new(InMemoryUploadService::new(config.upload_base_url.clone()));

        let mut collaborators = Collaborators {
            loans: loans.clone(),
            investments: investments.clone(),
            investors: investors.clone(),
            upload: upload.clone(),
            renderer: Arc::new(TextDocumentRenderer),
            notifier: recorder.clone(),
        };
        configure(&mut collaborators);
        let (state, tasks) = AppState::start(config, collaborators);

        Self {
            state,
            tasks,
            loans,
            investments,
            investors,
            upload,
            notifier: recorder,
        }
    }

    pub async fn add_investor(&self, id: i64, name: &str) -> Investor {
        let investor = Investor {
            id,
            identification_number: format!("ID-{:06}", id),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            status: 1,
            created_at: Utc::now(),
        };
        self.investors.insert(investor.clone()).await;
        investor
    }

    pub async fn proposed_loan(&self, amount: i64, rate: f64) -> Loan {
        self.state
            .loan_service
            .create(CreateLoanRequest {
                borrower_id: 1,
                amount,
                rate,
                created_by: Some(100),
            })
            .await
            .expect("loan should be created")
    }

    pub async fn approved_loan(&self, amount: i64, rate: f64) -> Loan {
        let loan = self.proposed_loan(amount, rate).await;
        self.state
            .loan_service
            .proceed(approve(loan.id, FileAttachment::new(vec![0xFF, 0xD8], ".jpg")))
            .await
            .expect("loan should be approved")
    }

    pub async fn status_of(&self, loan_id: i64) -> LoanStatus {
        self.state.loan_service.get(loan_id).await.unwrap().status
    }

    /// Poll until the loan reaches `status` or the wait runs out
    pub async fn wait_for_status(&self, loan_id: i64, status: LoanStatus) -> Loan {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let loan = self.state.loan_service.get(loan_id).await.unwrap();
            if loan.status == status || tokio::time::Instant::now() >= deadline {
                return loan;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until at least `count` notifications were recorded or the wait runs out
    pub async fn wait_for_notifications(&self, count: usize) -> Vec<Notification> {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let sent = self.notifier.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub fn approve(loan_id: i64, proof: FileAttachment) -> ProceedLoan {
    ProceedLoan {
        loan_id,
        action: LoanAction::Approve,
        actor: ActorFields {
            approved_by: Some(7),
            approved_at: Some(Utc::now()),
            ..Default::default()
        },
        attachment: Some(proof),
    }
}

pub fn disburse(loan_id: i64, letter: FileAttachment) -> ProceedLoan {
    ProceedLoan {
        loan_id,
        action: LoanAction::Disburse,
        actor: ActorFields {
            disbursed_by: Some(8),
            disbursed_at: Some(Utc::now()),
            ..Default::default()
        },
        attachment: Some(letter),
    }
}

pub fn invest(loan_id: i64) -> ProceedLoan {
    ProceedLoan {
        loan_id,
        action: LoanAction::Invest,
        actor: ActorFields {
            invested_at: Some(Utc::now()),
            ..Default::default()
        },
        attachment: None,
    }
}

pub fn pdf() -> FileAttachment {
    FileAttachment::new(b"%PDF-1.4".to_vec(), ".pdf")
}
