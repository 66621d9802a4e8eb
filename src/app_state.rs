//! Application state: services wired to their collaborators

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::investment::{FundingQueue, FundingReconciler, FundingWorker, InvestmentService};
use crate::loan::{ActionExecutor, AgreementTemplate, LoanService};
use crate::lock::KeyedLock;
use crate::repository::{
    DocumentRenderer, InMemoryInvestmentRepository, InMemoryInvestorRepository,
    InMemoryLoanRepository, InMemoryNotifier, InMemoryUploadService, InvestmentRepository,
    InvestorRepository, LoanRepository, Notifier, TextDocumentRenderer, UploadService,
};

/// Implementations of every capability the core depends on
#[derive(Clone)]
pub struct Collaborators {
    pub loans: Arc<dyn LoanRepository>,
    pub investments: Arc<dyn InvestmentRepository>,
    pub investors: Arc<dyn InvestorRepository>,
    pub upload: Arc<dyn UploadService>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// In-process collaborators for development
    pub fn in_memory(config: &Config) -> Self {
        Self {
            loans: Arc::new(InMemoryLoanRepository::new()),
            investments: Arc::new(InMemoryInvestmentRepository::new()),
            investors: Arc::new(InMemoryInvestorRepository::new()),
            upload: Arc::new(InMemoryUploadService::new(config.upload_base_url.clone())),
            renderer: Arc::new(TextDocumentRenderer),
            notifier: Arc::new(InMemoryNotifier::new()),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub loan_service: Arc<LoanService>,
    pub investment_service: Arc<InvestmentService>,
    pub reconciler: FundingReconciler,
}

/// Handles of the background jobs started with the state
pub struct BackgroundTasks {
    pub funding_worker: JoinHandle<()>,
    pub funding_reconciler: JoinHandle<()>,
}

impl BackgroundTasks {
    pub fn shutdown(self) {
        self.funding_reconciler.abort();
        self.funding_worker.abort();
    }
}

impl AppState {
    /// Wire services and start the funding worker and reconciler
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: Config, collaborators: Collaborators) -> (Self, BackgroundTasks) {
        let executor = ActionExecutor::new(
            collaborators.loans.clone(),
            collaborators.investments.clone(),
            collaborators.investors.clone(),
            collaborators.upload.clone(),
            collaborators.renderer.clone(),
            collaborators.notifier.clone(),
            AgreementTemplate::new(&config.agreement),
        );
        let loan_service = LoanService::new(collaborators.loans.clone(), Arc::new(executor));

        let (queue, receiver) = FundingQueue::new(config.funding_queue_capacity);
        let investment_service = InvestmentService::new(
            collaborators.investments.clone(),
            collaborators.loans.clone(),
            KeyedLock::new(),
            queue.clone(),
        );
        let reconciler = FundingReconciler::new(
            collaborators.loans.clone(),
            collaborators.investments.clone(),
            queue,
        );

        let worker = FundingWorker::new(loan_service.clone(), receiver);
        let funding_worker = tokio::spawn(worker.run());

        let interval = config.funding_reconcile_interval();
        let funding_reconciler = tokio::spawn(reconciler.clone().run(interval));

        tracing::info!(
            environment = %config.environment,
            queue_capacity = config.funding_queue_capacity,
            "Loan service started"
        );

        let state = Self {
            config: Arc::new(config),
            loan_service: Arc::new(loan_service),
            investment_service: Arc::new(investment_service),
            reconciler,
        };
        (
            state,
            BackgroundTasks {
                funding_worker,
                funding_reconciler,
            },
        )
    }
}
