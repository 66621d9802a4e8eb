//! Capability interfaces the loan core depends on
//!
//! Storage, file upload, document rendering and delivery live behind these traits.
//! The [`memory`] module provides in-process implementations for development and
//! tests.

use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::models::{
    FileUpload, Investment, InvestmentFilter, Investor, Loan, LoanFilter, Notification,
};

pub mod memory;

pub use memory::{
    InMemoryInvestmentRepository, InMemoryInvestorRepository, InMemoryLoanRepository,
    InMemoryNotifier, InMemoryUploadService, TextDocumentRenderer,
};

/// Loan persistence
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// Fails with NotFound when no loan has this ID
    async fn get_detail(&self, id: i64) -> ServiceResult<Loan>;

    async fn list(&self, filter: &LoanFilter) -> ServiceResult<Vec<Loan>>;

    /// Persist a new loan and return it with its assigned ID
    async fn create(&self, loan: Loan) -> ServiceResult<Loan>;

    async fn update(&self, loan: &Loan) -> ServiceResult<()>;
}

/// Investment persistence
#[async_trait]
pub trait InvestmentRepository: Send + Sync {
    async fn list(&self, filter: &InvestmentFilter) -> ServiceResult<Vec<Investment>>;

    /// Sum of `amount` over every investment matching the filter
    async fn amount_sum(&self, filter: &InvestmentFilter) -> ServiceResult<i64>;

    /// Persist a new investment and return it with its assigned ID
    async fn create(&self, investment: Investment) -> ServiceResult<Investment>;
}

/// Investor lookup
#[async_trait]
pub trait InvestorRepository: Send + Sync {
    async fn get_detail(&self, id: i64) -> ServiceResult<Investor>;
}

/// Stores an uploaded artifact and returns the URL it is reachable at
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn upload(&self, file: &FileUpload) -> ServiceResult<String>;
}

/// Renders the agreement document from its text content
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn generate(&self, content: &str) -> ServiceResult<Vec<u8>>;
}

/// Delivers a notification to its recipients
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> ServiceResult<()>;
}
