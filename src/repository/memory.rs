//! In-memory collaborators for development and testing.
//!
//! Not a persistence or delivery layer: rows live for the lifetime of the process.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use super::{
    DocumentRenderer, InvestmentRepository, InvestorRepository, LoanRepository, Notifier,
    UploadService,
};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    FileUpload, Investment, InvestmentFilter, Investor, Loan, LoanFilter, Notification, Page,
};

/// Rows keyed by ID plus the next ID to hand out
struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Newest first, then the requested page
fn paginate<T: Clone>(rows: impl DoubleEndedIterator<Item = T>, page: &Page) -> Vec<T> {
    let newest_first = rows.rev();
    match page.window() {
        Some((offset, limit)) => newest_first.skip(offset).take(limit).collect(),
        None => newest_first.collect(),
    }
}

/// In-memory loan storage
#[derive(Clone, Default)]
pub struct InMemoryLoanRepository {
    table: Arc<RwLock<Table<Loan>>>,
}

impl InMemoryLoanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoanRepository for InMemoryLoanRepository {
    async fn get_detail(&self, id: i64) -> ServiceResult<Loan> {
        let table = self.table.read().await;
        table
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("loan {} not found", id)))
    }

    async fn list(&self, filter: &LoanFilter) -> ServiceResult<Vec<Loan>> {
        let table = self.table.read().await;
        let matching = table.rows.values().filter(|loan| filter.matches(loan)).cloned();
        Ok(paginate(matching, &filter.page))
    }

    async fn create(&self, mut loan: Loan) -> ServiceResult<Loan> {
        let mut table = self.table.write().await;
        loan.id = table.allocate_id();
        table.rows.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn update(&self, loan: &Loan) -> ServiceResult<()> {
        let mut table = self.table.write().await;
        let row = table
            .rows
            .get_mut(&loan.id)
            .ok_or_else(|| ServiceError::not_found(format!("loan {} not found", loan.id)))?;

        if loan.status < row.status {
            return Err(ServiceError::internal(format!(
                "refusing to move loan {} back from {} to {}",
                loan.id, row.status, loan.status
            )));
        }

        // Principal, rate, borrower and creation fields are immutable.
        row.status = loan.status;
        row.approval_proof_url = loan.approval_proof_url.clone();
        row.agreement_letter_url = loan.agreement_letter_url.clone();
        row.approved_by = loan.approved_by;
        row.approved_at = loan.approved_at;
        row.invested_at = loan.invested_at;
        row.disbursed_by = loan.disbursed_by;
        row.disbursed_at = loan.disbursed_at;
        row.updated_at = Some(Utc::now());
        Ok(())
    }
}

/// In-memory investment storage
#[derive(Clone, Default)]
pub struct InMemoryInvestmentRepository {
    table: Arc<RwLock<Table<Investment>>>,
}

impl InMemoryInvestmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvestmentRepository for InMemoryInvestmentRepository {
    async fn list(&self, filter: &InvestmentFilter) -> ServiceResult<Vec<Investment>> {
        let table = self.table.read().await;
        let matching = table
            .rows
            .values()
            .filter(|investment| filter.matches(investment))
            .cloned();
        Ok(paginate(matching, &filter.page))
    }

    async fn amount_sum(&self, filter: &InvestmentFilter) -> ServiceResult<i64> {
        let table = self.table.read().await;
        table
            .rows
            .values()
            .filter(|investment| filter.matches(investment))
            .try_fold(0i64, |sum, investment| sum.checked_add(investment.amount))
            .ok_or_else(|| ServiceError::internal("investment amount sum overflowed"))
    }

    async fn create(&self, mut investment: Investment) -> ServiceResult<Investment> {
        let mut table = self.table.write().await;
        investment.id = table.allocate_id();
        table.rows.insert(investment.id, investment.clone());
        Ok(investment)
    }
}

/// In-memory investor directory
#[derive(Clone, Default)]
pub struct InMemoryInvestorRepository {
    investors: Arc<RwLock<HashMap<i64, Investor>>>,
}

impl InMemoryInvestorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, investor: Investor) {
        self.investors.write().await.insert(investor.id, investor);
    }
}

#[async_trait]
impl InvestorRepository for InMemoryInvestorRepository {
    async fn get_detail(&self, id: i64) -> ServiceResult<Investor> {
        self.investors
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("investor {} not found", id)))
    }
}

/// Keeps uploaded files in memory and hands out URLs under a base URL
#[derive(Clone)]
pub struct InMemoryUploadService {
    base_url: String,
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryUploadService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, file_name: &str) -> Option<Vec<u8>> {
        self.files.read().await.get(file_name).cloned()
    }
}

#[async_trait]
impl UploadService for InMemoryUploadService {
    async fn upload(&self, file: &FileUpload) -> ServiceResult<String> {
        if file.file_name.is_empty() {
            return Err(ServiceError::internal("upload is missing a file name"));
        }
        self.files
            .write()
            .await
            .insert(file.file_name.clone(), file.content.clone());
        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            file.file_name
        ))
    }
}

/// Renders documents as plain UTF-8 text
#[derive(Clone, Copy, Default)]
pub struct TextDocumentRenderer;

#[async_trait]
impl DocumentRenderer for TextDocumentRenderer {
    async fn generate(&self, content: &str) -> ServiceResult<Vec<u8>> {
        if content.trim().is_empty() {
            return Err(ServiceError::internal("cannot render an empty document"));
        }
        let mut rendered = content.trim_end().to_string();
        rendered.push('\n');
        Ok(rendered.into_bytes())
    }
}

/// Records every notification instead of delivering it
#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: &Notification) -> ServiceResult<()> {
        let recipient = notification.to.first().with_context(|| {
            format!("notification '{}' has no recipients", notification.subject)
        })?;
        tracing::info!(
            recipient = %recipient,
            recipients = notification.to.len(),
            subject = %notification.subject,
            "Notification recorded"
        );
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}
