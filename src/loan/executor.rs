//! Side effects of each legal loan transition

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;

use crate::error::{ServiceError, ServiceResult};
use crate::loan::agreement::AgreementTemplate;
use crate::models::{
    FileAttachment, FileUpload, Investment, InvestmentFilter, Loan, LoanProceedRequest,
    LoanStatus, NamedFile, Notification,
};
use crate::repository::{
    DocumentRenderer, InvestmentRepository, InvestorRepository, LoanRepository, Notifier,
    UploadService,
};

const APPROVAL_PROOF_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];
const AGREEMENT_LETTER_EXTENSIONS: &[&str] = &[".pdf"];

/// The three lifecycle transitions, reached only through the state table
#[async_trait]
pub trait LoanActions: Send + Sync {
    /// Proposed -> Approved
    async fn approve(&self, request: LoanProceedRequest) -> ServiceResult<Loan>;

    /// Approved -> Invested, once commitments add up to the principal
    async fn invest(&self, request: LoanProceedRequest) -> ServiceResult<Loan>;

    /// Invested -> Disbursed
    async fn disburse(&self, request: LoanProceedRequest) -> ServiceResult<Loan>;
}

/// Executes loan transitions against the configured collaborators
#[derive(Clone)]
pub struct ActionExecutor {
    loans: Arc<dyn LoanRepository>,
    investments: Arc<dyn InvestmentRepository>,
    investors: Arc<dyn InvestorRepository>,
    upload: Arc<dyn UploadService>,
    renderer: Arc<dyn DocumentRenderer>,
    notifier: Arc<dyn Notifier>,
    template: AgreementTemplate,
}

impl ActionExecutor {
    pub fn new(
        loans: Arc<dyn LoanRepository>,
        investments: Arc<dyn InvestmentRepository>,
        investors: Arc<dyn InvestorRepository>,
        upload: Arc<dyn UploadService>,
        renderer: Arc<dyn DocumentRenderer>,
        notifier: Arc<dyn Notifier>,
        template: AgreementTemplate,
    ) -> Self {
        Self {
            loans,
            investments,
            investors,
            upload,
            renderer,
            notifier,
            template,
        }
    }

    /// Validate an attachment and upload it as `{prefix}_{loan_id}{ext}`
    async fn upload_artifact(
        &self,
        loan_id: i64,
        attachment: Option<FileAttachment>,
        prefix: &str,
        label: &str,
        allowed: &[&str],
    ) -> ServiceResult<String> {
        let file = match attachment {
            Some(file) if !file.is_empty() => file,
            _ => return Err(ServiceError::invalid(format!("invalid {} file", label))),
        };
        if !file.has_extension(allowed) {
            return Err(ServiceError::invalid(format!(
                "invalid {} file extension",
                label
            )));
        }

        let file_name = format!("{}_{}{}", prefix, loan_id, file.extension);
        self.upload
            .upload(&FileUpload {
                content: file.content,
                extension: file.extension,
                file_name,
            })
            .await
    }

    /// Send every investor their agreement letter without waiting on delivery
    fn notify_investors(&self, investments: Vec<Investment>, loan: Loan) {
        let loan = Arc::new(loan);
        let deliveries: Vec<_> = investments
            .into_iter()
            .map(|investment| {
                let executor = self.clone();
                let loan = loan.clone();
                tokio::spawn(async move {
                    match executor.notify_investor(&investment, &loan).await {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::error!(
                                loan_id = loan.id,
                                investor_id = investment.investor_id,
                                error = %e,
                                "Failed to notify investor"
                            );
                            false
                        }
                    }
                })
            })
            .collect();

        let loan_id = loan.id;
        let total = deliveries.len();
        tokio::spawn(async move {
            let delivered = join_all(deliveries)
                .await
                .into_iter()
                .filter(|outcome| matches!(outcome, Ok(true)))
                .count();
            tracing::info!(loan_id, delivered, total, "Investor notifications finished");
        });
    }

    async fn notify_investor(&self, investment: &Investment, loan: &Loan) -> ServiceResult<()> {
        let investor = self.investors.get_detail(investment.investor_id).await?;

        let letter = self.template.letter(&investor, investment, loan, Utc::now());
        let document = self.renderer.generate(&letter).await?;

        self.notifier
            .notify(&Notification {
                to: vec![investor.email.clone()],
                subject: self.template.email_subject(loan),
                body: self.template.email_body(&investor, investment, loan),
                attachment: Some(NamedFile {
                    content: document,
                    file_name: self.template.file_name(&investor),
                }),
            })
            .await
    }
}

#[async_trait]
impl LoanActions for ActionExecutor {
    async fn approve(&self, request: LoanProceedRequest) -> ServiceResult<Loan> {
        let LoanProceedRequest {
            mut data,
            attachment,
            ..
        } = request;

        if data.approved_at.is_none() {
            return Err(ServiceError::invalid("invalid approval timestamp"));
        }
        if !data.approved_by.is_some_and(|id| id > 0) {
            return Err(ServiceError::invalid("invalid approver ID"));
        }

        let url = self
            .upload_artifact(
                data.id,
                attachment,
                "approval_proof",
                "approval proof",
                APPROVAL_PROOF_EXTENSIONS,
            )
            .await?;
        data.approval_proof_url = Some(url);
        data.status = LoanStatus::Approved;

        self.loans.update(&data).await?;
        tracing::info!(loan_id = data.id, approved_by = ?data.approved_by, "Loan approved");

        Ok(data)
    }

    async fn invest(&self, request: LoanProceedRequest) -> ServiceResult<Loan> {
        let mut data = request.data;

        if data.invested_at.is_none() {
            return Err(ServiceError::invalid("invalid invested timestamp"));
        }

        // Guards against a stale trigger: the persisted sum must match exactly.
        let active = InvestmentFilter::active_for_loan(data.id);
        let invested = self.investments.amount_sum(&active).await?;
        if invested != data.amount {
            return Err(ServiceError::invalid(
                "investment sum doesn't equal the loan's principal amount",
            ));
        }

        data.status = LoanStatus::Invested;
        self.loans.update(&data).await?;
        tracing::info!(loan_id = data.id, amount = data.amount, "Loan fully invested");

        match self.investments.list(&active).await {
            Ok(investments) => self.notify_investors(investments, data.clone()),
            Err(e) => {
                tracing::error!(
                    loan_id = data.id,
                    error = %e,
                    "Failed to load investments for agreement letters"
                );
            }
        }

        Ok(data)
    }

    async fn disburse(&self, request: LoanProceedRequest) -> ServiceResult<Loan> {
        let LoanProceedRequest {
            mut data,
            attachment,
            ..
        } = request;

        if data.disbursed_at.is_none() {
            return Err(ServiceError::invalid("invalid disbursement timestamp"));
        }
        if !data.disbursed_by.is_some_and(|id| id > 0) {
            return Err(ServiceError::invalid("invalid disburser ID"));
        }

        let url = self
            .upload_artifact(
                data.id,
                attachment,
                "agreement_letter",
                "agreement letter",
                AGREEMENT_LETTER_EXTENSIONS,
            )
            .await?;
        data.agreement_letter_url = Some(url);
        data.status = LoanStatus::Disbursed;

        self.loans.update(&data).await?;
        tracing::info!(loan_id = data.id, disbursed_by = ?data.disbursed_by, "Loan disbursed");

        Ok(data)
    }
}
