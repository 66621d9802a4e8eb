//! Agreement letter and notification e-mail sent to investors once a loan is funded

use chrono::{DateTime, Utc};

use crate::config::AgreementConfig;
use crate::models::{Investment, Investor, Loan};

const DATE_FORMAT: &str = "%B %-d, %Y";

/// Renders the investor-facing documents for a funded loan
#[derive(Debug, Clone)]
pub struct AgreementTemplate {
    company_name: String,
    currency_symbol: String,
    file_name_template: String,
}

impl AgreementTemplate {
    pub fn new(config: &AgreementConfig) -> Self {
        Self {
            company_name: config.company_name.clone(),
            currency_symbol: config.currency_symbol.clone(),
            file_name_template: config.file_name_template.clone(),
        }
    }

    /// Text of the agreement letter, one line per row of the document
    pub fn letter(
        &self,
        investor: &Investor,
        investment: &Investment,
        loan: &Loan,
        today: DateTime<Utc>,
    ) -> String {
        let company = &self.company_name;
        [
            format!("Date: {}", today.format(DATE_FORMAT)),
            "Subject: Agreement Letter for Loan Investment".to_string(),
            "To:".to_string(),
            investor.name.clone(),
            String::new(),
            format!("Dear {},", investor.name),
            format!(
                "We are pleased to confirm your investment in the loan offered by {} to Loan ID {}. \
                 Below are the details of the investment:",
                company, loan.id
            ),
            String::new(),
            format!("- Loan ID: {}", loan.id),
            format!("- Principal Amount: {}", self.money(loan.amount as f64)),
            format!("- Initial Invested Amount: {}", self.money(investment.amount as f64)),
            format!("- Interest Rate: {}", percent(loan.rate)),
            format!("- Return on Investment (ROI): {}", percent(investment.roi)),
            format!("- Final Invested Amount: {}", self.money(investment.final_amount())),
            format!("- Investment Date: {}", investment.created_at.format(DATE_FORMAT)),
            String::new(),
            "Enclosed with this letter, please find the signed agreement letter. \
             Kindly review the attached document and retain it for your records."
                .to_string(),
            "Should you have any questions or require further information, \
             please do not hesitate to contact us."
                .to_string(),
            String::new(),
            format!("Thank you for your trust and investment in {}.", company),
            String::new(),
            "Best regards,".to_string(),
            "Admin".to_string(),
            company.clone(),
        ]
        .join("\n")
    }

    pub fn email_subject(&self, loan: &Loan) -> String {
        format!("Agreement Letter - Loan ID {}", loan.id)
    }

    pub fn email_body(&self, investor: &Investor, investment: &Investment, loan: &Loan) -> String {
        format!(
            "Dear {},\n\n\
             Attached is the agreement letter for your recent investment in Loan {}. \
             Please review and keep this document for your records.\n\n\
             Below is the detail of your investment:\n\
             - Investment Date: {}\n\
             - Initial Investment Amount: {}\n\
             - ROI: {}\n\
             - Final Investment Amount: {}\n\n\
             Thank you for your trust in us.",
            investor.name,
            loan.id,
            investment.created_at.format(DATE_FORMAT),
            self.money(investment.amount as f64),
            percent(investment.roi),
            self.money(investment.final_amount()),
        )
    }

    /// Attachment name, with `{investor}` replaced by the investor's name
    pub fn file_name(&self, investor: &Investor) -> String {
        self.file_name_template.replace("{investor}", &investor.name)
    }

    fn money(&self, amount: f64) -> String {
        format!("{}{}", self.currency_symbol, format_amount(amount))
    }
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Thousands-separated amount with two decimals, e.g. `1,200,000.00`
pub fn format_amount(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}{}.{:02}", sign, grouped, cents % 100)
}
