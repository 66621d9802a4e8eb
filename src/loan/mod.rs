//! Loan lifecycle domain module
//!
//! Contains the state table, the transition executor and the service driving it.

pub mod agreement;
pub mod executor;
mod service;
pub mod state;

pub use agreement::AgreementTemplate;
pub use executor::{ActionExecutor, LoanActions};
pub use service::LoanService;
