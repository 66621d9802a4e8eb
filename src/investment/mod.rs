//! Investment domain module
//!
//! Contains the commitment coordinator and the funding-completion pipeline.

pub mod funding;
mod service;

pub use funding::{FundingQueue, FundingReconciler, FundingRequest, FundingWorker};
pub use service::InvestmentService;
