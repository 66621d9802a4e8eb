//! Loan Service Library
//!
//! Loan lifecycle state machine (proposed, approved, invested, disbursed) and the
//! coordinator that accumulates concurrent investments without exceeding a loan's
//! principal.

pub mod app_state;
pub mod config;
pub mod error;
pub mod investment;
pub mod loan;
pub mod lock;
pub mod models;
pub mod repository;
pub mod telemetry;

pub use app_state::{AppState, BackgroundTasks, Collaborators};
pub use error::{ErrorKind, ServiceError, ServiceResult};
