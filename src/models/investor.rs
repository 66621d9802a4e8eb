//! Investor model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Investor funding one or more loans
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Investor {
    pub id: i64,
    pub identification_number: String,
    pub name: String,
    pub email: String,
    pub status: i16,
    pub created_at: DateTime<Utc>,
}
