//! Data models for loans, investments and the payloads exchanged with collaborators

mod investment;
mod investor;
mod loan;
mod notification;

pub use investment::*;
pub use investor::*;
pub use loan::*;
pub use notification::*;
