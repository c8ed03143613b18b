//! Expense Conversation Engine
//!
//! A personal-finance conversational assistant core:
//! - Collects dated monetary expenses over multi-step chat turns
//! - Converts amounts against a resolved exchange-rate snapshot
//! - Guarantees at-most-one persistence per logical entry
//! - Branches into single-attribute edit and delete sub-flows
//! - Degrades gracefully when external rate sources are unavailable
//!
//! FLOW:
//! DATE → CATEGORY → AMOUNT → COMMENT → COMMIT → REPORT

pub mod categories;
pub mod draft;
pub mod engine;
pub mod error;
pub mod messages;
pub mod models;
pub mod profile;
pub mod rates;
pub mod report;
pub mod session;
pub mod store;
pub mod transport;

pub use error::Result;

// Re-export common types
pub use draft::DraftExpense;
pub use engine::ExpenseFlowEngine;
pub use models::*;
pub use session::{ConversationState, FlowState};
