//! Core data models for the expense conversation engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Fixed set of currencies the bot records and converts between.
pub const SUPPORTED_CURRENCIES: &[&str] =
    &["USD", "EUR", "GBP", "TRY", "GEL", "RSD", "AMD", "RUB"];

/// Default base currency when a user has no explicit configuration.
pub const DEFAULT_BASE_CURRENCY: &str = "USD";

/// Category name substituted when a lookup finds no exact match.
pub const FALLBACK_CATEGORY: &str = "Other";

//
// ================= Category =================
//

/// Immutable category reference data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub category_id: Uuid,
    pub name: String,
}

//
// ================= Rate Snapshot =================
//

/// Currency-rate snapshot resolved for a (base currency, date) pair and
/// embedded into the expense record at commit time as conversion provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateSnapshot {
    pub base: String,
    pub rates: HashMap<String, f64>,
}

impl RateSnapshot {
    /// Snapshot with every supported currency mapped to zero. Returned when
    /// all rate providers fail so the flow can still commit the record with
    /// the amount recorded verbatim in its original currency.
    pub fn zero_filled(base: &str) -> Self {
        Self {
            base: base.to_string(),
            rates: SUPPORTED_CURRENCIES
                .iter()
                .map(|c| (c.to_string(), 0.0))
                .collect(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.rates.values().all(|r| *r == 0.0)
    }
}

//
// ================= Flow Tags =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStatus {
    Inserted,
    Updated,
}

/// Which single field an edit sub-flow is changing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EditAttribute {
    Date,
    Category,
    Amount,
    Comment,
}

/// Distinguishes a full new-entry traversal from a single-attribute edit
/// traversal through the same states. Edit flows apply exactly one field
/// change and self-terminate without advancing through downstream prompts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlowKind {
    NewEntry,
    Edit(EditAttribute),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateChoice {
    Today,
    Yesterday,
    Other,
}

//
// ================= Inbound Events =================
//

/// Typed inbound user actions driving the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DateChoice(DateChoice),
    TextInput(String),
    CategoryChoice(String),
    AmountText(String),
    CommentText(String),
    /// `attribute: None` opens the edit menu from a report view;
    /// `Some(attr)` picks the attribute to edit. `message_id` is the report
    /// message the button press arrived on, used to re-locate the record.
    EditRequest {
        attribute: Option<EditAttribute>,
        message_id: i64,
    },
    DeleteRequest {
        message_id: i64,
    },
    Confirm,
    Cancel,
}

//
// ================= Outbound Affordances =================
//

/// Data shape of the affordance attached to an outbound message. Rendering
/// is the transport's concern; the engine only decides the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Button rows sent inline with the message (callbacks).
    Inline(Vec<Vec<String>>),
    /// Suggestion rows replacing the user's input keyboard.
    Reply(Vec<Vec<String>>),
}

impl Keyboard {
    /// Lays `items` out into rows of at most `per_row` buttons.
    pub fn reply_rows(items: &[String], per_row: usize) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        let rows = items
            .chunks(per_row.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();
        Some(Keyboard::Reply(rows))
    }
}

impl fmt::Display for EditAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EditAttribute::Date => "date",
            EditAttribute::Category => "category",
            EditAttribute::Amount => "amount",
            EditAttribute::Comment => "comment",
        };
        write!(f, "{}", s)
    }
}
