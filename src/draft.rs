//! Draft expense aggregate
//!
//! The unit of work for one conversation: accumulated field-by-field across
//! turns, validated and normalized on assignment, persisted at most once per
//! logical entry. Edits re-commit the same identifier.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExpenseError;
use crate::messages::{ERROR_DATE_FORMAT, ERROR_DATE_TIMELINESS, ERROR_EXPENSE_AMOUNT_FORMAT};
use crate::models::{RateSnapshot, SUPPORTED_CURRENCIES};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftExpense {
    /// Assigned once at creation; never re-generated on edit.
    pub expense_id: Uuid,
    pub user_id: Option<i64>,
    pub category_id: Option<Uuid>,
    pub spent_on: Option<NaiveDate>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub rate_snapshot: Option<RateSnapshot>,
    pub comment: Option<String>,
    /// Stamped at the moment of first successful commit.
    pub created_at: Option<DateTime<Utc>>,
    /// Transport message that rendered this draft's report; the lookup key
    /// for resuming edit/delete flows.
    pub associated_message_id: Option<i64>,
}

impl DraftExpense {
    pub fn new() -> Self {
        Self {
            expense_id: Uuid::new_v4(),
            user_id: None,
            category_id: None,
            spent_on: None,
            amount: None,
            currency: None,
            rate_snapshot: None,
            comment: None,
            created_at: None,
            associated_message_id: None,
        }
    }

    pub fn for_user(user_id: i64) -> Result<Self> {
        let mut draft = Self::new();
        draft.set_user_id(user_id)?;
        Ok(draft)
    }

    /// `user_id` is immutable once set.
    pub fn set_user_id(&mut self, user_id: i64) -> Result<()> {
        if user_id <= 0 {
            return Err(ExpenseError::Validation(
                "user_id must be a positive integer".to_string(),
            ));
        }
        if let Some(existing) = self.user_id {
            if existing != user_id {
                return Err(ExpenseError::Internal(format!(
                    "user_id already set to {}, refusing to reassign to {}",
                    existing, user_id
                )));
            }
            return Ok(());
        }
        self.user_id = Some(user_id);
        Ok(())
    }

    /// Parses a user-supplied calendar date. The string must be a strict
    /// ISO-8601 date (`2023-10-13`) and must not lie after `today`. A string
    /// failing both checks reports both error messages concatenated.
    pub fn set_spent_on_str(&mut self, input: &str, today: NaiveDate) -> Result<()> {
        let input = input.trim();
        let mut errors = String::new();

        let strict = is_strict_iso_date(input);
        if !strict {
            errors.push_str(ERROR_DATE_FORMAT);
        }

        // A lenient parse still lets us flag future dates on sloppy input
        // like "2030-1-5" so the user sees every problem at once.
        let parsed = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok();
        match parsed {
            Some(date) if date > today => errors.push_str(ERROR_DATE_TIMELINESS),
            Some(date) => {
                if errors.is_empty() {
                    self.assign_spent_on(date);
                    return Ok(());
                }
            }
            None => {}
        }

        Err(ExpenseError::Validation(errors))
    }

    pub fn set_spent_on(&mut self, date: NaiveDate, today: NaiveDate) -> Result<()> {
        if date > today {
            return Err(ExpenseError::Validation(ERROR_DATE_TIMELINESS.to_string()));
        }
        self.assign_spent_on(date);
        Ok(())
    }

    /// A snapshot is keyed by (currency, date): moving the date invalidates
    /// whatever was resolved for the old date.
    fn assign_spent_on(&mut self, date: NaiveDate) {
        if self.spent_on != Some(date) {
            self.rate_snapshot = None;
        }
        self.spent_on = Some(date);
    }

    /// Amount must be strictly positive.
    pub fn set_amount(&mut self, amount: f64) -> Result<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ExpenseError::Validation(
                ERROR_EXPENSE_AMOUNT_FORMAT.to_string(),
            ));
        }
        self.amount = Some(amount);
        Ok(())
    }

    /// Currency must be a code from the supported set.
    pub fn set_currency(&mut self, currency: &str) -> Result<()> {
        let code = currency.to_uppercase();
        if !SUPPORTED_CURRENCIES.contains(&code.as_str()) {
            return Err(ExpenseError::Validation(
                ERROR_EXPENSE_AMOUNT_FORMAT.to_string(),
            ));
        }
        self.currency = Some(code);
        Ok(())
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = Some(comment.to_string());
    }

    /// The (currency, date) pair a rate snapshot is still needed for, or
    /// `None` when the held snapshot already matches. Keeps a single turn
    /// from resolving the same pair twice.
    pub fn pending_rate_lookup(&self) -> Option<(String, NaiveDate)> {
        let currency = self.currency.as_deref()?;
        let date = self.spent_on?;
        match &self.rate_snapshot {
            Some(snapshot) if snapshot.base == currency => None,
            _ => Some((currency.to_string(), date)),
        }
    }

    /// A draft is commit-ready only when every field except
    /// `associated_message_id` is populated. The state machine must not
    /// attempt persistence otherwise.
    pub fn is_commit_ready(&self) -> bool {
        self.user_id.is_some()
            && self.category_id.is_some()
            && self.spent_on.is_some()
            && self.amount.is_some()
            && self.currency.is_some()
            && self.rate_snapshot.is_some()
            && self.comment.is_some()
            && self.created_at.is_some()
    }
}

impl Default for DraftExpense {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits an amount input into a positive number and an optional trailing
/// currency code from the supported set. `"12.50"` → `(12.5, None)`,
/// `"10 EUR"` → `(10.0, Some("EUR"))`. Anything else is a validation error.
pub fn parse_amount_input(input: &str) -> Result<(f64, Option<String>)> {
    let parts: Vec<&str> = input.split_whitespace().collect();

    let reject = || ExpenseError::Validation(ERROR_EXPENSE_AMOUNT_FORMAT.to_string());

    let (amount_str, currency) = match parts.as_slice() {
        [amount] => (*amount, None),
        [amount, code] => {
            let code = code.to_uppercase();
            if !SUPPORTED_CURRENCIES.contains(&code.as_str()) {
                return Err(reject());
            }
            (*amount, Some(code))
        }
        _ => return Err(reject()),
    };

    let amount: f64 = amount_str.parse().map_err(|_| reject())?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(reject());
    }

    Ok((amount, currency))
}

/// Strict `YYYY-MM-DD` shape check: ten characters, zero-padded components.
fn is_strict_iso_date(input: &str) -> bool {
    let bytes = input.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    digits_ok && NaiveDate::parse_from_str(input, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_valid_iso_date_accepted() {
        let mut draft = DraftExpense::new();
        draft.set_spent_on_str("2024-06-14", today()).unwrap();
        assert_eq!(draft.spent_on, Some(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()));
    }

    #[test]
    fn test_future_date_rejected() {
        let mut draft = DraftExpense::new();
        let tomorrow = today() + Duration::days(1);
        let err = draft
            .set_spent_on_str(&tomorrow.format("%Y-%m-%d").to_string(), today())
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("future"));
        // accumulated state untouched
        assert!(draft.spent_on.is_none());
    }

    #[test]
    fn test_bad_format_rejected() {
        let mut draft = DraftExpense::new();
        let err = draft.set_spent_on_str("14.06.2024", today()).unwrap_err();
        assert!(err.to_string().contains("Wrong date format"));
    }

    #[test]
    fn test_bad_format_and_future_reports_both() {
        let mut draft = DraftExpense::new();
        // Non-padded month fails the strict shape check but still parses as
        // a future date, so both messages must be reported.
        let err = draft.set_spent_on_str("2030-1-5", today()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Wrong date format"));
        assert!(msg.contains("future"));
    }

    #[test]
    fn test_today_is_not_future() {
        let mut draft = DraftExpense::new();
        draft
            .set_spent_on_str(&today().format("%Y-%m-%d").to_string(), today())
            .unwrap();
        assert_eq!(draft.spent_on, Some(today()));
    }

    #[test]
    fn test_parse_amount_plain() {
        assert_eq!(parse_amount_input("12.50").unwrap(), (12.5, None));
        assert_eq!(parse_amount_input("100").unwrap(), (100.0, None));
    }

    #[test]
    fn test_parse_amount_with_currency() {
        assert_eq!(
            parse_amount_input("10 eur").unwrap(),
            (10.0, Some("EUR".to_string()))
        );
        assert_eq!(
            parse_amount_input("20 EUR").unwrap(),
            (20.0, Some("EUR".to_string()))
        );
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        assert!(parse_amount_input("-5").is_err());
        assert!(parse_amount_input("0").is_err());
        assert!(parse_amount_input("ten").is_err());
        assert!(parse_amount_input("10 DOGE").is_err());
        assert!(parse_amount_input("10 EUR extra").is_err());
        assert!(parse_amount_input("").is_err());
    }

    #[test]
    fn test_user_id_immutable_once_set() {
        let mut draft = DraftExpense::for_user(42).unwrap();
        assert!(draft.set_user_id(42).is_ok());
        assert!(draft.set_user_id(43).is_err());
        assert!(DraftExpense::new().set_user_id(-1).is_err());
    }

    #[test]
    fn test_commit_readiness() {
        let mut draft = DraftExpense::for_user(1).unwrap();
        assert!(!draft.is_commit_ready());

        draft.category_id = Some(Uuid::new_v4());
        draft.set_spent_on_str("2024-06-14", today()).unwrap();
        draft.set_amount(12.5).unwrap();
        draft.set_currency("USD").unwrap();
        draft.rate_snapshot = Some(RateSnapshot::zero_filled("USD"));
        draft.set_comment("Lunch");
        assert!(!draft.is_commit_ready());

        draft.created_at = Some(Utc::now());
        assert!(draft.is_commit_ready());
    }

    #[test]
    fn test_pending_rate_lookup_memoizes() {
        let mut draft = DraftExpense::new();
        assert!(draft.pending_rate_lookup().is_none());

        draft.set_spent_on_str("2024-06-14", today()).unwrap();
        draft.set_currency("USD").unwrap();
        assert!(draft.pending_rate_lookup().is_some());

        draft.rate_snapshot = Some(RateSnapshot::zero_filled("USD"));
        assert!(draft.pending_rate_lookup().is_none());

        // switching currency invalidates the held snapshot
        draft.set_currency("EUR").unwrap();
        assert_eq!(
            draft.pending_rate_lookup(),
            Some(("EUR".to_string(), NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()))
        );
    }

    #[test]
    fn test_changing_date_invalidates_snapshot() {
        let mut draft = DraftExpense::new();
        draft.set_spent_on_str("2024-06-14", today()).unwrap();
        draft.set_currency("USD").unwrap();
        draft.rate_snapshot = Some(RateSnapshot::zero_filled("USD"));
        assert!(draft.pending_rate_lookup().is_none());

        // same date again: snapshot kept
        draft.set_spent_on_str("2024-06-14", today()).unwrap();
        assert!(draft.pending_rate_lookup().is_none());

        draft.set_spent_on_str("2024-06-13", today()).unwrap();
        assert_eq!(
            draft.pending_rate_lookup(),
            Some(("USD".to_string(), NaiveDate::from_ymd_opt(2024, 6, 13).unwrap()))
        );
    }
}
