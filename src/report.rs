//! Report rendering
//!
//! Pure functions turning a committed (or failed) draft into the
//! user-facing summary plus its edit/delete affordance. The line layout is
//! the externally observable contract; tests freeze it.

use chrono::NaiveDate;

use crate::draft::DraftExpense;
use crate::messages::{
    FAILED_RECORD, LABEL_BACK, LABEL_DELETE, LABEL_DELETE_ABORT, LABEL_DELETE_CONFIRM, LABEL_EDIT,
    LABEL_EDIT_AMOUNT, LABEL_EDIT_CATEGORY, LABEL_EDIT_COMMENT, LABEL_EDIT_DATE, SUCCESS_RECORD,
};
use crate::models::{EditAttribute, Keyboard};

pub const EDITED_SUFFIX: &str = "(Edited)";
pub const EDIT_FAILED_SUFFIX: &str = "(Edit failed)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Recorded,
    Failed,
}

/// Renders the multi-line expense summary. Failure variants share the same
/// field lines under a different header and carry no affordance.
pub fn render(draft: &DraftExpense, category_name: &str, outcome: ReportOutcome) -> String {
    let header = match outcome {
        ReportOutcome::Recorded => SUCCESS_RECORD,
        ReportOutcome::Failed => FAILED_RECORD,
    };

    let date = draft
        .spent_on
        .map(format_date)
        .unwrap_or_else(|| "—".to_string());
    let amount = match (draft.amount, draft.currency.as_deref()) {
        (Some(amount), Some(currency)) => format!("{} {}", amount, currency),
        (Some(amount), None) => amount.to_string(),
        _ => "—".to_string(),
    };
    let comment = draft.comment.as_deref().unwrap_or("—");

    format!(
        "{header}    Date: {date}\n    Category: {category_name}\n    Amount: {amount}\n    Comment: {comment}"
    )
}

/// `June 14 2024 (Friday)` — the report's date display format.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%B %d %Y (%A)").to_string()
}

fn line_label(attribute: EditAttribute) -> &'static str {
    match attribute {
        EditAttribute::Date => "Date",
        EditAttribute::Category => "Category",
        EditAttribute::Amount => "Amount",
        EditAttribute::Comment => "Comment",
    }
}

fn strip_suffixes(line: &str) -> &str {
    let line = line
        .strip_suffix(EDITED_SUFFIX)
        .map(str::trim_end)
        .unwrap_or(line);
    line.strip_suffix(EDIT_FAILED_SUFFIX)
        .map(str::trim_end)
        .unwrap_or(line)
}

/// Replaces the value of a single summary line in place, leaving every other
/// line untouched. Prior edit suffixes are normalized away so they never
/// stack across repeated edits.
pub fn replace_line(existing: &str, attribute: EditAttribute, new_value: &str) -> String {
    let label = line_label(attribute);
    let prefix = format!("    {}: ", label);

    existing
        .lines()
        .map(|line| {
            let clean = strip_suffixes(line);
            if clean.trim_start().starts_with(&format!("{}: ", label)) {
                format!("{}{}", prefix, new_value)
            } else {
                clean.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Appends `suffix` to the edited attribute's line after normalizing any
/// prior suffix on every line.
pub fn mark_line(existing: &str, attribute: EditAttribute, suffix: &str) -> String {
    let label = line_label(attribute);

    existing
        .lines()
        .map(|line| {
            let clean = strip_suffixes(line);
            if clean.trim_start().starts_with(&format!("{}: ", label)) {
                format!("{} {}", clean, suffix)
            } else {
                clean.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Edit/delete affordance attached to a successful report.
pub fn report_actions_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![LABEL_EDIT.to_string(), LABEL_DELETE.to_string()]])
}

/// Attribute picker shown when the user opens the edit menu.
pub fn edit_menu_keyboard() -> Keyboard {
    Keyboard::Inline(vec![
        vec![LABEL_EDIT_DATE.to_string(), LABEL_EDIT_CATEGORY.to_string()],
        vec![LABEL_EDIT_AMOUNT.to_string(), LABEL_EDIT_COMMENT.to_string()],
        vec![LABEL_BACK.to_string()],
    ])
}

pub fn confirm_delete_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![
        LABEL_DELETE_CONFIRM.to_string(),
        LABEL_DELETE_ABORT.to_string(),
    ]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateSnapshot;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_draft() -> DraftExpense {
        let mut draft = DraftExpense::for_user(1).unwrap();
        draft.category_id = Some(Uuid::new_v4());
        draft.spent_on = Some(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
        draft.amount = Some(12.5);
        draft.currency = Some("USD".to_string());
        draft.rate_snapshot = Some(RateSnapshot::zero_filled("USD"));
        draft.comment = Some("Lunch".to_string());
        draft.created_at = Some(Utc::now());
        draft
    }

    #[test]
    fn test_success_report_layout() {
        let text = render(&sample_draft(), "Food", ReportOutcome::Recorded);
        assert!(text.starts_with("✅Expense has been recorded!"));
        assert!(text.contains("    Date: June 14 2024 (Friday)"));
        assert!(text.contains("    Category: Food"));
        assert!(text.contains("    Amount: 12.5 USD"));
        assert!(text.contains("    Comment: Lunch"));
    }

    #[test]
    fn test_failure_report_header_and_same_fields() {
        let text = render(&sample_draft(), "Food", ReportOutcome::Failed);
        assert!(text.starts_with("⚠️NOT recorded!"));
        assert!(text.contains("    Amount: 12.5 USD"));
    }

    #[test]
    fn test_replace_line_touches_only_target() {
        let text = render(&sample_draft(), "Food", ReportOutcome::Recorded);
        let replaced = replace_line(&text, EditAttribute::Amount, "20 EUR");
        assert!(replaced.contains("    Amount: 20 EUR"));
        assert!(replaced.contains("    Date: June 14 2024 (Friday)"));
        assert!(replaced.contains("    Comment: Lunch"));
    }

    #[test]
    fn test_suffixes_never_stack() {
        let text = render(&sample_draft(), "Food", ReportOutcome::Recorded);
        let once = mark_line(&text, EditAttribute::Amount, EDITED_SUFFIX);
        assert!(once.contains("    Amount: 12.5 USD (Edited)"));

        let twice = mark_line(&once, EditAttribute::Amount, EDITED_SUFFIX);
        assert_eq!(once, twice);

        // a failed edit replaces, not stacks, the prior suffix
        let failed = mark_line(&twice, EditAttribute::Amount, EDIT_FAILED_SUFFIX);
        assert!(failed.contains("    Amount: 12.5 USD (Edit failed)"));
        assert!(!failed.contains("(Edited)"));
    }

    #[test]
    fn test_replace_line_normalizes_prior_suffix() {
        let text = render(&sample_draft(), "Food", ReportOutcome::Recorded);
        let marked = mark_line(&text, EditAttribute::Comment, EDITED_SUFFIX);
        let replaced = replace_line(&marked, EditAttribute::Comment, "Dinner");
        assert!(replaced.contains("    Comment: Dinner"));
        assert!(!replaced.contains("(Edited)"));
    }
}
