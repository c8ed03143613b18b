//! User-facing interface text
//!
//! Prompt and error strings shared by the state machine and the report
//! renderer. The report layout built from these is the externally observable
//! contract and is covered by tests.

pub const ASK_EXPENSE_DATE: &str = "📅When did you spend?";
pub const ASK_EXPENSE_DATE_FORMAT_HINT: &str = "🔤Input expense date in format '2023-10-13':";
pub const ASK_EXPENSE_CATEGORY: &str = "🛍️What is the expense category?";
pub const ASK_EXPENSE_AMOUNT: &str = "💵What is an amount paid?\n\
Examples:\n\
    100.11\n\
    10 USD\n\
    10 AMD\n\
Amount will be recorded along with conversion rate on the expense date";
pub const ASK_COMMENT: &str = "🔤Choose any comment to add or write custom one:";
pub const HINT_COPY_COMMENT: &str = "🔶You can copy current comment tapping on it.\n\n";

pub const ERROR_DATE_FORMAT: &str = "⛔️Wrong date format.\n";
pub const ERROR_DATE_TIMELINESS: &str = "⛔️Input cannot contain future dates.\n";
pub const ERROR_EXPENSE_AMOUNT_FORMAT: &str = "⛔️Wrong format for spending amount(s).\n\
🔤Should contain only positive numbers with . decimal separator and currency label:";
pub const ERROR_EXPENSE_DELETION_FAILED: &str = "⚠️Deletion failed. Please try again.";

pub const SUCCESS_RECORD: &str = "✅Expense has been recorded!\n\nRecorded data:\n";
pub const FAILED_RECORD: &str = "⚠️NOT recorded!\n\nData to be recorded:\n";

// Affordance button labels. Callback payloads match these exactly.
pub const LABEL_TODAY: &str = "today";
pub const LABEL_YESTERDAY: &str = "yesterday";
pub const LABEL_ANOTHER_DATE: &str = "another_date";
pub const LABEL_EDIT: &str = "edit";
pub const LABEL_DELETE: &str = "delete";
pub const LABEL_EDIT_DATE: &str = "edit_date";
pub const LABEL_EDIT_CATEGORY: &str = "edit_category";
pub const LABEL_EDIT_AMOUNT: &str = "edit_amount";
pub const LABEL_EDIT_COMMENT: &str = "edit_comment";
pub const LABEL_DELETE_CONFIRM: &str = "confirm_deletion";
pub const LABEL_DELETE_ABORT: &str = "abort_deletion";
pub const LABEL_BACK: &str = "back";
