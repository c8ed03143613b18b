//! Conversation state machine
//!
//! Drives the expense entry/edit/delete dialogue: accumulates draft fields
//! across turns, branches into single-attribute edit and delete sub-flows,
//! and commits exactly once per logical entry. Every inbound event for a
//! user runs under that user's session lock, so concurrent events for the
//! same user serialize while different users proceed in parallel.

use chrono::{Duration, Local, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::categories::CategoryRepo;
use crate::draft::{parse_amount_input, DraftExpense};
use crate::error::ExpenseError;
use crate::messages::{
    ASK_COMMENT, ASK_EXPENSE_AMOUNT, ASK_EXPENSE_CATEGORY, ASK_EXPENSE_DATE,
    ASK_EXPENSE_DATE_FORMAT_HINT, ERROR_EXPENSE_AMOUNT_FORMAT, ERROR_EXPENSE_DELETION_FAILED,
    HINT_COPY_COMMENT, LABEL_ANOTHER_DATE, LABEL_TODAY, LABEL_YESTERDAY,
};
use crate::models::{
    DateChoice, EditAttribute, Event, FlowKind, Keyboard, UpsertStatus, FALLBACK_CATEGORY,
};
use crate::profile::UserProfileProvider;
use crate::rates::RateResolver;
use crate::report::{
    confirm_delete_keyboard, edit_menu_keyboard, mark_line, render, report_actions_keyboard,
    ReportOutcome, EDITED_SUFFIX, EDIT_FAILED_SUFFIX,
};
use crate::session::{ConversationState, FlowState, SessionStore};
use crate::store::ExpenseStore;
use crate::transport::Transport;
use crate::Result;

const SUGGESTIONS_PER_ROW: usize = 5;

/// The expense conversation engine: one instance serves every user.
pub struct ExpenseFlowEngine {
    store: Arc<dyn ExpenseStore>,
    transport: Arc<dyn Transport>,
    profiles: Arc<dyn UserProfileProvider>,
    categories: CategoryRepo,
    rates: RateResolver,
    sessions: SessionStore,
}

impl ExpenseFlowEngine {
    pub fn new(
        store: Arc<dyn ExpenseStore>,
        transport: Arc<dyn Transport>,
        profiles: Arc<dyn UserProfileProvider>,
        categories: CategoryRepo,
        rates: RateResolver,
    ) -> Self {
        Self {
            store,
            transport,
            profiles,
            categories,
            rates,
            sessions: SessionStore::new(),
        }
    }

    /// Top-level "add expense" command. Silently discards any stale session
    /// and opens the date prompt.
    pub async fn start_entry(&self, user_id: i64) -> Result<()> {
        let entry = self.sessions.entry(user_id).await;
        let mut session = entry.lock().await;

        if !session.is_idle() {
            debug!(user_id, "Discarding stale session on new top-level command");
        }
        session.clear();
        session.draft = DraftExpense::for_user(user_id)?;
        session.state = FlowState::AwaitingDate;

        self.transport
            .send(user_id, ASK_EXPENSE_DATE, Some(date_keyboard()))
            .await?;
        Ok(())
    }

    /// Dispatch one inbound event against the user's current session.
    pub async fn handle_event(&self, user_id: i64, event: Event) -> Result<()> {
        let entry = self.sessions.entry(user_id).await;
        let mut session = entry.lock().await;

        // Global cancel wins over any other pending match.
        if event == Event::Cancel {
            return self.on_cancel(user_id, &mut session).await;
        }

        match (session.state, event) {
            (FlowState::AwaitingDate, Event::DateChoice(choice)) => {
                self.on_date_choice(user_id, &mut session, choice).await
            }
            (FlowState::AwaitingCustomDate, Event::TextInput(text)) => {
                self.on_custom_date(user_id, &mut session, &text).await
            }
            (FlowState::AwaitingCategory, Event::CategoryChoice(name)) => {
                self.on_category(user_id, &mut session, &name).await
            }
            (FlowState::AwaitingAmount, Event::AmountText(text)) => {
                self.on_amount(user_id, &mut session, &text).await
            }
            (FlowState::AwaitingComment, Event::CommentText(text)) => {
                self.on_comment(user_id, &mut session, &text).await
            }
            (_, Event::EditRequest { attribute: None, message_id }) => {
                self.on_open_edit_menu(user_id, &mut session, message_id).await
            }
            (FlowState::EditMenu, Event::EditRequest { attribute: Some(attr), .. }) => {
                self.on_pick_edit_attribute(user_id, &mut session, attr).await
            }
            (_, Event::DeleteRequest { message_id }) => {
                self.on_open_delete_menu(user_id, &mut session, message_id).await
            }
            (FlowState::DeleteMenu, Event::Confirm) => {
                self.on_confirm_delete(user_id, &mut session).await
            }
            (state, event) => {
                debug!(user_id, ?state, ?event, "Ignoring event with no transition");
                Ok(())
            }
        }
    }

    /// Current state tag for a user; `Idle` when no session exists.
    pub async fn current_state(&self, user_id: i64) -> FlowState {
        let entry = self.sessions.entry(user_id).await;
        let session = entry.lock().await;
        session.state
    }

    // =============================
    // Transitions
    // =============================

    async fn on_cancel(&self, user_id: i64, session: &mut ConversationState) -> Result<()> {
        // Aborting from a report-anchored menu restores the report's own
        // edit/delete affordance before going idle.
        if matches!(session.state, FlowState::EditMenu | FlowState::DeleteMenu) {
            if let Some(anchor) = session.anchor_message_id {
                self.transport
                    .edit(user_id, anchor, None, Some(report_actions_keyboard()))
                    .await?;
            }
        }
        info!(user_id, "Conversation cancelled, discarding accumulator");
        session.clear();
        Ok(())
    }

    async fn on_date_choice(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        choice: DateChoice,
    ) -> Result<()> {
        let today = today();
        match choice {
            DateChoice::Today | DateChoice::Yesterday => {
                let date = if choice == DateChoice::Today {
                    today
                } else {
                    today - Duration::days(1)
                };
                session.draft.set_spent_on(date, today)?;
                self.sync_rates(&mut session.draft, today).await;

                if let FlowKind::Edit(attr) = session.flow {
                    return self.commit_and_report(user_id, session, Some(attr)).await;
                }
                self.prompt_category(user_id, session).await
            }
            DateChoice::Other => {
                session.state = FlowState::AwaitingCustomDate;
                self.transport
                    .send(user_id, ASK_EXPENSE_DATE_FORMAT_HINT, None)
                    .await?;
                Ok(())
            }
        }
    }

    async fn on_custom_date(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        text: &str,
    ) -> Result<()> {
        let today = today();
        if let Err(e) = session.draft.set_spent_on_str(text, today) {
            // Recoverable: re-prompt in place, accumulated fields intact.
            let reply = format!("{}{}", e, ASK_EXPENSE_DATE_FORMAT_HINT);
            self.transport.send(user_id, &reply, None).await?;
            return Ok(());
        }
        self.sync_rates(&mut session.draft, today).await;

        if let FlowKind::Edit(attr) = session.flow {
            return self.commit_and_report(user_id, session, Some(attr)).await;
        }
        self.prompt_category(user_id, session).await
    }

    async fn on_category(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        name: &str,
    ) -> Result<()> {
        let category = self
            .categories
            .by_name(name)
            .ok_or_else(|| ExpenseError::Internal("category repo is empty".to_string()))?
            .clone();
        session.draft.category_id = Some(category.category_id);

        if let FlowKind::Edit(attr) = session.flow {
            return self.commit_and_report(user_id, session, Some(attr)).await;
        }

        session.state = FlowState::AwaitingAmount;
        let suggestions = self
            .profiles
            .amount_suggestions(user_id, &category.name)
            .await;
        self.transport
            .send(
                user_id,
                ASK_EXPENSE_AMOUNT,
                Keyboard::reply_rows(&suggestions, SUGGESTIONS_PER_ROW),
            )
            .await?;
        Ok(())
    }

    async fn on_amount(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        text: &str,
    ) -> Result<()> {
        let parsed = parse_amount_input(text).and_then(|(amount, currency)| {
            session.draft.set_amount(amount)?;
            Ok(currency)
        });

        let currency = match parsed {
            Ok(currency) => currency,
            Err(_) => {
                // Re-prompt with category-specific suggestions; degrades to
                // free text when the list is empty.
                let suggestions = self
                    .profiles
                    .amount_suggestions(user_id, &self.category_name(session))
                    .await;
                self.transport
                    .send(
                        user_id,
                        ERROR_EXPENSE_AMOUNT_FORMAT,
                        Keyboard::reply_rows(&suggestions, SUGGESTIONS_PER_ROW),
                    )
                    .await?;
                return Ok(());
            }
        };

        let currency = match currency {
            Some(code) => code,
            None => self.profiles.base_currency(user_id).await,
        };
        session.draft.set_currency(&currency)?;
        self.sync_rates(&mut session.draft, today()).await;

        if let FlowKind::Edit(attr) = session.flow {
            return self.commit_and_report(user_id, session, Some(attr)).await;
        }

        session.state = FlowState::AwaitingComment;
        let suggestions = self
            .profiles
            .comment_suggestions(user_id, &self.category_name(session))
            .await;
        self.transport
            .send(
                user_id,
                ASK_COMMENT,
                Keyboard::reply_rows(&suggestions, SUGGESTIONS_PER_ROW),
            )
            .await?;
        Ok(())
    }

    async fn on_comment(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        text: &str,
    ) -> Result<()> {
        session.draft.set_comment(text);

        if let FlowKind::Edit(attr) = session.flow {
            return self.commit_and_report(user_id, session, Some(attr)).await;
        }

        // First commit of this logical entry.
        session.draft.created_at = Some(Utc::now());
        self.commit_and_report(user_id, session, None).await
    }

    async fn on_open_edit_menu(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        message_id: i64,
    ) -> Result<()> {
        let Some(draft) = self.rehydrate(user_id, message_id).await? else {
            return Ok(());
        };

        session.clear();
        session.draft = draft;
        session.anchor_message_id = Some(message_id);
        session.state = FlowState::EditMenu;

        self.transport
            .edit(user_id, message_id, None, Some(edit_menu_keyboard()))
            .await?;
        Ok(())
    }

    async fn on_pick_edit_attribute(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        attribute: EditAttribute,
    ) -> Result<()> {
        session.flow = FlowKind::Edit(attribute);

        match attribute {
            EditAttribute::Date => {
                session.state = FlowState::AwaitingCustomDate;
                self.transport
                    .send(user_id, ASK_EXPENSE_DATE_FORMAT_HINT, None)
                    .await?;
            }
            EditAttribute::Category => {
                self.prompt_category(user_id, session).await?;
            }
            EditAttribute::Amount => {
                session.state = FlowState::AwaitingAmount;
                let suggestions = self
                    .profiles
                    .amount_suggestions(user_id, &self.category_name(session))
                    .await;
                self.transport
                    .send(
                        user_id,
                        ASK_EXPENSE_AMOUNT,
                        Keyboard::reply_rows(&suggestions, SUGGESTIONS_PER_ROW),
                    )
                    .await?;
            }
            EditAttribute::Comment => {
                session.state = FlowState::AwaitingComment;
                let suggestions = self
                    .profiles
                    .comment_suggestions(user_id, &self.category_name(session))
                    .await;
                let prompt = format!("{}{}", HINT_COPY_COMMENT, ASK_COMMENT);
                self.transport
                    .send(
                        user_id,
                        &prompt,
                        Keyboard::reply_rows(&suggestions, SUGGESTIONS_PER_ROW),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn on_open_delete_menu(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        message_id: i64,
    ) -> Result<()> {
        let Some(draft) = self.rehydrate(user_id, message_id).await? else {
            return Ok(());
        };

        session.clear();
        session.draft = draft;
        session.anchor_message_id = Some(message_id);
        session.state = FlowState::DeleteMenu;

        self.transport
            .edit(user_id, message_id, None, Some(confirm_delete_keyboard()))
            .await?;
        Ok(())
    }

    async fn on_confirm_delete(
        &self,
        user_id: i64,
        session: &mut ConversationState,
    ) -> Result<()> {
        let anchor = session.anchor_message_id;
        let deleted = match anchor {
            Some(message_id) => self.store.delete_by_message(user_id, message_id).await,
            None => Ok(false),
        };

        match deleted {
            Ok(true) => {
                if let Some(message_id) = anchor {
                    self.transport.delete(user_id, message_id).await?;
                }
                info!(user_id, ?anchor, "Expense record deleted");
            }
            Ok(false) | Err(_) => {
                warn!(user_id, ?anchor, "Expense deletion failed");
                self.transport
                    .send(user_id, ERROR_EXPENSE_DELETION_FAILED, None)
                    .await?;
                if let Some(message_id) = anchor {
                    self.transport
                        .edit(user_id, message_id, None, Some(report_actions_keyboard()))
                        .await?;
                }
            }
        }

        session.clear();
        Ok(())
    }

    // =============================
    // Commit
    // =============================

    /// Terminal commit-and-render step. Failures here are surfaced once as
    /// the "not recorded" report variant, never propagated to the caller;
    /// the session is cleared regardless so the user is not stuck.
    async fn commit_and_report(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        edited: Option<EditAttribute>,
    ) -> Result<()> {
        if !session.draft.is_commit_ready() {
            // Programming-error assertion: unreachable if transitions are
            // followed correctly. Fatal to this turn only.
            let payload = serde_json::to_value(&session.draft).unwrap_or_default();
            error!(user_id, %payload, "Commit attempted on non-ready draft");
            session.clear();
            return Err(ExpenseError::Internal(
                "commit attempted on non-ready draft".to_string(),
            ));
        }

        let category_name = self.category_name(session);

        match self.try_commit(user_id, session, &category_name, edited).await {
            Ok(status) => {
                info!(
                    user_id,
                    expense_id = %session.draft.expense_id,
                    ?status,
                    "Expense committed"
                );
            }
            Err(e) => {
                // Logged with the attempted payload for forensic replay.
                let payload = serde_json::to_value(&session.draft).unwrap_or_default();
                error!(user_id, %payload, "Expense commit failed: {}", e);
                self.report_failure(user_id, session, &category_name, edited)
                    .await;
            }
        }

        session.clear();
        Ok(())
    }

    async fn try_commit(
        &self,
        user_id: i64,
        session: &mut ConversationState,
        category_name: &str,
        edited: Option<EditAttribute>,
    ) -> Result<UpsertStatus> {
        let (_, status) = self.store.upsert(&session.draft).await?;

        let mut text = render(&session.draft, category_name, ReportOutcome::Recorded);
        if let Some(attr) = edited {
            text = mark_line(&text, attr, EDITED_SUFFIX);
        }

        match status {
            UpsertStatus::Updated => {
                let anchor = session
                    .draft
                    .associated_message_id
                    .or(session.anchor_message_id)
                    .ok_or_else(|| {
                        ExpenseError::Internal("updated record has no associated message".to_string())
                    })?;
                self.transport
                    .edit(user_id, anchor, Some(&text), Some(report_actions_keyboard()))
                    .await?;
            }
            UpsertStatus::Inserted => {
                let message_id = self
                    .transport
                    .send(user_id, &text, Some(report_actions_keyboard()))
                    .await?;
                // Second adapter write: associate the report message so
                // later edit/delete flows can locate this record.
                session.draft.associated_message_id = Some(message_id);
                self.store.upsert(&session.draft).await?;
            }
        }

        Ok(status)
    }

    /// Failure-variant report: same summary, error header or suffix, no
    /// action affordance. Transport errors here are logged and swallowed.
    async fn report_failure(
        &self,
        user_id: i64,
        session: &ConversationState,
        category_name: &str,
        edited: Option<EditAttribute>,
    ) {
        let result = match (edited, session.anchor_message_id) {
            (Some(attr), Some(anchor)) => {
                let text = mark_line(
                    &render(&session.draft, category_name, ReportOutcome::Recorded),
                    attr,
                    EDIT_FAILED_SUFFIX,
                );
                self.transport
                    .edit(user_id, anchor, Some(&text), None)
                    .await
            }
            _ => {
                let text = render(&session.draft, category_name, ReportOutcome::Failed);
                self.transport.send(user_id, &text, None).await.map(|_| ())
            }
        };

        if let Err(e) = result {
            warn!(user_id, "Failed to deliver failure report: {}", e);
        }
    }

    // =============================
    // Helpers
    // =============================

    async fn prompt_category(
        &self,
        user_id: i64,
        session: &mut ConversationState,
    ) -> Result<()> {
        session.state = FlowState::AwaitingCategory;
        let visible = self.profiles.visible_categories(user_id).await;
        let rows = visible
            .chunks(2)
            .map(|chunk| chunk.to_vec())
            .collect::<Vec<_>>();
        self.transport
            .send(user_id, ASK_EXPENSE_CATEGORY, Some(Keyboard::Inline(rows)))
            .await?;
        Ok(())
    }

    async fn sync_rates(&self, draft: &mut DraftExpense, today: NaiveDate) {
        if let Some((currency, date)) = draft.pending_rate_lookup() {
            draft.rate_snapshot = Some(self.rates.resolve(&currency, date, today).await);
        }
    }

    /// Display name of the draft's category, defaulting to "Other" before
    /// a category is chosen or when the id no longer resolves.
    fn category_name(&self, session: &ConversationState) -> String {
        session
            .draft
            .category_id
            .and_then(|id| self.categories.by_id(id))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
    }

    /// Locate the persisted record behind a report message. A miss is
    /// logged and ignored rather than surfaced: the button may belong to a
    /// record deleted elsewhere.
    async fn rehydrate(&self, user_id: i64, message_id: i64) -> Result<Option<DraftExpense>> {
        let draft = self.store.find_by_message(user_id, message_id).await?;
        if draft.is_none() {
            warn!(
                user_id,
                message_id, "Expense for message association was not found"
            );
        }
        Ok(draft)
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn date_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![
        LABEL_TODAY.to_string(),
        LABEL_YESTERDAY.to_string(),
        LABEL_ANOTHER_DATE.to_string(),
    ]])
}
