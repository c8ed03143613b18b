//! User configuration accessors
//!
//! Read-only view of a user's base currency, visible categories, and
//! per-category amount/comment suggestion lists. Every accessor has an
//! explicit, documented fallback so lookups are total.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::categories::DEFAULT_CATEGORIES;
use crate::models::DEFAULT_BASE_CURRENCY;

/// Per-category suggestion lists keyed by category name, with a "default"
/// entry used for categories without a dedicated list.
pub type SuggestionMap = HashMap<String, Vec<String>>;

#[async_trait]
pub trait UserProfileProvider: Send + Sync {
    /// The user's configured base currency; defaults to USD.
    async fn base_currency(&self, user_id: i64) -> String;

    /// Categories the user marked visible; defaults to the full seed set.
    async fn visible_categories(&self, user_id: i64) -> Vec<String>;

    /// Amount suggestions for the given category; falls back to the
    /// "default" list, then to an empty list (free-text entry).
    async fn amount_suggestions(&self, user_id: i64, category_name: &str) -> Vec<String>;

    /// Comment suggestions with the same fallback chain as amounts.
    async fn comment_suggestions(&self, user_id: i64, category_name: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub base_currency: Option<String>,
    pub visible_categories: Option<Vec<String>>,
    pub amounts: SuggestionMap,
    pub comments: SuggestionMap,
}

/// In-memory profile provider seeded with sensible defaults.
pub struct InMemoryProfiles {
    profiles: Arc<RwLock<HashMap<i64, UserProfile>>>,
    default_amounts: SuggestionMap,
    default_comments: SuggestionMap,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        let mut default_amounts = HashMap::new();
        default_amounts.insert(
            "default".to_string(),
            to_strings(&["1", "3", "5", "7", "10", "15", "25", "30"]),
        );
        default_amounts.insert(
            "Transportation".to_string(),
            to_strings(&["5", "15", "20", "30", "50"]),
        );
        default_amounts.insert(
            "Eat Out".to_string(),
            to_strings(&["10", "15", "20", "25", "30", "40", "50", "60"]),
        );

        let mut default_comments = HashMap::new();
        default_comments.insert(
            "default".to_string(),
            to_strings(&[
                "Groceries",
                "Weekly groceries",
                "Cafe",
                "Restaurant",
                "Taxi",
                "Public transport",
                "Water",
                "Electricity",
                "Heating",
                "Internet",
            ]),
        );

        Self {
            profiles: Arc::new(RwLock::new(HashMap::new())),
            default_amounts,
            default_comments,
        }
    }

    pub async fn set_profile(&self, user_id: i64, profile: UserProfile) {
        let mut profiles = self.profiles.write().await;
        profiles.insert(user_id, profile);
    }

    fn pick(map: &SuggestionMap, category_name: &str) -> Vec<String> {
        map.get(category_name)
            .or_else(|| map.get("default"))
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryProfiles {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserProfileProvider for InMemoryProfiles {
    async fn base_currency(&self, user_id: i64) -> String {
        let profiles = self.profiles.read().await;
        profiles
            .get(&user_id)
            .and_then(|p| p.base_currency.clone())
            .unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string())
    }

    async fn visible_categories(&self, user_id: i64) -> Vec<String> {
        let profiles = self.profiles.read().await;
        profiles
            .get(&user_id)
            .and_then(|p| p.visible_categories.clone())
            .unwrap_or_else(|| DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect())
    }

    async fn amount_suggestions(&self, user_id: i64, category_name: &str) -> Vec<String> {
        let profiles = self.profiles.read().await;
        if let Some(profile) = profiles.get(&user_id) {
            let picked = Self::pick(&profile.amounts, category_name);
            if !picked.is_empty() {
                return picked;
            }
        }
        Self::pick(&self.default_amounts, category_name)
    }

    async fn comment_suggestions(&self, user_id: i64, category_name: &str) -> Vec<String> {
        let profiles = self.profiles.read().await;
        if let Some(profile) = profiles.get(&user_id) {
            let picked = Self::pick(&profile.comments, category_name);
            if !picked.is_empty() {
                return picked;
            }
        }
        Self::pick(&self.default_comments, category_name)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_base_currency_defaults_to_usd() {
        let profiles = InMemoryProfiles::new();
        assert_eq!(profiles.base_currency(1).await, "USD");
    }

    #[tokio::test]
    async fn test_configured_base_currency_wins() {
        let profiles = InMemoryProfiles::new();
        profiles
            .set_profile(
                7,
                UserProfile {
                    base_currency: Some("EUR".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(profiles.base_currency(7).await, "EUR");
        assert_eq!(profiles.base_currency(8).await, "USD");
    }

    #[tokio::test]
    async fn test_amount_suggestions_fall_back_to_default_list() {
        let profiles = InMemoryProfiles::new();
        let transport = profiles.amount_suggestions(1, "Transportation").await;
        assert_eq!(transport[0], "5");

        // no dedicated list for Medicine: default list applies
        let medicine = profiles.amount_suggestions(1, "Medicine").await;
        assert_eq!(medicine[0], "1");
    }

    #[tokio::test]
    async fn test_empty_profile_map_uses_seed_defaults() {
        let profiles = InMemoryProfiles::new();
        profiles.set_profile(9, UserProfile::default()).await;
        assert!(!profiles.comment_suggestions(9, "Food").await.is_empty());
    }
}
