//! Category reference data
//!
//! Immutable lookup table of expense categories. Name lookups are
//! case-sensitive with a documented, total fallback to "Other".

use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Category, FALLBACK_CATEGORY};

/// Default category set seeded for every installation.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Fun",
    "Clothes",
    "Transportation",
    "Eat Out",
    "Food",
    "Facilities",
    "Medicine",
    "Home",
    "Other",
    "Rent",
];

#[derive(Debug, Clone)]
pub struct CategoryRepo {
    by_name: HashMap<String, Category>,
    by_id: HashMap<Uuid, Category>,
}

impl CategoryRepo {
    pub fn with_defaults() -> Self {
        Self::from_names(DEFAULT_CATEGORIES.iter().map(|s| s.to_string()))
    }

    pub fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        for name in names {
            let category = Category {
                category_id: Uuid::new_v4(),
                name: name.clone(),
            };
            by_id.insert(category.category_id, category.clone());
            by_name.insert(name, category);
        }
        Self { by_name, by_id }
    }

    /// Case-sensitive name lookup, falling back to the "Other" category when
    /// no exact match exists. Total: never returns nothing as long as the
    /// repo was seeded with the defaults.
    pub fn by_name(&self, name: &str) -> Option<&Category> {
        self.by_name
            .get(name)
            .or_else(|| self.by_name.get(FALLBACK_CATEGORY))
    }

    pub fn by_id(&self, category_id: Uuid) -> Option<&Category> {
        self.by_id.get(&category_id)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let repo = CategoryRepo::with_defaults();
        assert_eq!(repo.by_name("Food").unwrap().name, "Food");
    }

    #[test]
    fn test_no_match_falls_back_to_other() {
        let repo = CategoryRepo::with_defaults();
        assert_eq!(repo.by_name("Groceries").unwrap().name, "Other");
        // case-sensitive: "food" is not "Food"
        assert_eq!(repo.by_name("food").unwrap().name, "Other");
    }

    #[test]
    fn test_by_id_round_trip() {
        let repo = CategoryRepo::with_defaults();
        let food = repo.by_name("Food").unwrap().clone();
        assert_eq!(repo.by_id(food.category_id), Some(&food));
    }
}
