//! Category record for the problem-framing menu.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Stable identifier of a category.
///
/// Catalog identity is by key, never by menu position; the numbered menu is
/// a presentation concern only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryKey(String);

impl CategoryKey {
    /// Creates a CategoryKey, rejecting empty input.
    pub fn new(key: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ValidationError::empty_field("category_key"));
        }
        Ok(Self(key))
    }

    /// Returns the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A problem-framing category selectable from the menu.
///
/// Read-only from the orchestrator's perspective; the prompt template becomes
/// the system prompt once the category is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Stable identifier.
    pub key: CategoryKey,
    /// Display name shown in the menu.
    pub name: String,
    /// One-line description of the category's scope.
    pub description: String,
    /// Example question a user might ask.
    pub example: String,
    /// System prompt used for dialogue within this category.
    pub prompt_template: String,
}

impl Category {
    /// Creates a new category record.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        example: impl Into<String>,
        prompt_template: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            key: CategoryKey::new(key)?,
            name: name.into(),
            description: description.into(),
            example: example.into(),
            prompt_template: prompt_template.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_key_rejects_empty() {
        assert!(CategoryKey::new("").is_err());
        assert!(CategoryKey::new("  ").is_err());
    }

    #[test]
    fn category_construction_carries_fields() {
        let category = Category::new("career", "職涯發展", "desc", "example", "prompt").unwrap();
        assert_eq!(category.key.as_str(), "career");
        assert_eq!(category.name, "職涯發展");
    }
}
