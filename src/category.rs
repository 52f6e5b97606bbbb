// Expense categories.
// The set is closed: every cost entry and every report bucket uses one of
// these five values, lowercase on the wire and in storage.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Health,
    Housing,
    Sport,
    Education,
}

impl Category {
    /// Every category, in canonical report order.
    pub const ALL: [Category; 5] = [
        Category::Food,
        Category::Health,
        Category::Housing,
        Category::Sport,
        Category::Education,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Health => "health",
            Category::Housing => "housing",
            Category::Sport => "sport",
            Category::Education => "education",
        }
    }

    /// Parse a wire-format category name. Unknown names are a validation
    /// failure carrying the full list of accepted values.
    pub fn parse(s: &str) -> Result<Category, Error> {
        match s {
            "food" => Ok(Category::Food),
            "health" => Ok(Category::Health),
            "housing" => Ok(Category::Housing),
            "sport" => Ok(Category::Sport),
            "education" => Ok(Category::Education),
            _ => Err(Error::validation(format!(
                "category must be one of: {}",
                Category::ALL
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_every_known_category() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()).unwrap(), category);
        }
    }

    #[test]
    fn parse_rejects_unknown_category() {
        let err = Category::parse("not_a_category").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(
            err.to_string(),
            "category must be one of: food, health, housing, sport, education"
        );
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert!(Category::parse("Food").is_err());
        assert!(Category::parse("FOOD").is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Category::Education).unwrap(),
            "\"education\""
        );
        let parsed: Category = serde_json::from_str("\"sport\"").unwrap();
        assert_eq!(parsed, Category::Sport);
    }
}
