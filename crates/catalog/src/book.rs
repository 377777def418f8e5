use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookwise_core::BookId;

/// Subject category of a technical book.
///
/// Drives the default seasonal profile and how fast the subject ages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ProgrammingLanguages,
    WebDevelopment,
    DataScience,
    MachineLearning,
    CloudDevOps,
    Security,
    Databases,
    ComputerScience,
    General,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::ProgrammingLanguages,
        Category::WebDevelopment,
        Category::DataScience,
        Category::MachineLearning,
        Category::CloudDevOps,
        Category::Security,
        Category::Databases,
        Category::ComputerScience,
        Category::General,
    ];

    /// Typical number of years before a title in this category stops selling.
    pub fn shelf_life_years(self) -> f64 {
        match self {
            Category::MachineLearning => 3.0,
            Category::WebDevelopment => 3.0,
            Category::CloudDevOps => 3.5,
            Category::DataScience => 4.5,
            Category::Security => 5.0,
            Category::ProgrammingLanguages => 6.0,
            Category::Databases => 8.0,
            Category::General => 8.0,
            Category::ComputerScience => 15.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::ProgrammingLanguages => "programming_languages",
            Category::WebDevelopment => "web_development",
            Category::DataScience => "data_science",
            Category::MachineLearning => "machine_learning",
            Category::CloudDevOps => "cloud_devops",
            Category::Security => "security",
            Category::Databases => "databases",
            Category::ComputerScience => "computer_science",
            Category::General => "general",
        }
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How close to the moving edge of technology a title sits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnologyLevel {
    /// Theory, algorithms, evergreen material.
    Foundational,
    /// Mainstream tools with a stable release cadence.
    Established,
    /// Frameworks and products that change every release.
    Emerging,
}

impl TechnologyLevel {
    /// Multiplier applied to book age when scoring obsolescence.
    pub fn aging_multiplier(self) -> f64 {
        match self {
            TechnologyLevel::Foundational => 0.6,
            TechnologyLevel::Established => 1.0,
            TechnologyLevel::Emerging => 1.5,
        }
    }
}

/// Catalog metadata for one book (immutable within an analysis run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub publisher: String,
    pub category: Category,
    pub technology_level: TechnologyLevel,
    /// Selling price per unit.
    pub price: f64,
    pub publication_date: NaiveDate,
}

impl Book {
    /// Age in whole days at `as_of` (0 for books published after `as_of`).
    pub fn age_days(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.publication_date).num_days().max(0)
    }

    pub fn age_years(&self, as_of: NaiveDate) -> f64 {
        self.age_days(as_of) as f64 / 365.25
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(published: NaiveDate) -> Book {
        Book {
            id: BookId::from_u128(1),
            title: "Rust in Practice".to_string(),
            publisher: "Acme Press".to_string(),
            category: Category::ProgrammingLanguages,
            technology_level: TechnologyLevel::Established,
            price: 49.99,
            publication_date: published,
        }
    }

    #[test]
    fn age_is_never_negative() {
        let b = book(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
        assert_eq!(b.age_days(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()), 0);
    }

    #[test]
    fn age_in_years_uses_julian_year() {
        let b = book(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        let years = b.age_years(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!((years - 4.0).abs() < 0.01);
    }

    #[test]
    fn fast_moving_categories_have_shorter_shelf_life() {
        assert!(
            Category::MachineLearning.shelf_life_years()
                < Category::ComputerScience.shelf_life_years()
        );
    }
}
