//! Category normalization.
//!
//! Feeds label their items with whatever strings their editors like
//! ("SPOR", "Gaziantep Haber", "FİKSTÜR"). Everything is filed under one of
//! the 21 [`StandardCategory`] values instead, using the rule table in
//! [`CATEGORY_RULES`] first and the AI service only for labels the rules
//! don't cover.

mod cache;
mod normalizer;
mod standard;

pub use cache::{CategoryCache, InMemoryCategoryCache};
pub use normalizer::CategoryNormalizer;
pub use standard::{StandardCategory, CATEGORY_RULES};

use crate::storage::{Category, Database};

impl CategoryNormalizer {
    /// Normalizes `label` and returns the matching category row, creating it
    /// if needed.
    pub async fn get_or_create_category(
        &self,
        db: &Database,
        label: &str,
    ) -> anyhow::Result<Category> {
        let category = self.normalize(label).await;
        db.upsert_category(category.name()).await
    }
}

/// Makes sure a row exists for every standard category.
pub async fn initialize_standard_categories(db: &Database) -> anyhow::Result<()> {
    for category in StandardCategory::ALL {
        db.upsert_category(category.name()).await?;
    }
    tracing::info!(
        count = StandardCategory::ALL.len(),
        "Initialized standard categories"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockGenerator;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        initialize_standard_categories(&db).await.unwrap();
        initialize_standard_categories(&db).await.unwrap();
        let categories = db.list_categories().await.unwrap();
        assert_eq!(categories.len(), StandardCategory::ALL.len());
    }

    #[tokio::test]
    async fn test_get_or_create_uses_normalized_name() {
        let db = Database::open(":memory:").await.unwrap();
        let normalizer = CategoryNormalizer::new(Arc::new(MockGenerator::failing()));

        let first = normalizer.get_or_create_category(&db, "FUTBOL").await.unwrap();
        let second = normalizer.get_or_create_category(&db, "basketbol").await.unwrap();
        assert_eq!(first.name, "Spor");
        assert_eq!(first.id, second.id);

        let other = normalizer.get_or_create_category(&db, "???").await.unwrap();
        assert_eq!(other.name, "Diğer");
    }
}
