use anyhow::{bail, Result};
use std::collections::HashMap;

use super::schema::Database;
use super::types::{Category, CategoryWithCount};
use crate::util::{fold_lowercase, strip_control_chars};

impl Database {
    // ========================================================================
    // Category Operations
    // ========================================================================

    /// Strip control characters and surrounding whitespace; reject empty names.
    fn sanitize_category_name(name: &str) -> Result<String> {
        let sanitized = strip_control_chars(name);
        let trimmed = sanitized.trim();
        if trimmed.is_empty() {
            bail!("Category name cannot be empty or whitespace-only");
        }
        Ok(trimmed.to_owned())
    }

    /// Return the category named `name`, creating it on first use.
    pub async fn upsert_category(&self, name: &str) -> Result<Category> {
        let clean_name = Self::sanitize_category_name(name)?;
        // DO UPDATE (a no-op) rather than DO NOTHING so RETURNING yields the existing row
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES (?) \
             ON CONFLICT(name) DO UPDATE SET name = excluded.name \
             RETURNING id, name",
        )
        .bind(&clean_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    /// All categories with article counts, ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<CategoryWithCount>> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            r#"
                SELECT c.id, c.name, COUNT(ac.article_id)
                FROM categories c
                LEFT JOIN article_categories ac ON ac.category_id = c.id
                GROUP BY c.id
                ORDER BY c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, article_count)| CategoryWithCount {
                id,
                name,
                article_count,
            })
            .collect())
    }

    /// Merge categories whose names differ only in case or surrounding
    /// whitespace.
    ///
    /// Per group the row with the most articles survives (lowest id on ties);
    /// the others' article links are moved onto it and the rows deleted.
    /// Returns how many rows were removed.
    pub async fn cleanup_duplicate_categories(&self) -> Result<usize> {
        let categories = self.list_categories().await?;

        let mut groups: HashMap<String, Vec<CategoryWithCount>> = HashMap::new();
        for category in categories {
            groups
                .entry(fold_lowercase(category.name.trim()))
                .or_default()
                .push(category);
        }

        let mut removed = 0;
        let mut tx = self.pool.begin().await?;

        for (key, mut members) in groups {
            if members.len() < 2 {
                continue;
            }
            members.sort_by(|a, b| {
                b.article_count
                    .cmp(&a.article_count)
                    .then(a.id.cmp(&b.id))
            });
            let keep = &members[0];
            tracing::info!(
                category = %keep.name,
                key = %key,
                duplicates = members.len() - 1,
                "Merging duplicate categories"
            );

            for duplicate in &members[1..] {
                sqlx::query(
                    "INSERT OR IGNORE INTO article_categories (article_id, category_id) \
                     SELECT article_id, ? FROM article_categories WHERE category_id = ?",
                )
                .bind(keep.id)
                .bind(duplicate.id)
                .execute(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM article_categories WHERE category_id = ?")
                    .bind(duplicate.id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM categories WHERE id = ?")
                    .bind(duplicate.id)
                    .execute(&mut *tx)
                    .await?;
                removed += 1;
            }
        }

        tx.commit().await?;
        tracing::info!(removed = removed, "Category cleanup completed");
        Ok(removed)
    }
}
