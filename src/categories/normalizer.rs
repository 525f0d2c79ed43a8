use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::ai::{extract_json, AiError, TextGenerator};
use crate::util::fold_lowercase;

use super::cache::{CategoryCache, InMemoryCategoryCache};
use super::standard::{classification_preamble, StandardCategory};

/// Maps free-text feed category labels onto [`StandardCategory`].
///
/// Resolution order per label:
/// 1. exact lookup of the folded label in the cache
/// 2. first partial (substring either way) match in cache order
/// 3. AI classification; a valid answer is cached for later calls
/// 4. [`StandardCategory::FALLBACK`]
///
/// Steps 1 and 2 never touch the AI service. AI failures are logged and
/// absorbed here; this is the one place they don't propagate.
pub struct CategoryNormalizer {
    cache: Arc<dyn CategoryCache>,
    generator: Arc<dyn TextGenerator>,
}

impl CategoryNormalizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_cache(generator, Arc::new(InMemoryCategoryCache::with_rules()))
    }

    pub fn with_cache(generator: Arc<dyn TextGenerator>, cache: Arc<dyn CategoryCache>) -> Self {
        Self { cache, generator }
    }

    fn key(label: &str) -> String {
        fold_lowercase(label.trim())
    }

    /// Rule-based lookup only (steps 1 and 2).
    pub fn lookup(&self, label: &str) -> Option<StandardCategory> {
        let key = Self::key(label);
        if key.is_empty() {
            return Some(StandardCategory::FALLBACK);
        }
        self.cache
            .get(&key)
            .or_else(|| self.cache.find_partial(&key))
    }

    /// Resolves a single label. Never fails.
    pub async fn normalize(&self, label: &str) -> StandardCategory {
        if let Some(category) = self.lookup(label) {
            return category;
        }

        match self.classify_one(label).await {
            Ok(Some(category)) => {
                self.cache.put(&Self::key(label), category);
                tracing::info!(label = %label, category = %category, "AI mapped category");
                category
            }
            Ok(None) => {
                tracing::warn!(label = %label, "AI returned a non-standard category, using fallback");
                StandardCategory::FALLBACK
            }
            Err(e) => {
                tracing::error!(label = %label, error = %e, "AI category normalization failed");
                StandardCategory::FALLBACK
            }
        }
    }

    async fn classify_one(&self, label: &str) -> Result<Option<StandardCategory>, AiError> {
        let prompt = format!(
            "{}\nKategori: \"{}\"\n\nBu kategoriyi uygun standart kategori ile eşleştir ve sadece kategori adını döndür.",
            classification_preamble(),
            label.trim()
        );
        let reply = self.generator.generate(&prompt).await?;
        Ok(StandardCategory::from_name(&reply))
    }

    /// Resolves many labels with at most one batched AI call.
    ///
    /// Labels the rules can't place are sent together and answered as a JSON
    /// object `{label: category}`. If that reply doesn't parse, each remaining
    /// label goes through [`normalize`](Self::normalize) on its own. Labels the
    /// reply leaves out are resolved the same way.
    pub async fn normalize_batch(&self, labels: &[String]) -> HashMap<String, StandardCategory> {
        let mut result = HashMap::with_capacity(labels.len());
        let mut needs_ai: Vec<&str> = Vec::new();
        let mut queued = HashSet::new();

        for label in labels {
            if result.contains_key(label) {
                continue;
            }
            match self.lookup(label) {
                Some(category) => {
                    result.insert(label.clone(), category);
                }
                None => {
                    if queued.insert(label.as_str()) {
                        needs_ai.push(label.as_str());
                    }
                }
            }
        }

        if needs_ai.is_empty() {
            return result;
        }

        match self.classify_batch(&needs_ai).await {
            Ok(mappings) => {
                // Replies may echo labels with different case, so match on folded keys.
                let by_key: HashMap<String, String> = mappings
                    .into_iter()
                    .map(|(label, category)| (Self::key(&label), category))
                    .collect();

                for label in needs_ai {
                    let category = match by_key.get(&Self::key(label)) {
                        Some(answer) => match StandardCategory::from_name(answer) {
                            Some(category) => {
                                self.cache.put(&Self::key(label), category);
                                category
                            }
                            None => StandardCategory::FALLBACK,
                        },
                        None => self.normalize(label).await,
                    };
                    result.insert(label.to_string(), category);
                }
            }
            Err(e) => {
                tracing::warn!(
                    labels = needs_ai.len(),
                    error = %e,
                    "Batch category normalization failed, resolving one by one"
                );
                for label in needs_ai {
                    let category = self.normalize(label).await;
                    result.insert(label.to_string(), category);
                }
            }
        }

        result
    }

    async fn classify_batch(&self, labels: &[&str]) -> Result<HashMap<String, String>, AiError> {
        let list =
            serde_json::to_string(labels).map_err(|e| AiError::MalformedResponse(e.to_string()))?;
        let prompt = format!(
            "{}\nKategoriler: {}\n\nJSON formatında yanıt ver.",
            classification_preamble(),
            list
        );
        let reply = self.generator.generate(&prompt).await?;
        extract_json(&reply)
    }
}
