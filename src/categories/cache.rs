use std::collections::HashMap;
use std::sync::Mutex;

use super::standard::{StandardCategory, CATEGORY_RULES};

/// Label → category mappings consulted before asking the AI service.
///
/// Keys are folded lowercase labels. Implementations must iterate in a stable
/// order (insertion order for the in-memory cache) because partial matching
/// returns the first hit.
pub trait CategoryCache: Send + Sync {
    fn get(&self, key: &str) -> Option<StandardCategory>;

    fn put(&self, key: &str, category: StandardCategory);

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// First entry whose key contains `key` or is contained by it.
    fn find_partial(&self, key: &str) -> Option<StandardCategory>;
}

#[derive(Default)]
struct Entries {
    order: Vec<String>,
    map: HashMap<String, StandardCategory>,
}

/// Mutex-guarded cache seeded with the built-in rule table.
///
/// Mappings learned from the AI service are appended after the rules and live
/// for the lifetime of the process.
pub struct InMemoryCategoryCache {
    entries: Mutex<Entries>,
}

impl InMemoryCategoryCache {
    /// Cache pre-filled with [`CATEGORY_RULES`].
    pub fn with_rules() -> Self {
        let cache = Self::empty();
        for (key, category) in CATEGORY_RULES {
            cache.put(key, *category);
        }
        cache
    }

    pub fn empty() -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCategoryCache {
    fn default() -> Self {
        Self::with_rules()
    }
}

impl CategoryCache for InMemoryCategoryCache {
    fn get(&self, key: &str) -> Option<StandardCategory> {
        let entries = self.entries.lock().ok()?;
        entries.map.get(key).copied()
    }

    fn put(&self, key: &str, category: StandardCategory) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.map.insert(key.to_string(), category).is_none() {
            entries.order.push(key.to_string());
        }
    }

    fn find_partial(&self, key: &str) -> Option<StandardCategory> {
        if key.is_empty() {
            return None;
        }
        let entries = self.entries.lock().ok()?;
        entries
            .order
            .iter()
            .find(|k| key.contains(k.as_str()) || k.contains(key))
            .and_then(|k| entries.map.get(k).copied())
    }
}
