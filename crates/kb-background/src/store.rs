//! In-memory mirror of the persisted block list.
//!
//! Mutations persist first and only then update the mirror, so a failed write
//! leaves the store exactly as it was. Each successful mutation is followed by
//! a full rule recompilation, awaited before the mutation returns.

use serde_json::Value;

use kb_core::types::position_of_keyword;
use kb_core::{normalize_items, sweep, to_stored_value, BlockEntry, Timestamp};

use crate::edit;
use crate::engine::{RuleEngine, RuleSynchronizer};
use crate::error::BlockerError;
use crate::storage::SyncStorage;

pub struct KeywordStore<S, E> {
    storage: S,
    rules: RuleSynchronizer<E>,
    key: String,
    default_keywords: Vec<String>,
    entries: Vec<BlockEntry>,
}

impl<S: SyncStorage, E: RuleEngine> KeywordStore<S, E> {
    pub fn new(storage: S, rules: RuleSynchronizer<E>, key: &str, default_keywords: Vec<String>) -> Self {
        Self {
            storage,
            rules,
            key: key.to_string(),
            default_keywords,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn rules(&self) -> &RuleSynchronizer<E> {
        &self.rules
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Populate the mirror from storage and install matching rules.
    ///
    /// When nothing is stored and `seed_defaults` is set (first install), the
    /// default keywords are written. A storage failure yields an empty list.
    pub async fn load(&mut self, seed_defaults: bool) -> &[BlockEntry] {
        let stored = match self.storage.get(&self.key).await {
            Ok(stored) => stored,
            Err(e) => {
                log::error!("Failed to load blocked items: {}", e);
                self.entries.clear();
                return &self.entries;
            }
        };

        match stored {
            Some(value) => self.install_value(&value),
            None if seed_defaults => {
                let defaults = self.default_entries();
                log::info!("Seeding {} default blocked items", defaults.len());
                if let Err(e) = self.storage.set(&self.key, to_stored_value(&defaults)).await {
                    log::error!("Failed to persist default blocked items: {}", e);
                }
                self.entries = defaults;
            }
            None => self.entries.clear(),
        }

        self.recompile_logged().await;
        &self.entries
    }

    /// Re-read storage, replacing the mirror and recompiling.
    /// Unlike `load`, failures are returned; a failed read leaves the mirror
    /// untouched.
    pub async fn reload(&mut self) -> Result<usize, BlockerError> {
        let stored = self.storage.get(&self.key).await?;
        self.install_value(stored.as_ref().unwrap_or(&Value::Null));
        self.rules.sync(&self.entries).await?;
        Ok(self.entries.len())
    }

    /// Install a value that arrived from another writer. It replaces the
    /// mirror wholesale; nothing is written back. Returns whether the entries
    /// changed (our own writes echo back unchanged).
    pub async fn replace_all(&mut self, value: Option<&Value>) -> bool {
        let before = std::mem::take(&mut self.entries);
        self.install_value(value.unwrap_or(&Value::Null));
        if self.entries == before {
            log::debug!("Storage change matches current blocked items");
            return false;
        }
        self.recompile_logged().await;
        true
    }

    fn install_value(&mut self, value: &Value) {
        let normalized = normalize_items(value);
        if normalized.dropped > 0 {
            log::warn!("Ignored {} invalid stored items", normalized.dropped);
        }
        log::debug!("Loaded {} blocked items", normalized.entries.len());
        self.entries = normalized.entries;
    }

    fn default_entries(&self) -> Vec<BlockEntry> {
        let mut entries: Vec<BlockEntry> = Vec::with_capacity(self.default_keywords.len());
        for keyword in &self.default_keywords {
            match BlockEntry::permanent(keyword) {
                Ok(entry) if position_of_keyword(&entries, &entry.keyword, None).is_none() => entries.push(entry),
                _ => log::warn!("Skipping default keyword {:?}", keyword),
            }
        }
        entries
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append a keyword unless an equal one (ignoring case) exists.
    pub async fn add(&mut self, keyword: &str, expiration: Option<Timestamp>) -> Result<(), BlockerError> {
        let next = edit::added(&self.entries, keyword, expiration)?;
        log::info!("Adding blocked item: {}", keyword.trim());
        self.commit(next).await
    }

    /// Replace the entry at `index`.
    pub async fn update(
        &mut self,
        index: usize,
        keyword: &str,
        expiration: Option<Timestamp>,
    ) -> Result<(), BlockerError> {
        let next = edit::updated(&self.entries, index, keyword, expiration)?;
        log::info!("Updating blocked item {}: {} -> {}", index, self.entries[index].keyword, next[index].keyword);
        self.commit(next).await
    }

    /// Remove and return the entry at `index`.
    pub async fn remove(&mut self, index: usize) -> Result<BlockEntry, BlockerError> {
        let (next, removed) = edit::removed(&self.entries, index)?;
        log::info!("Removing blocked item: {}", removed.keyword);
        self.commit(next).await?;
        Ok(removed)
    }

    /// Drop expired entries; persists and recompiles only when something
    /// expired. Returns how many were removed.
    pub async fn sweep_expired(&mut self, now: Timestamp) -> Result<usize, BlockerError> {
        let result = sweep(&self.entries, now);
        if !result.changed() {
            return Ok(0);
        }

        let removed = result.removed_count();
        self.commit(result.survivors).await?;
        Ok(removed)
    }

    /// Recompile and install rules for the current entries.
    pub async fn recompile(&self) -> Result<usize, BlockerError> {
        Ok(self.rules.sync(&self.entries).await?)
    }

    async fn commit(&mut self, next: Vec<BlockEntry>) -> Result<(), BlockerError> {
        if let Err(e) = self.storage.set(&self.key, to_stored_value(&next)).await {
            log::error!("Failed to save blocked items: {}", e);
            return Err(e.into());
        }
        self.entries = next;
        self.recompile_logged().await;
        Ok(())
    }

    async fn recompile_logged(&self) {
        if let Err(e) = self.rules.sync(&self.entries).await {
            log::error!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{engine_sync, FlakyStorage, MemoryRuleEngine};
    use crate::storage::MemoryStorage;

    const KEY: &str = "blockedItems";

    fn store_with(value: Option<serde_json::Value>) -> KeywordStore<FlakyStorage, MemoryRuleEngine> {
        let inner = match value {
            Some(v) => MemoryStorage::with_value(KEY, v),
            None => MemoryStorage::new(),
        };
        KeywordStore::new(
            FlakyStorage::new(inner),
            engine_sync(MemoryRuleEngine::default()),
            KEY,
            vec!["default-one".to_string(), "Default-One".to_string(), "default-two".to_string()],
        )
    }

    fn keywords<S: SyncStorage, E: RuleEngine>(store: &KeywordStore<S, E>) -> Vec<String> {
        store.entries().iter().map(|e| e.keyword.clone()).collect()
    }

    #[tokio::test]
    async fn first_install_seeds_defaults() {
        let mut store = store_with(None);
        store.load(true).await;

        assert_eq!(keywords(&store), vec!["default-one", "default-two"]);
        assert_eq!(
            store.storage().inner().snapshot(KEY),
            Some(json!(["default-one", "default-two"]))
        );
        assert_eq!(store.rules().engine().installed().len(), 2);
    }

    #[tokio::test]
    async fn startup_without_value_stays_empty() {
        let mut store = store_with(None);
        assert!(store.load(false).await.is_empty());
        assert_eq!(store.storage().inner().snapshot(KEY), None);
    }

    #[tokio::test]
    async fn load_normalizes_stored_shapes() {
        let mut store = store_with(Some(json!(["a", {"keyword": "b", "expiration": 5}, 3])));
        store.load(true).await;
        assert_eq!(
            store.entries(),
            &[BlockEntry::new("a", None).unwrap(), BlockEntry::new("b", Some(5)).unwrap()]
        );
    }

    #[tokio::test]
    async fn load_fails_soft_on_storage_error() {
        let mut store = store_with(Some(json!(["a"])));
        store.storage().fail_reads(true);
        assert!(store.load(true).await.is_empty());
        assert!(matches!(store.reload().await, Err(BlockerError::Persistence(_))));
    }

    #[tokio::test]
    async fn add_persists_and_recompiles() {
        let mut store = store_with(Some(json!([])));
        store.load(false).await;

        store.add("  fegz ", None).await.unwrap();
        store.add("timed", Some(99)).await.unwrap();

        assert_eq!(
            store.storage().inner().snapshot(KEY),
            Some(json!(["fegz", {"keyword": "timed", "expiration": 99}]))
        );
        let filters: Vec<String> = store
            .rules()
            .engine()
            .installed()
            .into_iter()
            .map(|r| r.keyword_filter)
            .collect();
        assert_eq!(filters, vec!["*fegz*", "*timed*"]);
    }

    #[tokio::test]
    async fn duplicate_add_leaves_store_unchanged() {
        let mut store = store_with(Some(json!([])));
        store.load(false).await;

        store.add("example.com/test-page", None).await.unwrap();
        let before = store.entries().to_vec();
        let applies = store.rules().engine().apply_count();

        let err = store.add("EXAMPLE.com/Test-Page", None).await.unwrap_err();
        assert!(matches!(err, BlockerError::DuplicateKeyword(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries(), before.as_slice());
        assert_eq!(store.rules().engine().apply_count(), applies);
    }

    #[tokio::test]
    async fn empty_keyword_is_rejected() {
        let mut store = store_with(Some(json!([])));
        store.load(false).await;
        assert!(matches!(
            store.add("   ", None).await,
            Err(BlockerError::InvalidEntry(kb_core::EntryError::EmptyKeyword))
        ));
    }

    #[tokio::test]
    async fn update_checks_collisions_against_other_entries() {
        let mut store = store_with(Some(json!(["one", "two"])));
        store.load(false).await;

        // Renaming an entry to a different case of itself is fine
        store.update(0, "ONE", Some(50)).await.unwrap();
        assert_eq!(store.entries()[0], BlockEntry::new("ONE", Some(50)).unwrap());

        assert!(matches!(
            store.update(0, "Two", None).await,
            Err(BlockerError::DuplicateKeyword(_))
        ));
        assert!(matches!(
            store.update(5, "three", None).await,
            Err(BlockerError::IndexOutOfRange { index: 5, len: 2 })
        ));
        assert_eq!(keywords(&store), vec!["ONE", "two"]);
    }

    #[tokio::test]
    async fn remove_by_index() {
        let mut store = store_with(Some(json!(["one", "two", "three"])));
        store.load(false).await;

        let removed = store.remove(1).await.unwrap();
        assert_eq!(removed.keyword, "two");
        assert_eq!(keywords(&store), vec!["one", "three"]);

        let ids: Vec<u32> = store.rules().engine().installed().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert!(matches!(
            store.remove(2).await,
            Err(BlockerError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[tokio::test]
    async fn failed_write_is_a_no_op() {
        let mut store = store_with(Some(json!(["one"])));
        store.load(false).await;
        store.storage().fail_writes(true);

        assert!(matches!(store.add("two", None).await, Err(BlockerError::Persistence(_))));
        assert!(matches!(store.remove(0).await, Err(BlockerError::Persistence(_))));
        assert_eq!(keywords(&store), vec!["one"]);
        assert_eq!(store.rules().engine().installed().len(), 1);
    }

    #[tokio::test]
    async fn rule_install_failure_does_not_undo_mutation() {
        let mut store = store_with(Some(json!([])));
        store.load(false).await;
        store.rules().engine().fail(true);

        store.add("kept", None).await.unwrap();
        assert_eq!(keywords(&store), vec!["kept"]);
        assert!(matches!(store.recompile().await, Err(BlockerError::RuleInstall(_))));

        store.rules().engine().fail(false);
        assert_eq!(store.recompile().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sweep_persists_survivors_only_when_changed() {
        let mut store = store_with(Some(json!([
            {"keyword": "expired", "expiration": 100},
            {"keyword": "valid", "expiration": 10_000},
            "noexpiry"
        ])));
        store.load(false).await;
        let applies = store.rules().engine().apply_count();

        assert_eq!(store.sweep_expired(1_000).await.unwrap(), 1);
        assert_eq!(keywords(&store), vec!["valid", "noexpiry"]);
        assert_eq!(
            store.storage().inner().snapshot(KEY),
            Some(json!([{"keyword": "valid", "expiration": 10_000}, "noexpiry"]))
        );
        assert_eq!(store.rules().engine().apply_count(), applies + 1);

        assert_eq!(store.sweep_expired(1_000).await.unwrap(), 0);
        assert_eq!(store.rules().engine().apply_count(), applies + 1);
    }

    #[tokio::test]
    async fn external_change_replaces_mirror() {
        let mut store = store_with(Some(json!(["one"])));
        store.load(false).await;

        assert!(store.replace_all(Some(&json!(["x", "y"]))).await);
        assert_eq!(keywords(&store), vec!["x", "y"]);
        assert_eq!(store.rules().engine().installed().len(), 2);

        let applies = store.rules().engine().apply_count();
        assert!(!store.replace_all(Some(&json!(["x", "y"]))).await);
        assert_eq!(store.rules().engine().apply_count(), applies);

        assert!(store.replace_all(None).await);
        assert!(store.is_empty());
        assert!(store.rules().engine().installed().is_empty());
    }
}
