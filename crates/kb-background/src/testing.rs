//! In-memory collaborators for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use kb_compiler::{CompilerOptions, DeclarativeRule, RuleUpdate};

use crate::engine::{RuleEngine, RuleSynchronizer};
use crate::error::{RuleInstallError, StorageError, TabError};
use crate::guard::{TabController, TabId, TabInfo};
use crate::storage::{MemoryStorage, SyncStorage};

pub const BLOCKED_PAGE: &str = "chrome-extension://id/blocked.html";

pub fn engine_sync(engine: MemoryRuleEngine) -> RuleSynchronizer<MemoryRuleEngine> {
    RuleSynchronizer::new(engine, CompilerOptions::new(BLOCKED_PAGE, 1).unwrap())
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl FlakyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

#[async_trait(?Send)]
impl SyncStorage for FlakyStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        if self.fail_reads.get() {
            return Err(StorageError("quota read failure".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError("QUOTA_BYTES_PER_ITEM exceeded".to_string()));
        }
        self.inner.set(key, value).await
    }
}

// =============================================================================
// Rule Engine
// =============================================================================

/// Behaves like a dynamic rule set: removals first, then additions, and an
/// addition whose ID is still taken rejects the whole update.
#[derive(Debug, Default)]
pub struct MemoryRuleEngine {
    rules: RefCell<BTreeMap<u32, DeclarativeRule>>,
    applies: Cell<usize>,
    failing: Cell<bool>,
}

impl MemoryRuleEngine {
    pub fn installed(&self) -> Vec<DeclarativeRule> {
        self.rules.borrow().values().cloned().collect()
    }

    pub fn apply_count(&self) -> usize {
        self.applies.get()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.set(failing);
    }
}

#[async_trait(?Send)]
impl RuleEngine for MemoryRuleEngine {
    async fn installed_rule_ids(&self) -> Result<Vec<u32>, RuleInstallError> {
        Ok(self.rules.borrow().keys().copied().collect())
    }

    async fn apply(&self, update: RuleUpdate) -> Result<(), RuleInstallError> {
        if self.failing.get() {
            return Err(RuleInstallError("engine unavailable".to_string()));
        }

        let mut next = self.rules.borrow().clone();
        for id in &update.remove_rule_ids {
            next.remove(id);
        }
        for rule in update.add_rules {
            if next.contains_key(&rule.id) {
                return Err(RuleInstallError(format!("Rule with id {} already exists", rule.id)));
            }
            next.insert(rule.id, rule);
        }

        *self.rules.borrow_mut() = next;
        self.applies.set(self.applies.get() + 1);
        Ok(())
    }
}

// =============================================================================
// Tabs
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryTabs {
    tabs: RefCell<BTreeMap<TabId, TabInfo>>,
    redirects: RefCell<Vec<(TabId, String)>>,
    failing: Cell<bool>,
}

impl MemoryTabs {
    pub fn open(&self, id: TabId, url: &str, title: &str) {
        self.tabs.borrow_mut().insert(
            id,
            TabInfo {
                id,
                url: url.to_string(),
                title: title.to_string(),
            },
        );
    }

    pub fn url(&self, id: TabId) -> Option<String> {
        self.tabs.borrow().get(&id).map(|t| t.url.clone())
    }

    pub fn redirects(&self) -> Vec<(TabId, String)> {
        self.redirects.borrow().clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.set(failing);
    }
}

#[async_trait(?Send)]
impl TabController for MemoryTabs {
    async fn query_tabs(&self) -> Result<Vec<TabInfo>, TabError> {
        Ok(self.tabs.borrow().values().cloned().collect())
    }

    async fn update_url(&self, tab_id: TabId, url: &str) -> Result<(), TabError> {
        if self.failing.get() {
            return Err(TabError(format!("No tab with id: {}", tab_id)));
        }
        if let Some(tab) = self.tabs.borrow_mut().get_mut(&tab_id) {
            tab.url = url.to_string();
            tab.title.clear();
        }
        self.redirects.borrow_mut().push((tab_id, url.to_string()));
        Ok(())
    }
}
