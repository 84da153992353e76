//! File-backed stand-ins for the browser collaborators.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};

use kb_background::{RuleEngine, RuleInstallError, StorageError, SyncStorage, TabController, TabError, TabId, TabInfo};
use kb_compiler::{DeclarativeRule, RuleUpdate};

/// A JSON object on disk, one property per storage key.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_object(&self) -> Result<Map<String, Value>, StorageError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StorageError(format!("Failed to read '{}': {}", self.path.display(), e))),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&text) {
            Ok(Value::Object(object)) => Ok(object),
            Ok(_) => Err(StorageError(format!("'{}' does not hold a JSON object", self.path.display()))),
            Err(e) => Err(StorageError(format!("Invalid JSON in '{}': {}", self.path.display(), e))),
        }
    }
}

#[async_trait(?Send)]
impl SyncStorage for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.read_object().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut object = self.read_object().await?;
        object.insert(key.to_string(), value);

        let text = serde_json::to_string_pretty(&Value::Object(object))
            .map_err(|e| StorageError(e.to_string()))?;
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| StorageError(format!("Failed to write '{}': {}", self.path.display(), e)))
    }
}

/// The installed rule set, kept as a JSON array of rules.
pub struct RulesFile {
    path: PathBuf,
}

impl RulesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn rules(&self) -> Result<Vec<DeclarativeRule>, RuleInstallError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RuleInstallError(format!("Failed to read '{}': {}", self.path.display(), e)));
            }
        };
        serde_json::from_str(&text)
            .map_err(|e| RuleInstallError(format!("Invalid rules in '{}': {}", self.path.display(), e)))
    }
}

#[async_trait(?Send)]
impl RuleEngine for RulesFile {
    async fn installed_rule_ids(&self) -> Result<Vec<u32>, RuleInstallError> {
        Ok(self.rules().await?.iter().map(|rule| rule.id).collect())
    }

    async fn apply(&self, update: RuleUpdate) -> Result<(), RuleInstallError> {
        let mut rules = self.rules().await?;
        rules.retain(|rule| !update.remove_rule_ids.contains(&rule.id));

        for rule in update.add_rules {
            if rules.iter().any(|existing| existing.id == rule.id) {
                return Err(RuleInstallError(format!("Rule with id {} already exists", rule.id)));
            }
            rules.push(rule);
        }

        let text = serde_json::to_string_pretty(&rules).map_err(|e| RuleInstallError(e.to_string()))?;
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| RuleInstallError(format!("Failed to write '{}': {}", self.path.display(), e)))
    }
}

/// No browser, so no tabs.
pub struct NoTabs;

#[async_trait(?Send)]
impl TabController for NoTabs {
    async fn query_tabs(&self) -> Result<Vec<TabInfo>, TabError> {
        Ok(Vec::new())
    }

    async fn update_url(&self, tab_id: TabId, _url: &str) -> Result<(), TabError> {
        Err(TabError(format!("No tab with id: {}", tab_id)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use kb_background::RuleSynchronizer;
    use kb_compiler::CompilerOptions;
    use kb_core::BlockEntry;
    use tempfile::TempDir;

    #[tokio::test]
    async fn storage_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();
        let storage = JsonFileStorage::new(&path);

        assert_eq!(storage.get("blockedItems").await.unwrap(), None);
        storage.set("blockedItems", json!(["fegz"])).await.unwrap();

        assert_eq!(storage.get("blockedItems").await.unwrap(), Some(json!(["fegz"])));
        assert_eq!(storage.get("theme").await.unwrap(), Some(json!("dark")));
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("missing.json"));
        assert_eq!(storage.get("blockedItems").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(JsonFileStorage::new(&path).get("blockedItems").await.is_err());
    }

    #[tokio::test]
    async fn rules_file_is_replaced_on_each_sync() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        let sync = RuleSynchronizer::new(
            RulesFile::new(&path),
            CompilerOptions::new("chrome-extension://id/blocked.html", 1).unwrap(),
        );

        let first = vec![BlockEntry::permanent("a").unwrap(), BlockEntry::permanent("b").unwrap()];
        assert_eq!(sync.sync(&first).await.unwrap(), 2);
        let second = vec![BlockEntry::permanent("c").unwrap()];
        assert_eq!(sync.sync(&second).await.unwrap(), 1);

        let rules = sync.engine().rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, 1);
        assert_eq!(rules[0].keyword_filter, "*c*");
    }
}
