//! Background event dispatcher.
//!
//! One `Background` owns the keyword store, the navigation guard and the host
//! collaborators. The host registers each `on_*` handler against its event
//! source and awaits it; handlers take `&mut self`, so events are processed
//! one at a time.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kb_core::Timestamp;

use crate::clock::Clock;
use crate::config::{BlockerConfig, SYNC_AREA};
use crate::context_menu::{ClickInfo, MenuAction, MenuOutcome};
use crate::edit;
use crate::engine::{RuleEngine, RuleSynchronizer};
use crate::error::BlockerError;
use crate::guard::{NavigationEvent, NavigationGuard, TabController, TabId, TabInfo, Verdict};
use crate::messages::{Message, Response};
use crate::storage::SyncStorage;
use crate::store::KeywordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    ChromeUpdate,
    SharedModuleUpdate,
}

/// A single changed key from `storage.onChanged`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub area: String,
    pub key: String,
    #[serde(default)]
    pub new_value: Option<Value>,
}

/// Timers the host must register for expiration sweeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub sweep_interval: Duration,
    pub alarm_name: String,
    pub alarm_period_minutes: u32,
}

pub struct Background<S, E, T, C> {
    config: BlockerConfig,
    store: KeywordStore<S, E>,
    guard: NavigationGuard,
    tabs: T,
    clock: C,
}

impl<S, E, T, C> Background<S, E, T, C>
where
    S: SyncStorage,
    E: RuleEngine,
    T: TabController,
    C: Clock,
{
    pub fn new(config: BlockerConfig, storage: S, engine: E, tabs: T, clock: C) -> Result<Self, BlockerError> {
        let options = config.compiler_options()?;
        let store = KeywordStore::new(
            storage,
            RuleSynchronizer::new(engine, options),
            &config.storage_key,
            config.default_keywords.clone(),
        );
        let guard = NavigationGuard::new(&config.blocked_page_url);

        Ok(Self {
            config,
            store,
            guard,
            tabs,
            clock,
        })
    }

    pub fn config(&self) -> &BlockerConfig {
        &self.config
    }

    pub fn store(&self) -> &KeywordStore<S, E> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut KeywordStore<S, E> {
        &mut self.store
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    pub fn tabs(&self) -> &T {
        &self.tabs
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            sweep_interval: self.config.sweep_interval(),
            alarm_name: self.config.alarm_name.clone(),
            alarm_period_minutes: self.config.alarm_period_minutes,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub async fn on_installed(&mut self, reason: InstallReason) {
        log::info!("Extension installed ({:?})", reason);
        self.store.load(reason == InstallReason::Install).await;
        self.sweep().await;
        self.recheck_all_tabs().await;
    }

    /// Load the list and drop whatever expired while the browser was closed.
    /// Returns how many entries were swept.
    pub async fn on_startup(&mut self) -> usize {
        self.store.load(false).await;
        self.sweep().await
    }

    /// Returns whether the change concerned the block list and altered it.
    pub async fn on_storage_changed(&mut self, change: &StorageChange) -> bool {
        if change.area != SYNC_AREA || change.key != self.config.storage_key {
            return false;
        }
        if !self.store.replace_all(change.new_value.as_ref()).await {
            return false;
        }
        self.recheck_all_tabs().await;
        true
    }

    pub fn on_tab_removed(&mut self, tab_id: TabId) {
        self.guard.forget(tab_id);
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Add a keyword from the settings UI. A timed entry must expire at least
    /// `min_expiration_lead_ms` from now.
    pub async fn add_keyword(&mut self, keyword: &str, expiration: Option<Timestamp>) -> Result<(), BlockerError> {
        edit::check_expiration(expiration, self.clock.now(), self.config.min_expiration_lead_ms)?;
        self.store.add(keyword, expiration).await
    }

    /// Replace the entry at `index`, validating a new expiration the same way.
    pub async fn update_keyword(
        &mut self,
        index: usize,
        keyword: &str,
        expiration: Option<Timestamp>,
    ) -> Result<(), BlockerError> {
        edit::check_expiration(expiration, self.clock.now(), self.config.min_expiration_lead_ms)?;
        self.store.update(index, keyword, expiration).await
    }

    // =========================================================================
    // Expiration
    // =========================================================================

    pub async fn on_alarm(&mut self, name: &str) -> usize {
        if name != self.config.alarm_name {
            return 0;
        }
        self.sweep().await
    }

    pub async fn on_timer(&mut self) -> usize {
        self.sweep().await
    }

    async fn sweep(&mut self) -> usize {
        let now = self.clock.now();
        match self.store.sweep_expired(now).await {
            Ok(removed) => removed,
            Err(e) => {
                log::error!("Expiration sweep failed: {}", e);
                0
            }
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Check a completed navigation or history-state update. Sub-frame events
    /// are ignored and yield `None`.
    pub async fn on_navigation(&mut self, event: &NavigationEvent) -> Option<Verdict> {
        if !event.is_main_frame() {
            return None;
        }

        self.sweep().await;

        let tab = TabInfo {
            id: event.tab_id,
            url: event.url.clone(),
            title: event.title.clone(),
        };
        let now = self.clock.now();
        match self.guard.check(&self.tabs, &tab, self.store.entries(), now).await {
            Ok(verdict) => Some(verdict),
            Err(_) => None,
        }
    }

    /// Re-evaluate every open tab. Returns how many are now blocked.
    pub async fn recheck_all_tabs(&mut self) -> usize {
        let tabs = match self.tabs.query_tabs().await {
            Ok(tabs) => tabs,
            Err(e) => {
                log::error!("Failed to query tabs: {}", e);
                return 0;
            }
        };

        let now = self.clock.now();
        let mut blocked = 0usize;
        for tab in &tabs {
            if let Ok(Verdict::Blocked) = self.guard.check(&self.tabs, tab, self.store.entries(), now).await {
                blocked += 1;
            }
        }
        blocked
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    pub async fn on_message(&mut self, sender: Option<&TabInfo>, message: &Value) -> Response {
        let message = match Message::from_value(message) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("{}", e);
                return Response::failure(e);
            }
        };

        match message {
            Message::UpdateBlockedItems => match self.store.reload().await {
                Ok(count) => Response::with_count(count),
                Err(e) => {
                    log::error!("Failed to update blocked items: {}", e);
                    Response::failure(e.to_string())
                }
            },
            Message::ContentBlocked {
                original_url,
                keyword_found,
            } => {
                let Some(sender) = sender else {
                    return Response::failure("contentBlocked requires a sender tab");
                };
                log::debug!("Page scan in tab {} found {:?}", sender.id, keyword_found);

                self.sweep().await;
                let tab = TabInfo {
                    id: sender.id,
                    url: original_url,
                    title: sender.title.clone(),
                };
                let now = self.clock.now();
                match self
                    .guard
                    .check_report(&self.tabs, &tab, &keyword_found, self.store.entries(), now)
                    .await
                {
                    Ok(Verdict::Blocked) => Response::ok(),
                    Ok(Verdict::Allowed) => Response::failure(format!("{} is not an active keyword", keyword_found)),
                    Err(e) => Response::failure(e.to_string()),
                }
            }
        }
    }

    // =========================================================================
    // Context Menu
    // =========================================================================

    pub async fn on_context_menu(
        &mut self,
        info: &ClickInfo,
        tab: Option<&TabInfo>,
    ) -> Result<MenuOutcome, BlockerError> {
        let Some(action) = MenuAction::from_id(&info.menu_item_id) else {
            return Ok(MenuOutcome::Ignored);
        };
        if action == MenuAction::MoreOptions {
            return Ok(MenuOutcome::OpenPopup);
        }

        let Some(url) = info.target_url(tab.map(|t| t.url.as_str())) else {
            return Ok(MenuOutcome::Ignored);
        };
        let keyword = action
            .keyword_for(url)
            .ok_or_else(|| BlockerError::InvalidUrl(url.to_string()))?;

        match self.store.add(&keyword, None).await {
            Ok(()) => {}
            Err(BlockerError::DuplicateKeyword(_)) => {
                log::debug!("{} is already blocked", keyword);
                return Ok(MenuOutcome::AlreadyBlocked(keyword));
            }
            Err(e) => return Err(e),
        }

        if let Some(tab) = tab {
            let now = self.clock.now();
            match self.guard.check(&self.tabs, tab, self.store.entries(), now).await {
                Ok(verdict) => log::debug!("Tab {} after menu block: {:?}", tab.id, verdict),
                Err(e) => log::warn!("Blocked {} but tab {} was not redirected: {}", keyword, tab.id, e),
            }
        }
        Ok(MenuOutcome::Added(keyword))
    }
}
