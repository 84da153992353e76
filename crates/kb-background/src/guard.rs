//! Per-tab navigation guard.
//!
//! Each tab moves from `Unchecked` to `Checked(Allowed)` or
//! `Checked(Blocked)` on every main-frame navigation. A tab already showing
//! the notice page is never redirected again.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kb_compiler::notice_page_url;
use kb_core::{find_content_match, BlockEntry, Timestamp};

use crate::error::TabError;

pub type TabId = i32;

/// Frame ID of a tab's top-level document.
pub const MAIN_FRAME_ID: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Browser tabs.
#[async_trait(?Send)]
pub trait TabController {
    async fn query_tabs(&self) -> Result<Vec<TabInfo>, TabError>;

    /// Point the tab at a new location.
    async fn update_url(&self, tab_id: TabId, url: &str) -> Result<(), TabError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationKind {
    Completed,
    HistoryStateUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    pub kind: NavigationKind,
    pub tab_id: TabId,
    pub frame_id: i32,
    pub url: String,
    #[serde(default)]
    pub title: String,
}

impl NavigationEvent {
    pub fn is_main_frame(&self) -> bool {
        self.frame_id == MAIN_FRAME_ID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabState {
    #[default]
    Unchecked,
    Checked(Verdict),
}

pub struct NavigationGuard {
    blocked_page_url: String,
    tabs: HashMap<TabId, TabState>,
}

impl NavigationGuard {
    pub fn new(blocked_page_url: &str) -> Self {
        Self {
            blocked_page_url: blocked_page_url.to_string(),
            tabs: HashMap::new(),
        }
    }

    pub fn blocked_page_url(&self) -> &str {
        &self.blocked_page_url
    }

    pub fn is_notice_page(&self, url: &str) -> bool {
        url.starts_with(&self.blocked_page_url)
    }

    pub fn state(&self, tab_id: TabId) -> TabState {
        self.tabs.get(&tab_id).copied().unwrap_or_default()
    }

    pub fn forget(&mut self, tab_id: TabId) {
        self.tabs.remove(&tab_id);
    }

    /// Match the tab's URL and title; redirect it to the notice page on a hit.
    pub async fn check<T: TabController>(
        &mut self,
        tabs: &T,
        tab: &TabInfo,
        entries: &[BlockEntry],
        now: Timestamp,
    ) -> Result<Verdict, TabError> {
        let matched = find_content_match(&tab.url, &tab.title, entries, now).map(|e| e.keyword.as_str());
        self.settle(tabs, tab, matched).await
    }

    /// Redirect for a keyword reported by the in-page scanner, provided the
    /// keyword is still an active entry. Falls back to URL/title matching.
    pub async fn check_report<T: TabController>(
        &mut self,
        tabs: &T,
        tab: &TabInfo,
        keyword_found: &str,
        entries: &[BlockEntry],
        now: Timestamp,
    ) -> Result<Verdict, TabError> {
        let reported = entries
            .iter()
            .find(|e| e.is_active(now) && e.same_keyword(keyword_found))
            .map(|e| e.keyword.as_str());
        let matched = reported.or_else(|| {
            find_content_match(&tab.url, &tab.title, entries, now).map(|e| e.keyword.as_str())
        });
        self.settle(tabs, tab, matched).await
    }

    async fn settle<T: TabController>(
        &mut self,
        tabs: &T,
        tab: &TabInfo,
        matched: Option<&str>,
    ) -> Result<Verdict, TabError> {
        if self.is_notice_page(&tab.url) {
            self.tabs.insert(tab.id, TabState::Checked(Verdict::Blocked));
            return Ok(Verdict::Blocked);
        }

        let Some(keyword) = matched else {
            self.tabs.insert(tab.id, TabState::Checked(Verdict::Allowed));
            return Ok(Verdict::Allowed);
        };

        log::info!("Blocking tab {} ({}) on keyword {:?}", tab.id, tab.url, keyword);
        let target = notice_page_url(&self.blocked_page_url, &tab.url);
        if let Err(e) = tabs.update_url(tab.id, &target).await {
            log::error!("Failed to redirect tab {}: {}", tab.id, e);
            self.tabs.insert(tab.id, TabState::Unchecked);
            return Err(e);
        }

        self.tabs.insert(tab.id, TabState::Checked(Verdict::Blocked));
        Ok(Verdict::Blocked)
    }
}
