//! Context menu entries for blocking the current page or link.

use serde::{Deserialize, Serialize};

use kb_core::url::{domain_keyword, page_keyword};

pub const MENU_ROOT: &str = "urlBlockerMenu";
pub const BLOCK_SINGLE_PAGE: &str = "blockSinglePage";
pub const BLOCK_ENTIRE_DOMAIN: &str = "blockEntireDomain";
pub const MORE_OPTIONS: &str = "moreOptions";

const CONTEXTS: &[&str] = &["page", "link"];

/// A menu item as passed to `contextMenus.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<&'static str>,
    pub title: &'static str,
    pub contexts: &'static [&'static str],
}

/// The full menu: one parent with three children.
pub fn menu_items() -> Vec<MenuItem> {
    let child = |id: &'static str, title: &'static str| MenuItem {
        id,
        parent_id: Some(MENU_ROOT),
        title,
        contexts: CONTEXTS,
    };
    vec![
        MenuItem {
            id: MENU_ROOT,
            parent_id: None,
            title: "Block this page",
            contexts: CONTEXTS,
        },
        child(BLOCK_SINGLE_PAGE, "Block single page"),
        child(BLOCK_ENTIRE_DOMAIN, "Block entire domain"),
        child(MORE_OPTIONS, "More..."),
    ]
}

/// Click payload from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickInfo {
    pub menu_item_id: String,
    #[serde(default)]
    pub link_url: Option<String>,
}

impl ClickInfo {
    /// A clicked link takes precedence over the page the menu was opened on.
    pub fn target_url<'a>(&'a self, tab_url: Option<&'a str>) -> Option<&'a str> {
        self.link_url
            .as_deref()
            .or(tab_url)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    BlockSinglePage,
    BlockEntireDomain,
    MoreOptions,
}

impl MenuAction {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            BLOCK_SINGLE_PAGE => Some(Self::BlockSinglePage),
            BLOCK_ENTIRE_DOMAIN => Some(Self::BlockEntireDomain),
            MORE_OPTIONS => Some(Self::MoreOptions),
            _ => None,
        }
    }

    /// Keyword this action blocks for `url`; `None` for non-blocking actions
    /// or URLs without a host.
    pub fn keyword_for(self, url: &str) -> Option<String> {
        match self {
            Self::BlockSinglePage => page_keyword(url),
            Self::BlockEntireDomain => domain_keyword(url),
            Self::MoreOptions => None,
        }
    }
}

/// What a menu click did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    Added(String),
    /// The keyword was already present; nothing changed
    AlreadyBlocked(String),
    /// The host should open the popup
    OpenPopup,
    Ignored,
}
