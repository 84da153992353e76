//! KeywordBlocker background process.
//!
//! Wires the pure pieces from `kb-core` and `kb-compiler` to the browser:
//! the synced block list, the dynamic request-blocking rules, and tab
//! navigation. Browser APIs sit behind three traits so the same logic runs
//! under the wasm host and in tests:
//!
//! - `SyncStorage`: the synced key-value area holding `blockedItems`
//! - `RuleEngine`: the dynamic rule set of the request-blocking engine
//! - `TabController`: tab queries and redirects
//!
//! `Background` owns everything and exposes one handler per browser event.

pub mod background;
pub mod clock;
pub mod config;
pub mod context_menu;
pub mod edit;
pub mod engine;
pub mod error;
pub mod guard;
pub mod messages;
pub mod storage;
pub mod store;

#[cfg(test)]
mod testing;

pub use background::{Background, InstallReason, Schedule, StorageChange};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BlockerConfig, EXPIRATION_ALARM, STORAGE_KEY, SYNC_AREA};
pub use context_menu::{menu_items, ClickInfo, MenuAction, MenuItem, MenuOutcome};
pub use engine::{RuleEngine, RuleSynchronizer};
pub use error::{BlockerError, ConfigError, RuleInstallError, StorageError, TabError};
pub use guard::{NavigationEvent, NavigationGuard, NavigationKind, TabController, TabId, TabInfo, TabState, Verdict};
pub use messages::{Message, Response};
pub use storage::{MemoryStorage, SyncStorage};
pub use store::KeywordStore;
