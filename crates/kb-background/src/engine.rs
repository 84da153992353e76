//! Declarative rule installation.

use async_trait::async_trait;

use kb_compiler::{compile_rules, CompilerOptions, RuleUpdate};
use kb_core::BlockEntry;

use crate::error::RuleInstallError;

/// The browser's request-blocking engine (dynamic rule set).
#[async_trait(?Send)]
pub trait RuleEngine {
    /// IDs of every rule currently installed by this blocker.
    async fn installed_rule_ids(&self) -> Result<Vec<u32>, RuleInstallError>;

    /// Apply removals and additions as one transaction.
    async fn apply(&self, update: RuleUpdate) -> Result<(), RuleInstallError>;
}

/// Compiles entries and swaps the engine's rule set for the result.
pub struct RuleSynchronizer<E> {
    engine: E,
    options: CompilerOptions,
}

impl<E: RuleEngine> RuleSynchronizer<E> {
    pub fn new(engine: E, options: CompilerOptions) -> Self {
        Self { engine, options }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Replace every installed rule with rules for `entries`.
    /// Returns the number of rules installed.
    pub async fn sync(&self, entries: &[BlockEntry]) -> Result<usize, RuleInstallError> {
        let compiled = compile_rules(entries, &self.options);
        if compiled.stats.dropped > 0 {
            log::warn!("{} rules dropped for colliding ids", compiled.stats.dropped);
        }

        let installed = self.engine.installed_rule_ids().await?;
        let count = compiled.rules.len();
        let removed = installed.len();

        self.engine
            .apply(RuleUpdate::replace_all(installed, compiled.rules))
            .await?;

        log::info!("Blocking rules updated: {} removed, {} installed", removed, count);
        Ok(count)
    }
}
