use std::collections::HashSet;

use crate::compiler::DeclarativeRule;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub dropped: usize,
}

/// Drop rules whose ID was already taken by an earlier rule.
///
/// Index-derived IDs never collide, so this only fires if a caller hands in a
/// hand-built rule list.
pub fn dedupe_rule_ids(rules: &mut Vec<DeclarativeRule>) -> OptimizeStats {
    let before = rules.len();
    let mut seen: HashSet<u32> = HashSet::with_capacity(before);
    let mut dropped = 0usize;

    rules.retain(|rule| {
        if seen.insert(rule.id) {
            true
        } else {
            log::warn!("Dropping rule with duplicate id {} ({})", rule.id, rule.keyword_filter);
            dropped += 1;
            false
        }
    });

    OptimizeStats {
        before,
        after: rules.len(),
        dropped,
    }
}
