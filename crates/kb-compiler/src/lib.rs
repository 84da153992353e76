//! KeywordBlocker Rule Compiler
//!
//! This crate compiles block entries into declarative redirect rules for the
//! browser's request-blocking engine.

pub mod compiler;
pub mod optimizer;

pub use compiler::{
    compile_rules, notice_page_url, original_url_from_notice, CompileError, CompiledRules, CompilerOptions, DeclarativeRule, RuleUpdate,
    MAX_RULE_ID, ORIGINAL_URL_PARAM, ORIGINAL_URL_PLACEHOLDER, RULE_ID_BASE,
};
pub use optimizer::{dedupe_rule_ids, OptimizeStats};
