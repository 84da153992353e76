//! Entry-to-rule compilation.
//!
//! Rule IDs are `RULE_ID_BASE + index` and carry no identity across
//! compilations: the full rule set is re-derived from scratch every time and
//! installed as one atomic replace.

use serde::{Deserialize, Serialize};

use kb_core::BlockEntry;

use crate::optimizer::{dedupe_rule_ids, OptimizeStats};

/// First rule ID; the blocking engine rejects IDs below 1.
pub const RULE_ID_BASE: u32 = 1;

/// Query parameter carrying the blocked URL to the notice page.
pub const ORIGINAL_URL_PARAM: &str = "originalUrl";

/// Placeholder in a redirect template, replaced by the encoded original URL.
pub const ORIGINAL_URL_PLACEHOLDER: &str = "{originalUrl}";

/// Largest rule ID the engine accepts (rule IDs are positive 32-bit ints).
pub const MAX_RULE_ID: u32 = i32::MAX as u32;

const MAIN_FRAME: &str = "main_frame";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Blocked page URL must not be empty")]
    EmptyBlockedPageUrl,
    #[error("Rule ID base must be between 1 and 2147483647")]
    InvalidRuleIdBase,
}

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    blocked_page_url: String,
    rule_id_base: u32,
}

impl CompilerOptions {
    pub fn new(blocked_page_url: &str, rule_id_base: u32) -> Result<Self, CompileError> {
        let blocked_page_url = blocked_page_url.trim();
        if blocked_page_url.is_empty() {
            return Err(CompileError::EmptyBlockedPageUrl);
        }
        if rule_id_base == 0 || rule_id_base > MAX_RULE_ID {
            return Err(CompileError::InvalidRuleIdBase);
        }
        Ok(Self {
            blocked_page_url: blocked_page_url.to_string(),
            rule_id_base,
        })
    }

    pub fn blocked_page_url(&self) -> &str {
        &self.blocked_page_url
    }

    pub fn rule_id_base(&self) -> u32 {
        self.rule_id_base
    }

    /// Notice page URL with the placeholder for the original URL.
    pub fn redirect_template(&self) -> String {
        let separator = if self.blocked_page_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            self.blocked_page_url, separator, ORIGINAL_URL_PARAM, ORIGINAL_URL_PLACEHOLDER
        )
    }
}

// =============================================================================
// Rules
// =============================================================================

/// A redirect rule derived from one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativeRule {
    pub id: u32,
    pub priority: u32,
    /// Lowercased keyword wrapped in `*` wildcards
    pub keyword_filter: String,
    /// Notice page URL template containing `{originalUrl}`
    pub redirect_target: String,
    pub resource_types: Vec<String>,
}

impl DeclarativeRule {
    /// Expand the redirect template for a concrete blocked URL.
    pub fn redirect_url(&self, original_url: &str) -> String {
        self.redirect_target
            .replace(ORIGINAL_URL_PLACEHOLDER, &encode_component(original_url))
    }

    /// Evaluate the wildcard filter against `url`, ignoring case.
    ///
    /// `*` matches any run of characters; everything else is literal. This
    /// follows the engine, so a `*` inside the keyword is a wildcard here
    /// while `kb_core::matches_url` treats it literally.
    pub fn matches(&self, url: &str) -> bool {
        wildcard_match(&self.keyword_filter.to_lowercase(), &url.to_lowercase())
    }
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Notice page URL carrying `original_url`, as a tab redirect target.
pub fn notice_page_url(blocked_page_url: &str, original_url: &str) -> String {
    let separator = if blocked_page_url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}={}",
        blocked_page_url,
        separator,
        ORIGINAL_URL_PARAM,
        encode_component(original_url)
    )
}

/// Decode the original URL from a notice page URL, for display.
pub fn original_url_from_notice(notice_url: &str) -> Option<String> {
    let parsed = url::Url::parse(notice_url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == ORIGINAL_URL_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn wildcard_match(filter: &str, haystack: &str) -> bool {
    let segments: Vec<&str> = filter.split('*').collect();
    let last = segments.len() - 1;
    let mut pos = 0usize;

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            if !haystack.starts_with(segment) {
                return false;
            }
            pos = segment.len();
        } else if i == last {
            return haystack.len() >= pos + segment.len() && haystack[pos..].ends_with(segment);
        } else {
            match haystack[pos..].find(segment) {
                Some(found) => pos += found + segment.len(),
                None => return false,
            }
        }
    }

    // Filter without wildcards must match the whole URL
    last > 0 || haystack.len() == pos
}

/// Output of one compilation.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub rules: Vec<DeclarativeRule>,
    pub stats: OptimizeStats,
}

/// Compile entries into one redirect rule each.
pub fn compile_rules(entries: &[BlockEntry], options: &CompilerOptions) -> CompiledRules {
    let redirect_target = options.redirect_template();

    let mut out_of_range = 0usize;
    let mut rules: Vec<DeclarativeRule> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let Some(id) = rule_id(options.rule_id_base, index) else {
                log::warn!("No rule ID left for {:?} at index {}", entry.keyword, index);
                out_of_range += 1;
                return None;
            };
            Some(DeclarativeRule {
                id,
                priority: 1,
                keyword_filter: format!("*{}*", entry.normalized_keyword()),
                redirect_target: redirect_target.clone(),
                resource_types: vec![MAIN_FRAME.to_string()],
            })
        })
        .collect();

    let mut stats = dedupe_rule_ids(&mut rules);
    stats.before += out_of_range;
    stats.dropped += out_of_range;
    log::debug!("Compiled {} rules from {} entries", stats.after, entries.len());

    CompiledRules { rules, stats }
}

fn rule_id(base: u32, index: usize) -> Option<u32> {
    u32::try_from(index)
        .ok()
        .and_then(|index| base.checked_add(index))
        .filter(|id| *id <= MAX_RULE_ID)
}

// =============================================================================
// Installation
// =============================================================================

/// One atomic update for the blocking engine: drop every rule this blocker
/// installed before, then add the fresh set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub remove_rule_ids: Vec<u32>,
    pub add_rules: Vec<DeclarativeRule>,
}

impl RuleUpdate {
    pub fn replace_all(installed_ids: Vec<u32>, rules: Vec<DeclarativeRule>) -> Self {
        Self {
            remove_rule_ids: installed_ids,
            add_rules: rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const BLOCKED: &str = "chrome-extension://id/blocked.html";

    fn options() -> CompilerOptions {
        CompilerOptions::new(BLOCKED, RULE_ID_BASE).unwrap()
    }

    fn entries(keywords: &[&str]) -> Vec<BlockEntry> {
        keywords.iter().map(|k| BlockEntry::permanent(k).unwrap()).collect()
    }

    #[test]
    fn one_rule_per_entry_with_unique_ids() {
        let compiled = compile_rules(&entries(&["Fegz", "example.com/page", "other"]), &options());
        assert_eq!(compiled.rules.len(), 3);

        let ids: HashSet<u32> = compiled.rules.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(compiled.rules[0].id, 1);
        assert_eq!(compiled.rules[2].id, 3);
        assert_eq!(compiled.stats.dropped, 0);
    }

    #[test]
    fn filter_is_lowercased_and_wrapped() {
        let compiled = compile_rules(&entries(&["FeGz"]), &options());
        let rule = &compiled.rules[0];
        assert_eq!(rule.keyword_filter, "*fegz*");
        assert_eq!(rule.resource_types, vec!["main_frame".to_string()]);
        assert_eq!(rule.redirect_target, format!("{}?originalUrl={{originalUrl}}", BLOCKED));
    }

    #[test]
    fn ids_are_rederived_after_removal() {
        let compiled = compile_rules(&entries(&["a", "b", "c"]), &options());
        let after = compile_rules(&entries(&["a", "c"]), &options());
        assert_eq!(compiled.rules[2].keyword_filter, "*c*");
        assert_eq!(after.rules[1].keyword_filter, "*c*");
        assert_eq!(after.rules[1].id, 2);
    }

    #[test]
    fn empty_entries_compile_to_nothing() {
        assert!(compile_rules(&[], &options()).rules.is_empty());
    }

    #[test]
    fn redirect_url_encodes_original() {
        let compiled = compile_rules(&entries(&["fegz"]), &options());
        let redirect = compiled.rules[0].redirect_url("https://example.com/fegz?a=1&b=2");
        assert_eq!(
            redirect,
            format!("{}?originalUrl=https%3A%2F%2Fexample.com%2Ffegz%3Fa%3D1%26b%3D2", BLOCKED)
        );
    }

    #[test]
    fn notice_url_round_trips_original() {
        let notice = notice_page_url(BLOCKED, "https://example.com/a b?x=1&y=2");
        assert!(notice.starts_with(BLOCKED));
        assert_eq!(
            original_url_from_notice(&notice).as_deref(),
            Some("https://example.com/a b?x=1&y=2")
        );
        assert_eq!(original_url_from_notice(BLOCKED), None);
        assert_eq!(original_url_from_notice("not a url"), None);
    }

    #[test]
    fn template_appends_to_existing_query() {
        let options = CompilerOptions::new("https://local/blocked.html?lang=en", 10).unwrap();
        assert_eq!(
            options.redirect_template(),
            "https://local/blocked.html?lang=en&originalUrl={originalUrl}"
        );
    }

    #[test]
    fn rejects_bad_options() {
        assert_eq!(CompilerOptions::new("  ", 1), Err(CompileError::EmptyBlockedPageUrl));
        assert_eq!(CompilerOptions::new(BLOCKED, 0), Err(CompileError::InvalidRuleIdBase));
        assert_eq!(CompilerOptions::new(BLOCKED, u32::MAX), Err(CompileError::InvalidRuleIdBase));
    }

    #[test]
    fn ids_past_the_limit_are_dropped() {
        let options = CompilerOptions::new(BLOCKED, MAX_RULE_ID).unwrap();
        let compiled = compile_rules(&entries(&["a", "b"]), &options);

        assert_eq!(compiled.rules.len(), 1);
        assert_eq!(compiled.rules[0].id, MAX_RULE_ID);
        assert_eq!(compiled.stats.before, 2);
        assert_eq!(compiled.stats.dropped, 1);
    }

    #[test]
    fn star_in_keyword_is_a_wildcard_only_in_rules() {
        let keywords = entries(&["a*b"]);
        let rule = &compile_rules(&keywords, &options()).rules[0];
        assert!(rule.matches("https://example.com/axxb"));
        assert!(!kb_core::matches_url("https://example.com/axxb", &keywords, 0));
        assert!(kb_core::matches_url("https://example.com/a*b", &keywords, 0));
    }

    #[test]
    fn rule_filter_agrees_with_substring_matching() {
        let compiled = compile_rules(&entries(&["Fegz"]), &options());
        let rule = &compiled.rules[0];
        assert!(rule.matches("https://example.com/FEGZ-content"));
        assert!(rule.matches("fegz"));
        assert!(!rule.matches("https://example.com/safe"));
    }

    #[test]
    fn wildcard_segments_must_appear_in_order() {
        assert!(wildcard_match("*a*b*", "xxaxxbxx"));
        assert!(!wildcard_match("*b*a*", "xxaxxbxx"));
        assert!(wildcard_match("http*", "https://x"));
        assert!(!wildcard_match("http*", "xhttp"));
        assert!(wildcard_match("*.com", "example.com"));
        assert!(!wildcard_match("*.com", "example.com/x"));
        assert!(wildcard_match("exact", "exact"));
        assert!(!wildcard_match("exact", "exactly"));
    }

    #[test]
    fn rules_serialize_camel_case() {
        let compiled = compile_rules(&entries(&["x"]), &options());
        let update = RuleUpdate::replace_all(vec![1, 2], compiled.rules);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["removeRuleIds"], serde_json::json!([1, 2]));
        assert_eq!(json["addRules"][0]["keywordFilter"], "*x*");
        assert_eq!(json["addRules"][0]["resourceTypes"][0], "main_frame");
    }
}
