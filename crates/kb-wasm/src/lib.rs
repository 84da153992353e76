//! WebAssembly bindings for KeywordBlocker
//!
//! The extension's JavaScript owns the browser APIs and passes the stored
//! `blockedItems` value in on every call; nothing here holds the list.
//! Timestamps cross the boundary as `Date.now()` milliseconds.

use std::sync::OnceLock;

use kb_background::{edit, menu_items, BlockerConfig, BlockerError, ClickInfo, MenuAction};
use kb_compiler::{compile_rules as compile, RuleUpdate};
use kb_core::url::{domain_keyword, page_keyword};
use kb_core::{normalize_items, to_stored_value, BlockEntry, Timestamp};
use serde_json::Value;
use wasm_bindgen::prelude::*;

static CONFIG: OnceLock<BlockerConfig> = OnceLock::new();

/// Route `log` output to the browser console. Unknown levels mean `info`.
#[wasm_bindgen]
pub fn init_logging(level: &str) {
    let level = level.parse::<log::Level>().unwrap_or(log::Level::Info);
    wasm_logger::init(wasm_logger::Config::new(level));
}

#[wasm_bindgen]
pub fn init(config_json: &str) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    if CONFIG.get().is_some() {
        return Err(JsValue::from_str("Already initialized. Reload the extension to reinitialize."));
    }

    let config = BlockerConfig::from_json(config_json)
        .map_err(|e| JsValue::from_str(&format!("Failed to load config: {}", e)))?;
    config
        .compiler_options()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    CONFIG
        .set(config)
        .map_err(|_| JsValue::from_str("Failed to set config"))?;
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    CONFIG.get().is_some()
}

fn config() -> Result<&'static BlockerConfig, JsValue> {
    CONFIG.get().ok_or_else(|| JsValue::from_str("Not initialized"))
}

/// Timers the background script should register.
#[wasm_bindgen]
pub fn get_schedule() -> Result<JsValue, JsValue> {
    let config = config()?;
    let result = js_sys::Object::new();
    let interval_ms = config.sweep_interval().as_millis() as f64;
    let _ = js_sys::Reflect::set(&result, &"sweepIntervalMs".into(), &JsValue::from(interval_ms));
    let _ = js_sys::Reflect::set(&result, &"alarmName".into(), &JsValue::from_str(&config.alarm_name));
    let _ = js_sys::Reflect::set(
        &result,
        &"alarmPeriodMinutes".into(),
        &JsValue::from(config.alarm_period_minutes),
    );
    let _ = js_sys::Reflect::set(&result, &"storageKey".into(), &JsValue::from_str(&config.storage_key));
    Ok(result.into())
}

// =============================================================================
// JSON bridging
// =============================================================================

fn js_to_json(value: &JsValue) -> Result<Value, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    let text = js_sys::JSON::stringify(value)?
        .as_string()
        .ok_or_else(|| JsValue::from_str("Value is not JSON-serializable"))?;
    serde_json::from_str(&text).map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))
}

fn json_to_js(value: &Value) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(&value.to_string())
}

fn entries_from(items: &JsValue) -> Result<Vec<BlockEntry>, JsValue> {
    let normalized = normalize_items(&js_to_json(items)?);
    if normalized.dropped > 0 {
        log::warn!("Ignored {} invalid stored items", normalized.dropped);
    }
    Ok(normalized.entries)
}

fn to_timestamp(millis: f64) -> Timestamp {
    millis as Timestamp
}

fn stored_js(entries: &[BlockEntry]) -> Result<JsValue, JsValue> {
    json_to_js(&to_stored_value(entries))
}

fn user_error(e: BlockerError) -> JsValue {
    JsValue::from_str(&e.user_message())
}

fn check_expiration(expiration: Option<Timestamp>, now: f64) -> Result<(), JsValue> {
    let min_lead = config()?.min_expiration_lead_ms;
    edit::check_expiration(expiration, to_timestamp(now), min_lead).map_err(user_error)
}

// =============================================================================
// Block list
// =============================================================================

/// Clean a stored `blockedItems` value. Returns `{items, dropped}`.
#[wasm_bindgen]
pub fn normalize_blocked_items(items: JsValue) -> Result<JsValue, JsValue> {
    let normalized = normalize_items(&js_to_json(&items)?);

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"items".into(), &stored_js(&normalized.entries)?);
    let _ = js_sys::Reflect::set(&result, &"dropped".into(), &JsValue::from(normalized.dropped as u32));
    Ok(result.into())
}

/// Append a keyword the way the settings UI does. Returns the new stored
/// list, or the status message to show as the error.
#[wasm_bindgen]
pub fn add_item(items: JsValue, keyword: &str, expiration: Option<f64>, now: f64) -> Result<JsValue, JsValue> {
    let entries = entries_from(&items)?;
    let expiration = expiration.map(to_timestamp);
    check_expiration(expiration, now)?;

    stored_js(&edit::added(&entries, keyword, expiration).map_err(user_error)?)
}

/// Replace the entry at `index`. The entry may keep its own keyword.
#[wasm_bindgen]
pub fn update_item(
    items: JsValue,
    index: usize,
    keyword: &str,
    expiration: Option<f64>,
    now: f64,
) -> Result<JsValue, JsValue> {
    let entries = entries_from(&items)?;
    let expiration = expiration.map(to_timestamp);
    check_expiration(expiration, now)?;

    stored_js(&edit::updated(&entries, index, keyword, expiration).map_err(user_error)?)
}

#[wasm_bindgen]
pub fn remove_item(items: JsValue, index: usize) -> Result<JsValue, JsValue> {
    let entries = entries_from(&items)?;
    let (next, _) = edit::removed(&entries, index).map_err(user_error)?;
    stored_js(&next)
}

/// Drop expired entries. Returns `{items, removed}` where `removed` lists the
/// dropped keywords.
#[wasm_bindgen]
pub fn sweep_items(items: JsValue, now: f64) -> Result<JsValue, JsValue> {
    let entries = entries_from(&items)?;
    let result = kb_core::sweep(&entries, to_timestamp(now));

    let removed = js_sys::Array::new();
    for entry in &result.removed {
        removed.push(&JsValue::from_str(&entry.keyword));
    }

    let js_result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_result, &"items".into(), &stored_js(&result.survivors)?);
    let _ = js_sys::Reflect::set(&js_result, &"removed".into(), &removed);
    Ok(js_result.into())
}

#[wasm_bindgen]
pub fn format_duration(from: f64, to: f64) -> String {
    kb_core::format_duration(to_timestamp(from), to_timestamp(to))
}

#[wasm_bindgen]
pub fn validate_expiration(expiration: f64, now: f64) -> Result<(), JsValue> {
    check_expiration(Some(to_timestamp(expiration)), now)
}

// =============================================================================
// Matching
// =============================================================================

#[wasm_bindgen]
pub fn matches_url(url: &str, items: JsValue, now: f64) -> Result<bool, JsValue> {
    Ok(kb_core::matches_url(url, &entries_from(&items)?, to_timestamp(now)))
}

#[wasm_bindgen]
pub fn matches_content(url: &str, title: &str, items: JsValue, now: f64) -> Result<bool, JsValue> {
    Ok(kb_core::matches_content(url, title, &entries_from(&items)?, to_timestamp(now)))
}

#[wasm_bindgen]
pub fn matches_text(text: &str, title: &str, items: JsValue, now: f64) -> Result<bool, JsValue> {
    Ok(kb_core::matches_text(text, title, &entries_from(&items)?, to_timestamp(now)))
}

/// Keyword found in page text, for the `contentBlocked` report.
#[wasm_bindgen]
pub fn find_text_match(text: &str, title: &str, items: JsValue, now: f64) -> Result<Option<String>, JsValue> {
    let entries = entries_from(&items)?;
    Ok(kb_core::find_text_match(text, title, &entries, to_timestamp(now)).map(|e| e.keyword.clone()))
}

// =============================================================================
// Rules
// =============================================================================

/// Compile the list into redirect rules. Returns `{rules, rulesBefore,
/// rulesAfter, rulesDropped}`.
#[wasm_bindgen]
pub fn compile_rules(items: JsValue) -> Result<JsValue, JsValue> {
    let entries = entries_from(&items)?;
    let options = config()?.compiler_options().map_err(|e| JsValue::from_str(&e.to_string()))?;
    let compiled = compile(&entries, &options);

    let rules = serde_json::to_value(&compiled.rules).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let js_result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_result, &"rules".into(), &json_to_js(&rules)?);
    let _ = js_sys::Reflect::set(&js_result, &"rulesBefore".into(), &JsValue::from(compiled.stats.before as u32));
    let _ = js_sys::Reflect::set(&js_result, &"rulesAfter".into(), &JsValue::from(compiled.stats.after as u32));
    let _ = js_sys::Reflect::set(&js_result, &"rulesDropped".into(), &JsValue::from(compiled.stats.dropped as u32));
    Ok(js_result.into())
}

/// Full replacement update: `{removeRuleIds, addRules}` for one engine call.
#[wasm_bindgen]
pub fn rule_update(installed_ids: JsValue, items: JsValue) -> Result<JsValue, JsValue> {
    let installed: Vec<u32> = serde_json::from_value(js_to_json(&installed_ids)?)
        .map_err(|e| JsValue::from_str(&format!("Installed rule IDs must be integers: {}", e)))?;
    let entries = entries_from(&items)?;
    let options = config()?.compiler_options().map_err(|e| JsValue::from_str(&e.to_string()))?;

    let update = RuleUpdate::replace_all(installed, compile(&entries, &options).rules);
    let value = serde_json::to_value(&update).map_err(|e| JsValue::from_str(&e.to_string()))?;
    json_to_js(&value)
}

// =============================================================================
// Notice page
// =============================================================================

#[wasm_bindgen]
pub fn notice_page_url(original_url: &str) -> Result<String, JsValue> {
    Ok(kb_compiler::notice_page_url(&config()?.blocked_page_url, original_url))
}

#[wasm_bindgen]
pub fn original_url_from_notice(notice_url: &str) -> Option<String> {
    kb_compiler::original_url_from_notice(notice_url)
}

#[wasm_bindgen]
pub fn is_notice_page(url: &str) -> Result<bool, JsValue> {
    Ok(url.starts_with(&config()?.blocked_page_url))
}

// =============================================================================
// Context menu
// =============================================================================

#[wasm_bindgen]
pub fn context_menu_items() -> Result<JsValue, JsValue> {
    let value = serde_json::to_value(menu_items()).map_err(|e| JsValue::from_str(&e.to_string()))?;
    json_to_js(&value)
}

/// Keyword a menu click would add, or `undefined` for clicks that add nothing.
#[wasm_bindgen]
pub fn context_menu_keyword(menu_item_id: &str, link_url: Option<String>, tab_url: Option<String>) -> Option<String> {
    let action = MenuAction::from_id(menu_item_id)?;
    let info = ClickInfo {
        menu_item_id: menu_item_id.to_string(),
        link_url,
    };
    action.keyword_for(info.target_url(tab_url.as_deref())?)
}

#[wasm_bindgen]
pub fn block_page_keyword(url: &str) -> Option<String> {
    page_keyword(url)
}

#[wasm_bindgen]
pub fn block_domain_keyword(url: &str) -> Option<String> {
    domain_keyword(url)
}
