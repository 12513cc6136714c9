//! Resilient structured-output parsing.
//!
//! Oracles wrap their JSON in prose, code fences, or leave braces
//! unbalanced. The ladder here: strict parse of the first balanced
//! object → mechanical repair (fence/prose stripping, trailing-comma
//! removal, brace closing) → permissive key-value scan recovering
//! `action_type` and `targets` only.

use regex::Regex;
use std::sync::OnceLock;

use tw_domain::{Error, OracleReply, Result};

/// Parse an oracle completion into a reply envelope.
pub fn parse_reply(raw: &str) -> Result<OracleReply> {
    if let Some(block) = extract_json_object(raw) {
        if let Ok(reply) = serde_json::from_str::<OracleReply>(&block) {
            return Ok(reply);
        }
    }

    let repaired = repair(raw);
    if let Ok(reply) = serde_json::from_str::<OracleReply>(&repaired) {
        return Ok(reply);
    }

    if let Some(reply) = permissive_scan(raw) {
        return Ok(reply);
    }

    Err(Error::Parse(format!(
        "unparseable oracle reply: {}",
        truncate(raw, 120)
    )))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// The first balanced `{ ... }` block, string-aware.
fn extract_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            if ch != '\\' {
                escaped = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(raw[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([}\]])").expect("static regex"))
}

/// Mechanical repair pass: strip fences and surrounding prose, drop
/// trailing commas, close unbalanced braces and brackets.
fn repair(raw: &str) -> String {
    let mut text = raw.trim();
    // Strip a markdown code fence if present.
    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    } else if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }

    // Cut surrounding prose: everything before the first '{'.
    let body = match text.find('{') {
        Some(idx) => &text[idx..],
        None => text,
    };

    let mut repaired = trailing_comma_re().replace_all(body, "$1").to_string();

    // Close whatever is left open, string-aware.
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in repaired.chars() {
        if in_string {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            if ch != '\\' {
                escaped = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}

fn key_string_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""?(action_type|ability_name)"?\s*[:=]\s*"([^"]+)""#).expect("static regex")
    })
}

fn targets_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""?targets"?\s*[:=]\s*\[([^\]]*)\]"#).expect("static regex"))
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("static regex"))
}

/// Last resort: recover `action_type`, `ability_name` and `targets`
/// from free text and rebuild a minimal reply.
fn permissive_scan(raw: &str) -> Option<OracleReply> {
    let mut action_type = None;
    let mut ability_name = None;
    for caps in key_string_re().captures_iter(raw) {
        match &caps[1] {
            "action_type" => action_type = Some(caps[2].to_string()),
            "ability_name" => ability_name = Some(caps[2].to_string()),
            _ => {}
        }
    }
    let action_type = action_type?;

    let targets: Vec<String> = targets_re()
        .captures(raw)
        .map(|caps| {
            quoted_re()
                .captures_iter(&caps[1])
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut value = serde_json::json!({
        "action_type": action_type,
        "targets": targets,
    });
    if let Some(name) = ability_name {
        value["ability_name"] = serde_json::Value::String(name);
    }
    serde_json::from_value(value).ok()
}
