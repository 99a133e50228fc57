//! JSON extraction from free-form oracle text
//!
//! Strategies are tried in a fixed order and the first one that yields a
//! valid JSON value wins. Each strategy is a variant so it can be tested and
//! reported on its own.

use std::fmt;

use serde_json::Value;
use tracing::debug;

/// One way of locating JSON inside a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// A ```json fenced code block
    FencedBlock,
    /// The whole response, trimmed
    WholeResponse,
    /// The first balanced `{...}` found by bracket matching
    BalancedBraces,
}

impl ExtractionStrategy {
    /// Strategies in the order they are attempted
    pub const ORDER: [ExtractionStrategy; 3] = [Self::FencedBlock, Self::WholeResponse, Self::BalancedBraces];

    /// Apply this strategy alone
    pub fn apply(&self, text: &str) -> Option<Value> {
        match self {
            Self::FencedBlock => fenced_json_block(text).and_then(parse),
            Self::WholeResponse => parse(text.trim()),
            Self::BalancedBraces => first_balanced_object(text).and_then(parse),
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FencedBlock => "fenced-block",
            Self::WholeResponse => "whole-response",
            Self::BalancedBraces => "balanced-braces",
        };
        write!(f, "{}", name)
    }
}

/// Extract the first JSON value any strategy can find
pub fn extract_json(text: &str) -> Option<(Value, ExtractionStrategy)> {
    debug!(text_len = text.len(), "extract_json: called");
    for strategy in ExtractionStrategy::ORDER {
        if let Some(value) = strategy.apply(text) {
            debug!(%strategy, "extract_json: matched");
            return Some((value, strategy));
        }
    }
    debug!("extract_json: no strategy matched");
    None
}

fn parse(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate).ok()
}

/// Body of the first ```json fence, up to the next closing fence
fn fenced_json_block(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// First `{...}` span whose braces balance, ignoring braces inside strings
fn first_balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[start..=i];
                        if parse(candidate).is_some() {
                            return Some(candidate);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        search_from = start + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_fenced_block_wins() {
        let text = "Here you go:\n```json\n{\"action\": \"CREATE\"}\n```\nAlso {\"other\": 1}";
        let (value, strategy) = extract_json(text).unwrap();
        assert_eq!(value, json!({"action": "CREATE"}));
        assert_eq!(strategy, ExtractionStrategy::FencedBlock);
    }

    #[test]
    fn test_whole_response() {
        let (value, strategy) = extract_json("  {\"a\": [1, 2]}\n").unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
        assert_eq!(strategy, ExtractionStrategy::WholeResponse);
    }

    #[test]
    fn test_balanced_braces_in_prose() {
        let text = "I think {\"selectedDirectory\": \"docs\", \"note\": \"use } carefully\"} is right.";
        let (value, strategy) = extract_json(text).unwrap();
        assert_eq!(value["selectedDirectory"], "docs");
        assert_eq!(value["note"], "use } carefully");
        assert_eq!(strategy, ExtractionStrategy::BalancedBraces);
    }

    #[test]
    fn test_balanced_braces_skips_invalid_candidates() {
        let text = "Template {placeholder} then {\"ok\": true}";
        let (value, _) = extract_json(text).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn test_broken_fence_falls_through() {
        let text = "```json\n{not json}\n```\n{\"fallback\": 1}";
        let (value, strategy) = extract_json(text).unwrap();
        assert_eq!(value, json!({"fallback": 1}));
        assert_eq!(strategy, ExtractionStrategy::BalancedBraces);
    }

    #[test]
    fn test_nothing_found() {
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("{ unterminated").is_none());
    }

    #[test]
    fn test_strategies_individually() {
        let fenced = "```json\n{\"x\": 1}\n```";
        assert!(ExtractionStrategy::FencedBlock.apply(fenced).is_some());
        assert!(ExtractionStrategy::WholeResponse.apply(fenced).is_none());
        assert!(ExtractionStrategy::BalancedBraces.apply(fenced).is_some());
    }

    proptest! {
        #[test]
        fn prop_fenced_extraction_is_idempotent(
            key in "[a-zA-Z]{1,12}",
            text in "[a-zA-Z0-9 .,!?{}\\\\\"]{0,40}",
            n in any::<i64>(),
        ) {
            let mut map = serde_json::Map::new();
            map.insert(key, json!(text));
            map.insert("n".to_string(), json!(n));
            let obj = Value::Object(map);
            let response = format!("Answer:\n```json\n{}\n```\n", serde_json::to_string_pretty(&obj).unwrap());

            let first = extract_json(&response).map(|(v, _)| v);
            let second = extract_json(&response).map(|(v, _)| v);
            prop_assert_eq!(first.clone(), second);
            prop_assert_eq!(first, Some(obj));
        }
    }
}
