//! Parsing model responses into planner decisions.

use regex_lite::Regex;
use std::sync::LazyLock;

static FINAL_ANSWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[FINAL[_ -]?ANSWER\]").expect("valid final answer pattern"));

static ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[ACTION\]").expect("valid action pattern"));

static THOUGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[THOUGHT\]").expect("valid thought pattern"));

/// What the model decided this iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Action {
        thought: String,
        action: String,
        variables: serde_json::Map<String, serde_json::Value>,
    },
    FinalAnswer {
        thought: String,
        answer: String,
    },
}

/// Parse a stepwise response. `Err` carries the reason it is malformed.
///
/// A final answer wins over an action when both appear.
pub fn parse_response(text: &str) -> Result<ParsedResponse, String> {
    if let Some(marker) = FINAL_ANSWER.find(text) {
        let answer = text[marker.end()..].trim();
        if answer.is_empty() {
            return Err("[FINAL ANSWER] is empty".into());
        }
        return Ok(ParsedResponse::FinalAnswer {
            thought: clean_thought(&text[..marker.start()]),
            answer: answer.to_string(),
        });
    }

    let Some(marker) = ACTION.find(text) else {
        return Err("Response contains neither an [ACTION] nor a [FINAL ANSWER]".into());
    };

    let blob = extract_json_object(&text[marker.end()..])
        .ok_or_else(|| "[ACTION] is not followed by a JSON object".to_string())?;
    let value: serde_json::Value =
        serde_json::from_str(blob).map_err(|e| format!("Invalid action JSON: {e}"))?;

    let action = value
        .get("action")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| "Action JSON has no \"action\" name".to_string())?;

    let variables = match value.get("action_variables") {
        None | Some(serde_json::Value::Null) => serde_json::Map::new(),
        Some(serde_json::Value::Object(map)) => map.clone(),
        Some(_) => return Err("\"action_variables\" must be a JSON object".into()),
    };

    Ok(ParsedResponse::Action {
        thought: clean_thought(&text[..marker.start()]),
        action: action.to_string(),
        variables,
    })
}

fn clean_thought(text: &str) -> String {
    THOUGHT.replace_all(text, "").trim().to_string()
}

/// The first balanced `{ ... }` in `text`, honouring JSON string quoting.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Render a JSON argument value as a Context string.
pub fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
