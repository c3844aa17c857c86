//! Best-effort JSON extraction from free-text model output

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from pulling a JSON value out of model text
#[derive(Error, Debug)]
pub enum JsonExtractError {
    #[error("no balanced JSON object or array found in response")]
    NotFound,

    #[error("JSON did not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Strip a surrounding markdown code fence, if any
fn strip_markdown_fences(response: &str) -> &str {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        // Skip the opening fence line (```json or ```)
        let after_fence = if let Some(newline_pos) = trimmed.find('\n') {
            &trimmed[newline_pos + 1..]
        } else {
            trimmed
                .strip_prefix("```json")
                .or_else(|| trimmed.strip_prefix("```"))
                .unwrap_or(trimmed)
        };

        if let Some(close_pos) = after_fence.rfind("```") {
            after_fence[..close_pos].trim()
        } else {
            after_fence.trim()
        }
    } else {
        trimmed
    }
}

/// Balanced `{...}` or `[...]` span starting at byte offset `start_pos`
fn extract_balanced_at(content: &str, start_pos: usize) -> Option<&str> {
    let json_content = content.get(start_pos..)?;
    let start_char = json_content.chars().next()?;
    let end_char = match start_char {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in json_content.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            c if c == start_char => depth += 1,
            c if c == end_char => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&json_content[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

fn is_valid_json(s: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(s).is_ok()
}

/// Extract the first balanced, valid JSON object or array from a response
///
/// Handles markdown fences, chatty prefixes and suffixes, and brackets
/// inside string literals. Candidates are tried in positional order so an
/// outer array wins over the objects nested inside it.
pub fn extract_json(response: &str) -> Result<&str, JsonExtractError> {
    let content = strip_markdown_fences(response);

    let mut candidates: Vec<usize> = content.match_indices(['{', '[']).map(|(i, _)| i).collect();
    candidates.sort_unstable();

    for pos in candidates {
        if let Some(json) = extract_balanced_at(content, pos) {
            if is_valid_json(json) {
                return Ok(json);
            }
        }
    }

    Err(JsonExtractError::NotFound)
}

/// Extract and deserialize the first JSON span in a response
pub fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T, JsonExtractError> {
    let json = extract_json(response)?;
    Ok(serde_json::from_str(json)?)
}
