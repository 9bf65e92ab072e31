//! Decoding of the service's answer into a verdict. Models wrap JSON in code
//! fences or chatter often enough that the object is searched for before
//! strict decoding.

use serde::Deserialize;
use shared::dto::Label;

#[derive(Debug, Deserialize)]
struct RawVerdict {
    classification: String,
    confidence: f64,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceReply {
    Verdict {
        label: Label,
        confidence: f64,
        reason: String,
    },
    Malformed(String),
}

pub fn decode(answer: &str) -> ServiceReply {
    let cleaned = strip_code_fences(answer.trim()).trim();
    let raw = match serde_json::from_str::<RawVerdict>(cleaned) {
        Ok(raw) => raw,
        Err(first) => match first_balanced_object(cleaned) {
            Some(obj) => match serde_json::from_str::<RawVerdict>(obj) {
                Ok(raw) => raw,
                Err(e) => return ServiceReply::Malformed(format!("invalid verdict: {e}")),
            },
            None => return ServiceReply::Malformed(format!("no JSON object: {first}")),
        },
    };
    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return ServiceReply::Malformed(format!("confidence out of range: {}", raw.confidence));
    }
    match Label::from_known(raw.classification.trim()) {
        Some(label) => ServiceReply::Verdict {
            label,
            confidence: raw.confidence,
            reason: raw.reason,
        },
        None => ServiceReply::Malformed(format!("unknown label '{}'", raw.classification)),
    }
}

fn strip_code_fences(s: &str) -> &str {
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s)
}

/// First `{...}` span whose braces balance, ignoring braces inside strings.
fn first_balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_str = false;
    let mut esc = false;
    for (i, ch) in s[start..].char_indices() {
        if in_str {
            if esc {
                esc = false;
            } else if ch == '\\' {
                esc = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }
        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}
