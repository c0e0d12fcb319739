use serde_json::{json, Value};

use crate::services::candidate::CandidateRequest;

/// Replies opening like this are chatter, not suggestions.
const NON_ACTIONABLE_PREFIXES: [&str; 5] = ["you are", "i am", "i'm", "as an ai", "i cannot"];

const MIN_DESCRIPTION_CHARS: usize = 8;

pub fn build_prompt(request: &CandidateRequest, max_candidates: usize) -> String {
    let system_prompt = "You are a quiet desktop assistant. Given what the user is doing, pick the next actions they most likely want. Only use the listed categories. Reply with JSON only.";

    let snap = &request.snapshot;
    let files: Vec<String> = snap
        .recent_files
        .iter()
        .take(3)
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    let transitions: Vec<String> = request
        .transitions
        .iter()
        .take(3)
        .map(|(app, count)| format!("{app} ({count}x)"))
        .collect();
    let options: Vec<String> = request
        .options
        .iter()
        .map(|o| format!("- {}: {}", o.category, o.description))
        .collect();

    let user_prompt = format!(
        "Active app: {}\nWindow: {}\nRecent files: {}\nUsually switches to: {}\nCategories:\n{}\nReturn at most {} suggestions.",
        snap.app_name(),
        snap.window_title,
        if files.is_empty() { "none".to_string() } else { files.join(", ") },
        if transitions.is_empty() { "unknown".to_string() } else { transitions.join(", ") },
        options.join("\n"),
        max_candidates,
    );

    format!("System: {}\nUser: {}\nAssistant:", system_prompt, user_prompt)
}

/// JSON schema constraining the completion to known categories.
pub fn response_schema(request: &CandidateRequest, max_candidates: usize) -> Value {
    let ids: Vec<&str> = request.options.iter().map(|o| o.category.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "suggestions": {
                "type": "array",
                "maxItems": max_candidates,
                "items": {
                    "type": "object",
                    "properties": {
                        "category": { "type": "string", "enum": ids },
                        "description": { "type": "string" },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                    },
                    "required": ["category", "confidence"]
                }
            }
        },
        "required": ["suggestions"]
    })
}

pub fn is_actionable(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    lowered.chars().count() >= MIN_DESCRIPTION_CHARS
        && !NON_ACTIONABLE_PREFIXES.iter().any(|p| lowered.starts_with(p))
}
