use std::sync::OnceLock;

use regex::Regex;

/// Markers editors put in the title while a buffer has unsaved changes.
const DIRTY_MARKERS: [&str; 2] = ["●", "*"];

const STRIPPED_EXTENSIONS: [&str; 7] = [".py", ".json", ".txt", ".html", ".js", ".exe", ".md"];

fn bracket_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(.+?)\s*[\[\(].*?[\]\)]").ok())
        .as_ref()
}

fn colon_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+?):\s").ok()).as_ref()
}

/// Removes unsaved-change markers from a window title.
pub fn strip_dirty_marker(title: &str) -> &str {
    let mut trimmed = title.trim();
    for marker in DIRTY_MARKERS {
        trimmed = trimmed.trim_start_matches(marker).trim_end_matches(marker).trim();
    }
    trimmed
}

pub fn has_dirty_marker(title: &str) -> bool {
    let trimmed = title.trim();
    DIRTY_MARKERS
        .iter()
        .any(|m| trimmed.starts_with(m) || trimmed.ends_with(m))
}

/// Best-effort application name from a window title.
///
/// "main.rs - foresight - Visual Studio Code" -> "Visual Studio Code"
/// "Slack [3 new]" -> "Slack"
/// "Terminal: zsh" -> "Terminal"
/// Anything else falls back to the first word.
pub fn app_from_title(title: &str) -> String {
    let title = strip_dirty_marker(title);

    if let Some((_, app)) = title.rsplit_once(" - ") {
        let app = app.trim();
        if !app.is_empty() {
            return app.to_string();
        }
    }
    for pattern in [bracket_pattern(), colon_pattern()].into_iter().flatten() {
        if let Some(caps) = pattern.captures(title) {
            return caps[1].trim().to_string();
        }
    }
    title
        .split_whitespace()
        .next()
        .unwrap_or(title)
        .to_string()
}

/// Canonical form used to compare application names across sources.
pub fn normalize_app_name(name: &str) -> String {
    let mut lowered = name.trim().to_lowercase();
    for ext in STRIPPED_EXTENSIONS {
        if let Some(stem) = lowered.strip_suffix(ext) {
            lowered = stem.to_string();
            break;
        }
    }
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_patterns() {
        assert_eq!(
            app_from_title("main.rs - foresight - Visual Studio Code"),
            "Visual Studio Code"
        );
        assert_eq!(app_from_title("● lib.rs - Zed"), "Zed");
        assert_eq!(app_from_title("Slack [3 new]"), "Slack");
        assert_eq!(app_from_title("Terminal: zsh"), "Terminal");
        assert_eq!(app_from_title("Calculator"), "Calculator");
        assert_eq!(app_from_title(""), "");
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_app_name("Code.exe"), "code");
        assert_eq!(normalize_app_name("  Google   Chrome! "), "google chrome");
        assert_eq!(normalize_app_name("Visual Studio Code"), "visual studio code");
    }

    #[test]
    fn dirty_markers() {
        assert!(has_dirty_marker("● main.rs - Visual Studio Code"));
        assert!(!has_dirty_marker("notes.txt* - Notepad"));
        assert!(has_dirty_marker("report.docx - Word*"));
        assert_eq!(strip_dirty_marker("● main.rs - Code"), "main.rs - Code");
    }
}
