use super::engine::{Rule, RuleId};
use super::predicate::Predicate;
use crate::suggestion::{ActionCategory, ActionTemplate};

const EDITORS: [&str; 9] = [
    "code", "vim", "nvim", "emacs", "sublime", "zed", "idea", "pycharm", "notepad",
];
const BROWSERS: [&str; 6] = ["firefox", "chrome", "chromium", "edge", "safari", "brave"];
const DOCUMENT_EXTENSIONS: [&str; 6] = ["md", "txt", "rst", "docx", "odt", "pdf"];

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn rule(id: &str, priority: u32, category: &str, base_confidence: f32, predicate: Predicate) -> Rule {
    Rule {
        id: RuleId::new(id),
        priority,
        category: ActionCategory::new(category),
        base_confidence,
        predicate,
        action: None,
        description: None,
    }
}

/// Rule table used when the config does not supply one.
pub fn default_rules() -> Vec<Rule> {
    vec![
        rule(
            "build-after-save",
            10,
            "run-build",
            0.8,
            Predicate::All {
                of: vec![
                    Predicate::AppMatches { any: names(&EDITORS) },
                    Predicate::FileSaved,
                ],
            },
        ),
        rule(
            "usual-next-app",
            20,
            "switch-context",
            0.6,
            Predicate::TransitionSeen { min_count: 3 },
        ),
        rule(
            "related-document",
            30,
            "open-related-file",
            0.5,
            Predicate::HeadFileExtension {
                any: names(&DOCUMENT_EXTENSIONS),
            },
        ),
        rule(
            "late-night-break",
            40,
            "take-break",
            0.4,
            Predicate::HourBetween { start: 22, end: 5 },
        ),
        Rule {
            action: Some(ActionTemplate::ShowTip {
                text: "Ctrl+L jumps straight to the address bar.".to_string(),
            }),
            ..rule(
                "browser-tip",
                50,
                "show-tip",
                0.3,
                Predicate::AppMatches { any: names(&BROWSERS) },
            )
        },
        Rule {
            action: Some(ActionTemplate::ShowTip {
                text: "Ctrl+P opens any file in the project by name.".to_string(),
            }),
            ..rule(
                "editor-tip",
                60,
                "show-tip",
                0.25,
                Predicate::AppMatches { any: names(&EDITORS) },
            )
        },
    ]
}
