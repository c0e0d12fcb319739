use serde::{Deserialize, Serialize};

use crate::context::{normalize_app_name, ContextSnapshot, ContextStore};
use crate::kernel::time::local_hour_weekday;

/// Everything a predicate may look at. Predicates are pure over this.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub current: &'a ContextSnapshot,
    /// Snapshot immediately before `current`, if retained.
    pub previous: Option<&'a ContextSnapshot>,
    pub store: &'a ContextStore,
    pub utc_offset_minutes: i32,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        current: &'a ContextSnapshot,
        previous: Option<&'a ContextSnapshot>,
        store: &'a ContextStore,
    ) -> Self {
        Self {
            current,
            previous,
            store,
            utc_offset_minutes: 0,
        }
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Predicate {
    /// Normalized foreground app contains any of the given names.
    AppMatches { any: Vec<String> },
    WindowContains { any: Vec<String> },
    ProcessMatches { any: Vec<String> },
    /// Extension of the most recent file, without the dot.
    HeadFileExtension { any: Vec<String> },
    /// Same app as before and either the dirty marker cleared or a new file reached the head.
    FileSaved,
    /// The user has moved from this app to one other app at least `min_count` times.
    TransitionSeen { min_count: u32 },
    /// Local hour in `[start, end)`; wraps past midnight when `start > end`.
    HourBetween { start: u32, end: u32 },
    All { of: Vec<Predicate> },
    Any { of: Vec<Predicate> },
    Not { of: Box<Predicate> },
}

impl Predicate {
    pub fn matches(&self, ctx: &RuleContext<'_>) -> bool {
        match self {
            Predicate::AppMatches { any } => {
                let app = ctx.current.normalized_app();
                !app.is_empty()
                    && any
                        .iter()
                        .map(|name| normalize_app_name(name))
                        .any(|name| !name.is_empty() && app.contains(&name))
            }
            Predicate::WindowContains { any } => {
                let title = ctx.current.window_title.to_lowercase();
                any.iter().any(|needle| title.contains(&needle.to_lowercase()))
            }
            Predicate::ProcessMatches { any } => {
                let process = ctx.current.process_name.to_lowercase();
                !process.is_empty() && any.iter().any(|p| process.contains(&p.to_lowercase()))
            }
            Predicate::HeadFileExtension { any } => ctx
                .current
                .head_file()
                .and_then(|f| f.extension())
                .map(|ext| {
                    let ext = ext.to_string_lossy();
                    any.iter()
                        .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(&ext))
                })
                .unwrap_or(false),
            Predicate::FileSaved => file_saved(ctx),
            Predicate::TransitionSeen { min_count } => ctx
                .store
                .transitions_from(&ctx.current.normalized_app())
                .first()
                .map(|(_, count)| count >= min_count)
                .unwrap_or(false),
            Predicate::HourBetween { start, end } => {
                let (hour, _) = local_hour_weekday(ctx.current.timestamp_ms, ctx.utc_offset_minutes);
                let hour = hour.floor() as u32;
                if start <= end {
                    hour >= *start && hour < *end
                } else {
                    hour >= *start || hour < *end
                }
            }
            Predicate::All { of } => of.iter().all(|p| p.matches(ctx)),
            Predicate::Any { of } => of.iter().any(|p| p.matches(ctx)),
            Predicate::Not { of } => !of.matches(ctx),
        }
    }
}

fn file_saved(ctx: &RuleContext<'_>) -> bool {
    let Some(previous) = ctx.previous else {
        return false;
    };
    if previous.normalized_app() != ctx.current.normalized_app() {
        return false;
    }
    let marker_cleared = previous.is_dirty() && !ctx.current.is_dirty();
    let new_head = match (ctx.current.head_file(), previous.head_file()) {
        (Some(now), Some(before)) => now != before,
        (Some(_), None) => true,
        _ => false,
    };
    marker_cleared || new_head
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(p: &Predicate, current: &ContextSnapshot, previous: Option<&ContextSnapshot>) -> bool {
        let store = ContextStore::new(8);
        p.matches(&RuleContext::new(current, previous, &store))
    }

    #[test]
    fn dirty_marker_cleared_counts_as_save() {
        let before = ContextSnapshot::builder(0).title("● main.rs - Code").build();
        let after = ContextSnapshot::builder(1).title("main.rs - Code").build();
        assert!(eval(&Predicate::FileSaved, &after, Some(&before)));
        assert!(!eval(&Predicate::FileSaved, &before, Some(&after)));
        assert!(!eval(&Predicate::FileSaved, &after, None));
    }

    #[test]
    fn hour_range_wraps_midnight() {
        let p = Predicate::HourBetween { start: 22, end: 5 };
        let at = |h: i64| ContextSnapshot::builder(h * 3_600_000).build();
        assert!(eval(&p, &at(23), None));
        assert!(eval(&p, &at(2), None));
        assert!(!eval(&p, &at(12), None));
    }

    #[test]
    fn combinators_and_extension() {
        let snap = ContextSnapshot::builder(0)
            .class("Code")
            .files(["/w/readme.MD"])
            .build();
        let p = Predicate::All {
            of: vec![
                Predicate::AppMatches { any: vec!["code".into()] },
                Predicate::HeadFileExtension { any: vec![".md".into()] },
                Predicate::Not {
                    of: Box::new(Predicate::WindowContains { any: vec!["secret".into()] }),
                },
            ],
        };
        assert!(eval(&p, &snap, None));
    }

    #[test]
    fn parses_from_toml() {
        let p: Predicate = toml::from_str(
            r#"
            when = "any"
            of = [{ when = "file_saved" }, { when = "transition_seen", min_count = 3 }]
            "#,
        )
        .unwrap();
        assert!(matches!(p, Predicate::Any { of } if of.len() == 2));
    }
}
