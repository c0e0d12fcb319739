use std::collections::HashMap;

use crate::kernel::time::Millis;
use crate::suggestion::ActionCategory;

/// Categories recently shown and turned down, withheld for `[t, t + window)`.
#[derive(Debug, Clone)]
pub struct SuppressionWindow {
    window_ms: Millis,
    since: HashMap<ActionCategory, Millis>,
}

impl SuppressionWindow {
    pub fn new(window_ms: Millis) -> Self {
        Self {
            window_ms,
            since: HashMap::new(),
        }
    }

    pub fn window_ms(&self) -> Millis {
        self.window_ms
    }

    pub fn suppress(&mut self, category: ActionCategory, at: Millis) {
        self.since.insert(category, at);
    }

    pub fn lift(&mut self, category: &ActionCategory) {
        self.since.remove(category);
    }

    pub fn is_suppressed(&self, category: &ActionCategory, now: Millis) -> bool {
        self.since
            .get(category)
            .map(|&t| now >= t && now < t.saturating_add(self.window_ms))
            .unwrap_or(false)
    }

    /// Drops entries whose window has passed.
    pub fn prune(&mut self, now: Millis) {
        let window = self.window_ms;
        self.since.retain(|_, t| now < t.saturating_add(window));
    }

    pub fn len(&self) -> usize {
        self.since.len()
    }

    pub fn is_empty(&self) -> bool {
        self.since.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_open_interval() {
        let mut w = SuppressionWindow::new(600_000);
        let cat = ActionCategory::from("run-build");
        w.suppress(cat.clone(), 1_000);
        assert!(!w.is_suppressed(&cat, 999));
        assert!(w.is_suppressed(&cat, 1_000));
        assert!(w.is_suppressed(&cat, 600_999));
        assert!(!w.is_suppressed(&cat, 601_000));

        w.prune(601_000);
        assert!(w.is_empty());
    }
}
