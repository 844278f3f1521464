//! Escalation levels and policies

use super::config::{MonitoredServiceId, Target};

/// Group of targets notified together as one escalation step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Level {
    targets: Vec<Target>,
}

impl Level {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }

    /// Append a target; notification order follows insertion order
    pub fn add_target(&mut self, target: Target) {
        self.targets.push(target);
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }
}

/// Ordered levels to walk through for one monitored service.
///
/// The cursor only moves forward: every call to [`EscalationPolicy::next_level`]
/// consumes one level, and once the levels run out the policy stays exhausted.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    monitored_service_id: MonitoredServiceId,
    levels: Vec<Level>,
    cursor: usize,
}

impl EscalationPolicy {
    /// Create a policy with no levels
    pub fn new(monitored_service_id: impl Into<String>) -> Self {
        Self::with_levels(monitored_service_id, Vec::new())
    }

    pub fn with_levels(monitored_service_id: impl Into<String>, levels: Vec<Level>) -> Self {
        Self {
            monitored_service_id: monitored_service_id.into(),
            levels,
            cursor: 0,
        }
    }

    pub fn monitored_service_id(&self) -> &str {
        &self.monitored_service_id
    }

    /// Return the level under the cursor and advance past it.
    ///
    /// Returns `None` once every level has been consumed.
    pub fn next_level(&mut self) -> Option<&Level> {
        let index = self.cursor;
        self.cursor = self.cursor.saturating_add(1);
        self.levels.get(index)
    }

    /// Append a level and return the new level count
    pub fn add_level(&mut self, level: Level) -> usize {
        self.levels.push(level);
        self.levels.len()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of `next_level` calls made so far
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// True when no unconsumed level remains
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.levels.len()
    }
}
