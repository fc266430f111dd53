//! Per-call cycle guards
//!
//! [`VisitedSet`] tracks which entities normalize is currently descending
//! into; [`ExpansionCache`] holds what denormalize has expanded so far. Both
//! live for exactly one top-level call.

use std::collections::HashMap;

use serde_json::Value;

/// State of one (type, id) pair during normalize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VisitMark {
    /// Fields are being visited; meeting the entity again is a cycle
    InProgress,
    /// Visited and stored at least once
    Done,
}

#[derive(Debug, Default)]
pub(crate) struct VisitedSet {
    marks: HashMap<String, HashMap<String, VisitMark>>,
}

impl VisitedSet {
    pub(crate) fn mark(&self, entity_type: &str, id: &str) -> Option<VisitMark> {
        self.marks.get(entity_type)?.get(id).copied()
    }

    pub(crate) fn is_in_progress(&self, entity_type: &str, id: &str) -> bool {
        self.mark(entity_type, id) == Some(VisitMark::InProgress)
    }

    pub(crate) fn enter(&mut self, entity_type: &str, id: &str) {
        self.set(entity_type, id, VisitMark::InProgress);
    }

    pub(crate) fn leave(&mut self, entity_type: &str, id: &str) {
        self.set(entity_type, id, VisitMark::Done);
    }

    fn set(&mut self, entity_type: &str, id: &str, mark: VisitMark) {
        self.marks
            .entry(entity_type.to_string())
            .or_default()
            .insert(id.to_string(), mark);
    }
}

#[derive(Debug)]
enum Expansion {
    /// Fields still hold references
    Partial(Value),
    Complete(Value),
}

#[derive(Debug, Default)]
pub(crate) struct ExpansionCache {
    entries: HashMap<String, HashMap<String, Expansion>>,
}

impl ExpansionCache {
    /// Expanded (or, mid-expansion, partially expanded) entity
    pub(crate) fn get(&self, entity_type: &str, id: &str) -> Option<&Value> {
        match self.entries.get(entity_type)?.get(id)? {
            Expansion::Partial(value) | Expansion::Complete(value) => Some(value),
        }
    }

    pub(crate) fn begin(&mut self, entity_type: &str, id: &str, entity: Value) {
        self.insert(entity_type, id, Expansion::Partial(entity));
    }

    pub(crate) fn complete(&mut self, entity_type: &str, id: &str, entity: Value) {
        self.insert(entity_type, id, Expansion::Complete(entity));
    }

    fn insert(&mut self, entity_type: &str, id: &str, expansion: Expansion) {
        self.entries
            .entry(entity_type.to_string())
            .or_default()
            .insert(id.to_string(), expansion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visit_marks() {
        let mut visited = VisitedSet::default();
        assert_eq!(visited.mark("users", "1"), None);

        visited.enter("users", "1");
        assert!(visited.is_in_progress("users", "1"));
        assert!(!visited.is_in_progress("groups", "1"));

        visited.leave("users", "1");
        assert_eq!(visited.mark("users", "1"), Some(VisitMark::Done));
        assert!(!visited.is_in_progress("users", "1"));
    }

    #[test]
    fn test_expansion_cache() {
        let mut cache = ExpansionCache::default();
        cache.begin("users", "1", json!({"id": 1, "friend": 2}));
        assert_eq!(cache.get("users", "1"), Some(&json!({"id": 1, "friend": 2})));

        cache.complete("users", "1", json!({"id": 1, "friend": {"id": 2}}));
        assert_eq!(cache.get("users", "1"), Some(&json!({"id": 1, "friend": {"id": 2}})));
    }
}
