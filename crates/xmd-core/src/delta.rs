//! Delta computation and event emission (C5).

use crate::ir::NodeHashMap;
use serde::{Deserialize, Serialize};

/// `(prev_hashes, next_hashes) → {added, removed, changed}` (P3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Computes the delta between two hash maps. Ordering follows §4.5:
/// `next`'s iteration order for `added`/`changed`, `prev`'s for `removed`.
pub fn compute_delta(prev: &NodeHashMap, next: &NodeHashMap) -> Delta {
    let mut added = Vec::new();
    let mut changed = Vec::new();
    for (id, hash) in next.iter_ordered() {
        match prev.get(id) {
            None => added.push(id.to_string()),
            Some(prev_hash) if prev_hash != hash => changed.push(id.to_string()),
            Some(_) => {}
        }
    }

    let mut removed = Vec::new();
    for (id, _) in prev.iter_ordered() {
        if !next.contains(id) {
            removed.push(id.to_string());
        }
    }

    tracing::debug!(
        added = added.len(),
        removed = removed.len(),
        changed = changed.len(),
        "computed delta"
    );

    Delta {
        added,
        removed,
        changed,
    }
}

/// Caller-visible event stream derived from a delta (C5/P4): emitted only
/// for non-empty groups, in the fixed order `added, removed, changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    NodesAdded { ids: Vec<String> },
    NodesRemoved { ids: Vec<String> },
    NodesChanged { ids: Vec<String> },
}

pub fn events_from_delta(delta: &Delta) -> Vec<Event> {
    let mut events = Vec::new();
    if !delta.added.is_empty() {
        events.push(Event::NodesAdded {
            ids: delta.added.clone(),
        });
    }
    if !delta.removed.is_empty() {
        events.push(Event::NodesRemoved {
            ids: delta.removed.clone(),
        });
    }
    if !delta.changed.is_empty() {
        events.push(Event::NodesChanged {
            ids: delta.changed.clone(),
        });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{build_hash_map, IrNode};

    fn doc(paragraphs: &[(&str, &str)]) -> IrNode {
        IrNode::Document {
            id: "root".to_string(),
            doc_id: "doc1".to_string(),
            children: paragraphs
                .iter()
                .map(|(id, text)| IrNode::Paragraph {
                    id: id.to_string(),
                    text: text.to_string(),
                    style: None,
                    source: None,
                })
                .collect(),
        }
    }

    #[test]
    fn identical_snapshots_emit_zero_events() {
        let hm = build_hash_map(&doc(&[("p0", "A")]));
        let delta = compute_delta(&hm, &hm);
        assert!(delta.is_empty());
        assert!(events_from_delta(&delta).is_empty());
    }

    #[test]
    fn added_removed_changed_partition_correctly() {
        let prev = build_hash_map(&doc(&[("p0", "A"), ("p1", "B")]));
        let next = build_hash_map(&doc(&[("p0", "A changed"), ("p2", "C")]));

        let delta = compute_delta(&prev, &next);
        // p0 kept id, content differs -> changed. p1 gone -> removed.
        // p2 new -> added. root (Document) is unchanged (doc_id same).
        assert_eq!(delta.added, vec!["p2".to_string()]);
        assert_eq!(delta.removed, vec!["p1".to_string()]);
        assert_eq!(delta.changed, vec!["p0".to_string()]);
    }

    #[test]
    fn no_id_appears_in_two_result_sets() {
        let prev = build_hash_map(&doc(&[("p0", "A"), ("p1", "B")]));
        let next = build_hash_map(&doc(&[("p0", "A changed"), ("p2", "C")]));
        let delta = compute_delta(&prev, &next);

        let mut seen = std::collections::HashSet::new();
        for id in delta
            .added
            .iter()
            .chain(delta.removed.iter())
            .chain(delta.changed.iter())
        {
            assert!(seen.insert(id), "id {id} appeared in more than one group");
        }
    }

    #[test]
    fn events_emit_only_non_empty_groups_in_fixed_order() {
        let prev = build_hash_map(&doc(&[("p0", "A")]));
        let next = build_hash_map(&doc(&[("p0", "A"), ("p1", "B")]));
        let delta = compute_delta(&prev, &next);
        let events = events_from_delta(&delta);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::NodesAdded { .. }));
    }

    #[test]
    fn all_three_groups_present_preserve_fixed_order() {
        let prev = build_hash_map(&doc(&[("p0", "A"), ("p1", "B")]));
        let next = build_hash_map(&doc(&[("p0", "A changed"), ("p2", "C")]));
        let delta = compute_delta(&prev, &next);
        let events = events_from_delta(&delta);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Event::NodesAdded { .. }));
        assert!(matches!(events[1], Event::NodesRemoved { .. }));
        assert!(matches!(events[2], Event::NodesChanged { .. }));
    }
}
