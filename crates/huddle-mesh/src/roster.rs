//! Roster diffing.

use std::collections::HashSet;

use huddle_common::ParticipantId;

/// Ids added and removed between two roster snapshots, in snapshot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    pub added: Vec<ParticipantId>,
    pub removed: Vec<ParticipantId>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare two roster snapshots by id.
pub fn diff_roster(previous: &[ParticipantId], next: &[ParticipantId]) -> RosterDiff {
    let before: HashSet<_> = previous.iter().copied().collect();
    let after: HashSet<_> = next.iter().copied().collect();

    let mut seen = HashSet::new();
    let added = next
        .iter()
        .copied()
        .filter(|id| !before.contains(id) && seen.insert(*id))
        .collect();
    let removed = previous
        .iter()
        .copied()
        .filter(|id| !after.contains(id) && seen.insert(*id))
        .collect();

    RosterDiff { added, removed }
}

/// Drop duplicate ids, keeping first occurrence order.
pub fn normalize_roster(roster: &[ParticipantId]) -> Vec<ParticipantId> {
    let mut seen = HashSet::new();
    roster.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ParticipantId> {
        raw.iter().copied().map(ParticipantId).collect()
    }

    #[test]
    fn join_and_leave() {
        let diff = diff_roster(&ids(&[5]), &ids(&[5, 9]));
        assert_eq!(diff.added, ids(&[9]));
        assert!(diff.removed.is_empty());

        let diff = diff_roster(&ids(&[5, 9]), &ids(&[5]));
        assert!(diff.added.is_empty());
        assert_eq!(diff.removed, ids(&[9]));
    }

    #[test]
    fn simultaneous_churn() {
        let diff = diff_roster(&ids(&[1, 2, 3]), &ids(&[3, 4, 1, 5]));
        assert_eq!(diff.added, ids(&[4, 5]));
        assert_eq!(diff.removed, ids(&[2]));
    }

    #[test]
    fn reorder_is_not_a_change() {
        assert!(diff_roster(&ids(&[1, 2, 3]), &ids(&[3, 1, 2])).is_empty());
    }

    #[test]
    fn duplicates_are_reported_once() {
        let diff = diff_roster(&ids(&[]), &ids(&[7, 7, 8]));
        assert_eq!(diff.added, ids(&[7, 8]));
        assert_eq!(normalize_roster(&ids(&[7, 7, 8, 7])), ids(&[7, 8]));
    }

    #[test]
    fn normalize_keeps_arrival_order() {
        assert_eq!(normalize_roster(&ids(&[9, 5, 9, 12, 5])), ids(&[9, 5, 12]));
    }
}
