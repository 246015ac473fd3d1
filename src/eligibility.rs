use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::positions::canonical_role;
use crate::squad::{OptimizeOptions, SquadSlot};

/// A candidate/slot pair that passed every substitution criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityEdge {
    pub player: u32,
    pub slot: usize,
}

/// Compute the legal replacement edges. A candidate is eligible for a slot iff
/// the slot's canonical role is among the candidate's position tags, the
/// candidate has a known value under the budget, rates strictly above the
/// incumbent, and honors the age cap when one is set.
///
/// Edges come out ordered by slot then candidate id; downstream variable order
/// (and therefore solver tie-breaking) depends on this being stable.
pub fn eligible_edges(
    slots: &[SquadSlot],
    catalog: &Catalog,
    budget: i64,
    options: &OptimizeOptions,
) -> Vec<EligibilityEdge> {
    let candidate_ids = catalog.sorted_ids();
    let mut edges = Vec::new();
    for slot in slots {
        let role = canonical_role(&slot.label);
        for &id in &candidate_ids {
            let Some(candidate) = catalog.get(id) else {
                continue;
            };
            if !candidate.positions.iter().any(|tag| tag.as_str() == role) {
                continue;
            }
            if candidate.value <= 0 || candidate.value >= budget {
                continue;
            }
            if candidate.overall <= slot.incumbent_rating {
                continue;
            }
            if let Some(age_limit) = options.age_limit {
                if candidate.age > age_limit {
                    continue;
                }
            }
            edges.push(EligibilityEdge {
                player: id,
                slot: slot.index,
            });
        }
    }
    edges
}

/// Shrink the catalog to eligible candidates plus squad members, bounding the
/// model that gets built from it.
pub fn prune_catalog(catalog: &mut Catalog, edges: &[EligibilityEdge], slots: &[SquadSlot]) {
    let keep: HashSet<u32> = edges
        .iter()
        .map(|e| e.player)
        .chain(slots.iter().map(|s| s.incumbent))
        .collect();
    catalog.retain(|player| keep.contains(&player.id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Player;

    fn candidate(id: u32, overall: i32, value: i64, age: u32, tags: &[&str]) -> Player {
        Player {
            id,
            name: format!("Candidate {id}"),
            age,
            value,
            overall,
            potential: overall,
            positions: tags.iter().map(|t| t.to_string()).collect(),
            image: None,
        }
    }

    fn slot(index: usize, label: &str, rating: i32) -> SquadSlot {
        SquadSlot {
            index,
            label: label.to_string(),
            incumbent: 1000 + index as u32,
            incumbent_name: format!("Incumbent {index}"),
            incumbent_rating: rating,
            incumbent_potential: rating,
        }
    }

    #[test]
    fn zero_value_players_are_never_eligible() {
        let catalog = Catalog::from_records(vec![candidate(1, 99, 0, 22, &["ST"])]);
        let slots = vec![slot(0, "LS", 10)];
        let edges = eligible_edges(&slots, &catalog, 100_000_000, &OptimizeOptions::default());
        assert!(edges.is_empty());
    }

    #[test]
    fn edge_requires_strict_rating_improvement() {
        let catalog = Catalog::from_records(vec![
            candidate(1, 80, 1_000_000, 22, &["ST"]),
            candidate(2, 81, 1_000_000, 22, &["ST"]),
        ]);
        let slots = vec![slot(0, "RS", 80)];
        let edges = eligible_edges(&slots, &catalog, 100_000_000, &OptimizeOptions::default());
        assert_eq!(edges, vec![EligibilityEdge { player: 2, slot: 0 }]);
    }

    #[test]
    fn value_must_be_strictly_under_budget() {
        let catalog = Catalog::from_records(vec![candidate(1, 90, 5_000_000, 22, &["CB"])]);
        let slots = vec![slot(0, "LCB", 70)];
        let opts = OptimizeOptions::default();
        assert!(eligible_edges(&slots, &catalog, 5_000_000, &opts).is_empty());
        assert_eq!(eligible_edges(&slots, &catalog, 5_000_001, &opts).len(), 1);
    }

    #[test]
    fn age_cap_excludes_older_candidates() {
        let catalog = Catalog::from_records(vec![candidate(1, 90, 1_000_000, 25, &["CM"])]);
        let slots = vec![slot(0, "LCM", 70)];
        let opts = OptimizeOptions {
            age_limit: Some(20),
            ..Default::default()
        };
        assert!(eligible_edges(&slots, &catalog, 100_000_000, &opts).is_empty());
        let opts = OptimizeOptions {
            age_limit: Some(25),
            ..Default::default()
        };
        assert_eq!(eligible_edges(&slots, &catalog, 100_000_000, &opts).len(), 1);
    }

    #[test]
    fn role_matching_uses_exact_tags_not_substrings() {
        // An RB must not slip into an LCB slot just because "B" appears in both.
        let catalog = Catalog::from_records(vec![
            candidate(1, 90, 1_000_000, 22, &["RB"]),
            candidate(2, 90, 1_000_000, 22, &["CB", "RB"]),
        ]);
        let slots = vec![slot(0, "LCB", 70)];
        let edges = eligible_edges(&slots, &catalog, 100_000_000, &OptimizeOptions::default());
        assert_eq!(edges, vec![EligibilityEdge { player: 2, slot: 0 }]);
    }

    #[test]
    fn pruning_keeps_candidates_and_squad_only() {
        let mut catalog = Catalog::from_records(vec![
            candidate(1, 90, 1_000_000, 22, &["ST"]),
            candidate(2, 90, 1_000_000, 22, &["GK"]),
            candidate(1000, 70, 1_000_000, 30, &["ST"]),
        ]);
        let slots = vec![slot(0, "LS", 70)];
        let edges = eligible_edges(&slots, &catalog, 100_000_000, &OptimizeOptions::default());
        prune_catalog(&mut catalog, &edges, &slots);
        assert!(catalog.get(1).is_some());
        assert!(catalog.get(2).is_none());
        assert!(catalog.get(1000).is_some()); // incumbent survives pruning
    }
}
