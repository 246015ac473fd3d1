//! Properties of the built assignment model under the default solver.

use transferopt::catalog::{Catalog, Player};
use transferopt::eligibility::{EligibilityEdge, eligible_edges};
use transferopt::model::build_assignment_model;
use transferopt::solver::{BranchBound, MipSolver, SolveLimits, SolverError};
use transferopt::squad::{OptimizeOptions, SquadSlot};

fn candidate(id: u32, overall: i32, value: i64, age: u32, tags: &[&str]) -> Player {
    Player {
        id,
        name: format!("Candidate {id}"),
        age,
        value,
        overall,
        potential: overall + 3,
        positions: tags.iter().map(|t| t.to_string()).collect(),
        image: None,
    }
}

fn slot(index: usize, label: &str, rating: i32) -> SquadSlot {
    SquadSlot {
        index,
        label: label.to_string(),
        incumbent: 9000 + index as u32,
        incumbent_name: format!("Incumbent {index}"),
        incumbent_rating: rating,
        incumbent_potential: rating,
    }
}

fn solve(
    slots: &[SquadSlot],
    catalog: &Catalog,
    edges: &[EligibilityEdge],
    budget: i64,
    forced: bool,
) -> Result<(Vec<f64>, Vec<f64>), SolverError> {
    let built = build_assignment_model(slots, catalog, edges, budget, forced);
    let solution = BranchBound::new().solve(&built.model, &SolveLimits::default())?;
    let ratings = built
        .rating_vars
        .iter()
        .map(|&v| solution.values[v])
        .collect();
    let transfers = built
        .transfer_vars
        .iter()
        .map(|&v| solution.values[v])
        .collect();
    Ok((ratings, transfers))
}

#[test]
fn single_upgrade_is_taken_when_affordable() {
    // Incumbent 80, one candidate 85 at 500k under a 1M budget.
    let catalog = Catalog::from_records(vec![candidate(1, 85, 500_000, 24, &["ST"])]);
    let slots = vec![slot(0, "LS", 80)];
    let edges = eligible_edges(&slots, &catalog, 1_000_000, &OptimizeOptions::default());
    assert_eq!(edges, vec![EligibilityEdge { player: 1, slot: 0 }]);

    let (ratings, transfers) = solve(&slots, &catalog, &edges, 1_000_000, false).unwrap();
    assert_eq!(transfers, vec![1.0]);
    assert_eq!(ratings, vec![85.0]);
}

#[test]
fn zero_edge_slot_keeps_incumbent_rating_by_construction() {
    let catalog = Catalog::default();
    let slots = vec![slot(0, "GK", 77), slot(1, "CAM", 83)];
    let (ratings, transfers) = solve(&slots, &catalog, &[], 50_000_000, false).unwrap();
    assert_eq!(ratings, vec![77.0, 83.0]);
    assert!(transfers.is_empty());
}

#[test]
fn budget_is_never_exceeded() {
    // Two 85-rated upgrades at 600k each but only 1M of budget: exactly one
    // gets signed.
    let catalog = Catalog::from_records(vec![
        candidate(1, 85, 600_000, 24, &["ST"]),
        candidate(2, 85, 600_000, 24, &["GK"]),
    ]);
    let slots = vec![slot(0, "LS", 80), slot(1, "GK", 80)];
    let edges = eligible_edges(&slots, &catalog, 1_000_000, &OptimizeOptions::default());
    assert_eq!(edges.len(), 2);

    let (_, transfers) = solve(&slots, &catalog, &edges, 1_000_000, false).unwrap();
    let spent: f64 = transfers.iter().map(|t| t * 600_000.0).sum();
    assert!(spent <= 1_000_000.0);
    assert_eq!(transfers.iter().filter(|&&t| t > 0.5).count(), 1);
}

#[test]
fn one_candidate_fills_at_most_one_slot() {
    // A single striker eligible for both striker slots must appear once; the
    // second slot takes the weaker dedicated option.
    let catalog = Catalog::from_records(vec![
        candidate(1, 90, 1_000_000, 24, &["ST"]),
        candidate(2, 84, 1_000_000, 24, &["ST"]),
    ]);
    let slots = vec![slot(0, "LS", 80), slot(1, "RS", 80)];
    let edges = eligible_edges(&slots, &catalog, 10_000_000, &OptimizeOptions::default());
    assert_eq!(edges.len(), 4);

    let (ratings, transfers) = solve(&slots, &catalog, &edges, 10_000_000, false).unwrap();
    for slot_index in 0..2 {
        let active: usize = edges
            .iter()
            .zip(&transfers)
            .filter(|&(e, &t)| e.slot == slot_index && t > 0.5)
            .count();
        assert!(active <= 1);
    }
    for player in [1u32, 2] {
        let active: usize = edges
            .iter()
            .zip(&transfers)
            .filter(|&(e, &t)| e.player == player && t > 0.5)
            .count();
        assert!(active <= 1, "player {player} assigned to {active} slots");
    }
    let total: f64 = ratings.iter().sum();
    assert_eq!(total, 174.0); // 90 + 84, one signing each
}

#[test]
fn forced_mode_requires_exactly_one_transfer_per_slot() {
    let catalog = Catalog::from_records(vec![
        candidate(1, 70, 1_000_000, 20, &["GK"]),
        candidate(2, 75, 2_000_000, 20, &["GK"]),
    ]);
    let slots = vec![slot(0, "GK", 0)];
    let edges = eligible_edges(&slots, &catalog, 100_000_000, &OptimizeOptions::default());

    let (ratings, transfers) = solve(&slots, &catalog, &edges, 100_000_000, true).unwrap();
    assert_eq!(transfers.iter().filter(|&&t| t > 0.5).count(), 1);
    assert_eq!(ratings, vec![75.0]);
}

#[test]
fn forced_mode_with_an_empty_pool_is_infeasible() {
    let catalog = Catalog::default();
    let slots = vec![slot(0, "GK", 0)];
    let err = solve(&slots, &catalog, &[], 0, true).unwrap_err();
    assert!(matches!(err, SolverError::Infeasible));
}

#[test]
fn repeated_solves_yield_identical_assignments() {
    let catalog = Catalog::from_records(vec![
        candidate(1, 85, 600_000, 24, &["ST"]),
        candidate(2, 85, 600_000, 24, &["ST"]),
        candidate(3, 83, 200_000, 21, &["ST"]),
    ]);
    let slots = vec![slot(0, "LS", 80), slot(1, "RS", 80)];
    let edges = eligible_edges(&slots, &catalog, 1_000_000, &OptimizeOptions::default());

    let first = solve(&slots, &catalog, &edges, 1_000_000, false).unwrap();
    for _ in 0..5 {
        let again = solve(&slots, &catalog, &edges, 1_000_000, false).unwrap();
        assert_eq!(first, again);
    }
}
