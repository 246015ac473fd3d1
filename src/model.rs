use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::eligibility::EligibilityEdge;
use crate::squad::SquadSlot;

/// Generic mixed-integer model vocabulary. The builder below is the only
/// producer; any `MipSolver` backend is a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    Continuous,
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub name: String,
    pub kind: VarKind,
    /// Coefficient in the (maximized) objective.
    pub obj_coeff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone)]
pub struct Row {
    pub name: String,
    pub terms: Vec<(usize, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

/// Objective sense is always maximize.
#[derive(Debug, Clone, Default)]
pub struct MipModel {
    pub vars: Vec<VarDef>,
    pub rows: Vec<Row>,
}

impl MipModel {
    pub fn add_var(&mut self, name: impl Into<String>, kind: VarKind, obj_coeff: f64) -> usize {
        self.vars.push(VarDef {
            name: name.into(),
            kind,
            obj_coeff,
        });
        self.vars.len() - 1
    }

    pub fn add_row(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(usize, f64)>,
        sense: RowSense,
        rhs: f64,
    ) {
        self.rows.push(Row {
            name: name.into(),
            terms,
            sense,
            rhs,
        });
    }
}

/// The assembled assignment model plus the variable indices needed to read a
/// solution back against slots and edges.
#[derive(Debug, Clone)]
pub struct AssignmentModel {
    pub model: MipModel,
    /// Achieved-rating variable per slot, indexed by slot position.
    pub rating_vars: Vec<usize>,
    /// Transfer variable per eligibility edge, parallel to the edge list.
    pub transfer_vars: Vec<usize>,
    pub budget: i64,
    pub forced: bool,
}

/// Build the transfer-assignment MIP.
///
/// Per slot j with incumbent rating r_j and edges E_j:
///   rating_j - sum_{i in E_j} (overall_i - r_j) * t_ij = r_j
/// so with every t at zero the achieved rating collapses to the incumbent's
/// by construction. Budget, one-slot-per-player and one-transfer-per-slot
/// rows complete the model; `forced` turns the per-slot row into an equality
/// (exactly one signing per slot, the new-squad build).
pub fn build_assignment_model(
    slots: &[SquadSlot],
    catalog: &Catalog,
    edges: &[EligibilityEdge],
    budget: i64,
    forced: bool,
) -> AssignmentModel {
    let mut model = MipModel::default();

    let rating_vars: Vec<usize> = slots
        .iter()
        .map(|slot| model.add_var(format!("rating_{}", slot.index), VarKind::Continuous, 1.0))
        .collect();

    let transfer_vars: Vec<usize> = edges
        .iter()
        .map(|edge| {
            model.add_var(
                format!("transfer_{}_{}", edge.player, edge.slot),
                VarKind::Binary,
                0.0,
            )
        })
        .collect();

    let budget_terms: Vec<(usize, f64)> = edges
        .iter()
        .zip(&transfer_vars)
        .map(|(edge, &var)| {
            let value = catalog.get(edge.player).map_or(0, |p| p.value);
            (var, value as f64)
        })
        .collect();
    model.add_row("budget", budget_terms, RowSense::Le, budget as f64);

    for slot in slots {
        let incumbent = slot.incumbent_rating as f64;
        let mut terms = vec![(rating_vars[slot.index], 1.0)];
        for (edge, &var) in edges.iter().zip(&transfer_vars) {
            if edge.slot != slot.index {
                continue;
            }
            let overall = catalog.get(edge.player).map_or(0, |p| p.overall) as f64;
            terms.push((var, -(overall - incumbent)));
        }
        model.add_row(
            format!("rating_def_{}", slot.index),
            terms,
            RowSense::Eq,
            incumbent,
        );
    }

    let mut by_player: BTreeMap<u32, Vec<(usize, f64)>> = BTreeMap::new();
    for (edge, &var) in edges.iter().zip(&transfer_vars) {
        by_player.entry(edge.player).or_default().push((var, 1.0));
    }
    for (player, terms) in by_player {
        model.add_row(format!("one_slot_{player}"), terms, RowSense::Le, 1.0);
    }

    for slot in slots {
        let terms: Vec<(usize, f64)> = edges
            .iter()
            .zip(&transfer_vars)
            .filter(|(edge, _)| edge.slot == slot.index)
            .map(|(_, &var)| (var, 1.0))
            .collect();
        let sense = if forced { RowSense::Eq } else { RowSense::Le };
        model.add_row(format!("one_transfer_{}", slot.index), terms, sense, 1.0);
    }

    AssignmentModel {
        model,
        rating_vars,
        transfer_vars,
        budget,
        forced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Player;

    fn candidate(id: u32, overall: i32, value: i64) -> Player {
        Player {
            id,
            name: format!("Candidate {id}"),
            age: 22,
            value,
            overall,
            potential: overall,
            positions: vec!["ST".to_string()],
            image: None,
        }
    }

    fn slot(index: usize, rating: i32) -> SquadSlot {
        SquadSlot {
            index,
            label: "ST".to_string(),
            incumbent: 500 + index as u32,
            incumbent_name: format!("Incumbent {index}"),
            incumbent_rating: rating,
            incumbent_potential: rating,
        }
    }

    #[test]
    fn model_shape_matches_inputs() {
        let catalog = Catalog::from_records(vec![candidate(1, 85, 500_000)]);
        let slots = vec![slot(0, 80), slot(1, 70)];
        let edges = vec![EligibilityEdge { player: 1, slot: 0 }];
        let built = build_assignment_model(&slots, &catalog, &edges, 1_000_000, false);

        assert_eq!(built.rating_vars.len(), 2);
        assert_eq!(built.transfer_vars.len(), 1);
        // budget + 2 rating defs + 1 per-player + 2 per-slot
        assert_eq!(built.model.rows.len(), 6);
        assert_eq!(built.model.vars[built.transfer_vars[0]].kind, VarKind::Binary);
    }

    #[test]
    fn rating_definition_is_affine_in_the_gain() {
        let catalog = Catalog::from_records(vec![candidate(1, 85, 500_000)]);
        let slots = vec![slot(0, 80)];
        let edges = vec![EligibilityEdge { player: 1, slot: 0 }];
        let built = build_assignment_model(&slots, &catalog, &edges, 1_000_000, false);

        let def = built
            .model
            .rows
            .iter()
            .find(|r| r.name == "rating_def_0")
            .expect("rating definition row");
        assert_eq!(def.sense, RowSense::Eq);
        assert_eq!(def.rhs, 80.0);
        assert!(def.terms.contains(&(built.rating_vars[0], 1.0)));
        assert!(def.terms.contains(&(built.transfer_vars[0], -5.0)));
    }

    #[test]
    fn forced_mode_turns_slot_rows_into_equalities() {
        let catalog = Catalog::from_records(vec![candidate(1, 85, 500_000)]);
        let slots = vec![slot(0, 0)];
        let edges = vec![EligibilityEdge { player: 1, slot: 0 }];
        let built = build_assignment_model(&slots, &catalog, &edges, 1_000_000, true);
        let row = built
            .model
            .rows
            .iter()
            .find(|r| r.name == "one_transfer_0")
            .unwrap();
        assert_eq!(row.sense, RowSense::Eq);
    }

    #[test]
    fn zero_edge_slot_still_gets_its_rating_row() {
        let catalog = Catalog::default();
        let slots = vec![slot(0, 75)];
        let built = build_assignment_model(&slots, &catalog, &[], 1_000_000, false);
        let def = built
            .model
            .rows
            .iter()
            .find(|r| r.name == "rating_def_0")
            .unwrap();
        assert_eq!(def.terms.len(), 1);
        assert_eq!(def.rhs, 75.0);
    }
}
