use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;

use crate::catalog::Catalog;
use crate::eligibility::EligibilityEdge;
use crate::model::AssignmentModel;
use crate::solver::MipSolution;
use crate::squad::{OptimizeOptions, SquadSlot};

/// Threshold for reading a relaxed binary as "this transfer happened".
const ACTIVE_THRESHOLD: f64 = 0.5;

pub const DETAIL_COLUMNS: [&str; 8] = [
    "Pos", "Old", "Old.R", "Old.Pot", "New", "New.R", "New.Pot", "Paid",
];

/// One detail-table row: what happened to a slot.
#[derive(Debug, Clone)]
pub struct SlotDecision {
    pub position: String,
    pub old_name: String,
    pub old_rating: i32,
    pub old_potential: i32,
    pub new_name: String,
    pub new_rating: i32,
    pub new_potential: i32,
    pub paid: i64,
    pub transferred: bool,
}

/// The one summary row per run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub team: Option<String>,
    pub age_limit: Option<u32>,
    pub old_rating: i64,
    pub avg_old: f64,
    pub new_rating: i64,
    pub avg_new: f64,
    pub budget: i64,
    pub money_spent: i64,
    /// Rating gained per million spent; defined as 0 when nothing was spent.
    pub efficiency: f64,
    pub transfer_list: String,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub decisions: Vec<SlotDecision>,
}

impl RunOutcome {
    pub fn team_label(&self) -> &str {
        self.summary.team.as_deref().unwrap_or("New Squad")
    }
}

/// Read the solved assignment back into per-slot decisions and aggregates.
pub fn extract_solution(
    slots: &[SquadSlot],
    catalog: &Catalog,
    edges: &[EligibilityEdge],
    built: &AssignmentModel,
    solution: &MipSolution,
    team: Option<&str>,
    options: &OptimizeOptions,
) -> RunOutcome {
    let mut decisions = Vec::with_capacity(slots.len());
    let mut money_spent: i64 = 0;
    let mut transfers = Vec::new();

    for slot in slots {
        let active = edges
            .iter()
            .zip(&built.transfer_vars)
            .find(|&(edge, &var)| {
                edge.slot == slot.index && solution.values[var] > ACTIVE_THRESHOLD
            });

        let decision = match active {
            Some((edge, _)) => {
                let candidate = catalog.get(edge.player);
                let name = candidate.map_or_else(String::new, |p| p.name.clone());
                let overall = candidate.map_or(0, |p| p.overall);
                let potential = candidate.map_or(0, |p| p.potential);
                let paid = candidate.map_or(0, |p| p.value);
                money_spent += paid;
                transfers.push(name.clone());
                SlotDecision {
                    position: slot.label.clone(),
                    old_name: slot.incumbent_name.clone(),
                    old_rating: slot.incumbent_rating,
                    old_potential: slot.incumbent_potential,
                    new_name: name,
                    new_rating: overall,
                    new_potential: potential,
                    paid,
                    transferred: true,
                }
            }
            // Retained: the incumbent repeats in both old and new columns.
            None => SlotDecision {
                position: slot.label.clone(),
                old_name: slot.incumbent_name.clone(),
                old_rating: slot.incumbent_rating,
                old_potential: slot.incumbent_potential,
                new_name: slot.incumbent_name.clone(),
                new_rating: slot.incumbent_rating,
                new_potential: slot.incumbent_potential,
                paid: 0,
                transferred: false,
            },
        };
        decisions.push(decision);
    }

    let old_rating: i64 = slots.iter().map(|s| s.incumbent_rating as i64).sum();
    let new_rating_raw: f64 = built
        .rating_vars
        .iter()
        .map(|&var| solution.values[var])
        .sum();
    let slots_f = slots.len().max(1) as f64;
    let efficiency = if money_spent > 0 {
        (new_rating_raw - old_rating as f64) / (money_spent as f64 / 1e6)
    } else {
        0.0
    };

    RunOutcome {
        summary: RunSummary {
            team: team.map(str::to_string),
            age_limit: options.age_limit,
            old_rating,
            avg_old: old_rating as f64 / slots_f,
            new_rating: new_rating_raw.round() as i64,
            avg_new: new_rating_raw / slots_f,
            budget: built.budget,
            money_spent,
            efficiency,
            transfer_list: transfers.join(", "),
        },
        decisions,
    }
}

/// Detail rows in export/print order, totals row appended.
pub fn detail_rows(outcome: &RunOutcome) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = outcome
        .decisions
        .iter()
        .map(|d| {
            vec![
                d.position.clone(),
                d.old_name.clone(),
                d.old_rating.to_string(),
                d.old_potential.to_string(),
                d.new_name.clone(),
                d.new_rating.to_string(),
                d.new_potential.to_string(),
                d.paid.to_string(),
            ]
        })
        .collect();

    let sum = |pick: fn(&SlotDecision) -> i64| -> i64 { outcome.decisions.iter().map(pick).sum() };
    rows.push(vec![
        String::new(),
        String::new(),
        sum(|d| d.old_rating as i64).to_string(),
        sum(|d| d.old_potential as i64).to_string(),
        String::new(),
        sum(|d| d.new_rating as i64).to_string(),
        sum(|d| d.new_potential as i64).to_string(),
        sum(|d| d.paid).to_string(),
    ]);
    rows
}

pub fn render_detail_table(outcome: &RunOutcome) -> String {
    let rows = detail_rows(outcome);
    let mut widths: Vec<usize> = DETAIL_COLUMNS.iter().map(|c| c.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    for (i, col) in DETAIL_COLUMNS.iter().enumerate() {
        let _ = write!(out, "{:<width$}  ", col, width = widths[i]);
    }
    out.push('\n');
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            let _ = write!(out, "{:<width$}  ", cell, width = widths[i]);
        }
        out.push('\n');
    }
    out
}

pub fn render_summary_line(summary: &RunSummary) -> String {
    format!(
        "{}: rating {} -> {} (avg {:.3} -> {:.3}), spent {} of {}, efficiency {:.3}{}",
        summary
            .team
            .as_deref()
            .unwrap_or("New Squad"),
        summary.old_rating,
        summary.new_rating,
        summary.avg_old,
        summary.avg_new,
        summary.money_spent,
        summary.budget,
        summary.efficiency,
        if summary.transfer_list.is_empty() {
            String::new()
        } else {
            format!(" [{}]", summary.transfer_list)
        },
    )
}

/// Write one workbook: a summary sheet plus a detail sheet per run.
pub fn export_workbook(path: &Path, outcomes: &[RunOutcome]) -> Result<()> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet().set_name("Summary")?;
    let headers = [
        "Team",
        "Age_Limit",
        "Old Rating",
        "Avg.Old",
        "New Rating",
        "Avg.New",
        "Budget",
        "Money Spent",
        "Efficiency",
        "Transfers",
    ];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }
    for (row, outcome) in outcomes.iter().enumerate() {
        let s = &outcome.summary;
        let r = (row + 1) as u32;
        sheet.write_string(r, 0, outcome.team_label())?;
        match s.age_limit {
            Some(limit) => sheet.write_number(r, 1, limit as f64)?,
            None => sheet.write_string(r, 1, "-")?,
        };
        sheet.write_number(r, 2, s.old_rating as f64)?;
        sheet.write_number(r, 3, s.avg_old)?;
        sheet.write_number(r, 4, s.new_rating as f64)?;
        sheet.write_number(r, 5, s.avg_new)?;
        sheet.write_number(r, 6, s.budget as f64)?;
        sheet.write_number(r, 7, s.money_spent as f64)?;
        sheet.write_number(r, 8, s.efficiency)?;
        sheet.write_string(r, 9, s.transfer_list.as_str())?;
    }

    for (idx, outcome) in outcomes.iter().enumerate() {
        let name = sheet_name(idx, outcome.team_label());
        let sheet = workbook.add_worksheet().set_name(&name)?;
        for (col, header) in DETAIL_COLUMNS.iter().enumerate() {
            sheet.write_string(0, col as u16, *header)?;
        }
        for (row, cells) in detail_rows(outcome).iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                sheet.write_string((row + 1) as u32, col as u16, cell.as_str())?;
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("write workbook {}", path.display()))?;
    Ok(())
}

// Excel sheet names are capped at 31 chars and must be unique per workbook.
fn sheet_name(idx: usize, label: &str) -> String {
    let prefix: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .take(24)
        .collect();
    format!("{} {}", idx + 1, prefix.trim())
}
