use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Player};
use crate::pipeline::OptimizeError;
use crate::provider::{DataProvider, PlayerProfile, TeamSheet};

/// Caller-facing knobs for one optimization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizeOptions {
    /// Candidates older than this are never eligible.
    pub age_limit: Option<u32>,
    /// Overrides the team's native transfer budget.
    pub budget_limit: Option<i64>,
}

/// One of the 11 lineup positions with its incumbent snapshot. The rating is
/// captured here, at resolve time, and used for the whole run even if the
/// catalog record changes underneath.
#[derive(Debug, Clone)]
pub struct SquadSlot {
    pub index: usize,
    pub label: String,
    pub incumbent: u32,
    pub incumbent_name: String,
    pub incumbent_rating: i32,
    pub incumbent_potential: i32,
}

/// Resolve the team sheet against the catalog, slot by slot. A starter the
/// catalog does not know is re-fetched individually; if even that fails, the
/// slot gets the canonical zero-rated placeholder. Either way the placeholder
/// record is inserted into the catalog so downstream pruning and extraction
/// can see it — an unknown reference is never fatal to the run.
pub fn resolve_squad(
    sheet: &TeamSheet,
    catalog: &mut Catalog,
    provider: &dyn DataProvider,
) -> Vec<SquadSlot> {
    let mut slots = Vec::with_capacity(sheet.positions.len());
    for (index, label) in sheet.positions.iter().enumerate() {
        let reference = sheet.players.get(index).copied().flatten();

        if let Some(id) = reference {
            if let Some(player) = catalog.get(id) {
                slots.push(SquadSlot {
                    index,
                    label: label.clone(),
                    incumbent: id,
                    incumbent_name: player.name.clone(),
                    incumbent_rating: player.overall,
                    incumbent_potential: player.potential,
                });
                continue;
            }
        }

        // Not in the catalog: try the player page, then give up to a stub.
        let profile = match reference {
            Some(id) => provider.fetch_player(id).unwrap_or_else(|err| {
                let err = OptimizeError::UnknownPlayerReference(format!("player {id}: {err}"));
                eprintln!("{err}, using placeholder");
                PlayerProfile::default()
            }),
            None => PlayerProfile::default(),
        };
        let fallback_rating = sheet.ratings.get(index).copied().unwrap_or(0);
        let profile = PlayerProfile {
            overall: if profile.overall > 0 {
                profile.overall
            } else {
                fallback_rating
            },
            ..profile
        };

        let id = catalog.next_free_id();
        let placeholder = Player::placeholder(id, &profile);
        slots.push(SquadSlot {
            index,
            label: label.clone(),
            incumbent: id,
            incumbent_name: placeholder.name.clone(),
            incumbent_rating: placeholder.overall,
            incumbent_potential: placeholder.potential,
        });
        catalog.insert(placeholder);
    }
    slots
}
