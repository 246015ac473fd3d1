use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::OptimizeError;
use crate::provider::{DataProvider, PlayerProfile};

const SNAPSHOT_DIR: &str = "transferopt";
const SNAPSHOT_FILE: &str = "catalog.json";
const SNAPSHOT_VERSION: u32 = 1;

/// One candidate (or squad member) as the catalog knows them. Values are
/// integer currency units; the provider has already normalized any
/// currency-string forms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub age: u32,
    /// Market value in currency units. Zero means "unknown"; such players are
    /// never eligible as replacements.
    pub value: i64,
    pub overall: i32,
    pub potential: i32,
    pub positions: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Player {
    /// The one placeholder constructor for a squad member missing from the
    /// catalog. Rating and potential come from the fallback profile fetch when
    /// it succeeded; everything else is inert (no value, no tags), so the
    /// placeholder can never itself become an eligible candidate.
    pub fn placeholder(id: u32, profile: &PlayerProfile) -> Self {
        Self {
            id,
            name: profile.name.clone(),
            age: 0,
            value: 0,
            overall: profile.overall,
            potential: profile.potential,
            positions: Vec::new(),
            image: None,
        }
    }
}

/// Deduplicated id -> player table for one optimization run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    players: HashMap<u32, Player>,
}

impl Catalog {
    /// Build from raw provider records, keeping the last record when the same
    /// id appears more than once (the same player shows up on several source
    /// pages).
    pub fn from_records(records: Vec<Player>) -> Self {
        let mut players = HashMap::with_capacity(records.len());
        for record in records {
            players.insert(record.id, record);
        }
        Self { players }
    }

    pub fn get(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Ids in ascending order. Iteration order must be stable because variable
    /// order downstream decides solver tie-breaks.
    pub fn sorted_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn retain<F: FnMut(&Player) -> bool>(&mut self, mut keep: F) {
        self.players.retain(|_, p| keep(p));
    }

    /// First id above everything in the catalog, for placeholder records.
    pub fn next_free_id(&self) -> u32 {
        self.players.keys().copied().max().map_or(1, |m| m + 1)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogSnapshot {
    version: u32,
    fetched_at: String,
    players: Vec<Player>,
}

/// Fetch the catalog from the provider; fall back to the on-disk snapshot if
/// the fetch fails. Only when both are unavailable is the run lost. Providers
/// that opt out of the snapshot cache neither write nor read it.
pub fn load_catalog(provider: &dyn DataProvider) -> Result<Catalog, OptimizeError> {
    let snapshots = provider.use_snapshot_cache();
    match provider.fetch_catalog() {
        Ok(records) if !records.is_empty() => {
            if snapshots {
                save_snapshot(&records);
            }
            Ok(Catalog::from_records(records))
        }
        Ok(_) => match snapshots.then(load_snapshot).flatten() {
            Some(records) => Ok(Catalog::from_records(records)),
            None => Err(OptimizeError::DataUnavailable(
                "catalog fetch returned no records and no snapshot exists".to_string(),
            )),
        },
        Err(err) => match snapshots.then(load_snapshot).flatten() {
            Some(records) => Ok(Catalog::from_records(records)),
            None => Err(OptimizeError::DataUnavailable(format!(
                "catalog fetch failed ({err}) and no snapshot exists"
            ))),
        },
    }
}

fn load_snapshot() -> Option<Vec<Player>> {
    let path = snapshot_path()?;
    let raw = fs::read_to_string(path).ok()?;
    let snapshot = serde_json::from_str::<CatalogSnapshot>(&raw).ok()?;
    if snapshot.version != SNAPSHOT_VERSION || snapshot.players.is_empty() {
        return None;
    }
    Some(snapshot.players)
}

fn save_snapshot(records: &[Player]) {
    let Some(path) = snapshot_path() else {
        return;
    };
    let Some(dir) = path.parent() else {
        return;
    };
    let _ = fs::create_dir_all(dir);

    let snapshot = CatalogSnapshot {
        version: SNAPSHOT_VERSION,
        fetched_at: chrono::Utc::now().to_rfc3339(),
        players: records.to_vec(),
    };
    if let Ok(json) = serde_json::to_string(&snapshot) {
        let tmp = path.with_extension("json.tmp");
        if fs::write(&tmp, json).is_ok() {
            let _ = fs::rename(&tmp, &path);
        }
    }
}

fn snapshot_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(SNAPSHOT_DIR).join(SNAPSHOT_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join(SNAPSHOT_DIR)
            .join(SNAPSHOT_FILE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u32, value: i64) -> Player {
        Player {
            id,
            name: format!("Player {id}"),
            age: 25,
            value,
            overall: 80,
            potential: 85,
            positions: vec!["ST".to_string()],
            image: None,
        }
    }

    #[test]
    fn duplicate_ids_keep_last_record() {
        let catalog = Catalog::from_records(vec![player(7, 1_000), player(7, 2_000)]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(7).unwrap().value, 2_000);
    }

    #[test]
    fn sorted_ids_are_ascending() {
        let catalog = Catalog::from_records(vec![player(9, 1), player(3, 1), player(5, 1)]);
        assert_eq!(catalog.sorted_ids(), vec![3, 5, 9]);
    }

    #[test]
    fn next_free_id_is_above_the_max() {
        let catalog = Catalog::from_records(vec![player(3, 1), player(11, 1)]);
        assert_eq!(catalog.next_free_id(), 12);
        assert_eq!(Catalog::default().next_free_id(), 1);
    }
}
