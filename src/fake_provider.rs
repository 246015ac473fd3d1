use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use crate::catalog::Player;
use crate::provider::{DataProvider, PlayerProfile, TeamSheet};

/// Offline stand-in for the player database: a fixed record table plus canned
/// team sheets. Used by the test suite, the bench, and `--offline` demo runs.
#[derive(Default)]
pub struct FakeProvider {
    pub records: Vec<Player>,
    pub teams: HashMap<String, TeamSheet>,
    pub profiles: HashMap<u32, PlayerProfile>,
    /// When set, `fetch_team` fails for this name (used to exercise batch
    /// error independence).
    pub broken_team: Option<String>,
    /// When set, `fetch_catalog` fails outright.
    pub broken_catalog: bool,
    /// Snapshot persistence is off for in-memory records unless a test
    /// exercising the fallback path turns it on.
    pub persist_snapshots: bool,
    catalog_fetches: AtomicUsize,
}

impl FakeProvider {
    pub fn with_records(records: Vec<Player>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn add_team(&mut self, name: &str, sheet: TeamSheet) {
        self.teams.insert(name.to_string(), sheet);
    }

    pub fn add_profile(&mut self, id: u32, profile: PlayerProfile) {
        self.profiles.insert(id, profile);
    }

    pub fn catalog_fetches(&self) -> usize {
        self.catalog_fetches.load(Ordering::Relaxed)
    }

    /// A small self-consistent league for demo runs without network access.
    pub fn demo() -> Self {
        let mut records = Vec::new();
        let mut id = 1u32;
        let roles: [(&str, &[&str]); 6] = [
            ("GK", &["GK"]),
            ("LB", &["LB", "LWB"]),
            ("CB", &["CB"]),
            ("RB", &["RB"]),
            ("CM", &["CM", "CAM"]),
            ("ST", &["ST", "CF"]),
        ];
        for (i, (name_tag, tags)) in roles.iter().enumerate() {
            for step in 0..8 {
                records.push(Player {
                    id,
                    name: format!("{name_tag} Prospect {step}"),
                    age: 19 + step,
                    value: 2_000_000 * (step as i64 + 1) + i as i64 * 250_000,
                    overall: 72 + step as i32 * 2,
                    potential: 80 + step as i32,
                    positions: tags.iter().map(|t| t.to_string()).collect(),
                    image: None,
                });
                id += 1;
            }
        }
        // CAM coverage for the default formation's attacking-mid slot.
        for step in 0..4 {
            records.push(Player {
                id,
                name: format!("CAM Prospect {step}"),
                age: 20 + step,
                value: 3_000_000 * (step as i64 + 1),
                overall: 74 + step as i32 * 3,
                potential: 84 + step as i32,
                positions: vec!["CAM".to_string(), "CM".to_string()],
                image: None,
            });
            id += 1;
        }
        Self::with_records(records)
    }
}

impl DataProvider for FakeProvider {
    fn fetch_catalog(&self) -> Result<Vec<Player>> {
        self.catalog_fetches.fetch_add(1, Ordering::Relaxed);
        if self.broken_catalog {
            anyhow::bail!("catalog endpoint unreachable");
        }
        Ok(self.records.clone())
    }

    fn fetch_team(&self, team: Option<&str>) -> Result<TeamSheet> {
        let Some(name) = team else {
            return Ok(TeamSheet::empty_stub());
        };
        if self.broken_team.as_deref() == Some(name) {
            anyhow::bail!("team endpoint unreachable");
        }
        self.teams
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no team matching '{name}'"))
    }

    fn fetch_player(&self, id: u32) -> Result<PlayerProfile> {
        self.profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("player {id} not found"))
    }

    fn use_snapshot_cache(&self) -> bool {
        self.persist_snapshots
    }
}
