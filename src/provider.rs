use std::env;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Deserialize;

use crate::catalog::Player;
use crate::http_cache::fetch_text_cached;
use crate::http_client::http_client;
use crate::positions::{DEFAULT_FORMATION, SQUAD_SIZE};

const DEFAULT_BASE_URL: &str = "https://sofifa.com/api";
const DEFAULT_CATALOG_PAGES: usize = 200;
const PAGE_SIZE: usize = 60;

/// The data-provider collaborator. The optimization core only ever sees these
/// three operations and their normalized outputs; transport, pagination and
/// currency-string details stay on this side of the seam.
pub trait DataProvider: Sync {
    /// Full candidate table, possibly with duplicate ids across pages.
    fn fetch_catalog(&self) -> Result<Vec<Player>>;

    /// Starting eleven, slot labels, ratings and transfer budget for a club.
    /// `None` yields the canonical empty-squad stub (default formation, zero
    /// ratings, zero budget) used for new-squad builds.
    fn fetch_team(&self, team: Option<&str>) -> Result<TeamSheet>;

    /// Fallback lookup for a starter who is missing from the catalog.
    fn fetch_player(&self, id: u32) -> Result<PlayerProfile>;

    /// Whether catalog fetches may be persisted to, and recovered from, the
    /// on-disk snapshot. In-memory providers opt out so fabricated records
    /// never stand in for a real fetch later.
    fn use_snapshot_cache(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct TeamSheet {
    pub name: Option<String>,
    /// Starter references in slot order; `None` where the sheet has no
    /// resolvable player (always the case for the empty-squad stub).
    pub players: Vec<Option<u32>>,
    pub positions: Vec<String>,
    pub ratings: Vec<i32>,
    pub budget: i64,
}

impl TeamSheet {
    pub fn empty_stub() -> Self {
        Self {
            name: None,
            players: vec![None; SQUAD_SIZE],
            positions: DEFAULT_FORMATION.iter().map(|s| s.to_string()).collect(),
            ratings: vec![0; SQUAD_SIZE],
            budget: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerProfile {
    pub name: String,
    pub overall: i32,
    pub potential: i32,
}

/// HTTP implementation against the public player-database API.
pub struct HttpProvider {
    base: String,
    pages: usize,
}

impl HttpProvider {
    pub fn from_env() -> Self {
        let base = env::var("CATALOG_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let pages = env::var("CATALOG_PAGES")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CATALOG_PAGES)
            .clamp(1, 1_000);
        Self { base, pages }
    }
}

impl DataProvider for HttpProvider {
    fn fetch_catalog(&self) -> Result<Vec<Player>> {
        let client = http_client()?;
        let urls: Vec<String> = (0..self.pages)
            .map(|i| {
                format!(
                    "{}/players?col=oa&sort=desc&offset={}",
                    self.base,
                    i * PAGE_SIZE
                )
            })
            .collect();

        let pages: Vec<Result<Vec<Player>>> = with_fetch_pool(|| {
            urls.par_iter()
                .map(|url| {
                    let body = fetch_text_cached(client, url)?;
                    parse_players_page_json(&body)
                })
                .collect()
        });

        let mut players = Vec::new();
        let mut failed = 0usize;
        let mut first_err = None;
        for page in pages {
            match page {
                Ok(mut rows) => players.append(&mut rows),
                Err(err) => {
                    failed += 1;
                    first_err.get_or_insert(err);
                }
            }
        }
        if players.is_empty() {
            if let Some(err) = first_err {
                return Err(err.context("catalog fetch failed on every page"));
            }
            return Ok(Vec::new());
        }
        if failed > 0 {
            eprintln!("catalog fetch: {failed} of {} pages failed, continuing", self.pages);
        }
        Ok(players)
    }

    fn fetch_team(&self, team: Option<&str>) -> Result<TeamSheet> {
        let Some(team) = team else {
            return Ok(TeamSheet::empty_stub());
        };
        let client = http_client()?;

        let search_url = format!("{}/teams?keyword={}", self.base, team.replace(' ', "%20"));
        let body = fetch_text_cached(client, &search_url)?;
        let team_id = parse_team_search_json(&body)?
            .ok_or_else(|| anyhow::anyhow!("no team matching '{team}'"))?;

        let team_url = format!("{}/team/{team_id}", self.base);
        let body = fetch_text_cached(client, &team_url)?;
        parse_team_json(&body).with_context(|| format!("invalid team page for '{team}'"))
    }

    fn fetch_player(&self, id: u32) -> Result<PlayerProfile> {
        let client = http_client()?;
        let url = format!("{}/player/{id}", self.base);
        let body = fetch_text_cached(client, &url)?;
        parse_player_profile_json(&body)
    }
}

#[derive(Debug, Deserialize)]
struct PlayersPage {
    players: Vec<PlayerRow>,
}

#[derive(Debug, Deserialize)]
struct PlayerRow {
    id: u32,
    name: String,
    #[serde(default)]
    image: Option<String>,
    age: u32,
    /// Comma-separated role tags, e.g. "ST, CF".
    positions: String,
    value: MoneyField,
    overall: i32,
    potential: i32,
}

#[derive(Debug, Deserialize)]
struct TeamSearchPage {
    teams: Vec<TeamHit>,
}

#[derive(Debug, Deserialize)]
struct TeamHit {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TeamPage {
    name: String,
    budget: MoneyField,
    starting: Vec<StarterRow>,
}

#[derive(Debug, Deserialize)]
struct StarterRow {
    #[serde(default)]
    player: Option<u32>,
    position: String,
    rating: i32,
}

#[derive(Debug, Deserialize)]
struct PlayerProfilePage {
    name: String,
    overall: i32,
    #[serde(default)]
    potential: i32,
}

/// Amounts arrive either as integer currency units or as display strings
/// ("€1.2M", "€500K", "€780").
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MoneyField {
    Int(i64),
    Text(String),
}

impl MoneyField {
    fn normalize(&self) -> i64 {
        match self {
            MoneyField::Int(v) => *v,
            MoneyField::Text(raw) => normalize_currency(raw).unwrap_or(0),
        }
    }
}

/// "€1.2M" -> 1_200_000, "€500K" -> 500_000, "€780" -> 780. Unparseable
/// amounts come back as `None`; callers treat that as unknown value.
pub fn normalize_currency(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let start = trimmed.find(|c: char| c.is_ascii_digit() || c == '-')?;
    let body = &trimmed[start..];
    let (digits, multiplier) = if let Some(stripped) = body.strip_suffix(['M', 'm']) {
        (stripped, 1_000_000.0)
    } else if let Some(stripped) = body.strip_suffix(['K', 'k']) {
        (stripped, 1_000.0)
    } else {
        (body, 1.0)
    };
    let value: f64 = digits.trim().parse().ok()?;
    Some((value * multiplier).round() as i64)
}

pub fn parse_players_page_json(raw: &str) -> Result<Vec<Player>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let page: PlayersPage = serde_json::from_str(trimmed).context("invalid players page json")?;
    Ok(page
        .players
        .into_iter()
        .map(|row| Player {
            id: row.id,
            name: row.name,
            age: row.age,
            value: row.value.normalize(),
            overall: row.overall,
            potential: row.potential,
            positions: split_position_tags(&row.positions),
            image: row.image,
        })
        .collect())
}

pub fn parse_team_search_json(raw: &str) -> Result<Option<u64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    let page: TeamSearchPage = serde_json::from_str(trimmed).context("invalid team search json")?;
    Ok(page.teams.first().map(|hit| hit.id))
}

pub fn parse_team_json(raw: &str) -> Result<TeamSheet> {
    let page: TeamPage = serde_json::from_str(raw.trim()).context("invalid team json")?;
    if page.starting.len() != SQUAD_SIZE {
        anyhow::bail!(
            "team page lists {} starters, expected {SQUAD_SIZE}",
            page.starting.len()
        );
    }
    let mut sheet = TeamSheet {
        name: Some(page.name),
        players: Vec::with_capacity(SQUAD_SIZE),
        positions: Vec::with_capacity(SQUAD_SIZE),
        ratings: Vec::with_capacity(SQUAD_SIZE),
        budget: page.budget.normalize(),
    };
    for row in page.starting {
        sheet.players.push(row.player);
        sheet.positions.push(row.position);
        sheet.ratings.push(row.rating);
    }
    Ok(sheet)
}

pub fn parse_player_profile_json(raw: &str) -> Result<PlayerProfile> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        anyhow::bail!("empty player response");
    }
    let page: PlayerProfilePage = serde_json::from_str(trimmed).context("invalid player json")?;
    Ok(PlayerProfile {
        name: page.name,
        overall: page.overall,
        potential: page.potential,
    })
}

fn split_position_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn with_fetch_pool<T>(action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    let threads = fetch_parallelism();
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}

fn fetch_parallelism() -> usize {
    env::var("FETCH_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(6)
        .clamp(2, 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_strings_normalize() {
        assert_eq!(normalize_currency("€1.2M"), Some(1_200_000));
        assert_eq!(normalize_currency("€500K"), Some(500_000));
        assert_eq!(normalize_currency("€780"), Some(780));
        assert_eq!(normalize_currency("€1.25M"), Some(1_250_000));
        assert_eq!(normalize_currency("1M"), Some(1_000_000));
        assert_eq!(normalize_currency(""), None);
        assert_eq!(normalize_currency("n/a"), None);
    }

    #[test]
    fn empty_stub_matches_default_formation() {
        let stub = TeamSheet::empty_stub();
        assert_eq!(stub.positions.len(), SQUAD_SIZE);
        assert_eq!(stub.positions[0], "GK");
        assert!(stub.players.iter().all(|p| p.is_none()));
        assert!(stub.ratings.iter().all(|&r| r == 0));
        assert_eq!(stub.budget, 0);
    }

    #[test]
    fn position_tags_split_and_trim() {
        assert_eq!(split_position_tags("ST, CF"), vec!["ST", "CF"]);
        assert_eq!(split_position_tags("GK"), vec!["GK"]);
        assert!(split_position_tags("").is_empty());
    }
}
