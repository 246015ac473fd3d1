//! Transfer-window squad optimizer: scrape player/team ratings from a public
//! database, then pick at most one replacement per lineup slot to maximize
//! total squad rating under a transfer budget.

pub mod catalog;
pub mod eligibility;
pub mod fake_provider;
pub mod http_cache;
pub mod http_client;
pub mod model;
pub mod pipeline;
pub mod positions;
pub mod provider;
pub mod report;
pub mod solver;
pub mod squad;
