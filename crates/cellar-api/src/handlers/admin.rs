//! Liveness and usage-counter endpoints.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use cellar_storage::{StatsSnapshot, StatsSummary};
use serde::Serialize;

pub async fn ping() -> &'static str {
    "pong"
}

#[derive(Debug, Serialize)]
pub struct BinStats {
    pub id: i64,
    pub name: String,
    pub redirect: bool,
    pub stats: StatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct DriverStats {
    pub id: i64,
    pub name: String,
    pub stats: StatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub bins: Vec<BinStats>,
    pub drivers: Vec<DriverStats>,
    /// Aggregate over the bins: extremes, totals, mean, deviation.
    pub summary: StatsSummary,
}

/// Usage counters for every bin and driver materialized in the cache.
/// Counters live in memory only and reset on restart.
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let bins: Vec<BinStats> = state
        .manager
        .cached_bins()
        .into_iter()
        .map(|bin| BinStats {
            id: bin.id(),
            name: bin.name.clone(),
            redirect: bin.redirect,
            stats: bin.stats(),
        })
        .collect();

    let drivers: Vec<DriverStats> = state
        .manager
        .cached_drivers()
        .into_iter()
        .map(|driver| DriverStats {
            id: driver.identity().id(),
            name: driver.identity().name().to_string(),
            stats: driver.stats(),
        })
        .collect();

    let summary = StatsSummary::from_snapshots(bins.iter().map(|b| b.stats));

    Json(StatsResponse {
        bins,
        drivers,
        summary,
    })
}
