//! Scan driver.
//!
//! One call to [`Scanner::run`] is one full pass over the market
//! catalogue: player props first (event by event), then bulk game
//! markets. Each normalized quote set is evaluated for both +EV bets and
//! arbitrage, and the merged results are ranked into a [`ScanReport`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{GameMarket, PropGroup};
use crate::data::normalize::normalize;
use crate::data::odds_api::{KeyRotation, OddsClient};
use crate::data::OddsTransport;
use crate::strategy::{rank_opportunities, Engine};
use crate::types::{MarketKind, NearMiss, Opportunity, QuoteSet};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Delay between consecutive API requests.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(300);

/// Near-misses logged per market after each scan.
pub const DEFAULT_NEAR_MISS_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Quote sets run through the engine.
    pub units_evaluated: usize,
    pub bets: usize,
    pub arbitrages: usize,
    pub near_misses: usize,
    pub keys_active: usize,
    pub keys_total: usize,
}

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Ranked: arbitrage first, then bets by net edge.
    pub opportunities: Vec<Opportunity>,
    pub stats: ScanStats,
}

/// Mutable state of a scan in progress.
struct ScanState {
    rotation: KeyRotation,
    opportunities: Vec<Opportunity>,
    /// Market label → near-misses, logged once per market.
    near_misses: BTreeMap<String, Vec<NearMiss>>,
    units: usize,
}

impl ScanState {
    fn keys_exhausted(&self) -> bool {
        self.rotation.is_exhausted()
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

pub struct Scanner<T> {
    client: Arc<OddsClient<T>>,
    engine: Engine,
    game_markets: Vec<GameMarket>,
    prop_groups: Vec<PropGroup>,
    request_delay: Duration,
    near_miss_limit: usize,
}

impl<T: OddsTransport> Scanner<T> {
    pub fn new(
        client: Arc<OddsClient<T>>,
        engine: Engine,
        game_markets: Vec<GameMarket>,
        prop_groups: Vec<PropGroup>,
    ) -> Self {
        Self {
            client,
            engine,
            game_markets,
            prop_groups,
            request_delay: DEFAULT_REQUEST_DELAY,
            near_miss_limit: DEFAULT_NEAR_MISS_LIMIT,
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_near_miss_limit(mut self, limit: usize) -> Self {
        self.near_miss_limit = limit;
        self
    }

    /// Run one full scan. Never fails: fetch errors only shrink the result.
    pub async fn run(&self) -> ScanReport {
        let scan_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut state = ScanState {
            rotation: self.client.rotation(),
            opportunities: Vec::new(),
            near_misses: BTreeMap::new(),
            units: 0,
        };

        info!(
            %scan_id,
            keys = state.rotation.total(),
            game_markets = self.game_markets.len(),
            prop_groups = self.prop_groups.len(),
            min_edge = self.engine.edge_config().min_edge,
            "=== Scan started ==="
        );

        self.scan_props(&mut state).await;
        self.scan_games(&mut state).await;
        if state.keys_exhausted() {
            warn!(%scan_id, "All API keys exhausted — scan stopped early");
        }

        let mut opportunities = state.opportunities;
        rank_opportunities(&mut opportunities);

        let mut near_miss_count = 0;
        for (market, misses) in &mut state.near_misses {
            near_miss_count += misses.len();
            log_near_misses(market, misses, self.near_miss_limit);
        }

        let arbitrages = opportunities.iter().filter(|o| o.is_arbitrage()).count();
        let stats = ScanStats {
            units_evaluated: state.units,
            bets: opportunities.len() - arbitrages,
            arbitrages,
            near_misses: near_miss_count,
            keys_active: state.rotation.active(),
            keys_total: state.rotation.total(),
        };

        info!(
            %scan_id,
            bets = stats.bets,
            arbitrages = stats.arbitrages,
            units = stats.units_evaluated,
            keys = format!("{}/{}", stats.keys_active, stats.keys_total),
            "=== Scan complete ==="
        );

        ScanReport {
            scan_id,
            started_at,
            finished_at: Utc::now(),
            opportunities,
            stats,
        }
    }

    /// Player props: list events, then fetch each prop market per event.
    async fn scan_props(&self, state: &mut ScanState) {
        for group in &self.prop_groups {
            if state.keys_exhausted() {
                return;
            }
            let events = self
                .client
                .fetch_events(&mut state.rotation, &group.sport)
                .await;
            if events.is_empty() {
                continue;
            }
            let to_scan = events.len().min(group.max_events);
            info!(sport = %group.sport, scanning = to_scan, of = events.len(), "Scanning prop events");

            for event in events.iter().take(group.max_events) {
                for prop in &group.markets {
                    if state.keys_exhausted() {
                        return;
                    }
                    let fetched = self
                        .client
                        .fetch_event_odds(&mut state.rotation, &group.sport, &event.id, &prop.market)
                        .await;
                    if let Some(odds) = fetched.filter(|e| !e.bookmakers.is_empty()) {
                        let before = state.opportunities.len();
                        for quotes in normalize(&odds, MarketKind::PlayerTotal, &prop.market) {
                            self.evaluate_unit(&quotes, &prop.label, state);
                        }
                        let found = state.opportunities.len() - before;
                        if found > 0 {
                            info!(
                                matchup = %format!(
                                    "{} @ {}",
                                    event.away_team.as_deref().unwrap_or("?"),
                                    event.home_team.as_deref().unwrap_or("?")
                                ),
                                market = %prop.label,
                                found,
                                "Prop opportunities"
                            );
                        }
                    }
                    self.pause().await;
                }
            }
        }
    }

    /// Game markets: one bulk request per (sport, market).
    async fn scan_games(&self, state: &mut ScanState) {
        for market in &self.game_markets {
            if state.keys_exhausted() {
                return;
            }
            let games = self
                .client
                .fetch_odds(&mut state.rotation, &market.sport, &market.market)
                .await;
            if let Some(games) = games {
                let before = state.opportunities.len();
                for game in &games {
                    for quotes in normalize(game, MarketKind::Game, &market.market) {
                        self.evaluate_unit(&quotes, &market.label, state);
                    }
                }
                info!(
                    market = %market.label,
                    games = games.len(),
                    found = state.opportunities.len() - before,
                    "Game market scanned"
                );
            }
            self.pause().await;
        }
    }

    fn evaluate_unit(&self, quotes: &QuoteSet, label: &str, state: &mut ScanState) {
        state.units += 1;
        let evaluation = self.engine.evaluate_bets_with_diagnostics(quotes, label);
        state.opportunities.extend(evaluation.opportunities);
        state.opportunities.extend(self.engine.evaluate_arbitrage(quotes, label));
        if !evaluation.near_misses.is_empty() {
            state
                .near_misses
                .entry(label.to_string())
                .or_default()
                .extend(evaluation.near_misses);
        }
    }

    async fn pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }
}

/// Log the closest near-misses for one market, best first.
fn log_near_misses(market: &str, misses: &mut [NearMiss], limit: usize) {
    if misses.is_empty() || limit == 0 {
        return;
    }
    misses.sort_by(|a, b| b.net_edge.total_cmp(&a.net_edge));
    debug!(market, total = misses.len(), "Closest near-misses");
    for miss in misses.iter().take(limit) {
        debug!(market, "  {miss}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
