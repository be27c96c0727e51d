//! Strategy engine: devig, leave-one-out consensus, edge scoring,
//! arbitrage detection, and Kelly staking.
//!
//! Everything in this module is pure and synchronous. The engine is built
//! once from configuration and evaluated against one quote set at a time.

pub mod arbitrage;
pub mod consensus;
pub mod edge;
pub mod kelly;
pub mod odds;

use tracing::debug;

use crate::types::{Opportunity, QuoteSet};
use arbitrage::{ArbConfig, ArbitrageScanner};
use consensus::BookWeights;
use edge::{BetEvaluation, EdgeConfig, EdgeEvaluator};
use kelly::{KellyCalculator, KellyConfig};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything the engine needs, already validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub edge: EdgeConfig,
    /// `None` disables stake recommendations.
    pub kelly: Option<KellyConfig>,
    pub arbitrage: ArbConfig,
    pub weights: BookWeights,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluates quote sets for +EV bets and arbitrage.
pub struct Engine {
    edge: EdgeEvaluator,
    arbitrage: ArbitrageScanner,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let kelly = config.kelly.map(KellyCalculator::new);
        Self {
            edge: EdgeEvaluator::new(config.edge, config.weights, kelly),
            arbitrage: ArbitrageScanner::new(config.arbitrage),
        }
    }

    pub fn edge_config(&self) -> &EdgeConfig {
        self.edge.config()
    }

    /// +EV bets in one quote set.
    pub fn evaluate_bets(&self, quotes: &QuoteSet, market_label: &str) -> Vec<Opportunity> {
        self.evaluate_bets_with_diagnostics(quotes, market_label)
            .opportunities
    }

    /// +EV bets plus the near-misses that fell inside the diagnostic band.
    pub fn evaluate_bets_with_diagnostics(
        &self,
        quotes: &QuoteSet,
        market_label: &str,
    ) -> BetEvaluation {
        if quotes.is_empty() {
            debug!(market = market_label, "Empty quote set — nothing to evaluate");
            return BetEvaluation::default();
        }
        self.edge.evaluate(quotes, market_label)
    }

    /// Cross-book arbitrage in one quote set.
    pub fn evaluate_arbitrage(&self, quotes: &QuoteSet, market_label: &str) -> Vec<Opportunity> {
        if quotes.is_empty() {
            return Vec::new();
        }
        self.arbitrage.scan(quotes, market_label)
    }
}

/// Order opportunities for display: arbitrage first by profit, then bets
/// by net edge, both descending. The sort is stable, so ties keep
/// evaluation order.
pub fn rank_opportunities(opportunities: &mut [Opportunity]) {
    opportunities.sort_by(|a, b| {
        b.is_arbitrage()
            .cmp(&a.is_arbitrage())
            .then_with(|| b.score().total_cmp(&a.score()))
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
