//! Edge evaluation.
//!
//! Compares each bookmaker's offered price against the leave-one-out
//! consensus of the other books and classifies the result as a bet, a
//! near-miss (diagnostic only), or no signal.

use tracing::debug;

use super::consensus::{BookWeights, ConsensusBuilder, DevigTable};
use super::kelly::KellyCalculator;
use super::odds::{implied_to_price, price_to_implied};
use crate::types::{BetOpportunity, EdgeBasis, NearMiss, Opportunity, OutcomeKey, Price, QuoteSet};

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

/// Edge thresholds and consensus requirements. All edges are in
/// percentage points.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeConfig {
    /// Net edge at or above this is a bet.
    pub min_edge: f64,
    /// Net edge at or above this (and below `min_edge`) is a near-miss.
    pub near_miss_floor: f64,
    /// Books that must devig an outcome before it is evaluated.
    pub min_books: usize,
    /// Other books required in a leave-one-out consensus.
    pub min_contributors: usize,
    /// Allow the line-based estimate for books quoting only one side.
    pub line_fallback: bool,
    /// Percentage points of edge credited per point of line advantage.
    pub line_value_per_point: f64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            min_edge: 0.1,
            near_miss_floor: -3.0,
            min_books: 3,
            min_contributors: 2,
            line_fallback: true,
            line_value_per_point: 4.0,
        }
    }
}

/// Outcome of comparing a net edge with the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeClass {
    Bet,
    NearMiss,
    NoSignal,
}

impl EdgeConfig {
    pub fn classify(&self, net_edge: f64) -> EdgeClass {
        if net_edge >= self.min_edge {
            EdgeClass::Bet
        } else if net_edge >= self.near_miss_floor {
            EdgeClass::NearMiss
        } else {
            EdgeClass::NoSignal
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Bets and near-misses found in one quote set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BetEvaluation {
    pub opportunities: Vec<Opportunity>,
    pub near_misses: Vec<NearMiss>,
}

/// Net/gross edges for one (book, outcome) before classification.
struct Scored {
    net_edge: f64,
    gross_edge: f64,
    consensus_prob: Option<f64>,
    juice: Option<f64>,
    contributors: usize,
    weight_sum: f64,
    basis: EdgeBasis,
}

pub struct EdgeEvaluator {
    config: EdgeConfig,
    weights: BookWeights,
    kelly: Option<KellyCalculator>,
}

impl EdgeEvaluator {
    pub fn new(config: EdgeConfig, weights: BookWeights, kelly: Option<KellyCalculator>) -> Self {
        Self {
            config,
            weights,
            kelly,
        }
    }

    /// Access the edge configuration.
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Score every (book, outcome) in `quotes` against its leave-one-out
    /// consensus.
    pub fn evaluate(&self, quotes: &QuoteSet, market_label: &str) -> BetEvaluation {
        let mut result = BetEvaluation::default();
        let table = DevigTable::build(quotes);
        if table.book_count() == 0 {
            return result;
        }
        let builder = ConsensusBuilder::new(
            &table,
            &self.weights,
            self.config.min_books,
            self.config.min_contributors,
        );

        for (book, outcomes) in &quotes.books {
            for (key, &price) in outcomes {
                let scored = match table.get(book, key) {
                    Some(own) => {
                        let Some(c) = builder.leave_one_out(key, book) else {
                            continue;
                        };
                        Scored {
                            net_edge: (c.fair_prob - own.implied) * 100.0,
                            gross_edge: (c.fair_prob - own.fair) * 100.0,
                            consensus_prob: Some(c.fair_prob),
                            juice: Some(own.juice),
                            contributors: c.contributors,
                            weight_sum: c.weight_sum,
                            basis: EdgeBasis::Devigged,
                        }
                    }
                    // one-sided quote: no own fair, so gross equals net
                    None => match builder.leave_one_out(key, book) {
                        Some(c) => {
                            let net_edge = (c.fair_prob - price_to_implied(price)) * 100.0;
                            Scored {
                                net_edge,
                                gross_edge: net_edge,
                                consensus_prob: Some(c.fair_prob),
                                juice: None,
                                contributors: c.contributors,
                                weight_sum: c.weight_sum,
                                basis: EdgeBasis::Devigged,
                            }
                        }
                        None => match self.line_estimate(&builder, book, key, price) {
                            Some(s) => s,
                            None => continue,
                        },
                    },
                };

                match self.config.classify(scored.net_edge) {
                    EdgeClass::Bet => {
                        let opp = self.build_bet(quotes, market_label, book, key, price, scored);
                        debug!(
                            book = %book,
                            outcome = %key,
                            net_edge = format!("{:+.2}%", opp.score()),
                            "Edge detected"
                        );
                        result.opportunities.push(opp);
                    }
                    EdgeClass::NearMiss => result.near_misses.push(NearMiss {
                        matchup: quotes.event.matchup(),
                        market: market_label.to_string(),
                        participant: quotes.participant.clone(),
                        outcome: key.clone(),
                        book: book.clone(),
                        net_edge: scored.net_edge,
                    }),
                    EdgeClass::NoSignal => {}
                }
            }
        }

        result
    }

    /// Line-based estimate for a book that quotes only one side at a line
    /// nobody else devigs.
    ///
    /// Line advantage over the reference books' mean line is credited at
    /// `line_value_per_point`. The offered price is then charged against
    /// the reference fair probability of the same side, so a standard
    /// -110 costs half a typical overround and a heavily juiced alternate
    /// line costs what it actually charges.
    fn line_estimate(
        &self,
        builder: &ConsensusBuilder<'_>,
        book: &str,
        key: &OutcomeKey,
        price: Price,
    ) -> Option<Scored> {
        if !self.config.line_fallback {
            return None;
        }
        let book_line = key.point?.value();
        let reference = builder.line_reference(&key.name, book)?;

        // lower is better for an over, higher for an under or a spread
        let advantage = if key.name.eq_ignore_ascii_case("over") {
            reference.mean_line - book_line
        } else {
            book_line - reference.mean_line
        };
        let gross_edge = advantage * self.config.line_value_per_point;
        let price_cost = (price_to_implied(price) - reference.mean_fair) * 100.0;
        let net_edge = gross_edge - price_cost;

        Some(Scored {
            net_edge,
            gross_edge,
            consensus_prob: None,
            juice: None,
            contributors: reference.contributors,
            weight_sum: reference.weight_sum,
            basis: EdgeBasis::LineFallback {
                book_line,
                consensus_line: reference.mean_line,
            },
        })
    }

    fn build_bet(
        &self,
        quotes: &QuoteSet,
        market_label: &str,
        book: &str,
        key: &OutcomeKey,
        price: Price,
        scored: Scored,
    ) -> Opportunity {
        let stake_fraction = match (&self.kelly, scored.consensus_prob) {
            (Some(kelly), Some(p)) => Some(kelly.recommended(p, price)),
            _ => None,
        };

        Opportunity::Bet(BetOpportunity {
            event: quotes.event.clone(),
            market: market_label.to_string(),
            participant: quotes.participant.clone(),
            outcome: key.clone(),
            book: book.to_string(),
            net_edge: scored.net_edge,
            gross_edge: scored.gross_edge,
            price,
            juiced_prob: price_to_implied(price),
            consensus_prob: scored.consensus_prob,
            fair_price: scored.consensus_prob.and_then(implied_to_price),
            juice: scored.juice,
            contributing_books: scored.contributors,
            weight_sum: scored.weight_sum,
            stake_fraction,
            basis: scored.basis,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
