//! Cross-book arbitrage detection.
//!
//! For every two-way proposition in a quote set, take the best price on
//! each side across the bettable books. When the two best prices come
//! from different books and their implied probabilities sum to under
//! 1.0, both sides can be backed for a locked-in profit.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use tracing::debug;

use super::consensus::complementary_pairs;
use super::odds::price_to_implied;
use crate::types::{ArbLeg, ArbOpportunity, Opportunity, OutcomeKey, Price, QuoteSet};

#[derive(Debug, Clone, PartialEq)]
pub struct ArbConfig {
    /// Total stake split across the two legs.
    pub notional: Decimal,
    /// Books that can actually be bet. `None` means every quoted book.
    pub bettable: Option<BTreeSet<String>>,
}

impl Default for ArbConfig {
    fn default() -> Self {
        Self {
            notional: dec!(100),
            bettable: None,
        }
    }
}

/// Best-priced candidates for one side: every book tied at the lowest
/// implied probability, in book order.
struct BestSide<'q> {
    implied: f64,
    books: Vec<(&'q str, Price)>,
}

pub struct ArbitrageScanner {
    config: ArbConfig,
}

impl ArbitrageScanner {
    pub fn new(config: ArbConfig) -> Self {
        Self { config }
    }

    fn is_bettable(&self, book: &str) -> bool {
        self.config
            .bettable
            .as_ref()
            .map_or(true, |allowed| allowed.contains(book))
    }

    pub fn scan(&self, quotes: &QuoteSet, market_label: &str) -> Vec<Opportunity> {
        let keys: BTreeSet<&OutcomeKey> = quotes
            .books
            .iter()
            .filter(|(book, _)| self.is_bettable(book))
            .flat_map(|(_, outcomes)| outcomes.keys())
            .collect();

        let mut found = Vec::new();
        for (side_a, side_b) in complementary_pairs(keys) {
            let (Some(best_a), Some(best_b)) =
                (self.best_side(quotes, &side_a), self.best_side(quotes, &side_b))
            else {
                continue;
            };

            let total_implied = best_a.implied + best_b.implied;
            if total_implied >= 1.0 {
                continue;
            }

            // first combination of tied-best books that uses two different books
            let legs = best_a.books.iter().find_map(|&(book_a, price_a)| {
                best_b
                    .books
                    .iter()
                    .find(|(book_b, _)| *book_b != book_a)
                    .map(|&(book_b, price_b)| ((book_a, price_a), (book_b, price_b)))
            });
            let Some(((book_a, price_a), (book_b, price_b))) = legs else {
                debug!(
                    outcome = %side_a,
                    "Best prices on both sides at the same book — not an arbitrage"
                );
                continue;
            };

            let (stake_a, stake_b) = self.split_stake(best_a.implied, best_b.implied);
            let profit_pct = (1.0 - total_implied) * 100.0;

            debug!(
                market = market_label,
                book_a,
                book_b,
                profit_pct = format!("{profit_pct:.2}%"),
                "Arbitrage detected"
            );

            found.push(Opportunity::Arbitrage(ArbOpportunity {
                event: quotes.event.clone(),
                market: market_label.to_string(),
                participant: quotes.participant.clone(),
                legs: [
                    ArbLeg {
                        outcome: side_a,
                        book: book_a.to_string(),
                        price: price_a,
                        implied: best_a.implied,
                        stake: stake_a,
                    },
                    ArbLeg {
                        outcome: side_b,
                        book: book_b.to_string(),
                        price: price_b,
                        implied: best_b.implied,
                        stake: stake_b,
                    },
                ],
                total_implied,
                profit_pct,
                notional: self.config.notional,
            }));
        }

        found
    }

    fn best_side<'q>(&self, quotes: &'q QuoteSet, key: &OutcomeKey) -> Option<BestSide<'q>> {
        let mut best: Option<BestSide<'q>> = None;
        for (book, outcomes) in &quotes.books {
            if !self.is_bettable(book) {
                continue;
            }
            let Some(&price) = outcomes.get(key) else {
                continue;
            };
            let implied = price_to_implied(price);
            match &mut best {
                Some(b) if implied < b.implied => {
                    b.implied = implied;
                    b.books.clear();
                    b.books.push((book.as_str(), price));
                }
                Some(b) if implied == b.implied => b.books.push((book.as_str(), price)),
                Some(_) => {}
                None => {
                    best = Some(BestSide {
                        implied,
                        books: vec![(book.as_str(), price)],
                    })
                }
            }
        }
        best
    }

    /// Split the notional in proportion to each leg's implied probability.
    /// Stakes are rounded to cents and always sum to the notional.
    fn split_stake(&self, implied_a: f64, implied_b: f64) -> (Decimal, Decimal) {
        let notional = self.config.notional;
        let ratio = Decimal::try_from(implied_a / (implied_a + implied_b)).unwrap_or(dec!(0.5));
        let stake_a = (notional * ratio).round_dp(2);
        (stake_a, notional - stake_a)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
