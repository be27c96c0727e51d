//! Leave-one-out consensus of devigged fair probabilities.
//!
//! Every bookmaker's two-way pairs are devigged once into a
//! [`DevigTable`]. The consensus for bookmaker `B` on an outcome is the
//! weighted mean of the fair probabilities of every *other* bookmaker
//! quoting that outcome, so `B`'s own price never feeds its baseline.

use std::collections::BTreeMap;
use tracing::debug;

use super::odds::{devig_pair, overround_pct, price_to_implied};
use crate::types::{EvError, OutcomeKey, QuoteSet};

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Per-bookmaker consensus weights. Unlisted books weigh 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct BookWeights {
    overrides: BTreeMap<String, f64>,
}

impl Default for BookWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

impl BookWeights {
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    pub fn uniform() -> Self {
        Self {
            overrides: BTreeMap::new(),
        }
    }

    /// Build from explicit overrides. Every weight must be finite and > 0.
    pub fn new(overrides: BTreeMap<String, f64>) -> Result<Self, EvError> {
        for (book, &weight) in &overrides {
            if !(weight.is_finite() && weight > 0.0) {
                return Err(EvError::InvalidWeight {
                    book: book.clone(),
                    weight,
                });
            }
        }
        Ok(Self { overrides })
    }

    pub fn weight(&self, book: &str) -> f64 {
        self.overrides
            .get(book)
            .copied()
            .unwrap_or(Self::DEFAULT_WEIGHT)
    }
}

// ---------------------------------------------------------------------------
// Devig table
// ---------------------------------------------------------------------------

/// Devigged view of one side of a bookmaker's two-way pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FairQuote {
    pub fair: f64,
    pub implied: f64,
    /// Overround of the pair this side came from, in percentage points.
    pub juice: f64,
}

/// Pair up the complementary sides a single bookmaker quotes.
///
/// A side is paired only when it has exactly one complement and that
/// complement has exactly one complement back. Three-way markets and
/// ambiguous alternate lines are left unpaired.
pub fn complementary_pairs<'a, I>(keys: I) -> Vec<(OutcomeKey, OutcomeKey)>
where
    I: IntoIterator<Item = &'a OutcomeKey>,
{
    let keys: Vec<&OutcomeKey> = keys.into_iter().collect();

    let mut pairs = Vec::new();
    for (i, &a) in keys.iter().enumerate() {
        let candidates = partners(&keys, a);
        if candidates.len() != 1 {
            continue;
        }
        let b = candidates[0];
        // emit each pair once, from its first side
        let b_index = keys.iter().position(|k| *k == b).unwrap_or(0);
        if b_index <= i {
            continue;
        }
        if partners(&keys, b).len() == 1 {
            pairs.push((a.clone(), b.clone()));
        }
    }
    pairs
}

fn partners<'k>(keys: &[&'k OutcomeKey], key: &OutcomeKey) -> Vec<&'k OutcomeKey> {
    keys.iter().copied().filter(|o| key.complements(o)).collect()
}

/// Book → outcome → devigged quote, for every book with a valid pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevigTable {
    books: BTreeMap<String, BTreeMap<OutcomeKey, FairQuote>>,
}

impl DevigTable {
    pub fn build(quotes: &QuoteSet) -> Self {
        let mut books = BTreeMap::new();

        for (book, outcomes) in &quotes.books {
            let mut fairs = BTreeMap::new();
            for (a, b) in complementary_pairs(outcomes.keys()) {
                let (Some(&pa), Some(&pb)) = (outcomes.get(&a), outcomes.get(&b)) else {
                    continue;
                };
                let (ia, ib) = (price_to_implied(pa), price_to_implied(pb));
                let (fa, fb) = devig_pair(ia, ib);
                let juice = overround_pct(ia, ib);
                fairs.insert(a, FairQuote { fair: fa, implied: ia, juice });
                fairs.insert(b, FairQuote { fair: fb, implied: ib, juice });
            }
            if !fairs.is_empty() {
                books.insert(book.clone(), fairs);
            }
        }

        Self { books }
    }

    pub fn get(&self, book: &str, key: &OutcomeKey) -> Option<&FairQuote> {
        self.books.get(book).and_then(|f| f.get(key))
    }

    /// Number of books whose devigged output contains `key`.
    pub fn books_with(&self, key: &OutcomeKey) -> usize {
        self.books.values().filter(|f| f.contains_key(key)).count()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<OutcomeKey, FairQuote>)> {
        self.books.iter()
    }
}

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

/// Weighted fair probability of one outcome, excluding one book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusRecord {
    pub fair_prob: f64,
    pub contributors: usize,
    pub weight_sum: f64,
}

/// Weighted mean line of the reference books for a one-sided quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineConsensus {
    pub mean_line: f64,
    /// Weighted mean devigged probability of the reference books' sides
    /// with the same name, at their own lines.
    pub mean_fair: f64,
    pub contributors: usize,
    pub weight_sum: f64,
}

pub struct ConsensusBuilder<'a> {
    table: &'a DevigTable,
    weights: &'a BookWeights,
    min_books: usize,
    min_contributors: usize,
}

impl<'a> ConsensusBuilder<'a> {
    pub fn new(
        table: &'a DevigTable,
        weights: &'a BookWeights,
        min_books: usize,
        min_contributors: usize,
    ) -> Self {
        Self {
            table,
            weights,
            min_books,
            min_contributors,
        }
    }

    /// Consensus for `key` from every book except `excluded`.
    ///
    /// `None` when fewer than `min_books` books devig the outcome or fewer
    /// than `min_contributors` other books remain.
    pub fn leave_one_out(&self, key: &OutcomeKey, excluded: &str) -> Option<ConsensusRecord> {
        if self.table.books_with(key) < self.min_books {
            return None;
        }

        let samples: Vec<(f64, f64)> = self
            .table
            .iter()
            .filter(|(book, _)| book.as_str() != excluded)
            .filter_map(|(book, fairs)| fairs.get(key).map(|q| (q.fair, self.weights.weight(book))))
            .collect();

        let contributors = samples.len();
        let fair_prob = match weighted_mean(&samples) {
            Some(p) if contributors >= self.min_contributors => p,
            _ => {
                debug!(
                    outcome = %key,
                    excluded,
                    contributors,
                    "Too few contributing books for consensus"
                );
                return None;
            }
        };

        Some(ConsensusRecord {
            fair_prob,
            contributors,
            weight_sum: samples.iter().map(|(_, w)| w).sum(),
        })
    }

    /// Reference line for outcomes named `name`, from every devigged book
    /// except `excluded`. Each reference book contributes the mean of its
    /// devigged lines and fair probabilities for that name.
    pub fn line_reference(&self, name: &str, excluded: &str) -> Option<LineConsensus> {
        let mut line_sum = 0.0;
        let mut fair_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut contributors = 0usize;

        for (book, fairs) in self.table.iter() {
            if book == excluded {
                continue;
            }
            let sides: Vec<(f64, f64)> = fairs
                .iter()
                .filter(|(k, _)| k.name == name)
                .filter_map(|(k, q)| k.point.map(|p| (p.value(), q.fair)))
                .collect();
            if sides.is_empty() {
                continue;
            }
            let n = sides.len() as f64;
            let line = sides.iter().map(|(l, _)| l).sum::<f64>() / n;
            let fair = sides.iter().map(|(_, f)| f).sum::<f64>() / n;
            let w = self.weights.weight(book);
            line_sum += line * w;
            fair_sum += fair * w;
            weight_sum += w;
            contributors += 1;
        }

        if contributors < self.min_contributors || weight_sum <= 0.0 {
            return None;
        }

        Some(LineConsensus {
            mean_line: line_sum / weight_sum,
            mean_fair: fair_sum / weight_sum,
            contributors,
            weight_sum,
        })
    }
}

/// Plain weighted mean; `None` on empty input or non-positive total weight.
pub fn weighted_mean(samples: &[(f64, f64)]) -> Option<f64> {
    let weight_sum: f64 = samples.iter().map(|(_, w)| w).sum();
    if samples.is_empty() || weight_sum <= 0.0 {
        return None;
    }
    Some(samples.iter().map(|(v, w)| v * w).sum::<f64>() / weight_sum)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
