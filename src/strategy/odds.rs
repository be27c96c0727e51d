//! Price ↔ probability conversion and pairwise devig.
//!
//! Pure functions over American prices. No state, no side effects.

use crate::types::Price;

/// Implied probability of a price, margin included. Always in (0, 1).
pub fn price_to_implied(price: Price) -> f64 {
    let v = price.value();
    if v >= 0.0 {
        100.0 / (v + 100.0)
    } else {
        v.abs() / (v.abs() + 100.0)
    }
}

/// Price that a probability would fair-value to.
///
/// Returns `None` ("no fair price") outside the open interval (0, 1).
pub fn implied_to_price(prob: f64) -> Option<Price> {
    if !(prob > 0.0 && prob < 1.0) {
        return None;
    }
    if prob >= 0.5 {
        Price::new(-(prob / (1.0 - prob)) * 100.0)
    } else {
        Price::new((1.0 - prob) / prob * 100.0)
    }
}

/// Remove margin from a two-way pair of implied probabilities.
///
/// The second side is taken as the complement of the first so the pair
/// sums to exactly 1.0. A non-positive total carries no information and
/// yields (0.5, 0.5).
pub fn devig_pair(prob_a: f64, prob_b: f64) -> (f64, f64) {
    let total = prob_a + prob_b;
    if !(total > 0.0) || !total.is_finite() {
        return (0.5, 0.5);
    }
    let fair_a = prob_a / total;
    (fair_a, 1.0 - fair_a)
}

/// Bookmaker margin on a two-way pair, in percentage points.
pub fn overround_pct(prob_a: f64, prob_b: f64) -> f64 {
    (prob_a + prob_b - 1.0) * 100.0
}

/// Net decimal odds: profit per unit staked.
pub fn net_decimal_odds(price: Price) -> f64 {
    let v = price.value();
    if v >= 0.0 {
        v / 100.0
    } else {
        100.0 / v.abs()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
