//! Kelly criterion stake sizing.
//!
//! Converts a consensus fair probability and an offered American price
//! into a fractional-Kelly stake, expressed as a fraction of bankroll.

use tracing::debug;

use super::odds::net_decimal_odds;
use crate::types::Price;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Kelly sizing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly). Lower = more conservative.
    pub multiplier: f64,
    /// Ceiling on the recommended fraction of bankroll.
    pub max_fraction: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            multiplier: 0.25,
            max_fraction: 1.0,
        }
    }
}

/// Full-Kelly fraction `(b·p − (1 − p)) / b` for win probability `p` at
/// `price`, where `b` is the net decimal odds. May be negative.
pub fn kelly_fraction(win_prob: f64, price: Price) -> f64 {
    let b = net_decimal_odds(price);
    if b <= 0.0 {
        return 0.0;
    }
    (b * win_prob - (1.0 - win_prob)) / b
}

// ---------------------------------------------------------------------------
// Kelly calculator
// ---------------------------------------------------------------------------

pub struct KellyCalculator {
    config: KellyConfig,
}

impl KellyCalculator {
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    /// Recommended fraction of bankroll to stake. Zero when no edge
    /// survives at this price.
    pub fn recommended(&self, fair_prob: f64, price: Price) -> f64 {
        let kelly = kelly_fraction(fair_prob, price);
        if kelly <= 0.0 {
            debug!(kelly, price = %price, "Negative Kelly — no stake");
            return 0.0;
        }
        (kelly * self.config.multiplier).min(self.config.max_fraction)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
