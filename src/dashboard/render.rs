//! Presentation layer: engine opportunities → display rows.
//!
//! No math here beyond rounding. Every label the dashboard shows is built
//! from the structured values the engine emitted.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{ArbOpportunity, BetOpportunity, EdgeBasis, Opportunity, OutcomeKey, Price};

/// Bookmaker key → display name. Unknown keys display as-is.
#[derive(Debug, Clone, Default)]
pub struct BookDirectory {
    names: BTreeMap<String, String>,
}

impl BookDirectory {
    pub fn new(names: BTreeMap<String, String>) -> Self {
        Self { names }
    }

    pub fn display(&self, book: &str) -> String {
        self.names
            .get(book)
            .cloned()
            .unwrap_or_else(|| book.to_string())
    }
}

/// One stake of an arbitrage split.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StakeView {
    pub book: String,
    pub outcome: String,
    pub odds: String,
    pub stake: String,
}

/// A dashboard row.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OpportunityView {
    /// `game_market`, `player_prop`, or `arbitrage`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Player for props, display outcome otherwise.
    pub player: String,
    pub game: String,
    pub market: String,
    pub book: String,
    /// Net edge for bets, guaranteed profit for arbitrage.
    pub edge: f64,
    pub gross_edge: Option<f64>,
    pub recommendation: String,
    pub odds: Option<f64>,
    pub label1_name: String,
    pub label1_value: String,
    pub label2_name: String,
    pub label2_value: String,
    pub label3_name: String,
    pub label3_value: String,
    pub target_prob: Option<f64>,
    pub fair_prob: Option<f64>,
    pub juice_display: Option<String>,
    pub consensus_books: usize,
    /// Recommended stake as a percentage of bankroll.
    pub stake_pct: Option<f64>,
    pub confidence: String,
    pub stakes: Vec<StakeView>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn format_american(price: Price) -> String {
    price.to_string()
}

pub fn edge_label(edge: f64) -> String {
    format!("{edge:+.1}%")
}

/// `Team ML`, `Team -3.5`, `Over 220.5`.
pub fn display_outcome(outcome: &OutcomeKey) -> String {
    match outcome.point {
        None => format!("{} ML", outcome.name),
        Some(p) if outcome.is_total_side() => format!("{} {}", outcome.name, p),
        Some(p) => format!("{} {:+.1}", outcome.name, p.value()),
    }
}

/// `OVER 24.5` for a player total side.
fn prop_side(outcome: &OutcomeKey) -> String {
    match outcome.point {
        Some(p) => format!("{} {}", outcome.name.to_uppercase(), p),
        None => outcome.name.to_uppercase(),
    }
}

pub fn render(opportunity: &Opportunity, books: &BookDirectory) -> OpportunityView {
    match opportunity {
        Opportunity::Bet(bet) => render_bet(bet, books),
        Opportunity::Arbitrage(arb) => render_arbitrage(arb, books),
    }
}

fn render_bet(bet: &BetOpportunity, books: &BookDirectory) -> OpportunityView {
    let book = books.display(&bet.book);
    let (kind, player, recommendation) = match &bet.participant {
        Some(player) => {
            let side = prop_side(&bet.outcome);
            ("player_prop", player.clone(), side)
        }
        None => {
            let shown = display_outcome(&bet.outcome);
            ("game_market", shown.clone(), format!("BET {shown}"))
        }
    };

    let (label2_name, label2_value, confidence) = match &bet.basis {
        EdgeBasis::Devigged => (
            format!("Fair Odds ({} books)", bet.contributing_books),
            bet.fair_price
                .map(format_american)
                .unwrap_or_else(|| "n/a".to_string()),
            "standard".to_string(),
        ),
        EdgeBasis::LineFallback { consensus_line, .. } => (
            format!("Consensus Line ({} books)", bet.contributing_books),
            format!("{consensus_line:.1}"),
            "low (line-based estimate)".to_string(),
        ),
    };

    OpportunityView {
        kind: kind.to_string(),
        player,
        game: bet.event.matchup(),
        market: bet.market.clone(),
        book: book.clone(),
        edge: round1(bet.net_edge),
        gross_edge: Some(round1(bet.gross_edge)),
        recommendation,
        odds: Some(bet.price.value()),
        label1_name: format!("{book} Odds"),
        label1_value: format_american(bet.price),
        label2_name,
        label2_value,
        label3_name: "Net Edge".to_string(),
        label3_value: edge_label(bet.net_edge),
        target_prob: Some(round1(bet.juiced_prob * 100.0)),
        fair_prob: bet.consensus_prob.map(|p| round1(p * 100.0)),
        juice_display: bet.juice.map(|j| format!("{:.1}%", j)),
        consensus_books: bet.contributing_books,
        stake_pct: bet.stake_fraction.map(|f| round2(f * 100.0)),
        confidence,
        stakes: Vec::new(),
    }
}

fn render_arbitrage(arb: &ArbOpportunity, books: &BookDirectory) -> OpportunityView {
    let [a, b] = &arb.legs;
    let side = |leg_outcome: &OutcomeKey| match &arb.participant {
        Some(_) => prop_side(leg_outcome),
        None => display_outcome(leg_outcome),
    };
    let (side_a, side_b) = (side(&a.outcome), side(&b.outcome));
    let (book_a, book_b) = (books.display(&a.book), books.display(&b.book));

    OpportunityView {
        kind: "arbitrage".to_string(),
        player: arb
            .participant
            .clone()
            .unwrap_or_else(|| format!("{side_a} / {side_b}")),
        game: arb.event.matchup(),
        market: arb.market.clone(),
        book: format!("{book_a} + {book_b}"),
        edge: round2(arb.profit_pct),
        gross_edge: None,
        recommendation: format!("ARB {side_a} @ {book_a} / {side_b} @ {book_b}"),
        odds: None,
        label1_name: format!("{book_a} {side_a}"),
        label1_value: format_american(a.price),
        label2_name: format!("{book_b} {side_b}"),
        label2_value: format_american(b.price),
        label3_name: "Profit".to_string(),
        label3_value: format!("{:+.2}%", arb.profit_pct),
        target_prob: Some(round1(arb.total_implied * 100.0)),
        fair_prob: None,
        juice_display: None,
        consensus_books: 2,
        stake_pct: None,
        confidence: "locked".to_string(),
        stakes: arb
            .legs
            .iter()
            .zip([(&book_a, &side_a), (&book_b, &side_b)])
            .map(|(leg, (book, outcome))| StakeView {
                book: book.clone(),
                outcome: outcome.clone(),
                odds: format_american(leg.price),
                stake: format!("{:.2}", leg.stake),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
