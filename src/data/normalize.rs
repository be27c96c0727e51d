//! Raw Odds API payloads → canonical [`QuoteSet`]s.
//!
//! Malformed outcomes (missing name, missing or non-numeric price, zero
//! price) are dropped silently. Game-market points keep full precision;
//! player-total points are bucketed to the nearest quarter.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::OddsEvent;
use crate::types::{EventInfo, MarketKind, OutcomeKey, Point, Price, QuoteSet};

pub fn event_info(event: &OddsEvent) -> EventInfo {
    EventInfo {
        id: event.id.clone(),
        sport: event.sport_key.clone(),
        home_team: event.home_team.clone().unwrap_or_else(|| "?".to_string()),
        away_team: event.away_team.clone().unwrap_or_else(|| "?".to_string()),
        commence_time: event
            .commence_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc)),
    }
}

/// One quote set for a game market (moneyline, spread, total).
/// `None` when no bookmaker has a usable outcome.
pub fn normalize_game(event: &OddsEvent, market_key: &str) -> Option<QuoteSet> {
    let mut quotes = QuoteSet::new(event_info(event), market_key, MarketKind::Game);

    for book in &event.bookmakers {
        for market in book.markets.iter().filter(|m| m.key == market_key) {
            for outcome in &market.outcomes {
                let Some(name) = outcome.name.as_deref().filter(|n| !n.is_empty()) else {
                    continue;
                };
                let Some(price) = outcome.price_value().and_then(Price::new) else {
                    continue;
                };
                let point = outcome.point_value().and_then(Point::new);
                quotes.insert(book.key.as_str(), OutcomeKey::new(name, point), price);
            }
        }
    }

    (!quotes.is_empty()).then_some(quotes)
}

/// One quote set per player for an over/under player market.
///
/// Outcomes need a player (`description`), an over/under side, a point,
/// and a price. Sides are canonicalised to `Over`/`Under`.
pub fn normalize_player_totals(event: &OddsEvent, market_key: &str) -> Vec<QuoteSet> {
    let info = event_info(event);
    let mut players: BTreeMap<String, QuoteSet> = BTreeMap::new();

    for book in &event.bookmakers {
        for market in book.markets.iter().filter(|m| m.key == market_key) {
            for outcome in &market.outcomes {
                let Some(player) = outcome.description.as_deref().filter(|p| !p.is_empty()) else {
                    continue;
                };
                let Some(side) = outcome.name.as_deref().and_then(total_side) else {
                    continue;
                };
                let Some(point) = outcome.point_value().and_then(Point::quarter) else {
                    continue;
                };
                let Some(price) = outcome.price_value().and_then(Price::new) else {
                    continue;
                };
                players
                    .entry(player.to_string())
                    .or_insert_with(|| {
                        QuoteSet::new(info.clone(), market_key, MarketKind::PlayerTotal)
                            .with_participant(player)
                    })
                    .insert(book.key.as_str(), OutcomeKey::new(side, Some(point)), price);
            }
        }
    }

    players.into_values().collect()
}

/// Dispatch on market shape.
pub fn normalize(event: &OddsEvent, kind: MarketKind, market_key: &str) -> Vec<QuoteSet> {
    match kind {
        MarketKind::Game => normalize_game(event, market_key).into_iter().collect(),
        MarketKind::PlayerTotal => normalize_player_totals(event, market_key),
    }
}

fn total_side(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    if lower.contains("over") {
        Some("Over")
    } else if lower.contains("under") {
        Some("Under")
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(json: &str) -> OddsEvent {
        serde_json::from_str(json).unwrap()
    }

    const GAME: &str = r#"{
        "id": "evt1",
        "sport_key": "basketball_nba",
        "home_team": "Denver Nuggets",
        "away_team": "Utah Jazz",
        "commence_time": "2026-01-10T02:00:00Z",
        "bookmakers": [
            {"key": "fanduel", "title": "FanDuel", "markets": [
                {"key": "h2h", "outcomes": [
                    {"name": "Denver Nuggets", "price": -150},
                    {"name": "Utah Jazz", "price": 130}
                ]},
                {"key": "spreads", "outcomes": [
                    {"name": "Denver Nuggets", "price": -110, "point": -3.5},
                    {"name": "Utah Jazz", "price": -110, "point": 3.5}
                ]}
            ]},
            {"key": "draftkings", "title": "DraftKings", "markets": [
                {"key": "h2h", "outcomes": [
                    {"name": "Denver Nuggets", "price": -140},
                    {"name": "Utah Jazz", "price": "n/a"},
                    {"price": 120},
                    {"name": "Utah Jazz", "price": 0}
                ]}
            ]}
        ]
    }"#;

    #[test]
    fn test_normalize_game_moneyline() {
        let qs = normalize_game(&make_event(GAME), "h2h").unwrap();
        assert_eq!(qs.book_count(), 2);
        assert_eq!(qs.books["fanduel"].len(), 2);
        // bad price, missing name and zero price all dropped
        assert_eq!(qs.books["draftkings"].len(), 1);
        assert_eq!(qs.event.matchup(), "Utah Jazz @ Denver Nuggets");
        assert!(qs.event.commence_time.is_some());
        assert_eq!(qs.kind, MarketKind::Game);
    }

    #[test]
    fn test_normalize_game_keeps_points() {
        let qs = normalize_game(&make_event(GAME), "spreads").unwrap();
        let key = OutcomeKey::new("Denver Nuggets", Point::new(-3.5));
        assert_eq!(qs.price("fanduel", &key).unwrap().value(), -110.0);
        assert_eq!(qs.book_count(), 1);
    }

    #[test]
    fn test_normalize_game_missing_market() {
        assert!(normalize_game(&make_event(GAME), "totals").is_none());
    }

    const PROPS: &str = r#"{
        "id": "evt2",
        "sport_key": "basketball_nba",
        "home_team": "Denver Nuggets",
        "away_team": "Utah Jazz",
        "bookmakers": [
            {"key": "fanduel", "markets": [{"key": "player_points", "outcomes": [
                {"name": "Over", "description": "Nikola Jokic", "price": -115, "point": 26.5},
                {"name": "Under", "description": "Nikola Jokic", "price": -105, "point": 26.5},
                {"name": "Over", "description": "Lauri Markkanen", "price": -110, "point": 22.6}
            ]}]},
            {"key": "betmgm", "markets": [{"key": "player_points", "outcomes": [
                {"name": "Over", "description": "Nikola Jokic", "price": -110, "point": "26.4"},
                {"name": "Under", "description": "Nikola Jokic", "price": -110},
                {"name": "Yes", "description": "Nikola Jokic", "price": 200, "point": 26.5},
                {"name": "Over", "description": "", "price": -110, "point": 26.5}
            ]}]}
        ]
    }"#;

    #[test]
    fn test_normalize_player_totals_groups_by_player() {
        let sets = normalize_player_totals(&make_event(PROPS), "player_points");
        assert_eq!(sets.len(), 2);
        // ordered by player name
        assert_eq!(sets[0].participant.as_deref(), Some("Lauri Markkanen"));
        assert_eq!(sets[1].participant.as_deref(), Some("Nikola Jokic"));
        assert!(sets.iter().all(|qs| qs.kind == MarketKind::PlayerTotal));
    }

    #[test]
    fn test_normalize_player_totals_quarter_rounding() {
        let sets = normalize_player_totals(&make_event(PROPS), "player_points");
        let jokic = &sets[1];
        let over = OutcomeKey::new("Over", Point::new(26.5));
        // 26.4 buckets to 26.5 and lines up with fanduel
        assert!(jokic.price("betmgm", &over).is_some());
        assert!(jokic.price("fanduel", &over).is_some());
        // the under without a point and the yes/no outcome are dropped
        assert_eq!(jokic.books["betmgm"].len(), 1);

        let markkanen = &sets[0];
        let key = OutcomeKey::new("Over", Point::new(22.5));
        assert!(markkanen.price("fanduel", &key).is_some());
    }

    #[test]
    fn test_normalize_dispatch() {
        let event = make_event(PROPS);
        assert_eq!(normalize(&event, MarketKind::PlayerTotal, "player_points").len(), 2);
        assert!(normalize(&event, MarketKind::Game, "h2h").is_empty());
    }

    #[test]
    fn test_missing_teams_fallback() {
        let info = event_info(&make_event(r#"{"id":"x"}"#));
        assert_eq!(info.matchup(), "? @ ?");
        assert!(info.commence_time.is_none());
    }
}
