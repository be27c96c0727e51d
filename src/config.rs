//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (Odds API keys) are referenced by env-var name in the config
//! and resolved at runtime via `std::env::var`. Every engine tuning value
//! has a default, so a minimal config only needs the key variable name.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::data::odds_api::{OddsApiConfig, DEFAULT_BASE_URL};
use crate::engine::worker::WorkerConfig;
use crate::strategy::arbitrage::ArbConfig;
use crate::strategy::consensus::BookWeights;
use crate::strategy::edge::EdgeConfig;
use crate::strategy::kelly::KellyConfig;
use crate::strategy::EngineConfig;
use crate::types::EvError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    pub odds_api: OddsApiSection,
    #[serde(default)]
    pub books: BooksConfig,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub markets: MarketsConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    /// Seconds between scheduled scans. 0 disables scheduling.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            request_delay_ms: default_request_delay_ms(),
            run_on_startup: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OddsApiSection {
    /// Env var holding one or more comma-separated API keys.
    pub api_keys_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_regions")]
    pub regions: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BooksConfig {
    /// Books requested from the API and considered for consensus.
    #[serde(default = "default_bookmakers")]
    pub bookmakers: Vec<String>,
    /// Books that can be bet for arbitrage. Unset means all of them.
    #[serde(default)]
    pub bettable: Option<Vec<String>>,
    #[serde(default = "default_display_names")]
    pub display_names: BTreeMap<String, String>,
    /// Consensus weight overrides (e.g. a sharp book at 3.0).
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

impl Default for BooksConfig {
    fn default() -> Self {
        Self {
            bookmakers: default_bookmakers(),
            bettable: None,
            display_names: default_display_names(),
            weights: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSection {
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,
    #[serde(default = "default_near_miss_floor")]
    pub near_miss_floor: f64,
    #[serde(default = "default_min_books")]
    pub min_books: usize,
    #[serde(default = "default_min_contributors")]
    pub min_contributors: usize,
    #[serde(default = "default_true")]
    pub line_fallback: bool,
    #[serde(default = "default_line_value_per_point")]
    pub line_value_per_point: f64,
    #[serde(default = "default_true")]
    pub staking: bool,
    #[serde(default = "default_kelly_multiplier")]
    pub kelly_multiplier: f64,
    #[serde(default = "default_kelly_max_fraction")]
    pub kelly_max_fraction: f64,
    #[serde(default = "default_arb_notional")]
    pub arb_notional: f64,
    #[serde(default = "default_near_miss_report_limit")]
    pub near_miss_report_limit: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            min_edge: default_min_edge(),
            near_miss_floor: default_near_miss_floor(),
            min_books: default_min_books(),
            min_contributors: default_min_contributors(),
            line_fallback: true,
            line_value_per_point: default_line_value_per_point(),
            staking: true,
            kelly_multiplier: default_kelly_multiplier(),
            kelly_max_fraction: default_kelly_max_fraction(),
            arb_notional: default_arb_notional(),
            near_miss_report_limit: default_near_miss_report_limit(),
        }
    }
}

/// A bulk game market: one request covers every event of the sport.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GameMarket {
    pub sport: String,
    pub market: String,
    pub label: String,
}

/// Player prop markets for one sport, fetched event by event.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PropGroup {
    pub sport: String,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    pub markets: Vec<PropMarket>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PropMarket {
    pub market: String,
    pub label: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketsConfig {
    #[serde(default = "default_game_markets")]
    pub game: Vec<GameMarket>,
    #[serde(default = "default_prop_groups")]
    pub props: Vec<PropGroup>,
}

impl Default for MarketsConfig {
    fn default() -> Self {
        Self {
            game: default_game_markets(),
            props: default_prop_groups(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// JSON file the last snapshot is saved to and restored from.
    #[serde(default)]
    pub snapshot_file: Option<PathBuf>,
}

// -- Defaults ------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_interval_secs() -> u64 {
    900
}
fn default_request_delay_ms() -> u64 {
    300
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_regions() -> String {
    "us,us2".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_min_edge() -> f64 {
    0.1
}
fn default_near_miss_floor() -> f64 {
    -3.0
}
fn default_min_books() -> usize {
    3
}
fn default_min_contributors() -> usize {
    2
}
fn default_line_value_per_point() -> f64 {
    4.0
}
fn default_kelly_multiplier() -> f64 {
    0.25
}
fn default_kelly_max_fraction() -> f64 {
    1.0
}
fn default_arb_notional() -> f64 {
    100.0
}
fn default_near_miss_report_limit() -> usize {
    5
}
fn default_max_events() -> usize {
    8
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}

fn default_bookmakers() -> Vec<String> {
    [
        "fanduel",
        "draftkings",
        "betmgm",
        "betrivers",
        "espnbet",
        "hardrockbet",
        "ballybet",
        "betparx",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_display_names() -> BTreeMap<String, String> {
    [
        ("fanduel", "FanDuel"),
        ("draftkings", "DraftKings"),
        ("betmgm", "BetMGM"),
        ("betrivers", "BetRivers"),
        ("espnbet", "theScore Bet"),
        ("hardrockbet", "Hard Rock"),
        ("ballybet", "Bally Bet"),
        ("betparx", "betPARX"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_game_markets() -> Vec<GameMarket> {
    [
        ("basketball_nba", "NBA Moneyline"),
        ("basketball_ncaab", "NCAAB Moneyline"),
        ("icehockey_nhl", "NHL Moneyline"),
    ]
    .into_iter()
    .map(|(sport, label)| GameMarket {
        sport: sport.to_string(),
        market: "h2h".to_string(),
        label: label.to_string(),
    })
    .collect()
}

fn default_prop_groups() -> Vec<PropGroup> {
    [("basketball_nba", "NBA"), ("basketball_ncaab", "NCAAB")]
        .into_iter()
        .map(|(sport, league)| PropGroup {
            sport: sport.to_string(),
            max_events: default_max_events(),
            markets: vec![
                PropMarket {
                    market: "player_points".to_string(),
                    label: format!("{league} Points"),
                },
                PropMarket {
                    market: "player_rebounds".to_string(),
                    label: format!("{league} Rebounds"),
                },
            ],
        })
        .collect()
}

// -- Loading and derived settings ----------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), EvError> {
        let e = &self.engine;
        if !e.min_edge.is_finite() || !e.near_miss_floor.is_finite() {
            return Err(EvError::Config("edge thresholds must be finite".into()));
        }
        if e.near_miss_floor > e.min_edge {
            return Err(EvError::Config(format!(
                "near_miss_floor ({}) is above min_edge ({})",
                e.near_miss_floor, e.min_edge
            )));
        }
        if e.min_contributors < 2 {
            return Err(EvError::Config(format!(
                "min_contributors must be at least 2, got {}",
                e.min_contributors
            )));
        }
        // the evaluated book plus its contributors
        if e.min_books < 3 || e.min_books < e.min_contributors + 1 {
            return Err(EvError::Config(format!(
                "min_books must be at least 3 and above min_contributors ({}), got {}",
                e.min_contributors, e.min_books
            )));
        }
        if !(e.kelly_multiplier > 0.0 && e.kelly_multiplier <= 1.0) {
            return Err(EvError::Config(format!(
                "kelly_multiplier must be in (0, 1], got {}",
                e.kelly_multiplier
            )));
        }
        if !(e.kelly_max_fraction > 0.0 && e.kelly_max_fraction <= 1.0) {
            return Err(EvError::Config(format!(
                "kelly_max_fraction must be in (0, 1], got {}",
                e.kelly_max_fraction
            )));
        }
        if !(e.arb_notional.is_finite() && e.arb_notional > 0.0) {
            return Err(EvError::Config(format!(
                "arb_notional must be positive, got {}",
                e.arb_notional
            )));
        }
        if !(e.line_value_per_point.is_finite() && e.line_value_per_point >= 0.0) {
            return Err(EvError::Config(
                "line_value_per_point must be non-negative".into(),
            ));
        }
        BookWeights::new(self.books.weights.clone())?;
        for group in &self.markets.props {
            if group.max_events == 0 {
                return Err(EvError::Config(format!(
                    "props for {} scan zero events",
                    group.sport
                )));
            }
        }
        Ok(())
    }

    pub fn engine_config(&self) -> Result<EngineConfig, EvError> {
        let e = &self.engine;
        let notional = Decimal::try_from(e.arb_notional)
            .map_err(|_| EvError::Config(format!("invalid arb_notional {}", e.arb_notional)))?
            .round_dp(2);

        Ok(EngineConfig {
            edge: EdgeConfig {
                min_edge: e.min_edge,
                near_miss_floor: e.near_miss_floor,
                min_books: e.min_books,
                min_contributors: e.min_contributors,
                line_fallback: e.line_fallback,
                line_value_per_point: e.line_value_per_point,
            },
            kelly: e.staking.then(|| KellyConfig {
                multiplier: e.kelly_multiplier,
                max_fraction: e.kelly_max_fraction,
            }),
            arbitrage: ArbConfig {
                notional,
                bettable: self
                    .books
                    .bettable
                    .as_ref()
                    .map(|books| books.iter().cloned().collect::<BTreeSet<_>>()),
            },
            weights: BookWeights::new(self.books.weights.clone())?,
        })
    }

    pub fn odds_api_config(&self) -> OddsApiConfig {
        OddsApiConfig {
            regions: self.odds_api.regions.clone(),
            bookmakers: self.books.bookmakers.clone(),
            ..OddsApiConfig::default()
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            run_on_startup: self.scanner.run_on_startup,
            interval: (self.scanner.interval_secs > 0)
                .then(|| Duration::from_secs(self.scanner.interval_secs)),
            snapshot_file: self.storage.snapshot_file.clone(),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.scanner.request_delay_ms)
    }

    /// API keys from the configured env var, comma-separated.
    pub fn api_keys(&self) -> Result<Vec<SecretString>> {
        let raw = Self::resolve_env(&self.odds_api.api_keys_env)?;
        let keys = parse_keys(&raw);
        if keys.is_empty() {
            anyhow::bail!("{} contains no API keys", self.odds_api.api_keys_env);
        }
        Ok(keys)
    }
}

fn parse_keys(raw: &str) -> Vec<SecretString> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| SecretString::new(k.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use secrecy::ExposeSecret;

    const MINIMAL: &str = r#"
        [odds_api]
        api_keys_env = "ODDS_API_KEYS"
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = AppConfig::from_toml_str(MINIMAL).unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.scanner.interval_secs, 900);
        assert_eq!(cfg.scanner.request_delay_ms, 300);
        assert_eq!(cfg.odds_api.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.odds_api.regions, "us,us2");
        assert_eq!(cfg.books.bookmakers.len(), 8);
        assert_eq!(cfg.books.display_names["espnbet"], "theScore Bet");
        assert_eq!(cfg.markets.game.len(), 3);
        assert_eq!(cfg.markets.props.len(), 2);
        assert_eq!(cfg.markets.props[0].max_events, 8);
        assert_eq!(cfg.markets.props[1].markets[1].label, "NCAAB Rebounds");
        assert_eq!(cfg.dashboard.port, 5000);
        assert!(cfg.storage.snapshot_file.is_none());
    }

    #[test]
    fn test_engine_config_from_defaults() {
        let cfg = AppConfig::from_toml_str(MINIMAL).unwrap();
        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.edge, EdgeConfig::default());
        assert_eq!(engine.kelly, Some(KellyConfig::default()));
        assert_eq!(engine.arbitrage.notional, dec!(100));
        assert!(engine.arbitrage.bettable.is_none());
    }

    #[test]
    fn test_full_config() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [scanner]
            interval_secs = 0
            run_on_startup = false

            [odds_api]
            api_keys_env = "KEYS"

            [books]
            bookmakers = ["fanduel", "pinnacle"]
            bettable = ["fanduel"]
            weights = { pinnacle = 3.0 }

            [engine]
            min_edge = 1.5
            staking = false
            arb_notional = 250.0

            [[markets.game]]
            sport = "icehockey_nhl"
            market = "h2h"
            label = "NHL Moneyline"

            [dashboard]
            enabled = false
            "#,
        )
        .unwrap();
        assert!(cfg.validate().is_ok());
        assert!(cfg.worker_config().interval.is_none());
        assert!(!cfg.worker_config().run_on_startup);
        assert_eq!(cfg.markets.game.len(), 1);
        // unset list keeps its default
        assert_eq!(cfg.markets.props.len(), 2);

        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.edge.min_edge, 1.5);
        assert!(engine.kelly.is_none());
        assert_eq!(engine.arbitrage.notional, dec!(250));
        assert!(engine.arbitrage.bettable.unwrap().contains("fanduel"));
        assert_eq!(engine.weights.weight("pinnacle"), 3.0);
        assert_eq!(cfg.odds_api_config().bookmakers, vec!["fanduel", "pinnacle"]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let with_engine = |engine: &str| {
            AppConfig::from_toml_str(&format!("{MINIMAL}\n[engine]\n{engine}")).unwrap()
        };
        assert!(with_engine("near_miss_floor = 1.0").validate().is_err());
        assert!(with_engine("kelly_multiplier = 0.0").validate().is_err());
        assert!(with_engine("kelly_multiplier = 1.5").validate().is_err());
        assert!(with_engine("arb_notional = 0.0").validate().is_err());
        assert!(with_engine("min_contributors = 0").validate().is_err());
    }

    #[test]
    fn test_validate_consensus_minimums() {
        let with_engine = |engine: &str| {
            AppConfig::from_toml_str(&format!("{MINIMAL}\n[engine]\n{engine}")).unwrap()
        };
        // a single other book is no consensus
        assert!(matches!(
            with_engine("min_contributors = 1").validate(),
            Err(EvError::Config(_))
        ));
        assert!(matches!(
            with_engine("min_books = 2").validate(),
            Err(EvError::Config(_))
        ));
        assert!(with_engine("min_books = 3\nmin_contributors = 3")
            .validate()
            .is_err());
        assert!(with_engine("min_books = 4\nmin_contributors = 3")
            .validate()
            .is_ok());
        assert!(with_engine("min_books = 3\nmin_contributors = 2")
            .validate()
            .is_ok());

        let bad_weight = AppConfig::from_toml_str(&format!(
            "{MINIMAL}\n[books]\nweights = {{ pinnacle = 0.0 }}"
        ))
        .unwrap();
        assert!(matches!(
            bad_weight.validate(),
            Err(EvError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn test_shipped_config_file_is_valid() {
        let cfg = AppConfig::from_toml_str(include_str!("../config.toml")).unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.markets.game.len(), 3);
        assert_eq!(cfg.markets.props[0].markets[0].market, "player_points");
        assert_eq!(cfg.books.weights["fanduel"], 1.0);
        assert!(cfg.storage.snapshot_file.is_some());
        assert_eq!(cfg.engine_config().unwrap().edge, EdgeConfig::default());
    }

    #[test]
    fn test_missing_odds_api_section_fails() {
        assert!(AppConfig::from_toml_str("[scanner]\ninterval_secs = 60").is_err());
    }

    #[test]
    fn test_parse_keys() {
        let keys = parse_keys(" abc , ,def,");
        let exposed: Vec<&str> = keys.iter().map(|k| k.expose_secret().as_str()).collect();
        assert_eq!(exposed, vec!["abc", "def"]);
    }

    #[test]
    fn test_api_keys_from_env() {
        std::env::set_var("EVFINDER_TEST_KEYS_7F3A", "k1,k2");
        let cfg = AppConfig::from_toml_str(
            "[odds_api]\napi_keys_env = \"EVFINDER_TEST_KEYS_7F3A\"",
        )
        .unwrap();
        assert_eq!(cfg.api_keys().unwrap().len(), 2);

        let missing = AppConfig::from_toml_str(
            "[odds_api]\napi_keys_env = \"EVFINDER_TEST_KEYS_UNSET_91C2\"",
        )
        .unwrap();
        assert!(missing.api_keys().is_err());
    }
}
