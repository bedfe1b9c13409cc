use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use connectors_common::{ConnectorError, SymbolTable};
use serde::{Deserialize, Serialize};

use crate::protocol::trading_symbol;

pub const DEFAULT_URL: &str = "wss://api-pub.bitfinex.com/ws/2";

/// Book price aggregation level; `P0` keeps five significant figures, `P4` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PricePrecision {
    #[default]
    P0,
    P1,
    P2,
    P3,
    P4,
}

impl FromStr for PricePrecision {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P0" => Ok(PricePrecision::P0),
            "P1" => Ok(PricePrecision::P1),
            "P2" => Ok(PricePrecision::P2),
            "P3" => Ok(PricePrecision::P3),
            "P4" => Ok(PricePrecision::P4),
            other => Err(ConnectorError::Config(format!("unknown price precision {other:?}"))),
        }
    }
}

/// Number of price points per side the book channel delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BookLength {
    #[serde(rename = "1")]
    One,
    #[default]
    #[serde(rename = "25")]
    TwentyFive,
    #[serde(rename = "100")]
    Hundred,
    #[serde(rename = "250")]
    TwoHundredFifty,
}

impl BookLength {
    pub fn points(&self) -> u32 {
        match self {
            BookLength::One => 1,
            BookLength::TwentyFive => 25,
            BookLength::Hundred => 100,
            BookLength::TwoHundredFifty => 250,
        }
    }
}

impl fmt::Display for BookLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.points())
    }
}

impl FromStr for BookLength {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(BookLength::One),
            "25" => Ok(BookLength::TwentyFive),
            "100" => Ok(BookLength::Hundred),
            "250" => Ok(BookLength::TwoHundredFifty),
            other => Err(ConnectorError::Config(format!("unsupported book length {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub url: String,
    pub symbols: Vec<String>,
    /// Channel subscriptions allowed on one connection.
    pub max_subscriptions: usize,
    /// Reconnect if no heartbeat arrives within this many milliseconds.
    pub heartbeat_period_ms: u64,
    pub price_precision: PricePrecision,
    pub price_points: BookLength,
    pub retry_delay_ms: u64,
    pub max_connection_retries: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            symbols: vec!["tBTCUSD".to_string(), "tETHUSD".to_string()],
            max_subscriptions: 30,
            heartbeat_period_ms: 30_000,
            price_precision: PricePrecision::P0,
            price_points: BookLength::TwentyFive,
            retry_delay_ms: 5_000,
            max_connection_retries: 3,
        }
    }
}

fn parse_var<T>(key: &str, raw: Option<String>) -> Result<Option<T>, ConnectorError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.map(|v| {
        v.trim()
            .parse::<T>()
            .map_err(|e| ConnectorError::Config(format!("{key}: {e}")))
    })
    .transpose()
}

impl StreamConfig {
    pub fn from_env() -> Result<Self, ConnectorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `BITFINEX_*` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConnectorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("BITFINEX_WS_URL") {
            cfg.url = v;
        }
        if let Some(v) = lookup("BITFINEX_SYMBOLS") {
            cfg.symbols = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(trading_symbol)
                .collect();
        }
        if let Some(v) = parse_var("BITFINEX_MAX_SUBSCRIPTIONS", lookup("BITFINEX_MAX_SUBSCRIPTIONS"))? {
            cfg.max_subscriptions = v;
        }
        if let Some(v) = parse_var("BITFINEX_HEARTBEAT_MS", lookup("BITFINEX_HEARTBEAT_MS"))? {
            cfg.heartbeat_period_ms = v;
        }
        if let Some(v) = parse_var("BITFINEX_PRICE_PRECISION", lookup("BITFINEX_PRICE_PRECISION"))? {
            cfg.price_precision = v;
        }
        if let Some(v) = parse_var("BITFINEX_PRICE_POINTS", lookup("BITFINEX_PRICE_POINTS"))? {
            cfg.price_points = v;
        }
        if let Some(v) = parse_var("BITFINEX_RETRY_DELAY_MS", lookup("BITFINEX_RETRY_DELAY_MS"))? {
            cfg.retry_delay_ms = v;
        }
        if let Some(v) = parse_var("BITFINEX_MAX_RETRIES", lookup("BITFINEX_MAX_RETRIES"))? {
            cfg.max_connection_retries = v;
        }

        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConnectorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConnectorError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Missing fields take their defaults; symbols are normalised like the env loader's.
    pub fn from_json(text: &str) -> Result<Self, ConnectorError> {
        let mut cfg: StreamConfig = serde_json::from_str(text)?;
        cfg.symbols = cfg.symbols.iter().map(|s| trading_symbol(s.trim())).collect();
        Ok(cfg)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Every symbol takes one ticker and one book subscription.
    pub fn required_subscriptions(&self) -> usize {
        self.symbols.len() * 2
    }

    pub fn symbol_table(&self) -> SymbolTable {
        SymbolTable::new(self.symbols.iter().cloned())
    }

    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.url.trim().is_empty() {
            return Err(ConnectorError::Config("url cannot be empty".into()));
        }
        if self.symbols.is_empty() {
            return Err(ConnectorError::Config("at least one symbol is required".into()));
        }
        let mut seen = HashSet::new();
        for symbol in &self.symbols {
            if !seen.insert(symbol.as_str()) {
                return Err(ConnectorError::Config(format!("duplicate symbol {symbol}")));
            }
        }
        if self.heartbeat_period_ms == 0 {
            return Err(ConnectorError::Config("heartbeat period must be positive".into()));
        }
        if self.max_connection_retries == 0 {
            return Err(ConnectorError::Config("max connection retries must be positive".into()));
        }
        if self.required_subscriptions() > self.max_subscriptions {
            return Err(ConnectorError::SubscriptionBudget {
                symbols: self.symbols.len(),
                required: self.required_subscriptions(),
                limit: self.max_subscriptions,
            });
        }
        Ok(())
    }
}
