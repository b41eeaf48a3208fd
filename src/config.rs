//! Configuration for decoding book sides and describing a market.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::orderbook::types::BaseLots;
use crate::utils::time::{BookClock, DEFAULT_MAX_BOOK_DELAY_SECS};
use crate::utils::LotConverter;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "Failed to read config: {}", err),
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How strictly book-side buffers are validated and how `now` is derived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub max_book_delay_secs: u64,
    pub verify_discriminator: bool,
    pub verify_leaf_counts: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_book_delay_secs: DEFAULT_MAX_BOOK_DELAY_SECS,
            verify_discriminator: true,
            verify_leaf_counts: true,
        }
    }
}

impl ReaderConfig {
    /// Clock for a book fetched at `unix_now`
    pub fn clock_at(&self, unix_now: u64) -> BookClock {
        BookClock::at(unix_now).with_max_book_delay(self.max_book_delay_secs)
    }
}

/// Static parameters of one perp market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub name: String,
    pub base_decimals: u8,
    pub base_lot_size: i64,
    pub quote_lot_size: i64,
    /// Size used for impact prices in funding, in base lots
    pub impact_quantity: BaseLots,
    pub min_funding: f64,
    pub max_funding: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            name: "PERP".to_string(),
            base_decimals: 6,
            base_lot_size: 1,
            quote_lot_size: 1,
            impact_quantity: 1,
            min_funding: -0.05,
            max_funding: 0.05,
        }
    }
}

impl MarketConfig {
    pub fn lot_converter(&self) -> LotConverter {
        LotConverter::from_market(self.base_decimals, self.base_lot_size, self.quote_lot_size)
    }
}

/// Everything the inspector binary reads from its config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    pub reader: ReaderConfig,
    pub market: MarketConfig,
}

impl InspectorConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.max_book_delay_secs, 3600);
        assert!(config.verify_discriminator);
        assert!(config.verify_leaf_counts);

        let clock = config.clock_at(5_000);
        assert_eq!(clock.unix_now, 5_000);
        assert_eq!(clock.max_book_delay, 3600);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = InspectorConfig::from_json_str(
            r#"{ "reader": { "max_book_delay_secs": 30 }, "market": { "name": "SOL-PERP", "base_decimals": 9 } }"#,
        )
        .unwrap();

        assert_eq!(config.reader.max_book_delay_secs, 30);
        assert!(config.reader.verify_leaf_counts);
        assert_eq!(config.market.name, "SOL-PERP");
        assert_eq!(config.market.base_decimals, 9);
        assert_eq!(config.market.quote_lot_size, 1);
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = InspectorConfig::from_json_str("{}").unwrap();
        assert_eq!(config, InspectorConfig::default());
    }

    #[test]
    fn test_parse_error() {
        let err = InspectorConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("Failed to parse config"));
    }

    #[test]
    fn test_missing_file() {
        let err = InspectorConfig::from_file("/nonexistent/book_inspector.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_market_lot_converter() {
        let market = MarketConfig {
            base_decimals: 9,
            base_lot_size: 10_000_000,
            quote_lot_size: 100,
            ..MarketConfig::default()
        };
        let lots = market.lot_converter();
        assert!((lots.price_lots_to_ui(2_000) - 20.0).abs() < 1e-9);
    }
}
