pub mod time;

use serde::{Deserialize, Serialize};

/// Decimals of the quote currency all perp markets settle in
pub const QUOTE_DECIMALS: i32 = 6;

/// Converts between lot-denominated book values and human-readable units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LotConverter {
    price_lots_to_ui: f64,
    base_lots_to_ui: f64,
}

impl LotConverter {
    pub fn new(price_lots_to_ui: f64, base_lots_to_ui: f64) -> Self {
        Self {
            price_lots_to_ui,
            base_lots_to_ui,
        }
    }

    /// Build the converter from a market's decimals and lot sizes
    pub fn from_market(base_decimals: u8, base_lot_size: i64, quote_lot_size: i64) -> Self {
        let base_decimals = i32::from(base_decimals);
        let price_lots_to_ui = 10f64.powi(base_decimals - QUOTE_DECIMALS) * quote_lot_size as f64
            / base_lot_size as f64;
        let base_lots_to_ui = base_lot_size as f64 / 10f64.powi(base_decimals);

        Self::new(price_lots_to_ui, base_lots_to_ui)
    }

    /// Lots map one to one onto UI units
    pub fn identity() -> Self {
        Self::new(1.0, 1.0)
    }

    #[inline]
    pub fn price_lots_to_ui(&self, price_lots: i64) -> f64 {
        price_lots as f64 * self.price_lots_to_ui
    }

    #[inline]
    pub fn base_lots_to_ui(&self, base_lots: i64) -> f64 {
        base_lots as f64 * self.base_lots_to_ui
    }

    /// Round down to whole price lots
    pub fn ui_price_to_lots(&self, price: f64) -> i64 {
        (price / self.price_lots_to_ui).floor() as i64
    }

    /// Round down to whole base lots
    pub fn ui_base_to_lots(&self, size: f64) -> i64 {
        (size / self.base_lots_to_ui).floor() as i64
    }
}

impl Default for LotConverter {
    fn default() -> Self {
        Self::identity()
    }
}

/// Render a UI price with a fixed number of decimals
pub fn format_price(price: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(100.0, 2), "100.00");
        assert_eq!(format_price(125.5, 5), "125.50000");
    }

    #[test]
    fn test_market_converter() {
        // 9 base decimals, base lot 10_000_000 native, quote lot 100 native
        let lots = LotConverter::from_market(9, 10_000_000, 100);

        // 1 price lot = 100 / 1e6 quote per 1e7 / 1e9 base = 0.01
        assert!((lots.price_lots_to_ui(2_000) - 20.0).abs() < 1e-9);
        assert!((lots.base_lots_to_ui(250) - 2.5).abs() < 1e-9);
        assert_eq!(lots.ui_price_to_lots(20.0), 2_000);
        assert_eq!(lots.ui_base_to_lots(2.5), 250);
    }

    #[test]
    fn test_identity_converter() {
        let lots = LotConverter::default();
        assert_eq!(lots.price_lots_to_ui(-42), -42.0);
        assert_eq!(lots.base_lots_to_ui(7), 7.0);
        assert_eq!(lots.ui_price_to_lots(99.9), 99);
    }
}
