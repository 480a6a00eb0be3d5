//! Frozen per-market configuration.
//!
//! Lot sizes and decimals are program deployment constants; they are listed
//! here as read-only tables rather than fetched or mutated at runtime. Book
//! prices and quantities are denominated in lots, so converting to native
//! token units needs the entries below.

use crate::fixed_point::I80F48;

/// Static configuration of one perp market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerpMarketSpec {
    #[allow(missing_docs)]
    pub name: &'static str,
    /// Decimals of the base token mint
    pub base_decimals: u8,
    /// Decimals of the quote token mint
    pub quote_decimals: u8,
    /// Native base units per base lot
    pub base_lot_size: i64,
    /// Native quote units per quote lot
    pub quote_lot_size: i64,
}

impl PerpMarketSpec {
    /// Convert a book price in quote lots per base lot to native quote units
    /// per native base unit
    pub fn price_lots_to_native(&self, price: i64) -> I80F48 {
        I80F48::from_num(price * self.quote_lot_size) / I80F48::from_num(self.base_lot_size)
    }

    /// Convert a quantity in base lots to native base units
    pub fn base_lots_to_native(&self, quantity: i64) -> I80F48 {
        I80F48::from_num(quantity * self.base_lot_size)
    }

    /// Convert a book price to a UI price in whole tokens. Lossy, display only.
    pub fn price_lots_to_ui(&self, price: i64) -> f64 {
        let decimal_adjustment =
            10f64.powi(self.base_decimals as i32 - self.quote_decimals as i32);
        self.price_lots_to_native(price).to_f64() * decimal_adjustment
    }
}

/// Markets of the mainnet deployment this layer decodes
pub const MAINNET_PERP_MARKETS: &[PerpMarketSpec] = &[
    PerpMarketSpec {
        name: "BTC-PERP",
        base_decimals: 6,
        quote_decimals: 6,
        base_lot_size: 100,
        quote_lot_size: 10,
    },
    PerpMarketSpec {
        name: "ETH-PERP",
        base_decimals: 6,
        quote_decimals: 6,
        base_lot_size: 1000,
        quote_lot_size: 10,
    },
    PerpMarketSpec {
        name: "SOL-PERP",
        base_decimals: 9,
        quote_decimals: 6,
        base_lot_size: 10_000_000,
        quote_lot_size: 100,
    },
];

/// Look up a market by name
pub fn find_market(name: &str) -> Option<&'static PerpMarketSpec> {
    MAINNET_PERP_MARKETS.iter().find(|m| m.name == name)
}
