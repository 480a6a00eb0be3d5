//! Price-ordered views over decoded book sides.
//!
//! [`BookSide`] is the raw slab; this module materializes orders out of it
//! and owns the per-snapshot best order cache. A wrapper is built from one
//! account fetch and discarded on the next, so the cache never needs
//! invalidation: new decode, new wrapper, fresh cache.

use crate::error::Result;
use crate::state::critbit::{BookSide, LeafNode};
use crate::state::Side;
use solana_program::pubkey::Pubkey;
use std::cell::OnceCell;

/// A resting order materialized from a leaf node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    /// The leaf key: price in the top 64 bits, insertion sequence below
    pub order_id: i128,
    #[allow(missing_docs)]
    pub client_order_id: u64,
    /// Margin account that owns the order
    pub owner: Pubkey,
    /// The owner account's open order slot
    pub owner_slot: u8,
    /// Price in quote lots per base lot
    pub price: i64,
    /// Remaining quantity in base lots
    pub quantity: i64,
    /// Unix time the order was placed
    pub timestamp: u64,
}

impl Order {
    fn from_leaf(leaf: &LeafNode) -> Self {
        Self {
            order_id: leaf.key(),
            client_order_id: leaf.client_order_id,
            owner: leaf.owner(),
            owner_slot: leaf.owner_slot,
            price: leaf.price(),
            quantity: leaf.quantity,
            timestamp: leaf.timestamp,
        }
    }
}

/// One decoded side of the book plus its snapshot-scoped best order cache
pub struct OrderBookSide {
    side: Side,
    slab: Box<BookSide>,
    best: OnceCell<Option<Order>>,
}

impl OrderBookSide {
    /// Decode a bids or asks account image; fails on any length mismatch
    pub fn deserialize(side: Side, buf: &[u8]) -> Result<Self> {
        Ok(Self {
            side,
            slab: BookSide::deserialize(buf)?,
            best: OnceCell::new(),
        })
    }

    /// Wrap an already decoded slab
    pub fn new(side: Side, slab: Box<BookSide>) -> Self {
        Self { side, slab, best: OnceCell::new() }
    }

    #[allow(missing_docs)]
    pub fn side(&self) -> Side {
        self.side
    }

    /// The underlying slab
    pub fn slab(&self) -> &BookSide {
        &self.slab
    }

    /// All live orders in slab storage order.
    ///
    /// This scans the node arena and is *not* price sorted; use
    /// [`OrderBookSide::sorted_orders`] when price priority matters.
    pub fn orders(&self) -> Vec<Order> {
        self.slab
            .nodes
            .iter()
            .filter_map(|node| node.as_leaf())
            .map(Order::from_leaf)
            .collect()
    }

    /// All live orders in price priority: highest first for bids, lowest
    /// first for asks. Within a price level the key's sequence bits decide;
    /// the program encodes them so both sides read oldest first.
    pub fn sorted_orders(&self) -> Vec<Order> {
        self.iter_priority().map(|l| Order::from_leaf(l)).collect()
    }

    /// The best priced order, or `None` on an empty side.
    ///
    /// The result is computed once per decoded snapshot and cached: a second
    /// call returns the cached value without walking the tree again.
    pub fn best(&self) -> Option<Order> {
        *self.best.get_or_init(|| {
            let leaf = match self.side {
                Side::Bid => self.slab.find_max(),
                Side::Ask => self.slab.find_min(),
            };
            leaf.map(Order::from_leaf)
        })
    }

    /// Price at which a hypothetical order of `target_quantity` base lots
    /// would be fully filled against this side's resting liquidity.
    ///
    /// Walks orders in price priority accumulating quantity; returns the
    /// price of the order that crosses the target. Returns `0` when the whole
    /// side holds less than `target_quantity`: the sentinel means "not enough
    /// depth", it is a value and never an error.
    pub fn impact_price(&self, target_quantity: i64) -> i64 {
        let mut cumulative: i128 = 0;
        for leaf in self.iter_priority() {
            cumulative += leaf.quantity as i128;
            if cumulative >= target_quantity as i128 {
                return leaf.price();
            }
        }
        0
    }

    fn iter_priority(&self) -> impl Iterator<Item = &LeafNode> {
        // ascending key order is lowest price first; bids read back to front
        self.slab.iter(self.side == Side::Ask)
    }
}

impl std::fmt::Debug for OrderBookSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBookSide")
            .field("side", &self.side)
            .field("leaf_count", &self.slab.leaf_count)
            .finish()
    }
}

/// Both sides of a market's book.
///
/// Each side decodes independently and may legitimately be empty.
#[derive(Debug)]
pub struct OrderBook {
    bids: OrderBookSide,
    asks: OrderBookSide,
}

impl OrderBook {
    /// Decode the bids and asks account images of one market
    pub fn deserialize(bids_buf: &[u8], asks_buf: &[u8]) -> Result<Self> {
        Ok(Self {
            bids: OrderBookSide::deserialize(Side::Bid, bids_buf)?,
            asks: OrderBookSide::deserialize(Side::Ask, asks_buf)?,
        })
    }

    #[allow(missing_docs)]
    pub fn new(bids: OrderBookSide, asks: OrderBookSide) -> Self {
        Self { bids, asks }
    }

    #[allow(missing_docs)]
    pub fn bids(&self) -> &OrderBookSide {
        &self.bids
    }

    #[allow(missing_docs)]
    pub fn asks(&self) -> &OrderBookSide {
        &self.asks
    }

    /// Best bid and best ask prices in quote lots per base lot
    pub fn spread(&self) -> (Option<i64>, Option<i64>) {
        (
            self.bids.best().map(|o| o.price),
            self.asks.best().map(|o| o.price),
        )
    }
}

/////////////////////////////////////
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::critbit::test_tree::{insert_leaf, leaf};
    use crate::state::critbit::NodeTag;
    use bytemuck::Zeroable;
    use rand::prelude::*;

    fn side_with_orders(side: Side, orders: &[(i64, i64)]) -> OrderBookSide {
        let mut book = BookSide::zeroed();
        for (seq, &(price, quantity)) in orders.iter().enumerate() {
            let key = ((price as i128) << 64) | seq as i128;
            insert_leaf(&mut book, &leaf(key, quantity));
        }
        let bytes = bytemuck::bytes_of(&book).to_vec();
        OrderBookSide::deserialize(side, &bytes).unwrap()
    }

    #[test]
    fn empty_side() {
        let side = side_with_orders(Side::Bid, &[]);
        assert!(side.orders().is_empty());
        assert!(side.sorted_orders().is_empty());
        assert!(side.best().is_none());
        assert_eq!(side.impact_price(1), 0);
    }

    #[test]
    fn orders_view_carries_leaf_fields() {
        let side = side_with_orders(Side::Ask, &[(100, 7)]);
        let orders = side.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].price, 100);
        assert_eq!(orders[0].quantity, 7);
        assert_eq!(orders[0].order_id, 100i128 << 64);
    }

    #[test]
    fn sorted_orders_direction() {
        let levels = &[(100, 1), (90, 2), (110, 3), (105, 4)];

        let bids = side_with_orders(Side::Bid, levels);
        let bid_prices: Vec<i64> = bids.sorted_orders().iter().map(|o| o.price).collect();
        assert_eq!(bid_prices, vec![110, 105, 100, 90]);

        let asks = side_with_orders(Side::Ask, levels);
        let ask_prices: Vec<i64> = asks.sorted_orders().iter().map(|o| o.price).collect();
        assert_eq!(ask_prices, vec![90, 100, 105, 110]);
    }

    #[test]
    fn price_time_priority_within_level() {
        // same price, increasing insertion sequence: asks read oldest first
        let side = side_with_orders(Side::Ask, &[(50, 1), (50, 2), (50, 3)]);
        let quantities: Vec<i64> = side.sorted_orders().iter().map(|o| o.quantity).collect();
        assert_eq!(quantities, vec![1, 2, 3]);
    }

    #[test]
    fn best_is_cached_per_snapshot() {
        let side = side_with_orders(Side::Bid, &[(100, 1), (110, 2), (90, 3)]);
        let first = side.best().unwrap();
        assert_eq!(first.price, 110);
        // the second call must return the identical cached value
        let second = side.best().unwrap();
        assert_eq!(first, second);
        let cached = side.best.get().expect("cache populated by first call");
        assert_eq!(*cached, Some(first));
    }

    #[test]
    fn impact_price_walks_depth() {
        let asks = side_with_orders(Side::Ask, &[(100, 5), (105, 5), (110, 5)]);
        assert_eq!(asks.impact_price(1), 100);
        assert_eq!(asks.impact_price(5), 100);
        assert_eq!(asks.impact_price(6), 105);
        assert_eq!(asks.impact_price(10), 105);
        assert_eq!(asks.impact_price(15), 110);
        // beyond total depth: sentinel, not an error
        assert_eq!(asks.impact_price(16), 0);

        let bids = side_with_orders(Side::Bid, &[(100, 5), (105, 5), (110, 5)]);
        assert_eq!(bids.impact_price(1), 110);
        assert_eq!(bids.impact_price(11), 100);
        assert_eq!(bids.impact_price(100), 0);
    }

    #[test]
    fn storage_and_priority_views_hold_the_same_orders() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut levels = vec![];
        for _ in 0..50 {
            levels.push((rng.gen_range(1..10_000), rng.gen_range(1..100)));
        }
        let side = side_with_orders(Side::Ask, &levels);

        let mut storage: Vec<i128> = side.orders().iter().map(|o| o.order_id).collect();
        let sorted: Vec<i128> = side.sorted_orders().iter().map(|o| o.order_id).collect();
        assert_eq!(storage.len(), sorted.len());
        storage.sort_unstable();
        let mut resorted = sorted.clone();
        resorted.sort_unstable();
        assert_eq!(storage, resorted);
    }

    #[test]
    fn order_book_pairs_sides() {
        let mut bids = BookSide::zeroed();
        insert_leaf(&mut bids, &leaf(100i128 << 64, 1));
        insert_leaf(&mut bids, &leaf(99i128 << 64, 1));
        let mut asks = BookSide::zeroed();
        insert_leaf(&mut asks, &leaf(101i128 << 64, 1));

        let bids_bytes = bytemuck::bytes_of(&bids).to_vec();
        let asks_bytes = bytemuck::bytes_of(&asks).to_vec();
        let book = OrderBook::deserialize(&bids_bytes, &asks_bytes).unwrap();
        assert_eq!(book.spread(), (Some(100), Some(101)));
        assert_eq!(book.bids().sorted_orders().len(), 2);
        assert_eq!(book.asks().sorted_orders().len(), 1);
    }

    #[test]
    fn order_book_sides_may_be_empty() {
        let empty = vec![0u8; BookSide::LEN];
        let book = OrderBook::deserialize(&empty, &empty).unwrap();
        assert_eq!(book.spread(), (None, None));
        // tag constants stay reachable for callers inspecting raw nodes
        assert_eq!(u32::from(NodeTag::Uninitialized), 0);
    }
}
