#![warn(missing_docs)]
/*!
Client-side decoding of a Solana perp DEX's orderbook and event stream.

## Overview

This library turns raw account byte buffers, as returned by an RPC fetch or
an account subscription, into typed immutable snapshots of the program's
order book and event queue state. It performs no I/O of its own: fetching,
subscribing, transaction building and signing all belong to the surrounding
client and are fed in as plain `&[u8]` account images.

Three pieces make up the core:

- [`I80F48`][`fixed_point::I80F48`], the signed 128-bit fixed point number
  (48 fractional bits) the program uses for prices, fees and balances,
  decoded from its 16-byte little-endian wire form.
- The critbit slab of a bids or asks account, decoded by
  [`BookSide`][`state::critbit::BookSide`] and viewed through
  [`OrderBookSide`][`state::orderbook::OrderBookSide`], which adds price
  ordered traversal, a cached best order and impact price queries.
- The fixed capacity event ring decoded by
  [`EventQueue`][`state::event_queue::EventQueue`], either in full or
  incrementally against a previously observed sequence number.

## Reading a book

```no_run
use perp_book_client::state::orderbook::OrderBook;

# fn fetch(_: &str) -> Vec<u8> { unimplemented!() }
let bids_bytes = fetch("bids account");
let asks_bytes = fetch("asks account");
let book = OrderBook::deserialize(&bids_bytes, &asks_bytes)?;
let _best_bid = book.bids().best();
let _fill_price_for_10_lots = book.asks().impact_price(10);
# Ok::<(), perp_book_client::PerpBookError>(())
```

Every decode produces an independent snapshot: decoding the same bytes twice
yields equal values, and a new snapshot starts with a fresh best order cache.

## Following the event stream

A long running consumer keeps one watermark, the `seq_num` of its last
decoded header, and passes it to
[`deserialize_since`][`state::event_queue::EventQueue::deserialize_since`] on
every account notification. The call returns exactly the events produced
since the watermark, oldest first, tolerating wraparound of the producer's
32-bit sequence counter. A consumer that falls more than one ring capacity
behind loses the oldest events silently; the ring cannot retain them.

Decoding is synchronous and allocation-light; snapshots for different
markets share no state and may be decoded from any number of threads.
*/

pub mod error;
pub mod fixed_point;
/// Frozen per-market configuration tables
pub mod markets;
/// Decoders for the program's account layouts
pub mod state;

pub use error::{PerpBookError, Result};
pub use fixed_point::I80F48;
