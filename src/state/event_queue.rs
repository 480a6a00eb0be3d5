//! Event queue decoding, full and incremental.
//!
//! The queue account is a header followed by a ring of fixed 200-byte event
//! slots. The producer appends at `(head + count) % capacity`, bumping
//! `count` and `seq_num`; the on-chain consumer pops from `head`. Because
//! slots are only ever overwritten, a client that remembers the last
//! `seq_num` it saw can decode just the slots produced since, see
//! [`EventQueue::deserialize_since`].

use crate::error::{PerpBookError, Result};
use crate::fixed_point::I80F48;
use crate::state::MetaData;
use bytemuck::{Pod, Zeroable};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use solana_program::pubkey::Pubkey;
use static_assertions::const_assert_eq;
use std::convert::TryFrom;
use std::mem::size_of;

/// Byte size of every event slot. All variants share it so the ring indexes
/// uniformly; type specific decoders ignore their trailing padding.
pub const EVENT_SIZE: usize = 200;

/// Serialized size of [`EventQueueHeader`]
pub const QUEUE_HEADER_LEN: usize = size_of::<EventQueueHeader>();

/// The producer's sequence counter wraps modulo 2^32
const SEQ_MASK: u64 = u32::MAX as u64;

/// Discriminant stored in the first byte of every event slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum EventType {
    #[allow(missing_docs)]
    Fill = 0,
    #[allow(missing_docs)]
    Out = 1,
    #[allow(missing_docs)]
    Liquidate = 2,
}

/// Ring buffer header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EventQueueHeader {
    #[allow(missing_docs)]
    pub meta_data: MetaData,
    /// Index of the oldest occupied slot
    pub head: u64,
    /// Number of occupied slots awaiting on-chain consumption
    pub count: u64,
    /// Sequence number the next produced event will receive. Stored in a
    /// 64-bit field but advanced modulo 2^32 by the producer.
    pub seq_num: u64,
}

const_assert_eq!(QUEUE_HEADER_LEN, 32);

/// A taker order matched against a resting maker order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct FillEvent {
    #[allow(missing_docs)]
    pub event_type: u8,
    /// Raw [`crate::state::Side`] of the taker
    pub taker_side: u8,
    /// Open order slot of the maker order
    pub maker_slot: u8,
    /// Nonzero if this fill removed the maker order from the book
    pub maker_out: u8,
    #[allow(missing_docs)]
    pub version: u8,
    #[allow(missing_docs)]
    pub market_fees_applied: u8,
    #[allow(missing_docs)]
    pub padding: [u8; 2],
    #[allow(missing_docs)]
    pub timestamp: u64,
    #[allow(missing_docs)]
    pub seq_num: u64,
    maker: [u8; 32],
    maker_order_id: [u8; 16],
    #[allow(missing_docs)]
    pub maker_client_order_id: u64,
    maker_fee: [u8; 16],
    /// Best book price when the maker order was placed
    pub best_initial: i64,
    #[allow(missing_docs)]
    pub maker_timestamp: u64,
    taker: [u8; 32],
    taker_order_id: [u8; 16],
    #[allow(missing_docs)]
    pub taker_client_order_id: u64,
    taker_fee: [u8; 16],
    /// Fill price in quote lots per base lot
    pub price: i64,
    /// Filled quantity in base lots
    pub quantity: i64,
}

impl FillEvent {
    #[allow(missing_docs)]
    pub fn maker(&self) -> Pubkey {
        Pubkey::new_from_array(self.maker)
    }

    #[allow(missing_docs)]
    pub fn taker(&self) -> Pubkey {
        Pubkey::new_from_array(self.taker)
    }

    #[allow(missing_docs)]
    pub fn maker_order_id(&self) -> i128 {
        i128::from_le_bytes(self.maker_order_id)
    }

    #[allow(missing_docs)]
    pub fn taker_order_id(&self) -> i128 {
        i128::from_le_bytes(self.taker_order_id)
    }

    /// Fee paid by the maker, negative for a rebate
    pub fn maker_fee(&self) -> I80F48 {
        I80F48::from_le_bytes(self.maker_fee)
    }

    #[allow(missing_docs)]
    pub fn taker_fee(&self) -> I80F48 {
        I80F48::from_le_bytes(self.taker_fee)
    }
}

/// A maker order removed from the book without matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct OutEvent {
    #[allow(missing_docs)]
    pub event_type: u8,
    /// Raw [`crate::state::Side`] the order rested on
    pub side: u8,
    /// Open order slot the order occupied
    pub slot: u8,
    #[allow(missing_docs)]
    pub padding0: [u8; 5],
    #[allow(missing_docs)]
    pub timestamp: u64,
    #[allow(missing_docs)]
    pub seq_num: u64,
    owner: [u8; 32],
    /// Unfilled quantity released, in base lots
    pub quantity: i64,
    #[allow(missing_docs)]
    pub padding1: [u8; EVENT_SIZE - 64],
}

impl OutEvent {
    #[allow(missing_docs)]
    pub fn owner(&self) -> Pubkey {
        Pubkey::new_from_array(self.owner)
    }
}

/// A position forcibly reduced by a liquidator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct LiquidateEvent {
    #[allow(missing_docs)]
    pub event_type: u8,
    #[allow(missing_docs)]
    pub padding0: [u8; 7],
    #[allow(missing_docs)]
    pub timestamp: u64,
    #[allow(missing_docs)]
    pub seq_num: u64,
    liquidated: [u8; 32],
    liquidator: [u8; 32],
    price: [u8; 16],
    /// Quantity taken over, in base lots
    pub quantity: i64,
    liquidation_fee: [u8; 16],
    #[allow(missing_docs)]
    pub padding1: [u8; EVENT_SIZE - 128],
}

impl LiquidateEvent {
    /// Account whose position was reduced
    pub fn liquidated(&self) -> Pubkey {
        Pubkey::new_from_array(self.liquidated)
    }

    #[allow(missing_docs)]
    pub fn liquidator(&self) -> Pubkey {
        Pubkey::new_from_array(self.liquidator)
    }

    /// Liquidation price as a native fixed point value
    pub fn price(&self) -> I80F48 {
        I80F48::from_le_bytes(self.price)
    }

    #[allow(missing_docs)]
    pub fn liquidation_fee(&self) -> I80F48 {
        I80F48::from_le_bytes(self.liquidation_fee)
    }
}

const_assert_eq!(size_of::<FillEvent>(), EVENT_SIZE);
const_assert_eq!(size_of::<OutEvent>(), EVENT_SIZE);
const_assert_eq!(size_of::<LiquidateEvent>(), EVENT_SIZE);

/// A decoded event slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    #[allow(missing_docs)]
    Fill(FillEvent),
    #[allow(missing_docs)]
    Out(OutEvent),
    #[allow(missing_docs)]
    Liquidate(LiquidateEvent),
}

impl Event {
    /// Decode one event slot; `None` for stale or zeroed discriminators
    pub fn deserialize(slot: &[u8; EVENT_SIZE]) -> Option<Event> {
        match EventType::try_from(slot[0]).ok()? {
            EventType::Fill => Some(Event::Fill(bytemuck::pod_read_unaligned(slot))),
            EventType::Out => Some(Event::Out(bytemuck::pod_read_unaligned(slot))),
            EventType::Liquidate => Some(Event::Liquidate(bytemuck::pod_read_unaligned(slot))),
        }
    }

    #[allow(missing_docs)]
    pub fn event_type(&self) -> EventType {
        match self {
            Event::Fill(_) => EventType::Fill,
            Event::Out(_) => EventType::Out,
            Event::Liquidate(_) => EventType::Liquidate,
        }
    }

    #[allow(missing_docs)]
    pub fn timestamp(&self) -> u64 {
        match self {
            Event::Fill(e) => e.timestamp,
            Event::Out(e) => e.timestamp,
            Event::Liquidate(e) => e.timestamp,
        }
    }

    #[allow(missing_docs)]
    pub fn seq_num(&self) -> u64 {
        match self {
            Event::Fill(e) => e.seq_num,
            Event::Out(e) => e.seq_num,
            Event::Liquidate(e) => e.seq_num,
        }
    }

    fn set_seq_num(&mut self, seq_num: u64) {
        match self {
            Event::Fill(e) => e.seq_num = seq_num,
            Event::Out(e) => e.seq_num = seq_num,
            Event::Liquidate(e) => e.seq_num = seq_num,
        }
    }
}

/// Decoded snapshot of an event queue account.
///
/// `events` holds either the full ring (newest first, via
/// [`EventQueue::deserialize`]) or only the newly produced events (oldest
/// first, via [`EventQueue::deserialize_since`]).
#[derive(Debug, Clone, PartialEq)]
pub struct EventQueue {
    #[allow(missing_docs)]
    pub header: EventQueueHeader,
    #[allow(missing_docs)]
    pub events: Vec<Event>,
    /// Number of slots in the ring
    pub capacity: usize,
}

impl EventQueue {
    fn split_buffer(buf: &[u8]) -> Result<(EventQueueHeader, &[u8], usize)> {
        if buf.len() < QUEUE_HEADER_LEN + EVENT_SIZE
            || (buf.len() - QUEUE_HEADER_LEN) % EVENT_SIZE != 0
        {
            return Err(PerpBookError::EventQueueSizeMismatch { len: buf.len() });
        }
        let (header, slots) = buf.split_at(QUEUE_HEADER_LEN);
        let capacity = slots.len() / EVENT_SIZE;
        Ok((bytemuck::pod_read_unaligned(header), slots, capacity))
    }

    fn slot(slots: &[u8], index: u64) -> &[u8; EVENT_SIZE] {
        let start = index as usize * EVENT_SIZE;
        // the range is in bounds by construction, the conversion cannot fail
        <&[u8; EVENT_SIZE]>::try_from(&slots[start..start + EVENT_SIZE]).unwrap()
    }

    /// Decode the whole ring, newest event first.
    ///
    /// Walks every slot starting from the most recently written one; slots
    /// whose discriminator is unknown or zeroed are skipped, never an error,
    /// since a slot that was never written decodes as uninitialized.
    pub fn deserialize(buf: &[u8]) -> Result<EventQueue> {
        let (header, slots, capacity) = Self::split_buffer(buf)?;
        let n = capacity as u64;

        let mut events = Vec::with_capacity(capacity);
        for i in 0..n {
            let index = (header.head + header.count + n - 1 - i) % n;
            if let Some(event) = Event::deserialize(Self::slot(slots, index)) {
                events.push(event);
            }
        }
        Ok(EventQueue { header, events, capacity })
    }

    /// Decode only the events produced after a previously observed sequence
    /// number, oldest first.
    ///
    /// `last_seq_num` is the `header.seq_num` of the previous decode; after
    /// the call the caller advances its watermark to the returned header's
    /// `seq_num`. The subtraction is modulo 2^32, tolerating producer-side
    /// counter wraparound.
    ///
    /// The ring retains at most `capacity - 1` past events: if the consumer
    /// fell further behind, the oldest missed events are unrecoverable and
    /// silently dropped rather than erred. Each returned event carries a
    /// sequence number reconstructed from its ring position, so consecutive
    /// calls yield a gapless (modulo 2^32) sequence.
    pub fn deserialize_since(buf: &[u8], last_seq_num: u64) -> Result<EventQueue> {
        let (header, slots, capacity) = Self::split_buffer(buf)?;
        let n = capacity as u64;

        let missed = (header.seq_num.wrapping_sub(last_seq_num) & SEQ_MASK).min(n - 1);
        let end = (header.head + header.count) % n;
        let start = (end + n - missed) % n;

        let mut events = Vec::with_capacity(missed as usize);
        for i in 0..missed {
            let index = (start + i) % n;
            if let Some(mut event) = Event::deserialize(Self::slot(slots, index)) {
                event.set_seq_num(header.seq_num.wrapping_sub(missed).wrapping_add(i) & SEQ_MASK);
                events.push(event);
            }
        }
        Ok(EventQueue { header, events, capacity })
    }
}

/////////////////////////////////////
// Tests


#[cfg(test)]
mod tests {
    use super::test_queue::{fill_with_seq, QueueFixture};
    use super::*;

    #[test]
    fn layout_is_frozen() {
        assert_eq!(QUEUE_HEADER_LEN, 32);
        assert_eq!(size_of::<FillEvent>(), 200);
        assert_eq!(size_of::<OutEvent>(), 200);
        assert_eq!(size_of::<LiquidateEvent>(), 200);
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(
            EventQueue::deserialize(&[0u8; QUEUE_HEADER_LEN]),
            Err(PerpBookError::EventQueueSizeMismatch { .. })
        ));
        assert!(matches!(
            EventQueue::deserialize(&[0u8; QUEUE_HEADER_LEN + EVENT_SIZE + 1]),
            Err(PerpBookError::EventQueueSizeMismatch { .. })
        ));
    }

    #[test]
    fn full_decode_of_populated_ring() {
        // regression scenario: fully written 256 slot ring with a consumed
        // queue (count 0) still decodes every slot
        let mut fixture = QueueFixture::new(256);
        for i in 0..256 {
            fixture.write_slot(i, &Event::Fill(fill_with_seq(508683 - 256 + i as u64, 1)));
        }
        fixture.set_header(11, 0, 508683);

        let queue = EventQueue::deserialize(&fixture.buf).unwrap();
        assert_eq!(queue.capacity, 256);
        assert_eq!(queue.events.len(), 256);
        // newest first: slot (head + count - 1) % n = slot 10 comes out first
        assert_eq!(queue.events[0].seq_num(), 508683 - 256 + 10);
    }

    #[test]
    fn full_decode_skips_unknown_discriminators() {
        let mut fixture = QueueFixture::new(8);
        fixture.set_header(0, 2, 2);
        fixture.write_slot(0, &Event::Fill(fill_with_seq(0, 10)));
        fixture.write_slot(1, &Event::Fill(fill_with_seq(1, 11)));
        // a zeroed slot carries the Fill discriminant, so a never written
        // ring still yields one event per slot
        let queue = EventQueue::deserialize(&fixture.buf).unwrap();
        assert_eq!(queue.events.len(), 8);

        // an out of range discriminator is skipped, not an error
        let bad = QUEUE_HEADER_LEN + 3 * EVENT_SIZE;
        fixture.buf[bad] = 0xff;
        let queue = EventQueue::deserialize(&fixture.buf).unwrap();
        assert_eq!(queue.events.len(), 7);
    }

    #[test]
    fn delta_decode_yields_new_events() {
        let mut fixture = QueueFixture::new(256);
        let (mut head, mut count, mut seq) = (0u64, 0u64, 508683u64);
        fixture.produce_fills(&mut head, &mut count, &mut seq, 3);
        assert_eq!(seq, 508686);

        let queue = EventQueue::deserialize_since(&fixture.buf, 508683).unwrap();
        assert_eq!(queue.events.len(), 3);
        let seqs: Vec<u64> = queue.events.iter().map(|e| e.seq_num()).collect();
        assert_eq!(seqs, vec![508683, 508684, 508685]);
        for event in &queue.events {
            assert!(event.seq_num() < queue.header.seq_num);
        }
        assert_eq!(queue.header.seq_num, 508686);
    }

    #[test]
    fn delta_decode_nothing_new() {
        let mut fixture = QueueFixture::new(8);
        let (mut head, mut count, mut seq) = (0u64, 0u64, 100u64);
        fixture.produce_fills(&mut head, &mut count, &mut seq, 4);

        let queue = EventQueue::deserialize_since(&fixture.buf, seq).unwrap();
        assert!(queue.events.is_empty());
        assert_eq!(queue.header.seq_num, seq);
    }

    #[test]
    fn delta_decode_is_incremental_across_polls() {
        let mut fixture = QueueFixture::new(16);
        let (mut head, mut count, mut seq) = (0u64, 0u64, 0u64);

        fixture.produce_fills(&mut head, &mut count, &mut seq, 5);
        let first = EventQueue::deserialize_since(&fixture.buf, 0).unwrap();
        assert_eq!(first.events.len(), 5);

        fixture.produce_fills(&mut head, &mut count, &mut seq, 4);
        let second = EventQueue::deserialize_since(&fixture.buf, first.header.seq_num).unwrap();
        assert_eq!(second.events.len(), 4);
        let seqs: Vec<u64> = second.events.iter().map(|e| e.seq_num()).collect();
        assert_eq!(seqs, vec![5, 6, 7, 8]);
    }

    #[test]
    fn delta_decode_clamps_to_capacity() {
        // consumer missed far more events than the ring retains: only the
        // newest capacity - 1 are recoverable, the rest dropped silently
        let n = 8u64;
        let mut fixture = QueueFixture::new(n as usize);
        let (mut head, mut count, mut seq) = (0u64, 0u64, 0u64);
        fixture.produce_fills(&mut head, &mut count, &mut seq, 100);

        let queue = EventQueue::deserialize_since(&fixture.buf, 0).unwrap();
        assert_eq!(queue.events.len(), (n - 1) as usize);
        let seqs: Vec<u64> = queue.events.iter().map(|e| e.seq_num()).collect();
        assert_eq!(seqs, (93..100).collect::<Vec<u64>>());
    }

    #[test]
    fn delta_decode_survives_seq_wraparound() {
        let mut fixture = QueueFixture::new(16);
        let (mut head, mut count, mut seq) = (0u64, 0u64, u32::MAX as u64 - 1);
        fixture.produce_fills(&mut head, &mut count, &mut seq, 5);
        assert_eq!(seq, 3); // wrapped past 2^32

        let queue = EventQueue::deserialize_since(&fixture.buf, u32::MAX as u64 - 1).unwrap();
        assert_eq!(queue.events.len(), 5);
        let seqs: Vec<u64> = queue.events.iter().map(|e| e.seq_num()).collect();
        assert_eq!(seqs, vec![u32::MAX as u64 - 1, u32::MAX as u64, 0, 1, 2]);
    }

    #[test]
    fn decode_is_idempotent() {
        let mut fixture = QueueFixture::new(8);
        let (mut head, mut count, mut seq) = (0u64, 0u64, 40u64);
        fixture.produce_fills(&mut head, &mut count, &mut seq, 6);

        let a = EventQueue::deserialize(&fixture.buf).unwrap();
        let b = EventQueue::deserialize(&fixture.buf).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn event_variant_fields_round_trip() {
        let mut out = OutEvent::zeroed();
        out.event_type = EventType::Out.into();
        out.side = 1;
        out.slot = 4;
        out.timestamp = 99;
        out.seq_num = 7;
        out.quantity = 55;

        let bytes = bytemuck::bytes_of(&out);
        let slot = <&[u8; EVENT_SIZE]>::try_from(bytes).unwrap();
        match Event::deserialize(slot).unwrap() {
            Event::Out(decoded) => {
                assert_eq!(decoded, out);
                assert_eq!(decoded.quantity, 55);
            }
            other => panic!("expected out event, got {:?}", other),
        }

        let mut liq = LiquidateEvent::zeroed();
        liq.event_type = EventType::Liquidate.into();
        liq.quantity = -3;
        let bytes = bytemuck::bytes_of(&liq);
        let slot = <&[u8; EVENT_SIZE]>::try_from(bytes).unwrap();
        let event = Event::deserialize(slot).unwrap();
        assert_eq!(event.event_type(), EventType::Liquidate);
        match event {
            Event::Liquidate(decoded) => {
                assert!(decoded.price().is_zero());
                assert_eq!(decoded.quantity, -3);
            }
            other => panic!("expected liquidate event, got {:?}", other),
        }
    }
}
