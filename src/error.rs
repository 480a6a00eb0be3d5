use thiserror::Error;

/// Errors surfaced by the decoding layer.
///
/// All of these are fatal for the decode call that produced them: no partial
/// structure is ever returned. Insufficient book depth and dropped event
/// history are *not* errors, they are documented sentinel values (see
/// [`crate::state::orderbook::OrderBookSide::impact_price`] and
/// [`crate::state::event_queue::EventQueue::deserialize_since`]).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PerpBookError {
    /// The bids or asks account buffer does not have the fixed slab size
    #[error("slab account size mismatch: expected {expected}, got {actual}")]
    SlabSizeMismatch {
        #[allow(missing_docs)]
        expected: usize,
        #[allow(missing_docs)]
        actual: usize,
    },
    /// The event queue buffer is too short or not slot-aligned
    #[error("event queue account size invalid: {len}")]
    EventQueueSizeMismatch {
        #[allow(missing_docs)]
        len: usize,
    },
    /// A fixed point value must be decoded from exactly 16 bytes
    #[error("fixed point value must be 16 bytes, got {actual}")]
    FixedPointLength {
        #[allow(missing_docs)]
        actual: usize,
    },
    /// The integer does not fit in the 80 integer bits of the fixed point type
    #[error("integer out of range for I80F48")]
    FixedPointRange,
}

#[allow(missing_docs)]
pub type Result<T> = std::result::Result<T, PerpBookError>;
