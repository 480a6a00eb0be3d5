//! On-chain account layouts and their decoders.
//!
//! Every struct in this module tree mirrors a frozen wire format: field order,
//! widths and padding all match the program's in-memory representation, and
//! each size is pinned with a const assertion. Decoding copies the account
//! bytes into an owned snapshot, so the input buffer's alignment never
//! matters and the decoded value is immutable plain data.

use bytemuck::{Pod, Zeroable};
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub mod critbit;
pub mod event_queue;
pub mod orderbook;

/// Account discriminants used by the decoding layer.
///
/// The values are assigned by the on-chain program and shared across all of
/// its account types; only the ones this layer decodes are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataType {
    #[allow(missing_docs)]
    Bids = 5,
    #[allow(missing_docs)]
    Asks = 6,
    #[allow(missing_docs)]
    EventQueue = 8,
}

/// Eight byte account header common to all program accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct MetaData {
    /// Raw [`DataType`] discriminant
    pub data_type: u8,
    #[allow(missing_docs)]
    pub version: u8,
    /// Nonzero once the program has initialized the account
    pub is_initialized: u8,
    #[allow(missing_docs)]
    pub extra_info: [u8; 5],
}

impl MetaData {
    /// Parse the account discriminant, `None` for tags this layer does not decode
    pub fn data_type(&self) -> Option<DataType> {
        DataType::try_from_primitive(self.data_type).ok()
    }
}

/// Side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Side {
    #[allow(missing_docs)]
    Bid = 0,
    #[allow(missing_docs)]
    Ask = 1,
}

impl Side {
    #[allow(missing_docs)]
    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}
