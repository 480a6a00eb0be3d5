//! Critbit slab decoding for the bids and asks accounts.
//!
//! A book side account is a fixed-capacity arena of 88-byte nodes forming a
//! binary trie over order keys. The key packs the price into its upper 64
//! bits and an insertion sequence number into the lower 64, so key order is
//! price-time priority and the key doubles as the order id. Nodes reference
//! each other by slot index, never by pointer, which keeps the decoded
//! snapshot identical to the on-chain bytes.

use crate::error::{PerpBookError, Result};
use crate::state::MetaData;
use bytemuck::{Pod, Zeroable};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use solana_program::pubkey::Pubkey;
use static_assertions::const_assert_eq;
use std::convert::TryFrom;
use std::mem::size_of;

/// Byte size of every slab node
pub const NODE_SIZE: usize = 88;

/// Fixed node capacity of a book side account
pub const MAX_BOOK_NODES: usize = 1024;

/// Index of a node within [`BookSide::nodes`]
pub type NodeHandle = u32;

/// Discriminant stored in the first four bytes of every node slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum NodeTag {
    /// Slot has never been allocated
    Uninitialized = 0,
    #[allow(missing_docs)]
    InnerNode = 1,
    #[allow(missing_docs)]
    LeafNode = 2,
    /// Slot is on the free list
    FreeNode = 3,
    /// Slot terminates the free list
    LastFreeNode = 4,
}

/// Internal trie node referencing two children by slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct InnerNode {
    #[allow(missing_docs)]
    pub tag: u32,
    /// Number of high `key` bits shared by every leaf below this node
    pub prefix_len: u32,
    /// Only the top `prefix_len` bits are meaningful
    pub key: [u8; 16],
    /// Child handles; index 1 holds the subtree whose critbit is set
    pub children: [NodeHandle; 2],
    /// Earliest order expiry below each child
    pub child_expiry: [u64; 2],
    #[allow(missing_docs)]
    pub padding: [u8; NODE_SIZE - 48],
}

impl InnerNode {
    #[allow(missing_docs)]
    pub fn new(prefix_len: u32, key: i128) -> Self {
        Self {
            tag: NodeTag::InnerNode.into(),
            prefix_len,
            key: key.to_le_bytes(),
            children: [0; 2],
            child_expiry: [u64::MAX; 2],
            padding: [0; NODE_SIZE - 48],
        }
    }

    #[allow(missing_docs)]
    #[inline(always)]
    pub fn key(&self) -> i128 {
        i128::from_le_bytes(self.key)
    }

    /// Returns the handle of the child that may contain the search key,
    /// and whether the critbit of the key was set
    pub fn walk_down(&self, search_key: i128) -> (NodeHandle, bool) {
        let crit_bit_mask = 1i128 << (127 - self.prefix_len);
        let crit_bit = (search_key & crit_bit_mask) != 0;
        (self.children[crit_bit as usize], crit_bit)
    }
}

/// A resting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct LeafNode {
    #[allow(missing_docs)]
    pub tag: u32,
    /// The owner account's open order slot this order occupies
    pub owner_slot: u8,
    #[allow(missing_docs)]
    pub order_type: u8,
    #[allow(missing_docs)]
    pub version: u8,
    /// Seconds the order stays valid after `timestamp`, 0 for no expiry
    pub time_in_force: u8,
    /// `price << 64 | sequence`, also the order id
    pub key: [u8; 16],
    /// Margin account that owns the order
    pub owner: [u8; 32],
    /// Remaining quantity in base lots
    pub quantity: i64,
    #[allow(missing_docs)]
    pub client_order_id: u64,
    /// Best book price at the time the order was placed
    pub best_initial: i64,
    /// Unix time the order was placed
    pub timestamp: u64,
}

impl LeafNode {
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_slot: u8,
        key: i128,
        owner: Pubkey,
        quantity: i64,
        client_order_id: u64,
        best_initial: i64,
        timestamp: u64,
    ) -> Self {
        Self {
            tag: NodeTag::LeafNode.into(),
            owner_slot,
            order_type: 0,
            version: 0,
            time_in_force: 0,
            key: key.to_le_bytes(),
            owner: owner.to_bytes(),
            quantity,
            client_order_id,
            best_initial,
            timestamp,
        }
    }

    /// The key, which is also the order id
    #[inline(always)]
    pub fn key(&self) -> i128 {
        i128::from_le_bytes(self.key)
    }

    /// Price in quote lots per base lot, taken from the top 64 key bits
    #[inline(always)]
    pub fn price(&self) -> i64 {
        (self.key() >> 64) as i64
    }

    #[allow(missing_docs)]
    #[inline(always)]
    pub fn owner(&self) -> Pubkey {
        Pubkey::new_from_array(self.owner)
    }
}

/// Unallocated node belonging to the free list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct FreeNode {
    #[allow(missing_docs)]
    pub tag: u32,
    /// Next slot on the free list
    pub next: NodeHandle,
    #[allow(missing_docs)]
    pub padding: [u8; NODE_SIZE - 8],
}

/// An undecoded node slot; dispatch on [`AnyNode::case`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct AnyNode {
    #[allow(missing_docs)]
    pub tag: u32,
    #[allow(missing_docs)]
    pub data: [u8; NODE_SIZE - 4],
}

const_assert_eq!(size_of::<AnyNode>(), size_of::<InnerNode>());
const_assert_eq!(size_of::<AnyNode>(), size_of::<LeafNode>());
const_assert_eq!(size_of::<AnyNode>(), size_of::<FreeNode>());
const_assert_eq!(size_of::<AnyNode>(), NODE_SIZE);

/// A live node, either branch or order
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    #[allow(missing_docs)]
    Inner(&'a InnerNode),
    #[allow(missing_docs)]
    Leaf(&'a LeafNode),
}

impl AnyNode {
    /// Dispatch on the tag. Uninitialized and free slots yield `None`.
    pub fn case(&self) -> Option<NodeRef<'_>> {
        match NodeTag::try_from(self.tag) {
            Ok(NodeTag::InnerNode) => Some(NodeRef::Inner(bytemuck::cast_ref(self))),
            Ok(NodeTag::LeafNode) => Some(NodeRef::Leaf(bytemuck::cast_ref(self))),
            _ => None,
        }
    }

    /// The node's key if it is part of the live tree
    pub fn key(&self) -> Option<i128> {
        match self.case()? {
            NodeRef::Inner(inner) => Some(inner.key()),
            NodeRef::Leaf(leaf) => Some(leaf.key()),
        }
    }

    #[allow(missing_docs)]
    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self.case() {
            Some(NodeRef::Leaf(leaf)) => Some(leaf),
            _ => None,
        }
    }
}

impl AsRef<AnyNode> for InnerNode {
    fn as_ref(&self) -> &AnyNode {
        bytemuck::cast_ref(self)
    }
}

impl AsRef<AnyNode> for LeafNode {
    fn as_ref(&self) -> &AnyNode {
        bytemuck::cast_ref(self)
    }
}

/// One side of the book: slab header plus the fixed node arena.
///
/// Decoded as an immutable snapshot of the account bytes. Every node
/// reachable from `root_node` through [`InnerNode::children`] terminates at a
/// [`LeafNode`]; free list slots are never reachable from the root.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BookSide {
    #[allow(missing_docs)]
    pub meta_data: MetaData,
    /// Number of slots that have ever been allocated
    pub bump_index: u64,
    #[allow(missing_docs)]
    pub free_list_len: u64,
    #[allow(missing_docs)]
    pub free_list_head: NodeHandle,
    /// Handle of the tree root, meaningless while `leaf_count == 0`
    pub root_node: NodeHandle,
    /// Number of live orders
    pub leaf_count: u64,
    #[allow(missing_docs)]
    pub nodes: [AnyNode; MAX_BOOK_NODES],
}

/// Fixed byte size of a book side account
pub const BOOK_SIDE_LEN: usize = size_of::<BookSide>();

const_assert_eq!(BOOK_SIDE_LEN, 40 + MAX_BOOK_NODES * NODE_SIZE);

impl BookSide {
    /// Fixed byte size of a book side account
    pub const LEN: usize = BOOK_SIDE_LEN;

    /// Decode a bids or asks account image.
    ///
    /// The buffer must be exactly [`BookSide::LEN`] bytes; anything else is a
    /// [`PerpBookError::SlabSizeMismatch`]. The copy is unaligned-safe, so
    /// buffers straight out of an RPC response decode without reallocation.
    pub fn deserialize(buf: &[u8]) -> Result<Box<BookSide>> {
        if buf.len() != Self::LEN {
            return Err(PerpBookError::SlabSizeMismatch {
                expected: Self::LEN,
                actual: buf.len(),
            });
        }
        Ok(Box::new(bytemuck::pod_read_unaligned(buf)))
    }

    /// Handle of the root node, `None` when the side holds no orders
    pub fn root(&self) -> Option<NodeHandle> {
        if self.leaf_count == 0 {
            None
        } else {
            Some(self.root_node)
        }
    }

    /// Fetch a live node by handle
    pub fn get(&self, handle: NodeHandle) -> Option<&AnyNode> {
        let node = self.nodes.get(handle as usize)?;
        node.case().map(|_| node)
    }

    fn find_min_max(&self, find_max: bool) -> Option<&LeafNode> {
        let mut current = self.root()?;
        loop {
            match self.get(current)?.case()? {
                NodeRef::Inner(inner) => current = inner.children[find_max as usize],
                NodeRef::Leaf(leaf) => return Some(leaf),
            }
        }
    }

    /// Leaf with the lowest key
    pub fn find_min(&self) -> Option<&LeafNode> {
        self.find_min_max(false)
    }

    /// Leaf with the highest key
    pub fn find_max(&self) -> Option<&LeafNode> {
        self.find_min_max(true)
    }

    /// Key-ordered iterator over all live leaves, ascending or descending
    pub fn iter(&self, ascending: bool) -> BookSideIter<'_> {
        BookSideIter {
            book: self,
            stack: match self.root() {
                Some(root) => vec![root],
                None => vec![],
            },
            ascending,
        }
    }
}

impl std::fmt::Debug for BookSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookSide")
            .field("meta_data", &self.meta_data)
            .field("bump_index", &self.bump_index)
            .field("free_list_len", &self.free_list_len)
            .field("free_list_head", &self.free_list_head)
            .field("root_node", &self.root_node)
            .field("leaf_count", &self.leaf_count)
            .finish()
    }
}

/// Depth-first key-order traversal of a [`BookSide`]
pub struct BookSideIter<'a> {
    book: &'a BookSide,
    stack: Vec<NodeHandle>,
    ascending: bool,
}

impl<'a> Iterator for BookSideIter<'a> {
    type Item = &'a LeafNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            match self.book.get(current).and_then(|n| n.case()) {
                Some(NodeRef::Inner(inner)) => {
                    self.stack.push(inner.children[self.ascending as usize]);
                    self.stack.push(inner.children[!self.ascending as usize]);
                }
                Some(NodeRef::Leaf(leaf)) => return Some(leaf),
                // stale handle, nothing below it to visit
                None => continue,
            }
        }
        None
    }
}

/////////////////////////////////////
// Tests
