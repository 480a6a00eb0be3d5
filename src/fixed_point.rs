//! Signed 128-bit fixed point arithmetic with 48 fractional bits.
//!
//! Every price, fee and funding value in the program's accounts is encoded as
//! an [`I80F48`]: an `i128` whose value is `bits / 2^48`. The type matches the
//! program's 16-byte little-endian two's-complement wire encoding exactly.
//!
//! Multiplication and division rescale by `2^48` through a full 256-bit
//! intermediate, so any product or quotient whose result is representable is
//! computed without overflow. Comparisons and arithmetic always operate on the
//! raw bits; the floating point and decimal conversions are lossy and for
//! presentation only.

use crate::error::{PerpBookError, Result};
use bytemuck::{Pod, Zeroable};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Number of fractional bits
pub const FRAC_BITS: u32 = 48;

const FRAC_MASK: u128 = (1u128 << FRAC_BITS) - 1;
const LOW_64: u128 = (1u128 << 64) - 1;

/// Fixed point number with 80 integer bits and 48 fractional bits
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct I80F48 {
    bits: i128,
}

impl I80F48 {
    /// Serialized size in bytes
    pub const LEN: usize = 16;

    #[allow(missing_docs)]
    pub const ZERO: Self = Self { bits: 0 };
    #[allow(missing_docs)]
    pub const ONE: Self = Self { bits: 1i128 << FRAC_BITS };
    /// Largest representable value
    pub const MAX: Self = Self { bits: i128::MAX };
    /// Smallest representable value
    pub const MIN: Self = Self { bits: i128::MIN };

    /// Reinterpret a raw bit pattern. Any `i128` is a valid value.
    #[inline(always)]
    pub const fn from_bits(bits: i128) -> Self {
        Self { bits }
    }

    #[allow(missing_docs)]
    #[inline(always)]
    pub const fn to_bits(self) -> i128 {
        self.bits
    }

    /// Convert an integer, failing if it does not fit in 80 integer bits
    pub fn from_int(value: i128) -> Result<Self> {
        if value < -(1i128 << 79) || value >= (1i128 << 79) {
            return Err(PerpBookError::FixedPointRange);
        }
        Ok(Self { bits: value << FRAC_BITS })
    }

    /// Convert an `i64`, which always fits
    #[inline(always)]
    pub const fn from_num(value: i64) -> Self {
        Self { bits: (value as i128) << FRAC_BITS }
    }

    /// Decode from exactly 16 little-endian two's-complement bytes
    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        if buf.len() != Self::LEN {
            return Err(PerpBookError::FixedPointLength { actual: buf.len() });
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(buf);
        Ok(Self::from_le_bytes(bytes))
    }

    /// Encode to 16 little-endian two's-complement bytes
    #[inline(always)]
    pub const fn serialize(self) -> [u8; 16] {
        self.to_le_bytes()
    }

    #[allow(missing_docs)]
    #[inline(always)]
    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self { bits: i128::from_le_bytes(bytes) }
    }

    #[allow(missing_docs)]
    #[inline(always)]
    pub const fn to_le_bytes(self) -> [u8; 16] {
        self.bits.to_le_bytes()
    }

    /// Checked addition on the raw bits
    #[inline(always)]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.bits.checked_add(other.bits).map(Self::from_bits)
    }

    /// Checked subtraction on the raw bits
    #[inline(always)]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.bits.checked_sub(other.bits).map(Self::from_bits)
    }

    /// Fixed point multiplication: `(a.bits * b.bits) >> 48` through a 256-bit
    /// intermediate. `None` if the rescaled result does not fit.
    pub fn checked_mul(self, other: Self) -> Option<Self> {
        let negative = (self.bits < 0) != (other.bits < 0);
        let wide = mul_u128(self.bits.unsigned_abs(), other.bits.unsigned_abs());
        let (hi, lo) = shr_u256(wide, FRAC_BITS);
        compose_signed(hi, lo, negative)
    }

    /// Fixed point division: `(a.bits << 48) / b.bits` through a 256-bit
    /// dividend, truncating toward zero. `None` on overflow or zero divisor.
    pub fn checked_div(self, other: Self) -> Option<Self> {
        if other.bits == 0 {
            return None;
        }
        let negative = (self.bits < 0) != (other.bits < 0);
        let a = self.bits.unsigned_abs();
        // a << 48 over 256 bits
        let dividend = (a >> (128 - FRAC_BITS), a << FRAC_BITS);
        let (q_hi, q_lo, _rem) = div_rem_u256(dividend, other.bits.unsigned_abs());
        compose_signed(q_hi, q_lo, negative)
    }

    /// Whole part, truncated toward zero
    pub fn int_part(self) -> i128 {
        let mag = self.bits.unsigned_abs() >> FRAC_BITS;
        if self.bits < 0 {
            -(mag as i128)
        } else {
            mag as i128
        }
    }

    /// Lossy conversion for display and charting. Never feed the result back
    /// into book or balance arithmetic.
    #[inline(always)]
    pub fn to_f64(self) -> f64 {
        self.bits as f64 / (1u64 << FRAC_BITS) as f64
    }

    /// True if the value is exactly zero
    #[inline(always)]
    pub fn is_zero(self) -> bool {
        self.bits == 0
    }
}

/// `u128 * u128 -> u256` as a `(hi, lo)` pair of `u128` words
fn mul_u128(a: u128, b: u128) -> (u128, u128) {
    let (a_hi, a_lo) = (a >> 64, a & LOW_64);
    let (b_hi, b_lo) = (b >> 64, b & LOW_64);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    // the three middle terms cannot carry out of 128 bits
    let mid = (ll >> 64) + (lh & LOW_64) + (hl & LOW_64);
    let lo = (mid << 64) | (ll & LOW_64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// Logical right shift of a `(hi, lo)` 256-bit value, `0 < shift < 128`
fn shr_u256((hi, lo): (u128, u128), shift: u32) -> (u128, u128) {
    ((hi >> shift), (lo >> shift) | (hi << (128 - shift)))
}

/// Restoring long division of a 256-bit value by a nonzero `u128`.
/// Returns `(quotient_hi, quotient_lo, remainder)`.
fn div_rem_u256((n_hi, n_lo): (u128, u128), d: u128) -> (u128, u128, u128) {
    let mut q_hi = 0u128;
    let mut q_lo = 0u128;
    let mut rem = 0u128;
    for i in (0..256).rev() {
        let bit = if i >= 128 {
            (n_hi >> (i - 128)) & 1
        } else {
            (n_lo >> i) & 1
        };
        // rem < d before the shift, so the true shifted value is < 2d and a
        // single conditional subtraction restores the invariant. The carry
        // bit covers the case where the shift exceeds 128 bits.
        let carry = rem >> 127;
        rem = (rem << 1) | bit;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            if i >= 128 {
                q_hi |= 1 << (i - 128);
            } else {
                q_lo |= 1 << i;
            }
        }
    }
    (q_hi, q_lo, rem)
}

/// Reapply a sign to an unsigned 256-bit magnitude, if it fits in `i128`
fn compose_signed(hi: u128, lo: u128, negative: bool) -> Option<I80F48> {
    if hi != 0 {
        return None;
    }
    if negative {
        if lo > (1u128 << 127) {
            return None;
        }
        Some(I80F48::from_bits((lo as i128).wrapping_neg()))
    } else {
        if lo > i128::MAX as u128 {
            return None;
        }
        Some(I80F48::from_bits(lo as i128))
    }
}

// The operator impls use plain i128 arithmetic for addition and subtraction:
// overflow panics in debug builds and wraps two's-complement in release, the
// standard Rust integer convention. Use the checked variants where an
// overflowing input is reachable.

impl Add for I80F48 {
    type Output = Self;
    #[inline(always)]
    fn add(self, other: Self) -> Self {
        Self::from_bits(self.bits + other.bits)
    }
}

impl Sub for I80F48 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, other: Self) -> Self {
        Self::from_bits(self.bits - other.bits)
    }
}

impl Mul for I80F48 {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        match self.checked_mul(other) {
            Some(v) => v,
            None => panic!("I80F48 multiplication overflow"),
        }
    }
}

impl Div for I80F48 {
    type Output = Self;
    fn div(self, other: Self) -> Self {
        match self.checked_div(other) {
            Some(v) => v,
            None => panic!("I80F48 division overflow or division by zero"),
        }
    }
}

impl Neg for I80F48 {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self {
        Self::from_bits(-self.bits)
    }
}

impl From<i64> for I80F48 {
    fn from(value: i64) -> Self {
        Self::from_num(value)
    }
}

impl fmt::Display for I80F48 {
    /// Exact decimal expansion. The fractional part of any value terminates
    /// within 48 decimal digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mag = self.bits.unsigned_abs();
        if self.bits < 0 {
            write!(f, "-")?;
        }
        write!(f, "{}", mag >> FRAC_BITS)?;
        let mut frac = mag & FRAC_MASK;
        if frac != 0 {
            write!(f, ".")?;
            while frac != 0 {
                frac *= 10;
                write!(f, "{}", frac >> FRAC_BITS)?;
                frac &= FRAC_MASK;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for I80F48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I80F48({})", self)
    }
}

/////////////////////////////////////
// Tests
