//! Bit vector over 8-bit words, little-endian within the word.
//!
//! Used by the column-split partition path to exchange per-row decision and
//! missing bits across workers. The byte layout is the wire format of the
//! all-reduce exchange, so it is fixed: bit `i` lives in byte `i / 8` at
//! bit position `i % 8`.

/// A growable bit vector stored in 8-bit words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitField {
    bits: Vec<u8>,
    n_bits: usize,
}

impl BitField {
    /// Number of storage bytes needed for `n_bits` bits.
    #[inline]
    pub fn compute_storage_size(n_bits: usize) -> usize {
        n_bits.div_ceil(8)
    }

    /// Creates a zeroed bit field holding `n_bits` bits.
    pub fn with_size(n_bits: usize) -> Self {
        BitField {
            bits: vec![0u8; Self::compute_storage_size(n_bits)],
            n_bits,
        }
    }

    /// Number of addressable bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_bits
    }

    /// True when the field holds no bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_bits == 0
    }

    /// Sets bit `i`.
    #[inline]
    pub fn set(&mut self, i: usize) {
        set_bit(&mut self.bits, i);
    }

    /// Reads bit `i`.
    #[inline]
    pub fn check(&self, i: usize) -> bool {
        check_bit(&self.bits, i)
    }

    /// Zeroes every bit.
    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    /// Raw storage bytes, e.g. for an all-reduce exchange.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.bits
    }

    /// Mutable raw storage bytes.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bits
    }

    /// ORs another field of the same size into this one.
    pub fn or_assign(&mut self, other: &[u8]) {
        assert_eq!(self.bits.len(), other.len());
        for (dst, src) in self.bits.iter_mut().zip(other.iter()) {
            *dst |= *src;
        }
    }
}

/// Sets bit `i` in a raw byte slice.
#[inline]
pub fn set_bit(words: &mut [u8], i: usize) {
    words[i / 8] |= 1u8 << (i % 8);
}

/// Reads bit `i` from a raw byte slice.
#[inline]
pub fn check_bit(words: &[u8], i: usize) -> bool {
    (words[i / 8] >> (i % 8)) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_size() {
        assert_eq!(BitField::compute_storage_size(0), 0);
        assert_eq!(BitField::compute_storage_size(1), 1);
        assert_eq!(BitField::compute_storage_size(8), 1);
        assert_eq!(BitField::compute_storage_size(9), 2);
    }

    #[test]
    fn test_set_check_little_endian() {
        let mut bf = BitField::with_size(16);
        bf.set(0);
        bf.set(9);
        assert!(bf.check(0));
        assert!(!bf.check(1));
        assert!(bf.check(9));
        // bit 0 -> lowest bit of byte 0, bit 9 -> second bit of byte 1
        assert_eq!(bf.data(), &[0b0000_0001, 0b0000_0010]);
    }

    #[test]
    fn test_or_assign() {
        let mut a = BitField::with_size(8);
        let mut b = BitField::with_size(8);
        a.set(1);
        b.set(6);
        a.or_assign(b.data());
        assert!(a.check(1));
        assert!(a.check(6));
    }
}
