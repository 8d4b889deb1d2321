//! Bounded MSB-first bit accumulator.
//!
//! Every geometry record is packed into a fresh [`BitPacker`], flushed to
//! bytes, and then written to the output in one piece. The packer never grows
//! beyond [`SCRATCH_CAPACITY`] bytes; a record that would need more fails with
//! [`Error::CapacityExceeded`] and must be split by the caller.

use bitstream_io::{BigEndian, BitWrite, BitWriter};

use crate::error::{Error, Result};

/// Size of the per-record scratch buffer in bytes.
pub const SCRATCH_CAPACITY: usize = 256;

const SCRATCH_BITS: u64 = SCRATCH_CAPACITY as u64 * 8;

/// Accumulates fields of 0 to 32 bits, most significant bit first.
pub struct BitPacker {
    writer: BitWriter<Vec<u8>, BigEndian>,
    bits: u64,
}

impl BitPacker {
    /// Create an empty packer.
    pub fn new() -> Self {
        Self {
            writer: BitWriter::endian(Vec::with_capacity(SCRATCH_CAPACITY), BigEndian),
            bits: 0,
        }
    }

    /// Append the low `width` bits of `value`.
    ///
    /// Negative values are truncated to their two's-complement low bits.
    /// A zero width writes nothing. On error the packer is left unchanged.
    pub fn put_bits(&mut self, width: u32, value: i32) -> Result<()> {
        if width > 32 {
            return Err(Error::InvalidWidth(width));
        }
        if width == 0 {
            return Ok(());
        }

        let needed = self.bits + u64::from(width);
        if needed > SCRATCH_BITS {
            return Err(Error::CapacityExceeded {
                needed_bits: needed,
                capacity_bits: SCRATCH_BITS,
            });
        }

        self.writer.write(width, (value as u32) & low_mask(width))?;
        self.bits = needed;
        Ok(())
    }

    /// Append a single flag bit.
    pub fn put_flag(&mut self, set: bool) -> Result<()> {
        self.put_bits(1, i32::from(set))
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> u64 {
        self.bits
    }

    /// Number of bytes [`flush`](Self::flush) will return.
    pub fn byte_len(&self) -> usize {
        self.bits.div_ceil(8) as usize
    }

    /// Pad the last byte with zero bits and return the packed bytes.
    pub fn flush(mut self) -> Result<Vec<u8>> {
        self.writer.byte_align()?;
        Ok(self.writer.into_writer())
    }
}

impl Default for BitPacker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BitPacker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitPacker").field("bits", &self.bits).finish()
    }
}

fn low_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_flush() {
        let packer = BitPacker::new();
        assert_eq!(packer.byte_len(), 0);
        assert!(packer.flush().unwrap().is_empty());
    }

    #[test]
    fn test_msb_first_with_zero_padding() {
        let mut packer = BitPacker::new();
        packer.put_bits(3, 0b101).unwrap();
        assert_eq!(packer.bit_len(), 3);
        assert_eq!(packer.flush().unwrap(), vec![0b1010_0000]);
    }

    #[test]
    fn test_fields_cross_byte_boundary() {
        let mut packer = BitPacker::new();
        packer.put_bits(5, 0b11111).unwrap();
        packer.put_bits(6, 0b000001).unwrap();
        assert_eq!(packer.byte_len(), 2);
        assert_eq!(packer.flush().unwrap(), vec![0b1111_1000, 0b0010_0000]);
    }

    #[test]
    fn test_negative_values_truncate_to_low_bits() {
        let mut packer = BitPacker::new();
        packer.put_bits(4, -1).unwrap();
        packer.put_bits(4, -8).unwrap();
        assert_eq!(packer.flush().unwrap(), vec![0xF8]);
    }

    #[test]
    fn test_zero_width_writes_nothing() {
        let mut packer = BitPacker::new();
        packer.put_bits(0, 12345).unwrap();
        assert_eq!(packer.bit_len(), 0);
        packer.put_flag(true).unwrap();
        assert_eq!(packer.flush().unwrap(), vec![0x80]);
    }

    #[test]
    fn test_full_width_field() {
        let mut packer = BitPacker::new();
        packer.put_bits(32, -2).unwrap();
        assert_eq!(packer.flush().unwrap(), vec![0xFF, 0xFF, 0xFF, 0xFE]);
    }

    #[test]
    fn test_width_over_32_rejected() {
        let mut packer = BitPacker::new();
        assert!(matches!(
            packer.put_bits(33, 0),
            Err(Error::InvalidWidth(33))
        ));
    }

    #[test]
    fn test_capacity_exceeded_leaves_packer_untouched() {
        let mut packer = BitPacker::new();
        for _ in 0..SCRATCH_CAPACITY / 4 {
            packer.put_bits(32, 0x5555_5555).unwrap();
        }
        assert_eq!(packer.bit_len(), SCRATCH_BITS);

        let err = packer.put_bits(1, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                needed_bits,
                capacity_bits
            } if needed_bits == SCRATCH_BITS + 1 && capacity_bits == SCRATCH_BITS
        ));
        assert_eq!(packer.bit_len(), SCRATCH_BITS);
        assert_eq!(packer.flush().unwrap().len(), SCRATCH_CAPACITY);
    }
}
