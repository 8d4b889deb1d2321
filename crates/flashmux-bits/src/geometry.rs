//! Variable-width geometry records: RECT, MATRIX and straight shape edges.
//!
//! Each record stores its values in the smallest common field width of the
//! group they belong to, preceded by that width. Widths come from
//! [`minimal_bits_from`], which reproduces the player's own width-growth rule:
//! a non-zero value `v` needs `1 + bit_length(|v|)` bits, zero needs none.

use crate::error::{Error, Result};
use crate::packer::BitPacker;

/// Fractional bits of a fixed-point matrix coefficient (16.16).
pub const FRAC_BITS: u32 = 16;

const NBITS_FIELD: u32 = 5;
const EDGE_NBITS_FIELD: u32 = 4;
const EDGE_NBITS_SEED: u32 = 2;

/// Smallest field width holding every value, starting from zero.
pub fn minimal_bits(values: &[i32]) -> u32 {
    minimal_bits_from(0, values)
}

/// Smallest field width holding every value, never below `seed`.
pub fn minimal_bits_from(seed: u32, values: &[i32]) -> u32 {
    values
        .iter()
        .filter(|v| **v != 0)
        .map(|v| 1 + (u32::BITS - v.unsigned_abs().leading_zeros()))
        .fold(seed, u32::max)
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub xmin: i32,
    pub xmax: i32,
    pub ymin: i32,
    pub ymax: i32,
}

impl Rect {
    pub fn new(xmin: i32, xmax: i32, ymin: i32, ymax: i32) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }
}

/// 2D affine transform in 16.16 fixed point.
///
/// Maps `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matrix {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
    pub tx: i32,
    pub ty: i32,
}

impl Matrix {
    pub const IDENTITY: Self = Self::scale(1 << FRAC_BITS);

    /// Uniform scale with no skew or translation.
    pub const fn scale(factor: i32) -> Self {
        Self {
            a: factor,
            b: 0,
            c: 0,
            d: factor,
            tx: 0,
            ty: 0,
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Encode a RECT record: 5-bit width, then xmin, xmax, ymin, ymax.
pub fn encode_rect(rect: &Rect) -> Result<Vec<u8>> {
    let values = [rect.xmin, rect.xmax, rect.ymin, rect.ymax];
    let nbits = minimal_bits(&values);
    check_width_field(nbits, NBITS_FIELD)?;

    let mut packer = BitPacker::new();
    packer.put_bits(NBITS_FIELD, nbits as i32)?;
    for value in values {
        packer.put_bits(nbits, value)?;
    }
    packer.flush()
}

/// Encode a MATRIX record.
///
/// Scale and skew are always flagged present. The skew pair is stored `c`
/// first, then `b`, and translation has no presence flag.
pub fn encode_matrix(matrix: &Matrix) -> Result<Vec<u8>> {
    let mut packer = BitPacker::new();

    packer.put_flag(true)?;
    put_pair(&mut packer, matrix.a, matrix.d)?;

    packer.put_flag(true)?;
    put_pair(&mut packer, matrix.c, matrix.b)?;

    put_pair(&mut packer, matrix.tx, matrix.ty)?;

    packer.flush()
}

fn put_pair(packer: &mut BitPacker, first: i32, second: i32) -> Result<()> {
    let nbits = minimal_bits_from(1, &[first, second]);
    check_width_field(nbits, NBITS_FIELD)?;
    packer.put_bits(NBITS_FIELD, nbits as i32)?;
    packer.put_bits(nbits, first)?;
    packer.put_bits(nbits, second)
}

/// Append a straight edge record to a shape being packed.
///
/// Horizontal and vertical edges store a single delta; any other edge is a
/// general line carrying both.
pub fn encode_line_edge(packer: &mut BitPacker, dx: i32, dy: i32) -> Result<()> {
    let nbits = minimal_bits_from(EDGE_NBITS_SEED, &[dx, dy]);
    check_width_field(nbits - EDGE_NBITS_SEED, EDGE_NBITS_FIELD)?;

    packer.put_flag(true)?; // edge
    packer.put_flag(true)?; // straight
    packer.put_bits(EDGE_NBITS_FIELD, (nbits - EDGE_NBITS_SEED) as i32)?;
    if dx == 0 {
        packer.put_flag(false)?;
        packer.put_flag(true)?;
        packer.put_bits(nbits, dy)
    } else if dy == 0 {
        packer.put_flag(false)?;
        packer.put_flag(false)?;
        packer.put_bits(nbits, dx)
    } else {
        packer.put_flag(true)?;
        packer.put_bits(nbits, dx)?;
        packer.put_bits(nbits, dy)
    }
}

fn check_width_field(width: u32, field_bits: u32) -> Result<()> {
    if width >= 1 << field_bits {
        return Err(Error::WidthOverflow { width, field_bits });
    }
    Ok(())
}
