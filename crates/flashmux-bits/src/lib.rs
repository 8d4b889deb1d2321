//! flashmux-bits: MSB-first bit packing and the variable-width geometry
//! records used by the SWF container.
//!
//! # Modules
//!
//! - [`packer`] - [`BitPacker`], a bounded MSB-first bit accumulator
//! - [`geometry`] - rectangles, affine matrices and line edges encoded with the
//!   smallest common bit width of each value group
//!
//! # Example
//!
//! ```
//! use flashmux_bits::{encode_rect, Rect};
//!
//! // 320x200 stage in twips
//! let bytes = encode_rect(&Rect::new(0, 320 * 20, 0, 200 * 20)).unwrap();
//! assert_eq!(bytes.len(), 8);
//! ```

pub mod error;
pub mod geometry;
pub mod packer;

pub use error::{Error, Result};
pub use geometry::{
    encode_line_edge, encode_matrix, encode_rect, minimal_bits, minimal_bits_from, Matrix, Rect,
    FRAC_BITS,
};
pub use packer::{BitPacker, SCRATCH_CAPACITY};
