//! Error types for flashmux-bits.

use std::io;
use thiserror::Error;

/// Result type for bit packing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for bit packing operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The record would not fit in the fixed scratch buffer.
    #[error("bit scratch buffer exhausted: need {needed_bits} bits, capacity {capacity_bits}")]
    CapacityExceeded { needed_bits: u64, capacity_bits: u64 },

    /// A single field wider than 32 bits was requested.
    #[error("invalid field width: {0} bits (max 32)")]
    InvalidWidth(u32),

    /// A computed value width does not fit in its width field.
    #[error("value width {width} does not fit in a {field_bits}-bit width field")]
    WidthOverflow { width: u32, field_bits: u32 },

    /// I/O error from the underlying bit writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
