//! Error types for flashmux.

use std::io;
use thiserror::Error;

use crate::muxer::MuxerState;
use crate::tag::TagCode;

/// Result type for flashmux operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for flashmux operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the output sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bad stream layout or missing codec parameter.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Codec identifier the container cannot carry.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Audio sample rate without a sound-stream rate code.
    #[error("Unsupported sample rate: {0} Hz (choose from 44100, 22050, 11025)")]
    UnsupportedSampleRate(u32),

    /// Audio FIFO or tag length would overflow.
    #[error("Capacity exceeded: need {needed} bytes, capacity {capacity}")]
    CapacityExceeded { needed: usize, capacity: usize },

    /// Buffered audio holds more samples than a SoundStreamBlock can count.
    #[error("Audio sample count {samples} exceeds the 16-bit block field")]
    SampleCountOverflow { samples: u64 },

    /// Geometry record encoding failed.
    ///
    /// An overflow of the fixed bit scratch buffer arrives here as
    /// `Bits(flashmux_bits::Error::CapacityExceeded { .. })`, measured in
    /// bits; [`Error::CapacityExceeded`] is reserved for the audio FIFO and
    /// tag lengths, measured in bytes.
    #[error("Bit packing error: {0}")]
    Bits(#[from] flashmux_bits::Error),

    /// Payload too long for a short tag header.
    #[error("Tag {code} payload of {len} bytes does not fit a short header")]
    ShortTagOverflow { code: TagCode, len: u64 },

    /// A tag was opened while another one is still open.
    #[error("Tag {0} is still open")]
    TagAlreadyOpen(TagCode),

    /// `close_tag` without a matching `open_tag`.
    #[error("No tag is open")]
    NoOpenTag,

    /// Operation not allowed in the current muxer state.
    #[error("Cannot {operation} in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: MuxerState,
    },

    /// `finalize` called twice.
    #[error("Muxer already finalized")]
    AlreadyFinalized,
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an unsupported codec error.
    pub fn unsupported_codec(msg: impl Into<String>) -> Self {
        Self::UnsupportedCodec(msg.into())
    }
}
