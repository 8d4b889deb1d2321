//! flashmux: a streaming SWF/AVM2 muxer.
//!
//! Interleaves one already-encoded video stream (Sorenson Spark, VP6 or
//! MJPEG) and one MP3 audio stream into a Flash movie.
//!
//! # Modules
//!
//! - [`sink`] - output abstraction, seekable and stream-only
//! - [`tag`] - tag codes and the two-phase tag framer
//! - [`codec`] - which tags and header bits each codec needs
//! - [`config`] - muxer configuration and validated stream descriptors
//! - [`fifo`] - bounded audio buffer between frame boundaries
//! - [`muxer`] - header, frame and trailer writing
//!
//! Bit-level records (RECT, MATRIX, shape edges) live in the
//! `flashmux-bits` crate.
//!
//! # Example
//!
//! ```
//! use flashmux::{Muxer, MuxerConfig, OutputFormat, SeekableSink};
//! use std::io::Cursor;
//!
//! let config = MuxerConfig::new(OutputFormat::Swf).video("flv1", 320, 240, 25, 1);
//! let sink = SeekableSink::new(Cursor::new(Vec::new())).unwrap();
//!
//! let mut muxer = Muxer::open(sink, &config).unwrap();
//! muxer.push_video_frame(&[0u8; 64]).unwrap();
//! muxer.finalize().unwrap();
//!
//! let bytes = muxer.into_sink().into_inner().into_inner();
//! assert_eq!(&bytes[..3], b"FWS");
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod fifo;
pub mod muxer;
pub mod shape;
pub mod sink;
pub mod tag;

pub use codec::{AudioCodec, OutputFormat, VideoCodec, VideoLayout};
pub use config::{MuxerConfig, StreamConfig, StreamDescriptors};
pub use error::{Error, Result};
pub use fifo::{AudioFifo, AUDIO_FIFO_CAPACITY, MAX_BLOCK_SAMPLES};
pub use muxer::{Muxer, MuxerState, Packet};
pub use sink::{SeekableSink, Sink, StreamSink};
pub use tag::{OpenTag, TagCode, TagFramer};
