//! Bounded FIFO for encoded audio awaiting the next frame boundary.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Default FIFO size in bytes.
pub const AUDIO_FIFO_CAPACITY: usize = 64 * 1024;

/// Most samples one SoundStreamBlock can declare.
pub const MAX_BLOCK_SAMPLES: u16 = u16::MAX;

/// Encoded audio buffered between two SoundStreamBlock tags.
#[derive(Debug)]
pub struct AudioFifo {
    buf: BytesMut,
    capacity: usize,
    pending_samples: u32,
}

impl AudioFifo {
    pub fn new() -> Self {
        Self::with_capacity(AUDIO_FIFO_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            pending_samples: 0,
        }
    }

    /// Append one encoded packet.
    ///
    /// Fails without touching the buffer if the packet does not fit, either
    /// in bytes or in the 16-bit sample count of a SoundStreamBlock.
    pub fn push(&mut self, data: &[u8], samples: u32) -> Result<()> {
        let needed = self.buf.len() + data.len();
        if needed > self.capacity {
            return Err(Error::CapacityExceeded {
                needed,
                capacity: self.capacity,
            });
        }
        let total = u64::from(self.pending_samples) + u64::from(samples);
        if total > u64::from(MAX_BLOCK_SAMPLES) {
            return Err(Error::SampleCountOverflow { samples: total });
        }
        self.buf.put_slice(data);
        self.pending_samples = total as u32;
        Ok(())
    }

    /// Take everything buffered, resetting the sample count.
    pub fn take(&mut self) -> Option<(Bytes, u32)> {
        if self.buf.is_empty() {
            return None;
        }
        let samples = std::mem::take(&mut self.pending_samples);
        Some((self.buf.split().freeze(), samples))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples accumulated since the last [`take`](Self::take).
    pub fn pending_samples(&self) -> u32 {
        self.pending_samples
    }
}

impl Default for AudioFifo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_take() {
        let mut fifo = AudioFifo::new();
        assert!(fifo.take().is_none());

        fifo.push(&[1, 2, 3], 1152).unwrap();
        fifo.push(&[4, 5], 1152).unwrap();
        assert_eq!(fifo.len(), 5);
        assert_eq!(fifo.pending_samples(), 2304);

        let (data, samples) = fifo.take().unwrap();
        assert_eq!(&data[..], &[1, 2, 3, 4, 5]);
        assert_eq!(samples, 2304);
        assert!(fifo.is_empty());
        assert_eq!(fifo.pending_samples(), 0);
    }

    #[test]
    fn test_fill_to_exact_capacity() {
        let mut fifo = AudioFifo::with_capacity(8);
        fifo.push(&[0; 5], 10).unwrap();
        fifo.push(&[0; 3], 10).unwrap();
        assert_eq!(fifo.len(), fifo.capacity());
    }

    #[test]
    fn test_overflow_leaves_contents_unchanged() {
        let mut fifo = AudioFifo::with_capacity(8);
        fifo.push(&[9; 6], 576).unwrap();

        let err = fifo.push(&[7; 3], 576).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                needed: 9,
                capacity: 8
            }
        ));
        assert_eq!(fifo.len(), 6);
        assert_eq!(fifo.pending_samples(), 576);

        let (data, _) = fifo.take().unwrap();
        assert_eq!(&data[..], &[9; 6]);
    }

    #[test]
    fn test_sample_count_overflow_leaves_contents_unchanged() {
        let mut fifo = AudioFifo::new();
        fifo.push(&[1; 10], 60_000).unwrap();

        let err = fifo.push(&[2; 10], 6_000).unwrap_err();
        assert!(matches!(err, Error::SampleCountOverflow { samples: 66_000 }));
        assert_eq!(fifo.len(), 10);
        assert_eq!(fifo.pending_samples(), 60_000);

        fifo.push(&[3; 10], 5_535).unwrap();
        assert_eq!(fifo.pending_samples(), u32::from(MAX_BLOCK_SAMPLES));
    }

    #[test]
    fn test_default_capacity() {
        let fifo = AudioFifo::default();
        assert_eq!(fifo.capacity(), 65536);
    }
}
