//! Shared helpers for integration tests: a minimal reader for the movies the
//! muxer writes.

#![allow(dead_code)]

use bitstream_io::{BigEndian, BitRead, BitReader};

/// One tag record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub code: u16,
    pub long: bool,
    pub payload: Vec<u8>,
}

/// A parsed movie.
#[derive(Debug)]
pub struct Movie {
    pub version: u8,
    pub file_size: u32,
    pub bounds: [i32; 4],
    pub frame_rate: u16,
    pub frame_count: u16,
    pub tags: Vec<Tag>,
}

impl Movie {
    pub fn codes(&self) -> Vec<u16> {
        self.tags.iter().map(|t| t.code).collect()
    }

    pub fn tags_with(&self, code: u16) -> Vec<&Tag> {
        self.tags.iter().filter(|t| t.code == code).collect()
    }
}

/// Parse the header and every tag of `bytes`.
pub fn parse_movie(bytes: &[u8]) -> Movie {
    assert_eq!(&bytes[0..3], b"FWS", "signature");
    let version = bytes[3];
    let file_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());

    let mut r = BitReader::endian(&bytes[8..], BigEndian);
    let nbits: u32 = r.read(5).unwrap();
    let mut bounds = [0i32; 4];
    for b in &mut bounds {
        *b = read_signed(&mut r, nbits);
    }
    let rect_len = (5 + 4 * nbits as usize).div_ceil(8);

    let mut pos = 8 + rect_len;
    let frame_rate = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]);
    let frame_count = u16::from_le_bytes([bytes[pos + 2], bytes[pos + 3]]);
    pos += 4;

    let mut tags = Vec::new();
    while pos < bytes.len() {
        let header = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]);
        pos += 2;
        let code = header >> 6;
        let mut len = usize::from(header & 0x3F);
        let long = len == 0x3F;
        if long {
            len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
        }
        tags.push(Tag {
            code,
            long,
            payload: bytes[pos..pos + len].to_vec(),
        });
        pos += len;
    }
    assert_eq!(pos, bytes.len(), "trailing bytes after last tag");

    Movie {
        version,
        file_size,
        bounds,
        frame_rate,
        frame_count,
        tags,
    }
}

/// Read an `nbits`-wide two's-complement field.
pub fn read_signed<R: std::io::Read>(r: &mut BitReader<R, BigEndian>, nbits: u32) -> i32 {
    if nbits == 0 {
        return 0;
    }
    let raw: u32 = r.read(nbits).unwrap();
    let shift = 32 - nbits;
    ((raw << shift) as i32) >> shift
}

pub fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flashmux=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
