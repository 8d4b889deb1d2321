//! Tag codes and the two-phase tag framer.
//!
//! Every record after the file header is a tag: a little-endian `u16` holding
//! `code << 6 | length`, where a length of `0x3F` announces a following `u32`
//! length. Tag lengths are only known once the payload has been written, so
//! [`TagFramer::open_tag`] reserves the header and [`TagFramer::close_tag`]
//! seeks back and fills it in. `close_tag` and [`TagFramer::patch`] are the
//! only places the sink is ever moved backwards, and both restore the end
//! position before returning.
//!
//! On a sink that cannot seek, the open tag's payload is staged in memory and
//! written after its finished header on close, producing identical bytes.

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::error::{Error, Result};
use crate::sink::Sink;

/// Largest payload length a short tag header accepts.
///
/// A length of exactly `0x3F` collides with the long-form marker, so readers
/// will take such a tag as long form. Payloads that may reach 63 bytes should
/// be opened long form; the muxer's own short tags stay well below that.
pub const SHORT_TAG_MAX_LEN: u64 = 0x3F;

const SHORT_HEADER_LEN: u64 = 2;
const LONG_HEADER_LEN: u64 = 6;
const LONG_LENGTH_MARKER: u16 = 0x3F;

/// Tag type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagCode(pub u16);

impl TagCode {
    pub const END: Self = Self(0);
    pub const SHOW_FRAME: Self = Self(1);
    pub const DEFINE_SHAPE: Self = Self(2);
    pub const FREE_CHARACTER: Self = Self(3);
    pub const PLACE_OBJECT: Self = Self(4);
    pub const REMOVE_OBJECT: Self = Self(5);
    pub const SOUND_STREAM_BLOCK: Self = Self(19);
    pub const DEFINE_BITS_JPEG2: Self = Self(21);
    pub const PLACE_OBJECT2: Self = Self(26);
    pub const SOUND_STREAM_HEAD2: Self = Self(45);
    pub const DEFINE_VIDEO_STREAM: Self = Self(60);
    pub const VIDEO_FRAME: Self = Self(61);
    pub const FILE_ATTRIBUTES: Self = Self(69);

    /// Human-readable tag name.
    pub fn name(&self) -> &'static str {
        match *self {
            Self::END => "End",
            Self::SHOW_FRAME => "ShowFrame",
            Self::DEFINE_SHAPE => "DefineShape",
            Self::FREE_CHARACTER => "FreeCharacter",
            Self::PLACE_OBJECT => "PlaceObject",
            Self::REMOVE_OBJECT => "RemoveObject",
            Self::SOUND_STREAM_BLOCK => "SoundStreamBlock",
            Self::DEFINE_BITS_JPEG2 => "DefineBitsJPEG2",
            Self::PLACE_OBJECT2 => "PlaceObject2",
            Self::SOUND_STREAM_HEAD2 => "SoundStreamHead2",
            Self::DEFINE_VIDEO_STREAM => "DefineVideoStream",
            Self::VIDEO_FRAME => "VideoFrame",
            Self::FILE_ATTRIBUTES => "FileAttributes",
            _ => "Unknown",
        }
    }
}

impl std::fmt::Display for TagCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// A tag whose header has been reserved but not yet written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenTag {
    /// Sink offset of the reserved header.
    pub start_offset: u64,
    /// Tag type.
    pub code: TagCode,
    /// Whether the 6-byte header with a 32-bit length was reserved.
    pub long_form: bool,
}

impl OpenTag {
    /// Size of the reserved header.
    pub fn header_len(&self) -> u64 {
        if self.long_form {
            LONG_HEADER_LEN
        } else {
            SHORT_HEADER_LEN
        }
    }

    fn encode_header(&self, payload_len: u64) -> Result<Vec<u8>> {
        let mut header = Vec::with_capacity(self.header_len() as usize);
        if self.long_form {
            // The u32 length does not count its own four bytes.
            let len = u32::try_from(payload_len).map_err(|_| Error::CapacityExceeded {
                needed: payload_len as usize,
                capacity: u32::MAX as usize,
            })?;
            header.put_u16_le((self.code.0 << 6) | LONG_LENGTH_MARKER);
            header.put_u32_le(len);
        } else {
            if payload_len > SHORT_TAG_MAX_LEN {
                return Err(Error::ShortTagOverflow {
                    code: self.code,
                    len: payload_len,
                });
            }
            header.put_u16_le((self.code.0 << 6) | payload_len as u16);
        }
        Ok(header)
    }
}

/// Writes tag-framed records to a [`Sink`].
#[derive(Debug)]
pub struct TagFramer<S> {
    sink: S,
    open: Option<OpenTag>,
    staging: BytesMut,
}

impl<S: Sink> TagFramer<S> {
    /// Frame tags onto `sink`, starting at its current position.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            open: None,
            staging: BytesMut::new(),
        }
    }

    /// Logical write position, counting any staged bytes.
    pub fn position(&self) -> u64 {
        match &self.open {
            Some(tag) if !self.sink.is_seekable() => {
                self.sink.position() + tag.header_len() + self.staging.len() as u64
            }
            _ => self.sink.position(),
        }
    }

    /// Whether headers are backpatched in place rather than staged.
    pub fn is_seekable(&self) -> bool {
        self.sink.is_seekable()
    }

    /// The tag currently open, if any.
    pub fn open(&self) -> Option<&OpenTag> {
        self.open.as_ref()
    }

    /// The wrapped sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Give back the sink. A tag still open is dropped.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Reserve a tag header at the current position.
    ///
    /// With `long_form` false the payload must stay within
    /// [`SHORT_TAG_MAX_LEN`]; a 63-byte short payload is accepted but its
    /// length field reads as the long-form marker.
    pub fn open_tag(&mut self, code: TagCode, long_form: bool) -> Result<OpenTag> {
        if let Some(open) = &self.open {
            return Err(Error::TagAlreadyOpen(open.code));
        }

        let tag = OpenTag {
            start_offset: self.sink.position(),
            code,
            long_form,
        };
        if self.sink.is_seekable() {
            let placeholder = [0u8; LONG_HEADER_LEN as usize];
            self.sink
                .write_all(&placeholder[..tag.header_len() as usize])?;
        } else {
            self.staging.clear();
        }
        self.open = Some(tag);
        Ok(tag)
    }

    /// Finish the open tag, returning its payload length.
    ///
    /// A short tag whose payload exceeds [`SHORT_TAG_MAX_LEN`] fails with
    /// [`Error::ShortTagOverflow`]; the tag is closed either way.
    pub fn close_tag(&mut self) -> Result<u64> {
        let tag = self.open.take().ok_or(Error::NoOpenTag)?;

        if !self.sink.is_seekable() {
            let payload_len = self.staging.len() as u64;
            let header = tag.encode_header(payload_len);
            let staged = self.staging.split();
            let header = header?;
            self.sink.write_all(&header)?;
            self.sink.write_all(&staged)?;
            debug!(tag = %tag.code, payload_len, "closed staged tag");
            return Ok(payload_len);
        }

        let end = self.sink.position();
        let payload_len = end - tag.start_offset - tag.header_len();
        let header = tag.encode_header(payload_len)?;
        self.sink.seek(tag.start_offset)?;
        self.sink.write_all(&header)?;
        self.sink.seek(end)?;
        debug!(tag = %tag.code, payload_len, offset = tag.start_offset, "closed tag");
        Ok(payload_len)
    }

    /// Drop the open tag without finishing it.
    ///
    /// Staged bytes are discarded; on a seekable sink the reserved header
    /// stays zeroed.
    pub fn abandon_tag(&mut self) {
        if let Some(tag) = self.open.take() {
            debug!(tag = %tag.code, "abandoned tag");
            self.staging.clear();
        }
    }

    /// Open a tag, run `body` to write its payload, then close it.
    ///
    /// If `body` fails the tag is abandoned, so no tag stays open.
    pub fn with_tag<F>(&mut self, code: TagCode, long_form: bool, body: F) -> Result<u64>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.open_tag(code, long_form)?;
        if let Err(e) = body(self) {
            self.abandon_tag();
            return Err(e);
        }
        self.close_tag()
    }

    /// Write a tag with no payload.
    pub fn empty_tag(&mut self, code: TagCode) -> Result<()> {
        self.with_tag(code, false, |_| Ok(()))?;
        Ok(())
    }

    /// Append payload bytes, staging them while a tag is open on a
    /// non-seekable sink.
    pub fn put_slice(&mut self, buf: &[u8]) -> Result<()> {
        if self.open.is_some() && !self.sink.is_seekable() {
            self.staging.put_slice(buf);
            return Ok(());
        }
        self.sink.write_all(buf)?;
        Ok(())
    }

    /// Append one byte.
    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put_slice(&[value])
    }

    /// Append a little-endian `u16`.
    pub fn put_u16_le(&mut self, value: u16) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    /// Append a little-endian `u32`.
    pub fn put_u32_le(&mut self, value: u32) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    /// Overwrite bytes at an earlier `offset`, then return to the end.
    ///
    /// Not allowed while a tag is open.
    pub fn patch(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        if let Some(open) = &self.open {
            return Err(Error::TagAlreadyOpen(open.code));
        }
        let end = self.sink.position();
        self.sink.seek(offset)?;
        self.sink.write_all(bytes)?;
        self.sink.seek(end)?;
        Ok(())
    }

    /// Flush the sink. Staged bytes of an open tag are not written.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }
}
