//! Output sinks.
//!
//! The muxer writes through the [`Sink`] trait and never sees the concrete
//! destination. [`SeekableSink`] wraps anything `Write + Seek` (files,
//! `Cursor<Vec<u8>>`) and supports backpatching. [`StreamSink`] wraps a plain
//! `Write` (pipes, sockets) and refuses to seek.

use std::io::{self, Seek, SeekFrom, Write};

/// Append-only byte destination with optional random access.
pub trait Sink {
    /// Write all of `buf` at the current position.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Current byte offset.
    fn position(&self) -> u64;

    /// Whether [`seek`](Self::seek) is supported.
    fn is_seekable(&self) -> bool;

    /// Move to an absolute offset. Only valid on seekable sinks.
    fn seek(&mut self, pos: u64) -> io::Result<()>;

    /// Flush buffered bytes to the destination.
    fn flush(&mut self) -> io::Result<()>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        (**self).seek(pos)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        (**self).seek(pos)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Sink over a `Write + Seek` destination.
#[derive(Debug)]
pub struct SeekableSink<W> {
    inner: W,
    pos: u64,
}

impl<W: Write + Seek> SeekableSink<W> {
    /// Wrap `inner`, starting at its current stream position.
    pub fn new(mut inner: W) -> io::Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self { inner, pos })
    }

    /// The wrapped destination.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the destination.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> Sink for SeekableSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.pos = self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Sink over a sequential-only destination.
#[derive(Debug)]
pub struct StreamSink<W> {
    inner: W,
    pos: u64,
}

impl<W: Write> StreamSink<W> {
    /// Wrap `inner`; positions are counted from zero.
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    /// The wrapped destination.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the destination.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for StreamSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn seek(&mut self, _pos: u64) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "sink is not seekable",
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
