//! The SWF muxer.
//!
//! A [`Muxer`] moves through four states:
//!
//! ```text
//! Uninitialized --write_header--> HeaderWritten --push_*--> Streaming --finalize--> Finalized
//! ```
//!
//! Every pushed video frame becomes one container frame: the codec's
//! placement and frame tags, then any buffered audio as a SoundStreamBlock,
//! then ShowFrame. Audio is buffered in an [`AudioFifo`] until the next frame
//! boundary. Audio-only movies get one container frame per audio packet.
//!
//! The file length and frame count in the header are unknown until the end,
//! so placeholders are written and patched by [`Muxer::finalize`] when the
//! sink can seek.

use flashmux_bits::{encode_matrix, encode_rect, Matrix, Rect, FRAC_BITS};
use tracing::{debug, info, warn};

use crate::codec::{container_version, playback_bits, VideoLayout};
use crate::config::{MuxerConfig, StreamDescriptors};
use crate::error::{Error, Result};
use crate::fifo::AudioFifo;
use crate::shape::encode_filled_rect_outline;
use crate::sink::Sink;
use crate::tag::{TagCode, TagFramer};

const SIGNATURE: &[u8; 3] = b"FWS";

/// File size written until the real one is known.
pub const PLACEHOLDER_FILE_SIZE: u32 = 100 * 1024 * 1024;

/// Duration the placeholder frame count stands for.
const PLACEHOLDER_DURATION_SECS: u64 = 600;

/// Frame count after which the player stops.
pub const PLAYER_FRAME_LIMIT: u32 = 16000;

/// Frame count declared in DefineVideoStream.
pub const VIDEO_FRAME_LIMIT: u32 = 15000;

/// Twips per pixel.
const TWIPS: u32 = 20;

const VIDEO_ID: u16 = 0;
const SHAPE_ID: u16 = 1;
const BITMAP_ID: u16 = 0;
const DISPLAY_DEPTH: u16 = 1;

const FILE_ATTRIBUTE_AS3: u32 = 1 << 3;
const FILL_CLIPPED_BITMAP: u8 = 0x41;

/// PlaceObject2 flags: has name, has ratio, has matrix, has character.
const PLACE_NEW_VIDEO: u8 = 0x36;
/// PlaceObject2 flags: has ratio, move.
const PLACE_UPDATE_RATIO: u8 = 0x11;

const VIDEO_INSTANCE_NAME: &[u8] = b"video\0";

/// Empty JPEG (SOI, EOI) the player expects before DefineBitsJPEG2 data.
const JPEG_STUB: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

/// Lifecycle state of a [`Muxer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerState {
    Uninitialized,
    HeaderWritten,
    Streaming,
    Finalized,
}

/// One input packet.
#[derive(Debug, Clone, Copy)]
pub enum Packet<'a> {
    Video(&'a [u8]),
    Audio {
        data: &'a [u8],
        /// Samples in the packet; the configured frame size when `None`.
        samples: Option<u32>,
    },
}

/// Streaming SWF muxer over a [`Sink`].
#[derive(Debug)]
pub struct Muxer<S> {
    framer: TagFramer<S>,
    state: MuxerState,
    descriptors: Option<StreamDescriptors>,
    fifo: AudioFifo,
    frame_number: u32,
    video_frame_index: u32,
    header_offset: u64,
    size_patch_offset: u64,
    duration_patch_offset: u64,
}

impl<S: Sink> Muxer<S> {
    /// Create a muxer that has not written anything yet.
    pub fn new(sink: S) -> Self {
        Self::with_fifo(sink, AudioFifo::new())
    }

    /// Create a muxer with a custom audio FIFO.
    pub fn with_fifo(sink: S, fifo: AudioFifo) -> Self {
        Self {
            framer: TagFramer::new(sink),
            state: MuxerState::Uninitialized,
            descriptors: None,
            fifo,
            frame_number: 0,
            video_frame_index: 0,
            header_offset: 0,
            size_patch_offset: 0,
            duration_patch_offset: 0,
        }
    }

    /// Create a muxer and write the file header.
    pub fn open(sink: S, config: &MuxerConfig) -> Result<Self> {
        let mut muxer = Self::new(sink);
        muxer.write_header(config)?;
        Ok(muxer)
    }

    pub fn state(&self) -> MuxerState {
        self.state
    }

    /// Descriptors resolved by [`write_header`](Self::write_header).
    pub fn descriptors(&self) -> Option<&StreamDescriptors> {
        self.descriptors.as_ref()
    }

    /// ShowFrame tags written so far.
    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    /// Video frames written so far.
    pub fn video_frame_index(&self) -> u32 {
        self.video_frame_index
    }

    /// Audio bytes waiting for the next frame boundary.
    pub fn pending_audio_bytes(&self) -> usize {
        self.fifo.len()
    }

    /// Audio samples waiting for the next frame boundary.
    pub fn pending_audio_samples(&self) -> u32 {
        self.fifo.pending_samples()
    }

    pub fn sink(&self) -> &S {
        self.framer.sink()
    }

    /// Give back the sink.
    pub fn into_sink(self) -> S {
        self.framer.into_inner()
    }

    /// Validate the configuration and write the file header and definition tags.
    pub fn write_header(&mut self, config: &MuxerConfig) -> Result<()> {
        if self.state != MuxerState::Uninitialized {
            return Err(self.invalid_state("write header"));
        }

        let desc = config.validate()?;
        let version = container_version(desc.format, desc.video_codec());
        let bounds = encode_rect(&Rect::new(
            0,
            (desc.width * TWIPS) as i32,
            0,
            (desc.height * TWIPS) as i32,
        ))?;
        let placeholder_frames = (PLACEHOLDER_DURATION_SECS * u64::from(desc.rate_num)
            / u64::from(desc.rate_den)) as u16;

        self.header_offset = self.framer.position();
        self.framer.put_slice(SIGNATURE)?;
        self.framer.put_u8(version)?;
        self.size_patch_offset = self.framer.position();
        self.framer.put_u32_le(PLACEHOLDER_FILE_SIZE)?;
        self.framer.put_slice(&bounds)?;
        self.framer.put_u16_le(desc.frame_rate_field())?;
        self.duration_patch_offset = self.framer.position();
        self.framer.put_u16_le(placeholder_frames)?;

        if desc.format.needs_file_attributes() {
            self.framer
                .with_tag(TagCode::FILE_ATTRIBUTES, false, |f| {
                    f.put_u32_le(FILE_ATTRIBUTE_AS3)
                })?;
        }

        if let Some(video) = desc.video {
            if video.codec.layout() == VideoLayout::StillImage {
                self.write_bitmap_shape(video.width as i32, video.height as i32)?;
            }
        }

        if let Some(audio) = desc.audio {
            let playback = playback_bits(audio.sample_rate, audio.channels)?;
            let stream = playback | audio.codec.format_bits();
            self.framer
                .with_tag(TagCode::SOUND_STREAM_HEAD2, false, |f| {
                    f.put_u8(playback)?;
                    f.put_u8(stream)?;
                    f.put_u16_le(desc.samples_per_frame)?;
                    f.put_u16_le(0)
                })?;
        }

        self.framer.flush()?;

        info!(
            format = desc.format.name(),
            version,
            width = desc.width,
            height = desc.height,
            rate_num = desc.rate_num,
            rate_den = desc.rate_den,
            video = desc.video_codec().map(|c| c.id()),
            audio = desc.audio_codec().map(|c| c.id()),
            "wrote container header"
        );

        self.descriptors = Some(desc);
        self.state = MuxerState::HeaderWritten;
        Ok(())
    }

    /// Define the rectangle shape filled with the current bitmap.
    fn write_bitmap_shape(&mut self, width: i32, height: i32) -> Result<()> {
        let bounds = encode_rect(&Rect::new(0, width, 0, height))?;
        let fill_matrix = encode_matrix(&Matrix::IDENTITY)?;
        let outline = encode_filled_rect_outline(width, height)?;

        self.framer.with_tag(TagCode::DEFINE_SHAPE, false, |f| {
            f.put_u16_le(SHAPE_ID)?;
            f.put_slice(&bounds)?;
            f.put_u8(1)?; // fill style count
            f.put_u8(FILL_CLIPPED_BITMAP)?;
            f.put_u16_le(BITMAP_ID)?;
            f.put_slice(&fill_matrix)?;
            f.put_u8(0)?; // line style count
            f.put_slice(&outline)
        })?;
        Ok(())
    }

    /// Write one video frame and close the container frame.
    pub fn push_video_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_streamable("push video frame")?;
        self.write_frame(payload)
    }

    /// Buffer one audio packet.
    ///
    /// Without a video stream this also closes a container frame, so the
    /// buffered audio is written right away.
    pub fn push_audio_frame(&mut self, payload: &[u8], sample_count: u32) -> Result<()> {
        let desc = self.ensure_streamable("push audio frame")?;
        if desc.audio.is_none() {
            return Err(Error::invalid_config("no audio stream configured"));
        }

        self.fifo.push(payload, sample_count)?;
        debug!(
            bytes = payload.len(),
            samples = sample_count,
            pending = self.fifo.len(),
            "buffered audio"
        );

        if desc.video.is_none() {
            return self.write_frame(&[]);
        }
        self.state = MuxerState::Streaming;
        Ok(())
    }

    /// Push a packet of either kind.
    pub fn write_packet(&mut self, packet: Packet<'_>) -> Result<()> {
        match packet {
            Packet::Video(data) => self.push_video_frame(data),
            Packet::Audio { data, samples } => {
                let samples = match samples {
                    Some(samples) => samples,
                    None => self
                        .descriptors
                        .and_then(|d| d.audio)
                        .map_or(0, |a| a.frame_size),
                };
                self.push_audio_frame(data, samples)
            }
        }
    }

    fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let desc = self.ensure_streamable("write frame")?;

        if self.frame_number == PLAYER_FRAME_LIMIT {
            warn!(limit = PLAYER_FRAME_LIMIT, "Flash Player frame limit reached");
        }

        if let Some(video) = desc.video {
            match video.codec.layout() {
                VideoLayout::Stream { format_tag } => {
                    self.write_stream_frame(video.width, video.height, format_tag, payload)?
                }
                VideoLayout::StillImage => self.write_still_frame(payload)?,
            }
        }

        self.flush_audio()?;

        self.framer.empty_tag(TagCode::SHOW_FRAME)?;
        self.frame_number += 1;
        self.framer.flush()?;

        self.state = MuxerState::Streaming;
        Ok(())
    }

    fn write_stream_frame(
        &mut self,
        width: u32,
        height: u32,
        format_tag: u8,
        payload: &[u8],
    ) -> Result<()> {
        let index = self.video_frame_index as u16;

        if self.video_frame_index == 0 {
            self.framer
                .with_tag(TagCode::DEFINE_VIDEO_STREAM, false, |f| {
                    f.put_u16_le(VIDEO_ID)?;
                    f.put_u16_le(VIDEO_FRAME_LIMIT as u16)?;
                    f.put_u16_le(width as u16)?;
                    f.put_u16_le(height as u16)?;
                    f.put_u8(0)?; // deblocking and smoothing flags
                    f.put_u8(format_tag)
                })?;

            let matrix = encode_matrix(&Matrix::IDENTITY)?;
            self.framer.with_tag(TagCode::PLACE_OBJECT2, false, |f| {
                f.put_u8(PLACE_NEW_VIDEO)?;
                f.put_u16_le(DISPLAY_DEPTH)?;
                f.put_u16_le(VIDEO_ID)?;
                f.put_slice(&matrix)?;
                f.put_u16_le(index)?;
                f.put_slice(VIDEO_INSTANCE_NAME)
            })?;
        } else {
            self.framer.with_tag(TagCode::PLACE_OBJECT2, false, |f| {
                f.put_u8(PLACE_UPDATE_RATIO)?;
                f.put_u16_le(DISPLAY_DEPTH)?;
                f.put_u16_le(index)
            })?;
        }

        self.framer.with_tag(TagCode::VIDEO_FRAME, true, |f| {
            f.put_u16_le(VIDEO_ID)?;
            f.put_u16_le(index)?;
            f.put_slice(payload)
        })?;
        self.advance_video_index();
        Ok(())
    }

    fn write_still_frame(&mut self, payload: &[u8]) -> Result<()> {
        if self.video_frame_index > 0 {
            self.framer.with_tag(TagCode::REMOVE_OBJECT, false, |f| {
                f.put_u16_le(SHAPE_ID)?;
                f.put_u16_le(DISPLAY_DEPTH)
            })?;
            self.framer
                .with_tag(TagCode::FREE_CHARACTER, false, |f| f.put_u16_le(BITMAP_ID))?;
        }

        self.framer.with_tag(TagCode::DEFINE_BITS_JPEG2, true, |f| {
            f.put_u16_le(BITMAP_ID)?;
            f.put_slice(&JPEG_STUB)?;
            f.put_slice(payload)
        })?;

        // The shape is defined in pixels; scale it up to twips.
        let matrix = encode_matrix(&Matrix::scale((TWIPS << FRAC_BITS) as i32))?;
        self.framer.with_tag(TagCode::PLACE_OBJECT, false, |f| {
            f.put_u16_le(SHAPE_ID)?;
            f.put_u16_le(DISPLAY_DEPTH)?;
            f.put_slice(&matrix)
        })?;
        self.advance_video_index();
        Ok(())
    }

    fn advance_video_index(&mut self) {
        self.video_frame_index += 1;
        if self.video_frame_index == VIDEO_FRAME_LIMIT {
            warn!(
                limit = VIDEO_FRAME_LIMIT,
                "video stream frame limit reached; later frames may not play"
            );
        }
    }

    /// Write buffered audio as a SoundStreamBlock.
    fn flush_audio(&mut self) -> Result<()> {
        if self.fifo.is_empty() {
            return Ok(());
        }
        let pending = self.fifo.pending_samples();
        let block_samples = u16::try_from(pending).map_err(|_| Error::SampleCountOverflow {
            samples: u64::from(pending),
        })?;
        let Some((data, samples)) = self.fifo.take() else {
            return Ok(());
        };

        self.framer
            .with_tag(TagCode::SOUND_STREAM_BLOCK, true, |f| {
                f.put_u16_le(block_samples)?;
                f.put_u16_le(0)?; // seek samples
                f.put_slice(&data)
            })?;
        debug!(bytes = data.len(), samples, "flushed audio block");
        Ok(())
    }

    /// Write the End tag and patch the header.
    ///
    /// The file size and frame count are only patched on a seekable sink and
    /// when the movie has a video stream; otherwise the placeholders remain.
    pub fn finalize(&mut self) -> Result<()> {
        let desc = match self.state {
            MuxerState::Finalized => return Err(Error::AlreadyFinalized),
            MuxerState::Uninitialized => return Err(self.invalid_state("finalize")),
            MuxerState::HeaderWritten | MuxerState::Streaming => self.descriptors,
        };

        self.framer.empty_tag(TagCode::END)?;
        self.framer.flush()?;

        let has_video = desc.is_some_and(|d| d.video.is_some());
        if !self.framer.is_seekable() {
            warn!("sink is not seekable; file size and frame count left as placeholders");
        } else if has_video {
            let file_size = (self.framer.position() - self.header_offset) as u32;
            self.framer
                .patch(self.size_patch_offset, &file_size.to_le_bytes())?;
            self.framer.patch(
                self.duration_patch_offset,
                &(self.frame_number as u16).to_le_bytes(),
            )?;
            self.framer.flush()?;
            debug!(file_size, frames = self.frame_number, "patched header");
        }

        info!(
            frames = self.frame_number,
            video_frames = self.video_frame_index,
            bytes = self.framer.position() - self.header_offset,
            "finalized container"
        );

        self.state = MuxerState::Finalized;
        Ok(())
    }

    fn ensure_streamable(&self, operation: &'static str) -> Result<StreamDescriptors> {
        match (self.state, self.descriptors) {
            (MuxerState::HeaderWritten | MuxerState::Streaming, Some(desc)) => Ok(desc),
            (MuxerState::Finalized, _) => Err(Error::AlreadyFinalized),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::OutputFormat;
    use crate::sink::{SeekableSink, StreamSink};
    use std::io::Cursor;

    type MemMuxer = Muxer<SeekableSink<Cursor<Vec<u8>>>>;

    fn mem_muxer() -> MemMuxer {
        Muxer::new(SeekableSink::new(Cursor::new(Vec::new())).unwrap())
    }

    fn output(muxer: MemMuxer) -> Vec<u8> {
        muxer.into_sink().into_inner().into_inner()
    }

    fn flv_config() -> MuxerConfig {
        MuxerConfig::new(OutputFormat::Swf).video("flv1", 640, 480, 25, 1)
    }

    #[test]
    fn test_header_layout() {
        let mut muxer = mem_muxer();
        muxer.write_header(&flv_config()).unwrap();
        assert_eq!(muxer.state(), MuxerState::HeaderWritten);

        let bytes = output(muxer);
        assert_eq!(&bytes[0..3], b"FWS");
        assert_eq!(bytes[3], 6);
        assert_eq!(
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            PLACEHOLDER_FILE_SIZE
        );
        // rect: 5 + 4 * 15 bits = 9 bytes (12800 needs 15 bits)
        let rate_at = 8 + 9;
        assert_eq!(
            u16::from_le_bytes([bytes[rate_at], bytes[rate_at + 1]]),
            25 * 256
        );
        assert_eq!(
            u16::from_le_bytes([bytes[rate_at + 2], bytes[rate_at + 3]]),
            15000
        );
        assert_eq!(bytes.len(), rate_at + 4);
    }

    #[test]
    fn test_invalid_config_writes_nothing() {
        let mut muxer = mem_muxer();
        let err = muxer
            .write_header(&MuxerConfig::default().video("theora", 320, 240, 25, 1))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedCodec(_)));
        assert_eq!(muxer.state(), MuxerState::Uninitialized);
        assert!(output(muxer).is_empty());
    }

    #[test]
    fn test_header_twice_rejected() {
        let mut muxer = mem_muxer();
        muxer.write_header(&flv_config()).unwrap();
        assert!(matches!(
            muxer.write_header(&flv_config()),
            Err(Error::InvalidState {
                state: MuxerState::HeaderWritten,
                ..
            })
        ));
    }

    #[test]
    fn test_push_before_header_rejected() {
        let mut muxer = mem_muxer();
        assert!(matches!(
            muxer.push_video_frame(&[1, 2, 3]),
            Err(Error::InvalidState {
                state: MuxerState::Uninitialized,
                ..
            })
        ));
        assert!(matches!(
            muxer.push_audio_frame(&[1], 1152),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            muxer.finalize(),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_counters_and_states() {
        let mut muxer = mem_muxer();
        muxer.write_header(&flv_config()).unwrap();
        for _ in 0..3 {
            muxer.push_video_frame(&[0xAA; 100]).unwrap();
        }
        assert_eq!(muxer.state(), MuxerState::Streaming);
        assert_eq!(muxer.frame_number(), 3);
        assert_eq!(muxer.video_frame_index(), 3);

        muxer.finalize().unwrap();
        assert_eq!(muxer.state(), MuxerState::Finalized);
        assert!(matches!(muxer.finalize(), Err(Error::AlreadyFinalized)));
        assert!(matches!(
            muxer.push_video_frame(&[0]),
            Err(Error::AlreadyFinalized)
        ));
    }

    #[test]
    fn test_audio_buffered_until_video_frame() {
        let config = flv_config().audio("mp3", 44100, 2, 1152);
        let mut muxer = Muxer::open(
            SeekableSink::new(Cursor::new(Vec::new())).unwrap(),
            &config,
        )
        .unwrap();

        muxer.push_audio_frame(&[1; 417], 1152).unwrap();
        muxer.push_audio_frame(&[2; 418], 1152).unwrap();
        assert_eq!(muxer.state(), MuxerState::Streaming);
        assert_eq!(muxer.frame_number(), 0);
        assert_eq!(muxer.pending_audio_bytes(), 835);
        assert_eq!(muxer.pending_audio_samples(), 2304);

        muxer.push_video_frame(&[0; 10]).unwrap();
        assert_eq!(muxer.pending_audio_bytes(), 0);
        assert_eq!(muxer.pending_audio_samples(), 0);
        assert_eq!(muxer.frame_number(), 1);
    }

    #[test]
    fn test_audio_only_emits_frame_per_packet() {
        let config = MuxerConfig::default().audio("mp3", 22050, 1, 576);
        let mut muxer = Muxer::open(StreamSink::new(Vec::new()), &config).unwrap();

        muxer
            .write_packet(Packet::Audio {
                data: &[5; 100],
                samples: None,
            })
            .unwrap();
        muxer.push_audio_frame(&[6; 100], 576).unwrap();
        assert_eq!(muxer.frame_number(), 2);
        assert_eq!(muxer.video_frame_index(), 0);
        assert_eq!(muxer.pending_audio_bytes(), 0);
        muxer.finalize().unwrap();
    }

    #[test]
    fn test_audio_without_audio_stream_rejected() {
        let mut muxer = mem_muxer();
        muxer.write_header(&flv_config()).unwrap();
        assert!(matches!(
            muxer.push_audio_frame(&[0; 4], 1152),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_block_sample_count_must_fit() {
        let config = flv_config().audio("mp3", 44100, 2, 1152);
        let mut muxer = Muxer::open(
            SeekableSink::new(Cursor::new(Vec::new())).unwrap(),
            &config,
        )
        .unwrap();

        muxer.push_audio_frame(&[1; 100], 65_000).unwrap();
        let err = muxer.push_audio_frame(&[2; 100], 1152).unwrap_err();
        assert!(matches!(err, Error::SampleCountOverflow { samples: 66_152 }));
        assert_eq!(muxer.pending_audio_bytes(), 100);
        assert_eq!(muxer.pending_audio_samples(), 65_000);

        muxer.push_video_frame(&[0; 10]).unwrap();
        muxer.finalize().unwrap();

        let bytes = output(muxer);
        let header = ((TagCode::SOUND_STREAM_BLOCK.0 << 6) | 0x3F).to_le_bytes();
        let at = bytes.windows(2).rposition(|w| w == &header[..]).unwrap();
        assert_eq!(
            u16::from_le_bytes([bytes[at + 6], bytes[at + 7]]),
            65_000
        );
    }

    #[test]
    fn test_fifo_overflow_keeps_state() {
        let config = flv_config().audio("mp3", 44100, 2, 1152);
        let mut muxer = Muxer::with_fifo(
            SeekableSink::new(Cursor::new(Vec::new())).unwrap(),
            AudioFifo::with_capacity(1000),
        );
        muxer.write_header(&config).unwrap();

        muxer.push_audio_frame(&[1; 600], 1152).unwrap();
        let err = muxer.push_audio_frame(&[2; 600], 1152).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                needed: 1200,
                capacity: 1000
            }
        ));
        assert_eq!(muxer.pending_audio_bytes(), 600);
        assert_eq!(muxer.pending_audio_samples(), 1152);

        muxer.push_video_frame(&[0; 10]).unwrap();
        muxer.finalize().unwrap();
    }
}
