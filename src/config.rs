//! Muxer configuration and the validated stream descriptors.
//!
//! [`MuxerConfig`] is what callers hand in (usually deserialized from JSON).
//! [`MuxerConfig::validate`] resolves it into [`StreamDescriptors`], the
//! immutable view the muxer works from once the header is written.

use serde::{Deserialize, Serialize};

use crate::codec::{sample_rate_bits, AudioCodec, OutputFormat, VideoCodec};
use crate::error::{Error, Result};

/// Stage size and frame rate used when there is no video stream.
const AUDIO_ONLY_WIDTH: u32 = 320;
const AUDIO_ONLY_HEIGHT: u32 = 200;
const AUDIO_ONLY_RATE: (u32, u32) = (10, 1);

/// Sample rate assumed for frame pacing when there is no audio stream.
const DEFAULT_PACING_SAMPLE_RATE: u64 = 44100;

/// Top-level muxer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MuxerConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

/// One input elementary stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamConfig {
    Video {
        codec: String,
        width: u32,
        height: u32,
        /// Frames per second numerator.
        rate_num: u32,
        /// Frames per second denominator.
        #[serde(default = "default_rate_den")]
        rate_den: u32,
    },
    Audio {
        codec: String,
        sample_rate: u32,
        #[serde(default = "default_channels")]
        channels: u16,
        /// Samples per encoded audio packet.
        #[serde(default)]
        frame_size: Option<u32>,
    },
}

fn default_rate_den() -> u32 {
    1
}

fn default_channels() -> u16 {
    1
}

impl MuxerConfig {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            streams: Vec::new(),
        }
    }

    /// Add a video stream.
    pub fn video(
        mut self,
        codec: impl Into<String>,
        width: u32,
        height: u32,
        rate_num: u32,
        rate_den: u32,
    ) -> Self {
        self.streams.push(StreamConfig::Video {
            codec: codec.into(),
            width,
            height,
            rate_num,
            rate_den,
        });
        self
    }

    /// Add an audio stream.
    pub fn audio(
        mut self,
        codec: impl Into<String>,
        sample_rate: u32,
        channels: u16,
        frame_size: u32,
    ) -> Self {
        self.streams.push(StreamConfig::Audio {
            codec: codec.into(),
            sample_rate,
            channels,
            frame_size: Some(frame_size),
        });
        self
    }

    /// Deserialize a `MuxerConfig` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::invalid_config(format!("config parse error: {e}")))
    }

    /// Check the stream layout and resolve codecs.
    pub fn validate(&self) -> Result<StreamDescriptors> {
        let mut video = None;
        let mut audio = None;

        for stream in &self.streams {
            match stream {
                StreamConfig::Video {
                    codec,
                    width,
                    height,
                    rate_num,
                    rate_den,
                } => {
                    if video.is_some() {
                        return Err(Error::invalid_config("more than one video stream"));
                    }
                    let codec = VideoCodec::from_id(codec)?;
                    if *width == 0 || *height == 0 {
                        return Err(Error::invalid_config(format!(
                            "video size {width}x{height} is empty"
                        )));
                    }
                    if *width > u32::from(u16::MAX) || *height > u32::from(u16::MAX) {
                        return Err(Error::invalid_config(format!(
                            "video size {width}x{height} exceeds 65535"
                        )));
                    }
                    if *rate_num == 0 || *rate_den == 0 {
                        return Err(Error::invalid_config(format!(
                            "invalid frame rate {rate_num}/{rate_den}"
                        )));
                    }
                    if u16::try_from(fixed_8_8(*rate_num, *rate_den)).is_err() {
                        return Err(Error::invalid_config(format!(
                            "frame rate {rate_num}/{rate_den} exceeds the 8.8 header field"
                        )));
                    }
                    video = Some(VideoDescriptor {
                        codec,
                        width: *width,
                        height: *height,
                        rate_num: *rate_num,
                        rate_den: *rate_den,
                    });
                }
                StreamConfig::Audio {
                    codec,
                    sample_rate,
                    channels,
                    frame_size,
                } => {
                    if audio.is_some() {
                        return Err(Error::invalid_config("more than one audio stream"));
                    }
                    let codec = AudioCodec::from_id(codec)?;
                    let frame_size = frame_size.unwrap_or(0);
                    if codec.needs_frame_size() && frame_size == 0 {
                        return Err(Error::invalid_config("audio frame size not set"));
                    }
                    if !matches!(*channels, 1 | 2) {
                        return Err(Error::invalid_config(format!(
                            "{channels} audio channels (must be 1 or 2)"
                        )));
                    }
                    sample_rate_bits(*sample_rate)?;
                    audio = Some(AudioDescriptor {
                        codec,
                        sample_rate: *sample_rate,
                        channels: *channels,
                        frame_size,
                    });
                }
            }
        }

        if video.is_none() && audio.is_none() {
            return Err(Error::invalid_config("no streams configured"));
        }

        StreamDescriptors::new(self.format, video, audio)
    }
}

/// Resolved video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoDescriptor {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub rate_num: u32,
    pub rate_den: u32,
}

/// Resolved audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioDescriptor {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per packet.
    pub frame_size: u32,
}

/// Validated, immutable description of the container's streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptors {
    pub format: OutputFormat,
    pub video: Option<VideoDescriptor>,
    pub audio: Option<AudioDescriptor>,
    /// Stage width in pixels.
    pub width: u32,
    /// Stage height in pixels.
    pub height: u32,
    pub rate_num: u32,
    pub rate_den: u32,
    /// Audio samples played per container frame.
    pub samples_per_frame: u16,
}

impl StreamDescriptors {
    fn new(
        format: OutputFormat,
        video: Option<VideoDescriptor>,
        audio: Option<AudioDescriptor>,
    ) -> Result<Self> {
        let (width, height, rate_num, rate_den) = match &video {
            Some(v) => (v.width, v.height, v.rate_num, v.rate_den),
            None => (
                AUDIO_ONLY_WIDTH,
                AUDIO_ONLY_HEIGHT,
                AUDIO_ONLY_RATE.0,
                AUDIO_ONLY_RATE.1,
            ),
        };
        let pacing_rate = audio.map_or(DEFAULT_PACING_SAMPLE_RATE, |a| u64::from(a.sample_rate));
        let samples_per_frame = pacing_rate * u64::from(rate_den) / u64::from(rate_num);
        // Only SoundStreamHead2 stores the value.
        let samples_per_frame = match u16::try_from(samples_per_frame) {
            Ok(n) => n,
            Err(_) if audio.is_none() => u16::MAX,
            Err(_) => {
                return Err(Error::invalid_config(format!(
                    "{samples_per_frame} audio samples per frame at {rate_num}/{rate_den} fps \
                     exceeds the 16-bit header field"
                )))
            }
        };

        Ok(Self {
            format,
            video,
            audio,
            width,
            height,
            rate_num,
            rate_den,
            samples_per_frame,
        })
    }

    pub fn video_codec(&self) -> Option<VideoCodec> {
        self.video.map(|v| v.codec)
    }

    pub fn audio_codec(&self) -> Option<AudioCodec> {
        self.audio.map(|a| a.codec)
    }

    /// Frame rate in 8.8 fixed point, as stored in the file header.
    ///
    /// Saturates; [`MuxerConfig::validate`] rejects rates that do not fit.
    pub fn frame_rate_field(&self) -> u16 {
        u16::try_from(fixed_8_8(self.rate_num, self.rate_den)).unwrap_or(u16::MAX)
    }
}

fn fixed_8_8(num: u32, den: u32) -> u64 {
    u64::from(num) * 256 / u64::from(den)
}
