//! Codec variant policy.
//!
//! A closed mapping from the codecs the container can carry to the tag
//! sequence and header parameters the muxer emits for them.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Container flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain Flash movie.
    #[default]
    Swf,
    /// Flash 9 movie flagged for ActionScript 3 / AVM2.
    Avm2,
}

impl OutputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Swf => "swf",
            Self::Avm2 => "avm2",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            Self::Swf => "Flash format",
            Self::Avm2 => "Flash 9 (AVM2) format",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        "application/x-shockwave-flash"
    }

    /// Default file extension, if the format registers one.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Swf => Some("swf"),
            Self::Avm2 => None,
        }
    }

    /// Whether a FileAttributes tag must follow the header.
    pub fn needs_file_attributes(&self) -> bool {
        matches!(self, Self::Avm2)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "swf" => Ok(Self::Swf),
            "avm2" => Ok(Self::Avm2),
            other => Err(Error::invalid_config(format!("unknown output format: {other}"))),
        }
    }
}

/// How a video codec's frames are carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoLayout {
    /// A DefineVideoStream character fed by VideoFrame tags.
    Stream {
        /// CodecID byte of DefineVideoStream.
        format_tag: u8,
    },
    /// Each frame is a JPEG bitmap filling a rectangle shape.
    StillImage,
}

/// Video codecs the container can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// Sorenson Spark (H.263 variant).
    Flv1,
    /// On2 VP6, Flash flavour.
    Vp6f,
    /// Motion JPEG.
    Mjpeg,
}

impl VideoCodec {
    /// Resolve a codec identifier.
    pub fn from_id(id: &str) -> Result<Self> {
        match id.to_ascii_lowercase().as_str() {
            "flv1" | "flv" => Ok(Self::Flv1),
            "vp6f" => Ok(Self::Vp6f),
            "mjpeg" => Ok(Self::Mjpeg),
            other => Err(Error::unsupported_codec(format!(
                "{other} (video must be vp6f, flv1 or mjpeg)"
            ))),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Flv1 => "flv1",
            Self::Vp6f => "vp6f",
            Self::Mjpeg => "mjpeg",
        }
    }

    /// Lowest container version whose player decodes this codec.
    pub fn min_version(&self) -> u8 {
        match self {
            Self::Vp6f => 8,
            Self::Flv1 => 6,
            Self::Mjpeg => 4,
        }
    }

    pub fn layout(&self) -> VideoLayout {
        match self {
            Self::Flv1 => VideoLayout::Stream { format_tag: 0x02 },
            Self::Vp6f => VideoLayout::Stream { format_tag: 0x04 },
            Self::Mjpeg => VideoLayout::StillImage,
        }
    }
}

/// Audio codecs the container can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Mp3,
}

impl AudioCodec {
    /// Resolve a codec identifier.
    pub fn from_id(id: &str) -> Result<Self> {
        match id.to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            other => Err(Error::unsupported_codec(format!(
                "{other} (audio must be mp3)"
            ))),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
        }
    }

    /// Compression bits of the SoundStreamHead2 stream-format byte.
    pub fn format_bits(&self) -> u8 {
        match self {
            Self::Mp3 => 0x20,
        }
    }

    /// Whether packets must declare a frame size in samples.
    pub fn needs_frame_size(&self) -> bool {
        matches!(self, Self::Mp3)
    }
}

/// Two-bit sound rate code, already shifted into place.
pub fn sample_rate_bits(sample_rate: u32) -> Result<u8> {
    let code = match sample_rate {
        11025 => 1,
        22050 => 2,
        44100 => 3,
        other => return Err(Error::UnsupportedSampleRate(other)),
    };
    Ok(code << 2)
}

/// SoundStreamHead2 playback byte: rate code, 16-bit samples, stereo flag.
pub fn playback_bits(sample_rate: u32, channels: u16) -> Result<u8> {
    let mut v = sample_rate_bits(sample_rate)?;
    v |= 0x02;
    if channels == 2 {
        v |= 0x01;
    }
    Ok(v)
}

/// Container version byte for a format and video codec.
pub fn container_version(format: OutputFormat, video: Option<VideoCodec>) -> u8 {
    if format == OutputFormat::Avm2 {
        return 9;
    }
    // MP3 streaming sound needs version 4.
    video.map_or(4, |codec| codec.min_version())
}
