//! Export format settings and presets.

use cutlist_core::{FrameRate, Resolution, ValidationError};
use serde::{Deserialize, Serialize};

/// Video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    H265,
    ProRes422,
    Vp9,
    Av1,
}

impl VideoCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::ProRes422 => "prores_ks",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libaom-av1",
        }
    }

    /// File extension for this codec.
    pub fn extension(self) -> &'static str {
        match self {
            Self::H264 | Self::H265 | Self::Av1 => "mp4",
            Self::ProRes422 => "mov",
            Self::Vp9 => "webm",
        }
    }

    /// ProRes is rate-controlled by profile, not bitrate.
    pub fn uses_bitrate(self) -> bool {
        !matches!(self, Self::ProRes422)
    }
}

/// Audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    Aac,
    Pcm,
    Flac,
    Opus,
}

impl AudioCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Pcm => "pcm_s16le",
            Self::Flac => "flac",
            Self::Opus => "libopus",
        }
    }

    /// Lossless codecs ignore `-b:a`.
    pub fn uses_bitrate(self) -> bool {
        matches!(self, Self::Aac | Self::Opus)
    }
}

/// Output format for one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
    pub video_codec: VideoCodec,
    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,
    pub audio_codec: AudioCodec,
    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,
}

impl ExportSettings {
    /// H.264 1080p30 for YouTube uploads.
    pub fn youtube_1080p() -> Self {
        Self {
            resolution: Resolution::HD_1080,
            frame_rate: FrameRate::FPS_30,
            video_codec: VideoCodec::H264,
            video_bitrate_kbps: 8000,
            audio_codec: AudioCodec::Aac,
            audio_bitrate_kbps: 192,
        }
    }

    /// Square 1080x1080 H.264.
    pub fn instagram_post() -> Self {
        Self {
            resolution: Resolution::new(1080, 1080),
            frame_rate: FrameRate::FPS_30,
            video_codec: VideoCodec::H264,
            video_bitrate_kbps: 3500,
            audio_codec: AudioCodec::Aac,
            audio_bitrate_kbps: 128,
        }
    }

    /// 720p H.264 within Twitter's upload limits.
    pub fn twitter_video() -> Self {
        Self {
            resolution: Resolution::new(1280, 720),
            frame_rate: FrameRate::FPS_30,
            video_codec: VideoCodec::H264,
            video_bitrate_kbps: 5000,
            audio_codec: AudioCodec::Aac,
            audio_bitrate_kbps: 128,
        }
    }

    /// ProRes 422 for mastering.
    pub fn prores_master() -> Self {
        Self {
            resolution: Resolution::HD_1080,
            frame_rate: FrameRate::FPS_24,
            video_codec: VideoCodec::ProRes422,
            video_bitrate_kbps: 0,
            audio_codec: AudioCodec::Pcm,
            audio_bitrate_kbps: 0,
        }
    }

    /// Named presets, in display order.
    pub fn presets() -> Vec<(&'static str, Self)> {
        vec![
            ("youtube_1080p", Self::youtube_1080p()),
            ("instagram_post", Self::instagram_post()),
            ("twitter_video", Self::twitter_video()),
            ("prores_master", Self::prores_master()),
        ]
    }

    /// Look a preset up by name.
    pub fn preset(name: &str) -> Option<Self> {
        Self::presets()
            .into_iter()
            .find_map(|(n, settings)| (n == name).then_some(settings))
    }

    /// Reject settings no encoder can honour.
    pub fn check(&self) -> Result<(), ValidationError> {
        if !self.resolution.is_positive() {
            return Err(ValidationError::InvalidSettings(format!(
                "resolution {} must be positive",
                self.resolution
            )));
        }
        if !self.frame_rate.is_positive() {
            return Err(ValidationError::InvalidSettings(format!(
                "frame rate {} must be positive",
                self.frame_rate
            )));
        }
        if self.video_codec.uses_bitrate() && self.video_bitrate_kbps == 0 {
            return Err(ValidationError::InvalidSettings(format!(
                "{} needs a video bitrate",
                self.video_codec.ffmpeg_encoder()
            )));
        }
        if self.audio_codec.uses_bitrate() && self.audio_bitrate_kbps == 0 {
            return Err(ValidationError::InvalidSettings(format!(
                "{} needs an audio bitrate",
                self.audio_codec.ffmpeg_encoder()
            )));
        }
        Ok(())
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::youtube_1080p()
    }
}
