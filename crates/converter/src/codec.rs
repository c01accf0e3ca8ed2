use crate::error::{ConvertError, ConvertResult};

/// Codec choices for one output container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecProfile {
    pub format: &'static str,
    pub video_codec: &'static str,
    /// Extra video flags, possibly empty (e.g. `-crf 0`)
    pub quality_flag: &'static str,
    pub audio_codec: &'static str,
}

impl CodecProfile {
    /// Quality flag split into individual ffmpeg arguments
    pub fn quality_args(&self) -> Vec<String> {
        self.quality_flag.split_whitespace().map(str::to_string).collect()
    }
}

/// Video codec and quality flag per output format.
/// Alternatives that trade quality for size: mkv/avi libx264, mp4 libx264, mov libx264, 3gp libx265.
const VIDEO_CODECS: &[(&str, &str, &str)] = &[
    ("webm", "libvpx-vp9", "-lossless 1"),
    ("mkv", "ffv1", ""),
    ("flv", "flv", "-q:v 0"),
    ("vob", "mpeg2video", "-q:v 0"),
    ("avi", "ffv1", ""),
    ("mov", "prores_ks", "-profile:v hq"),
    ("wmv", "wmv2", "-q:v 0"),
    ("mp4", "libx265", "-crf 0"),
    ("mpg", "mpeg2video", "-q:v 0"),
    ("mpeg", "mpeg2video", "-q:v 0"),
    ("3gp", "libx264", "-crf 0"),
];

/// Audio codec per output format
const AUDIO_CODECS: &[(&str, &str)] = &[
    ("webm", "libopus"),
    ("mkv", "aac"),
    ("flv", "libmp3lame"),
    ("vob", "ac3"),
    ("avi", "libmp3lame"),
    ("mov", "aac"),
    ("wmv", "wmav2"),
    ("mp4", "aac"),
    ("mpg", "mp2"),
    ("mpeg", "mp2"),
    ("3gp", "aac"),
];

/// Output formats accepted by the converter, in prompt order
pub const SUPPORTED_FORMATS: &[&str] = &[
    "webm", "mkv", "flv", "vob", "avi", "mov", "wmv", "mp4", "mpg", "mpeg", "3gp",
];

fn unsupported(format: &str) -> ConvertError {
    ConvertError::UnsupportedFormat { format: format.to_string() }
}

/// Look up the video codec and quality flag for a format (case-insensitive)
pub fn resolve_video_codec(format: &str) -> ConvertResult<(&'static str, &'static str)> {
    VIDEO_CODECS
        .iter()
        .find(|(key, _, _)| key.eq_ignore_ascii_case(format))
        .map(|(_, codec, flag)| (*codec, *flag))
        .ok_or_else(|| unsupported(format))
}

/// Look up the audio codec for a format (case-insensitive)
pub fn resolve_audio_codec(format: &str) -> ConvertResult<&'static str> {
    AUDIO_CODECS
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(format))
        .map(|(_, codec)| *codec)
        .ok_or_else(|| unsupported(format))
}

/// Resolve the full profile; either table missing the format fails the lookup
pub fn resolve_profile(format: &str) -> ConvertResult<CodecProfile> {
    let (video_codec, quality_flag) = resolve_video_codec(format)?;
    let audio_codec = resolve_audio_codec(format)?;
    let format = SUPPORTED_FORMATS
        .iter()
        .copied()
        .find(|key| key.eq_ignore_ascii_case(format))
        .ok_or_else(|| unsupported(format))?;

    Ok(CodecProfile {
        format,
        video_codec,
        quality_flag,
        audio_codec,
    })
}
