//! Explicit pipeline configuration.
//!
//! Every recognized option lives here with its default. Nothing is read from process-wide state:
//! callers build a [`PipelineConfig`] (or load one from JSON) and pass it to the pipeline.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::audio::pcm::MIX_SAMPLE_RATE;
use crate::foundation::core::{Canvas, Fps, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};

/// Spoken-language code handed to the speech engine (for example `vi`, `en`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(pub String);

impl LanguageCode {
    /// Create a language code from any string-like value.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Borrow the code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        Self::new("vi")
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a script is split into segments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentPolicy {
    /// Literal token that starts a segment label.
    pub marker: String,
    /// Literal token that ends a segment label.
    pub closing_marker: String,
    /// Segments beyond this count are dropped.
    pub max_segments: usize,
    /// Segment text is truncated to this many characters before narration.
    pub max_narration_chars: usize,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self {
            marker: "[SEGMENT".to_owned(),
            closing_marker: "]".to_owned(),
            max_segments: 3,
            max_narration_chars: 300,
        }
    }
}

/// Caption canvas, typography, and layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    /// Output canvas size in pixels.
    pub canvas: Canvas,
    /// Solid background color.
    pub background: Rgba8,
    /// Text color.
    pub foreground: Rgba8,
    /// Preferred font file. Falls back to the built-in face when unset or unusable.
    pub font_path: Option<PathBuf>,
    /// Font size in pixels.
    pub font_size_px: f32,
    /// Distance between consecutive line tops.
    pub line_height_px: f32,
    /// Left edge of every line.
    pub origin_x_px: f32,
    /// Top edge of the first line.
    pub origin_y_px: f32,
    /// Lines are closed before their measured width reaches this value.
    pub max_text_width_px: f32,
    /// Lines beyond this count are not drawn.
    pub max_lines: usize,
    /// Load system fonts into the rasterizer's font database.
    pub load_system_fonts: bool,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            background: Rgba8::BLACK,
            foreground: Rgba8::WHITE,
            font_path: None,
            font_size_px: 50.0,
            line_height_px: 60.0,
            origin_x_px: 50.0,
            origin_y_px: 400.0,
            max_text_width_px: 1800.0,
            max_lines: 10,
            load_system_fonts: true,
        }
    }
}

/// Output encoding parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    /// Output frame rate.
    pub fps: Fps,
    /// ffmpeg video codec name.
    pub video_codec: String,
    /// ffmpeg audio codec name.
    pub audio_codec: String,
    /// Output pixel format.
    pub pixel_format: String,
    /// Sample rate all narration is resampled to before concatenation.
    pub sample_rate: u32,
    /// Output channel count (1 or 2).
    pub channels: u16,
    /// Replace an existing destination file.
    pub overwrite: bool,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            video_codec: "libx264".to_owned(),
            audio_codec: "aac".to_owned(),
            pixel_format: "yuv420p".to_owned(),
            sample_rate: MIX_SAMPLE_RATE,
            channels: 2,
            overwrite: true,
        }
    }
}

/// External speech program used by [`crate::CommandSpeechEngine`].
///
/// Arguments may contain `{lang}` (language code) and `{out}` (WAV output path). The segment text
/// is written to the program's stdin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// Program name or path.
    pub program: String,
    /// Argument template.
    pub args: Vec<String>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            program: "espeak-ng".to_owned(),
            args: ["-v", "{lang}", "-w", "{out}", "--stdin"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Top-level configuration for [`crate::Pipeline`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Narration language.
    pub language: LanguageCode,
    /// Script segmentation.
    pub segments: SegmentPolicy,
    /// Caption rendering.
    pub caption: CaptionStyle,
    /// Output encoding.
    pub encode: EncodeSettings,
    /// Speech program for the command engine.
    pub speech: SpeechSettings,
    /// Directory for temporary assets; the system temp dir when unset.
    pub work_dir: Option<PathBuf>,
    /// Prepare segments on the rayon pool. Units are still assembled in segment order.
    pub parallel_segments: bool,
}

impl PipelineConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> ReelResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| ReelError::validation(format!("invalid config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: &Path) -> ReelResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Directory where temporary assets are created.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Check invariants that the pipeline relies on.
    pub fn validate(&self) -> ReelResult<()> {
        if self.language.as_str().trim().is_empty() {
            return Err(ReelError::validation("language code must be non-empty"));
        }

        let seg = &self.segments;
        if seg.marker.is_empty() {
            return Err(ReelError::validation("segment marker must be non-empty"));
        }
        if seg.max_segments == 0 {
            return Err(ReelError::validation("max_segments must be >= 1"));
        }
        if seg.max_narration_chars == 0 {
            return Err(ReelError::validation("max_narration_chars must be >= 1"));
        }

        let cap = &self.caption;
        if cap.canvas.width == 0 || cap.canvas.height == 0 {
            return Err(ReelError::validation("canvas width/height must be non-zero"));
        }
        if !cap.canvas.width.is_multiple_of(2) || !cap.canvas.height.is_multiple_of(2) {
            return Err(ReelError::validation(
                "canvas width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        for (name, v) in [
            ("font_size_px", cap.font_size_px),
            ("line_height_px", cap.line_height_px),
            ("max_text_width_px", cap.max_text_width_px),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ReelError::validation(format!(
                    "{name} must be finite and > 0"
                )));
            }
        }
        if !cap.origin_x_px.is_finite() || !cap.origin_y_px.is_finite() {
            return Err(ReelError::validation("caption origin must be finite"));
        }
        if cap.max_lines == 0 {
            return Err(ReelError::validation("max_lines must be >= 1"));
        }

        let enc = &self.encode;
        Fps::new(enc.fps.num, enc.fps.den)?;
        if enc.video_codec.trim().is_empty() || enc.audio_codec.trim().is_empty() {
            return Err(ReelError::validation("codec names must be non-empty"));
        }
        if enc.sample_rate == 0 {
            return Err(ReelError::validation("sample_rate must be non-zero"));
        }
        if !(1..=2).contains(&enc.channels) {
            return Err(ReelError::validation("channels must be 1 or 2"));
        }

        if self.speech.program.trim().is_empty() {
            return Err(ReelError::validation("speech program must be non-empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_sizing() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.language.as_str(), "vi");
        assert_eq!(cfg.segments.max_segments, 3);
        assert_eq!(cfg.segments.max_narration_chars, 300);
        assert_eq!(
            cfg.caption.canvas,
            Canvas {
                width: 1920,
                height: 1080
            }
        );
        assert_eq!(cfg.caption.max_lines, 10);
        assert_eq!(cfg.encode.fps, Fps { num: 24, den: 1 });
        assert_eq!(cfg.encode.video_codec, "libx264");
        assert_eq!(cfg.encode.audio_codec, "aac");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = PipelineConfig::from_json_str(
            r##"{"language": "en", "segments": {"max_segments": 5}, "caption": {"background": "#102030"}}"##,
        )
        .unwrap();
        assert_eq!(cfg.language.as_str(), "en");
        assert_eq!(cfg.segments.max_segments, 5);
        assert_eq!(cfg.segments.max_narration_chars, 300);
        assert_eq!(cfg.caption.background, Rgba8::rgb(0x10, 0x20, 0x30));
        assert_eq!(cfg.caption.foreground, Rgba8::WHITE);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = PipelineConfig::default();
        cfg.segments.max_segments = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.caption.canvas.width = 11;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.encode.fps.num = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.caption.font_size_px = f32::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.encode.channels = 6;
        assert!(cfg.validate().is_err());

        assert!(PipelineConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = PipelineConfig::default();
        let s = serde_json::to_string_pretty(&cfg).unwrap();
        let back = PipelineConfig::from_json_str(&s).unwrap();
        assert_eq!(cfg, back);
    }
}
