//! scriptreel turns a segmented narration script into a captioned, narrated MP4.
//!
//! A script is split on `[SEGMENT n]` markers. Every segment is spoken by a [`SpeechEngine`],
//! rendered as a caption still whose duration equals the narration's, and bound into a
//! [`SegmentUnit`]. The units are concatenated in order and encoded through a [`FrameSink`]
//! (system `ffmpeg` by default).
//!
//! - Load and validate a [`PipelineConfig`]
//! - Create a [`Pipeline`] around a speech engine
//! - Call [`Pipeline::produce_video`] or stream into your own sink with
//!   [`Pipeline::produce_video_into`]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod foundation;

/// Concatenation of segment units into one stream.
pub mod assemble;
/// PCM decoding, resampling, and concatenation.
pub mod audio;
/// Caption layout and rasterization.
pub mod caption;
/// Pipeline configuration.
pub mod config;
/// Encoding sinks.
pub mod encode;
/// Speech synthesis boundary.
pub mod narration;
/// Script-to-video orchestration.
pub mod pipeline;
/// Script production and segmentation.
pub mod script;
/// Segment unit builder.
pub mod unit;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRGBA, Rgba8};
pub use crate::foundation::error::{ReelError, ReelResult};
pub use crate::foundation::temp::{TempAsset, remove_idempotent};

pub use crate::assemble::{AssemblyParams, AssemblyReport, assemble};
pub use crate::caption::font::{CaptionFont, FontResolution};
pub use crate::caption::measure::{ParleyMeasure, TextMeasure};
pub use crate::caption::render::{CaptionAsset, CaptionRenderer};
pub use crate::config::{
    CaptionStyle, EncodeSettings, LanguageCode, PipelineConfig, SegmentPolicy, SpeechSettings,
};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path};
pub use crate::encode::sink::{AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
pub use crate::narration::engine::{CommandSpeechEngine, SpeechEngine, SpokenAudio};
pub use crate::narration::synth::{AudioAsset, NarrationSynthesizer};
pub use crate::pipeline::{CancelToken, Pipeline, RenderReport, SkippedSegment};
pub use crate::script::segment::{Segment, segment_script};
pub use crate::script::source::{
    CommandScriptSource, LengthHint, ScriptSource, placeholder_script, produce_script,
};
pub use crate::unit::{SegmentUnit, UnitBuilder};
