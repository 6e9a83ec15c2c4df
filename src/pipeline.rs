//! Script-to-video orchestration.
//!
//! [`Pipeline`] segments a script, turns every segment into a [`SegmentUnit`] (narration, caption,
//! binding), and hands the surviving units to the assembler. Failures local to one segment skip
//! that segment; everything else ends the request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::assemble::{AssemblyParams, assemble};
use crate::caption::font::FontResolution;
use crate::caption::render::CaptionRenderer;
use crate::config::PipelineConfig;
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
use crate::encode::sink::FrameSink;
use crate::foundation::error::{ReelError, ReelResult};
use crate::narration::engine::{CommandSpeechEngine, SpeechEngine};
use crate::narration::synth::NarrationSynthesizer;
use crate::script::segment::{Segment, segment_script};
use crate::unit::{SegmentUnit, UnitBuilder};

/// Shared flag that stops a running request between segments.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> ReelResult<()> {
        if self.is_cancelled() {
            return Err(ReelError::Cancelled);
        }
        Ok(())
    }
}

/// A segment that did not make it into the video.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedSegment {
    /// 1-based segment index.
    pub index: usize,
    /// Human-readable cause.
    pub reason: String,
}

/// Outcome of a successful request.
#[derive(Clone, Debug)]
pub struct RenderReport {
    /// Written video file; `None` when rendering into a caller-provided sink.
    pub output: Option<PathBuf>,
    /// Indices of the segments that were assembled, in output order.
    pub units: Vec<usize>,
    /// Segments left out, in segment order.
    pub skipped: Vec<SkippedSegment>,
    /// Video frames written.
    pub total_frames: u64,
    /// Video duration in seconds.
    pub duration_secs: f64,
    /// Caption font actually used.
    pub font: FontResolution,
}

/// Script-to-video pipeline bound to one configuration and speech engine.
#[derive(Clone)]
pub struct Pipeline {
    cfg: PipelineConfig,
    synthesizer: NarrationSynthesizer,
    renderer: CaptionRenderer,
    builder: UnitBuilder,
    cancel: CancelToken,
}

impl Pipeline {
    /// Validate `cfg` and build a pipeline around `engine`.
    pub fn new(cfg: PipelineConfig, engine: Arc<dyn SpeechEngine>) -> ReelResult<Self> {
        cfg.validate()?;
        let work_dir = cfg.work_dir();
        Ok(Self {
            synthesizer: NarrationSynthesizer::new(engine, work_dir.clone()),
            renderer: CaptionRenderer::new(&cfg.caption, work_dir),
            builder: UnitBuilder::new(&cfg.encode),
            cancel: CancelToken::new(),
            cfg,
        })
    }

    /// Build a pipeline that speaks through the configured external TTS program.
    pub fn with_command_engine(cfg: PipelineConfig) -> ReelResult<Self> {
        let engine = CommandSpeechEngine::new(&cfg.speech, cfg.work_dir());
        Self::new(cfg, Arc::new(engine))
    }

    /// Use `token` to cancel requests made through this pipeline.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// The validated configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Caption font in effect.
    pub fn font(&self) -> &FontResolution {
        self.renderer.font()
    }

    /// Split `script` into segments using the configured policy.
    pub fn segments(&self, script: &str) -> Vec<Segment> {
        segment_script(script, &self.cfg.segments)
    }

    /// Narrate, caption, and bind one segment.
    ///
    /// Returns `Ok(None)` when the segment has nothing to narrate.
    #[tracing::instrument(skip_all, fields(segment = segment.index))]
    pub fn prepare_segment(&self, segment: &Segment) -> ReelResult<Option<SegmentUnit>> {
        let Some(audio) = self
            .synthesizer
            .synthesize(&segment.text, &self.cfg.language)?
        else {
            return Ok(None);
        };
        let caption = self.renderer.render(&segment.text, audio.duration_secs())?;
        let unit = self.builder.build(segment.index, audio, caption)?;
        tracing::debug!(duration_secs = unit.duration_secs(), "segment unit ready");
        Ok(Some(unit))
    }

    /// Prepare every segment, keeping successes in segment order.
    ///
    /// Segment-local failures are recorded as skipped; only cancellation and non-local errors
    /// are returned.
    pub fn prepare_units(
        &self,
        segments: &[Segment],
    ) -> ReelResult<(Vec<SegmentUnit>, Vec<SkippedSegment>)> {
        let outcomes: Vec<ReelResult<Option<SegmentUnit>>> = if self.cfg.parallel_segments {
            segments
                .par_iter()
                .map(|s| {
                    self.cancel.check()?;
                    self.prepare_segment(s)
                })
                .collect()
        } else {
            let mut out = Vec::with_capacity(segments.len());
            for s in segments {
                self.cancel.check()?;
                out.push(self.prepare_segment(s));
            }
            out
        };

        let mut units = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for (segment, outcome) in segments.iter().zip(outcomes) {
            match outcome {
                Ok(Some(unit)) => units.push(unit),
                Ok(None) => {
                    tracing::info!(segment = segment.index, "segment has no narration, skipping");
                    skipped.push(SkippedSegment {
                        index: segment.index,
                        reason: "no narration text".to_owned(),
                    });
                }
                Err(e) if e.is_segment_local() => {
                    tracing::warn!(segment = segment.index, error = %e, "skipping segment");
                    skipped.push(SkippedSegment {
                        index: segment.index,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok((units, skipped))
    }

    /// Render `script` into `sink`.
    #[tracing::instrument(skip_all)]
    pub fn produce_video_into(
        &self,
        script: &str,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<RenderReport> {
        let segments = self.segments(script);
        tracing::info!(
            segments = segments.len(),
            parallel = self.cfg.parallel_segments,
            "preparing segments"
        );

        let (units, skipped) = self.prepare_units(&segments)?;
        if units.is_empty() {
            return Err(ReelError::empty_pipeline(format!(
                "all {} segment(s) were skipped",
                segments.len()
            )));
        }
        self.cancel.check()?;

        let indices: Vec<usize> = units.iter().map(SegmentUnit::index).collect();
        let report = assemble(units, sink, &AssemblyParams::from_config(&self.cfg))?;

        Ok(RenderReport {
            output: None,
            units: indices,
            skipped,
            total_frames: report.total_frames,
            duration_secs: report.duration_secs,
            font: self.renderer.font().clone(),
        })
    }

    /// Render `script` into an MP4 at `destination`.
    ///
    /// Nothing is written at `destination` unless the whole request succeeds.
    #[tracing::instrument(skip_all, fields(destination = %destination.display()))]
    pub fn produce_video(&self, script: &str, destination: &Path) -> ReelResult<RenderReport> {
        let opts = FfmpegSinkOpts::from_settings(
            destination,
            &self.cfg.encode,
            self.cfg.caption.background,
        );
        let mut sink = FfmpegSink::new(opts);
        let mut report = self.produce_video_into(script, &mut sink)?;
        report.output = Some(destination.to_path_buf());
        tracing::info!(
            output = %destination.display(),
            units = report.units.len(),
            skipped = report.skipped.len(),
            duration_secs = report.duration_secs,
            "video written"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ReelError::Cancelled)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        struct Mute;
        impl SpeechEngine for Mute {
            fn speak(
                &self,
                _text: &str,
                _language: &crate::config::LanguageCode,
            ) -> ReelResult<Option<crate::narration::engine::SpokenAudio>> {
                Ok(None)
            }
        }

        let mut cfg = PipelineConfig::default();
        cfg.caption.max_lines = 0;
        assert!(Pipeline::new(cfg, Arc::new(Mute)).is_err());
    }
}
