//! Segment unit builder: one caption still + one narration track = one timed clip.

use std::sync::Arc;

use crate::audio::pcm::{AudioPcm, decode_wav_file, resample_linear};
use crate::caption::render::CaptionAsset;
use crate::config::EncodeSettings;
use crate::foundation::core::{Fps, FrameRGBA};
use crate::foundation::error::{ReelError, ReelResult};
use crate::narration::synth::AudioAsset;

/// A timed audio/video clip for one segment.
///
/// The caption frame is shown for the whole duration; `audio` holds exactly `duration_secs` of
/// PCM at the output sample rate.
#[derive(Clone, Debug)]
pub struct SegmentUnit {
    index: usize,
    frame: Arc<FrameRGBA>,
    audio: AudioPcm,
    duration_secs: f64,
    fps: Fps,
}

impl SegmentUnit {
    /// Create a unit from already decoded parts.
    pub fn new(
        index: usize,
        frame: FrameRGBA,
        audio: AudioPcm,
        duration_secs: f64,
        fps: Fps,
    ) -> ReelResult<Self> {
        validate_duration(duration_secs)?;
        Ok(Self {
            index,
            frame: Arc::new(frame),
            audio,
            duration_secs,
            fps,
        })
    }

    /// Segment index this unit was built from.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Still frame shown for the unit's duration.
    pub fn frame(&self) -> &FrameRGBA {
        &self.frame
    }

    /// Narration PCM.
    pub fn audio(&self) -> &AudioPcm {
        &self.audio
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Frame rate the unit was built for.
    pub fn fps(&self) -> Fps {
        self.fps
    }
}

fn validate_duration(duration_secs: f64) -> ReelResult<()> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(ReelError::validation(format!(
            "segment unit duration must be finite and > 0, got {duration_secs}"
        )));
    }
    Ok(())
}

/// Builds [`SegmentUnit`]s at the configured frame rate and audio format.
#[derive(Clone, Copy, Debug)]
pub struct UnitBuilder {
    fps: Fps,
    sample_rate: u32,
    channels: u16,
}

impl UnitBuilder {
    /// Builder for the given encode settings.
    pub fn new(encode: &EncodeSettings) -> Self {
        Self {
            fps: encode.fps,
            sample_rate: encode.sample_rate,
            channels: encode.channels,
        }
    }

    /// Bind `audio` and `caption` into a unit, consuming both assets.
    ///
    /// Both temporary files are deleted whether or not the build succeeds.
    pub fn build(
        &self,
        index: usize,
        audio: AudioAsset,
        caption: CaptionAsset,
    ) -> ReelResult<SegmentUnit> {
        let duration_secs = audio.duration_secs();
        validate_duration(duration_secs)?;
        if caption.duration_secs() != duration_secs {
            return Err(ReelError::validation(format!(
                "caption duration {}s does not match narration duration {duration_secs}s",
                caption.duration_secs()
            )));
        }

        let frame = load_frame(&caption)?;
        let native = decode_wav_file(audio.path())?;
        let mut pcm = resample_linear(&native, self.sample_rate, self.channels)?;
        let frames = (duration_secs * f64::from(self.sample_rate)).round() as usize;
        pcm.fit_to_frames(frames);

        if let Err(e) = audio.release() {
            tracing::warn!(segment = index, error = %e, "failed to remove narration file");
        }
        if let Err(e) = caption.release() {
            tracing::warn!(segment = index, error = %e, "failed to remove caption file");
        }

        SegmentUnit::new(index, frame, pcm, duration_secs, self.fps)
    }
}

fn load_frame(caption: &CaptionAsset) -> ReelResult<FrameRGBA> {
    let img = image::open(caption.path())
        .map_err(|e| {
            ReelError::render(format!(
                "failed to load caption '{}': {e}",
                caption.path().display()
            ))
        })?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok(FrameRGBA {
        width,
        height,
        data: img.into_raw(),
        premultiplied: false,
    })
}
