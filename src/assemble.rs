//! Concatenation of segment units into one continuous video stream.

use std::borrow::Cow;
use std::path::PathBuf;

use crate::audio::pcm::{AudioPcm, concat, frame_to_sample, write_f32le_file};
use crate::config::PipelineConfig;
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRGBA, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::temp::TempAsset;
use crate::unit::SegmentUnit;

/// Output parameters for [`assemble`].
#[derive(Clone, Debug)]
pub struct AssemblyParams {
    /// Output frame rate.
    pub fps: Fps,
    /// Output canvas; frames of other sizes are centered onto it.
    pub canvas: Canvas,
    /// Fill color for canvas areas not covered by a unit frame.
    pub background: Rgba8,
    /// Audio track sample rate.
    pub sample_rate: u32,
    /// Audio track channel count.
    pub channels: u16,
    /// Directory for the intermediate audio track.
    pub work_dir: PathBuf,
}

impl AssemblyParams {
    /// Parameters derived from a pipeline configuration.
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            fps: cfg.encode.fps,
            canvas: cfg.caption.canvas,
            background: cfg.caption.background,
            sample_rate: cfg.encode.sample_rate,
            channels: cfg.encode.channels,
            work_dir: cfg.work_dir(),
        }
    }
}

/// Summary of one assembled video.
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyReport {
    /// Units concatenated, in order.
    pub unit_count: usize,
    /// Video frames written.
    pub total_frames: u64,
    /// Video duration (`total_frames / fps`).
    pub duration_secs: f64,
    /// Audio sample frames written, aligned to the video duration.
    pub audio_frames: u64,
}

/// Half-open frame range `[start, end)` each unit occupies in the output timeline.
///
/// Boundaries are rounded from the running sum of durations, so the error never accumulates past
/// half a frame.
pub fn frame_ranges(units: &[SegmentUnit], fps: Fps) -> Vec<(u64, u64)> {
    let mut ranges = Vec::with_capacity(units.len());
    let mut elapsed = 0.0f64;
    let mut start = 0u64;
    for unit in units {
        elapsed += unit.duration_secs();
        let end = fps.secs_to_frames_round(elapsed).max(start);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Concatenate `units` in order and stream them through `sink`.
///
/// The audio tracks are concatenated separately, padded or trimmed to the video's frame-aligned
/// length, and handed to the sink as a raw `f32le` file that is deleted afterwards. On any
/// failure the sink is aborted.
#[tracing::instrument(skip_all, fields(units = units.len()))]
pub fn assemble(
    units: Vec<SegmentUnit>,
    sink: &mut dyn FrameSink,
    params: &AssemblyParams,
) -> ReelResult<AssemblyReport> {
    if units.is_empty() {
        return Err(ReelError::empty_pipeline("no segment units"));
    }

    if let Some(u) = units.iter().find(|u| u.fps() != params.fps) {
        return Err(ReelError::assembly(format!(
            "segment {} was built at {}/{} fps, output is {}/{} fps",
            u.index(),
            u.fps().num,
            u.fps().den,
            params.fps.num,
            params.fps.den
        )));
    }

    let ranges = frame_ranges(&units, params.fps);
    let total_frames = ranges.last().map_or(0, |r| r.1);
    if total_frames == 0 {
        return Err(ReelError::empty_pipeline(
            "segment units are shorter than one frame",
        ));
    }

    let pcm: Vec<AudioPcm> = units.iter().map(|u| u.audio().clone()).collect();
    let mut track = concat(&pcm, params.sample_rate, params.channels)?;
    drop(pcm);
    let audio_frames = frame_to_sample(total_frames, params.fps, params.sample_rate);
    track.fit_to_frames(audio_frames as usize);

    let audio_file = write_track(&track, params).map_err(into_assembly)?;
    drop(track);

    let result = stream(&units, &ranges, sink, params, audio_file.path().to_path_buf());
    if let Err(e) = audio_file.release() {
        tracing::warn!(error = %e, "failed to remove audio track");
    }

    match result {
        Ok(()) => {
            let report = AssemblyReport {
                unit_count: units.len(),
                total_frames,
                duration_secs: params.fps.frames_to_secs(total_frames),
                audio_frames,
            };
            tracing::info!(
                units = report.unit_count,
                frames = report.total_frames,
                duration_secs = report.duration_secs,
                "assembled video"
            );
            Ok(report)
        }
        Err(e) => {
            sink.abort();
            Err(into_assembly(e))
        }
    }
}

fn write_track(track: &AudioPcm, params: &AssemblyParams) -> ReelResult<TempAsset> {
    let file = TempAsset::create_in(&params.work_dir, "scriptreel-track-", ".f32le")?;
    write_f32le_file(&track.interleaved_f32, file.path())?;
    Ok(file)
}

fn into_assembly(e: ReelError) -> ReelError {
    match e {
        ReelError::Assembly(_) => e,
        other => ReelError::assembly(other.to_string()),
    }
}

fn stream(
    units: &[SegmentUnit],
    ranges: &[(u64, u64)],
    sink: &mut dyn FrameSink,
    params: &AssemblyParams,
    audio_path: PathBuf,
) -> ReelResult<()> {
    sink.begin(SinkConfig {
        width: params.canvas.width,
        height: params.canvas.height,
        fps: params.fps,
        audio: Some(AudioInputConfig {
            path: audio_path,
            sample_rate: params.sample_rate,
            channels: params.channels,
        }),
    })?;

    for (unit, &(start, end)) in units.iter().zip(ranges) {
        if start == end {
            tracing::debug!(segment = unit.index(), "unit shorter than half a frame");
            continue;
        }
        let frame = fit_to_canvas(unit.frame(), params.canvas, params.background);
        for f in start..end {
            sink.push_frame(FrameIndex(f), &frame)?;
        }
    }

    sink.end()
}

/// Return `frame` unchanged if it matches `canvas`, otherwise centered on a filled canvas.
///
/// Larger frames are cropped around their center.
pub fn fit_to_canvas(frame: &FrameRGBA, canvas: Canvas, background: Rgba8) -> Cow<'_, FrameRGBA> {
    if frame.width == canvas.width && frame.height == canvas.height {
        return Cow::Borrowed(frame);
    }

    let mut out = FrameRGBA::solid(canvas, background);
    out.premultiplied = frame.premultiplied;

    let off_x = (i64::from(canvas.width) - i64::from(frame.width)) / 2;
    let off_y = (i64::from(canvas.height) - i64::from(frame.height)) / 2;

    let x0 = off_x.max(0);
    let x1 = (off_x + i64::from(frame.width)).min(i64::from(canvas.width));
    if x1 <= x0 {
        return Cow::Owned(out);
    }
    let row_bytes = (x1 - x0) as usize * 4;

    for dy in 0..i64::from(canvas.height) {
        let sy = dy - off_y;
        if sy < 0 || sy >= i64::from(frame.height) {
            continue;
        }
        let sx = x0 - off_x;
        let src = (sy as usize * frame.width as usize + sx as usize) * 4;
        let dst = (dy as usize * canvas.width as usize + x0 as usize) * 4;
        out.data[dst..dst + row_bytes].copy_from_slice(&frame.data[src..src + row_bytes]);
    }
    Cow::Owned(out)
}
