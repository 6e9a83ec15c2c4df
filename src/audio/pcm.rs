use std::io::Cursor;
use std::path::Path;

use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};

/// Default sample rate narration is resampled to before concatenation.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

#[derive(Clone, Debug, PartialEq)]
/// Decoded interleaved floating-point PCM.
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Interleaved `f32` PCM samples.
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// `frames` sample frames of silence.
    pub fn silence(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self {
            sample_rate,
            channels,
            interleaved_f32: vec![0.0; frames * usize::from(channels)],
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.interleaved_f32.len() / usize::from(self.channels)
    }

    /// Length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Pad with silence or trim so the buffer holds exactly `frames` sample frames.
    pub fn fit_to_frames(&mut self, frames: usize) {
        self.interleaved_f32
            .resize(frames * usize::from(self.channels), 0.0);
    }
}

/// Duration of a WAV byte buffer as stated by its header.
pub fn wav_duration_secs(bytes: &[u8]) -> ReelResult<f64> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| ReelError::synthesis(format!("speech output is not a valid WAV: {e}")))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(ReelError::synthesis("speech output has a zero sample rate"));
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

/// Decode a WAV file into interleaved `f32` PCM at its native rate and channel count.
pub fn decode_wav_file(path: &Path) -> ReelResult<AudioPcm> {
    let reader = hound::WavReader::open(path).map_err(|e| {
        ReelError::synthesis(format!("failed to open WAV '{}': {e}", path.display()))
    })?;
    decode_wav_reader(reader)
}

fn decode_wav_reader<R: std::io::Read>(reader: hound::WavReader<R>) -> ReelResult<AudioPcm> {
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(ReelError::synthesis(
            "WAV must have non-zero channels and sample rate",
        ));
    }

    let samples: Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect()
        }
    };
    let interleaved_f32 =
        samples.map_err(|e| ReelError::synthesis(format!("failed to read WAV samples: {e}")))?;

    Ok(AudioPcm {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        interleaved_f32,
    })
}

/// Linearly resample `pcm` to `sample_rate` and remix it to `channels` (1 or 2).
pub fn resample_linear(pcm: &AudioPcm, sample_rate: u32, channels: u16) -> ReelResult<AudioPcm> {
    if sample_rate == 0 || !(1..=2).contains(&channels) {
        return Err(ReelError::validation(
            "resample target must have a non-zero rate and 1 or 2 channels",
        ));
    }
    if pcm.sample_rate == 0 || pcm.channels == 0 {
        return Err(ReelError::validation("source PCM has no rate or channels"));
    }

    let src_frames = pcm.frames();
    let src_ch = usize::from(pcm.channels);
    let out_frames = ((src_frames as u128 * u128::from(sample_rate)
        + u128::from(pcm.sample_rate) / 2)
        / u128::from(pcm.sample_rate)) as usize;
    let mut out = Vec::with_capacity(out_frames * usize::from(channels));

    let src = pcm.interleaved_f32.as_slice();
    let step = f64::from(pcm.sample_rate) / f64::from(sample_rate);
    for i in 0..out_frames {
        let src_pos = i as f64 * step;
        let f0 = (src_pos.floor() as usize).min(src_frames.saturating_sub(1));
        let f1 = (f0 + 1).min(src_frames.saturating_sub(1));
        let frac = (src_pos - f0 as f64).clamp(0.0, 1.0) as f32;

        let at = |frame: usize, ch: usize| src[frame * src_ch + ch.min(src_ch - 1)];
        let lerp = |ch: usize| {
            let v0 = at(f0, ch);
            let v1 = at(f1, ch);
            v0 + (v1 - v0) * frac
        };

        let (l, r) = (lerp(0), lerp(1));
        if channels == 1 {
            out.push(if src_ch == 1 { l } else { (l + r) * 0.5 });
        } else {
            out.push(l);
            out.push(r);
        }
    }

    Ok(AudioPcm {
        sample_rate,
        channels,
        interleaved_f32: out,
    })
}

/// Concatenate PCM buffers that share one sample rate and channel count.
pub fn concat(parts: &[AudioPcm], sample_rate: u32, channels: u16) -> ReelResult<AudioPcm> {
    let total: usize = parts.iter().map(|p| p.interleaved_f32.len()).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        if part.sample_rate != sample_rate || part.channels != channels {
            return Err(ReelError::assembly(format!(
                "audio format mismatch: got {} Hz x{}, expected {sample_rate} Hz x{channels}",
                part.sample_rate, part.channels
            )));
        }
        out.extend_from_slice(&part.interleaved_f32);
    }
    Ok(AudioPcm {
        sample_rate,
        channels,
        interleaved_f32: out,
    })
}

/// Write interleaved `f32` PCM samples to raw little-endian `.f32le` file.
pub fn write_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> ReelResult<()> {
    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.clamp(-1.0, 1.0).to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        ReelError::assembly(format!(
            "failed to write audio track '{}': {e}",
            out_path.display()
        ))
    })
}

/// Convert a frame count to the nearest sample index at `sample_rate`.
pub fn frame_to_sample(frames: u64, fps: Fps, sample_rate: u32) -> u64 {
    let num = u128::from(frames) * u128::from(sample_rate) * u128::from(fps.den);
    let den = u128::from(fps.num);
    ((num + (den / 2)) / den) as u64
}
