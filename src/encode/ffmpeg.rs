use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::config::EncodeSettings;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex, FrameRGBA, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::temp::TempAsset;

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Final MP4 path.
    pub out_path: PathBuf,
    /// Replace `out_path` if it already exists.
    pub overwrite: bool,
    /// Color non-opaque pixels are flattened onto.
    pub bg_rgba: Rgba8,
    /// `-c:v` value.
    pub video_codec: String,
    /// `-c:a` value.
    pub audio_codec: String,
    /// `-pix_fmt` value for the encoded stream.
    pub pixel_format: String,
}

impl FfmpegSinkOpts {
    /// H.264/AAC MP4 written to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self::from_settings(out_path, &EncodeSettings::default(), Rgba8::BLACK)
    }

    /// Options mirroring the pipeline's encode settings.
    pub fn from_settings(out_path: impl Into<PathBuf>, enc: &EncodeSettings, bg: Rgba8) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: enc.overwrite,
            bg_rgba: bg,
            video_codec: enc.video_codec.clone(),
            audio_codec: enc.audio_codec.clone(),
            pixel_format: enc.pixel_format.clone(),
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw RGBA frames to its stdin.
///
/// ffmpeg writes to a staging file next to the destination. The staging file is renamed onto
/// `out_path` only after ffmpeg exits successfully, so an aborted or failed encode never leaves a
/// partial MP4 at the destination.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    staging: Option<TempAsset>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    /// Create a sink that encodes into `opts.out_path`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            staging: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
        }
    }

    /// Destination path.
    pub fn out_path(&self) -> &Path {
        &self.opts.out_path
    }

    fn kill_child(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(ReelError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(ReelError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(ReelError::validation(
                "ffmpeg sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(ReelError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(ReelError::assembly(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let out_dir = match self.opts.out_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staging = TempAsset::create_in(&out_dir, ".scriptreel-", ".partial.mp4")?;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // The staging file already exists (created empty), so always overwrite it.
        cmd.args(["-y", "-loglevel", "error"]);
        cmd.args([
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0"]);

        if let Some(audio) = cfg.audio.as_ref() {
            if audio.sample_rate == 0 || audio.channels == 0 {
                return Err(ReelError::validation(
                    "audio sample_rate and channels must be non-zero when audio is enabled",
                ));
            }
            cmd.args([
                "-f",
                "f32le",
                "-ar",
                &audio.sample_rate.to_string(),
                "-ac",
                &audio.channels.to_string(),
                "-i",
            ])
            .arg(&audio.path)
            .args(["-c:a", &self.opts.audio_codec]);
        } else {
            cmd.arg("-an");
        }
        cmd.args([
            "-c:v",
            &self.opts.video_codec,
            "-pix_fmt",
            &self.opts.pixel_format,
            "-movflags",
            "+faststart",
            "-f",
            "mp4",
        ]);
        cmd.arg(staging.path());

        tracing::debug!(
            width = cfg.width,
            height = cfg.height,
            fps = %format!("{}/{}", cfg.fps.num, cfg.fps.den),
            audio = cfg.audio.is_some(),
            staging = %staging.path().display(),
            "spawning ffmpeg"
        );

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::assembly(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::assembly("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::assembly("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.scratch = vec![0u8; cfg.width as usize * cfg.height as usize * 4];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.staging = Some(staging);
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| ReelError::assembly("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(ReelError::assembly(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }

        flatten_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            frame.premultiplied,
            self.opts.bg_rgba,
        )?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::assembly("ffmpeg sink is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            ReelError::assembly(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn end(&mut self) -> ReelResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| ReelError::assembly("ffmpeg sink not started"))?;

        let status = child
            .wait()
            .map_err(|e| ReelError::assembly(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ReelError::assembly("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ReelError::assembly(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        self.cfg = None;

        let staging = self
            .staging
            .take()
            .ok_or_else(|| ReelError::assembly("ffmpeg staging file missing"))?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(ReelError::assembly(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        if let Err(e) = std::fs::rename(staging.path(), &self.opts.out_path) {
            return Err(ReelError::assembly(format!(
                "failed to move encoded video to '{}': {e}",
                self.opts.out_path.display()
            )));
        }
        staging.persist();
        tracing::debug!(out = %self.opts.out_path.display(), "ffmpeg finished");
        Ok(())
    }

    fn abort(&mut self) {
        self.kill_child();
        self.cfg = None;
        if let Some(staging) = self.staging.take()
            && let Err(e) = staging.release()
        {
            tracing::warn!(error = %e, "failed to remove partial video");
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.kill_child();
        }
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // rawvideo input takes its rate from `-r` before `-i`.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

/// Flatten RGBA8 pixels over an opaque background.
fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg: Rgba8,
) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "frame data size mismatch with width*height*4",
        ));
    }

    let bg_r = u16::from(bg.r);
    let bg_g = u16::from(bg.g);
    let bg_b = u16::from(bg.b);

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255 - a;
        let (r, g, b) = if src_is_premul {
            (u16::from(s[0]), u16::from(s[1]), u16::from(s[2]))
        } else {
            (
                mul_div255(u16::from(s[0]), a),
                mul_div255(u16::from(s[1]), a),
                mul_div255(u16::from(s[2]), a),
            )
        };
        d[0] = (r + mul_div255(bg_r, inv)).min(255) as u8;
        d[1] = (g + mul_div255(bg_g, inv)).min(255) as u8;
        d[2] = (b + mul_div255(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    ((u32::from(x) * u32::from(y) + 127) / 255) as u16
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BG: Rgba8 = Rgba8::rgb(10, 20, 30);

    #[test]
    fn transparent_pixel_becomes_background() {
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &[200, 100, 50, 0], false, BG).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 255]);
        flatten_to_opaque_rgba8(&mut dst, &[0, 0, 0, 0], true, BG).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 255]);
    }

    #[test]
    fn opaque_pixel_is_identity() {
        let src = vec![1u8, 2, 3, 255];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, false, BG).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn straight_and_premultiplied_half_alpha_agree() {
        let mut a = vec![0u8; 4];
        let mut b = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut a, &[200, 0, 0, 128], false, Rgba8::BLACK).unwrap();
        flatten_to_opaque_rgba8(&mut b, &[100, 0, 0, 128], true, Rgba8::BLACK).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut dst = vec![0u8; 8];
        assert!(flatten_to_opaque_rgba8(&mut dst, &[0u8; 4], false, BG).is_err());
    }

    #[test]
    fn odd_dimensions_are_rejected_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(dir.path().join("out.mp4")));
        let err = sink
            .begin(SinkConfig {
                width: 63,
                height: 36,
                fps: Fps::default(),
                audio: None,
            })
            .unwrap_err();
        assert!(matches!(err, ReelError::Validation(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn refuses_existing_output_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        std::fs::write(&out, b"keep").unwrap();
        let mut opts = FfmpegSinkOpts::new(&out);
        opts.overwrite = false;
        let mut sink = FfmpegSink::new(opts);
        assert!(
            sink.begin(SinkConfig {
                width: 64,
                height: 36,
                fps: Fps::default(),
                audio: None,
            })
            .is_err()
        );
        assert_eq!(std::fs::read(&out).unwrap(), b"keep");
    }
}
