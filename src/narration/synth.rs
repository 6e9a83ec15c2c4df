use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::LanguageCode;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::temp::TempAsset;
use crate::narration::engine::SpeechEngine;

/// Synthesized narration for one segment, backed by a temporary WAV file.
///
/// Dropping the asset deletes the file.
#[derive(Debug)]
pub struct AudioAsset {
    file: TempAsset,
    duration_secs: f64,
}

impl AudioAsset {
    pub(crate) fn new(file: TempAsset, duration_secs: f64) -> Self {
        Self {
            file,
            duration_secs,
        }
    }

    /// Path of the WAV file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Duration reported by the speech engine.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Delete the backing file.
    pub fn release(self) -> ReelResult<()> {
        self.file.release()
    }
}

/// Turns segment text into [`AudioAsset`]s through a [`SpeechEngine`].
#[derive(Clone)]
pub struct NarrationSynthesizer {
    engine: Arc<dyn SpeechEngine>,
    work_dir: PathBuf,
}

impl NarrationSynthesizer {
    /// Create a synthesizer writing assets into `work_dir`.
    pub fn new(engine: Arc<dyn SpeechEngine>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            work_dir: work_dir.into(),
        }
    }

    /// Synthesize `text`. Returns `Ok(None)` when there is nothing to say.
    pub fn synthesize(
        &self,
        text: &str,
        language: &LanguageCode,
    ) -> ReelResult<Option<AudioAsset>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let Some(spoken) = self.engine.speak(text, language)? else {
            return Ok(None);
        };
        if !spoken.duration_secs.is_finite() || spoken.duration_secs <= 0.0 {
            return Err(ReelError::synthesis(format!(
                "speech engine reported an unusable duration of {}s",
                spoken.duration_secs
            )));
        }

        let file = TempAsset::create_in(&self.work_dir, "scriptreel-narration-", ".wav")?;
        std::fs::write(file.path(), &spoken.wav_bytes).map_err(|e| {
            ReelError::synthesis(format!(
                "failed to store narration '{}': {e}",
                file.path().display()
            ))
        })?;

        tracing::debug!(
            path = %file.path().display(),
            duration_secs = spoken.duration_secs,
            "narration synthesized"
        );
        Ok(Some(AudioAsset::new(file, spoken.duration_secs)))
    }
}
