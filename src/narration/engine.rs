use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::audio::pcm::wav_duration_secs;
use crate::config::{LanguageCode, SpeechSettings};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::temp::TempAsset;

/// Audio produced by a [`SpeechEngine`] for one piece of text.
#[derive(Clone, Debug)]
pub struct SpokenAudio {
    /// Complete WAV file bytes.
    pub wav_bytes: Vec<u8>,
    /// Length in seconds as measured by the engine.
    pub duration_secs: f64,
}

/// Text-to-speech backend.
///
/// Implementations must treat empty or whitespace-only text as a no-op and return `Ok(None)`.
pub trait SpeechEngine: Send + Sync {
    /// Speak `text` in `language`.
    fn speak(&self, text: &str, language: &LanguageCode) -> ReelResult<Option<SpokenAudio>>;
}

/// Speech engine that runs an external TTS program.
///
/// The program receives the text on stdin and must write a WAV file to the `{out}` argument.
/// Duration is read from the WAV header the program wrote.
#[derive(Clone, Debug)]
pub struct CommandSpeechEngine {
    program: String,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl CommandSpeechEngine {
    /// Create an engine from speech settings; scratch files go to `work_dir`.
    pub fn new(settings: &SpeechSettings, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
            work_dir: work_dir.into(),
        }
    }

    fn expand_args(&self, language: &LanguageCode, out: &Path) -> Vec<String> {
        let out = out.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace("{lang}", language.as_str()).replace("{out}", &out))
            .collect()
    }
}

impl SpeechEngine for CommandSpeechEngine {
    fn speak(&self, text: &str, language: &LanguageCode) -> ReelResult<Option<SpokenAudio>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let scratch = TempAsset::create_in(&self.work_dir, "scriptreel-tts-", ".wav")?;
        let mut child = Command::new(&self.program)
            .args(self.expand_args(language, scratch.path()))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReelError::synthesis(format!(
                    "failed to spawn speech program '{}' (is it installed and on PATH?): {e}",
                    self.program
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::synthesis("failed to open speech program stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::synthesis("failed to open speech program stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes).map(|_| bytes)
        });

        let write_result = stdin.write_all(text.as_bytes());
        drop(stdin);

        let status = child
            .wait()
            .map_err(|e| ReelError::synthesis(format!("failed to wait for speech program: {e}")))?;
        let stderr_bytes = stderr_drain
            .join()
            .map_err(|_| ReelError::synthesis("speech stderr drain thread panicked"))?
            .unwrap_or_default();

        if !status.success() {
            return Err(ReelError::synthesis(format!(
                "speech program exited with status {status}: {}",
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        write_result
            .map_err(|e| ReelError::synthesis(format!("failed to send text to speech program: {e}")))?;

        let wav_bytes = std::fs::read(scratch.path()).map_err(|e| {
            ReelError::synthesis(format!(
                "failed to read speech output '{}': {e}",
                scratch.path().display()
            ))
        })?;
        let duration_secs = wav_duration_secs(&wav_bytes)?;
        scratch.release()?;

        Ok(Some(SpokenAudio {
            wav_bytes,
            duration_secs,
        }))
    }
}
