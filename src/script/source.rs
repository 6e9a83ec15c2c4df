use std::io::{Read as _, Write as _};
use std::process::{Command, Stdio};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::config::LanguageCode;
use crate::foundation::error::{ReelError, ReelResult};

/// Requested script length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LengthHint {
    /// Roughly five minutes of narration.
    #[default]
    Short,
    /// Ten minutes or more.
    Long,
}

impl LengthHint {
    fn describe(self) -> &'static str {
        match self {
            Self::Short => "short (about 5 minutes, 1000 words)",
            Self::Long => "long (10+ minutes, about 2000 words)",
        }
    }
}

/// Produces script text for a topic.
pub trait ScriptSource {
    /// Generate a script for `topic`.
    fn generate(&self, topic: &str, length: LengthHint) -> ReelResult<String>;
}

impl<F> ScriptSource for F
where
    F: Fn(&str, LengthHint) -> ReelResult<String>,
{
    fn generate(&self, topic: &str, length: LengthHint) -> ReelResult<String> {
        self(topic, length)
    }
}

/// Deterministic script used when no source is available.
pub fn placeholder_script(topic: &str) -> String {
    format!(
        "# Sample script\n\
         [SEGMENT 1] Intro: Welcome to this video about {topic}!\n\
         [SEGMENT 2] Part 1: The basics explained...\n\
         (Configure a script source to generate the real thing!)"
    )
}

/// Ask `source` for a script, falling back to [`placeholder_script`] on any failure.
#[tracing::instrument(skip(source))]
pub fn produce_script(source: &dyn ScriptSource, topic: &str, length: LengthHint) -> String {
    match source.generate(topic, length) {
        Ok(script) if !script.trim().is_empty() => script,
        Ok(_) => {
            tracing::warn!("script source returned empty text, using placeholder");
            placeholder_script(topic)
        }
        Err(e) => {
            tracing::warn!(error = %e, "script source failed, using placeholder");
            placeholder_script(topic)
        }
    }
}

/// Instruction text sent to a language-model backed source.
pub fn generation_prompt(topic: &str, length: LengthHint, language: &LanguageCode) -> String {
    format!(
        "Write a {len} video narration script about: {topic}.\n\
         Structure:\n\
         - Intro (30 second hook)\n\
         - Body (3-5 main parts, detailed)\n\
         - Outro (call to action)\n\
         Label every part on its own line as [SEGMENT 1], [SEGMENT 2], ... so it can be split.\n\
         Tone: friendly and engaging. Language code: {language}.",
        len = length.describe(),
    )
}

/// Script source backed by an external program.
///
/// The generation prompt is written to the program's stdin and its stdout is taken as the script.
#[derive(Clone, Debug)]
pub struct CommandScriptSource {
    program: String,
    args: Vec<String>,
    language: LanguageCode,
}

impl CommandScriptSource {
    /// Create a source that runs `program` with `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>, language: LanguageCode) -> Self {
        Self {
            program: program.into(),
            args,
            language,
        }
    }
}

impl ScriptSource for CommandScriptSource {
    fn generate(&self, topic: &str, length: LengthHint) -> ReelResult<String> {
        let prompt = generation_prompt(topic, length, &self.language);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .context("failed to open script source stdin")?;
        stdin
            .write_all(prompt.as_bytes())
            .context("failed to write prompt")?;
        drop(stdin);

        let mut stderr = child
            .stderr
            .take()
            .context("failed to open script source stderr")?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes).map(|_| bytes)
        });

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for '{}'", self.program))?;
        let stderr_bytes = stderr_drain.join().ok().and_then(Result::ok).unwrap_or_default();

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "'{}' exited with status {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )
            .into());
        }
        let script = String::from_utf8(output.stdout).context("script is not valid UTF-8")?;
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_source_falls_back_to_placeholder() {
        let failing = |_: &str, _: LengthHint| -> ReelResult<String> {
            Err(ReelError::validation("service unavailable"))
        };
        let script = produce_script(&failing, "sourdough", LengthHint::Long);
        assert_eq!(script, placeholder_script("sourdough"));
        assert!(script.contains("[SEGMENT 1]"));
        assert!(script.contains("sourdough"));
    }

    #[test]
    fn blank_script_falls_back_to_placeholder() {
        let blank = |_: &str, _: LengthHint| -> ReelResult<String> { Ok("  \n".to_owned()) };
        assert_eq!(produce_script(&blank, "t", LengthHint::Short), placeholder_script("t"));
    }

    #[test]
    fn successful_source_passes_through() {
        let ok = |topic: &str, _: LengthHint| -> ReelResult<String> {
            Ok(format!("[SEGMENT 1] {topic}"))
        };
        assert_eq!(produce_script(&ok, "rust", LengthHint::Short), "[SEGMENT 1] rust");
    }

    #[test]
    fn placeholder_is_deterministic() {
        assert_eq!(placeholder_script("a"), placeholder_script("a"));
    }

    #[test]
    fn prompt_mentions_topic_language_and_labels() {
        let p = generation_prompt("pho", LengthHint::Long, &LanguageCode::new("vi"));
        assert!(p.contains("pho"));
        assert!(p.contains("vi"));
        assert!(p.contains("[SEGMENT 1]"));
        assert!(p.contains("10+ minutes"));
    }

    #[test]
    fn missing_program_is_an_error() {
        let src = CommandScriptSource::new(
            "scriptreel-definitely-not-installed",
            vec![],
            LanguageCode::default(),
        );
        let err = src.generate("x", LengthHint::Short).unwrap_err();
        assert!(matches!(err, ReelError::Other(_)), "{err}");
        assert!(err.to_string().contains("scriptreel-definitely-not-installed"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_reports_status_and_stderr() {
        let src = CommandScriptSource::new(
            "sh",
            vec!["-c".to_owned(), "cat >/dev/null; echo quota exceeded >&2; exit 3".to_owned()],
            LanguageCode::default(),
        );
        let err = src.generate("x", LengthHint::Short).unwrap_err();
        assert!(matches!(err, ReelError::Other(_)), "{err}");
        assert!(format!("{err:#}").contains("quota exceeded"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_output_is_an_error() {
        let src = CommandScriptSource::new(
            "sh",
            vec!["-c".to_owned(), "cat >/dev/null; printf '\\377\\376'".to_owned()],
            LanguageCode::default(),
        );
        let err = src.generate("x", LengthHint::Short).unwrap_err();
        assert!(matches!(err, ReelError::Other(_)), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn command_source_reads_stdout() {
        let src = CommandScriptSource::new(
            "sh",
            vec!["-c".to_owned(), "cat >/dev/null; printf '[SEGMENT 1] hi'".to_owned()],
            LanguageCode::default(),
        );
        assert_eq!(src.generate("x", LengthHint::Short).unwrap(), "[SEGMENT 1] hi");
    }
}
