use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use scriptreel::{
    CommandScriptSource, LanguageCode, LengthHint, Pipeline, PipelineConfig, placeholder_script,
    produce_script,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scriptreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Produce a segmented script for a topic.
    Script(ScriptArgs),
    /// Render a script into an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Print the default configuration as JSON.
    Config,
}

#[derive(Parser, Debug)]
struct ScriptArgs {
    /// Topic of the video.
    #[arg(long)]
    topic: String,

    /// Requested script length.
    #[arg(long, value_enum, default_value_t = LengthHint::Short)]
    length: LengthHint,

    /// Program that reads a prompt on stdin and prints a script. Without it the placeholder
    /// script is printed.
    #[arg(long)]
    program: Option<String>,

    /// Argument passed to `--program` (repeatable).
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Script language code.
    #[arg(long, default_value = "vi")]
    language: String,

    /// Write the script here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Script file, or `-` for stdin.
    #[arg(long)]
    script: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Pipeline configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the narration language.
    #[arg(long)]
    language: Option<String>,

    /// Override the caption font file.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Prepare segments in parallel.
    #[arg(long)]
    parallel: bool,

    /// Directory for temporary assets.
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Script(args) => cmd_script(args),
        Command::Render(args) => cmd_render(args),
        Command::Config => cmd_config(),
    }
}

fn cmd_script(args: ScriptArgs) -> anyhow::Result<()> {
    let script = match args.program {
        Some(program) => {
            let source =
                CommandScriptSource::new(program, args.args, LanguageCode::new(args.language));
            produce_script(&source, &args.topic, args.length)
        }
        None => placeholder_script(&args.topic),
    };

    match args.out {
        Some(path) => {
            std::fs::write(&path, &script)
                .with_context(|| format!("write script '{}'", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{script}"),
    }
    Ok(())
}

fn read_script(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .context("read script from stdin")?;
        return Ok(s);
    }
    std::fs::read_to_string(path).with_context(|| format!("read script '{}'", path.display()))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = match args.config.as_deref() {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(lang) = args.language {
        cfg.language = LanguageCode::new(lang);
    }
    if let Some(font) = args.font {
        cfg.caption.font_path = Some(font);
    }
    if args.parallel {
        cfg.parallel_segments = true;
    }
    if let Some(dir) = args.work_dir {
        cfg.work_dir = Some(dir);
    }

    let script = read_script(&args.script)?;
    let pipeline = Pipeline::with_command_engine(cfg)?;
    let report = pipeline.produce_video(&script, &args.out)?;

    for s in &report.skipped {
        eprintln!("skipped segment {}: {}", s.index, s.reason);
    }
    if report.font.is_fallback() {
        eprintln!("captions used the built-in fallback font");
    }
    eprintln!(
        "wrote {} ({} segment(s), {:.2}s)",
        args.out.display(),
        report.units.len(),
        report.duration_secs
    );
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&PipelineConfig::default())
        .context("serialize default config")?;
    println!("{json}");
    Ok(())
}
