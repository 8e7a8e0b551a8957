use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use clearcast_contracts::assets::{AspectRatio, Asset, Mode};
use clearcast_contracts::events::{payload, EventWriter};
use clearcast_contracts::history::{History, HistoryEntry};
use clearcast_contracts::keys::KeyProvider;
use clearcast_contracts::repl::{help_lines, parse_command, SessionCommand};
use clearcast_engine::download::{download_name, save_asset};
use clearcast_engine::errors::classify_fault;
use clearcast_engine::transport::build_http_client;
use clearcast_engine::{
    CancelToken, Completion, GeminiImageEditor, GenerationConfig, SelectableKeyProvider, Session,
    SessionError, VeoVideoGenerator, VideoGenerator,
};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "clearcast", version, about = "Watermark removal for images and videos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clean one image and save the result.
    Edit(EditArgs),
    /// Generate one watermark-free video from a prompt.
    Video(VideoArgs),
    /// Interactive session with history.
    Session(SessionArgs),
}

#[derive(Debug, Parser)]
struct ModelArgs {
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    video_model: Option<String>,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    instruction: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Debug, Parser)]
struct VideoArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "16:9")]
    aspect_ratio: AspectRatio,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value = "image")]
    mode: Mode,
    #[command(flatten)]
    models: ModelArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("clearcast error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Edit(args) => run_edit(args),
        Command::Video(args) => run_video(args),
        Command::Session(args) => run_session(args),
    }
}

struct Runtime {
    config: GenerationConfig,
    events: EventWriter,
    editor: GeminiImageEditor,
    generator: VeoVideoGenerator,
    keys: SelectableKeyProvider,
}

impl Runtime {
    fn new(out: &Path, events: Option<&Path>, models: &ModelArgs) -> Result<Self> {
        let config = resolve_config(GenerationConfig::from_env(), models);
        let events_path = events
            .map(Path::to_path_buf)
            .unwrap_or_else(|| out.join("events.jsonl"));
        let events = EventWriter::new(events_path, format!("session-{}", now_millis()));
        events.emit(
            "session_started",
            payload(json!({
                "image_model": config.image_model,
                "video_model": config.video_model,
                "api_base": config.api_base,
                "poll_interval_s": config.poll.interval.as_secs_f64(),
            })),
        )?;
        Ok(Self {
            editor: GeminiImageEditor::new(&config)?,
            generator: VeoVideoGenerator::new(&config)?.with_events(events.clone()),
            keys: SelectableKeyProvider::from_env(prompt_for_key),
            config,
            events,
        })
    }

    fn session(&self, mode: Mode) -> Session {
        Session::new(mode).with_events(self.events.clone())
    }

    fn save(&self, mode: Mode, asset: &Asset, timestamp_millis: i64, out: &Path) -> Result<PathBuf> {
        let http = build_http_client(self.config.request_timeout)?;
        let name = download_name(mode, timestamp_millis, asset);
        save_asset(&http, asset, out, &name)
    }
}

fn resolve_config(mut config: GenerationConfig, models: &ModelArgs) -> GenerationConfig {
    if let Some(model) = non_empty(models.image_model.as_deref()) {
        config.image_model = model;
    }
    if let Some(model) = non_empty(models.video_model.as_deref()) {
        config.video_model = model;
    }
    config
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let runtime = Runtime::new(&args.out, args.events.as_deref(), &args.models)?;
    let mut session = runtime.session(Mode::Image);
    session.load_file(&args.input)?;
    if let Some(instruction) = non_empty(args.instruction.as_deref()) {
        session.set_instruction(instruction);
    }

    println!("Cleaning {} with {}...", args.input.display(), runtime.editor.model());
    match session.start_processing(&runtime.editor, &runtime.generator, &runtime.keys) {
        Completion::ResultReady => {
            let Some(result) = session.result() else {
                bail!("session reported a result but holds none");
            };
            let stamp = result_timestamp(session.history(), result).unwrap_or_else(now_millis);
            let path = runtime.save(Mode::Image, result, stamp, &args.out)?;
            println!("Saved {}", path.display());
            Ok(0)
        }
        Completion::Failed(err) => {
            eprintln!("{err}");
            Ok(1)
        }
        other => bail!("edit did not finish: {other:?}"),
    }
}

fn run_video(args: VideoArgs) -> Result<i32> {
    let runtime = Runtime::new(&args.out, args.events.as_deref(), &args.models)?;
    if !runtime.keys.has_key() {
        runtime.keys.prompt_key_selection();
    }
    let Some(key) = runtime.keys.current_key() else {
        bail!("no API key selected; set GEMINI_API_KEY or enter one when prompted");
    };

    println!(
        "Submitting {} video job to {} (this usually takes a few minutes)...",
        args.aspect_ratio,
        runtime.generator.model()
    );
    let video = match runtime.generator.generate_video(
        &key,
        &args.prompt,
        args.aspect_ratio,
        &CancelToken::new(),
    ) {
        Ok(Some(video)) => video,
        Ok(None) => {
            eprintln!("{}", SessionError::EmptyResult(Mode::Video));
            return Ok(1);
        }
        Err(err) => {
            let classified = classify_fault(&err);
            runtime.events.emit(
                "remote_fault",
                payload(json!({ "kind": classified.kind(), "error": format!("{err:#}") })),
            )?;
            eprintln!("{classified}");
            return Ok(1);
        }
    };
    let path = runtime.save(Mode::Video, &video, now_millis(), &args.out)?;
    println!("Saved {}", path.display());
    Ok(0)
}

fn run_session(args: SessionArgs) -> Result<i32> {
    let runtime = Runtime::new(&args.out, args.events.as_deref(), &args.models)?;
    let mut session = runtime.session(args.mode);

    let stdin = io::stdin();
    let mut line = String::new();
    println!("Clearcast session started in {} mode. Type /help for commands.", session.mode());

    loop {
        print!("{}> ", session.mode());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.lock().read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_command(line.trim_end_matches(['\n', '\r'])) {
            SessionCommand::Noop => {}
            SessionCommand::Help => {
                println!("Commands: {}", help_lines().join(" "));
                println!("Any other text replaces the instruction.");
            }
            SessionCommand::Quit => break,
            SessionCommand::SelectMode(mode) => {
                session.select_mode(mode);
                println!(
                    "Mode set to {mode}. Load a {} file with /load <path>.",
                    mode.accept_pattern()
                );
            }
            SessionCommand::LoadSource(path) => match session.load_file(Path::new(&path)) {
                Ok(()) => println!("Loaded {path}"),
                Err(err) => println!("{err}"),
            },
            SessionCommand::SetInstruction(text) => {
                session.set_instruction(text);
                println!("Instruction updated.");
            }
            SessionCommand::ResetInstruction => {
                session.reset_instruction();
                println!("Instruction reset: {}", session.instruction());
            }
            SessionCommand::SetAspectRatio(aspect_ratio) => {
                if session.mode() != Mode::Video {
                    println!("/aspect only applies in video mode");
                } else {
                    session.set_aspect_ratio(aspect_ratio);
                    println!("Aspect ratio: {}", session.aspect_ratio());
                }
            }
            SessionCommand::StartProcessing => {
                if session.mode() == Mode::Video {
                    println!("Generating video; polling until the job finishes...");
                }
                match session.start_processing(&runtime.editor, &runtime.generator, &runtime.keys)
                {
                    Completion::Ignored => println!("Load a file first with /load <path>."),
                    Completion::ResultReady => {
                        println!("Result ready. /download to save it, or type a new instruction and /refine.");
                    }
                    Completion::Failed(err) => println!("{err}"),
                    Completion::Cancelled | Completion::Stale => println!("Processing was abandoned."),
                }
            }
            SessionCommand::Discard => {
                session.discard();
                println!("Discarded. History kept ({} entries).", session.history().len());
            }
            SessionCommand::ListHistory => {
                if session.history().is_empty() {
                    println!("History is empty.");
                }
                for (index, entry) in session.history().iter().enumerate() {
                    println!("{}", history_line(index, entry));
                }
            }
            SessionCommand::SelectHistoryEntry(index) => {
                if session.select_history_entry(index) {
                    println!("Restored history entry {}.", index + 1);
                } else {
                    println!("No history entry {}.", index + 1);
                }
            }
            SessionCommand::Download(dir) => {
                let Some(result) = session.result() else {
                    println!("Nothing to download yet.");
                    continue;
                };
                let target = dir.map(PathBuf::from).unwrap_or_else(|| args.out.clone());
                let stamp = result_timestamp(session.history(), result).unwrap_or_else(now_millis);
                match runtime.save(session.mode(), result, stamp, &target) {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(err) => println!("Download failed: {err:#}"),
                }
            }
            SessionCommand::Status => {
                for line in status_lines(&session) {
                    println!("{line}");
                }
            }
            SessionCommand::Invalid { command, reason } => println!("/{command}: {reason}"),
            SessionCommand::Unknown { command, .. } => {
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }

    Ok(0)
}

fn history_line(index: usize, entry: &HistoryEntry) -> String {
    format!(
        "{:>3}. [{}] {} {} -> {}",
        index + 1,
        entry.mode,
        entry.created_at_iso(),
        describe_asset(&entry.original),
        describe_asset(&entry.edited),
    )
}

/// Creation time of the history entry that produced `result`, so a restored
/// entry downloads under its original timestamp.
fn result_timestamp(history: &History, result: &Asset) -> Option<i64> {
    history
        .iter()
        .find(|entry| &entry.edited == result)
        .map(HistoryEntry::timestamp_millis)
}

fn status_lines(session: &Session) -> Vec<String> {
    let mut lines = vec![
        format!("state: {}", session.state().as_str()),
        format!("mode: {}", session.mode()),
        format!(
            "source: {}",
            session.source().map(describe_asset).unwrap_or_else(|| "-".to_string())
        ),
        format!(
            "result: {}",
            session.result().map(describe_asset).unwrap_or_else(|| "-".to_string())
        ),
        format!("instruction: {}", session.instruction()),
    ];
    if session.mode() == Mode::Video {
        lines.push(format!("aspect ratio: {}", session.aspect_ratio()));
    }
    if let Some(message) = session.error_message() {
        lines.push(format!("error: {message}"));
    }
    lines.push(format!("history: {}", session.history().len()));
    lines
}

fn describe_asset(asset: &Asset) -> String {
    match asset.byte_len() {
        Some(len) => format!("{} ({len} bytes)", asset.mime_type()),
        None => format!("{} (remote)", asset.mime_type()),
    }
}

/// Reads a replacement key from the terminal. Input is echoed. End of input
/// dismisses the prompt and keeps the current key; a blank line clears it.
fn prompt_for_key() -> Option<String> {
    eprint!("Enter a Gemini API key from a paid Google Cloud project (blank clears, Ctrl-D keeps): ");
    io::stderr().flush().ok()?;
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
