mod caption;
mod config;
mod error;
mod index;
mod keys;
mod parser;
mod position;
mod replay;
mod serialiser;
mod session;
mod store;
mod sync;

use crate::caption::CaptionSet;
use crate::config::Config;
use crate::replay::ScriptHost;
use crate::serialiser::SharedWriter;
use crate::session::{OverlaySession, SessionOptions};
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser as ClapParser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() {
    match run() {
        Ok(()) => (),
        Err(err) => {
            eprintln!("An error occurred: {}", err);
            for cause in err.chain().skip(1) {
                eprintln!("    {}", cause);
            }
            std::process::exit(1);
        }
    }
}

#[derive(ClapParser)]
#[command(about = "Synchronise captions with a playback clock and render them to an overlay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a script of host events (ticks, pointer, keys, loads) against an overlay.
    Replay {
        #[arg(
            short,
            long,
            value_name = "FILE",
            help = "The script to replay. If not supplied, the script will be read from standard input.",
            default_value = "-"
        )]
        script: String,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Load a caption file and play it back at a fixed tick interval.
    Play {
        #[arg(short, long, value_name = "FILE", help = "The caption file to load.")]
        captions: PathBuf,
        #[arg(long, value_name = "SECONDS", default_value_t = 0.0, allow_hyphen_values = true)]
        from: f64,
        #[arg(long, value_name = "SECONDS")]
        to: f64,
        #[arg(long, value_name = "SECONDS", default_value_t = 0.25)]
        step: f64,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Validate a caption file and report how many entries it holds.
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args)]
struct SessionArgs {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "The file to write to. If not supplied, the overlay will be written to standard output.",
        default_value = "-"
    )]
    output: String,
    #[arg(long, value_name = "FILE", help = "Read settings from the given TOML file.")]
    config: Option<PathBuf>,
    #[arg(
        long,
        value_name = "SECONDS",
        allow_hyphen_values = true,
        help = "Shift loaded captions by this many seconds."
    )]
    offset: Option<f64>,
    #[arg(long, value_name = "FILE", help = "Persist position and captions in this JSON file.")]
    store: Option<PathBuf>,
    #[arg(long, value_name = "COMBO", help = "Toggle shortcut, e.g. Mod+Shift+S.")]
    shortcut: Option<String>,
    #[arg(
        long,
        value_name = "FILE",
        help = "Caption file standing in for the video's native text track."
    )]
    track: Option<PathBuf>,
    #[arg(long, help = "Behave as if the page had no video element.")]
    no_video: bool,
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Replay { script, session } => {
            let config = load_config(&session)?;
            init_logging(&config);

            let data = if script == "-" {
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read from stdin")?;
                buffer
            } else {
                std::fs::read_to_string(&script)
                    .context(format!("Failed to open script file: '{}'", script))?
            };
            let lines = parser::parse_script(&data)
                .context(format!("Failed to parse script: '{}'", script))?;
            let base_dir = if script == "-" {
                None
            } else {
                Path::new(&script).parent().map(Path::to_path_buf)
            };

            let mut overlay = build_session(&session, &config)?;
            replay::run_script(&mut overlay, &lines, base_dir.as_deref())
        }
        Command::Play {
            captions,
            from,
            to,
            step,
            session,
        } => {
            let config = load_config(&session)?;
            init_logging(&config);

            if !(step > 0.0) || !from.is_finite() || !to.is_finite() {
                return Err(anyhow!(
                    "Expected finite bounds and a positive step, got --from {} --to {} --step {}",
                    from,
                    to,
                    step
                ));
            }
            let data = std::fs::read_to_string(&captions)
                .context(format!("Failed to open caption file: '{}'", captions.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&data)
                .context(format!("'{}' is not valid JSON", captions.display()))?;

            let mut overlay = build_session(&session, &config)?;
            replay::play(&mut overlay, &payload, from, to, step)
        }
        Command::Check { file } => {
            println!("{} captions", check_captions(&file)?);
            Ok(())
        }
    }
}

/// Validates a caption file. An empty set is a valid load.
fn check_captions(file: &Path) -> Result<usize> {
    let data = std::fs::read_to_string(file)
        .context(format!("Failed to open caption file: '{}'", file.display()))?;
    let captions = CaptionSet::from_json(&data)
        .context(format!("Failed to load caption file: '{}'", file.display()))?;
    Ok(captions.len())
}

fn load_config(args: &SessionArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .context(format!("Failed to load config file: '{}'", path.display()))?,
        None => Config::default(),
    };
    if let Some(offset) = args.offset {
        config.offset_seconds = offset;
    }
    if let Some(store) = &args.store {
        config.store = Some(store.clone());
    }
    if let Some(shortcut) = &args.shortcut {
        config.shortcut = shortcut.clone();
    }
    Ok(config)
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("subtrack={}", config.logging.level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_output(path: &str) -> Result<SharedWriter> {
    if path == "-" {
        Ok(serialiser::shared(io::stdout()))
    } else {
        let file = std::fs::File::create(path)
            .context(format!("Failed to create output file: '{}'", path))?;
        Ok(serialiser::shared(io::BufWriter::new(file)))
    }
}

fn build_session(
    args: &SessionArgs,
    config: &Config,
) -> Result<OverlaySession<ScriptHost, Box<dyn KeyValueStore>>> {
    let shortcut = config
        .key_combo()
        .context(format!("Invalid shortcut: '{}'", config.shortcut))?;
    if !config.offset_seconds.is_finite() {
        return Err(anyhow!("Offset must be finite, got {}", config.offset_seconds));
    }

    let track = match &args.track {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .context(format!("Failed to open track file: '{}'", path.display()))?;
            let track = CaptionSet::from_json(&data)
                .context(format!("Failed to load track file: '{}'", path.display()))?;
            Some(track)
        }
        None => None,
    };

    let store: Box<dyn KeyValueStore> = match &config.store {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };

    let out = open_output(&args.output)?;
    let host = ScriptHost::new(out, !args.no_video, track);
    let options = SessionOptions {
        offset_seconds: config.offset_seconds,
        shortcut,
        default_position: config.default_position,
    };
    Ok(OverlaySession::new(host, store, options))
}
