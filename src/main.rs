mod script;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use canvas::doc::ElementKind;
use canvas::engine::{EngineConfig, EngineCore};
use clap::{Args, Parser, Subcommand};
use presets::{FilePresetStore, MemoryPresetStore, NewPreset, PresetId, PresetStore};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("preset store: {0}")]
    Preset(#[from] presets::PresetError),
    #[error("script line {line}: {source}")]
    Script { line: usize, source: serde_json::Error },
    #[error("unknown element kind `{0}`")]
    UnknownKind(String),
}

#[derive(Parser, Debug)]
#[command(name = "diagram", about = "Diagram editor engine: script replay and saved shape presets")]
struct Cli {
    /// JSON file holding saved shape presets.
    #[arg(long, env = "DIAGRAM_PRESETS_PATH", default_value = "shapes.json")]
    presets: PathBuf,

    /// Key that arms connect mode while held.
    #[arg(long, env = "DIAGRAM_CONNECT_KEY")]
    connect_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON-lines input script and print the resulting scene.
    Replay(ReplayArgs),
    /// Manage saved shape presets.
    Presets(PresetsCommand),
}

#[derive(Args, Debug)]
struct ReplayArgs {
    #[arg(default_value = "-", help = "Script path, or - for stdin")]
    script: String,

    /// Print the layers-panel tree instead of the render list.
    #[arg(long, default_value_t = false)]
    layers: bool,
}

#[derive(Args, Debug)]
struct PresetsCommand {
    #[command(subcommand)]
    command: PresetsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PresetsSubcommand {
    List,
    Add {
        #[arg(long, default_value = "Untitled Shape")]
        name: String,
        #[arg(long, default_value = "rectangle")]
        kind: String,
        #[arg(long, default_value_t = 100.0)]
        width: f64,
        #[arg(long, default_value_t = 100.0)]
        height: f64,
        #[arg(long, default_value = "#000000")]
        border_color: String,
        #[arg(long, default_value = "#ffffff")]
        background_color: String,
        #[arg(long, default_value_t = 2.0)]
        border_width: f64,
        #[arg(long, default_value = "solid")]
        border_style: String,
        #[arg(long, default_value_t = 0.0)]
        border_radius: f64,
    },
    Delete {
        id: PresetId,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Replay(args) => {
            let mut config = EngineConfig::from_env();
            if let Some(key) = cli.connect_key {
                config.connect_key = key;
            }
            let store = replay_presets(&cli.presets);
            run_replay(config, store.as_ref(), &args)
        }
        Command::Presets(presets) => {
            let mut store = FilePresetStore::open(&cli.presets)?;
            run_presets(&mut store, presets)
        }
    }
}

/// Replay works without presets: a store that cannot be opened is replaced
/// by an empty one.
fn replay_presets(path: &Path) -> Box<dyn PresetStore> {
    match FilePresetStore::open(path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "preset store unavailable, replaying without presets");
            Box::new(MemoryPresetStore::new())
        }
    }
}

fn run_replay(config: EngineConfig, store: &dyn PresetStore, args: &ReplayArgs) -> Result<(), CliError> {
    let reader: Box<dyn BufRead> = if args.script == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(&args.script)?))
    };

    let mut core = EngineCore::with_config(config);
    let summary = script::replay(&mut core, store, reader)?;
    info!(events = summary.events, skipped = summary.skipped, elements = core.doc.len(), "replay complete");

    let violations = core.doc.check_invariants();
    if !violations.is_empty() {
        warn!(?violations, "document invariants broken after replay");
    }

    let rendered = if args.layers {
        serde_json::to_string_pretty(&core.layers())?
    } else {
        serde_json::to_string_pretty(&core.scene())?
    };
    println!("{rendered}");
    Ok(())
}

fn run_presets(store: &mut FilePresetStore, presets: PresetsCommand) -> Result<(), CliError> {
    match presets.command {
        PresetsSubcommand::List => {
            let all = store.list()?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        PresetsSubcommand::Add {
            name,
            kind,
            width,
            height,
            border_color,
            background_color,
            border_width,
            border_style,
            border_radius,
        } => {
            let kind = ElementKind::parse(&kind).ok_or(CliError::UnknownKind(kind))?;
            let id = store.create(NewPreset {
                name,
                kind,
                width,
                height,
                border_color,
                background_color,
                border_width,
                border_style,
                border_radius,
            })?;
            println!("{id}");
        }
        PresetsSubcommand::Delete { id } => store.delete(&id)?,
    }
    Ok(())
}
