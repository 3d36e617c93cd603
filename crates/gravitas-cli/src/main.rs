//! `gravitas-cli` – Gravitas command line interface.
//!
//! ```text
//! gravitas [--config PATH] [--scene FILE] [run | replay FILE | init]
//! ```
//!
//! * `run` (default) – live mode.  The reasoner is seeded with the objects
//!   of `--scene` (JSON lines of world events, applied to the input world),
//!   or starts from an empty scene.  World events are then read as JSON
//!   lines on stdin and queued to the reasoner service; every change set is
//!   written as one JSON line to stdout.  Ctrl-C or the end of stdin stops
//!   the service gracefully.
//! * `replay FILE` – feeds a recording through the reasoner on a synthetic
//!   clock and writes the change sets to stdout.
//! * `init` – writes the default configuration.
//!
//! The banner, status lines and logs go to stderr so stdout carries data
//! only.

mod config;
mod replay;

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use colored::Colorize;
use gravitas_middleware::{DEFAULT_INBOX_CAPACITY, EventBus, SceneStore, Topic, WorldFeed, world_channel};
use gravitas_physics::{PhysicsEngine, RapierEngine, ShapeLibrary, SimEngine};
use gravitas_reasoner::{Reasoner, ReasonerService, telemetry};
use gravitas_types::{ChangeSet, Event, EventPayload, WorldEvent};
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{Config, EngineKind};

const USAGE: &str = "usage: gravitas [--config PATH] [--scene FILE] [run | replay FILE | init]";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Run,
    Replay(PathBuf),
    Init,
}

#[derive(Debug, Clone, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    /// Initial scene for live mode.
    scene: Option<PathBuf>,
    command: Command,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut config = None;
    let mut scene = None;
    let mut command = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--scene" | "-s" => {
                let path = args.next().ok_or("--scene needs a file")?;
                scene = Some(PathBuf::from(path));
            }
            "run" | "replay" | "init" if command.is_some() => {
                return Err(format!("unexpected extra command `{arg}`"));
            }
            "run" => command = Some(Command::Run),
            "init" => command = Some(Command::Init),
            "replay" => {
                let file = args.next().ok_or("replay needs a recording file")?;
                command = Some(Command::Replay(PathBuf::from(file)));
            }
            other => return Err(format!("unknown argument `{other}`")),
        }
    }
    Ok(Args {
        config,
        scene,
        command: command.unwrap_or(Command::Run),
    })
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    // Held for the whole process; dropping it flushes exported spans.
    let _guard = telemetry::init_tracing("gravitas");
    print_banner();

    let path = args.config.clone().unwrap_or_else(config::config_path);
    let result = match args.command {
        Command::Init => init(&path),
        Command::Run => load(&path).and_then(|cfg| run_live(cfg, args.scene.as_deref())),
        Command::Replay(file) => load(&path).and_then(|cfg| run_replay(cfg, &file)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load(path: &Path) -> Result<Config, String> {
    let cfg = config::resolve(path)?;
    if path.exists() {
        eprintln!("  Config loaded from {}", path.display().to_string().bold());
    } else {
        eprintln!("  {} (run `gravitas init` to create one)", "Using default configuration".dimmed());
    }
    eprintln!(
        "  Engine {} · {} Hz · world {} → {}",
        cfg.engine.to_string().bold(),
        cfg.reasoner.reasoning_frequency,
        cfg.reasoner.input_world.bold(),
        cfg.reasoner.output_world().bold()
    );
    Ok(cfg)
}

fn init(path: &Path) -> Result<(), String> {
    if path.exists() {
        eprintln!("  Config already exists at {}", path.display().to_string().bold());
        return Ok(());
    }
    config::save_to(&Config::default(), path)?;
    eprintln!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
    Ok(())
}

fn build_engine(cfg: &Config) -> Box<dyn PhysicsEngine> {
    let library = ShapeLibrary::new(cfg.reasoner.resource_folder.iter().cloned());
    match cfg.engine {
        EngineKind::Rapier => Box::new(RapierEngine::new(library, cfg.reasoner.gravity(), cfg.reasoner.time_step)),
        EngineKind::Sim => Box::new(SimEngine::new(library).with_gravity(cfg.reasoner.gravity().z)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Live mode
// ─────────────────────────────────────────────────────────────────────────────

fn run_live(cfg: Config, scene: Option<&Path>) -> Result<(), String> {
    let store = match scene {
        Some(file) => {
            let handle =
                std::fs::File::open(file).map_err(|e| format!("Failed to open {}: {}", file.display(), e))?;
            let store = load_scene(BufReader::new(handle), &cfg.reasoner.input_world)?;
            eprintln!(
                "  Scene {} – {} object(s)",
                file.display().to_string().bold(),
                store.objects(&cfg.reasoner.input_world).len()
            );
            store
        }
        None => {
            eprintln!("  {}", "Starting from an empty scene".dimmed());
            SceneStore::new()
        }
    };
    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start runtime: {e}"))?;
    runtime.block_on(live(cfg, store))
}

/// Build the initial world model from JSON lines of world events.  Blank
/// lines and `#` comments are skipped.
fn load_scene(reader: impl BufRead, world: &str) -> Result<SceneStore, String> {
    let mut store = SceneStore::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("scene line {}: {}", idx + 1, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: WorldEvent =
            serde_json::from_str(trimmed).map_err(|e| format!("scene line {}: {}", idx + 1, e))?;
        store.apply_event(world, &event);
    }
    Ok(store)
}

enum Output {
    Changes(Option<Event>),
    Alert(Option<Event>),
    Stop,
}

async fn live(cfg: Config, store: SceneStore) -> Result<(), String> {
    let bus = EventBus::default();
    let (feed, inbox) = world_channel(DEFAULT_INBOX_CAPACITY);
    let mut output = bus.subscribe_to(Topic::StableWorld);
    let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);

    let ctrlc_stop = stop_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping the reasoner …".yellow().bold());
        let _ = ctrlc_stop.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let period = cfg.reasoner.tick_period();
    let reasoner = Reasoner::new(build_engine(&cfg), cfg.reasoner);
    let mut service = ReasonerService::new(reasoner, bus.clone(), inbox);
    service.seed(&store);
    let service = service.spawn(stop_rx.clone());
    let reader = tokio::spawn(read_stdin(feed, stop_tx.clone(), period));

    let mut written = 0usize;
    loop {
        let next = tokio::select! {
            event = output.next() => Output::Changes(event),
            event = alerts.next() => Output::Alert(event),
            _ = stop_rx.changed() => Output::Stop,
        };
        match next {
            Output::Changes(Some(Event {
                payload: EventPayload::Changes(changes),
                ..
            })) => {
                write_changes(&changes);
                written += 1;
            }
            Output::Alert(Some(Event {
                payload: EventPayload::PerformanceWarning { achieved_hz, target_hz },
                ..
            })) => {
                eprintln!(
                    "  {} reasoning at {:.1} Hz, target {:.1} Hz",
                    "slow".yellow().bold(),
                    achieved_hz,
                    target_hz
                );
            }
            Output::Changes(None) | Output::Alert(None) | Output::Stop => break,
            _ => {}
        }
    }

    let _ = stop_tx.send(true);
    reader.abort();
    let reasoner = service.await.map_err(|e| format!("Reasoner task failed: {e}"))?;
    eprintln!(
        "  {} {} change set(s) written, {} object(s) tracked.",
        "✓".green().bold(),
        written,
        reasoner.objects().len()
    );
    Ok(())
}

/// Queue every JSON line of stdin as a world event, waiting while the
/// reasoner catches up.  End of input stops the service after two more
/// cycles.
async fn read_stdin(feed: WorldFeed, stop: Arc<watch::Sender<bool>>, period: Duration) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<WorldEvent>(trimmed) {
                    Ok(change) => {
                        let event = Event::new("gravitas-cli::stdin", EventPayload::World(change));
                        if let Err(e) = feed.send(event).await {
                            warn!(error = %e, "reasoner gone, input stopped");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "ignoring malformed input line"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        }
    }
    info!("input closed");
    tokio::time::sleep(period * 2).await;
    let _ = stop.send(true);
}

// ─────────────────────────────────────────────────────────────────────────────
// Replay mode
// ─────────────────────────────────────────────────────────────────────────────

fn run_replay(cfg: Config, file: &Path) -> Result<(), String> {
    let handle = std::fs::File::open(file).map_err(|e| format!("Failed to open {}: {}", file.display(), e))?;
    let records = replay::parse(BufReader::new(handle))?;
    eprintln!("  Replaying {} event(s) from {}", records.len(), file.display().to_string().bold());

    let output_world = cfg.reasoner.output_world();
    let mut reasoner = Reasoner::new(build_engine(&cfg), cfg.reasoner);
    let mut store = SceneStore::new();
    let summary = replay::run(&records, &mut reasoner, &mut store, DateTime::<Utc>::UNIX_EPOCH, write_changes);

    eprintln!(
        "  {} {} tick(s), {} change set(s), {} action(s), {} fact update(s); {} object(s) in {}.",
        "✓".green().bold(),
        summary.ticks,
        summary.change_sets,
        summary.actions,
        summary.facts,
        store.objects(&output_world).len(),
        output_world.bold()
    );
    Ok(())
}

fn write_changes(changes: &ChangeSet) {
    match serde_json::to_string(changes) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "change set not serializable"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    eprintln!();
    eprintln!("{}", r#"   ____                 _ __"#.bold().cyan());
    eprintln!("{}", r#"  / ___|_ __ __ ___   _(_) |_ __ _ ___"#.bold().cyan());
    eprintln!("{}", r#" | |  _| '__/ _` \ \ / / | __/ _` / __|"#.bold().cyan());
    eprintln!("{}", r#" | |_| | | | (_| |\ V /| | || (_| \__ \"#.bold().cyan());
    eprintln!("{}", r#"  \____|_|  \__,_| \_/ |_|\__\__,_|___/"#.bold().cyan());
    eprintln!();
    eprintln!("  {} {}", "Gravitas".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    eprintln!("  Physics-backed scene reasoner");
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravitas_physics::ShapeType;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_means_run() {
        assert_eq!(
            args(&[]).unwrap(),
            Args {
                config: None,
                scene: None,
                command: Command::Run
            }
        );
    }

    #[test]
    fn config_and_replay() {
        let parsed = args(&["--config", "/tmp/g.toml", "replay", "scene.jsonl"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/g.toml")));
        assert_eq!(parsed.command, Command::Replay(PathBuf::from("scene.jsonl")));
    }

    #[test]
    fn scene_flag_is_parsed() {
        let parsed = args(&["--scene", "table.jsonl", "run"]).unwrap();
        assert_eq!(parsed.scene, Some(PathBuf::from("table.jsonl")));
        assert_eq!(parsed.command, Command::Run);
    }

    #[test]
    fn scene_file_seeds_input_world() {
        let text = concat!(
            "# initial scene\n",
            "{\"event\":\"deleted\",\"payload\":\"nothing\"}\n",
            "\n",
        );
        let store = load_scene(text.as_bytes(), "robot/env").unwrap();
        assert!(store.objects("robot/env").is_empty());

        let demo = include_str!("../../../demos/carry_cube.jsonl");
        let first = demo.lines().find(|l| l.starts_with('{')).unwrap();
        let record: serde_json::Value = serde_json::from_str(first).unwrap();
        let store = load_scene(record["event"].to_string().as_bytes(), "robot/env").unwrap();
        let objects = store.objects("robot/env");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "cube_1");
    }

    #[test]
    fn scene_file_reports_bad_line() {
        let err = load_scene("{}\n".as_bytes(), "robot/env").unwrap_err();
        assert!(err.starts_with("scene line 1:"), "{err}");
    }

    #[test]
    fn missing_values_are_errors() {
        assert!(args(&["--scene"]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&["replay"]).is_err());
        assert!(args(&["init", "run"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }

    #[test]
    fn sim_engine_is_selectable() {
        let cfg = Config {
            engine: EngineKind::Sim,
            ..Config::default()
        };
        let engine = build_engine(&cfg);
        assert_eq!(engine.body_count(), 0);
    }

    #[test]
    fn bundled_assets_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets");
        let library = ShapeLibrary::new([dir]);
        for key in ["cube", "box", "table", "ball", "mug"] {
            assert!(library.load(key).is_ok(), "asset {key}");
        }
        assert!(library.load("table").unwrap().is_fixed());
        for key in ["box", "mug"] {
            assert_eq!(library.load(key).unwrap().shape, ShapeType::Container, "asset {key}");
        }
    }
}
