//! Gesture Arcade entry point
//!
//! Natively this is a headless driver: it plays one round from a script of
//! timed inputs read on stdin and prints what happened. The browser build is
//! driven from JavaScript through `WebEngine` instead.
//!
//! Script lines:
//! - `+<ms>` advances the clock
//! - `key <left|right|space|click>` presses a fallback key
//! - anything else is published on the gesture transport as a raw payload
//! - blank lines and `#` comments are skipped

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::io::{self, BufRead};
    use std::path::PathBuf;
    use std::process::ExitCode;

    use clap::{Parser, ValueEnum};

    use gesture_arcade::input::KeyInput;
    use gesture_arcade::platform::{FileStore, KeyValueStore, MemoryStore};
    use gesture_arcade::services::{GestureTransport, LoopbackTransport, attach_transport};
    use gesture_arcade::sim::ControlMode;
    use gesture_arcade::{EngineConfig, EngineError, GameMode, Session, SessionEvent};

    /// Simulated display frame
    const FRAME_MS: u64 = 16;
    /// Give up on a race that outlives its script by this much
    const RUN_OUT_MS: u64 = 10 * 60 * 1000;

    #[derive(Clone, Copy, ValueEnum)]
    enum ModeArg {
        Racing,
        Slap,
    }

    impl From<ModeArg> for GameMode {
        fn from(mode: ModeArg) -> Self {
            match mode {
                ModeArg::Racing => GameMode::Racing,
                ModeArg::Slap => GameMode::Slap,
            }
        }
    }

    /// Play one gesture arcade round from a scripted input stream
    #[derive(Parser)]
    #[command(name = "gesture-arcade")]
    #[command(version, about, long_about = None)]
    struct Cli {
        /// Game mode
        #[arg(value_enum, default_value = "racing")]
        mode: ModeArg,

        /// Difficulty (beginner, intermediate, complex or an alias)
        #[arg(short, long, default_value = "intermediate")]
        difficulty: String,

        /// Control mode override (analog or lane)
        #[arg(long)]
        control: Option<String>,

        /// Engine config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fixed RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Directory for best scores; kept in memory when absent
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Treat the gesture broker as unreachable
        #[arg(long)]
        offline: bool,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    }

    pub fn run() -> ExitCode {
        env_logger::init();
        let cli = Cli::parse();

        match play(&cli) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        }
    }

    fn play(cli: &Cli) -> Result<(), EngineError> {
        let store: Box<dyn KeyValueStore> = match &cli.data_dir {
            Some(dir) => Box::new(FileStore::new(dir)?),
            None => Box::new(MemoryStore::new()),
        };

        let mut config = match &cli.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::load(store.as_ref()),
        };
        if let Some(seed) = cli.seed {
            config = config.with_seed(seed);
        }
        if let Some(name) = &cli.control {
            match ControlMode::from_str(name) {
                Some(mode) => config = config.with_control_mode(mode),
                None => log::warn!("Unknown control mode {:?}, keeping {}", name, config.control_mode.as_str()),
            }
        }

        let mut session = Session::new(config, store);
        let mut transport = if cli.offline {
            LoopbackTransport::unreachable("broker disabled by --offline")
        } else {
            LoopbackTransport::new()
        };
        let source = attach_transport(&mut transport, session.inbox());
        log::info!("Input source: {:?}", source);

        let difficulty = gesture_arcade::sim::resolve(&cli.difficulty).level;
        session.start(cli.mode.into(), difficulty);
        report(&mut session, cli.json)?;

        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(ms) = line.strip_prefix('+') {
                match ms.trim().parse::<u64>() {
                    Ok(ms) => advance(&mut session, ms),
                    Err(_) => log::warn!("Bad time step {:?}", line),
                }
            } else if let Some(name) = line.strip_prefix("key ") {
                match parse_key(name.trim()) {
                    Some(key) => session.handle_key(key),
                    None => log::warn!("Unknown key {:?}", name),
                }
            } else {
                transport.publish(line);
                session.pump_inbox();
            }

            report(&mut session, cli.json)?;
            if !session.phase().is_active() {
                break;
            }
        }

        // Let a race play out; a slap round waits for input that never comes
        if session.mode() == Some(GameMode::Racing) {
            let mut waited = 0;
            while session.phase().is_active() && waited < RUN_OUT_MS {
                advance(&mut session, FRAME_MS);
                waited += FRAME_MS;
                report(&mut session, cli.json)?;
            }
        } else {
            let settle = session.config().settle_delay_ms;
            advance(&mut session, settle);
            report(&mut session, cli.json)?;
        }

        transport.disconnect();
        match session.last_outcome() {
            Some(outcome) if !cli.json => {
                println!(
                    "{} score {}{}",
                    outcome.mode.as_str(),
                    outcome.score,
                    if outcome.is_new_best { " (new best)" } else { "" }
                );
            }
            Some(_) => {}
            None => println!("Round still active ({:?}), score {}", session.phase(), session.score()),
        }
        Ok(())
    }

    fn advance(session: &mut Session, mut ms: u64) {
        while ms > 0 {
            let step = ms.min(FRAME_MS);
            session.update(step);
            ms -= step;
        }
    }

    fn parse_key(name: &str) -> Option<KeyInput> {
        match name.to_lowercase().as_str() {
            "left" => Some(KeyInput::ArrowLeft),
            "right" => Some(KeyInput::ArrowRight),
            "space" => Some(KeyInput::Space),
            "click" => Some(KeyInput::Click),
            _ => KeyInput::from_key(name),
        }
    }

    fn report(session: &mut Session, json: bool) -> Result<(), EngineError> {
        for event in session.drain_events() {
            if json {
                println!("{}", serde_json::to_string(&event)?);
                continue;
            }
            match event {
                SessionEvent::Started { mode } => println!("started {}", mode.as_str()),
                SessionEvent::ObstacleSpawned { id, lane, kind } => {
                    println!("obstacle #{} ({:?}) in lane {}", id, kind, lane)
                }
                SessionEvent::ScoreChanged { score } => println!("score {}", score),
                SessionEvent::SlapRecorded(record) => println!(
                    "slap #{}: {} pts {}",
                    record.id,
                    record.points,
                    record.rating().label()
                ),
                SessionEvent::Crashed { obstacle_id, score } => {
                    println!("crashed into #{} at score {}", obstacle_id, score)
                }
                SessionEvent::RoundComplete(summary) => println!(
                    "round complete: {} pts, max speed {:.1}",
                    summary.total_score, summary.max_speed
                ),
                SessionEvent::Ended(outcome) => println!(
                    "ended: {} (best before: {})",
                    outcome.score,
                    outcome
                        .previous_best
                        .map(|b| b.to_string())
                        .unwrap_or_else(|| "none".into())
                ),
            }
        }
        Ok(())
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    headless::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The page drives `WebEngine`; nothing to do here
}
