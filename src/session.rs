//! Session state machine
//!
//! A [`Session`] owns at most one active round and routes every gesture, key
//! and timer step to it:
//!
//! ```text
//! Idle -> RacingActive | SlapActive -> Ended -> Idle (menu) or Active (replay)
//! ```
//!
//! Time only advances through [`Session::update`]. The race keeps two
//! independent timers (spawn and tick) that are dropped together when the
//! race ends; a slap round keeps only the settle countdown before delivery.
//! Hosts drain [`SessionEvent`]s after each call.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::highscores::BestScores;
use crate::input::{GestureInbox, KeyInput};
use crate::platform::{self, KeyValueStore};
use crate::services::{Identity, LeaderboardEntry, PlayerStats, ScoreMetadata, ScoreService};
use crate::settings::EngineConfig;
use crate::sim::{
    ControlMode, DifficultyLevel, Direction, ExpiringInput, GestureEvent, Obstacle, ObstacleKind,
    RaceEvent, RaceState, RecordResult, RoundSummary, SlapRecord, SlapRound, SlapSample,
    SlapSource, normalize, progression_level, spawn_obstacle, tick,
};
use crate::timer::RepeatingTimer;

/// Game modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Racing,
    Slap,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Racing => "racing",
            GameMode::Slap => "slap",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "racing" | "race" => Some(GameMode::Racing),
            "slap" => Some(GameMode::Slap),
            _ => None,
        }
    }
}

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Menu; no round exists
    Idle,
    RacingActive,
    SlapActive,
    /// Round finished; input is ignored until replay or menu
    Ended,
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::RacingActive | SessionPhase::SlapActive)
    }
}

/// Mode-specific results of a finished round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoundStats {
    Racing {
        difficulty: DifficultyLevel,
        control_mode: ControlMode,
        progression_level: u32,
        obstacles_passed: u64,
    },
    Slap(RoundSummary),
}

impl RoundStats {
    /// Fields sent alongside a score submission
    pub fn metadata(&self) -> ScoreMetadata {
        match self {
            RoundStats::Racing {
                difficulty,
                control_mode,
                ..
            } => ScoreMetadata {
                difficulty: Some(*difficulty),
                control_mode: Some(*control_mode),
                ..Default::default()
            },
            RoundStats::Slap(summary) => ScoreMetadata {
                total_slaps: Some(summary.slap_count),
                max_speed: Some(summary.max_speed),
                ..Default::default()
            },
        }
    }
}

/// Result handed to the host when a round ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub mode: GameMode,
    pub score: u64,
    pub stats: RoundStats,
    pub is_new_best: bool,
    /// Best score before this round, if one was stored
    pub previous_best: Option<u64>,
}

/// Notifications produced by the session, drained by the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started { mode: GameMode },
    ObstacleSpawned { id: u32, lane: usize, kind: ObstacleKind },
    ScoreChanged { score: u64 },
    SlapRecorded(SlapRecord),
    /// Reported once per race
    Crashed { obstacle_id: u32, score: u64 },
    /// Slap totals are final; delivery follows after the settle delay
    RoundComplete(RoundSummary),
    Ended(RoundOutcome),
}

#[derive(Debug, Clone)]
struct RaceTimers {
    spawn: RepeatingTimer,
    tick: RepeatingTimer,
}

#[derive(Debug, Clone)]
struct RaceRound {
    state: RaceState,
    /// `None` once the race has ended
    timers: Option<RaceTimers>,
}

#[derive(Debug, Clone)]
struct SlapSession {
    round: SlapRound,
    /// Countdown to delivery, set when the round completes
    settle_ms: Option<u64>,
}

#[derive(Debug, Clone)]
enum ActiveRound {
    Race(RaceRound),
    Slap(SlapSession),
}

/// One player's session: menu, rounds, best scores and score hand-off
pub struct Session {
    config: EngineConfig,
    phase: SessionPhase,
    mode: Option<GameMode>,
    difficulty: DifficultyLevel,
    round: Option<ActiveRound>,
    /// Session clock (ms), advanced only by `update`
    clock_ms: u64,
    rng: Pcg32,
    discrete: ExpiringInput<Direction>,
    inbox: GestureInbox,
    events: Vec<SessionEvent>,
    best: BestScores,
    store: Box<dyn KeyValueStore>,
    score_service: Option<Box<dyn ScoreService>>,
    identity: Option<Box<dyn Identity>>,
    last_outcome: Option<RoundOutcome>,
    player_stats: Option<PlayerStats>,
}

impl Session {
    pub fn new(config: EngineConfig, store: Box<dyn KeyValueStore>) -> Self {
        let config = config.sanitized();
        let seed = config.seed.unwrap_or_else(platform::now_ms);
        log::info!("Session created (seed {})", seed);

        let inbox = GestureInbox::new();
        inbox.set_enabled(false);

        Self {
            difficulty: config.default_difficulty,
            config,
            phase: SessionPhase::Idle,
            mode: None,
            round: None,
            clock_ms: 0,
            rng: Pcg32::seed_from_u64(seed),
            discrete: ExpiringInput::new(),
            inbox,
            events: Vec::new(),
            best: BestScores::load(store.as_ref()),
            store,
            score_service: None,
            identity: None,
            last_outcome: None,
            player_stats: None,
        }
    }

    pub fn with_score_service(mut self, service: Box<dyn ScoreService>) -> Self {
        self.score_service = Some(service);
        self
    }

    pub fn with_identity(mut self, identity: Box<dyn Identity>) -> Self {
        self.identity = Some(identity);
        self
    }

    // === Lifecycle ===

    /// Start a fresh round. Any round still running is discarded without an
    /// outcome.
    pub fn start(&mut self, mode: GameMode, difficulty: DifficultyLevel) {
        if self.phase.is_active() {
            log::info!("Abandoning active {:?} round", self.mode.map(|m| m.as_str()));
        }

        self.best = BestScores::load(self.store.as_ref());
        self.mode = Some(mode);
        self.difficulty = difficulty;
        self.discrete.clear();
        self.inbox.clear();
        self.inbox.set_enabled(true);

        match mode {
            GameMode::Racing => {
                let profile = difficulty.profile();
                let seed = self.rng.random::<u64>();
                log::info!(
                    "Starting race ({}, {} control, seed {})",
                    profile.label,
                    self.config.control_mode.as_str(),
                    seed
                );
                self.round = Some(ActiveRound::Race(RaceRound {
                    state: RaceState::new(seed, profile, self.config.control_mode),
                    timers: Some(RaceTimers {
                        spawn: RepeatingTimer::new(profile.spawn_interval_ms),
                        tick: RepeatingTimer::new(self.config.tick_interval_ms),
                    }),
                }));
                self.phase = SessionPhase::RacingActive;
            }
            GameMode::Slap => {
                log::info!("Starting slap round ({} slaps)", self.config.slaps_per_round);
                self.round = Some(ActiveRound::Slap(SlapSession {
                    round: SlapRound::new(self.config.slaps_per_round),
                    settle_ms: None,
                }));
                self.phase = SessionPhase::SlapActive;
            }
        }

        self.events.push(SessionEvent::Started { mode });
        self.events.push(SessionEvent::ScoreChanged { score: 0 });
    }

    /// Start by name; unknown difficulties fall back to the default.
    /// Returns false for an unknown mode.
    pub fn start_named(&mut self, mode: &str, difficulty: &str) -> bool {
        let Some(mode) = GameMode::from_str(mode) else {
            log::warn!("Unknown game mode {:?}", mode);
            return false;
        };
        let level = crate::sim::resolve(difficulty).level;
        self.start(mode, level);
        true
    }

    /// Restart the last mode with the same difficulty
    pub fn replay(&mut self) -> bool {
        match self.mode {
            Some(mode) => {
                self.start(mode, self.difficulty);
                true
            }
            None => false,
        }
    }

    /// Drop the round (if any) and go back to the menu
    pub fn return_to_menu(&mut self) {
        self.round = None;
        self.discrete.clear();
        self.inbox.set_enabled(false);
        self.phase = SessionPhase::Idle;
        log::debug!("Returned to menu");
    }

    // === Time ===

    /// Advance the session clock by `dt_ms` (capped at the configured max
    /// frame), firing due timers in chronological order.
    pub fn update(&mut self, dt_ms: u64) {
        let dt = dt_ms.min(self.config.max_frame_ms);

        // A settle countdown started by this frame's gestures begins after it
        if self.phase == SessionPhase::SlapActive {
            self.advance_settle(dt);
        }
        self.pump_inbox();

        match self.phase {
            SessionPhase::RacingActive => self.advance_race(dt),
            SessionPhase::SlapActive | SessionPhase::Idle | SessionPhase::Ended => {
                self.clock_ms += dt
            }
        }
    }

    fn advance_race(&mut self, mut remaining: u64) {
        loop {
            let Some(ActiveRound::Race(race)) = &mut self.round else {
                self.clock_ms += remaining;
                return;
            };
            let Some(timers) = race.timers.as_mut() else {
                self.clock_ms += remaining;
                return;
            };

            let step = timers.spawn.until_next_ms().min(timers.tick.until_next_ms());
            if step > remaining {
                timers.spawn.advance(remaining);
                timers.tick.advance(remaining);
                self.clock_ms += remaining;
                return;
            }

            remaining -= step;
            timers.spawn.advance(step);
            timers.tick.advance(step);
            self.clock_ms += step;

            // Spawn before tick when both fall due together
            let mut race_events = Vec::new();
            if timers.spawn.is_due() {
                timers.spawn.rearm();
                race_events.extend(spawn_obstacle(&mut race.state));
            }
            if timers.tick.is_due() {
                timers.tick.rearm();
                race_events.extend(tick(&mut race.state));
            }

            self.apply_race_events(race_events);
        }
    }

    fn apply_race_events(&mut self, race_events: Vec<RaceEvent>) {
        for event in race_events {
            match event {
                RaceEvent::Spawned { id, lane, kind } => {
                    self.events.push(SessionEvent::ObstacleSpawned { id, lane, kind });
                }
                RaceEvent::Passed { score, .. } => {
                    self.events.push(SessionEvent::ScoreChanged { score });
                }
                RaceEvent::Collided { id, score } => {
                    self.events.push(SessionEvent::Crashed {
                        obstacle_id: id,
                        score,
                    });
                    self.finish_race();
                    return;
                }
            }
        }
    }

    fn advance_settle(&mut self, dt: u64) {
        let due = match &mut self.round {
            Some(ActiveRound::Slap(SlapSession {
                settle_ms: Some(left),
                ..
            })) => {
                *left = left.saturating_sub(dt);
                *left == 0
            }
            _ => false,
        };
        if due {
            self.finish_slap();
        }
    }

    // === Input ===

    /// Feed every buffered transport gesture to the active round
    pub fn pump_inbox(&mut self) {
        for event in self.inbox.drain() {
            self.handle_gesture(event);
        }
    }

    /// Normalize and apply a raw payload directly
    pub fn handle_raw_payload(&mut self, raw: &str) {
        if let Some(event) = normalize(raw) {
            self.handle_gesture(event);
        }
    }

    pub fn handle_gesture(&mut self, event: GestureEvent) {
        let now = self.clock_ms;
        let expiry = self.config.discrete_expiry_ms;

        match self.phase {
            SessionPhase::RacingActive => {
                let Some(ActiveRound::Race(race)) = &mut self.round else {
                    return;
                };
                match event {
                    GestureEvent::Continuous { norm_x } => race.state.steer_to(norm_x),
                    GestureEvent::Discrete { direction } => {
                        if self.discrete.offer(direction, now, expiry) {
                            race.state.nudge(direction);
                        } else {
                            log::trace!("Duplicate {} nudge ignored", direction.as_str());
                        }
                    }
                    GestureEvent::Slap { .. } => log::debug!("Slap ignored during race"),
                }
            }
            SessionPhase::SlapActive => match event {
                GestureEvent::Slap {
                    speed,
                    distance,
                    magnitude,
                    points,
                } => {
                    let sample = SlapSample::from_sensor(speed, distance, magnitude, points);
                    self.record_slap(sample, SlapSource::Sensor);
                }
                _ => log::trace!("Steering gesture ignored during slap round"),
            },
            _ => log::trace!("Gesture ignored in {:?}", self.phase),
        }
    }

    /// Keyboard/click fallback. Arrow keys steer one step (no dedupe); space
    /// or click produce a synthetic slap.
    pub fn handle_key(&mut self, key: KeyInput) {
        match (self.phase, key) {
            (SessionPhase::RacingActive, KeyInput::ArrowLeft | KeyInput::ArrowRight) => {
                let direction = if key == KeyInput::ArrowLeft {
                    Direction::Left
                } else {
                    Direction::Right
                };
                if let Some(ActiveRound::Race(race)) = &mut self.round {
                    race.state.nudge(direction);
                }
            }
            (SessionPhase::SlapActive, KeyInput::Space | KeyInput::Click) => {
                let sample = SlapSample::synthetic(&mut self.rng);
                self.record_slap(sample, SlapSource::Synthetic);
            }
            _ => {}
        }
    }

    fn record_slap(&mut self, sample: SlapSample, source: SlapSource) {
        let Some(ActiveRound::Slap(slap)) = &mut self.round else {
            return;
        };

        match slap.round.record(sample, self.clock_ms, source) {
            RecordResult::Rejected => {}
            RecordResult::Accepted { record, completed } => {
                let score = slap.round.total_score();
                self.events.push(SessionEvent::SlapRecorded(record));
                self.events.push(SessionEvent::ScoreChanged { score });

                if let Some(summary) = completed {
                    log::info!(
                        "Slap round complete: {} pts over {} slaps",
                        summary.total_score,
                        summary.slap_count
                    );
                    self.events.push(SessionEvent::RoundComplete(summary));
                    if self.config.settle_delay_ms == 0 {
                        self.finish_slap();
                    } else {
                        slap.settle_ms = Some(self.config.settle_delay_ms);
                    }
                }
            }
        }
    }

    // === Round end ===

    fn finish_race(&mut self) {
        let Some(ActiveRound::Race(race)) = &mut self.round else {
            return;
        };
        race.timers = None;

        let state = &race.state;
        let stats = RoundStats::Racing {
            difficulty: state.profile.level,
            control_mode: state.control_mode,
            progression_level: progression_level(state.score),
            obstacles_passed: state.score / crate::consts::OBSTACLE_POINTS,
        };
        let score = state.score;
        self.finish_round(GameMode::Racing, score, stats);
    }

    fn finish_slap(&mut self) {
        let Some(ActiveRound::Slap(slap)) = &mut self.round else {
            return;
        };
        slap.settle_ms = None;

        let summary = slap.round.summary();
        self.finish_round(GameMode::Slap, summary.total_score, RoundStats::Slap(summary));
    }

    fn finish_round(&mut self, mode: GameMode, score: u64, stats: RoundStats) {
        let now = platform::now_ms();
        let update = match &stats {
            RoundStats::Racing {
                difficulty,
                control_mode,
                ..
            } => self.best.record_race(score, *difficulty, *control_mode, now),
            RoundStats::Slap(summary) => {
                self.best
                    .record_slap(score, summary.slap_count, summary.max_speed, now)
            }
        };
        if update.is_new_best {
            if let Err(e) = self.best.save(mode, &mut *self.store) {
                log::warn!("Failed to save best {} score: {}", mode.as_str(), e);
            }
        }

        match self.submit_score(mode, score, &stats.metadata()) {
            Ok(Some(stats)) => self.player_stats = Some(stats),
            Ok(None) => {}
            Err(EngineError::NotAuthenticated) => {
                log::debug!("Not signed in, {} score not submitted", mode.as_str());
            }
            Err(e) => log::warn!("Score submission failed: {}", e),
        }

        self.inbox.set_enabled(false);
        self.discrete.clear();
        self.phase = SessionPhase::Ended;

        let outcome = RoundOutcome {
            mode,
            score,
            stats,
            is_new_best: update.is_new_best,
            previous_best: update.previous,
        };
        log::info!(
            "{} round ended: score {}{}",
            mode.as_str(),
            score,
            if outcome.is_new_best { " (new best)" } else { "" }
        );
        self.last_outcome = Some(outcome.clone());
        self.events.push(SessionEvent::Ended(outcome));
    }

    fn submit_score(
        &mut self,
        mode: GameMode,
        score: u64,
        metadata: &ScoreMetadata,
    ) -> Result<Option<PlayerStats>, EngineError> {
        let Some(service) = self.score_service.as_mut() else {
            return Ok(None);
        };
        let authenticated = self
            .identity
            .as_ref()
            .map(|identity| identity.is_authenticated())
            .unwrap_or(false);
        if !authenticated {
            return Err(EngineError::NotAuthenticated);
        }

        service.submit_score(mode, score, metadata).map(Some)
    }

    /// Ranked entries from the score service (empty without one)
    pub fn leaderboard(&self, mode: GameMode, limit: usize) -> Result<Vec<LeaderboardEntry>, EngineError> {
        match &self.score_service {
            Some(service) => service.leaderboard(mode, limit),
            None => Ok(Vec::new()),
        }
    }

    // === Views ===

    /// Take queued events in order
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn mode(&self) -> Option<GameMode> {
        self.mode
    }

    pub fn difficulty(&self) -> DifficultyLevel {
        self.difficulty
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Shared inbox for transport handlers
    pub fn inbox(&self) -> &GestureInbox {
        &self.inbox
    }

    /// Score of the current (or just-ended) round
    pub fn score(&self) -> u64 {
        match &self.round {
            Some(ActiveRound::Race(race)) => race.state.score,
            Some(ActiveRound::Slap(slap)) => slap.round.total_score(),
            None => 0,
        }
    }

    pub fn race(&self) -> Option<&RaceState> {
        match &self.round {
            Some(ActiveRound::Race(race)) => Some(&race.state),
            _ => None,
        }
    }

    pub fn slap_round(&self) -> Option<&SlapRound> {
        match &self.round {
            Some(ActiveRound::Slap(slap)) => Some(&slap.round),
            _ => None,
        }
    }

    pub fn car_position(&self) -> Option<f32> {
        self.race().map(|race| race.car.position)
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        self.race().map(|race| race.obstacles.as_slice()).unwrap_or(&[])
    }

    pub fn progression_level(&self) -> Option<u32> {
        self.race().map(|race| progression_level(race.score))
    }

    pub fn current_speed(&self) -> Option<f32> {
        self.race().map(|race| race.current_speed())
    }

    pub fn difficulty_label(&self) -> &'static str {
        self.difficulty.profile().label
    }

    /// Recent slaps, newest first
    pub fn slap_history(&self) -> Vec<&SlapRecord> {
        self.slap_round()
            .map(|round| round.history().collect())
            .unwrap_or_default()
    }

    pub fn best_scores(&self) -> &BestScores {
        &self.best
    }

    pub fn last_outcome(&self) -> Option<&RoundOutcome> {
        self.last_outcome.as_ref()
    }

    /// Stats returned by the last successful submission
    pub fn player_stats(&self) -> Option<&PlayerStats> {
        self.player_stats.as_ref()
    }

    #[cfg(test)]
    fn race_state_mut(&mut self) -> Option<&mut RaceState> {
        match &mut self.round {
            Some(ActiveRound::Race(race)) => Some(&mut race.state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryStore;
    use crate::services::{InMemoryScoreService, StaticIdentity};
    use pretty_assertions::assert_eq;

    fn session() -> Session {
        Session::new(EngineConfig::default().with_seed(42), Box::new(MemoryStore::new()))
    }

    fn ended(events: &[SessionEvent]) -> Vec<&RoundOutcome> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Ended(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_starts_idle_and_ignores_input() {
        let mut s = session();
        assert_eq!(s.phase(), SessionPhase::Idle);
        s.handle_key(KeyInput::Space);
        s.handle_raw_payload("left");
        s.inbox().push_raw("right");
        s.update(1_000);
        assert!(s.drain_events().is_empty());
        assert_eq!(s.clock_ms(), 250);
    }

    #[test]
    fn test_extreme_race_collides_once() {
        let mut s = session();
        assert!(s.start_named("racing", "extreme"));
        assert_eq!(s.difficulty(), DifficultyLevel::Complex);
        s.drain_events();

        let race = s.race_state_mut().unwrap();
        assert_eq!(race.car.position, 0.0);
        for lane in 0..3 {
            race.insert_obstacle(lane, 76.5, ObstacleKind::Cone);
        }

        // One tick at speed 3.5 puts all three at travel 80
        s.update(50);
        let events = s.drain_events();
        let crashes: Vec<&SessionEvent> = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Crashed { .. }))
            .collect();
        assert_eq!(crashes, vec![&SessionEvent::Crashed {
            obstacle_id: 1,
            score: 0
        }]);
        assert_eq!(ended(&events).len(), 1);
        assert_eq!(s.phase(), SessionPhase::Ended);
        assert!(s.obstacles().iter().all(|o| o.travel == 80.0));

        for _ in 0..100 {
            s.update(250);
        }
        assert!(s.drain_events().is_empty());
        assert_eq!(s.score(), 0);
        assert!(s.obstacles().iter().all(|o| o.travel == 80.0));
    }

    #[test]
    fn test_passing_obstacles_score() {
        let mut s = session();
        s.start(GameMode::Racing, DifficultyLevel::Intermediate);
        s.drain_events();
        let race = s.race_state_mut().unwrap();
        race.insert_obstacle(0, 99.0, ObstacleKind::Rock);
        race.insert_obstacle(2, 98.0, ObstacleKind::Barrel);

        s.update(50);
        assert_eq!(s.score(), 20);
        assert!(s.obstacles().is_empty());
        assert_eq!(s.drain_events(), vec![
            SessionEvent::ScoreChanged { score: 10 },
            SessionEvent::ScoreChanged { score: 20 },
        ]);
        assert_eq!(s.phase(), SessionPhase::RacingActive);
    }

    #[test]
    fn test_timers_fire_in_order() {
        let mut s = session();
        s.start(GameMode::Racing, DifficultyLevel::Intermediate);
        s.drain_events();

        // Oversized frames are capped
        s.update(10_000);
        assert_eq!(s.race().unwrap().time_ticks, 5);

        for _ in 0..15 {
            s.update(250);
        }
        // 4000 ms: spawn fires first, then the tick moves it once
        assert_eq!(s.race().unwrap().time_ticks, 80);
        assert_eq!(s.obstacles().len(), 1);
        assert_eq!(s.obstacles()[0].travel, -7.5);
        let spawns = s
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::ObstacleSpawned { .. }))
            .count();
        assert_eq!(spawns, 1);
    }

    #[test]
    fn test_ten_slaps_deliver_once_after_settle() {
        let mut s = session();
        s.start(GameMode::Slap, DifficultyLevel::default());
        for _ in 0..10 {
            s.handle_raw_payload(r#"{"type":"slap","speed":10,"distance":5,"magnitude":15,"points":125}"#);
        }
        // Late slap is not counted
        s.handle_raw_payload(r#"{"type":"slap","speed":20,"distance":9}"#);

        let events = s.drain_events();
        let complete: Vec<&SessionEvent> = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::RoundComplete(_)))
            .collect();
        assert_eq!(complete.len(), 1);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SessionEvent::SlapRecorded(_)))
                .count(),
            10
        );
        assert!(ended(&events).is_empty());
        assert_eq!(s.phase(), SessionPhase::SlapActive);

        s.update(99);
        assert!(ended(&s.drain_events()).is_empty());
        s.update(1);
        let events = s.drain_events();
        let outcomes = ended(&events);
        assert_eq!(outcomes.len(), 1);
        let outcome = outcomes[0];
        assert_eq!(outcome.score, 1250);
        assert!(outcome.is_new_best);
        assert_eq!(outcome.previous_best, None);
        assert_eq!(
            outcome.stats,
            RoundStats::Slap(RoundSummary {
                total_score: 1250,
                slap_count: 10,
                max_speed: 10.0,
                max_distance: 5.0,
            })
        );

        s.update(1_000);
        assert!(s.drain_events().is_empty());
        assert_eq!(s.best_scores().best_score(GameMode::Slap), Some(1250));
    }

    #[test]
    fn test_sensor_slap_without_points_scores_zero() {
        let mut s = session();
        s.start(GameMode::Slap, DifficultyLevel::default());
        s.handle_raw_payload(r#"{"type":"slap","speed":10,"distance":5,"magnitude":15}"#);
        s.handle_raw_payload(r#"{"type":"slap","speed":10,"distance":5,"points":"abc"}"#);
        assert_eq!(s.slap_round().unwrap().slap_count(), 2);
        assert_eq!(s.score(), 0);

        s.handle_raw_payload(r#"{"type":"slap","speed":10,"distance":5,"points":"140"}"#);
        assert_eq!(s.score(), 140);
    }

    #[test]
    fn test_settle_starts_after_inbox_slap() {
        let mut s = session();
        s.start(GameMode::Slap, DifficultyLevel::default());
        for _ in 0..10 {
            s.inbox().push_raw(r#"{"type":"slap","speed":10,"distance":5,"points":125}"#);
        }

        // The tenth slap lands in this frame; delivery waits a full settle
        s.update(250);
        let events = s.drain_events();
        assert!(events.iter().any(|e| matches!(e, SessionEvent::RoundComplete(_))));
        assert!(ended(&events).is_empty());
        assert_eq!(s.phase(), SessionPhase::SlapActive);

        s.update(99);
        assert!(ended(&s.drain_events()).is_empty());
        s.update(1);
        assert_eq!(ended(&s.drain_events()).len(), 1);
        assert_eq!(s.last_outcome().unwrap().score, 1250);
    }

    #[test]
    fn test_slap_replay_clears_history() {
        let mut s = session();
        s.start(GameMode::Slap, DifficultyLevel::default());
        for _ in 0..10 {
            s.handle_key(KeyInput::Space);
        }
        s.update(100);
        assert_eq!(s.phase(), SessionPhase::Ended);
        assert!(s.score() > 0);
        assert_eq!(s.slap_history().len(), 10);

        assert!(s.replay());
        assert_eq!(s.phase(), SessionPhase::SlapActive);
        assert!(s.slap_history().is_empty());
        assert_eq!(s.score(), 0);
        let round = s.slap_round().unwrap();
        assert!(!round.is_complete());
        assert_eq!(round.slaps_remaining(), 10);
    }

    #[test]
    fn test_keyboard_fallback_slaps() {
        let mut s = session();
        s.start(GameMode::Slap, DifficultyLevel::default());
        for _ in 0..10 {
            s.handle_key(KeyInput::Space);
        }
        assert!(s.slap_round().unwrap().is_complete());
        assert_eq!(s.slap_history().len(), 10);
        assert!(
            s.slap_history()
                .iter()
                .all(|r| r.source == SlapSource::Synthetic)
        );
        s.update(100);
        assert_eq!(s.phase(), SessionPhase::Ended);
    }

    #[test]
    fn test_replay_resets_round() {
        let mut s = session();
        s.start(GameMode::Racing, DifficultyLevel::Beginner);
        // First tick passes the left obstacle, the second hits the center one
        let race = s.race_state_mut().unwrap();
        race.insert_obstacle(0, 99.0, ObstacleKind::Cone);
        race.insert_obstacle(1, 66.0, ObstacleKind::Cone);
        s.update(100);
        assert_eq!(s.phase(), SessionPhase::Ended);
        assert_eq!(s.last_outcome().unwrap().score, 10);

        assert!(s.replay());
        assert_eq!(s.phase(), SessionPhase::RacingActive);
        assert_eq!(s.difficulty(), DifficultyLevel::Beginner);
        assert_eq!(s.score(), 0);
        assert!(s.obstacles().is_empty());
        assert_eq!(s.car_position(), Some(0.0));

        // A score equal to the best is not a new best
        let race = s.race_state_mut().unwrap();
        race.insert_obstacle(0, 99.0, ObstacleKind::Cone);
        race.insert_obstacle(1, 66.0, ObstacleKind::Cone);
        s.update(100);
        let outcome = s.last_outcome().unwrap();
        assert!(!outcome.is_new_best);
        assert_eq!(outcome.previous_best, Some(10));

        s.return_to_menu();
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert!(s.race().is_none());
    }

    #[test]
    fn test_input_ignored_after_end() {
        let mut s = session();
        s.start(GameMode::Racing, DifficultyLevel::Complex);
        s.race_state_mut()
            .unwrap()
            .insert_obstacle(1, 76.5, ObstacleKind::Rock);
        s.update(50);
        assert_eq!(s.phase(), SessionPhase::Ended);
        s.drain_events();

        s.handle_key(KeyInput::ArrowLeft);
        s.handle_raw_payload(r#"{"normX":0.9}"#);
        assert_eq!(s.car_position(), Some(0.0));
        assert!(!s.inbox().push_raw("left"));
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_discrete_gestures_dedupe() {
        let mut s = session();
        s.start(GameMode::Racing, DifficultyLevel::Beginner);
        s.handle_raw_payload("left");
        s.handle_raw_payload("left");
        assert!((s.car_position().unwrap() + 0.08).abs() < 1e-6);

        s.update(100);
        s.handle_raw_payload("left");
        assert!((s.car_position().unwrap() + 0.16).abs() < 1e-6);

        // Keyboard steps are never deduped
        s.handle_key(KeyInput::ArrowRight);
        s.handle_key(KeyInput::ArrowRight);
        assert!((s.car_position().unwrap() - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_lane_mode_and_inbox_pump() {
        let config = EngineConfig::default()
            .with_seed(3)
            .with_control_mode(ControlMode::Lane);
        let mut s = Session::new(config, Box::new(MemoryStore::new()));
        s.start(GameMode::Racing, DifficultyLevel::Beginner);
        s.inbox().push_raw(r#"{"normX":0.1}"#);
        s.inbox().push_raw(r#"{"normX":0.8}"#);
        assert_eq!(s.inbox().len(), 1);
        s.update(0);
        assert_eq!(s.car_position(), Some(0.65));
        assert!(s.inbox().is_empty());
    }

    #[test]
    fn test_submission_requires_identity() {
        let service = InMemoryScoreService::new("ada");
        let mut s = session().with_score_service(Box::new(service.clone()));
        s.start(GameMode::Slap, DifficultyLevel::default());
        for _ in 0..10 {
            s.handle_key(KeyInput::Click);
        }
        s.update(100);
        assert_eq!(s.phase(), SessionPhase::Ended);
        assert_eq!(service.submission_count(), 0);
        assert!(s.player_stats().is_none());
    }

    #[test]
    fn test_submission_sends_metadata() {
        let service = InMemoryScoreService::new("ada");
        let mut s = session()
            .with_score_service(Box::new(service.clone()))
            .with_identity(Box::new(StaticIdentity::signed_in("ada")));
        s.start(GameMode::Racing, DifficultyLevel::Complex);
        s.race_state_mut()
            .unwrap()
            .insert_obstacle(1, 76.5, ObstacleKind::Rock);
        s.update(50);

        assert_eq!(service.submission_count(), 1);
        let stats = s.player_stats().unwrap();
        assert_eq!(stats.racing.games_played, 1);
        assert_eq!(stats.rank, Some(1));
        let board = s.leaderboard(GameMode::Racing, 10).unwrap();
        assert_eq!(board[0].difficulty, Some(DifficultyLevel::Complex));
        assert_eq!(board[0].control_mode, Some(ControlMode::Continuous));
        assert_eq!(board[0].total_slaps, None);
    }

    #[test]
    fn test_submission_failure_is_not_fatal() {
        let service = InMemoryScoreService::new("ada");
        service.set_offline(true);
        let mut s = session()
            .with_score_service(Box::new(service.clone()))
            .with_identity(Box::new(StaticIdentity::signed_in("ada")));
        s.start(GameMode::Slap, DifficultyLevel::default());
        for _ in 0..10 {
            s.handle_raw_payload(r#"{"type":"slap","speed":10,"distance":5,"points":125}"#);
        }
        s.update(100);

        let events = s.drain_events();
        assert_eq!(ended(&events).len(), 1);
        assert!(s.player_stats().is_none());
        assert_eq!(s.best_scores().best_score(GameMode::Slap), Some(1250));
        assert!(s.replay());
        assert_eq!(s.phase(), SessionPhase::SlapActive);
    }

    #[test]
    fn test_best_scores_reloaded_on_start() {
        let store = MemoryStore::new();
        let mut s = Session::new(EngineConfig::default().with_seed(1), Box::new(store));
        s.start(GameMode::Slap, DifficultyLevel::default());
        for _ in 0..10 {
            s.handle_raw_payload(r#"{"type":"slap","speed":10,"distance":5,"points":125}"#);
        }
        s.update(100);
        assert_eq!(s.best_scores().best_score(GameMode::Slap), Some(1250));
        // Reloaded at the next start from the same store
        s.start(GameMode::Slap, DifficultyLevel::default());
        assert_eq!(s.best_scores().best_score(GameMode::Slap), Some(1250));
    }

    #[test]
    fn test_start_named_rejects_unknown_mode() {
        let mut s = session();
        assert!(!s.start_named("pinball", "easy"));
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert!(!s.replay());

        assert!(s.start_named("slap", "whatever"));
        assert_eq!(s.difficulty(), DifficultyLevel::Intermediate);
        assert_eq!(s.difficulty_label(), "Medium");
    }
}
