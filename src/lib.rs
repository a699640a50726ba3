//! Gesture Arcade - session engine for a motion-gesture arcade
//!
//! Core modules:
//! - `sim`: Deterministic simulation (obstacle race, slap rounds, gestures)
//! - `session`: Round lifecycle, timers and score hand-off
//! - `input`: Gesture inbox and keyboard/click fallback
//! - `services`: Transport, score and identity collaborators
//! - `platform`: Key-value storage backends (memory, file, LocalStorage)
//! - `timer`: Fixed-period timers driven by explicit elapsed time

pub mod error;
pub mod highscores;
pub mod input;
pub mod platform;
pub mod services;
pub mod session;
pub mod settings;
pub mod sim;
pub mod timer;

pub use error::EngineError;
pub use highscores::{BestScores, RaceBest, SlapBest};
pub use input::{GestureInbox, KeyInput};
pub use session::{GameMode, RoundOutcome, RoundStats, Session, SessionEvent, SessionPhase};
pub use settings::EngineConfig;

/// Game configuration constants
pub mod consts {
    /// Race simulation tick period (ms)
    pub const TICK_INTERVAL_MS: u64 = 50;
    /// Cap on a single `update` step to prevent a spiral of catch-up work
    pub const MAX_FRAME_MS: u64 = 250;

    /// Obstacles spawn just above the visible field
    pub const SPAWN_TRAVEL: f32 = -10.0;
    /// Obstacles past this travel are off-field and scored
    pub const EXIT_TRAVEL: f32 = 100.0;
    /// Travel range in which an obstacle can hit the car (inclusive)
    pub const IMPACT_BAND: (f32, f32) = (70.0, 95.0);
    /// Points for each obstacle that leaves the field
    pub const OBSTACLE_POINTS: u64 = 10;

    /// Horizontal lane centers in normalized car coordinates
    pub const LANE_CENTERS: [f32; 3] = [-0.65, 0.0, 0.65];
    /// Continuous-mode collision half-width around a lane center
    pub const COLLISION_HALF_WIDTH: f32 = 0.25;
    /// Car position step for a discrete nudge
    pub const NUDGE_STEP: f32 = 0.08;

    /// Score needed per progression level
    pub const POINTS_PER_LEVEL: u64 = 50;
    /// Highest progression level
    pub const MAX_PROGRESSION_LEVEL: u32 = 5;
    /// Additive obstacle speed per progression level above 1
    pub const SPEED_PER_LEVEL: f32 = 0.3;

    /// Slaps per round
    pub const SLAPS_PER_ROUND: u32 = 10;
    /// Slap records kept for display
    pub const SLAP_HISTORY_LEN: usize = 10;
    /// Delay between the final slap and round delivery (ms)
    pub const SETTLE_DELAY_MS: u64 = 100;
    /// Lifetime of a discrete transport gesture (ms)
    pub const DISCRETE_EXPIRY_MS: u64 = 100;
}

/// Clamp a normalized horizontal coordinate to [-1, 1]
#[inline]
pub fn clamp_unit(x: f32) -> f32 {
    x.clamp(-1.0, 1.0)
}
