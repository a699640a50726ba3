//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Time arrives only as explicit ticks and timestamps
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No transport, storage or platform dependencies

pub mod collision;
pub mod difficulty;
pub mod gesture;
pub mod slap;
pub mod state;
pub mod tick;

pub use collision::{first_collision, in_impact_band, obstacle_hits_car};
pub use difficulty::{DifficultyLevel, DifficultyProfile, current_speed, progression_level, resolve};
pub use gesture::{Direction, ExpiringInput, GestureEvent, normalize};
pub use slap::{
    RecordResult, RoundPhase, RoundSummary, SlapRating, SlapRecord, SlapRound, SlapSample,
    SlapSource, slap_points,
};
pub use state::{CarState, ControlMode, Obstacle, ObstacleKind, RacePhase, RaceState};
pub use tick::{RaceEvent, spawn_obstacle, tick};
