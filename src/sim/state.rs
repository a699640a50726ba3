//! Race state and core simulation types
//!
//! Everything one obstacle race owns lives in [`RaceState`]. A fresh state is
//! built for every round, so nothing carries over between replays.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::difficulty::DifficultyProfile;
use super::gesture::Direction;
use crate::clamp_unit;
use crate::consts::{LANE_CENTERS, NUDGE_STEP};

/// Race phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    /// Obstacles spawn and advance
    Running,
    /// Car hit an obstacle; the field is frozen
    Collided,
}

/// How the car is steered and how collisions are tested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Analog position; collisions use a band around each lane center
    #[default]
    Continuous,
    /// Three fixed lanes; collisions use lane equality
    Lane,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Continuous => "analog",
            ControlMode::Lane => "lane",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "analog" | "continuous" => Some(ControlMode::Continuous),
            "lane" | "discrete" => Some(ControlMode::Lane),
            _ => None,
        }
    }
}

/// Obstacle catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    Cone,
    Barrel,
    Rock,
}

impl ObstacleKind {
    pub const ALL: [ObstacleKind; 3] = [ObstacleKind::Cone, ObstacleKind::Barrel, ObstacleKind::Rock];
}

/// An obstacle moving down the road
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    /// Lane index 0..=2 (left, center, right)
    pub lane: usize,
    /// Progress from spawn (-10) to off-field (>100)
    pub travel: f32,
    pub kind: ObstacleKind,
}

/// The player's car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarState {
    /// Horizontal position in [-1, 1]
    pub position: f32,
}

impl Default for CarState {
    fn default() -> Self {
        // Start in the center lane
        Self {
            position: LANE_CENTERS[1],
        }
    }
}

impl CarState {
    /// Lane whose center is nearest the car (ties go to the lower lane)
    pub fn lane(&self) -> usize {
        nearest_lane(self.position)
    }

    /// Apply an analog position
    pub fn set_position(&mut self, norm_x: f32, mode: ControlMode) {
        let x = clamp_unit(norm_x);
        self.position = match mode {
            ControlMode::Continuous => x,
            ControlMode::Lane => LANE_CENTERS[nearest_lane(x)],
        };
    }

    /// Apply a single-step nudge (`sign` is -1 or +1)
    pub fn nudge(&mut self, sign: f32, mode: ControlMode) {
        match mode {
            ControlMode::Continuous => {
                self.position = clamp_unit(self.position + sign * NUDGE_STEP);
            }
            ControlMode::Lane => {
                let lane = self.lane();
                let target = if sign < 0.0 {
                    lane.saturating_sub(1)
                } else {
                    (lane + 1).min(LANE_CENTERS.len() - 1)
                };
                self.position = LANE_CENTERS[target];
            }
        }
    }
}

/// Index of the lane center closest to `x`
pub fn nearest_lane(x: f32) -> usize {
    let mut best = 0;
    for (i, center) in LANE_CENTERS.iter().enumerate() {
        if (x - center).abs() < (x - LANE_CENTERS[best]).abs() {
            best = i;
        }
    }
    best
}

/// Complete race state
#[derive(Debug, Clone)]
pub struct RaceState {
    /// Seed the spawn RNG was built from
    pub seed: u64,
    /// Spawn RNG
    pub rng: Pcg32,
    pub profile: DifficultyProfile,
    pub control_mode: ControlMode,
    pub phase: RacePhase,
    /// Obstacles passed, 10 points each
    pub score: u64,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub car: CarState,
    /// Live obstacles (sorted by id)
    pub obstacles: Vec<Obstacle>,
    /// Next obstacle ID
    next_id: u32,
}

impl RaceState {
    pub fn new(seed: u64, profile: DifficultyProfile, control_mode: ControlMode) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            profile,
            control_mode,
            phase: RacePhase::Running,
            score: 0,
            time_ticks: 0,
            car: CarState::default(),
            obstacles: Vec::new(),
            next_id: 0,
        }
    }

    /// Allocate a new obstacle ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn is_running(&self) -> bool {
        self.phase == RacePhase::Running
    }

    /// Obstacle travel per tick at the current score
    pub fn current_speed(&self) -> f32 {
        self.profile.speed_at(self.score)
    }

    /// Steer to an analog position (ignored once collided)
    pub fn steer_to(&mut self, norm_x: f32) {
        if self.is_running() {
            self.car.set_position(norm_x, self.control_mode);
        }
    }

    /// One-step nudge (ignored once collided)
    pub fn nudge(&mut self, direction: Direction) {
        if self.is_running() {
            self.car.nudge(direction.sign(), self.control_mode);
        }
    }

    /// Place an obstacle directly (scripted scenarios and tests)
    pub fn insert_obstacle(&mut self, lane: usize, travel: f32, kind: ObstacleKind) -> u32 {
        let id = self.next_entity_id();
        self.obstacles.push(Obstacle {
            id,
            lane: lane.min(LANE_CENTERS.len() - 1),
            travel,
            kind,
        });
        id
    }
}
