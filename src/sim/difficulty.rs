//! Difficulty profiles and score-driven progression
//!
//! A race resolves one [`DifficultyProfile`] at start. Obstacle speed is then
//! recomputed every tick from the current score; nothing accumulates.

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_PROGRESSION_LEVEL, POINTS_PER_LEVEL, SPEED_PER_LEVEL};

/// Named difficulty tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    Beginner,
    #[default]
    Intermediate,
    Complex,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 3] = [
        DifficultyLevel::Beginner,
        DifficultyLevel::Intermediate,
        DifficultyLevel::Complex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "beginner",
            DifficultyLevel::Intermediate => "intermediate",
            DifficultyLevel::Complex => "complex",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" | "relaxed" | "easy" => Some(DifficultyLevel::Beginner),
            "intermediate" | "balanced" | "medium" => Some(DifficultyLevel::Intermediate),
            "complex" | "extreme" | "hard" => Some(DifficultyLevel::Complex),
            _ => None,
        }
    }

    pub fn profile(&self) -> DifficultyProfile {
        match self {
            DifficultyLevel::Beginner => DifficultyProfile {
                level: *self,
                spawn_interval_ms: 6000,
                base_obstacle_speed: 2.0,
                label: "Easy",
            },
            DifficultyLevel::Intermediate => DifficultyProfile {
                level: *self,
                spawn_interval_ms: 4000,
                base_obstacle_speed: 2.5,
                label: "Medium",
            },
            DifficultyLevel::Complex => DifficultyProfile {
                level: *self,
                spawn_interval_ms: 2000,
                base_obstacle_speed: 3.5,
                label: "Hard",
            },
        }
    }
}

/// Spawn and speed parameters for one race
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DifficultyProfile {
    pub level: DifficultyLevel,
    /// Time between obstacle spawns
    pub spawn_interval_ms: u64,
    /// Travel per tick at progression level 1
    pub base_obstacle_speed: f32,
    pub label: &'static str,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        DifficultyLevel::default().profile()
    }
}

impl DifficultyProfile {
    /// Obstacle travel per tick at the given score
    pub fn speed_at(&self, score: u64) -> f32 {
        current_speed(self, progression_level(score))
    }
}

/// Resolve a level name; unknown names fall back to the default profile
pub fn resolve(name: &str) -> DifficultyProfile {
    match DifficultyLevel::from_str(name) {
        Some(level) => level.profile(),
        None => {
            log::warn!(
                "Unknown difficulty {:?}, using {}",
                name,
                DifficultyLevel::default().as_str()
            );
            DifficultyProfile::default()
        }
    }
}

/// Progression level for a score: one level per 50 points, capped at 5
pub fn progression_level(score: u64) -> u32 {
    let level = (score / POINTS_PER_LEVEL).saturating_add(1);
    level.min(MAX_PROGRESSION_LEVEL as u64) as u32
}

/// Base speed plus 0.3 per progression level above 1
pub fn current_speed(profile: &DifficultyProfile, progression_level: u32) -> f32 {
    let bonus_levels = progression_level.saturating_sub(1) as f32;
    profile.base_obstacle_speed + bonus_levels * SPEED_PER_LEVEL
}
