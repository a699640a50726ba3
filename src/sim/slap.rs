//! Slap round aggregation
//!
//! A round accepts slaps until a fixed count is reached, then completes with a
//! frozen [`RoundSummary`]. Sensor slaps and synthetic (keyboard/click) slaps
//! go through the same [`SlapRound::record`] path.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::SLAP_HISTORY_LEN;

/// Where a slap came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlapSource {
    Sensor,
    Synthetic,
}

/// Measured values of one slap before it is recorded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlapSample {
    pub speed: f32,
    pub distance: f32,
    pub magnitude: f32,
    pub points: u64,
}

impl SlapSample {
    /// Build a sample from sensor values. The sensor does its own scoring;
    /// a slap it sent without points is worth 0.
    pub fn from_sensor(speed: f32, distance: f32, magnitude: f32, points: Option<u64>) -> Self {
        Self {
            speed,
            distance,
            magnitude,
            points: points.unwrap_or(0),
        }
    }

    /// Random slap for the keyboard/click fallback
    pub fn synthetic<R: Rng>(rng: &mut R) -> Self {
        let speed = rng.random_range(5.0f32..20.0);
        let distance = rng.random_range(3.0f32..10.0);
        Self {
            speed,
            distance,
            magnitude: speed * 1.5,
            points: slap_points(speed, distance),
        }
    }
}

/// `round(speed * 10 + distance * 5)`
pub fn slap_points(speed: f32, distance: f32) -> u64 {
    (speed * 10.0 + distance * 5.0).round().max(0.0) as u64
}

/// A recorded slap (immutable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlapRecord {
    pub id: u32,
    pub speed: f32,
    pub distance: f32,
    pub points: u64,
    pub magnitude: f32,
    /// Session clock (ms) when recorded
    pub timestamp_ms: u64,
    pub source: SlapSource,
}

impl SlapRecord {
    pub fn rating(&self) -> SlapRating {
        SlapRating::for_points(self.points)
    }
}

/// Cosmetic quality tier for a slap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlapRating {
    Legendary,
    Amazing,
    Great,
    Good,
    Nice,
}

impl SlapRating {
    pub fn for_points(points: u64) -> Self {
        match points {
            p if p > 200 => SlapRating::Legendary,
            p if p > 150 => SlapRating::Amazing,
            p if p > 100 => SlapRating::Great,
            p if p > 50 => SlapRating::Good,
            _ => SlapRating::Nice,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SlapRating::Legendary => "LEGENDARY!",
            SlapRating::Amazing => "AMAZING!",
            SlapRating::Great => "GREAT!",
            SlapRating::Good => "GOOD",
            SlapRating::Nice => "NICE",
        }
    }
}

/// Round phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Active,
    Completed,
}

/// Final totals of a round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub total_score: u64,
    pub slap_count: u32,
    pub max_speed: f32,
    pub max_distance: f32,
}

/// Result of offering a slap to the round
#[derive(Debug, Clone, PartialEq)]
pub enum RecordResult {
    /// Round already complete; the slap was not counted
    Rejected,
    Accepted {
        record: SlapRecord,
        /// Set on the slap that reached the round's slap count
        completed: Option<RoundSummary>,
    },
}

/// Slap history and running totals for one round
#[derive(Debug, Clone)]
pub struct SlapRound {
    pub phase: RoundPhase,
    slaps_per_round: u32,
    /// Most recent first
    history: VecDeque<SlapRecord>,
    total_score: u64,
    slap_count: u32,
    max_speed: f32,
    max_distance: f32,
    next_id: u32,
}

impl SlapRound {
    pub fn new(slaps_per_round: u32) -> Self {
        Self {
            phase: RoundPhase::Active,
            slaps_per_round: slaps_per_round.max(1),
            history: VecDeque::with_capacity(SLAP_HISTORY_LEN),
            total_score: 0,
            slap_count: 0,
            max_speed: 0.0,
            max_distance: 0.0,
            next_id: 1,
        }
    }

    /// Record one slap. Totals are final by the time this returns.
    pub fn record(&mut self, sample: SlapSample, timestamp_ms: u64, source: SlapSource) -> RecordResult {
        if self.phase == RoundPhase::Completed {
            log::debug!("Ignoring slap after round completion");
            return RecordResult::Rejected;
        }

        let record = SlapRecord {
            id: self.next_id,
            speed: sample.speed,
            distance: sample.distance,
            points: sample.points,
            magnitude: sample.magnitude,
            timestamp_ms,
            source,
        };
        self.next_id += 1;

        self.history.push_front(record.clone());
        self.history.truncate(SLAP_HISTORY_LEN);
        self.total_score += record.points;
        self.slap_count += 1;
        self.max_speed = self.max_speed.max(record.speed);
        self.max_distance = self.max_distance.max(record.distance);

        log::debug!(
            "Slap #{} ({:?}): {} pts, total {} after {} slaps",
            record.id,
            source,
            record.points,
            self.total_score,
            self.slap_count
        );

        let completed = if self.slap_count >= self.slaps_per_round {
            self.phase = RoundPhase::Completed;
            Some(self.summary())
        } else {
            None
        };

        RecordResult::Accepted { record, completed }
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            total_score: self.total_score,
            slap_count: self.slap_count,
            max_speed: self.max_speed,
            max_distance: self.max_distance,
        }
    }

    /// Recent slaps, newest first
    pub fn history(&self) -> impl Iterator<Item = &SlapRecord> {
        self.history.iter()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == RoundPhase::Completed
    }

    pub fn total_score(&self) -> u64 {
        self.total_score
    }

    pub fn slap_count(&self) -> u32 {
        self.slap_count
    }

    pub fn slaps_remaining(&self) -> u32 {
        self.slaps_per_round.saturating_sub(self.slap_count)
    }
}
