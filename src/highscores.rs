//! Local best-score records
//!
//! One record per game mode, persisted to a key-value store. Read when a
//! round starts, written when a round beats it.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::platform::KeyValueStore;
use crate::session::GameMode;
use crate::sim::{ControlMode, DifficultyLevel};

/// Best race result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceBest {
    pub score: u64,
    pub difficulty: DifficultyLevel,
    #[serde(default)]
    pub control_mode: ControlMode,
    /// Unix timestamp (ms) when achieved
    pub timestamp: u64,
}

/// Best slap round result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlapBest {
    pub score: u64,
    pub slaps: u32,
    pub max_speed: f32,
    /// Unix timestamp (ms) when achieved
    pub timestamp: u64,
}

/// Outcome of offering a finished round to the records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestUpdate {
    pub is_new_best: bool,
    pub previous: Option<u64>,
}

/// Best results per mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BestScores {
    pub racing: Option<RaceBest>,
    pub slap: Option<SlapBest>,
}

impl BestScores {
    const RACING_KEY: &'static str = "gesture_arcade_best_racing";
    const SLAP_KEY: &'static str = "gesture_arcade_best_slap";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_score(&self, mode: GameMode) -> Option<u64> {
        match mode {
            GameMode::Racing => self.racing.as_ref().map(|b| b.score),
            GameMode::Slap => self.slap.as_ref().map(|b| b.score),
        }
    }

    /// A score beats the record if it is strictly higher, or if there is none
    pub fn qualifies(&self, mode: GameMode, score: u64) -> bool {
        self.best_score(mode).map(|best| score > best).unwrap_or(true)
    }

    pub fn record_race(
        &mut self,
        score: u64,
        difficulty: DifficultyLevel,
        control_mode: ControlMode,
        timestamp: u64,
    ) -> BestUpdate {
        let previous = self.best_score(GameMode::Racing);
        let is_new_best = self.qualifies(GameMode::Racing, score);
        if is_new_best {
            self.racing = Some(RaceBest {
                score,
                difficulty,
                control_mode,
                timestamp,
            });
        }
        BestUpdate { is_new_best, previous }
    }

    pub fn record_slap(&mut self, score: u64, slaps: u32, max_speed: f32, timestamp: u64) -> BestUpdate {
        let previous = self.best_score(GameMode::Slap);
        let is_new_best = self.qualifies(GameMode::Slap, score);
        if is_new_best {
            self.slap = Some(SlapBest {
                score,
                slaps,
                max_speed,
                timestamp,
            });
        }
        BestUpdate { is_new_best, previous }
    }

    /// Load both records; missing or corrupt entries read as empty
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let scores = Self {
            racing: load_entry(store, Self::RACING_KEY),
            slap: load_entry(store, Self::SLAP_KEY),
        };
        log::info!(
            "Loaded best scores (racing: {:?}, slap: {:?})",
            scores.best_score(GameMode::Racing),
            scores.best_score(GameMode::Slap)
        );
        scores
    }

    /// Persist one mode's record
    pub fn save(&self, mode: GameMode, store: &mut dyn KeyValueStore) -> Result<(), EngineError> {
        let (key, json) = match mode {
            GameMode::Racing => (Self::RACING_KEY, serde_json::to_string(&self.racing)?),
            GameMode::Slap => (Self::SLAP_KEY, serde_json::to_string(&self.slap)?),
        };
        store.set(key, &json)?;
        log::info!("Best {} score saved", mode.as_str());
        Ok(())
    }
}

fn load_entry<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let json = store.get(key)?;
    match serde_json::from_str::<Option<T>>(&json) {
        Ok(entry) => entry,
        Err(e) => {
            log::warn!("Ignoring corrupt best-score entry {}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryStore;

    #[test]
    fn test_first_result_is_best() {
        let mut scores = BestScores::new();
        let update = scores.record_slap(0, 10, 0.0, 1);
        assert!(update.is_new_best);
        assert_eq!(update.previous, None);
        assert_eq!(scores.best_score(GameMode::Slap), Some(0));
    }

    #[test]
    fn test_only_strictly_higher_replaces() {
        let mut scores = BestScores::new();
        scores.record_race(40, DifficultyLevel::Beginner, ControlMode::Lane, 1);

        let tie = scores.record_race(40, DifficultyLevel::Complex, ControlMode::Continuous, 2);
        assert!(!tie.is_new_best);
        assert_eq!(scores.racing.as_ref().map(|b| b.difficulty), Some(DifficultyLevel::Beginner));

        let better = scores.record_race(70, DifficultyLevel::Complex, ControlMode::Continuous, 3);
        assert!(better.is_new_best);
        assert_eq!(better.previous, Some(40));
        assert_eq!(scores.best_score(GameMode::Racing), Some(70));
        // Modes are independent
        assert_eq!(scores.best_score(GameMode::Slap), None);
    }

    #[test]
    fn test_save_and_load() {
        let mut store = MemoryStore::new();
        let mut scores = BestScores::new();
        scores.record_race(120, DifficultyLevel::Intermediate, ControlMode::Continuous, 5);
        scores.record_slap(1250, 10, 19.5, 6);
        scores.save(GameMode::Racing, &mut store).unwrap();
        scores.save(GameMode::Slap, &mut store).unwrap();

        assert_eq!(BestScores::load(&store), scores);
    }

    #[test]
    fn test_corrupt_entry_ignored() {
        let mut store = MemoryStore::new();
        store.set(BestScores::RACING_KEY, "not json").unwrap();
        assert_eq!(BestScores::load(&store), BestScores::new());
    }
}
