//! Engine configuration
//!
//! Persisted as JSON under a fixed key, separately from best scores. Missing
//! fields take their defaults so older saved configs keep loading.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::EngineError;
use crate::platform::KeyValueStore;
use crate::sim::{ControlMode, DifficultyLevel};

/// Engine timing and gameplay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Timing ===
    /// Race tick period
    pub tick_interval_ms: u64,
    /// Delay between a completed slap round and its delivery
    pub settle_delay_ms: u64,
    /// Lifetime of a discrete transport gesture
    pub discrete_expiry_ms: u64,
    /// Longest step a single `update` call will simulate
    pub max_frame_ms: u64,

    // === Gameplay ===
    pub control_mode: ControlMode,
    pub default_difficulty: DifficultyLevel,
    pub slaps_per_round: u32,
    /// Fixed RNG seed; `None` seeds from the clock
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            settle_delay_ms: SETTLE_DELAY_MS,
            discrete_expiry_ms: DISCRETE_EXPIRY_MS,
            max_frame_ms: MAX_FRAME_MS,

            control_mode: ControlMode::Continuous,
            default_difficulty: DifficultyLevel::Intermediate,
            slaps_per_round: SLAPS_PER_ROUND,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Storage key
    const STORAGE_KEY: &'static str = "gesture_arcade_config";

    /// Same config with a fixed seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Same config with another control mode
    pub fn with_control_mode(mut self, mode: ControlMode) -> Self {
        self.control_mode = mode;
        self
    }

    /// Zero periods would stall the timers; bump them to 1 ms
    pub fn sanitized(mut self) -> Self {
        self.tick_interval_ms = self.tick_interval_ms.max(1);
        self.max_frame_ms = self.max_frame_ms.max(1);
        self.slaps_per_round = self.slaps_per_round.max(1);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Load from a store, falling back to defaults
    pub fn load(store: &dyn KeyValueStore) -> Self {
        if let Some(json) = store.get(Self::STORAGE_KEY) {
            match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded engine config");
                    return config;
                }
                Err(e) => log::warn!("Ignoring corrupt engine config: {}", e),
            }
        }

        log::info!("Using default engine config");
        Self::default()
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), EngineError> {
        let json = serde_json::to_string(self)?;
        store.set(Self::STORAGE_KEY, &json)?;
        log::info!("Engine config saved");
        Ok(())
    }

    /// Read a config file (native only)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file(path: &std::path::Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
