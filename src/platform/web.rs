//! Browser bindings
//!
//! [`LocalStorageStore`] backs best scores and config with `window.localStorage`.
//! [`WebEngine`] exposes a session to JavaScript: the page forwards broker
//! messages, key presses and animation-frame deltas, then polls JSON events.

use wasm_bindgen::prelude::*;

use super::storage::{KeyValueStore, MemoryStore};
use crate::error::EngineError;
use crate::input::KeyInput;
use crate::session::{Session, SessionEvent};
use crate::settings::EngineConfig;

/// `window.localStorage` as a key-value store
pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

impl LocalStorageStore {
    pub fn new() -> Result<Self, EngineError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| EngineError::Storage("localStorage unavailable".into()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), EngineError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| EngineError::Storage(format!("set {}: {:?}", key, e)))
    }

    fn remove(&mut self, key: &str) -> Result<(), EngineError> {
        self.storage
            .remove_item(key)
            .map_err(|e| EngineError::Storage(format!("remove {}: {:?}", key, e)))
    }
}

/// Session handle for the page script
#[wasm_bindgen]
pub struct WebEngine {
    session: Session,
}

#[wasm_bindgen]
impl WebEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebEngine {
        console_error_panic_hook::set_once();
        // A second engine on the same page finds the logger already set
        let _ = console_log::init_with_level(log::Level::Info);

        let store: Box<dyn KeyValueStore> = match LocalStorageStore::new() {
            Ok(store) => Box::new(store),
            Err(e) => {
                log::warn!("{}, best scores will not persist", e);
                Box::new(MemoryStore::new())
            }
        };
        let config = EngineConfig::load(store.as_ref());
        log::info!("Gesture Arcade engine ready");

        WebEngine {
            session: Session::new(config, store),
        }
    }

    /// Start `racing` or `slap`; returns false for an unknown mode
    pub fn start(&mut self, mode: &str, difficulty: &str) -> bool {
        self.session.start_named(mode, difficulty)
    }

    pub fn replay(&mut self) -> bool {
        self.session.replay()
    }

    #[wasm_bindgen(js_name = returnToMenu)]
    pub fn return_to_menu(&mut self) {
        self.session.return_to_menu();
    }

    /// Advance by the animation-frame delta
    pub fn update(&mut self, dt_ms: f64) {
        self.session.update(dt_ms.max(0.0) as u64);
    }

    /// Raw broker payload; buffered until the next update
    pub fn gesture(&self, raw: &str) -> bool {
        self.session.inbox().push_raw(raw)
    }

    /// `KeyboardEvent.key` value; unmapped keys are ignored
    pub fn key(&mut self, key: &str) {
        if let Some(key) = KeyInput::from_key(key) {
            self.session.handle_key(key);
        }
    }

    pub fn click(&mut self) {
        self.session.handle_key(KeyInput::Click);
    }

    pub fn score(&self) -> f64 {
        self.session.score() as f64
    }

    pub fn phase(&self) -> String {
        format!("{:?}", self.session.phase())
    }

    #[wasm_bindgen(js_name = carPosition)]
    pub fn car_position(&self) -> Option<f32> {
        self.session.car_position()
    }

    #[wasm_bindgen(js_name = difficultyLabel)]
    pub fn difficulty_label(&self) -> String {
        self.session.difficulty_label().to_string()
    }

    /// Live obstacles as a JSON array
    #[wasm_bindgen(js_name = obstaclesJson)]
    pub fn obstacles_json(&self) -> String {
        serde_json::to_string(self.session.obstacles()).unwrap_or_else(|_| "[]".into())
    }

    /// Drain queued events as a JSON array
    #[wasm_bindgen(js_name = drainEventsJson)]
    pub fn drain_events_json(&mut self) -> String {
        let events: Vec<SessionEvent> = self.session.drain_events();
        match serde_json::to_string(&events) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to encode session events: {}", e);
                "[]".into()
            }
        }
    }
}

impl Default for WebEngine {
    fn default() -> Self {
        Self::new()
    }
}
