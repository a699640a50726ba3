//! External collaborators
//!
//! The engine talks to the outside world only through these traits:
//! - [`GestureTransport`]: publish/subscribe delivery of raw gesture payloads
//! - [`ScoreService`]: remote score submission and leaderboards
//! - [`Identity`]: who (if anyone) is signed in
//!
//! All of them are injected, so sessions run without a broker or a database.
//! In-process implementations are provided for tests and headless runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::input::GestureInbox;
use crate::session::GameMode;
use crate::sim::{ControlMode, DifficultyLevel};

/// Callback receiving raw payloads from a transport
pub type GestureHandler = Box<dyn FnMut(&str)>;

/// Publish/subscribe gesture source
pub trait GestureTransport {
    fn connect(&mut self) -> Result<(), EngineError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Register a handler for every payload received
    fn on_gesture(&mut self, handler: GestureHandler);
}

/// Where gestures are coming from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Transport,
    /// Keyboard/click only
    Fallback,
}

/// Connect a transport and route its payloads into `inbox`.
///
/// A failed connection is logged and reported as [`InputSource::Fallback`];
/// the keyboard path keeps working either way.
pub fn attach_transport(transport: &mut dyn GestureTransport, inbox: &GestureInbox) -> InputSource {
    match transport.connect() {
        Ok(()) => {
            transport.on_gesture(inbox.handler());
            log::info!("Gesture transport connected");
            InputSource::Transport
        }
        Err(e) => {
            log::warn!("Gesture transport unavailable, using keyboard fallback: {}", e);
            InputSource::Fallback
        }
    }
}

/// In-process transport: payloads published here reach every handler
#[derive(Default)]
pub struct LoopbackTransport {
    connected: bool,
    connect_error: Option<String>,
    handlers: Vec<GestureHandler>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `connect` always fails
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            connect_error: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Deliver a payload; returns the number of handlers reached
    pub fn publish(&mut self, payload: &str) -> usize {
        if !self.connected {
            log::debug!("Dropping payload published while disconnected");
            return 0;
        }
        for handler in &mut self.handlers {
            handler(payload);
        }
        self.handlers.len()
    }
}

impl GestureTransport for LoopbackTransport {
    fn connect(&mut self) -> Result<(), EngineError> {
        if let Some(reason) = &self.connect_error {
            return Err(EngineError::Transport(reason.clone()));
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.handlers.clear();
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn on_gesture(&mut self, handler: GestureHandler) {
        self.handlers.push(handler);
    }
}

/// Mode-specific fields sent with a score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<DifficultyLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_mode: Option<ControlMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_slaps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f32>,
}

/// Aggregate racing stats for a player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RacingStats {
    pub high_score: u64,
    pub games_played: u32,
    pub total_score: u64,
}

impl RacingStats {
    pub fn average_score(&self) -> u64 {
        if self.games_played == 0 {
            return 0;
        }
        (self.total_score as f64 / self.games_played as f64).round() as u64
    }
}

/// Aggregate slap stats for a player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlapStats {
    pub high_score: u64,
    pub games_played: u32,
    pub total_slaps: u64,
    pub max_speed: f32,
}

/// Stats returned after a submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub racing: RacingStats,
    pub slap: SlapStats,
    /// Player's rank in the submitted mode, when known
    pub rank: Option<u32>,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub mode: GameMode,
    pub username: String,
    pub score: u64,
    pub difficulty: Option<DifficultyLevel>,
    pub control_mode: Option<ControlMode>,
    pub total_slaps: Option<u32>,
    pub max_speed: Option<f32>,
    /// Unix timestamp (ms)
    pub date_ms: u64,
}

/// Remote score storage.
///
/// Called from the game loop at round end; implementations must return
/// promptly (queue network work internally) and report failures as errors.
pub trait ScoreService {
    fn submit_score(
        &mut self,
        mode: GameMode,
        score: u64,
        metadata: &ScoreMetadata,
    ) -> Result<PlayerStats, EngineError>;

    fn leaderboard(&self, mode: GameMode, limit: usize) -> Result<Vec<LeaderboardEntry>, EngineError>;
}

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
}

/// Identity provider; only consulted to decide whether to submit scores
pub trait Identity {
    fn is_authenticated(&self) -> bool;
    fn current_user(&self) -> Option<UserProfile>;
}

/// Fixed identity (signed in as one user, or anonymous)
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<UserProfile>,
}

impl StaticIdentity {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn signed_in(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            user: Some(UserProfile {
                id: format!("local-{}", username),
                username,
            }),
        }
    }
}

impl Identity for StaticIdentity {
    fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    fn current_user(&self) -> Option<UserProfile> {
        self.user.clone()
    }
}

#[derive(Debug, Default)]
struct ScoreBook {
    entries: Vec<LeaderboardEntry>,
    stats: HashMap<String, PlayerStats>,
    offline: bool,
}

/// In-memory score service shared through cheap clones.
///
/// Submissions are attributed to the username the handle was created for.
#[derive(Debug, Clone)]
pub struct InMemoryScoreService {
    username: String,
    book: Rc<RefCell<ScoreBook>>,
}

impl InMemoryScoreService {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            book: Rc::new(RefCell::new(ScoreBook::default())),
        }
    }

    /// Another handle on the same book, submitting as `username`
    pub fn as_user(&self, username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            book: Rc::clone(&self.book),
        }
    }

    /// Simulate an unreachable backend
    pub fn set_offline(&self, offline: bool) {
        self.book.borrow_mut().offline = offline;
    }

    pub fn submission_count(&self) -> usize {
        self.book.borrow().entries.len()
    }

    pub fn stats_for(&self, username: &str) -> Option<PlayerStats> {
        self.book.borrow().stats.get(username).cloned()
    }
}

impl ScoreService for InMemoryScoreService {
    fn submit_score(
        &mut self,
        mode: GameMode,
        score: u64,
        metadata: &ScoreMetadata,
    ) -> Result<PlayerStats, EngineError> {
        if self.book.borrow().offline {
            return Err(EngineError::Persistence("score service offline".into()));
        }

        let entry = LeaderboardEntry {
            mode,
            username: self.username.clone(),
            score,
            difficulty: metadata.difficulty,
            control_mode: metadata.control_mode,
            total_slaps: metadata.total_slaps,
            max_speed: metadata.max_speed,
            date_ms: crate::platform::now_ms(),
        };

        let mut stats = {
            let mut book = self.book.borrow_mut();
            book.entries.push(entry.clone());
            let stats = book.stats.entry(self.username.clone()).or_default();
            match mode {
                GameMode::Racing => {
                    stats.racing.games_played += 1;
                    stats.racing.total_score += score;
                    stats.racing.high_score = stats.racing.high_score.max(score);
                }
                GameMode::Slap => {
                    stats.slap.games_played += 1;
                    stats.slap.total_slaps += metadata.total_slaps.unwrap_or(0) as u64;
                    stats.slap.high_score = stats.slap.high_score.max(score);
                    stats.slap.max_speed = stats.slap.max_speed.max(metadata.max_speed.unwrap_or(0.0));
                }
            }
            stats.clone()
        };

        let board = self.leaderboard(mode, usize::MAX)?;
        stats.rank = board
            .iter()
            .position(|e| e.username == self.username)
            .map(|i| i as u32 + 1);
        Ok(stats)
    }

    fn leaderboard(&self, mode: GameMode, limit: usize) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let book = self.book.borrow();
        if book.offline {
            return Err(EngineError::Persistence("score service offline".into()));
        }

        // Highest score first, newest first on ties; keep each player's best
        let mut sorted: Vec<&LeaderboardEntry> =
            book.entries.iter().filter(|e| e.mode == mode).collect();
        sorted.sort_by(|a, b| b.score.cmp(&a.score).then(b.date_ms.cmp(&a.date_ms)));

        let mut seen = std::collections::HashSet::new();
        Ok(sorted
            .into_iter()
            .filter(|e| seen.insert(e.username.clone()))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_transport_fallback() {
        let inbox = GestureInbox::new();
        let mut transport = LoopbackTransport::unreachable("broker down");
        assert_eq!(attach_transport(&mut transport, &inbox), InputSource::Fallback);
        assert!(!transport.is_connected());
        assert_eq!(transport.publish("left"), 0);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_attach_transport_routes_payloads() {
        let inbox = GestureInbox::new();
        let mut transport = LoopbackTransport::new();
        assert_eq!(attach_transport(&mut transport, &inbox), InputSource::Transport);
        assert_eq!(transport.publish("right"), 1);
        assert_eq!(transport.publish("garbage"), 1);
        assert_eq!(inbox.len(), 1);

        transport.disconnect();
        assert_eq!(transport.publish("left"), 0);
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn test_static_identity() {
        assert!(!StaticIdentity::anonymous().is_authenticated());
        let id = StaticIdentity::signed_in("ada");
        assert!(id.is_authenticated());
        assert_eq!(id.current_user().map(|u| u.username), Some("ada".to_string()));
    }

    #[test]
    fn test_leaderboard_keeps_best_per_player() {
        let mut ada = InMemoryScoreService::new("ada");
        let mut bob = ada.as_user("bob");
        let racing = ScoreMetadata {
            difficulty: Some(DifficultyLevel::Complex),
            control_mode: Some(ControlMode::Continuous),
            ..Default::default()
        };
        ada.submit_score(GameMode::Racing, 40, &racing).unwrap();
        ada.submit_score(GameMode::Racing, 90, &racing).unwrap();
        let stats = bob.submit_score(GameMode::Racing, 60, &racing).unwrap();
        assert_eq!(stats.rank, Some(2));

        let slap = ScoreMetadata {
            total_slaps: Some(10),
            max_speed: Some(18.0),
            ..Default::default()
        };
        bob.submit_score(GameMode::Slap, 1300, &slap).unwrap();

        let board = ada.leaderboard(GameMode::Racing, 10).unwrap();
        let rows: Vec<(&str, u64)> = board.iter().map(|e| (e.username.as_str(), e.score)).collect();
        assert_eq!(rows, vec![("ada", 90), ("bob", 60)]);
        assert_eq!(ada.leaderboard(GameMode::Racing, 1).unwrap().len(), 1);
        assert_eq!(ada.leaderboard(GameMode::Slap, 10).unwrap().len(), 1);

        let ada_stats = ada.stats_for("ada").unwrap();
        assert_eq!(ada_stats.racing.games_played, 2);
        assert_eq!(ada_stats.racing.high_score, 90);
        assert_eq!(ada_stats.racing.average_score(), 65);
        assert_eq!(bob.stats_for("bob").unwrap().slap.total_slaps, 10);
    }

    #[test]
    fn test_offline_service_errors() {
        let mut service = InMemoryScoreService::new("ada");
        service.set_offline(true);
        let result = service.submit_score(GameMode::Slap, 10, &ScoreMetadata::default());
        assert!(matches!(result, Err(EngineError::Persistence(_))));
        assert!(service.leaderboard(GameMode::Slap, 5).is_err());
        assert_eq!(service.submission_count(), 0);
    }
}
