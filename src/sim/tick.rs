//! Fixed-period race simulation
//!
//! Two independent operations drive a race: [`spawn_obstacle`] on the
//! difficulty's spawn period and [`tick`] on the fixed tick period. Both are
//! no-ops once the race has collided.

use rand::Rng;
use serde::Serialize;

use super::collision::first_collision;
use super::state::{ObstacleKind, RacePhase, RaceState};
use crate::consts::{EXIT_TRAVEL, LANE_CENTERS, OBSTACLE_POINTS, SPAWN_TRAVEL};

/// Something that happened during a spawn or tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RaceEvent {
    Spawned { id: u32, lane: usize, kind: ObstacleKind },
    /// Obstacle left the field; `score` is the total after scoring it
    Passed { id: u32, score: u64 },
    /// Car hit an obstacle; reported once per race
    Collided { id: u32, score: u64 },
}

/// Spawn one obstacle in a random lane with a random kind
pub fn spawn_obstacle(state: &mut RaceState) -> Option<RaceEvent> {
    if !state.is_running() {
        return None;
    }

    let lane = state.rng.random_range(0..LANE_CENTERS.len());
    let kind = ObstacleKind::ALL[state.rng.random_range(0..ObstacleKind::ALL.len())];
    let id = state.insert_obstacle(lane, SPAWN_TRAVEL, kind);
    log::debug!("Spawned {:?} #{} in lane {}", kind, id, lane);

    Some(RaceEvent::Spawned { id, lane, kind })
}

/// Advance every obstacle, test collisions, then prune and score.
///
/// On collision the field freezes: nothing is pruned or scored in that tick
/// and later ticks do nothing.
pub fn tick(state: &mut RaceState) -> Vec<RaceEvent> {
    if !state.is_running() {
        return Vec::new();
    }

    state.time_ticks += 1;

    // Speed follows the score at the start of the tick
    let speed = state.current_speed();
    for obstacle in &mut state.obstacles {
        obstacle.travel += speed;
    }

    if let Some(hit) = first_collision(&state.obstacles, &state.car, state.control_mode) {
        let id = hit.id;
        state.phase = RacePhase::Collided;
        log::info!(
            "Collision with obstacle #{} at tick {} (score {})",
            id,
            state.time_ticks,
            state.score
        );
        return vec![RaceEvent::Collided {
            id,
            score: state.score,
        }];
    }

    let mut events = Vec::new();
    let mut score = state.score;
    state.obstacles.retain(|obstacle| {
        if obstacle.travel > EXIT_TRAVEL {
            score += OBSTACLE_POINTS;
            events.push(RaceEvent::Passed {
                id: obstacle.id,
                score,
            });
            false
        } else {
            true
        }
    });
    state.score = score;

    events
}
