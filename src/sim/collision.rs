//! Car/obstacle collision tests
//!
//! An obstacle can only hit the car while it is inside the impact band. Whether
//! it overlaps the car horizontally depends on the control mode: analog
//! control checks a band around the obstacle's lane center, lane control
//! compares lane indices.

use super::state::{CarState, ControlMode, Obstacle};
use crate::consts::{COLLISION_HALF_WIDTH, IMPACT_BAND, LANE_CENTERS};

/// Whether an obstacle's travel lies inside the impact band (inclusive)
#[inline]
pub fn in_impact_band(travel: f32) -> bool {
    travel >= IMPACT_BAND.0 && travel <= IMPACT_BAND.1
}

/// Horizontal overlap between the car and a lane
pub fn overlaps_lane(car: &CarState, lane: usize, mode: ControlMode) -> bool {
    match mode {
        ControlMode::Continuous => LANE_CENTERS
            .get(lane)
            .map(|center| (car.position - center).abs() < COLLISION_HALF_WIDTH)
            .unwrap_or(false),
        ControlMode::Lane => car.lane() == lane,
    }
}

/// Collision predicate for one obstacle
pub fn obstacle_hits_car(obstacle: &Obstacle, car: &CarState, mode: ControlMode) -> bool {
    in_impact_band(obstacle.travel) && overlaps_lane(car, obstacle.lane, mode)
}

/// First obstacle (in id order) colliding with the car, checking every live one
pub fn first_collision<'a>(
    obstacles: &'a [Obstacle],
    car: &CarState,
    mode: ControlMode,
) -> Option<&'a Obstacle> {
    obstacles
        .iter()
        .find(|obstacle| obstacle_hits_car(obstacle, car, mode))
}
