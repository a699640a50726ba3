//! Gesture normalization
//!
//! Turns raw publish/subscribe message bodies into typed [`GestureEvent`]s.
//! Three shapes are recognized:
//! - plain `left` / `right` strings (single-step nudges)
//! - JSON objects carrying `normX` (analog lateral position)
//! - JSON objects with `"type": "slap"` (one completed slap)
//!
//! Anything else is dropped and logged. Normalization is pure: the one-shot
//! lifetime of discrete gestures is tracked by the caller with
//! [`ExpiringInput`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clamp_unit;

/// Lateral nudge direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    /// -1 for left, +1 for right
    pub fn sign(&self) -> f32 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }
}

/// One normalized unit of motion input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GestureEvent {
    /// Analog lateral position in [-1, 1]
    Continuous { norm_x: f32 },
    /// Single-step nudge
    Discrete { direction: Direction },
    /// One completed slap; `points` is the sensor's own scoring when it sent one
    Slap {
        speed: f32,
        distance: f32,
        magnitude: f32,
        points: Option<u64>,
    },
}

impl GestureEvent {
    pub fn is_continuous(&self) -> bool {
        matches!(self, GestureEvent::Continuous { .. })
    }
}

/// Normalize a raw transport payload.
///
/// Returns `None` for payloads with no recognized shape; never panics.
pub fn normalize(raw: &str) -> Option<GestureEvent> {
    let trimmed = raw.trim();
    if let Some(direction) = Direction::from_str(trimmed) {
        return Some(GestureEvent::Discrete { direction });
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Dropping unparseable gesture payload {:?}: {}", trimmed, e);
            return None;
        }
    };

    let event = normalize_value(&value);
    if event.is_none() {
        log::warn!("Dropping gesture payload with unknown shape: {}", trimmed);
    }
    event
}

/// Normalize an already-parsed JSON payload
pub fn normalize_value(value: &Value) -> Option<GestureEvent> {
    match value {
        Value::String(s) => {
            Direction::from_str(s).map(|direction| GestureEvent::Discrete { direction })
        }
        Value::Object(map) => normalize_object(map),
        _ => None,
    }
}

fn normalize_object(map: &Map<String, Value>) -> Option<GestureEvent> {
    let is_slap = map
        .get("type")
        .and_then(Value::as_str)
        .map(|t| t.trim().eq_ignore_ascii_case("slap"))
        .unwrap_or(false);

    // Slap takes precedence so a message never yields two interpretations
    if is_slap {
        let points = coerce_number(map.get("points"))
            .map(|p| p.trunc())
            .filter(|p| *p > 0.0)
            .map(|p| p as u64);
        return Some(GestureEvent::Slap {
            speed: non_negative(map.get("speed")),
            distance: non_negative(map.get("distance")),
            magnitude: non_negative(map.get("magnitude")),
            points,
        });
    }

    if map.contains_key("normX") {
        let norm_x = coerce_number(map.get("normX")).unwrap_or(0.0) as f32;
        return Some(GestureEvent::Continuous {
            norm_x: clamp_unit(norm_x),
        });
    }

    None
}

/// Numbers and numeric strings become finite floats; everything else is `None`
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn non_negative(value: Option<&Value>) -> f32 {
    coerce_number(value).unwrap_or(0.0).max(0.0) as f32
}

/// A value that stops being "active" at a fixed expiry time.
///
/// Offering the same value again while it is still active is rejected, so
/// a burst of identical one-shot messages moves the car once.
#[derive(Debug, Clone, Copy)]
pub struct ExpiringInput<T> {
    slot: Option<(T, u64)>,
}

impl<T> Default for ExpiringInput<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T: Copy + PartialEq> ExpiringInput<T> {
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Store `value` until `now_ms + ttl_ms`. Returns false if the same value
    /// is still active (duplicate).
    pub fn offer(&mut self, value: T, now_ms: u64, ttl_ms: u64) -> bool {
        if self.current(now_ms) == Some(value) {
            return false;
        }
        self.slot = Some((value, now_ms.saturating_add(ttl_ms)));
        true
    }

    /// The active value, if it has not expired
    pub fn current(&self, now_ms: u64) -> Option<T> {
        match self.slot {
            Some((value, expires_at)) if now_ms < expires_at => Some(value),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_direction_strings() {
        assert_eq!(
            normalize("left"),
            Some(GestureEvent::Discrete {
                direction: Direction::Left
            })
        );
        assert_eq!(
            normalize("  RIGHT\n"),
            Some(GestureEvent::Discrete {
                direction: Direction::Right
            })
        );
        assert_eq!(
            normalize("\"left\""),
            Some(GestureEvent::Discrete {
                direction: Direction::Left
            })
        );
    }

    #[test]
    fn test_continuous_is_clamped() {
        assert_eq!(
            normalize(r#"{"normX": 0.4}"#),
            Some(GestureEvent::Continuous { norm_x: 0.4 })
        );
        assert_eq!(
            normalize(r#"{"normX": 3.5}"#),
            Some(GestureEvent::Continuous { norm_x: 1.0 })
        );
        assert_eq!(
            normalize(r#"{"normX": -1.0}"#),
            Some(GestureEvent::Continuous { norm_x: -1.0 })
        );
        // Present but non-numeric coerces to 0
        assert_eq!(
            normalize(r#"{"normX": "abc"}"#),
            Some(GestureEvent::Continuous { norm_x: 0.0 })
        );
        assert_eq!(
            normalize(r#"{"normX": "-0.5"}"#),
            Some(GestureEvent::Continuous { norm_x: -0.5 })
        );
    }

    #[test]
    fn test_slap_fields_coerced() {
        let event = normalize(
            r#"{"type":"slap","speed":"12.5","distance":4,"magnitude":null,"points":"130.9"}"#,
        );
        assert_eq!(
            event,
            Some(GestureEvent::Slap {
                speed: 12.5,
                distance: 4.0,
                magnitude: 0.0,
                points: Some(130),
            })
        );

        let event = normalize(r#"{"type":"slap","speed":-3}"#);
        assert_eq!(
            event,
            Some(GestureEvent::Slap {
                speed: 0.0,
                distance: 0.0,
                magnitude: 0.0,
                points: None,
            })
        );
    }

    #[test]
    fn test_slap_wins_over_norm_x() {
        let event = normalize(r#"{"type":"slap","speed":5,"normX":0.2}"#);
        assert!(matches!(event, Some(GestureEvent::Slap { .. })));
    }

    #[test]
    fn test_unknown_shapes_dropped() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("jump"), None);
        assert_eq!(normalize("42"), None);
        assert_eq!(normalize("[1,2]"), None);
        assert_eq!(normalize(r#"{"type":"wave"}"#), None);
        assert_eq!(normalize(r#"{"x": 1}"#), None);
        assert_eq!(normalize("{not json"), None);
    }

    #[test]
    fn test_expiring_input_dedupes_until_expiry() {
        let mut input = ExpiringInput::new();
        assert!(input.offer(Direction::Left, 1_000, 100));
        assert_eq!(input.current(1_050), Some(Direction::Left));
        // Identical value while active is a duplicate
        assert!(!input.offer(Direction::Left, 1_050, 100));
        // A different value replaces it
        assert!(input.offer(Direction::Right, 1_060, 100));
        assert_eq!(input.current(1_159), Some(Direction::Right));
        assert_eq!(input.current(1_160), None);
        // After expiry the same value is accepted again
        assert!(input.offer(Direction::Right, 1_160, 100));
        input.clear();
        assert_eq!(input.current(1_161), None);
    }
}
