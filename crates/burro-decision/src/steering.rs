//! Steering-correction behavior.
//!
//! Scores itself by how far the vehicle's heading deviates from the bearing
//! to the active waypoint, then steers proportionally to close the error.
//!
//! # Geometry
//!
//! ```text
//! to_wp = normalize(mirror_x(position - waypoint)),  vertical zeroed
//! d1    = dot(to_wp, heading)
//! d2    = dot(to_wp, rot90(heading))
//! angle = acos(clamp(d1, -1, 1)) * sign(d2)          in [-pi, pi]
//! ```
//!
//! The east-west mirror converts the world frame into the steering frame.
//! `d1` gives the unsigned deviation, `d2` the side the waypoint bearing
//! falls on. [`SteeringBehavior::act`] clamps the angle to ±π/4 and maps it
//! linearly onto the steering band `[25, 75]`, 50 meaning straight ahead,
//! so any deviation beyond a quarter turn holds full lock.

use std::f32::consts::FRAC_PI_4;

use burro_hal::servo::{SERVO_NEUTRAL, ServoBank, ServoChannel};
use burro_types::{BurroError, Vec3};

use crate::behavior::{AgentId, Behavior, TickContext};

/// Lower edge of the steering command band (full left lock).
pub const STEERING_MIN: f32 = 25.0;
/// Upper edge of the steering command band (full right lock).
pub const STEERING_MAX: f32 = 75.0;
/// Heading error at which the command saturates at full lock.
pub const MAX_CORRECTION: f32 = FRAC_PI_4;

/// Waypoint-tracking steering agent.
///
/// Dormant (utility exactly 0) whenever there is no active waypoint, or
/// while the position estimate still sits at the exact origin and the
/// bearing is undefined. Received stimulation is recorded but not yet
/// consulted by the score.
#[derive(Debug, Default)]
pub struct SteeringBehavior {
    last_stimulus: Option<(f32, AgentId)>,
}

impl SteeringBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent stimulation delivered to this agent, if any.
    pub fn last_stimulus(&self) -> Option<(f32, AgentId)> {
        self.last_stimulus
    }

    /// Signed heading error toward the active waypoint, or `None` when
    /// there is nothing to steer toward.
    fn bearing_error(ctx: &TickContext) -> Option<f32> {
        let route = ctx.route?;
        let waypoint = route.current()?;
        let position = ctx.body.estimated.position;
        if position == Vec3::zero() {
            return None;
        }

        let mut offset = position.sub(&waypoint.position);
        offset.x = -offset.x;
        let mut to_wp = offset.normalized();
        to_wp.z = 0.0;
        let mut heading = ctx.body.estimated.heading.normalized();
        heading.z = 0.0;

        let d1 = to_wp.dot(&heading);
        let side = Vec3::new(-heading.y, heading.x, 0.0);
        let d2 = to_wp.dot(&side);
        Some(d1.clamp(-1.0, 1.0).acos() * d2.signum())
    }
}

impl Behavior for SteeringBehavior {
    fn name(&self) -> &str {
        "steering"
    }

    fn utility(&mut self, ctx: &TickContext) -> f32 {
        Self::bearing_error(ctx).map_or(0.0, f32::abs)
    }

    fn act(&mut self, ctx: &TickContext, servos: &mut dyn ServoBank) -> Result<(), BurroError> {
        let Some(angle) = Self::bearing_error(ctx) else {
            return Ok(());
        };
        let swing = STEERING_MAX - SERVO_NEUTRAL;
        let command =
            angle.clamp(-MAX_CORRECTION, MAX_CORRECTION) / MAX_CORRECTION * swing + SERVO_NEUTRAL;
        servos.set(ServoChannel::Steering, command)
    }

    fn stimulate(&mut self, weight: f32, source: AgentId) {
        self.last_stimulus = Some((weight, source));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
