//! Inertial/GPS state estimation.
//!
//! [`StateEstimator`] folds two measurement streams into one [`BodyState`]:
//!
//! - **IMU** – magnetometer heading and gyro angular rate; dense, a sample
//!   every tick, but heading-only and drift-prone.
//! - **GPS** – absolute position fixes; sparse, most ticks have none.
//!
//! Heading uses a self-weighting complementary filter with no fixed blend
//! constant. The weight is the *coincidence* between where the heading
//! already pointed and where the gyro says it now points:
//!
//! ```text
//! gyro_heading = previous_heading rotated about Z by ω_z · dt
//! coincidence  = previous_heading · gyro_heading          (clamped to [0, 1])
//! fused        = lerp(mag_heading, gyro_heading, coincidence), normalized
//! ```
//!
//! High coincidence means the propagation is self-consistent and is trusted;
//! low coincidence pulls the estimate back toward the fresh magnetometer
//! reading.
//!
//! Position and velocity run as a two-path state machine. A tick with a
//! fresh fix derives velocity from the position delta and overwrites the
//! estimated pose wholesale (a fix resets dead-reckoning drift). A tick
//! without one integrates position and velocity forward with first-order
//! Euler steps.
//!
//! # Example
//!
//! ```rust
//! use burro_perception::estimator::StateEstimator;
//! use burro_types::{AdjustedImu, GpsFix, ImuSample, Vec3};
//!
//! let mut estimator = StateEstimator::new();
//!
//! let imu = ImuSample {
//!     adjusted: AdjustedImu {
//!         mag: Vec3::new(0.0, -1.0, 0.0),
//!         ..AdjustedImu::default()
//!     },
//!     ..ImuSample::default()
//! };
//!
//! let fix = GpsFix {
//!     position: Vec3::new(2.0, 3.0, 0.0),
//!     velocity: Vec3::zero(),
//! };
//!
//! estimator.update(&imu, Some(fix), 0.1);
//!
//! let body = estimator.body();
//! assert!(body.has_fix);
//! assert!((body.estimated.heading.length() - 1.0).abs() < 1e-5);
//! assert_eq!(body.estimated.position, fix.position);
//! ```

use burro_types::{BodyState, GpsFix, ImuSample, Vec3};
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Estimator
// ────────────────────────────────────────────────────────────────────────────

/// Owns the fused [`BodyState`] and is its sole writer. Everything
/// downstream reads the state through [`body`][Self::body].
#[derive(Debug, Default)]
pub struct StateEstimator {
    body: BodyState,
}

impl StateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current fused body state.
    pub fn body(&self) -> &BodyState {
        &self.body
    }

    /// Fold one tick of sensor data into the body state.
    ///
    /// `now` is uptime seconds and must not run backwards; a non-monotonic
    /// clock is treated as zero elapsed time.
    pub fn update(&mut self, imu: &ImuSample, fix: Option<GpsFix>, now: f32) {
        let body = &mut self.body;
        body.imu = *imu;

        let dt = (now - body.last_fix_time).max(0.0);

        // The magnetometer is mounted mirrored in X and Y relative to the
        // body frame; Z passes through. A degenerate reading keeps the
        // previous measured heading.
        let mag = imu.adjusted.mag;
        let mag_heading = Vec3::new(-mag.x, -mag.y, mag.z).normalized();
        if mag_heading != Vec3::zero() {
            body.measured.heading = mag_heading;
        }

        let previous = body.estimated.heading;
        let gyro_heading = previous.rotated_z(imu.adjusted.rotational.z * dt);
        let coincidence = previous.dot(&gyro_heading).clamp(0.0, 1.0);
        let fused = body
            .measured
            .heading
            .lerp(&gyro_heading, coincidence)
            .normalized();

        body.measured.gyro_heading = gyro_heading;
        body.measured.angular_velocity = imu.adjusted.rotational;
        body.measured.heading_angle = heading_angle(&body.measured.heading);

        body.estimated.gyro_heading = gyro_heading;
        body.estimated.angular_velocity = imu.adjusted.rotational;
        if fused != Vec3::zero() {
            body.estimated.heading = fused;
        }
        body.estimated.heading_angle = heading_angle(&body.estimated.heading);

        match fix {
            Some(fix) => {
                let previous_position = body.measured.position;
                body.measured.velocity = if dt > 0.0 {
                    fix.position.sub(&previous_position).scaled(1.0 / dt)
                } else {
                    // Two fixes in the same instant: the position delta has
                    // no usable rate, take the receiver's own estimate.
                    fix.velocity
                };
                body.measured.position = fix.position;

                // A fix resets accumulated dead-reckoning drift.
                body.estimated = body.measured;
                body.last_fix_time = now;
                body.last_est_time = now;
                body.has_fix = true;
                debug!(
                    x = fix.position.x,
                    y = fix.position.y,
                    dt,
                    "position fix folded into state"
                );
            }
            None => {
                let dt_est = (now - body.last_est_time).max(0.0);
                let step = body.estimated.velocity.scaled(dt_est);
                body.estimated.position = body.estimated.position.add(&step);
                body.estimated.velocity = body
                    .estimated
                    .velocity
                    .add(&imu.adjusted.linear.scaled(dt_est));
                body.last_est_time = now;
            }
        }
    }
}

fn heading_angle(heading: &Vec3) -> f32 {
    heading.y.atan2(heading.x)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
