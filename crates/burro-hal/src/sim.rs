//! Deterministic stub drivers for CI and headless testing.
//!
//! Every trait in [`sensors`][crate::sensors] and [`servo`][crate::servo]
//! has a simulated implementation here that records commands and replays
//! scripted measurements, so the full pipeline runs in tests without any
//! physical hardware.
//!
//! # Example
//!
//! ```rust
//! use burro_hal::sensors::GpsSource;
//! use burro_hal::sim::SimGps;
//! use burro_types::{GpsFix, Vec3};
//!
//! let mut gps = SimGps::with_fixes(vec![GpsFix {
//!     position: Vec3::new(4.0, 2.0, 0.0),
//!     velocity: Vec3::zero(),
//! }]);
//!
//! assert!(gps.poll_fix().unwrap().is_some());
//! assert!(gps.poll_fix().unwrap().is_none());
//! ```

use std::collections::VecDeque;

use burro_types::{AdjustedImu, BurroError, GpsFix, ImuSample, RawImu, Vec2, Vec3, Vec3i16};

use crate::sensors::{FeatureSource, GpsSource, ImuSource};
use crate::servo::{self, SERVO_NEUTRAL, ServoBank, ServoChannel};

// ────────────────────────────────────────────────────────────────────────────
// Stub IMU
// ────────────────────────────────────────────────────────────────────────────

/// A simulated IMU that returns the same sample on every read.  Always
/// succeeds.
pub struct SimImu {
    id: String,
    sample: ImuSample,
}

impl SimImu {
    /// A level, stationary vehicle pointing along +Y.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Self::with_sample(id, level_sample())
    }

    /// A simulated IMU pinned to `sample`.
    pub fn with_sample(id: impl Into<String>, sample: ImuSample) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            sample,
        })
    }
}

impl ImuSource for SimImu {
    fn id(&self) -> &str {
        &self.id
    }

    fn sample(&mut self) -> Result<ImuSample, BurroError> {
        Ok(self.sample)
    }
}

/// The sample [`SimImu::new`] replays: at rest, magnetometer aligned so the
/// fused heading comes out along +Y.
pub fn level_sample() -> ImuSample {
    ImuSample {
        raw: RawImu {
            acc: Vec3i16::new(3, -2, 1022),
            gyro: Vec3i16::new(1, 0, -1),
            mag: Vec3i16::new(12, -498, 55),
        },
        adjusted: AdjustedImu {
            linear: Vec3::zero(),
            rotational: Vec3::zero(),
            mag: Vec3::new(0.0, -1.0, 0.0),
        },
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub GPS
// ────────────────────────────────────────────────────────────────────────────

/// A simulated GPS receiver that replays a scripted queue of fixes, then
/// reports no-fix forever.  Always succeeds.
pub struct SimGps {
    id: String,
    fixes: VecDeque<GpsFix>,
}

impl SimGps {
    /// A receiver that never produces a fix.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            fixes: VecDeque::new(),
        })
    }

    /// A receiver that hands out `fixes` one per poll, in order.
    pub fn with_fixes(fixes: Vec<GpsFix>) -> Box<Self> {
        Box::new(Self {
            id: "sim_gps".to_string(),
            fixes: fixes.into(),
        })
    }

    /// Queue another fix for a later poll.
    pub fn push_fix(&mut self, fix: GpsFix) {
        self.fixes.push_back(fix);
    }
}

impl GpsSource for SimGps {
    fn id(&self) -> &str {
        &self.id
    }

    fn poll_fix(&mut self) -> Result<Option<GpsFix>, BurroError> {
        Ok(self.fixes.pop_front())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub optical-flow front end
// ────────────────────────────────────────────────────────────────────────────

/// A simulated feature front end that replays scripted frames, then reports
/// no-frame forever.  Always succeeds.
pub struct SimFeatureField {
    id: String,
    frames: VecDeque<Vec<Vec2>>,
}

impl SimFeatureField {
    /// A front end that never completes a frame.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            frames: VecDeque::new(),
        })
    }

    /// A front end that hands out `frames` one per call, in order.
    pub fn with_frames(frames: Vec<Vec<Vec2>>) -> Box<Self> {
        Box::new(Self {
            id: "sim_flow".to_string(),
            frames: frames.into(),
        })
    }

    /// Queue another frame for a later call.
    pub fn push_frame(&mut self, frame: Vec<Vec2>) {
        self.frames.push_back(frame);
    }
}

impl FeatureSource for SimFeatureField {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_frame(&mut self) -> Result<Option<Vec<Vec2>>, BurroError> {
        Ok(self.frames.pop_front())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub servo bank
// ────────────────────────────────────────────────────────────────────────────

/// A simulated servo controller that range-checks and records every command.
pub struct SimServoBank {
    steering: f32,
    throttle: f32,
}

impl SimServoBank {
    /// All channels start at [`SERVO_NEUTRAL`].
    pub fn new() -> Box<Self> {
        Box::new(Self {
            steering: SERVO_NEUTRAL,
            throttle: SERVO_NEUTRAL,
        })
    }
}

impl ServoBank for SimServoBank {
    fn set(&mut self, channel: ServoChannel, percent: f32) -> Result<(), BurroError> {
        servo::validate_command(channel, percent)?;
        match channel {
            ServoChannel::Steering => self.steering = percent,
            ServoChannel::Throttle => self.throttle = percent,
        }
        Ok(())
    }

    fn position(&self, channel: ServoChannel) -> f32 {
        match channel {
            ServoChannel::Steering => self.steering,
            ServoChannel::Throttle => self.throttle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_imu_replays_its_sample() {
        let mut imu = SimImu::new("imu0");
        let a = imu.sample().unwrap();
        let b = imu.sample().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.adjusted.mag, Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn sim_gps_drains_its_queue() {
        let mut gps = SimGps::with_fixes(vec![
            GpsFix {
                position: Vec3::new(1.0, 0.0, 0.0),
                velocity: Vec3::zero(),
            },
            GpsFix {
                position: Vec3::new(2.0, 0.0, 0.0),
                velocity: Vec3::zero(),
            },
        ]);
        assert_eq!(gps.poll_fix().unwrap().unwrap().position.x, 1.0);
        assert_eq!(gps.poll_fix().unwrap().unwrap().position.x, 2.0);
        assert!(gps.poll_fix().unwrap().is_none());

        gps.push_fix(GpsFix::default());
        assert!(gps.poll_fix().unwrap().is_some());
    }

    #[test]
    fn sim_feature_field_drains_its_queue() {
        let mut flow = SimFeatureField::with_frames(vec![vec![Vec2::new(1.0, 1.0)]]);
        assert_eq!(flow.next_frame().unwrap().unwrap().len(), 1);
        assert!(flow.next_frame().unwrap().is_none());
    }

    #[test]
    fn sim_servo_bank_records_and_rejects() {
        let mut bank = SimServoBank::new();
        bank.set(ServoChannel::Steering, 75.0).unwrap();
        assert!((bank.position(ServoChannel::Steering) - 75.0).abs() < f32::EPSILON);

        assert!(bank.set(ServoChannel::Throttle, 150.0).is_err());
        assert!((bank.position(ServoChannel::Throttle) - SERVO_NEUTRAL).abs() < f32::EPSILON);

        bank.neutralize().unwrap();
        assert!((bank.position(ServoChannel::Steering) - SERVO_NEUTRAL).abs() < f32::EPSILON);
    }
}
