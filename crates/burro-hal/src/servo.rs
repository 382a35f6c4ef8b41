//! Servo output channels and the [`ServoBank`] trait actuator drivers
//! implement.
//!
//! Commands are percent-of-PWM-duty values in `[0, 100]`. The decision layer
//! only ever uses the middle half of the steering range, `[25, 75]` with `50`
//! dead ahead, so a runaway command outside the full duty range always means
//! a software fault and is rejected before it reaches hardware.

use std::fmt;

use burro_types::BurroError;
use tracing::warn;

/// Neutral command value for every channel: centered steering, idle throttle.
pub const SERVO_NEUTRAL: f32 = 50.0;

/// Lowest accepted duty value.
pub const SERVO_MIN: f32 = 0.0;

/// Highest accepted duty value.
pub const SERVO_MAX: f32 = 100.0;

/// Output channels on the vehicle's servo controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServoChannel {
    /// Front-wheel steering servo. `[25, 75]`, `50` = straight ahead.
    Steering,
    /// Electronic speed controller. `[25, 75]`, `50` = stopped.
    Throttle,
}

impl ServoChannel {
    /// Every channel, in a fixed order.
    pub const ALL: [ServoChannel; 2] = [ServoChannel::Steering, ServoChannel::Throttle];

    /// Stable identifier used in logs and fault reports.
    pub fn name(&self) -> &'static str {
        match self {
            ServoChannel::Steering => "steering",
            ServoChannel::Throttle => "throttle",
        }
    }
}

impl fmt::Display for ServoChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reject commands a servo controller could not express.
///
/// # Errors
///
/// Returns [`BurroError::ServoFault`] when `percent` is non-finite or outside
/// `[`[`SERVO_MIN`]`, `[`SERVO_MAX`]`]`.
pub fn validate_command(channel: ServoChannel, percent: f32) -> Result<(), BurroError> {
    if !percent.is_finite() || !(SERVO_MIN..=SERVO_MAX).contains(&percent) {
        warn!(channel = channel.name(), percent, "rejecting servo command");
        return Err(BurroError::ServoFault {
            channel: channel.name().to_string(),
            details: format!("command {percent} outside [{SERVO_MIN}, {SERVO_MAX}]"),
        });
    }
    Ok(())
}

/// A bank of PWM servo outputs.
///
/// Drivers implement this trait; the arbitration engine is the only component
/// that writes through it during normal operation.
pub trait ServoBank: Send + Sync {
    /// Command `channel` to `percent` duty.
    ///
    /// # Errors
    ///
    /// Returns [`BurroError::ServoFault`] when the command is out of range or
    /// the underlying device rejects it.
    fn set(&mut self, channel: ServoChannel, percent: f32) -> Result<(), BurroError>;

    /// Last commanded value for `channel`.
    fn position(&self, channel: ServoChannel) -> f32;

    /// Drive every channel to [`SERVO_NEUTRAL`]. Used at startup and on
    /// shutdown so the vehicle never keeps a stale command.
    fn neutralize(&mut self) -> Result<(), BurroError> {
        for channel in ServoChannel::ALL {
            self.set(channel, SERVO_NEUTRAL)?;
        }
        Ok(())
    }
}
