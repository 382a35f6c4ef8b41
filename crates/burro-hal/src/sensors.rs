//! Sensor-driver traits the perception pipeline reads from.
//!
//! Each trait models one measurement stream at its own natural cadence: the
//! IMU produces a sample on every call, a GPS fix is usually *absent* on any
//! given tick, and the optical-flow front end hands over a feature frame only
//! when it has finished one. Absence of data is `Ok(None)`, never an error;
//! [`BurroError::SensorFault`] is reserved for the device actually failing.

use burro_types::{BurroError, GpsFix, ImuSample, Vec2};

/// An inertial measurement unit.
pub trait ImuSource: Send + Sync {
    /// Stable identifier for this device, e.g. `"imu0"`.
    fn id(&self) -> &str;

    /// Acquire the current sample (raw and calibration-adjusted).
    ///
    /// # Errors
    ///
    /// Returns [`BurroError::SensorFault`] if the device cannot be read.
    fn sample(&mut self) -> Result<ImuSample, BurroError>;
}

/// A positioning receiver (GPS or equivalent).
pub trait GpsSource: Send + Sync {
    /// Stable identifier for this device, e.g. `"gps0"`.
    fn id(&self) -> &str;

    /// Poll for a fresh fix. `Ok(None)` means no new fix since the last
    /// poll, which is the default per-tick case and is absorbed by dead
    /// reckoning.
    ///
    /// # Errors
    ///
    /// Returns [`BurroError::SensorFault`] if the device cannot be read.
    fn poll_fix(&mut self) -> Result<Option<GpsFix>, BurroError>;
}

/// The optical-flow front end delivering tracked feature positions.
pub trait FeatureSource: Send + Sync {
    /// Stable identifier for this source, e.g. `"flow0"`.
    fn id(&self) -> &str;

    /// Next tracked-feature frame, ordered to match the tracker grid, or
    /// `Ok(None)` when no frame has completed since the last call.
    ///
    /// # Errors
    ///
    /// Returns [`BurroError::SensorFault`] if the front end has failed.
    fn next_frame(&mut self) -> Result<Option<Vec<Vec2>>, BurroError>;
}
