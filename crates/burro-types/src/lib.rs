use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Math primitives
// ────────────────────────────────────────────────────────────────────────────

/// A 2-D vector (screen-space feature positions, bounding-box corners).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn sub(&self, other: &Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// A 3-D vector (positions, velocities, headings).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Uniform scale by `s`.
    pub fn scaled(&self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(&self, other: &Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction. A zero-length input stays the zero
    /// vector rather than producing NaN components.
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len > f32::EPSILON {
            self.scaled(1.0 / len)
        } else {
            Vec3::zero()
        }
    }

    /// Rotation about the vertical (Z) axis by `angle_rad`, counter-clockwise
    /// when viewed from above.
    pub fn rotated_z(&self, angle_rad: f32) -> Vec3 {
        let (sin, cos) = angle_rad.sin_cos();
        Vec3::new(
            self.x * cos - self.y * sin,
            self.x * sin + self.y * cos,
            self.z,
        )
    }

    /// Linear interpolation from `self` toward `other`: `t = 0` returns
    /// `self`, `t = 1` returns `other`.
    pub fn lerp(&self, other: &Vec3, t: f32) -> Vec3 {
        self.add(&other.sub(self).scaled(t))
    }
}

/// A compact 3-component integer vector, used for raw sensor counts and
/// depth/feature coordinates that travel in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vec3i16 {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Vec3i16 {
    pub fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor samples
// ────────────────────────────────────────────────────────────────────────────

/// Uncalibrated sensor counts exactly as the IMU driver delivered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawImu {
    pub acc: Vec3i16,
    pub gyro: Vec3i16,
    pub mag: Vec3i16,
}

/// Calibration-adjusted IMU readings in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AdjustedImu {
    /// Linear acceleration (m/s²).
    pub linear: Vec3,
    /// Angular rate about each body axis (rad/s).
    pub rotational: Vec3,
    /// Magnetic field direction (sensor frame, unnormalized).
    pub mag: Vec3,
}

/// One IMU sample, raw and calibration-adjusted side by side. The raw half
/// exists for telemetry and calibration tooling; the pipeline itself only
/// reads the adjusted half.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImuSample {
    pub raw: RawImu,
    pub adjusted: AdjustedImu,
}

/// A fresh absolute position observation (GPS), together with the receiver's
/// own ground-velocity estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GpsFix {
    pub position: Vec3,
    pub velocity: Vec3,
}

// ────────────────────────────────────────────────────────────────────────────
// Pose and fused body state
// ────────────────────────────────────────────────────────────────────────────

/// Kinematic state of the vehicle body. Written only by the state estimator;
/// everything downstream reads it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position in the local ground frame (metres).
    pub position: Vec3,
    /// Linear velocity (m/s).
    pub velocity: Vec3,
    /// Angular velocity (rad/s).
    pub angular_velocity: Vec3,
    /// Heading obtained purely by propagating the gyro.
    pub gyro_heading: Vec3,
    /// Fused heading. Unit magnitude after every estimator update.
    pub heading: Vec3,
    /// Heading the decision layer is currently steering toward.
    pub goal_heading: Vec3,
    /// `heading` collapsed to a yaw angle (radians, CCW from +X).
    pub heading_angle: f32,
}

/// The estimator's complete working state: the latest IMU sample plus the
/// measured and estimated poses.
///
/// `measured` is the last directly observed state; `estimated` is the
/// dead-reckoned/filtered state the rest of the pipeline consumes. The
/// estimated pose is overwritten wholesale by the measured pose only at the
/// instant a position fix arrives. `last_est_time` never falls behind
/// `last_fix_time`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyState {
    pub imu: ImuSample,
    /// Uptime seconds at the last fix-based update.
    pub last_fix_time: f32,
    /// Uptime seconds at the last estimate-only update.
    pub last_est_time: f32,
    pub measured: Pose,
    pub estimated: Pose,
    /// Set once the first position fix has been accepted.
    pub has_fix: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Depth/feature window
// ────────────────────────────────────────────────────────────────────────────

/// Default capacity of a [`DepthWindow`], sized to travel in one datagram.
pub const MAX_FEATURES: usize = 128;

/// Bounded list of 3-D integer feature samples from the depth/flow front end.
/// Capacity is fixed at construction; `push` reports whether the sample was
/// stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthWindow {
    features: Vec<Vec3i16>,
    capacity: usize,
}

impl DepthWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            features: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample. Returns `false` (sample dropped) when the window is
    /// already at capacity.
    pub fn push(&mut self, feature: Vec3i16) -> bool {
        if self.features.len() < self.capacity {
            self.features.push(feature);
            true
        } else {
            false
        }
    }

    /// Number of currently detected features.
    pub fn detected(&self) -> usize {
        self.features.len()
    }

    pub fn features(&self) -> &[Vec3i16] {
        &self.features
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.features.clear();
    }
}

impl Default for DepthWindow {
    fn default() -> Self {
        Self::new(MAX_FEATURES)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Route and waypoints
// ────────────────────────────────────────────────────────────────────────────

/// A single route waypoint with an arrival tolerance radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Vec3,
    /// Arrival radius (metres). Inside it the route advances.
    pub tolerance: f32,
}

impl Waypoint {
    pub fn new(position: Vec3, tolerance: f32) -> Self {
        Self {
            position,
            tolerance,
        }
    }
}

/// An ordered waypoint list with a cursor at the active waypoint. Routes are
/// constructed in code or config; file parsing lives outside this crate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Route {
    waypoints: Vec<Waypoint>,
    cursor: usize,
}

impl Route {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self {
            waypoints,
            cursor: 0,
        }
    }

    /// The waypoint currently being driven toward, or `None` once the route
    /// is complete (or was empty to begin with).
    pub fn current(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.cursor)
    }

    /// The waypoint after the current one.
    pub fn next(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.cursor + 1)
    }

    /// Move the cursor past the current waypoint and return the new target.
    pub fn advance(&mut self) -> Option<&Waypoint> {
        if self.cursor < self.waypoints.len() {
            self.cursor += 1;
        }
        self.current()
    }

    /// Advance when `position` is within the current waypoint's tolerance
    /// radius. Returns `true` if the route advanced.
    pub fn advance_if_reached(&mut self, position: &Vec3) -> bool {
        let reached = match self.current() {
            Some(wp) => position.sub(&wp.position).length() <= wp.tolerance,
            None => false,
        };
        if reached {
            self.advance();
        }
        reached
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Telemetry snapshot
// ────────────────────────────────────────────────────────────────────────────

/// Immutable point-in-time copy of the vehicle state, for telemetry and
/// display. Produced on demand; nothing feeds back from it into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    /// Seconds since the control loop started.
    pub uptime: f32,
    pub imu: ImuSample,
    pub estimated: Pose,
    pub current_waypoint: Option<Waypoint>,
    pub next_waypoint: Option<Waypoint>,
    pub has_fix: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type spanning actuator faults, sensor-driver faults, and
/// configuration problems.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum BurroError {
    #[error("Servo Fault on {channel}: {details}")]
    ServoFault { channel: String, details: String },

    #[error("Sensor Fault on {device}: {details}")]
    SensorFault { device: String, details: String },

    #[error("Config Error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_normalized_is_unit_length() {
        let v = Vec3::new(3.0, 4.0, 0.0).normalized();
        assert!((v.length() - 1.0).abs() < 1e-6);
        assert!((v.x - 0.6).abs() < 1e-6);
        assert!((v.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn vec3_normalized_zero_stays_zero() {
        let v = Vec3::zero().normalized();
        assert_eq!(v, Vec3::zero());
    }

    #[test]
    fn vec3_rotated_z_quarter_turn() {
        let v = Vec3::new(1.0, 0.0, 2.0).rotated_z(std::f32::consts::FRAC_PI_2);
        assert!(v.x.abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
        assert!((v.z - 2.0).abs() < 1e-6);
    }

    #[test]
    fn vec3_lerp_endpoints() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(2.0, -4.0, 6.0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        let mid = a.lerp(&b, 0.5);
        assert!((mid.x - 1.0).abs() < 1e-6);
        assert!((mid.y + 2.0).abs() < 1e-6);
    }

    #[test]
    fn vec2_displacement_magnitude() {
        let prev = Vec2::new(5.0, 7.0);
        let new = Vec2::new(2.0, 3.0);
        let delta = prev.sub(&new);
        assert!((delta.magnitude() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn depth_window_respects_capacity() {
        let mut window = DepthWindow::new(2);
        assert!(window.push(Vec3i16::new(1, 2, 3)));
        assert!(window.push(Vec3i16::new(4, 5, 6)));
        assert!(!window.push(Vec3i16::new(7, 8, 9)));
        assert_eq!(window.detected(), 2);
        assert_eq!(window.features()[1], Vec3i16::new(4, 5, 6));
    }

    #[test]
    fn route_advances_through_waypoints() {
        let mut route = Route::new(vec![
            Waypoint::new(Vec3::new(0.0, 0.0, 0.0), 1.0),
            Waypoint::new(Vec3::new(10.0, 0.0, 0.0), 1.0),
        ]);
        assert_eq!(route.current().unwrap().position.x, 0.0);
        assert_eq!(route.next().unwrap().position.x, 10.0);

        // Far from the first waypoint: no advancement.
        assert!(!route.advance_if_reached(&Vec3::new(5.0, 5.0, 0.0)));
        // Inside the tolerance radius: cursor moves on.
        assert!(route.advance_if_reached(&Vec3::new(0.5, 0.0, 0.0)));
        assert_eq!(route.current().unwrap().position.x, 10.0);
        assert!(route.next().is_none());

        assert!(route.advance_if_reached(&Vec3::new(10.0, 0.5, 0.0)));
        assert!(route.is_complete());
        assert!(route.current().is_none());
        assert!(!route.advance_if_reached(&Vec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn empty_route_is_complete() {
        let route = Route::default();
        assert!(route.is_complete());
        assert!(route.current().is_none());
    }

    #[test]
    fn snapshot_serialization_roundtrip() {
        let snap = Snapshot {
            captured_at: Utc::now(),
            uptime: 12.5,
            imu: ImuSample::default(),
            estimated: Pose {
                position: Vec3::new(1.0, 2.0, 0.0),
                heading: Vec3::new(0.0, 1.0, 0.0),
                ..Pose::default()
            },
            current_waypoint: Some(Waypoint::new(Vec3::new(4.0, 4.0, 0.0), 2.0)),
            next_waypoint: None,
            has_fix: true,
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, back);
    }

    #[test]
    fn body_state_serialization_roundtrip() {
        let body = BodyState {
            last_fix_time: 3.0,
            last_est_time: 3.5,
            has_fix: true,
            ..BodyState::default()
        };
        let json = serde_json::to_string(&body).unwrap();
        let back: BodyState = serde_json::from_str(&json).unwrap();
        assert_eq!(body, back);
    }

    #[test]
    fn burro_error_display() {
        let err = BurroError::ServoFault {
            channel: "steering".to_string(),
            details: "command 120 outside [0, 100]".to_string(),
        };
        assert!(err.to_string().contains("steering"));

        let err2 = BurroError::Config("missing field `tick_hz`".to_string());
        assert!(err2.to_string().contains("Config Error"));
    }
}
