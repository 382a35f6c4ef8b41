//! Scripted world for the simulator.
//!
//! Builds the four device endpoints the control loop drives, scripted so
//! that every pipeline stage has something to chew on: a GPS that walks the
//! demo route with measurement jitter, an IMU with sensor noise, and a
//! feature field with one block of features drifting across it.
//!
//! The world is open loop: the scripted vehicle follows the route no matter
//! what the servos command. The point is exercising the pipeline end to
//! end, not vehicle dynamics.

use burro_hal::sensors::{FeatureSource, GpsSource, ImuSource};
use burro_hal::sim::{self, SimServoBank};
use burro_runtime::config::RuntimeConfig;
use burro_runtime::control_loop::Devices;
use burro_types::{BurroError, GpsFix, ImuSample, Route, Vec2, Vec3, Waypoint};
use rand::Rng;

/// Corners of the square demo course, metres.
fn course_corners() -> Vec<Vec3> {
    vec![
        Vec3::new(20.0, 0.0, 0.0),
        Vec3::new(20.0, 20.0, 0.0),
        Vec3::new(0.0, 20.0, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
    ]
}

/// The demo route: one lap of the square course, 2 m arrival tolerance.
pub fn demo_route() -> Route {
    Route::new(
        course_corners()
            .into_iter()
            .map(|corner| Waypoint::new(corner, 2.0))
            .collect(),
    )
}

/// All four endpoints for one simulator run.
pub fn devices(config: &RuntimeConfig) -> Devices {
    let dt = config.tick_interval().as_secs_f32();
    Devices {
        imu: NoisyImu::new(0.02),
        gps: RouteWalkerGps::new(course_corners(), 2.0, dt, 5, 0.05),
        features: DriftingField::new(config.flow.width, config.flow.height, 3),
        servos: SimServoBank::new(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// NoisyImu
// ────────────────────────────────────────────────────────────────────────────

/// A level IMU with uniform noise on the adjusted magnetometer and gyro,
/// enough to keep the heading filter honestly blending.
pub struct NoisyImu {
    base: ImuSample,
    noise: f32,
}

impl NoisyImu {
    pub fn new(noise: f32) -> Box<Self> {
        Box::new(Self {
            base: sim::level_sample(),
            noise,
        })
    }
}

impl ImuSource for NoisyImu {
    fn id(&self) -> &str {
        "sim-imu"
    }

    fn sample(&mut self) -> Result<ImuSample, BurroError> {
        let mut sample = self.base;
        if self.noise > 0.0 {
            let mut rng = rand::thread_rng();
            sample.adjusted.mag.x += rng.gen_range(-self.noise..self.noise);
            sample.adjusted.mag.y += rng.gen_range(-self.noise..self.noise);
            sample.adjusted.rotational.z += rng.gen_range(-self.noise..self.noise);
        }
        Ok(sample)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RouteWalkerGps
// ────────────────────────────────────────────────────────────────────────────

/// A GPS receiver strapped to a phantom vehicle that walks the course at
/// constant speed. Reports a jittered fix every `period` polls and no fix
/// in between, so the estimator dead-reckons across the gaps.
pub struct RouteWalkerGps {
    corners: Vec<Vec3>,
    leg: usize,
    position: Vec3,
    velocity: Vec3,
    speed: f32,
    dt: f32,
    period: u32,
    polls: u32,
    jitter: f32,
}

impl RouteWalkerGps {
    pub fn new(corners: Vec<Vec3>, speed: f32, dt: f32, period: u32, jitter: f32) -> Box<Self> {
        Box::new(Self {
            corners,
            leg: 0,
            position: Vec3::zero(),
            velocity: Vec3::zero(),
            speed,
            dt,
            period: period.max(1),
            polls: 0,
            jitter,
        })
    }

    /// Step the phantom vehicle one poll interval along the course.
    fn advance(&mut self) {
        let Some(target) = self.corners.get(self.leg) else {
            // Off the end of the course: hold position.
            self.velocity = Vec3::zero();
            return;
        };
        let to_target = target.sub(&self.position);
        let distance = to_target.length();
        let step = self.speed * self.dt;
        if distance <= step {
            self.position = *target;
            self.leg += 1;
        } else {
            let direction = to_target.scaled(1.0 / distance);
            self.position = self.position.add(&direction.scaled(step));
            self.velocity = direction.scaled(self.speed);
        }
    }
}

impl GpsSource for RouteWalkerGps {
    fn id(&self) -> &str {
        "sim-gps"
    }

    fn poll_fix(&mut self) -> Result<Option<GpsFix>, BurroError> {
        self.advance();
        self.polls += 1;
        if self.polls % self.period != 0 {
            return Ok(None);
        }
        let mut measured = self.position;
        if self.jitter > 0.0 {
            let mut rng = rand::thread_rng();
            measured.x += rng.gen_range(-self.jitter..self.jitter);
            measured.y += rng.gen_range(-self.jitter..self.jitter);
        }
        Ok(Some(GpsFix {
            position: measured,
            velocity: self.velocity,
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DriftingField
// ────────────────────────────────────────────────────────────────────────────

const CELL_SPACING: f32 = 10.0;
const DRIFT_STEP: f32 = 4.0;

/// A feature field where a 2×2 block of features drifts east across an
/// otherwise static grid, emitting a frame every `period` polls.
pub struct DriftingField {
    base: Vec<Vec2>,
    moving: Vec<usize>,
    offset: f32,
    wrap: f32,
    period: u32,
    polls: u32,
}

impl DriftingField {
    pub fn new(width: usize, height: usize, period: u32) -> Box<Self> {
        let mut base = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                base.push(Vec2::new(x as f32 * CELL_SPACING, y as f32 * CELL_SPACING));
            }
        }
        // A 2×2 block in the middle of the grid does the moving.
        let cx = width / 2;
        let cy = height / 2;
        let mut moving = vec![cy * width + cx];
        if cx + 1 < width {
            moving.push(cy * width + cx + 1);
        }
        if cy + 1 < height {
            moving.push((cy + 1) * width + cx);
            if cx + 1 < width {
                moving.push((cy + 1) * width + cx + 1);
            }
        }
        Box::new(Self {
            base,
            moving,
            offset: 0.0,
            wrap: width as f32 * CELL_SPACING,
            period: period.max(1),
            polls: 0,
        })
    }
}

impl FeatureSource for DriftingField {
    fn id(&self) -> &str {
        "sim-flow"
    }

    fn next_frame(&mut self) -> Result<Option<Vec<Vec2>>, BurroError> {
        self.polls += 1;
        if self.polls % self.period != 0 {
            return Ok(None);
        }
        self.offset += DRIFT_STEP;
        if self.offset > self.wrap {
            self.offset = 0.0;
        }
        let mut frame = self.base.clone();
        for &i in &self.moving {
            frame[i] = Vec2::new(self.base[i].x + self.offset, self.base[i].y);
        }
        Ok(Some(frame))
    }
}
