//! The per-tick orchestration of the whole pipeline.
//!
//! [`ControlLoop`] owns the device endpoints and the three processing
//! stages and runs them in dependency order, once per tick:
//!
//! 1. sample the IMU and poll the GPS, fold both into the state estimator;
//! 2. advance the route cursor if the new estimate reached the waypoint;
//! 3. feed any new feature frame to the region tracker;
//! 4. hand pose, regions and route to the arbiter, which drives the servos;
//! 5. capture a snapshot into the telemetry ring.
//!
//! Stages never run concurrently within a tick, so every consumer sees the
//! producers' completed output for the same tick.

use std::time::Instant;

use burro_decision::arbiter::{Arbiter, Verdict};
use burro_decision::behavior::TickContext;
use burro_decision::steering::SteeringBehavior;
use burro_hal::sensors::{FeatureSource, GpsSource, ImuSource};
use burro_hal::servo::ServoBank;
use burro_perception::estimator::StateEstimator;
use burro_perception::flow::{Region, RegionTracker, TrackerUpdate};
use burro_types::{BodyState, BurroError, Route, Snapshot};
use chrono::Utc;
use tracing::info;

use crate::config::RuntimeConfig;
use crate::telemetry::SnapshotRing;

/// The device endpoints a [`ControlLoop`] drives. Production wiring hands
/// in real drivers; tests and the simulator hand in the `burro_hal::sim`
/// doubles.
pub struct Devices {
    pub imu: Box<dyn ImuSource>,
    pub gps: Box<dyn GpsSource>,
    pub features: Box<dyn FeatureSource>,
    pub servos: Box<dyn ServoBank>,
}

/// What one tick did, for callers that report or assert on loop progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Loop time handed to the estimator, seconds since start.
    pub now: f32,
    /// Whether a GPS fix arrived and was folded in.
    pub fix_applied: bool,
    /// Tracker outcome, or `None` when no feature frame arrived.
    pub tracker: Option<TrackerUpdate>,
    /// Arbitration outcome.
    pub verdict: Verdict,
}

/// Owner of the perception-to-action pipeline and its devices.
pub struct ControlLoop {
    imu: Box<dyn ImuSource>,
    gps: Box<dyn GpsSource>,
    features: Box<dyn FeatureSource>,
    servos: Box<dyn ServoBank>,
    estimator: StateEstimator,
    tracker: RegionTracker,
    arbiter: Arbiter,
    route: Option<Route>,
    started: Instant,
    snapshots: SnapshotRing,
}

impl ControlLoop {
    /// Build the pipeline around `devices`, with the steering agent
    /// registered. Further agents can be added through
    /// [`arbiter_mut`][ControlLoop::arbiter_mut] before the first tick.
    pub fn new(config: &RuntimeConfig, devices: Devices) -> Self {
        let mut arbiter = Arbiter::new();
        arbiter.register(Box::new(SteeringBehavior::new()));
        Self {
            imu: devices.imu,
            gps: devices.gps,
            features: devices.features,
            servos: devices.servos,
            estimator: StateEstimator::new(),
            tracker: RegionTracker::new(config.flow.tracker_config()),
            arbiter,
            route: None,
            started: Instant::now(),
            snapshots: SnapshotRing::new(config.snapshot_depth),
        }
    }

    /// Run one tick at the wall-clock uptime.
    pub fn tick(&mut self) -> Result<TickReport, BurroError> {
        self.tick_at(self.started.elapsed().as_secs_f32())
    }

    /// Run one tick at an explicit loop time. Deterministic entry point for
    /// tests and log replays; `now` must not run backwards between calls.
    pub fn tick_at(&mut self, now: f32) -> Result<TickReport, BurroError> {
        let imu = self.imu.sample()?;
        let fix = self.gps.poll_fix()?;
        let fix_applied = fix.is_some();
        self.estimator.update(&imu, fix, now);

        let position = self.estimator.body().estimated.position;
        if let Some(route) = &mut self.route
            && route.advance_if_reached(&position)
        {
            if route.is_complete() {
                info!("route complete");
            } else {
                info!("waypoint reached, advancing");
            }
        }

        let tracker = self
            .features
            .next_frame()?
            .map(|frame| self.tracker.update(&frame));

        let ctx = TickContext {
            body: self.estimator.body(),
            regions: self.tracker.regions(),
            route: self.route.as_ref(),
        };
        let verdict = self.arbiter.tick(&ctx, self.servos.as_mut())?;

        let snapshot = self.capture(now);
        self.snapshots.push(snapshot);

        Ok(TickReport {
            now,
            fix_applied,
            tracker,
            verdict,
        })
    }

    /// Drive every actuator to its neutral position. Run at startup and
    /// again on shutdown.
    pub fn neutralize(&mut self) -> Result<(), BurroError> {
        self.servos.neutralize()?;
        info!("servos neutralized");
        Ok(())
    }

    pub fn set_route(&mut self, route: Option<Route>) {
        self.route = route;
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn body(&self) -> &BodyState {
        self.estimator.body()
    }

    pub fn regions(&self) -> &[Region] {
        self.tracker.regions()
    }

    pub fn servos(&self) -> &dyn ServoBank {
        self.servos.as_ref()
    }

    /// Agent registry, for wiring additional behaviors and links at
    /// startup.
    pub fn arbiter_mut(&mut self) -> &mut Arbiter {
        &mut self.arbiter
    }

    pub fn snapshots(&self) -> &SnapshotRing {
        &self.snapshots
    }

    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.latest()
    }

    /// Capture the current state on demand, without ticking.
    pub fn snapshot(&self) -> Snapshot {
        self.capture(self.started.elapsed().as_secs_f32())
    }

    fn capture(&self, now: f32) -> Snapshot {
        let body = self.estimator.body();
        Snapshot {
            captured_at: Utc::now(),
            uptime: now,
            imu: body.imu,
            estimated: body.estimated,
            current_waypoint: self.route.as_ref().and_then(|r| r.current().copied()),
            next_waypoint: self.route.as_ref().and_then(|r| r.next().copied()),
            has_fix: body.has_fix,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use burro_hal::servo::ServoChannel;
    use burro_hal::sim::{SimFeatureField, SimGps, SimImu, SimServoBank};
    use burro_types::{GpsFix, Vec2, Vec3, Waypoint};

    use super::*;

    fn quiet_devices() -> Devices {
        Devices {
            imu: SimImu::new("imu0"),
            gps: SimGps::new("gps0"),
            features: SimFeatureField::new("flow0"),
            servos: SimServoBank::new(),
        }
    }

    fn fix_at(x: f32, y: f32) -> GpsFix {
        GpsFix {
            position: Vec3::new(x, y, 0.0),
            velocity: Vec3::zero(),
        }
    }

    #[test]
    fn fix_is_folded_then_dead_reckoned() {
        let mut gps = SimGps::new("gps0");
        gps.push_fix(fix_at(2.0, 3.0));
        let devices = Devices {
            gps,
            ..quiet_devices()
        };
        let mut control = ControlLoop::new(&RuntimeConfig::default(), devices);

        let first = control.tick_at(0.5).unwrap();
        assert!(first.fix_applied);
        assert!(control.body().has_fix);
        assert_eq!(control.body().estimated.position, Vec3::new(2.0, 3.0, 0.0));

        // Fix velocity was derived from the position delta over 0.5 s.
        assert_eq!(control.body().estimated.velocity, Vec3::new(4.0, 6.0, 0.0));

        let second = control.tick_at(1.0).unwrap();
        assert!(!second.fix_applied);
        // Dead reckoning carried that velocity forward for another 0.5 s.
        assert_eq!(control.body().estimated.position, Vec3::new(4.0, 6.0, 0.0));
    }

    #[test]
    fn route_advances_when_the_fix_lands_inside_tolerance() {
        let mut gps = SimGps::new("gps0");
        gps.push_fix(fix_at(2.0, 3.0));
        let devices = Devices {
            gps,
            ..quiet_devices()
        };
        let mut control = ControlLoop::new(&RuntimeConfig::default(), devices);
        control.set_route(Some(Route::new(vec![
            Waypoint::new(Vec3::new(2.0, 3.0, 0.0), 0.5),
            Waypoint::new(Vec3::new(10.0, 10.0, 0.0), 1.0),
        ])));

        control.tick_at(0.5).unwrap();

        let current = control.route().unwrap().current().unwrap();
        assert_eq!(current.position, Vec3::new(10.0, 10.0, 0.0));
    }

    #[test]
    fn tracker_runs_only_when_frames_arrive() {
        let resting = vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)];
        let shifted = vec![Vec2::new(3.0, 0.0), Vec2::new(13.0, 0.0)];
        let devices = Devices {
            features: SimFeatureField::with_frames(vec![resting, shifted]),
            ..quiet_devices()
        };
        let mut control = ControlLoop::new(&RuntimeConfig::default(), devices);

        let first = control.tick_at(0.1).unwrap();
        assert_eq!(first.tracker, Some(TrackerUpdate::Primed));

        let second = control.tick_at(0.2).unwrap();
        assert_eq!(second.tracker, Some(TrackerUpdate::Tracked { regions: 1 }));
        assert_eq!(control.regions().len(), 1);

        // The scripted field is exhausted; the tracker must sit this one out.
        let third = control.tick_at(0.3).unwrap();
        assert_eq!(third.tracker, None);
        assert_eq!(control.regions().len(), 1);
    }

    #[test]
    fn steering_drives_the_servo_when_off_course() {
        let mut gps = SimGps::new("gps0");
        gps.push_fix(fix_at(10.0, 0.0));
        let devices = Devices {
            gps,
            ..quiet_devices()
        };
        let mut control = ControlLoop::new(&RuntimeConfig::default(), devices);
        control.set_route(Some(Route::new(vec![Waypoint::new(Vec3::zero(), 0.5)])));

        let report = control.tick_at(0.5).unwrap();

        match report.verdict {
            Verdict::Acted { utility, .. } => assert!((utility - FRAC_PI_2).abs() < 1e-5),
            Verdict::Idle => panic!("steering had a live waypoint and should have acted"),
        }
        assert!((control.servos().position(ServoChannel::Steering) - 75.0).abs() < 1e-4);
    }

    #[test]
    fn idle_loop_leaves_the_servos_alone() {
        let mut control = ControlLoop::new(&RuntimeConfig::default(), quiet_devices());
        control.neutralize().unwrap();

        for step in 1..=3 {
            let report = control.tick_at(step as f32 * 0.1).unwrap();
            assert_eq!(report.verdict, Verdict::Idle);
        }
        assert_eq!(control.servos().position(ServoChannel::Steering), 50.0);
        assert_eq!(control.servos().position(ServoChannel::Throttle), 50.0);
    }

    #[test]
    fn snapshots_accumulate_in_the_ring() {
        let mut gps = SimGps::new("gps0");
        gps.push_fix(fix_at(1.0, 1.0));
        let devices = Devices {
            gps,
            ..quiet_devices()
        };
        let mut control = ControlLoop::new(&RuntimeConfig::default(), devices);

        control.tick_at(0.1).unwrap();
        control.tick_at(0.2).unwrap();
        control.tick_at(0.3).unwrap();

        assert_eq!(control.snapshots().len(), 3);
        let latest = control.latest_snapshot().unwrap();
        assert_eq!(latest.uptime, 0.3);
        assert!(latest.has_fix);
        assert_eq!(latest.estimated.position, control.body().estimated.position);
    }
}
