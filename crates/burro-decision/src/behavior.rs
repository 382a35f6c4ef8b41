//! The behavior-agent contract.
//!
//! A [`Behavior`] is one competing concern of the vehicle: steer toward the
//! active waypoint, give way to a moving obstacle, hold cruising speed.
//! Each tick the [`Arbiter`][crate::arbiter::Arbiter] asks every agent how
//! relevant it currently is, lets the single most relevant one drive the
//! actuators, and then forwards that agent's influence to the agents linked
//! to it.
//!
//! | Operation                 | Called                         | Purpose                  |
//! |---------------------------|--------------------------------|--------------------------|
//! | [`Behavior::init`]        | once, at registration          | one-time setup           |
//! | [`Behavior::utility`]     | every tick, every agent        | self-scored relevance    |
//! | [`Behavior::act`]         | every tick, winning agent only | write actuator commands  |
//! | [`Behavior::stimulate`]   | after a linked agent acted     | bias next-tick utility   |
//!
//! # Example
//!
//! ```rust
//! use burro_decision::behavior::{Behavior, TickContext};
//! use burro_hal::servo::{ServoBank, ServoChannel};
//! use burro_types::{BodyState, BurroError};
//!
//! struct HoldSpeed;
//!
//! impl Behavior for HoldSpeed {
//!     fn name(&self) -> &str {
//!         "hold_speed"
//!     }
//!
//!     fn utility(&mut self, _ctx: &TickContext) -> f32 {
//!         1.0
//!     }
//!
//!     fn act(
//!         &mut self,
//!         _ctx: &TickContext,
//!         servos: &mut dyn ServoBank,
//!     ) -> Result<(), BurroError> {
//!         servos.set(ServoChannel::Throttle, 55.0)
//!     }
//! }
//!
//! let body = BodyState::default();
//! let ctx = TickContext { body: &body, regions: &[], route: None };
//! let mut agent = HoldSpeed;
//! assert_eq!(agent.utility(&ctx), 1.0);
//! ```

use burro_hal::servo::ServoBank;
use burro_perception::flow::Region;
use burro_types::{BodyState, BurroError, Route};

// ────────────────────────────────────────────────────────────────────────────
// AgentId
// ────────────────────────────────────────────────────────────────────────────

/// Handle to a registered agent, issued by
/// [`Arbiter::register`][crate::arbiter::Arbiter::register]. Stimulation
/// links are expressed with these handles rather than references, so agents
/// never borrow each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId(pub(crate) usize);

impl AgentId {
    /// Slot index inside the registry.
    pub fn index(&self) -> usize {
        self.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TickContext
// ────────────────────────────────────────────────────────────────────────────

/// Read-only snapshot of the perception outputs an agent may consult during
/// one tick. The estimator and tracker finished writing before this is
/// built, so every agent sees one consistent world state.
pub struct TickContext<'a> {
    /// Fused vehicle state from the estimator.
    pub body: &'a BodyState,
    /// Motion regions from the most recent tracker frame.
    pub regions: &'a [Region],
    /// Loaded route, if any. Absence is the normal nothing-to-do case.
    pub route: Option<&'a Route>,
}

// ────────────────────────────────────────────────────────────────────────────
// Behavior
// ────────────────────────────────────────────────────────────────────────────

/// One competing behavior of the vehicle.
///
/// A score at or below zero means the agent has nothing to do this tick and
/// it will never be asked to act. Utility scales are a contract between the
/// agents sharing an arbiter, not something the engine normalizes.
pub trait Behavior: Send {
    /// Stable name for logs and diagnostics.
    fn name(&self) -> &str;

    /// One-time setup, run when the agent is registered.
    fn init(&mut self) {}

    /// Self-scored relevance for this tick, given the current world state.
    fn utility(&mut self, ctx: &TickContext) -> f32;

    /// Drive the actuators. Called on the winning agent only. Must degrade
    /// to a no-op rather than fail when its inputs are absent (no route, no
    /// regions), mirroring the zero score it reported for that state.
    fn act(&mut self, ctx: &TickContext, servos: &mut dyn ServoBank) -> Result<(), BurroError>;

    /// Feedback from a linked agent that just acted, weighted by that
    /// agent's winning utility. Takes effect on the next tick's
    /// [`utility`][Behavior::utility], never the current one.
    fn stimulate(&mut self, _weight: f32, _source: AgentId) {}
}
