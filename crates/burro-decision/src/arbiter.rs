//! Utility-scored winner-take-all arbitration.
//!
//! The [`Arbiter`] owns the agent registry. Once per tick it scores every
//! agent, caches the scores, lets the single highest scorer write actuator
//! commands, and then delivers that agent's stimulation along its outgoing
//! links. A score at or below zero never acts: zero is the explicit
//! nothing-to-do signal, so an all-idle registry leaves the actuators
//! untouched.
//!
//! # Example
//!
//! ```rust
//! use burro_decision::arbiter::{Arbiter, Verdict};
//! use burro_decision::behavior::TickContext;
//! use burro_decision::steering::SteeringBehavior;
//! use burro_hal::sim::SimServoBank;
//! use burro_types::BodyState;
//!
//! let mut arbiter = Arbiter::new();
//! arbiter.register(Box::new(SteeringBehavior::new()));
//!
//! let body = BodyState::default();
//! let ctx = TickContext { body: &body, regions: &[], route: None };
//! let mut servos = SimServoBank::new();
//!
//! // No route loaded: steering scores zero and nobody acts.
//! let verdict = arbiter.tick(&ctx, &mut *servos).unwrap();
//! assert_eq!(verdict, Verdict::Idle);
//! ```

use burro_hal::servo::ServoBank;
use burro_types::BurroError;
use tracing::debug;

use crate::behavior::{AgentId, Behavior, TickContext};

/// Outcome of one arbitration tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// No agent scored above zero; the actuators were left alone.
    Idle,
    /// `agent` won the tick and its action ran.
    Acted { agent: AgentId, utility: f32 },
}

struct AgentSlot {
    behavior: Box<dyn Behavior>,
    utility: f32,
    adjacent: Vec<AgentId>,
}

/// Ordered agent registry plus the per-tick selection loop.
///
/// Register every agent (and its links) during startup; the registry is
/// append-only and agents live for the life of the process.
pub struct Arbiter {
    agents: Vec<AgentSlot>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self { agents: Vec::new() }
    }

    /// Add an agent to the registry, running its one-time
    /// [`init`][Behavior::init].
    pub fn register(&mut self, mut behavior: Box<dyn Behavior>) -> AgentId {
        behavior.init();
        let id = AgentId(self.agents.len());
        self.agents.push(AgentSlot {
            behavior,
            utility: 0.0,
            adjacent: Vec::new(),
        });
        id
    }

    /// Link `source` to `target`: whenever `source` wins a tick, `target`
    /// receives its stimulation. Links are directed; add both directions
    /// for a mutual pair.
    pub fn connect(&mut self, source: AgentId, target: AgentId) {
        self.agents[source.0].adjacent.push(target);
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Score cached for `id` by the most recent [`tick`][Arbiter::tick].
    pub fn cached_utility(&self, id: AgentId) -> f32 {
        self.agents[id.0].utility
    }

    /// Run one arbitration round: score, select, act, stimulate.
    ///
    /// Every agent is scored before anything acts, so stimulation emitted
    /// this tick can only influence the next tick's scores. Ties go to the
    /// earliest-registered agent.
    pub fn tick(
        &mut self,
        ctx: &TickContext,
        servos: &mut dyn ServoBank,
    ) -> Result<Verdict, BurroError> {
        for slot in &mut self.agents {
            slot.utility = slot.behavior.utility(ctx);
        }

        let mut winner = None;
        let mut best = 0.0_f32;
        for (index, slot) in self.agents.iter().enumerate() {
            if slot.utility > best {
                best = slot.utility;
                winner = Some(index);
            }
        }
        let Some(index) = winner else {
            return Ok(Verdict::Idle);
        };

        let slot = &mut self.agents[index];
        slot.behavior.act(ctx, servos)?;
        debug!(
            agent = slot.behavior.name(),
            utility = best,
            "behavior acted"
        );

        let source = AgentId(index);
        let adjacent = slot.adjacent.clone();
        for target in adjacent {
            self.agents[target.0].behavior.stimulate(best, source);
        }

        Ok(Verdict::Acted {
            agent: source,
            utility: best,
        })
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
