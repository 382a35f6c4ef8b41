//! `burro-decision` – Decision layer.
//!
//! Chooses, every tick, which one of the registered behavior agents gets to
//! drive the actuators, and routes post-action stimulation between agents.
//!
//! # Modules
//!
//! - [`behavior`] – [`Behavior`][behavior::Behavior]: the agent contract
//!   (`utility` / `act` / `stimulate`) and the read-only
//!   [`TickContext`][behavior::TickContext] it sees.
//! - [`arbiter`] – [`Arbiter`][arbiter::Arbiter]: utility-scored
//!   winner-take-all selection with directed stimulation links.
//! - [`steering`] – [`SteeringBehavior`][steering::SteeringBehavior]:
//!   waypoint-tracking steering correction, the canonical agent.

pub mod arbiter;
pub mod behavior;
pub mod steering;
