//! `burro-perception` – Perception layer.
//!
//! Turns raw sensor samples into the estimated vehicle state and the
//! obstacle picture the decision layer reasons about.
//!
//! # Modules
//!
//! - [`estimator`] – [`StateEstimator`][estimator::StateEstimator]:
//!   complementary heading filter plus GPS/dead-reckoning position tracking,
//!   maintained as a [`BodyState`][burro_types::BodyState].
//! - [`flow`] – [`RegionTracker`][flow::RegionTracker]: clusters
//!   frame-to-frame feature displacement into coherent motion regions with
//!   bounding boxes.

pub mod estimator;
pub mod flow;
