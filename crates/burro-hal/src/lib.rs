//! `burro-hal` – Hardware abstraction layer.
//!
//! Everything the perception-to-action pipeline touches in the physical world
//! goes through a trait defined here, so the whole stack runs headless
//! against the [`sim`] implementations in tests and CI.
//!
//! # Modules
//!
//! - [`servo`] – [`ServoBank`][servo::ServoBank]: percent-duty PWM output
//!   channels (steering, throttle) with range-checked commands.
//! - [`sensors`] – [`ImuSource`][sensors::ImuSource],
//!   [`GpsSource`][sensors::GpsSource] and
//!   [`FeatureSource`][sensors::FeatureSource]: the driver-facing side of the
//!   inertial, positioning, and optical-flow streams.
//! - [`sim`] – deterministic stub drivers for every trait above.

pub mod sensors;
pub mod servo;
pub mod sim;
