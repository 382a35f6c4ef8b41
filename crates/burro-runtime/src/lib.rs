//! `burro-runtime` – Orchestration layer.
//!
//! Owns the device endpoints and the per-tick pipeline, plus the process
//! configuration and telemetry plumbing the binaries share.
//!
//! # Modules
//!
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: runs
//!   estimator, tracker and arbiter in dependency order against a set of
//!   [`Devices`][control_loop::Devices].
//! - [`config`] – [`RuntimeConfig`][config::RuntimeConfig]: TOML file at
//!   `~/.burro/config.toml` with `BURRO_*` environment overrides.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing] plus the
//!   bounded [`SnapshotRing`][telemetry::SnapshotRing] of per-tick state.

pub mod config;
pub mod control_loop;
pub mod telemetry;
