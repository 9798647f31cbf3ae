//! Reflected-sunlight glare analysis for photovoltaic installations.
//!
//! A run takes a validated [`model::Project`] (PV areas and observation
//! points), computes a year of sun positions, reflects them off every PV
//! area and tests each reflection against the angular footprint of every
//! area as seen from every observer. Hits become [`glare::GlareEvent`]s,
//! which are merged into [`glare::GlarePeriod`]s and summarized.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary (see [`telemetry::init_tracing`]).

/// Command-line parsing for the `glare-sim` binary.
pub mod cli;
/// TOML analysis configuration, presets and environment overrides.
pub mod config;
pub mod error;
pub mod glare;
/// Project input JSON and its validation.
pub mod input;
pub mod io;
pub mod model;
pub mod optics;
/// Analysis engine and time stepping.
pub mod sim;
pub mod solar;
pub mod telemetry;

pub use error::{ErrorKind, GlareError};
