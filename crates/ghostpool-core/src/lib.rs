//! ghostpool-core — shared building blocks for the ghost workspace
//! prescaler.
//!
//! This crate holds the pieces every other ghostpool crate depends on:
//! the domain vocabulary (workspace counts, types, phases, times of day),
//! the injectable clock/ticker abstraction, and the configuration schema
//! with its fail-fast validation.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock, Ticker, TickerFactory};
pub use config::{
    ConstantConfig, ControllerConfig, ControllerKind, RenewalConfig, ScalerConfig,
    SwitchedConstantConfig, DEFAULT_GHOST_OWNER,
};
pub use error::ConfigError;
pub use types::{SwitchedSetpoint, TimeOfDay, WorkspaceCount, WorkspacePhase, WorkspaceType};
