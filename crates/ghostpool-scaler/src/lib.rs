//! ghostpool-scaler — the prescale control loop.
//!
//! Keeps a pool of idle "ghost" workspaces warm so real workspaces find
//! cluster capacity immediately instead of waiting for node scale-up.
//!
//! # Architecture
//!
//! ```text
//! Status maintainer ─ counts ─► Setpoint controller ─ delta ─► Prescale driver
//!   ▲ snapshot + events                                          │ start/stop
//!   └──────────────────── workspace manager ◄────────────────────┘
//! ```
//!
//! The status maintainer mirrors the manager's workspace inventory and
//! emits [`WorkspaceStatus`] snapshots. The controller turns observed
//! counts into signed ghost deltas against a (possibly time-varying)
//! setpoint. The driver arbitrates status updates, controller deltas,
//! periodic ghost renewal, and housekeeping of starts still in flight,
//! and translates the result into start/stop calls.
//!
//! Everything runs as cooperative tokio tasks wired by capacity-1
//! channels, which serialises the pipeline end to end; a single
//! `watch` token roots cancellation.

pub mod controller;
pub mod driver;
pub mod status;

#[cfg(test)]
pub(crate) mod testutil;

pub use controller::{
    controller_from_config, render_setpoint_over_time, ConstantSetpointController, Controller,
    SetpointInTime, SwitchedSetpointController, TimedFunctionController,
};
pub use driver::PrescaleDriver;
pub use status::{StatusError, WorkspaceStatus};
