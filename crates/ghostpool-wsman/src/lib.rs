//! ghostpool-wsman — façade over the external workspace manager.
//!
//! The workspace manager is the gRPC service that actually starts,
//! stops, and reports on workspaces. This crate narrows it down to the
//! four calls the prescaler needs and exposes them behind the
//! [`WorkspaceManager`] capability trait:
//!
//! ```text
//! PrescaleDriver
//!   └── WorkspaceManager (trait)
//!       └── GrpcWorkspaceManager
//!           ├── list_workspaces() → inventory snapshot
//!           ├── subscribe()       → status event stream
//!           ├── start_ghost()     → fixed ghost payload
//!           └── stop_ghost()      → NORMAL policy, NOT_FOUND is success
//! ```
//!
//! All calls are bounded by a 15-second per-call timeout.

pub mod adapter;
pub mod api;
pub mod client;
pub mod error;

pub use adapter::{
    EventStream, GhostTemplate, GrpcEventStream, GrpcWorkspaceManager, WorkspaceDescription,
    WorkspaceEvent, WorkspaceManager, RPC_TIMEOUT,
};
pub use client::WorkspaceManagerClient;
pub use error::WsmanError;
