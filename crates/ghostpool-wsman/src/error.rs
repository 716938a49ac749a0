//! Workspace-manager call errors.

use std::time::Duration;

use thiserror::Error;

/// Errors from workspace-manager calls. All of these are transient from
/// the driver's point of view: they are logged and the loop continues.
#[derive(Debug, Error)]
pub enum WsmanError {
    #[error("cannot connect to ws-manager: {0}")]
    Connect(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("rpc timed out after {0:?}")]
    Timeout(Duration),

    #[error("subscription stream closed")]
    SubscriptionClosed,
}
