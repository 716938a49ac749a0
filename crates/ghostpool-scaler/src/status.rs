//! Live workspace inventory, maintained from the manager's snapshot and
//! event stream.
//!
//! The maintainer owns the inventory map exclusively; every emission is
//! a fresh [`WorkspaceStatus`] snapshot the driver may mutate freely.

use std::collections::HashMap;
use std::time::SystemTime;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use ghostpool_core::types::WorkspaceId;
use ghostpool_core::{WorkspaceCount, WorkspacePhase, WorkspaceType};
use ghostpool_wsman::{EventStream, WorkspaceManager, WsmanError};

/// Derived snapshot of the workspace population.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceStatus {
    pub count: WorkspaceCount,
    /// Ghost workspace ids eligible for stopping, oldest first. Real
    /// workspaces are observed but never stopped by the prescaler.
    pub deletion_candidates: Vec<WorkspaceId>,
}

/// Why the status maintainer stopped.
#[derive(Debug, Error)]
pub enum StatusError {
    /// Shutdown was requested; clean termination, not a failure.
    #[error("canceled")]
    Canceled,

    #[error(transparent)]
    Wsman(#[from] WsmanError),
}

#[derive(Debug, Clone, Copy)]
struct WorkspaceState {
    started_at: SystemTime,
    kind: WorkspaceType,
}

/// Mirror the manager's workspace inventory into `status_tx`.
///
/// Emits one status after the initial snapshot and one after every
/// relevant subscription event: a known workspace reaching `Stopped`
/// leaves the inventory, an unknown one surfacing in `Pending` enters
/// it, everything else is ignored.
///
/// Returns [`StatusError::Canceled`] on shutdown; any other return is a
/// transient failure and the caller restarts with a full re-snapshot.
pub(crate) async fn maintain_workspace_status<W: WorkspaceManager>(
    wsman: &mut W,
    status_tx: &mpsc::Sender<WorkspaceStatus>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), StatusError> {
    let mut state = HashMap::new();
    for ws in wsman.list_workspaces().await? {
        state.insert(
            ws.id,
            WorkspaceState {
                started_at: ws.started_at,
                kind: ws.kind,
            },
        );
    }
    send_status(status_tx, shutdown, produce_status(&state)).await?;

    let mut events = wsman.subscribe().await?;
    loop {
        let event = tokio::select! {
            _ = shutdown.changed() => return Err(StatusError::Canceled),
            event = events.recv() => event?.ok_or(WsmanError::SubscriptionClosed)?,
        };

        let known = state.contains_key(&event.id);
        if known && event.phase == WorkspacePhase::Stopped {
            state.remove(&event.id);
        } else if !known && event.phase == WorkspacePhase::Pending {
            state.insert(
                event.id,
                WorkspaceState {
                    started_at: event.started_at,
                    kind: event.kind,
                },
            );
        } else {
            continue;
        }
        send_status(status_tx, shutdown, produce_status(&state)).await?;
    }
}

async fn send_status(
    status_tx: &mpsc::Sender<WorkspaceStatus>,
    shutdown: &mut watch::Receiver<bool>,
    status: WorkspaceStatus,
) -> Result<(), StatusError> {
    tokio::select! {
        _ = shutdown.changed() => Err(StatusError::Canceled),
        sent = status_tx.send(status) => sent.map_err(|_| StatusError::Canceled),
    }
}

/// Tally counts by type and enumerate ghost ids as deletion candidates,
/// sorted ascending by start time with a stable tie-break on id.
fn produce_status(state: &HashMap<WorkspaceId, WorkspaceState>) -> WorkspaceStatus {
    let mut status = WorkspaceStatus::default();
    let mut ghosts = Vec::new();
    for (id, ws) in state {
        match ws.kind {
            WorkspaceType::Regular => status.count.regular += 1,
            WorkspaceType::Prebuild => status.count.prebuild += 1,
            WorkspaceType::Ghost => {
                status.count.ghost += 1;
                ghosts.push((id, ws.started_at));
            }
        }
    }
    ghosts.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    status.deletion_candidates = ghosts.into_iter().map(|(id, _)| id.clone()).collect();
    status
}
