//! The prescale driver: reconciles controller deltas against the live
//! workspace population.
//!
//! The driver runs the status maintainer under a supervisor task, wires
//! the controller to the count feed, and arbitrates four event sources
//! in a single loop: status updates, housekeeping ticks, renewal ticks,
//! and controller deltas. Events are processed one at a time; all
//! driver-owned state lives on this task, so no locking is needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ghostpool_core::types::WorkspaceId;
use ghostpool_core::{Clock, ConfigError, ScalerConfig, Ticker, TickerFactory, WorkspaceCount};
use ghostpool_wsman::{WorkspaceManager, WsmanError};

use crate::controller::Controller;
use crate::status::{maintain_workspace_status, StatusError, WorkspaceStatus};

/// How long a requested ghost may stay invisible before housekeeping
/// forgets it. Covers the gap between issuing a start and seeing the
/// workspace in the inventory.
const MAX_GHOST_START_TIME: Duration = Duration::from_secs(15 * 60);

/// Cadence of the starting-ghost housekeeping sweep.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// Pause before re-snapshotting after a status maintainer failure.
const RESNAPSHOT_DELAY: Duration = Duration::from_secs(1);

/// Drives ghost workspaces through the workspace manager: holds the
/// pool at the controller's setpoint, renews aging ghosts, and enforces
/// the pool cap.
pub struct PrescaleDriver<W, C> {
    reconciler: Reconciler<W, C>,
    controller: Box<dyn Controller>,
    renewal_ticker: TickerFactory,
    housekeeping_ticker: TickerFactory,
}

impl<W, C> PrescaleDriver<W, C>
where
    W: WorkspaceManager + Clone,
    C: Clock,
{
    /// Create a driver; fails fast on invalid configuration.
    pub fn new(
        config: ScalerConfig,
        wsman: W,
        controller: Box<dyn Controller>,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let renewal_interval = config.renewal.interval;
        Ok(Self {
            reconciler: Reconciler {
                config,
                wsman,
                clock,
                status: WorkspaceStatus::default(),
                starting_ghosts: HashMap::new(),
            },
            controller,
            renewal_ticker: Arc::new(move || Ticker::every(renewal_interval)),
            housekeeping_ticker: Arc::new(|| Ticker::every(HOUSEKEEPING_INTERVAL)),
        })
    }

    pub fn with_renewal_ticker(mut self, new_ticker: TickerFactory) -> Self {
        self.renewal_ticker = new_ticker;
        self
    }

    pub fn with_housekeeping_ticker(mut self, new_ticker: TickerFactory) -> Self {
        self.housekeeping_ticker = new_ticker;
        self
    }

    /// Run until the shutdown token fires. Cancellation is the only way
    /// to stop the driver; signalling the token more than once is
    /// harmless.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Self {
            mut reconciler,
            controller,
            renewal_ticker,
            housekeeping_ticker,
        } = self;

        let (status_tx, mut status_rx) = mpsc::channel(1);
        let supervisor = tokio::spawn(supervise_status(
            reconciler.wsman.clone(),
            status_tx,
            shutdown.clone(),
        ));

        let (counts_tx, counts_rx) = mpsc::channel(1);
        let mut deltas = controller.control(shutdown.clone(), counts_rx);

        let mut renewal = if reconciler.config.renewal.enabled() {
            renewal_ticker()
        } else {
            Ticker::idle()
        };
        let mut housekeeping = housekeeping_ticker();

        info!(
            max_ghost_workspaces = reconciler.config.max_ghost_workspaces,
            "prescale driver started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                status = status_rx.recv() => {
                    let Some(status) = status else { break };
                    let count = reconciler.apply_status(status);
                    // May block until the controller is ready; the
                    // controller always has a pending read.
                    if counts_tx.send(count).await.is_err() {
                        break;
                    }
                }
                _ = housekeeping.recv() => reconciler.housekeeping(),
                _ = renewal.recv() => reconciler.renew().await,
                delta = deltas.recv() => {
                    let Some(delta) = delta else { break };
                    reconciler.handle_delta(delta).await;
                }
            }
        }

        renewal.stop();
        housekeeping.stop();
        supervisor.abort();
        info!("prescale driver stopped");
    }
}

/// Keep the status maintainer alive: any transient failure triggers a
/// full re-snapshot after a short pause; cancellation terminates.
async fn supervise_status<W: WorkspaceManager>(
    mut wsman: W,
    status_tx: mpsc::Sender<WorkspaceStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let err = match maintain_workspace_status(&mut wsman, &status_tx, &mut shutdown).await {
            Ok(()) | Err(StatusError::Canceled) => return,
            Err(StatusError::Wsman(err)) => err,
        };
        error!(error = %err, "cannot maintain workspace status");
        tokio::time::sleep(RESNAPSHOT_DELAY).await;
    }
}

/// The driver's single-task state and reconciliation steps.
struct Reconciler<W, C> {
    config: ScalerConfig,
    wsman: W,
    clock: C,
    /// Most recent observation; `count.ghost` holds the effective count
    /// (observed plus starts still in flight) once a status has been
    /// applied.
    status: WorkspaceStatus,
    /// Ghosts we asked to start but have not yet seen in the inventory,
    /// by issue time.
    starting_ghosts: HashMap<WorkspaceId, SystemTime>,
}

impl<W, C> Reconciler<W, C>
where
    W: WorkspaceManager,
    C: Clock,
{
    /// Adopt a fresh status and return the effective count to feed the
    /// controller. Starts that reached the inventory leave the
    /// starting-ghosts ledger; the rest inflate the ghost count so the
    /// controller does not double-request them.
    fn apply_status(&mut self, status: WorkspaceStatus) -> WorkspaceCount {
        self.status = status;
        for id in &self.status.deletion_candidates {
            self.starting_ghosts.remove(id);
        }
        self.status.count.ghost += self.starting_ghosts.len() as u32;
        debug!(count = ?self.status.count, "status update");
        self.status.count
    }

    /// Expire starting ghosts that never became visible, so a lost
    /// start cannot suppress the effective count forever.
    fn housekeeping(&mut self) {
        let now = self.clock.now();
        let ghost = &mut self.status.count.ghost;
        self.starting_ghosts.retain(|_, issued| {
            if now.duration_since(*issued).unwrap_or_default() <= MAX_GHOST_START_TIME {
                return true;
            }
            *ghost = ghost.saturating_sub(1);
            false
        });
    }

    /// Recycle the configured share of the pool: stop the oldest ghosts
    /// and start replacements, so ghost timeouts keep resetting.
    async fn renew(&mut self) {
        let candidates = self.status.deletion_candidates.len();
        let quota =
            (candidates * self.config.renewal.percentage as usize / 100).min(candidates);
        if quota == 0 {
            return;
        }
        info!(count = quota, "attempting to renew ghost workspaces");
        if let Err(err) = self.stop_ghosts(quota).await {
            error!(error = %err, "cannot stop ghost workspaces during renewal");
            return;
        }
        match self.start_ghosts(quota).await {
            Ok(ids) => self.record_started(ids),
            Err(err) => error!(error = %err, "cannot start ghost workspaces during renewal"),
        }
    }

    /// Act on a controller delta: stop up to `|delta|` of the oldest
    /// ghosts, or start `delta` new ones. RPC failures are logged and
    /// the loop moves on.
    async fn handle_delta(&mut self, delta: i64) {
        if delta == 0 {
            return;
        }
        if !self.config.reaction_delay.is_zero() {
            // Deliberate low-pass filter: the loop sits out the delay.
            tokio::time::sleep(self.config.reaction_delay).await;
        }

        let mut started = Vec::new();
        if delta < 0 {
            let count =
                (delta.unsigned_abs() as usize).min(self.status.deletion_candidates.len());
            if let Err(err) = self.stop_ghosts(count).await {
                error!(error = %err, "failed to realise ghost workspace delta");
                return;
            }
        } else {
            match self.start_ghosts(delta as usize).await {
                Ok(ids) => started = ids,
                Err(err) => {
                    error!(error = %err, "failed to realise ghost workspace delta");
                    return;
                }
            }
        }

        let newly_started = started.len();
        self.record_started(started);
        info!(delta, started = newly_started, "controller requested ghost workspaces");
    }

    /// Start up to `count` ghosts under fresh instance/meta id pairs,
    /// stopping at the pool cap. Returns the instance ids in issue
    /// order; a failed call surfaces the error and drops the batch.
    async fn start_ghosts(&mut self, count: usize) -> Result<Vec<WorkspaceId>, WsmanError> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            if self.status.count.ghost as usize + i
                >= self.config.max_ghost_workspaces as usize
            {
                warn!(
                    limit = self.config.max_ghost_workspaces,
                    "max number of ghost workspaces reached"
                );
                break;
            }
            let instance_id = Uuid::new_v4().to_string();
            let meta_id = Uuid::new_v4().to_string();
            self.wsman.start_ghost(&instance_id, &meta_id).await?;
            ids.push(instance_id);
        }
        Ok(ids)
    }

    /// Stop the `count` oldest deletion candidates. The façade treats
    /// already-gone workspaces as stopped.
    async fn stop_ghosts(&mut self, count: usize) -> Result<(), WsmanError> {
        let ids: Vec<WorkspaceId> = self.status.deletion_candidates[..count].to_vec();
        for id in &ids {
            self.wsman.stop_ghost(id).await?;
        }
        Ok(())
    }

    fn record_started(&mut self, ids: Vec<WorkspaceId>) {
        let now = self.clock.now();
        for id in ids {
            self.starting_ghosts.insert(id, now);
            self.status.count.ghost += 1;
        }
    }
}
