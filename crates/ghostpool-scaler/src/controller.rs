//! Setpoint controllers: pluggable feedback strategies that turn
//! workspace-count observations into signed ghost deltas.
//!
//! A positive delta asks the driver to start that many ghosts, a
//! negative one to stop. Controllers never clamp against the pool cap
//! (the driver owns that); the driver in turn guarantees it never stops
//! more ghosts than there are deletion candidates.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, watch};
use tracing::info;

use ghostpool_core::{
    Clock, ControllerConfig, ControllerKind, SwitchedSetpoint, SystemClock, Ticker, TickerFactory,
    TimeOfDay, WorkspaceCount,
};

/// Cadence at which time-driven controllers re-sample their target.
const DEFAULT_TICK_RESOLUTION: Duration = Duration::from_secs(60);

/// A prescaling strategy.
pub trait Controller: Send {
    /// Spawn the control task. It consumes `counts` and emits deltas
    /// until the shutdown token fires, then stops its ticker and closes
    /// the delta channel.
    ///
    /// The delta channel has capacity 1; the consumer throttles the
    /// controller by reading at its own pace.
    fn control(
        self: Box<Self>,
        shutdown: watch::Receiver<bool>,
        counts: mpsc::Receiver<WorkspaceCount>,
    ) -> mpsc::Receiver<i64>;
}

/// Build the controller selected by `config`.
///
/// Unknown kinds never reach this point: they are rejected when the
/// configuration is deserialized.
pub fn controller_from_config(config: &ControllerConfig) -> Box<dyn Controller> {
    match config.kind {
        ControllerKind::Constant => Box::new(ConstantSetpointController {
            target: config.constant.setpoint,
        }),
        ControllerKind::SwitchedConstant => Box::new(SwitchedSetpointController::new(
            config.switched_constant.default_setpoint,
            config.switched_constant.setpoints.clone(),
        )),
    }
}

/// Holds the ghost pool at a fixed size.
pub struct ConstantSetpointController {
    pub target: u32,
}

impl Controller for ConstantSetpointController {
    fn control(
        self: Box<Self>,
        mut shutdown: watch::Receiver<bool>,
        mut counts: mpsc::Receiver<WorkspaceCount>,
    ) -> mpsc::Receiver<i64> {
        let (delta_tx, delta_rx) = mpsc::channel(1);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    count = counts.recv() => {
                        let Some(count) = count else { return };
                        let diff = i64::from(self.target) - i64::from(count.ghost);
                        if delta_tx.send(diff).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });
        delta_rx
    }
}

/// Observability callback for setpoint switches: `(old, new)`.
pub type SetpointChanged = Box<dyn Fn(u32, u32) + Send>;

/// Like [`ConstantSetpointController`], but with different setpoints
/// throughout the day.
///
/// An internal ticker re-resolves the active setpoint against the
/// schedule; deltas are still only emitted when a count observation
/// arrives.
pub struct SwitchedSetpointController {
    default_setpoint: u32,
    /// Sorted ascending by time of day.
    setpoints: Vec<SwitchedSetpoint>,
    new_ticker: TickerFactory,
    clock: Arc<dyn Clock>,
    setpoint_changed: SetpointChanged,
}

impl SwitchedSetpointController {
    pub fn new(default_setpoint: u32, mut setpoints: Vec<SwitchedSetpoint>) -> Self {
        setpoints.sort_by_key(|sp| sp.time);
        Self {
            default_setpoint,
            setpoints,
            new_ticker: Arc::new(|| Ticker::every(DEFAULT_TICK_RESOLUTION)),
            clock: Arc::new(SystemClock),
            setpoint_changed: Box::new(|old, new| {
                info!(old, new, "switched setpoint controller target change");
            }),
        }
    }

    pub fn with_ticker(mut self, new_ticker: TickerFactory) -> Self {
        self.new_ticker = new_ticker;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_setpoint_changed(mut self, callback: impl Fn(u32, u32) + Send + 'static) -> Self {
        self.setpoint_changed = Box::new(callback);
        self
    }

    /// The latest switchpoint whose time is not after the time of day
    /// of `t`. `None` before the first switch of the day, or when no
    /// switchpoints are configured; the caller falls back to the
    /// default setpoint.
    fn find_switchpoint(&self, t: SystemTime) -> Option<&SwitchedSetpoint> {
        if self.setpoints.is_empty() {
            return None;
        }
        let tod = TimeOfDay::from_timestamp(t);
        for (i, sp) in self.setpoints.iter().enumerate() {
            if tod == sp.time {
                return Some(sp);
            }
            if tod > sp.time {
                continue;
            }
            if i == 0 {
                return None;
            }
            return Some(&self.setpoints[i - 1]);
        }
        self.setpoints.last()
    }
}

impl Controller for SwitchedSetpointController {
    fn control(
        self: Box<Self>,
        mut shutdown: watch::Receiver<bool>,
        mut counts: mpsc::Receiver<WorkspaceCount>,
    ) -> mpsc::Receiver<i64> {
        let (delta_tx, delta_rx) = mpsc::channel(1);

        let mut setpoint = self.default_setpoint;
        if let Some(sp) = self.find_switchpoint(self.clock.now()) {
            if sp.setpoint != setpoint {
                (self.setpoint_changed)(setpoint, sp.setpoint);
            }
            setpoint = sp.setpoint;
        }

        let mut ticker = (self.new_ticker)();
        tokio::spawn(async move {
            loop {
                // Tick first: a pending schedule switch applies before
                // the delta for a simultaneously pending count.
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    t = ticker.recv() => {
                        let new = self
                            .find_switchpoint(t)
                            .map_or(self.default_setpoint, |sp| sp.setpoint);
                        if new != setpoint {
                            (self.setpoint_changed)(setpoint, new);
                            setpoint = new;
                        }
                    }
                    count = counts.recv() => {
                        let Some(count) = count else { break };
                        let diff = i64::from(setpoint) - i64::from(count.ghost);
                        if delta_tx.send(diff).await.is_err() {
                            break;
                        }
                    }
                }
            }
            ticker.stop();
        });
        delta_rx
    }
}

/// Samples a function of time to derive the ghost target.
///
/// The target starts at 0 and follows the most recent sample; deltas
/// are emitted per count observation, as with the other controllers.
pub struct TimedFunctionController {
    f: Box<dyn Fn(SystemTime) -> u32 + Send>,
    new_ticker: TickerFactory,
    setpoint_changed: Box<dyn Fn(u32) + Send>,
}

impl TimedFunctionController {
    pub fn new(f: impl Fn(SystemTime) -> u32 + Send + 'static, resolution: Duration) -> Self {
        Self {
            f: Box::new(f),
            new_ticker: Arc::new(move || Ticker::every(resolution)),
            setpoint_changed: Box::new(|new_target| {
                info!(new_target, "timed function controller target change");
            }),
        }
    }

    pub fn with_ticker(mut self, new_ticker: TickerFactory) -> Self {
        self.new_ticker = new_ticker;
        self
    }

    pub fn with_setpoint_changed(mut self, callback: impl Fn(u32) + Send + 'static) -> Self {
        self.setpoint_changed = Box::new(callback);
        self
    }
}

impl Controller for TimedFunctionController {
    fn control(
        self: Box<Self>,
        mut shutdown: watch::Receiver<bool>,
        mut counts: mpsc::Receiver<WorkspaceCount>,
    ) -> mpsc::Receiver<i64> {
        let (delta_tx, delta_rx) = mpsc::channel(1);
        let mut ticker = (self.new_ticker)();
        tokio::spawn(async move {
            let mut target = 0u32;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    t = ticker.recv() => {
                        target = (self.f)(t);
                        (self.setpoint_changed)(target);
                    }
                    count = counts.recv() => {
                        let Some(count) = count else { break };
                        let diff = i64::from(target) - i64::from(count.ghost);
                        if delta_tx.send(diff).await.is_err() {
                            break;
                        }
                    }
                }
            }
            ticker.stop();
        });
        delta_rx
    }
}

/// A sample produced by [`render_setpoint_over_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetpointInTime {
    pub t: SystemTime,
    pub setpoint: u32,
}

/// Sample a setpoint function from `start` (inclusive) to `end`
/// (exclusive) at `resolution`, e.g. to preview a schedule.
pub fn render_setpoint_over_time(
    f: impl Fn(SystemTime) -> u32,
    start: SystemTime,
    end: SystemTime,
    resolution: Duration,
) -> Vec<SetpointInTime> {
    let mut samples = Vec::new();
    if resolution.is_zero() {
        return samples;
    }
    let mut t = start;
    while t < end {
        samples.push(SetpointInTime { t, setpoint: f(t) });
        t += resolution;
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::handover;
    use ghostpool_core::{ManualClock, SwitchedConstantConfig};
    use std::time::UNIX_EPOCH;

    fn count(ghost: u32) -> WorkspaceCount {
        WorkspaceCount {
            ghost,
            ..WorkspaceCount::default()
        }
    }

    fn tod(h: u32, m: u32, s: u32) -> TimeOfDay {
        TimeOfDay::new(h, m, s).unwrap()
    }

    /// Timestamp on day zero with the given time of day.
    fn at(h: u32) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(u64::from(h) * 3600)
    }

    fn switchpoints() -> Vec<SwitchedSetpoint> {
        vec![
            SwitchedSetpoint { time: tod(8, 0, 0), setpoint: 10 },
            SwitchedSetpoint { time: tod(12, 0, 0), setpoint: 5 },
            SwitchedSetpoint { time: tod(18, 0, 0), setpoint: 1 },
        ]
    }

    async fn expect_delta(
        counts: &mpsc::Sender<WorkspaceCount>,
        deltas: &mut mpsc::Receiver<i64>,
        ghost: u32,
        expected: i64,
    ) {
        counts.send(count(ghost)).await.unwrap();
        assert_eq!(deltas.recv().await, Some(expected));
    }

    #[tokio::test]
    async fn constant_controller_tracks_target() {
        for (target, steps) in [
            (0u32, vec![(0u32, 0i64), (10, -10)]),
            (10, vec![(0, 10), (10, 0), (5, 5)]),
        ] {
            let (counts_tx, counts_rx) = mpsc::channel(1);
            let (_shutdown_tx, shutdown_rx) = watch::channel(false);
            let controller = Box::new(ConstantSetpointController { target });
            let mut deltas = controller.control(shutdown_rx, counts_rx);

            for (ghost, expected) in steps {
                expect_delta(&counts_tx, &mut deltas, ghost, expected).await;
            }
        }
    }

    #[tokio::test]
    async fn constant_controller_closes_deltas_on_shutdown() {
        let (_counts_tx, counts_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let controller = Box::new(ConstantSetpointController { target: 3 });
        let mut deltas = controller.control(shutdown_rx, counts_rx);

        shutdown_tx.send(true).unwrap();
        assert_eq!(deltas.recv().await, None);
    }

    #[test]
    fn find_switchpoint_resolves_schedule() {
        let controller = SwitchedSetpointController::new(2, switchpoints());

        // Before the first switch of the day.
        assert!(controller.find_switchpoint(at(5)).is_none());
        // Exact match hits the entry.
        assert_eq!(controller.find_switchpoint(at(8)).unwrap().setpoint, 10);
        // Between switches the earlier one is active.
        assert_eq!(controller.find_switchpoint(at(9)).unwrap().setpoint, 10);
        assert_eq!(controller.find_switchpoint(at(13)).unwrap().setpoint, 5);
        // After the last switch.
        assert_eq!(controller.find_switchpoint(at(19)).unwrap().setpoint, 1);
        // The next day wraps around to the schedule start.
        assert!(controller.find_switchpoint(at(24 + 5)).is_none());
    }

    #[test]
    fn find_switchpoint_with_empty_schedule() {
        let controller = SwitchedSetpointController::new(2, Vec::new());
        assert!(controller.find_switchpoint(at(9)).is_none());
    }

    #[test]
    fn switchpoints_are_sorted_at_construction() {
        let mut unsorted = switchpoints();
        unsorted.reverse();
        let controller = SwitchedSetpointController::new(2, unsorted);
        assert_eq!(controller.find_switchpoint(at(9)).unwrap().setpoint, 10);
    }

    #[tokio::test]
    async fn switched_controller_follows_schedule() {
        let (tick_tx, ticker) = Ticker::manual();
        let controller = Box::new(
            SwitchedSetpointController::new(2, switchpoints())
                .with_ticker(handover(ticker))
                .with_clock(Arc::new(ManualClock::new(at(0)))),
        );

        let (counts_tx, counts_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut deltas = controller.control(shutdown_rx, counts_rx);

        // (tick hour, expected active setpoint); ghost count stays 0 so
        // the delta equals the active setpoint.
        for (hour, expected) in [(5, 2i64), (9, 10), (12, 5), (19, 1), (24 + 5, 2)] {
            tick_tx.send(at(hour)).await.unwrap();
            expect_delta(&counts_tx, &mut deltas, 0, expected).await;
        }
    }

    #[tokio::test]
    async fn switched_controller_reports_changes_only() {
        let (tick_tx, ticker) = Ticker::manual();
        let (changes_tx, mut changes_rx) = mpsc::unbounded_channel();
        let controller = Box::new(
            SwitchedSetpointController::new(2, switchpoints())
                .with_ticker(handover(ticker))
                .with_clock(Arc::new(ManualClock::new(at(0))))
                .with_setpoint_changed(move |old, new| {
                    changes_tx.send((old, new)).unwrap();
                }),
        );

        let (counts_tx, counts_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut deltas = controller.control(shutdown_rx, counts_rx);

        // 05:00 keeps the default, 09:00 switches to 10, 10:00 is
        // unchanged, 12:00 switches to 5.
        for hour in [5, 9, 10, 12] {
            tick_tx.send(at(hour)).await.unwrap();
        }
        expect_delta(&counts_tx, &mut deltas, 0, 5).await;

        assert_eq!(changes_rx.try_recv().unwrap(), (2, 10));
        assert_eq!(changes_rx.try_recv().unwrap(), (10, 5));
        assert!(changes_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn timed_function_controller_samples_target() {
        let epoch_2020 = UNIX_EPOCH + Duration::from_secs(1_577_836_800);
        let f = move |t: SystemTime| {
            t.duration_since(epoch_2020).unwrap_or_default().as_secs() as u32
        };

        let (tick_tx, ticker) = Ticker::manual();
        let (targets_tx, mut targets_rx) = mpsc::unbounded_channel();
        let controller = Box::new(
            TimedFunctionController::new(f, Duration::from_secs(60))
                .with_ticker(handover(ticker))
                .with_setpoint_changed(move |target| {
                    targets_tx.send(target).unwrap();
                }),
        );

        let (counts_tx, counts_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut deltas = controller.control(shutdown_rx, counts_rx);

        for (hour, expected) in [(5u64, 18_000u32), (6, 21_600), (7, 25_200), (8, 28_800)] {
            tick_tx
                .send(epoch_2020 + Duration::from_secs(hour * 3600))
                .await
                .unwrap();
            assert_eq!(targets_rx.recv().await, Some(expected));
        }

        // Deltas use the most recently sampled target.
        expect_delta(&counts_tx, &mut deltas, 300, 28_800 - 300).await;
    }

    #[tokio::test]
    async fn timed_function_target_starts_at_zero() {
        let controller = Box::new(
            TimedFunctionController::new(|_| 42, Duration::from_secs(60))
                .with_ticker(Arc::new(Ticker::idle)),
        );

        let (counts_tx, counts_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut deltas = controller.control(shutdown_rx, counts_rx);

        expect_delta(&counts_tx, &mut deltas, 4, -4).await;
    }

    #[tokio::test]
    async fn factory_builds_configured_kind() {
        let config: ControllerConfig = serde_json::from_str(
            r#"{ "kind": "constant", "constant": { "setpoint": 7 } }"#,
        )
        .unwrap();
        let controller = controller_from_config(&config);

        let (counts_tx, counts_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut deltas = controller.control(shutdown_rx, counts_rx);
        expect_delta(&counts_tx, &mut deltas, 2, 5).await;

        let switched = ControllerConfig {
            kind: ControllerKind::SwitchedConstant,
            constant: Default::default(),
            switched_constant: SwitchedConstantConfig {
                default_setpoint: 3,
                setpoints: switchpoints(),
            },
        };
        // Builds without panicking; behavior is covered above.
        let _ = controller_from_config(&switched);
    }

    #[test]
    fn render_samples_the_range() {
        let start = UNIX_EPOCH;
        let end = UNIX_EPOCH + Duration::from_secs(300);
        let samples = render_setpoint_over_time(
            |t| TimeOfDay::from_timestamp(t).seconds() / 60,
            start,
            end,
            Duration::from_secs(60),
        );

        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0], SetpointInTime { t: start, setpoint: 0 });
        assert_eq!(samples[4].setpoint, 4);
    }

    #[test]
    fn render_with_zero_resolution_is_empty() {
        let samples =
            render_setpoint_over_time(|_| 1, UNIX_EPOCH, at(1), Duration::ZERO);
        assert!(samples.is_empty());
    }
}
