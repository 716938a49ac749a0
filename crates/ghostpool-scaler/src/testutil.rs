//! Scripted workspace-manager double shared by the scaler tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use ghostpool_core::{Ticker, TickerFactory, WorkspacePhase, WorkspaceType};
use ghostpool_wsman::{
    EventStream, WorkspaceDescription, WorkspaceEvent, WorkspaceManager, WsmanError,
};

/// A call the fake has recorded, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Start { instance_id: String, meta_id: String },
    Stop { id: String },
}

#[derive(Default)]
struct Inner {
    workspaces: Vec<WorkspaceDescription>,
    events: VecDeque<WorkspaceEvent>,
    subscription_ends: bool,
    calls: Vec<FakeCall>,
    fail_starts: bool,
    fail_stops: bool,
}

/// In-memory workspace manager: serves a fixed inventory, replays
/// queued subscription events (queue them before running), and records
/// every start/stop call.
#[derive(Clone, Default)]
pub struct FakeWorkspaceManager {
    inner: Arc<Mutex<Inner>>,
}

impl FakeWorkspaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_workspace(&self, ws: WorkspaceDescription) {
        self.inner.lock().unwrap().workspaces.push(ws);
    }

    pub fn push_event(&self, event: WorkspaceEvent) {
        self.inner.lock().unwrap().events.push_back(event);
    }

    /// End the subscription stream once the queued events are drained;
    /// without this, a drained stream parks instead.
    pub fn end_subscription(&self) {
        self.inner.lock().unwrap().subscription_ends = true;
    }

    /// Make every subsequent `start_ghost` call fail.
    pub fn fail_starts(&self) {
        self.inner.lock().unwrap().fail_starts = true;
    }

    /// Make every subsequent `stop_ghost` call fail.
    pub fn fail_stops(&self) {
        self.inner.lock().unwrap().fail_stops = true;
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Number of recorded start calls.
    pub fn starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, FakeCall::Start { .. }))
            .count()
    }

    /// Ids of recorded stop calls, in issue order.
    pub fn stops(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                FakeCall::Stop { id } => Some(id),
                FakeCall::Start { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl WorkspaceManager for FakeWorkspaceManager {
    type Events = FakeEventStream;

    async fn list_workspaces(&mut self) -> Result<Vec<WorkspaceDescription>, WsmanError> {
        Ok(self.inner.lock().unwrap().workspaces.clone())
    }

    async fn subscribe(&mut self) -> Result<FakeEventStream, WsmanError> {
        Ok(FakeEventStream {
            inner: Arc::clone(&self.inner),
        })
    }

    async fn start_ghost(&mut self, instance_id: &str, meta_id: &str) -> Result<(), WsmanError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_starts {
            return Err(WsmanError::Rpc(tonic::Status::unavailable(
                "injected start failure",
            )));
        }
        inner.calls.push(FakeCall::Start {
            instance_id: instance_id.to_string(),
            meta_id: meta_id.to_string(),
        });
        Ok(())
    }

    async fn stop_ghost(&mut self, id: &str) -> Result<(), WsmanError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_stops {
            return Err(WsmanError::Rpc(tonic::Status::unavailable(
                "injected stop failure",
            )));
        }
        inner.calls.push(FakeCall::Stop { id: id.to_string() });
        Ok(())
    }
}

pub struct FakeEventStream {
    inner: Arc<Mutex<Inner>>,
}

#[async_trait]
impl EventStream for FakeEventStream {
    async fn recv(&mut self) -> Result<Option<WorkspaceEvent>, WsmanError> {
        enum Next {
            Event(WorkspaceEvent),
            End,
            Park,
        }
        let next = {
            let mut inner = self.inner.lock().unwrap();
            match inner.events.pop_front() {
                Some(event) => Next::Event(event),
                None if inner.subscription_ends => Next::End,
                None => Next::Park,
            }
        };
        match next {
            Next::Event(event) => Ok(Some(event)),
            Next::End => Ok(None),
            Next::Park => std::future::pending().await,
        }
    }
}

/// Ticker factory handing out a pre-built (usually manual) ticker
/// exactly once.
pub fn handover(ticker: Ticker) -> TickerFactory {
    let ticker = Mutex::new(Some(ticker));
    Arc::new(move || ticker.lock().unwrap().take().expect("single run"))
}

pub fn workspace(id: &str, kind: WorkspaceType, started_at: SystemTime) -> WorkspaceDescription {
    WorkspaceDescription {
        id: id.to_string(),
        kind,
        started_at,
    }
}

pub fn ghost(id: &str, started_at: SystemTime) -> WorkspaceDescription {
    workspace(id, WorkspaceType::Ghost, started_at)
}

pub fn pending_event(ws: WorkspaceDescription) -> WorkspaceEvent {
    WorkspaceEvent {
        id: ws.id,
        phase: WorkspacePhase::Pending,
        kind: ws.kind,
        started_at: ws.started_at,
    }
}

pub fn stopped_event(id: &str) -> WorkspaceEvent {
    WorkspaceEvent {
        id: id.to_string(),
        phase: WorkspacePhase::Stopped,
        kind: WorkspaceType::Ghost,
        started_at: UNIX_EPOCH,
    }
}
