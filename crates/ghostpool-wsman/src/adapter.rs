//! The capability seam between the prescaler and the workspace manager.
//!
//! The driver is generic over [`WorkspaceManager`], so tests can swap in
//! a scripted double while production runs [`GrpcWorkspaceManager`]
//! against the real service.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::time::timeout;
use tonic::{Code, Response, Status, Streaming};
use tracing::warn;

use ghostpool_core::types::WorkspaceId;
use ghostpool_core::{ScalerConfig, WorkspacePhase, WorkspaceType};

use crate::api;
use crate::client::WorkspaceManagerClient;
use crate::error::WsmanError;

/// How long any single workspace-manager call may take.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(15);

/// A workspace as reported by the manager's inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceDescription {
    pub id: WorkspaceId,
    pub kind: WorkspaceType,
    pub started_at: SystemTime,
}

/// A status-change event from the manager's subscription stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEvent {
    pub id: WorkspaceId,
    pub phase: WorkspacePhase,
    pub kind: WorkspaceType,
    pub started_at: SystemTime,
}

/// The narrow capability set the prescale driver needs from the
/// workspace manager.
#[async_trait]
pub trait WorkspaceManager: Send + 'static {
    type Events: EventStream;

    /// One-shot inventory of all running workspaces.
    async fn list_workspaces(&mut self) -> Result<Vec<WorkspaceDescription>, WsmanError>;

    /// Open the status-event subscription.
    async fn subscribe(&mut self) -> Result<Self::Events, WsmanError>;

    /// Ask the manager to start one ghost workspace under the given
    /// fresh instance/meta id pair.
    async fn start_ghost(&mut self, instance_id: &str, meta_id: &str) -> Result<(), WsmanError>;

    /// Ask the manager to stop a ghost. A ghost that is already gone
    /// counts as stopped.
    async fn stop_ghost(&mut self, id: &str) -> Result<(), WsmanError>;
}

/// Server-streaming subscription of workspace status events.
#[async_trait]
pub trait EventStream: Send {
    /// Next event; `Ok(None)` when the stream ends.
    async fn recv(&mut self) -> Result<Option<WorkspaceEvent>, WsmanError>;
}

/// Fixed identity and image set stamped onto every ghost start request.
#[derive(Debug, Clone)]
pub struct GhostTemplate {
    pub owner: String,
    pub workspace_image: String,
    pub ide_image: String,
}

impl GhostTemplate {
    pub fn from_config(config: &ScalerConfig) -> Self {
        Self {
            owner: config.effective_ghost_owner().to_string(),
            workspace_image: config.workspace_image.clone(),
            ide_image: config.ide_image.clone(),
        }
    }
}

/// Production adapter backed by the gRPC client. Every call is bounded
/// by [`RPC_TIMEOUT`].
#[derive(Debug, Clone)]
pub struct GrpcWorkspaceManager {
    client: WorkspaceManagerClient,
    template: GhostTemplate,
}

impl GrpcWorkspaceManager {
    pub async fn connect(addr: &str, template: GhostTemplate) -> Result<Self, WsmanError> {
        Ok(Self {
            client: WorkspaceManagerClient::connect(addr).await?,
            template,
        })
    }

    pub fn new(client: WorkspaceManagerClient, template: GhostTemplate) -> Self {
        Self { client, template }
    }
}

#[async_trait]
impl WorkspaceManager for GrpcWorkspaceManager {
    type Events = GrpcEventStream;

    async fn list_workspaces(&mut self) -> Result<Vec<WorkspaceDescription>, WsmanError> {
        let response = bounded(self.client.get_workspaces(api::GetWorkspacesRequest {})).await?;
        Ok(response
            .into_inner()
            .status
            .into_iter()
            .map(describe_workspace)
            .collect())
    }

    async fn subscribe(&mut self) -> Result<GrpcEventStream, WsmanError> {
        let response = bounded(self.client.subscribe(api::SubscribeRequest {})).await?;
        Ok(GrpcEventStream {
            stream: response.into_inner(),
        })
    }

    async fn start_ghost(&mut self, instance_id: &str, meta_id: &str) -> Result<(), WsmanError> {
        let request = ghost_start_request(instance_id, meta_id, &self.template);
        bounded(self.client.start_workspace(request)).await?;
        Ok(())
    }

    async fn stop_ghost(&mut self, id: &str) -> Result<(), WsmanError> {
        let request = api::StopWorkspaceRequest {
            id: id.to_string(),
            policy: api::StopWorkspacePolicy::Normally as i32,
        };
        let result = timeout(RPC_TIMEOUT, self.client.stop_workspace(request))
            .await
            .map_err(|_| WsmanError::Timeout(RPC_TIMEOUT))?;
        swallow_not_found(result)
    }
}

/// Run `call` under the per-call deadline.
async fn bounded<T>(
    call: impl Future<Output = Result<Response<T>, Status>>,
) -> Result<Response<T>, WsmanError> {
    match timeout(RPC_TIMEOUT, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(WsmanError::Timeout(RPC_TIMEOUT)),
    }
}

/// `NOT_FOUND` on stop means the workspace is already gone, which is the
/// outcome we asked for.
fn swallow_not_found<T>(result: Result<Response<T>, Status>) -> Result<(), WsmanError> {
    match result {
        Ok(_) => Ok(()),
        Err(status) if status.code() == Code::NotFound => Ok(()),
        Err(status) => Err(WsmanError::Rpc(status)),
    }
}

/// The subscription stream of the gRPC adapter.
pub struct GrpcEventStream {
    stream: Streaming<api::SubscribeResponse>,
}

#[async_trait]
impl EventStream for GrpcEventStream {
    async fn recv(&mut self) -> Result<Option<WorkspaceEvent>, WsmanError> {
        loop {
            match self.stream.message().await? {
                None => return Ok(None),
                Some(response) => match response.status {
                    Some(status) => return Ok(Some(event_from_status(status))),
                    None => continue,
                },
            }
        }
    }
}

/// Build the fixed start request for one ghost workspace.
fn ghost_start_request(
    instance_id: &str,
    meta_id: &str,
    template: &GhostTemplate,
) -> api::StartWorkspaceRequest {
    api::StartWorkspaceRequest {
        id: instance_id.to_string(),
        service_prefix: instance_id.to_string(),
        metadata: Some(api::WorkspaceMetadata {
            meta_id: meta_id.to_string(),
            owner: template.owner.clone(),
            started_at: None,
        }),
        spec: Some(api::StartWorkspaceSpec {
            admission: api::AdmissionLevel::AdmitOwnerOnly as i32,
            timeout: "60m".to_string(),
            checkout_location: "none".to_string(),
            workspace_location: "none".to_string(),
            feature_flags: vec![api::WorkspaceFeatureFlag::RegistryFacade as i32],
            git: Some(api::GitSpec {
                email: "none@gitpod.io".to_string(),
                username: "gitpod-ghost".to_string(),
            }),
            ide_image: template.ide_image.clone(),
            workspace_image: template.workspace_image.clone(),
            initializer: Some(api::WorkspaceInitializer {
                spec: Some(api::workspace_initializer::Spec::Empty(
                    api::EmptyInitializer {},
                )),
            }),
        }),
        r#type: api::WorkspaceType::Ghost as i32,
    }
}

fn describe_workspace(status: api::WorkspaceStatus) -> WorkspaceDescription {
    let started_at = started_at_or_now(&status);
    WorkspaceDescription {
        kind: kind_from_wire(&status),
        started_at,
        id: status.id,
    }
}

fn event_from_status(status: api::WorkspaceStatus) -> WorkspaceEvent {
    let started_at = started_at_or_now(&status);
    WorkspaceEvent {
        phase: phase_from_wire(status.phase),
        kind: kind_from_wire(&status),
        started_at,
        id: status.id,
    }
}

/// Extract `metadata.started_at`; a missing or unconvertible timestamp
/// falls back to the current wall time (logged, not dropped).
fn started_at_or_now(status: &api::WorkspaceStatus) -> SystemTime {
    let converted = status
        .metadata
        .as_ref()
        .and_then(|m| m.started_at.clone())
        .and_then(|ts| SystemTime::try_from(ts).ok());
    match converted {
        Some(t) => t,
        None => {
            let metadata = status.metadata.as_ref();
            warn!(
                instance_id = %status.id,
                meta_id = metadata.map(|m| m.meta_id.as_str()).unwrap_or_default(),
                owner = metadata.map(|m| m.owner.as_str()).unwrap_or_default(),
                "cannot convert startedAt timestamp, assuming now"
            );
            SystemTime::now()
        }
    }
}

fn kind_from_wire(status: &api::WorkspaceStatus) -> WorkspaceType {
    let wire = status.spec.as_ref().map(|s| s.r#type).unwrap_or_default();
    match api::WorkspaceType::try_from(wire) {
        Ok(api::WorkspaceType::Prebuild) => WorkspaceType::Prebuild,
        Ok(api::WorkspaceType::Ghost) => WorkspaceType::Ghost,
        Ok(api::WorkspaceType::Regular) | Err(_) => WorkspaceType::Regular,
    }
}

fn phase_from_wire(wire: i32) -> WorkspacePhase {
    match api::WorkspacePhase::try_from(wire) {
        Ok(api::WorkspacePhase::Pending) => WorkspacePhase::Pending,
        Ok(api::WorkspacePhase::Creating) => WorkspacePhase::Creating,
        Ok(api::WorkspacePhase::Initializing) => WorkspacePhase::Initializing,
        Ok(api::WorkspacePhase::Running) => WorkspacePhase::Running,
        Ok(api::WorkspacePhase::Interrupted) => WorkspacePhase::Interrupted,
        Ok(api::WorkspacePhase::Stopping) => WorkspacePhase::Stopping,
        Ok(api::WorkspacePhase::Stopped) => WorkspacePhase::Stopped,
        Ok(api::WorkspacePhase::Unknown) | Err(_) => WorkspacePhase::Unknown,
    }
}
