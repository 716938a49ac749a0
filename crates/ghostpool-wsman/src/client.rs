//! Raw gRPC client for the workspace manager, narrowed to the calls the
//! prescaler uses.

use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{IntoRequest, Response, Status, Streaming};

use crate::api::{
    GetWorkspacesRequest, GetWorkspacesResponse, StartWorkspaceRequest, StartWorkspaceResponse,
    StopWorkspaceRequest, StopWorkspaceResponse, SubscribeRequest, SubscribeResponse,
};

/// Client for the subset of the `WorkspaceManager` service the
/// prescaler consumes.
#[derive(Debug, Clone)]
pub struct WorkspaceManagerClient {
    inner: tonic::client::Grpc<Channel>,
}

impl WorkspaceManagerClient {
    /// Connect to the workspace manager, e.g. `"http://ws-manager:8080"`.
    pub async fn connect(addr: &str) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(addr.to_string())?.connect().await?;
        Ok(Self::new(channel))
    }

    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// One-shot inventory of all workspaces the manager knows about.
    pub async fn get_workspaces(
        &mut self,
        request: GetWorkspacesRequest,
    ) -> Result<Response<GetWorkspacesResponse>, Status> {
        self.ready().await?;
        let codec: ProstCodec<GetWorkspacesRequest, GetWorkspacesResponse> = ProstCodec::default();
        let path = PathAndQuery::from_static("/wsman.WorkspaceManager/GetWorkspaces");
        self.inner.unary(request.into_request(), path, codec).await
    }

    /// Server-streaming subscription to workspace status events.
    pub async fn subscribe(
        &mut self,
        request: SubscribeRequest,
    ) -> Result<Response<Streaming<SubscribeResponse>>, Status> {
        self.ready().await?;
        let codec: ProstCodec<SubscribeRequest, SubscribeResponse> = ProstCodec::default();
        let path = PathAndQuery::from_static("/wsman.WorkspaceManager/Subscribe");
        self.inner
            .server_streaming(request.into_request(), path, codec)
            .await
    }

    pub async fn start_workspace(
        &mut self,
        request: StartWorkspaceRequest,
    ) -> Result<Response<StartWorkspaceResponse>, Status> {
        self.ready().await?;
        let codec: ProstCodec<StartWorkspaceRequest, StartWorkspaceResponse> =
            ProstCodec::default();
        let path = PathAndQuery::from_static("/wsman.WorkspaceManager/StartWorkspace");
        self.inner.unary(request.into_request(), path, codec).await
    }

    pub async fn stop_workspace(
        &mut self,
        request: StopWorkspaceRequest,
    ) -> Result<Response<StopWorkspaceResponse>, Status> {
        self.ready().await?;
        let codec: ProstCodec<StopWorkspaceRequest, StopWorkspaceResponse> = ProstCodec::default();
        let path = PathAndQuery::from_static("/wsman.WorkspaceManager/StopWorkspace");
        self.inner.unary(request.into_request(), path, codec).await
    }

    async fn ready(&mut self) -> Result<(), Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("service was not ready: {e}")))
    }
}
