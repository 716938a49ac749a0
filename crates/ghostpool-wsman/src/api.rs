//! Wire types for the workspace-manager service.
//!
//! The service is owned by the workspace manager; this module maintains
//! prost stubs (in generated style) for the four calls the prescaler
//! consumes, so the build carries no protoc dependency for an API it
//! does not define.

/// A workspace as reported by `GetWorkspaces` and subscription events.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkspaceStatus {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub metadata: Option<WorkspaceMetadata>,
    #[prost(message, optional, tag = "3")]
    pub spec: Option<WorkspaceSpec>,
    #[prost(enumeration = "WorkspacePhase", tag = "4")]
    pub phase: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkspaceMetadata {
    #[prost(string, tag = "1")]
    pub meta_id: String,
    #[prost(string, tag = "2")]
    pub owner: String,
    #[prost(message, optional, tag = "3")]
    pub started_at: Option<::prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkspaceSpec {
    #[prost(enumeration = "WorkspaceType", tag = "1")]
    pub r#type: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetWorkspacesRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetWorkspacesResponse {
    #[prost(message, repeated, tag = "1")]
    pub status: Vec<WorkspaceStatus>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeResponse {
    #[prost(message, optional, tag = "1")]
    pub status: Option<WorkspaceStatus>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartWorkspaceRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub service_prefix: String,
    #[prost(message, optional, tag = "3")]
    pub metadata: Option<WorkspaceMetadata>,
    #[prost(message, optional, tag = "4")]
    pub spec: Option<StartWorkspaceSpec>,
    #[prost(enumeration = "WorkspaceType", tag = "5")]
    pub r#type: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartWorkspaceSpec {
    #[prost(enumeration = "AdmissionLevel", tag = "1")]
    pub admission: i32,
    #[prost(string, tag = "2")]
    pub timeout: String,
    #[prost(string, tag = "3")]
    pub checkout_location: String,
    #[prost(string, tag = "4")]
    pub workspace_location: String,
    #[prost(enumeration = "WorkspaceFeatureFlag", repeated, tag = "5")]
    pub feature_flags: Vec<i32>,
    #[prost(message, optional, tag = "6")]
    pub git: Option<GitSpec>,
    #[prost(string, tag = "7")]
    pub ide_image: String,
    #[prost(string, tag = "8")]
    pub workspace_image: String,
    #[prost(message, optional, tag = "9")]
    pub initializer: Option<WorkspaceInitializer>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GitSpec {
    #[prost(string, tag = "1")]
    pub email: String,
    #[prost(string, tag = "2")]
    pub username: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkspaceInitializer {
    #[prost(oneof = "workspace_initializer::Spec", tags = "1")]
    pub spec: Option<workspace_initializer::Spec>,
}

/// Nested message and enum types in `WorkspaceInitializer`.
pub mod workspace_initializer {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Spec {
        #[prost(message, tag = "1")]
        Empty(super::EmptyInitializer),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EmptyInitializer {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartWorkspaceResponse {
    #[prost(string, tag = "1")]
    pub url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopWorkspaceRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(enumeration = "StopWorkspacePolicy", tag = "2")]
    pub policy: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopWorkspaceResponse {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WorkspaceType {
    Regular = 0,
    Prebuild = 1,
    Ghost = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WorkspacePhase {
    Unknown = 0,
    Pending = 1,
    Creating = 2,
    Initializing = 3,
    Running = 4,
    Interrupted = 5,
    Stopping = 6,
    Stopped = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AdmissionLevel {
    AdmitOwnerOnly = 0,
    AdmitEveryone = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WorkspaceFeatureFlag {
    Noop = 0,
    RegistryFacade = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum StopWorkspacePolicy {
    Normally = 0,
    Immediately = 1,
}
