//! Typed boundary to the VM-control backend.
//!
//! One method per backend capability. Implementations do no retrying and no
//! interpretation of failures: every error is a `BackendError` carrying the
//! backend's own message.

pub mod qemu;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::model::{Space, VmConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskImageRequest {
    pub path: PathBuf,
    pub size_gb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRef {
    pub id: String,
}

impl VmRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRequest {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneRequest {
    pub id: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub id: String,
    pub delete_disk: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub id: String,
    pub name: String,
}

impl SnapshotRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[allow(async_fn_in_trait)] // controllers are generic over the gateway, never boxed
pub trait CommandGateway {
    async fn check_backend(&self) -> Result<bool, BackendError>;
    async fn install_backend(&self) -> Result<String, BackendError>;

    async fn list_spaces(&self) -> Result<Vec<Space>, BackendError>;
    async fn list_vms(&self) -> Result<Vec<VmConfig>, BackendError>;

    async fn create_space(&self, space: &Space) -> Result<(), BackendError>;
    async fn create_disk_image(&self, req: &DiskImageRequest) -> Result<(), BackendError>;
    async fn create_vm(&self, config: &VmConfig) -> Result<(), BackendError>;

    /// Returns the display port allocated for the running VM.
    async fn start_vm(&self, req: &VmRef) -> Result<u16, BackendError>;
    async fn stop_vm(&self, req: &VmRef) -> Result<(), BackendError>;
    async fn open_display(&self, req: &DisplayRequest) -> Result<(), BackendError>;

    async fn update_vm(&self, config: &VmConfig) -> Result<(), BackendError>;
    /// Duplicates the VM's backend resources and returns the new record.
    async fn clone_vm(&self, req: &CloneRequest) -> Result<VmConfig, BackendError>;
    async fn delete_vm(&self, req: &DeleteRequest) -> Result<(), BackendError>;

    async fn list_snapshots(&self, req: &VmRef) -> Result<Vec<String>, BackendError>;
    async fn create_snapshot(&self, req: &SnapshotRequest) -> Result<(), BackendError>;
    async fn restore_snapshot(&self, req: &SnapshotRequest) -> Result<(), BackendError>;
    async fn delete_snapshot(&self, req: &SnapshotRequest) -> Result<(), BackendError>;
}
