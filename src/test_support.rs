//! Scriptable in-memory gateway for exercising the controllers.
//!
//! `FakeGateway` keeps a tiny backend model (spaces, VM records, snapshot
//! lists), records every call, fails any operation on request, and can hold
//! an operation open until the test releases it, which is how interleavings
//! across await points are reproduced.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::BackendError;
use crate::gateway::{
    CloneRequest, CommandGateway, DeleteRequest, DiskImageRequest, DisplayRequest,
    SnapshotRequest, VmRef,
};
use crate::model::{Power, Space, VmConfig, VmStatus};
use crate::store::StoreHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CheckBackend,
    InstallBackend,
    ListSpaces,
    ListVms,
    CreateSpace,
    CreateDiskImage,
    CreateVm,
    StartVm,
    StopVm,
    OpenDisplay,
    UpdateVm,
    CloneVm,
    DeleteVm,
    ListSnapshots,
    CreateSnapshot,
    RestoreSnapshot,
    DeleteSnapshot,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Op>,
    failures: HashMap<Op, String>,
    holds: HashMap<Op, oneshot::Receiver<()>>,
    next_port: u16,
    disks: Vec<DiskImageRequest>,
    displays: Vec<u16>,
    spaces: Vec<Space>,
    vms: Vec<VmConfig>,
    snapshots: HashMap<String, Vec<String>>,
}

pub struct FakeGateway {
    state: Mutex<FakeState>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_port: 5900,
                ..FakeState::default()
            }),
        }
    }

    /// Make every later call of `op` fail with `message`.
    pub fn fail(&self, op: Op, message: &str) {
        self.state.lock().unwrap().failures.insert(op, message.into());
    }

    pub fn succeed(&self, op: Op) {
        self.state.lock().unwrap().failures.remove(&op);
    }

    /// Suspend the next call of `op` until the returned sender fires
    /// (or is dropped).
    pub fn hold(&self, op: Op) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().unwrap().holds.insert(op, rx);
        tx
    }

    pub fn set_next_port(&self, port: u16) {
        self.state.lock().unwrap().next_port = port;
    }

    pub fn calls(&self) -> Vec<Op> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }

    pub fn disks(&self) -> Vec<DiskImageRequest> {
        self.state.lock().unwrap().disks.clone()
    }

    pub fn displays(&self) -> Vec<u16> {
        self.state.lock().unwrap().displays.clone()
    }

    pub fn backend_vms(&self) -> Vec<VmConfig> {
        self.state.lock().unwrap().vms.clone()
    }

    pub fn add_space(&self, space: Space) {
        self.state.lock().unwrap().spaces.push(space);
    }

    pub fn add_vm(&self, vm: VmConfig) {
        self.state.lock().unwrap().vms.push(vm);
    }

    pub fn set_snapshots(&self, vm_id: &str, names: &[&str]) {
        self.state.lock().unwrap().snapshots.insert(
            vm_id.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
    }

    async fn enter(&self, op: Op) -> Result<(), BackendError> {
        let hold = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(op);
            state.holds.remove(&op)
        };
        if let Some(rx) = hold {
            let _ = rx.await;
        }
        match self.state.lock().unwrap().failures.get(&op) {
            Some(message) => Err(BackendError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn with_vm<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut VmConfig) -> R,
    ) -> Result<R, BackendError> {
        let mut state = self.state.lock().unwrap();
        state
            .vms
            .iter_mut()
            .find(|v| v.id == id)
            .map(f)
            .ok_or_else(|| BackendError::new("VM not found"))
    }
}

impl CommandGateway for FakeGateway {
    async fn check_backend(&self) -> Result<bool, BackendError> {
        self.enter(Op::CheckBackend).await?;
        Ok(true)
    }

    async fn install_backend(&self) -> Result<String, BackendError> {
        self.enter(Op::InstallBackend).await?;
        Ok("installed".into())
    }

    async fn list_spaces(&self) -> Result<Vec<Space>, BackendError> {
        self.enter(Op::ListSpaces).await?;
        Ok(self.state.lock().unwrap().spaces.clone())
    }

    async fn list_vms(&self) -> Result<Vec<VmConfig>, BackendError> {
        self.enter(Op::ListVms).await?;
        Ok(self.state.lock().unwrap().vms.clone())
    }

    async fn create_space(&self, space: &Space) -> Result<(), BackendError> {
        self.enter(Op::CreateSpace).await?;
        self.state.lock().unwrap().spaces.push(space.clone());
        Ok(())
    }

    async fn create_disk_image(&self, req: &DiskImageRequest) -> Result<(), BackendError> {
        self.enter(Op::CreateDiskImage).await?;
        self.state.lock().unwrap().disks.push(req.clone());
        Ok(())
    }

    async fn create_vm(&self, config: &VmConfig) -> Result<(), BackendError> {
        self.enter(Op::CreateVm).await?;
        self.state.lock().unwrap().vms.push(config.clone());
        Ok(())
    }

    async fn start_vm(&self, req: &VmRef) -> Result<u16, BackendError> {
        self.enter(Op::StartVm).await?;
        let port = {
            let mut state = self.state.lock().unwrap();
            let port = state.next_port;
            state.next_port += 1;
            port
        };
        // The VM may already be gone from the fake backend (concurrent delete).
        let _ = self.with_vm(&req.id, |vm| vm.set_power(Power::Running { vnc_port: port }));
        Ok(port)
    }

    async fn stop_vm(&self, req: &VmRef) -> Result<(), BackendError> {
        self.enter(Op::StopVm).await?;
        let _ = self.with_vm(&req.id, |vm| vm.set_power(Power::Stopped));
        Ok(())
    }

    async fn open_display(&self, req: &DisplayRequest) -> Result<(), BackendError> {
        self.enter(Op::OpenDisplay).await?;
        self.state.lock().unwrap().displays.push(req.port);
        Ok(())
    }

    async fn update_vm(&self, config: &VmConfig) -> Result<(), BackendError> {
        self.enter(Op::UpdateVm).await?;
        self.with_vm(&config.id, |vm| *vm = config.clone())
    }

    async fn clone_vm(&self, req: &CloneRequest) -> Result<VmConfig, BackendError> {
        self.enter(Op::CloneVm).await?;
        let source = self.with_vm(&req.id, |vm| vm.clone())?;
        let clone = VmConfig {
            id: uuid::Uuid::new_v4().to_string(),
            name: req.new_name.clone(),
            disk_path: format!("/fake/disks/{}.qcow2", crate::model::disk_slug(&req.new_name)),
            status: VmStatus::Stopped,
            vnc_port: None,
            ..source
        };
        self.state.lock().unwrap().vms.push(clone.clone());
        Ok(clone)
    }

    async fn delete_vm(&self, req: &DeleteRequest) -> Result<(), BackendError> {
        self.enter(Op::DeleteVm).await?;
        self.state.lock().unwrap().vms.retain(|v| v.id != req.id);
        Ok(())
    }

    async fn list_snapshots(&self, req: &VmRef) -> Result<Vec<String>, BackendError> {
        self.enter(Op::ListSnapshots).await?;
        let state = self.state.lock().unwrap();
        Ok(state.snapshots.get(&req.id).cloned().unwrap_or_default())
    }

    async fn create_snapshot(&self, req: &SnapshotRequest) -> Result<(), BackendError> {
        self.enter(Op::CreateSnapshot).await?;
        let mut state = self.state.lock().unwrap();
        let list = state.snapshots.entry(req.id.clone()).or_default();
        if list.contains(&req.name) {
            return Err(BackendError::new(format!(
                "snapshot '{}' already exists",
                req.name
            )));
        }
        list.push(req.name.clone());
        Ok(())
    }

    async fn restore_snapshot(&self, req: &SnapshotRequest) -> Result<(), BackendError> {
        self.enter(Op::RestoreSnapshot).await?;
        let state = self.state.lock().unwrap();
        let known = state
            .snapshots
            .get(&req.id)
            .is_some_and(|names| names.contains(&req.name));
        if known {
            Ok(())
        } else {
            Err(BackendError::new(format!("snapshot '{}' not found", req.name)))
        }
    }

    async fn delete_snapshot(&self, req: &SnapshotRequest) -> Result<(), BackendError> {
        self.enter(Op::DeleteSnapshot).await?;
        let mut state = self.state.lock().unwrap();
        if let Some(names) = state.snapshots.get_mut(&req.id) {
            names.retain(|n| *n != req.name);
        }
        Ok(())
    }
}

/// A stopped VM record in the built-in space.
pub fn stopped_vm(id: &str, name: &str) -> VmConfig {
    VmConfig {
        id: id.into(),
        name: name.into(),
        space_id: crate::model::DEFAULT_SPACE_ID.into(),
        cpu_cores: 2,
        ram_mb: 2048,
        disk_path: format!("/fake/disks/{}.qcow2", crate::model::disk_slug(name)),
        iso_path: None,
        arch: "x86_64".into(),
        status: VmStatus::Stopped,
        vnc_port: None,
    }
}

/// Register `vm` in both the store and the fake backend, as if it had been
/// created earlier in the session.
pub fn seed_vm(store: &StoreHandle, gateway: &FakeGateway, vm: VmConfig) {
    store.mutate(|s| {
        if s.space(&vm.space_id).is_none() {
            s.upsert_space(Space::builtin());
        }
        s.upsert_vm(vm.clone());
    });
    gateway.add_vm(vm);
}

/// Check the store-wide invariants that must hold between operations.
pub fn assert_store_invariants(store: &StoreHandle) {
    store.read(|s| {
        for vm in s.vms() {
            assert_eq!(
                vm.status == VmStatus::Running,
                vm.vnc_port.is_some(),
                "running/port invariant broken for {}",
                vm.id
            );
            assert!(
                s.space(&vm.space_id).is_some(),
                "VM {} references missing space {}",
                vm.id,
                vm.space_id
            );
        }
    });
}
