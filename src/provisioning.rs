//! Creation, editing, cloning and deletion of spaces and VMs.

use std::path::PathBuf;
use std::rc::Rc;

use crate::Outcome;
use crate::confirm::Confirmation;
use crate::error::OrbitError;
use crate::gateway::{CloneRequest, CommandGateway, DeleteRequest, DiskImageRequest};
use crate::model::{
    CreateVmParams, Space, VmConfig, VmEdit, VmPatch, VmStatus, clone_name, disk_path_for,
    host_arch, validate_cpu_cores, validate_disk_gb, validate_name, validate_ram_mb,
};
use crate::store::StoreHandle;

pub struct Provisioning<G> {
    store: StoreHandle,
    gateway: Rc<G>,
    disks_dir: PathBuf,
}

impl<G: CommandGateway> Provisioning<G> {
    /// `disks_dir` is where new disk images are placed.
    pub fn new(store: StoreHandle, gateway: Rc<G>, disks_dir: PathBuf) -> Self {
        Self {
            store,
            gateway,
            disks_dir,
        }
    }

    pub async fn create_space(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Space, OrbitError> {
        let name = validate_name(name, "space")?;
        let space = Space {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            icon: "folder".into(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };

        self.gateway
            .create_space(&space)
            .await
            .map_err(|e| e.during("create_space"))?;

        tracing::info!(space = %space.name, id = %space.id, "space created");
        self.store.mutate(|s| s.upsert_space(space.clone()));
        Ok(space)
    }

    /// Allocate the disk image, then register the VM. Nothing is added to
    /// the store unless both backend steps succeed.
    pub async fn create_vm(
        &self,
        space_id: &str,
        params: CreateVmParams,
    ) -> Result<VmConfig, OrbitError> {
        let name = validate_name(&params.name, "VM")?;
        validate_cpu_cores(params.cpu_cores)?;
        validate_ram_mb(params.ram_mb)?;
        validate_disk_gb(params.disk_size_gb)?;
        if !self.store.has_space(space_id) {
            return Err(OrbitError::NotFound {
                kind: "space",
                reference: space_id.to_string(),
            });
        }

        let disk_path = disk_path_for(&self.disks_dir, &name);
        let disk = DiskImageRequest {
            path: disk_path.clone(),
            size_gb: params.disk_size_gb,
        };
        tracing::info!(
            vm = %name,
            path = %disk_path.display(),
            size_gb = disk.size_gb,
            "creating disk image"
        );
        self.gateway
            .create_disk_image(&disk)
            .await
            .map_err(|e| e.during("create_disk_image"))?;

        let vm = VmConfig {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            space_id: space_id.to_string(),
            cpu_cores: params.cpu_cores,
            ram_mb: params.ram_mb,
            disk_path: disk_path.to_string_lossy().into_owned(),
            iso_path: params.iso_path.filter(|p| !p.trim().is_empty()),
            arch: params.arch.unwrap_or_else(|| host_arch().to_string()),
            status: VmStatus::Stopped,
            vnc_port: None,
        };

        if let Err(e) = self.gateway.create_vm(&vm).await {
            // The disk image is left in place; there is no compensating delete.
            tracing::warn!(
                vm = %vm.name,
                path = %disk_path.display(),
                "VM registration failed; disk image left orphaned"
            );
            return Err(e.during("create_vm"));
        }

        tracing::info!(vm = %vm.name, id = %vm.id, "VM created");
        self.store.mutate(|s| s.upsert_vm(vm.clone()));
        Ok(vm)
    }

    /// Delete the VM and its disk image once `confirmation` approves.
    pub async fn delete_vm(
        &self,
        id: &str,
        confirmation: &impl Confirmation,
    ) -> Result<Outcome, OrbitError> {
        let vm = self.require(id)?;
        let prompt = format!(
            "Delete VM '{}'? This will also delete the disk file.",
            vm.name
        );
        if !confirmation.confirm(&prompt)? {
            return Ok(Outcome::Declined);
        }

        self.gateway
            .delete_vm(&DeleteRequest {
                id: id.to_string(),
                delete_disk: true,
            })
            .await
            .map_err(|e| e.during("delete_vm"))?;

        if !self.store.mutate(|s| s.remove_vm(id)) {
            return Ok(Outcome::Vanished);
        }
        tracing::info!(vm = %vm.name, id, "VM deleted");
        Ok(Outcome::Applied)
    }

    pub async fn edit_vm(&self, id: &str, edit: VmEdit) -> Result<Outcome, OrbitError> {
        let edit = edit.validated()?;
        let vm = self.require(id)?;
        if edit.is_empty() {
            return Ok(Outcome::Applied);
        }

        let patch = VmPatch::from(edit);
        let mut merged = vm.clone();
        merged.apply(&patch);
        self.gateway
            .update_vm(&merged)
            .await
            .map_err(|e| e.during("update_vm"))?;

        // Apply the edit to whatever the store holds now, not to the copy
        // taken before the await, so a concurrent start/stop is preserved.
        if !self.store.mutate(|s| s.patch_vm(id, &patch)) {
            return Ok(Outcome::Vanished);
        }
        tracing::info!(vm = %merged.name, id, "VM updated");
        Ok(Outcome::Applied)
    }

    /// Clone through the backend as a single operation and register the
    /// record it returns as-is.
    pub async fn clone_vm(&self, id: &str) -> Result<VmConfig, OrbitError> {
        let vm = self.require(id)?;
        let req = CloneRequest {
            id: id.to_string(),
            new_name: clone_name(&vm.name),
        };
        let clone = self
            .gateway
            .clone_vm(&req)
            .await
            .map_err(|e| e.during("clone_vm"))?;

        tracing::info!(source = %vm.name, vm = %clone.name, id = %clone.id, "VM cloned");
        self.store.mutate(|s| s.upsert_vm(clone.clone()));
        Ok(clone)
    }

    fn require(&self, id: &str) -> Result<VmConfig, OrbitError> {
        self.store.vm(id).ok_or_else(|| OrbitError::NotFound {
            kind: "VM",
            reference: id.to_string(),
        })
    }
}
