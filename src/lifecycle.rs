//! Start/stop transitions for a single VM.
//!
//! ```text
//!   stopped --start--> running --stop--> stopped
//! ```
//!
//! The store is only patched after the backend has confirmed the
//! transition. After every await the record is looked up again; if it has
//! disappeared in the meantime the operation ends as `Outcome::Vanished`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::Outcome;
use crate::error::OrbitError;
use crate::gateway::{CommandGateway, DisplayRequest, VmRef};
use crate::model::{Power, VmConfig, VmPatch, VmStatus};
use crate::store::StoreHandle;

pub struct Lifecycle<G> {
    store: StoreHandle,
    gateway: Rc<G>,
    in_flight: Rc<RefCell<HashSet<String>>>,
}

/// Marks a VM as having a transition in flight until dropped.
struct InFlight {
    set: Rc<RefCell<HashSet<String>>>,
    id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(&self.id);
    }
}

impl<G: CommandGateway> Lifecycle<G> {
    pub fn new(store: StoreHandle, gateway: Rc<G>) -> Self {
        Self {
            store,
            gateway,
            in_flight: Rc::default(),
        }
    }

    pub async fn start(&self, id: &str) -> Result<Outcome, OrbitError> {
        let vm = self.require(id, VmStatus::Stopped)?;
        let _guard = self.claim(&vm)?;

        tracing::info!(vm = %vm.name, id, "starting VM");
        let port = self
            .gateway
            .start_vm(&VmRef::new(id))
            .await
            .map_err(|e| e.during("start_vm"))?;

        let patched = self
            .store
            .mutate(|s| s.patch_vm(id, &VmPatch::power(Power::Running { vnc_port: port })));
        if !patched {
            tracing::info!(id, port, "VM removed while starting; dropping result");
            return Ok(Outcome::Vanished);
        }
        tracing::info!(vm = %vm.name, port, "VM running");

        // Best effort: a viewer that fails to open does not undo the start.
        if let Err(e) = self.gateway.open_display(&DisplayRequest { port }).await {
            tracing::warn!(vm = %vm.name, port, error = %e, "could not open display");
        }
        Ok(Outcome::Applied)
    }

    pub async fn stop(&self, id: &str) -> Result<Outcome, OrbitError> {
        let vm = self.require(id, VmStatus::Running)?;
        let _guard = self.claim(&vm)?;

        tracing::info!(vm = %vm.name, id, "stopping VM");
        self.gateway
            .stop_vm(&VmRef::new(id))
            .await
            .map_err(|e| e.during("stop_vm"))?;

        let patched = self
            .store
            .mutate(|s| s.patch_vm(id, &VmPatch::power(Power::Stopped)));
        if !patched {
            tracing::info!(id, "VM removed while stopping");
            return Ok(Outcome::Vanished);
        }
        tracing::info!(vm = %vm.name, "VM stopped");
        Ok(Outcome::Applied)
    }

    /// Open a viewer on a running VM's display. Also serves to reconnect
    /// when the viewer opened at start failed or was closed.
    pub async fn open_console(&self, id: &str) -> Result<(), OrbitError> {
        let vm = self.require(id, VmStatus::Running)?;
        let Power::Running { vnc_port } = vm.power() else {
            return Err(OrbitError::InvalidState {
                name: vm.name,
                expected: VmStatus::Running,
                actual: VmStatus::Stopped,
            });
        };
        tracing::debug!(vm = %vm.name, port = vnc_port, "opening console");
        self.gateway
            .open_display(&DisplayRequest { port: vnc_port })
            .await
            .map_err(|e| e.during("open_display"))
    }

    fn require(&self, id: &str, expected: VmStatus) -> Result<VmConfig, OrbitError> {
        let vm = self.store.vm(id).ok_or_else(|| OrbitError::NotFound {
            kind: "VM",
            reference: id.to_string(),
        })?;
        if vm.status != expected {
            return Err(OrbitError::InvalidState {
                name: vm.name,
                expected,
                actual: vm.status,
            });
        }
        Ok(vm)
    }

    fn claim(&self, vm: &VmConfig) -> Result<InFlight, OrbitError> {
        if !self.in_flight.borrow_mut().insert(vm.id.clone()) {
            return Err(OrbitError::Busy {
                name: vm.name.clone(),
            });
        }
        Ok(InFlight {
            set: self.in_flight.clone(),
            id: vm.id.clone(),
        })
    }
}
