//! In-memory entity store.
//!
//! The store is the only owner of spaces and VM records. Every mutation is
//! synchronous and total: upserts replace in place, and patching or removing
//! an id that no longer exists is a no-op that reports `false`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::model::{Space, VmConfig, VmPatch};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityStore {
    spaces: Vec<Space>,
    vms: Vec<VmConfig>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    pub fn vms(&self) -> &[VmConfig] {
        &self.vms
    }

    pub fn space(&self, id: &str) -> Option<&Space> {
        self.spaces.iter().find(|s| s.id == id)
    }

    pub fn vm(&self, id: &str) -> Option<&VmConfig> {
        self.vms.iter().find(|v| v.id == id)
    }

    pub fn upsert_space(&mut self, space: Space) {
        match self.spaces.iter_mut().find(|s| s.id == space.id) {
            Some(existing) => *existing = space,
            None => self.spaces.push(space),
        }
    }

    /// Insert or replace a VM record. Status and display port are
    /// normalized so the running/port invariant always holds.
    pub fn upsert_vm(&mut self, vm: VmConfig) {
        let vm = vm.normalized();
        match self.vms.iter_mut().find(|v| v.id == vm.id) {
            Some(existing) => *existing = vm,
            None => self.vms.push(vm),
        }
    }

    pub fn remove_vm(&mut self, id: &str) -> bool {
        let before = self.vms.len();
        self.vms.retain(|v| v.id != id);
        self.vms.len() != before
    }

    pub fn patch_vm(&mut self, id: &str, patch: &VmPatch) -> bool {
        match self.vms.iter_mut().find(|v| v.id == id) {
            Some(vm) => {
                vm.apply(patch);
                true
            }
            None => false,
        }
    }
}

/// Shared, single-threaded handle to the store.
///
/// Controllers clone the handle; borrows are scoped to the closure passed to
/// `read`/`mutate` and are never held across an await.
#[derive(Debug, Clone, Default)]
pub struct StoreHandle {
    inner: Rc<RefCell<EntityStore>>,
}

impl StoreHandle {
    pub fn new(store: EntityStore) -> Self {
        Self {
            inner: Rc::new(RefCell::new(store)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&EntityStore) -> R) -> R {
        f(&self.inner.borrow())
    }

    pub fn mutate<R>(&self, f: impl FnOnce(&mut EntityStore) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }

    pub fn vm(&self, id: &str) -> Option<VmConfig> {
        self.read(|s| s.vm(id).cloned())
    }

    pub fn has_space(&self, id: &str) -> bool {
        self.read(|s| s.space(id).is_some())
    }

    /// Owned copy of the current state, for rendering.
    pub fn snapshot(&self) -> EntityStore {
        self.read(EntityStore::clone)
    }
}
