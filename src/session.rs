//! One user session: the store, the active space, and the controllers that
//! act on them.

use std::path::PathBuf;
use std::rc::Rc;

use crate::error::OrbitError;
use crate::gateway::CommandGateway;
use crate::lifecycle::Lifecycle;
use crate::model::{Space, VmConfig};
use crate::provisioning::Provisioning;
use crate::snapshots::Snapshots;
use crate::store::{EntityStore, StoreHandle};
use crate::view::{SpaceView, project};

pub struct Session<G> {
    store: StoreHandle,
    gateway: Rc<G>,
    active_space: Option<String>,
    lifecycle: Lifecycle<G>,
    provisioning: Provisioning<G>,
    snapshots: Snapshots<G>,
}

impl<G: CommandGateway> Session<G> {
    pub fn new(gateway: G, disks_dir: PathBuf) -> Self {
        let store = StoreHandle::default();
        let gateway = Rc::new(gateway);
        Self {
            lifecycle: Lifecycle::new(store.clone(), gateway.clone()),
            provisioning: Provisioning::new(store.clone(), gateway.clone(), disks_dir),
            snapshots: Snapshots::new(gateway.clone()),
            store,
            gateway,
            active_space: None,
        }
    }

    /// Replace the store contents with what the backend reports.
    ///
    /// Both listings must succeed before anything is replaced.
    pub async fn load(&mut self) -> Result<(), OrbitError> {
        let gateway = &self.gateway;
        let (mut spaces, vms) = futures_util::future::try_join(
            async {
                gateway
                    .list_spaces()
                    .await
                    .map_err(|e| e.during("list_spaces"))
            },
            async { gateway.list_vms().await.map_err(|e| e.during("list_vms")) },
        )
        .await?;

        if spaces.is_empty() {
            spaces.push(Space::builtin());
        }

        let mut store = EntityStore::new();
        for space in spaces {
            store.upsert_space(space);
        }
        for vm in vms {
            if store.space(&vm.space_id).is_none() {
                tracing::warn!(
                    vm = %vm.name,
                    id = %vm.id,
                    space = %vm.space_id,
                    "skipping VM in unknown space"
                );
                continue;
            }
            store.upsert_vm(vm);
        }
        tracing::debug!(
            spaces = store.spaces().len(),
            vms = store.vms().len(),
            "session loaded"
        );

        let keep = self
            .active_space
            .as_deref()
            .is_some_and(|id| store.space(id).is_some());
        if !keep {
            self.active_space = store.spaces().first().map(|s| s.id.clone());
        }
        self.store.mutate(|s| *s = store);
        Ok(())
    }

    pub fn active_space_id(&self) -> Option<&str> {
        self.active_space.as_deref()
    }

    pub fn select_space(&mut self, id: &str) -> Result<(), OrbitError> {
        if !self.store.has_space(id) {
            return Err(OrbitError::NotFound {
                kind: "space",
                reference: id.to_string(),
            });
        }
        self.active_space = Some(id.to_string());
        Ok(())
    }

    /// Create a space and make it the active one.
    pub async fn create_space(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Space, OrbitError> {
        let space = self.provisioning.create_space(name, description).await?;
        self.active_space = Some(space.id.clone());
        Ok(space)
    }

    /// Find a VM by exact id, falling back to a unique name.
    pub fn resolve_vm(&self, reference: &str) -> Result<VmConfig, OrbitError> {
        let reference = reference.trim();
        if let Some(vm) = self.store.vm(reference) {
            return Ok(vm);
        }
        let mut matches = self.store.read(|s| {
            s.vms()
                .iter()
                .filter(|v| v.name == reference)
                .cloned()
                .collect::<Vec<_>>()
        });
        match matches.len() {
            0 => Err(OrbitError::NotFound {
                kind: "VM",
                reference: reference.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            n => Err(OrbitError::validation(format!(
                "'{reference}' matches {n} VMs; use the VM id instead"
            ))),
        }
    }

    /// Render the active space through `f`.
    pub fn with_view<R>(&self, f: impl FnOnce(SpaceView<'_>) -> R) -> R {
        let active = self.active_space.as_deref().unwrap_or_default();
        self.store
            .read(|s| f(project(s.spaces(), s.vms(), active)))
    }

    pub async fn check_backend(&self) -> Result<bool, OrbitError> {
        self.gateway
            .check_backend()
            .await
            .map_err(|e| e.during("check_backend"))
    }

    pub async fn install_backend(&self) -> Result<String, OrbitError> {
        self.gateway
            .install_backend()
            .await
            .map_err(|e| e.during("install_backend"))
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn lifecycle(&self) -> &Lifecycle<G> {
        &self.lifecycle
    }

    pub fn provisioning(&self) -> &Provisioning<G> {
        &self.provisioning
    }

    pub fn snapshots(&mut self) -> &mut Snapshots<G> {
        &mut self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CreateVmParams;
    use crate::test_support::{FakeGateway, Op, assert_store_invariants, stopped_vm};

    fn dev_space() -> Space {
        Space {
            id: "dev".into(),
            name: "Dev".into(),
            icon: "folder".into(),
            description: None,
        }
    }

    fn session_with(gateway: FakeGateway) -> Session<FakeGateway> {
        Session::new(gateway, PathBuf::from("/home/u/.config/orbit-vm/disks"))
    }

    #[tokio::test]
    async fn load_seeds_default_space() {
        let mut session = session_with(FakeGateway::new());
        session.load().await.unwrap();

        assert_eq!(session.active_space_id(), Some("default"));
        session.with_view(|view| {
            assert_eq!(view.space, Some(&Space::builtin()));
            assert!(view.vms.is_empty());
        });
    }

    #[tokio::test]
    async fn load_skips_vms_in_unknown_spaces() {
        let gateway = FakeGateway::new();
        gateway.add_space(Space::builtin());
        gateway.add_vm(stopped_vm("vm-1", "Ubuntu"));
        gateway.add_vm(VmConfig {
            space_id: "gone".into(),
            ..stopped_vm("vm-2", "Orphan")
        });
        let mut session = session_with(gateway);

        session.load().await.unwrap();

        assert!(session.store().vm("vm-1").is_some());
        assert!(session.store().vm("vm-2").is_none());
        assert_store_invariants(session.store());
    }

    #[tokio::test]
    async fn failed_listing_changes_nothing() {
        let gateway = FakeGateway::new();
        gateway.add_space(Space::builtin());
        gateway.add_vm(stopped_vm("vm-1", "Ubuntu"));
        let mut session = session_with(gateway);
        session.load().await.unwrap();

        session.gateway.fail(Op::ListVms, "vms.json: permission denied");
        assert!(session.load().await.is_err());
        assert!(session.store().vm("vm-1").is_some());
    }

    #[tokio::test]
    async fn load_keeps_active_space_when_it_survives() {
        let gateway = FakeGateway::new();
        gateway.add_space(Space::builtin());
        gateway.add_space(dev_space());
        let mut session = session_with(gateway);
        session.load().await.unwrap();
        session.select_space("dev").unwrap();

        session.load().await.unwrap();
        assert_eq!(session.active_space_id(), Some("dev"));
    }

    #[tokio::test]
    async fn created_space_becomes_active() {
        let mut session = session_with(FakeGateway::new());
        session.load().await.unwrap();

        let dev = session.create_space("Dev", None).await.unwrap();

        assert_eq!(session.active_space_id(), Some(dev.id.as_str()));
        session.with_view(|view| {
            assert_eq!(view.space.map(|s| s.name.as_str()), Some("Dev"));
            assert!(view.vms.is_empty());
        });
    }

    #[tokio::test]
    async fn select_unknown_space_is_not_found() {
        let mut session = session_with(FakeGateway::new());
        session.load().await.unwrap();
        assert!(matches!(
            session.select_space("nope"),
            Err(OrbitError::NotFound { kind: "space", .. })
        ));
        assert_eq!(session.active_space_id(), Some("default"));
    }

    #[tokio::test]
    async fn resolve_by_id_or_unique_name() {
        let gateway = FakeGateway::new();
        gateway.add_space(Space::builtin());
        gateway.add_vm(stopped_vm("vm-1", "Ubuntu"));
        gateway.add_vm(stopped_vm("vm-2", "Debian"));
        gateway.add_vm(stopped_vm("vm-3", "Debian"));
        let mut session = session_with(gateway);
        session.load().await.unwrap();

        assert_eq!(session.resolve_vm("vm-2").unwrap().id, "vm-2");
        assert_eq!(session.resolve_vm("Ubuntu").unwrap().id, "vm-1");
        assert!(matches!(
            session.resolve_vm("Debian"),
            Err(OrbitError::Validation { .. })
        ));
        assert!(matches!(
            session.resolve_vm("Arch"),
            Err(OrbitError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn full_vm_walkthrough() {
        let mut session = session_with(FakeGateway::new());
        session.load().await.unwrap();
        session.gateway.set_next_port(5901);

        let vm = session
            .provisioning()
            .create_vm("default", CreateVmParams::new("Ubuntu"))
            .await
            .unwrap();
        assert!(vm.disk_path.ends_with("ubuntu.qcow2"));

        session.lifecycle().start(&vm.id).await.unwrap();
        assert_eq!(session.store().vm(&vm.id).unwrap().vnc_port, Some(5901));
        session.lifecycle().stop(&vm.id).await.unwrap();

        let copy = session.provisioning().clone_vm(&vm.id).await.unwrap();
        session.with_view(|view| {
            let names: Vec<&str> = view.vms.iter().map(|v| v.name.as_str()).collect();
            assert_eq!(names, ["Ubuntu", "Ubuntu (Copy)"]);
        });
        assert_ne!(copy.id, vm.id);

        session.snapshots().create(&vm.id, "fresh").await.unwrap();
        assert_eq!(session.snapshots().snapshots(&vm.id).unwrap(), ["fresh"]);
        assert_store_invariants(session.store());
    }
}
