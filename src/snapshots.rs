//! Named snapshots of one VM at a time.
//!
//! The cached list belongs to whichever VM was refreshed last and is not
//! part of the entity store. It is only replaced by a successful listing.

use std::rc::Rc;

use crate::Outcome;
use crate::confirm::Confirmation;
use crate::error::OrbitError;
use crate::gateway::{CommandGateway, SnapshotRequest, VmRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotList {
    pub vm_id: String,
    pub names: Vec<String>,
}

pub struct Snapshots<G> {
    gateway: Rc<G>,
    cache: Option<SnapshotList>,
}

impl<G: CommandGateway> Snapshots<G> {
    pub fn new(gateway: Rc<G>) -> Self {
        Self {
            gateway,
            cache: None,
        }
    }

    /// Cached names for `vm_id`, if that VM's list is the one loaded.
    pub fn snapshots(&self, vm_id: &str) -> Option<&[String]> {
        self.cache
            .as_ref()
            .filter(|c| c.vm_id == vm_id)
            .map(|c| c.names.as_slice())
    }

    pub async fn refresh(&mut self, vm_id: &str) -> Result<&[String], OrbitError> {
        let names = self
            .gateway
            .list_snapshots(&VmRef::new(vm_id))
            .await
            .map_err(|e| e.during("list_snapshots"))?;
        tracing::debug!(id = vm_id, count = names.len(), "snapshot list refreshed");
        let cache = self.cache.insert(SnapshotList {
            vm_id: vm_id.to_string(),
            names,
        });
        Ok(&cache.names)
    }

    pub async fn create(&mut self, vm_id: &str, name: &str) -> Result<(), OrbitError> {
        let name = validate_snapshot_name(name)?;
        self.gateway
            .create_snapshot(&SnapshotRequest::new(vm_id, &name))
            .await
            .map_err(|e| e.during("create_snapshot"))?;
        tracing::info!(id = vm_id, snapshot = %name, "snapshot created");
        self.refresh_after_change(vm_id).await;
        Ok(())
    }

    /// Roll the VM's disk back to `name`. The VM record itself is unchanged.
    pub async fn restore(
        &self,
        vm_id: &str,
        name: &str,
        confirmation: &impl Confirmation,
    ) -> Result<Outcome, OrbitError> {
        let prompt = format!("Restore snapshot \"{name}\"? Current state will be lost.");
        if !confirmation.confirm(&prompt)? {
            return Ok(Outcome::Declined);
        }
        self.gateway
            .restore_snapshot(&SnapshotRequest::new(vm_id, name))
            .await
            .map_err(|e| e.during("restore_snapshot"))?;
        tracing::info!(id = vm_id, snapshot = name, "snapshot restored");
        Ok(Outcome::Applied)
    }

    pub async fn delete(
        &mut self,
        vm_id: &str,
        name: &str,
        confirmation: &impl Confirmation,
    ) -> Result<Outcome, OrbitError> {
        if !confirmation.confirm(&format!("Delete snapshot \"{name}\"?"))? {
            return Ok(Outcome::Declined);
        }
        self.gateway
            .delete_snapshot(&SnapshotRequest::new(vm_id, name))
            .await
            .map_err(|e| e.during("delete_snapshot"))?;
        tracing::info!(id = vm_id, snapshot = name, "snapshot deleted");
        self.refresh_after_change(vm_id).await;
        Ok(Outcome::Applied)
    }

    /// The change itself is already confirmed, so a failed listing only
    /// leaves the cache stale.
    async fn refresh_after_change(&mut self, vm_id: &str) {
        if let Err(e) = self.refresh(vm_id).await {
            tracing::warn!(id = vm_id, error = %e, "snapshot list not refreshed");
        }
    }
}

/// Snapshot names are passed to `qemu-img` as a single argument.
fn validate_snapshot_name(name: &str) -> Result<String, OrbitError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(OrbitError::validation("snapshot name must not be empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(OrbitError::validation(format!(
            "snapshot name '{name}' must not contain whitespace"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{AssumeNo, AssumeYes};
    use crate::test_support::{FakeGateway, Op};

    fn setup() -> (Rc<FakeGateway>, Snapshots<FakeGateway>) {
        let gateway = Rc::new(FakeGateway::new());
        let snapshots = Snapshots::new(gateway.clone());
        (gateway, snapshots)
    }

    #[tokio::test]
    async fn refresh_replaces_cache() {
        let (gateway, mut snapshots) = setup();
        gateway.set_snapshots("vm-1", &["base"]);
        gateway.set_snapshots("vm-2", &["a", "b"]);

        assert_eq!(snapshots.refresh("vm-1").await.unwrap(), ["base"]);
        snapshots.refresh("vm-2").await.unwrap();
        assert_eq!(snapshots.snapshots("vm-1"), None);
        assert_eq!(snapshots.snapshots("vm-2").unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_list() {
        let (gateway, mut snapshots) = setup();
        gateway.set_snapshots("vm-1", &["base"]);
        snapshots.refresh("vm-1").await.unwrap();

        gateway.fail(Op::ListSnapshots, "qemu-img: Could not open");
        assert!(snapshots.refresh("vm-1").await.is_err());
        assert_eq!(snapshots.snapshots("vm-1").unwrap(), ["base"]);
    }

    #[tokio::test]
    async fn create_then_refresh() {
        let (gateway, mut snapshots) = setup();
        snapshots.create("vm-1", " clean-install ").await.unwrap();
        assert_eq!(snapshots.snapshots("vm-1").unwrap(), ["clean-install"]);
        assert_eq!(gateway.calls(), [Op::CreateSnapshot, Op::ListSnapshots]);
    }

    #[tokio::test]
    async fn create_succeeds_even_if_refresh_fails() {
        let (gateway, mut snapshots) = setup();
        gateway.set_snapshots("vm-1", &["base"]);
        snapshots.refresh("vm-1").await.unwrap();
        gateway.fail(Op::ListSnapshots, "qemu-img: Could not open");

        snapshots.create("vm-1", "after-update").await.unwrap();
        assert_eq!(gateway.count(Op::CreateSnapshot), 1);
        // Stale until the next successful refresh.
        assert_eq!(snapshots.snapshots("vm-1").unwrap(), ["base"]);

        gateway.succeed(Op::ListSnapshots);
        assert_eq!(
            snapshots.refresh("vm-1").await.unwrap(),
            ["base", "after-update"]
        );
    }

    #[tokio::test]
    async fn create_rejects_bad_names_locally() {
        let (gateway, mut snapshots) = setup();
        for bad in ["", "   ", "before upgrade"] {
            assert!(matches!(
                snapshots.create("vm-1", bad).await,
                Err(OrbitError::Validation { .. })
            ));
        }
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn duplicate_create_leaves_cache_alone() {
        let (gateway, mut snapshots) = setup();
        gateway.set_snapshots("vm-1", &["base"]);
        snapshots.refresh("vm-1").await.unwrap();

        assert!(snapshots.create("vm-1", "base").await.is_err());
        assert_eq!(snapshots.snapshots("vm-1").unwrap(), ["base"]);
        assert_eq!(gateway.count(Op::ListSnapshots), 1);
    }

    #[tokio::test]
    async fn restore_asks_first() {
        let (gateway, snapshots) = setup();
        gateway.set_snapshots("vm-1", &["base"]);

        assert_eq!(
            snapshots.restore("vm-1", "base", &AssumeNo).await.unwrap(),
            Outcome::Declined
        );
        assert_eq!(gateway.count(Op::RestoreSnapshot), 0);

        assert_eq!(
            snapshots.restore("vm-1", "base", &AssumeYes).await.unwrap(),
            Outcome::Applied
        );
        assert!(snapshots.restore("vm-1", "gone", &AssumeYes).await.is_err());
    }

    #[tokio::test]
    async fn delete_refreshes_on_success() {
        let (gateway, mut snapshots) = setup();
        gateway.set_snapshots("vm-1", &["a", "b"]);
        snapshots.refresh("vm-1").await.unwrap();

        assert_eq!(
            snapshots.delete("vm-1", "a", &AssumeNo).await.unwrap(),
            Outcome::Declined
        );
        assert_eq!(gateway.count(Op::DeleteSnapshot), 0);

        assert_eq!(
            snapshots.delete("vm-1", "a", &AssumeYes).await.unwrap(),
            Outcome::Applied
        );
        assert_eq!(snapshots.snapshots("vm-1").unwrap(), ["b"]);
    }

    #[tokio::test]
    async fn failed_delete_keeps_cache() {
        let (gateway, mut snapshots) = setup();
        gateway.set_snapshots("vm-1", &["a", "b"]);
        snapshots.refresh("vm-1").await.unwrap();
        gateway.fail(Op::DeleteSnapshot, "snapshot is in use");

        let err = snapshots.delete("vm-1", "a", &AssumeYes).await.unwrap_err();
        assert!(matches!(err, OrbitError::Backend { operation: "delete_snapshot", .. }));
        assert_eq!(snapshots.snapshots("vm-1").unwrap(), ["a", "b"]);
        assert_eq!(gateway.count(Op::ListSnapshots), 1);
    }

    #[tokio::test]
    async fn confirmed_delete_is_applied_even_if_refresh_fails() {
        let (gateway, mut snapshots) = setup();
        gateway.set_snapshots("vm-1", &["a", "b"]);
        snapshots.refresh("vm-1").await.unwrap();
        gateway.fail(Op::ListSnapshots, "qemu-img: Could not open");

        assert_eq!(
            snapshots.delete("vm-1", "a", &AssumeYes).await.unwrap(),
            Outcome::Applied
        );
        assert_eq!(snapshots.snapshots("vm-1").unwrap(), ["a", "b"]);
    }
}
