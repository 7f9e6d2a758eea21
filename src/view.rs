use crate::model::{Space, VmConfig};

/// What is shown for the active space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceView<'a> {
    /// `None` when the active id names no known space.
    pub space: Option<&'a Space>,
    pub vms: Vec<&'a VmConfig>,
}

/// Filter `vms` down to the active space, keeping their order.
pub fn project<'a>(
    spaces: &'a [Space],
    vms: &'a [VmConfig],
    active_space_id: &str,
) -> SpaceView<'a> {
    SpaceView {
        space: spaces.iter().find(|s| s.id == active_space_id),
        vms: vms.iter().filter(|v| v.space_id == active_space_id).collect(),
    }
}
