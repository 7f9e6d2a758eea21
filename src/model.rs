//! Spaces, VM records and the value types used to change them.
//!
//! The serialized form matches the backend's record format: camelCase
//! field names and lowercase status strings.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OrbitError;

pub const CPU_CORE_CHOICES: [u32; 5] = [1, 2, 4, 6, 8];
pub const RAM_MB_CHOICES: [u32; 5] = [1024, 2048, 4096, 8192, 16384];
pub const DISK_GB_CHOICES: [u32; 6] = [10, 20, 40, 60, 100, 200];

pub const DEFAULT_SPACE_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Space {
    /// The space every installation starts with.
    pub fn builtin() -> Self {
        Self {
            id: DEFAULT_SPACE_ID.into(),
            name: "Default".into(),
            icon: "folder".into(),
            description: Some("Your personal VMs".into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmStatus::Stopped => f.write_str("stopped"),
            VmStatus::Running => f.write_str("running"),
        }
    }
}

/// Run state with the display port folded in, so a running VM without a
/// port (or a stopped one with a port) cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    Stopped,
    Running { vnc_port: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmConfig {
    pub id: String,
    pub name: String,
    pub space_id: String,
    pub cpu_cores: u32,
    pub ram_mb: u32,
    pub disk_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_path: Option<String>,
    pub arch: String,
    #[serde(default)]
    pub status: VmStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnc_port: Option<u16>,
}

impl VmConfig {
    pub fn power(&self) -> Power {
        match (self.status, self.vnc_port) {
            (VmStatus::Running, Some(vnc_port)) => Power::Running { vnc_port },
            _ => Power::Stopped,
        }
    }

    pub fn set_power(&mut self, power: Power) {
        match power {
            Power::Stopped => {
                self.status = VmStatus::Stopped;
                self.vnc_port = None;
            }
            Power::Running { vnc_port } => {
                self.status = VmStatus::Running;
                self.vnc_port = Some(vnc_port);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.power(), Power::Running { .. })
    }

    /// Bring `status` and `vnc_port` back in line with each other.
    /// A running record without a port is treated as stopped.
    pub fn normalized(mut self) -> Self {
        let power = self.power();
        self.set_power(power);
        self
    }

    pub fn apply(&mut self, patch: &VmPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(cpu_cores) = patch.cpu_cores {
            self.cpu_cores = cpu_cores;
        }
        if let Some(ram_mb) = patch.ram_mb {
            self.ram_mb = ram_mb;
        }
        if let Some(power) = patch.power {
            self.set_power(power);
        }
    }
}

/// Partial update applied by the store. `disk_path`, `space_id` and `arch`
/// are fixed at creation and have no field here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmPatch {
    pub name: Option<String>,
    pub cpu_cores: Option<u32>,
    pub ram_mb: Option<u32>,
    pub power: Option<Power>,
}

impl VmPatch {
    pub fn power(power: Power) -> Self {
        Self {
            power: Some(power),
            ..Self::default()
        }
    }
}

/// User-editable VM settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmEdit {
    pub name: Option<String>,
    pub cpu_cores: Option<u32>,
    pub ram_mb: Option<u32>,
}

impl VmEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.cpu_cores.is_none() && self.ram_mb.is_none()
    }

    /// Validate and normalize (trims the name).
    pub fn validated(self) -> Result<Self, OrbitError> {
        let name = self.name.map(|n| validate_name(&n, "VM")).transpose()?;
        if let Some(cpu) = self.cpu_cores {
            validate_cpu_cores(cpu)?;
        }
        if let Some(ram) = self.ram_mb {
            validate_ram_mb(ram)?;
        }
        Ok(Self { name, ..self })
    }
}

impl From<VmEdit> for VmPatch {
    fn from(edit: VmEdit) -> Self {
        VmPatch {
            name: edit.name,
            cpu_cores: edit.cpu_cores,
            ram_mb: edit.ram_mb,
            power: None,
        }
    }
}

/// Parameters for a new VM, as collected by the create form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVmParams {
    pub name: String,
    pub cpu_cores: u32,
    pub ram_mb: u32,
    pub disk_size_gb: u32,
    pub iso_path: Option<String>,
    pub arch: Option<String>,
}

impl CreateVmParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpu_cores: 2,
            ram_mb: 2048,
            disk_size_gb: 20,
            iso_path: None,
            arch: None,
        }
    }
}

// ── validation ────────────────────────────────────────────

/// Trim `name` and reject it if nothing is left.
pub fn validate_name(name: &str, what: &str) -> Result<String, OrbitError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(OrbitError::validation(format!("{what} name must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub fn validate_cpu_cores(cpu_cores: u32) -> Result<(), OrbitError> {
    validate_choice("cpu cores", cpu_cores, &CPU_CORE_CHOICES)
}

pub fn validate_ram_mb(ram_mb: u32) -> Result<(), OrbitError> {
    validate_choice("RAM (MB)", ram_mb, &RAM_MB_CHOICES)
}

pub fn validate_disk_gb(disk_gb: u32) -> Result<(), OrbitError> {
    validate_choice("disk size (GB)", disk_gb, &DISK_GB_CHOICES)
}

fn validate_choice(label: &str, value: u32, choices: &[u32]) -> Result<(), OrbitError> {
    if choices.contains(&value) {
        return Ok(());
    }
    let allowed: Vec<String> = choices.iter().map(u32::to_string).collect();
    Err(OrbitError::validation(format!(
        "{label} must be one of {} (got {value})",
        allowed.join(", ")
    )))
}

// ── helpers ───────────────────────────────────────────────

/// File-name stem for a VM's disk: lowercase, whitespace runs become `-`,
/// anything outside `[a-z0-9._-]` is dropped.
/// E.g. `"Ubuntu Server"` → `ubuntu-server`, `"Ubuntu (Copy)"` → `ubuntu-copy`
pub fn disk_slug(name: &str) -> String {
    let joined = name.split_whitespace().collect::<Vec<_>>().join("-");
    let slug: String = joined
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let slug = slug.trim_start_matches('.');
    if slug.is_empty() {
        "vm".to_string()
    } else {
        slug.to_string()
    }
}

/// `<disks_dir>/<slug>.qcow2`
pub fn disk_path_for(disks_dir: &Path, name: &str) -> PathBuf {
    disks_dir.join(format!("{}.qcow2", disk_slug(name)))
}

pub fn clone_name(original: &str) -> String {
    format!("{original} (Copy)")
}

/// Architecture tag for VMs created on this host.
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => "aarch64",
        _ => "x86_64",
    }
}
