//! Local QEMU backend.
//!
//! Records live as JSON arrays in the orbit home (`spaces.json`,
//! `vms.json`). Hypervisors run as detached `qemu-system-*` processes with a
//! pid file under `run/`, so a later invocation can still stop them. Disk
//! images and snapshots are handled by `qemu-img`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tokio::process::{Child, Command};

use super::{
    CloneRequest, CommandGateway, DeleteRequest, DiskImageRequest, DisplayRequest,
    SnapshotRequest, VmRef,
};
use crate::error::BackendError;
use crate::model::{Power, Space, VmConfig, VmStatus, disk_path_for, host_arch};
use crate::paths;

/// VNC display `:0` listens on this TCP port.
pub const VNC_BASE_PORT: u16 = 5900;
const VNC_PORT_SPAN: u16 = 100;

/// A hypervisor that exits within this window is reported as a failed start.
const STARTUP_GRACE: Duration = Duration::from_millis(500);

/// How long to wait for the VNC URL launcher to report failure.
const VIEWER_GRACE: Duration = Duration::from_secs(2);

const EDK2_AARCH64_PATHS: [&str; 3] = [
    "/opt/homebrew/share/qemu/edk2-aarch64-code.fd",
    "/usr/local/share/qemu/edk2-aarch64-code.fd",
    "/usr/share/qemu-efi-aarch64/QEMU_EFI.fd",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    MacOs,
    Windows,
    Linux,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            HostOs::MacOs
        } else if cfg!(target_os = "windows") {
            HostOs::Windows
        } else {
            HostOs::Linux
        }
    }

    /// Value used for `os_preference` in settings.
    pub fn name(self) -> &'static str {
        match self {
            HostOs::MacOs => "macos",
            HostOs::Windows => "windows",
            HostOs::Linux => "linux",
        }
    }
}

pub struct QemuGateway {
    home: PathBuf,
    disks_dir: PathBuf,
    host: HostOs,
    /// Directory holding `qemu-system-*` and the URL launcher; `None`
    /// searches PATH.
    bin_dir: Option<PathBuf>,
    /// Hypervisors spawned by this process. Never locked across an await.
    processes: Mutex<HashMap<String, Child>>,
    /// Serializes read-modify-write cycles on the record files.
    records: tokio::sync::Mutex<()>,
}

impl QemuGateway {
    pub fn new(home: PathBuf, disks_dir: PathBuf) -> Self {
        Self {
            home,
            disks_dir,
            host: HostOs::current(),
            bin_dir: None,
            processes: Mutex::new(HashMap::new()),
            records: tokio::sync::Mutex::new(()),
        }
    }

    /// Run hypervisors and the viewer launcher from `dir` instead of PATH.
    pub fn with_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = Some(dir.into());
        self
    }

    // ── records ──────────────────────────────────────────

    async fn load_spaces(&self) -> Result<Vec<Space>, BackendError> {
        let spaces = read_json(&paths::spaces_file(&self.home)).await?;
        Ok(spaces.unwrap_or_else(|| vec![Space::builtin()]))
    }

    async fn load_vms(&self) -> Result<Vec<VmConfig>, BackendError> {
        Ok(read_json(&paths::vms_file(&self.home))
            .await?
            .unwrap_or_default())
    }

    async fn save_vms(&self, vms: &[VmConfig]) -> Result<(), BackendError> {
        write_json(&paths::vms_file(&self.home), &vms).await
    }

    async fn find_vm(&self, id: &str) -> Result<VmConfig, BackendError> {
        self.load_vms()
            .await?
            .into_iter()
            .find(|v| v.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// Load, edit one record in place, save.
    async fn modify_vm<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut VmConfig) -> R,
    ) -> Result<R, BackendError> {
        let mut vms = self.load_vms().await?;
        let vm = vms.iter_mut().find(|v| v.id == id).ok_or_else(|| not_found(id))?;
        let result = f(vm);
        self.save_vms(&vms).await?;
        Ok(result)
    }

    // ── processes ────────────────────────────────────────

    async fn pick_port(&self, vms: &[VmConfig]) -> Result<u16, BackendError> {
        let taken: Vec<u16> = vms.iter().filter_map(|v| v.vnc_port).collect();
        for port in VNC_BASE_PORT..VNC_BASE_PORT + VNC_PORT_SPAN {
            if taken.contains(&port) {
                continue;
            }
            if TcpListener::bind(("127.0.0.1", port)).await.is_ok() {
                return Ok(port);
            }
        }
        Err(BackendError::new(format!(
            "no free display port in {VNC_BASE_PORT}-{}",
            VNC_BASE_PORT + VNC_PORT_SPAN - 1
        )))
    }

    /// `program`, looked up in `bin_dir` when one is set.
    fn tool(&self, program: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(program),
            None => PathBuf::from(program),
        }
    }

    /// Record a freshly spawned hypervisor: pid file, then the running state.
    async fn register_start(
        &self,
        id: &str,
        pid: Option<u32>,
        port: u16,
    ) -> Result<(), BackendError> {
        if let Some(pid) = pid {
            let pid_path = paths::pid_file(&self.home, id);
            tokio::fs::write(&pid_path, pid.to_string())
                .await
                .map_err(|e| BackendError::io(format_args!("writing {}", pid_path.display()), e))?;
        }
        self.modify_vm(id, |v| v.set_power(Power::Running { vnc_port: port }))
            .await
    }

    /// Kill the VM's hypervisor if one is known, then forget its pid.
    async fn terminate(&self, id: &str) -> Result<(), BackendError> {
        let pid_path = paths::pid_file(&self.home, id);
        let child = self.processes.lock().unwrap().remove(id);

        if let Some(mut child) = child {
            tracing::debug!(id, "killing hypervisor spawned by this process");
            child
                .kill()
                .await
                .map_err(|e| BackendError::io("killing qemu", e))?;
        } else if let Some(pid) = read_pid(&pid_path).await {
            if process_alive(pid).await {
                tracing::debug!(id, pid, "killing hypervisor from pid file");
                kill_process(pid).await?;
            } else {
                tracing::debug!(id, pid, "hypervisor already gone");
            }
        }

        match tokio::fs::remove_file(&pid_path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(BackendError::io(
                format_args!("removing {}", pid_path.display()),
                e,
            )),
            _ => Ok(()),
        }
    }

    /// A record says running, but is anything actually running?
    async fn still_running(&self, vm: &VmConfig) -> bool {
        if self.processes.lock().unwrap().contains_key(&vm.id) {
            return true;
        }
        match read_pid(&paths::pid_file(&self.home, &vm.id)).await {
            Some(pid) => process_alive(pid).await,
            None => false,
        }
    }

    async fn snapshot_cmd(&self, flag: &str, req: &SnapshotRequest) -> Result<(), BackendError> {
        let vm = self.find_vm(&req.id).await?;
        run(
            "qemu-img",
            &["snapshot", flag, req.name.as_str(), vm.disk_path.as_str()],
        )
        .await?;
        Ok(())
    }
}

impl CommandGateway for QemuGateway {
    async fn check_backend(&self) -> Result<bool, BackendError> {
        let found = ["qemu-system-aarch64", "qemu-system-x86_64"]
            .iter()
            .any(|bin| find_in_path(bin).is_some())
            && find_in_path("qemu-img").is_some();
        Ok(found)
    }

    async fn install_backend(&self) -> Result<String, BackendError> {
        match self.host {
            HostOs::MacOs => {
                run("brew", &["install", "qemu"]).await?;
            }
            HostOs::Windows => {
                run(
                    "winget",
                    &["install", "-e", "--id", "SoftwareFreedomConservancy.QEMU"],
                )
                .await
                .map_err(|e| {
                    BackendError::new(format!(
                        "automatic installation failed ({e}); install QEMU manually from qemu.org"
                    ))
                })?;
            }
            HostOs::Linux => {
                return Err(BackendError::new(
                    "install qemu with your package manager (apt, dnf, pacman, ...)",
                ));
            }
        }
        Ok("QEMU installed successfully".into())
    }

    async fn list_spaces(&self) -> Result<Vec<Space>, BackendError> {
        self.load_spaces().await
    }

    async fn list_vms(&self) -> Result<Vec<VmConfig>, BackendError> {
        let mut vms = self.load_vms().await?;
        for vm in vms.iter_mut().filter(|v| v.status == VmStatus::Running) {
            if !self.still_running(vm).await {
                tracing::debug!(vm = %vm.name, id = %vm.id, "hypervisor gone; reporting stopped");
                vm.set_power(Power::Stopped);
            }
        }
        Ok(vms)
    }

    async fn create_space(&self, space: &Space) -> Result<(), BackendError> {
        let _lock = self.records.lock().await;
        let mut spaces = self.load_spaces().await?;
        if spaces.iter().any(|s| s.id == space.id) {
            return Err(BackendError::new(format!("space '{}' already exists", space.id)));
        }
        spaces.push(space.clone());
        write_json(&paths::spaces_file(&self.home), &spaces).await
    }

    async fn create_disk_image(&self, req: &DiskImageRequest) -> Result<(), BackendError> {
        if tokio::fs::try_exists(&req.path).await.unwrap_or(false) {
            // Typically left behind by a failed create or by renaming a VM.
            return Err(BackendError::new(format!(
                "disk image {} already exists; delete that file or pick a different VM name",
                req.path.display()
            )));
        }
        if let Some(parent) = req.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::io(format_args!("creating {}", parent.display()), e))?;
        }

        let path = req.path.to_string_lossy();
        let size = format!("{}G", req.size_gb);
        run("qemu-img", &["create", "-f", "qcow2", &*path, size.as_str()]).await?;
        tracing::info!(path = %req.path.display(), size_gb = req.size_gb, "created disk image");
        Ok(())
    }

    async fn create_vm(&self, config: &VmConfig) -> Result<(), BackendError> {
        let _lock = self.records.lock().await;
        let mut vms = self.load_vms().await?;
        if vms.iter().any(|v| v.id == config.id) {
            return Err(BackendError::new(format!("VM '{}' already exists", config.id)));
        }
        vms.push(config.clone());
        self.save_vms(&vms).await
    }

    async fn start_vm(&self, req: &VmRef) -> Result<u16, BackendError> {
        let _lock = self.records.lock().await;
        let vms = self.load_vms().await?;
        let vm = vms
            .iter()
            .find(|v| v.id == req.id)
            .ok_or_else(|| not_found(&req.id))?;
        let port = self.pick_port(&vms).await?;

        let run_dir = paths::run_dir(&self.home);
        tokio::fs::create_dir_all(&run_dir)
            .await
            .map_err(|e| BackendError::io(format_args!("creating {}", run_dir.display()), e))?;
        let log_path = run_dir.join(format!("{}.log", vm.id));
        let log = tokio::fs::File::create(&log_path)
            .await
            .map_err(|e| BackendError::io(format_args!("creating {}", log_path.display()), e))?
            .into_std()
            .await;

        let binary = self.tool(qemu_binary(&vm.arch));
        let args = qemu_args(vm, port, self.host, find_firmware());
        tracing::debug!(vm = %vm.name, binary = %binary.display(), ?args, "spawning hypervisor");

        let mut cmd = Command::new(&binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log));
        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd.spawn().map_err(|e| {
            BackendError::io(format_args!("failed to start {}", binary.display()), e)
        })?;

        if let Ok(status) = tokio::time::timeout(STARTUP_GRACE, child.wait()).await {
            let status = status.map_err(|e| BackendError::io("waiting for qemu", e))?;
            let stderr = tokio::fs::read_to_string(&log_path).await.unwrap_or_default();
            return Err(BackendError::new(format!(
                "{} exited during startup ({status}): {}",
                binary.display(),
                stderr.trim()
            )));
        }

        // Past this point the hypervisor is running: any failure must take it
        // down again, or nothing would know to stop it.
        if let Err(e) = self.register_start(&vm.id, child.id(), port).await {
            tracing::warn!(vm = %vm.name, error = %e, "could not record start; killing hypervisor");
            if let Err(kill_err) = child.kill().await {
                tracing::warn!(vm = %vm.name, error = %kill_err, "killing hypervisor failed");
            }
            let _ = tokio::fs::remove_file(paths::pid_file(&self.home, &vm.id)).await;
            return Err(e);
        }
        self.processes.lock().unwrap().insert(vm.id.clone(), child);
        tracing::info!(vm = %vm.name, port, "hypervisor started");
        Ok(port)
    }

    async fn stop_vm(&self, req: &VmRef) -> Result<(), BackendError> {
        let _lock = self.records.lock().await;
        self.terminate(&req.id).await?;
        self.modify_vm(&req.id, |v| v.set_power(Power::Stopped)).await?;
        tracing::info!(id = %req.id, "hypervisor stopped");
        Ok(())
    }

    async fn open_display(&self, req: &DisplayRequest) -> Result<(), BackendError> {
        let url = format!("vnc://localhost:{}", req.port);
        let mut cmd = match self.host {
            HostOs::MacOs => Command::new(self.tool("open")),
            HostOs::Windows => {
                let mut c = Command::new("cmd");
                c.args(["/C", "start", ""]);
                c
            }
            HostOs::Linux => Command::new(self.tool("xdg-open")),
        };
        let mut child = cmd
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BackendError::io(format_args!("failed to open {url}"), e))?;

        // Launchers normally hand off and exit at once; one still running
        // after the grace period is treated as having opened the viewer.
        match tokio::time::timeout(VIEWER_GRACE, child.wait()).await {
            Ok(Ok(status)) if !status.success() => Err(BackendError::new(format!(
                "no viewer opened {url} ({status})"
            ))),
            Ok(Err(e)) => Err(BackendError::io(format_args!("failed to open {url}"), e)),
            _ => Ok(()),
        }
    }

    async fn update_vm(&self, config: &VmConfig) -> Result<(), BackendError> {
        let _lock = self.records.lock().await;
        // Run state is owned by start/stop, not by edits.
        self.modify_vm(&config.id, |vm| {
            *vm = VmConfig {
                status: vm.status,
                vnc_port: vm.vnc_port,
                ..config.clone()
            };
        })
        .await
    }

    async fn clone_vm(&self, req: &CloneRequest) -> Result<VmConfig, BackendError> {
        let _lock = self.records.lock().await;
        let mut vms = self.load_vms().await?;
        let source = vms
            .iter()
            .find(|v| v.id == req.id)
            .ok_or_else(|| not_found(&req.id))?;
        if source.status == VmStatus::Running {
            return Err(BackendError::new(format!(
                "VM '{}' is running; stop it before cloning",
                source.name
            )));
        }

        let disk_path = unique_disk_path(&self.disks_dir, &req.new_name).await;
        if let Some(parent) = disk_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::io(format_args!("creating {}", parent.display()), e))?;
        }
        tokio::fs::copy(&source.disk_path, &disk_path)
            .await
            .map_err(|e| {
                BackendError::io(
                    format_args!("copying {} to {}", source.disk_path, disk_path.display()),
                    e,
                )
            })?;

        let clone = VmConfig {
            id: uuid::Uuid::new_v4().to_string(),
            name: req.new_name.clone(),
            disk_path: disk_path.to_string_lossy().into_owned(),
            status: VmStatus::Stopped,
            vnc_port: None,
            ..source.clone()
        };
        vms.push(clone.clone());
        self.save_vms(&vms).await?;
        tracing::info!(
            source = %req.id,
            vm = %clone.name,
            path = %disk_path.display(),
            "cloned VM"
        );
        Ok(clone)
    }

    async fn delete_vm(&self, req: &DeleteRequest) -> Result<(), BackendError> {
        let _lock = self.records.lock().await;
        let mut vms = self.load_vms().await?;
        let Some(index) = vms.iter().position(|v| v.id == req.id) else {
            return Ok(());
        };

        self.terminate(&req.id).await?;
        let vm = vms.remove(index);
        if req.delete_disk && !vm.disk_path.is_empty() {
            match tokio::fs::remove_file(&vm.disk_path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    return Err(BackendError::io(format_args!("removing {}", vm.disk_path), e));
                }
                _ => {}
            }
        }
        let log_path = paths::run_dir(&self.home).join(format!("{}.log", vm.id));
        let _ = tokio::fs::remove_file(log_path).await;
        self.save_vms(&vms).await?;
        tracing::info!(vm = %vm.name, id = %vm.id, "deleted VM");
        Ok(())
    }

    async fn list_snapshots(&self, req: &VmRef) -> Result<Vec<String>, BackendError> {
        let vm = self.find_vm(&req.id).await?;
        let output = run("qemu-img", &["snapshot", "-l", vm.disk_path.as_str()]).await?;
        Ok(parse_snapshot_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn create_snapshot(&self, req: &SnapshotRequest) -> Result<(), BackendError> {
        self.snapshot_cmd("-c", req).await
    }

    async fn restore_snapshot(&self, req: &SnapshotRequest) -> Result<(), BackendError> {
        self.snapshot_cmd("-a", req).await
    }

    async fn delete_snapshot(&self, req: &SnapshotRequest) -> Result<(), BackendError> {
        self.snapshot_cmd("-d", req).await
    }
}

// ── command line ─────────────────────────────────────────

pub fn qemu_binary(arch: &str) -> &'static str {
    match arch {
        "aarch64" => "qemu-system-aarch64",
        _ => "qemu-system-x86_64",
    }
}

/// Full `qemu-system-*` argument list for `vm` with VNC on `port`.
///
/// Hardware acceleration is only requested when the guest architecture
/// matches the host; anything else falls back to TCG emulation.
pub fn qemu_args(vm: &VmConfig, port: u16, host: HostOs, firmware: Option<&Path>) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));
    let native = vm.arch == host_arch();
    let aarch64 = vm.arch == "aarch64";

    match (native, host) {
        (true, HostOs::Linux) => push(&["-enable-kvm"]),
        (true, HostOs::MacOs) => push(&["-accel", "hvf"]),
        (true, HostOs::Windows) => push(&["-accel", "whpx"]),
        (false, _) => push(&["-accel", "tcg"]),
    }
    if aarch64 {
        push(&["-M", "virt,highmem=on"]);
        push(&["-cpu", if native { "host" } else { "max" }]);
    }

    let smp = vm.cpu_cores.to_string();
    let mem = vm.ram_mb.to_string();
    let display = format!("vnc=127.0.0.1:{}", port.saturating_sub(VNC_BASE_PORT));
    push(&["-smp", smp.as_str(), "-m", mem.as_str()]);
    if aarch64 {
        push(&["-device", "virtio-gpu-pci"]);
    }
    push(&["-display", display.as_str()]);

    push(&["-device", "qemu-xhci", "-device", "usb-kbd", "-device", "usb-tablet"]);
    push(&["-device", "virtio-net-pci,netdev=net0", "-netdev", "user,id=net0"]);

    if !vm.disk_path.is_empty() {
        let drive = format!("file={},if=none,id=hd0,format=qcow2", escape_opt(&vm.disk_path));
        push(&["-drive", drive.as_str(), "-device", "virtio-blk-pci,drive=hd0,bootindex=2"]);
    }
    if let Some(iso) = vm.iso_path.as_deref().filter(|p| !p.is_empty()) {
        let drive = format!("file={},if=none,id=cd0,media=cdrom", escape_opt(iso));
        push(&["-drive", drive.as_str(), "-device", "virtio-blk-pci,drive=cd0,bootindex=1"]);
    }

    if let (true, Some(fw)) = (aarch64, firmware) {
        let fw = fw.to_string_lossy();
        push(&["-bios", &*fw]);
    }
    args
}

/// QEMU option values use `,` as a separator; a literal comma is doubled.
fn escape_opt(value: &str) -> String {
    value.replace(',', ",,")
}

fn find_firmware() -> Option<&'static Path> {
    EDK2_AARCH64_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
}

/// Tag column of `qemu-img snapshot -l`. The first two lines are the
/// "Snapshot list:" banner and the column header.
pub fn parse_snapshot_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(2)
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

// ── helpers ──────────────────────────────────────────────

fn not_found(id: &str) -> BackendError {
    BackendError::new(format!("VM '{id}' not found"))
}

/// `<disks_dir>/<slug>.qcow2`, or `<slug>-2.qcow2` etc. if that is taken.
async fn unique_disk_path(disks_dir: &Path, name: &str) -> PathBuf {
    let first = disk_path_for(disks_dir, name);
    if !tokio::fs::try_exists(&first).await.unwrap_or(false) {
        return first;
    }
    let stem = first
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vm".into());
    let mut n = 2;
    loop {
        let candidate = disks_dir.join(format!("{stem}-{n}.qcow2"));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

/// Run `program` to completion; a non-zero exit becomes its stderr.
async fn run(program: &str, args: &[&str]) -> Result<Output, BackendError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| BackendError::io(format_args!("running {program}"), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{program} exited with {}", output.status)
        } else {
            stderr
        };
        return Err(BackendError::new(message));
    }
    Ok(output)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, BackendError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BackendError::io(format_args!("reading {}", path.display()), e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| BackendError::new(format!("parsing {}: {e}", path.display())))
}

/// Write via a sibling temp file and rename, so readers never see a
/// half-written array.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BackendError::io(format_args!("creating {}", parent.display()), e))?;
    }
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| BackendError::new(format!("serializing {}: {e}", path.display())))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| BackendError::io(format_args!("writing {}", tmp.display()), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| BackendError::io(format_args!("renaming {}", tmp.display()), e))
}

async fn read_pid(path: &Path) -> Option<u32> {
    tokio::fs::read_to_string(path).await.ok()?.trim().parse().ok()
}

async fn process_alive(pid: u32) -> bool {
    let pid = pid.to_string();
    if cfg!(windows) {
        let filter = format!("PID eq {pid}");
        match run("tasklist", &["/FI", filter.as_str(), "/NH"]).await {
            Ok(out) => String::from_utf8_lossy(&out.stdout).contains(&pid),
            Err(_) => false,
        }
    } else {
        let script = format!("kill -0 {pid}");
        run("sh", &["-c", script.as_str()]).await.is_ok()
    }
}

async fn kill_process(pid: u32) -> Result<(), BackendError> {
    let pid = pid.to_string();
    if cfg!(windows) {
        run("taskkill", &["/PID", pid.as_str(), "/F"]).await?;
    } else {
        let script = format!("kill {pid}");
        run("sh", &["-c", script.as_str()]).await?;
    }
    Ok(())
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let name = if cfg!(windows) {
        format!("{binary}.exe")
    } else {
        binary.to_string()
    };
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file())
}
