use std::path::{Path, PathBuf};

/// Environment variable that relocates the orbit home.
pub const HOME_ENV: &str = "ORBIT_HOME";

/// Orbit home: `--home`, else `$ORBIT_HOME`, else `~/.config/orbit-vm/`.
pub fn orbit_home(flag: Option<&Path>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("orbit-vm")
}

/// Ordered space records.
pub fn spaces_file(home: &Path) -> PathBuf {
    home.join("spaces.json")
}

/// Ordered VM records.
pub fn vms_file(home: &Path) -> PathBuf {
    home.join("vms.json")
}

/// Pid files of running hypervisor processes.
pub fn run_dir(home: &Path) -> PathBuf {
    home.join("run")
}

pub fn pid_file(home: &Path, vm_id: &str) -> PathBuf {
    run_dir(home).join(format!("{vm_id}.pid"))
}

pub fn settings_file(home: &Path) -> PathBuf {
    home.join("settings.toml")
}

pub fn log_file(home: &Path) -> PathBuf {
    home.join("orbit.log")
}
