use std::path::{Path, PathBuf};

use facet::Facet;

use crate::error::OrbitError;
use crate::model::{validate_cpu_cores, validate_disk_gb, validate_ram_mb};

pub const OS_CHOICES: [&str; 3] = ["macos", "windows", "linux"];

/// `settings.toml` in the orbit home.
#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
#[facet(default)]
pub struct Settings {
    /// Host OS chosen during `orbit init`.
    pub os_preference: Option<String>,
    /// Parent of the `disks/` directory. Defaults to the orbit home.
    pub vms_directory: Option<String>,
    #[facet(default)]
    pub defaults: VmDefaults,
}

/// Pre-filled values for `vm create`.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
#[facet(default)]
pub struct VmDefaults {
    #[facet(default = 2)]
    pub cpu_cores: u32,
    #[facet(default = 2048)]
    pub ram_mb: u32,
    #[facet(default = 20)]
    pub disk_gb: u32,
}

impl Default for VmDefaults {
    fn default() -> Self {
        Self {
            cpu_cores: 2,
            ram_mb: 2048,
            disk_gb: 20,
        }
    }
}

impl Settings {
    /// Directory new disk images are created in.
    pub fn disks_dir(&self, home: &Path) -> PathBuf {
        let base = match &self.vms_directory {
            Some(dir) if !dir.trim().is_empty() => expand_tilde(dir.trim()),
            _ => home.to_path_buf(),
        };
        base.join("disks")
    }

    pub fn to_toml(&self) -> String {
        let mut out = String::new();

        if let Some(os) = &self.os_preference {
            out.push_str(&format!("os_preference = \"{os}\"\n"));
        }
        match &self.vms_directory {
            Some(dir) => out.push_str(&format!("vms_directory = \"{}\"\n", escape(dir))),
            None => out.push_str("# vms_directory = \"~/VMs\"\n"),
        }
        out.push('\n');

        out.push_str("[defaults]\n");
        out.push_str(&format!("cpu_cores = {}\n", self.defaults.cpu_cores));
        out.push_str(&format!("ram_mb = {}\n", self.defaults.ram_mb));
        out.push_str(&format!("disk_gb = {}\n", self.defaults.disk_gb));
        out
    }
}

fn validate_settings(settings: &Settings) -> Result<(), OrbitError> {
    if let Some(os) = &settings.os_preference {
        if !OS_CHOICES.contains(&os.as_str()) {
            return Err(OrbitError::validation(format!(
                "os_preference must be one of {} (got '{os}')",
                OS_CHOICES.join(", ")
            )));
        }
    }
    validate_cpu_cores(settings.defaults.cpu_cores)?;
    validate_ram_mb(settings.defaults.ram_mb)?;
    validate_disk_gb(settings.defaults.disk_gb)?;
    Ok(())
}

/// `~` and `~/...` resolve against the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── public API ────────────────────────────────────────────

/// Read settings from `path`. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings, OrbitError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => {
            return Err(OrbitError::ConfigLoad {
                path: path.display().to_string(),
                source,
            });
        }
    };

    let settings: Settings =
        facet_toml::from_str(&contents).map_err(|e| OrbitError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    validate_settings(&settings)?;
    Ok(settings)
}

pub fn write_settings(path: &Path, settings: &Settings) -> Result<(), OrbitError> {
    let write_err = |source| OrbitError::ConfigWrite {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, settings.to_toml()).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.defaults.cpu_cores, 2);
        assert_eq!(settings.defaults.ram_mb, 2048);
        assert_eq!(settings.defaults.disk_gb, 20);
    }

    #[test]
    fn parse_full_settings() {
        let toml = r#"
os_preference = "linux"
vms_directory = "/srv/vms"

[defaults]
cpu_cores = 4
ram_mb = 8192
disk_gb = 60
"#;
        let settings: Settings = facet_toml::from_str(toml).unwrap();
        validate_settings(&settings).unwrap();
        assert_eq!(settings.os_preference.as_deref(), Some("linux"));
        assert_eq!(settings.defaults.ram_mb, 8192);
        assert_eq!(
            settings.disks_dir(Path::new("/unused")),
            PathBuf::from("/srv/vms/disks")
        );
    }

    #[test]
    fn partial_defaults_table_fills_the_rest() {
        let toml = "[defaults]\nram_mb = 4096\n";
        let settings: Settings = facet_toml::from_str(toml).unwrap();
        assert_eq!(settings.defaults.cpu_cores, 2);
        assert_eq!(settings.defaults.ram_mb, 4096);
        assert_eq!(settings.defaults.disk_gb, 20);
    }

    #[test]
    fn unknown_os_rejected() {
        let settings = Settings {
            os_preference: Some("beos".into()),
            ..Settings::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(OrbitError::Validation { .. })
        ));
    }

    #[test]
    fn out_of_range_defaults_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[defaults]\ncpu_cores = 3\n").unwrap();
        assert!(matches!(
            load_settings(&path),
            Err(OrbitError::Validation { .. })
        ));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[defaults\ncpu_cores = ").unwrap();
        assert!(matches!(
            load_settings(&path),
            Err(OrbitError::ConfigParse { .. })
        ));
    }

    #[test]
    fn disks_default_to_home() {
        let settings = Settings::default();
        assert_eq!(
            settings.disks_dir(Path::new("/home/u/.config/orbit-vm")),
            PathBuf::from("/home/u/.config/orbit-vm/disks")
        );
    }

    #[test]
    fn tilde_expands_to_home_dir() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/VMs"), home.join("VMs"));
            assert_eq!(expand_tilde("~"), home);
        }
        assert_eq!(expand_tilde("/abs"), PathBuf::from("/abs"));
    }

    #[test]
    fn written_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = Settings {
            os_preference: Some("macos".into()),
            vms_directory: Some("/Users/me/VMs".into()),
            defaults: VmDefaults {
                cpu_cores: 4,
                ram_mb: 4096,
                disk_gb: 40,
            },
        };
        write_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }
}
