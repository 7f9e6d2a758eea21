use std::path::Path;

use inquire::{Confirm, Select, Text};

use crate::config::{OS_CHOICES, Settings, VmDefaults, write_settings};
use crate::confirm::map_inquire_err;
use crate::error::OrbitError;
use crate::gateway::CommandGateway;
use crate::gateway::qemu::{HostOs, QemuGateway};
use crate::model::{CPU_CORE_CHOICES, DISK_GB_CHOICES, RAM_MB_CHOICES};
use crate::paths;

// ── public entry point ───────────────────────────────────

/// Create `settings.toml` in `home`, interactively unless `defaults`.
pub async fn run(home: &Path, defaults: bool) -> Result<(), OrbitError> {
    let output_path = paths::settings_file(home);

    if output_path.exists() {
        if defaults {
            return Err(OrbitError::validation(format!(
                "{} already exists (use interactive mode to overwrite)",
                output_path.display()
            )));
        }
        let overwrite = Confirm::new("settings.toml already exists. Overwrite?")
            .with_default(false)
            .prompt()
            .map_err(map_inquire_err)?;
        if !overwrite {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let settings = if defaults {
        default_settings()
    } else {
        detect_backend(home).await;
        run_wizard()?
    };

    write_settings(&output_path, &settings)?;

    println!("Created {}", output_path.display());
    println!("Run `orbit vm create <NAME>` to create your first VM.");
    Ok(())
}

fn default_settings() -> Settings {
    Settings {
        os_preference: Some(HostOs::current().name().to_string()),
        ..Settings::default()
    }
}

// ── wizard step navigation ───────────────────────────────

enum WizardStep {
    Os,
    Resources,
    Storage,
    Done,
}

impl WizardStep {
    fn next(&self) -> Self {
        match self {
            Self::Os => Self::Resources,
            Self::Resources => Self::Storage,
            Self::Storage | Self::Done => Self::Done,
        }
    }

    fn prev(&self) -> Self {
        match self {
            Self::Os | Self::Resources => Self::Os,
            Self::Storage => Self::Resources,
            Self::Done => Self::Storage,
        }
    }
}

// ── interactive wizard ───────────────────────────────────

/// Esc on any step after the first goes back one step.
fn run_wizard() -> Result<Settings, OrbitError> {
    let mut settings = default_settings();
    let mut step = WizardStep::Os;

    loop {
        match step {
            WizardStep::Os => {
                settings.os_preference = Some(prompt_os()?);
                step = step.next();
            }
            WizardStep::Resources => match prompt_resources() {
                Ok(defaults) => {
                    settings.defaults = defaults;
                    step = step.next();
                }
                Err(OrbitError::Cancelled) => step = step.prev(),
                Err(e) => return Err(e),
            },
            WizardStep::Storage => match prompt_vms_directory() {
                Ok(dir) => {
                    settings.vms_directory = dir;
                    step = step.next();
                }
                Err(OrbitError::Cancelled) => step = step.prev(),
                Err(e) => return Err(e),
            },
            WizardStep::Done => break,
        }
    }

    Ok(settings)
}

// ── wizard steps ─────────────────────────────────────────

async fn detect_backend(home: &Path) {
    let gateway = QemuGateway::new(home.to_path_buf(), home.join("disks"));
    match gateway.check_backend().await {
        Ok(true) => println!("  Detected: QEMU"),
        _ => {
            println!("  Warning: QEMU not found on PATH");
            println!("  Run `orbit doctor --install` to install it.");
        }
    }
    println!();
}

fn prompt_os() -> Result<String, OrbitError> {
    let host = HostOs::current().name();
    let start = OS_CHOICES.iter().position(|o| *o == host).unwrap_or(0);
    let choice = Select::new("Host operating system:", OS_CHOICES.to_vec())
        .with_starting_cursor(start)
        .with_help_message("Used to pick the accelerator and display handler")
        .prompt()
        .map_err(map_inquire_err)?;
    Ok(choice.to_string())
}

fn prompt_resources() -> Result<VmDefaults, OrbitError> {
    let defaults = VmDefaults::default();
    let cpu_cores = select_choice("Default CPU cores:", &CPU_CORE_CHOICES, defaults.cpu_cores)?;
    let ram_mb = select_choice("Default RAM (MB):", &RAM_MB_CHOICES, defaults.ram_mb)?;
    let disk_gb = select_choice("Default disk size (GB):", &DISK_GB_CHOICES, defaults.disk_gb)?;
    Ok(VmDefaults {
        cpu_cores,
        ram_mb,
        disk_gb,
    })
}

fn select_choice(message: &str, choices: &[u32], default: u32) -> Result<u32, OrbitError> {
    let start = choices.iter().position(|c| *c == default).unwrap_or(0);
    Select::new(message, choices.to_vec())
        .with_starting_cursor(start)
        .prompt()
        .map_err(map_inquire_err)
}

fn prompt_vms_directory() -> Result<Option<String>, OrbitError> {
    let dir = Text::new("VM storage directory:")
        .with_help_message("Disk images go in <dir>/disks. Leave empty for the orbit home.")
        .prompt()
        .map_err(map_inquire_err)?;
    let dir = dir.trim();
    Ok((!dir.is_empty()).then(|| dir.to_string()))
}
