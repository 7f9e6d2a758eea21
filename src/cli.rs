use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "orbit", version, about = "Desktop VM orchestration over QEMU")]
pub struct Cli {
    /// Orbit home directory (defaults to $ORBIT_HOME or ~/.config/orbit-vm)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Space to operate in (id); defaults to the first space
    #[arg(long, global = true)]
    pub space: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write settings.toml (OS preference and VM defaults)
    Init {
        /// Accept all defaults without prompting
        #[arg(long)]
        defaults: bool,
    },

    /// Check that QEMU is installed
    Doctor {
        /// Try to install QEMU if it is missing
        #[arg(long)]
        install: bool,
    },

    /// Manage spaces
    Space {
        #[command(subcommand)]
        action: SpaceCommand,
    },

    /// Manage virtual machines
    Vm {
        #[command(subcommand)]
        action: VmCommand,
    },

    /// Manage disk snapshots of a VM
    Snapshot {
        #[command(subcommand)]
        action: SnapshotCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SpaceCommand {
    /// List spaces
    List,
    /// Create a space
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum VmCommand {
    /// List VMs in the active space
    List,
    /// Create a VM with a fresh disk image
    Create(CreateArgs),
    /// Start a stopped VM and open its display
    Start { vm: String },
    /// Stop a running VM
    Stop { vm: String },
    /// Open the display of a running VM
    Console { vm: String },
    /// Change name, CPU cores or RAM
    Edit {
        vm: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        cpus: Option<u32>,
        /// RAM in MB
        #[arg(long)]
        ram: Option<u32>,
    },
    /// Duplicate a VM and its disk
    Clone { vm: String },
    /// Delete a VM and its disk image
    Delete {
        vm: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub name: String,
    /// CPU cores (1, 2, 4, 6, 8)
    #[arg(long)]
    pub cpus: Option<u32>,
    /// RAM in MB (1024, 2048, 4096, 8192, 16384)
    #[arg(long)]
    pub ram: Option<u32>,
    /// Disk size in GB (10, 20, 40, 60, 100, 200)
    #[arg(long)]
    pub disk: Option<u32>,
    /// Installer ISO to boot from
    #[arg(long)]
    pub iso: Option<String>,
    /// Guest architecture (defaults to the host's)
    #[arg(long, value_parser = ["x86_64", "aarch64"])]
    pub arch: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// List snapshots of a VM
    List { vm: String },
    /// Take a snapshot
    Create { vm: String, name: String },
    /// Roll the disk back to a snapshot
    Restore {
        vm: String,
        name: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Delete a snapshot
    Delete {
        vm: String,
        name: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}
