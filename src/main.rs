use std::io::IsTerminal;

use clap::Parser;
use console::style;

use orbit::Outcome;
use orbit::cli::{Cli, Command, CreateArgs, SnapshotCommand, SpaceCommand, VmCommand};
use orbit::config::{self, Settings};
use orbit::confirm::Interactive;
use orbit::error::OrbitError;
use orbit::gateway::qemu::QemuGateway;
use orbit::logging;
use orbit::model::{CreateVmParams, VmConfig, VmEdit};
use orbit::paths;
use orbit::progress::{self, OutputMode};
use orbit::session::Session;

type OrbitSession = Session<QemuGateway>;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let mode = OutputMode::resolve(cli.verbose, cli.quiet, std::io::stderr().is_terminal());
    let file_handle = logging::init(mode);

    let home = paths::orbit_home(cli.home.as_deref());
    if let Err(e) = file_handle.set_file(&paths::log_file(&home)) {
        tracing::warn!(error = %e, "file logging disabled");
    }
    tracing::debug!(home = %home.display(), "orbit starting");

    // Init runs before settings are loaded: it creates them.
    if let Command::Init { defaults } = cli.command {
        return orbit::init::run(&home, defaults).await.map_err(Into::into);
    }

    let settings = config::load_settings(&paths::settings_file(&home))?;
    let disks_dir = settings.disks_dir(&home);
    let gateway = QemuGateway::new(home.clone(), disks_dir.clone());
    let mut session = Session::new(gateway, disks_dir);

    if let Command::Doctor { install } = cli.command {
        return doctor(&session, mode, install).await.map_err(Into::into);
    }

    session.load().await?;
    if let Some(space) = &cli.space {
        session.select_space(space)?;
    }

    match cli.command {
        Command::Init { .. } | Command::Doctor { .. } => unreachable!(),
        Command::Space { action } => space_command(&mut session, action).await?,
        Command::Vm { action } => vm_command(&session, &settings, mode, action).await?,
        Command::Snapshot { action } => snapshot_command(&mut session, mode, action).await?,
    }
    Ok(())
}

async fn doctor(session: &OrbitSession, mode: OutputMode, install: bool) -> Result<(), OrbitError> {
    if session.check_backend().await? {
        println!("{} QEMU is installed", style("\u{2713}").green());
        return Ok(());
    }
    if !install {
        println!("{} QEMU not found on PATH", style("\u{2717}").red());
        println!("Run `orbit doctor --install` to install it.");
        std::process::exit(1);
    }
    let message = progress::step(mode, "Installing QEMU", session.install_backend()).await?;
    println!("{message}");
    Ok(())
}

// ── spaces ───────────────────────────────────────────────

async fn space_command(session: &mut OrbitSession, action: SpaceCommand) -> Result<(), OrbitError> {
    match action {
        SpaceCommand::List => {
            let active = session.active_space_id().map(str::to_string);
            session.store().read(|store| {
                for space in store.spaces() {
                    let count = store.vms().iter().filter(|v| v.space_id == space.id).count();
                    let marker = if active.as_deref() == Some(space.id.as_str()) {
                        style("*").green().to_string()
                    } else {
                        " ".to_string()
                    };
                    println!(
                        "{marker} {:<20} {:>3} VM(s)  {}",
                        space.name,
                        count,
                        style(&space.id).dim()
                    );
                    if let Some(description) = &space.description {
                        println!("    {}", style(description).dim());
                    }
                }
            });
        }
        SpaceCommand::Create { name, description } => {
            let space = session.create_space(&name, description.as_deref()).await?;
            println!("Created space '{}' ({})", space.name, style(&space.id).dim());
        }
    }
    Ok(())
}

// ── VMs ──────────────────────────────────────────────────

async fn vm_command(
    session: &OrbitSession,
    settings: &Settings,
    mode: OutputMode,
    action: VmCommand,
) -> Result<(), OrbitError> {
    match action {
        VmCommand::List => session.with_view(|view| {
            if let Some(space) = view.space {
                println!("{}", style(&space.name).bold());
            }
            if view.vms.is_empty() {
                println!("  No VMs. Create one with `orbit vm create <NAME>`.");
            }
            for vm in view.vms {
                print_vm(vm);
            }
        }),
        VmCommand::Create(args) => {
            let space_id = session
                .active_space_id()
                .ok_or_else(|| OrbitError::validation("no space to create the VM in"))?
                .to_string();
            let params = create_params(args, settings);
            let label = format!("Creating {}", params.name.trim());
            let vm = progress::step(
                mode,
                &label,
                session.provisioning().create_vm(&space_id, params),
            )
            .await?;
            println!("Created VM '{}' ({})", vm.name, style(&vm.id).dim());
            println!("  disk: {}", vm.disk_path);
        }
        VmCommand::Start { vm } => {
            let vm = session.resolve_vm(&vm)?;
            let label = format!("Starting {}", vm.name);
            let outcome = progress::step(mode, &label, session.lifecycle().start(&vm.id)).await?;
            report(outcome, &vm);
            // Opening the viewer is best-effort and its failure is only
            // logged, so always point at the reconnect command.
            if let Some(running) = session.store().vm(&vm.id) {
                if let Some(port) = running.vnc_port {
                    println!("  display: vnc://localhost:{port}");
                    println!(
                        "  no viewer? run `orbit vm console {}`",
                        style(&vm.name).bold()
                    );
                }
            }
        }
        VmCommand::Stop { vm } => {
            let vm = session.resolve_vm(&vm)?;
            let label = format!("Stopping {}", vm.name);
            let outcome = progress::step(mode, &label, session.lifecycle().stop(&vm.id)).await?;
            report(outcome, &vm);
        }
        VmCommand::Console { vm } => {
            let vm = session.resolve_vm(&vm)?;
            session.lifecycle().open_console(&vm.id).await?;
        }
        VmCommand::Edit {
            vm,
            name,
            cpus,
            ram,
        } => {
            let vm = session.resolve_vm(&vm)?;
            let edit = VmEdit {
                name,
                cpu_cores: cpus,
                ram_mb: ram,
            };
            if edit.is_empty() {
                return Err(OrbitError::validation(
                    "nothing to change (use --name, --cpus or --ram)",
                ));
            }
            let outcome = session.provisioning().edit_vm(&vm.id, edit).await?;
            report(outcome, &vm);
        }
        VmCommand::Clone { vm } => {
            let vm = session.resolve_vm(&vm)?;
            let label = format!("Cloning {}", vm.name);
            let copy = progress::step(mode, &label, session.provisioning().clone_vm(&vm.id)).await?;
            println!("Created VM '{}' ({})", copy.name, style(&copy.id).dim());
        }
        VmCommand::Delete { vm, yes } => {
            let vm = session.resolve_vm(&vm)?;
            let confirm = Interactive { assume_yes: yes };
            let outcome = session.provisioning().delete_vm(&vm.id, &confirm).await?;
            report(outcome, &vm);
        }
    }
    Ok(())
}

fn create_params(args: CreateArgs, settings: &Settings) -> CreateVmParams {
    CreateVmParams {
        name: args.name,
        cpu_cores: args.cpus.unwrap_or(settings.defaults.cpu_cores),
        ram_mb: args.ram.unwrap_or(settings.defaults.ram_mb),
        disk_size_gb: args.disk.unwrap_or(settings.defaults.disk_gb),
        iso_path: args.iso,
        arch: args.arch,
    }
}

fn print_vm(vm: &VmConfig) {
    let status = format!("{:<8}", vm.status.to_string());
    let status = if vm.is_running() {
        style(status).green()
    } else {
        style(status).dim()
    };
    let port = vm
        .vnc_port
        .map(|p| format!("  vnc :{p}"))
        .unwrap_or_default();
    println!(
        "  {status} {:<24} {} CPU  {} MB  {}{port}  {}",
        vm.name,
        vm.cpu_cores,
        vm.ram_mb,
        vm.arch,
        style(&vm.id).dim()
    );
}

fn report(outcome: Outcome, vm: &VmConfig) {
    match outcome {
        Outcome::Applied => {}
        Outcome::Declined => println!("Cancelled."),
        Outcome::Vanished => println!(
            "{} VM '{}' was removed while the operation was in progress",
            style("!").yellow(),
            vm.name
        ),
    }
}

// ── snapshots ────────────────────────────────────────────

async fn snapshot_command(
    session: &mut OrbitSession,
    mode: OutputMode,
    action: SnapshotCommand,
) -> Result<(), OrbitError> {
    match action {
        SnapshotCommand::List { vm } => {
            let vm = session.resolve_vm(&vm)?;
            let names = session.snapshots().refresh(&vm.id).await?;
            if names.is_empty() {
                println!("No snapshots of '{}'.", vm.name);
            }
            for name in names {
                println!("  {name}");
            }
        }
        SnapshotCommand::Create { vm, name } => {
            let vm = session.resolve_vm(&vm)?;
            let label = format!("Snapshotting {}", vm.name);
            progress::step(mode, &label, session.snapshots().create(&vm.id, &name)).await?;
        }
        SnapshotCommand::Restore { vm, name, yes } => {
            let vm = session.resolve_vm(&vm)?;
            let confirm = Interactive { assume_yes: yes };
            let outcome = session.snapshots().restore(&vm.id, &name, &confirm).await?;
            report(outcome, &vm);
        }
        SnapshotCommand::Delete { vm, name, yes } => {
            let vm = session.resolve_vm(&vm)?;
            let confirm = Interactive { assume_yes: yes };
            let outcome = session.snapshots().delete(&vm.id, &name, &confirm).await?;
            report(outcome, &vm);
        }
    }
    Ok(())
}
