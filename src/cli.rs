use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};

use crate::create::{self, Prompter};
use crate::error::Result;
use crate::host;
use crate::layout::Layout;
use crate::settings::Settings;
use crate::vm::{Machine, MachineManager};

#[derive(Parser, Debug)]
#[command(name = "xhyve-manager", version, about = "Manage and start xhyve virtual machines")]
pub struct Cli {
    /// Directory holding the machines [default: ~/Xhyve Virtual Machines]
    #[arg(long, global = true, env = "XHYVE_MANAGER_ROOT")]
    pub root: Option<PathBuf>,

    /// Tool settings file [default: <root>/settings.toml]
    #[arg(long, global = true, env = "XHYVE_MANAGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all machines
    List,
    /// Create a machine interactively
    Create {
	/// Machine name; asked for when omitted
	name: Option<String>,
    },
    /// Show info about a machine
    Info(MachineArgs),
    /// Edit the configuration of a machine with $EDITOR
    Edit(MachineArgs),
    /// Start a machine (needs root)
    Start {
	#[command(flatten)]
	machine: MachineArgs,

	/// Print the hypervisor arguments instead of starting it
	#[arg(long)]
	dry_run: bool,
    },
    /// Delete a machine and its disks
    Delete {
	#[command(flatten)]
	machine: MachineArgs,

	/// Do not ask for confirmation
	#[arg(short, long)]
	force: bool,
    },
    /// Extract the boot images of a Linux live ISO into a mountable image
    Extract {
	iso: PathBuf,

	#[arg(short, long, default_value = "/tmp/tmp.iso")]
	output: PathBuf,
    },
    /// Set up the host NFS export for machines (needs root)
    Setup,
}

#[derive(Args, Debug)]
pub struct MachineArgs {
    /// Machine name
    pub name: Option<String>,

    /// Machine directory, instead of a name
    #[arg(long)]
    pub path: Option<PathBuf>,
}

struct Context {
    layout: Layout,
    settings: Settings,
}

impl Context {
    fn new(cli: &Cli) -> Result<Context> {
	let layout = match &cli.root {
	    Some(root) => Layout::new(root),
	    None => Layout::for_acting_user()?,
	};
	let settings = Settings::load(cli.config.as_deref(), layout.root())?;
	Ok(Context { layout, settings })
    }

    fn machine(&self, args: &MachineArgs) -> Result<Machine> {
	let paths = self.layout.resolve(args.name.as_deref(), args.path.as_deref())?;
	Machine::load(paths)
    }
}

fn print_extract_help(output: &Path) {
    println!("Now, you need to mount {} by running `open {}`", output.display(), output.display());
    println!("This will mount the Linux live ISO into a disk your computer can read.");
    println!("Example:");
    println!("\t$ xhyve-manager extract ~/Downloads/archlinux-2016.05.01-dual.iso");
    println!("\t$ open {}", output.display());
    println!("\t$ cp /Volumes/ARCH_201605/boot/x86_64/{{vmlinuz,archiso.img}} ~/\"Xhyve Virtual Machines\"/Arch.xhyvm");
}

pub fn execute(cli: Cli) -> Result<()> {
    // extract never touches the machine root
    if let Commands::Extract { iso, output } = &cli.command {
	host::extract_boot_image(iso, output)?;
	print_extract_help(output);
	return Ok(());
    }

    let ctx = Context::new(&cli)?;
    match cli.command {
	Commands::List => {
	    let mgr = MachineManager::new(&ctx.layout)?;
	    for (name, path) in mgr.machines.iter() {
		println!("  {} in {}", name, path.display());
	    }
	}
	Commands::Create { name } => {
	    let stdin = io::stdin();
	    let mut prompt = Prompter::new(stdin.lock(), io::stdout());
	    let (paths, descriptor) =
		create::create_machine(&ctx.layout, &ctx.settings, name.as_deref(), &mut prompt)?;
	    let mut machine = Machine::new(paths, descriptor);

	    println!("Below is the configuration.");
	    print!("{}", machine.info());
	    if prompt.confirm("Would you like to edit? y/[n]")? {
		machine.edit(&ctx.settings.editor())?;
		print!("{}", machine.info());
	    } else {
		println!("Now you can try starting the VM with `xhyve-manager start {}`", machine.paths.name);
	    }
	}
	Commands::Info(args) => {
	    print!("{}", ctx.machine(&args)?.info());
	}
	Commands::Edit(args) => {
	    let mut machine = ctx.machine(&args)?;
	    machine.edit(&ctx.settings.editor())?;
	    print!("{}", machine.info());
	}
	Commands::Start { machine, dry_run } => {
	    let machine = ctx.machine(&machine)?;
	    if dry_run {
		for a in machine.startup_args()? {
		    println!("{}", a);
		}
		return Ok(());
	    }
	    host::require_root("start")?;
	    machine.run(&ctx.settings.hypervisor())?;
	}
	Commands::Delete { machine, force } => {
	    let machine = ctx.machine(&machine)?;
	    if !force {
		let stdin = io::stdin();
		let mut prompt = Prompter::new(stdin.lock(), io::stdout());
		let question = format!(
		    "Are you sure you want to delete {} and its disks in {}? y/[n]",
		    machine.paths.name,
		    machine.paths.dir.display()
		);
		if !prompt.confirm(&question)? {
		    println!("Kept {}", machine.paths.name);
		    return Ok(());
		}
	    }
	    let name = machine.paths.name.clone();
	    machine.delete()?;
	    println!("Deleted {}", name);
	}
	Commands::Setup => host::setup_host(&ctx.settings)?,
	Commands::Extract { .. } => {}
    }
    Ok(())
}
