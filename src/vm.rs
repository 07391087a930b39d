use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::{env, fs, io};

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::host;
use crate::layout::{Layout, MachinePaths, VM_EXT};
use crate::modules;

pub struct Machine {
    pub paths: MachinePaths,
    pub descriptor: Descriptor,
}

pub struct MachineManager {
    pub machines: BTreeMap<String, PathBuf>,
}

impl Machine {
    pub fn new(paths: MachinePaths, descriptor: Descriptor) -> Machine {
	Machine { paths, descriptor }
    }

    pub fn load(paths: MachinePaths) -> Result<Machine> {
	let mut descriptor = Descriptor::load(&paths.config, false)?;
	let stored = descriptor.name();
	if stored != paths.name {
	    if !stored.is_empty() {
		tracing::warn!(stored, name = %paths.name, "config name differs from its directory, using the directory");
	    }
	    descriptor.set("machine", "name", paths.name.as_str());
	}
	Ok(Machine { paths, descriptor })
    }

    pub fn info(&self) -> String {
	self.descriptor.info()
    }

    /// Opens the config in `editor`, then reloads it.
    pub fn edit(self: &mut Self, editor: &str) -> Result<()> {
	println!("\nEditing {} config with external editor: {}", self.paths.name, editor);
	host::run_and_wait(Command::new(editor).arg(&self.paths.config))?;
	println!("\nEdited configuration for {} machine", self.paths.name);
	*self = Machine::load(self.paths.clone())?;
	Ok(())
    }

    pub fn startup_args(&self) -> Result<Vec<String>> {
	modules::startup_args(&self.descriptor)
    }

    /// Runs the hypervisor from inside the machine directory and waits for it.
    pub fn run(&self, hypervisor: &str) -> Result<()> {
	let args = self.startup_args()?;
	tracing::info!(machine = %self.paths.name, hypervisor, args = ?args, "starting machine");

	env::set_current_dir(&self.paths.dir).map_err(|e| Error::fs(&self.paths.dir, e))?;
	println!("Current working dir: {}", self.paths.dir.display());

	host::run_and_wait(Command::new(hypervisor).args(&args))
    }

    pub fn delete(self) -> Result<()> {
	fs::remove_dir_all(&self.paths.dir).map_err(|e| Error::fs(&self.paths.dir, e))?;
	tracing::info!(machine = %self.paths.name, "deleted machine");
	Ok(())
    }
}

fn machine_entry(path: &Path) -> Option<String> {
    if !path.is_dir() || path.extension()?.to_str()? != VM_EXT {
	return None;
    }
    path.file_stem()?.to_str().map(String::from)
}

impl MachineManager {
    /// Every `<name>.xhyvm` directory under the machine root.
    pub fn new(layout: &Layout) -> Result<MachineManager> {
	let dir = match fs::read_dir(layout.root()) {
	    Ok(dir) => dir,
	    Err(e) if e.kind() == io::ErrorKind::NotFound => {
		return Ok(MachineManager { machines: BTreeMap::new() });
	    }
	    Err(e) => return Err(Error::fs(layout.root(), e)),
	};

	let mut machines = BTreeMap::new();
	for entry in dir {
	    let path = entry.map_err(|e| Error::fs(layout.root(), e))?.path();
	    if let Some(name) = machine_entry(&path) {
		machines.insert(name, path);
	    }
	}
	Ok(MachineManager { machines })
    }
}
