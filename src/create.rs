use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;
use uuid::Uuid;

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::host;
use crate::layout::{Layout, MachinePaths, DISK_FILE};
use crate::settings::Settings;

pub const LINUX_BOOT_OPTIONS: &str = "earlyprintk=serial console=ttyS0";

/// Line-oriented question/answer over any reader and writer.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
	Self { input, output }
    }

    pub fn say(&mut self, message: &str) -> Result<()> {
	writeln!(self.output, "{}", message)?;
	Ok(())
    }

    /// `None` once the input is exhausted.
    pub fn ask(&mut self, message: &str) -> Result<Option<String>> {
	write!(self.output, "{}: ", message)?;
	self.output.flush()?;
	let mut line = String::new();
	if self.input.read_line(&mut line)? == 0 {
	    writeln!(self.output)?;
	    return Ok(None);
	}
	writeln!(self.output, "\n")?;
	Ok(Some(String::from(line.trim_end_matches(['\r', '\n']))))
    }

    pub fn ask_required(&mut self, message: &str) -> Result<String> {
	self.ask(message)?
	    .ok_or_else(|| Error::Usage(format!("no answer given to: {}", message)))
    }

    /// Yes only on an explicit `y`.
    pub fn confirm(&mut self, message: &str) -> Result<bool> {
	Ok(matches!(self.ask(message)?.as_deref().map(str::trim), Some("y") | Some("Y")))
    }
}

fn make_machine_dir(layout: &Layout, name: &str) -> Result<MachinePaths> {
    let paths = layout.machine(name)?;
    fs::create_dir_all(layout.root()).map_err(|e| Error::fs(layout.root(), e))?;
    fs::create_dir(&paths.dir).map_err(|e| Error::fs(&paths.dir, e))?;
    Ok(paths)
}

fn ask_name<R: BufRead, W: Write>(layout: &Layout, prompt: &mut Prompter<R, W>) -> Result<MachinePaths> {
    loop {
	let name = prompt.ask_required("What would you like to name this machine?")?;
	match make_machine_dir(layout, name.trim()) {
	    Ok(paths) => return Ok(paths),
	    Err(e @ (Error::Usage(_) | Error::Filesystem { .. })) => prompt.say(&e.to_string())?,
	    Err(e) => return Err(e),
	}
    }
}

fn ask_type<R: BufRead, W: Write>(
    machine: &mut Descriptor,
    settings: &Settings,
    prompt: &mut Prompter<R, W>,
) -> Result<()> {
    let shared = &settings.shared_dir;
    loop {
	prompt.say("Will this be a linux or bsd machine?")?;
	let answer = prompt.ask_required("linux/bsd")?;
	match answer.trim() {
	    "linux" => {
		machine.set("machine", "type", "linux");
		machine.set("boot", "kernel", shared.join("vmlinuz").to_string_lossy());
		machine.set("boot", "initrd", shared.join("initrd.gz").to_string_lossy());
		machine.set("boot", "options", LINUX_BOOT_OPTIONS);
		return Ok(());
	    }
	    "bsd" => {
		machine.set("machine", "type", "bsd");
		machine.set("boot", "kernel", shared.join("userboot.so").to_string_lossy());
		machine.set("boot", "initrd", "");
		machine.set("boot", "options", "");
		machine.set("acpi", "enabled", "true");
		return Ok(());
	    }
	    other => prompt.say(&format!("'{}' is not a supported machine type", other))?,
	}
    }
}

fn ask_disk<R: BufRead, W: Write>(
    machine: &mut Descriptor,
    paths: &MachinePaths,
    prompt: &mut Prompter<R, W>,
) -> Result<()> {
    loop {
	let answer = prompt.ask_required(
	    "How much space should the new virtual disk use in GBs (ex. 5 for 5GB)? Or type the full path to an existing disk",
	)?;
	let answer = answer.trim();
	if let Ok(size) = answer.parse::<u64>() {
	    if host::disk_bytes(size).is_some() {
		host::create_virtual_disk(&paths.dir.join(DISK_FILE), size)?;
		machine.set("internal_storage", "configinfo", DISK_FILE);
		return Ok(());
	    }
	} else if !answer.is_empty() && Path::new(answer).is_file() {
	    // start runs from the machine dir, so relative answers would dangle
	    let disk = fs::canonicalize(answer).map_err(|e| Error::fs(answer, e))?;
	    machine.set("internal_storage", "configinfo", disk.to_string_lossy());
	    return Ok(());
	}
	prompt.say("Type a size in GB or the path to an existing disk image")?;
    }
}

fn ask_iso<R: BufRead, W: Write>(machine: &mut Descriptor, prompt: &mut Prompter<R, W>) -> Result<()> {
    loop {
	let answer = match prompt.ask("Path to a CD image (ISO) to attach, empty for none")? {
	    Some(a) => String::from(a.trim()),
	    None => return Ok(()),
	};
	if answer.is_empty() {
	    return Ok(());
	}
	if Path::new(&answer).is_file() {
	    let iso = fs::canonicalize(&answer).map_err(|e| Error::fs(&answer, e))?;
	    let iso = iso.to_string_lossy().into_owned();
	    machine.set("external_storage", "configinfo", iso.as_str());
	    // userboot loads from the install media
	    if machine.machine_type() == "bsd" {
		machine.set("boot", "initrd", iso);
	    }
	    return Ok(());
	}
	prompt.say(&format!("{} does not exist", answer))?;
    }
}

fn fill_in<R: BufRead, W: Write>(
    paths: &MachinePaths,
    settings: &Settings,
    prompt: &mut Prompter<R, W>,
) -> Result<Descriptor> {
    let mut machine = Descriptor::new();
    machine.set("machine", "name", paths.name.as_str());

    ask_type(&mut machine, settings, prompt)?;

    prompt.say("Generating a UUID")?;
    let uuid = Uuid::new_v4().to_string().to_uppercase();
    machine.set("boot", "uuid", uuid.as_str());
    prompt.say(&format!("The UUID of the machine will be {}", uuid))?;

    ask_disk(&mut machine, paths, prompt)?;
    ask_iso(&mut machine, prompt)?;

    machine.save(&paths.config)?;
    Ok(machine)
}

/// Walks the user through a new machine and writes its config.
pub fn create_machine<R: BufRead, W: Write>(
    layout: &Layout,
    settings: &Settings,
    name: Option<&str>,
    prompt: &mut Prompter<R, W>,
) -> Result<(MachinePaths, Descriptor)> {
    prompt.say("So you want to create an xhyve virtual machine. Maybe I can help!")?;

    let paths = match name {
	Some(name) => make_machine_dir(layout, name)?,
	None => ask_name(layout, prompt)?,
    };

    // a half-made machine has no config and would block the name
    let machine = match fill_in(&paths, settings, prompt) {
	Ok(machine) => machine,
	Err(e) => {
	    if let Err(rm) = fs::remove_dir_all(&paths.dir) {
		tracing::warn!(dir = %paths.dir.display(), error = %rm, "could not remove unfinished machine");
	    }
	    return Err(e);
	}
    };
    prompt.say(&format!("Created {} for {}", paths.config.display(), paths.name))?;
    tracing::info!(machine = %paths.name, config = %paths.config.display(), "created machine");
    Ok((paths, machine))
}
