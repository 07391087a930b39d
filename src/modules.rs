use crate::descriptor::Descriptor;
use crate::error::{Error, Result};

pub trait ConfModule {
    fn startup_args(&self) -> Vec<String>;
}

/// Comma-joins the non-empty parts. All parts empty gives "".
pub fn join_group<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut r = String::new();
    for part in parts {
	let part = part.as_ref();
	if part.is_empty() {
	    continue;
	}
	if !r.is_empty() {
	    r.push(',');
	}
	r.push_str(part);
    }
    return r;
}

pub fn firmware_type(machine_type: &str) -> Result<&'static str> {
    match machine_type {
	"bsd" => Ok("fbsd"),
	"linux" => Ok("kexec"),
	other => Err(Error::UnsupportedMachineType(String::from(other))),
    }
}

fn group(machine: &Descriptor, section: &str, keys: &[&str]) -> String {
    join_group(keys.iter().map(|k| machine.get(section, k)))
}

// Firmware, identity and sizing
struct BaseModule {
    firmware: String,
    uuid: String,
    memory: String,
    cpus: String,
}

impl BaseModule {
    fn new(machine: &Descriptor) -> Result<BaseModule> {
	let token = firmware_type(machine.machine_type())?;
	let firmware = join_group([
	    token,
	    machine.get("boot", "kernel"),
	    machine.get("boot", "initrd"),
	    machine.get("boot", "options"),
	]);
	return Ok(BaseModule {
	    firmware,
	    uuid: String::from(machine.uuid()),
	    memory: String::from(machine.get("memory", "size")),
	    cpus: String::from(machine.get("processor", "cpus")),
	});
    }
}

impl ConfModule for BaseModule {
    fn startup_args(&self) -> Vec<String> {
	return vec![String::from("-f"), self.firmware.clone(),
		    String::from("-U"), self.uuid.clone(),
		    String::from("-m"), self.memory.clone(),
		    String::from("-c"), self.cpus.clone()];
    }
}

// PCI slot or LPC device; dropped entirely when every sub-field is empty
struct DeviceModule {
    flag: &'static str,
    detail: String,
}

impl ConfModule for DeviceModule {
    fn startup_args(&self) -> Vec<String> {
	if self.detail.is_empty() {
	    return vec![];
	}
	return vec![String::from(self.flag), self.detail.clone()];
    }
}

struct AcpiModule {
    enabled: bool,
}

impl ConfModule for AcpiModule {
    fn startup_args(&self) -> Vec<String> {
	if self.enabled {
	    vec![String::from("-A")]
	} else {
	    vec![]
	}
    }
}

pub fn create_modules(machine: &Descriptor) -> Result<Vec<Box<dyn ConfModule>>> {
    let slot = |section: &str, keys: &[&str]| DeviceModule {
	flag: "-s",
	detail: group(machine, section, keys),
    };

    let mut modules: Vec<Box<dyn ConfModule>> = vec![
	Box::new(BaseModule::new(machine)?),
	Box::new(slot("bridge", &["slot", "driver"])),
	Box::new(DeviceModule {
	    flag: "-l",
	    detail: group(machine, "lpc_dev", &["port", "configinfo"]),
	}),
	Box::new(slot("lpc", &["slot", "driver"])),
	Box::new(slot("networking", &["slot", "driver"])),
	Box::new(slot("internal_storage", &["slot", "driver", "configinfo"])),
    ];
    // slot and driver always have defaults; only the image path says whether a disk is attached
    if !machine.get("external_storage", "configinfo").is_empty() {
	modules.push(Box::new(slot("external_storage", &["slot", "driver", "configinfo"])));
    }
    modules.push(Box::new(AcpiModule {
	enabled: machine.get("acpi", "enabled") == "true",
    }));
    return Ok(modules);
}

/// Hypervisor arguments for `machine`, without the program name.
pub fn startup_args(machine: &Descriptor) -> Result<Vec<String>> {
    let mut args = Vec::new();
    for m in create_modules(machine)?.iter() {
	args.extend(m.startup_args());
    }
    return Ok(args);
}
