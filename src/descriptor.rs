use ini::{Ini, ParseOption};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};

pub struct Field {
    pub section: &'static str,
    pub key: &'static str,
    pub default: &'static str,
}

const fn cfg(section: &'static str, key: &'static str, default: &'static str) -> Field {
    Field { section, key, default }
}

/// Every machine setting, in the order it is written to `config.ini`.
pub static FIELDS: &[Field] = &[
    cfg("machine", "name", ""),
    cfg("machine", "type", "linux"),
    cfg("boot", "uuid", ""),
    cfg("boot", "kernel", ""),
    cfg("boot", "initrd", ""),
    cfg("boot", "options", ""),
    cfg("memory", "size", "1G"),
    cfg("processor", "cpus", "1"),
    cfg("bridge", "slot", "0:0"),
    cfg("bridge", "driver", "hostbridge"),
    cfg("lpc", "slot", "31"),
    cfg("lpc", "driver", "lpc"),
    cfg("lpc_dev", "port", "com1"),
    cfg("lpc_dev", "configinfo", "stdio"),
    cfg("networking", "slot", "2:0"),
    cfg("networking", "driver", "virtio-net"),
    cfg("internal_storage", "slot", "4"),
    cfg("internal_storage", "driver", "virtio-blk"),
    cfg("internal_storage", "configinfo", ""),
    cfg("external_storage", "slot", "3"),
    cfg("external_storage", "driver", "ahci-cd"),
    cfg("external_storage", "configinfo", ""),
    cfg("acpi", "enabled", "false"),
];

fn position(section: &str, key: &str) -> Option<usize> {
    FIELDS.iter().position(|f| f.section == section && f.key == key)
}

/// Flat machine record. Values line up with `FIELDS`; unset is "".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    values: Vec<String>,
}

impl Default for Descriptor {
    fn default() -> Self {
	Self::new()
    }
}

impl Descriptor {
    pub fn new() -> Descriptor {
	let mut d = Descriptor { values: Vec::with_capacity(FIELDS.len()) };
	d.initialize_defaults();
	d
    }

    pub fn initialize_defaults(&mut self) {
	self.values = FIELDS.iter().map(|f| String::from(f.default)).collect();
    }

    pub fn get(&self, section: &str, key: &str) -> &str {
	match position(section, key) {
	    Some(i) => &self.values[i],
	    None => "",
	}
    }

    /// Stores `value` with surrounding whitespace trimmed, since `config.ini`
    /// cannot keep it. Returns false for pairs that are not part of the table.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) -> bool {
	match position(section, key) {
	    Some(i) => {
		let value: String = value.into();
		self.values[i] = String::from(value.trim());
		true
	    }
	    None => false,
	}
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static Field, &str)> {
	FIELDS.iter().zip(self.values.iter().map(|v| v.as_str()))
    }

    pub fn name(&self) -> &str {
	self.get("machine", "name")
    }

    pub fn machine_type(&self) -> &str {
	self.get("machine", "type")
    }

    pub fn uuid(&self) -> &str {
	self.get("boot", "uuid")
    }

    /// Parses INI text on top of the defaults. Unknown sections and keys are skipped.
    pub fn parse(content: &str, path: &Path) -> Result<Descriptor> {
	let opt = ParseOption {
	    enabled_quote: false,
	    enabled_escape: false,
	    ..ParseOption::default()
	};
	let conf = Ini::load_from_str_opt(content, opt).map_err(|e| Error::ConfigInvalid {
	    path: path.to_path_buf(),
	    reason: e.to_string(),
	})?;

	let mut d = Descriptor::new();
	for (section, props) in conf.iter() {
	    let section = match section {
		Some(s) => s,
		None => continue,
	    };
	    for (key, value) in props.iter() {
		if !d.set(section, key, value) {
		    tracing::debug!(section, key, "ignoring unknown config entry");
		}
	    }
	}
	Ok(d)
    }

    /// Reads `path`. With `allow_missing`, an absent file yields the defaults.
    pub fn load(path: &Path, allow_missing: bool) -> Result<Descriptor> {
	match fs::read_to_string(path) {
	    Ok(content) => Descriptor::parse(&content, path),
	    Err(e) if e.kind() == io::ErrorKind::NotFound => {
		if allow_missing {
		    Ok(Descriptor::new())
		} else {
		    Err(Error::ConfigNotFound(path.to_path_buf()))
		}
	    }
	    Err(e) => Err(Error::fs(path, e)),
	}
    }

    pub fn to_ini(&self) -> String {
	let mut out = String::new();
	let mut section = "";
	for (field, value) in self.fields() {
	    if field.section != section {
		section = field.section;
		let _ = write!(out, "\n[{}]\n", section);
	    }
	    let _ = writeln!(out, "{} = {}", field.key, value);
	}
	out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
	fs::write(path, self.to_ini()).map_err(|e| Error::fs(path, e))?;
	tracing::debug!(path = %path.display(), "wrote machine config");
	Ok(())
    }

    pub fn info(&self) -> String {
	let mut out = String::new();
	for (field, value) in self.fields() {
	    let _ = writeln!(out, "{}_{} = {}", field.section, field.key, value);
	}
	out
    }
}
