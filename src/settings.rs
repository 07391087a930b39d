use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use toml::value;

use crate::error::{Error, Result};

pub const DEFAULT_HYPERVISOR: &str = "xhyve";
pub const DEFAULT_EDITOR: &str = "nano";
pub const DEFAULT_SHARED: &str = "/usr/local/share/xhyve-manager";
pub const SETTINGS_FILE: &str = "settings.toml";

/// Tool-wide settings, independent of any one machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub hypervisor: String,
    pub editor: String,
    pub shared_dir: PathBuf,
    pub exports_file: PathBuf,
    pub nfs_share: String,
    pub nfs_network: String,
    pub nfs_mask: String,
    pub nfs_mapall: String,
}

impl Default for Settings {
    fn default() -> Settings {
	Settings {
	    hypervisor: String::from(DEFAULT_HYPERVISOR),
	    editor: String::from(DEFAULT_EDITOR),
	    shared_dir: PathBuf::from(DEFAULT_SHARED),
	    exports_file: PathBuf::from("/etc/exports"),
	    nfs_share: String::from("/Users"),
	    nfs_network: String::from("192.168.64.0"),
	    nfs_mask: String::from("255.255.255.0"),
	    nfs_mapall: String::from("501"),
	}
    }
}

fn get_option_string(conf: &value::Table, key: &str, path: &Path) -> Result<Option<String>> {
    match conf.get(key) {
	None => Ok(None),
	Some(value::Value::String(s)) => Ok(Some(s.clone())),
	Some(_) => Err(Error::Settings {
	    path: path.to_path_buf(),
	    reason: format!("expecting {} as a string", key),
	}),
    }
}

impl Settings {
    pub fn parse(content: &str, path: &Path) -> Result<Settings> {
	let conf = toml::from_str::<value::Table>(content).map_err(|e| Error::Settings {
	    path: path.to_path_buf(),
	    reason: e.to_string(),
	})?;

	let mut settings = Settings::default();
	if let Some(s) = get_option_string(&conf, "hypervisor", path)? {
	    settings.hypervisor = s;
	}
	if let Some(s) = get_option_string(&conf, "editor", path)? {
	    settings.editor = s;
	}
	if let Some(s) = get_option_string(&conf, "shared_dir", path)? {
	    settings.shared_dir = PathBuf::from(s);
	}
	if let Some(s) = get_option_string(&conf, "exports_file", path)? {
	    settings.exports_file = PathBuf::from(s);
	}
	if let Some(s) = get_option_string(&conf, "nfs_share", path)? {
	    settings.nfs_share = s;
	}
	if let Some(s) = get_option_string(&conf, "nfs_network", path)? {
	    settings.nfs_network = s;
	}
	if let Some(s) = get_option_string(&conf, "nfs_mask", path)? {
	    settings.nfs_mask = s;
	}
	if let Some(s) = get_option_string(&conf, "nfs_mapall", path)? {
	    settings.nfs_mapall = s;
	}
	Ok(settings)
    }

    /// Loads `explicit` if given (it must exist), otherwise the settings file
    /// under the machine root when there is one.
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Settings> {
	let (path, required) = match explicit {
	    Some(p) => (p.to_path_buf(), true),
	    None => (root.join(SETTINGS_FILE), false),
	};

	match fs::read_to_string(&path) {
	    Ok(content) => {
		tracing::debug!(path = %path.display(), "loading settings");
		Settings::parse(&content, &path)
	    }
	    Err(e) if e.kind() == io::ErrorKind::NotFound && !required => Ok(Settings::default()),
	    Err(e) => Err(Error::fs(path, e)),
	}
    }

    /// `EDITOR` wins over the configured editor.
    pub fn editor(&self) -> String {
	std::env::var("EDITOR")
	    .ok()
	    .filter(|e| !e.is_empty())
	    .unwrap_or_else(|| self.editor.clone())
    }

    /// `XHYVE_BIN` wins over the configured hypervisor binary.
    pub fn hypervisor(&self) -> String {
	std::env::var("XHYVE_BIN")
	    .ok()
	    .filter(|e| !e.is_empty())
	    .unwrap_or_else(|| self.hypervisor.clone())
    }
}
