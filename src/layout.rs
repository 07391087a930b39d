//! Where machines live on disk.
//!
//! ```text
//! <home>/Xhyve Virtual Machines/     # machine root
//! ├── settings.toml                  # optional tool settings
//! └── <name>.xhyvm/                  # one directory per machine
//!     ├── config.ini
//!     └── hdd.img
//! ```

use std::env;
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_VM_DIR: &str = "Xhyve Virtual Machines";
pub const VM_EXT: &str = "xhyvm";
pub const CONFIG_FILE: &str = "config.ini";
pub const DISK_FILE: &str = "hdd.img";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachinePaths {
    pub name: String,
    pub dir: PathBuf,
    pub config: PathBuf,
}

#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
	Self { root: root.into() }
    }

    /// `<home>/Xhyve Virtual Machines` for the acting user.
    pub fn for_acting_user() -> Result<Self> {
	let home = home_dir()?;
	Ok(Self::new(home.join(DEFAULT_VM_DIR)))
    }

    pub fn root(&self) -> &Path {
	&self.root
    }

    pub fn machine_dir(&self, name: &str) -> PathBuf {
	self.root.join(format!("{}.{}", name, VM_EXT))
    }

    pub fn machine(&self, name: &str) -> Result<MachinePaths> {
	validate_name(name)?;
	let dir = self.machine_dir(name);
	Ok(MachinePaths {
	    name: String::from(name),
	    config: dir.join(CONFIG_FILE),
	    dir,
	})
    }

    /// Resolves a machine either by name or by an explicit directory, never both.
    pub fn resolve(&self, name: Option<&str>, path: Option<&Path>) -> Result<MachinePaths> {
	match (name, path) {
	    (Some(_), Some(_)) => Err(Error::Usage(String::from(
		"specify either a machine name or --path, not both",
	    ))),
	    (Some(name), None) => self.machine(name),
	    (None, Some(dir)) => {
		let name = dir
		    .file_stem()
		    .and_then(|s| s.to_str())
		    .ok_or_else(|| Error::Usage(format!("invalid machine path {}", dir.display())))?;
		Ok(MachinePaths {
		    name: String::from(name),
		    dir: dir.to_path_buf(),
		    config: dir.join(CONFIG_FILE),
		})
	    }
	    (None, None) => Err(Error::Usage(String::from("You need to specify a machine name"))),
	}
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
	return Err(Error::Usage(format!("'{}' is not a valid machine name", name)));
    }
    Ok(())
}

/// The user whose home holds the machines: the sudo-invoking user when
/// running as root, the current user otherwise.
pub fn acting_user(uid: u32, user: Option<String>, sudo_user: Option<String>) -> Option<String> {
    let user = user.filter(|u| !u.is_empty());
    if uid == 0 {
	return sudo_user.filter(|u| !u.is_empty()).or(user);
    }
    user
}

pub fn is_root() -> bool {
    unsafe { libc::getuid() == 0 }
}

fn passwd_home(user: &str) -> Option<PathBuf> {
    let cname = CString::new(user).ok()?;
    // getpwnam hands back static storage; copy pw_dir out before returning.
    unsafe {
	let pwd = libc::getpwnam(cname.as_ptr());
	if pwd.is_null() || (*pwd).pw_dir.is_null() {
	    return None;
	}
	let dir = CStr::from_ptr((*pwd).pw_dir).to_str().ok()?;
	Some(PathBuf::from(dir))
    }
}

pub fn home_dir() -> Result<PathBuf> {
    let uid = unsafe { libc::getuid() };
    let user = acting_user(uid, env::var("USER").ok(), env::var("SUDO_USER").ok())
	.ok_or_else(|| Error::UnknownUser(String::from("(unset USER)")))?;
    tracing::debug!(%user, uid, "resolving home directory");
    passwd_home(&user).ok_or(Error::UnknownUser(user))
}
