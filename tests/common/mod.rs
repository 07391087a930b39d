#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestContext {
    pub cmd: Command,
    pub root: TempDir,
}

impl TestContext {
    /// A fresh command against the same machine root
    pub fn new_cmd(&self) -> Command {
	base_cmd(self.root.path())
    }

    pub fn machine_dir(&self, name: &str) -> PathBuf {
	self.root.path().join(format!("{}.xhyvm", name))
    }

    pub fn config_path(&self, name: &str) -> PathBuf {
	self.machine_dir(name).join("config.ini")
    }

    pub fn config(&self, name: &str) -> String {
	fs::read_to_string(self.config_path(name)).expect("config.ini should exist")
    }

    /// Creates a linux machine with a 1GB disk and no ISO
    pub fn create_linux(&self, name: &str) {
	self.new_cmd()
	    .arg("create")
	    .write_stdin(format!("{}\nlinux\n1\n", name))
	    .assert()
	    .success();
    }

    /// The value of `key` inside `[section]`
    pub fn config_value(&self, name: &str, section: &str, key: &str) -> Option<String> {
	let header = format!("[{}]", section);
	let mut in_section = false;
	for line in self.config(name).lines() {
	    let line = line.trim();
	    if line.starts_with('[') {
		in_section = line == header;
	    } else if in_section {
		if let Some((k, v)) = line.split_once('=') {
		    if k.trim() == key {
			return Some(String::from(v.trim()));
		    }
		}
	    }
	}
	None
    }
}

/// The binary pointed at `root`, isolated from the caller's settings and hypervisor
fn base_cmd(root: &Path) -> Command {
    let bin_path: &str = env!("CARGO_BIN_EXE_xhyve-manager");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(30));
    cmd.env_remove("XHYVE_MANAGER_CONFIG");
    cmd.env_remove("XHYVE_MANAGER_LOG");
    cmd.env("XHYVE_BIN", "/nonexistent/xhyve");
    cmd.arg("--root").arg(root);
    cmd
}

pub fn xhyve_manager() -> TestContext {
    let root = tempfile::tempdir().expect("Failed to create machine root");
    let cmd = base_cmd(root.path());
    TestContext { cmd, root }
}

pub fn is_root() -> bool {
    unsafe { libc::getuid() == 0 }
}
