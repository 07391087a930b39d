use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing command-line input. Printed with the usage block.
    #[error("{0}")]
    Usage(String),

    #[error("Missing machine config at {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid machine config at {}: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("unsupported machine type '{0}' (supported machine types: linux, bsd)")]
    UnsupportedMachineType(String),

    #[error("{0} needs to be run as root")]
    PrivilegeRequired(&'static str),

    #[error("{}: {source}", path.display())]
    Filesystem {
	path: PathBuf,
	#[source]
	source: io::Error,
    },

    #[error("cannot find the home directory of user {0}")]
    UnknownUser(String),

    #[error("settings {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },

    #[error("{program} exited with {status}")]
    ProcessFailed { program: String, status: ExitStatus },

    #[error("cannot run {program}: {source}")]
    Spawn {
	program: String,
	#[source]
	source: io::Error,
    },

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn fs(path: impl Into<PathBuf>, source: io::Error) -> Error {
	Error::Filesystem { path: path.into(), source }
    }
}
