use clap::{CommandFactory, Parser};
use std::io;
use std::process::exit;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod create;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod layout;
pub mod modules;
pub mod settings;
pub mod vm;

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("XHYVE_MANAGER_LOG")
	.unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
	.with_env_filter(filter)
	.with_writer(io::stderr)
	.with_target(false)
	.without_time()
	.try_init();
}

fn main() {
    let args = match cli::Cli::try_parse() {
	Ok(args) => args,
	Err(e) => {
	    let _ = e.print();
	    exit(if e.use_stderr() { 1 } else { 0 });
	}
    };
    init_logging(args.verbose);

    match cli::execute(args) {
	Ok(()) => {}
	Err(e) => {
	    eprintln!("error: {}", e);
	    if let error::Error::Usage(_) = e {
		eprintln!("{}", cli::Cli::command().render_usage());
	    }
	    exit(1);
	}
    }
}
