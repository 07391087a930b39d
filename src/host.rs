use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};
use crate::settings::Settings;

const GIB: u64 = 1 << 30;
const ISO_HEADER: u64 = 2048;
const EXPORTS_BEGIN: &str = "# BEGIN XHYVE";
const EXPORTS_END: &str = "# END XHYVE";

pub fn require_root(what: &'static str) -> Result<()> {
    if !crate::layout::is_root() {
	return Err(Error::PrivilegeRequired(what));
    }
    Ok(())
}

/// Runs `program` to completion with inherited stdio.
pub fn run_and_wait(cmd: &mut Command) -> Result<()> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    tracing::debug!(?cmd, "spawning");
    let status = cmd.status().map_err(|e| Error::Spawn {
	program: program.clone(),
	source: e,
    })?;
    if !status.success() {
	return Err(Error::ProcessFailed { program, status });
    }
    Ok(())
}

/// Size in bytes of a `size_gb` GiB disk, `None` for zero or sizes past `u64`.
pub fn disk_bytes(size_gb: u64) -> Option<u64> {
    if size_gb == 0 {
	return None;
    }
    size_gb.checked_mul(GIB)
}

/// Allocates a zero-filled image of `size_gb` GiB at `path`.
pub fn create_virtual_disk(path: &Path, size_gb: u64) -> Result<()> {
    let bytes = disk_bytes(size_gb)
	.ok_or_else(|| Error::Usage(format!("{}GB is not a valid disk size", size_gb)))?;
    println!("A {}GB disk will be made", size_gb);
    let f = fs::File::create(path).map_err(|e| Error::fs(path, e))?;
    f.set_len(bytes).map_err(|e| Error::fs(path, e))?;
    println!("Disk created at {}", path.display());
    Ok(())
}

/// Rewrites a hybrid live ISO so that macOS can mount it: the first 2k
/// block is replaced by zeroes and the rest copied verbatim.
pub fn extract_boot_image(iso: &Path, output: &Path) -> Result<u64> {
    let mut input = fs::File::open(iso).map_err(|e| Error::fs(iso, e))?;
    // creating the output would truncate the image we are about to read
    let source = fs::canonicalize(iso).map_err(|e| Error::fs(iso, e))?;
    if fs::canonicalize(output).map(|o| o == source).unwrap_or(false) {
	return Err(Error::Usage(format!(
	    "output {} is the ISO being extracted",
	    output.display()
	)));
    }
    let len = input.metadata().map_err(|e| Error::fs(iso, e))?.len();
    if len < ISO_HEADER {
	return Err(Error::fs(
	    iso,
	    io::Error::new(io::ErrorKind::InvalidData, "too small to be an ISO image"),
	));
    }
    input.seek(SeekFrom::Start(ISO_HEADER)).map_err(|e| Error::fs(iso, e))?;

    let mut out = fs::File::create(output).map_err(|e| Error::fs(output, e))?;
    out.write_all(&[0u8; ISO_HEADER as usize]).map_err(|e| Error::fs(output, e))?;
    let copied = io::copy(&mut input, &mut out).map_err(|e| Error::fs(output, e))?;
    out.flush().map_err(|e| Error::fs(output, e))?;
    tracing::info!(iso = %iso.display(), output = %output.display(), copied, "extracted boot image");
    Ok(ISO_HEADER + copied)
}

pub fn exports_block(settings: &Settings) -> String {
    format!(
	"{}\n{} -mapall={} -network {} -mask {} -alldirs\n{}\n",
	EXPORTS_BEGIN, settings.nfs_share, settings.nfs_mapall, settings.nfs_network, settings.nfs_mask, EXPORTS_END
    )
}

/// Appends the export block unless one is already there. Returns whether
/// the file changed.
pub fn add_nfs_export(exports: &Path, settings: &Settings) -> Result<bool> {
    let current = match fs::read_to_string(exports) {
	Ok(s) => s,
	Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
	Err(e) => return Err(Error::fs(exports, e)),
    };
    if current.lines().any(|l| l.trim() == EXPORTS_BEGIN) {
	return Ok(false);
    }

    let mut f = fs::OpenOptions::new()
	.create(true)
	.append(true)
	.open(exports)
	.map_err(|e| Error::fs(exports, e))?;
    let mut block = String::new();
    if !current.is_empty() && !current.ends_with('\n') {
	block.push('\n');
    }
    block.push_str(&exports_block(settings));
    f.write_all(block.as_bytes()).map_err(|e| Error::fs(exports, e))?;
    Ok(true)
}

pub fn setup_host(settings: &Settings) -> Result<()> {
    require_root("setup")?;
    println!("Setting up NFS on host machine with base IP {}", settings.nfs_network);
    if add_nfs_export(&settings.exports_file, settings)? {
	println!("Added xhyve export to {}", settings.exports_file.display());
    } else {
	println!("{} already exports for xhyve", settings.exports_file.display());
    }

    println!("Restarting nfsd to reload the NFS configuration");
    run_and_wait(Command::new("nfsd").arg("restart"))?;
    println!("Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_virtual_disk_size() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("hdd.img");
	create_virtual_disk(&path, 1).unwrap();
	assert_eq!(fs::metadata(&path).unwrap().len(), GIB);
    }

    #[test]
    fn test_disk_bytes() {
	assert_eq!(disk_bytes(0), None);
	assert_eq!(disk_bytes(5), Some(5 * GIB));
	assert_eq!(disk_bytes(u64::MAX), None);
	assert_eq!(disk_bytes(u64::MAX / GIB + 1), None);
    }

    #[test]
    fn test_create_virtual_disk_oversized() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("hdd.img");
	assert!(matches!(create_virtual_disk(&path, u64::MAX), Err(Error::Usage(_))));
	assert!(!path.exists());
    }

    #[test]
    fn test_extract_refuses_to_overwrite_iso() {
	let dir = tempfile::tempdir().unwrap();
	let iso = dir.path().join("live.iso");
	let data = vec![0x42u8; 4096];
	fs::write(&iso, &data).unwrap();

	let same = dir.path().join(".").join("live.iso");
	let err = extract_boot_image(&iso, &same).unwrap_err();
	assert!(matches!(err, Error::Usage(_)));
	assert_eq!(fs::read(&iso).unwrap(), data);
    }

    #[test]
    fn test_extract_boot_image() {
	let dir = tempfile::tempdir().unwrap();
	let iso = dir.path().join("live.iso");
	let out = dir.path().join("tmp.iso");
	let mut data = vec![0xEBu8; 2048];
	data.extend((0..4096u32).map(|i| (i % 251) as u8));
	fs::write(&iso, &data).unwrap();

	let written = extract_boot_image(&iso, &out).unwrap();
	let result = fs::read(&out).unwrap();
	assert_eq!(written, data.len() as u64);
	assert_eq!(result.len(), data.len());
	assert!(result[..2048].iter().all(|b| *b == 0));
	assert_eq!(&result[2048..], &data[2048..]);
    }

    #[test]
    fn test_extract_rejects_tiny_file() {
	let dir = tempfile::tempdir().unwrap();
	let iso = dir.path().join("tiny.iso");
	fs::write(&iso, b"hello").unwrap();
	let err = extract_boot_image(&iso, &dir.path().join("out.iso")).unwrap_err();
	assert!(matches!(err, Error::Filesystem { .. }));
    }

    #[test]
    fn test_add_nfs_export_once() {
	let dir = tempfile::tempdir().unwrap();
	let exports = dir.path().join("exports");
	fs::write(&exports, "/opt -ro").unwrap();
	let settings = Settings::default();

	assert!(add_nfs_export(&exports, &settings).unwrap());
	assert!(!add_nfs_export(&exports, &settings).unwrap());

	let content = fs::read_to_string(&exports).unwrap();
	assert!(content.starts_with("/opt -ro\n# BEGIN XHYVE\n"));
	assert!(content.contains("/Users -mapall=501 -network 192.168.64.0 -mask 255.255.255.0 -alldirs\n"));
	assert_eq!(content.matches(EXPORTS_BEGIN).count(), 1);
	assert!(content.ends_with("# END XHYVE\n"));
    }

    #[test]
    fn test_run_and_wait_reports_failure() {
	assert!(run_and_wait(&mut Command::new("true")).is_ok());
	assert!(matches!(run_and_wait(&mut Command::new("false")), Err(Error::ProcessFailed { .. })));
	assert!(matches!(
	    run_and_wait(&mut Command::new("/nonexistent/xhyve-manager-test")),
	    Err(Error::Spawn { .. })
	));
    }
}
