use predicates::prelude::*;
use std::fs;

mod common;

#[test]
fn test_list() {
    let ctx = common::xhyve_manager();
    ctx.new_cmd().arg("list").assert().success().stdout(predicate::str::is_empty());

    ctx.create_linux("zulu");
    ctx.create_linux("alpha");
    fs::create_dir(ctx.root.path().join("not-a-machine")).unwrap();

    let out = ctx.new_cmd().arg("list").assert().success().get_output().stdout.clone();
    let out = String::from_utf8(out).unwrap();
    let names: Vec<&str> = out.lines().map(|l| l.split_whitespace().next().unwrap()).collect();
    assert_eq!(names, vec!["alpha", "zulu"]);
}

#[test]
fn test_info() {
    let ctx = common::xhyve_manager();
    ctx.create_linux("infovm");
    let uuid = ctx.config_value("infovm", "boot", "uuid").unwrap();

    ctx.new_cmd()
	.args(["info", "infovm"])
	.assert()
	.success()
	.stdout(predicate::str::contains("machine_name = infovm\n"))
	.stdout(predicate::str::contains(format!("boot_uuid = {}\n", uuid)))
	.stdout(predicate::str::contains("memory_size = 1G\n"))
	.stdout(predicate::str::contains("acpi_enabled = false\n"));
}

#[test]
fn test_info_requires_name() {
    let mut ctx = common::xhyve_manager();
    ctx.cmd
	.arg("info")
	.assert()
	.failure()
	.code(1)
	.stderr(predicate::str::contains("You need to specify a machine name"));
}

#[test]
fn test_edit_reloads_config() {
    let ctx = common::xhyve_manager();
    ctx.create_linux("editme");

    ctx.new_cmd()
	.args(["edit", "editme"])
	.env("EDITOR", "true")
	.assert()
	.success()
	.stdout(predicate::str::contains("Editing editme config with external editor: true"))
	.stdout(predicate::str::contains("Edited configuration for editme machine"))
	.stdout(predicate::str::contains("machine_name = editme"));

    ctx.new_cmd()
	.args(["edit", "editme"])
	.env("EDITOR", "false")
	.assert()
	.failure()
	.code(1);
}

#[test]
fn test_delete() {
    let ctx = common::xhyve_manager();
    ctx.create_linux("doomed");

    ctx.new_cmd()
	.args(["delete", "doomed"])
	.write_stdin("n\n")
	.assert()
	.success()
	.stdout(predicate::str::contains("Are you sure"));
    assert!(ctx.machine_dir("doomed").exists());

    ctx.new_cmd()
	.args(["delete", "doomed"])
	.write_stdin("y\n")
	.assert()
	.success()
	.stdout(predicate::str::contains("Deleted doomed"));
    assert!(!ctx.machine_dir("doomed").exists());
}

#[test]
fn test_delete_force() {
    let ctx = common::xhyve_manager();
    ctx.create_linux("gone");

    ctx.new_cmd()
	.args(["delete", "--force", "gone"])
	.assert()
	.success()
	.stdout(predicate::str::contains("Are you sure").not());
    assert!(!ctx.machine_dir("gone").exists());

    ctx.new_cmd().args(["delete", "-f", "gone"]).assert().failure().code(1);
}

#[test]
fn test_extract() {
    let ctx = common::xhyve_manager();
    let iso = ctx.root.path().join("archlinux.iso");
    let output = ctx.root.path().join("tmp.iso");
    let mut data = vec![0x33u8; 2048];
    data.extend(std::iter::repeat(0x7fu8).take(8192));
    fs::write(&iso, &data).unwrap();

    ctx.new_cmd()
	.arg("extract")
	.arg(&iso)
	.arg("--output")
	.arg(&output)
	.assert()
	.success()
	.stdout(predicate::str::contains("you need to mount"));

    let result = fs::read(&output).unwrap();
    assert_eq!(result.len(), data.len());
    assert!(result[..2048].iter().all(|b| *b == 0));
    assert_eq!(&result[2048..], &data[2048..]);
}

#[test]
fn test_extract_onto_itself_keeps_iso() {
    let ctx = common::xhyve_manager();
    let iso = ctx.root.path().join("archlinux.iso");
    let data = vec![0x5au8; 4096];
    fs::write(&iso, &data).unwrap();

    ctx.new_cmd()
	.arg("extract")
	.arg(&iso)
	.arg("-o")
	.arg(&iso)
	.assert()
	.code(1)
	.stderr(predicate::str::contains("is the ISO being extracted"));

    assert_eq!(fs::read(&iso).unwrap(), data);
}

#[test]
fn test_setup_respects_settings() {
    let ctx = common::xhyve_manager();
    let exports = ctx.root.path().join("exports");
    let settings = ctx.root.path().join("settings.toml");
    fs::write(&settings, format!("exports_file = \"{}\"\nnfs_mapall = \"502\"\n", exports.display())).unwrap();

    let assert = ctx.new_cmd().arg("setup").assert();
    if common::is_root() {
	let content = fs::read_to_string(&exports).unwrap();
	assert!(content.contains("# BEGIN XHYVE"));
	assert!(content.contains("-mapall=502"));
    } else {
	assert
	    .failure()
	    .code(1)
	    .stderr(predicate::str::contains("setup needs to be run as root"));
	assert!(!exports.exists());
    }
}

#[test]
fn test_bad_settings_file() {
    let ctx = common::xhyve_manager();
    fs::write(ctx.root.path().join("settings.toml"), "editor = [1, 2]\n").unwrap();

    ctx.new_cmd()
	.arg("list")
	.assert()
	.failure()
	.code(1)
	.stderr(predicate::str::contains("expecting editor as a string"));
}

#[test]
fn test_usage_errors_exit_one() {
    let mut ctx = common::xhyve_manager();
    ctx.cmd.assert().failure().code(1);

    ctx.new_cmd().arg("reboot").assert().failure().code(1);

    ctx.new_cmd()
	.arg("--help")
	.assert()
	.success()
	.stdout(predicate::str::contains("extract"));
}
