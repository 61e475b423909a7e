//! Runs the built `bspgen` binary against a throwaway SDK tree.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const SCRIPT: &str = "MEMORY\n{\n  FLASH (rx) : ORIGIN = 0x08000000, LENGTH = 256K\n  RAM (rwx) : ORIGIN = 0x20000000, LENGTH = 64K\n}\n";

const MANIFEST: &str = r#"{
  "targets": [
    { "id": "DISCO_F051R8",
      "cpu_flags": ["-mcpu=cortex-m0", "-mthumb"],
      "base": { "sources": ["main.c", "targets/f0.c"], "linker_script": "f0.ld" } },
    { "id": "NUCLEO_L073RZ",
      "cpu_flags": ["-mcpu=cortex-m0plus", "-mthumb"],
      "base": { "sources": ["main.c", "targets/l0.c"], "linker_script": "l0.ld" } },
    { "id": "LPC2368", "unsupported": "ARM7 is not supported" }
  ]
}"#;

fn bspgen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bspgen"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to spawn bspgen")
}

fn sdk(root: &Path) {
    fs::write(root.join("f0.ld"), SCRIPT).unwrap();
    fs::write(root.join("l0.ld"), SCRIPT).unwrap();
    fs::write(root.join("manifest.json"), MANIFEST).unwrap();
}

#[test]
fn memory_prints_regions_and_totals() {
    let dir = tempfile::tempdir().unwrap();
    sdk(dir.path());
    let out = bspgen(&["memory", dir.path().join("f0.ld").to_str().unwrap()]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("FLASH"));
    assert!(stdout.contains("RAM total: 65536"));
    assert!(stdout.contains("FLASH total: 262144"));
}

#[test]
fn generate_writes_bsp_and_hex_report() {
    let dir = tempfile::tempdir().unwrap();
    sdk(dir.path());
    let root = dir.path().to_str().unwrap();
    let manifest = dir.path().join("manifest.json");
    let out = bspgen(&[
        "generate",
        "--sdk-root",
        root,
        "--manifest",
        manifest.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let bsp = fs::read_to_string(dir.path().join("BSP.xml")).unwrap();
    assert!(bsp.contains("<ID>DISCO_F051R8</ID>"));
    assert!(bsp.contains("<ID>NUCLEO_L073RZ</ID>"));
    assert!(bsp.contains("$$SYS:BSP_ROOT$$/main.c"));
    assert!(dir.path().join("hexfiles.txt").is_file());
}

#[test]
fn dump_targets_writes_parsed_target_list() {
    let dir = tempfile::tempdir().unwrap();
    sdk(dir.path());
    let manifest = dir.path().join("manifest.json");
    let out = bspgen(&[
        "dump-targets",
        "--sdk-root",
        dir.path().to_str().unwrap(),
        "--manifest",
        manifest.to_str().unwrap(),
    ]);
    assert!(out.status.success());
    let dump = fs::read_to_string(dir.path().join("ParsedTargets.xml")).unwrap();
    assert!(dump.contains("<ParsedTargetList"));
    assert!(dump.contains("<CFLAGS>-mcpu=cortex-m0;-mthumb</CFLAGS>"));
    assert!(!dump.contains("LPC2368"));
}

#[test]
fn missing_manifest_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = bspgen(&[
        "generate",
        "--sdk-root",
        dir.path().to_str().unwrap(),
        "--manifest",
        dir.path().join("absent.json").to_str().unwrap(),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("scan manifest"));
}
