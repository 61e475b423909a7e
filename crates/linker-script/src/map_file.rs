//! Memory regions from a GNU ld map file, and the probe that produces one.
//!
//! Some vendor scripts compute their `MEMORY` block with preprocessor
//! macros or symbols that a text scan cannot resolve. Linking an empty
//! object against the script makes the linker do the arithmetic; the
//! resulting map file lists every region in a fixed tabular layout:
//!
//! ```text
//! Memory Configuration
//!
//! Name             Origin             Length             Attributes
//! FLASH            0x08000000         0x00080000         xr
//! RAM              0x20000000         0x00018000         xrw
//! *default*        0x00000000         0xffffffff
//!
//! Linker script and memory map
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::LinkerScriptError;
use crate::memory::MemoryRegion;

const SECTION_START: &str = "Memory Configuration";
const SECTION_END: &str = "Linker script and memory map";

// Literal pattern, exercised by the tests below.
#[allow(clippy::unwrap_used)]
fn memory_row() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^ \t]+)[ \t]+0x([0-9a-fA-F]+)[ \t]+0x([0-9a-fA-F]+)").unwrap()
    })
}

/// Extract the regions listed under `Memory Configuration` in a map file.
pub fn parse_map_file(map: &str) -> Vec<MemoryRegion> {
    map.lines()
        .skip_while(|l| !l.contains(SECTION_START))
        .take_while(|l| !l.contains(SECTION_END))
        .filter_map(|l| {
            let caps = memory_row().captures(l)?;
            let start = u64::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
            let size = u64::from_str_radix(caps.get(3)?.as_str(), 16).ok()?;
            Some(MemoryRegion::new(caps.get(1)?.as_str(), start, size))
        })
        .filter(|r| !r.is_placeholder())
        .collect()
}

/// Runs an external GCC driver against a linker script to obtain its
/// resolved memory map.
#[derive(Debug, Clone)]
pub struct LinkerProbe {
    linker: PathBuf,
}

impl LinkerProbe {
    /// `linker` is a GCC driver such as `arm-none-eabi-gcc`, either a bare
    /// name resolved through `PATH` or a full path.
    pub fn new(linker: impl Into<PathBuf>) -> Self {
        Self {
            linker: linker.into(),
        }
    }

    /// Link an empty translation unit against `script` and parse the map.
    ///
    /// The link itself is expected to fail (there is no entry point); only
    /// the map file matters, so the exit status is logged and ignored.
    ///
    /// # Errors
    ///
    /// Fails when the scratch directory cannot be created, the linker cannot
    /// be started, or no map file was written.
    pub fn probe(&self, script: &Path) -> Result<Vec<MemoryRegion>, LinkerScriptError> {
        let scratch = tempfile::tempdir().map_err(LinkerScriptError::Scratch)?;
        let source = scratch.path().join("LinkerScriptQuery.c");
        let map = scratch.path().join("LinkerScriptQuery.map");
        fs::write(&source, "").map_err(LinkerScriptError::Scratch)?;

        let output = Command::new(&self.linker)
            .arg("-T")
            .arg(script)
            .arg(&source)
            .arg(format!("-Wl,-Map,{}", map.display()))
            .args(["-Wl,--defsym,__Vectors=0", "-Wl,--defsym,Stack_Size=0"])
            .output()
            .map_err(|source| LinkerScriptError::Spawn {
                linker: self.linker.clone(),
                source,
            })?;

        if !output.status.success() {
            tracing::debug!(
                script = %script.display(),
                status = %output.status,
                "probe link failed (expected for an empty object)"
            );
        }

        let text = fs::read_to_string(&map).map_err(|_| LinkerScriptError::NoMapFile {
            linker: self.linker.clone(),
            script: script.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })?;

        Ok(parse_map_file(&text))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    const MAP: &str = "\
Archive member included to satisfy reference by file (symbol)

Memory Configuration

Name             Origin             Length             Attributes
FLASH            0x08000000         0x00080000         xr
RAM              0x20000000         0x00018000         xrw
BACKUP           0x40024000         0x00000000         rw
*default*        0x00000000         0xffffffffffffffff

Linker script and memory map

LOAD /tmp/LinkerScriptQuery.o
STACK            0x20018000         0x00000400
";

    #[test]
    fn reads_rows_between_section_markers() {
        let regions = parse_map_file(MAP);
        assert_eq!(
            regions,
            vec![
                MemoryRegion::new("FLASH", 0x0800_0000, 0x0008_0000),
                MemoryRegion::new("RAM", 0x2000_0000, 0x0001_8000),
            ]
        );
    }

    #[test]
    fn default_and_empty_rows_are_excluded() {
        let regions = parse_map_file(MAP);
        assert!(regions.iter().all(|r| r.name != "*default*"));
        assert!(regions.iter().all(|r| r.name != "BACKUP"));
    }

    #[test]
    fn rows_outside_the_section_are_ignored() {
        let regions = parse_map_file(MAP);
        assert!(regions.iter().all(|r| r.name != "STACK"));
    }

    #[test]
    fn missing_section_yields_nothing() {
        assert!(parse_map_file("FLASH 0x0 0x100\n").is_empty());
    }

    /// Writes the map named by `-Wl,-Map,` and fails the link, as a real
    /// driver does for an object without an entry point.
    #[cfg(unix)]
    const FAILING_LINK: &str = r##"
for arg in "$@"; do
  case "$arg" in
    -Wl,-Map,*) map="${arg#-Wl,-Map,}" ;;
  esac
done
cat > "$map" <<'MAP'
Memory Configuration

Name             Origin             Length             Attributes
FLASH            0x08000000         0x00080000         xr
*default*        0x00000000         0xffffffff

Linker script and memory map
MAP
echo "undefined reference to main" >&2
exit 1
"##;

    #[cfg(unix)]
    fn fake_driver(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-gcc");
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn failed_link_still_yields_map_regions() {
        let dir = tempfile::tempdir().unwrap();
        let driver = fake_driver(dir.path(), FAILING_LINK);

        let regions = LinkerProbe::new(driver).probe(Path::new("x.ld")).unwrap();
        assert_eq!(regions, vec![MemoryRegion::new("FLASH", 0x0800_0000, 0x0008_0000)]);
    }

    #[cfg(unix)]
    #[test]
    fn driver_without_map_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let driver = fake_driver(dir.path(), "echo boom >&2\nexit 1\n");

        match LinkerProbe::new(&driver).probe(Path::new("x.ld")) {
            Err(LinkerScriptError::NoMapFile { linker, script, stderr }) => {
                assert_eq!(linker, driver);
                assert_eq!(script, Path::new("x.ld"));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected NoMapFile, got {other:?}"),
        }
    }

    #[test]
    fn missing_linker_is_a_spawn_error() {
        let probe = LinkerProbe::new("definitely-not-a-real-gcc-driver");
        let err = probe.probe(Path::new("missing.ld")).unwrap_err();
        assert!(matches!(err, LinkerScriptError::Spawn { .. }));
    }
}
