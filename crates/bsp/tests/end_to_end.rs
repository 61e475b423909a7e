//! End-to-end tests: scan manifest + SDK tree on disk → BSP.xml on disk.
//!
//! No mocks beyond the manifest-backed probe. Uses tempdirs for the SDK.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::indexing_slicing)]

use std::fs;
use std::path::Path;

use bsp::xml::{self, Element};
use bsp::{generate, BspError, GeneratorConfig, ManifestProbe, SkipReason, TargetId};
use tempfile::TempDir;

const K64F_LD: &str = r#"
MEMORY
{
  m_interrupts (RX) : ORIGIN = 0x00000000, LENGTH = 0x00000400
  m_text       (RX) : ORIGIN = 0x00000410, LENGTH = 0x000FFBF0
  m_data       (RW) : ORIGIN = 0x1FFF0000, LENGTH = 0x00010000
  m_data_2     (RW) : ORIGIN = 0x20000000, LENGTH = 0x00030000
}
"#;

const NUCLEO_LD: &str = r#"
/* Linker script for STM32F401RE */
MEMORY {
  FLASH (rx) : ORIGIN = 0x08000000, LENGTH = 512K
  RAM (rwx)  : ORIGIN = 0x20000194, LENGTH = 96K - 0x194
}
"#;

const MANIFEST: &str = r#"{
  "targets": [
    {
      "id": "K64F",
      "features": ["LWIP"],
      "cpu_flags": ["-mcpu=cortex-m4", "-mthumb", "-mfloat-abi=softfp", "-mfpu=fpv4-sp-d16"],
      "base": {
        "sources": ["targets\\K64F\\a.c", "common.c"],
        "headers": ["mbed.h"],
        "include_dirs": [".", "targets/K64F"],
        "macros": ["TARGET_K64F", "FEATURE_LWIP=1", "MBED_CONF_PLATFORM_STDIO_BAUD_RATE=9600"],
        "linker_script": "targets/K64F/K64F.ld",
        "hex_files": []
      },
      "libraries": [
        { "id": "rtos", "source_dirs": ["rtos"], "dependencies": ["features"],
          "sources": ["rtos/Thread.cpp", "rtos/rtx/TARGET_M4/irq.S"],
          "include_dirs": ["rtos"], "macros": ["MBED_CONF_RTOS_PRESENT=1"] },
        { "id": "features", "source_dirs": ["features"], "dependencies": ["rtos"],
          "sources": ["features/lwip/lwip.c"], "include_dirs": ["features/lwip"],
          "macros": ["MBED_CONF_LWIP_IPV6_ENABLED=0", "MBED_CONF_LWIP_IPV4_ENABLED=1"] }
      ]
    },
    {
      "id": "NUCLEO_F401RE",
      "cpu_flags": ["-mcpu=cortex-m4", "-mthumb"],
      "base": {
        "sources": ["targets/NUCLEO_F401RE/b.c", "common.c"],
        "headers": ["mbed.h"],
        "include_dirs": [".", "targets/NUCLEO_F401RE"],
        "macros": ["TARGET_NUCLEO_F401RE", "MBED_CONF_PLATFORM_STDIO_BAUD_RATE=9600"],
        "linker_script": "targets/NUCLEO_F401RE/F401.ld"
      },
      "libraries": [
        { "id": "rtos", "source_dirs": ["rtos"], "dependencies": ["features"],
          "sources": ["rtos/Thread.cpp", "rtos/rtx/TARGET_M3/irq.S"],
          "include_dirs": ["rtos"], "macros": ["MBED_CONF_RTOS_PRESENT=1"] },
        { "id": "features", "source_dirs": ["features"], "macros": ["MBED_CONF_LWIP_IPV4_ENABLED=1"] }
      ]
    },
    {
      "id": "NRF52_DK",
      "base": {
        "sources": ["targets/NRF52/c.c", "common.c"],
        "linker_script": "targets/NRF52/nrf52.ld",
        "hex_files": ["targets/NRF52/s132_nrf52_softdevice.hex"]
      }
    },
    { "id": "LPC2368", "unsupported": "target not supported by GCC_ARM" },
    { "id": "KL25Z", "base": { "sources": ["targets/KL25Z/d.c"] } }
  ]
}"#;

struct Sdk {
    dir: TempDir,
}

impl Sdk {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sdk = Self { dir };
        sdk.write("targets/K64F/K64F.ld", K64F_LD);
        sdk.write("targets/NUCLEO_F401RE/F401.ld", NUCLEO_LD);
        sdk.write("targets/NRF52/nrf52.ld", NUCLEO_LD);
        sdk.write("samples/Blink/sample.xml", "<EmbeddedProjectSample/>");
        sdk.write("samples/Thread/sample.xml", "<EmbeddedProjectSample/>");
        fs::create_dir_all(sdk.root().join("samples/.scratch")).unwrap();
        sdk
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, rel: &str, text: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn config(&self) -> GeneratorConfig {
        GeneratorConfig::new(self.root())
    }

    fn read_bsp(&self) -> Element {
        xml::parse(&fs::read_to_string(self.root().join("BSP.xml")).unwrap()).unwrap()
    }
}

fn probe() -> ManifestProbe {
    ManifestProbe::from_json(MANIFEST).unwrap()
}

fn strings(el: &Element, path: &str) -> Vec<String> {
    el.find(path)
        .unwrap_or_else(|| panic!("missing <{path}>"))
        .strings()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn mcu<'a>(bsp: &'a Element, id: &str) -> &'a Element {
    bsp.find("SupportedMCUs")
        .unwrap()
        .children
        .iter()
        .find(|m| m.find("ID").and_then(Element::text) == Some(id))
        .unwrap_or_else(|| panic!("no MCU {id}"))
}

fn framework<'a>(bsp: &'a Element, id: &str) -> &'a Element {
    let full = format!("com.sysprogs.arm.mbed.{id}");
    bsp.find("Frameworks")
        .unwrap()
        .children
        .iter()
        .find(|f| f.find("ID").and_then(Element::text) == Some(full.as_str()))
        .unwrap_or_else(|| panic!("no framework {id}"))
}

#[test]
fn shared_source_lands_on_family_and_unique_sources_on_their_mcu() {
    let sdk = Sdk::new();
    let report = generate(&sdk.config(), &probe()).unwrap();
    assert_eq!(
        report.emitted,
        [TargetId::new("K64F"), TargetId::new("NUCLEO_F401RE")]
    );

    let bsp = sdk.read_bsp();
    assert_eq!(
        strings(&bsp, "MCUFamilies/MCUFamily/AdditionalSourceFiles"),
        ["$$SYS:BSP_ROOT$$/common.c", "$$SYS:BSP_ROOT$$/stubs.cpp"]
    );
    assert_eq!(
        strings(&bsp, "MCUFamilies/MCUFamily/CompilationFlags/IncludeDirectories"),
        ["$$SYS:BSP_ROOT$$"]
    );
    assert_eq!(
        strings(&bsp, "MCUFamilies/MCUFamily/CompilationFlags/PreprocessorMacros"),
        ["MBED_CONF_PLATFORM_STDIO_BAUD_RATE=9600"]
    );

    let k64f = mcu(&bsp, "K64F");
    assert_eq!(
        strings(k64f, "AdditionalSourceFiles"),
        ["$$SYS:BSP_ROOT$$/targets/K64F/a.c"]
    );
    let nucleo = mcu(&bsp, "NUCLEO_F401RE");
    assert_eq!(
        strings(nucleo, "AdditionalSourceFiles"),
        ["$$SYS:BSP_ROOT$$/targets/NUCLEO_F401RE/b.c"]
    );
    assert!(strings(nucleo, "AdditionalHeaderFiles").is_empty());
}

#[test]
fn skipped_targets_do_not_affect_universality() {
    let sdk = Sdk::new();
    let report = generate(&sdk.config(), &probe()).unwrap();

    let skipped: Vec<_> = report
        .skipped
        .iter()
        .map(|(id, reason)| (id.as_str().to_string(), reason.clone()))
        .collect();
    assert_eq!(
        skipped,
        [
            ("NRF52_DK".to_string(), SkipReason::Ignored("Hex file problem")),
            ("KL25Z".to_string(), SkipReason::NoLinkerScript),
        ]
    );
    assert_eq!(report.unsupported, 1);

    // mbed.h is on both emitted targets but not on the skipped NRF52_DK.
    let bsp = sdk.read_bsp();
    assert_eq!(
        strings(&bsp, "MCUFamilies/MCUFamily/AdditionalHeaderFiles"),
        ["$$SYS:BSP_ROOT$$/mbed.h"]
    );
}

#[test]
fn mcu_carries_flags_properties_and_memory() {
    let sdk = Sdk::new();
    generate(&sdk.config(), &probe()).unwrap();
    let bsp = sdk.read_bsp();

    let k64f = mcu(&bsp, "K64F");
    assert_eq!(k64f.find("FamilyID").unwrap().text(), Some("MBED"));
    assert_eq!(
        k64f.find("CompilationFlags/COMMONFLAGS").unwrap().text(),
        Some("-mcpu=cortex-m4 -mthumb -mfpu=fpv4-sp-d16 $$com.sysprogs.bspoptions.arm.floatmode$$")
    );
    assert_eq!(
        k64f.find("CompilationFlags/LinkerScript").unwrap().text(),
        Some("$$SYS:BSP_ROOT$$/targets/K64F/K64F.ld")
    );
    let props = k64f
        .find("ConfigurableProperties/PropertyGroups/PropertyGroup/Properties")
        .unwrap();
    assert_eq!(props.children.len(), 3);
    assert_eq!(k64f.find("FLASHBase").unwrap().text(), Some("1040"));
    assert_eq!(k64f.find("FLASHSize").unwrap().text(), Some("1047536"));
    assert_eq!(k64f.find("RAMSize").unwrap().text(), Some("65536"));
    assert_eq!(k64f.find("MemoryMap/Memories").unwrap().children.len(), 4);

    let nucleo = mcu(&bsp, "NUCLEO_F401RE");
    assert_eq!(nucleo.find("FLASHSize").unwrap().text(), Some("524288"));
    assert_eq!(nucleo.find("RAMBase").unwrap().text(), Some("536871316"));
    assert_eq!(nucleo.find("RAMSize").unwrap().text(), Some("97900"));
    let memories = nucleo.find("MemoryMap/Memories").unwrap();
    assert_eq!(memories.children[0].find("Flags").unwrap().text(), Some("IsDefaultFLASH"));
}

#[test]
fn frameworks_are_scoped_to_their_targets() {
    let sdk = Sdk::new();
    generate(&sdk.config(), &probe()).unwrap();
    let bsp = sdk.read_bsp();

    let rtos = framework(&bsp, "rtos");
    assert!(rtos.find("MCUFilterRegex").is_none());
    assert_eq!(rtos.find("UserFriendlyName").unwrap().text(), Some("RTOS abstraction layer"));
    assert_eq!(strings(rtos, "RequiredFrameworks"), ["com.sysprogs.arm.mbed.features"]);
    assert_eq!(strings(rtos, "AdditionalIncludeDirs"), ["$$SYS:BSP_ROOT$$/rtos"]);
    assert_eq!(strings(rtos, "AdditionalPreprocessorMacros"), ["MBED_CONF_RTOS_PRESENT=1"]);

    // NUCLEO_F401RE scanned the features library without any file, so the
    // framework is K64F-only and its macros are not conditioned on NUCLEO.
    let features = framework(&bsp, "features");
    assert_eq!(features.find("MCUFilterRegex").unwrap().text(), Some("K64F"));
    assert_eq!(
        strings(features, "AdditionalPreprocessorMacros"),
        [
            "MBED_CONF_LWIP_IPV4_ENABLED=$$com.sysprogs.bspoptions.lwip.ipv4_en$$",
            "MBED_CONF_LWIP_IPV6_ENABLED=$$com.sysprogs.bspoptions.lwip.ipv6_en$$",
        ]
    );

    let file_conditions = &bsp.find("FileConditions").unwrap().children;
    let conditioned: Vec<_> = file_conditions
        .iter()
        .map(|c| {
            (
                c.find("FilePath").unwrap().text().unwrap().to_string(),
                c.find("ConditionToInclude/Regex").unwrap().text().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        conditioned,
        [
            ("$$SYS:BSP_ROOT$$/rtos/rtx/TARGET_M3/irq.S".to_string(), "NUCLEO_F401RE".to_string()),
            ("$$SYS:BSP_ROOT$$/rtos/rtx/TARGET_M4/irq.S".to_string(), "K64F".to_string()),
        ]
    );
    assert!(bsp.find("ConditionalFlags").unwrap().children.is_empty());
}

#[test]
fn alltargets_includes_denied_targets() {
    let sdk = Sdk::new();
    let mut config = sdk.config();
    config.include_ignored = true;
    let report = generate(&config, &probe()).unwrap();
    assert_eq!(report.emitted.len(), 3);

    // With NRF52_DK emitted, mbed.h is no longer universal.
    let bsp = sdk.read_bsp();
    assert!(strings(&bsp, "MCUFamilies/MCUFamily/AdditionalHeaderFiles").is_empty());
    assert_eq!(
        strings(&bsp, "MCUFamilies/MCUFamily/AdditionalSourceFiles"),
        ["$$SYS:BSP_ROOT$$/common.c", "$$SYS:BSP_ROOT$$/stubs.cpp"]
    );
    let rtos = framework(&bsp, "rtos");
    assert_eq!(rtos.find("MCUFilterRegex").unwrap().text(), Some("K64F|NUCLEO_F401RE"));
}

#[test]
fn hex_report_and_examples_are_written() {
    let sdk = Sdk::new();
    let report = generate(&sdk.config(), &probe()).unwrap();
    assert_eq!(
        fs::read_to_string(&report.hex_report).unwrap(),
        "NRF52_DK\n\ttargets/NRF52/s132_nrf52_softdevice.hex\n"
    );
    let bsp = sdk.read_bsp();
    assert_eq!(strings(&bsp, "Examples"), ["samples/Blink", "samples/Thread"]);
    assert_eq!(
        bsp.attr("xmlns:xsi"),
        Some("http://www.w3.org/2001/XMLSchema-instance")
    );
}

#[test]
fn linker_data_overrides_sizes() {
    let sdk = Sdk::new();
    sdk.write(
        "linker_data.json",
        r#"{ "K64F": { "RAM": "192K", "FLASH": 1048576 } }"#,
    );
    let mut config = sdk.config();
    config.linker_data = Some(sdk.root().join("linker_data.json"));
    generate(&config, &probe()).unwrap();

    let bsp = sdk.read_bsp();
    let k64f = mcu(&bsp, "K64F");
    assert_eq!(k64f.find("RAMSize").unwrap().text(), Some("196608"));
    assert_eq!(k64f.find("FLASHSize").unwrap().text(), Some("1048576"));
}

/// GCC stand-in: writes a fixed map for whatever script it is given.
#[cfg(unix)]
const FAKE_DRIVER: &str = r##"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    -Wl,-Map,*) map="${arg#-Wl,-Map,}" ;;
  esac
done
cat > "$map" <<'MAP'
Memory Configuration

Name             Origin             Length             Attributes
FLASH            0x00000400         0x00200000         xr
RAM              0x20000000         0x00040000         xrw
*default*        0x00000000         0xffffffff

Linker script and memory map
MAP
exit 1
"##;

#[cfg(unix)]
#[test]
fn linker_resolves_memory_instead_of_text_scan() {
    use std::os::unix::fs::PermissionsExt;

    let sdk = Sdk::new();
    sdk.write("tools/fake-gcc", FAKE_DRIVER);
    let driver = sdk.root().join("tools/fake-gcc");
    fs::set_permissions(&driver, fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = sdk.config();
    config.linker = Some(driver);
    generate(&config, &probe()).unwrap();

    let bsp = sdk.read_bsp();
    let k64f = mcu(&bsp, "K64F");
    assert_eq!(k64f.find("FLASHBase").unwrap().text(), Some("1024"));
    assert_eq!(k64f.find("FLASHSize").unwrap().text(), Some("2097152"));
    assert_eq!(k64f.find("RAMBase").unwrap().text(), Some("536870912"));
    assert_eq!(k64f.find("RAMSize").unwrap().text(), Some("262144"));
    assert_eq!(k64f.find("MemoryMap/Memories").unwrap().children.len(), 2);
}

#[test]
fn missing_linker_script_aborts() {
    let sdk = Sdk::new();
    fs::remove_file(sdk.root().join("targets/K64F/K64F.ld")).unwrap();
    assert!(matches!(
        generate(&sdk.config(), &probe()),
        Err(BspError::LinkerScript(_))
    ));
}

#[test]
fn custom_output_path_is_honoured() {
    let sdk = Sdk::new();
    let out = sdk.root().join("out/custom.xml");
    fs::create_dir_all(out.parent().unwrap()).unwrap();
    let mut config = sdk.config();
    config.output = Some(out.clone());
    let report = generate(&config, &probe()).unwrap();
    assert_eq!(report.output, out);
    assert!(out.is_file());
    assert!(!sdk.root().join("BSP.xml").exists());
}
