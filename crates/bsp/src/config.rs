//! Generator configuration and the fixed vocabulary of the BSP format.
//!
//! Path-like and ID-like strings the IDE interprets are defined here rather
//! than spelled out at each use site.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::BspError;
use crate::scan::TargetId;

/// IDE variable expanding to the installed BSP directory.
pub const BSP_ROOT_VAR: &str = "$$SYS:BSP_ROOT$$";

/// IDE variable expanding to the selected MCU's ID.
pub const MCU_ID_VAR: &str = "$$SYS:MCU_ID$$";

/// Prefix of every framework ID.
pub const FRAMEWORK_PREFIX: &str = "com.sysprogs.arm.mbed.";

/// `HierarchicalPath` given to every MCU.
pub const HIERARCHICAL_PATH: &str = "Mbed";

/// Source file added to the family so newlib syscalls link.
pub const STUB_SOURCE: &str = "stubs.cpp";

pub const BSP_FILE_NAME: &str = "BSP.xml";
pub const HEX_REPORT_FILE_NAME: &str = "hexfiles.txt";
pub const PARSED_TARGETS_FILE_NAME: &str = "ParsedTargets.xml";
pub const SAMPLES_DIR: &str = "samples";
pub const SAMPLE_MARKER: &str = "sample.xml";

pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Skeleton used when no `--template` is given.
pub const DEFAULT_TEMPLATE: &str = include_str!("../data/bsp_template.xml");

/// Human-readable names for the SDK's optional libraries.
const LIBRARY_NAMES: &[(&str, &str)] = &[
    ("cpputest", "CppUTest"),
    ("usb_host", "USB Host support"),
    ("usb", "USB Device support"),
    ("ublox", "U-blox drivers"),
    ("rtos", "RTOS abstraction layer"),
    ("dsp", "DSP Library"),
    ("rpc", "RPC Support"),
    ("fat", "FAT File System support"),
    ("eth", "Ethernet support"),
    ("rtx", "Keil RTX RTOS"),
    ("features", "Device features"),
];

/// Friendly name for library `id`, falling back to `"<id> library"`.
pub fn library_display_name(id: &str) -> String {
    LIBRARY_NAMES
        .iter()
        .find(|(k, _)| *k == id)
        .map(|(_, v)| (*v).to_string())
        .unwrap_or_else(|| format!("{id} library"))
}

/// Everything one `generate` run needs to know.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Root of the SDK tree; linker scripts and samples are resolved here.
    pub sdk_root: PathBuf,
    /// Template skeleton; `None` uses [`DEFAULT_TEMPLATE`].
    pub template: Option<PathBuf>,
    /// Optional per-target RAM/FLASH size overrides.
    pub linker_data: Option<PathBuf>,
    /// Output document; `None` writes `<sdk_root>/BSP.xml`.
    pub output: Option<PathBuf>,
    /// Emit targets on the deny-list too.
    pub include_ignored: bool,
    /// GCC driver used to resolve memory maps; `None` scans `MEMORY` blocks.
    pub linker: Option<PathBuf>,
}

impl GeneratorConfig {
    pub fn new(sdk_root: impl Into<PathBuf>) -> Self {
        Self {
            sdk_root: sdk_root.into(),
            template: None,
            linker_data: None,
            output: None,
            include_ignored: false,
            linker: None,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.sdk_root.join(BSP_FILE_NAME))
    }

    pub fn hex_report_path(&self) -> PathBuf {
        self.sdk_root.join(HEX_REPORT_FILE_NAME)
    }

    /// Template text, from `--template` or the built-in default.
    pub fn template_text(&self) -> Result<String, BspError> {
        match &self.template {
            Some(path) => read_file(path),
            None => Ok(DEFAULT_TEMPLATE.to_string()),
        }
    }

    pub fn load_linker_data(&self) -> Result<LinkerData, BspError> {
        match &self.linker_data {
            Some(path) => LinkerData::load(path),
            None => Ok(LinkerData::default()),
        }
    }
}

/// A size as written in `linker_data.json`: a number, or an expression
/// such as `"256K"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Expr(String),
}

impl SizeValue {
    pub fn bytes(&self) -> Option<u64> {
        match self {
            SizeValue::Bytes(n) => Some(*n),
            SizeValue::Expr(e) => linker_script::eval_size(e),
        }
    }
}

/// Hand-maintained memory sizes for targets whose linker scripts
/// under-report them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SizeOverride {
    #[serde(rename = "RAM")]
    pub ram: SizeValue,
    #[serde(rename = "FLASH")]
    pub flash: SizeValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LinkerData(BTreeMap<TargetId, SizeOverride>);

impl LinkerData {
    pub fn load(path: &Path) -> Result<Self, BspError> {
        let text = read_file(path)?;
        Self::from_json(&text).map_err(|source| BspError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn get(&self, target: &TargetId) -> Option<&SizeOverride> {
        self.0.get(target)
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String, BspError> {
    fs::read_to_string(path).map_err(|source| BspError::Io {
        path: path.to_path_buf(),
        source,
    })
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

    #[test]
    fn known_libraries_have_friendly_names() {
        assert_eq!(library_display_name("rtos"), "RTOS abstraction layer");
        assert_eq!(library_display_name("features"), "Device features");
    }

    #[test]
    fn unknown_library_name_falls_back_to_id() {
        assert_eq!(library_display_name("events"), "events library");
    }

    #[test]
    fn default_output_is_inside_sdk_root() {
        let cfg = GeneratorConfig::new("/sdk");
        assert_eq!(cfg.output_path(), PathBuf::from("/sdk/BSP.xml"));
        assert_eq!(cfg.hex_report_path(), PathBuf::from("/sdk/hexfiles.txt"));
    }

    #[test]
    fn linker_data_accepts_numbers_and_expressions() {
        let data = LinkerData::from_json(
            r#"{ "K64F": { "RAM": 262144, "FLASH": "1M" }, "KL25Z": { "RAM": "0x4000", "FLASH": "128K" } }"#,
        )
        .unwrap();
        let k64f = data.get(&TargetId::new("K64F")).unwrap();
        assert_eq!(k64f.ram.bytes(), Some(262_144));
        assert_eq!(k64f.flash.bytes(), Some(1_048_576));
        let kl25z = data.get(&TargetId::new("KL25Z")).unwrap();
        assert_eq!(kl25z.ram.bytes(), Some(0x4000));
        assert!(data.get(&TargetId::new("NRF52_DK")).is_none());
    }

    #[test]
    fn default_template_parses() {
        let root = crate::xml::parse(DEFAULT_TEMPLATE).unwrap();
        assert!(root.find("MCUFamilies/MCUFamily/ID").is_some());
    }
}
