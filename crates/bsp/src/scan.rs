//! Per-target scan records and the seam to the SDK's build toolchain.
//!
//! The toolchain itself (target database, resource scanner, config system)
//! is external. Whatever drives it produces one immutable [`TargetScan`]
//! per target; everything downstream is a pure function of those records.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of one hardware target, e.g. `NUCLEO_F401RE`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// What the resource scanner reported for one directory tree and target.
///
/// Paths are relative to the SDK root and may use either separator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfiguration {
    /// C, C++ and assembly sources.
    pub sources: Vec<String>,
    pub headers: Vec<String>,
    pub include_dirs: Vec<String>,
    /// Toolchain symbols followed by config-system macros, `NAME` or `NAME=VALUE`.
    pub macros: Vec<String>,
    pub linker_script: Option<String>,
    /// Softdevice / bootloader images that must be merged after linking.
    pub hex_files: Vec<String>,
}

impl BuildConfiguration {
    /// Whether the scan found any file or directory at all.
    pub fn has_path_artifacts(&self) -> bool {
        !(self.sources.is_empty() && self.headers.is_empty() && self.include_dirs.is_empty())
    }
}

/// An optional library scanned for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryScan {
    pub id: String,
    /// Directories the library was scanned from; other libraries name
    /// their dependencies by these.
    #[serde(default)]
    pub source_dirs: Vec<String>,
    /// Source directories or IDs of libraries this one requires.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(flatten)]
    pub configuration: BuildConfiguration,
}

/// Everything the toolchain reported for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetScan {
    pub id: TargetId,
    #[serde(default)]
    pub features: Vec<String>,
    /// CPU/ABI compiler flags, e.g. `-mcpu=cortex-m4`.
    #[serde(default)]
    pub cpu_flags: Vec<String>,
    #[serde(default)]
    pub base: BuildConfiguration,
    #[serde(default)]
    pub libraries: Vec<LibraryScan>,
}

impl TargetScan {
    pub fn new(id: impl Into<TargetId>) -> Self {
        Self {
            id: id.into(),
            features: Vec::new(),
            cpu_flags: Vec::new(),
            base: BuildConfiguration::default(),
            libraries: Vec::new(),
        }
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The toolchain cannot build this target; the run skips it.
    #[error("target {target} is not supported: {reason}")]
    Unsupported { target: TargetId, reason: String },
    #[error("target {0} is not known to the toolchain")]
    UnknownTarget(TargetId),
    #[error("cannot read scan manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed scan manifest {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Build-introspection backend.
pub trait ToolchainProbe {
    /// Every target the toolchain knows, in its preferred order.
    fn target_ids(&self) -> Vec<TargetId>;

    /// Scan one target.
    ///
    /// # Errors
    ///
    /// [`ProbeError::Unsupported`] for targets the toolchain refuses to
    /// configure; callers skip those. Anything else aborts the run.
    fn scan(&self, target: &TargetId) -> Result<TargetScan, ProbeError>;
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestTarget {
    #[serde(default)]
    unsupported: Option<String>,
    #[serde(flatten)]
    scan: TargetScan,
}

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    targets: Vec<ManifestTarget>,
}

/// [`ToolchainProbe`] backed by a JSON dump of the toolchain's scans.
#[derive(Debug, Clone, Default)]
pub struct ManifestProbe {
    order: Vec<TargetId>,
    records: HashMap<TargetId, ManifestTarget>,
}

impl ManifestProbe {
    pub fn load(path: &Path) -> Result<Self, ProbeError> {
        let text = fs::read_to_string(path).map_err(|source| ProbeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ProbeError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse manifest text. A target listed twice keeps its first position
    /// and its last record.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let manifest: Manifest = serde_json::from_str(text)?;
        let mut probe = Self::default();
        for record in manifest.targets {
            let id = record.scan.id.clone();
            if probe.records.insert(id.clone(), record).is_some() {
                tracing::warn!(target_id = %id, "duplicate target record in manifest, keeping the last one");
            } else {
                probe.order.push(id);
            }
        }
        Ok(probe)
    }
}

impl ToolchainProbe for ManifestProbe {
    fn target_ids(&self) -> Vec<TargetId> {
        self.order.clone()
    }

    fn scan(&self, target: &TargetId) -> Result<TargetScan, ProbeError> {
        let record = self
            .records
            .get(target)
            .ok_or_else(|| ProbeError::UnknownTarget(target.clone()))?;
        match &record.unsupported {
            Some(reason) => Err(ProbeError::Unsupported {
                target: target.clone(),
                reason: reason.clone(),
            }),
            None => Ok(record.scan.clone()),
        }
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

    const MANIFEST: &str = r#"{
        "targets": [
            {
                "id": "K64F",
                "features": ["LWIP"],
                "cpu_flags": ["-mcpu=cortex-m4", "-mthumb"],
                "base": {
                    "sources": ["targets\\K64F\\system.c"],
                    "linker_script": "targets/K64F/K64F.ld"
                },
                "libraries": [
                    { "id": "rtos", "source_dirs": ["rtos"], "dependencies": ["platform"],
                      "sources": ["rtos/Thread.cpp"], "macros": ["MBED_CONF_RTOS_PRESENT=1"] }
                ]
            },
            { "id": "LPC2368", "unsupported": "no GCC_ARM support" },
            { "id": "KL25Z" }
        ]
    }"#;

    #[test]
    fn manifest_preserves_target_order() {
        let probe = ManifestProbe::from_json(MANIFEST).unwrap();
        let ids: Vec<_> = probe.target_ids().iter().map(|t| t.to_string()).collect();
        assert_eq!(ids, ["K64F", "LPC2368", "KL25Z"]);
    }

    #[test]
    fn manifest_record_fields_are_read() {
        let probe = ManifestProbe::from_json(MANIFEST).unwrap();
        let scan = probe.scan(&TargetId::new("K64F")).unwrap();
        assert_eq!(scan.features, ["LWIP"]);
        assert_eq!(scan.base.sources, ["targets\\K64F\\system.c"]);
        assert_eq!(scan.base.linker_script.as_deref(), Some("targets/K64F/K64F.ld"));
        assert!(scan.base.headers.is_empty());

        let rtos = &scan.libraries[0];
        assert_eq!(rtos.id, "rtos");
        assert_eq!(rtos.dependencies, ["platform"]);
        assert_eq!(rtos.configuration.sources, ["rtos/Thread.cpp"]);
        assert_eq!(rtos.configuration.macros, ["MBED_CONF_RTOS_PRESENT=1"]);
    }

    #[test]
    fn unsupported_target_reports_reason() {
        let probe = ManifestProbe::from_json(MANIFEST).unwrap();
        match probe.scan(&TargetId::new("LPC2368")) {
            Err(ProbeError::Unsupported { reason, .. }) => assert_eq!(reason, "no GCC_ARM support"),
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn empty_record_is_a_target_without_resources() {
        let probe = ManifestProbe::from_json(MANIFEST).unwrap();
        let scan = probe.scan(&TargetId::new("KL25Z")).unwrap();
        assert!(!scan.base.has_path_artifacts());
        assert!(scan.base.linker_script.is_none());
    }

    #[test]
    fn unknown_target_is_an_error() {
        let probe = ManifestProbe::from_json(MANIFEST).unwrap();
        assert!(matches!(
            probe.scan(&TargetId::new("NOPE")),
            Err(ProbeError::UnknownTarget(_))
        ));
    }

    #[test]
    fn duplicate_record_keeps_first_position_last_value() {
        let probe = ManifestProbe::from_json(
            r#"{ "targets": [ { "id": "A" }, { "id": "B" }, { "id": "A", "features": ["X"] } ] }"#,
        )
        .unwrap();
        assert_eq!(probe.target_ids(), [TargetId::new("A"), TargetId::new("B")]);
        assert_eq!(probe.scan(&TargetId::new("A")).unwrap().features, ["X"]);
    }
}
