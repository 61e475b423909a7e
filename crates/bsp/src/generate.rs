//! The `generate` pipeline: scan, filter, aggregate, build nodes, write.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use linker_script::{parse_linker_script, LinkerProbe, MemoryRegion};
use walkdir::WalkDir;

use crate::condition::aggregate;
use crate::config::{GeneratorConfig, SAMPLES_DIR, SAMPLE_MARKER};
use crate::deny::ignore_reason;
use crate::dump::scan_all;
use crate::emit::{emit, template_family_id};
use crate::error::BspError;
use crate::hexfiles::hex_report;
use crate::mcu::build_mcu;
use crate::scan::{TargetId, TargetScan, ToolchainProbe};
use crate::xml;

/// Why a scanned target is left out of the BSP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoResources,
    NoLinkerScript,
    Ignored(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoResources => f.write_str("no resources"),
            SkipReason::NoLinkerScript => f.write_str("no linker script"),
            SkipReason::Ignored(reason) => write!(f, "ignored: {reason}"),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub emitted: Vec<TargetId>,
    pub skipped: Vec<(TargetId, SkipReason)>,
    /// Targets the toolchain cannot build at all.
    pub unsupported: usize,
    pub output: PathBuf,
    pub hex_report: PathBuf,
}

/// Split scans into emitted targets and skipped ones, in order.
///
/// Filtering happens before aggregation so that "universal" is judged over
/// exactly the emitted targets.
pub fn select_targets(
    scans: Vec<TargetScan>,
    include_ignored: bool,
) -> (Vec<TargetScan>, Vec<(TargetId, SkipReason)>) {
    let mut kept = Vec::with_capacity(scans.len());
    let mut skipped = Vec::new();
    for scan in scans {
        let reason = if !scan.base.has_path_artifacts() {
            Some(SkipReason::NoResources)
        } else if scan.base.linker_script.is_none() {
            Some(SkipReason::NoLinkerScript)
        } else if include_ignored {
            None
        } else {
            ignore_reason(scan.id.as_str()).map(SkipReason::Ignored)
        };
        match reason {
            Some(reason) => {
                tracing::info!(target_id = %scan.id, %reason, "target skipped");
                skipped.push((scan.id, reason));
            }
            None => kept.push(scan),
        }
    }
    (kept, skipped)
}

/// `samples/<name>` for every sample directory under the SDK, sorted.
/// A directory counts only if it holds a `sample.xml`.
pub fn discover_samples(sdk_root: &Path) -> Result<Vec<String>, BspError> {
    let dir = sdk_root.join(SAMPLES_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut samples = Vec::new();
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_dir() || !entry.path().join(SAMPLE_MARKER).is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            samples.push(format!("{SAMPLES_DIR}/{name}"));
        }
    }
    Ok(samples)
}

/// Memory regions of `script`, via the linker when one is configured.
pub fn load_regions(script: &Path, linker: Option<&Path>) -> Result<Vec<MemoryRegion>, BspError> {
    let regions = match linker {
        Some(linker) => LinkerProbe::new(linker).probe(script)?,
        None => parse_linker_script(script)?,
    };
    Ok(regions)
}

/// Run the whole generator and write `BSP.xml` and `hexfiles.txt`.
pub fn generate(config: &GeneratorConfig, probe: &dyn ToolchainProbe) -> Result<GenerationReport, BspError> {
    let template = xml::parse(&config.template_text()?)?;
    let family_id = template_family_id(&template)?;
    let linker_data = config.load_linker_data()?;

    let known = probe.target_ids().len();
    let scans = scan_all(probe)?;
    let unsupported = known.saturating_sub(scans.len());

    let hex_path = config.hex_report_path();
    write_file(&hex_path, &hex_report(&scans))?;

    let (targets, skipped) = select_targets(scans, config.include_ignored);
    let agg = aggregate(&targets);

    let mut mcus = Vec::with_capacity(targets.len());
    for scan in &targets {
        // select_targets only keeps targets with a script.
        let Some(script) = &scan.base.linker_script else {
            continue;
        };
        let regions = load_regions(&config.sdk_root.join(script), config.linker.as_deref())?;
        tracing::debug!(target_id = %scan.id, regions = regions.len(), "memory map loaded");
        mcus.push(build_mcu(scan, &regions, &agg, &family_id, linker_data.get(&scan.id)));
    }

    let samples = discover_samples(&config.sdk_root)?;
    let bsp = emit(template, &agg, mcus, &samples)?;

    let output = config.output_path();
    write_file(&output, &xml::to_string(&bsp)?)?;
    tracing::info!(path = %output.display(), targets = targets.len(), "BSP written");

    Ok(GenerationReport {
        emitted: targets.into_iter().map(|t| t.id).collect(),
        skipped,
        unsupported,
        output,
        hex_report: hex_path,
    })
}

/// Write the `ParsedTargets.xml` dump of every supported target.
pub fn dump_targets(probe: &dyn ToolchainProbe, output: &Path) -> Result<usize, BspError> {
    let scans = scan_all(probe)?;
    let doc = crate::dump::parsed_target_list(&scans);
    write_file(output, &xml::to_string(&doc)?)?;
    tracing::info!(path = %output.display(), targets = scans.len(), "target dump written");
    Ok(scans.len())
}

fn write_file(path: &Path, contents: &str) -> Result<(), BspError> {
    fs::write(path, contents).map_err(|source| BspError::Io {
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

    fn scan(id: &str, sources: &[&str], script: Option<&str>) -> TargetScan {
        let mut s = TargetScan::new(id);
        s.base.sources = sources.iter().map(|s| s.to_string()).collect();
        s.base.linker_script = script.map(str::to_string);
        s
    }

    #[test]
    fn skips_are_decided_in_order() {
        let (kept, skipped) = select_targets(
            vec![
                scan("EMPTY", &[], Some("e.ld")),
                scan("NOSCRIPT", &["a.c"], None),
                scan("NRF52_DK", &["a.c"], Some("n.ld")),
                scan("K64F", &["a.c"], Some("k.ld")),
            ],
            false,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id.as_str(), "K64F");
        let reasons: Vec<_> = skipped.iter().map(|(_, r)| r.clone()).collect();
        assert_eq!(
            reasons,
            [
                SkipReason::NoResources,
                SkipReason::NoLinkerScript,
                SkipReason::Ignored("Hex file problem"),
            ]
        );
    }

    #[test]
    fn alltargets_keeps_denied_targets() {
        let (kept, skipped) = select_targets(vec![scan("NRF52_DK", &["a.c"], Some("n.ld"))], true);
        assert_eq!(kept.len(), 1);
        assert!(skipped.is_empty());
    }

    #[test]
    fn samples_need_marker_file() {
        let sdk = tempfile::tempdir().unwrap();
        let samples = sdk.path().join("samples");
        for name in ["Blink", "USBMouse", "scratch"] {
            fs::create_dir_all(samples.join(name)).unwrap();
        }
        fs::write(samples.join("Blink/sample.xml"), "<sample/>").unwrap();
        fs::write(samples.join("USBMouse/sample.xml"), "<sample/>").unwrap();
        fs::write(samples.join("README.txt"), "").unwrap();

        assert_eq!(
            discover_samples(sdk.path()).unwrap(),
            ["samples/Blink", "samples/USBMouse"]
        );
    }

    #[test]
    fn missing_samples_dir_is_empty() {
        let sdk = tempfile::tempdir().unwrap();
        assert!(discover_samples(sdk.path()).unwrap().is_empty());
    }

    #[test]
    fn skip_reason_display() {
        assert_eq!(SkipReason::NoLinkerScript.to_string(), "no linker script");
        assert_eq!(SkipReason::Ignored("Hex file problem").to_string(), "ignored: Hex file problem");
    }
}
