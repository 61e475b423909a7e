//! `ParsedTargets.xml`: the raw per-target scans, before any aggregation.
//!
//! Useful for diffing what the toolchain reports between SDK releases.

use crate::config::{library_display_name, XSD_NAMESPACE, XSI_NAMESPACE};
use crate::error::BspError;
use crate::scan::{BuildConfiguration, ProbeError, TargetScan, ToolchainProbe};
use crate::xml::Element;

fn configuration_node(name: &str, cfg: &BuildConfiguration) -> Element {
    let mut node = Element::new(name);
    for (list, items) in [
        ("SourceFiles", &cfg.sources),
        ("HeaderFiles", &cfg.headers),
        ("IncludeDirectories", &cfg.include_dirs),
        ("NormalPreprocessorMacros", &cfg.macros),
        ("HexFiles", &cfg.hex_files),
    ] {
        node.append(list).extend_strings(items.iter().cloned());
    }
    let mut script = Element::new("LinkerScript");
    script.text = cfg.linker_script.clone();
    node.push(script);
    node
}

fn target_node(scan: &TargetScan) -> Element {
    let mut target = Element::new("Target");
    target.push(Element::text_node("ID", scan.id.as_str()));
    target.push(Element::text_node("Features", scan.features.join(";")));
    target.push(configuration_node("BaseConfiguration", &scan.base));
    target.push(Element::text_node("CFLAGS", scan.cpu_flags.join(";")));

    let derived = target.append("DerivedConfigurations");
    for lib in &scan.libraries {
        let node = derived.append("DerivedConfiguration");
        node.push(Element::text_node("Library", lib.id.as_str()));
        node.push(Element::text_node("LibraryName", library_display_name(&lib.id)));
        node.push(configuration_node("Configuration", &lib.configuration));
    }
    target
}

/// `ParsedTargetList` document for the given scans, in order.
pub fn parsed_target_list(scans: &[TargetScan]) -> Element {
    let mut root = Element::new("ParsedTargetList")
        .with_attr("xmlns:xsi", XSI_NAMESPACE)
        .with_attr("xmlns:xsd", XSD_NAMESPACE);
    root.append("Targets")
        .children
        .extend(scans.iter().map(target_node));
    root
}

/// Scan every target the probe knows, skipping unsupported ones.
pub fn scan_all(probe: &dyn ToolchainProbe) -> Result<Vec<TargetScan>, BspError> {
    let ids = probe.target_ids();
    let mut scans = Vec::with_capacity(ids.len());
    for id in &ids {
        match probe.scan(id) {
            Ok(scan) => scans.push(scan),
            Err(ProbeError::Unsupported { target, reason }) => {
                tracing::warn!(target_id = %target, %reason, "target skipped: unsupported");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(scans)
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
    use crate::scan::{LibraryScan, ManifestProbe};
    use crate::xml;

    #[test]
    fn target_fields_are_written() {
        let mut scan = TargetScan::new("K64F");
        scan.features = vec!["LWIP".into(), "STORAGE".into()];
        scan.cpu_flags = vec!["-mcpu=cortex-m4".into(), "-mthumb".into()];
        scan.base.sources = vec!["main.c".into()];
        scan.base.linker_script = Some("K64F.ld".into());
        scan.libraries.push(LibraryScan {
            id: "rtos".into(),
            source_dirs: vec!["rtos".into()],
            dependencies: Vec::new(),
            configuration: BuildConfiguration::default(),
        });

        let doc = parsed_target_list(&[scan]);
        let target = doc.find("Targets/Target").unwrap();
        assert_eq!(target.find("Features").unwrap().text(), Some("LWIP;STORAGE"));
        assert_eq!(target.find("CFLAGS").unwrap().text(), Some("-mcpu=cortex-m4;-mthumb"));
        assert_eq!(target.find("BaseConfiguration/SourceFiles").unwrap().strings(), ["main.c"]);
        assert_eq!(
            target.find("BaseConfiguration/LinkerScript").unwrap().text(),
            Some("K64F.ld")
        );
        let derived = target.find("DerivedConfigurations/DerivedConfiguration").unwrap();
        assert_eq!(derived.find("Library").unwrap().text(), Some("rtos"));
        assert_eq!(
            derived.find("LibraryName").unwrap().text(),
            Some("RTOS abstraction layer")
        );
        assert!(derived.find("Configuration/LinkerScript").unwrap().text().is_none());
    }

    #[test]
    fn document_survives_serialisation() {
        let doc = parsed_target_list(&[TargetScan::new("A"), TargetScan::new("B")]);
        let text = xml::to_string(&doc).unwrap();
        let back = xml::parse(&text).unwrap();
        assert_eq!(back.find("Targets").unwrap().children.len(), 2);
    }

    #[test]
    fn unsupported_targets_are_skipped() {
        let probe = ManifestProbe::from_json(
            r#"{ "targets": [ { "id": "A" }, { "id": "B", "unsupported": "no GCC" } ] }"#,
        )
        .unwrap();
        let scans = scan_all(&probe).unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].id.as_str(), "A");
    }
}
