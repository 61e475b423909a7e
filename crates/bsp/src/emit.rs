//! Grafting aggregated artifacts into the BSP template.
//!
//! Universal artifacts land on the family node once. Per-target artifacts
//! are already on the MCU nodes built by [`crate::mcu`]. Library artifacts
//! become frameworks, with file and flag conditions for whatever only part
//! of a framework's targets need.

use std::collections::BTreeSet;

use crate::condition::{target_regex, Aggregate, ArtifactKind};
use crate::config::{BSP_ROOT_VAR, MCU_ID_VAR, STUB_SOURCE, XSD_NAMESPACE, XSI_NAMESPACE};
use crate::error::BspError;
use crate::library::{framework_id, LibraryDescriptor};
use crate::scan::TargetId;
use crate::xml::Element;

const FAMILY_PATH: &str = "MCUFamilies/MCUFamily";

fn node<'a>(root: &'a mut Element, path: &str) -> Result<&'a mut Element, BspError> {
    root.find_mut(path)
        .ok_or_else(|| BspError::TemplateNode(path.to_string()))
}

/// ID of the template's MCU family.
pub fn template_family_id(template: &Element) -> Result<String, BspError> {
    let path = format!("{FAMILY_PATH}/ID");
    template
        .find(&path)
        .and_then(Element::text)
        .map(str::to_string)
        .ok_or(BspError::TemplateNode(path))
}

fn matches_targets(targets: &BTreeSet<TargetId>) -> Element {
    let mut cond = Element::new("Condition").with_attr("xsi:type", "MatchesRegex");
    cond.push(Element::text_node("Expression", MCU_ID_VAR));
    cond.push(Element::text_node("Regex", target_regex(targets)));
    cond
}

fn file_condition(path: &str, targets: &BTreeSet<TargetId>) -> Element {
    let mut cond = Element::new("FileCondition");
    let mut include = matches_targets(targets);
    include.name = "ConditionToInclude".to_string();
    cond.push(include);
    cond.push(Element::text_node("FilePath", path));
    cond
}

fn flag_condition(framework: &str, list: &str, value: &str, targets: &BTreeSet<TargetId>) -> Element {
    let mut references = Element::new("Condition").with_attr("xsi:type", "ReferencesFramework");
    references.push(Element::text_node("FrameworkID", framework));

    let mut both = Element::new("FlagCondition").with_attr("xsi:type", "And");
    let args = both.append("Arguments");
    args.push(references);
    args.push(matches_targets(targets));

    let mut cond = Element::new("ConditionalToolFlags");
    cond.push(both);
    cond.provide_path(&format!("Flags/{list}"))
        .extend_strings([value]);
    cond
}

/// Framework node plus the conditions it contributes.
#[derive(Debug, Default)]
struct FrameworkParts {
    framework: Element,
    file_conditions: Vec<Element>,
    flag_conditions: Vec<Element>,
}

fn build_framework(lib: &LibraryDescriptor, total: usize) -> Result<FrameworkParts, BspError> {
    let id = lib.framework_id();
    let mut parts = FrameworkParts {
        framework: Element::new("EmbeddedFramework"),
        ..FrameworkParts::default()
    };

    for kind in ArtifactKind::ALL {
        for (artifact, set) in lib.map(kind).iter() {
            lib.check_scope(artifact, set)?;
            if lib.is_universal(set) {
                continue;
            }
            match kind {
                ArtifactKind::Source | ArtifactKind::Header => {
                    parts.file_conditions.push(file_condition(artifact, set));
                }
                ArtifactKind::IncludeDir => parts
                    .flag_conditions
                    .push(flag_condition(&id, "IncludeDirectories", artifact, set)),
                ArtifactKind::Macro => parts
                    .flag_conditions
                    .push(flag_condition(&id, "PreprocessorMacros", artifact, set)),
            }
        }
    }

    let fw = &mut parts.framework;
    if lib.supported_targets.len() != total {
        fw.push(Element::text_node("MCUFilterRegex", target_regex(&lib.supported_targets)));
    }
    fw.push(Element::text_node("ID", id.as_str()));
    fw.push(Element::text_node("ProjectFolderName", lib.id.as_str()));
    fw.push(Element::text_node("UserFriendlyName", lib.display_name()));
    fw.append("AdditionalSourceFiles").extend_strings(lib.sources.keys());
    fw.append("AdditionalHeaderFiles").extend_strings(lib.headers.keys());
    let supported = lib.supported_targets.len();
    fw.append("AdditionalIncludeDirs")
        .extend_strings(lib.include_dirs.universal(supported));
    fw.append("AdditionalPreprocessorMacros")
        .extend_strings(lib.macros.universal(supported));
    if !lib.dependency_ids.is_empty() {
        fw.append("RequiredFrameworks")
            .extend_strings(lib.dependency_ids.iter().map(|dep| framework_id(dep)));
    }
    Ok(parts)
}

/// Fill `template` with the aggregate, the prebuilt MCU nodes and the
/// sample directories (relative, `samples/<name>`).
///
/// # Errors
///
/// [`BspError::TemplateNode`] when the template lacks a node being filled,
/// [`BspError::ConditionOutOfScope`] when a library artifact names a target
/// outside the library's scope.
pub fn emit(
    mut template: Element,
    agg: &Aggregate,
    mcus: Vec<Element>,
    samples: &[String],
) -> Result<Element, BspError> {
    let total = agg.target_count();
    let mcu_count = mcus.len();

    let mut frameworks = Vec::new();
    let mut file_conditions = Vec::new();
    let mut flag_conditions = Vec::new();
    for lib in agg.libraries.values() {
        if lib.supported_targets.is_empty() {
            tracing::debug!(library = %lib.id, "library has no files on any emitted target, skipped");
            continue;
        }
        let parts = build_framework(lib, total)?;
        frameworks.push(parts.framework);
        file_conditions.extend(parts.file_conditions);
        flag_conditions.extend(parts.flag_conditions);
    }

    let framework_count = frameworks.len();
    node(&mut template, "SupportedMCUs")?.children.extend(mcus);

    let family = node(&mut template, FAMILY_PATH)?;
    let universal = |kind: ArtifactKind| agg.universal(kind);
    let flags = family.provide("CompilationFlags");
    flags
        .provide("IncludeDirectories")
        .extend_strings(universal(ArtifactKind::IncludeDir));
    flags
        .provide("PreprocessorMacros")
        .extend_strings(universal(ArtifactKind::Macro));
    let sources = family.provide("AdditionalSourceFiles");
    sources.extend_strings(universal(ArtifactKind::Source));
    sources.extend_strings([format!("{BSP_ROOT_VAR}/{STUB_SOURCE}")]);
    family
        .provide("AdditionalHeaderFiles")
        .extend_strings(universal(ArtifactKind::Header));

    node(&mut template, "Frameworks")?.children.extend(frameworks);
    node(&mut template, "FileConditions")?.children.extend(file_conditions);
    node(&mut template, "ConditionalFlags")?.children.extend(flag_conditions);
    node(&mut template, "Examples")?.extend_strings(samples.iter().cloned());

    template.set_attr("xmlns:xsi", XSI_NAMESPACE);
    template.set_attr("xmlns:xsd", XSD_NAMESPACE);

    tracing::info!(
        mcus = mcu_count,
        frameworks = framework_count,
        "BSP document assembled"
    );
    Ok(template)
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
    use crate::condition::aggregate;
    use crate::config::DEFAULT_TEMPLATE;
    use crate::scan::{BuildConfiguration, LibraryScan, TargetScan};
    use crate::xml;

    fn scan(id: &str, sources: &[&str]) -> TargetScan {
        let mut s = TargetScan::new(id);
        s.base.sources = sources.iter().map(|s| s.to_string()).collect();
        s
    }

    fn library(id: &str, deps: &[&str], sources: &[&str], incs: &[&str], macros: &[&str]) -> LibraryScan {
        LibraryScan {
            id: id.to_string(),
            source_dirs: vec![id.to_string()],
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            configuration: BuildConfiguration {
                sources: sources.iter().map(|s| s.to_string()).collect(),
                include_dirs: incs.iter().map(|s| s.to_string()).collect(),
                macros: macros.iter().map(|s| s.to_string()).collect(),
                ..BuildConfiguration::default()
            },
        }
    }

    fn template() -> Element {
        xml::parse(DEFAULT_TEMPLATE).unwrap()
    }

    fn strings(el: &Element, path: &str) -> Vec<String> {
        el.find(path)
            .unwrap()
            .strings()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn family_id_comes_from_template() {
        assert_eq!(template_family_id(&template()).unwrap(), "MBED");
        assert!(matches!(
            template_family_id(&Element::new("BoardSupportPackage")),
            Err(BspError::TemplateNode(_))
        ));
    }

    #[test]
    fn universal_artifacts_go_to_family_once() {
        let agg = aggregate(&[scan("A", &["a.c", "common.c"]), scan("B", &["b.c", "common.c"])]);
        let bsp = emit(template(), &agg, Vec::new(), &[]).unwrap();
        assert_eq!(
            strings(&bsp, "MCUFamilies/MCUFamily/AdditionalSourceFiles"),
            ["$$SYS:BSP_ROOT$$/common.c", "$$SYS:BSP_ROOT$$/stubs.cpp"]
        );
        assert_eq!(bsp.attr("xmlns:xsi"), Some(XSI_NAMESPACE));
        assert_eq!(bsp.attr("xmlns:xsd"), Some(XSD_NAMESPACE));
    }

    #[test]
    fn partial_framework_gets_filter_and_conditions() {
        let mut a = scan("A", &["a.c"]);
        a.libraries.push(library(
            "usb",
            &["rtos"],
            &["usb/core.c", "usb/only_a.c"],
            &["usb", "usb/a"],
            &["USB=1", "USB_A"],
        ));
        a.libraries.push(library("rtos", &[], &["rtos/rtos.c"], &[], &[]));
        let mut b = scan("B", &["b.c"]);
        b.libraries.push(library("usb", &["rtos"], &["usb/core.c"], &["usb"], &["USB=1"]));
        let mut c = scan("C", &["c.c"]);
        c.libraries.push(library("rtos", &[], &["rtos/rtos.c"], &[], &[]));

        let agg = aggregate(&[a, b, c]);
        let bsp = emit(template(), &agg, Vec::new(), &[]).unwrap();

        let frameworks = bsp.find("Frameworks").unwrap();
        let usb = frameworks
            .children
            .iter()
            .find(|f| f.find("ID").unwrap().text() == Some("com.sysprogs.arm.mbed.usb"))
            .unwrap();
        assert_eq!(usb.find("MCUFilterRegex").unwrap().text(), Some("A|B"));
        assert_eq!(usb.find("UserFriendlyName").unwrap().text(), Some("USB Device support"));
        assert_eq!(
            strings(usb, "AdditionalSourceFiles"),
            ["$$SYS:BSP_ROOT$$/usb/core.c", "$$SYS:BSP_ROOT$$/usb/only_a.c"]
        );
        assert_eq!(strings(usb, "AdditionalIncludeDirs"), ["$$SYS:BSP_ROOT$$/usb"]);
        assert_eq!(strings(usb, "AdditionalPreprocessorMacros"), ["USB=1"]);
        assert_eq!(strings(usb, "RequiredFrameworks"), ["com.sysprogs.arm.mbed.rtos"]);

        let file_conds = &bsp.find("FileConditions").unwrap().children;
        assert_eq!(file_conds.len(), 1);
        assert_eq!(
            file_conds[0].find("FilePath").unwrap().text(),
            Some("$$SYS:BSP_ROOT$$/usb/only_a.c")
        );
        let include = file_conds[0].find("ConditionToInclude").unwrap();
        assert_eq!(include.attr("xsi:type"), Some("MatchesRegex"));
        assert_eq!(include.find("Expression").unwrap().text(), Some("$$SYS:MCU_ID$$"));
        assert_eq!(include.find("Regex").unwrap().text(), Some("A"));

        let flag_conds = &bsp.find("ConditionalFlags").unwrap().children;
        assert_eq!(flag_conds.len(), 2);
        let args = flag_conds[0].find("FlagCondition/Arguments").unwrap();
        assert_eq!(args.children[0].attr("xsi:type"), Some("ReferencesFramework"));
        assert_eq!(
            args.children[0].find("FrameworkID").unwrap().text(),
            Some("com.sysprogs.arm.mbed.usb")
        );
        assert_eq!(args.children[1].find("Regex").unwrap().text(), Some("A"));
        assert_eq!(
            strings(&flag_conds[0], "Flags/IncludeDirectories"),
            ["$$SYS:BSP_ROOT$$/usb/a"]
        );
        assert_eq!(strings(&flag_conds[1], "Flags/PreprocessorMacros"), ["USB_A"]);

        let rtos = frameworks
            .children
            .iter()
            .find(|f| f.find("ID").unwrap().text() == Some("com.sysprogs.arm.mbed.rtos"))
            .unwrap();
        assert_eq!(rtos.find("MCUFilterRegex").unwrap().text(), Some("A|C"));
        assert!(rtos.find("RequiredFrameworks").is_none());
    }

    #[test]
    fn framework_on_every_target_has_no_filter() {
        let mut a = scan("A", &[]);
        a.libraries.push(library("dsp", &[], &["dsp/f.c"], &[], &[]));
        let mut b = scan("B", &[]);
        b.libraries.push(library("dsp", &[], &["dsp/f.c"], &[], &[]));
        let agg = aggregate(&[a, b]);
        let bsp = emit(template(), &agg, Vec::new(), &[]).unwrap();
        let fw = &bsp.find("Frameworks").unwrap().children[0];
        assert!(fw.find("MCUFilterRegex").is_none());
        assert!(bsp.find("FileConditions").unwrap().children.is_empty());
    }

    #[test]
    fn out_of_scope_artifact_aborts() {
        let mut a = scan("A", &[]);
        a.libraries.push(library("usb", &[], &["usb/a.c"], &[], &[]));
        let mut agg = aggregate(&[a, scan("B", &[])]);
        agg.libraries
            .get_mut("usb")
            .unwrap()
            .sources
            .insert("$$SYS:BSP_ROOT$$/usb/a.c", &TargetId::new("B"));

        match emit(template(), &agg, Vec::new(), &[]) {
            Err(BspError::ConditionOutOfScope { framework, artifact, .. }) => {
                assert_eq!(framework, "com.sysprogs.arm.mbed.usb");
                assert_eq!(artifact, "$$SYS:BSP_ROOT$$/usb/a.c");
            }
            other => panic!("expected ConditionOutOfScope, got {other:?}"),
        }
    }

    #[test]
    fn library_without_files_is_not_a_framework() {
        let mut a = scan("A", &["a.c"]);
        a.libraries.push(library("eth", &[], &[], &[], &["ETH=1"]));
        let agg = aggregate(&[a]);
        let bsp = emit(template(), &agg, Vec::new(), &[]).unwrap();
        assert!(bsp.find("Frameworks").unwrap().children.is_empty());
    }

    #[test]
    fn mcus_and_samples_are_grafted() {
        let agg = aggregate(&[scan("A", &["a.c"])]);
        let bsp = emit(
            template(),
            &agg,
            vec![Element::text_node("MCU", "placeholder")],
            &["samples/Blink".to_string()],
        )
        .unwrap();
        assert_eq!(bsp.find("SupportedMCUs").unwrap().children.len(), 1);
        assert_eq!(strings(&bsp, "Examples"), ["samples/Blink"]);
    }

    #[test]
    fn missing_template_node_is_reported() {
        let mut bare = template();
        bare.children.retain(|c| c.name != "ConditionalFlags");
        let agg = aggregate(&[scan("A", &["a.c"])]);
        assert!(matches!(
            emit(bare, &agg, Vec::new(), &[]),
            Err(BspError::TemplateNode(n)) if n == "ConditionalFlags"
        ));
    }
}
