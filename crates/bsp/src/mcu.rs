//! Per-target `<MCU>` nodes.

use linker_script::{total_flash, total_ram, MemoryRegion};

use crate::condition::{normalize_path, Aggregate, ArtifactKind};
use crate::config::{SizeOverride, HIERARCHICAL_PATH};
use crate::scan::TargetScan;
use crate::xml::Element;

pub const LWIP_IPV6_OPTION: &str = "com.sysprogs.bspoptions.lwip.ipv6_en";
pub const LWIP_IPV4_OPTION: &str = "com.sysprogs.bspoptions.lwip.ipv4_en";
pub const FLOAT_MODE_OPTION: &str = "com.sysprogs.bspoptions.arm.floatmode";

/// Macro marking targets that build the LWIP stack.
const LWIP_FEATURE_MACRO: &str = "FEATURE_LWIP=1";
const SOFTFP_FLAG: &str = "-mfloat-abi=softfp";

const ENABLE_DISABLE: &[(&str, &str)] = &[("enable", "1"), ("disable", "0")];
const FLOAT_MODES: &[(&str, &str)] = &[
    ("Software", "-mfloat-abi=soft"),
    ("Hardware", "-mfloat-abi=hard"),
    ("Hardware with Software interface", "-mfloat-abi=softfp"),
    ("Unspecified", ""),
];

/// First region that holds program code.
pub fn select_flash(regions: &[MemoryRegion]) -> Option<&MemoryRegion> {
    regions.iter().find(|r| {
        r.name.eq_ignore_ascii_case("FLASH")
            || matches!(r.name.as_str(), "m_text" | "ROM" | "rom" | "MFlash256")
    })
}

/// First region that holds data.
pub fn select_ram(regions: &[MemoryRegion]) -> Option<&MemoryRegion> {
    regions.iter().find(|r| {
        r.name.eq_ignore_ascii_case("RAM")
            || matches!(r.name.as_str(), "m_data" | "RAM_INTERN" | "SRAM1" | "RAM0")
            || r.name.starts_with("Ram0_")
    })
}

/// Base addresses and sizes reported on the MCU node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    pub flash_base: Option<u64>,
    pub flash_size: u64,
    pub ram_base: Option<u64>,
    pub ram_size: u64,
}

impl MemoryLayout {
    /// Sizes come from, in order: the override, the selected region, the
    /// sum over all regions of that kind.
    pub fn resolve(regions: &[MemoryRegion], sizes: Option<&SizeOverride>) -> Self {
        let flash = select_flash(regions);
        let ram = select_ram(regions);
        let flash_size = sizes
            .and_then(|s| s.flash.bytes())
            .or_else(|| flash.map(|r| r.size))
            .unwrap_or_else(|| total_flash(regions));
        let ram_size = sizes
            .and_then(|s| s.ram.bytes())
            .or_else(|| ram.map(|r| r.size))
            .unwrap_or_else(|| total_ram(regions));
        Self {
            flash_base: flash.map(|r| r.start),
            flash_size,
            ram_base: ram.map(|r| r.start),
            ram_size,
        }
    }
}

fn enumerated(name: &str, unique_id: &str, default_index: usize, choices: &[(&str, &str)]) -> Element {
    let mut entry = Element::new("PropertyEntry").with_attr("xsi:type", "Enumerated");
    entry.push(Element::text_node("Name", name));
    entry.push(Element::text_node("UniqueID", unique_id));
    entry.push(Element::text_node("DefaultEntryIndex", default_index.to_string()));
    let list = entry.append("SuggestionList");
    for (friendly, internal) in choices {
        let suggestion = list.append("Suggestion");
        suggestion.push(Element::text_node("UserFriendlyName", *friendly));
        suggestion.push(Element::text_node("InternalValue", *internal));
    }
    entry
}

fn memory_node(region: &MemoryRegion) -> Element {
    let mut mem = Element::new("MCUMemory");
    mem.push(Element::text_node("Name", region.name.as_str()));
    mem.push(Element::text_node("Address", region.start.to_string()));
    mem.push(Element::text_node("Size", region.size.to_string()));
    if region.name.eq_ignore_ascii_case("FLASH") {
        mem.push(Element::text_node("Flags", "IsDefaultFLASH"));
    }
    if region.name.eq_ignore_ascii_case("RAM") {
        mem.push(Element::text_node("LoadedFromMemory", "FLASH"));
    }
    mem
}

/// Build the `<MCU>` node for one emitted target.
///
/// `agg` must be the aggregate over exactly the emitted targets; artifacts
/// universal there belong to the family and are left out here.
pub fn build_mcu(
    scan: &TargetScan,
    regions: &[MemoryRegion],
    agg: &Aggregate,
    family_id: &str,
    sizes: Option<&SizeOverride>,
) -> Element {
    let target = &scan.id;
    let mut mcu = Element::new("MCU");
    mcu.push(Element::text_node("ID", target.as_str()));
    mcu.push(Element::text_node("HierarchicalPath", HIERARCHICAL_PATH));
    mcu.push(Element::text_node("FamilyID", family_id));

    let mut properties = Vec::new();
    if agg.target_defines(target, LWIP_FEATURE_MACRO) {
        properties.push(enumerated("LWIP IPV6 config", LWIP_IPV6_OPTION, 1, ENABLE_DISABLE));
        properties.push(enumerated("LWIP IPV4 config", LWIP_IPV4_OPTION, 0, ENABLE_DISABLE));
    }

    let mut cpu_flags = Vec::with_capacity(scan.cpu_flags.len());
    let mut float_mode = false;
    for flag in &scan.cpu_flags {
        if flag == SOFTFP_FLAG {
            float_mode = true;
        } else {
            cpu_flags.push(flag.clone());
        }
    }
    if float_mode {
        cpu_flags.push(format!("$${FLOAT_MODE_OPTION}$$"));
        properties.push(enumerated("Floating point support", FLOAT_MODE_OPTION, 2, FLOAT_MODES));
    }
    mcu.provide_path("ConfigurableProperties/PropertyGroups/PropertyGroup/Properties")
        .children
        .extend(properties);

    let total = agg.target_count();
    let conditional = |kind: ArtifactKind| agg.map(kind).conditional_for(total, target);

    let flags = mcu.append("CompilationFlags");
    flags
        .append("IncludeDirectories")
        .extend_strings(conditional(ArtifactKind::IncludeDir));
    flags
        .append("PreprocessorMacros")
        .extend_strings(conditional(ArtifactKind::Macro));
    flags.push(Element::text_node("COMMONFLAGS", cpu_flags.join(" ")));
    if let Some(script) = &scan.base.linker_script {
        flags.push(Element::text_node("LinkerScript", normalize_path(script)));
    }

    mcu.append("AdditionalSourceFiles")
        .extend_strings(conditional(ArtifactKind::Source));
    mcu.append("AdditionalHeaderFiles")
        .extend_strings(conditional(ArtifactKind::Header));

    if sizes.is_none() {
        tracing::debug!(target_id = %target, "no RAM and FLASH size override");
    }
    let layout = MemoryLayout::resolve(regions, sizes);
    if let Some(base) = layout.flash_base {
        mcu.push(Element::text_node("FLASHBase", base.to_string()));
    }
    mcu.push(Element::text_node("FLASHSize", layout.flash_size.to_string()));
    if let Some(base) = layout.ram_base {
        mcu.push(Element::text_node("RAMBase", base.to_string()));
    }
    mcu.push(Element::text_node("RAMSize", layout.ram_size.to_string()));

    mcu.provide_path("MemoryMap/Memories")
        .children
        .extend(regions.iter().map(memory_node));
    mcu
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
    use crate::config::SizeValue;

    fn regions() -> Vec<MemoryRegion> {
        vec![
            MemoryRegion::new("m_interrupts", 0, 0x400),
            MemoryRegion::new("m_text", 0x410, 0xFFBF0),
            MemoryRegion::new("m_data", 0x1FFF_0000, 0x10000),
            MemoryRegion::new("m_data_2", 0x2000_0000, 0x30000),
        ]
    }

    fn scan(id: &str, sources: &[&str], macros: &[&str], cpu: &[&str]) -> TargetScan {
        let mut s = TargetScan::new(id);
        s.base.sources = sources.iter().map(|s| s.to_string()).collect();
        s.base.macros = macros.iter().map(|s| s.to_string()).collect();
        s.cpu_flags = cpu.iter().map(|s| s.to_string()).collect();
        s.base.linker_script = Some(format!("targets\\{id}\\{id}.ld"));
        s
    }

    fn texts(mcu: &Element, path: &str) -> Vec<String> {
        mcu.find(path)
            .unwrap()
            .strings()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn named_regions_win_over_totals() {
        let layout = MemoryLayout::resolve(&regions(), None);
        assert_eq!(layout.flash_base, Some(0x410));
        assert_eq!(layout.flash_size, 0xFFBF0);
        assert_eq!(layout.ram_base, Some(0x1FFF_0000));
        assert_eq!(layout.ram_size, 0x10000);
    }

    #[test]
    fn unnamed_regions_fall_back_to_totals() {
        let regions = vec![
            MemoryRegion::new("IFLASH", 0, 0x8000),
            MemoryRegion::new("IRAM1", 0x1000_0000, 0x2000),
            MemoryRegion::new("IRAM2", 0x2000_0000, 0x2000),
        ];
        let layout = MemoryLayout::resolve(&regions, None);
        assert_eq!(layout.flash_base, None);
        assert_eq!(layout.flash_size, 0x8000);
        assert_eq!(layout.ram_size, 0x4000);
    }

    #[test]
    fn override_wins_over_regions() {
        let sizes = SizeOverride {
            ram: SizeValue::Expr("64K".into()),
            flash: SizeValue::Bytes(1_048_576),
        };
        let layout = MemoryLayout::resolve(&regions(), Some(&sizes));
        assert_eq!(layout.ram_size, 65_536);
        assert_eq!(layout.flash_size, 1_048_576);
        assert_eq!(layout.ram_base, Some(0x1FFF_0000));
    }

    #[test]
    fn ram0_prefix_is_recognised() {
        let regions = vec![MemoryRegion::new("Ram0_32", 0x1000_0000, 0x8000)];
        assert_eq!(select_ram(&regions).unwrap().name, "Ram0_32");
        assert!(select_flash(&regions).is_none());
    }

    #[test]
    fn mcu_lists_only_its_conditional_artifacts() {
        let scans = [
            scan("A", &["a.c", "common.c"], &["COMMON", "ONLY_A"], &[]),
            scan("B", &["b.c", "common.c"], &["COMMON"], &[]),
        ];
        let agg = aggregate(&scans);
        let mcu = build_mcu(&scans[0], &regions(), &agg, "MBED", None);

        assert_eq!(mcu.find("ID").unwrap().text(), Some("A"));
        assert_eq!(mcu.find("FamilyID").unwrap().text(), Some("MBED"));
        assert_eq!(texts(&mcu, "AdditionalSourceFiles"), ["$$SYS:BSP_ROOT$$/a.c"]);
        assert_eq!(texts(&mcu, "CompilationFlags/PreprocessorMacros"), ["ONLY_A"]);
        assert_eq!(
            mcu.find("CompilationFlags/LinkerScript").unwrap().text(),
            Some("$$SYS:BSP_ROOT$$/targets/A/A.ld")
        );
    }

    #[test]
    fn softfp_becomes_float_mode_option() {
        let scans = [scan("A", &["a.c"], &[], &["-mcpu=cortex-m4", "-mfloat-abi=softfp", "-mthumb"])];
        let agg = aggregate(&scans);
        let mcu = build_mcu(&scans[0], &[], &agg, "MBED", None);

        assert_eq!(
            mcu.find("CompilationFlags/COMMONFLAGS").unwrap().text(),
            Some("-mcpu=cortex-m4 -mthumb $$com.sysprogs.bspoptions.arm.floatmode$$")
        );
        let props = mcu
            .find("ConfigurableProperties/PropertyGroups/PropertyGroup/Properties")
            .unwrap();
        assert_eq!(props.children.len(), 1);
        let entry = &props.children[0];
        assert_eq!(entry.attr("xsi:type"), Some("Enumerated"));
        assert_eq!(entry.find("DefaultEntryIndex").unwrap().text(), Some("2"));
        assert_eq!(entry.find("SuggestionList").unwrap().children.len(), 4);
    }

    #[test]
    fn lwip_targets_get_ip_options() {
        let scans = [
            scan("A", &["a.c"], &["FEATURE_LWIP=1"], &[]),
            scan("B", &["b.c"], &[], &[]),
        ];
        let agg = aggregate(&scans);
        let path = "ConfigurableProperties/PropertyGroups/PropertyGroup/Properties";

        let a = build_mcu(&scans[0], &[], &agg, "MBED", None);
        let names: Vec<_> = a
            .find(path)
            .unwrap()
            .children
            .iter()
            .map(|p| p.find("Name").unwrap().text().unwrap())
            .collect();
        assert_eq!(names, ["LWIP IPV6 config", "LWIP IPV4 config"]);

        let b = build_mcu(&scans[1], &[], &agg, "MBED", None);
        assert!(b.find(path).unwrap().children.is_empty());
    }

    #[test]
    fn memory_map_marks_default_flash_and_ram() {
        let regions = vec![
            MemoryRegion::new("FLASH", 0x0800_0000, 0x80000),
            MemoryRegion::new("RAM", 0x2000_0000, 0x18000),
        ];
        let scans = [scan("A", &["a.c"], &[], &[])];
        let agg = aggregate(&scans);
        let mcu = build_mcu(&scans[0], &regions, &agg, "MBED", None);

        let memories = mcu.find("MemoryMap/Memories").unwrap();
        assert_eq!(memories.children.len(), 2);
        let flash = &memories.children[0];
        assert_eq!(flash.find("Address").unwrap().text(), Some("134217728"));
        assert_eq!(flash.find("Flags").unwrap().text(), Some("IsDefaultFLASH"));
        let ram = &memories.children[1];
        assert_eq!(ram.find("LoadedFromMemory").unwrap().text(), Some("FLASH"));
        assert_eq!(mcu.find("RAMSize").unwrap().text(), Some("98304"));
    }
}
