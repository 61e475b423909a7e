//! Optional libraries, emitted as IDE frameworks.
//!
//! A library is scoped to the targets for which its scan produced at least
//! one file or directory. Its own condition maps are relative to that scope,
//! not to the full target list.

use std::collections::{BTreeMap, BTreeSet};

use crate::condition::{ArtifactKind, ConditionMap};
use crate::config::{library_display_name, FRAMEWORK_PREFIX};
use crate::error::BspError;
use crate::scan::{LibraryScan, TargetId};

/// Config macros with fixed values that the IDE exposes as options.
const MACRO_REWRITES: &[(&str, &str)] = &[
    (
        "MBED_CONF_LWIP_IPV6_ENABLED=0",
        "MBED_CONF_LWIP_IPV6_ENABLED=$$com.sysprogs.bspoptions.lwip.ipv6_en$$",
    ),
    (
        "MBED_CONF_LWIP_IPV4_ENABLED=1",
        "MBED_CONF_LWIP_IPV4_ENABLED=$$com.sysprogs.bspoptions.lwip.ipv4_en$$",
    ),
];

/// Replace a fixed option value with its IDE placeholder.
pub fn rewrite_macro(symbol: &str) -> String {
    MACRO_REWRITES
        .iter()
        .find(|(from, _)| *from == symbol)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or_else(|| symbol.to_string())
}

/// Lookup key for a library source directory.
pub(crate) fn dir_key(dir: &str) -> String {
    dir.replace('\\', "/")
        .trim_start_matches("./")
        .trim_end_matches('/')
        .to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryDescriptor {
    pub id: String,
    /// Dependencies exactly as the scans named them.
    pub raw_dependencies: BTreeSet<String>,
    /// Library IDs the dependencies resolved to.
    pub dependency_ids: BTreeSet<String>,
    pub supported_targets: BTreeSet<TargetId>,
    pub sources: ConditionMap,
    pub headers: ConditionMap,
    pub include_dirs: ConditionMap,
    pub macros: ConditionMap,
}

impl LibraryDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Add one target's scan of this library.
    ///
    /// A scan without any path artifact leaves the library untouched for that
    /// target, macros included: a framework must never condition anything on
    /// a target it does not support. Macros listed in `target_macros` (the
    /// target's own base configuration) are already on its MCU or family
    /// node and are not repeated here.
    pub fn append(&mut self, target: &TargetId, scan: &LibraryScan, target_macros: &[String]) {
        self.raw_dependencies
            .extend(scan.dependencies.iter().cloned());

        let cfg = &scan.configuration;
        if !cfg.has_path_artifacts() {
            return;
        }
        self.supported_targets.insert(target.clone());
        self.sources.record(ArtifactKind::Source, cfg, target);
        self.headers.record(ArtifactKind::Header, cfg, target);
        self.include_dirs.record(ArtifactKind::IncludeDir, cfg, target);
        for symbol in cfg.macros.iter().filter(|m| !target_macros.contains(*m)) {
            self.macros.insert(rewrite_macro(symbol), target);
        }
    }

    pub fn map(&self, kind: ArtifactKind) -> &ConditionMap {
        match kind {
            ArtifactKind::Source => &self.sources,
            ArtifactKind::Header => &self.headers,
            ArtifactKind::IncludeDir => &self.include_dirs,
            ArtifactKind::Macro => &self.macros,
        }
    }

    /// Whether the artifact is needed by every target this library supports.
    pub fn is_universal(&self, set: &BTreeSet<TargetId>) -> bool {
        set.len() == self.supported_targets.len()
    }

    /// Fail if `set` names a target outside this library's scope.
    pub fn check_scope(&self, artifact: &str, set: &BTreeSet<TargetId>) -> Result<(), BspError> {
        let outside = set.difference(&self.supported_targets).count();
        if outside == 0 {
            return Ok(());
        }
        Err(BspError::ConditionOutOfScope {
            framework: self.framework_id(),
            artifact: artifact.to_string(),
            count: outside,
            supported: self.supported_targets.len(),
        })
    }

    pub fn framework_id(&self) -> String {
        framework_id(&self.id)
    }

    pub fn display_name(&self) -> String {
        library_display_name(&self.id)
    }
}

/// Framework ID for library `id`.
pub fn framework_id(id: &str) -> String {
    format!("{FRAMEWORK_PREFIX}{id}")
}

/// Resolve every library's raw dependencies to library IDs.
///
/// A dependency may be another library's ID or one of its source
/// directories. Anything else (core SDK directories, unscanned libraries)
/// is dropped. A library never depends on itself.
pub(crate) fn resolve_dependencies(
    libraries: &mut BTreeMap<String, LibraryDescriptor>,
    dir_to_library: &BTreeMap<String, String>,
) {
    let known: BTreeSet<String> = libraries.keys().cloned().collect();
    for lib in libraries.values_mut() {
        let mut resolved = BTreeSet::new();
        for dep in &lib.raw_dependencies {
            let id = if known.contains(dep) {
                Some(dep.clone())
            } else {
                dir_to_library.get(&dir_key(dep)).cloned()
            };
            match id {
                Some(id) if id != lib.id => {
                    resolved.insert(id);
                }
                Some(_) => {}
                None => tracing::debug!(library = %lib.id, dependency = %dep, "unresolved library dependency dropped"),
            }
        }
        lib.dependency_ids = resolved;
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
    use crate::scan::BuildConfiguration;

    fn lib_scan(id: &str, sources: &[&str], macros: &[&str]) -> LibraryScan {
        LibraryScan {
            id: id.to_string(),
            source_dirs: vec![id.to_string()],
            dependencies: Vec::new(),
            configuration: BuildConfiguration {
                sources: sources.iter().map(|s| s.to_string()).collect(),
                macros: macros.iter().map(|s| s.to_string()).collect(),
                ..BuildConfiguration::default()
            },
        }
    }

    #[test]
    fn lwip_option_macros_become_placeholders() {
        assert_eq!(
            rewrite_macro("MBED_CONF_LWIP_IPV6_ENABLED=0"),
            "MBED_CONF_LWIP_IPV6_ENABLED=$$com.sysprogs.bspoptions.lwip.ipv6_en$$"
        );
        assert_eq!(
            rewrite_macro("MBED_CONF_LWIP_IPV4_ENABLED=1"),
            "MBED_CONF_LWIP_IPV4_ENABLED=$$com.sysprogs.bspoptions.lwip.ipv4_en$$"
        );
        assert_eq!(rewrite_macro("MBED_CONF_LWIP_IPV4_ENABLED=0"), "MBED_CONF_LWIP_IPV4_ENABLED=0");
    }

    #[test]
    fn empty_scan_does_not_extend_scope() {
        let mut lib = LibraryDescriptor::new("rtos");
        lib.append(&TargetId::new("A"), &lib_scan("rtos", &["rtos/a.c"], &["X=1"]), &[]);
        lib.append(&TargetId::new("B"), &lib_scan("rtos", &[], &["X=1"]), &[]);

        assert_eq!(lib.supported_targets.len(), 1);
        let set = lib.macros.get("X=1").unwrap();
        assert!(lib.is_universal(set));
        assert!(lib.check_scope("X=1", set).is_ok());
    }

    #[test]
    fn macros_the_target_already_defines_are_not_repeated() {
        let mut lib = LibraryDescriptor::new("features");
        let base = vec!["FEATURE_LWIP=1".to_string()];
        lib.append(
            &TargetId::new("K64F"),
            &lib_scan(
                "features",
                &["features/netsocket/a.c"],
                &["FEATURE_LWIP=1", "MBED_CONF_NSAPI_PRESENT=1"],
            ),
            &base,
        );

        assert!(lib.macros.get("FEATURE_LWIP=1").is_none());
        assert!(lib.macros.get("MBED_CONF_NSAPI_PRESENT=1").is_some());
    }

    #[test]
    fn out_of_scope_set_is_rejected() {
        let mut lib = LibraryDescriptor::new("usb");
        lib.append(&TargetId::new("A"), &lib_scan("usb", &["usb/a.c"], &[]), &[]);

        let set: BTreeSet<TargetId> = ["A", "B"].into_iter().map(TargetId::from).collect();
        match lib.check_scope("usb/a.c", &set) {
            Err(BspError::ConditionOutOfScope { framework, count, supported, .. }) => {
                assert_eq!(framework, "com.sysprogs.arm.mbed.usb");
                assert_eq!(count, 1);
                assert_eq!(supported, 1);
            }
            other => panic!("expected ConditionOutOfScope, got {other:?}"),
        }
    }

    #[test]
    fn dependencies_resolve_by_id_and_directory() {
        let mut libraries = BTreeMap::new();
        let mut rtos = LibraryDescriptor::new("rtos");
        rtos.raw_dependencies = ["features".to_string(), "mbed".to_string()].into();
        let mut fat = LibraryDescriptor::new("fat");
        fat.raw_dependencies = ["rtos".to_string(), "fat".to_string()].into();
        libraries.insert("rtos".to_string(), rtos);
        libraries.insert("fat".to_string(), fat);
        libraries.insert("features".to_string(), LibraryDescriptor::new("features"));

        let mut dirs = BTreeMap::new();
        dirs.insert("features".to_string(), "features".to_string());

        resolve_dependencies(&mut libraries, &dirs);
        assert_eq!(
            libraries["rtos"].dependency_ids.iter().collect::<Vec<_>>(),
            ["features"]
        );
        assert_eq!(libraries["fat"].dependency_ids.iter().collect::<Vec<_>>(), ["rtos"]);
    }

    #[test]
    fn directory_dependency_tolerates_separator_style() {
        let mut libraries = BTreeMap::new();
        let mut usb = LibraryDescriptor::new("usb");
        usb.raw_dependencies = [".\\features\\unsupported\\USBDevice\\".to_string()].into();
        libraries.insert("usb".to_string(), usb);
        libraries.insert("usbdev".to_string(), LibraryDescriptor::new("usbdev"));

        let mut dirs = BTreeMap::new();
        dirs.insert(dir_key("features/unsupported/USBDevice"), "usbdev".to_string());

        resolve_dependencies(&mut libraries, &dirs);
        assert!(libraries["usb"].dependency_ids.contains("usbdev"));
    }
}
