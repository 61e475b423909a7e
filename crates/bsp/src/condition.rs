//! Artifact → supporting-target aggregation.
//!
//! Every source, header, include directory and macro seen in any scan is
//! mapped to the set of targets that need it. A set covering every target
//! means the artifact is universal; anything smaller becomes a condition
//! keyed on exactly those targets.
//!
//! Membership is a set: scanning the same target twice never makes an
//! artifact look more widely used than it is.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::BSP_ROOT_VAR;
use crate::library::LibraryDescriptor;
use crate::scan::{BuildConfiguration, TargetId, TargetScan};

/// Kinds of artifact tracked per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Source,
    Header,
    IncludeDir,
    Macro,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Source,
        ArtifactKind::Header,
        ArtifactKind::IncludeDir,
        ArtifactKind::Macro,
    ];

    /// Whether artifacts of this kind are file-system paths.
    pub fn is_path(self) -> bool {
        !matches!(self, ArtifactKind::Macro)
    }

    /// Raw artifacts of this kind in a scan, before normalisation.
    pub fn items(self, cfg: &BuildConfiguration) -> &[String] {
        match self {
            ArtifactKind::Source => &cfg.sources,
            ArtifactKind::Header => &cfg.headers,
            ArtifactKind::IncludeDir => &cfg.include_dirs,
            ArtifactKind::Macro => &cfg.macros,
        }
    }
}

/// Map a scanner path to the form the IDE expects:
/// `$$SYS:BSP_ROOT$$/relative/path` with forward slashes.
pub fn normalize_path(path: &str) -> String {
    let unix = path.replace('\\', "/");
    let relative = unix.trim_start_matches("./").trim_end_matches('/');
    if relative.is_empty() || relative == "." {
        BSP_ROOT_VAR.to_string()
    } else {
        format!("{BSP_ROOT_VAR}/{relative}")
    }
}

/// Artifact → set of targets requiring it, iterated in artifact order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionMap(BTreeMap<String, BTreeSet<TargetId>>);

impl ConditionMap {
    /// Record that `target` needs `artifact`. Returns `false` if it was
    /// already recorded.
    pub fn insert(&mut self, artifact: impl Into<String>, target: &TargetId) -> bool {
        self.0
            .entry(artifact.into())
            .or_default()
            .insert(target.clone())
    }

    pub fn get(&self, artifact: &str) -> Option<&BTreeSet<TargetId>> {
        self.0.get(artifact)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<TargetId>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Artifacts required by exactly `total` targets.
    pub fn universal(&self, total: usize) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(move |(_, set)| set.len() == total)
            .map(|(k, _)| k)
    }

    /// Non-universal artifacts that `target` requires.
    pub fn conditional_for<'a>(
        &'a self,
        total: usize,
        target: &'a TargetId,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.iter()
            .filter(move |(_, set)| set.len() < total && set.contains(target))
            .map(|(k, _)| k)
    }

    pub(crate) fn record(&mut self, kind: ArtifactKind, cfg: &BuildConfiguration, target: &TargetId) {
        for item in kind.items(cfg) {
            let artifact = if kind.is_path() {
                normalize_path(item)
            } else {
                item.clone()
            };
            self.insert(artifact, target);
        }
    }
}

/// `a|b|c` regex matching exactly the given target IDs.
pub fn target_regex<'a>(targets: impl IntoIterator<Item = &'a TargetId>) -> String {
    targets
        .into_iter()
        .map(|t| regex::escape(t.as_str()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Condition maps for the whole target set plus every library's own maps.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    pub targets: BTreeSet<TargetId>,
    pub sources: ConditionMap,
    pub headers: ConditionMap,
    pub include_dirs: ConditionMap,
    pub macros: ConditionMap,
    pub libraries: BTreeMap<String, LibraryDescriptor>,
}

impl Aggregate {
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Whether `set` covers every aggregated target.
    pub fn is_universal(&self, set: &BTreeSet<TargetId>) -> bool {
        set.len() == self.target_count()
    }

    /// Artifacts of `kind` that every target needs.
    pub fn universal(&self, kind: ArtifactKind) -> impl Iterator<Item = &str> {
        self.map(kind)
            .iter()
            .filter(|(_, set)| self.is_universal(set))
            .map(|(artifact, _)| artifact)
    }

    pub fn map(&self, kind: ArtifactKind) -> &ConditionMap {
        match kind {
            ArtifactKind::Source => &self.sources,
            ArtifactKind::Header => &self.headers,
            ArtifactKind::IncludeDir => &self.include_dirs,
            ArtifactKind::Macro => &self.macros,
        }
    }

    fn map_mut(&mut self, kind: ArtifactKind) -> &mut ConditionMap {
        match kind {
            ArtifactKind::Source => &mut self.sources,
            ArtifactKind::Header => &mut self.headers,
            ArtifactKind::IncludeDir => &mut self.include_dirs,
            ArtifactKind::Macro => &mut self.macros,
        }
    }

    /// Whether `target` defines macro `name` (exactly as written, e.g.
    /// `FEATURE_LWIP=1`).
    pub fn target_defines(&self, target: &TargetId, name: &str) -> bool {
        self.macros
            .get(name)
            .is_some_and(|set| set.contains(target))
    }
}

/// Fold per-target scans into condition maps.
///
/// Pure: the scans are only read, and the result depends only on their
/// contents (not on order, not on duplicates).
pub fn aggregate(scans: &[TargetScan]) -> Aggregate {
    let mut agg = Aggregate::default();
    let mut dir_to_library: BTreeMap<String, String> = BTreeMap::new();

    for scan in scans {
        agg.targets.insert(scan.id.clone());
        for kind in ArtifactKind::ALL {
            agg.map_mut(kind).record(kind, &scan.base, &scan.id);
        }

        for lib in &scan.libraries {
            for dir in &lib.source_dirs {
                dir_to_library.insert(crate::library::dir_key(dir), lib.id.clone());
            }
            agg.libraries
                .entry(lib.id.clone())
                .or_insert_with(|| LibraryDescriptor::new(lib.id.clone()))
                .append(&scan.id, lib, &scan.base.macros);
        }
    }

    crate::library::resolve_dependencies(&mut agg.libraries, &dir_to_library);

    tracing::debug!(
        targets = agg.target_count(),
        sources = agg.sources.len(),
        headers = agg.headers.len(),
        include_dirs = agg.include_dirs.len(),
        macros = agg.macros.len(),
        libraries = agg.libraries.len(),
        "aggregated target scans"
    );
    agg
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

    fn scan(id: &str, sources: &[&str], macros: &[&str]) -> TargetScan {
        let mut s = TargetScan::new(id);
        s.base.sources = sources.iter().map(|s| s.to_string()).collect();
        s.base.macros = macros.iter().map(|s| s.to_string()).collect();
        s
    }

    #[test]
    fn normalize_path_prefixes_root_and_fixes_separators() {
        assert_eq!(normalize_path("targets\\K64F\\a.c"), "$$SYS:BSP_ROOT$$/targets/K64F/a.c");
        assert_eq!(normalize_path("./platform/"), "$$SYS:BSP_ROOT$$/platform");
        assert_eq!(normalize_path("."), "$$SYS:BSP_ROOT$$");
        assert_eq!(normalize_path(""), "$$SYS:BSP_ROOT$$");
    }

    #[test]
    fn shared_artifact_is_universal() {
        let agg = aggregate(&[
            scan("A", &["a.c", "common.c"], &[]),
            scan("B", &["b.c", "common.c"], &[]),
        ]);
        let universal: Vec<_> = agg.universal(ArtifactKind::Source).collect();
        assert_eq!(universal, ["$$SYS:BSP_ROOT$$/common.c"]);

        let a = TargetId::new("A");
        let only_a: Vec<_> = agg.sources.conditional_for(2, &a).collect();
        assert_eq!(only_a, ["$$SYS:BSP_ROOT$$/a.c"]);
    }

    #[test]
    fn repeated_scans_do_not_inflate_membership() {
        let agg = aggregate(&[
            scan("A", &["x.c", "x.c"], &["M=1"]),
            scan("A", &["x.c"], &["M=1"]),
            scan("B", &["y.c"], &[]),
        ]);
        assert_eq!(agg.target_count(), 2);
        let set = agg.sources.get("$$SYS:BSP_ROOT$$/x.c").unwrap();
        assert_eq!(set.len(), 1);
        assert!(!agg.is_universal(set));
        assert_eq!(agg.macros.get("M=1").unwrap().len(), 1);
    }

    #[test]
    fn no_set_exceeds_target_count() {
        let agg = aggregate(&[
            scan("A", &["a.c", "c.c"], &["X"]),
            scan("B", &["b.c", "c.c"], &["X", "Y"]),
            scan("C", &["c.c"], &["Y"]),
        ]);
        for kind in ArtifactKind::ALL {
            for (_, set) in agg.map(kind).iter() {
                assert!(set.len() <= agg.target_count());
            }
        }
    }

    #[test]
    fn macros_are_kept_verbatim() {
        let agg = aggregate(&[scan("A", &[], &["FEATURE_LWIP=1", "TARGET_K64F"])]);
        assert!(agg.target_defines(&TargetId::new("A"), "FEATURE_LWIP=1"));
        assert!(!agg.target_defines(&TargetId::new("B"), "FEATURE_LWIP=1"));
        assert!(agg.macros.get("TARGET_K64F").is_some());
    }

    #[test]
    fn library_macro_defined_by_the_target_is_not_repeated_on_the_library() {
        let mut k64f = scan("K64F", &["main.c"], &["FEATURE_LWIP=1"]);
        k64f.libraries.push(crate::scan::LibraryScan {
            id: "features".to_string(),
            source_dirs: vec!["features".to_string()],
            dependencies: Vec::new(),
            configuration: BuildConfiguration {
                sources: vec!["features/lwip/lwip.c".to_string()],
                macros: vec!["FEATURE_LWIP=1".to_string(), "LWIP_DEBUG=0".to_string()],
                ..BuildConfiguration::default()
            },
        });

        let agg = aggregate(&[k64f]);
        assert!(agg.target_defines(&TargetId::new("K64F"), "FEATURE_LWIP=1"));
        let features = &agg.libraries["features"];
        assert_eq!(features.macros.keys().collect::<Vec<_>>(), ["LWIP_DEBUG=0"]);
    }

    #[test]
    fn target_regex_joins_in_sorted_order() {
        let set: BTreeSet<TargetId> = ["NRF52_DK", "K64F"].into_iter().map(TargetId::from).collect();
        assert_eq!(target_regex(&set), "K64F|NRF52_DK");
    }

    #[test]
    fn target_regex_escapes_metacharacters() {
        let set: BTreeSet<TargetId> = [TargetId::new("A.B")].into_iter().collect();
        assert_eq!(target_regex(&set), "A\\.B");
    }
}
