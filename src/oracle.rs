//! Adapter seam to the external compiler's dependency analysis.
//!
//! The compiler owns the namespace graph; the reload planner only queries it.
//! Results may change between planner invocations as the compiler adds or
//! removes namespaces, so nothing from the oracle is cached across calls.

use std::path::{Path, PathBuf};

/// A namespace known to the compiler, with its reload-relevant metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsSymbol {
    /// Dotted namespace name, e.g. `my.app.core`
    pub name: String,
    /// Include this namespace in every non-empty reload plan
    pub always_reload: bool,
}

impl NsSymbol {
    /// A plain namespace with no metadata flags.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            always_reload: false,
        }
    }

    /// A namespace flagged for inclusion in every reload plan.
    pub fn always(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            always_reload: true,
        }
    }
}

/// Read-only queries against the compiler's analysis environment.
pub trait DependencyOracle: Send + Sync {
    /// Whether the analysis environment is present at all. When it is not,
    /// the planner passes changed sets through without expansion.
    fn analysis_available(&self) -> bool {
        true
    }

    /// Immediate reverse edges: namespaces that directly depend on `ns`.
    fn direct_dependents(&self, ns: &str) -> Vec<NsSymbol>;

    /// All currently known namespaces, with metadata attached.
    fn all_namespaces(&self) -> Vec<NsSymbol>;

    /// The emitted artifact for a namespace, optionally under a given
    /// output directory.
    fn target_file_for(&self, ns: &str, output_dir: Option<&Path>) -> Option<PathBuf>;
}

/// An oracle for running without a compiler attached: no analysis, no
/// expansion.
#[derive(Debug, Default)]
pub struct DetachedOracle;

impl DependencyOracle for DetachedOracle {
    fn analysis_available(&self) -> bool {
        false
    }

    fn direct_dependents(&self, _ns: &str) -> Vec<NsSymbol> {
        Vec::new()
    }

    fn all_namespaces(&self) -> Vec<NsSymbol> {
        Vec::new()
    }

    fn target_file_for(&self, _ns: &str, _output_dir: Option<&Path>) -> Option<PathBuf> {
        None
    }
}

/// Mangle a dotted namespace name into the form the emitted JavaScript uses:
/// hyphens become underscores, dots survive.
pub fn munge(ns: &str) -> String {
    ns.replace('-', "_")
}

/// The conventional artifact path for a namespace when the oracle cannot
/// resolve one: segments become directories, the leaf becomes a `.js` file.
pub fn default_target_file(ns: &str, output_dir: Option<&Path>) -> PathBuf {
    let mut path = output_dir.map_or_else(PathBuf::new, Path::to_path_buf);
    for segment in munge(ns).split('.') {
        path.push(segment);
    }
    path.set_extension("js");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_munge() {
        assert_eq!(munge("my.app-core"), "my.app_core");
        assert_eq!(munge("plain.ns"), "plain.ns");
    }

    #[test]
    fn test_default_target_file() {
        assert_eq!(
            default_target_file("my.app-core", Some(Path::new("out"))),
            PathBuf::from("out/my/app_core.js")
        );
        assert_eq!(default_target_file("app", None), PathBuf::from("app.js"));
    }

    #[test]
    fn test_detached_oracle() {
        let oracle = DetachedOracle;
        assert!(!oracle.analysis_available());
        assert!(oracle.direct_dependents("any").is_empty());
        assert!(oracle.all_namespaces().is_empty());
    }
}
