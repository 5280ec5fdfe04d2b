//! Reload Planner
//!
//! Expands a set of changed namespaces to the full set the browser must
//! re-evaluate, in an order that restores a consistent program: everything
//! that transitively depends on a changed namespace reloads after it.
//!
//! The expansion memoizes transitive-dependent queries for the duration of
//! one invocation only; the compiler may add or remove namespaces between
//! compile cycles, so nothing survives across calls.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::digest::DigestStore;
use crate::oracle::DependencyOracle;

/// One element of a reload plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNs {
    /// Dotted namespace name
    pub name: String,
    /// Set when the expansion added this namespace and its artifact's
    /// contents actually changed on disk
    pub file_changed_on_disk: bool,
    /// Namespace is flagged to ride every non-empty reload plan
    pub always_reload: bool,
}

/// Expand `changed` (plus any explicitly requested namespaces) to the full
/// ordered reload plan.
///
/// When the oracle has no analysis environment the input passes through
/// unexpanded. Otherwise the plan is the changed set, its transitive
/// dependents, and the always-reload overlay, topologically sorted
/// leaves-first. No namespace appears twice.
pub fn expand_reload_plan(
    oracle: &dyn DependencyOracle,
    digests: &DigestStore,
    output_dir: Option<&Path>,
    changed: &[String],
    explicit: &[String],
) -> Vec<PlannedNs> {
    // Seed set: changed plus explicit additions, first spelling wins.
    let mut seen = FxHashSet::default();
    let seeds: Vec<String> = changed
        .iter()
        .chain(explicit)
        .filter(|name| seen.insert((*name).clone()))
        .cloned()
        .collect();

    // A trivial reload stays trivial: the always-reload overlay only rides
    // plans that already have something in them.
    if seeds.is_empty() {
        return Vec::new();
    }

    if !oracle.analysis_available() {
        return seeds
            .into_iter()
            .map(|name| PlannedNs {
                name,
                file_changed_on_disk: false,
                always_reload: false,
            })
            .collect();
    }

    let known = oracle.all_namespaces();
    let always_flag: FxHashMap<&str, bool> = known
        .iter()
        .map(|sym| (sym.name.as_str(), sym.always_reload))
        .collect();

    // Per-invocation memo over transitive dependents.
    let mut index = DependentsIndex::default();

    let mut dependents = FxHashSet::default();
    for seed in &seeds {
        dependents.extend(index.transitive(oracle, seed).iter().cloned());
    }

    // Expansion-added namespaces, marked when their artifact really changed.
    let seed_names: FxHashSet<&str> = seeds.iter().map(String::as_str).collect();
    let mut additional: Vec<String> = dependents
        .into_iter()
        .filter(|name| !seed_names.contains(name.as_str()))
        .collect();
    additional.sort();

    let mut plan: Vec<PlannedNs> = Vec::with_capacity(seeds.len() + additional.len());
    for name in seeds {
        let always_reload = always_flag.get(name.as_str()).copied().unwrap_or(false);
        plan.push(PlannedNs {
            name,
            file_changed_on_disk: false,
            always_reload,
        });
    }
    for name in additional {
        let file_changed_on_disk = oracle
            .target_file_for(&name, output_dir)
            .is_some_and(|file| digests.changed(&file));
        let always_reload = always_flag.get(name.as_str()).copied().unwrap_or(false);
        plan.push(PlannedNs {
            name,
            file_changed_on_disk,
            always_reload,
        });
    }

    // Always-reload overlay, compared by name to avoid duplicates from
    // re-resolved symbols.
    let planned_names: FxHashSet<String> = plan.iter().map(|p| p.name.clone()).collect();
    for sym in &known {
        if sym.always_reload && !planned_names.contains(&sym.name) {
            plan.push(PlannedNs {
                name: sym.name.clone(),
                file_changed_on_disk: false,
                always_reload: true,
            });
        }
    }

    topo_sort(oracle, &mut index, plan)
}

// =============================================================================
// Transitive dependents (per-invocation memo)
// =============================================================================

/// Memoized transitive-dependent queries, keyed by namespace name. Bound at
/// planner entry and dropped at exit so stale graph data never leaks across
/// compile cycles.
#[derive(Debug, Default)]
struct DependentsIndex {
    cache: FxHashMap<String, FxHashSet<String>>,
}

impl DependentsIndex {
    /// All namespaces that transitively depend on `ns`. Iterative worklist
    /// with a visited set; cycles terminate at the fixed point.
    fn transitive(&mut self, oracle: &dyn DependencyOracle, ns: &str) -> &FxHashSet<String> {
        if !self.cache.contains_key(ns) {
            let mut result = FxHashSet::default();
            let mut visited = FxHashSet::default();
            visited.insert(ns.to_string());
            let mut worklist = vec![ns.to_string()];

            while let Some(current) = worklist.pop() {
                for dependent in oracle.direct_dependents(&current) {
                    if visited.insert(dependent.name.clone()) {
                        worklist.push(dependent.name.clone());
                    }
                    if dependent.name != ns {
                        result.insert(dependent.name);
                    }
                }
            }

            self.cache.insert(ns.to_string(), result);
        }

        &self.cache[ns]
    }
}

// =============================================================================
// Topological order
// =============================================================================

/// Stable topological sort: scan the plan in insertion order and emit the
/// first element whose in-plan dependencies have all been emitted. An element
/// `b` must precede `a` whenever `a` transitively depends on `b`. A cycle
/// unblocks by emitting its earliest member.
fn topo_sort(
    oracle: &dyn DependencyOracle,
    index: &mut DependentsIndex,
    plan: Vec<PlannedNs>,
) -> Vec<PlannedNs> {
    let len = plan.len();

    // predecessors[i] holds every j that must be emitted before i.
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); len];
    for j in 0..len {
        let dependents = index.transitive(oracle, &plan[j].name).clone();
        for i in 0..len {
            if i != j && dependents.contains(&plan[i].name) {
                predecessors[i].push(j);
            }
        }
    }

    let mut slots: Vec<Option<PlannedNs>> = plan.into_iter().map(Some).collect();
    let mut emitted = vec![false; len];
    let mut ordered = Vec::with_capacity(len);

    while ordered.len() < len {
        let next = (0..len)
            .find(|&i| !emitted[i] && predecessors[i].iter().all(|&j| emitted[j]))
            .or_else(|| (0..len).find(|&i| !emitted[i]));
        let Some(i) = next else { break };
        emitted[i] = true;
        if let Some(planned) = slots[i].take() {
            ordered.push(planned);
        }
    }

    ordered
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::NsSymbol;
    use rustc_hash::FxHashMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Oracle over an explicit "depends on" edge list.
    struct GraphOracle {
        /// ns -> namespaces that directly depend on it
        dependents: FxHashMap<String, Vec<String>>,
        namespaces: Vec<NsSymbol>,
        targets: FxHashMap<String, PathBuf>,
    }

    impl GraphOracle {
        /// Build from `(dependent, dependency)` pairs: "b depends on a" is
        /// `("b", "a")`.
        fn from_edges(edges: &[(&str, &str)]) -> Self {
            let mut dependents: FxHashMap<String, Vec<String>> = FxHashMap::default();
            let mut names: Vec<String> = Vec::new();
            for (dependent, dependency) in edges {
                dependents
                    .entry((*dependency).to_string())
                    .or_default()
                    .push((*dependent).to_string());
                for name in [dependent, dependency] {
                    if !names.iter().any(|n| n == name) {
                        names.push((*name).to_string());
                    }
                }
            }
            Self {
                dependents,
                namespaces: names.into_iter().map(NsSymbol::named).collect(),
                targets: FxHashMap::default(),
            }
        }

        fn with_namespaces(mut self, namespaces: Vec<NsSymbol>) -> Self {
            self.namespaces = namespaces;
            self
        }

        fn with_target(mut self, ns: &str, file: PathBuf) -> Self {
            self.targets.insert(ns.to_string(), file);
            self
        }
    }

    impl DependencyOracle for GraphOracle {
        fn direct_dependents(&self, ns: &str) -> Vec<NsSymbol> {
            self.dependents
                .get(ns)
                .map(|names| names.iter().cloned().map(NsSymbol::named).collect())
                .unwrap_or_default()
        }

        fn all_namespaces(&self) -> Vec<NsSymbol> {
            self.namespaces.clone()
        }

        fn target_file_for(&self, ns: &str, _output_dir: Option<&Path>) -> Option<PathBuf> {
            self.targets.get(ns).cloned()
        }
    }

    fn digests() -> (TempDir, DigestStore) {
        let dir = TempDir::new().unwrap();
        let store = DigestStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    fn names(plan: &[PlannedNs]) -> Vec<&str> {
        plan.iter().map(|p| p.name.as_str()).collect()
    }

    fn changed(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    /// Assert the plan order is topological for the given edges.
    fn assert_topological(plan: &[PlannedNs], edges: &[(&str, &str)]) {
        let position: FxHashMap<&str, usize> = plan
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();
        for (dependent, dependency) in edges {
            if let (Some(&d), Some(&b)) = (position.get(dependent), position.get(dependency)) {
                assert!(
                    b < d,
                    "{dependency} must precede its dependent {dependent} in {:?}",
                    names(plan)
                );
            }
        }
    }

    #[test]
    fn test_simple_chain() {
        // b depends on a, c depends on b
        let edges = [("b", "a"), ("c", "b")];
        let oracle = GraphOracle::from_edges(&edges);
        let (_dir, store) = digests();

        let plan = expand_reload_plan(&oracle, &store, None, &changed(&["a"]), &[]);
        assert_eq!(names(&plan), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_duplicates_in_diamond() {
        // b and c depend on a; d depends on both b and c
        let edges = [("b", "a"), ("c", "a"), ("d", "b"), ("d", "c")];
        let oracle = GraphOracle::from_edges(&edges);
        let (_dir, store) = digests();

        let plan = expand_reload_plan(&oracle, &store, None, &changed(&["a"]), &[]);
        assert_eq!(plan.len(), 4);
        let mut sorted = names(&plan);
        sorted.sort_unstable();
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
        assert_topological(&plan, &edges);
    }

    #[test]
    fn test_expansion_marks_added_namespaces() {
        let edges = [("b", "a")];
        let oracle = GraphOracle::from_edges(&edges);
        let (_dir, store) = digests();

        let plan = expand_reload_plan(&oracle, &store, None, &changed(&["a"]), &[]);
        let a = plan.iter().find(|p| p.name == "a").unwrap();
        let b = plan.iter().find(|p| p.name == "b").unwrap();
        // The changed namespace itself is never marked; only expansion adds
        // the flag, and only when the artifact content moved.
        assert!(!a.file_changed_on_disk);
        assert!(!b.file_changed_on_disk);
    }

    #[test]
    fn test_expansion_flag_tracks_artifact_content() {
        let dir = TempDir::new().unwrap();
        let store = DigestStore::new(dir.path().to_path_buf());
        let target = dir.path().join("b.js");
        std::fs::write(&target, "v1").unwrap();
        // Warm the store so the next check reflects a real transition.
        store.changed(&target);
        std::fs::write(&target, "v2").unwrap();

        let oracle = GraphOracle::from_edges(&[("b", "a")]).with_target("b", target);
        let plan = expand_reload_plan(&oracle, &store, None, &changed(&["a"]), &[]);
        let b = plan.iter().find(|p| p.name == "b").unwrap();
        assert!(b.file_changed_on_disk);
    }

    #[test]
    fn test_always_reload_overlay_appended() {
        let oracle = GraphOracle::from_edges(&[]).with_namespaces(vec![
            NsSymbol::named("x"),
            NsSymbol::always("reg"),
        ]);
        let (_dir, store) = digests();

        // Empty changed set plus one explicit addition.
        let plan = expand_reload_plan(&oracle, &store, None, &[], &changed(&["x"]));
        assert_eq!(names(&plan), vec!["x", "reg"]);
        assert!(plan[1].always_reload);
    }

    #[test]
    fn test_always_reload_not_duplicated_by_name() {
        let oracle =
            GraphOracle::from_edges(&[]).with_namespaces(vec![NsSymbol::always("reg")]);
        let (_dir, store) = digests();

        let plan = expand_reload_plan(&oracle, &store, None, &changed(&["reg"]), &[]);
        assert_eq!(names(&plan), vec!["reg"]);
    }

    #[test]
    fn test_unavailable_oracle_passes_through() {
        struct NoAnalysis;
        impl DependencyOracle for NoAnalysis {
            fn analysis_available(&self) -> bool {
                false
            }
            fn direct_dependents(&self, _ns: &str) -> Vec<NsSymbol> {
                unreachable!("planner must not query a missing analysis env")
            }
            fn all_namespaces(&self) -> Vec<NsSymbol> {
                unreachable!("planner must not query a missing analysis env")
            }
            fn target_file_for(&self, _ns: &str, _dir: Option<&Path>) -> Option<PathBuf> {
                None
            }
        }

        let (_dir, store) = digests();
        let plan = expand_reload_plan(&NoAnalysis, &store, None, &changed(&["a", "b"]), &[]);
        assert_eq!(names(&plan), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_input_yields_empty_plan() {
        // Even with always-reload namespaces present, nothing to reload
        // means nothing rides along.
        let oracle =
            GraphOracle::from_edges(&[]).with_namespaces(vec![NsSymbol::always("reg")]);
        let (_dir, store) = digests();

        let plan = expand_reload_plan(&oracle, &store, None, &[], &[]);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_cycle_terminates_without_duplicates() {
        // a and b depend on each other
        let edges = [("b", "a"), ("a", "b")];
        let oracle = GraphOracle::from_edges(&edges);
        let (_dir, store) = digests();

        let plan = expand_reload_plan(&oracle, &store, None, &changed(&["a"]), &[]);
        let mut sorted = names(&plan);
        sorted.sort_unstable();
        assert_eq!(sorted, vec!["a", "b"]);
    }

    #[test]
    fn test_order_is_topological_on_wider_graph() {
        let edges = [
            ("render", "dom"),
            ("app", "render"),
            ("app", "state"),
            ("widgets", "dom"),
            ("app", "widgets"),
        ];
        let oracle = GraphOracle::from_edges(&edges);
        let (_dir, store) = digests();

        let plan = expand_reload_plan(&oracle, &store, None, &changed(&["dom", "state"]), &[]);
        assert_topological(&plan, &edges);
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn test_repeated_expansion_is_deterministic() {
        let edges = [("b", "a"), ("c", "a"), ("d", "c")];
        let oracle = GraphOracle::from_edges(&edges);
        let (_dir, store) = digests();

        let first = expand_reload_plan(&oracle, &store, None, &changed(&["a"]), &[]);
        let second = expand_reload_plan(&oracle, &store, None, &changed(&["a"]), &[]);
        assert_eq!(first, second);
    }
}
