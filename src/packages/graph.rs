// src/packages/graph.rs

//! Package dependency graph and topological ordering
//!
//! An edge `A -> B` means "A depends on B, so B installs first". Sorting
//! uses Kahn's algorithm over deterministic (sorted) adjacency so equal-rank
//! packages always come out in the same order. A cycle is a defined error,
//! never a partial order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::manager::OsFamily;
use super::metadata::PackageMeta;
use crate::error::{Error, Result};

/// Dependency graph over package names
#[derive(Debug, Default)]
pub struct PackageGraph {
    nodes: BTreeSet<String>,
    /// name -> names it depends on
    edges: BTreeMap<String, Vec<String>>,
    /// name -> names that depend on it
    reverse_edges: BTreeMap<String, Vec<String>>,
}

impl PackageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a package slice
    ///
    /// Only dependency edges whose target is present in the slice are
    /// added; the rest belong to the OS and are outside ordering concerns.
    pub fn from_packages(packages: &[PackageMeta], family: OsFamily) -> Self {
        let mut graph = Self::new();
        let names: BTreeSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();

        for package in packages {
            graph.add_node(&package.name);
            for dep in package.deps_for(family) {
                if names.contains(dep.as_str()) {
                    graph.add_edge(&package.name, dep);
                }
            }
        }
        graph
    }

    pub fn add_node(&mut self, name: &str) {
        self.nodes.insert(name.to_string());
    }

    /// Record that `from` depends on `to`
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.nodes.insert(from.to_string());
        self.nodes.insert(to.to_string());
        self.edges
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self.reverse_edges
            .entry(to.to_string())
            .or_default()
            .push(from.to_string());
    }

    /// Names `name` directly depends on
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names that directly depend on `name`
    pub fn dependents(&self, name: &str) -> &[String] {
        self.reverse_edges
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Install order: dependencies before dependents
    ///
    /// Kahn's algorithm. If any node is left unprocessed the graph has a
    /// cycle; the error names the packages involved.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        for name in &self.nodes {
            in_degree.insert(name, 0);
        }
        for targets in self.edges.values() {
            for target in targets {
                if let Some(degree) = in_degree.get_mut(target.as_str()) {
                    *degree += 1;
                }
            }
        }

        // BTreeMap iteration seeds the queue in name order, which together
        // with sorted adjacency makes the output deterministic
        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&name, _)| name)
            .collect();

        let mut result = Vec::new();
        while let Some(name) = queue.pop_front() {
            result.push(name.to_string());
            if let Some(targets) = self.edges.get(name) {
                let mut freed: Vec<&str> = Vec::new();
                for target in targets {
                    if let Some(degree) = in_degree.get_mut(target.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            freed.push(target);
                        }
                    }
                }
                freed.sort_unstable();
                queue.extend(freed);
            }
        }

        if result.len() != self.nodes.len() {
            let members = self
                .find_cycle()
                .unwrap_or_else(|| vec!["<unknown>".to_string()]);
            return Err(Error::DependencyCycle(members.join(" -> ")));
        }

        // Dependents were emitted first; installation wants the reverse
        result.reverse();
        Ok(result)
    }

    /// DFS cycle detection; returns the members of one cycle
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = BTreeSet::new();
        let mut stack = BTreeSet::new();
        let mut cycle = Vec::new();

        for name in &self.nodes {
            if !visited.contains(name.as_str())
                && self.dfs_cycle(name, &mut visited, &mut stack, &mut cycle)
            {
                cycle.reverse();
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        name: &str,
        visited: &mut BTreeSet<String>,
        stack: &mut BTreeSet<String>,
        cycle: &mut Vec<String>,
    ) -> bool {
        visited.insert(name.to_string());
        stack.insert(name.to_string());

        for target in self.dependencies(name) {
            if !visited.contains(target.as_str()) {
                if self.dfs_cycle(target, visited, stack, cycle) {
                    cycle.push(name.to_string());
                    return true;
                }
            } else if stack.contains(target.as_str()) {
                cycle.push(target.clone());
                cycle.push(name.to_string());
                return true;
            }
        }

        stack.remove(name);
        false
    }
}

/// Order packages so no package precedes one of its dependencies
///
/// Works on any slice (the full set, the composite subset, ...). Dependency
/// names outside the slice do not constrain the order.
pub fn sort_packages_by_dependencies(
    packages: &[PackageMeta],
    family: OsFamily,
) -> Result<Vec<PackageMeta>> {
    let graph = PackageGraph::from_packages(packages, family);
    let order = graph.topological_sort()?;

    let by_name: BTreeMap<&str, &PackageMeta> =
        packages.iter().map(|p| (p.name.as_str(), p)).collect();
    Ok(order
        .iter()
        .filter_map(|name| by_name.get(name.as_str()).map(|&p| p.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(name: &str, deb_deps: &[&str]) -> PackageMeta {
        let mut meta: PackageMeta =
            serde_json::from_str(&format!(r#"{{"Package": "{name}"}}"#)).unwrap();
        meta.deb_depends = deb_deps.iter().map(|s| s.to_string()).collect();
        meta
    }

    fn position(order: &[PackageMeta], name: &str) -> usize {
        order
            .iter()
            .position(|p| p.name == name)
            .unwrap_or_else(|| panic!("{name} missing from order"))
    }

    #[test]
    fn test_dependencies_install_first() {
        let packages = vec![
            package("rocm-full", &["rocblas", "rocm-core"]),
            package("rocblas", &["rocm-core"]),
            package("rocm-core", &[]),
        ];
        let order = sort_packages_by_dependencies(&packages, OsFamily::Debian).unwrap();
        assert!(position(&order, "rocm-core") < position(&order, "rocblas"));
        assert!(position(&order, "rocblas") < position(&order, "rocm-full"));
    }

    #[test]
    fn test_out_of_slice_deps_do_not_constrain() {
        let packages = vec![package("rocm-core", &["libc6"])];
        let order = sort_packages_by_dependencies(&packages, OsFamily::Debian).unwrap();
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].name, "rocm-core");
    }

    #[test]
    fn test_cycle_is_a_defined_error() {
        let packages = vec![
            package("a", &["b"]),
            package("b", &["c"]),
            package("c", &["a"]),
        ];
        let err = sort_packages_by_dependencies(&packages, OsFamily::Debian).unwrap_err();
        match err {
            Error::DependencyCycle(members) => {
                assert!(members.contains('a') && members.contains('b') && members.contains('c'),
                    "cycle error should name the members, got: {members}");
            }
            other => panic!("expected DependencyCycle, got {other}"),
        }
    }

    #[test]
    fn test_deterministic_order_for_independent_packages() {
        let packages = vec![
            package("zeta", &[]),
            package("alpha", &[]),
            package("mid", &[]),
        ];
        let first = sort_packages_by_dependencies(&packages, OsFamily::Debian).unwrap();
        let second = sort_packages_by_dependencies(&packages, OsFamily::Debian).unwrap();
        let names: Vec<_> = first.iter().map(|p| p.name.clone()).collect();
        assert_eq!(
            names,
            second.iter().map(|p| p.name.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_spec_composite_scenario() {
        // Non-composite and composite subsets sort independently, and
        // rocm-core precedes rocm-full wherever both appear
        let core = package("rocm-core", &[]);
        let full = package("rocm-full", &["rocm-core"]);

        let non_composite = sort_packages_by_dependencies(std::slice::from_ref(&core), OsFamily::Debian).unwrap();
        assert_eq!(non_composite[0].name, "rocm-core");

        let both = sort_packages_by_dependencies(&[core, full], OsFamily::Debian).unwrap();
        assert!(position(&both, "rocm-core") < position(&both, "rocm-full"));
    }

    #[test]
    fn test_graph_accessors() {
        let mut graph = PackageGraph::new();
        graph.add_edge("a", "b");
        assert_eq!(graph.dependencies("a"), ["b".to_string()]);
        assert_eq!(graph.dependents("b"), ["a".to_string()]);
        assert!(graph.dependencies("b").is_empty());
    }
}
