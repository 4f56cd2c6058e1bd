//! Dependency resolution for check plans.
//!
//! The resolver expands a request into its transitive dependency closure,
//! rejects cycles, and groups the checks into batches with Kahn's algorithm:
//! every check lands in the earliest batch after all of its dependencies, so
//! the number of barriers is minimal.

use std::sync::Arc;
use std::time::Duration;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use vigil_types::Check;

use crate::error::{SchedError, SchedResult};
use crate::registry::CheckRegistry;

/// Ordered batches of checks ready for execution.
///
/// Checks within a batch have no dependency on each other; concatenating the
/// batches yields a topological order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    batches: Vec<Vec<String>>,
    checks: rustc_hash::FxHashMap<String, Check>,
    batch_index: rustc_hash::FxHashMap<String, usize>,
}

impl ExecutionPlan {
    /// The batches, in execution order.
    pub fn batches(&self) -> &[Vec<String>] {
        &self.batches
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the plan contains no checks.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Number of checks across all batches.
    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    /// Whether the plan includes the check.
    pub fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    /// Definition of a planned check.
    pub fn check(&self, name: &str) -> Option<&Check> {
        self.checks.get(name)
    }

    /// Index of the batch containing the check.
    pub fn batch_of(&self, name: &str) -> Option<usize> {
        self.batch_index.get(name).copied()
    }

    /// All checks in topological order.
    pub fn flatten(&self) -> Vec<&str> {
        self.batches
            .iter()
            .flat_map(|batch| batch.iter().map(String::as_str))
            .collect()
    }

    /// Direct dependencies of a planned check.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.checks
            .get(name)
            .map(|c| c.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Checks that depend on `name` directly or transitively, in plan order.
    pub fn transitive_dependents(&self, name: &str) -> Vec<&str> {
        let mut affected = rustc_hash::FxHashSet::default();
        affected.insert(name);

        let mut dependents = Vec::new();
        for candidate in self.flatten() {
            if affected.contains(candidate) {
                continue;
            }
            if self
                .dependencies_of(candidate)
                .iter()
                .any(|dep| affected.contains(dep.as_str()))
            {
                affected.insert(candidate);
                dependents.push(candidate);
            }
        }
        dependents
    }

    /// Upper-bound timing estimate derived from check timeouts.
    pub fn summary(&self) -> PlanSummary {
        let batches: Vec<BatchSummary> = self
            .batches
            .iter()
            .enumerate()
            .map(|(index, names)| {
                let checks: Vec<&Check> =
                    names.iter().filter_map(|n| self.checks.get(n)).collect();
                // Exclusive checks run one at a time after the parallel group.
                let parallel = checks
                    .iter()
                    .filter(|c| c.parallelizable)
                    .map(|c| c.timeout)
                    .max()
                    .unwrap_or(Duration::ZERO);
                let exclusive: Duration = checks
                    .iter()
                    .filter(|c| !c.parallelizable)
                    .map(|c| c.timeout)
                    .sum();
                BatchSummary {
                    index,
                    checks: names.clone(),
                    max_duration: parallel + exclusive,
                }
            })
            .collect();

        PlanSummary {
            total_checks: self.check_count(),
            critical_path: batches.iter().map(|b| b.max_duration).sum(),
            batches,
        }
    }
}

/// Timing bound for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub index: usize,
    pub checks: Vec<String>,
    /// Longest the batch can take before every check has finished or timed out.
    pub max_duration: Duration,
}

/// Timing bound for a whole plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub total_checks: usize,
    pub batches: Vec<BatchSummary>,
    /// Sum of the batch bounds.
    pub critical_path: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Turns a request for checks into an [`ExecutionPlan`].
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    registry: Arc<CheckRegistry>,
}

impl DependencyResolver {
    /// Create a resolver over a registry.
    pub fn new(registry: Arc<CheckRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this resolver reads.
    pub fn registry(&self) -> &Arc<CheckRegistry> {
        &self.registry
    }

    /// Resolve requested checks into ordered batches.
    ///
    /// Batch members follow the request order; checks pulled in as
    /// dependencies come after the requested ones, in discovery order.
    pub fn resolve<S: AsRef<str>>(&self, requested: &[S]) -> SchedResult<ExecutionPlan> {
        let order = self.expand(requested)?;

        if let Some(cycle) = self.find_cycle(&order) {
            return Err(SchedError::CyclicDependency { cycle });
        }

        let mut dag: DiGraph<&str, ()> = DiGraph::with_capacity(order.len(), order.len());
        let mut node_index: rustc_hash::FxHashMap<&str, NodeIndex> =
            rustc_hash::FxHashMap::default();
        for &name in &order {
            node_index.insert(name, dag.add_node(name));
        }
        for &name in &order {
            let to = node_index[name];
            for dep in self.dependencies(name) {
                let from = node_index[dep.as_str()];
                dag.update_edge(from, to, ());
            }
        }

        let mut in_degree: Vec<usize> = dag
            .node_indices()
            .map(|idx| dag.neighbors_directed(idx, Direction::Incoming).count())
            .collect();
        let mut current: Vec<NodeIndex> = dag
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .collect();

        let mut plan = ExecutionPlan::default();
        while !current.is_empty() {
            // Node indices follow insertion order, which is the tie-break order.
            current.sort();
            let mut next = Vec::new();
            for &idx in &current {
                for succ in dag.neighbors_directed(idx, Direction::Outgoing) {
                    in_degree[succ.index()] -= 1;
                    if in_degree[succ.index()] == 0 {
                        next.push(succ);
                    }
                }
            }

            let batch_no = plan.batches.len();
            let batch: Vec<String> = current.iter().map(|&idx| dag[idx].to_string()).collect();
            for name in &batch {
                plan.batch_index.insert(name.clone(), batch_no);
            }
            plan.batches.push(batch);
            current = next;
        }

        for &name in &order {
            if let Some(check) = self.registry.get(name) {
                plan.checks.insert(name.to_string(), check.clone());
            }
        }

        tracing::debug!(
            checks = plan.check_count(),
            batches = plan.len(),
            "resolved execution plan"
        );
        Ok(plan)
    }

    fn dependencies(&self, name: &str) -> &[String] {
        self.registry
            .get(name)
            .map(|c| c.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Requested names followed by their transitive dependencies.
    fn expand<'a, S: AsRef<str>>(&'a self, requested: &'a [S]) -> SchedResult<Vec<&'a str>> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut order: Vec<&str> = Vec::new();

        for name in requested.iter().map(|s| s.as_ref()) {
            let check = self
                .registry
                .get(name)
                .ok_or_else(|| SchedError::UnknownCheck(name.to_string()))?;
            if seen.insert(check.name.as_str()) {
                order.push(check.name.as_str());
            }
        }

        let mut cursor = 0;
        while cursor < order.len() {
            for dep in self.dependencies(order[cursor]) {
                let check = self
                    .registry
                    .get(dep)
                    .ok_or_else(|| SchedError::UnknownCheck(dep.clone()))?;
                if seen.insert(check.name.as_str()) {
                    order.push(check.name.as_str());
                }
            }
            cursor += 1;
        }

        Ok(order)
    }

    fn find_cycle(&self, order: &[&str]) -> Option<Vec<String>> {
        let mut marks: rustc_hash::FxHashMap<&str, Mark> = rustc_hash::FxHashMap::default();
        let mut path: Vec<&str> = Vec::new();

        for &name in order {
            if !marks.contains_key(name) {
                if let Some(cycle) = self.visit(name, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        marks: &mut rustc_hash::FxHashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(name, Mark::Visiting);
        path.push(name);

        for dep in self.dependencies(name) {
            match marks.get(dep.as_str()) {
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|n| *n == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                Some(Mark::Visited) => {}
                None => {
                    if let Some(cycle) = self.visit(dep, marks, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        path.pop();
        marks.insert(name, Mark::Visited);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::CheckKind;

    fn resolver(checks: Vec<Check>) -> DependencyResolver {
        let mut registry = CheckRegistry::new();
        for check in checks {
            registry.register(check).unwrap();
        }
        DependencyResolver::new(Arc::new(registry))
    }

    fn check(name: &str, deps: &[&str]) -> Check {
        Check::new(name, CheckKind::Custom).depends_on_all(deps.iter().copied())
    }

    #[test]
    fn test_chain_batches() {
        let resolver = resolver(vec![
            check("lint", &[]),
            check("test", &["lint"]),
            check("deploy-check", &["test"]),
        ]);
        let plan = resolver.resolve(&["deploy-check"]).unwrap();

        assert_eq!(
            plan.batches(),
            &[vec!["lint"], vec!["test"], vec!["deploy-check"]]
        );
        assert_eq!(plan.check_count(), 3);
        assert_eq!(plan.batch_of("test"), Some(1));
        assert_eq!(plan.flatten(), vec!["lint", "test", "deploy-check"]);
    }

    #[test]
    fn test_diamond_minimal_barriers() {
        let resolver = resolver(vec![
            check("fmt", &[]),
            check("lint", &["fmt"]),
            check("types", &["fmt"]),
            check("test", &["lint", "types"]),
        ]);
        let plan = resolver.resolve(&["test"]).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.batches()[1], vec!["lint", "types"]);
        assert_eq!(plan.transitive_dependents("fmt"), vec!["lint", "types", "test"]);
        assert_eq!(plan.dependencies_of("test"), &["lint", "types"]);
    }

    #[test]
    fn test_request_order_tie_break() {
        let resolver = resolver(vec![
            check("a", &[]),
            check("b", &[]),
            check("c", &[]),
            check("d", &["c"]),
        ]);
        let plan = resolver.resolve(&["b", "d", "a"]).unwrap();

        // `c` is pulled in by `d`, so it follows the requested names.
        assert_eq!(plan.batches()[0], vec!["b", "a", "c"]);
        assert_eq!(plan.batches()[1], vec!["d"]);
    }

    #[test]
    fn test_duplicate_request_collapsed() {
        let resolver = resolver(vec![check("a", &[])]);
        let plan = resolver.resolve(&["a", "a"]).unwrap();
        assert_eq!(plan.check_count(), 1);
    }

    #[test]
    fn test_unknown_requested_check() {
        let resolver = resolver(vec![check("a", &[])]);
        let err = resolver.resolve(&["a", "deploy"]).unwrap_err();
        assert_eq!(err, SchedError::UnknownCheck("deploy".to_string()));
    }

    #[test]
    fn test_unknown_dependency() {
        let resolver = resolver(vec![check("test", &["build"])]);
        let err = resolver.resolve(&["test"]).unwrap_err();
        assert_eq!(err, SchedError::UnknownCheck("build".to_string()));
    }

    #[test]
    fn test_cycle_detection() {
        let resolver = resolver(vec![check("a", &["b"]), check("b", &["a"])]);
        let err = resolver.resolve(&["a"]).unwrap_err();
        assert_eq!(
            err,
            SchedError::CyclicDependency {
                cycle: vec!["a".into(), "b".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_self_dependency_cycle() {
        let resolver = resolver(vec![check("a", &["a"])]);
        let err = resolver.resolve(&["a"]).unwrap_err();
        assert_eq!(
            err,
            SchedError::CyclicDependency {
                cycle: vec!["a".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_cycle_path_excludes_entry_prefix() {
        let resolver = resolver(vec![
            check("entry", &["x"]),
            check("x", &["y"]),
            check("y", &["x"]),
        ]);
        let err = resolver.resolve(&["entry"]).unwrap_err();
        assert_eq!(
            err,
            SchedError::CyclicDependency {
                cycle: vec!["x".into(), "y".into(), "x".into()]
            }
        );
    }

    #[test]
    fn test_empty_request() {
        let resolver = resolver(vec![check("a", &[])]);
        let plan = resolver.resolve::<&str>(&[]).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.check_count(), 0);
    }

    #[test]
    fn test_plan_summary() {
        let resolver = resolver(vec![
            check("lint", &[]).with_timeout(Duration::from_secs(10)),
            check("types", &[]).with_timeout(Duration::from_secs(30)),
            check("migrate", &[]).with_timeout(Duration::from_secs(5)).exclusive(),
            check("test", &["lint"]).with_timeout(Duration::from_secs(60)),
        ]);
        let plan = resolver
            .resolve(&["lint", "types", "migrate", "test"])
            .unwrap();
        let summary = plan.summary();

        assert_eq!(summary.total_checks, 4);
        assert_eq!(summary.batches[0].max_duration, Duration::from_secs(35));
        assert_eq!(summary.batches[1].max_duration, Duration::from_secs(60));
        assert_eq!(summary.critical_path, Duration::from_secs(95));
    }
}
