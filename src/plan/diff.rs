//! Diff of expected against actual containers.

use super::{Action, ExecutionPlan};
use crate::constants::MAX_DEPENDENCIES_PER_CONTAINER;
use crate::container::{ContainerName, ContainerSpec, ImageRef, ObservedContainer, matches_kind};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Computes execution plans scoped to one namespace.
#[derive(Debug, Clone)]
pub struct Planner {
    namespace: Option<String>,
}

/// What happens to one expected container.
enum Decision<'a> {
    Create,
    Recreate(&'a ObservedContainer),
    Keep(&'a ObservedContainer),
}

impl Planner {
    /// Creates a planner that only sees and touches `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }

    /// Creates a planner that spans every namespace (used by `recover`).
    #[must_use]
    pub fn all_namespaces() -> Self {
        Self { namespace: None }
    }

    /// Namespace this planner is scoped to.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn owns(&self, name: &ContainerName) -> bool {
        self.namespace
            .as_deref()
            .is_none_or(|namespace| name.in_namespace(namespace))
    }

    /// Computes the plan that converges `actual` to `expected`.
    ///
    /// Fully validates `expected` first; nothing about the runtime is
    /// touched here.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateContainer`]: two specs share a name
    /// - [`Error::MissingDependency`]: a dependency is not in `expected`
    /// - [`Error::DependencyCycle`]: dependencies form a cycle
    /// - [`Error::InvalidInput`]: a spec lies outside the namespace
    pub fn plan(
        &self,
        expected: &[ContainerSpec],
        actual: &[ObservedContainer],
    ) -> Result<ExecutionPlan> {
        let specs = self.index_expected(expected)?;
        let create_layers = layered(specs.keys().cloned().collect(), |name| {
            specs[name].config.dependencies()
        })
        .map_err(|cycle| cycle_error(cycle.iter()))?;

        // Group owned containers by name; the same-kind one (if any) is current.
        let mut by_name: BTreeMap<&ContainerName, Vec<&ObservedContainer>> = BTreeMap::new();
        for container in actual.iter().filter(|c| self.owns(&c.name)) {
            by_name.entry(&container.name).or_default().push(container);
        }

        let mut removals: Vec<&ObservedContainer> = Vec::new();
        let mut current: BTreeMap<&ContainerName, &ObservedContainer> = BTreeMap::new();
        for (name, mut containers) in by_name {
            match specs.get(name) {
                None => {
                    debug!(container = %name, "not in manifest");
                    removals.extend(containers);
                }
                Some(spec) => {
                    let keep = containers
                        .iter()
                        .position(|c| matches_kind(spec, c))
                        .unwrap_or(0);
                    let kept = containers.swap_remove(keep);
                    removals.extend(containers);
                    current.insert(name, kept);
                }
            }
        }

        // Walk expected containers in dependency order so recreations cascade.
        let mut decisions: BTreeMap<&ContainerName, Decision<'_>> = BTreeMap::new();
        let mut fresh: BTreeSet<ContainerName> = BTreeSet::new();
        for name in create_layers.iter().flatten() {
            let spec = specs[name];
            let decision = match current.get(name).copied() {
                None => Decision::Create,
                Some(observed) if !matches_kind(spec, observed) => {
                    debug!(container = %name, "configuration drifted");
                    Decision::Recreate(observed)
                }
                Some(observed) => {
                    let rebound = spec
                        .config
                        .binding_dependencies()
                        .into_iter()
                        .find(|dep| fresh.contains(dep));
                    match rebound {
                        Some(dep) => {
                            debug!(container = %name, dependency = %dep, "dependency recreated");
                            Decision::Recreate(observed)
                        }
                        None => Decision::Keep(observed),
                    }
                }
            };
            if !matches!(decision, Decision::Keep(_)) {
                fresh.insert(name.clone());
            }
            if let Decision::Recreate(observed) = decision {
                removals.push(observed);
            }
            decisions.insert(&spec.name, decision);
        }

        let mut tiers = self.removal_tiers(&removals)?;
        for layer in create_layers {
            let tier = layer
                .iter()
                .map(|name| {
                    let spec = specs[name];
                    match decisions.get(name) {
                        Some(Decision::Keep(observed)) => keep_action(spec, observed),
                        _ => {
                            let mut spec = spec.clone();
                            spec.id = None;
                            Action::Create(spec)
                        }
                    }
                })
                .collect();
            tiers.push(tier);
        }

        let plan = ExecutionPlan::from_tiers(tiers);
        debug!(
            namespace = self.namespace().unwrap_or("*"),
            tiers = plan.tiers().len(),
            actions = plan.len(),
            "planned"
        );
        Ok(plan)
    }

    /// Builds a single-tier plan pulling the distinct images of `specs`.
    #[must_use]
    pub fn image_plan(specs: &[ContainerSpec], force: bool) -> ExecutionPlan {
        let images: BTreeSet<ImageRef> = specs
            .iter()
            .map(|s| s.config.image.normalized())
            .collect();
        let tier = images
            .into_iter()
            .map(|image| Action::PullImage { image, force })
            .collect();
        ExecutionPlan::from_tiers(vec![tier])
    }

    fn index_expected<'a>(
        &self,
        expected: &'a [ContainerSpec],
    ) -> Result<BTreeMap<ContainerName, &'a ContainerSpec>> {
        let mut specs = BTreeMap::new();
        for spec in expected {
            if !self.owns(&spec.name) {
                return Err(Error::InvalidInput(format!(
                    "container '{}' is outside namespace '{}'",
                    spec.name,
                    self.namespace().unwrap_or_default()
                )));
            }
            if specs.insert(spec.name.clone(), spec).is_some() {
                return Err(Error::DuplicateContainer(spec.name.to_string()));
            }
        }

        for spec in expected {
            let deps = spec.config.dependencies();
            if deps.len() > MAX_DEPENDENCIES_PER_CONTAINER {
                return Err(Error::InvalidInput(format!(
                    "container '{}' has {} dependencies (max {})",
                    spec.name,
                    deps.len(),
                    MAX_DEPENDENCIES_PER_CONTAINER
                )));
            }
            if let Some(missing) = deps.iter().find(|d| !specs.contains_key(*d)) {
                return Err(Error::MissingDependency {
                    container: spec.name.to_string(),
                    dependency: missing.to_string(),
                });
            }
        }
        Ok(specs)
    }

    /// Orders removals so that dependents go before their dependencies.
    fn removal_tiers(&self, removals: &[&ObservedContainer]) -> Result<Vec<Vec<Action>>> {
        let by_key: BTreeMap<(&ContainerName, &str), &ObservedContainer> = removals
            .iter()
            .map(|c| ((&c.name, c.id.as_str()), *c))
            .collect();

        // A removal waits for the removals of every container that depends on it.
        let layers = layered(by_key.keys().copied().collect(), |(name, _)| {
            by_key
                .iter()
                .filter(|(_, other)| other.config.dependencies().contains(name))
                .map(|(key, _)| *key)
                .collect()
        })
        .map_err(|cycle| cycle_error(cycle.iter().map(|(name, _)| *name)))?;

        Ok(layers
            .into_iter()
            .map(|layer| {
                layer
                    .into_iter()
                    .map(|key| Action::Remove(by_key[&key].clone()))
                    .collect()
            })
            .collect())
    }
}

fn keep_action(spec: &ContainerSpec, observed: &ObservedContainer) -> Action {
    let wants_running = spec.wants_running();
    if wants_running == observed.is_running() {
        let mut spec = spec.clone();
        spec.id = Some(observed.id.clone());
        Action::Noop(spec)
    } else {
        Action::EnsureState {
            container: observed.clone(),
            running: wants_running,
        }
    }
}

fn cycle_error<'a>(names: impl Iterator<Item = &'a ContainerName>) -> Error {
    let names: BTreeSet<String> = names.map(ToString::to_string).collect();
    Error::DependencyCycle(names.into_iter().collect::<Vec<_>>().join(", "))
}

/// Groups `nodes` into layers where every node comes after all of its
/// predecessors (as returned by `preds`, restricted to `nodes`).
///
/// On a cycle, returns the nodes that lie on or between cycles.
fn layered<K, F>(nodes: BTreeSet<K>, preds: F) -> std::result::Result<Vec<Vec<K>>, Vec<K>>
where
    K: Ord + Clone,
    F: Fn(&K) -> Vec<K>,
{
    let mut pending: BTreeMap<K, BTreeSet<K>> = nodes
        .iter()
        .map(|node| {
            let deps = preds(node).into_iter().filter(|p| nodes.contains(p)).collect();
            (node.clone(), deps)
        })
        .collect();

    let mut layers = Vec::new();
    while !pending.is_empty() {
        let ready: Vec<K> = pending
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(node, _)| node.clone())
            .collect();

        if ready.is_empty() {
            return Err(cycle_members(pending));
        }

        for node in &ready {
            pending.remove(node);
        }
        for deps in pending.values_mut() {
            for node in &ready {
                deps.remove(node);
            }
        }
        layers.push(ready);
    }
    Ok(layers)
}

/// Strips nodes nothing else waits on until only cycle members remain.
fn cycle_members<K: Ord + Clone>(mut pending: BTreeMap<K, BTreeSet<K>>) -> Vec<K> {
    loop {
        let needed: BTreeSet<K> = pending.values().flatten().cloned().collect();
        let before = pending.len();
        pending.retain(|node, _| needed.contains(node));
        if pending.len() == before {
            return pending.into_keys().collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_orders_chain() {
        let nodes: BTreeSet<u32> = [1, 2, 3].into_iter().collect();
        // 3 after 2 after 1
        let layers = layered(nodes, |n| if *n > 1 { vec![n - 1] } else { vec![] }).unwrap();
        assert_eq!(layers, vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_layered_groups_independent_nodes() {
        let nodes: BTreeSet<u32> = [1, 2, 3].into_iter().collect();
        let layers = layered(nodes, |n| if *n == 3 { vec![1, 2] } else { vec![] }).unwrap();
        assert_eq!(layers, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_layered_reports_only_cycle_members() {
        // 1 <-> 2 cycle, 3 depends on 1 but is not part of the cycle.
        let nodes: BTreeSet<u32> = [1, 2, 3].into_iter().collect();
        let err = layered(nodes, |n| match n {
            1 => vec![2],
            2 => vec![1],
            _ => vec![1],
        })
        .unwrap_err();
        assert_eq!(err, vec![1, 2]);
    }

    #[test]
    fn test_layered_self_edge_is_cycle() {
        let nodes: BTreeSet<u32> = [7].into_iter().collect();
        assert_eq!(layered(nodes, |_| vec![7]).unwrap_err(), vec![7]);
    }
}
