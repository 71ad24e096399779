//! Dependency resolution and load-order computation.
//!
//! The resolve pass checks every record's declared dependencies against the
//! registry, memoizing the result in the record's [`DepStatus`] for the
//! duration of the pass, builds a [`DependencyGraph`] over the satisfiable
//! records and produces the topological load order. Instantiation itself is
//! driven by the manager so plugin code never runs under the registry lock.

use std::collections::HashSet;

use tracing::debug;

use crate::error::ReturnCode;
use crate::graph::DependencyGraph;
use crate::registry::{DepStatus, PluginRegistry};
use crate::version;

const LOADER_TARGET: &str = "jackplug::loader";

/// Outcome of a successful resolve pass.
pub(crate) struct Resolution {
    /// Topological load order over all records with satisfied dependencies.
    pub order: Vec<String>,
    /// First per-plugin failure collected while continuing on errors.
    pub first_failure: Option<ReturnCode>,
}

/// Checks dependencies, builds the graph and computes the load order.
///
/// With `continue_on_error` unset the pass aborts on the first failing
/// record and returns its code; otherwise failures are collected, the
/// offending records are skipped, and the first failure code is surfaced in
/// the [`Resolution`]. A dependency cycle always aborts the pass.
pub(crate) fn resolve(
    registry: &mut PluginRegistry,
    continue_on_error: bool,
    on_event: &mut dyn FnMut(ReturnCode, Option<String>),
) -> Result<Resolution, ReturnCode> {
    let names = registry.names();

    // Fresh pass: forget graph ids and prior dependency verdicts so a
    // dependency registered since the last call is taken into account.
    for name in &names {
        if let Some(record) = registry.record_mut(name) {
            record.set_graph_id(None);
            record.set_dep_status(DepStatus::Unknown);
        }
    }

    let mut first_failure = None;
    let mut visiting = HashSet::new();
    for name in &names {
        let code = check_dependencies(registry, name, &mut visiting, on_event);
        if !code.is_success() {
            if !continue_on_error {
                return Err(code);
            }
            first_failure.get_or_insert(code);
        }
    }

    let mut graph = DependencyGraph::new();
    for name in &names {
        let Some(record) = registry.record_mut(name) else {
            continue;
        };
        if record.dep_status() == DepStatus::Ok {
            let id = graph.add_node(name.clone());
            record.set_graph_id(Some(id));
        }
    }
    for name in &names {
        let Some(record) = registry.record(name) else {
            continue;
        };
        let Some(node) = record.graph_id() else {
            continue;
        };
        let parents: Vec<Option<usize>> = record
            .info()
            .dependencies()
            .iter()
            .map(|dep| registry.record(dep.name()).and_then(|r| r.graph_id()))
            .collect();
        for parent in parents.into_iter().flatten() {
            graph.add_parent(node, parent);
        }
    }

    match graph.topological_sort() {
        Ok(order) => {
            debug!(target: LOADER_TARGET, ?order, "computed load order");
            Ok(Resolution {
                order,
                first_failure,
            })
        }
        Err(_) => {
            on_event(ReturnCode::LoadDependencyCycle, None);
            Err(ReturnCode::LoadDependencyCycle)
        }
    }
}

/// Recursively verifies that `name`'s dependencies are registered in
/// compatible versions.
///
/// The `visiting` set marks records whose check is in progress; re-entering
/// one returns a provisional success so declared cycles survive to the
/// topological sort, which reports them properly.
fn check_dependencies(
    registry: &mut PluginRegistry,
    name: &str,
    visiting: &mut HashSet<String>,
    on_event: &mut dyn FnMut(ReturnCode, Option<String>),
) -> ReturnCode {
    let Some(record) = registry.record(name) else {
        return ReturnCode::LoadDependencyNotFound;
    };
    match record.dep_status() {
        DepStatus::Ok => return ReturnCode::Success,
        DepStatus::Missing => return ReturnCode::LoadDependencyNotFound,
        DepStatus::BadVersion => return ReturnCode::LoadDependencyBadVersion,
        DepStatus::Unknown => {}
    }
    if visiting.contains(name) {
        return ReturnCode::Success;
    }
    visiting.insert(name.to_owned());

    let detail = record.path().display().to_string();
    let dependencies: Vec<(String, String)> = record
        .info()
        .dependencies()
        .iter()
        .map(|dep| (dep.name().to_owned(), dep.min_version().to_owned()))
        .collect();

    let mut verdict = DepStatus::Ok;
    let mut code = ReturnCode::Success;
    for (dep_name, min_version) in dependencies {
        let Some(dep_record) = registry.record(&dep_name) else {
            verdict = DepStatus::Missing;
            code = ReturnCode::LoadDependencyNotFound;
            on_event(code, Some(detail.clone()));
            break;
        };
        if !version::compatible(dep_record.info().version(), &min_version) {
            verdict = DepStatus::BadVersion;
            code = ReturnCode::LoadDependencyBadVersion;
            on_event(code, Some(detail.clone()));
            break;
        }
        let transitive = check_dependencies(registry, &dep_name, visiting, on_event);
        if !transitive.is_success() {
            // The failure belongs to the dependency; this record stays
            // unresolved and is re-examined if reached again.
            visiting.remove(name);
            return transitive;
        }
    }

    visiting.remove(name);
    if let Some(record) = registry.record_mut(name) {
        record.set_dep_status(verdict);
    }
    code
}
