//! Dependency ordering for executor loads.

use std::collections::{HashMap, HashSet};

use nexus_protocols::{DependencyError, LoaderError};

/// Compute the order in which executors must be brought up to load `root`.
///
/// `graph` maps every known executor id to its declared dependencies. The
/// result lists dependencies before their dependents and ends with `root`.
/// Ids in `loaded` are included without descending into their own
/// dependencies. Nothing is touched until the whole graph has been walked,
/// so a cycle or a missing manifest fails before any executor starts.
pub fn resolve_load_order(
    root: &str,
    graph: &HashMap<String, Vec<String>>,
    loaded: &HashSet<String>,
) -> Result<Vec<String>, LoaderError> {
    if !graph.contains_key(root) {
        return Err(LoaderError::NotFound(root.to_string()));
    }

    let mut walk = Walk {
        graph,
        loaded,
        visiting: Vec::new(),
        done: HashSet::new(),
        order: Vec::new(),
    };
    walk.visit(root)?;
    Ok(walk.order)
}

struct Walk<'a> {
    graph: &'a HashMap<String, Vec<String>>,
    loaded: &'a HashSet<String>,
    visiting: Vec<String>,
    done: HashSet<String>,
    order: Vec<String>,
}

impl Walk<'_> {
    fn visit(&mut self, id: &str) -> Result<(), LoaderError> {
        self.visiting.push(id.to_string());

        let graph = self.graph;
        let deps = graph.get(id).map(Vec::as_slice).unwrap_or_default();
        for dep in deps {
            if self.done.contains(dep) {
                continue;
            }

            if let Some(pos) = self.visiting.iter().position(|v| v == dep) {
                let mut path = self.visiting[pos..].to_vec();
                path.push(dep.clone());
                return Err(DependencyError::Cycle { path }.into());
            }

            if self.loaded.contains(dep) {
                self.done.insert(dep.clone());
                self.order.push(dep.clone());
                continue;
            }

            if !graph.contains_key(dep) {
                return Err(DependencyError::Unsatisfied {
                    executor: id.to_string(),
                    dependency: dep.clone(),
                    reason: "no manifest available".to_string(),
                }
                .into());
            }

            self.visit(dep)?;
        }

        self.visiting.pop();
        self.done.insert(id.to_string());
        self.order.push(id.to_string());
        Ok(())
    }
}
