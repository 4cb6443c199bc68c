use std::collections::{HashMap, HashSet};

use opnctl_domain::ResourceId;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// One resource's id and the ids it depends on, as seen by the graph layer.
/// The Planner builds these from `ResourceInstance::effective_dependencies`
/// (explicit `dependencies` plus anything referenced via output templating).
#[derive(Debug, Clone)]
pub struct DependencyEdge<'a> {
    pub id: &'a ResourceId,
    pub depends_on: &'a HashSet<ResourceId>,
}

/// A dependency-ordered, wave-partitioned resource graph.
///
/// `waves[i]` may be executed with bounded concurrency; everything in
/// `waves[i]` must finish (or be rolled back) before `waves[i + 1]` starts.
/// A resource's wave index is the length of the longest dependency chain
/// beneath it, so independent resources at the same "depth" share a wave
/// even when they have no edge between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedGraph {
    pub topo_order: Vec<ResourceId>,
    pub waves: Vec<Vec<ResourceId>>,
}

impl ResolvedGraph {
    pub fn wave_of(&self, id: &ResourceId) -> Option<usize> {
        self.waves.iter().position(|w| w.contains(id))
    }

    /// Waves in reverse order, for tearing a deployment down leaf-first.
    pub fn destruction_waves(&self) -> Vec<Vec<ResourceId>> {
        let mut waves = self.waves.clone();
        waves.reverse();
        waves
    }
}

/// Build and validate the dependency graph for a set of resources.
///
/// Checks, in order:
/// 1. No self-dependency
/// 2. No dangling dependency (target id must be in `edges`)
/// 3. No cycle
///
/// On success, partitions resources into waves by longest path from a root.
pub fn resolve<'a, I>(edges: I) -> Result<ResolvedGraph, GraphError>
where
    I: IntoIterator<Item = DependencyEdge<'a>>,
{
    let edges: Vec<DependencyEdge<'a>> = edges.into_iter().collect();
    let known: HashSet<&ResourceId> = edges.iter().map(|e| e.id).collect();

    let mut errors = Vec::new();
    for edge in &edges {
        for dep in edge.depends_on.iter() {
            if dep == edge.id {
                errors.push(GraphError::SelfDependency(edge.id.clone()));
            } else if !known.contains(dep) {
                errors.push(GraphError::DanglingDependency {
                    resource: edge.id.clone(),
                    depends_on: dep.clone(),
                });
            }
        }
    }
    if !errors.is_empty() {
        return Err(if errors.len() == 1 {
            errors.remove(0)
        } else {
            GraphError::Multiple(errors)
        });
    }

    let mut graph: DiGraph<&ResourceId, ()> = DiGraph::new();
    let node_index: HashMap<&ResourceId, NodeIndex> =
        edges.iter().map(|e| (e.id, graph.add_node(e.id))).collect();

    for edge in &edges {
        let to = node_index[edge.id];
        for dep in edge.depends_on.iter() {
            let from = node_index[dep];
            graph.add_edge(from, to, ());
        }
    }

    if is_cyclic_directed(&graph) {
        let sccs = petgraph::algo::kosaraju_scc(&graph);
        let cyclic: Vec<ResourceId> = sccs
            .into_iter()
            .find(|scc| scc.len() > 1)
            .map(|scc| scc.into_iter().map(|idx| graph[idx].clone()).collect())
            .unwrap_or_default();
        return Err(GraphError::CycleDetected(cyclic));
    }

    let topo = toposort(&graph, None).map_err(|cycle| {
        GraphError::CycleDetected(vec![graph[cycle.node_id()].clone()])
    })?;
    let topo_order: Vec<ResourceId> = topo.iter().map(|idx| graph[*idx].clone()).collect();

    let waves = partition_waves(&graph, &topo);

    Ok(ResolvedGraph { topo_order, waves })
}

/// Longest-path-from-roots level assignment, grouped into waves.
fn partition_waves(
    graph: &DiGraph<&ResourceId, ()>,
    topo: &[NodeIndex],
) -> Vec<Vec<ResourceId>> {
    let mut level: HashMap<NodeIndex, usize> = HashMap::new();
    for &node in topo {
        let incoming_max = graph
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .map(|pred| level.get(&pred).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        level.insert(node, incoming_max);
    }

    let max_level = level.values().copied().max().unwrap_or(0);
    let mut waves: Vec<Vec<ResourceId>> = vec![Vec::new(); max_level + 1];
    for &node in topo {
        waves[level[&node]].push(graph[node].clone());
    }
    waves
}
