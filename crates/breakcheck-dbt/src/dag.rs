//! Dependency graph (DAG) construction and traversal
//!
//! Edges run from a dependency to its dependent, so "downstream" is the set
//! of models that read, directly or transitively, from a given model. All
//! adjacency is kept in ordered maps; every traversal visits neighbours in
//! lexicographic order and therefore produces the same output on every run.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::manifest::Node;

/// Node identifier (unique_id from manifest)
pub type NodeId = String;

/// Dependency graph with forward and reverse edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Reverse edges: node -> nodes it depends on
    parents: BTreeMap<NodeId, BTreeSet<NodeId>>,

    /// Forward edges: node -> nodes that depend on it
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,

    /// All vertices, including dependency ids with no node of their own
    vertices: BTreeSet<NodeId>,

    /// Definition file per node, where the manifest recorded one
    files: BTreeMap<NodeId, String>,

    /// Short model name per node
    names: BTreeMap<NodeId, String>,
}

impl DependencyGraph {
    /// Build a dependency graph from a node set
    ///
    /// A dependency id that has no entry in `nodes` still becomes a vertex.
    pub fn build(nodes: &BTreeMap<NodeId, Node>) -> Self {
        let mut graph = Self::default();

        for (id, node) in nodes {
            graph.vertices.insert(id.clone());

            if let Some(path) = &node.file_path {
                graph.files.insert(id.clone(), path.clone());
            }
            if let Some(name) = &node.name {
                graph.names.insert(id.clone(), name.clone());
            }

            for dep in &node.depends_on {
                graph.vertices.insert(dep.clone());
                graph.parents.entry(id.clone()).or_default().insert(dep.clone());
                graph.children.entry(dep.clone()).or_default().insert(id.clone());
            }
        }

        tracing::debug!(
            vertices = graph.vertices.len(),
            edges = graph.edge_count(),
            "built dependency graph"
        );

        graph
    }

    /// All vertices, sorted
    pub fn vertices(&self) -> impl Iterator<Item = &str> {
        self.vertices.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.vertices.contains(node_id)
    }

    /// Number of distinct dependency edges
    pub fn edge_count(&self) -> usize {
        self.children.values().map(BTreeSet::len).sum()
    }

    /// Immediate parents (dependencies) of a node
    pub fn parents(&self, node_id: &str) -> Vec<&str> {
        self.parents
            .get(node_id)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Immediate children (dependents) of a node
    pub fn children(&self, node_id: &str) -> Vec<&str> {
        self.successors(node_id).collect()
    }

    fn successors<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a str> {
        self.children
            .get(node_id)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    fn predecessors<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a str> {
        self.parents
            .get(node_id)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// All downstream nodes in breadth-first order
    ///
    /// This is the "blast radius" of a change to `node_id`. The node itself is
    /// never part of its own result, even when it sits on a cycle.
    pub fn downstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::breadth_first(node_id, |id| self.successors(id).collect())
    }

    /// All upstream nodes in breadth-first order
    pub fn upstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::breadth_first(node_id, |id| self.predecessors(id).collect())
    }

    fn breadth_first<'a, F>(start: &str, next: F) -> Vec<NodeId>
    where
        F: Fn(&str) -> Vec<&'a str>,
    {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = next(start).into_iter().collect();
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            if current == start || !visited.insert(current) {
                continue;
            }
            result.push(current.to_string());

            for neighbour in next(current) {
                if !visited.contains(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }

        result
    }

    /// Union of the downstream sets of every changed node
    ///
    /// Each changed id is excluded from its own contribution only; a changed
    /// id that is downstream of another changed id is included. Unknown ids
    /// contribute nothing.
    pub fn affected_by<'a, I>(&self, changed: I) -> BTreeSet<NodeId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        changed
            .into_iter()
            .flat_map(|id| self.downstream(id))
            .collect()
    }

    /// Nodes defined by a changed file
    ///
    /// Matches when the path equals the node's recorded file path, or ends
    /// with `/<file path>` (the dbt project lives in a repository subfolder).
    pub fn nodes_for_file(&self, path: &str) -> Vec<&str> {
        let path = path.replace('\\', "/");
        self.files
            .iter()
            .filter(|(_, file)| {
                path == file.as_str()
                    || path
                        .strip_suffix(file.as_str())
                        .is_some_and(|prefix| prefix.ends_with('/'))
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Resolve a unique id or a short model name to a vertex
    pub fn resolve(&self, name_or_id: &str) -> Option<&str> {
        if let Some(id) = self.vertices.get(name_or_id) {
            return Some(id.as_str());
        }
        self.names
            .iter()
            .find(|(_, name)| name.as_str() == name_or_id)
            .map(|(id, _)| id.as_str())
    }

    /// Every elementary cycle in the graph
    ///
    /// Johnson's circuit search. Start vertices are taken in lexicographic
    /// order and each search is confined to the start's strongly connected
    /// component, restricted to vertices not smaller than the start. Every
    /// cycle therefore begins at its smallest vertex and is found exactly
    /// once. Cycles are returned in discovery order.
    pub fn find_cycles(&self) -> Vec<Vec<NodeId>> {
        let component = self.strongly_connected_components();
        let mut cycles = Vec::new();

        for start in self.vertices() {
            let start_component = component.get(start).copied();
            let allowed = |id: &str| id >= start && component.get(id).copied() == start_component;
            self.circuits_through(start, &allowed, &mut cycles);
        }

        if !cycles.is_empty() {
            tracing::debug!(count = cycles.len(), "found dependency cycles");
        }

        cycles
    }

    fn successors_within<'a>(&'a self, node_id: &str, allowed: &dyn Fn(&str) -> bool) -> Vec<&'a str> {
        self.successors(node_id).filter(|id| allowed(id)).collect()
    }

    /// Iterative circuit search for cycles through `start`
    fn circuits_through<'a>(
        &'a self,
        start: &'a str,
        allowed: &dyn Fn(&str) -> bool,
        cycles: &mut Vec<Vec<NodeId>>,
    ) {
        let mut path: Vec<&'a str> = vec![start];
        let mut blocked: BTreeSet<&'a str> = BTreeSet::from([start]);
        let mut closed: BTreeSet<&'a str> = BTreeSet::new();
        let mut block_map: BTreeMap<&'a str, BTreeSet<&'a str>> = BTreeMap::new();
        let mut stack = vec![(start, self.successors_within(start, allowed).into_iter())];

        while let Some((node, remaining)) = stack.last_mut() {
            let node = *node;

            if let Some(next) = remaining.next() {
                if next == start {
                    cycles.push(path.iter().map(|id| id.to_string()).collect());
                    closed.extend(path.iter().copied());
                } else if !blocked.contains(next) {
                    path.push(next);
                    stack.push((next, self.successors_within(next, allowed).into_iter()));
                    closed.remove(next);
                    blocked.insert(next);
                }
                continue;
            }

            if closed.contains(node) {
                unblock(node, &mut blocked, &mut block_map);
            } else {
                for neighbour in self.successors_within(node, allowed) {
                    block_map.entry(neighbour).or_default().insert(node);
                }
            }

            stack.pop();
            path.pop();
        }
    }

    /// Component index per vertex (Kosaraju, iterative)
    fn strongly_connected_components(&self) -> BTreeMap<&str, usize> {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut finished: Vec<&str> = Vec::with_capacity(self.vertices.len());

        for root in self.vertices() {
            if !visited.insert(root) {
                continue;
            }
            let mut stack = vec![(root, self.successors(root))];
            while let Some((node, remaining)) = stack.last_mut() {
                match remaining.next() {
                    Some(next) => {
                        if visited.insert(next) {
                            stack.push((next, self.successors(next)));
                        }
                    }
                    None => {
                        finished.push(*node);
                        stack.pop();
                    }
                }
            }
        }

        let mut component: BTreeMap<&str, usize> = BTreeMap::new();
        let mut next_index = 0;

        for &root in finished.iter().rev() {
            if component.contains_key(root) {
                continue;
            }
            let mut pending = vec![root];
            component.insert(root, next_index);
            while let Some(current) = pending.pop() {
                for parent in self.predecessors(current) {
                    if !component.contains_key(parent) {
                        component.insert(parent, next_index);
                        pending.push(parent);
                    }
                }
            }
            next_index += 1;
        }

        component
    }
}

fn unblock<'a>(
    node: &'a str,
    blocked: &mut BTreeSet<&'a str>,
    block_map: &mut BTreeMap<&'a str, BTreeSet<&'a str>>,
) {
    let mut pending = vec![node];
    while let Some(current) = pending.pop() {
        if blocked.remove(current) {
            if let Some(waiting) = block_map.remove(current) {
                pending.extend(waiting);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        let nodes = edges
            .iter()
            .map(|(id, deps)| {
                let node = Node::new(*id, deps.iter().map(|d| d.to_string()).collect());
                (id.to_string(), node)
            })
            .collect();
        DependencyGraph::build(&nodes)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn edges_run_from_dependency_to_dependent() {
        let g = graph(&[("y", &["x"]), ("z", &["y"])]);

        assert_eq!(g.children("x"), vec!["y"]);
        assert_eq!(g.parents("y"), vec!["x"]);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.vertices().collect::<Vec<_>>(), vec!["x", "y", "z"]);
    }

    #[test]
    fn unknown_dependency_becomes_vertex() {
        let g = graph(&[("model.a", &["source.raw.users"])]);

        assert!(g.contains("source.raw.users"));
        assert_eq!(g.children("source.raw.users"), vec!["model.a"]);
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g = graph(&[("b", &["a"]), ("c", &["a", "b"]), ("d", &["c"])]);
        assert!(g.find_cycles().is_empty());
    }

    #[test]
    fn three_node_cycle_starts_at_smallest_vertex() {
        // a -> b -> c -> a
        let g = graph(&[("b", &["a"]), ("c", &["b"]), ("a", &["c"])]);
        assert_eq!(g.find_cycles(), vec![ids(&["a", "b", "c"])]);
    }

    #[test]
    fn mutual_dependency_is_one_cycle() {
        let g = graph(&[("A", &["B"]), ("B", &["A"])]);
        assert_eq!(g.find_cycles(), vec![ids(&["A", "B"])]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(&[("a", &["a"]), ("b", &["a"])]);
        assert_eq!(g.find_cycles(), vec![ids(&["a"])]);
    }

    #[test]
    fn overlapping_cycles_are_all_found() {
        // a -> b -> a and a -> c -> a, plus b -> c
        let g = graph(&[("b", &["a"]), ("c", &["a", "b"]), ("a", &["b", "c"])]);
        let cycles = g.find_cycles();

        assert_eq!(
            cycles,
            vec![ids(&["a", "b"]), ids(&["a", "b", "c"]), ids(&["a", "c"])]
        );
    }

    #[test]
    fn disjoint_cycles_in_vertex_order() {
        let g = graph(&[
            ("q", &["p"]),
            ("p", &["q"]),
            ("b", &["a"]),
            ("a", &["b"]),
            ("z", &["a"]),
        ]);
        assert_eq!(g.find_cycles(), vec![ids(&["a", "b"]), ids(&["p", "q"])]);
    }

    #[test]
    fn affected_by_follows_descendants() {
        // x -> y -> z
        let g = graph(&[("y", &["x"]), ("z", &["y"])]);

        let affected = g.affected_by(["x"]);
        assert_eq!(affected.into_iter().collect::<Vec<_>>(), ids(&["y", "z"]));
    }

    #[test]
    fn affected_by_excludes_only_own_contribution() {
        let g = graph(&[("y", &["x"]), ("z", &["y"])]);

        let affected = g.affected_by(["x", "y"]);
        assert_eq!(affected.into_iter().collect::<Vec<_>>(), ids(&["y", "z"]));
    }

    #[test]
    fn affected_by_on_cycle_excludes_start() {
        let g = graph(&[("b", &["a"]), ("a", &["b"])]);
        let affected = g.affected_by(["a"]);
        assert_eq!(affected.into_iter().collect::<Vec<_>>(), ids(&["b"]));
    }

    #[test]
    fn empty_graph_is_tolerated() {
        let g = DependencyGraph::build(&BTreeMap::new());

        assert!(g.is_empty());
        assert!(g.find_cycles().is_empty());
        assert!(g.affected_by(["anything"]).is_empty());
        assert!(g.downstream("anything").is_empty());
        assert!(g.nodes_for_file("models/a.sql").is_empty());
    }

    #[test]
    fn downstream_and_upstream_are_breadth_first() {
        let g = graph(&[("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"]), ("e", &["d"])]);

        assert_eq!(g.downstream("a"), ids(&["b", "c", "d", "e"]));
        assert_eq!(g.upstream("e"), ids(&["d", "b", "c", "a"]));
    }

    #[test]
    fn file_lookup_matches_exact_and_suffix() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "model.shop.orders".to_string(),
            Node::new("model.shop.orders", vec![]).with_file_path("models/orders.sql"),
        );
        nodes.insert(
            "model.shop.big_orders".to_string(),
            Node::new("model.shop.big_orders", vec![]).with_file_path("models/big_orders.sql"),
        );
        let g = DependencyGraph::build(&nodes);

        assert_eq!(g.nodes_for_file("models/orders.sql"), vec!["model.shop.orders"]);
        assert_eq!(g.nodes_for_file("analytics/models/orders.sql"), vec!["model.shop.orders"]);
        assert!(g.nodes_for_file("models/other.sql").is_empty());
        assert!(g.nodes_for_file("xmodels/orders.sql").is_empty());
    }

    #[test]
    fn resolve_by_id_or_name() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "model.shop.orders".to_string(),
            Node::new("model.shop.orders", vec![]).with_name("orders"),
        );
        let g = DependencyGraph::build(&nodes);

        assert_eq!(g.resolve("model.shop.orders"), Some("model.shop.orders"));
        assert_eq!(g.resolve("orders"), Some("model.shop.orders"));
        assert_eq!(g.resolve("customers"), None);
    }
}
