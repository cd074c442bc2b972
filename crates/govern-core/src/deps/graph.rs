use super::extract;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

type DepIter<'a> = std::iter::Flatten<std::option::IntoIter<&'a BTreeSet<String>>>;

/// Directed dependency graph over a story set. Edges point from a story to
/// the stories it depends on.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<String, Value>,
    pub edges: BTreeMap<String, BTreeSet<String>>,
    /// Referenced identifiers that match no node.
    pub orphans: BTreeSet<String>,
    /// `(story, missing reference)` pairs behind `orphans`.
    pub orphan_refs: Vec<(String, String)>,
    /// Problems met while building: unkeyed or duplicate stories.
    pub notes: Vec<String>,
}

impl DependencyGraph {
    pub fn build(stories: &[Value]) -> Self {
        let mut graph = DependencyGraph::default();

        for (index, story) in stories.iter().enumerate() {
            match extract::story_key(story) {
                Some(key) if graph.nodes.contains_key(&key) => {
                    graph.notes.push(format!("Duplicate story key {key}; later record ignored"));
                }
                Some(key) => {
                    graph.nodes.insert(key.clone(), story.clone());
                    graph.edges.insert(key, BTreeSet::new());
                }
                None => graph
                    .notes
                    .push(format!("Story at index {index} has no story_key or id; skipped")),
            }
        }

        let keys: Vec<String> = graph.nodes.keys().cloned().collect();
        for key in &keys {
            let story = &graph.nodes[key];
            let mut refs = extract::structured_dependencies(story);
            for mined in extract::narrative_dependencies(story) {
                if !refs.contains(&mined) {
                    refs.push(mined);
                }
            }

            let mut deps = BTreeSet::new();
            let mut missing = Vec::new();
            for r in refs {
                match graph.resolve(&r) {
                    Some(target) if target == *key => {}
                    Some(target) => {
                        deps.insert(target);
                    }
                    None if is_self_reference(key, &r) => {}
                    None => missing.push(r),
                }
            }
            graph.edges.insert(key.clone(), deps);
            for r in missing {
                graph.orphans.insert(r.clone());
                graph.orphan_refs.push((key.clone(), r));
            }
        }
        graph
    }

    /// Map a reference onto a node key: exact match first, then the unique key
    /// ending in `:<reference>` (so `US-002` finds `SD-X:US-002`).
    pub fn resolve(&self, reference: &str) -> Option<String> {
        if self.nodes.contains_key(reference) {
            return Some(reference.to_string());
        }
        let suffix = format!(":{reference}");
        let mut candidates = self.nodes.keys().filter(|k| k.ends_with(&suffix));
        match (candidates.next(), candidates.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }

    pub fn dependency_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    fn deps_of(&self, node: &str) -> DepIter<'_> {
        self.edges.get(node).into_iter().flatten()
    }

    // -- Cycle detection --

    /// Every cycle reachable by depth-first search, each as the path from the
    /// first repeated node to the node that closed it.
    pub fn detect_circular_dependencies(&self) -> Vec<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        let mut cycles = Vec::new();

        for start in self.nodes.keys() {
            if !visited.contains(start.as_str()) {
                self.dfs(start, &mut visited, &mut stack, &mut on_stack, &mut cycles);
            }
        }
        cycles
    }

    // Explicit frame stack so long chains cannot exhaust the thread stack.
    fn dfs<'a>(
        &'a self,
        start: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
        on_stack: &mut HashSet<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        let mut frames: Vec<(&'a str, DepIter<'a>)> = Vec::new();
        visited.insert(start);
        stack.push(start);
        on_stack.insert(start);
        frames.push((start, self.deps_of(start)));

        while let Some((node, deps)) = frames.last_mut() {
            match deps.next() {
                Some(dep) => {
                    let dep = dep.as_str();
                    if on_stack.contains(dep) {
                        if let Some(pos) = stack.iter().position(|n| *n == dep) {
                            cycles.push(stack[pos..].iter().map(|n| n.to_string()).collect());
                        }
                    } else if !visited.contains(dep) {
                        visited.insert(dep);
                        stack.push(dep);
                        on_stack.insert(dep);
                        frames.push((dep, self.deps_of(dep)));
                    }
                }
                None => {
                    let node = *node;
                    frames.pop();
                    stack.pop();
                    on_stack.remove(node);
                }
            }
        }
    }

    // -- Ordering (Kahn's algorithm) --

    /// Execution order in which every story follows its dependencies, or None
    /// when a cycle leaves nodes unscheduled. Ties break alphabetically.
    pub fn get_topological_order(&self) -> Option<Vec<String>> {
        // dependency -> dependents
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for (node, deps) in &self.edges {
            in_degree.insert(node.as_str(), deps.len());
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(node.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            order.push(node.to_string());
            for dependent in dependents.get(node).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }

    // -- Depth --

    /// Longest dependency chain beneath each node; a node with no known
    /// dependencies has depth 0. Nodes on a cycle stop counting where the
    /// chain would revisit itself.
    pub fn depths(&self) -> BTreeMap<String, usize> {
        let mut memo: HashMap<&str, usize> = HashMap::new();
        for node in self.nodes.keys() {
            self.depth_of(node, &mut memo);
        }
        self.nodes
            .keys()
            .map(|k| (k.clone(), memo.get(k.as_str()).copied().unwrap_or(0)))
            .collect()
    }

    /// Post-order walk from `start` filling `memo`. A dependency already on
    /// the current path counts as depth 0.
    fn depth_of<'a>(&'a self, start: &'a str, memo: &mut HashMap<&'a str, usize>) {
        if memo.contains_key(start) {
            return;
        }
        let mut path: HashSet<&'a str> = HashSet::new();
        let mut frames: Vec<(&'a str, DepIter<'a>, usize)> = Vec::new();
        path.insert(start);
        frames.push((start, self.deps_of(start), 0));

        while let Some((node, deps, best)) = frames.last_mut() {
            match deps.next() {
                Some(dep) => {
                    let dep = dep.as_str();
                    if let Some(&d) = memo.get(dep) {
                        *best = (*best).max(d + 1);
                    } else if path.contains(dep) {
                        *best = (*best).max(1);
                    } else {
                        path.insert(dep);
                        frames.push((dep, self.deps_of(dep), 0));
                    }
                }
                None => {
                    let (node, depth) = (*node, *best);
                    frames.pop();
                    path.remove(node);
                    memo.insert(node, depth);
                    if let Some((_, _, parent)) = frames.last_mut() {
                        *parent = (*parent).max(depth + 1);
                    }
                }
            }
        }
    }

    pub fn max_depth(&self) -> usize {
        self.depths().into_values().max().unwrap_or(0)
    }
}

fn is_self_reference(key: &str, reference: &str) -> bool {
    key.rsplit(':').next() == Some(reference)
}
