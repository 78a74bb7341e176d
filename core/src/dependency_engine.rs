//! Typed edges between work items: cycle prevention, the blocking query, and
//! graph traversal (topological sort, critical path, bottlenecks, parallel
//! groups). Pure and I/O-free: callers pass in the already-loaded edge set.

use crate::error::{OrchestratorError, Result};
use crate::models::{Dependency, DependencyType, Role};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// A proposed edge, prior to id/timestamp assignment by the store.
#[derive(Debug, Clone)]
pub struct ProposedDependency {
    pub from_item_id: Uuid,
    pub to_item_id: Uuid,
    pub dependency_type: DependencyType,
    pub unblock_at: Option<Role>,
}

/// Validates and cycle-checks a batch of proposed edges against the edges
/// already in the store. All-or-nothing: a cycle anywhere in the batch
/// rejects the whole batch.
pub fn validate_batch(
    existing: &[Dependency],
    proposed: &[ProposedDependency],
) -> Result<()> {
    let mut seen_in_batch: HashSet<(Uuid, Uuid, DependencyType)> = HashSet::new();
    let mut existing_pairs: HashSet<(Uuid, Uuid, DependencyType)> = existing
        .iter()
        .map(|d| (d.from_item_id, d.to_item_id, d.dependency_type))
        .collect();

    // Adjacency over normalized BLOCKS pairs; grown incrementally as each
    // proposed edge is accepted, so a later edge in the batch sees earlier
    // ones already in the graph.
    let mut blocks_adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for dep in existing {
        if let Some((blocker, dependent)) = dep.normalized_blocks_pair() {
            blocks_adjacency.entry(blocker).or_default().push(dependent);
        }
    }

    for edge in proposed {
        if edge.from_item_id == edge.to_item_id {
            return Err(OrchestratorError::self_dependency(edge.from_item_id));
        }
        if edge.dependency_type == DependencyType::RelatesTo && edge.unblock_at.is_some() {
            return Err(OrchestratorError::Validation(
                "unblockAt must be null for RELATES_TO dependencies".to_string(),
            ));
        }

        let key = (edge.from_item_id, edge.to_item_id, edge.dependency_type);
        if existing_pairs.contains(&key) || !seen_in_batch.insert(key) {
            return Err(OrchestratorError::Conflict(format!(
                "duplicate dependency ({}, {}, {:?})",
                edge.from_item_id, edge.to_item_id, edge.dependency_type
            )));
        }

        if let Some((blocker, dependent)) = normalize_edge(edge) {
            // Would `dependent` become reachable back to `blocker`? DFS from
            // the new edge's `dependent` looking for `blocker`.
            if reachable(&blocks_adjacency, dependent, blocker) {
                return Err(OrchestratorError::cycle_detected());
            }
            blocks_adjacency.entry(blocker).or_default().push(dependent);
        }

        existing_pairs.insert(key);
    }

    Ok(())
}

fn normalize_edge(edge: &ProposedDependency) -> Option<(Uuid, Uuid)> {
    match edge.dependency_type {
        DependencyType::Blocks => Some((edge.from_item_id, edge.to_item_id)),
        DependencyType::IsBlockedBy => Some((edge.to_item_id, edge.from_item_id)),
        DependencyType::RelatesTo => None,
    }
}

fn reachable(adjacency: &HashMap<Uuid, Vec<Uuid>>, start: Uuid, target: Uuid) -> bool {
    let mut stack = vec![start];
    let mut visited = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(next) = adjacency.get(&node) {
            stack.extend(next.iter().copied());
        }
    }
    false
}

/// Expands `linear([a,b,c])` into `a BLOCKS b`, `b BLOCKS c`.
pub fn linear(chain: &[Uuid], unblock_at: Option<Role>) -> Vec<ProposedDependency> {
    chain
        .windows(2)
        .map(|pair| ProposedDependency {
            from_item_id: pair[0],
            to_item_id: pair[1],
            dependency_type: DependencyType::Blocks,
            unblock_at,
        })
        .collect()
}

/// Expands `fan-out(source, [targets])` into `source BLOCKS target` for each target.
pub fn fan_out(source: Uuid, targets: &[Uuid], unblock_at: Option<Role>) -> Vec<ProposedDependency> {
    targets
        .iter()
        .map(|&target| ProposedDependency {
            from_item_id: source,
            to_item_id: target,
            dependency_type: DependencyType::Blocks,
            unblock_at,
        })
        .collect()
}

/// Expands `fan-in([sources], target)` into `source BLOCKS target` for each source.
pub fn fan_in(sources: &[Uuid], target: Uuid, unblock_at: Option<Role>) -> Vec<ProposedDependency> {
    sources
        .iter()
        .map(|&source| ProposedDependency {
            from_item_id: source,
            to_item_id: target,
            dependency_type: DependencyType::Blocks,
            unblock_at,
        })
        .collect()
}

/// One unsatisfied blocker reported back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Blocker {
    pub blocker_id: Uuid,
    pub required_role: Role,
    pub blocker_role: Role,
}

/// Given `target`'s incoming BLOCKS/IS_BLOCKED_BY edges (already normalized
/// into `blocker_id -> (threshold, blocker's current role)` pairs by the
/// caller), returns every blocker that has not yet reached its threshold.
/// `BLOCKED` never satisfies a threshold, regardless of `previous_role`.
pub fn unsatisfied_blockers(incoming: &[(Uuid, Role, Role)]) -> Vec<Blocker> {
    incoming
        .iter()
        .filter_map(|&(blocker_id, threshold, blocker_role)| {
            if blocker_role.satisfies(threshold) {
                None
            } else {
                Some(Blocker {
                    blocker_id,
                    required_role: threshold,
                    blocker_role,
                })
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    All,
}

#[derive(Debug, Clone)]
pub struct GraphAnalysis {
    pub nodes: Vec<Uuid>,
    pub topo_order: Vec<Uuid>,
    pub has_cycle: bool,
    pub depth_map: HashMap<Uuid, u32>,
    pub critical_path: Vec<Uuid>,
    pub bottlenecks: Vec<(Uuid, usize)>,
    pub parallel_groups: Vec<Vec<Uuid>>,
}

/// Runs the full BFS/topo-sort/critical-path/bottleneck/parallel-group
/// analysis starting from `start`, following edges in `direction` and
/// restricted to `type_filter` if given.
pub fn analyze(
    start: Uuid,
    direction: Direction,
    type_filter: Option<DependencyType>,
    edges: &[Dependency],
) -> GraphAnalysis {
    let filtered: Vec<&Dependency> = edges
        .iter()
        .filter(|d| type_filter.map(|t| t == d.dependency_type).unwrap_or(true))
        .collect();

    let mut forward: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut reverse: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for dep in &filtered {
        let Some((blocker, dependent)) = dep.normalized_blocks_pair() else {
            continue;
        };
        forward.entry(blocker).or_default().push(dependent);
        reverse.entry(dependent).or_default().push(blocker);
    }

    // BFS to discover reachable nodes in the requested direction.
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);
    while let Some(node) = queue.pop_front() {
        let mut neighbors: Vec<Uuid> = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::All) {
            if let Some(n) = forward.get(&node) {
                neighbors.extend(n.iter().copied());
            }
        }
        if matches!(direction, Direction::Incoming | Direction::All) {
            if let Some(n) = reverse.get(&node) {
                neighbors.extend(n.iter().copied());
            }
        }
        for next in neighbors {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let mut nodes: Vec<Uuid> = visited.into_iter().collect();
    nodes.sort();

    if nodes.len() <= 1 {
        return GraphAnalysis {
            nodes: nodes.clone(),
            topo_order: nodes,
            has_cycle: false,
            depth_map: HashMap::from([(start, 0)]),
            critical_path: vec![start],
            bottlenecks: Vec::new(),
            parallel_groups: Vec::new(),
        };
    }

    let node_set: HashSet<Uuid> = nodes.iter().copied().collect();
    let sub_forward: HashMap<Uuid, Vec<Uuid>> = forward
        .iter()
        .filter(|(k, _)| node_set.contains(k))
        .map(|(k, v)| (*k, v.iter().copied().filter(|n| node_set.contains(n)).collect()))
        .collect();
    let sub_reverse: HashMap<Uuid, Vec<Uuid>> = reverse
        .iter()
        .filter(|(k, _)| node_set.contains(k))
        .map(|(k, v)| (*k, v.iter().copied().filter(|n| node_set.contains(n)).collect()))
        .collect();

    let (topo_order, has_cycle) = topological_sort(&nodes, &sub_forward, &sub_reverse);

    let mut depth_map: HashMap<Uuid, u32> = HashMap::new();
    for &node in &topo_order {
        let preds = sub_reverse.get(&node).cloned().unwrap_or_default();
        let depth = preds
            .iter()
            .filter_map(|p| depth_map.get(p).copied())
            .max()
            .map(|d| d + 1)
            .unwrap_or(0);
        depth_map.insert(node, depth);
    }

    let critical_path = critical_path(&depth_map, &sub_reverse);

    let mut bottlenecks: Vec<(Uuid, usize)> = sub_forward
        .iter()
        .map(|(node, out)| (*node, out.len()))
        .filter(|(_, count)| *count >= 2)
        .collect();
    bottlenecks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let parallel_groups = parallel_groups(&depth_map, &sub_forward, &sub_reverse);

    GraphAnalysis {
        nodes,
        topo_order,
        has_cycle,
        depth_map,
        critical_path,
        bottlenecks,
        parallel_groups,
    }
}

/// Kahn's algorithm. Leftover nodes (a cycle survived construction, which
/// should not happen given `validate_batch`, but graph analysis must still
/// degrade gracefully) are appended so the result stays total, and
/// `has_cycle` is set.
fn topological_sort(
    nodes: &[Uuid],
    forward: &HashMap<Uuid, Vec<Uuid>>,
    reverse: &HashMap<Uuid, Vec<Uuid>>,
) -> (Vec<Uuid>, bool) {
    let mut in_degree: HashMap<Uuid, usize> = nodes
        .iter()
        .map(|&n| (n, reverse.get(&n).map(|v| v.len()).unwrap_or(0)))
        .collect();

    let mut queue: VecDeque<Uuid> = nodes
        .iter()
        .copied()
        .filter(|n| in_degree[n] == 0)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(node) = queue.pop_front() {
        order.push(node);
        if let Some(successors) = forward.get(&node) {
            for &succ in successors {
                if let Some(count) = in_degree.get_mut(&succ) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(succ);
                    }
                }
            }
        }
    }

    let has_cycle = order.len() != nodes.len();
    if has_cycle {
        let ordered: HashSet<Uuid> = order.iter().copied().collect();
        let mut leftover: Vec<Uuid> = nodes.iter().copied().filter(|n| !ordered.contains(n)).collect();
        leftover.sort();
        order.extend(leftover);
    }

    (order, has_cycle)
}

fn critical_path(depth_map: &HashMap<Uuid, u32>, reverse: &HashMap<Uuid, Vec<Uuid>>) -> Vec<Uuid> {
    let Some((&deepest, _)) = depth_map.iter().max_by_key(|(_, d)| **d) else {
        return Vec::new();
    };

    let mut path = vec![deepest];
    let mut current = deepest;
    loop {
        let current_depth = depth_map[&current];
        if current_depth == 0 {
            break;
        }
        let predecessor = reverse
            .get(&current)
            .and_then(|preds| preds.iter().find(|p| depth_map.get(p) == Some(&(current_depth - 1))));
        match predecessor {
            Some(&p) => {
                path.push(p);
                current = p;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

fn parallel_groups(
    depth_map: &HashMap<Uuid, u32>,
    forward: &HashMap<Uuid, Vec<Uuid>>,
    reverse: &HashMap<Uuid, Vec<Uuid>>,
) -> Vec<Vec<Uuid>> {
    let mut by_depth: HashMap<u32, Vec<Uuid>> = HashMap::new();
    for (&node, &depth) in depth_map {
        by_depth.entry(depth).or_default().push(node);
    }

    let mut groups = Vec::new();
    let mut depths: Vec<u32> = by_depth.keys().copied().collect();
    depths.sort();
    for depth in depths {
        let mut level = by_depth.remove(&depth).unwrap();
        if level.len() < 2 {
            continue;
        }
        level.sort();
        let level_set: HashSet<Uuid> = level.iter().copied().collect();
        let independent: Vec<Uuid> = level
            .iter()
            .copied()
            .filter(|n| {
                let has_forward_edge_within = forward
                    .get(n)
                    .map(|out| out.iter().any(|t| level_set.contains(t)))
                    .unwrap_or(false);
                let has_reverse_edge_within = reverse
                    .get(n)
                    .map(|inn| inn.iter().any(|t| level_set.contains(t)))
                    .unwrap_or(false);
                !has_forward_edge_within && !has_reverse_edge_within
            })
            .collect();
        if independent.len() >= 2 {
            groups.push(independent);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn dep(from: Uuid, to: Uuid, ty: DependencyType) -> Dependency {
        Dependency {
            id: Uuid::new_v4(),
            from_item_id: from,
            to_item_id: to,
            dependency_type: ty,
            unblock_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_self_dependency() {
        let a = Uuid::new_v4();
        let proposed = vec![ProposedDependency {
            from_item_id: a,
            to_item_id: a,
            dependency_type: DependencyType::Blocks,
            unblock_at: None,
        }];
        assert!(validate_batch(&[], &proposed).is_err());
    }

    #[test]
    fn rejects_unblock_at_on_relates_to() {
        let proposed = vec![ProposedDependency {
            from_item_id: Uuid::new_v4(),
            to_item_id: Uuid::new_v4(),
            dependency_type: DependencyType::RelatesTo,
            unblock_at: Some(Role::Work),
        }];
        assert!(validate_batch(&[], &proposed).is_err());
    }

    #[test]
    fn accepts_linear_chain() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let proposed = linear(&[a, b, c], None);
        assert!(validate_batch(&[], &proposed).is_ok());
    }

    #[test]
    fn rejects_cycle_within_batch() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut proposed = linear(&[a, b, c], None);
        proposed.push(ProposedDependency {
            from_item_id: c,
            to_item_id: a,
            dependency_type: DependencyType::Blocks,
            unblock_at: None,
        });
        let err = validate_batch(&[], &proposed).unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn rejects_cycle_against_existing_edges() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![dep(a, b, DependencyType::Blocks), dep(b, c, DependencyType::Blocks)];
        let proposed = vec![ProposedDependency {
            from_item_id: c,
            to_item_id: a,
            dependency_type: DependencyType::Blocks,
            unblock_at: None,
        }];
        assert!(validate_batch(&existing, &proposed).is_err());
    }

    #[test]
    fn analysis_on_linear_chain_finds_depths_and_critical_path() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![dep(a, b, DependencyType::Blocks), dep(b, c, DependencyType::Blocks)];
        let result = analyze(a, Direction::All, None, &edges);
        assert!(!result.has_cycle);
        assert_eq!(result.depth_map[&a], 0);
        assert_eq!(result.depth_map[&b], 1);
        assert_eq!(result.depth_map[&c], 2);
        assert_eq!(result.critical_path, vec![a, b, c]);
    }

    #[test]
    fn analysis_detects_bottleneck_and_parallel_group() {
        let (source, t1, t2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![
            dep(source, t1, DependencyType::Blocks),
            dep(source, t2, DependencyType::Blocks),
        ];
        let result = analyze(source, Direction::All, None, &edges);
        assert_eq!(result.bottlenecks.first(), Some(&(source, 2)));
        assert_eq!(result.parallel_groups.len(), 1);
        assert_eq!(result.parallel_groups[0].len(), 2);
    }

    #[test]
    fn single_node_graph_is_trivial() {
        let a = Uuid::new_v4();
        let result = analyze(a, Direction::All, None, &[]);
        assert_eq!(result.nodes, vec![a]);
        assert_eq!(result.depth_map[&a], 0);
        assert!(result.bottlenecks.is_empty());
    }

    #[test]
    fn unsatisfied_blockers_ignores_blocked_role() {
        let blocker = Uuid::new_v4();
        let incoming = vec![(blocker, Role::Queue, Role::Blocked)];
        let result = unsatisfied_blockers(&incoming);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].blocker_id, blocker);
    }
}
