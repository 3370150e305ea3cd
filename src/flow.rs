//! Min-cost-flow networks with labelled nodes and a successive shortest path solver.
//!
//! A `FlowNetwork` is a directed graph over arbitrary ordered node labels. Every edge carries an
//! integer capacity and cost. A `FlowSolver` computes a maximum flow of minimum cost from the
//! network's source to its sink and returns it as nested map `from -> to -> flow units`.
//!
//! The bundled `SuccessiveShortestPaths` solver repeatedly augments along the cheapest path in the
//! residual network. Path search uses the queue-based Bellman-Ford method, since residual edges
//! carry negative costs. As all capacities are integers, the resulting flow is integral.

use log::debug;
use std::collections::{BTreeMap, VecDeque};

/// Flow units per edge: `from -> to -> units`. Only edges with positive flow are present.
pub type FlowMap<N> = BTreeMap<N, BTreeMap<N, u32>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowEdge {
    pub from: usize,
    pub to: usize,
    pub capacity: u32,
    pub cost: i64,
}

/// A directed graph with capacities and costs over labelled nodes
#[derive(Clone, Debug)]
pub struct FlowNetwork<N> {
    labels: Vec<N>,
    index: BTreeMap<N, usize>,
    edges: Vec<FlowEdge>,
    source: usize,
    sink: usize,
}

impl<N: Ord + Clone> FlowNetwork<N> {
    pub fn new(source: N, sink: N) -> Self {
        let mut network = FlowNetwork {
            labels: Vec::new(),
            index: BTreeMap::new(),
            edges: Vec::new(),
            source: 0,
            sink: 0,
        };
        network.source = network.node(source);
        network.sink = network.node(sink);
        network
    }

    /// Get the index of the node with the given label, creating the node if required
    fn node(&mut self, label: N) -> usize {
        if let Some(i) = self.index.get(&label) {
            return *i;
        }
        self.labels.push(label.clone());
        self.index.insert(label, self.labels.len() - 1);
        self.labels.len() - 1
    }

    pub fn add_edge(&mut self, from: N, to: N, capacity: u32, cost: i64) {
        let from = self.node(from);
        let to = self.node(to);
        self.edges.push(FlowEdge {
            from,
            to,
            capacity,
            cost,
        });
    }

    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    pub fn label(&self, node: usize) -> &N {
        &self.labels[node]
    }

    pub fn contains(&self, label: &N) -> bool {
        self.index.contains_key(label)
    }

    pub fn source(&self) -> &N {
        &self.labels[self.source]
    }

    pub fn sink(&self) -> &N {
        &self.labels[self.sink]
    }

    /// Translate per-edge flow values (in order of `edges()`) into a labelled `FlowMap`
    pub fn to_flow_map(&self, edge_flows: &[u32]) -> FlowMap<N> {
        let mut result = FlowMap::new();
        for (edge, flow) in self.edges.iter().zip(edge_flows) {
            if *flow > 0 {
                *result
                    .entry(self.labels[edge.from].clone())
                    .or_insert_with(BTreeMap::new)
                    .entry(self.labels[edge.to].clone())
                    .or_insert(0) += *flow;
            }
        }
        result
    }
}

/// Black-box min-cost maximum-flow algorithm
pub trait FlowSolver {
    fn min_cost_max_flow<N: Ord + Clone>(&self, network: &FlowNetwork<N>) -> FlowMap<N>;
}

/// Sum of flow units leaving `node`
pub fn total_outflow<N: Ord>(flow: &FlowMap<N>, node: &N) -> u32 {
    flow.get(node).map(|targets| targets.values().sum()).unwrap_or(0)
}

/// Follow one unit of flow from `start` to `sink` and remove it from the map.
///
/// Returns the visited nodes (including `start` and `sink`) or None, if the flow ends before
/// reaching the sink. At each node the first outgoing edge (in label order) with remaining flow is
/// taken. Calling this repeatedly decomposes a flow into unit paths.
pub fn trace_unit_path<N: Ord + Clone>(flow: &mut FlowMap<N>, start: &N, sink: &N) -> Option<Vec<N>> {
    let mut path = vec![start.clone()];
    let mut current = start.clone();
    // A simple path cannot be longer than the number of nodes with outgoing flow
    let max_length = flow.len() + 1;
    while &current != sink {
        if path.len() > max_length {
            return None;
        }
        let targets = flow.get_mut(&current)?;
        let next = targets
            .iter()
            .find(|(_, units)| **units > 0)
            .map(|(n, _)| n.clone())?;
        if let Some(units) = targets.get_mut(&next) {
            *units -= 1;
            if *units == 0 {
                targets.remove(&next);
            }
        }
        if targets.is_empty() {
            flow.remove(&current);
        }
        path.push(next.clone());
        current = next;
    }
    Some(path)
}

/// Successive shortest augmenting paths with Bellman-Ford path search
#[derive(Clone, Copy, Debug, Default)]
pub struct SuccessiveShortestPaths;

/// Residual network edge. Edge `2i` is the forward edge of network edge `i`, `2i + 1` its reverse.
struct ResidualEdge {
    to: usize,
    residual: u32,
    cost: i64,
}

impl FlowSolver for SuccessiveShortestPaths {
    fn min_cost_max_flow<N: Ord + Clone>(&self, network: &FlowNetwork<N>) -> FlowMap<N> {
        let n = network.num_nodes();
        let mut residual_edges = Vec::<ResidualEdge>::with_capacity(2 * network.edges.len());
        let mut adjacency = vec![Vec::<usize>::new(); n];
        for edge in network.edges.iter() {
            adjacency[edge.from].push(residual_edges.len());
            residual_edges.push(ResidualEdge {
                to: edge.to,
                residual: edge.capacity,
                cost: edge.cost,
            });
            adjacency[edge.to].push(residual_edges.len());
            residual_edges.push(ResidualEdge {
                to: edge.from,
                residual: 0,
                cost: -edge.cost,
            });
        }

        let mut total_flow: u64 = 0;
        let mut total_cost: i64 = 0;
        loop {
            // Bellman-Ford (queue variant) for the cheapest augmenting path
            let mut distance = vec![i64::MAX; n];
            let mut predecessor_edge: Vec<Option<usize>> = vec![None; n];
            let mut in_queue = vec![false; n];
            let mut queue = VecDeque::new();
            distance[network.source] = 0;
            queue.push_back(network.source);
            in_queue[network.source] = true;
            while let Some(u) = queue.pop_front() {
                in_queue[u] = false;
                for e in adjacency[u].iter() {
                    let edge = &residual_edges[*e];
                    if edge.residual > 0 && distance[u] + edge.cost < distance[edge.to] {
                        distance[edge.to] = distance[u] + edge.cost;
                        predecessor_edge[edge.to] = Some(*e);
                        if !in_queue[edge.to] {
                            queue.push_back(edge.to);
                            in_queue[edge.to] = true;
                        }
                    }
                }
            }
            if distance[network.sink] == i64::MAX {
                break;
            }

            // Find bottleneck capacity along the path
            let mut bottleneck = u32::MAX;
            let mut v = network.sink;
            while let Some(e) = predecessor_edge[v] {
                bottleneck = bottleneck.min(residual_edges[e].residual);
                v = residual_edges[e ^ 1].to;
            }

            // Augment
            let mut v = network.sink;
            while let Some(e) = predecessor_edge[v] {
                residual_edges[e].residual -= bottleneck;
                residual_edges[e ^ 1].residual += bottleneck;
                v = residual_edges[e ^ 1].to;
            }
            total_flow += bottleneck as u64;
            total_cost += bottleneck as i64 * distance[network.sink];
        }
        debug!(
            "Min cost flow finished with flow {} and cost {}",
            total_flow, total_cost
        );

        // The flow on a network edge equals the residual capacity of its reverse edge
        let edge_flows: Vec<u32> = (0..network.edges.len())
            .map(|i| residual_edges[2 * i + 1].residual)
            .collect();
        network.to_flow_map(&edge_flows)
    }
}
