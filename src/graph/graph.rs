use super::costs::CostOverrides;
use super::network::{Network, Travel};
use crate::error::MapMatchError;
use log::{debug, info};
use petgraph::algo::astar;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::Directed;
use std::cmp::Ordering;

/// Edge payload: which link the edge stands for and the way it is travelled.
#[derive(Debug, Clone, Copy)]
pub struct LinkEdge {
    pub link: usize,
    pub travel: Travel,
}

/// One step of a routed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub link: usize,
    pub travel: Travel,
}

pub struct RoadGraph {
    pub network: Network,
    graph: Graph<i64, LinkEdge, Directed, usize>,
}

impl RoadGraph {
    pub fn new(network: Network) -> Self {
        info!("start construct graph...");
        let node_size = network.nodes().len();
        let edge_size = network.links().len();
        debug!("node size: {}, link size: {}", node_size, edge_size);
        let mut graph = Graph::with_capacity(node_size, edge_size * 2);
        // node indices follow the network's node order
        for node in network.nodes() {
            graph.add_node(*node);
        }
        let links = network.links().iter().zip(network.link_nodes());
        for (index, (link, &(a, b))) in links.enumerate() {
            if link.allows(Travel::Forward) {
                graph.add_edge(
                    NodeIndex::new(a),
                    NodeIndex::new(b),
                    LinkEdge { link: index, travel: Travel::Forward },
                );
            }
            if link.allows(Travel::Backward) {
                graph.add_edge(
                    NodeIndex::new(b),
                    NodeIndex::new(a),
                    LinkEdge { link: index, travel: Travel::Backward },
                );
            }
        }
        info!("finish construct road network graph...");
        RoadGraph { network, graph }
    }

    fn node_index(&self, node: i64) -> Result<NodeIndex<usize>, MapMatchError> {
        self.network
            .find_node_by_id(node)
            .map(NodeIndex::new)
            .ok_or(MapMatchError::UnknownNode(node))
    }

    fn edge_cost(&self, edge: &LinkEdge, costs: &CostOverrides) -> f64 {
        match self.network.find_link_by_index(edge.link) {
            Some(link) => costs.effective_cost(edge.link, link),
            None => f64::INFINITY,
        }
    }

    /// Cheapest path between two nodes under the given cost overrides.
    ///
    /// Returns `Ok(None)` when `to` cannot be reached from `from` and an empty path when
    /// they are the same node. Parallel links are resolved by cost, then by link id.
    pub fn shortest_path(
        &self,
        from: i64,
        to: i64,
        costs: &CostOverrides,
    ) -> Result<Option<Vec<PathStep>>, MapMatchError> {
        let start = self.node_index(from)?;
        let goal = self.node_index(to)?;
        if start == goal {
            return Ok(Some(Vec::new()));
        }
        let result = astar(
            &self.graph,
            start,
            |n| n == goal,
            |e| self.edge_cost(e.weight(), costs),
            |_| 0.0,
        );
        let (cost, nodes) = match result {
            Some(found) => found,
            None => {
                debug!("no path from node {} to node {}", from, to);
                return Ok(None);
            }
        };
        debug!("path from {} to {} costs {:.3} over {} nodes", from, to, cost, nodes.len());
        let mut steps = Vec::with_capacity(nodes.len().saturating_sub(1));
        for pair in nodes.windows(2) {
            let best = self
                .graph
                .edges_connecting(pair[0], pair[1])
                .map(|e| *e.weight())
                .min_by(|x, y| self.compare_edges(x, y, costs));
            match best {
                Some(edge) => steps.push(PathStep { link: edge.link, travel: edge.travel }),
                None => return Err(MapMatchError::Network("routed over a missing edge".to_string())),
            }
        }
        Ok(Some(steps))
    }

    fn compare_edges(&self, x: &LinkEdge, y: &LinkEdge, costs: &CostOverrides) -> Ordering {
        let by_cost = self
            .edge_cost(x, costs)
            .partial_cmp(&self.edge_cost(y, costs))
            .unwrap_or(Ordering::Equal);
        by_cost.then_with(|| self.link_id(x.link).cmp(&self.link_id(y.link)))
    }

    fn link_id(&self, index: usize) -> i64 {
        self.network.find_link_by_index(index).map_or(i64::MAX, |l| l.get_id())
    }

    /// Sum of effective costs along `path`.
    pub fn path_cost(&self, path: &[PathStep], costs: &CostOverrides) -> f64 {
        path.iter()
            .map(|step| self.edge_cost(&LinkEdge { link: step.link, travel: step.travel }, costs))
            .sum()
    }
}
