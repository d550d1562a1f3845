pub mod costs;
pub use costs::*;
pub mod network;
pub use network::*;
pub mod graph;
pub use graph::*;

#[cfg(test)]
mod test {
    use super::*;
    use crate::algorithm::Metric;
    use crate::utils::log;

    // a one-way link drawn against its travel direction, and a priced shortcut
    const ROADS: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"link_id": 1, "a_node": 20, "b_node": 10, "direction": -1},
         "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [300.0, 0.0]]}},
        {"type": "Feature", "properties": {"link_id": 2, "a_node": 20, "b_node": 30},
         "geometry": {"type": "LineString", "coordinates": [[300.0, 0.0], [600.0, 0.0]]}},
        {"type": "Feature", "properties": {"link_id": 3, "a_node": 10, "b_node": 30, "cost": 900.0},
         "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [600.0, 0.0]]}}
    ]}"#;

    #[test]
    fn test_road_graph_path() {
        log::log_init();
        let geojson: geojson::GeoJson = ROADS.parse().unwrap();
        let network = Network::from_geojson(geojson, Metric::Projected).unwrap();
        let graph = RoadGraph::new(network);
        let costs = CostOverrides::new();
        let path = graph.shortest_path(10, 30, &costs).unwrap().unwrap();
        let steps: Vec<(i64, Travel)> = path
            .iter()
            .map(|s| (graph.network.find_link_by_index(s.link).unwrap().get_id(), s.travel))
            .collect();
        assert_eq!(steps, vec![(1, Travel::Backward), (2, Travel::Forward)]);
        assert_eq!(graph.path_cost(&path, &costs), 600.0);
        // link 1 may only be driven from node 10 to node 20
        let back = graph.shortest_path(30, 10, &costs).unwrap().unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(graph.path_cost(&back, &costs), 900.0);
    }
}
