use std::{cmp::Ordering, collections::BinaryHeap};

use crate::{
    graph::{Graph, GraphError, VertexId},
    models::{Coordinate, Region},
    snap::attach_region,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("no path found from {from:?} to {to:?}")]
    NoPathFound { from: String, to: String },
    #[error("region {0:?} has no coordinates")]
    EmptyRegion(String),
}

/// Shortest route between two regions.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Vertices from the source coordinate to the chosen destination, both included.
    pub path: Vec<Coordinate>,
    pub distance_km: f64,
}

impl Route {
    pub fn source(&self) -> Coordinate {
        self.path[0]
    }

    pub fn destination(&self) -> Coordinate {
        self.path[self.path.len() - 1]
    }
}

/// Tentative distances and back-pointers left by a single-source search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTree {
    distances: Vec<f64>,
    previous: Vec<Option<VertexId>>,
}

impl SearchTree {
    fn new(vertex_count: usize, source: VertexId) -> Self {
        let mut distances = vec![f64::INFINITY; vertex_count];
        distances[source.index()] = 0.0;
        Self {
            distances,
            previous: vec![None; vertex_count],
        }
    }

    /// `f64::INFINITY` when `vertex` was not reached.
    pub fn distance(&self, vertex: VertexId) -> f64 {
        self.distances[vertex.index()]
    }

    pub fn previous(&self, vertex: VertexId) -> Option<VertexId> {
        self.previous[vertex.index()]
    }

    /// Vertices from the search source to `target`, following back-pointers.
    pub fn path_to(&self, target: VertexId) -> Vec<VertexId> {
        let mut path = vec![target];
        let mut current = target;
        while let Some(prev) = self.previous(current) {
            path.push(prev);
            current = prev;
        }
        path.reverse();
        path
    }

    /// Returns true when the entry improved.
    fn relax(&mut self, from: VertexId, to: VertexId, cost: f64) -> bool {
        if cost < self.distances[to.index()] {
            self.distances[to.index()] = cost;
            self.previous[to.index()] = Some(from);
            true
        } else {
            false
        }
    }
}

/// Single-source shortest-path strategy.
///
/// Implementations settle vertices by increasing tentative distance and break
/// ties by the lexicographic order of their coordinates, so every
/// implementation yields the same tree for the vertices it settles. A search
/// may stop as soon as all `targets` are settled; an empty `targets` slice
/// asks for the full tree.
pub trait PathFinder: Send + Sync {
    fn search(&self, graph: &Graph, source: VertexId, targets: &[VertexId]) -> SearchTree;
}

/// Dijkstra over a binary heap with lazy deletion.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapDijkstra;

/// Dijkstra selecting the minimum by linear scan, O(V²).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanDijkstra;

#[derive(Clone, Copy)]
struct State {
    cost: f64,
    coord: Coordinate,
    vertex: VertexId,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap by cost, then by coordinate
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.coord.total_cmp(&self.coord))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

/// Counts settled targets so a search can stop early.
struct TargetTracker {
    is_target: Vec<bool>,
    remaining: usize,
}

impl TargetTracker {
    fn new(vertex_count: usize, targets: &[VertexId]) -> Self {
        let mut is_target = vec![false; vertex_count];
        let mut remaining = 0;
        for target in targets {
            if !is_target[target.index()] {
                is_target[target.index()] = true;
                remaining += 1;
            }
        }
        Self {
            is_target,
            remaining,
        }
    }

    /// Returns true once the last target has been settled.
    fn settle(&mut self, vertex: VertexId) -> bool {
        if self.is_target[vertex.index()] {
            self.is_target[vertex.index()] = false;
            self.remaining -= 1;
            return self.remaining == 0;
        }
        false
    }
}

impl PathFinder for HeapDijkstra {
    fn search(&self, graph: &Graph, source: VertexId, targets: &[VertexId]) -> SearchTree {
        let vertex_count = graph.vertex_count();
        let mut tree = SearchTree::new(vertex_count, source);
        let mut settled = vec![false; vertex_count];
        let mut tracker = TargetTracker::new(vertex_count, targets);
        let mut heap = BinaryHeap::new();

        heap.push(State {
            cost: 0.0,
            coord: graph.coordinate(source),
            vertex: source,
        });

        while let Some(State { cost, vertex, .. }) = heap.pop() {
            // Stale entry left behind by a later improvement
            if settled[vertex.index()] {
                continue;
            }
            settled[vertex.index()] = true;
            if tracker.settle(vertex) {
                break;
            }

            for adj in graph.adjacency(vertex) {
                let next_cost = cost + adj.weight_km;
                if tree.relax(vertex, adj.target, next_cost) {
                    heap.push(State {
                        cost: next_cost,
                        coord: graph.coordinate(adj.target),
                        vertex: adj.target,
                    });
                }
            }
        }

        tree
    }
}

impl PathFinder for ScanDijkstra {
    fn search(&self, graph: &Graph, source: VertexId, targets: &[VertexId]) -> SearchTree {
        let vertex_count = graph.vertex_count();
        let mut tree = SearchTree::new(vertex_count, source);
        let mut visited = vec![false; vertex_count];
        let mut tracker = TargetTracker::new(vertex_count, targets);

        loop {
            // Unreached vertices cannot relax anything, so they are never selected
            let next = graph
                .vertex_ids()
                .filter(|id| !visited[id.index()] && tree.distance(*id).is_finite())
                .min_by(|a, b| {
                    tree.distance(*a)
                        .total_cmp(&tree.distance(*b))
                        .then_with(|| graph.coordinate(*a).total_cmp(&graph.coordinate(*b)))
                });
            let Some(current) = next else {
                break;
            };

            visited[current.index()] = true;
            if tracker.settle(current) {
                break;
            }

            let cost = tree.distance(current);
            for adj in graph.adjacency(current) {
                tree.relax(current, adj.target, cost + adj.weight_km);
            }
        }

        tree
    }
}

/// Routes between regions of a [`Graph`] with a pluggable [`PathFinder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestPathEngine<F = HeapDijkstra> {
    finder: F,
}

impl ShortestPathEngine<HeapDijkstra> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: PathFinder> ShortestPathEngine<F> {
    pub fn with_finder(finder: F) -> Self {
        Self { finder }
    }

    /// Shortest route from the first coordinate of `source` to the closest
    /// coordinate of `destination`. Does not modify the graph: every region
    /// coordinate must already be a vertex (see [`attach_region`]).
    ///
    /// When several destination coordinates are equally close, the first one
    /// in region order is chosen.
    pub fn query_shortest_path<S, D>(
        &self,
        graph: &Graph,
        source: &S,
        destination: &D,
    ) -> Result<Route, EngineError>
    where
        S: Region + ?Sized,
        D: Region + ?Sized,
    {
        if graph.is_empty() {
            return Err(GraphError::EmptyGraph.into());
        }
        let source_coord = first_coordinate(source)?;
        first_coordinate(destination)?;

        let source_id = graph
            .vertex_id(source_coord)
            .ok_or(GraphError::VertexNotFound(source_coord))?;
        let targets = destination
            .coordinates()
            .iter()
            .map(|&c| graph.vertex_id(c).ok_or(GraphError::VertexNotFound(c)))
            .collect::<Result<Vec<_>, _>>()?;

        let tree = self.finder.search(graph, source_id, &targets);

        let mut best: Option<(VertexId, f64)> = None;
        for &target in &targets {
            let distance = tree.distance(target);
            if distance.is_finite() && best.map_or(true, |(_, min)| distance < min) {
                best = Some((target, distance));
            }
        }
        let Some((target, distance_km)) = best else {
            return Err(EngineError::NoPathFound {
                from: source.name().to_string(),
                to: destination.name().to_string(),
            });
        };

        let path: Vec<Coordinate> = tree
            .path_to(target)
            .into_iter()
            .map(|id| graph.coordinate(id))
            .collect();

        tracing::debug!(
            "route {:?} -> {:?}: {} vertices, {:.3} km",
            source.name(),
            destination.name(),
            path.len(),
            distance_km
        );

        Ok(Route { path, distance_km })
    }

    /// Snap `destination` then `source` into the graph and query the route
    /// between them. Snapped vertices stay in the graph, also on failure.
    pub fn find_shortest_path<S, D>(
        &self,
        graph: &mut Graph,
        source: &S,
        destination: &D,
    ) -> Result<Route, EngineError>
    where
        S: Region + ?Sized,
        D: Region + ?Sized,
    {
        first_coordinate(source)?;
        first_coordinate(destination)?;

        attach_region(graph, destination)?;
        attach_region(graph, source)?;
        self.query_shortest_path(graph, source, destination)
    }
}

pub fn query_shortest_path<S, D>(
    graph: &Graph,
    source: &S,
    destination: &D,
) -> Result<Route, EngineError>
where
    S: Region + ?Sized,
    D: Region + ?Sized,
{
    ShortestPathEngine::new().query_shortest_path(graph, source, destination)
}

pub fn find_shortest_path<S, D>(
    graph: &mut Graph,
    source: &S,
    destination: &D,
) -> Result<Route, EngineError>
where
    S: Region + ?Sized,
    D: Region + ?Sized,
{
    ShortestPathEngine::new().find_shortest_path(graph, source, destination)
}

fn first_coordinate<R: Region + ?Sized>(region: &R) -> Result<Coordinate, EngineError> {
    region
        .coordinates()
        .first()
        .copied()
        .ok_or_else(|| EngineError::EmptyRegion(region.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeInfo, Park, StartPoint};

    const A: Coordinate = Coordinate::new(49.267, -123.12);
    const B: Coordinate = Coordinate::new(49.268, -123.11);
    const C: Coordinate = Coordinate::new(49.269, -123.10);
    const D: Coordinate = Coordinate::new(49.270, -123.11);
    const E: Coordinate = Coordinate::new(49.271, -123.11);

    fn info(label: &str) -> EdgeInfo {
        EdgeInfo::region(label)
    }

    //  A - B - C - D
    //  |           |
    //  E ----------+
    fn cycle_graph() -> Graph {
        let mut graph = Graph::new();
        for coord in [A, B, C, D, E] {
            graph.add_vertex(coord);
        }
        let edges = [(A, B, 1.0), (B, C, 2.0), (C, D, 1.0), (A, E, 1.0), (D, E, 1.0), (E, A, 1.0)];
        for (from, to, weight) in edges {
            graph.add_edge(from, to, info("A"), info("B"), weight).unwrap();
        }
        graph
    }

    #[test]
    fn finds_shorter_branch_of_cycle() {
        let mut graph = cycle_graph();
        let start = StartPoint::at("Test School", D);
        let park = Park::new("Test Park", vec![A]);

        let route = find_shortest_path(&mut graph, &start, &park).unwrap();
        assert_eq!(route.path, vec![D, E, A]);
        assert_eq!(route.distance_km, 2.0);
        assert_eq!(route.source(), D);
        assert_eq!(route.destination(), A);
    }

    #[test]
    fn scan_and_heap_agree_on_cycle() {
        let mut graph = cycle_graph();
        let start = StartPoint::at("Test School", D);
        let park = Park::new("Test Park", vec![A]);

        let heap = ShortestPathEngine::new()
            .find_shortest_path(&mut graph, &start, &park)
            .unwrap();
        let scan = ShortestPathEngine::with_finder(ScanDijkstra)
            .query_shortest_path(&graph, &start, &park)
            .unwrap();
        assert_eq!(heap, scan);
    }

    #[test]
    fn picks_closest_destination_coordinate() {
        let graph = cycle_graph();
        let start = StartPoint::at("School", A);
        // B is 1 away, C is 3 away, D is 2 away through E
        let park = Park::new("Park", vec![C, D, B]);

        let route = query_shortest_path(&graph, &start, &park).unwrap();
        assert_eq!(route.path, vec![A, B]);
        assert_eq!(route.distance_km, 1.0);
    }

    #[test]
    fn equal_destinations_keep_region_order() {
        let graph = cycle_graph();
        let start = StartPoint::at("School", A);
        // B and E are both 1 away
        let route = query_shortest_path(&graph, &start, &Park::new("Park", vec![E, B])).unwrap();
        assert_eq!(route.destination(), E);
        let route = query_shortest_path(&graph, &start, &Park::new("Park", vec![B, E])).unwrap();
        assert_eq!(route.destination(), B);
    }

    #[test]
    fn source_inside_destination_region_gives_single_vertex_route() {
        let graph = cycle_graph();
        let start = StartPoint::at("School", C);
        let route = query_shortest_path(&graph, &start, &Park::new("Park", vec![A, C])).unwrap();
        assert_eq!(route.path, vec![C]);
        assert_eq!(route.distance_km, 0.0);
    }

    #[test]
    fn equal_cost_paths_break_ties_by_coordinate_order() {
        //     N
        //   /   \
        //  S     T
        //   \   /
        //     M
        let s = Coordinate::new(0.0, 0.0);
        let n = Coordinate::new(1.0, 1.0);
        let m = Coordinate::new(-1.0, 1.0);
        let t = Coordinate::new(0.0, 2.0);
        let mut graph = Graph::new();
        for coord in [s, n, m, t] {
            graph.add_vertex(coord);
        }
        for (from, to) in [(s, n), (n, t), (s, m), (m, t)] {
            graph.add_edge(from, to, info("x"), info("x"), 1.0).unwrap();
        }

        // M settles before N, so T is reached through M first
        let route =
            query_shortest_path(&graph, &StartPoint::at("S", s), &Park::new("T", vec![t])).unwrap();
        assert_eq!(route.path, vec![s, m, t]);
        let scan = ShortestPathEngine::with_finder(ScanDijkstra)
            .query_shortest_path(&graph, &StartPoint::at("S", s), &Park::new("T", vec![t]))
            .unwrap();
        assert_eq!(scan.path, vec![s, m, t]);
    }

    #[test]
    fn parallel_edges_use_the_lighter_one() {
        let mut graph = Graph::new();
        graph.add_vertex(A);
        graph.add_vertex(B);
        graph.add_edge(A, B, info("slow"), info("slow"), 5.0).unwrap();
        graph.add_edge(A, B, info("fast"), info("fast"), 2.0).unwrap();
        let route =
            query_shortest_path(&graph, &StartPoint::at("S", A), &Park::new("P", vec![B])).unwrap();
        assert_eq!(route.distance_km, 2.0);
        assert_eq!(route.path, vec![A, B]);
    }

    #[test]
    fn empty_graph_is_rejected() {
        let mut graph = Graph::new();
        let start = StartPoint::at("School", A);
        let park = Park::new("Park", vec![B]);
        assert!(matches!(
            query_shortest_path(&graph, &start, &park),
            Err(EngineError::Graph(GraphError::EmptyGraph))
        ));
        assert!(matches!(
            find_shortest_path(&mut graph, &start, &park),
            Err(EngineError::Graph(GraphError::EmptyGraph))
        ));
    }

    #[test]
    fn empty_region_is_rejected_before_snapping() {
        let mut graph = cycle_graph();
        let start = StartPoint::new("Nowhere", Vec::new());
        let park = Park::new("Park", vec![Coordinate::new(49.3, -123.2)]);
        assert!(matches!(
            find_shortest_path(&mut graph, &start, &park),
            Err(EngineError::EmptyRegion(name)) if name == "Nowhere"
        ));
        assert_eq!(graph.vertex_count(), 5);
    }

    #[test]
    fn query_requires_attached_regions() {
        let graph = cycle_graph();
        let outside = Coordinate::new(49.3, -123.2);
        let start = StartPoint::at("School", outside);
        let park = Park::new("Park", vec![A]);
        assert!(matches!(
            query_shortest_path(&graph, &start, &park),
            Err(EngineError::Graph(GraphError::VertexNotFound(c))) if c == outside
        ));
    }

    #[test]
    fn disconnected_destination_has_no_path() {
        let mut graph = cycle_graph();
        let island = [Coordinate::new(10.0, 10.0), Coordinate::new(10.0, 10.001)];
        for coord in island {
            graph.add_vertex(coord);
        }
        graph.add_edge(island[0], island[1], info("i"), info("i"), 0.1).unwrap();

        let start = StartPoint::at("School", A);
        let park = Park::new("Island Park", island.to_vec());
        assert!(matches!(
            query_shortest_path(&graph, &start, &park),
            Err(EngineError::NoPathFound { to, .. }) if to == "Island Park"
        ));
    }

    #[test]
    fn find_snaps_outside_points_and_keeps_them() {
        let mut graph = cycle_graph();
        let start = StartPoint::at("School", Coordinate::new(49.2665, -123.121));
        let park = Park::new(
            "Park",
            vec![Coordinate::new(49.2715, -123.109), Coordinate::new(49.2695, -123.099)],
        );

        let route = find_shortest_path(&mut graph, &start, &park).unwrap();
        assert_eq!(route.source(), start.coordinates()[0]);
        assert!(park.coordinates().contains(&route.destination()));
        assert_eq!(graph.vertex_count(), 8);
        assert_eq!(route.path[1], A);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_graph() -> impl Strategy<Value = Graph> {
            (2usize..12).prop_flat_map(|n| {
                prop::collection::vec((0..n, 0..n, 0u8..4), 0..30).prop_map(move |edges| {
                    let coords: Vec<Coordinate> = (0..n)
                        .map(|i| Coordinate::new((i % 3) as f64, (i / 3) as f64))
                        .collect();
                    let mut graph = Graph::new();
                    for &coord in coords.iter().rev() {
                        graph.add_vertex(coord);
                    }
                    for (from, to, weight) in edges {
                        let weight = f64::from(weight);
                        graph
                            .add_edge(coords[from], coords[to], info("e"), info("e"), weight)
                            .unwrap();
                    }
                    graph
                })
            })
        }

        proptest! {
            #[test]
            fn prop_heap_and_scan_build_identical_trees(graph in arb_graph()) {
                for source in graph.vertex_ids() {
                    let heap = HeapDijkstra.search(&graph, source, &[]);
                    let scan = ScanDijkstra.search(&graph, source, &[]);
                    prop_assert_eq!(heap, scan);
                }
            }

            #[test]
            fn prop_early_exit_keeps_target_results(graph in arb_graph(), pick in 0usize..12) {
                let ids: Vec<VertexId> = graph.vertex_ids().collect();
                let source = ids[0];
                let target = ids[pick % ids.len()];
                let full = HeapDijkstra.search(&graph, source, &[]);
                let early = HeapDijkstra.search(&graph, source, &[target]);
                prop_assert_eq!(full.distance(target), early.distance(target));
                if full.distance(target).is_finite() {
                    prop_assert_eq!(full.path_to(target), early.path_to(target));
                }
            }

            #[test]
            fn prop_path_cost_matches_distance(graph in arb_graph()) {
                let ids: Vec<VertexId> = graph.vertex_ids().collect();
                let tree = HeapDijkstra.search(&graph, ids[0], &[]);
                for &target in &ids {
                    if !tree.distance(target).is_finite() {
                        continue;
                    }
                    let path = tree.path_to(target);
                    prop_assert_eq!(path[0], ids[0]);
                    let mut cost = 0.0;
                    for pair in path.windows(2) {
                        let step = graph
                            .adjacency(pair[0])
                            .iter()
                            .filter(|adj| adj.target == pair[1])
                            .map(|adj| adj.weight_km)
                            .fold(f64::INFINITY, f64::min);
                        cost += step;
                    }
                    prop_assert_eq!(cost, tree.distance(target));
                }
            }
        }
    }
}
