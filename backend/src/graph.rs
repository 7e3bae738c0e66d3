use std::collections::HashMap;

use petgraph::unionfind::UnionFind;

use crate::models::{Coordinate, EdgeInfo};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("both endpoints must be in the graph before creating an edge ({from:?} -> {to:?})")]
    InvalidEdge { from: Coordinate, to: Coordinate },
    #[error("vertex {0:?} does not exist in the graph")]
    VertexNotFound(Coordinate),
    #[error("graph is empty")]
    EmptyGraph,
    #[error("edge weight must be finite and non-negative, got {0}")]
    InvalidWeight(f64),
}

/// Handle to a vertex, valid for the lifetime of the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(usize);

impl VertexId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Hash key for a coordinate. Two keys are equal iff both components are
/// numerically equal; `-0.0` is folded onto `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct VertexKey(u64, u64);

impl From<Coordinate> for VertexKey {
    fn from(c: Coordinate) -> Self {
        // `+ 0.0` turns -0.0 into 0.0 and leaves everything else untouched
        Self((c.lat + 0.0).to_bits(), (c.lon + 0.0).to_bits())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Adjacency {
    pub(crate) target: VertexId,
    pub(crate) info: EdgeInfo,
    pub(crate) weight_km: f64,
}

#[derive(Debug, Clone)]
struct Vertex {
    coord: Coordinate,
    adjacency: Vec<Adjacency>,
}

/// Entry returned by [`Graph::get_neighbors`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    pub coord: Coordinate,
    pub info: &'a EdgeInfo,
    pub weight_km: f64,
}

/// Undirected weighted graph keyed by coordinate.
///
/// Vertices are kept in insertion order and are never removed. Each edge is
/// stored twice, once in the adjacency list of each endpoint, and adjacency
/// lists keep insertion order so searches over the graph are reproducible.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: Vec<Vertex>,
    index: HashMap<VertexKey, VertexId>,
    edge_count: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `coord` if absent. Returns the id of the (possibly existing) vertex.
    pub fn add_vertex(&mut self, coord: Coordinate) -> VertexId {
        let key = VertexKey::from(coord);
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = VertexId(self.vertices.len());
        self.vertices.push(Vertex {
            coord,
            adjacency: Vec::new(),
        });
        self.index.insert(key, id);
        id
    }

    /// Connects two existing vertices in both directions.
    ///
    /// `info1` describes `from` and is stored on `to`'s side, `info2` the
    /// reverse, so a neighbor entry always carries the info of the neighbor.
    pub fn add_edge(
        &mut self,
        from: Coordinate,
        to: Coordinate,
        info1: EdgeInfo,
        info2: EdgeInfo,
        weight_km: f64,
    ) -> Result<(), GraphError> {
        let (Some(a), Some(b)) = (self.vertex_id(from), self.vertex_id(to)) else {
            return Err(GraphError::InvalidEdge { from, to });
        };
        if !weight_km.is_finite() || weight_km < 0.0 {
            return Err(GraphError::InvalidWeight(weight_km));
        }

        self.vertices[a.0].adjacency.push(Adjacency {
            target: b,
            info: info2,
            weight_km,
        });
        self.vertices[b.0].adjacency.push(Adjacency {
            target: a,
            info: info1,
            weight_km,
        });
        self.edge_count += 1;
        Ok(())
    }

    /// Neighbors of `coord` in insertion order.
    pub fn get_neighbors(
        &self,
        coord: Coordinate,
    ) -> Result<impl Iterator<Item = Neighbor<'_>> + '_, GraphError> {
        let id = self
            .vertex_id(coord)
            .ok_or(GraphError::VertexNotFound(coord))?;
        Ok(self.adjacency(id).iter().map(move |adj| Neighbor {
            coord: self.vertices[adj.target.0].coord,
            info: &adj.info,
            weight_km: adj.weight_km,
        }))
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        self.index.contains_key(&VertexKey::from(coord))
    }

    pub fn vertex_id(&self, coord: Coordinate) -> Option<VertexId> {
        self.index.get(&VertexKey::from(coord)).copied()
    }

    /// # Panics
    /// If `id` was issued by another graph and is out of range.
    pub fn coordinate(&self, id: VertexId) -> Coordinate {
        self.vertices[id.0].coord
    }

    /// Vertex coordinates in insertion order.
    pub fn vertices(&self) -> impl ExactSizeIterator<Item = Coordinate> + '_ {
        self.vertices.iter().map(|v| v.coord)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of undirected edges, parallel edges and self-loops included.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of connected components. Isolated vertices count as one each.
    pub fn component_count(&self) -> usize {
        let mut components = UnionFind::<usize>::new(self.vertices.len());
        for (idx, vertex) in self.vertices.iter().enumerate() {
            for adj in &vertex.adjacency {
                components.union(idx, adj.target.0);
            }
        }
        let mut labels = components.into_labeling();
        labels.sort_unstable();
        labels.dedup();
        labels.len()
    }

    pub(crate) fn adjacency(&self, id: VertexId) -> &[Adjacency] {
        &self.vertices[id.0].adjacency
    }

    pub(crate) fn vertex_ids(&self) -> impl Iterator<Item = VertexId> {
        (0..self.vertices.len()).map(VertexId)
    }
}
