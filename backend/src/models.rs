use std::sync::Arc;

pub use shared::{Coordinate, RouteBounds, RouteMetadata, RouteRequest, RouteResponse};

/// A named set of coordinates the router can start from or end at.
pub trait Region {
    fn name(&self) -> &str;
    fn coordinates(&self) -> &[Coordinate];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Park {
    name: String,
    boundary: Vec<Coordinate>,
    center: Option<Coordinate>,
}

impl Park {
    pub fn new(name: impl Into<String>, boundary: Vec<Coordinate>) -> Self {
        let center = mean_coordinate(&boundary);
        Self {
            name: name.into(),
            boundary,
            center,
        }
    }

    pub fn center(&self) -> Option<Coordinate> {
        self.center
    }
}

impl Region for Park {
    fn name(&self) -> &str {
        &self.name
    }

    fn coordinates(&self) -> &[Coordinate] {
        &self.boundary
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartPoint {
    name: String,
    coordinates: Vec<Coordinate>,
}

impl StartPoint {
    pub fn new(name: impl Into<String>, coordinates: Vec<Coordinate>) -> Self {
        Self {
            name: name.into(),
            coordinates,
        }
    }

    pub fn at(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self::new(name, vec![coordinate])
    }
}

impl Region for StartPoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }
}

/// One column of an input row.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Polyline(Vec<Coordinate>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub fields: Vec<Field>,
}

impl Record {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn polyline(&self, index: usize) -> Option<&[Coordinate]> {
        match self.fields.get(index) {
            Some(Field::Polyline(points)) => Some(points),
            _ => None,
        }
    }

    pub fn polyline_mut(&mut self, index: usize) -> Option<&mut Vec<Coordinate>> {
        match self.fields.get_mut(index) {
            Some(Field::Polyline(points)) => Some(points),
            _ => None,
        }
    }
}

/// Payload carried by an adjacency entry. Never interpreted by the router.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeInfo {
    /// Remaining fields of the record the segment came from.
    Segment(Arc<[Field]>),
    /// Name of the region a snap edge belongs to.
    Region(Arc<str>),
}

impl EdgeInfo {
    pub fn region(name: &str) -> Self {
        Self::Region(Arc::from(name))
    }
}

fn mean_coordinate(points: &[Coordinate]) -> Option<Coordinate> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lon) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), c| (lat + c.lat, lon + c.lon));
    Some(Coordinate::new(lat / n, lon / n))
}
