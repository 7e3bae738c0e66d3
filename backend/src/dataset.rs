//! Reader for the semicolon-delimited open-data exports (bikeways, parks).
//!
//! The geometry column holds a GeoJSON geometry object. Positions are
//! `[lon, lat]` and are turned into [`Coordinate`]s.

use std::io::{self, Read};

use rayon::prelude::*;
use serde::Deserialize;

use crate::models::{Coordinate, Field, Park, Record};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] io::Error),
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("column {0:?} not found in header")]
    MissingColumn(String),
    #[error("row {row}: invalid geometry: {source}")]
    Geometry { row: usize, source: GeometryError },
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("position with {0} values, expected at least 2")]
    Position(usize),
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum Geometry {
    Point(Vec<f64>),
    LineString(Vec<Vec<f64>>),
    MultiLineString(Vec<Vec<Vec<f64>>>),
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Result<usize, DatasetError> {
        self.header
            .iter()
            .position(|column| column == name.trim())
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BikewayTable {
    pub header: Vec<String>,
    /// Field index of the polyline in every record.
    pub geometry_index: usize,
    pub records: Vec<Record>,
}

pub fn read_table(reader: impl Read) -> Result<Table, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let header = csv_reader
        .headers()?
        .iter()
        .map(|column| column.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }

    Ok(Table { header, rows })
}

/// Parts of a GeoJSON geometry: one per line, polygon outer ring or point.
pub fn parse_geometry(text: &str) -> Result<Vec<Vec<Coordinate>>, GeometryError> {
    let geometry: Geometry = serde_json::from_str(text)?;
    let line = |positions: Vec<Vec<f64>>| -> Result<Vec<Coordinate>, GeometryError> {
        positions.iter().map(|p| to_coordinate(p)).collect()
    };
    let outer_ring = |rings: Vec<Vec<Vec<f64>>>| rings.into_iter().next().unwrap_or_default();

    match geometry {
        Geometry::Point(position) => Ok(vec![vec![to_coordinate(&position)?]]),
        Geometry::LineString(positions) => Ok(vec![line(positions)?]),
        Geometry::MultiLineString(lines) => lines.into_iter().map(line).collect(),
        Geometry::Polygon(rings) => Ok(vec![line(outer_ring(rings))?]),
        Geometry::MultiPolygon(polygons) => polygons
            .into_iter()
            .map(|rings| line(outer_ring(rings)))
            .collect(),
    }
}

/// Load bikeway segments, one record per line part.
///
/// Rows with an empty geometry cell are skipped.
pub fn load_bikeways(
    reader: impl Read,
    geometry_column: &str,
) -> Result<BikewayTable, DatasetError> {
    let table = read_table(reader)?;
    let geometry_index = table.column_index(geometry_column)?;
    let geometries = parse_rows(&table, geometry_index)?;

    let mut records = Vec::with_capacity(table.rows.len());
    for (row, parts) in table.rows.iter().zip(geometries) {
        let Some(parts) = parts else {
            continue;
        };
        for part in parts {
            let fields = row
                .iter()
                .enumerate()
                .map(|(idx, value)| {
                    if idx == geometry_index {
                        Field::Polyline(part.clone())
                    } else {
                        Field::Text(value.clone())
                    }
                })
                .collect();
            records.push(Record::new(fields));
        }
    }

    tracing::info!(
        "loaded {} bikeway records from {} rows",
        records.len(),
        table.rows.len()
    );

    Ok(BikewayTable {
        header: table.header,
        geometry_index,
        records,
    })
}

/// Load parks; the boundary of a multi-part park is the concatenation of its parts.
pub fn load_parks(
    reader: impl Read,
    geometry_column: &str,
    name_column: &str,
) -> Result<Vec<Park>, DatasetError> {
    let table = read_table(reader)?;
    let geometry_index = table.column_index(geometry_column)?;
    let name_index = table.column_index(name_column)?;
    let geometries = parse_rows(&table, geometry_index)?;

    let parks: Vec<Park> = table
        .rows
        .iter()
        .zip(geometries)
        .filter_map(|(row, parts)| {
            let boundary = parts?.concat();
            let name = row.get(name_index).map(|n| n.trim()).unwrap_or_default();
            Some(Park::new(name, boundary))
        })
        .collect();

    tracing::info!("loaded {} parks from {} rows", parks.len(), table.rows.len());
    Ok(parks)
}

fn parse_rows(
    table: &Table,
    geometry_index: usize,
) -> Result<Vec<Option<Vec<Vec<Coordinate>>>>, DatasetError> {
    table
        .rows
        .par_iter()
        .enumerate()
        .map(|(idx, row)| {
            let text = row.get(geometry_index).map(|t| t.trim()).unwrap_or_default();
            if text.is_empty() {
                tracing::warn!("row {}: empty geometry, skipping", idx + 1);
                return Ok(None);
            }
            let parts = parse_geometry(text).map_err(|source| DatasetError::Geometry {
                row: idx + 1,
                source,
            })?;
            if parts.iter().all(Vec::is_empty) {
                tracing::warn!("row {}: geometry without positions, skipping", idx + 1);
                return Ok(None);
            }
            Ok(Some(parts))
        })
        .collect()
}

fn to_coordinate(position: &[f64]) -> Result<Coordinate, GeometryError> {
    match position {
        [lon, lat, ..] => Ok(Coordinate::new(*lat, *lon)),
        _ => Err(GeometryError::Position(position.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIKEWAYS: &str = "\u{feff}STREET NAME;Geom;BIKEWAY TYPE\n\
Main St;\"{\"\"coordinates\"\": [[-123.10, 49.26], [-123.10, 49.27]], \"\"type\"\": \"\"LineString\"\"}\";Painted Lanes\n\
Empty St;;Local Street\n\
Union St;\"{\"\"type\"\": \"\"MultiLineString\"\", \"\"coordinates\"\": [[[-123.11, 49.27], [-123.10, 49.27]], [[-123.09, 49.27], [-123.08, 49.27, 12.5]]]}\";Protected\n";

    const PARKS: &str = "\u{feff}Geom;PARK_NAME;Area\n\
\"{\"\"coordinates\"\": [[[-123.10, 49.28], [-123.09, 49.28], [-123.09, 49.29], [-123.10, 49.28]]], \"\"type\"\": \"\"Polygon\"\"}\";Test Park;1.2\n\
;Ghost Park;0\n";

    #[test]
    fn read_table_strips_bom_and_keeps_ragged_rows() {
        let table = read_table("\u{feff}Geom ;name\na;b;c\nd\n".as_bytes()).unwrap();
        assert_eq!(table.header, vec!["Geom", "name"]);
        assert_eq!(table.rows, vec![vec!["a", "b", "c"], vec!["d"]]);
        assert_eq!(table.column_index("Geom").unwrap(), 0);
        assert!(matches!(
            table.column_index("missing"),
            Err(DatasetError::MissingColumn(name)) if name == "missing"
        ));
    }

    #[test]
    fn parse_geometry_swaps_to_lat_lon() {
        let parts = parse_geometry(
            r#"{"type": "LineString", "coordinates": [[-123.1, 49.2], [-123.2, 49.3]]}"#,
        )
        .unwrap();
        assert_eq!(
            parts,
            vec![vec![Coordinate::new(49.2, -123.1), Coordinate::new(49.3, -123.2)]]
        );
    }

    #[test]
    fn parse_geometry_supports_points_and_polygons() {
        let point = parse_geometry(r#"{"coordinates": [-123.1, 49.2], "type": "Point"}"#).unwrap();
        assert_eq!(point, vec![vec![Coordinate::new(49.2, -123.1)]]);

        let polygon = parse_geometry(
            r#"{"type": "MultiPolygon", "coordinates": [[[[0, 1], [2, 3], [0, 1]], [[5, 5], [6, 6]]], [[[7, 8], [9, 10]]]]}"#,
        )
        .unwrap();
        assert_eq!(polygon.len(), 2);
        assert_eq!(polygon[0].len(), 3);
        assert_eq!(polygon[1], vec![Coordinate::new(8.0, 7.0), Coordinate::new(10.0, 9.0)]);
    }

    #[test]
    fn parse_geometry_rejects_bad_input() {
        assert!(matches!(parse_geometry("[[1, 2]]"), Err(GeometryError::Json(_))));
        assert!(matches!(
            parse_geometry(r#"{"type": "LineString", "coordinates": [[1.0]]}"#),
            Err(GeometryError::Position(1))
        ));
    }

    #[test]
    fn load_bikeways_splits_multi_lines_and_skips_empty_rows() {
        let table = load_bikeways(BIKEWAYS.as_bytes(), "Geom").unwrap();
        assert_eq!(table.geometry_index, 1);
        assert_eq!(table.records.len(), 3);

        let main = &table.records[0];
        assert_eq!(main.fields[0], Field::Text("Main St".into()));
        assert_eq!(main.fields[2], Field::Text("Painted Lanes".into()));
        assert_eq!(
            main.polyline(1).unwrap(),
            &[Coordinate::new(49.26, -123.10), Coordinate::new(49.27, -123.10)]
        );

        assert_eq!(table.records[1].fields[0], Field::Text("Union St".into()));
        assert_eq!(table.records[2].polyline(1).unwrap()[1], Coordinate::new(49.27, -123.08));
    }

    #[test]
    fn load_bikeways_reports_bad_geometry_row() {
        let data =
            "Geom;name\n{\"type\": \"LineString\", \"coordinates\": [[1, 2]]};ok\nnot json;bad\n";
        let err = load_bikeways(data.as_bytes(), "Geom").unwrap_err();
        assert!(matches!(err, DatasetError::Geometry { row: 2, .. }));
    }

    #[test]
    fn load_parks_uses_outer_ring_and_name() {
        let parks = load_parks(PARKS.as_bytes(), "Geom", "PARK_NAME").unwrap();
        assert_eq!(parks.len(), 1);
        let park = &parks[0];
        use crate::models::Region;
        assert_eq!(park.name(), "Test Park");
        assert_eq!(park.coordinates().len(), 4);
        assert_eq!(park.coordinates()[0], Coordinate::new(49.28, -123.10));
    }

    #[test]
    fn load_parks_requires_name_column() {
        assert!(matches!(
            load_parks(PARKS.as_bytes(), "Geom", "NAME"),
            Err(DatasetError::MissingColumn(_))
        ));
    }
}
