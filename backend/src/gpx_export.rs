use std::io::Write;

use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::RouteError;
use crate::models::Coordinate;

const CREATOR: &str = "parkroute";

/// Write `path` as a GPX 1.1 track named `name`, with a waypoint at each end.
pub fn write_route_gpx<W: Write>(
    path: &[Coordinate],
    name: &str,
    writer: W,
) -> Result<(), RouteError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };

    if let (Some(first), Some(last)) = (path.first(), path.last()) {
        gpx.waypoints.push(named_waypoint(first, "start"));
        gpx.waypoints.push(named_waypoint(last, name));
    }

    let mut track = Track {
        name: Some(name.into()),
        ..Default::default()
    };
    let mut segment = TrackSegment::new();
    segment.points.extend(path.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx::write(&gpx, writer)?;
    Ok(())
}

pub fn encode_route_as_gpx(path: &[Coordinate], name: &str) -> Result<Vec<u8>, RouteError> {
    let mut buffer = Vec::new();
    write_route_gpx(path, name, &mut buffer)?;
    Ok(buffer)
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}

fn named_waypoint(coord: &Coordinate, name: &str) -> Waypoint {
    let mut waypoint = to_waypoint(coord);
    waypoint.name = Some(name.into());
    waypoint
}
