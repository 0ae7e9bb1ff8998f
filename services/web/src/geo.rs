//! Spherical geometry for the radius and distance endpoints

use std::str::FromStr;

use crate::error::AppError;

/// Earth radius used for distances, in metres
const EARTH_RADIUS_METRES: f64 = 6_378_100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    /// Build from GeoJSON order, `[lng, lat]`
    pub fn from_coordinates(coordinates: &[f64]) -> Option<Self> {
        match coordinates {
            [lng, lat, ..] => Some(Point {
                lat: *lat,
                lng: *lng,
            }),
            _ => None,
        }
    }
}

/// Parse `lat,lng` as given in the URL
pub fn parse_latlng(raw: &str) -> Result<Point, AppError> {
    let invalid =
        || AppError::bad_request("Please provide latitude and longitude in the format lat,lng.");

    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }

    Ok(Point { lat, lng })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometres,
}

impl FromStr for Unit {
    type Err = std::convert::Infallible;

    /// `mi` selects miles, anything else kilometres
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == "mi" {
            Unit::Miles
        } else {
            Unit::Kilometres
        })
    }
}

impl Unit {
    /// Earth radius expressed in this unit
    fn earth_radius(self) -> f64 {
        match self {
            Unit::Miles => 3963.2,
            Unit::Kilometres => 6378.1,
        }
    }

    /// Factor converting metres into this unit
    fn from_metres(self) -> f64 {
        match self {
            Unit::Miles => 0.000621371,
            Unit::Kilometres => 0.001,
        }
    }

    /// A distance in this unit as an angle in radians
    pub fn radius_radians(self, distance: f64) -> f64 {
        distance / self.earth_radius()
    }
}

/// Central angle between two points, in radians (haversine)
pub fn angular_distance(a: Point, b: Point) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

/// Is `point` inside the spherical cap of `radius` radians around `center`
pub fn within(center: Point, point: Point, radius: f64) -> bool {
    angular_distance(center, point) <= radius
}

/// Distance between two points expressed in `unit`
pub fn distance(a: Point, b: Point, unit: Unit) -> f64 {
    angular_distance(a, b) * EARTH_RADIUS_METRES * unit.from_metres()
}
