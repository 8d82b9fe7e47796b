use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ModelError::InvalidGeometry(format!(
                "latitude {} must be within [-90, 90]",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ModelError::InvalidGeometry(format!(
                "longitude {} must be within [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }

    /// Haversine distance to `other` in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_KM * c
    }
}

/// Center and radius of a live radius query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryGeometry {
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl QueryGeometry {
    pub fn new(center: GeoPoint, radius_km: f64) -> Self {
        Self { center, radius_km }
    }

    pub fn validate(&self) -> Result<()> {
        self.center.validate()?;
        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(ModelError::InvalidGeometry(format!(
                "radius {} km must be a non-negative number",
                self.radius_km
            )));
        }
        Ok(())
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center.distance_km(point) <= self.radius_km
    }
}
