//! Reduced-accuracy analytic sun position.
//!
//! Cooper declination, Spencer equation of time, and the standard hour-angle
//! formulas, followed by Saemundsson's refraction correction. Errors reach
//! roughly one degree, so every use is flagged as [`Accuracy::Reduced`].

use chrono::{DateTime, Datelike, Timelike, Utc};

use super::{Accuracy, SolarAngles, SunPositionProvider};
use crate::error::SunPositionError;
use crate::model::Coordinate;
use crate::optics::geometry::normalize_azimuth;

pub const EARTH_AXIAL_TILT: f64 = 23.45;
pub const DEGREES_PER_HOUR: f64 = 15.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticProvider;

/// Solar declination for day-of-year `n` (degrees).
pub fn declination(n: u32) -> f64 {
    EARTH_AXIAL_TILT * (360.0 * (284.0 + f64::from(n)) / 365.0).to_radians().sin()
}

/// Equation of time for day-of-year `n` (minutes).
pub fn equation_of_time(n: u32) -> f64 {
    let b = ((f64::from(n) - 1.0) * 360.0 / 365.0).to_radians();
    229.18
        * (0.000075 + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.040849 * (2.0 * b).sin())
}

/// Atmospheric refraction for a geometric elevation (degrees).
///
/// Zero well below the horizon, where the formula diverges.
pub fn refraction(elevation: f64) -> f64 {
    if elevation < -1.0 {
        return 0.0;
    }
    let arcmin = 1.02 / (elevation + 10.3 / (elevation + 5.11)).to_radians().tan();
    (arcmin / 60.0).max(0.0)
}

/// Geometric (unrefracted) `(azimuth, elevation)` for a location and instant.
pub fn geometric_angles(latitude: f64, longitude: f64, instant: DateTime<Utc>) -> (f64, f64) {
    let n = instant.ordinal();
    let utc_hours = f64::from(instant.hour())
        + f64::from(instant.minute()) / 60.0
        + f64::from(instant.second()) / 3600.0;
    let lst = utc_hours + (4.0 * longitude + equation_of_time(n)) / 60.0;
    let ha = (DEGREES_PER_HOUR * (lst - 12.0)).to_radians();

    let lat = latitude.to_radians();
    let dec = declination(n).to_radians();
    let cos_zenith = lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos();
    let elevation = 90.0 - cos_zenith.clamp(-1.0, 1.0).acos().to_degrees();

    let sin_az = -dec.cos() * ha.sin();
    let cos_az = dec.sin() * lat.cos() - dec.cos() * lat.sin() * ha.cos();
    let azimuth = normalize_azimuth(sin_az.atan2(cos_az).to_degrees());
    (azimuth, elevation)
}

impl SunPositionProvider for AnalyticProvider {
    fn name(&self) -> &'static str {
        "analytic"
    }

    fn accuracy(&self) -> Accuracy {
        Accuracy::Reduced
    }

    fn angles_at(
        &self,
        location: &Coordinate,
        instant: DateTime<Utc>,
    ) -> Result<SolarAngles, SunPositionError> {
        let (azimuth, geometric) = geometric_angles(location.latitude, location.longitude, instant);
        let elevation = geometric + refraction(geometric);
        Ok(SolarAngles {
            azimuth,
            elevation,
            zenith: 90.0 - elevation,
        })
    }
}
