//! NREL SPA ephemeris via the `solar-positioning` crate.

use chrono::{DateTime, Datelike, Utc};
use solar_positioning::{RefractionCorrection, spa, time::DeltaT};

use super::{Accuracy, SolarAngles, SunPositionProvider};
use crate::error::SunPositionError;
use crate::model::Coordinate;
use crate::optics::geometry::normalize_azimuth;

/// High-accuracy provider with standard atmospheric refraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpaProvider;

impl SunPositionProvider for SpaProvider {
    fn name(&self) -> &'static str {
        "spa"
    }

    fn accuracy(&self) -> Accuracy {
        Accuracy::Precise
    }

    fn angles_at(
        &self,
        location: &Coordinate,
        instant: DateTime<Utc>,
    ) -> Result<SolarAngles, SunPositionError> {
        let delta_t = DeltaT::estimate_from_date(instant.year(), instant.month())
            .map_err(|e| SunPositionError::Ephemeris(format!("{e:?}")))?;
        let pos = spa::solar_position(
            instant,
            location.latitude,
            location.longitude,
            location.ground_elevation,
            delta_t,
            Some(RefractionCorrection::standard()),
        )
        .map_err(|e| SunPositionError::Ephemeris(format!("{e:?}")))?;
        Ok(SolarAngles {
            azimuth: normalize_azimuth(pos.azimuth()),
            elevation: pos.elevation_angle(),
            zenith: pos.zenith_angle(),
        })
    }
}
