//! Sun position generation.
//!
//! Two interchangeable [`SunPositionProvider`] implementations exist: the
//! NREL SPA ephemeris (cargo feature `spa`) and an analytic approximation
//! that reports [`Accuracy::Reduced`]. [`select_provider`] picks one at
//! construction time and logs a warning whenever the reduced-accuracy path
//! is taken.

pub mod analytic;
pub mod clearsky;
pub mod events;
pub mod series;
#[cfg(feature = "spa")]
pub mod spa;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SunPositionError;
use crate::model::Coordinate;

pub use analytic::AnalyticProvider;
pub use clearsky::ClearSky;
pub use series::{SunSeries, SunSeriesRequest, sun_series};
#[cfg(feature = "spa")]
pub use spa::SpaProvider;

/// Accuracy class a provider promises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    /// Ephemeris-grade (better than 0.01°).
    Precise,
    /// Analytic approximation, errors up to roughly a degree.
    Reduced,
}

/// Requested sun-position algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    #[default]
    Precise,
    Analytic,
}

/// Apparent sun angles at one instant (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarAngles {
    /// Clockwise from north, [0, 360).
    pub azimuth: f64,
    /// Refraction-corrected elevation above the horizon.
    pub elevation: f64,
    pub zenith: f64,
}

/// One entry of a sun-position series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    pub timestamp: DateTime<Utc>,
    pub azimuth: f64,
    pub elevation: f64,
    pub zenith: f64,
    /// Clear-sky irradiance, when requested.
    pub clear_sky: Option<ClearSky>,
}

impl SunPosition {
    /// Direct normal irradiance, falling back to `default` without clear-sky data.
    pub fn dni_or(&self, default: f64) -> f64 {
        self.clear_sky.map_or(default, |cs| cs.dni)
    }
}

/// Source of sun angles for a location and instant.
pub trait SunPositionProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn accuracy(&self) -> Accuracy;

    /// Computes the apparent sun angles.
    ///
    /// # Arguments
    ///
    /// * `location` - Observer location; ground elevation is used as site altitude
    /// * `instant` - UTC instant
    ///
    /// # Errors
    ///
    /// Returns [`SunPositionError::Ephemeris`] if the underlying model rejects the input.
    fn angles_at(
        &self,
        location: &Coordinate,
        instant: DateTime<Utc>,
    ) -> Result<SolarAngles, SunPositionError>;
}

/// Builds the provider for `precision`, degrading to the analytic model
/// when the ephemeris is not compiled in.
pub fn select_provider(precision: Precision) -> Box<dyn SunPositionProvider> {
    match precision {
        #[cfg(feature = "spa")]
        Precision::Precise => Box::new(SpaProvider),
        #[cfg(not(feature = "spa"))]
        Precision::Precise => {
            warn!(
                "precise ephemeris not compiled in (feature `spa`); \
                 falling back to reduced-accuracy analytic sun positions"
            );
            Box::new(AnalyticProvider)
        }
        Precision::Analytic => {
            warn!("using reduced-accuracy analytic sun positions");
            Box::new(AnalyticProvider)
        }
    }
}
