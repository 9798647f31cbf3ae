//! Batched hit test between reflected sun rays and observer lattices.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::grid::AngularGrid;
use crate::error::GlareError;
use crate::model::{ObserverId, PvArea, PvAreaId};
use crate::optics::geometry::{
    ReflectedRay, normalize_azimuth, plane_irradiance, reflect_sun, wrapped_delta,
};
use crate::optics::profile::ProfileRegistry;
use crate::solar::SunPosition;

/// Tuning knobs of the hit test and the luminance estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    /// Reflections at or above this incidence angle are ignored (degrees).
    pub max_incidence_angle: f64,
    /// Luminous efficacy of sunlight (lm/W).
    pub luminous_efficacy: f64,
    /// Divisor turning reflected illuminance into luminance.
    pub luminance_scale: f64,
    /// Minimum luminance for an event (cd/m²).
    pub intensity_threshold: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            max_incidence_angle: 89.0,
            luminous_efficacy: 130.0,
            luminance_scale: 1e5,
            intensity_threshold: 0.01,
        }
    }
}

/// Reflection of a batch of sun positions off one PV area, stored column-wise.
#[derive(Debug, Clone)]
pub struct ReflectionSeries {
    pv_area: PvAreaId,
    pub timestamps: Vec<DateTime<Utc>>,
    pub sun_azimuth: Vec<f64>,
    pub sun_elevation: Vec<f64>,
    pub reflection_azimuth: Vec<f64>,
    pub reflection_elevation: Vec<f64>,
    pub incidence_angle: Vec<f64>,
    /// Direct irradiance on the panel plane (W/m²).
    pub irradiance: Vec<f64>,
}

impl ReflectionSeries {
    /// Reflects each sun position off `pv_area`.
    ///
    /// DNI comes from the position's clear-sky data when present, else
    /// `default_dni`.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::GeometryError`] from the reflection.
    pub fn compute(
        sun_positions: &[SunPosition],
        pv_area: &PvArea,
        default_dni: f64,
    ) -> Result<Self, GlareError> {
        let n = sun_positions.len();
        let mut series = Self {
            pv_area: pv_area.id,
            timestamps: Vec::with_capacity(n),
            sun_azimuth: Vec::with_capacity(n),
            sun_elevation: Vec::with_capacity(n),
            reflection_azimuth: Vec::with_capacity(n),
            reflection_elevation: Vec::with_capacity(n),
            incidence_angle: Vec::with_capacity(n),
            irradiance: Vec::with_capacity(n),
        };
        for pos in sun_positions {
            let ray = reflect_sun(pos.azimuth, pos.elevation, pv_area.azimuth, pv_area.tilt)?;
            series.timestamps.push(pos.timestamp);
            series.sun_azimuth.push(pos.azimuth);
            series.sun_elevation.push(pos.elevation);
            series.reflection_azimuth.push(ray.azimuth);
            series.reflection_elevation.push(ray.elevation);
            series.incidence_angle.push(ray.incidence_angle);
            series
                .irradiance
                .push(plane_irradiance(pos.dni_or(default_dni), ray.incidence_angle));
        }
        Ok(series)
    }

    pub fn pv_area(&self) -> PvAreaId {
        self.pv_area
    }

    /// Reflected ray of timestep `t`.
    pub fn ray(&self, t: usize) -> ReflectedRay {
        ReflectedRay {
            azimuth: self.reflection_azimuth[t],
            elevation: self.reflection_elevation[t],
            incidence_angle: self.incidence_angle[t],
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// One timestep at which an observer sees glare from a PV area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlareEvent {
    pub timestamp: DateTime<Utc>,
    pub observer: ObserverId,
    pub pv_area: PvAreaId,
    pub sun_azimuth: f64,
    pub sun_elevation: f64,
    pub reflection_azimuth: f64,
    pub reflection_elevation: f64,
    pub incidence_angle: f64,
    /// Direct irradiance on the panel plane (W/m²).
    pub irradiance: f64,
    /// Estimated luminance at the observer (cd/m²).
    pub luminance: f64,
}

impl fmt::Display for GlareEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | OP{} <- PV{} | sun=({:>6.2}, {:>5.2}) refl=({:>6.2}, {:>6.2}) \
             inc={:>5.2} | E={:>7.2} W/m² L={:.4} cd/m²",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.observer,
            self.pv_area,
            self.sun_azimuth,
            self.sun_elevation,
            self.reflection_azimuth,
            self.reflection_elevation,
            self.incidence_angle,
            self.irradiance,
            self.luminance,
        )
    }
}

/// Turns a [`ReflectionSeries`] plus an [`AngularGrid`] into glare events.
///
/// An observer sees a reflection when the reflected ray travels back along
/// their line of sight, so each reflection is compared with the lattice in
/// its apparent direction `(azimuth + 180, -elevation)`.
pub struct GlareDetector<'a> {
    registry: &'a ProfileRegistry,
    settings: DetectorSettings,
}

impl<'a> GlareDetector<'a> {
    pub fn new(registry: &'a ProfileRegistry, settings: DetectorSettings) -> Self {
        Self { registry, settings }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Luminance at the observer for a reflection coefficient and plane irradiance.
    pub fn luminance(&self, coefficient: f64, irradiance: f64) -> f64 {
        (coefficient * irradiance * self.settings.luminous_efficacy / self.settings.luminance_scale)
            .max(0.0)
    }

    /// Runs the hit test for one (observer, PV area) unit over one batch of
    /// timesteps.
    ///
    /// Each row is reduced to its minimum lattice distance as it is computed,
    /// so memory does not grow with the lattice size. Emits at most one event
    /// per timestep, in timestamp order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ProfileError::UnknownModuleType`] if the registry
    /// has no profile for the area's module type.
    pub fn detect(
        &self,
        pv_area: &PvArea,
        series: &ReflectionSeries,
        grid: &AngularGrid,
    ) -> Result<Vec<GlareEvent>, GlareError> {
        let profile = self.registry.get(pv_area.module_type)?;
        if grid.is_empty() || series.is_empty() {
            return Ok(Vec::new());
        }

        let grid_az: Vec<f64> = grid.points.iter().map(|p| p.azimuth).collect();
        let grid_el: Vec<f64> = grid.points.iter().map(|p| p.elevation).collect();
        let mut events = Vec::new();

        for t in 0..series.len() {
            let incidence = series.incidence_angle[t];
            if incidence >= self.settings.max_incidence_angle {
                continue;
            }
            let app_az = normalize_azimuth(series.reflection_azimuth[t] + 180.0);
            let app_el = -series.reflection_elevation[t];
            let min_distance = grid_az
                .iter()
                .zip(&grid_el)
                .map(|(&az, &el)| {
                    let d_az = wrapped_delta(app_az, az);
                    let d_el = app_el - el;
                    d_az * d_az + d_el * d_el
                })
                .fold(f64::INFINITY, f64::min)
                .sqrt();
            if min_distance > grid.threshold {
                continue;
            }

            let reflection = profile.evaluate(&series.ray(t));
            let luminance = self.luminance(reflection.coefficient, series.irradiance[t]);
            if luminance < self.settings.intensity_threshold {
                continue;
            }
            events.push(GlareEvent {
                timestamp: series.timestamps[t],
                observer: grid.observer,
                pv_area: grid.pv_area,
                sun_azimuth: series.sun_azimuth[t],
                sun_elevation: series.sun_elevation[t],
                reflection_azimuth: reflection.azimuth,
                reflection_elevation: reflection.elevation,
                incidence_angle: reflection.incidence_angle,
                irradiance: series.irradiance[t],
                luminance,
            });
        }

        debug!(
            observer = %grid.observer,
            pv_area = %grid.pv_area,
            timesteps = series.len(),
            grid_points = grid_az.len(),
            events = events.len(),
            "hit test finished"
        );
        Ok(events)
    }
}
