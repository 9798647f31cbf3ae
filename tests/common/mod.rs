//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};

use glare_sim::config::AnalysisConfig;
use glare_sim::glare::GlareEvent;
use glare_sim::model::{
    Coordinate, ObservationPoint, ObserverId, Project, ProjectMetadata, PvArea, PvAreaId,
    Resolution, SimulationParameters,
};

/// Metres per degree of latitude on the mean Earth sphere.
pub const M_PER_DEG: f64 = 111_194.93;

/// Site origin (Munich area).
pub const ORIGIN: (f64, f64) = (48.0, 11.0);

/// Ground elevation shared by every fixture point (m).
pub const GROUND: f64 = 500.0;

/// Point `east_m` / `north_m` metres from the site origin.
pub fn offset(east_m: f64, north_m: f64) -> Coordinate {
    Coordinate::new(
        ORIGIN.0 + north_m / M_PER_DEG,
        ORIGIN.1 + east_m / (M_PER_DEG * ORIGIN.0.to_radians().cos()),
    )
}

/// Observer at the origin, 10 m above ground.
pub fn raised_observer(id: usize) -> ObservationPoint {
    ObservationPoint {
        id: ObserverId(id),
        name: format!("OP{}", id + 1),
        location: offset(0.0, 0.0).with_elevation(GROUND, 10.0),
        field_of_view: None,
    }
}

/// Horizontal 6 m x 6 m area centred `north_m` metres from the origin.
pub fn flat_square(id: usize, north_m: f64) -> PvArea {
    PvArea {
        id: PvAreaId(id),
        name: format!("PV{}", id + 1),
        corners: [(-3.0, -3.0), (3.0, -3.0), (3.0, 3.0), (-3.0, 3.0)]
            .iter()
            .map(|&(e, n)| offset(e, north_m + n).with_elevation(GROUND, 0.0))
            .collect(),
        holes: Vec::new(),
        azimuth: 180.0,
        tilt: 0.0,
        module_type: 1,
    }
}

/// Default project: one raised observer with a flat square 5 m to the south.
pub fn south_project() -> Project {
    project(vec![flat_square(0, -5.0)], vec![raised_observer(0)])
}

pub fn project(pv_areas: Vec<PvArea>, observers: Vec<ObservationPoint>) -> Project {
    Project {
        pv_areas,
        observers,
        parameters: SimulationParameters {
            resolution: Resolution::SixtyMinutes,
            ..SimulationParameters::default()
        },
        metadata: ProjectMetadata::default(),
    }
}

/// Screening preset pinned to 2025, serial.
pub fn fast_config() -> AnalysisConfig {
    let mut cfg = AnalysisConfig::screening();
    cfg.analysis.year = Some(2025);
    cfg.execution.parallel = false;
    cfg
}

/// Synthetic event `minute` minutes after 2025-06-21 08:00 UTC.
pub fn event_at(observer: usize, pv_area: usize, minute: i64, luminance: f64) -> GlareEvent {
    let base = Utc
        .with_ymd_and_hms(2025, 6, 21, 8, 0, 0)
        .single()
        .expect("valid base instant");
    GlareEvent {
        timestamp: base + Duration::minutes(minute),
        observer: ObserverId(observer),
        pv_area: PvAreaId(pv_area),
        sun_azimuth: 160.0,
        sun_elevation: 58.0,
        reflection_azimuth: 340.0,
        reflection_elevation: 58.0,
        incidence_angle: 32.0,
        irradiance: 700.0,
        luminance,
    }
}
