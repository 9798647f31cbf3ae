//! Validated domain model shared by every pipeline stage.
//!
//! Values here are built once from project input (see [`crate::input`]) and
//! are read-only for the rest of the run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

use crate::optics::geometry::azimuth_difference;

/// Index of an observation point in project input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObserverId(pub usize);

/// Index of a PV area in project input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PvAreaId(pub usize);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 + 1)
    }
}

impl fmt::Display for PvAreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 + 1)
    }
}

/// Geographic point with ground elevation and height above ground (m).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub ground_elevation: f64,
    pub height_above_ground: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ground_elevation: 0.0,
            height_above_ground: 0.0,
        }
    }

    pub fn with_elevation(mut self, ground_elevation: f64, height_above_ground: f64) -> Self {
        self.ground_elevation = ground_elevation;
        self.height_above_ground = height_above_ground;
        self
    }

    /// Height of the point above the reference datum (m).
    pub fn total_height(&self) -> f64 {
        self.ground_elevation + self.height_above_ground
    }
}

/// A PV surface: outer polygon, optional holes, and panel orientation.
#[derive(Debug, Clone)]
pub struct PvArea {
    pub id: PvAreaId,
    pub name: String,
    pub corners: Vec<Coordinate>,
    pub holes: Vec<Vec<Coordinate>>,
    /// Direction the panels face (degrees from north, [0, 360)).
    pub azimuth: f64,
    /// Panel tilt from horizontal (degrees, [0, 90]).
    pub tilt: f64,
    pub module_type: u8,
}

impl PvArea {
    /// Arithmetic mean of the outer corners.
    pub fn centroid(&self) -> Coordinate {
        let n = self.corners.len().max(1) as f64;
        let mut c = Coordinate::new(0.0, 0.0);
        for p in &self.corners {
            c.latitude += p.latitude / n;
            c.longitude += p.longitude / n;
            c.ground_elevation += p.ground_elevation / n;
            c.height_above_ground += p.height_above_ground / n;
        }
        c
    }
}

/// Horizontal field-of-view hint for an observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    /// Viewing direction (degrees from north).
    pub direction: f64,
    /// Full opening angle centred on `direction` (degrees, [0, 180]).
    pub expansion: f64,
}

impl FieldOfView {
    pub fn contains(&self, azimuth: f64) -> bool {
        azimuth_difference(azimuth, self.direction) <= self.expansion / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct ObservationPoint {
    pub id: ObserverId,
    pub name: String,
    pub location: Coordinate,
    pub field_of_view: Option<FieldOfView>,
}

/// Supported time resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    OneMinute,
    FiveMinutes,
    #[default]
    TenMinutes,
    ThirtyMinutes,
    SixtyMinutes,
}

impl Resolution {
    pub const ALL: [Resolution; 5] = [
        Resolution::OneMinute,
        Resolution::FiveMinutes,
        Resolution::TenMinutes,
        Resolution::ThirtyMinutes,
        Resolution::SixtyMinutes,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::TenMinutes => 10,
            Self::ThirtyMinutes => 30,
            Self::SixtyMinutes => 60,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}min", self.minutes())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.to_string() == s)
            .ok_or_else(|| format!("must be one of 1min, 5min, 10min, 30min, 60min, got \"{s}\""))
    }
}

/// Explicit analysis window; both bounds carry their UTC offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    /// First instant (inclusive).
    pub start: DateTime<FixedOffset>,
    /// Last instant (exclusive).
    pub end: DateTime<FixedOffset>,
}

impl TimeRange {
    /// Calendar year `year` in UTC; `None` for years chrono cannot represent.
    pub fn calendar_year(year: i32) -> Option<Self> {
        let utc = FixedOffset::east_opt(0)?;
        Some(Self {
            start: utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?,
            end: utc.with_ymd_and_hms(year.checked_add(1)?, 1, 1, 0, 0, 0).single()?,
        })
    }
}

/// Simulation parameters carried by the project input.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    /// Angular lattice spacing (degrees).
    pub grid_width: f64,
    pub resolution: Resolution,
    /// Sun positions below this elevation (degrees) are skipped.
    pub sun_elevation_threshold: f64,
    /// Spread of the reflected beam (degrees).
    pub beam_spread: f64,
    /// Angular diameter of the sun (degrees).
    pub sun_angle: f64,
    /// Minimum luminance for a glare event (cd/m²).
    pub intensity_threshold: f64,
    /// Module type assumed for PV areas that don't name one.
    pub module_type: u8,
    /// Window to analyse instead of a whole calendar year.
    pub time_range: Option<TimeRange>,
}

impl SimulationParameters {
    /// Tolerance radius of the hit test: `(beam_spread + sun_angle) / 2`.
    pub fn angular_threshold(&self) -> f64 {
        (self.beam_spread + self.sun_angle) / 2.0
    }
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            grid_width: 1.0,
            resolution: Resolution::TenMinutes,
            sun_elevation_threshold: 3.0,
            beam_spread: 0.5,
            sun_angle: 0.53,
            intensity_threshold: 0.01,
            module_type: 1,
            time_range: None,
        }
    }
}

/// Run metadata, passed through to reports untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub language: Option<String>,
    /// UTC offset of the project site (hours).
    pub utc: Option<f64>,
}

/// Complete validated project.
#[derive(Debug, Clone)]
pub struct Project {
    pub pv_areas: Vec<PvArea>,
    pub observers: Vec<ObservationPoint>,
    pub parameters: SimulationParameters,
    pub metadata: ProjectMetadata,
}

impl Project {
    pub fn pv_area(&self, id: PvAreaId) -> Option<&PvArea> {
        self.pv_areas.get(id.0)
    }

    pub fn observer(&self, id: ObserverId) -> Option<&ObservationPoint> {
        self.observers.get(id.0)
    }
}
