//! JSON project input and exhaustive validation.
//!
//! Every field is optional at the serde level so that a missing value turns
//! into a [`ValidationIssue`] next to all other problems instead of aborting
//! deserialization at the first one.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{GlareError, ValidationIssue};
use crate::model::{
    Coordinate, FieldOfView, ObservationPoint, ObserverId, Project, ProjectMetadata, PvArea,
    PvAreaId, Resolution, SimulationParameters, TimeRange,
};
use crate::optics::geometry::point_in_polygon;
use crate::optics::profile::STANDARD_MODULE_TYPES;
use crate::solar::SunSeriesRequest;

/// Default eye height for observers that omit it (m).
pub const DEFAULT_OBSERVER_HEIGHT: f64 = 1.5;

const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "de"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CornerInput {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ground_elevation: Option<f64>,
    pub height_above_ground: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PvAreaInput {
    pub name: Option<String>,
    pub corners: Vec<CornerInput>,
    pub holes: Vec<Vec<CornerInput>>,
    pub azimuth: Option<f64>,
    pub tilt: Option<f64>,
    /// Falls back to `simulation_parameter.module_type`.
    pub module_type: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObserverInput {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ground_elevation: Option<f64>,
    pub height_above_ground: Option<f64>,
    pub fov_direction: Option<f64>,
    pub fov_expansion: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimulationParameterInput {
    pub grid_width: Option<f64>,
    pub resolution: Option<String>,
    pub sun_elevation_threshold: Option<f64>,
    pub beam_spread: Option<f64>,
    pub sun_angle: Option<f64>,
    pub intensity_threshold: Option<f64>,
    pub module_type: Option<i64>,
    /// RFC 3339 start of the analysis window, offset required.
    pub start_date: Option<String>,
    /// RFC 3339 end of the analysis window (exclusive), offset required.
    pub end_date: Option<String>,
}

/// Raw project document as read from JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectInput {
    pub pv_areas: Option<Vec<PvAreaInput>>,
    pub list_of_ops: Option<Vec<ObserverInput>>,
    pub simulation_parameter: SimulationParameterInput,
    pub meta_data: ProjectMetadata,
}

/// Collects issues for one document.
#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationIssue::new(field, message));
    }

    /// Required value inside the closed range `[lo, hi]`.
    fn required(&mut self, field: &str, value: Option<f64>, lo: f64, hi: f64) {
        match value {
            None => self.push(field, "is required"),
            Some(v) => self.optional(field, Some(v), lo, hi),
        }
    }

    /// Optional value inside the closed range `[lo, hi]` when present.
    fn optional(&mut self, field: &str, value: Option<f64>, lo: f64, hi: f64) {
        if let Some(v) = value.filter(|v| !(v.is_finite() && (lo..=hi).contains(v))) {
            self.push(field, format!("must be in [{lo}, {hi}], got {v}"));
        }
    }

    fn name(&mut self, field: &str, name: Option<&String>, seen: &mut HashSet<String>) {
        match name.map(|n| n.trim()) {
            None => self.push(field, "is required"),
            Some("") => self.push(field, "must not be empty"),
            Some(n) => {
                if !seen.insert(n.to_string()) {
                    self.push(field, format!("duplicate name \"{n}\""));
                }
            }
        }
    }

    fn module_type(&mut self, field: &str, value: Option<i64>) {
        if let Some(m) =
            value.filter(|m| !STANDARD_MODULE_TYPES.iter().any(|&t| i64::from(t) == *m))
        {
            self.push(field, format!("must be one of 0, 1, 2, got {m}"));
        }
    }

    fn corners(&mut self, prefix: &str, corners: &[CornerInput]) {
        for (j, c) in corners.iter().enumerate() {
            let f = format!("{prefix}[{j}]");
            self.required(&format!("{f}.latitude"), c.latitude, -90.0, 90.0);
            self.required(&format!("{f}.longitude"), c.longitude, -180.0, 180.0);
            self.optional(&format!("{f}.ground_elevation"), c.ground_elevation, 0.0, 9000.0);
            self.optional(
                &format!("{f}.height_above_ground"),
                c.height_above_ground,
                0.0,
                100.0,
            );
        }
    }
}

impl ProjectInput {
    /// Parses a project document.
    ///
    /// # Errors
    ///
    /// Returns [`GlareError::Parse`] for malformed JSON or mistyped values.
    pub fn from_json_str(s: &str) -> Result<Self, GlareError> {
        serde_json::from_str(s).map_err(|e| GlareError::Parse(e.to_string()))
    }

    /// Reads and parses a project file.
    ///
    /// # Errors
    ///
    /// Returns [`GlareError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn from_json_file(path: &Path) -> Result<Self, GlareError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Checks every field and returns all issues found.
    ///
    /// Returns an empty vector if the document is valid.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Issues::default();

        match &self.pv_areas {
            None => issues.push("pv_areas", "is required"),
            Some(areas) if areas.is_empty() => {
                issues.push("pv_areas", "at least one PV area is required")
            }
            Some(areas) => {
                let mut names = HashSet::new();
                for (i, a) in areas.iter().enumerate() {
                    self.validate_pv_area(&mut issues, i, a, &mut names);
                }
            }
        }

        match &self.list_of_ops {
            None => issues.push("list_of_ops", "is required"),
            Some(ops) if ops.is_empty() => {
                issues.push("list_of_ops", "at least one observation point is required")
            }
            Some(ops) => {
                let mut names = HashSet::new();
                for (i, op) in ops.iter().enumerate() {
                    let f = format!("list_of_ops[{i}]");
                    issues.name(&format!("{f}.name"), op.name.as_ref(), &mut names);
                    issues.required(&format!("{f}.latitude"), op.latitude, -90.0, 90.0);
                    issues.required(&format!("{f}.longitude"), op.longitude, -180.0, 180.0);
                    issues.optional(
                        &format!("{f}.ground_elevation"),
                        op.ground_elevation,
                        0.0,
                        9000.0,
                    );
                    issues.optional(
                        &format!("{f}.height_above_ground"),
                        op.height_above_ground,
                        0.0,
                        100.0,
                    );
                    issues.optional(&format!("{f}.fov_direction"), op.fov_direction, 0.0, 360.0);
                    issues.optional(&format!("{f}.fov_expansion"), op.fov_expansion, 0.0, 180.0);
                    if op.fov_direction.is_some() != op.fov_expansion.is_some() {
                        issues.push(
                            format!("{f}.fov_expansion"),
                            "fov_direction and fov_expansion must be given together",
                        );
                    }
                }
            }
        }

        let p = &self.simulation_parameter;
        if let Some(w) = p
            .grid_width
            .filter(|w| !(w.is_finite() && *w > 0.0 && *w <= 10.0))
        {
            issues.push(
                "simulation_parameter.grid_width",
                format!("must be in (0, 10], got {w}"),
            );
        }
        if let Some(Err(message)) = p.resolution.as_deref().map(str::parse::<Resolution>) {
            issues.push("simulation_parameter.resolution", message);
        }
        issues.optional(
            "simulation_parameter.sun_elevation_threshold",
            p.sun_elevation_threshold,
            0.0,
            10.0,
        );
        for (field, value) in [
            ("simulation_parameter.beam_spread", p.beam_spread),
            ("simulation_parameter.sun_angle", p.sun_angle),
        ] {
            if let Some(v) = value.filter(|v| !(v.is_finite() && *v > 0.0)) {
                issues.push(field, format!("must be > 0, got {v}"));
            }
        }
        if let Some(v) = p
            .intensity_threshold
            .filter(|v| !(v.is_finite() && *v >= 0.0))
        {
            issues.push(
                "simulation_parameter.intensity_threshold",
                format!("must be >= 0, got {v}"),
            );
        }
        issues.module_type("simulation_parameter.module_type", p.module_type);
        match (&p.start_date, &p.end_date) {
            (None, None) => {}
            (Some(_), None) | (None, Some(_)) => issues.push(
                "simulation_parameter.end_date",
                "start_date and end_date must be given together",
            ),
            (Some(start), Some(end)) => match SunSeriesRequest::parse_bounds(start, end) {
                Ok((start, end)) if end <= start => issues.push(
                    "simulation_parameter.end_date",
                    "must be after start_date",
                ),
                Ok(_) => {}
                Err(e) => issues.push("simulation_parameter.start_date", e.to_string()),
            },
        }

        let m = &self.meta_data;
        if let Some(lang) = m
            .language
            .as_deref()
            .filter(|l| !SUPPORTED_LANGUAGES.contains(l))
        {
            issues.push(
                "meta_data.language",
                format!("must be \"en\" or \"de\", got \"{lang}\""),
            );
        }
        issues.optional("meta_data.utc", m.utc, -12.0, 14.0);

        issues.0
    }

    fn validate_pv_area(
        &self,
        issues: &mut Issues,
        i: usize,
        a: &PvAreaInput,
        names: &mut HashSet<String>,
    ) {
        let f = format!("pv_areas[{i}]");
        issues.name(&format!("{f}.name"), a.name.as_ref(), names);
        if a.corners.len() < 3 {
            issues.push(
                format!("{f}.corners"),
                format!("at least 3 corners required, got {}", a.corners.len()),
            );
        }
        issues.corners(&format!("{f}.corners"), &a.corners);

        match a.azimuth {
            None => issues.push(format!("{f}.azimuth"), "is required"),
            Some(az) if !(az.is_finite() && (0.0..360.0).contains(&az)) => {
                issues.push(format!("{f}.azimuth"), format!("must be in [0, 360), got {az}"))
            }
            Some(_) => {}
        }
        issues.required(&format!("{f}.tilt"), a.tilt, 0.0, 90.0);
        issues.module_type(&format!("{f}.module_type"), a.module_type);

        let outer: Vec<(f64, f64)> = a
            .corners
            .iter()
            .filter_map(|c| Some((c.longitude?, c.latitude?)))
            .collect();
        for (h, hole) in a.holes.iter().enumerate() {
            let hf = format!("{f}.holes[{h}]");
            if hole.len() < 3 {
                issues.push(
                    hf.clone(),
                    format!("at least 3 points required, got {}", hole.len()),
                );
            }
            issues.corners(&hf, hole);
            if outer.len() >= 3 {
                let outside = hole
                    .iter()
                    .filter_map(|c| Some((c.longitude?, c.latitude?)))
                    .filter(|&p| !point_in_polygon(p, &outer))
                    .count();
                if outside > 0 {
                    issues.push(
                        hf,
                        format!("{outside} point(s) lie outside the outer polygon"),
                    );
                }
            }
        }
    }

    /// Validates and converts the document into a [`Project`].
    ///
    /// # Errors
    ///
    /// Returns [`GlareError::Validation`] with every issue found.
    pub fn into_project(self) -> Result<Project, GlareError> {
        let issues = self.validate();
        if !issues.is_empty() {
            return Err(GlareError::Validation(issues));
        }

        let p = &self.simulation_parameter;
        let defaults = SimulationParameters::default();
        let parameters = SimulationParameters {
            grid_width: p.grid_width.unwrap_or(defaults.grid_width),
            resolution: p
                .resolution
                .as_deref()
                .and_then(|r| r.parse().ok())
                .unwrap_or(defaults.resolution),
            sun_elevation_threshold: p
                .sun_elevation_threshold
                .unwrap_or(defaults.sun_elevation_threshold),
            beam_spread: p.beam_spread.unwrap_or(defaults.beam_spread),
            sun_angle: p.sun_angle.unwrap_or(defaults.sun_angle),
            intensity_threshold: p.intensity_threshold.unwrap_or(defaults.intensity_threshold),
            module_type: p
                .module_type
                .and_then(|m| u8::try_from(m).ok())
                .unwrap_or(defaults.module_type),
            time_range: match (&p.start_date, &p.end_date) {
                (Some(start), Some(end)) => SunSeriesRequest::parse_bounds(start, end)
                    .ok()
                    .map(|(start, end)| TimeRange { start, end }),
                _ => None,
            },
        };

        let pv_areas = self
            .pv_areas
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, a)| PvArea {
                id: PvAreaId(i),
                name: a.name.unwrap_or_default().trim().to_string(),
                corners: a.corners.iter().map(corner).collect(),
                holes: a
                    .holes
                    .iter()
                    .map(|h| h.iter().map(corner).collect())
                    .collect(),
                azimuth: a.azimuth.unwrap_or_default(),
                tilt: a.tilt.unwrap_or_default(),
                module_type: a
                    .module_type
                    .and_then(|m| u8::try_from(m).ok())
                    .unwrap_or(parameters.module_type),
            })
            .collect();

        let observers = self
            .list_of_ops
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, op)| ObservationPoint {
                id: ObserverId(i),
                name: op.name.unwrap_or_default().trim().to_string(),
                location: Coordinate::new(
                    op.latitude.unwrap_or_default(),
                    op.longitude.unwrap_or_default(),
                )
                .with_elevation(
                    op.ground_elevation.unwrap_or_default(),
                    op.height_above_ground.unwrap_or(DEFAULT_OBSERVER_HEIGHT),
                ),
                field_of_view: match (op.fov_direction, op.fov_expansion) {
                    (Some(direction), Some(expansion)) => Some(FieldOfView {
                        direction,
                        expansion,
                    }),
                    _ => None,
                },
            })
            .collect();

        Ok(Project {
            pv_areas,
            observers,
            parameters,
            metadata: self.meta_data,
        })
    }
}

fn corner(c: &CornerInput) -> Coordinate {
    Coordinate::new(c.latitude.unwrap_or_default(), c.longitude.unwrap_or_default())
        .with_elevation(
            c.ground_elevation.unwrap_or_default(),
            c.height_above_ground.unwrap_or_default(),
        )
}
