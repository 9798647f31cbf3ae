//! Error kinds surfaced by the analysis pipeline.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;

/// A single problem found while validating project input.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Path of the offending field (e.g., `"pv_areas[0].corners[2].latitude"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Failures raised by vector and angle computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("cannot normalize a zero-length vector")]
    DegenerateVector,
    #[error("observer \"{observer}\" coincides with a corner of PV area \"{pv_area}\"")]
    CoincidentPoints { observer: String, pv_area: String },
    #[error(
        "lattice for observer \"{observer}\" and PV area \"{pv_area}\" needs {points} points \
         (limit {max}); increase grid_width"
    )]
    GridTooLarge {
        observer: String,
        pv_area: String,
        points: usize,
        max: usize,
    },
    #[error("value {value} lies outside the interpolation domain [{min}, {max}]")]
    OutsideDomain { value: f64, min: f64, max: f64 },
}

/// Failures raised while generating sun positions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SunPositionError {
    #[error("end instant must be after start instant")]
    InvalidRange,
    #[error("resolution must be within 1..=60 minutes, got {0}")]
    InvalidResolution(u32),
    #[error("timestamp \"{0}\" carries no timezone information")]
    MissingTimezone(String),
    #[error("cannot parse timestamp \"{0}\"")]
    InvalidTimestamp(String),
    #[error("ephemeris computation failed: {0}")]
    Ephemeris(String),
}

/// Failures raised while building reflection profiles.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("module type {module_type}: {angles} angles but {coefficients} coefficients")]
    LengthMismatch {
        module_type: u8,
        angles: usize,
        coefficients: usize,
    },
    #[error("profile for module type {0} has no samples")]
    Empty(u8),
    #[error("no reflection profile registered for module type {0}")]
    UnknownModuleType(u8),
    #[error("unrecognized reflection profile layout (header: {0})")]
    UnknownLayout(String),
    #[error("malformed profile row {row}: {message}")]
    MalformedRow { row: usize, message: String },
}

/// Coarse classification of a [`GlareError`], stable for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Config,
    Geometry,
    SunPosition,
    Profile,
    Io,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Config => "config",
            Self::Geometry => "geometry",
            Self::SunPosition => "sun_position",
            Self::Profile => "profile",
            Self::Io => "io",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Top-level error returned by the analysis pipeline.
#[derive(Debug, Error)]
pub enum GlareError {
    #[error("input validation failed with {} issue(s): {}", .0.len(), join_issues(.0))]
    Validation(Vec<ValidationIssue>),
    #[error("invalid configuration: {}", join_config(.0))]
    Config(Vec<ConfigError>),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    SunPosition(#[from] SunPositionError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("cannot parse input: {0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("analysis cancelled before all units completed")]
    Cancelled,
}

impl GlareError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Parse(_) => ErrorKind::Validation,
            Self::Config(_) => ErrorKind::Config,
            Self::Geometry(_) => ErrorKind::Geometry,
            Self::SunPosition(_) => ErrorKind::SunPosition,
            Self::Profile(_) => ErrorKind::Profile,
            Self::Io(_) | Self::Csv(_) => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_config(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_issue() {
        let err = GlareError::Validation(vec![
            ValidationIssue::new("a", "bad"),
            ValidationIssue::new("b", "worse"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 issue(s)"));
        assert!(msg.contains("a: bad"));
        assert!(msg.contains("b: worse"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn geometry_errors_keep_their_kind() {
        let err: GlareError = GeometryError::DegenerateVector.into();
        assert_eq!(err.kind(), ErrorKind::Geometry);
        assert_eq!(err.kind().to_string(), "geometry");
    }
}
