//! TOML-based analysis configuration and preset definitions.
//!
//! Sources are layered with `figment`: a preset (or the defaults), then an
//! optional TOML document, then `GLARE_`-prefixed environment variables
//! whose nested keys are separated by `__` (`GLARE_ANALYSIS__YEAR=2024`).

use std::fmt;
use std::fs;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::glare::DetectorSettings;
use crate::optics::profile::Interpolation;
use crate::solar::Precision;

/// Top-level analysis configuration parsed from TOML.
///
/// Every section has defaults matching the `standard` preset. Load from
/// TOML with [`AnalysisConfig::from_toml_file`] or pick a preset with
/// [`AnalysisConfig::from_preset`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Analysis period and period aggregation.
    #[serde(default)]
    pub analysis: AnalysisSection,
    /// Sun-position algorithm and irradiance.
    #[serde(default)]
    pub sun: SunSection,
    /// Hit-test and luminance parameters.
    #[serde(default)]
    pub detector: DetectorSection,
    /// Worker pool.
    #[serde(default)]
    pub execution: ExecutionSection,
}

/// Analysis period and period aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSection {
    /// Calendar year to analyse; `None` means the current UTC year.
    pub year: Option<i32>,
    /// Largest gap (minutes) that still continues a glare period.
    pub gap_threshold_minutes: u32,
    /// Compute a sun series per observer instead of sharing the first one.
    pub per_observer_sun: bool,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            year: None,
            gap_threshold_minutes: 5,
            per_observer_sun: false,
        }
    }
}

/// Sun-position algorithm and irradiance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SunSection {
    /// `"precise"` (SPA) or `"analytic"`.
    pub precision: Precision,
    /// Attach Ineichen-Perez clear-sky irradiance to each sun position.
    pub clear_sky: bool,
    /// Linke turbidity for the clear-sky model.
    pub linke_turbidity: f64,
}

impl Default for SunSection {
    fn default() -> Self {
        Self {
            precision: Precision::Precise,
            clear_sky: true,
            linke_turbidity: 3.0,
        }
    }
}

/// Hit-test and luminance parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorSection {
    /// Sun positions streamed per batch (must be > 0).
    pub chunk_size: usize,
    /// Reflections at or above this incidence are ignored (degrees).
    pub max_incidence_angle: f64,
    /// Luminous efficacy of sunlight (lm/W).
    pub luminous_efficacy: f64,
    /// Luminance divisor.
    pub luminance_scale: f64,
    /// DNI used when no clear-sky data is attached (W/m²).
    pub default_dni: f64,
    /// Reflection profile interpolation: `"linear"` or `"log_cubic"`.
    pub interpolation: Interpolation,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            max_incidence_angle: 89.0,
            luminous_efficacy: 130.0,
            luminance_scale: 1e5,
            default_dni: 800.0,
            interpolation: Interpolation::Linear,
        }
    }
}

impl DetectorSection {
    /// Detector settings with the project's luminance threshold.
    pub fn settings(&self, intensity_threshold: f64) -> DetectorSettings {
        DetectorSettings {
            max_incidence_angle: self.max_incidence_angle,
            luminous_efficacy: self.luminous_efficacy,
            luminance_scale: self.luminance_scale,
            intensity_threshold,
        }
    }
}

/// Worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionSection {
    /// Run (observer, PV area) units on a thread pool.
    pub parallel: bool,
    /// Upper bound on pool size; `None` uses the available parallelism.
    pub max_workers: Option<usize>,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            parallel: true,
            max_workers: None,
        }
    }
}

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "GLARE_";

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"detector.luminance_scale"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        let field = if e.path.is_empty() {
            "config".to_string()
        } else {
            e.path.join(".")
        };
        Self::new(field, e.kind.to_string())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} - {}", self.field, self.message)
    }
}

impl AnalysisConfig {
    /// Returns the standard preset: SPA, clear-sky irradiance, linear profiles.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Returns the screening preset: analytic sun, no clear-sky model, coarse batching.
    pub fn screening() -> Self {
        Self {
            sun: SunSection {
                precision: Precision::Analytic,
                clear_sky: false,
                ..SunSection::default()
            },
            detector: DetectorSection {
                chunk_size: 4000,
                ..DetectorSection::default()
            },
            ..Self::default()
        }
    }

    /// Returns the detailed preset: per-observer sun series, log-cubic profiles.
    pub fn detailed() -> Self {
        Self {
            analysis: AnalysisSection {
                per_observer_sun: true,
                gap_threshold_minutes: 2,
                ..AnalysisSection::default()
            },
            detector: DetectorSection {
                chunk_size: 500,
                interpolation: Interpolation::LogCubic,
                ..DetectorSection::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["standard", "screening", "detailed"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "standard" => Ok(Self::standard()),
            "screening" => Ok(Self::screening()),
            "detailed" => Ok(Self::detailed()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string; omitted fields keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Self::extract(Self::default().figment().merge(Toml::string(s)))
            .map_err(|errors| {
                errors
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| ConfigError::new("toml", "invalid configuration"))
            })
    }

    /// Layers `GLARE_*` environment variables over `self`.
    ///
    /// # Errors
    ///
    /// Returns one `ConfigError` per override that does not fit its field.
    pub fn with_env_overrides(self) -> Result<Self, Vec<ConfigError>> {
        Self::extract(self.figment().merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// This configuration as the lowest figment layer.
    pub fn figment(&self) -> Figment {
        Figment::from(Serialized::defaults(self))
    }

    /// Extracts a configuration from `figment`.
    ///
    /// # Errors
    ///
    /// Returns every extraction error, never an empty list.
    pub fn extract(figment: Figment) -> Result<Self, Vec<ConfigError>> {
        figment
            .extract()
            .map_err(|e: figment::Error| e.into_iter().map(ConfigError::from).collect())
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self
            .analysis
            .year
            .is_some_and(|y| !(1..=9999).contains(&y))
        {
            errors.push(ConfigError::new("analysis.year", "must be in [1, 9999]"));
        }
        if self.analysis.gap_threshold_minutes > 24 * 60 {
            errors.push(ConfigError::new(
                "analysis.gap_threshold_minutes",
                "must be <= 1440",
            ));
        }

        let sun = &self.sun;
        if !(1.0..=10.0).contains(&sun.linke_turbidity) {
            errors.push(ConfigError::new("sun.linke_turbidity", "must be in [1.0, 10.0]"));
        }

        let d = &self.detector;
        if d.chunk_size == 0 {
            errors.push(ConfigError::new("detector.chunk_size", "must be > 0"));
        }
        if !(d.max_incidence_angle > 0.0 && d.max_incidence_angle <= 90.0) {
            errors.push(ConfigError::new(
                "detector.max_incidence_angle",
                "must be in (0, 90]",
            ));
        }
        if d.luminous_efficacy <= 0.0 {
            errors.push(ConfigError::new("detector.luminous_efficacy", "must be > 0"));
        }
        if d.luminance_scale <= 0.0 {
            errors.push(ConfigError::new("detector.luminance_scale", "must be > 0"));
        }
        if d.default_dni < 0.0 {
            errors.push(ConfigError::new("detector.default_dni", "must be >= 0"));
        }

        if self.execution.max_workers == Some(0) {
            errors.push(ConfigError::new("execution.max_workers", "must be > 0"));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_preset_valid() {
        let errors = AnalysisConfig::standard().validate();
        assert!(errors.is_empty(), "standard should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = AnalysisConfig::from_preset("nonexistent");
        assert!(err.is_err());
        assert!(err.err().is_some_and(|e| e.message.contains("unknown preset")));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in AnalysisConfig::PRESETS {
            let cfg = AnalysisConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(errors.is_empty(), "preset \"{name}\" should be valid: {errors:?}");
        }
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[analysis]
year = 2024
gap_threshold_minutes = 10
per_observer_sun = true

[sun]
precision = "analytic"
clear_sky = false
linke_turbidity = 4.5

[detector]
chunk_size = 250
max_incidence_angle = 85.0
luminous_efficacy = 120.0
luminance_scale = 100000.0
default_dni = 900.0
interpolation = "log_cubic"

[execution]
parallel = false
max_workers = 2
"#;
        let cfg = AnalysisConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().and_then(|c| c.analysis.year), Some(2024));
        assert_eq!(cfg.as_ref().map(|c| c.sun.precision), Some(Precision::Analytic));
        assert_eq!(
            cfg.as_ref().map(|c| c.detector.interpolation),
            Some(Interpolation::LogCubic)
        );
        assert_eq!(cfg.as_ref().and_then(|c| c.execution.max_workers), Some(2));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg = AnalysisConfig::from_toml_str("[detector]\nchunk_size = 64\n");
        assert!(cfg.is_ok());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.detector.chunk_size), Some(64));
        assert_eq!(cfg.as_ref().map(|c| c.detector.default_dni), Some(800.0));
        assert_eq!(cfg.as_ref().map(|c| c.analysis.gap_threshold_minutes), Some(5));
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let result = AnalysisConfig::from_toml_str("[sun]\nbogus_field = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_enum_value_is_rejected() {
        let result = AnalysisConfig::from_toml_str("[sun]\nprecision = \"approximate\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn validation_collects_every_error() {
        let mut cfg = AnalysisConfig::standard();
        cfg.detector.chunk_size = 0;
        cfg.detector.max_incidence_angle = 95.0;
        cfg.execution.max_workers = Some(0);
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"detector.chunk_size"));
        assert!(fields.contains(&"detector.max_incidence_angle"));
        assert!(fields.contains(&"execution.max_workers"));
    }

    #[test]
    fn env_overrides_apply() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("GLARE_ANALYSIS__YEAR", "2023");
            jail.set_env("GLARE_EXECUTION__PARALLEL", "false");
            jail.set_env("GLARE_EXECUTION__MAX_WORKERS", "3");
            jail.set_env("GLARE_SUN__PRECISION", "analytic");
            let cfg = AnalysisConfig::standard()
                .with_env_overrides()
                .map_err(|e| format!("{e:?}"))?;
            assert_eq!(cfg.analysis.year, Some(2023));
            assert!(!cfg.execution.parallel);
            assert_eq!(cfg.execution.max_workers, Some(3));
            assert_eq!(cfg.sun.precision, Precision::Analytic);
            // untouched fields keep the base layer
            assert_eq!(cfg.detector, AnalysisConfig::standard().detector);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_sit_on_top_of_the_preset() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("GLARE_DETECTOR__CHUNK_SIZE", "64");
            let cfg = AnalysisConfig::detailed()
                .with_env_overrides()
                .map_err(|e| format!("{e:?}"))?;
            assert_eq!(cfg.detector.chunk_size, 64);
            assert!(cfg.analysis.per_observer_sun);
            assert_eq!(cfg.detector.interpolation, Interpolation::LogCubic);
            Ok(())
        });
    }

    #[test]
    fn bad_env_override_is_reported() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("GLARE_ANALYSIS__YEAR", "soon");
            let errors = AnalysisConfig::standard()
                .with_env_overrides()
                .err()
                .unwrap_or_default();
            assert_eq!(errors.len(), 1);
            assert!(
                errors[0].field.ends_with("year") || errors[0].message.contains("year"),
                "{errors:?}"
            );
            Ok(())
        });
    }

    #[test]
    fn display_uses_field_and_message() {
        let e = ConfigError::new("detector.chunk_size", "must be > 0");
        assert_eq!(e.to_string(), "config error: detector.chunk_size - must be > 0");
    }

    #[test]
    fn detector_settings_carry_threshold() {
        let s = AnalysisConfig::standard().detector.settings(0.5);
        assert_eq!(s.intensity_threshold, 0.5);
        assert_eq!(s.max_incidence_angle, 89.0);
    }
}
