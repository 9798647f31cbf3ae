//! Incidence-angle reflection curves, one per module type.
//!
//! A [`ProfileRegistry`] is built once per run and handed by reference to
//! every component that needs coefficients. It is never mutated afterwards,
//! so worker threads share it without locking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::geometry::ReflectedRay;
use crate::error::ProfileError;

/// Module types every complete profile table is expected to cover.
pub const STANDARD_MODULE_TYPES: [u8; 3] = [0, 1, 2];

/// Strategy used between two sampled angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Straight line between the two bracketing samples.
    #[default]
    Linear,
    /// Natural cubic spline through `ln(coefficient)`; follows the steep
    /// rise near grazing incidence more closely.
    LogCubic,
}

/// Reflected ray plus the coefficient its incidence angle maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionResult {
    pub azimuth: f64,
    pub elevation: f64,
    pub incidence_angle: f64,
    /// Fraction of incident light reflected, in `[0, 1]`.
    pub coefficient: f64,
}

/// Sampled `(incidence angle, coefficient)` curve for one module type.
#[derive(Debug, Clone)]
pub struct ReflectionProfile {
    module_type: u8,
    angles: Vec<f64>,
    coefficients: Vec<f64>,
    spline: Option<LogSpline>,
}

impl ReflectionProfile {
    /// Builds a profile, sorting the samples by angle.
    ///
    /// A [`Interpolation::LogCubic`] request that cannot be honoured (fewer
    /// than three samples, repeated angles, or a coefficient outside
    /// `(0, 1]`) falls back to linear interpolation with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if the two vectors differ in
    /// length and [`ProfileError::Empty`] if they hold no samples.
    pub fn new(
        module_type: u8,
        angles: Vec<f64>,
        coefficients: Vec<f64>,
        interpolation: Interpolation,
    ) -> Result<Self, ProfileError> {
        if angles.len() != coefficients.len() {
            return Err(ProfileError::LengthMismatch {
                module_type,
                angles: angles.len(),
                coefficients: coefficients.len(),
            });
        }
        if angles.is_empty() {
            return Err(ProfileError::Empty(module_type));
        }

        let mut samples: Vec<(f64, f64)> = angles.into_iter().zip(coefficients).collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (angles, coefficients): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();

        let spline = match interpolation {
            Interpolation::Linear => None,
            Interpolation::LogCubic => {
                let fitted = LogSpline::fit(&angles, &coefficients);
                if fitted.is_none() {
                    warn!(
                        module_type,
                        "log-cubic interpolation unavailable for this profile, using linear"
                    );
                }
                fitted
            }
        };

        Ok(Self {
            module_type,
            angles,
            coefficients,
            spline,
        })
    }

    pub fn module_type(&self) -> u8 {
        self.module_type
    }

    /// Strategy actually in effect after any fallback.
    pub fn interpolation(&self) -> Interpolation {
        if self.spline.is_some() {
            Interpolation::LogCubic
        } else {
            Interpolation::Linear
        }
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Reflection coefficient at `angle` degrees of incidence.
    ///
    /// The angle is clamped to `[0, 90]`; at or beyond either end of the
    /// sampled range the boundary sample is returned. The result always lies
    /// in `[0, 1]`.
    pub fn coefficient(&self, angle: f64) -> f64 {
        let a = if angle.is_nan() {
            0.0
        } else {
            angle.clamp(0.0, 90.0)
        };
        let n = self.angles.len();
        let value = if a <= self.angles[0] {
            self.coefficients[0]
        } else if a >= self.angles[n - 1] {
            self.coefficients[n - 1]
        } else {
            let k = self.angles.partition_point(|&x| x <= a) - 1;
            match &self.spline {
                Some(spline) => spline.eval(&self.angles, k, a),
                None => {
                    let (x0, x1) = (self.angles[k], self.angles[k + 1]);
                    let (y0, y1) = (self.coefficients[k], self.coefficients[k + 1]);
                    y0 + (y1 - y0) * (a - x0) / (x1 - x0)
                }
            }
        };
        value.clamp(0.0, 1.0)
    }

    /// Attaches this profile's coefficient to a reflected ray.
    pub fn evaluate(&self, ray: &ReflectedRay) -> ReflectionResult {
        ReflectionResult {
            azimuth: ray.azimuth,
            elevation: ray.elevation,
            incidence_angle: ray.incidence_angle,
            coefficient: self.coefficient(ray.incidence_angle),
        }
    }
}

/// Natural cubic spline over `ln(coefficient)`.
#[derive(Debug, Clone)]
struct LogSpline {
    log_values: Vec<f64>,
    /// Second derivatives at each knot.
    second: Vec<f64>,
}

impl LogSpline {
    fn fit(angles: &[f64], coefficients: &[f64]) -> Option<Self> {
        let n = angles.len();
        if n < 3 || coefficients.iter().any(|&c| !(c > 0.0 && c <= 1.0)) {
            return None;
        }
        if angles.windows(2).any(|w| w[1] - w[0] <= 0.0) {
            return None;
        }
        let y: Vec<f64> = coefficients.iter().map(|c| c.ln()).collect();

        // Thomas algorithm on the interior knots; natural ends keep M = 0.
        let mut second = vec![0.0; n];
        let mut c_prime = vec![0.0; n];
        let mut d_prime = vec![0.0; n];
        for i in 1..n - 1 {
            let h0 = angles[i] - angles[i - 1];
            let h1 = angles[i + 1] - angles[i];
            let a = h0 / 6.0;
            let b = (h0 + h1) / 3.0;
            let c = h1 / 6.0;
            let d = (y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0;
            let denom = b - a * c_prime[i - 1];
            c_prime[i] = c / denom;
            d_prime[i] = (d - a * d_prime[i - 1]) / denom;
        }
        for i in (1..n - 1).rev() {
            second[i] = d_prime[i] - c_prime[i] * second[i + 1];
        }

        Some(Self {
            log_values: y,
            second,
        })
    }

    fn eval(&self, angles: &[f64], k: usize, x: f64) -> f64 {
        let h = angles[k + 1] - angles[k];
        let a = (angles[k + 1] - x) / h;
        let b = (x - angles[k]) / h;
        let y = a * self.log_values[k]
            + b * self.log_values[k + 1]
            + ((a * a * a - a) * self.second[k] + (b * b * b - b) * self.second[k + 1]) * h * h
                / 6.0;
        y.exp()
    }
}

/// Read-only map from module type to its reflection profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<u8, ReflectionProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the profile for its module type.
    pub fn insert(&mut self, profile: ReflectionProfile) {
        self.profiles.insert(profile.module_type(), profile);
    }

    /// # Errors
    ///
    /// Returns [`ProfileError::UnknownModuleType`] if no profile is registered.
    pub fn get(&self, module_type: u8) -> Result<&ReflectionProfile, ProfileError> {
        self.profiles
            .get(&module_type)
            .ok_or(ProfileError::UnknownModuleType(module_type))
    }

    pub fn module_types(&self) -> impl Iterator<Item = u8> + '_ {
        self.profiles.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Built-in curves derived from the Fresnel equations.
    ///
    /// * type 0 - plain solar glass (n = 1.5)
    /// * type 1 - anti-reflective coated glass (effective n = 1.3)
    /// * type 2 - structured glass, 60 % of plain glass specular reflection
    pub fn builtin(interpolation: Interpolation) -> Self {
        const ANGLES: [f64; 12] = [
            0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 75.0, 80.0, 85.0, 90.0,
        ];
        let curve = |n: f64, scale: f64| -> Vec<f64> {
            ANGLES
                .iter()
                .map(|&a| scale * fresnel_reflectance(a, n))
                .collect()
        };
        let mut registry = Self::new();
        for (module_type, coefficients) in [
            (0u8, curve(1.5, 1.0)),
            (1u8, curve(1.3, 1.0)),
            (2u8, curve(1.5, 0.6)),
        ] {
            // lengths match and are non-empty by construction
            if let Ok(profile) =
                ReflectionProfile::new(module_type, ANGLES.to_vec(), coefficients, interpolation)
            {
                registry.insert(profile);
            }
        }
        registry
    }

    /// Builds a registry from one angle column plus one coefficient column
    /// per module type. Coefficients are expected in `[0, 1]`; anything
    /// outside is clamped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] if any column length differs from the angle column.
    pub fn from_wide_table(
        angles: &[f64],
        columns: &[(u8, Vec<f64>)],
        interpolation: Interpolation,
    ) -> Result<Self, ProfileError> {
        let mut registry = Self::new();
        for (module_type, values) in columns {
            let out_of_range = values.iter().filter(|v| !(0.0..=1.0).contains(*v)).count();
            if out_of_range > 0 {
                warn!(
                    module_type,
                    out_of_range, "reflection coefficients outside [0, 1] clamped"
                );
            }
            let clamped = values.iter().map(|v| v.clamp(0.0, 1.0)).collect();
            registry.insert(ReflectionProfile::new(
                *module_type,
                angles.to_vec(),
                clamped,
                interpolation,
            )?);
        }
        registry.warn_missing_types();
        Ok(registry)
    }

    /// Builds a registry from `(angle, raw value, module type)` rows,
    /// normalizing raw values by the per-type maximum.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] if a profile cannot be constructed.
    pub fn from_long_rows(
        rows: &[(f64, f64, u8)],
        interpolation: Interpolation,
    ) -> Result<Self, ProfileError> {
        let mut grouped: BTreeMap<u8, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for &(angle, raw, module_type) in rows {
            let entry = grouped.entry(module_type).or_default();
            entry.0.push(angle);
            entry.1.push(raw);
        }

        let mut registry = Self::new();
        for (module_type, (angles, raw)) in grouped {
            let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let coefficients = if max > 0.0 {
                raw.iter().map(|v| (v / max).clamp(0.0, 1.0)).collect()
            } else {
                warn!(module_type, "raw reflection values are all non-positive");
                vec![0.0; raw.len()]
            };
            registry.insert(ReflectionProfile::new(
                module_type,
                angles,
                coefficients,
                interpolation,
            )?);
        }
        registry.warn_missing_types();
        Ok(registry)
    }

    fn warn_missing_types(&self) {
        for module_type in STANDARD_MODULE_TYPES {
            if !self.profiles.contains_key(&module_type) {
                warn!(module_type, "no reflection profile for standard module type");
            }
        }
    }
}

/// Unpolarized Fresnel reflectance of an air/dielectric interface.
pub fn fresnel_reflectance(incidence_deg: f64, refractive_index: f64) -> f64 {
    let cos_i = incidence_deg.clamp(0.0, 90.0).to_radians().cos();
    let sin_t = (1.0 - cos_i * cos_i).max(0.0).sqrt() / refractive_index;
    let cos_t = (1.0 - sin_t * sin_t).max(0.0).sqrt();
    let n = refractive_index;
    let rs = ((cos_i - n * cos_t) / (cos_i + n * cos_t)).powi(2);
    let rp = ((cos_t - n * cos_i) / (cos_t + n * cos_i)).powi(2);
    ((rs + rp) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_profile() -> ReflectionProfile {
        ReflectionProfile::new(
            0,
            vec![60.0, 0.0, 30.0, 90.0],
            vec![0.2, 0.05, 0.1, 1.0],
            Interpolation::Linear,
        )
        .expect("valid profile")
    }

    #[test]
    fn samples_sorted_on_construction() {
        let p = linear_profile();
        assert_eq!(p.angles(), &[0.0, 30.0, 60.0, 90.0]);
        assert_eq!(p.coefficients(), &[0.05, 0.1, 0.2, 1.0]);
    }

    #[test]
    fn linear_interpolation_between_samples() {
        let p = linear_profile();
        assert!((p.coefficient(15.0) - 0.075).abs() < 1e-12);
        assert!((p.coefficient(75.0) - 0.6).abs() < 1e-12);
        assert!((p.coefficient(30.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_angles_clamp_to_boundaries() {
        let p = ReflectionProfile::new(1, vec![10.0, 80.0], vec![0.1, 0.7], Interpolation::Linear)
            .expect("valid profile");
        assert_eq!(p.coefficient(-20.0), 0.1);
        assert_eq!(p.coefficient(5.0), 0.1);
        assert_eq!(p.coefficient(85.0), 0.7);
        assert_eq!(p.coefficient(170.0), 0.7);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = ReflectionProfile::new(2, vec![0.0, 10.0], vec![0.1], Interpolation::Linear);
        assert!(matches!(
            err,
            Err(ProfileError::LengthMismatch {
                module_type: 2,
                angles: 2,
                coefficients: 1
            })
        ));
    }

    #[test]
    fn empty_profile_is_rejected() {
        let err = ReflectionProfile::new(0, vec![], vec![], Interpolation::Linear);
        assert!(matches!(err, Err(ProfileError::Empty(0))));
    }

    #[test]
    fn log_cubic_passes_through_samples_and_keeps_boundaries() {
        let angles = vec![0.0, 30.0, 60.0, 75.0, 90.0];
        let coefficients = vec![0.04, 0.045, 0.09, 0.25, 1.0];
        let p = ReflectionProfile::new(
            0,
            angles.clone(),
            coefficients.clone(),
            Interpolation::LogCubic,
        )
        .expect("valid profile");
        assert_eq!(p.interpolation(), Interpolation::LogCubic);
        for (a, c) in angles.iter().zip(&coefficients) {
            assert!((p.coefficient(*a) - c).abs() < 1e-9, "knot {a}");
        }
        assert_eq!(p.coefficient(-5.0), 0.04);
        assert_eq!(p.coefficient(120.0), 1.0);
        let mid = p.coefficient(82.0);
        assert!(mid > 0.25 && mid < 1.0);
    }

    #[test]
    fn log_cubic_falls_back_when_zero_coefficient_present() {
        let p = ReflectionProfile::new(
            0,
            vec![0.0, 45.0, 90.0],
            vec![0.0, 0.1, 1.0],
            Interpolation::LogCubic,
        )
        .expect("valid profile");
        assert_eq!(p.interpolation(), Interpolation::Linear);
        assert!((p.coefficient(22.5) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn coefficient_stays_in_unit_interval() {
        let p = ReflectionProfile::new(0, vec![0.0, 90.0], vec![-0.5, 1.5], Interpolation::Linear)
            .expect("valid profile");
        for i in 0..=90 {
            let c = p.coefficient(i as f64);
            assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn fresnel_limits() {
        assert!((fresnel_reflectance(0.0, 1.5) - 0.04).abs() < 1e-12);
        assert!((fresnel_reflectance(90.0, 1.5) - 1.0).abs() < 1e-9);
        assert!(fresnel_reflectance(60.0, 1.5) > fresnel_reflectance(30.0, 1.5));
    }

    #[test]
    fn builtin_covers_standard_types() {
        let reg = ProfileRegistry::builtin(Interpolation::Linear);
        assert_eq!(reg.module_types().collect::<Vec<_>>(), vec![0, 1, 2]);
        let plain = reg.get(0).expect("type 0").coefficient(0.0);
        let coated = reg.get(1).expect("type 1").coefficient(0.0);
        assert!(coated < plain);
        assert!(matches!(reg.get(7), Err(ProfileError::UnknownModuleType(7))));
    }

    #[test]
    fn wide_and_long_layouts_agree() {
        let angles = [0.0, 30.0, 60.0, 90.0];
        let wide = ProfileRegistry::from_wide_table(
            &angles,
            &[(0, vec![0.25, 0.5, 0.75, 1.0]), (1, vec![0.1, 0.2, 0.4, 0.8])],
            Interpolation::Linear,
        )
        .expect("wide table");

        let mut rows = Vec::new();
        for (i, a) in angles.iter().enumerate() {
            rows.push((*a, [500.0, 1000.0, 1500.0, 2000.0][i], 0u8));
            rows.push((*a, [12.5, 25.0, 50.0, 100.0][i], 1u8));
        }
        let long =
            ProfileRegistry::from_long_rows(&rows, Interpolation::Linear).expect("long rows");

        // long layout normalizes type 1 to a peak of 1.0, so compare shapes
        for a in [0.0, 10.0, 45.0, 70.0, 90.0] {
            let w0 = wide.get(0).expect("type 0").coefficient(a);
            let l0 = long.get(0).expect("type 0").coefficient(a);
            assert!((w0 - l0).abs() < 1e-12, "type 0 at {a}");
            let w1 = wide.get(1).expect("type 1").coefficient(a) / 0.8;
            let l1 = long.get(1).expect("type 1").coefficient(a);
            assert!((w1 - l1).abs() < 1e-12, "type 1 at {a}");
        }
    }

    #[test]
    fn wide_table_clamps_out_of_range_values() {
        let reg = ProfileRegistry::from_wide_table(
            &[0.0, 90.0],
            &[(0, vec![-0.2, 1.4])],
            Interpolation::Linear,
        )
        .expect("wide table");
        assert_eq!(reg.get(0).expect("type 0").coefficients(), &[0.0, 1.0]);
    }
}
