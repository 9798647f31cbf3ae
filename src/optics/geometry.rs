//! Law-of-reflection geometry and small spherical helpers.
//!
//! Vectors live in a local East-North-Up frame: `x` points east, `y` north
//! and `z` up. Azimuths are degrees clockwise from north, elevations degrees
//! above the horizon.

use crate::error::GeometryError;

/// Mean Earth radius used for great-circle distances (m).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Three-component vector in the local East-North-Up frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn scale(&self, k: f64) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn neg(&self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }

    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Returns the unit vector with the same direction.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::DegenerateVector`] for a zero-length (or
    /// non-finite) vector.
    pub fn normalized(&self) -> Result<Vec3, GeometryError> {
        let m = self.magnitude();
        if !m.is_finite() || m < 1e-12 {
            return Err(GeometryError::DegenerateVector);
        }
        Ok(self.scale(1.0 / m))
    }
}

/// Direction of the reflected beam plus the angle it struck the panel at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectedRay {
    /// Azimuth of the outgoing ray (degrees, [0, 360)).
    pub azimuth: f64,
    /// Elevation of the outgoing ray (degrees, [-90, 90]).
    pub elevation: f64,
    /// Angle between the sun direction and the panel normal (degrees, [0, 180]).
    pub incidence_angle: f64,
}

/// Maps any azimuth into `[0, 360)`.
pub fn normalize_azimuth(azimuth: f64) -> f64 {
    let a = azimuth.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if a >= 360.0 { 0.0 } else { a }
}

/// Wrap-aware absolute difference between two azimuths (degrees, [0, 180]).
pub fn azimuth_difference(a: f64, b: f64) -> f64 {
    wrapped_delta(normalize_azimuth(a), normalize_azimuth(b))
}

/// Same as [`azimuth_difference`] for inputs already normalized to `[0, 360)`.
#[inline]
pub fn wrapped_delta(a: f64, b: f64) -> f64 {
    let d = (a - b).abs();
    if d > 180.0 { 360.0 - d } else { d }
}

/// Unit vector pointing toward `(azimuth, elevation)`.
pub fn direction(azimuth: f64, elevation: f64) -> Vec3 {
    let (az, el) = (azimuth.to_radians(), elevation.to_radians());
    Vec3::new(az.sin() * el.cos(), az.cos() * el.cos(), el.sin())
}

/// Outward unit normal of a panel facing `azimuth`, tilted `tilt` degrees from horizontal.
pub fn panel_normal(azimuth: f64, tilt: f64) -> Vec3 {
    let (az, t) = (azimuth.to_radians(), tilt.to_radians());
    Vec3::new(az.sin() * t.sin(), az.cos() * t.sin(), t.cos())
}

/// Unit vector pointing from the sun toward the ground.
pub fn sun_vector(azimuth: f64, elevation: f64) -> Vec3 {
    direction(azimuth, elevation).neg()
}

/// Mirrors `incident` about the plane with normal `normal`: `r = i - 2(i·n)n`.
///
/// # Errors
///
/// Returns [`GeometryError::DegenerateVector`] if `normal` has zero length.
pub fn reflect(incident: &Vec3, normal: &Vec3) -> Result<Vec3, GeometryError> {
    let n = normal.normalized()?;
    Ok(incident.sub(&n.scale(2.0 * incident.dot(&n))))
}

/// Converts a direction vector back to `(azimuth, elevation)` in degrees.
pub fn vector_to_angles(v: &Vec3) -> Result<(f64, f64), GeometryError> {
    let u = v.normalized()?;
    let elevation = u.z.clamp(-1.0, 1.0).asin().to_degrees();
    let azimuth = normalize_azimuth(u.x.atan2(u.y).to_degrees());
    Ok((azimuth, elevation))
}

/// Angle between the direction toward the sun and the panel normal (degrees).
///
/// The cosine is clamped to `[-1, 1]` before `acos`. Values above 90° mean the
/// sun is behind the panel.
pub fn incidence_angle(sun: &Vec3, normal: &Vec3) -> f64 {
    (-sun.dot(normal)).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Direct irradiance on the panel plane; zero when the sun is behind it.
pub fn plane_irradiance(dni: f64, incidence_deg: f64) -> f64 {
    (dni * incidence_deg.to_radians().cos()).max(0.0)
}

/// Reflects the sun beam off a panel.
///
/// # Arguments
///
/// * `sun_azimuth` / `sun_elevation` - Sun position (degrees)
/// * `panel_azimuth` / `panel_tilt` - Panel orientation (degrees)
///
/// # Returns
///
/// The outgoing ray direction and the incidence angle.
pub fn reflect_sun(
    sun_azimuth: f64,
    sun_elevation: f64,
    panel_azimuth: f64,
    panel_tilt: f64,
) -> Result<ReflectedRay, GeometryError> {
    let normal = panel_normal(panel_azimuth, panel_tilt);
    let beam = sun_vector(sun_azimuth, sun_elevation);
    let reflected = reflect(&beam, &normal)?;
    let (azimuth, elevation) = vector_to_angles(&reflected)?;
    Ok(ReflectedRay {
        azimuth,
        elevation,
        incidence_angle: incidence_angle(&beam, &normal),
    })
}

/// Great-circle distance between two points (m).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().clamp(0.0, 1.0).asin()
}

/// Initial great-circle bearing from point 1 to point 2 (degrees, [0, 360)).
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
    let dlambda = (lon2 - lon1).to_radians();
    let y = dlambda.sin() * p2.cos();
    let x = p1.cos() * p2.sin() - p1.sin() * p2.cos() * dlambda.cos();
    normalize_azimuth(y.atan2(x).to_degrees())
}

/// Ray-casting point-in-polygon test on `(x, y)` pairs.
///
/// Points exactly on an edge may land on either side.
pub fn point_in_polygon(point: (f64, f64), polygon: &[(f64, f64)]) -> bool {
    let (px, py) = point;
    let mut inside = false;
    let n = polygon.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn normalize_wraps_negative_and_large_values() {
        assert!((normalize_azimuth(-90.0) - 270.0).abs() < EPS);
        assert!((normalize_azimuth(725.0) - 5.0).abs() < EPS);
        assert_eq!(normalize_azimuth(360.0), 0.0);
        assert_eq!(normalize_azimuth(-1e-18), 0.0);
    }

    #[test]
    fn azimuth_difference_takes_short_way_round() {
        assert!((azimuth_difference(359.0, 1.0) - 2.0).abs() < EPS);
        assert!((azimuth_difference(10.0, 350.0) - 20.0).abs() < EPS);
        assert!((azimuth_difference(0.0, 180.0) - 180.0).abs() < EPS);
    }

    #[test]
    fn flat_panel_normal_points_up() {
        let n = panel_normal(123.0, 0.0);
        assert!(n.x.abs() < EPS && n.y.abs() < EPS);
        assert!((n.z - 1.0).abs() < EPS);
    }

    #[test]
    fn south_facing_vertical_panel_normal_points_south() {
        let n = panel_normal(180.0, 90.0);
        assert!((n.y + 1.0).abs() < EPS);
        assert!(n.z.abs() < EPS);
    }

    #[test]
    fn incidence_zero_when_sun_faces_panel() {
        // panel tilted 30° facing south; sun due south at 60° elevation
        let normal = panel_normal(180.0, 30.0);
        let sun = sun_vector(180.0, 60.0);
        assert!(incidence_angle(&sun, &normal).abs() < 1e-5);
    }

    #[test]
    fn incidence_ninety_when_sun_grazes_panel() {
        let normal = panel_normal(0.0, 0.0);
        let sun = sun_vector(47.0, 0.0);
        assert!((incidence_angle(&sun, &normal) - 90.0).abs() < EPS);
    }

    #[test]
    fn sun_behind_panel_yields_zero_irradiance() {
        let normal = panel_normal(180.0, 90.0);
        let sun = sun_vector(0.0, 10.0);
        let inc = incidence_angle(&sun, &normal);
        assert!(inc > 90.0);
        assert_eq!(plane_irradiance(800.0, inc), 0.0);
    }

    #[test]
    fn horizontal_panel_mirrors_sun_azimuth() {
        let ray = reflect_sun(135.0, 40.0, 0.0, 0.0).expect("valid geometry");
        assert!((ray.azimuth - 315.0).abs() < 1e-9);
        assert!((ray.elevation - 40.0).abs() < 1e-9);
        assert!((ray.incidence_angle - 50.0).abs() < 1e-9);
    }

    #[test]
    fn reflect_rejects_zero_normal() {
        let err = reflect(&Vec3::new(0.0, 0.0, -1.0), &Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(err, Err(GeometryError::DegenerateVector));
    }

    #[test]
    fn vertical_panel_reflects_back_toward_sun_side() {
        // Vertical panel facing south, sun low in the south: beam bounces back
        // south and keeps descending.
        let ray = reflect_sun(180.0, 10.0, 180.0, 90.0).expect("valid geometry");
        assert!(azimuth_difference(ray.azimuth, 180.0) < 1e-6);
        assert!((ray.elevation + 10.0).abs() < 1e-6);
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.93).abs() < 1.0);
    }

    #[test]
    fn bearing_cardinal_directions() {
        assert!(initial_bearing(48.0, 11.0, 49.0, 11.0).abs() < 1e-9);
        assert!((initial_bearing(48.0, 11.0, 47.0, 11.0) - 180.0).abs() < 1e-9);
        assert!((initial_bearing(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn point_in_square() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        assert!(point_in_polygon((0.5, 0.5), &square));
        assert!(!point_in_polygon((1.5, 0.5), &square));
        assert!(!point_in_polygon((0.5, 0.5), &[]));
    }
}
