//! Angular lattice of a PV area as seen from one observer.
//!
//! The lattice covers the azimuth/elevation bounding box of the area's outer
//! corners, widened by the hit-test threshold on every side. No polygon
//! containment is applied, so the lattice over-covers non-rectangular areas.

use tracing::debug;

use crate::error::GeometryError;
use crate::model::{ObservationPoint, ObserverId, PvArea, PvAreaId, SimulationParameters};
use crate::optics::geometry::{haversine_distance, initial_bearing, normalize_azimuth};

/// Horizontal distances below this are treated as the same point (m).
pub const MIN_HORIZONTAL_DISTANCE_M: f64 = 1e-3;

/// Upper bound on lattice points per (observer, PV area) unit.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Absorbs floating-point drift when counting lattice steps.
const LATTICE_EPSILON: f64 = 1e-9;

/// One lattice direction, observer toward the PV area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularGridPoint {
    /// Degrees clockwise from north, [0, 360).
    pub azimuth: f64,
    /// Degrees above the horizon, [-90, 90].
    pub elevation: f64,
    pub pv_area: PvAreaId,
    pub observer: ObserverId,
    /// Solid angle represented by this point (sr).
    pub solid_angle: f64,
}

/// Lattice for one (observer, PV area) unit.
#[derive(Debug, Clone)]
pub struct AngularGrid {
    pub observer: ObserverId,
    pub pv_area: PvAreaId,
    /// Hit-test tolerance (degrees).
    pub threshold: f64,
    pub points: Vec<AngularGridPoint>,
}

impl AngularGrid {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of the points' solid angles (sr).
    pub fn total_solid_angle(&self) -> f64 {
        self.points.iter().map(|p| p.solid_angle).sum()
    }
}

/// Builds [`AngularGrid`]s with a fixed spacing and threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularGridBuilder {
    spacing: f64,
    threshold: f64,
}

impl AngularGridBuilder {
    /// # Arguments
    ///
    /// * `spacing` - Lattice step in both axes (degrees, > 0)
    /// * `threshold` - Hit-test tolerance, also the bounding-box margin (degrees)
    pub fn new(spacing: f64, threshold: f64) -> Self {
        Self { spacing, threshold }
    }

    /// Spacing from `grid_width`, threshold from `(beam_spread + sun_angle) / 2`.
    pub fn from_parameters(params: &SimulationParameters) -> Self {
        Self::new(params.grid_width, params.angular_threshold())
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// `(azimuth, elevation)` of every outer corner seen from the observer.
    ///
    /// Azimuths are unwrapped incrementally, so consecutive values differ by
    /// at most 180° and may fall outside `[0, 360)`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::CoincidentPoints`] if a corner lies within
    /// [`MIN_HORIZONTAL_DISTANCE_M`] of the observer.
    pub fn corner_angles(
        &self,
        observer: &ObservationPoint,
        pv_area: &PvArea,
    ) -> Result<Vec<(f64, f64)>, GeometryError> {
        let o = &observer.location;
        let mut angles: Vec<(f64, f64)> = Vec::with_capacity(pv_area.corners.len());
        for corner in &pv_area.corners {
            let dist =
                haversine_distance(o.latitude, o.longitude, corner.latitude, corner.longitude);
            if dist < MIN_HORIZONTAL_DISTANCE_M {
                return Err(GeometryError::CoincidentPoints {
                    observer: observer.name.clone(),
                    pv_area: pv_area.name.clone(),
                });
            }
            let mut az =
                initial_bearing(o.latitude, o.longitude, corner.latitude, corner.longitude);
            if let Some(&(prev, _)) = angles.last() {
                while az - prev > 180.0 {
                    az -= 360.0;
                }
                while az - prev < -180.0 {
                    az += 360.0;
                }
            }
            let el = (corner.total_height() - o.total_height())
                .atan2(dist)
                .to_degrees();
            angles.push((az, el));
        }
        Ok(angles)
    }

    /// Lays the lattice for one (observer, PV area) unit.
    ///
    /// # Errors
    ///
    /// * [`GeometryError::CoincidentPoints`] - see [`Self::corner_angles`]
    /// * [`GeometryError::OutsideDomain`] - spacing is not a positive finite number
    /// * [`GeometryError::GridTooLarge`] - the lattice would exceed [`MAX_GRID_POINTS`]
    pub fn build(
        &self,
        observer: &ObservationPoint,
        pv_area: &PvArea,
    ) -> Result<AngularGrid, GeometryError> {
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(GeometryError::OutsideDomain {
                value: self.spacing,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        let corners = self.corner_angles(observer, pv_area)?;

        let (mut min_az, mut max_az) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_el, mut max_el) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(az, el) in &corners {
            min_az = min_az.min(az);
            max_az = max_az.max(az);
            min_el = min_el.min(el);
            max_el = max_el.max(el);
        }
        min_az -= self.threshold;
        max_az += self.threshold;
        min_el -= self.threshold;
        max_el += self.threshold;

        let steps = |lo: f64, hi: f64| {
            ((hi - lo) / self.spacing + LATTICE_EPSILON).floor() as usize + 1
        };
        let (n_az, n_el) = if corners.is_empty() {
            (0, 0)
        } else {
            (steps(min_az, max_az), steps(min_el, max_el))
        };
        let requested = n_az.saturating_mul(n_el);
        if requested > MAX_GRID_POINTS {
            return Err(GeometryError::GridTooLarge {
                observer: observer.name.clone(),
                pv_area: pv_area.name.clone(),
                points: requested,
                max: MAX_GRID_POINTS,
            });
        }

        let cell = self.spacing.to_radians().powi(2);
        let mut points = Vec::with_capacity(requested);
        for i in 0..n_az {
            let azimuth = normalize_azimuth(min_az + i as f64 * self.spacing);
            if observer
                .field_of_view
                .is_some_and(|fov| !fov.contains(azimuth))
            {
                continue;
            }
            for j in 0..n_el {
                let elevation = min_el + j as f64 * self.spacing;
                if !(-90.0..=90.0).contains(&elevation) {
                    continue;
                }
                points.push(AngularGridPoint {
                    azimuth,
                    elevation,
                    pv_area: pv_area.id,
                    observer: observer.id,
                    solid_angle: cell * elevation.to_radians().cos(),
                });
            }
        }

        debug!(
            observer = %observer.name,
            pv_area = %pv_area.name,
            points = points.len(),
            az_span = max_az - min_az,
            el_span = max_el - min_el,
            "angular grid built"
        );

        Ok(AngularGrid {
            observer: observer.id,
            pv_area: pv_area.id,
            threshold: self.threshold,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, FieldOfView};
    use crate::optics::geometry::azimuth_difference;

    const M_PER_DEG: f64 = 111_194.93;

    fn offset(origin: Coordinate, east_m: f64, north_m: f64) -> Coordinate {
        Coordinate::new(
            origin.latitude + north_m / M_PER_DEG,
            origin.longitude + east_m / (M_PER_DEG * origin.latitude.to_radians().cos()),
        )
    }

    fn observer(height: f64) -> ObservationPoint {
        ObservationPoint {
            id: ObserverId(0),
            name: "OP1".into(),
            location: Coordinate::new(48.0, 11.0).with_elevation(500.0, height),
            field_of_view: None,
        }
    }

    fn area(corners: &[(f64, f64)]) -> PvArea {
        let origin = Coordinate::new(48.0, 11.0);
        PvArea {
            id: PvAreaId(0),
            name: "PV1".into(),
            corners: corners
                .iter()
                .map(|&(e, n)| offset(origin, e, n).with_elevation(500.0, 0.0))
                .collect(),
            holes: Vec::new(),
            azimuth: 180.0,
            tilt: 0.0,
            module_type: 1,
        }
    }

    fn south_square() -> PvArea {
        area(&[(-3.0, -2.0), (3.0, -2.0), (3.0, -8.0), (-3.0, -8.0)])
    }

    #[test]
    fn corners_south_of_observer_look_south_and_down() {
        let b = AngularGridBuilder::new(1.0, 0.515);
        let angles = b.corner_angles(&observer(10.0), &south_square()).expect("angles");
        assert_eq!(angles.len(), 4);
        for (az, el) in angles {
            assert!(azimuth_difference(az, 180.0) < 60.0, "az {az}");
            assert!(el < 0.0, "el {el}");
        }
    }

    #[test]
    fn lattice_covers_box_plus_threshold() {
        let b = AngularGridBuilder::new(1.0, 0.515);
        let obs = observer(10.0);
        let pv = south_square();
        let corners = b.corner_angles(&obs, &pv).expect("angles");
        let grid = b.build(&obs, &pv).expect("grid");
        assert!(!grid.is_empty());
        assert_eq!(grid.threshold, 0.515);

        let min_el = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let lowest = grid.points.iter().map(|p| p.elevation).fold(f64::INFINITY, f64::min);
        assert!((lowest - (min_el - 0.515)).abs() < 1e-9);
        for p in &grid.points {
            assert!((0.0..360.0).contains(&p.azimuth));
            assert!((-90.0..=90.0).contains(&p.elevation));
            assert!(p.solid_angle > 0.0);
        }
    }

    #[test]
    fn lattice_counts_follow_spacing() {
        let obs = observer(10.0);
        let pv = south_square();
        let coarse = AngularGridBuilder::new(2.0, 0.515).build(&obs, &pv).expect("grid");
        let fine = AngularGridBuilder::new(1.0, 0.515).build(&obs, &pv).expect("grid");
        assert!(fine.len() > coarse.len() * 3);
        assert!((fine.total_solid_angle() - coarse.total_solid_angle()).abs() < 0.1);
    }

    #[test]
    fn oversized_lattice_is_rejected() {
        // 0.02° over a ~110° x 20° box is several million points
        let b = AngularGridBuilder::new(0.02, 0.515);
        let err = b.build(&observer(10.0), &south_square()).err();
        assert!(matches!(
            err,
            Some(GeometryError::GridTooLarge { points, max, .. }) if points > max
        ));
    }

    #[test]
    fn azimuth_seam_is_unwrapped() {
        // area due north straddles the 0/360 seam
        let obs = observer(10.0);
        let pv = area(&[(-3.0, 2.0), (3.0, 2.0), (3.0, 8.0), (-3.0, 8.0)]);
        let b = AngularGridBuilder::new(1.0, 0.515);
        let corners = b.corner_angles(&obs, &pv).expect("angles");
        let span = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max)
            - corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        assert!(span < 180.0, "span {span}");

        let grid = b.build(&obs, &pv).expect("grid");
        assert!(grid.points.iter().any(|p| p.azimuth > 300.0));
        assert!(grid.points.iter().any(|p| p.azimuth < 60.0));
        assert!(grid.points.iter().all(|p| azimuth_difference(p.azimuth, 0.0) < 90.0));
    }

    #[test]
    fn field_of_view_filters_points() {
        let mut obs = observer(10.0);
        let pv = south_square();
        let b = AngularGridBuilder::new(1.0, 0.515);
        let full = b.build(&obs, &pv).expect("grid");

        obs.field_of_view = Some(FieldOfView {
            direction: 180.0,
            expansion: 20.0,
        });
        let narrowed = b.build(&obs, &pv).expect("grid");
        assert!(narrowed.len() < full.len());
        assert!(narrowed
            .points
            .iter()
            .all(|p| azimuth_difference(p.azimuth, 180.0) <= 10.0));

        obs.field_of_view = Some(FieldOfView {
            direction: 0.0,
            expansion: 20.0,
        });
        assert!(b.build(&obs, &pv).expect("grid").is_empty());
    }

    #[test]
    fn coincident_corner_is_rejected() {
        let pv = area(&[(0.0, 0.0), (3.0, -2.0), (-3.0, -2.0)]);
        let err = AngularGridBuilder::new(1.0, 0.5).build(&observer(0.0), &pv);
        assert!(matches!(err, Err(GeometryError::CoincidentPoints { .. })));
    }

    #[test]
    fn non_positive_spacing_is_rejected() {
        let err = AngularGridBuilder::new(0.0, 0.5).build(&observer(0.0), &south_square());
        assert!(matches!(err, Err(GeometryError::OutsideDomain { .. })));
    }

    #[test]
    fn builder_reads_parameters() {
        let b = AngularGridBuilder::from_parameters(&SimulationParameters::default());
        assert_eq!(b.spacing(), 1.0);
        assert!((b.threshold() - 0.515).abs() < 1e-12);
    }
}
