/// Reflection geometry in the local East-North-Up frame.
pub mod geometry;
/// Incidence-angle dependent reflection coefficients per module type.
pub mod profile;

pub use geometry::{ReflectedRay, Vec3, reflect_sun};
pub use profile::{Interpolation, ProfileRegistry, ReflectionProfile, ReflectionResult};
