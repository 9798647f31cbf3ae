//! Clear-sky irradiance (Ineichen-Perez) and air mass (Kasten-Young).

use std::f64::consts::PI;

/// Total solar irradiance at 1 AU (W/m²).
pub const SOLAR_CONSTANT: f64 = 1361.0;

/// Linke turbidity for a clear rural atmosphere.
pub const DEFAULT_LINKE_TURBIDITY: f64 = 3.0;

/// Clear-sky irradiance components for one sun position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearSky {
    /// Direct normal irradiance (W/m²).
    pub dni: f64,
    /// Diffuse horizontal irradiance (W/m²).
    pub dhi: f64,
    /// Global horizontal irradiance (W/m²).
    pub ghi: f64,
    /// Pressure-corrected air mass; `None` with the sun at or below the horizon.
    pub air_mass: Option<f64>,
}

impl ClearSky {
    pub const DARK: ClearSky = ClearSky {
        dni: 0.0,
        dhi: 0.0,
        ghi: 0.0,
        air_mass: None,
    };
}

/// Absolute air mass: Kasten-Young relative air mass with an ISA pressure
/// correction for site altitude.
///
/// Returns `None` with the sun at or below the horizon.
pub fn air_mass(sun_elevation_deg: f64, altitude_m: f64) -> Option<f64> {
    if sun_elevation_deg <= 0.0 {
        return None;
    }
    let zenith_deg = 90.0 - sun_elevation_deg;
    let relative =
        1.0 / (zenith_deg.to_radians().cos() + 0.50572 * (96.07995 - zenith_deg).powf(-1.6364));
    let pressure_ratio = if altitude_m.abs() < 1e-5 {
        1.0
    } else {
        (1.0 - 2.25577e-5 * altitude_m).powf(5.25588)
    };
    Some(relative * pressure_ratio)
}

/// Extraterrestrial irradiance with Spencer's orbital eccentricity correction (W/m²).
pub fn extraterrestrial_irradiance(day_of_year: u32) -> f64 {
    let b = 2.0 * PI * (f64::from(day_of_year) - 1.0) / 365.0;
    let eccentricity = 1.000110
        + 0.034221 * b.cos()
        + 0.001280 * b.sin()
        + 0.000719 * (2.0 * b).cos()
        + 0.000077 * (2.0 * b).sin();
    SOLAR_CONSTANT * eccentricity
}

/// Ineichen-Perez clear-sky model.
///
/// # Arguments
///
/// * `sun_elevation_deg` - Apparent sun elevation
/// * `altitude_m` - Site altitude
/// * `day_of_year` - 1..=366
/// * `linke_turbidity` - Atmospheric turbidity (2-7 typical)
pub fn ineichen_perez(
    sun_elevation_deg: f64,
    altitude_m: f64,
    day_of_year: u32,
    linke_turbidity: f64,
) -> ClearSky {
    let Some(am) = air_mass(sun_elevation_deg, altitude_m).filter(|m| m.is_finite() && *m > 0.0)
    else {
        return ClearSky::DARK;
    };

    let i0 = extraterrestrial_irradiance(day_of_year);
    let sin_elev = sun_elevation_deg.to_radians().sin();
    let alt = altitude_m.clamp(-500.0, 11_000.0);

    let fh1 = (-alt / 8000.0).exp();
    let fh2 = (-alt / 1250.0).exp();
    let tl = (linke_turbidity - 0.15 * alt / 1000.0).max(1.0);
    let cg1 = 5.09e-5 * alt + 0.868;
    let cg2 = 3.92e-5 * alt + 0.0387;

    let attenuation = -cg2 * am * (fh1 + fh2 * (tl - 1.0));
    let dni = ((0.664 + 0.163 / fh1) * i0 * attenuation.exp()).clamp(0.0, i0);

    let ghi_model = (cg1 * i0 * sin_elev * (attenuation * 1.1).exp()).max(0.0);
    let beam_horizontal = dni * sin_elev;
    let ghi = ghi_model.max(beam_horizontal);

    ClearSky {
        dni,
        dhi: (ghi - beam_horizontal).max(0.0),
        ghi,
        air_mass: Some(am),
    }
}
