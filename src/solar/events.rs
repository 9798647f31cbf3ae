//! Solar noon, sunrise/sunset for a calendar day, and monthly daylight
//! figures for a date range.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use super::SunPositionProvider;
use super::analytic::equation_of_time;
use crate::error::SunPositionError;
use crate::model::Coordinate;

/// Daylight outcome for one UTC day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Daylight {
    Regular {
        sunrise: DateTime<Utc>,
        sunset: DateTime<Utc>,
    },
    /// Sun stays above the horizon all day.
    PolarDay,
    /// Sun stays below the horizon all day.
    PolarNight,
}

/// Approximate instant of solar noon (UTC) at `longitude` on `date`.
pub fn solar_noon(longitude: f64, date: NaiveDate) -> DateTime<Utc> {
    let offset_minutes = 720.0 - 4.0 * longitude - equation_of_time(date.ordinal());
    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    midnight + Duration::seconds((offset_minutes * 60.0).round() as i64)
}

/// Sunrise and sunset around the solar noon of `date`, found by bisection on
/// the provider's apparent elevation (centre of the disc on the horizon).
///
/// # Errors
///
/// Propagates provider errors.
pub fn daylight(
    provider: &dyn SunPositionProvider,
    location: &Coordinate,
    date: NaiveDate,
) -> Result<Daylight, SunPositionError> {
    let noon = solar_noon(location.longitude, date);
    let elevation = |t: DateTime<Utc>| -> Result<f64, SunPositionError> {
        Ok(provider.angles_at(location, t)?.elevation)
    };

    let noon_el = elevation(noon)?;
    let before = noon - Duration::hours(12);
    let after = noon + Duration::hours(12);
    let (before_el, after_el) = (elevation(before)?, elevation(after)?);

    if noon_el <= 0.0 {
        return Ok(Daylight::PolarNight);
    }
    if before_el > 0.0 && after_el > 0.0 {
        return Ok(Daylight::PolarDay);
    }

    let sunrise = bisect(&elevation, before, noon)?;
    let sunset = bisect(&elevation, noon, after)?;
    Ok(Daylight::Regular { sunrise, sunset })
}

/// Mean sunrise and sunset (UTC) over the analysed days of one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyDaylight {
    pub year: i32,
    pub month: u32,
    /// Days with both a sunrise and a sunset.
    pub regular_days: usize,
    pub polar_days: usize,
    pub polar_nights: usize,
    /// `None` when the month has no regular day.
    pub mean_sunrise: Option<NaiveTime>,
    pub mean_sunset: Option<NaiveTime>,
}

impl fmt::Display for MonthlyDaylight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)?;
        match (self.mean_sunrise, self.mean_sunset) {
            (Some(rise), Some(set)) => write!(
                f,
                " | sunrise {} | sunset {}",
                rise.format("%H:%M"),
                set.format("%H:%M")
            )?,
            _ => write!(f, " | no sunrise")?,
        }
        if self.polar_days + self.polar_nights > 0 {
            write!(
                f,
                " | polar day/night: {}/{}",
                self.polar_days, self.polar_nights
            )?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct MonthAccumulator {
    regular: usize,
    polar_days: usize,
    polar_nights: usize,
    sunrise_seconds: i64,
    sunset_seconds: i64,
}

/// Daylight figures per calendar month for every day in `[first, last]`.
///
/// Sunrise and sunset are averaged as seconds from each day's UTC midnight,
/// so a sunrise that falls on the previous UTC day still averages correctly.
///
/// # Errors
///
/// Propagates provider errors.
pub fn monthly_daylight(
    provider: &dyn SunPositionProvider,
    location: &Coordinate,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<Vec<MonthlyDaylight>, SunPositionError> {
    let mut months: BTreeMap<(i32, u32), MonthAccumulator> = BTreeMap::new();
    for date in first.iter_days().take_while(|d| *d <= last) {
        let acc = months.entry((date.year(), date.month())).or_default();
        match daylight(provider, location, date)? {
            Daylight::Regular { sunrise, sunset } => {
                let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
                acc.regular += 1;
                acc.sunrise_seconds += (sunrise - midnight).num_seconds();
                acc.sunset_seconds += (sunset - midnight).num_seconds();
            }
            Daylight::PolarDay => acc.polar_days += 1,
            Daylight::PolarNight => acc.polar_nights += 1,
        }
    }

    let mean = |total: i64, n: usize| {
        (n > 0)
            .then(|| (total / n as i64).rem_euclid(86_400) as u32)
            .and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, 0))
    };
    Ok(months
        .into_iter()
        .map(|((year, month), acc)| MonthlyDaylight {
            year,
            month,
            regular_days: acc.regular,
            polar_days: acc.polar_days,
            polar_nights: acc.polar_nights,
            mean_sunrise: mean(acc.sunrise_seconds, acc.regular),
            mean_sunset: mean(acc.sunset_seconds, acc.regular),
        })
        .collect())
}

/// Finds the zero crossing of `f` between `lo` and `hi` to one-second precision.
fn bisect(
    f: &dyn Fn(DateTime<Utc>) -> Result<f64, SunPositionError>,
    mut lo: DateTime<Utc>,
    mut hi: DateTime<Utc>,
) -> Result<DateTime<Utc>, SunPositionError> {
    let lo_sign = f(lo)? > 0.0;
    while (hi - lo).num_seconds() > 1 {
        let mid = lo + (hi - lo) / 2;
        if (f(mid)? > 0.0) == lo_sign {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}
