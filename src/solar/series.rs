//! Lazily generated sun-position series.
//!
//! A [`SunSeries`] walks the requested range one step at a time, so memory
//! stays flat even for a full year at one-minute resolution. Callers that
//! want batches use [`SunSeries::chunks`].

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Utc};

use super::clearsky::{DEFAULT_LINKE_TURBIDITY, ineichen_perez};
use super::{SunPosition, SunPositionProvider};
use crate::error::SunPositionError;
use crate::model::{Coordinate, TimeRange};
use crate::sim::clock::Clock;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parameters of one sun-position series.
#[derive(Debug, Clone)]
pub struct SunSeriesRequest {
    pub location: Coordinate,
    /// First instant (inclusive).
    pub start: DateTime<FixedOffset>,
    /// Last instant (exclusive).
    pub end: DateTime<FixedOffset>,
    pub resolution_minutes: u32,
    /// Positions with a lower apparent elevation are skipped.
    pub min_elevation: Option<f64>,
    /// Linke turbidity for clear-sky irradiance; `None` skips irradiance.
    pub linke_turbidity: Option<f64>,
}

impl SunSeriesRequest {
    pub fn new(
        location: Coordinate,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        resolution_minutes: u32,
    ) -> Self {
        Self {
            location,
            start,
            end,
            resolution_minutes,
            min_elevation: None,
            linke_turbidity: None,
        }
    }

    /// Series covering calendar year `year` in UTC.
    ///
    /// # Errors
    ///
    /// Returns [`SunPositionError::InvalidRange`] for years chrono cannot represent.
    pub fn for_year(
        location: Coordinate,
        year: i32,
        resolution_minutes: u32,
    ) -> Result<Self, SunPositionError> {
        let range = TimeRange::calendar_year(year).ok_or(SunPositionError::InvalidRange)?;
        Ok(Self::for_range(location, &range, resolution_minutes))
    }

    pub fn for_range(location: Coordinate, range: &TimeRange, resolution_minutes: u32) -> Self {
        Self::new(location, range.start, range.end, resolution_minutes)
    }

    pub fn with_min_elevation(mut self, min_elevation: f64) -> Self {
        self.min_elevation = Some(min_elevation);
        self
    }

    pub fn with_clear_sky(mut self, linke_turbidity: f64) -> Self {
        self.linke_turbidity = Some(linke_turbidity);
        self
    }

    pub fn with_default_clear_sky(self) -> Self {
        self.with_clear_sky(DEFAULT_LINKE_TURBIDITY)
    }

    /// Parses RFC 3339 bounds, rejecting timestamps without an offset.
    ///
    /// # Errors
    ///
    /// * [`SunPositionError::MissingTimezone`] - a bound parses only as a naive timestamp
    /// * [`SunPositionError::InvalidTimestamp`] - a bound does not parse at all
    pub fn parse_bounds(
        start: &str,
        end: &str,
    ) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), SunPositionError> {
        Ok((parse_instant(start)?, parse_instant(end)?))
    }

    /// Checks range ordering and resolution bounds.
    ///
    /// # Errors
    ///
    /// * [`SunPositionError::InvalidRange`] - `end <= start`
    /// * [`SunPositionError::InvalidResolution`] - resolution outside `1..=60`
    pub fn validate(&self) -> Result<(), SunPositionError> {
        if self.end <= self.start {
            return Err(SunPositionError::InvalidRange);
        }
        if !(1..=60).contains(&self.resolution_minutes) {
            return Err(SunPositionError::InvalidResolution(self.resolution_minutes));
        }
        Ok(())
    }
}

fn parse_instant(s: &str) -> Result<DateTime<FixedOffset>, SunPositionError> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t);
    }
    if NAIVE_FORMATS
        .iter()
        .any(|f| NaiveDateTime::parse_from_str(s, f).is_ok())
    {
        return Err(SunPositionError::MissingTimezone(s.to_string()));
    }
    Err(SunPositionError::InvalidTimestamp(s.to_string()))
}

/// Validates `request` and returns a lazy iterator over its sun positions.
///
/// # Errors
///
/// Returns the error from [`SunSeriesRequest::validate`].
pub fn sun_series<'a>(
    provider: &'a dyn SunPositionProvider,
    request: &SunSeriesRequest,
) -> Result<SunSeries<'a>, SunPositionError> {
    request.validate()?;
    Ok(SunSeries {
        provider,
        location: request.location,
        clock: Clock::new(
            request.start.with_timezone(&Utc),
            request.end.with_timezone(&Utc),
            request.resolution_minutes,
        ),
        min_elevation: request.min_elevation,
        linke_turbidity: request.linke_turbidity,
    })
}

/// Iterator over the sun positions of one request.
pub struct SunSeries<'a> {
    provider: &'a dyn SunPositionProvider,
    location: Coordinate,
    clock: Clock,
    min_elevation: Option<f64>,
    linke_turbidity: Option<f64>,
}

impl SunSeries<'_> {
    /// Groups the series into batches of at most `size` positions.
    pub fn chunks(self, size: usize) -> SunChunks<Self> {
        SunChunks {
            inner: self,
            size: size.max(1),
        }
    }
}

impl Iterator for SunSeries<'_> {
    type Item = Result<SunPosition, SunPositionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let t = self.clock.tick()?;
            let angles = match self.provider.angles_at(&self.location, t) {
                Ok(a) => a,
                Err(e) => return Some(Err(e)),
            };
            if self.min_elevation.is_some_and(|min| angles.elevation < min) {
                continue;
            }
            let clear_sky = self.linke_turbidity.map(|tl| {
                ineichen_perez(angles.elevation, self.location.ground_elevation, t.ordinal(), tl)
            });
            return Some(Ok(SunPosition {
                timestamp: t,
                azimuth: angles.azimuth,
                elevation: angles.elevation,
                zenith: angles.zenith,
                clear_sky,
            }));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.clock.remaining()))
    }
}

/// Batching adaptor returned by [`SunSeries::chunks`].
pub struct SunChunks<I> {
    inner: I,
    size: usize,
}

impl<I> Iterator for SunChunks<I>
where
    I: Iterator<Item = Result<SunPosition, SunPositionError>>,
{
    type Item = Result<Vec<SunPosition>, SunPositionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::with_capacity(self.size);
        for item in self.inner.by_ref() {
            match item {
                Ok(pos) => {
                    batch.push(pos);
                    if batch.len() == self.size {
                        break;
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
        if batch.is_empty() { None } else { Some(Ok(batch)) }
    }
}
