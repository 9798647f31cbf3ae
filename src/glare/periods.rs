//! Merges glare events into continuous glare periods.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::detector::GlareEvent;
use crate::model::{ObserverId, PvAreaId};

/// Continuous glare at one observer from one PV area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlarePeriod {
    pub observer: ObserverId,
    pub pv_area: PvAreaId,
    pub start: DateTime<Utc>,
    /// Exclusive end: last event plus one resolution step.
    pub end: DateTime<Utc>,
    /// `end - start` in minutes.
    pub duration_minutes: f64,
    pub event_count: usize,
    pub mean_luminance: f64,
    pub peak_luminance: f64,
}

impl fmt::Display for GlarePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OP{} <- PV{} | {} .. {} | {:>6.1} min | n={:>3} | mean={:.4} peak={:.4} cd/m²",
            self.observer,
            self.pv_area,
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%H:%M"),
            self.duration_minutes,
            self.event_count,
            self.mean_luminance,
            self.peak_luminance,
        )
    }
}

/// Period under construction.
#[derive(Debug, Clone, Copy)]
struct OpenPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    count: usize,
    luminance_sum: f64,
    peak: f64,
}

enum State {
    NoPeriod,
    InPeriod(OpenPeriod),
}

/// Groups events per (observer, PV area) and splits each group on gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodAggregator {
    gap_threshold: Duration,
    resolution: Duration,
}

impl PeriodAggregator {
    /// # Arguments
    ///
    /// * `gap_threshold_minutes` - Largest gap that still continues a period
    /// * `resolution_minutes` - Time covered by a single event
    pub fn new(gap_threshold_minutes: u32, resolution_minutes: u32) -> Self {
        Self {
            gap_threshold: Duration::minutes(i64::from(gap_threshold_minutes)),
            resolution: Duration::minutes(i64::from(resolution_minutes)),
        }
    }

    /// Aggregates `events` into periods ordered by (observer, PV area, start).
    ///
    /// Input order does not matter. The gap between an event and the open
    /// period is measured from the period's exclusive end, so events exactly
    /// one resolution step apart always merge.
    pub fn aggregate(&self, events: &[GlareEvent]) -> Vec<GlarePeriod> {
        let mut order: Vec<&GlareEvent> = events.iter().collect();
        order.sort_by_key(|e| (e.observer, e.pv_area, e.timestamp));

        let mut periods = Vec::new();
        let mut state = State::NoPeriod;
        let mut key: Option<(ObserverId, PvAreaId)> = None;

        for event in order {
            let event_key = (event.observer, event.pv_area);
            if key != Some(event_key) {
                if let (State::InPeriod(open), Some((observer, pv_area))) = (&state, key) {
                    periods.push(close(observer, pv_area, open));
                }
                state = State::NoPeriod;
                key = Some(event_key);
            }

            state = match state {
                State::NoPeriod => State::InPeriod(self.open(event)),
                State::InPeriod(mut open) => {
                    if event.timestamp - open.end <= self.gap_threshold {
                        open.end = open.end.max(event.timestamp + self.resolution);
                        open.count += 1;
                        open.luminance_sum += event.luminance;
                        open.peak = open.peak.max(event.luminance);
                        State::InPeriod(open)
                    } else {
                        periods.push(close(event_key.0, event_key.1, &open));
                        State::InPeriod(self.open(event))
                    }
                }
            };
        }

        if let (State::InPeriod(open), Some((observer, pv_area))) = (&state, key) {
            periods.push(close(observer, pv_area, open));
        }
        periods
    }

    fn open(&self, event: &GlareEvent) -> OpenPeriod {
        OpenPeriod {
            start: event.timestamp,
            end: event.timestamp + self.resolution,
            count: 1,
            luminance_sum: event.luminance,
            peak: event.luminance,
        }
    }
}

fn close(observer: ObserverId, pv_area: PvAreaId, open: &OpenPeriod) -> GlarePeriod {
    GlarePeriod {
        observer,
        pv_area,
        start: open.start,
        end: open.end,
        duration_minutes: (open.end - open.start).num_seconds() as f64 / 60.0,
        event_count: open.count,
        mean_luminance: open.luminance_sum / open.count as f64,
        peak_luminance: open.peak,
    }
}
