//! Post-hoc glare statistics computed from aggregated periods.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use super::periods::GlarePeriod;
use crate::model::ObserverId;

/// Summary figures for a set of glare periods.
///
/// Computed from `&[GlarePeriod]` after aggregation, so every figure is
/// consistent with the exported periods.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlareSummary {
    /// Sum of period durations (minutes).
    pub total_minutes: f64,
    /// Distinct UTC calendar days on which a period starts.
    pub days_with_glare: usize,
    /// Largest per-day glare total (minutes).
    pub max_daily_minutes: f64,
    /// `total_minutes / days_with_glare`.
    pub mean_daily_minutes: f64,
    /// Highest per-period mean luminance (cd/m²).
    pub max_luminance: f64,
    /// Unweighted mean of the per-period mean luminances (cd/m²); a short
    /// period counts as much as a long one.
    pub mean_luminance: f64,
    /// Highest single-event luminance (cd/m²).
    pub peak_luminance: f64,
    pub period_count: usize,
    pub event_count: usize,
}

impl GlareSummary {
    /// Computes the summary for `periods`.
    ///
    /// # Returns
    ///
    /// An all-zero summary when `periods` is empty.
    pub fn from_periods<'a>(periods: impl IntoIterator<Item = &'a GlarePeriod>) -> Self {
        let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut total_minutes = 0.0;
        let mut max_luminance = 0.0_f64;
        let mut sum_of_means = 0.0;
        let mut peak_luminance = 0.0_f64;
        let mut period_count = 0;
        let mut event_count = 0;

        for p in periods {
            *daily.entry(p.start.date_naive()).or_default() += p.duration_minutes;
            total_minutes += p.duration_minutes;
            max_luminance = max_luminance.max(p.mean_luminance);
            sum_of_means += p.mean_luminance;
            peak_luminance = peak_luminance.max(p.peak_luminance);
            period_count += 1;
            event_count += p.event_count;
        }

        if period_count == 0 {
            return Self::default();
        }

        let days = daily.len();
        Self {
            total_minutes,
            days_with_glare: days,
            max_daily_minutes: daily.values().copied().fold(0.0, f64::max),
            mean_daily_minutes: total_minutes / days as f64,
            max_luminance,
            mean_luminance: sum_of_means / period_count as f64,
            peak_luminance,
            period_count,
            event_count,
        }
    }
}

impl fmt::Display for GlareSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total glare:           {:.0} min", self.total_minutes)?;
        writeln!(f, "Days with glare:       {}", self.days_with_glare)?;
        writeln!(f, "Max daily glare:       {:.0} min", self.max_daily_minutes)?;
        writeln!(f, "Mean daily glare:      {:.1} min", self.mean_daily_minutes)?;
        writeln!(f, "Max period luminance:  {:.4} cd/m²", self.max_luminance)?;
        writeln!(f, "Mean period luminance: {:.4} cd/m²", self.mean_luminance)?;
        writeln!(f, "Peak luminance:        {:.4} cd/m²", self.peak_luminance)?;
        write!(
            f,
            "Periods / events:      {} / {}",
            self.period_count, self.event_count
        )
    }
}

/// Statistics for the whole run and for each observer that saw glare.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlareStatistics {
    pub overall: GlareSummary,
    pub per_observer: BTreeMap<ObserverId, GlareSummary>,
}

impl GlareStatistics {
    pub fn from_periods(periods: &[GlarePeriod]) -> Self {
        let mut grouped: BTreeMap<ObserverId, Vec<&GlarePeriod>> = BTreeMap::new();
        for p in periods {
            grouped.entry(p.observer).or_default().push(p);
        }
        Self {
            overall: GlareSummary::from_periods(periods),
            per_observer: grouped
                .into_iter()
                .map(|(id, ps)| (id, GlareSummary::from_periods(ps)))
                .collect(),
        }
    }

    pub fn for_observer(&self, id: ObserverId) -> Option<&GlareSummary> {
        self.per_observer.get(&id)
    }
}

impl fmt::Display for GlareStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Glare Report ---")?;
        write!(f, "{}", self.overall)?;
        for (id, summary) in &self.per_observer {
            writeln!(f)?;
            writeln!(f, "--- Observer {id} ---")?;
            write!(f, "{summary}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::model::PvAreaId;

    fn period(
        observer: usize,
        day: u32,
        hour: u32,
        minutes: i64,
        count: usize,
        mean: f64,
    ) -> GlarePeriod {
        let start = Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap();
        GlarePeriod {
            observer: ObserverId(observer),
            pv_area: PvAreaId(0),
            start,
            end: start + Duration::minutes(minutes),
            duration_minutes: minutes as f64,
            event_count: count,
            mean_luminance: mean,
            peak_luminance: mean * 2.0,
        }
    }

    #[test]
    fn totals_and_daily_figures() {
        // day 1: 20 + 30 = 50 min, day 2: 10 min
        let periods = vec![
            period(0, 1, 10, 20, 2, 0.1),
            period(0, 1, 14, 30, 3, 0.2),
            period(0, 2, 10, 10, 1, 0.4),
        ];
        let s = GlareSummary::from_periods(&periods);
        assert_eq!(s.total_minutes, 60.0);
        assert_eq!(s.days_with_glare, 2);
        assert_eq!(s.max_daily_minutes, 50.0);
        assert_eq!(s.mean_daily_minutes, 30.0);
        assert!((s.max_luminance - 0.4).abs() < 1e-12);
        // (0.1 + 0.2 + 0.4) / 3, regardless of event counts
        assert!((s.mean_luminance - 0.7 / 3.0).abs() < 1e-12);
        assert!((s.peak_luminance - 0.8).abs() < 1e-12);
        assert_eq!(s.period_count, 3);
        assert_eq!(s.event_count, 6);
    }

    #[test]
    fn empty_periods_give_zero_summary() {
        let none: [GlarePeriod; 0] = [];
        let s = GlareSummary::from_periods(&none);
        assert_eq!(s, GlareSummary::default());
        assert_eq!(s.total_minutes, 0.0);
    }

    #[test]
    fn per_observer_breakdown() {
        let periods = vec![
            period(0, 1, 10, 20, 2, 0.1),
            period(1, 1, 11, 10, 1, 0.3),
            period(1, 3, 11, 10, 1, 0.3),
        ];
        let stats = GlareStatistics::from_periods(&periods);
        assert_eq!(stats.overall.period_count, 3);
        assert_eq!(stats.per_observer.len(), 2);
        let op2 = stats.for_observer(ObserverId(1)).expect("observer 2");
        assert_eq!(op2.days_with_glare, 2);
        assert_eq!(op2.total_minutes, 20.0);
        assert!(stats.for_observer(ObserverId(5)).is_none());
    }

    #[test]
    fn display_contains_sections() {
        let stats = GlareStatistics::from_periods(&[period(0, 1, 10, 20, 2, 0.1)]);
        let s = format!("{stats}");
        assert!(s.contains("Glare Report"));
        assert!(s.contains("Observer 1"));
    }
}
