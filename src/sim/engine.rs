//! Analysis engine that wires sun positions, reflection, lattices and the
//! hit test together and owns the worker pool.
//!
//! Sun positions are streamed in chunks of `detector.chunk_size`. Each chunk
//! is reflected off every PV area and handed to every unit before the next
//! chunk is generated, so peak memory follows the chunk size rather than the
//! length of the analysis window.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::{GlareError, SunPositionError};
use crate::glare::{
    AngularGrid, AngularGridBuilder, GlareDetector, GlareEvent, GlarePeriod, GlareStatistics,
    PeriodAggregator, ReflectionSeries,
};
use crate::model::{Coordinate, ObserverId, Project, PvAreaId, TimeRange};
use crate::optics::profile::ProfileRegistry;
use crate::solar::events::{MonthlyDaylight, monthly_daylight};
use crate::solar::{Accuracy, SunSeriesRequest, select_provider, sun_series};

/// Shared flag that stops a run before its next chunk or unit starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Events ordered by (observer, PV area, timestamp).
    pub events: Vec<GlareEvent>,
    pub periods: Vec<GlarePeriod>,
    pub statistics: GlareStatistics,
    /// Accuracy class of the sun-position provider used.
    pub accuracy: Accuracy,
    pub provider: &'static str,
    /// UTC year of the window start.
    pub year: i32,
    pub start: DateTime<Utc>,
    /// Exclusive.
    pub end: DateTime<Utc>,
    pub resolution_minutes: u32,
    /// Sun positions above the elevation threshold in the reference series.
    pub timesteps: usize,
    /// Monthly sunrise/sunset at the reference observer.
    pub daylight: Vec<MonthlyDaylight>,
}

impl AnalysisReport {
    pub fn events_for_observer(&self, id: ObserverId) -> impl Iterator<Item = &GlareEvent> + '_ {
        self.events.iter().filter(move |e| e.observer == id)
    }

    pub fn periods_for_observer(&self, id: ObserverId) -> impl Iterator<Item = &GlarePeriod> + '_ {
        self.periods.iter().filter(move |p| p.observer == id)
    }
}

type Unit = (ObserverId, PvAreaId);

/// Maps work items either on a rayon pool or on the calling thread.
struct Workers {
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl Workers {
    fn serial() -> Self {
        Self {
            #[cfg(feature = "parallel")]
            pool: None,
        }
    }

    /// Applies `f` to every item, keeping input order in the output.
    fn map<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>, GlareError>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> Result<T, GlareError> + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            if let Some(pool) = &self.pool {
                return pool.install(|| items.par_iter().map(&f).collect());
            }
        }
        items.iter().map(f).collect()
    }
}

/// Runs the full pipeline for one project.
pub struct AnalysisEngine {
    project: Project,
    config: AnalysisConfig,
    registry: ProfileRegistry,
    cancel: CancellationToken,
}

impl AnalysisEngine {
    /// # Arguments
    ///
    /// * `project` - Validated project
    /// * `config` - Analysis configuration
    /// * `registry` - Reflection profiles, one per module type in use
    pub fn new(project: Project, config: AnalysisConfig, registry: ProfileRegistry) -> Self {
        Self {
            project,
            config,
            registry,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analysis window: the project's explicit range, else the configured
    /// (or current) UTC calendar year.
    ///
    /// # Errors
    ///
    /// Returns [`SunPositionError::InvalidRange`] for an unrepresentable year.
    pub fn window(&self) -> Result<TimeRange, SunPositionError> {
        if let Some(range) = self.project.parameters.time_range {
            return Ok(range);
        }
        let year = self.config.analysis.year.unwrap_or_else(|| Utc::now().year());
        TimeRange::calendar_year(year).ok_or(SunPositionError::InvalidRange)
    }

    /// Executes the analysis.
    ///
    /// # Errors
    ///
    /// * [`GlareError::Config`] - the configuration fails validation
    /// * [`GlareError::Cancelled`] - the token was cancelled before all units ran
    /// * any sun-position, geometry or profile error raised by a unit
    pub fn run(&self) -> Result<AnalysisReport, GlareError> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            return Err(GlareError::Config(errors));
        }
        for area in &self.project.pv_areas {
            self.registry.get(area.module_type)?;
        }

        let provider = select_provider(self.config.sun.precision);
        let window = self.window()?;
        let (start, end) = (window.start.with_timezone(&Utc), window.end.with_timezone(&Utc));
        let resolution = self.project.parameters.resolution.minutes();
        info!(
            provider = provider.name(),
            accuracy = ?provider.accuracy(),
            start = %start,
            end = %end,
            resolution_minutes = resolution,
            observers = self.project.observers.len(),
            pv_areas = self.project.pv_areas.len(),
            "analysis started"
        );

        let per_observer_sun = self.config.analysis.per_observer_sun;
        let sun_locations: Vec<Coordinate> = if per_observer_sun {
            self.project.observers.iter().map(|o| o.location).collect()
        } else {
            self.project
                .observers
                .first()
                .map(|o| o.location)
                .into_iter()
                .collect()
        };

        let units: Vec<Unit> = self
            .project
            .observers
            .iter()
            .flat_map(|o| self.project.pv_areas.iter().map(move |a| (o.id, a.id)))
            .collect();
        let workers = self.workers();
        let builder = AngularGridBuilder::from_parameters(&self.project.parameters);
        let grids = workers.map(&units, |&unit| self.build_grid(&builder, unit))?;
        info!(units = units.len(), "angular grids built");

        let detector = GlareDetector::new(
            &self.registry,
            self.config
                .detector
                .settings(self.project.parameters.intensity_threshold),
        );
        let chunk_size = self.config.detector.chunk_size;
        let mut per_unit: Vec<Vec<GlareEvent>> = vec![Vec::new(); units.len()];
        let mut timesteps = 0;

        for (s, location) in sun_locations.iter().enumerate() {
            let members: Vec<usize> = (0..units.len())
                .filter(|&u| !per_observer_sun || units[u].0.0 == s)
                .collect();
            let mut request = SunSeriesRequest::for_range(*location, &window, resolution)
                .with_min_elevation(self.project.parameters.sun_elevation_threshold);
            if self.config.sun.clear_sky {
                request = request.with_clear_sky(self.config.sun.linke_turbidity);
            }

            let mut positions = 0;
            for chunk in sun_series(provider.as_ref(), &request)?.chunks(chunk_size) {
                if self.cancel.is_cancelled() {
                    return Err(GlareError::Cancelled);
                }
                let chunk = chunk?;
                positions += chunk.len();
                let reflections = self
                    .project
                    .pv_areas
                    .iter()
                    .map(|area| {
                        ReflectionSeries::compute(&chunk, area, self.config.detector.default_dni)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let found = workers.map(&members, |&u| {
                    self.detect_unit(&detector, &grids[u], &reflections)
                })?;
                for (&u, events) in members.iter().zip(found) {
                    per_unit[u].extend(events);
                }
            }
            if s == 0 {
                timesteps = positions;
            }
            debug!(series = s, positions, "sun series processed");
        }

        let events: Vec<GlareEvent> = per_unit.into_iter().flatten().collect();
        let periods = PeriodAggregator::new(self.config.analysis.gap_threshold_minutes, resolution)
            .aggregate(&events);
        let statistics = GlareStatistics::from_periods(&periods);

        let daylight = match sun_locations.first() {
            Some(location) => monthly_daylight(
                provider.as_ref(),
                location,
                start.date_naive(),
                (end - Duration::seconds(1)).date_naive(),
            )?,
            None => Vec::new(),
        };
        info!(
            events = events.len(),
            periods = periods.len(),
            total_minutes = statistics.overall.total_minutes,
            "analysis finished"
        );

        Ok(AnalysisReport {
            events,
            periods,
            statistics,
            accuracy: provider.accuracy(),
            provider: provider.name(),
            year: start.year(),
            start,
            end,
            resolution_minutes: resolution,
            timesteps,
            daylight,
        })
    }

    fn build_grid(
        &self,
        builder: &AngularGridBuilder,
        (observer_id, pv_id): Unit,
    ) -> Result<AngularGrid, GlareError> {
        if self.cancel.is_cancelled() {
            return Err(GlareError::Cancelled);
        }
        let (Some(observer), Some(area)) =
            (self.project.observer(observer_id), self.project.pv_area(pv_id))
        else {
            return Ok(AngularGrid {
                observer: observer_id,
                pv_area: pv_id,
                threshold: 0.0,
                points: Vec::new(),
            });
        };
        Ok(builder.build(observer, area)?)
    }

    fn detect_unit(
        &self,
        detector: &GlareDetector<'_>,
        grid: &AngularGrid,
        reflections: &[ReflectionSeries],
    ) -> Result<Vec<GlareEvent>, GlareError> {
        if self.cancel.is_cancelled() {
            return Err(GlareError::Cancelled);
        }
        let (Some(area), Some(series)) = (
            self.project.pv_area(grid.pv_area),
            reflections.get(grid.pv_area.0),
        ) else {
            return Ok(Vec::new());
        };
        detector.detect(area, series, grid)
    }

    /// Worker pool for this run; serial when parallelism is off or the pool
    /// cannot be built.
    fn workers(&self) -> Workers {
        if !self.config.execution.parallel {
            return Workers::serial();
        }
        #[cfg(feature = "parallel")]
        {
            let workers = self.worker_count();
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => {
                    debug!(workers, "parallel execution");
                    Workers { pool: Some(pool) }
                }
                Err(e) => {
                    warn!(error = %e, "cannot build worker pool; running serially");
                    Workers::serial()
                }
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            warn!("parallel execution not compiled in (feature `parallel`); running serially");
            Workers::serial()
        }
    }

    /// Pool size: available parallelism, capped by `max_workers`.
    pub fn worker_count(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.config
            .execution
            .max_workers
            .map_or(available, |m| m.clamp(1, available))
    }
}
