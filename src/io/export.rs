//! CSV and JSON export of analysis results.
//!
//! Observer and PV-area ids are written 1-based, alongside the names from
//! the project, so rows line up with the input order a user sees.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::glare::{GlareEvent, GlarePeriod, GlareSummary};
use crate::model::{ObserverId, Project, ProjectMetadata, PvAreaId};
use crate::sim::AnalysisReport;
use crate::solar::Accuracy;
use crate::solar::events::MonthlyDaylight;

/// Column header of the events CSV.
pub const EVENTS_HEADER: &str = "timestamp,observer_id,observer_name,pv_area,\
                                 sun_azimuth,sun_elevation,reflection_azimuth,\
                                 reflection_elevation,incidence_angle,irradiance,luminance";

/// Column header of the periods CSV.
pub const PERIODS_HEADER: &str = "observer_id,observer_name,pv_area,start,end,\
                                  duration_minutes,event_count,mean_luminance,peak_luminance";

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn observer_name(project: &Project, id: ObserverId) -> &str {
    project.observer(id).map_or("", |o| o.name.as_str())
}

fn pv_area_name(project: &Project, id: PvAreaId) -> &str {
    project.pv_area(id).map_or("", |a| a.name.as_str())
}

/// Exports glare events to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_events_csv<'a>(
    events: impl IntoIterator<Item = &'a GlareEvent>,
    project: &Project,
    path: &Path,
) -> io::Result<()> {
    let file = File::create(path)?;
    write_events_csv(events, project, io::BufWriter::new(file))
}

/// Writes glare events as CSV to any writer, one row per event in
/// iteration order. Pass [`AnalysisReport::events_for_observer`] to export
/// a single observer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_events_csv<'a>(
    events: impl IntoIterator<Item = &'a GlareEvent>,
    project: &Project,
    writer: impl Write,
) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(EVENTS_HEADER.split(',').map(str::trim))?;

    for e in events {
        wtr.write_record(&[
            timestamp(&e.timestamp),
            e.observer.to_string(),
            observer_name(project, e.observer).to_string(),
            pv_area_name(project, e.pv_area).to_string(),
            format!("{:.4}", e.sun_azimuth),
            format!("{:.4}", e.sun_elevation),
            format!("{:.4}", e.reflection_azimuth),
            format!("{:.4}", e.reflection_elevation),
            format!("{:.4}", e.incidence_angle),
            format!("{:.2}", e.irradiance),
            format!("{:.6}", e.luminance),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports glare periods to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_periods_csv<'a>(
    periods: impl IntoIterator<Item = &'a GlarePeriod>,
    project: &Project,
    path: &Path,
) -> io::Result<()> {
    let file = File::create(path)?;
    write_periods_csv(periods, project, io::BufWriter::new(file))
}

/// Writes glare periods as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_periods_csv<'a>(
    periods: impl IntoIterator<Item = &'a GlarePeriod>,
    project: &Project,
    writer: impl Write,
) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(PERIODS_HEADER.split(',').map(str::trim))?;

    for p in periods {
        wtr.write_record(&[
            p.observer.to_string(),
            observer_name(project, p.observer).to_string(),
            pv_area_name(project, p.pv_area).to_string(),
            timestamp(&p.start),
            timestamp(&p.end),
            format!("{:.1}", p.duration_minutes),
            p.event_count.to_string(),
            format!("{:.6}", p.mean_luminance),
            format!("{:.6}", p.peak_luminance),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Per-observer entry of [`SummaryDocument`].
#[derive(Debug, Serialize)]
pub struct ObserverSummary<'a> {
    pub observer_id: usize,
    pub name: &'a str,
    pub summary: GlareSummary,
}

/// JSON statistics summary of one run.
///
/// Every observer of the project is listed; observers without glare carry
/// an all-zero summary.
#[derive(Debug, Serialize)]
pub struct SummaryDocument<'a> {
    pub metadata: &'a ProjectMetadata,
    pub provider: &'static str,
    pub accuracy: Accuracy,
    pub year: i32,
    pub start: String,
    pub end: String,
    pub resolution_minutes: u32,
    pub timesteps: usize,
    pub overall: &'a GlareSummary,
    pub observers: Vec<ObserverSummary<'a>>,
    pub daylight: &'a [MonthlyDaylight],
}

impl<'a> SummaryDocument<'a> {
    pub fn new(report: &'a AnalysisReport, project: &'a Project) -> Self {
        let observers = project
            .observers
            .iter()
            .map(|o| ObserverSummary {
                observer_id: o.id.0 + 1,
                name: &o.name,
                summary: report
                    .statistics
                    .for_observer(o.id)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        Self {
            metadata: &project.metadata,
            provider: report.provider,
            accuracy: report.accuracy,
            year: report.year,
            start: timestamp(&report.start),
            end: timestamp(&report.end),
            resolution_minutes: report.resolution_minutes,
            timesteps: report.timesteps,
            overall: &report.statistics.overall,
            observers,
            daylight: &report.daylight,
        }
    }
}

/// Exports the JSON summary to a file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation, serialization or writing fails.
pub fn export_summary_json(
    report: &AnalysisReport,
    project: &Project,
    path: &Path,
) -> io::Result<()> {
    let file = File::create(path)?;
    write_summary_json(report, project, io::BufWriter::new(file))
}

/// Writes the pretty-printed JSON summary to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if serialization or writing fails.
pub fn write_summary_json(
    report: &AnalysisReport,
    project: &Project,
    mut writer: impl Write,
) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, &SummaryDocument::new(report, project))?;
    writeln!(writer)?;
    writer.flush()
}
