mod common;

use chrono::Datelike;

use glare_sim::config::AnalysisConfig;
use glare_sim::error::ErrorKind;
use glare_sim::model::{ObserverId, Project};
use glare_sim::optics::{Interpolation, ProfileRegistry};
use glare_sim::sim::{AnalysisEngine, AnalysisReport};
use glare_sim::solar::events::solar_noon;

fn run(project: Project, config: AnalysisConfig) -> AnalysisReport {
    AnalysisEngine::new(project, config, ProfileRegistry::builtin(Interpolation::Linear))
        .run()
        .expect("analysis should succeed")
}

#[test]
fn south_area_glares_around_summer_noon() {
    let report = run(common::south_project(), common::fast_config());

    assert!(!report.events.is_empty(), "expected glare from the south area");
    assert!(
        report.events.iter().any(|e| e.timestamp.month() == 6),
        "expected glare in June"
    );
    for e in &report.events {
        assert!(
            (4..=9).contains(&e.timestamp.month()),
            "unexpected glare on {}",
            e.timestamp
        );
        let noon = solar_noon(common::ORIGIN.1, e.timestamp.date_naive());
        assert!(
            (e.timestamp - noon).num_minutes().abs() <= 180,
            "glare at {} too far from solar noon {noon}",
            e.timestamp
        );
        assert!(e.incidence_angle < 89.0);
        assert!(e.luminance >= 0.01);
    }
    assert!(
        !report.events.iter().any(|e| e.timestamp.month() == 12),
        "no glare expected in December"
    );
}

#[test]
fn north_area_never_glares() {
    let project = common::project(
        vec![common::flat_square(0, 5.0)],
        vec![common::raised_observer(0)],
    );
    let report = run(project, common::fast_config());
    assert!(report.events.is_empty());
    assert!(report.periods.is_empty());
    assert_eq!(report.statistics.overall.total_minutes, 0.0);
}

#[test]
fn statistics_agree_with_periods() {
    let report = run(common::south_project(), common::fast_config());
    let total: f64 = report.periods.iter().map(|p| p.duration_minutes).sum();
    let events: usize = report.periods.iter().map(|p| p.event_count).sum();

    assert!((report.statistics.overall.total_minutes - total).abs() < 1e-9);
    assert_eq!(events, report.events.len());
    assert_eq!(report.statistics.overall.period_count, report.periods.len());
    assert!(report.statistics.for_observer(ObserverId(0)).is_some());
}

#[test]
fn detection_is_idempotent() {
    let first = run(common::south_project(), common::fast_config());
    let second = run(common::south_project(), common::fast_config());
    assert_eq!(first.events, second.events);
    assert_eq!(first.periods, second.periods);
}

#[test]
fn observers_are_analysed_independently() {
    let mut far = common::raised_observer(1);
    far.location = common::offset(0.0, 200.0).with_elevation(common::GROUND, 10.0);
    let project = common::project(
        vec![common::flat_square(0, -5.0)],
        vec![common::raised_observer(0), far],
    );
    let report = run(project, common::fast_config());

    assert!(report.events_for_observer(ObserverId(0)).count() > 0);
    assert_eq!(report.events_for_observer(ObserverId(1)).count(), 0);
}

#[cfg(feature = "spa")]
#[test]
fn precise_provider_agrees_on_summer_glare() {
    let mut cfg = AnalysisConfig::standard();
    cfg.analysis.year = Some(2025);
    cfg.execution.parallel = false;
    let report = run(common::south_project(), cfg);

    assert_eq!(report.provider, "spa");
    assert!(report.events.iter().any(|e| e.timestamp.month() == 6));
    assert!(!report.events.iter().any(|e| e.timestamp.month() == 12));
}

#[test]
fn tilted_area_glares_only_when_facing_the_sun() {
    for tilt in [10.0, 15.0, 20.0] {
        let mut facing_south = common::flat_square(0, -5.0);
        facing_south.tilt = tilt;
        let mut facing_north = facing_south.clone();
        facing_north.azimuth = 0.0;

        let south = run(
            common::project(vec![facing_south], vec![common::raised_observer(0)]),
            common::fast_config(),
        );
        let north = run(
            common::project(vec![facing_north], vec![common::raised_observer(0)]),
            common::fast_config(),
        );

        assert!(!south.events.is_empty(), "tilt {tilt}: south-facing area should glare");
        assert!(north.events.is_empty(), "tilt {tilt}: north-facing area should not glare");
    }
}

#[test]
fn fine_grid_width_is_rejected_before_allocating() {
    let mut project = common::south_project();
    project.parameters.grid_width = 0.02;
    let err = AnalysisEngine::new(
        project,
        common::fast_config(),
        ProfileRegistry::builtin(Interpolation::Linear),
    )
    .run()
    .expect_err("lattice should exceed the point limit");
    assert_eq!(err.kind(), ErrorKind::Geometry);
    assert!(err.to_string().contains("grid_width"), "{err}");
}

#[test]
fn report_carries_window_and_daylight() {
    let report = run(common::south_project(), common::fast_config());
    assert_eq!(report.year, 2025);
    assert_eq!(report.start.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    assert_eq!(report.end.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    assert_eq!(report.daylight.len(), 12);
}
