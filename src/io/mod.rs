//! File formats at the edge of the pipeline.

/// Events and periods CSV, JSON summary.
pub mod export;
/// Reflection-profile CSV in wide or long layout.
pub mod profiles;

pub use export::{
    SummaryDocument, export_events_csv, export_periods_csv, export_summary_json, write_events_csv,
    write_periods_csv, write_summary_json,
};
pub use profiles::{ProfileLayout, load_profiles, read_profiles};
