//! Reflection-profile CSV loader.
//!
//! Two layouts are accepted and told apart by the header row:
//!
//! * wide: `Incident Angle,Module Type 0,Module Type 1,...` with
//!   coefficients already in `[0, 1]`
//! * long: `IA,Value,ModuleType` with raw values that are normalized by the
//!   per-type maximum

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::info;

use crate::error::{GlareError, ProfileError};
use crate::optics::{Interpolation, ProfileRegistry};

const WIDE_ANGLE_COLUMN: &str = "Incident Angle";
const WIDE_TYPE_PREFIX: &str = "Module Type ";

/// Column layout of a profile CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLayout {
    /// Angle column plus one coefficient column per module type.
    Wide { module_types: Vec<u8> },
    /// One `(angle, raw value, module type)` triple per row, columns in any order.
    Long { angle: usize, value: usize, module_type: usize },
}

impl ProfileLayout {
    /// # Errors
    ///
    /// Returns [`ProfileError::UnknownLayout`] if the header matches neither layout.
    pub fn detect(headers: &StringRecord) -> Result<Self, ProfileError> {
        let unknown = || ProfileError::UnknownLayout(headers.iter().collect::<Vec<_>>().join(","));
        let position = |name: &str| headers.iter().position(|h| h == name);

        if let (Some(angle), Some(value), Some(module_type)) =
            (position("IA"), position("Value"), position("ModuleType"))
        {
            return Ok(Self::Long {
                angle,
                value,
                module_type,
            });
        }

        let mut fields = headers.iter();
        if !fields
            .next()
            .is_some_and(|h| h.eq_ignore_ascii_case(WIDE_ANGLE_COLUMN))
        {
            return Err(unknown());
        }
        let module_types = fields
            .map(|h| {
                h.strip_prefix(WIDE_TYPE_PREFIX)
                    .and_then(|n| n.trim().parse::<u8>().ok())
                    .ok_or_else(unknown)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if module_types.is_empty() {
            return Err(unknown());
        }
        Ok(Self::Wide { module_types })
    }
}

/// Loads a profile registry from a CSV file.
///
/// # Errors
///
/// Returns [`GlareError::Io`] if the file cannot be opened, otherwise the
/// errors of [`read_profiles`].
pub fn load_profiles(
    path: &Path,
    interpolation: Interpolation,
) -> Result<ProfileRegistry, GlareError> {
    let registry = read_profiles(File::open(path)?, interpolation)?;
    info!(
        path = %path.display(),
        module_types = registry.len(),
        "loaded reflection profiles"
    );
    Ok(registry)
}

/// Reads a profile registry from CSV text in either layout.
///
/// # Errors
///
/// Returns [`ProfileError::UnknownLayout`] for an unrecognized header,
/// [`ProfileError::MalformedRow`] for a row with missing or non-numeric
/// cells, and [`GlareError::Csv`] if the CSV itself cannot be read.
pub fn read_profiles(
    reader: impl Read,
    interpolation: Interpolation,
) -> Result<ProfileRegistry, GlareError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let layout = ProfileLayout::detect(rdr.headers()?)?;

    let mut records = Vec::new();
    for record in rdr.records() {
        records.push(record?);
    }
    // data rows start on line 2
    let numbered = records.iter().enumerate().map(|(i, r)| (i + 2, r));

    let registry = match layout {
        ProfileLayout::Wide { module_types } => {
            let width = module_types.len() + 1;
            let mut angles = Vec::with_capacity(records.len());
            let mut columns: Vec<(u8, Vec<f64>)> = module_types
                .iter()
                .map(|&t| (t, Vec::with_capacity(records.len())))
                .collect();
            for (row, record) in numbered {
                if record.len() != width {
                    let detail = format!("expected {width} cells, got {}", record.len());
                    return Err(malformed(row, detail).into());
                }
                angles.push(number(record, 0, row)?);
                for (k, (_, values)) in columns.iter_mut().enumerate() {
                    values.push(number(record, k + 1, row)?);
                }
            }
            ProfileRegistry::from_wide_table(&angles, &columns, interpolation)?
        }
        ProfileLayout::Long {
            angle,
            value,
            module_type,
        } => {
            let mut rows = Vec::with_capacity(records.len());
            for (row, record) in numbered {
                let t = record
                    .get(module_type)
                    .and_then(|s| s.parse::<u8>().ok())
                    .ok_or_else(|| malformed(row, "ModuleType must be an integer in 0..=255"))?;
                rows.push((number(record, angle, row)?, number(record, value, row)?, t));
            }
            ProfileRegistry::from_long_rows(&rows, interpolation)?
        }
    };
    Ok(registry)
}

fn malformed(row: usize, message: impl Into<String>) -> ProfileError {
    ProfileError::MalformedRow {
        row,
        message: message.into(),
    }
}

fn number(record: &StringRecord, index: usize, row: usize) -> Result<f64, ProfileError> {
    let cell = record.get(index).unwrap_or("");
    cell.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| malformed(row, format!("column {} is not a number: \"{cell}\"", index + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDE: &str = "Incident Angle,Module Type 0,Module Type 1,Module Type 2\n\
                        0,0.04,0.02,0.03\n\
                        45,0.05,0.03,0.04\n\
                        90,1.0,1.0,0.6\n";

    const LONG: &str = "ModuleType,IA,Value\n\
                        0,0,200\n\
                        0,90,1000\n\
                        1,0,50\n\
                        1,90,500\n";

    fn headers(line: &str) -> StringRecord {
        StringRecord::from(line.split(',').collect::<Vec<_>>())
    }

    #[test]
    fn detects_both_layouts() {
        assert_eq!(
            ProfileLayout::detect(&headers("Incident Angle,Module Type 0,Module Type 2")).ok(),
            Some(ProfileLayout::Wide {
                module_types: vec![0, 2]
            })
        );
        assert_eq!(
            ProfileLayout::detect(&headers("Value,ModuleType,IA")).ok(),
            Some(ProfileLayout::Long {
                angle: 2,
                value: 0,
                module_type: 1
            })
        );
    }

    #[test]
    fn unknown_header_is_rejected() {
        for line in ["angle,coef", "Incident Angle", "Incident Angle,Type 0"] {
            assert!(
                matches!(
                    ProfileLayout::detect(&headers(line)),
                    Err(ProfileError::UnknownLayout(_))
                ),
                "{line}"
            );
        }
    }

    #[test]
    fn reads_wide_table() {
        let registry = read_profiles(WIDE.as_bytes(), Interpolation::Linear).ok();
        let registry = registry.as_ref();
        assert_eq!(registry.map(ProfileRegistry::len), Some(3));
        let c = registry
            .and_then(|r| r.get(1).ok())
            .map(|p| p.coefficient(45.0));
        assert!((c.unwrap_or(f64::NAN) - 0.03).abs() < 1e-12);
    }

    #[test]
    fn long_rows_are_normalized_per_type() {
        let registry = read_profiles(LONG.as_bytes(), Interpolation::Linear).ok();
        let registry = registry.as_ref();
        assert_eq!(registry.map(ProfileRegistry::len), Some(2));
        let at = |t: u8, a: f64| {
            registry
                .and_then(|r| r.get(t).ok())
                .map_or(f64::NAN, |p| p.coefficient(a))
        };
        assert!((at(0, 0.0) - 0.2).abs() < 1e-12);
        assert!((at(0, 90.0) - 1.0).abs() < 1e-12);
        assert!((at(1, 0.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn malformed_cell_reports_line() {
        let text = "IA,Value,ModuleType\n0,10,0\n10,abc,0\n";
        let err = read_profiles(text.as_bytes(), Interpolation::Linear).err();
        assert!(matches!(
            err,
            Some(GlareError::Profile(ProfileError::MalformedRow { row: 3, .. }))
        ));
    }

    #[test]
    fn short_wide_row_is_malformed() {
        let text = "Incident Angle,Module Type 0,Module Type 1\n0,0.1,0.2\n10,0.1\n";
        let err = read_profiles(text.as_bytes(), Interpolation::Linear).err();
        assert!(matches!(
            err,
            Some(GlareError::Profile(ProfileError::MalformedRow { row: 3, .. }))
        ));
    }

    #[test]
    fn unknown_layout_surfaces_as_profile_error() {
        let err = read_profiles("a,b\n1,2\n".as_bytes(), Interpolation::Linear).err();
        assert_eq!(err.map(|e| e.kind()), Some(crate::error::ErrorKind::Profile));
    }
}
