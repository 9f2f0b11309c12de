//! `dt.cc` and `dt.ct` files.
//!
//! hypoDD layout with string event ids. Observations are grouped under one
//! header line per event pair:
//!
//! ```text
//! # ev001 ev002 0.0
//! NZ.WIZ 0.0123 0.91 P
//! ```
//!
//! and for catalog data, with both absolute travel times:
//!
//! ```text
//! # ev001 ev002
//! NZ.WIZ 1.532 1.519 1 P
//! ```
//!
//! Values are written with shortest round-trip formatting so a reloaded file
//! reproduces the in-memory observations exactly.

use crate::error::{PersistenceError, PersistenceResult};
use ddreloc_core::{DifferentialTime, DtSource, EventId, Phase};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Write cross-correlation observations. Other sources are ignored.
pub fn write_dt_cc(path: impl AsRef<Path>, dts: &[DifferentialTime]) -> PersistenceResult<usize> {
    write_grouped(path.as_ref(), dts, DtSource::CrossCorrelation)
}

/// Write catalog observations. Other sources are ignored.
pub fn write_dt_ct(path: impl AsRef<Path>, dts: &[DifferentialTime]) -> PersistenceResult<usize> {
    write_grouped(path.as_ref(), dts, DtSource::Catalog)
}

pub fn read_dt_cc(path: impl AsRef<Path>) -> PersistenceResult<Vec<DifferentialTime>> {
    read_grouped(path.as_ref(), DtSource::CrossCorrelation)
}

pub fn read_dt_ct(path: impl AsRef<Path>) -> PersistenceResult<Vec<DifferentialTime>> {
    read_grouped(path.as_ref(), DtSource::Catalog)
}

fn write_grouped(path: &Path, dts: &[DifferentialTime], source: DtSource) -> PersistenceResult<usize> {
    let mut selected: Vec<DifferentialTime> = dts
        .iter()
        .filter(|dt| dt.source == source)
        .cloned()
        .map(DifferentialTime::canonical)
        .collect();
    selected.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    if let Some(dt) = selected
        .iter()
        .find(|dt| !is_token(dt.event_a.as_str()) || !is_token(dt.event_b.as_str()))
    {
        return Err(PersistenceError::InvalidRecord(format!(
            "event ids must be non-empty without whitespace: {:?} / {:?}",
            dt.event_a.as_str(),
            dt.event_b.as_str()
        )));
    }

    let mut out = BufWriter::new(File::create(path)?);
    let mut current: Option<(&EventId, &EventId)> = None;
    for dt in &selected {
        let pair = (&dt.event_a, &dt.event_b);
        if current != Some(pair) {
            match source {
                DtSource::CrossCorrelation => writeln!(out, "# {} {} 0.0", dt.event_a, dt.event_b)?,
                DtSource::Catalog => writeln!(out, "# {} {}", dt.event_a, dt.event_b)?,
            }
            current = Some(pair);
        }
        match (source, dt.travel_times) {
            (DtSource::Catalog, Some((tt_a, tt_b))) => {
                writeln!(out, "{} {} {} {} {}", dt.station, tt_a, tt_b, dt.weight, dt.phase)?
            }
            // Catalog rows without travel times keep the difference in the first column.
            (DtSource::Catalog, None) => {
                writeln!(out, "{} {} 0 {} {}", dt.station, dt.value, dt.weight, dt.phase)?
            }
            (DtSource::CrossCorrelation, _) => {
                writeln!(out, "{} {} {} {}", dt.station, dt.value, dt.weight, dt.phase)?
            }
        }
    }
    out.flush()?;
    debug!(path = %path.display(), observations = selected.len(), "Wrote differential times");
    Ok(selected.len())
}

fn read_grouped(path: &Path, source: DtSource) -> PersistenceResult<Vec<DifferentialTime>> {
    let reader = BufReader::new(File::open(path)?);
    let path_str = path.display().to_string();
    let parse_err = |line: usize, message: String| PersistenceError::Parse {
        path: path_str.clone(),
        line,
        message,
    };

    let mut dts = Vec::new();
    let mut pair: Option<(EventId, EventId)> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = i + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('#') {
            let fields: Vec<&str> = header.split_whitespace().collect();
            let valid = match (source, fields.as_slice()) {
                (_, [_, _]) => true,
                (DtSource::CrossCorrelation, [_, _, otc]) => otc.parse::<f64>().is_ok(),
                _ => false,
            };
            if !valid {
                return Err(parse_err(
                    lineno,
                    format!("pair header needs two event ids, got {header:?}"),
                ));
            }
            pair = Some((EventId::new(fields[0]), EventId::new(fields[1])));
            continue;
        }

        let (event_a, event_b) = pair
            .clone()
            .ok_or_else(|| parse_err(lineno, "observation before pair header".to_string()))?;
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let number = |s: &str| {
            s.parse::<f64>()
                .map_err(|e| parse_err(lineno, format!("bad number '{s}': {e}")))
        };
        let phase = |s: &str| {
            s.parse::<Phase>()
                .map_err(|e| parse_err(lineno, e.to_string()))
        };

        let dt = match (source, fields.as_slice()) {
            (DtSource::CrossCorrelation, [sta, value, weight, pha]) => {
                DifferentialTime::cross_correlation(
                    event_a,
                    event_b,
                    *sta,
                    phase(*pha)?,
                    number(*value)?,
                    number(*weight)?,
                )
            }
            (DtSource::Catalog, [sta, tt_a, tt_b, weight, pha]) => DifferentialTime::catalog(
                event_a,
                event_b,
                *sta,
                phase(*pha)?,
                number(*tt_a)?,
                number(*tt_b)?,
                number(*weight)?,
            ),
            _ => {
                return Err(parse_err(
                    lineno,
                    format!("expected {} fields, got {}", field_count(source), fields.len()),
                ))
            }
        };
        dts.push(dt);
    }

    debug!(path = %path.display(), observations = dts.len(), "Read differential times");
    Ok(dts)
}

/// Ids are written as bare whitespace-separated tokens.
fn is_token(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(char::is_whitespace)
}

fn field_count(source: DtSource) -> usize {
    match source {
        DtSource::CrossCorrelation => 4,
        DtSource::Catalog => 5,
    }
}
