//! Readers for marker sets and marker event logs.
//!
//! Coordinates are parsed but not range-checked here; the cluster index
//! rejects invalid ones.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use markercluster_core::{Marker, MarkerEvent};

use crate::{Error, Result};

/// Reads markers from a CSV file with `id,lat,lon` columns.
///
/// A header row is detected by a non-numeric first field. Lines starting
/// with `#` are comments.
///
/// # Errors
/// Returns an error if the file cannot be read or a row is malformed.
pub fn read_markers_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Marker>> {
    let file = File::open(path)?;
    parse_markers_csv(file)
}

/// Parses markers from CSV data. See [`read_markers_csv`].
///
/// # Errors
/// Returns an error if a row is malformed.
pub fn parse_markers_csv<R: Read>(reader: R) -> Result<Vec<Marker>> {
    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut markers = Vec::new();
    for (i, record) in csv.records().enumerate() {
        let record = record?;
        if i == 0 && is_header(&record) {
            continue;
        }
        markers.push(parse_marker_record(&record)?);
    }

    log::debug!("parsed {} markers", markers.len());
    Ok(markers)
}

/// Reads marker events from a JSON-lines file.
///
/// Each non-empty line is an object such as
/// `{"op":"add","id":1,"lat":10.0,"lon":10.0}`. Lines starting with `#`
/// are comments.
///
/// # Errors
/// Returns an error if the file cannot be read or a line is malformed.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<MarkerEvent>> {
    let file = File::open(path)?;
    parse_events(BufReader::new(file))
}

/// Parses marker events from JSON lines. See [`read_events`].
///
/// # Errors
/// Returns an error if a line is malformed.
pub fn parse_events<R: BufRead>(reader: R) -> Result<Vec<MarkerEvent>> {
    let mut events = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(line).map_err(|e| Error::Parse {
            line: n as u64 + 1,
            message: e.to_string(),
        })?;
        events.push(event);
    }
    Ok(events)
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|field| field.parse::<u64>().is_err())
}

fn parse_marker_record(record: &StringRecord) -> Result<Marker> {
    let line = record.position().map_or(0, csv::Position::line);
    let parse_error = |message: String| Error::Parse { line, message };

    if record.len() != 3 {
        return Err(parse_error(format!(
            "expected 3 fields (id,lat,lon), found {}",
            record.len()
        )));
    }

    let id = record[0]
        .parse::<u64>()
        .map_err(|e| parse_error(format!("invalid id '{}': {e}", &record[0])))?;
    let lat = record[1]
        .parse::<f64>()
        .map_err(|e| parse_error(format!("invalid latitude '{}': {e}", &record[1])))?;
    let lon = record[2]
        .parse::<f64>()
        .map_err(|e| parse_error(format!("invalid longitude '{}': {e}", &record[2])))?;

    Ok(Marker::new(id, lat, lon))
}
