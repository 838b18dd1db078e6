//! Writers for cluster summaries.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use markercluster_core::{ClusterId, ClusterSummary, MarkerId};
use serde::Serialize;

use crate::Result;

/// Output encodings for cluster summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `id,lat,lon,count` rows with a header.
    Csv,
    /// A pretty-printed JSON array.
    Json,
}

impl OutputFormat {
    /// Picks a format from a file extension, defaulting to CSV.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

#[derive(Serialize)]
struct SummaryRow {
    id: u32,
    lat: f64,
    lon: f64,
    count: usize,
}

#[derive(Serialize)]
struct AssignmentRow {
    marker: u64,
    cluster: u32,
}

/// Writer for cluster output.
pub struct ClusterWriter<W: Write> {
    writer: BufWriter<W>,
}

impl ClusterWriter<File> {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> ClusterWriter<W> {
    /// Wraps any writer.
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    /// Writes summaries in the given format.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_summaries(
        &mut self,
        clusters: &[ClusterSummary],
        format: OutputFormat,
    ) -> Result<()> {
        match format {
            OutputFormat::Csv => self.write_summaries_csv(clusters),
            OutputFormat::Json => self.write_summaries_json(clusters),
        }
    }

    /// Writes summaries as CSV.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_summaries_csv(&mut self, clusters: &[ClusterSummary]) -> Result<()> {
        let mut csv = csv::Writer::from_writer(&mut self.writer);
        for c in clusters {
            csv.serialize(SummaryRow {
                id: c.id.0,
                lat: c.center.lat,
                lon: c.center.lon,
                count: c.count,
            })?;
        }
        csv.flush()?;
        drop(csv);
        self.writer.flush()?;
        Ok(())
    }

    /// Writes summaries as a JSON array.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_summaries_json(&mut self, clusters: &[ClusterSummary]) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, clusters)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes `marker,cluster` rows.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_assignments_csv(&mut self, assignments: &[(MarkerId, ClusterId)]) -> Result<()> {
        let mut csv = csv::Writer::from_writer(&mut self.writer);
        for &(marker, cluster) in assignments {
            csv.serialize(AssignmentRow {
                marker: marker.0,
                cluster: cluster.0,
            })?;
        }
        csv.flush()?;
        drop(csv);
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
