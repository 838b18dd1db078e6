//! markercluster-io: marker input and cluster output.
//!
//! Markers are read from `id,lat,lon` CSV files, marker events from JSON
//! lines. Cluster summaries are written as CSV or JSON.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{parse_events, parse_markers_csv, read_events, read_markers_csv};
pub use writer::{ClusterWriter, OutputFormat};
