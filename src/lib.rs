/*! High-throughput parsing, conversion and validation of public-transit
schedule data.

Three subsystems built on top of the [gtfs_store] crate:

- **[txc]**: a streaming parser for TransXChange 2.4/2.5 documents, the UK
  XML schedule interchange format.
- **[convert]**: the TXC to GTFS conversion engine with reference resolution,
  stop-time expansion from relative timing links, operating-profile and
  bank-holiday calendar expansion, and deterministic batch merging.
- **[schedule]**: operational run-cuts, covering a synonym-mapping CSV
  reader, a rule engine validating blocks and duties against a GTFS
  reference, a deadhead inferrer, and export presets.

The GTFS storage, lazy loading and query layer live in the [gtfs_store]
crate and are re-exported here for convenience.

# Quick start

```no_run
use transit_parser::{GtfsFilter, TxcConverter, TxcDocument};

let doc = TxcDocument::from_path("service.xml")?;
let conversion = TxcConverter::with_defaults().convert(&doc)?;
conversion.feed.write_to_zip_path("service_gtfs.zip")?;

let filter = GtfsFilter::new(&conversion.feed);
let friday_trips = filter.trips_on_date("2025-07-04")?;
println!("{} trips run that day", friday_trips.len());
# Ok::<(), transit_parser::Error>(())
```
*/
#![warn(missing_docs)]

pub mod convert;
pub mod error;
pub mod schedule;
pub mod txc;

#[cfg(test)]
mod tests;

pub use convert::{Conversion, ConversionStats, ConvertOptions, Region, TxcConverter};
pub use error::{Error, Result};
pub use schedule::{
    Block, BusinessRules, ColumnMapping, ComplianceLevel, CsvExporter, DeadheadInferrer, Duty,
    ExportConfig, ExportPreset, InferenceConfig, InferenceResult, Issue, IssueCategory,
    ReadOptions, RowType, Schedule, ScheduleReader, ScheduleRow, ValidationConfig,
    ValidationResult, Validator,
};
pub use txc::{TxcDiagnostic, TxcDocument};

pub use gtfs_store::{
    Agency, Calendar, CalendarDate, CancelToken, DateInput, DirectionType, Exception, FeedTables,
    GtfsFeed, GtfsFilter, GtfsReader, LazyGtfsFeed, ParseWarning, Route, RouteType, Shape, Stop,
    StopTime, Trip,
};
