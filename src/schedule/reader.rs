//! Schedule CSV reader with synonym-based column auto-mapping.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::StringRecord;
use log::debug;

use super::model::{Schedule, ScheduleMetadata};
use super::row::{RowType, ScheduleRow};
use crate::error::{Error, Result};

/// Header synonyms recognized during auto-detection, canonical name first.
/// Matching is case-insensitive; each header is claimed by one field only.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("run_number", &["run_number", "run", "run_id", "driver_run"]),
    ("block", &["block", "block_id", "vehicle_block"]),
    ("trip_id", &["trip_id", "trip", "journey_id", "journey_ref"]),
    ("start_place", &["start_place", "origin", "from", "start_stop"]),
    ("end_place", &["end_place", "destination", "to", "end_stop"]),
    ("start_time", &["start_time", "depart", "departure"]),
    ("end_time", &["end_time", "arrive", "arrival"]),
    ("depot", &["depot", "garage", "depot_code", "garage_code"]),
    ("vehicle_class", &["vehicle_class", "veh_class", "class"]),
    ("row_type", &["row_type", "type", "activity_type"]),
    ("vehicle_type", &["vehicle_type", "veh_type"]),
    ("duty_id", &["duty_id", "duty"]),
    ("shift_id", &["shift_id", "shift"]),
    ("start_lat", &["start_lat", "from_lat", "origin_lat"]),
    ("start_lon", &["start_lon", "from_lon", "origin_lon"]),
    ("end_lat", &["end_lat", "to_lat", "dest_lat"]),
    ("end_lon", &["end_lon", "to_lon", "dest_lon"]),
    ("route_shape_id", &["route_shape_id", "shape_id"]),
    ("route_short_name", &["route_short_name", "route", "line"]),
    ("headsign", &["headsign"]),
];

/// Maps standard field names to the actual CSV column names.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    mappings: HashMap<String, String>,
}

impl ColumnMapping {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a standard field to a CSV column name.
    pub fn add(&mut self, field: impl Into<String>, column: impl Into<String>) {
        self.mappings.insert(field.into(), column.into());
    }

    /// The CSV column bound to a field, when any.
    pub fn column(&self, field: &str) -> Option<&str> {
        self.mappings.get(field).map(|c| c.as_str())
    }

    /// Detects a mapping from the header row using the synonym table.
    ///
    /// Headers are matched case-insensitively; every header can satisfy at
    /// most one field, in synonym-table order.
    pub fn auto_detect(headers: &[String]) -> Self {
        let mut mapping = Self::new();
        let mut claimed: Vec<usize> = Vec::new();
        for (field, names) in SYNONYMS {
            'field: for name in *names {
                for (index, header) in headers.iter().enumerate() {
                    if claimed.contains(&index) {
                        continue;
                    }
                    if header.trim().to_lowercase() == *name {
                        mapping.add(*field, header.clone());
                        claimed.push(index);
                        break 'field;
                    }
                }
            }
        }
        mapping
    }

    fn merged_with(mut self, overrides: &ColumnMapping) -> Self {
        for (field, column) in &overrides.mappings {
            self.add(field.clone(), column.clone());
        }
        self
    }

    fn as_map(&self) -> HashMap<String, String> {
        self.mappings.clone()
    }
}

/// Options for reading schedule CSV files.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Explicit column bindings; they override auto-detection per field
    pub column_mapping: Option<ColumnMapping>,
    /// Field delimiter, comma when unset
    pub delimiter: Option<u8>,
    /// Whether a header row is present
    pub has_headers: bool,
    /// Drop rows where every field is blank
    pub skip_empty_rows: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { column_mapping: None, delimiter: None, has_headers: true, skip_empty_rows: true }
    }
}

impl ReadOptions {
    /// Default options: auto-detected columns, comma, headers, skip blanks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides specific column bindings.
    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.column_mapping = Some(mapping);
        self
    }

    /// Uses a different field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }
}

/// Reads operational schedules from CSV.
pub struct ScheduleReader;

impl ScheduleReader {
    /// Reads a schedule from a file.
    pub fn read_path<P: AsRef<Path>>(path: P, options: ReadOptions) -> Result<Schedule> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut schedule = Self::read_reader(BufReader::new(file), options)?;
        schedule.metadata.source_file = Some(path.to_string_lossy().into_owned());
        Ok(schedule)
    }

    /// Reads a schedule from bytes.
    pub fn read_bytes(bytes: &[u8], options: ReadOptions) -> Result<Schedule> {
        Self::read_reader(bytes, options)
    }

    /// Reads a schedule from a string.
    pub fn read_str(content: &str, options: ReadOptions) -> Result<Schedule> {
        Self::read_bytes(content.as_bytes(), options)
    }

    fn read_reader<R: Read>(reader: R, options: ReadOptions) -> Result<Schedule> {
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(options.has_headers).flexible(true).trim(csv::Trim::Fields);
        if let Some(delimiter) = options.delimiter {
            builder.delimiter(delimiter);
        }
        let mut csv_reader = builder.from_reader(reader);

        let headers: Vec<String> = if options.has_headers {
            csv_reader
                .headers()
                .map_err(|e| Error::ScheduleParse { reason: e.to_string() })?
                .iter()
                .map(String::from)
                .collect()
        } else {
            Vec::new()
        };

        let mapping = {
            let detected = ColumnMapping::auto_detect(&headers);
            match &options.column_mapping {
                Some(overrides) => detected.merged_with(overrides),
                None => detected,
            }
        };
        debug!("schedule columns mapped: {:?}", mapping);

        let header_index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(index, header)| (header.clone(), index))
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| Error::ScheduleParse { reason: e.to_string() })?;
            if options.skip_empty_rows && record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            rows.push(parse_row(&record, &mapping, &header_index));
        }

        Ok(Schedule {
            rows,
            metadata: ScheduleMetadata {
                source_file: None,
                column_mapping: Some(mapping.as_map()),
            },
            ..Schedule::default()
        })
    }
}

fn parse_row(
    record: &StringRecord,
    mapping: &ColumnMapping,
    header_index: &HashMap<String, usize>,
) -> ScheduleRow {
    let field = |name: &str| -> Option<String> {
        let column = mapping.column(name)?;
        let index = *header_index.get(column)?;
        let value = record.get(index)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_owned())
        }
    };
    let float = |name: &str| -> Option<f64> { field(name).and_then(|v| v.parse().ok()) };

    ScheduleRow {
        run_number: field("run_number"),
        block: field("block"),
        start_place: field("start_place"),
        end_place: field("end_place"),
        start_time: field("start_time"),
        end_time: field("end_time"),
        trip_id: field("trip_id"),
        depot: field("depot"),
        vehicle_class: field("vehicle_class"),
        vehicle_type: field("vehicle_type"),
        start_lat: float("start_lat"),
        start_lon: float("start_lon"),
        end_lat: float("end_lat"),
        end_lon: float("end_lon"),
        route_shape_id: field("route_shape_id"),
        duty_id: field("duty_id"),
        shift_id: field("shift_id"),
        route_short_name: field("route_short_name"),
        headsign: field("headsign"),
        row_type: field("row_type").map(|v| RowType::parse(&v)).unwrap_or_default(),
        inferred: false,
    }
}
