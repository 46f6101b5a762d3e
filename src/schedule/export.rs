//! Schedule export with named column presets.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model::Schedule;
use super::row::{parse_row_time, ScheduleRow};
use crate::error::{Error, Result};

/// How times are written on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    /// `HH:MM:SS`
    #[default]
    HhMmSs,
    /// `HH:MM`
    HhMm,
    /// Seconds since midnight
    Seconds,
}

/// One exported column: an internal field and its output header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Internal field name, e.g. `start_time`
    pub field: String,
    /// Header written in the output, e.g. `StartTime`
    pub header: String,
}

impl ColumnSpec {
    /// Binds a field to an output header.
    pub fn new(field: impl Into<String>, header: impl Into<String>) -> Self {
        Self { field: field.into(), header: header.into() }
    }
}

/// A complete export configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Columns in output order
    pub columns: Vec<ColumnSpec>,
    /// Time rendering
    pub time_format: TimeFormat,
    /// Field delimiter
    pub delimiter: u8,
    /// Whether to write the header row
    pub include_header: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportPreset::Default.config()
    }
}

/// The named column sets understood by [ExportPreset::from_name].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPreset {
    /// The crate's own column set
    Default,
    /// Run, block, trip and times only
    Minimal,
    /// Every available column
    Extended,
    /// Optibus-style headers (an approximation; the real format is proprietary)
    Optibus,
    /// Hastus-style headers (an approximation; the real format is proprietary)
    Hastus,
    /// GTFS block_id-oriented columns
    GtfsBlock,
}

impl ExportPreset {
    /// Resolves a preset by name. Unknown names are an error, not a fallback.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "default" => Ok(ExportPreset::Default),
            "minimal" => Ok(ExportPreset::Minimal),
            "extended" => Ok(ExportPreset::Extended),
            "optibus" => Ok(ExportPreset::Optibus),
            "hastus" => Ok(ExportPreset::Hastus),
            "gtfs_block" => Ok(ExportPreset::GtfsBlock),
            other => Err(Error::UnknownPreset(other.to_owned())),
        }
    }

    /// The full configuration of this preset.
    pub fn config(self) -> ExportConfig {
        let columns = match self {
            ExportPreset::Default => identity_columns(&[
                "run_number",
                "block",
                "start_place",
                "end_place",
                "start_time",
                "end_time",
                "trip_id",
                "depot",
                "vehicle_class",
                "vehicle_type",
                "start_lat",
                "start_lon",
                "end_lat",
                "end_lon",
                "route_shape_id",
            ]),
            ExportPreset::Minimal => identity_columns(&[
                "run_number",
                "block",
                "trip_id",
                "start_time",
                "end_time",
            ]),
            ExportPreset::Extended => identity_columns(&[
                "run_number",
                "duty_id",
                "shift_id",
                "block",
                "start_place",
                "end_place",
                "start_time",
                "end_time",
                "trip_id",
                "route_short_name",
                "headsign",
                "depot",
                "vehicle_class",
                "vehicle_type",
                "start_lat",
                "start_lon",
                "end_lat",
                "end_lon",
                "route_shape_id",
                "row_type",
            ]),
            ExportPreset::Optibus => vec![
                ColumnSpec::new("run_number", "Run"),
                ColumnSpec::new("block", "Block"),
                ColumnSpec::new("row_type", "Activity"),
                ColumnSpec::new("start_place", "StartStop"),
                ColumnSpec::new("end_place", "EndStop"),
                ColumnSpec::new("start_time", "StartTime"),
                ColumnSpec::new("end_time", "EndTime"),
                ColumnSpec::new("trip_id", "TripID"),
                ColumnSpec::new("route_short_name", "Route"),
                ColumnSpec::new("headsign", "Direction"),
                ColumnSpec::new("depot", "Depot"),
                ColumnSpec::new("vehicle_type", "VehicleType"),
            ],
            ExportPreset::Hastus => vec![
                ColumnSpec::new("duty_id", "DUTY_NO"),
                ColumnSpec::new("block", "BLOCK_NO"),
                ColumnSpec::new("run_number", "RUN_NO"),
                ColumnSpec::new("trip_id", "TRIP_NO"),
                ColumnSpec::new("route_short_name", "ROUTE"),
                ColumnSpec::new("start_place", "FROM_STOP"),
                ColumnSpec::new("end_place", "TO_STOP"),
                ColumnSpec::new("start_time", "START"),
                ColumnSpec::new("end_time", "END"),
                ColumnSpec::new("row_type", "TYPE"),
                ColumnSpec::new("depot", "GARAGE"),
                ColumnSpec::new("vehicle_class", "VEH_TYPE"),
            ],
            ExportPreset::GtfsBlock => vec![
                ColumnSpec::new("block", "block_id"),
                ColumnSpec::new("trip_id", "trip_id"),
                ColumnSpec::new("start_time", "start_time"),
                ColumnSpec::new("end_time", "end_time"),
                ColumnSpec::new("start_place", "start_stop_id"),
                ColumnSpec::new("end_place", "end_stop_id"),
                ColumnSpec::new("route_shape_id", "shape_id"),
            ],
        };
        let time_format = match self {
            ExportPreset::Hastus => TimeFormat::HhMm,
            _ => TimeFormat::HhMmSs,
        };
        ExportConfig { columns, time_format, delimiter: b',', include_header: true }
    }
}

fn identity_columns(fields: &[&str]) -> Vec<ColumnSpec> {
    fields.iter().map(|f| ColumnSpec::new(*f, *f)).collect()
}

/// Writes schedules as CSV under a configurable column set.
pub struct CsvExporter {
    config: ExportConfig,
}

impl CsvExporter {
    /// An exporter over an explicit configuration.
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// An exporter over a named preset.
    pub fn with_preset(preset: ExportPreset) -> Self {
        Self::new(preset.config())
    }

    /// Renders the schedule as a CSV string.
    pub fn write_string(&self, schedule: &Schedule) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.config.delimiter)
            .from_writer(Vec::new());

        if self.config.include_header {
            let header: Vec<&str> =
                self.config.columns.iter().map(|c| c.header.as_str()).collect();
            writer
                .write_record(&header)
                .map_err(|e| Error::ScheduleParse { reason: e.to_string() })?;
        }
        for row in &schedule.rows {
            let record: Vec<String> = self
                .config
                .columns
                .iter()
                .map(|c| field_value(row, &c.field, self.config.time_format))
                .collect();
            writer
                .write_record(&record)
                .map_err(|e| Error::ScheduleParse { reason: e.to_string() })?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::ScheduleParse { reason: e.to_string() })?;
        String::from_utf8(bytes).map_err(|e| Error::ScheduleParse { reason: e.to_string() })
    }

    /// Writes the schedule to a file.
    pub fn write_path<P: AsRef<Path>>(&self, schedule: &Schedule, path: P) -> Result<()> {
        let content = self.write_string(schedule)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

fn field_value(row: &ScheduleRow, field: &str, time_format: TimeFormat) -> String {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    let float = |value: &Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    match field {
        "run_number" => opt(&row.run_number),
        "block" => opt(&row.block),
        "start_place" => opt(&row.start_place),
        "end_place" => opt(&row.end_place),
        "start_time" => format_time_field(&row.start_time, time_format),
        "end_time" => format_time_field(&row.end_time, time_format),
        "trip_id" => opt(&row.trip_id),
        "depot" => opt(&row.depot),
        "vehicle_class" => opt(&row.vehicle_class),
        "vehicle_type" => opt(&row.vehicle_type),
        "start_lat" => float(&row.start_lat),
        "start_lon" => float(&row.start_lon),
        "end_lat" => float(&row.end_lat),
        "end_lon" => float(&row.end_lon),
        "route_shape_id" => opt(&row.route_shape_id),
        "duty_id" => opt(&row.duty_id),
        "shift_id" => opt(&row.shift_id),
        "route_short_name" => opt(&row.route_short_name),
        "headsign" => opt(&row.headsign),
        "row_type" => row.row_type.as_str().to_owned(),
        _ => String::new(),
    }
}

/// Re-renders a time in the requested format; unparsable values pass through.
fn format_time_field(value: &Option<String>, time_format: TimeFormat) -> String {
    let raw = match value {
        Some(raw) => raw,
        None => return String::new(),
    };
    match parse_row_time(raw) {
        Some(seconds) => match time_format {
            TimeFormat::HhMmSs => {
                format!("{:02}:{:02}:{:02}", seconds / 3600, seconds % 3600 / 60, seconds % 60)
            }
            TimeFormat::HhMm => format!("{:02}:{:02}", seconds / 3600, seconds % 3600 / 60),
            TimeFormat::Seconds => seconds.to_string(),
        },
        None => raw.clone(),
    }
}
