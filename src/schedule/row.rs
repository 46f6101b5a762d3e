//! Schedule rows: one movement or activity of a run-cut.

use serde::{Deserialize, Serialize};

/// What kind of movement a schedule row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RowType {
    /// Revenue service trip, carries a trip_id
    #[default]
    Revenue,
    /// Depot to first stop
    PullOut,
    /// Last stop to depot
    PullIn,
    /// Repositioning between trips (interlining)
    Deadhead,
    /// Driver break
    Break,
    /// Driver relief or changeover
    Relief,
    /// Vehicle waiting between trips
    Layover,
}

impl RowType {
    /// Parses the many spellings found in exported run-cuts.
    pub fn parse(s: &str) -> RowType {
        match s.to_lowercase().as_str() {
            "pull_out" | "pullout" | "pull-out" | "po" => RowType::PullOut,
            "pull_in" | "pullin" | "pull-in" | "pi" => RowType::PullIn,
            "deadhead" | "dead" | "dh" | "non_revenue" => RowType::Deadhead,
            "break" | "brk" | "meal" => RowType::Break,
            "relief" | "changeover" | "swap" => RowType::Relief,
            "layover" | "wait" | "dwell" => RowType::Layover,
            _ => RowType::Revenue,
        }
    }

    /// The canonical snake_case spelling, as written on export.
    pub fn as_str(self) -> &'static str {
        match self {
            RowType::Revenue => "revenue",
            RowType::PullOut => "pull_out",
            RowType::PullIn => "pull_in",
            RowType::Deadhead => "deadhead",
            RowType::Break => "break",
            RowType::Relief => "relief",
            RowType::Layover => "layover",
        }
    }
}

/// One row of an operational schedule.
///
/// Every field is optional because exported run-cuts are wildly inconsistent;
/// the validator reports what is missing rather than refusing to load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// Driver run identifier
    pub run_number: Option<String>,
    /// Vehicle block identifier
    pub block: Option<String>,
    /// Where the movement starts: stop id, depot code or free text
    pub start_place: Option<String>,
    /// Where the movement ends
    pub end_place: Option<String>,
    /// Start time, `H+:MM:SS`, `H:MM` or bare seconds
    pub start_time: Option<String>,
    /// End time
    pub end_time: Option<String>,
    /// GTFS trip id; only revenue rows carry one
    pub trip_id: Option<String>,
    /// Depot code of the block
    pub depot: Option<String>,
    /// Vehicle class required
    pub vehicle_class: Option<String>,
    /// Specific vehicle type
    pub vehicle_type: Option<String>,
    /// Start latitude, for rows not anchored to a GTFS stop
    pub start_lat: Option<f64>,
    /// Start longitude
    pub start_lon: Option<f64>,
    /// End latitude
    pub end_lat: Option<f64>,
    /// End longitude
    pub end_lon: Option<f64>,
    /// GTFS shape id of the movement, when known
    pub route_shape_id: Option<String>,
    /// Driver duty identifier
    pub duty_id: Option<String>,
    /// Shift identifier
    pub shift_id: Option<String>,
    /// Route short name, informational
    pub route_short_name: Option<String>,
    /// Destination text, informational
    pub headsign: Option<String>,
    /// Kind of movement
    #[serde(default)]
    pub row_type: RowType,
    /// Set on rows synthesized by the deadhead inferrer
    #[serde(default)]
    pub inferred: bool,
}

impl ScheduleRow {
    /// A revenue row that actually references a trip.
    pub fn is_revenue(&self) -> bool {
        self.row_type == RowType::Revenue && self.trip_id.is_some()
    }

    /// Any non-revenue vehicle movement.
    pub fn is_deadhead(&self) -> bool {
        matches!(self.row_type, RowType::PullOut | RowType::PullIn | RowType::Deadhead)
    }

    /// A break or relief row.
    pub fn is_break_or_relief(&self) -> bool {
        matches!(self.row_type, RowType::Break | RowType::Relief)
    }

    /// Start time as seconds since midnight, when parseable.
    pub fn start_time_seconds(&self) -> Option<u32> {
        self.start_time.as_deref().and_then(parse_row_time)
    }

    /// End time as seconds since midnight, when parseable.
    pub fn end_time_seconds(&self) -> Option<u32> {
        self.end_time.as_deref().and_then(parse_row_time)
    }

    /// End minus start, when both parse and are ordered.
    pub fn duration_seconds(&self) -> Option<u32> {
        match (self.start_time_seconds(), self.end_time_seconds()) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

/// Parses a schedule time: `H+:MM:SS`, `H:MM`, or bare seconds.
/// Hours past 24 denote the next service day, as in GTFS.
pub fn parse_row_time(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Ok(seconds) = text.parse::<u32>() {
        return Some(seconds);
    }
    let parts: Vec<&str> = text.split(':').collect();
    match parts.len() {
        3 => {
            let hours: u32 = parts[0].parse().ok()?;
            let minutes: u32 = parts[1].parse().ok()?;
            let seconds: u32 = parts[2].parse().ok()?;
            Some(hours * 3600 + minutes * 60 + seconds)
        }
        2 => {
            let hours: u32 = parts[0].parse().ok()?;
            let minutes: u32 = parts[1].parse().ok()?;
            Some(hours * 3600 + minutes * 60)
        }
        _ => None,
    }
}
