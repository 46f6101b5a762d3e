use chrono::NaiveDate;
use gtfs_store::CancelToken;
use serde::{Deserialize, Serialize};

/// Which nation's bank-holiday table resolves symbolic holiday names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// England (also the sensible default for cross-border operators)
    #[default]
    England,
    /// Scotland: January 2nd, St Andrew's Day, August bank holiday
    Scotland,
    /// Wales: shares the English table
    Wales,
    /// Northern Ireland: adds St Patrick's Day and the Battle of the Boyne
    NorthernIreland,
}

/// Knobs of the TXC → GTFS conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Emit one Shape per distinct journey pattern from the route geometry
    pub include_shapes: bool,
    /// Overrides the start of the service window (default: the document's OperatingPeriod)
    pub calendar_start: Option<NaiveDate>,
    /// Overrides the end of the service window
    pub calendar_end: Option<NaiveDate>,
    /// Bank-holiday table used to resolve symbolic holiday names
    pub region: Region,
    /// Agency timezone when the operator carries none
    pub default_timezone: String,
    /// Agency URL when the operator carries none
    pub default_agency_url: String,
    /// Cancellation signal, checked at document boundaries
    pub cancel: Option<CancelToken>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            include_shapes: false,
            calendar_start: None,
            calendar_end: None,
            region: Region::England,
            default_timezone: "Europe/London".to_owned(),
            default_agency_url: "https://www.example.com".to_owned(),
            cancel: None,
        }
    }
}

impl ConvertOptions {
    /// Default options: no shapes, England, Europe/London.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit shapes from route-section geometry.
    pub fn with_shapes(mut self, include: bool) -> Self {
        self.include_shapes = include;
        self
    }

    /// Clamp the service window to `[start, end]`.
    pub fn with_calendar_window(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.calendar_start = Some(start);
        self.calendar_end = Some(end);
        self
    }

    /// Pick the bank-holiday region.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Exact artifact counts of one conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Agencies emitted
    pub agencies: usize,
    /// Stops emitted
    pub stops: usize,
    /// Routes emitted
    pub routes: usize,
    /// Trips emitted
    pub trips: usize,
    /// Stop times emitted
    pub stop_times: usize,
    /// Calendar rows emitted
    pub calendars: usize,
    /// Calendar-date exception rows emitted, summed across services
    pub calendar_exceptions: usize,
    /// Shapes emitted; 0 unless [ConvertOptions::include_shapes]
    pub shapes_generated: usize,
}

/// The product of a conversion: the feed plus bookkeeping.
#[derive(Debug)]
pub struct Conversion {
    /// The converted feed
    pub feed: gtfs_store::GtfsFeed,
    /// Exact artifact counts
    pub stats: ConversionStats,
    /// Everything the converter had to assume or skip, in document order
    pub warnings: Vec<String>,
}
