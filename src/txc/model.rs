//! Typed model of the TransXChange subtrees this crate consumes.
//!
//! Relationships between elements are textual references (`JourneyPatternRef`,
//! `LineRef`, …); the converter resolves them. Anything the parser cannot
//! interpret lands in the document's diagnostic bag instead of raising.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A diagnostic recorded while parsing a TXC document.
///
/// The parser never fails on malformed content; it returns a (possibly empty)
/// document and describes what it skipped here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxcDiagnostic {
    /// Local name of the element the problem was found in
    pub element: String,
    /// Approximate line in the source, 0 when unknown
    pub line: u64,
    /// What was skipped or assumed
    pub reason: String,
}

impl std::fmt::Display for TxcDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "<{}> line {}: {}", self.element, self.line, self.reason)
    }
}

/// A bus operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operator {
    /// The `id` attribute, used by `RegisteredOperatorRef`
    pub id: String,
    /// National operator code (NOC)
    pub national_operator_code: Option<String>,
    /// Legacy operator code
    pub operator_code: Option<String>,
    /// Short display name
    pub short_name: Option<String>,
    /// Trading name, preferred for display when present
    pub trading_name: Option<String>,
    /// Traffic-area license number
    pub license_number: Option<String>,
}

impl Operator {
    /// The most specific code available, falling back to the element id.
    pub fn code(&self) -> &str {
        self.national_operator_code
            .as_deref()
            .or(self.operator_code.as_deref())
            .unwrap_or(&self.id)
    }

    /// TradingName, else OperatorShortName, else the code.
    pub fn display_name(&self) -> &str {
        self.trading_name
            .as_deref()
            .or(self.short_name.as_deref())
            .unwrap_or_else(|| self.code())
    }
}

/// A stop referenced by the document, from `StopPoints`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotatedStopPoint {
    /// National ATCO code (NaPTAN)
    pub atco_code: String,
    /// Public-facing stop name
    pub common_name: String,
    /// WGS84 latitude when the document carries a location
    pub latitude: Option<f64>,
    /// WGS84 longitude when the document carries a location
    pub longitude: Option<f64>,
}

/// A TXC route: a description plus references into `RouteSections`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxcRoute {
    /// The `id` attribute, referenced by journey patterns
    pub id: String,
    /// Private code, when present
    pub private_code: Option<String>,
    /// Human description of the route
    pub description: Option<String>,
    /// Ordered `RouteSectionRef`s
    pub section_refs: Vec<String>,
}

/// One section of route geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSection {
    /// The `id` attribute, referenced by routes
    pub id: String,
    /// Ordered links of the section
    pub links: Vec<RouteLink>,
}

/// A link between two stops carrying track geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteLink {
    /// The `id` attribute, referenced by journey pattern timing links
    pub id: String,
    /// ATCO code of the from-stop
    pub from_stop: Option<String>,
    /// ATCO code of the to-stop
    pub to_stop: Option<String>,
    /// Track locations as (latitude, longitude) pairs, in travel order
    pub locations: Vec<(f64, f64)>,
    /// Link length in metres
    pub distance: Option<u32>,
}

/// One section of a journey pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JourneyPatternSection {
    /// The `id` attribute, referenced by journey patterns
    pub id: String,
    /// Ordered timing links of the section
    pub timing_links: Vec<JourneyPatternTimingLink>,
}

/// A stop usage at one end of a timing link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingStop {
    /// ATCO code of the stop
    pub stop_ref: String,
    /// Wait time at this stop, in seconds
    pub wait_seconds: Option<u32>,
    /// `pickUp`, `setDown`, `pickUpAndSetDown` or `pass`
    pub activity: Option<String>,
    /// Timing status code (`PTP`, `OTH`, …)
    pub timing_status: Option<String>,
}

/// A timed hop between two stops inside a journey pattern section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JourneyPatternTimingLink {
    /// The `id` attribute
    pub id: String,
    /// Departure end of the link
    pub from: TimingStop,
    /// Arrival end of the link
    pub to: TimingStop,
    /// Scheduled run time of the link, in seconds
    pub run_time_seconds: Option<u32>,
    /// Geometry reference into `RouteSections`
    pub route_link_ref: Option<String>,
}

/// A calendar date range, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day of the range
    pub start: NaiveDate,
    /// Last day of the range
    pub end: NaiveDate,
}

/// Which days of a normal week a journey runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegularDays {
    /// Monday through Sunday flags
    pub weekdays: [bool; 7],
    /// True when the day type is `HolidaysOnly`
    pub holidays_only: bool,
}

/// When a service or vehicle journey operates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingProfile {
    /// Regular weekly pattern
    pub regular_days: RegularDays,
    /// `SpecialDaysOperation/DaysOfOperation`
    pub special_operation: Vec<DateRange>,
    /// `SpecialDaysOperation/DaysOfNonOperation`
    pub special_non_operation: Vec<DateRange>,
    /// Symbolic holiday names under `BankHolidayOperation/DaysOfOperation`
    pub bank_holiday_operation: Vec<String>,
    /// Symbolic holiday names under `BankHolidayOperation/DaysOfNonOperation`
    pub bank_holiday_non_operation: Vec<String>,
}

impl OperatingProfile {
    /// A Monday-to-Friday profile, the TXC schema default when a journey
    /// declares no profile at all.
    pub fn monday_to_friday() -> Self {
        Self {
            regular_days: RegularDays {
                weekdays: [true, true, true, true, true, false, false],
                holidays_only: false,
            },
            ..Self::default()
        }
    }
}

/// The registration window of a service.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OperatingPeriod {
    /// First day of operation
    pub start: Option<NaiveDate>,
    /// Last day of operation; open-ended registrations leave this empty
    pub end: Option<NaiveDate>,
}

/// A line of a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxcLine {
    /// The `id` attribute, referenced by `LineRef`
    pub id: String,
    /// Public line name, e.g. `42`
    pub name: String,
}

/// The ordered stops and timings a vehicle journey follows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JourneyPattern {
    /// The `id` attribute, referenced by `JourneyPatternRef`
    pub id: String,
    /// `outbound` or `inbound`
    pub direction: Option<String>,
    /// Reference into the document's routes
    pub route_ref: Option<String>,
    /// Ordered `JourneyPatternSectionRefs`
    pub section_refs: Vec<String>,
}

/// A registered bus service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxcService {
    /// Registration code, e.g. `PB0001234:567`
    pub service_code: String,
    /// The lines marketed under this service
    pub lines: Vec<TxcLine>,
    /// Human description
    pub description: Option<String>,
    /// Transport mode (`bus`, `coach`, …)
    pub mode: Option<String>,
    /// Reference to the operator element
    pub registered_operator_ref: Option<String>,
    /// Registration window
    pub operating_period: Option<OperatingPeriod>,
    /// Service-level operating profile, overridable per vehicle journey
    pub operating_profile: Option<OperatingProfile>,
    /// Origin display name of the standard service
    pub origin: Option<String>,
    /// Destination display name of the standard service
    pub destination: Option<String>,
    /// Journey patterns of the standard service
    pub journey_patterns: Vec<JourneyPattern>,
}

/// One scheduled departure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleJourney {
    /// `VehicleJourneyCode`
    pub code: Option<String>,
    /// `PrivateCode`
    pub private_code: Option<String>,
    /// 2.5 ticket-machine journey code, when present
    pub journey_code: Option<String>,
    /// Reference to the operator
    pub operator_ref: Option<String>,
    /// Reference to the service registration
    pub service_ref: Option<String>,
    /// Reference to the line within the service
    pub line_ref: Option<String>,
    /// Reference to the journey pattern this departure follows
    pub journey_pattern_ref: Option<String>,
    /// Departure time from the first stop, seconds since midnight
    pub departure_seconds: Option<u32>,
    /// Journey-level profile overriding the service-level one
    pub operating_profile: Option<OperatingProfile>,
}

/// A parsed TransXChange document.
///
/// Counts of zero together with a non-empty [TxcDocument::diagnostics] bag
/// distinguish broken input from a genuinely empty document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxcDocument {
    /// File name the document was loaded from, when known
    pub filename: Option<String>,
    /// `SchemaVersion` attribute of the root element, empty when unreadable
    pub schema_version: String,
    /// All operators
    pub operators: Vec<Operator>,
    /// All stop points
    pub stop_points: Vec<AnnotatedStopPoint>,
    /// All routes
    pub routes: Vec<TxcRoute>,
    /// All route sections
    pub route_sections: Vec<RouteSection>,
    /// All journey pattern sections
    pub journey_pattern_sections: Vec<JourneyPatternSection>,
    /// All services
    pub services: Vec<TxcService>,
    /// All vehicle journeys
    pub vehicle_journeys: Vec<VehicleJourney>,
    /// Everything the parser skipped or assumed
    pub diagnostics: Vec<TxcDiagnostic>,
}

impl TxcDocument {
    /// Number of operators
    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    /// Number of services
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Number of stop points
    pub fn stop_point_count(&self) -> usize {
        self.stop_points.len()
    }

    /// Number of vehicle journeys
    pub fn vehicle_journey_count(&self) -> usize {
        self.vehicle_journeys.len()
    }

    /// Number of journey pattern sections
    pub fn journey_pattern_section_count(&self) -> usize {
        self.journey_pattern_sections.len()
    }

    /// Display names of every operator, in document order.
    pub fn operator_names(&self) -> Vec<&str> {
        self.operators.iter().map(|o| o.display_name()).collect()
    }

    /// Service codes, in document order.
    pub fn service_codes(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.service_code.as_str()).collect()
    }

    /// ATCO codes of every stop point, in document order.
    pub fn stop_codes(&self) -> Vec<&str> {
        self.stop_points.iter().map(|s| s.atco_code.as_str()).collect()
    }

    /// Looks up an operator by its element id.
    pub fn operator_by_id(&self, id: &str) -> Option<&Operator> {
        self.operators.iter().find(|o| o.id == id)
    }

    /// Looks up a service by its code.
    pub fn service_by_code(&self, code: &str) -> Option<&TxcService> {
        self.services.iter().find(|s| s.service_code == code)
    }

    /// Looks up a journey pattern section by id.
    pub fn journey_pattern_section(&self, id: &str) -> Option<&JourneyPatternSection> {
        self.journey_pattern_sections.iter().find(|s| s.id == id)
    }

    /// Looks up a route by id.
    pub fn route_by_id(&self, id: &str) -> Option<&TxcRoute> {
        self.routes.iter().find(|r| r.id == id)
    }

    /// Looks up a route section by id.
    pub fn route_section(&self, id: &str) -> Option<&RouteSection> {
        self.route_sections.iter().find(|s| s.id == id)
    }
}
