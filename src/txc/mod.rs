//! TransXChange (TXC) document model and streaming parser.
//!
//! Input only: this crate reads TXC 2.4 and 2.5 and converts to GTFS; it never
//! writes TXC back out.

mod duration;
mod model;
mod parser;

pub use duration::parse_duration_seconds;
pub use model::{
    AnnotatedStopPoint, DateRange, JourneyPattern, JourneyPatternSection,
    JourneyPatternTimingLink, OperatingPeriod, OperatingProfile, Operator, RegularDays,
    RouteLink, RouteSection, TimingStop, TxcDiagnostic, TxcDocument, TxcLine, TxcRoute,
    TxcService, VehicleJourney,
};

#[cfg(test)]
pub(crate) mod tests;
