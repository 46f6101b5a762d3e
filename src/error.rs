//! Module for the error management
use thiserror::Error;

/// An error that can occur when parsing TXC, converting to GTFS, or working
/// with operational schedules.
#[derive(Error, Debug)]
pub enum Error {
    /// Anything raised by the underlying GTFS store
    #[error(transparent)]
    Gtfs(#[from] gtfs_store::Error),
    /// The TXC document path does not exist
    #[error("TXC document not found: {path}")]
    TxcNotFound {
        /// Path that was probed
        path: String,
    },
    /// A TXC element could not be parsed (only raised for structurally
    /// required pieces; malformed XML soft-fails into an empty document)
    #[error("could not parse TXC element <{element}> near line {line}: {reason}")]
    TxcParse {
        /// Local name of the offending element
        element: String,
        /// Approximate line of the failure
        line: u64,
        /// What went wrong
        reason: String,
    },
    /// The document violated TXC semantics
    #[error("TXC document (schema {schema_version}) failed validation with {} error(s)", errors.len())]
    TxcValidation {
        /// Schema version declared by the document
        schema_version: String,
        /// The individual violations
        errors: Vec<String>,
    },
    /// The converter refused to produce a record
    #[error("cannot map {source_type} to {target_type}: field '{field}': {reason}")]
    Mapping {
        /// TXC construct being converted
        source_type: String,
        /// GTFS artifact that could not be produced
        target_type: String,
        /// Field that caused the refusal
        field: String,
        /// What went wrong
        reason: String,
    },
    /// An operating profile could not be expanded into calendar rows
    #[error("cannot expand operating profile for service {service_id}: {reason}")]
    CalendarConversion {
        /// The minted or source service identifier
        service_id: String,
        /// What went wrong
        reason: String,
    },
    /// A schedule CSV could not be read
    #[error("could not parse schedule: {reason}")]
    ScheduleParse {
        /// What went wrong
        reason: String,
    },
    /// An export preset name did not match any known preset
    #[error("unknown export preset '{0}'; expected one of default, minimal, extended, optibus, hastus, gtfs_block")]
    UnknownPreset(String),
    /// The operation was aborted through its cancellation token
    #[error("operation cancelled")]
    Cancelled,
    /// Generic Input/Output error
    #[error("impossible to read file")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
