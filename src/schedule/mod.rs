//! Operational schedules (run-cuts): reading, validation, deadhead inference
//! and export.

mod deadhead;
mod export;
mod model;
mod reader;
mod row;
pub mod validation;

pub use deadhead::{DeadheadInferrer, InferenceConfig, InferenceResult};
pub use export::{ColumnSpec, CsvExporter, ExportConfig, ExportPreset, TimeFormat};
pub use model::{Block, Duty, Schedule, ScheduleMetadata, ScheduleSummary};
pub use reader::{ColumnMapping, ReadOptions, ScheduleReader};
pub use row::{parse_row_time, RowType, ScheduleRow};
pub use validation::{
    BusinessRules, ComplianceLevel, Issue, IssueCategory, ValidationConfig, ValidationResult,
    Validator,
};
