//! Operational-schedule validation: structural rules, duty rules and
//! GTFS-referential checks with stable issue codes.

mod validator;

pub use validator::Validator;

use serde::{Deserialize, Serialize};

/// Which rules fire, and at which severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    /// Every rule is an error
    Strict,
    /// Structural rules and missing references are errors; tolerance
    /// breaches against GTFS are warnings
    #[default]
    Standard,
    /// Structural rules only; the GTFS reference is not consulted
    Lenient,
}

/// Numeric limits of the structural and duty rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRules {
    /// Minimum layover between consecutive revenue trips of a block
    pub min_layover_seconds: u32,
    /// Ceiling on the span of one duty
    pub max_duty_length_seconds: u32,
    /// Driving allowed without a qualifying break
    pub max_continuous_driving_seconds: u32,
    /// How long a break must be to reset continuous driving
    pub min_break_duration_seconds: u32,
    /// Allowed deviation between schedule and GTFS times
    pub time_tolerance_seconds: u32,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            min_layover_seconds: 300,              // 5 minutes
            max_duty_length_seconds: 32_400,       // 9 hours
            max_continuous_driving_seconds: 16_200, // 4.5 hours
            min_break_duration_seconds: 1_800,     // 30 minutes
            time_tolerance_seconds: 60,
        }
    }
}

/// Complete validation configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationConfig {
    /// Which rules fire and at which severity
    pub compliance: ComplianceLevel,
    /// Numeric limits
    pub rules: BusinessRules,
    /// Stop collecting after this many errors
    pub max_errors: Option<usize>,
}

impl ValidationConfig {
    /// Standard compliance with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every rule at error severity.
    pub fn strict() -> Self {
        Self { compliance: ComplianceLevel::Strict, ..Self::default() }
    }

    /// Standard compliance, spelled out.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Structural rules only.
    pub fn lenient() -> Self {
        Self { compliance: ComplianceLevel::Lenient, ..Self::default() }
    }

    /// Replaces the numeric limits.
    pub fn with_rules(mut self, rules: BusinessRules) -> Self {
        self.rules = rules;
        self
    }

    /// Caps how many errors are collected before truncation.
    pub fn with_max_errors(mut self, max: usize) -> Self {
        self.max_errors = Some(max);
        self
    }

    /// Picks the compliance level.
    pub fn with_compliance(mut self, level: ComplianceLevel) -> Self {
        self.compliance = level;
        self
    }
}

/// Broad grouping of an issue, for filtering and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// Per-row structure (time order, overlap)
    Structural,
    /// Block chaining (places, layovers)
    BlockContinuity,
    /// Duty length and driving limits
    DutyRule,
    /// Cross-references into the GTFS feed
    GtfsIntegrity,
}

/// One validation finding with a stable code suitable for suppression lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Stable identifier: `E001`…`E009` for errors, `W001`…`W009` downgraded
    pub code: String,
    /// Broad grouping
    pub category: IssueCategory,
    /// Human-readable description
    pub message: String,
    /// Row index, block or duty the finding belongs to
    pub context: Option<String>,
}

/// The outcome of validating one schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Findings that fail the schedule
    pub errors: Vec<Issue>,
    /// Informational findings
    pub warnings: Vec<Issue>,
    /// Rows inspected
    pub rows_validated: usize,
    /// Blocks inspected
    pub blocks_validated: usize,
    /// Duties inspected
    pub duties_validated: usize,
    /// True when `max_errors` cut the run short
    pub truncated: bool,
}

impl ValidationResult {
    /// No errors were found (warnings do not fail a schedule).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Errors of one category.
    pub fn errors_in(&self, category: IssueCategory) -> Vec<&Issue> {
        self.errors.iter().filter(|e| e.category == category).collect()
    }

    /// Warnings of one category.
    pub fn warnings_in(&self, category: IssueCategory) -> Vec<&Issue> {
        self.warnings.iter().filter(|w| w.category == category).collect()
    }
}
