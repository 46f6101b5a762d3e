//! The schedule rule engine.

use gtfs_store::{FeedTables, GtfsFilter};

use super::{ComplianceLevel, Issue, IssueCategory, ValidationConfig, ValidationResult};
use crate::error::Result;
use crate::schedule::deadhead::haversine_distance_m;
use crate::schedule::model::{Block, Duty, Schedule};
use crate::schedule::row::RowType;

/// How far apart a schedule place and a GTFS stop may sit and still count as
/// the same location, when ids differ but coordinates exist.
const PLACE_MATCH_RADIUS_M: f64 = 25.0;

/// Validates run-cuts against structural rules, duty rules and a GTFS feed.
pub struct Validator {
    config: ValidationConfig,
}

struct Sink {
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
    max_errors: Option<usize>,
    truncated: bool,
}

impl Sink {
    fn new(max_errors: Option<usize>) -> Self {
        Self { errors: Vec::new(), warnings: Vec::new(), max_errors, truncated: false }
    }

    /// Records an error; returns false once the error budget is spent.
    fn error(
        &mut self,
        code: &str,
        category: IssueCategory,
        message: String,
        context: Option<String>,
    ) -> bool {
        if self.truncated {
            return false;
        }
        self.errors.push(Issue { code: code.to_owned(), category, message, context });
        if let Some(max) = self.max_errors {
            if self.errors.len() >= max {
                self.truncated = true;
                return false;
            }
        }
        true
    }

    fn warning(
        &mut self,
        code: &str,
        category: IssueCategory,
        message: String,
        context: Option<String>,
    ) {
        self.warnings.push(Issue { code: code.to_owned(), category, message, context });
    }

    fn open(&self) -> bool {
        !self.truncated
    }
}

impl Validator {
    /// A validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// A validator at standard compliance with default limits.
    pub fn with_defaults() -> Self {
        Self::new(ValidationConfig::new())
    }

    /// Runs the structural rules only (no GTFS reference needed).
    pub fn validate_structure(&self, schedule: &Schedule) -> ValidationResult {
        let mut sink = Sink::new(self.config.max_errors);
        self.check_row_times(schedule, &mut sink);
        self.check_blocks(schedule, &mut sink);
        self.check_duties(schedule, &mut sink);
        self.finish(schedule, sink)
    }

    /// Runs the structural rules and, unless compliance is lenient, the
    /// GTFS-referential rules through the given filter.
    pub fn validate<S: FeedTables>(
        &self,
        schedule: &Schedule,
        filter: &GtfsFilter<'_, S>,
    ) -> Result<ValidationResult> {
        let mut sink = Sink::new(self.config.max_errors);
        self.check_row_times(schedule, &mut sink);
        self.check_blocks(schedule, &mut sink);
        self.check_duties(schedule, &mut sink);
        if self.config.compliance != ComplianceLevel::Lenient {
            self.check_gtfs(schedule, filter, &mut sink)?;
        }
        Ok(self.finish(schedule, sink))
    }

    fn finish(&self, schedule: &Schedule, sink: Sink) -> ValidationResult {
        ValidationResult {
            errors: sink.errors,
            warnings: sink.warnings,
            rows_validated: schedule.len(),
            blocks_validated: schedule.blocks().len(),
            duties_validated: schedule.duties().len(),
            truncated: sink.truncated,
        }
    }

    /// R1: every row ends at or after its start.
    fn check_row_times(&self, schedule: &Schedule, sink: &mut Sink) {
        for (index, row) in schedule.rows.iter().enumerate() {
            if let (Some(start), Some(end)) = (row.start_time_seconds(), row.end_time_seconds()) {
                if end < start && !sink.error(
                    "E001",
                    IssueCategory::Structural,
                    format!("row ends at {} before it starts at {}", end, start),
                    Some(format!("row {}", index)),
                ) {
                    return;
                }
            }
        }
    }

    /// R2 and R5 over every block.
    fn check_blocks(&self, schedule: &Schedule, sink: &mut Sink) {
        for block in schedule.blocks().values() {
            self.check_block(block, sink);
            if !sink.open() {
                return;
            }
        }
    }

    fn check_block(&self, block: &Block, sink: &mut Sink) {
        let rows = &block.rows;
        for pair in rows.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);

            // R5: no two rows of a block overlap in time.
            if let (Some(prev_end), Some(next_start)) =
                (prev.end_time_seconds(), next.start_time_seconds())
            {
                if next_start < prev_end
                    && !sink.error(
                        "E005",
                        IssueCategory::Structural,
                        format!(
                            "rows overlap in time: one ends at {} after the next starts at {}",
                            prev_end, next_start
                        ),
                        Some(format!("block {}", block.id)),
                    )
                {
                    return;
                }
            }

            // R2: adjacent rows chain spatially.
            if let (Some(end_place), Some(start_place)) = (&prev.end_place, &next.start_place) {
                if end_place != start_place
                    && !sink.error(
                        "E002",
                        IssueCategory::BlockContinuity,
                        format!(
                            "block is discontinuous: a row ends at '{}' and the next starts at '{}'",
                            end_place, start_place
                        ),
                        Some(format!("block {}", block.id)),
                    )
                {
                    return;
                }
            }
        }

        // R2: the layover floor between consecutive revenue trips.
        let revenue: Vec<_> = block.revenue_rows().collect();
        for pair in revenue.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if let (Some(prev_end), Some(next_start)) =
                (prev.end_time_seconds(), next.start_time_seconds())
            {
                let gap = next_start.saturating_sub(prev_end);
                if next_start >= prev_end
                    && gap < self.config.rules.min_layover_seconds
                    && !sink.error(
                        "E002",
                        IssueCategory::BlockContinuity,
                        format!(
                            "layover of {} seconds between trips is below the floor of {}",
                            gap, self.config.rules.min_layover_seconds
                        ),
                        Some(format!("block {}", block.id)),
                    )
                {
                    return;
                }
            }
        }
    }

    /// R3 and R4 over every duty.
    fn check_duties(&self, schedule: &Schedule, sink: &mut Sink) {
        for duty in schedule.duties().values() {
            self.check_duty(duty, sink);
            if !sink.open() {
                return;
            }
        }
    }

    fn check_duty(&self, duty: &Duty, sink: &mut Sink) {
        // R3: duty-length ceiling.
        if let Some(span) = duty.span_seconds() {
            if span > self.config.rules.max_duty_length_seconds
                && !sink.error(
                    "E003",
                    IssueCategory::DutyRule,
                    format!(
                        "duty spans {} seconds, above the ceiling of {}",
                        span, self.config.rules.max_duty_length_seconds
                    ),
                    Some(format!("duty {}", duty.id)),
                )
            {
                return;
            }
        }

        // R4: continuous-driving cap. A qualifying break row, or an idle gap
        // at least as long as one, resets the clock.
        let rules = &self.config.rules;
        let mut continuous = 0u32;
        let mut last_end: Option<u32> = None;
        for row in &duty.rows {
            let start = row.start_time_seconds();
            if let (Some(last), Some(start)) = (last_end, start) {
                if start.saturating_sub(last) >= rules.min_break_duration_seconds {
                    continuous = 0;
                }
            }
            match row.row_type {
                RowType::Break | RowType::Relief | RowType::Layover => {
                    if row.duration_seconds().unwrap_or(0) >= rules.min_break_duration_seconds {
                        continuous = 0;
                    }
                }
                RowType::Revenue | RowType::PullOut | RowType::PullIn | RowType::Deadhead => {
                    continuous += row.duration_seconds().unwrap_or(0);
                    if continuous > rules.max_continuous_driving_seconds {
                        sink.error(
                            "E004",
                            IssueCategory::DutyRule,
                            format!(
                                "{} seconds of continuous driving exceed the cap of {}",
                                continuous, rules.max_continuous_driving_seconds
                            ),
                            Some(format!("duty {}", duty.id)),
                        );
                        return;
                    }
                }
            }
            if let Some(end) = row.end_time_seconds() {
                last_end = Some(end);
            }
        }
    }

    /// R6 through R9 against the GTFS reference.
    fn check_gtfs<S: FeedTables>(
        &self,
        schedule: &Schedule,
        filter: &GtfsFilter<'_, S>,
        sink: &mut Sink,
    ) -> Result<()> {
        let strict = self.config.compliance == ComplianceLevel::Strict;
        let tolerance = self.config.rules.time_tolerance_seconds;

        for (index, row) in schedule.rows.iter().enumerate() {
            if !sink.open() {
                return Ok(());
            }
            if !row.is_revenue() {
                continue;
            }
            let trip_id = match &row.trip_id {
                Some(id) => id,
                None => continue,
            };
            let context = Some(format!("row {}, trip {}", index, trip_id));

            // R6: the trip must exist. Missing references are errors even at
            // standard compliance.
            if filter.trip(trip_id)?.is_none() {
                sink.error(
                    "E006",
                    IssueCategory::GtfsIntegrity,
                    format!("trip '{}' does not exist in the GTFS feed", trip_id),
                    context,
                );
                continue;
            }

            let stop_times = filter.stop_times_for_trip(trip_id)?;
            let (first, last) = match (stop_times.first(), stop_times.last()) {
                (Some(first), Some(last)) => (*first, *last),
                _ => continue,
            };

            // R7: start time within tolerance of the first departure.
            if let (Some(scheduled), Some(reference)) =
                (row.start_time_seconds(), first.departure_time)
            {
                if scheduled.abs_diff(reference) > tolerance {
                    self.tolerance_issue(
                        sink,
                        strict,
                        7,
                        format!(
                            "schedule start deviates from GTFS by {} seconds",
                            scheduled.abs_diff(reference)
                        ),
                        context.clone(),
                    );
                }
            }

            // R8: end time within tolerance of the last arrival.
            if let (Some(scheduled), Some(reference)) =
                (row.end_time_seconds(), last.arrival_time)
            {
                if scheduled.abs_diff(reference) > tolerance {
                    self.tolerance_issue(
                        sink,
                        strict,
                        8,
                        format!(
                            "schedule end deviates from GTFS by {} seconds",
                            scheduled.abs_diff(reference)
                        ),
                        context.clone(),
                    );
                }
            }

            // R9: start and end places match the first and last stops.
            if let Some(place) = &row.start_place {
                if !self.place_matches(
                    filter,
                    place,
                    &first.stop_id,
                    row.start_lat.zip(row.start_lon),
                )? {
                    self.tolerance_issue(
                        sink,
                        strict,
                        9,
                        format!(
                            "schedule starts at '{}' but the trip starts at stop '{}'",
                            place, first.stop_id
                        ),
                        context.clone(),
                    );
                }
            }
            if let Some(place) = &row.end_place {
                if !self.place_matches(
                    filter,
                    place,
                    &last.stop_id,
                    row.end_lat.zip(row.end_lon),
                )? {
                    self.tolerance_issue(
                        sink,
                        strict,
                        9,
                        format!(
                            "schedule ends at '{}' but the trip ends at stop '{}'",
                            place, last.stop_id
                        ),
                        context,
                    );
                }
            }
        }
        Ok(())
    }

    /// Same place when the ids are equal, or when both sides have coordinates
    /// within [PLACE_MATCH_RADIUS_M].
    fn place_matches<S: FeedTables>(
        &self,
        filter: &GtfsFilter<'_, S>,
        place: &str,
        stop_id: &str,
        row_coords: Option<(f64, f64)>,
    ) -> Result<bool> {
        if place == stop_id {
            return Ok(true);
        }
        if let (Some((row_lat, row_lon)), Some(stop)) = (row_coords, filter.stop(stop_id)?) {
            if let (Some(stop_lat), Some(stop_lon)) = (stop.latitude, stop.longitude) {
                let distance = haversine_distance_m(row_lat, row_lon, stop_lat, stop_lon);
                return Ok(distance <= PLACE_MATCH_RADIUS_M);
            }
        }
        Ok(false)
    }

    fn tolerance_issue(
        &self,
        sink: &mut Sink,
        strict: bool,
        rule: u32,
        message: String,
        context: Option<String>,
    ) {
        if strict {
            sink.error(
                &format!("E{:03}", rule),
                IssueCategory::GtfsIntegrity,
                message,
                context,
            );
        } else {
            sink.warning(
                &format!("W{:03}", rule),
                IssueCategory::GtfsIntegrity,
                message,
                context,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::row::ScheduleRow;
    use gtfs_store::{Calendar, GtfsFeed, Stop, StopTime, Trip};

    fn revenue(trip: &str, block: &str, start: &str, end: &str) -> ScheduleRow {
        ScheduleRow {
            trip_id: Some(trip.to_owned()),
            block: Some(block.to_owned()),
            run_number: Some(format!("R_{}", block)),
            start_time: Some(start.to_owned()),
            end_time: Some(end.to_owned()),
            start_place: Some("S1".to_owned()),
            end_place: Some("S1".to_owned()),
            row_type: RowType::Revenue,
            ..ScheduleRow::default()
        }
    }

    fn reference_feed() -> GtfsFeed {
        let mut feed = GtfsFeed::default();
        feed.stops.push(Stop {
            id: "S1".into(),
            name: "First".into(),
            latitude: Some(51.4500),
            longitude: Some(-2.5800),
            ..Stop::default()
        });
        feed.stops.push(Stop {
            id: "S2".into(),
            name: "Last".into(),
            latitude: Some(51.4600),
            longitude: Some(-2.5900),
            ..Stop::default()
        });
        feed.trips.push(Trip {
            id: "T1".into(),
            route_id: "R1".into(),
            service_id: "svc".into(),
            ..Trip::default()
        });
        feed.stop_times.push(StopTime {
            trip_id: "T1".into(),
            arrival_time: Some(8 * 3600 + 150),
            departure_time: Some(8 * 3600 + 150),
            stop_id: "S1".into(),
            stop_sequence: 1,
            ..StopTime::default()
        });
        feed.stop_times.push(StopTime {
            trip_id: "T1".into(),
            arrival_time: Some(9 * 3600),
            departure_time: Some(9 * 3600),
            stop_id: "S2".into(),
            stop_sequence: 2,
            ..StopTime::default()
        });
        feed.calendars.push(Calendar {
            service_id: "svc".into(),
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: false,
            sunday: false,
            start_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            extras: Vec::new(),
        });
        feed
    }

    #[test]
    fn clean_schedule_is_valid() {
        let schedule = Schedule::from_rows(vec![
            revenue("T1", "B1", "08:00:00", "09:00:00"),
            revenue("T2", "B1", "09:10:00", "10:00:00"),
        ]);
        let result = Validator::with_defaults().validate_structure(&schedule);
        assert!(result.is_valid());
        assert_eq!(result.rows_validated, 2);
        assert_eq!(result.blocks_validated, 1);
    }

    #[test]
    fn reversed_times_fail_r1() {
        let schedule = Schedule::from_rows(vec![revenue("T1", "B1", "09:00:00", "08:00:00")]);
        let result = Validator::with_defaults().validate_structure(&schedule);
        assert!(!result.is_valid());
        assert_eq!(result.errors[0].code, "E001");
        assert_eq!(result.errors[0].category, IssueCategory::Structural);
    }

    #[test]
    fn overlapping_rows_fail_r5() {
        let schedule = Schedule::from_rows(vec![
            revenue("T1", "B1", "08:00:00", "09:00:00"),
            revenue("T2", "B1", "08:30:00", "10:00:00"),
        ]);
        let result = Validator::with_defaults().validate_structure(&schedule);
        assert!(result.errors.iter().any(|e| e.code == "E005"));
    }

    #[test]
    fn place_discontinuity_fails_r2() {
        let mut first = revenue("T1", "B1", "08:00:00", "09:00:00");
        first.end_place = Some("A".into());
        let mut second = revenue("T2", "B1", "09:10:00", "10:00:00");
        second.start_place = Some("B".into());
        let schedule = Schedule::from_rows(vec![first, second]);
        let result = Validator::with_defaults().validate_structure(&schedule);
        let continuity: Vec<_> =
            result.errors.iter().filter(|e| e.code == "E002").collect();
        assert!(!continuity.is_empty());
        assert!(continuity[0].message.contains("discontinuous"));
    }

    #[test]
    fn short_layover_fails_r2() {
        let schedule = Schedule::from_rows(vec![
            revenue("T1", "B1", "08:00:00", "09:00:00"),
            revenue("T2", "B1", "09:02:00", "10:00:00"),
        ]);
        let result = Validator::with_defaults().validate_structure(&schedule);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == "E002" && e.message.contains("layover")));
    }

    #[test]
    fn long_duty_fails_r3() {
        let schedule = Schedule::from_rows(vec![
            revenue("T1", "B1", "06:00:00", "10:00:00"),
            revenue("T2", "B1", "10:10:00", "16:30:00"),
        ]);
        // Span 06:00 to 16:30 is 10.5 hours against a 9 hour ceiling.
        let result = Validator::with_defaults().validate_structure(&schedule);
        assert!(result.errors.iter().any(|e| e.code == "E003"));
    }

    #[test]
    fn continuous_driving_fails_r4_without_a_break() {
        let schedule = Schedule::from_rows(vec![
            revenue("T1", "B1", "06:00:00", "08:30:00"),
            revenue("T2", "B1", "08:32:00", "11:10:00"),
        ]);
        // 2.5 h + 2.63 h of driving with a 2 minute turn is over the 4.5 h cap.
        let mut config = ValidationConfig::new();
        config.rules.min_layover_seconds = 0;
        let result = Validator::new(config).validate_structure(&schedule);
        assert!(result.errors.iter().any(|e| e.code == "E004"));
    }

    #[test]
    fn a_qualifying_break_resets_r4() {
        let mut break_row = ScheduleRow {
            block: Some("B1".into()),
            run_number: Some("R_B1".into()),
            start_time: Some("08:30:00".into()),
            end_time: Some("09:05:00".into()),
            row_type: RowType::Break,
            ..ScheduleRow::default()
        };
        break_row.start_place = Some("S1".into());
        break_row.end_place = Some("S1".into());
        let schedule = Schedule::from_rows(vec![
            revenue("T1", "B1", "06:00:00", "08:30:00"),
            break_row,
            revenue("T2", "B1", "09:05:00", "11:40:00"),
        ]);
        let mut config = ValidationConfig::new();
        config.rules.min_layover_seconds = 0;
        let result = Validator::new(config).validate_structure(&schedule);
        assert!(!result.errors.iter().any(|e| e.code == "E004"));
    }

    #[test]
    fn unknown_trip_fails_r6_even_at_standard() {
        let feed = reference_feed();
        let filter = GtfsFilter::new(&feed);
        let schedule = Schedule::from_rows(vec![revenue("GHOST", "B1", "08:00:00", "09:00:00")]);
        let result = Validator::with_defaults().validate(&schedule, &filter).unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.errors[0].code, "E006");
        assert_eq!(result.errors[0].category, IssueCategory::GtfsIntegrity);
    }

    #[test]
    fn start_deviation_is_w007_at_standard_and_e007_at_strict() {
        let feed = reference_feed();
        let filter = GtfsFilter::new(&feed);
        // GTFS first departure is 08:02:30; the schedule says 08:00:00.
        let mut row = revenue("T1", "B1", "08:00:00", "09:00:00");
        row.end_place = Some("S2".into());
        let schedule = Schedule::from_rows(vec![row]);

        let standard = Validator::with_defaults().validate(&schedule, &filter).unwrap();
        assert!(standard.is_valid());
        assert!(standard.warnings.iter().any(|w| w.code == "W007"
            && w.message.contains("start deviates")));

        let strict = Validator::new(ValidationConfig::strict())
            .validate(&schedule, &filter)
            .unwrap();
        assert!(!strict.is_valid());
        assert!(strict.errors.iter().any(|e| e.code == "E007"));
    }

    #[test]
    fn place_mismatch_is_rule_9_with_coordinate_fallback() {
        let feed = reference_feed();
        let filter = GtfsFilter::new(&feed);

        // Same coordinates as stop S1 under a different name: no finding.
        let mut near = revenue("T1", "B1", "08:02:30", "09:00:00");
        near.start_place = Some("DEPOT_GATE".into());
        near.start_lat = Some(51.4500);
        near.start_lon = Some(-2.5800);
        near.end_place = Some("S2".into());
        let schedule = Schedule::from_rows(vec![near]);
        let result = Validator::with_defaults().validate(&schedule, &filter).unwrap();
        assert!(!result.warnings.iter().any(|w| w.code == "W009"));

        // A kilometre away: rule 9 fires.
        let mut far = revenue("T1", "B1", "08:02:30", "09:00:00");
        far.start_place = Some("ELSEWHERE".into());
        far.start_lat = Some(51.4600);
        far.start_lon = Some(-2.5800);
        far.end_place = Some("S2".into());
        let schedule = Schedule::from_rows(vec![far]);
        let result = Validator::with_defaults().validate(&schedule, &filter).unwrap();
        assert!(result.warnings.iter().any(|w| w.code == "W009"));
    }

    #[test]
    fn lenient_skips_the_gtfs_rules() {
        let feed = reference_feed();
        let filter = GtfsFilter::new(&feed);
        let schedule = Schedule::from_rows(vec![revenue("GHOST", "B1", "08:00:00", "09:00:00")]);
        let result = Validator::new(ValidationConfig::lenient())
            .validate(&schedule, &filter)
            .unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn max_errors_truncates() {
        let schedule = Schedule::from_rows(vec![
            revenue("T1", "B1", "09:00:00", "08:00:00"),
            revenue("T2", "B2", "10:00:00", "08:00:00"),
            revenue("T3", "B3", "11:00:00", "08:00:00"),
        ]);
        let config = ValidationConfig::new().with_max_errors(2);
        let result = Validator::new(config).validate_structure(&schedule);
        assert_eq!(result.error_count(), 2);
        assert!(result.truncated);
    }
}
