//! Schedule container plus blocks and duties derived from it.

use std::collections::BTreeMap;
use std::collections::HashMap;

use itertools::Itertools;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::row::{RowType, ScheduleRow};

/// Provenance of a loaded schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleMetadata {
    /// File the schedule was read from, when known
    pub source_file: Option<String>,
    /// The column mapping the reader settled on
    pub column_mapping: Option<HashMap<String, String>>,
}

/// An ordered run-cut: every vehicle and driver movement of a service day.
///
/// Blocks and duties are derived lazily from the rows, each behind a
/// once-initialization guard, and sorted maps keep derivation deterministic.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// All rows, in file order
    pub rows: Vec<ScheduleRow>,
    /// Provenance
    pub metadata: ScheduleMetadata,
    #[serde(skip)]
    pub(crate) blocks: OnceCell<BTreeMap<String, Block>>,
    #[serde(skip)]
    pub(crate) duties: OnceCell<BTreeMap<String, Duty>>,
}

impl Schedule {
    /// An empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps rows into a schedule.
    pub fn from_rows(rows: Vec<ScheduleRow>) -> Self {
        Self { rows, ..Self::default() }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row, invalidating derived blocks and duties.
    pub fn add_row(&mut self, row: ScheduleRow) {
        self.rows.push(row);
        self.blocks = OnceCell::new();
        self.duties = OnceCell::new();
    }

    /// All revenue rows, in file order.
    pub fn revenue_rows(&self) -> impl Iterator<Item = &ScheduleRow> {
        self.rows.iter().filter(|r| r.is_revenue())
    }

    /// All deadhead rows, in file order.
    pub fn deadhead_rows(&self) -> impl Iterator<Item = &ScheduleRow> {
        self.rows.iter().filter(|r| r.is_deadhead())
    }

    /// Distinct block ids, sorted.
    pub fn block_ids(&self) -> Vec<String> {
        self.rows.iter().filter_map(|r| r.block.clone()).sorted().dedup().collect()
    }

    /// Distinct run numbers, sorted.
    pub fn run_numbers(&self) -> Vec<String> {
        self.rows.iter().filter_map(|r| r.run_number.clone()).sorted().dedup().collect()
    }

    /// Distinct depot codes, sorted.
    pub fn depots(&self) -> Vec<String> {
        self.rows.iter().filter_map(|r| r.depot.clone()).sorted().dedup().collect()
    }

    /// Distinct revenue trip ids, sorted.
    pub fn trip_ids(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.is_revenue())
            .filter_map(|r| r.trip_id.clone())
            .sorted()
            .dedup()
            .collect()
    }

    /// Vehicle blocks grouped from the rows, time-sorted within each block.
    /// Derived on first call; later calls are free.
    pub fn blocks(&self) -> &BTreeMap<String, Block> {
        self.blocks.get_or_init(|| {
            let mut blocks: BTreeMap<String, Block> = BTreeMap::new();
            for row in &self.rows {
                if let Some(block_id) = &row.block {
                    blocks
                        .entry(block_id.clone())
                        .or_insert_with(|| Block::new(block_id.clone()))
                        .add_row(row.clone());
                }
            }
            for block in blocks.values_mut() {
                block.sort_rows_by_time();
            }
            blocks
        })
    }

    /// One block by id.
    pub fn block(&self, block_id: &str) -> Option<&Block> {
        self.blocks().get(block_id)
    }

    /// Driver duties grouped by duty id, falling back to the run number.
    pub fn duties(&self) -> &BTreeMap<String, Duty> {
        self.duties.get_or_init(|| {
            let mut duties: BTreeMap<String, Duty> = BTreeMap::new();
            for row in &self.rows {
                let key = row.duty_id.clone().or_else(|| row.run_number.clone());
                if let Some(duty_id) = key {
                    duties
                        .entry(duty_id.clone())
                        .or_insert_with(|| Duty::new(duty_id))
                        .add_row(row.clone());
                }
            }
            for duty in duties.values_mut() {
                duty.sort_rows_by_time();
            }
            duties
        })
    }

    /// One duty by id.
    pub fn duty(&self, duty_id: &str) -> Option<&Duty> {
        self.duties().get(duty_id)
    }

    /// Headline numbers of the schedule.
    pub fn summary(&self) -> ScheduleSummary {
        ScheduleSummary {
            total_rows: self.rows.len(),
            revenue_rows: self.rows.iter().filter(|r| r.is_revenue()).count(),
            deadheads: self.rows.iter().filter(|r| r.is_deadhead()).count(),
            breaks_and_reliefs: self.rows.iter().filter(|r| r.is_break_or_relief()).count(),
            blocks: self.block_ids().len(),
            runs: self.run_numbers().len(),
            depots: self.depots().len(),
        }
    }
}

/// Headline numbers of a schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    /// All rows
    pub total_rows: usize,
    /// Revenue rows
    pub revenue_rows: usize,
    /// Deadhead rows (pull-out, pull-in, interlining)
    pub deadheads: usize,
    /// Break and relief rows
    pub breaks_and_reliefs: usize,
    /// Distinct blocks
    pub blocks: usize,
    /// Distinct runs
    pub runs: usize,
    /// Distinct depots
    pub depots: usize,
}

/// The work of one vehicle: pull-out, revenue trips, deadheads, pull-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    /// Block identifier
    pub id: String,
    /// Rows of this block, sorted by start time after derivation
    pub rows: Vec<ScheduleRow>,
    /// Depot inherited from the first row that names one
    pub depot: Option<String>,
    /// Vehicle class inherited from the rows
    pub vehicle_class: Option<String>,
    /// Vehicle type inherited from the rows
    pub vehicle_type: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new(id: String) -> Self {
        Self { id, ..Self::default() }
    }

    /// Adds a row, inheriting depot and vehicle fields from the first carrier.
    pub fn add_row(&mut self, row: ScheduleRow) {
        if self.depot.is_none() {
            self.depot = row.depot.clone();
        }
        if self.vehicle_class.is_none() {
            self.vehicle_class = row.vehicle_class.clone();
        }
        if self.vehicle_type.is_none() {
            self.vehicle_type = row.vehicle_type.clone();
        }
        self.rows.push(row);
    }

    /// Sorts rows by start time; rows without one sort first.
    pub fn sort_rows_by_time(&mut self) {
        self.rows.sort_by_key(|r| r.start_time_seconds().unwrap_or(0));
    }

    /// Revenue rows of the block, in time order.
    pub fn revenue_rows(&self) -> impl Iterator<Item = &ScheduleRow> {
        self.rows.iter().filter(|r| r.is_revenue())
    }

    /// The explicit pull-out row, when one exists.
    pub fn pull_out(&self) -> Option<&ScheduleRow> {
        self.rows.iter().find(|r| r.row_type == RowType::PullOut)
    }

    /// The explicit pull-in row, when one exists.
    pub fn pull_in(&self) -> Option<&ScheduleRow> {
        self.rows.iter().rev().find(|r| r.row_type == RowType::PullIn)
    }

    /// Earliest start time across the rows.
    pub fn start_time_seconds(&self) -> Option<u32> {
        self.rows.iter().filter_map(|r| r.start_time_seconds()).min()
    }

    /// Latest end time across the rows.
    pub fn end_time_seconds(&self) -> Option<u32> {
        self.rows.iter().filter_map(|r| r.end_time_seconds()).max()
    }

    /// Span from first start to last end.
    pub fn duration_seconds(&self) -> Option<u32> {
        match (self.start_time_seconds(), self.end_time_seconds()) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

/// The work of one driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Duty {
    /// Duty identifier (or run number when no duty ids exist)
    pub id: String,
    /// Rows of this duty, sorted by start time after derivation
    pub rows: Vec<ScheduleRow>,
}

impl Duty {
    /// An empty duty.
    pub fn new(id: String) -> Self {
        Self { id, rows: Vec::new() }
    }

    /// Adds a row.
    pub fn add_row(&mut self, row: ScheduleRow) {
        self.rows.push(row);
    }

    /// Sorts rows by start time; rows without one sort first.
    pub fn sort_rows_by_time(&mut self) {
        self.rows.sort_by_key(|r| r.start_time_seconds().unwrap_or(0));
    }

    /// Span from first start to last end, the duty length.
    pub fn span_seconds(&self) -> Option<u32> {
        let start = self.rows.iter().filter_map(|r| r.start_time_seconds()).min()?;
        let end = self.rows.iter().filter_map(|r| r.end_time_seconds()).max()?;
        (end >= start).then(|| end - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(block: &str, trip: Option<&str>, start: &str, end: &str) -> ScheduleRow {
        ScheduleRow {
            block: Some(block.to_owned()),
            trip_id: trip.map(String::from),
            start_time: Some(start.to_owned()),
            end_time: Some(end.to_owned()),
            row_type: if trip.is_some() { RowType::Revenue } else { RowType::Deadhead },
            ..ScheduleRow::default()
        }
    }

    #[test]
    fn blocks_are_grouped_and_time_sorted() {
        let schedule = Schedule::from_rows(vec![
            row("B1", Some("T2"), "09:00:00", "10:00:00"),
            row("B1", Some("T1"), "08:00:00", "09:00:00"),
            row("B2", Some("T3"), "08:30:00", "09:30:00"),
        ]);
        let blocks = schedule.blocks();
        assert_eq!(blocks.len(), 2);
        let b1 = &blocks["B1"];
        assert_eq!(b1.rows[0].trip_id.as_deref(), Some("T1"));
        assert_eq!(b1.start_time_seconds(), Some(28_800));
        assert_eq!(b1.duration_seconds(), Some(7_200));
    }

    #[test]
    fn duties_fall_back_to_run_numbers() {
        let mut with_run = row("B1", Some("T1"), "08:00:00", "09:00:00");
        with_run.run_number = Some("R1".into());
        let mut with_duty = row("B1", Some("T2"), "09:00:00", "10:00:00");
        with_duty.duty_id = Some("D1".into());

        let schedule = Schedule::from_rows(vec![with_run, with_duty]);
        let duties = schedule.duties();
        assert!(duties.contains_key("R1"));
        assert!(duties.contains_key("D1"));
    }

    #[test]
    fn summary_counts_row_kinds() {
        let mut deadhead = row("B1", None, "07:45:00", "08:00:00");
        deadhead.row_type = RowType::PullOut;
        let schedule = Schedule::from_rows(vec![
            deadhead,
            row("B1", Some("T1"), "08:00:00", "09:00:00"),
            row("B2", Some("T2"), "08:30:00", "09:30:00"),
        ]);
        let summary = schedule.summary();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.revenue_rows, 2);
        assert_eq!(summary.deadheads, 1);
        assert_eq!(summary.blocks, 2);
    }

    #[test]
    fn add_row_invalidates_derivations() {
        let mut schedule = Schedule::from_rows(vec![row("B1", Some("T1"), "08:00:00", "09:00:00")]);
        assert_eq!(schedule.blocks().len(), 1);
        schedule.add_row(row("B2", Some("T2"), "10:00:00", "11:00:00"));
        assert_eq!(schedule.blocks().len(), 2);
    }
}
