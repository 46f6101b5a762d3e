//! Inference of missing deadhead movements from geometry and depot rules.

use std::collections::HashMap;

use gtfs_store::GtfsFeed;
use log::debug;

use super::model::{Block, Schedule};
use super::row::{RowType, ScheduleRow};

/// Configuration of the deadhead inferrer.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Depot used when a block names none
    pub default_depot: Option<String>,
    /// Assumed deadhead travel speed
    pub reference_speed_kmh: f64,
    /// Layover that must fit next to an interlining move
    pub min_layover_seconds: u32,
    /// Whether to infer interlining deadheads at all
    pub infer_interlining: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            default_depot: None,
            reference_speed_kmh: 30.0, // urban average
            min_layover_seconds: 300,
            infer_interlining: true,
        }
    }
}

impl InferenceConfig {
    /// Defaults: 30 km/h, 5 minute layover, interlining on, no depot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback depot.
    pub fn with_default_depot(mut self, depot: impl Into<String>) -> Self {
        self.default_depot = Some(depot.into());
        self
    }

    /// Sets the assumed travel speed.
    pub fn with_reference_speed_kmh(mut self, kmh: f64) -> Self {
        self.reference_speed_kmh = kmh;
        self
    }
}

/// Synthesized rows and the blocks that could not be completed.
#[derive(Debug, Clone, Default)]
pub struct InferenceResult {
    /// Pull-outs from depot to first stop
    pub pull_outs: Vec<ScheduleRow>,
    /// Pull-ins from last stop to depot
    pub pull_ins: Vec<ScheduleRow>,
    /// Interlining moves between revenue trips
    pub interlinings: Vec<ScheduleRow>,
    /// Blocks where a required move did not fit or lacked a depot
    pub incomplete_blocks: Vec<String>,
}

impl InferenceResult {
    /// Number of inferred pull-outs.
    pub fn pull_out_count(&self) -> usize {
        self.pull_outs.len()
    }

    /// Number of inferred pull-ins.
    pub fn pull_in_count(&self) -> usize {
        self.pull_ins.len()
    }

    /// Number of inferred interlining moves.
    pub fn interlining_count(&self) -> usize {
        self.interlinings.len()
    }

    /// Every synthesized row.
    pub fn total(&self) -> usize {
        self.pull_outs.len() + self.pull_ins.len() + self.interlinings.len()
    }
}

/// Infers pull-outs, pull-ins and interlining deadheads per block.
///
/// Durations are estimated from the haversine distance at the configured
/// reference speed, rounded up to whole minutes; without usable coordinates a
/// 15 minute fallback applies. When a GTFS feed is supplied its stop
/// coordinates override row-embedded ones.
pub struct DeadheadInferrer {
    config: InferenceConfig,
    stop_coords: HashMap<String, (f64, f64)>,
}

const FALLBACK_DURATION_SECONDS: u32 = 900;

impl DeadheadInferrer {
    /// An inferrer working from row-embedded coordinates only.
    pub fn new(config: InferenceConfig) -> Self {
        Self { config, stop_coords: HashMap::new() }
    }

    /// An inferrer that reads stop coordinates from a GTFS feed.
    pub fn with_feed(config: InferenceConfig, feed: &GtfsFeed) -> Self {
        let stop_coords = feed
            .stops
            .iter()
            .filter_map(|s| s.latitude.zip(s.longitude).map(|c| (s.id.clone(), c)))
            .collect();
        Self { config, stop_coords }
    }

    /// Infers the missing movements of every block, without mutating the
    /// schedule. Blocks are visited in id order, so results are stable.
    pub fn infer(&self, schedule: &Schedule) -> InferenceResult {
        let mut result = InferenceResult::default();
        for block in schedule.blocks().values() {
            self.infer_block(block, &mut result);
        }
        debug!(
            "inferred {} pull-outs, {} pull-ins, {} interlinings; {} incomplete blocks",
            result.pull_out_count(),
            result.pull_in_count(),
            result.interlining_count(),
            result.incomplete_blocks.len()
        );
        result
    }

    fn infer_block(&self, block: &Block, result: &mut InferenceResult) {
        let depot = match block.depot.clone().or_else(|| self.config.default_depot.clone()) {
            Some(depot) => depot,
            None => {
                result.incomplete_blocks.push(block.id.clone());
                return;
            }
        };
        let mut incomplete = false;

        // Pull-out before the first revenue trip.
        if block.pull_out().is_none() {
            if let Some(first) = block.revenue_rows().next() {
                if let Some(start_place) = &first.start_place {
                    if start_place != &depot {
                        result.pull_outs.push(self.depot_move(
                            block,
                            first,
                            &depot,
                            start_place,
                            true,
                        ));
                    }
                }
            }
        }

        // Pull-in after the last revenue trip.
        if block.pull_in().is_none() {
            if let Some(last) = block.revenue_rows().last() {
                if let Some(end_place) = &last.end_place {
                    if end_place != &depot {
                        result.pull_ins.push(self.depot_move(
                            block,
                            last,
                            &depot,
                            end_place,
                            false,
                        ));
                    }
                }
            }
        }

        // Interlining between revenue trips whose places do not chain.
        if self.config.infer_interlining {
            let revenue: Vec<&ScheduleRow> = block.revenue_rows().collect();
            for pair in revenue.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                let (from, to) = match (&prev.end_place, &next.start_place) {
                    (Some(from), Some(to)) if from != to => (from, to),
                    _ => continue,
                };
                let travel = self.travel_seconds(
                    self.coords_for(from, prev.end_lat.zip(prev.end_lon)),
                    self.coords_for(to, next.start_lat.zip(next.start_lon)),
                );
                match (prev.end_time_seconds(), next.start_time_seconds()) {
                    (Some(end), Some(start))
                        if start >= end
                            && start - end >= travel + self.config.min_layover_seconds =>
                    {
                        let mut row = self.base_row(block, RowType::Deadhead);
                        row.start_place = Some(from.clone());
                        row.end_place = Some(to.clone());
                        row.start_time = Some(format_seconds(end));
                        row.end_time = Some(format_seconds(end + travel));
                        result.interlinings.push(row);
                    }
                    _ => incomplete = true,
                }
            }
        }

        if incomplete {
            result.incomplete_blocks.push(block.id.clone());
        }
    }

    /// Builds a pull-out (or pull-in) around the given revenue row.
    fn depot_move(
        &self,
        block: &Block,
        anchor: &ScheduleRow,
        depot: &str,
        place: &str,
        pull_out: bool,
    ) -> ScheduleRow {
        let place_coords = if pull_out {
            self.coords_for(place, anchor.start_lat.zip(anchor.start_lon))
        } else {
            self.coords_for(place, anchor.end_lat.zip(anchor.end_lon))
        };
        // Depots rarely appear in stops.txt; the fallback duration covers them.
        let duration = self.travel_seconds(self.coords_for(depot, None), place_coords);

        let mut row =
            self.base_row(block, if pull_out { RowType::PullOut } else { RowType::PullIn });
        if pull_out {
            row.start_place = Some(depot.to_owned());
            row.end_place = Some(place.to_owned());
            if let Some(start) = anchor.start_time_seconds() {
                row.start_time = Some(format_seconds(start.saturating_sub(duration)));
                row.end_time = Some(format_seconds(start));
            }
        } else {
            row.start_place = Some(place.to_owned());
            row.end_place = Some(depot.to_owned());
            if let Some(end) = anchor.end_time_seconds() {
                row.start_time = Some(format_seconds(end));
                row.end_time = Some(format_seconds(end + duration));
            }
        }
        row
    }

    fn base_row(&self, block: &Block, row_type: RowType) -> ScheduleRow {
        ScheduleRow {
            block: Some(block.id.clone()),
            depot: block.depot.clone().or_else(|| self.config.default_depot.clone()),
            vehicle_class: block.vehicle_class.clone(),
            vehicle_type: block.vehicle_type.clone(),
            row_type,
            inferred: true,
            ..ScheduleRow::default()
        }
    }

    /// GTFS stop coordinates win over row-embedded ones.
    fn coords_for(&self, place: &str, row_coords: Option<(f64, f64)>) -> Option<(f64, f64)> {
        self.stop_coords.get(place).copied().or(row_coords)
    }

    /// Straight-line travel time at the reference speed, rounded up to whole
    /// minutes; a fixed fallback when either endpoint has no coordinates.
    fn travel_seconds(&self, from: Option<(f64, f64)>, to: Option<(f64, f64)>) -> u32 {
        match (from, to) {
            (Some((lat1, lon1)), Some((lat2, lon2))) => {
                let meters = haversine_distance_m(lat1, lon1, lat2, lon2);
                let speed_mps = self.config.reference_speed_kmh / 3.6;
                if speed_mps <= 0.0 {
                    return FALLBACK_DURATION_SECONDS;
                }
                let seconds = meters / speed_mps;
                ((seconds / 60.0).ceil() as u32) * 60
            }
            _ => FALLBACK_DURATION_SECONDS,
        }
    }
}

fn format_seconds(seconds: u32) -> String {
    format!("{:02}:{:02}:{:02}", seconds / 3600, seconds % 3600 / 60, seconds % 60)
}

/// Great-circle distance between two WGS84 points, in meters.
pub(crate) fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * a.sqrt().asin()
}
