use std::path::Path;

use log::info;

use crate::error::ParseWarning;
use crate::{writer, Error, GtfsReader};
use crate::{Agency, Calendar, CalendarDate, Route, Shape, Stop, StopTime, Trip};

/// A columnar snapshot of `stop_times.txt`, one vector per column.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StopTimeColumns {
    /// `trip_id` column
    pub trip_ids: Vec<String>,
    /// `arrival_time` column, seconds since midnight
    pub arrival_times: Vec<Option<u32>>,
    /// `departure_time` column, seconds since midnight
    pub departure_times: Vec<Option<u32>>,
    /// `stop_id` column
    pub stop_ids: Vec<String>,
    /// `stop_sequence` column
    pub stop_sequences: Vec<u32>,
}

/// Data structure with all the GTFS objects of one feed.
///
/// The eight collections are ordered; insertion order is preserved across a
/// load → write round trip but carries no meaning. Indexes built by
/// [crate::GtfsFilter] refer to records through their stable string keys, never
/// through pointers into these vectors.
///
/// This is probably the entry point you want to use:
/// ```no_run
/// let feed = gtfs_store::GtfsFeed::from_path("fixtures/gtfs")?;
/// assert_eq!(feed.stop_count(), 5);
/// # Ok::<(), gtfs_store::Error>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct GtfsFeed {
    /// All agencies of the feed
    pub agencies: Vec<Agency>,
    /// All stops, keyed by `stop_id`
    pub stops: Vec<Stop>,
    /// All routes, keyed by `route_id`
    pub routes: Vec<Route>,
    /// All trips, keyed by `trip_id`
    pub trips: Vec<Trip>,
    /// All stop times, keyed by (`trip_id`, `stop_sequence`)
    pub stop_times: Vec<StopTime>,
    /// All calendars, keyed by `service_id`
    pub calendars: Vec<Calendar>,
    /// All calendar exceptions, keyed by (`service_id`, `date`)
    pub calendar_dates: Vec<CalendarDate>,
    /// All shape points, grouped by `shape_id` through their key
    pub shapes: Vec<Shape>,
    /// Row-level diagnostics collected during a lenient load
    pub warnings: Vec<ParseWarning>,
}

impl GtfsFeed {
    /// Reads a feed from a directory or a zipped archive with default options.
    ///
    /// See [GtfsReader] to configure strictness or unknown-column retention.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        GtfsReader::new().read_from_path(path)
    }

    /// Reads a feed from an unpacked GTFS directory.
    pub fn from_directory<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        GtfsReader::new().read_from_directory(path)
    }

    /// Reads a feed from a zipped archive.
    pub fn from_zip_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        GtfsReader::new().read_from_zip_path(path)
    }

    /// Reads a feed from in-memory ZIP bytes.
    pub fn from_zip_bytes(bytes: &[u8]) -> Result<Self, Error> {
        GtfsReader::new().read_from_zip_bytes(bytes)
    }

    /// Writes the feed as one `.txt` file per table under `path`.
    pub fn write_to_directory<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let files = writer::table_files(self)?;
        writer::write_files_to_directory(&files, path.as_ref())
    }

    /// Writes the feed as a deterministic ZIP archive at `path`.
    pub fn write_to_zip_path<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let bytes = self.write_to_zip_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Writes the feed as a deterministic ZIP archive in memory.
    ///
    /// Byte-identical feeds produce byte-identical archives: entries are
    /// emitted in canonical order with a fixed modification timestamp.
    pub fn write_to_zip_bytes(&self) -> Result<Vec<u8>, Error> {
        let files = writer::table_files(self)?;
        writer::write_files_to_zip_bytes(&files)
    }

    /// Number of agencies
    pub fn agency_count(&self) -> usize {
        self.agencies.len()
    }

    /// Number of stops
    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Number of routes
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Number of trips
    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    /// Number of stop times
    pub fn stop_time_count(&self) -> usize {
        self.stop_times.len()
    }

    /// Number of calendars
    pub fn calendar_count(&self) -> usize {
        self.calendars.len()
    }

    /// Number of calendar exceptions
    pub fn calendar_date_count(&self) -> usize {
        self.calendar_dates.len()
    }

    /// Number of shape points
    pub fn shape_point_count(&self) -> usize {
        self.shapes.len()
    }

    /// Checks the semantic invariants of the feed.
    ///
    /// Dangling references (trip to route, trip to service, stop time to stop
    /// or trip) and non-increasing stop sequences are errors; questionable but
    /// usable data (a trip with fewer than two stop times, decreasing arrival
    /// times) are warnings. Returns the warnings on success and
    /// [Error::FeedValidation] when any error was found.
    pub fn validate(&self) -> Result<Vec<String>, Error> {
        use std::collections::{HashMap, HashSet};

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let route_ids: HashSet<&str> = self.routes.iter().map(|r| r.id.as_str()).collect();
        let stop_ids: HashSet<&str> = self.stops.iter().map(|s| s.id.as_str()).collect();
        let trip_ids: HashSet<&str> = self.trips.iter().map(|t| t.id.as_str()).collect();
        let service_ids: HashSet<&str> = self
            .calendars
            .iter()
            .map(|c| c.service_id.as_str())
            .chain(self.calendar_dates.iter().map(|d| d.service_id.as_str()))
            .collect();

        for trip in &self.trips {
            if !route_ids.contains(trip.route_id.as_str()) {
                errors.push(format!("trip {} references unknown route {}", trip.id, trip.route_id));
            }
            if !service_ids.contains(trip.service_id.as_str()) {
                errors.push(format!(
                    "trip {} references unknown service {}",
                    trip.id, trip.service_id
                ));
            }
        }

        let mut per_trip: HashMap<&str, Vec<&StopTime>> = HashMap::new();
        for stop_time in &self.stop_times {
            if !stop_ids.contains(stop_time.stop_id.as_str()) {
                errors.push(format!(
                    "stop time of trip {} references unknown stop {}",
                    stop_time.trip_id, stop_time.stop_id
                ));
            }
            if !trip_ids.contains(stop_time.trip_id.as_str()) {
                errors.push(format!(
                    "stop time references unknown trip {}",
                    stop_time.trip_id
                ));
            }
            per_trip.entry(stop_time.trip_id.as_str()).or_default().push(stop_time);
        }

        for trip in &self.trips {
            let mut stop_times = per_trip.remove(trip.id.as_str()).unwrap_or_default();
            stop_times.sort_by_key(|st| st.stop_sequence);
            if stop_times.len() < 2 {
                warnings.push(format!("trip {} has fewer than two stop times", trip.id));
            }
            for pair in stop_times.windows(2) {
                if pair[1].stop_sequence == pair[0].stop_sequence {
                    errors.push(format!(
                        "trip {} repeats stop sequence {}",
                        trip.id, pair[0].stop_sequence
                    ));
                }
                if let (Some(prev), Some(next)) = (pair[0].arrival_time, pair[1].arrival_time) {
                    if next < prev {
                        warnings.push(format!(
                            "trip {} has decreasing arrival times at sequence {}",
                            trip.id, pair[1].stop_sequence
                        ));
                    }
                }
            }
        }

        for calendar in &self.calendars {
            if calendar.end_date < calendar.start_date {
                errors.push(format!(
                    "calendar {} ends before it starts",
                    calendar.service_id
                ));
            }
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(Error::FeedValidation { errors, warnings })
        }
    }

    /// Column-oriented snapshot of the stop-times table.
    ///
    /// The one interop primitive exposed for external dataframe adapters:
    /// parallel columns in row order, detached from the feed.
    pub fn stop_time_columns(&self) -> StopTimeColumns {
        StopTimeColumns {
            trip_ids: self.stop_times.iter().map(|st| st.trip_id.clone()).collect(),
            arrival_times: self.stop_times.iter().map(|st| st.arrival_time).collect(),
            departure_times: self.stop_times.iter().map(|st| st.departure_time).collect(),
            stop_ids: self.stop_times.iter().map(|st| st.stop_id.clone()).collect(),
            stop_sequences: self.stop_times.iter().map(|st| st.stop_sequence).collect(),
        }
    }

    /// Logs basic statistics about the feed, mostly to check everything was read.
    pub fn log_stats(&self) {
        info!(
            "GTFS feed: {} agencies, {} stops, {} routes, {} trips, {} stop times, {} calendars, {} exceptions, {} shape points",
            self.agency_count(),
            self.stop_count(),
            self.route_count(),
            self.trip_count(),
            self.stop_time_count(),
            self.calendar_count(),
            self.calendar_date_count(),
            self.shape_point_count(),
        );
    }
}
