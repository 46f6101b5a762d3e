//! Cross-component scenarios: TXC in, GTFS out, schedules validated against it.

use crate::convert::TxcConverter;
use crate::schedule::{
    CsvExporter, ExportPreset, ReadOptions, RowType, ScheduleReader, ValidationConfig, Validator,
};
use crate::txc::tests::SAMPLE_TXC;
use crate::txc::TxcDocument;
use crate::{GtfsFeed, GtfsFilter, LazyGtfsFeed};

fn converted_feed() -> GtfsFeed {
    let doc = TxcDocument::from_str(SAMPLE_TXC);
    TxcConverter::with_defaults().convert(&doc).unwrap().feed
}

#[test]
fn converted_feed_round_trips_through_zip() {
    let feed = converted_feed();
    let bytes = feed.write_to_zip_bytes().unwrap();
    let reloaded = GtfsFeed::from_zip_bytes(&bytes).unwrap();

    assert_eq!(reloaded.agency_count(), feed.agency_count());
    assert_eq!(reloaded.route_count(), feed.route_count());
    assert_eq!(reloaded.trip_count(), feed.trip_count());
    assert_eq!(reloaded.stop_time_count(), feed.stop_time_count());
    assert_eq!(reloaded.calendars, feed.calendars);
    assert_eq!(reloaded.stop_times, feed.stop_times);
}

#[test]
fn converted_feed_loads_lazily_with_matching_counts() {
    let bytes = converted_feed().write_to_zip_bytes().unwrap();
    let lazy = LazyGtfsFeed::from_zip_bytes(bytes).unwrap();
    assert_eq!(lazy.trip_count().unwrap(), 5);
    assert_eq!(lazy.stop_time_count().unwrap(), 16);

    let filter = GtfsFilter::new(&lazy);
    let stop_times = filter.stop_times_for_trip("VJ_1").unwrap();
    assert_eq!(stop_times.len(), 4);
}

#[test]
fn converted_feed_answers_date_queries() {
    let feed = converted_feed();
    let filter = GtfsFilter::new(&feed);

    // 2025-02-03 is a Monday inside the operating period.
    let weekday_trips = filter.trips_on_date("2025-02-03").unwrap();
    assert_eq!(weekday_trips.len(), 4);
    assert!(weekday_trips.iter().all(|t| t.id != "VJ_5"));

    // 2025-02-08 is a Saturday: only the Saturday journey runs.
    let saturday_trips = filter.trips_on_date("2025-02-08").unwrap();
    assert_eq!(saturday_trips.len(), 1);
    assert_eq!(saturday_trips[0].id, "VJ_5");

    // Half-term Monday 2025-02-17 is a special non-operation day.
    let half_term = filter.trips_on_date("2025-02-17").unwrap();
    assert!(half_term.is_empty());
}

#[test]
fn schedule_validates_against_a_converted_feed() {
    let feed = converted_feed();
    let filter = GtfsFilter::new(&feed);

    // VJ_1 really departs 07:30:00 and arrives 07:43:00.
    let csv = "\
run,block,origin,destination,depart,arrive,trip_id
R1,B1,0100BRP90310,0100BRP90313,07:30:00,07:43:00,VJ_1
";
    let schedule = ScheduleReader::read_str(csv, ReadOptions::new()).unwrap();
    let result = Validator::with_defaults().validate(&schedule, &filter).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn deviating_schedule_start_warns_then_fails() {
    let feed = converted_feed();
    let filter = GtfsFilter::new(&feed);

    // Three minutes off the 07:30:00 departure with a 60 second tolerance.
    let csv = "\
run,block,origin,destination,depart,arrive,trip_id
R1,B1,0100BRP90310,0100BRP90313,07:33:00,07:43:00,VJ_1
";
    let schedule = ScheduleReader::read_str(csv, ReadOptions::new()).unwrap();

    let standard = Validator::with_defaults().validate(&schedule, &filter).unwrap();
    assert!(standard.is_valid());
    assert!(standard.warnings.iter().any(|w| w.code == "W007"));

    let strict = Validator::new(ValidationConfig::strict())
        .validate(&schedule, &filter)
        .unwrap();
    assert!(!strict.is_valid());
    assert!(strict.errors.iter().any(|e| e.code == "E007"));
}

#[test]
fn schedule_flows_from_csv_to_preset_export() {
    let csv = "\
run,block,origin,destination,depart,arrive,trip_id,type
R1,B1,NORTH,0100BRP90310,07:15:00,07:30:00,,pull_out
R1,B1,0100BRP90310,0100BRP90313,07:30:00,07:43:00,VJ_1,revenue
R1,B1,0100BRP90313,NORTH,07:43:00,08:00:00,,pull_in
";
    let schedule = ScheduleReader::read_str(csv, ReadOptions::new()).unwrap();
    assert_eq!(schedule.rows[0].row_type, RowType::PullOut);
    assert_eq!(schedule.summary().revenue_rows, 1);

    let output = CsvExporter::with_preset(ExportPreset::Optibus)
        .write_string(&schedule)
        .unwrap();
    assert!(output.starts_with("Run,Block,Activity"));
    assert_eq!(output.lines().count(), 4);
}
