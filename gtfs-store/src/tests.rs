use std::io::Write;

use chrono::NaiveDate;

use crate::*;

const AGENCY: &str = "\
agency_id,agency_name,agency_url,agency_timezone
agency_1,Test Transit Agency,https://example.com,America/New_York
agency_2,Second Agency,https://second.example.com,America/New_York
";

const STOPS: &str = "\
stop_id,stop_name,stop_lat,stop_lon
stop_1,Main Street Station,40.712776,-74.005974
stop_2,Oak Avenue,40.714541,-74.002200
stop_3,Pine Plaza,40.717488,-73.998672
stop_4,Central Hub,40.720134,-73.995125
stop_5,Platform 1,40.720134,-73.995125
";

const ROUTES: &str = "\
route_id,agency_id,route_short_name,route_long_name,route_type
route_1,agency_1,1,Main Line,3
route_2,agency_1,2,Crosstown,3
route_3,agency_2,3,Express,3
";

const TRIPS: &str = "\
trip_id,route_id,service_id,trip_headsign
trip_1,route_1,weekday,Northbound to Central
trip_2,route_1,weekday,Southbound to Main
trip_3,route_2,weekday,Crosstown Local
trip_4,route_1,weekend,Northbound to Central
trip_5,route_3,weekend,Express Service
";

const STOP_TIMES: &str = "\
trip_id,arrival_time,departure_time,stop_id,stop_sequence
trip_1,08:00:00,08:00:00,stop_1,1
trip_1,08:05:00,08:06:00,stop_2,2
trip_1,08:10:00,08:11:00,stop_3,3
trip_1,08:15:00,08:15:00,stop_4,4
trip_2,09:00:00,09:00:00,stop_4,1
trip_2,09:05:00,09:06:00,stop_3,2
trip_2,09:10:00,09:11:00,stop_2,3
trip_2,09:15:00,09:15:00,stop_1,4
trip_3,10:00:00,10:00:00,stop_2,1
trip_3,10:07:00,10:07:00,stop_5,2
trip_4,11:00:00,11:00:00,stop_1,1
trip_4,11:15:00,11:15:00,stop_4,2
trip_5,23:30:00,23:30:00,stop_1,1
trip_5,24:10:00,24:12:00,stop_3,2
trip_5,25:00:00,25:00:00,stop_5,3
trip_5,,,stop_4,4
";

const CALENDAR: &str = "\
service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date
weekday,1,1,1,1,1,0,0,20250101,20251231
weekend,0,0,0,0,0,1,1,20250101,20251231
";

const CALENDAR_DATES: &str = "\
service_id,date,exception_type
weekday,20250704,2
weekend,20250704,1
special,20250601,1
";

const SHAPES: &str = "\
shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence
shape_1,40.712776,-74.005974,1
shape_1,40.714541,-74.0022,2
shape_1,40.717488,-73.998672,3
";

fn fixture_tables() -> Vec<(&'static str, &'static str)> {
    vec![
        ("agency.txt", AGENCY),
        ("stops.txt", STOPS),
        ("routes.txt", ROUTES),
        ("trips.txt", TRIPS),
        ("stop_times.txt", STOP_TIMES),
        ("calendar.txt", CALENDAR),
        ("calendar_dates.txt", CALENDAR_DATES),
        ("shapes.txt", SHAPES),
    ]
}

fn zip_of(tables: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in tables {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn fixture_zip() -> Vec<u8> {
    zip_of(&fixture_tables())
}

fn fixture_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in fixture_tables() {
        std::fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn read_from_directory() {
    let dir = fixture_dir();
    let feed = GtfsFeed::from_path(dir.path()).unwrap();
    assert_eq!(feed.agency_count(), 2);
    assert_eq!(feed.stop_count(), 5);
    assert_eq!(feed.route_count(), 3);
    assert_eq!(feed.trip_count(), 5);
    assert_eq!(feed.stop_time_count(), 16);
    assert_eq!(feed.calendar_count(), 2);
    assert_eq!(feed.calendar_date_count(), 3);
    assert_eq!(feed.shape_point_count(), 3);
    assert!(feed.warnings.is_empty());

    assert_eq!(feed.agencies[0].name, "Test Transit Agency");
    assert_eq!(feed.agencies[0].timezone, "America/New_York");
    assert_eq!(feed.stops[0].latitude, Some(40.712776));
    assert_eq!(feed.routes[0].route_type, RouteType::Bus);
    assert_eq!(feed.routes[0].short_name.as_deref(), Some("1"));
    assert_eq!(feed.trips[0].headsign.as_deref(), Some("Northbound to Central"));
    assert!(feed.calendars[0].monday);
    assert!(!feed.calendars[0].saturday);
    assert_eq!(feed.calendar_dates[0].exception_type, Exception::Removed);
    assert_eq!(feed.calendar_dates[1].exception_type, Exception::Added);
}

#[test]
fn read_from_zip() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    assert_eq!(feed.stop_count(), 5);
    assert_eq!(feed.trip_count(), 5);
    assert_eq!(feed.stop_time_count(), 16);
}

#[test]
fn read_from_zip_with_subdirectory() {
    let tables = fixture_tables();
    let nested: Vec<(String, &str)> =
        tables.iter().map(|(n, c)| (format!("nested/{}", n), *c)).collect();
    let nested_refs: Vec<(&str, &str)> =
        nested.iter().map(|(n, c)| (n.as_str(), *c)).collect();
    let feed = GtfsFeed::from_zip_bytes(&zip_of(&nested_refs)).unwrap();
    assert_eq!(feed.stop_count(), 5);
}

#[test]
fn read_with_bom() {
    let mut tables: Vec<(&str, &str)> = fixture_tables();
    let bom_agency = "\u{feff}".to_string() + AGENCY;
    tables[0] = ("agency.txt", &bom_agency);
    let feed = GtfsFeed::from_zip_bytes(&zip_of(&tables)).unwrap();
    assert_eq!(feed.agency_count(), 2);
}

#[test]
fn missing_required_files_are_all_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("agency.txt"), AGENCY).unwrap();
    let err = GtfsFeed::from_path(dir.path()).unwrap_err();
    match err {
        Error::FeedFileMissing { missing, .. } => {
            assert!(missing.contains(&"stops.txt".to_string()));
            assert!(missing.contains(&"stop_times.txt".to_string()));
            assert!(missing.contains(&"calendar.txt".to_string()));
            assert!(missing.contains(&"calendar_dates.txt".to_string()));
            assert!(!missing.contains(&"agency.txt".to_string()));
        }
        other => panic!("expected FeedFileMissing, got {:?}", other),
    }
}

#[test]
fn one_calendar_file_is_enough() {
    let mut tables: Vec<(&str, &str)> = fixture_tables();
    tables.retain(|(name, _)| *name != "calendar.txt");
    let feed = GtfsFeed::from_zip_bytes(&zip_of(&tables)).unwrap();
    assert_eq!(feed.calendar_count(), 0);
    assert_eq!(feed.calendar_date_count(), 3);
}

#[test]
fn nonexistent_path_fails() {
    let err = GtfsFeed::from_path("/definitely/not/here").unwrap_err();
    assert!(matches!(err, Error::FeedNotFound { .. }));
}

#[test]
fn lenient_load_skips_bad_rows() {
    let bad_stops = "\
stop_id,stop_name,stop_lat,stop_lon
stop_1,Good Stop,40.0,-74.0
stop_2,Bad Latitude,not-a-number,-74.0
stop_3,Wrong Column Count,40.0
stop_4,Another Good Stop,41.0,-75.0
";
    let mut tables: Vec<(&str, &str)> = fixture_tables();
    tables[1] = ("stops.txt", bad_stops);
    let feed = GtfsFeed::from_zip_bytes(&zip_of(&tables)).unwrap();
    assert_eq!(feed.stop_count(), 2);
    assert_eq!(feed.warnings.len(), 2);
    assert_eq!(feed.warnings[0].file, "stops.txt");
    assert_eq!(feed.warnings[0].line, 3);
    assert_eq!(feed.warnings[0].column.as_deref(), Some("stop_lat"));
    assert_eq!(feed.warnings[1].line, 4);
}

#[test]
fn strict_load_surfaces_first_bad_row() {
    let bad_stops = "\
stop_id,stop_name,stop_lat,stop_lon
stop_1,Bad Latitude,not-a-number,-74.0
";
    let mut tables: Vec<(&str, &str)> = fixture_tables();
    tables[1] = ("stops.txt", bad_stops);
    let err =
        GtfsReader::new().strict(true).read_from_zip_bytes(&zip_of(&tables)).unwrap_err();
    match err {
        Error::FeedParse { file, line, column, .. } => {
            assert_eq!(file, "stops.txt");
            assert_eq!(line, 2);
            assert_eq!(column, "stop_lat");
        }
        other => panic!("expected FeedParse, got {:?}", other),
    }
}

#[test]
fn unknown_columns_kept_only_in_round_trip_mode() {
    let stops_with_extra = "\
stop_id,stop_name,stop_lat,stop_lon,naptan_code
stop_1,Main Street Station,40.7,-74.0,bstmjpg
";
    let mut tables: Vec<(&str, &str)> = fixture_tables();
    tables[1] = ("stops.txt", stops_with_extra);
    let bytes = zip_of(&tables);

    let plain = GtfsFeed::from_zip_bytes(&bytes).unwrap();
    assert!(plain.stops[0].extras.is_empty());

    let kept = GtfsReader::new().round_trip(true).read_from_zip_bytes(&bytes).unwrap();
    assert_eq!(
        kept.stops[0].extras,
        vec![("naptan_code".to_string(), "bstmjpg".to_string())]
    );

    // The retained column survives a write → read cycle.
    let rewritten = kept.write_to_zip_bytes().unwrap();
    let reloaded = GtfsReader::new().round_trip(true).read_from_zip_bytes(&rewritten).unwrap();
    assert_eq!(reloaded.stops[0].extras, kept.stops[0].extras);
}

#[test]
fn round_trip_preserves_all_tables() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let bytes = feed.write_to_zip_bytes().unwrap();
    let reloaded = GtfsFeed::from_zip_bytes(&bytes).unwrap();

    assert_eq!(feed.agencies, reloaded.agencies);
    assert_eq!(feed.stops, reloaded.stops);
    assert_eq!(feed.routes, reloaded.routes);
    assert_eq!(feed.trips, reloaded.trips);
    assert_eq!(feed.stop_times, reloaded.stop_times);
    assert_eq!(feed.calendars, reloaded.calendars);
    assert_eq!(feed.calendar_dates, reloaded.calendar_dates);
    assert_eq!(feed.shapes, reloaded.shapes);
}

#[test]
fn zip_output_is_deterministic() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let first = feed.write_to_zip_bytes().unwrap();
    let second = feed.write_to_zip_bytes().unwrap();
    assert_eq!(first, second);

    // Stable through a full load → write cycle as well.
    let reloaded = GtfsFeed::from_zip_bytes(&first).unwrap();
    assert_eq!(reloaded.write_to_zip_bytes().unwrap(), first);
}

#[test]
fn empty_optional_fields_stay_empty() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let last = feed.stop_times.last().unwrap();
    assert_eq!(last.arrival_time, None);
    assert_eq!(last.departure_time, None);

    let bytes = feed.write_to_zip_bytes().unwrap();
    let reloaded = GtfsFeed::from_zip_bytes(&bytes).unwrap();
    assert_eq!(reloaded.stop_times.last().unwrap().arrival_time, None);
    // Optional columns with no values at all are omitted entirely.
    let trips = GtfsFeed::from_zip_bytes(&bytes).unwrap().trips;
    assert!(trips.iter().all(|t| t.block_id.is_none()));
}

#[test]
fn times_past_midnight_survive_round_trip() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let late = &feed.stop_times[14];
    assert_eq!(late.arrival_time, Some(25 * 3600));

    let bytes = feed.write_to_zip_bytes().unwrap();
    let reloaded = GtfsFeed::from_zip_bytes(&bytes).unwrap();
    assert_eq!(reloaded.stop_times[14].arrival_time, Some(25 * 3600));
}

#[test]
fn minimal_feed_zip_round_trip() {
    // One of everything, two stop times on the same stop on purpose.
    let mut feed = GtfsFeed::default();
    feed.agencies.push(Agency {
        id: Some("A".into()),
        name: "Acme".into(),
        url: "http://a".into(),
        timezone: "UTC".into(),
        ..Agency::default()
    });
    feed.stops.push(Stop {
        id: "s1".into(),
        name: "First".into(),
        latitude: Some(0.0),
        longitude: Some(0.0),
        ..Stop::default()
    });
    feed.routes.push(Route {
        id: "r1".into(),
        short_name: Some("1".into()),
        route_type: RouteType::Bus,
        ..Route::default()
    });
    feed.trips.push(Trip {
        id: "t1".into(),
        route_id: "r1".into(),
        service_id: "svc".into(),
        ..Trip::default()
    });
    feed.stop_times.push(StopTime {
        trip_id: "t1".into(),
        arrival_time: Some(8 * 3600),
        departure_time: Some(8 * 3600),
        stop_id: "s1".into(),
        stop_sequence: 1,
        ..StopTime::default()
    });
    feed.stop_times.push(StopTime {
        trip_id: "t1".into(),
        arrival_time: Some(8 * 3600 + 300),
        departure_time: Some(8 * 3600 + 300),
        stop_id: "s1".into(),
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
        start_date: date(2025, 1, 1),
        end_date: date(2025, 12, 31),
        extras: Vec::new(),
    });

    let bytes = feed.write_to_zip_bytes().unwrap();
    let reloaded = GtfsFeed::from_zip_bytes(&bytes).unwrap();
    assert_eq!(reloaded.agency_count(), 1);
    assert_eq!(reloaded.stop_count(), 1);
    assert_eq!(reloaded.route_count(), 1);
    assert_eq!(reloaded.trip_count(), 1);
    assert_eq!(reloaded.stop_time_count(), 2);
    assert_eq!(reloaded.calendar_count(), 1);
    assert_eq!(reloaded.calendar_date_count(), 0);
    assert_eq!(reloaded.shape_point_count(), 0);

    // 2025-07-04 is a Friday, so the M-F service runs.
    let filter = GtfsFilter::new(&reloaded);
    let trips = filter.trips_on_date("2025-07-04").unwrap();
    assert_eq!(trips.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["t1"]);
}

#[test]
fn next_day_trip_duration() {
    let stop_times = "\
trip_id,arrival_time,departure_time,stop_id,stop_sequence
trip_1,06:00:00,06:00:00,stop_1,1
trip_1,25:30:00,25:30:00,stop_2,2
";
    let trips = "\
trip_id,route_id,service_id
trip_1,route_1,weekday
";
    let mut tables: Vec<(&str, &str)> = fixture_tables();
    tables[3] = ("trips.txt", trips);
    tables[4] = ("stop_times.txt", stop_times);
    let feed = GtfsFeed::from_zip_bytes(&zip_of(&tables)).unwrap();

    let filter = GtfsFilter::new(&feed);
    assert_eq!(filter.trip_duration_seconds("trip_1").unwrap(), Some(70_200));

    // The textual form 25:30:00 must survive the round trip.
    let bytes = feed.write_to_zip_bytes().unwrap();
    let reloaded = GtfsFeed::from_zip_bytes(&bytes).unwrap();
    assert_eq!(reloaded.stop_times[1].arrival_time, Some(91_800));
}

#[test]
fn filter_id_lookups() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let filter = GtfsFilter::new(&feed);

    assert_eq!(filter.stop("stop_1").unwrap().unwrap().name, "Main Street Station");
    assert!(filter.stop("nope").unwrap().is_none());
    assert_eq!(filter.route("route_1").unwrap().unwrap().long_name.as_deref(), Some("Main Line"));
    assert_eq!(filter.trip("trip_1").unwrap().unwrap().route_id, "route_1");
    assert_eq!(filter.agency("agency_2").unwrap().unwrap().name, "Second Agency");
    assert_eq!(filter.calendar("weekday").unwrap().unwrap().service_id, "weekday");
    assert!(filter.calendar("nope").unwrap().is_none());
}

#[test]
fn filter_route_joins() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let filter = GtfsFilter::new(&feed);

    let trips = filter.trips_for_route("route_1").unwrap();
    assert_eq!(
        trips.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
        vec!["trip_1", "trip_2", "trip_4"]
    );
    assert_eq!(filter.route_trip_count("route_1").unwrap(), 3);

    // Deduplicated, first-seen order over all the route's trips.
    let stops = filter.stops_for_route("route_1").unwrap();
    assert_eq!(
        stops.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        vec!["stop_1", "stop_2", "stop_3", "stop_4"]
    );
    assert_eq!(filter.route_stop_count("route_1").unwrap(), 4);
    assert_eq!(filter.stop_times_for_route("route_1").unwrap().len(), 10);
}

#[test]
fn filter_trip_joins_sort_by_sequence() {
    let shuffled = "\
trip_id,arrival_time,departure_time,stop_id,stop_sequence
trip_1,08:15:00,08:15:00,stop_4,4
trip_1,08:00:00,08:00:00,stop_1,1
trip_1,08:10:00,08:11:00,stop_3,3
trip_1,08:05:00,08:06:00,stop_2,2
";
    let mut tables: Vec<(&str, &str)> = fixture_tables();
    tables[4] = ("stop_times.txt", shuffled);
    let feed = GtfsFeed::from_zip_bytes(&zip_of(&tables)).unwrap();
    let filter = GtfsFilter::new(&feed);

    let stop_times = filter.stop_times_for_trip("trip_1").unwrap();
    assert_eq!(
        stop_times.iter().map(|st| st.stop_sequence).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    let stops = filter.stops_for_trip("trip_1").unwrap();
    assert_eq!(
        stops.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        vec!["stop_1", "stop_2", "stop_3", "stop_4"]
    );
}

#[test]
fn filter_stop_joins() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let filter = GtfsFilter::new(&feed);

    let stop_times = filter.stop_times_at_stop("stop_1").unwrap();
    assert!(stop_times.iter().all(|st| st.stop_id == "stop_1"));
    assert_eq!(stop_times.len(), 4);

    let trips = filter.trips_serving_stop("stop_1").unwrap();
    assert_eq!(
        trips.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
        vec!["trip_1", "trip_2", "trip_4", "trip_5"]
    );
    assert_eq!(filter.stop_trip_count("stop_1").unwrap(), 4);

    let routes = filter.routes_serving_stop("stop_1").unwrap();
    assert_eq!(
        routes.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["route_1", "route_3"]
    );
}

#[test]
fn filter_agency_and_service_joins() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let filter = GtfsFilter::new(&feed);

    let routes = filter.routes_for_agency("agency_1").unwrap();
    assert_eq!(routes.len(), 2);
    let trips = filter.trips_for_agency("agency_1").unwrap();
    assert_eq!(trips.len(), 4);

    let weekday_trips = filter.trips_for_service("weekday").unwrap();
    assert!(weekday_trips.iter().all(|t| t.service_id == "weekday"));
    assert_eq!(weekday_trips.len(), 3);
}

#[test]
fn active_services_follow_weekday_flags() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let filter = GtfsFilter::new(&feed);

    // 2025-01-06 is a Monday.
    let monday: Vec<String> = filter
        .active_services_on("2025-01-06")
        .unwrap()
        .into_iter()
        .map(|c| c.service_id)
        .collect();
    assert!(monday.contains(&"weekday".to_string()));
    assert!(!monday.contains(&"weekend".to_string()));

    // 2025-01-04 is a Saturday.
    let saturday: Vec<String> = filter
        .active_services_on("2025-01-04")
        .unwrap()
        .into_iter()
        .map(|c| c.service_id)
        .collect();
    assert!(saturday.contains(&"weekend".to_string()));
    assert!(!saturday.contains(&"weekday".to_string()));
}

#[test]
fn calendar_date_exceptions_override_base_state() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let filter = GtfsFilter::new(&feed);

    // 2025-07-04 is a Friday: weekday is removed, weekend is added.
    let independence_day: Vec<String> = filter
        .active_services_on("2025-07-04")
        .unwrap()
        .into_iter()
        .map(|c| c.service_id)
        .collect();
    assert!(!independence_day.contains(&"weekday".to_string()));
    assert!(independence_day.contains(&"weekend".to_string()));

    // The day before is untouched.
    let thursday: Vec<String> = filter
        .active_services_on("2025-07-03")
        .unwrap()
        .into_iter()
        .map(|c| c.service_id)
        .collect();
    assert_eq!(thursday, vec!["weekday".to_string()]);

    let trips = filter.trips_on_date("2025-07-04").unwrap();
    assert!(trips.iter().all(|t| t.service_id == "weekend"));
}

#[test]
fn dates_only_service_gets_synthetic_calendar() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let filter = GtfsFilter::new(&feed);

    let june_first = filter.active_services_on(date(2025, 6, 1)).unwrap();
    let special = june_first.iter().find(|c| c.service_id == "special").unwrap();
    assert!(!special.monday && !special.sunday);
    assert_eq!(special.start_date, date(2025, 6, 1));
    assert_eq!(special.end_date, date(2025, 6, 1));
}

#[test]
fn invalid_date_is_always_an_error() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let filter = GtfsFilter::new(&feed);

    match filter.active_services_on("not-a-valid-date").unwrap_err() {
        Error::InvalidDate { value, expected } => {
            assert_eq!(value, "not-a-valid-date");
            assert!(expected.contains("YYYY-MM-DD"));
        }
        other => panic!("expected InvalidDate, got {:?}", other),
    }
    match filter.active_services_on("20251342").unwrap_err() {
        Error::InvalidDate { expected, .. } => assert!(expected.contains("YYYYMMDD")),
        other => panic!("expected InvalidDate, got {:?}", other),
    }
}

#[test]
fn shape_for_trip_sorted_by_sequence() {
    let trips = "\
trip_id,route_id,service_id,shape_id
trip_1,route_1,weekday,shape_1
trip_2,route_1,weekday,
";
    let shapes = "\
shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence
shape_1,40.717488,-73.998672,3
shape_1,40.712776,-74.005974,1
shape_1,40.714541,-74.0022,2
";
    let mut tables: Vec<(&str, &str)> = fixture_tables();
    tables[3] = ("trips.txt", trips);
    tables[7] = ("shapes.txt", shapes);
    let feed = GtfsFeed::from_zip_bytes(&zip_of(&tables)).unwrap();
    let filter = GtfsFilter::new(&feed);

    let points = filter.shape_for_trip("trip_1").unwrap();
    assert_eq!(points.iter().map(|p| p.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(filter.shape_for_trip("trip_2").unwrap().is_empty());
}

#[test]
fn lazy_counts_match_eager_counts() {
    let lazy = LazyGtfsFeed::from_zip_bytes(fixture_zip()).unwrap();
    assert_eq!(lazy.agency_count().unwrap(), 2);
    assert_eq!(lazy.stop_count().unwrap(), 5);
    assert_eq!(lazy.route_count().unwrap(), 3);
    assert_eq!(lazy.trip_count().unwrap(), 5);
    assert_eq!(lazy.stop_time_count().unwrap(), 16);
    assert_eq!(lazy.calendar_count().unwrap(), 2);
    assert_eq!(lazy.calendar_date_count().unwrap(), 3);
    assert_eq!(lazy.shape_point_count().unwrap(), 3);
}

#[test]
fn lazy_tables_cache_after_first_access() {
    let dir = fixture_dir();
    let lazy = LazyGtfsFeed::from_directory(dir.path()).unwrap();
    let first = lazy.agencies().unwrap().len();
    let second = lazy.agencies().unwrap().len();
    assert_eq!(first, 2);
    assert_eq!(first, second);
}

#[test]
fn lazy_materialize_equals_eager_load() {
    let bytes = fixture_zip();
    let eager = GtfsFeed::from_zip_bytes(&bytes).unwrap();
    let lazy = LazyGtfsFeed::from_zip_bytes(bytes).unwrap();
    let materialized = lazy.materialize().unwrap();
    assert_eq!(eager.agencies, materialized.agencies);
    assert_eq!(eager.stops, materialized.stops);
    assert_eq!(eager.stop_times, materialized.stop_times);
    assert_eq!(eager.calendars, materialized.calendars);
}

#[test]
fn lazy_missing_path_fails_eagerly() {
    assert!(LazyGtfsFeed::from_path("/definitely/not/here").is_err());
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        LazyGtfsFeed::from_directory(dir.path()).unwrap_err(),
        Error::FeedFileMissing { .. }
    ));
}

#[test]
fn lazy_write_preserves_untouched_table_bytes() {
    let bytes = fixture_zip();
    let lazy = LazyGtfsFeed::from_zip_bytes(bytes).unwrap();
    // Touch stops only; stop_times must be copied verbatim.
    lazy.stops().unwrap();
    let out = lazy.write_to_zip_bytes().unwrap();

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(out.as_slice())).unwrap();
    let mut entry = archive.by_name("stop_times.txt").unwrap();
    let mut content = String::new();
    std::io::Read::read_to_string(&mut entry, &mut content).unwrap();
    assert_eq!(content, STOP_TIMES);
}

#[test]
fn lazy_feed_works_through_the_filter() {
    let lazy = LazyGtfsFeed::from_zip_bytes(fixture_zip()).unwrap();
    let filter = GtfsFilter::new(&lazy);
    assert_eq!(filter.stop("stop_1").unwrap().unwrap().name, "Main Street Station");
    assert_eq!(filter.trips_for_route("route_1").unwrap().len(), 3);
}

#[test]
fn cancelled_token_aborts_load() {
    let token = CancelToken::new();
    token.cancel();
    let err = GtfsReader::new()
        .cancel(token)
        .read_from_zip_bytes(&fixture_zip())
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[test]
fn valid_feed_passes_validation() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let warnings = feed.validate().unwrap();
    // trip_3 and trip_4 only have two stops each; nothing shorter than that.
    assert!(warnings.is_empty());
}

#[test]
fn dangling_references_fail_validation() {
    let mut feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    feed.trips.push(Trip {
        id: "ghost".into(),
        route_id: "no_such_route".into(),
        service_id: "no_such_service".into(),
        ..Trip::default()
    });
    match feed.validate().unwrap_err() {
        Error::FeedValidation { errors, .. } => {
            assert!(errors.iter().any(|e| e.contains("unknown route")));
            assert!(errors.iter().any(|e| e.contains("unknown service")));
        }
        other => panic!("expected FeedValidation, got {:?}", other),
    }
}

#[test]
fn repeated_sequence_fails_validation() {
    let mut feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    feed.stop_times.push(StopTime {
        trip_id: "trip_1".into(),
        stop_id: "stop_1".into(),
        stop_sequence: 1,
        ..StopTime::default()
    });
    match feed.validate().unwrap_err() {
        Error::FeedValidation { errors, .. } => {
            assert!(errors.iter().any(|e| e.contains("repeats stop sequence")));
        }
        other => panic!("expected FeedValidation, got {:?}", other),
    }
}

#[test]
fn columnar_snapshot_mirrors_the_rows() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let columns = feed.stop_time_columns();
    assert_eq!(columns.trip_ids.len(), 16);
    assert_eq!(columns.trip_ids[0], "trip_1");
    assert_eq!(columns.arrival_times[0], Some(8 * 3600));
    assert_eq!(columns.stop_sequences[3], 4);
    assert_eq!(columns.stop_ids[15], "stop_4");
    assert_eq!(columns.arrival_times[15], None);
}

#[test]
fn records_serialize_to_json() {
    let feed = GtfsFeed::from_zip_bytes(&fixture_zip()).unwrap();
    let json = serde_json::to_string(&feed.routes).unwrap();
    let parsed: Vec<Route> = serde_json::from_str(&json).unwrap();
    assert_eq!(feed.routes, parsed);

    let json = serde_json::to_string(&feed.stop_times).unwrap();
    let parsed: Vec<StopTime> = serde_json::from_str(&json).unwrap();
    assert_eq!(feed.stop_times, parsed);
}
