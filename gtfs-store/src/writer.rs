use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use crate::objects::Extras;
use crate::serde_helpers::{default_route_color, format_color, format_date, format_time};
use crate::{
    Agency, Calendar, CalendarDate, Error, GtfsFeed, Route, Shape, Stop, StopTime, Trip,
};

/// Serializes every non-empty table in canonical order.
///
/// The five mandatory tables are always emitted, even when empty; calendar,
/// calendar_dates and shapes only when they hold records.
pub(crate) fn table_files(feed: &GtfsFeed) -> Result<Vec<(&'static str, Vec<u8>)>, Error> {
    let mut files = vec![
        ("agency.txt", agencies_to_csv(&feed.agencies)?),
        ("stops.txt", stops_to_csv(&feed.stops)?),
        ("routes.txt", routes_to_csv(&feed.routes)?),
        ("trips.txt", trips_to_csv(&feed.trips)?),
        ("stop_times.txt", stop_times_to_csv(&feed.stop_times)?),
    ];
    if !feed.calendars.is_empty() {
        files.push(("calendar.txt", calendars_to_csv(&feed.calendars)?));
    }
    if !feed.calendar_dates.is_empty() {
        files.push(("calendar_dates.txt", calendar_dates_to_csv(&feed.calendar_dates)?));
    }
    if !feed.shapes.is_empty() {
        files.push(("shapes.txt", shapes_to_csv(&feed.shapes)?));
    }
    Ok(files)
}

pub(crate) fn write_files_to_directory(
    files: &[(&'static str, Vec<u8>)],
    path: &Path,
) -> Result<(), Error> {
    fs::create_dir_all(path)?;
    for (name, bytes) in files {
        fs::write(path.join(name), bytes)?;
    }
    Ok(())
}

/// Builds a ZIP archive with DEFLATE entries in canonical order.
///
/// The modification timestamp of every entry is pinned to the ZIP epoch so the
/// archive bytes depend only on the feed content.
pub(crate) fn write_files_to_zip_bytes(
    files: &[(&'static str, Vec<u8>)],
) -> Result<Vec<u8>, Error> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    for (name, bytes) in files {
        writer.start_file(*name, options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Unknown columns collected across all records, in first-seen order.
fn extras_columns<'a>(extras: impl Iterator<Item = &'a Extras>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for e in extras {
        for (key, _) in e {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn extras_value<'a>(extras: &'a Extras, key: &str) -> &'a str {
    extras.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str()).unwrap_or("")
}

fn opt_str(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn opt_f64(value: &Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_f32(value: &Option<f32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_time(value: &Option<u32>) -> String {
    value.map(format_time).unwrap_or_default()
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, Error> {
    writer
        .into_inner()
        .map_err(|e| Error::Csv { file_name: "<write>".to_owned(), source: e.into_error().into() })
}

fn write_row(
    writer: &mut csv::Writer<Vec<u8>>,
    row: Vec<String>,
    file_name: &str,
) -> Result<(), Error> {
    writer
        .write_record(&row)
        .map_err(|e| Error::Csv { file_name: file_name.to_owned(), source: e })
}

pub(crate) fn agencies_to_csv(agencies: &[Agency]) -> Result<Vec<u8>, Error> {
    let with_id = agencies.iter().any(|a| a.id.is_some());
    let with_lang = agencies.iter().any(|a| a.lang.is_some());
    let with_phone = agencies.iter().any(|a| a.phone.is_some());
    let with_fare_url = agencies.iter().any(|a| a.fare_url.is_some());
    let with_email = agencies.iter().any(|a| a.email.is_some());
    let extra_cols = extras_columns(agencies.iter().map(|a| &a.extras));

    let mut header: Vec<String> = Vec::new();
    if with_id {
        header.push("agency_id".into());
    }
    header.extend(["agency_name".into(), "agency_url".into(), "agency_timezone".into()]);
    if with_lang {
        header.push("agency_lang".into());
    }
    if with_phone {
        header.push("agency_phone".into());
    }
    if with_fare_url {
        header.push("agency_fare_url".into());
    }
    if with_email {
        header.push("agency_email".into());
    }
    header.extend(extra_cols.iter().cloned());

    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, header, "agency.txt")?;
    for a in agencies {
        let mut row: Vec<String> = Vec::new();
        if with_id {
            row.push(opt_str(&a.id));
        }
        row.extend([a.name.clone(), a.url.clone(), a.timezone.clone()]);
        if with_lang {
            row.push(opt_str(&a.lang));
        }
        if with_phone {
            row.push(opt_str(&a.phone));
        }
        if with_fare_url {
            row.push(opt_str(&a.fare_url));
        }
        if with_email {
            row.push(opt_str(&a.email));
        }
        row.extend(extra_cols.iter().map(|c| extras_value(&a.extras, c).to_owned()));
        write_row(&mut writer, row, "agency.txt")?;
    }
    finish(writer)
}

pub(crate) fn stops_to_csv(stops: &[Stop]) -> Result<Vec<u8>, Error> {
    let with_code = stops.iter().any(|s| s.code.is_some());
    let with_desc = stops.iter().any(|s| s.description.is_some());
    let with_zone = stops.iter().any(|s| s.zone_id.is_some());
    let with_url = stops.iter().any(|s| s.url.is_some());
    let with_parent = stops.iter().any(|s| s.parent_station.is_some());
    let with_tz = stops.iter().any(|s| s.timezone.is_some());
    let with_platform = stops.iter().any(|s| s.platform_code.is_some());
    let extra_cols = extras_columns(stops.iter().map(|s| &s.extras));

    let mut header: Vec<String> = vec!["stop_id".into()];
    if with_code {
        header.push("stop_code".into());
    }
    header.extend(["stop_name".into(), "stop_lat".into(), "stop_lon".into()]);
    if with_desc {
        header.push("stop_desc".into());
    }
    if with_zone {
        header.push("zone_id".into());
    }
    if with_url {
        header.push("stop_url".into());
    }
    if with_parent {
        header.push("parent_station".into());
    }
    if with_tz {
        header.push("stop_timezone".into());
    }
    if with_platform {
        header.push("platform_code".into());
    }
    header.extend(extra_cols.iter().cloned());

    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, header, "stops.txt")?;
    for s in stops {
        let mut row: Vec<String> = vec![s.id.clone()];
        if with_code {
            row.push(opt_str(&s.code));
        }
        row.extend([s.name.clone(), opt_f64(&s.latitude), opt_f64(&s.longitude)]);
        if with_desc {
            row.push(opt_str(&s.description));
        }
        if with_zone {
            row.push(opt_str(&s.zone_id));
        }
        if with_url {
            row.push(opt_str(&s.url));
        }
        if with_parent {
            row.push(opt_str(&s.parent_station));
        }
        if with_tz {
            row.push(opt_str(&s.timezone));
        }
        if with_platform {
            row.push(opt_str(&s.platform_code));
        }
        row.extend(extra_cols.iter().map(|c| extras_value(&s.extras, c).to_owned()));
        write_row(&mut writer, row, "stops.txt")?;
    }
    finish(writer)
}

pub(crate) fn routes_to_csv(routes: &[Route]) -> Result<Vec<u8>, Error> {
    let with_short = routes.iter().any(|r| r.short_name.is_some());
    let with_long = routes.iter().any(|r| r.long_name.is_some());
    let with_desc = routes.iter().any(|r| r.desc.is_some());
    let with_url = routes.iter().any(|r| r.url.is_some());
    let with_agency = routes.iter().any(|r| r.agency_id.is_some());
    let with_order = routes.iter().any(|r| r.order.is_some());
    let with_color = routes.iter().any(|r| r.color != default_route_color());
    let with_text_color = routes.iter().any(|r| r.text_color != rgb::RGB8::default());
    let extra_cols = extras_columns(routes.iter().map(|r| &r.extras));

    let mut header: Vec<String> = vec!["route_id".into()];
    if with_agency {
        header.push("agency_id".into());
    }
    if with_short {
        header.push("route_short_name".into());
    }
    if with_long {
        header.push("route_long_name".into());
    }
    if with_desc {
        header.push("route_desc".into());
    }
    header.push("route_type".into());
    if with_url {
        header.push("route_url".into());
    }
    if with_order {
        header.push("route_sort_order".into());
    }
    if with_color {
        header.push("route_color".into());
    }
    if with_text_color {
        header.push("route_text_color".into());
    }
    header.extend(extra_cols.iter().cloned());

    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, header, "routes.txt")?;
    for r in routes {
        let mut row: Vec<String> = vec![r.id.clone()];
        if with_agency {
            row.push(opt_str(&r.agency_id));
        }
        if with_short {
            row.push(opt_str(&r.short_name));
        }
        if with_long {
            row.push(opt_str(&r.long_name));
        }
        if with_desc {
            row.push(opt_str(&r.desc));
        }
        row.push(r.route_type.value().to_string());
        if with_url {
            row.push(opt_str(&r.url));
        }
        if with_order {
            row.push(r.order.map(|o| o.to_string()).unwrap_or_default());
        }
        if with_color {
            row.push(format_color(&r.color));
        }
        if with_text_color {
            row.push(format_color(&r.text_color));
        }
        row.extend(extra_cols.iter().map(|c| extras_value(&r.extras, c).to_owned()));
        write_row(&mut writer, row, "routes.txt")?;
    }
    finish(writer)
}

pub(crate) fn trips_to_csv(trips: &[Trip]) -> Result<Vec<u8>, Error> {
    let with_headsign = trips.iter().any(|t| t.headsign.is_some());
    let with_short = trips.iter().any(|t| t.short_name.is_some());
    let with_direction = trips.iter().any(|t| t.direction_id.is_some());
    let with_block = trips.iter().any(|t| t.block_id.is_some());
    let with_shape = trips.iter().any(|t| t.shape_id.is_some());
    let extra_cols = extras_columns(trips.iter().map(|t| &t.extras));

    let mut header: Vec<String> =
        vec!["trip_id".into(), "route_id".into(), "service_id".into()];
    if with_headsign {
        header.push("trip_headsign".into());
    }
    if with_short {
        header.push("trip_short_name".into());
    }
    if with_direction {
        header.push("direction_id".into());
    }
    if with_block {
        header.push("block_id".into());
    }
    if with_shape {
        header.push("shape_id".into());
    }
    header.extend(extra_cols.iter().cloned());

    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, header, "trips.txt")?;
    for t in trips {
        let mut row: Vec<String> = vec![t.id.clone(), t.route_id.clone(), t.service_id.clone()];
        if with_headsign {
            row.push(opt_str(&t.headsign));
        }
        if with_short {
            row.push(opt_str(&t.short_name));
        }
        if with_direction {
            row.push(match t.direction_id {
                Some(crate::DirectionType::Outbound) => "0".into(),
                Some(crate::DirectionType::Inbound) => "1".into(),
                None => String::new(),
            });
        }
        if with_block {
            row.push(opt_str(&t.block_id));
        }
        if with_shape {
            row.push(opt_str(&t.shape_id));
        }
        row.extend(extra_cols.iter().map(|c| extras_value(&t.extras, c).to_owned()));
        write_row(&mut writer, row, "trips.txt")?;
    }
    finish(writer)
}

pub(crate) fn stop_times_to_csv(stop_times: &[StopTime]) -> Result<Vec<u8>, Error> {
    let with_headsign = stop_times.iter().any(|st| st.headsign.is_some());
    let with_dist = stop_times.iter().any(|st| st.shape_dist_traveled.is_some());
    let extra_cols = extras_columns(stop_times.iter().map(|st| &st.extras));

    let mut header: Vec<String> = vec![
        "trip_id".into(),
        "arrival_time".into(),
        "departure_time".into(),
        "stop_id".into(),
        "stop_sequence".into(),
    ];
    if with_headsign {
        header.push("stop_headsign".into());
    }
    if with_dist {
        header.push("shape_dist_traveled".into());
    }
    header.extend(extra_cols.iter().cloned());

    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, header, "stop_times.txt")?;
    for st in stop_times {
        let mut row: Vec<String> = vec![
            st.trip_id.clone(),
            opt_time(&st.arrival_time),
            opt_time(&st.departure_time),
            st.stop_id.clone(),
            st.stop_sequence.to_string(),
        ];
        if with_headsign {
            row.push(opt_str(&st.headsign));
        }
        if with_dist {
            row.push(opt_f32(&st.shape_dist_traveled));
        }
        row.extend(extra_cols.iter().map(|c| extras_value(&st.extras, c).to_owned()));
        write_row(&mut writer, row, "stop_times.txt")?;
    }
    finish(writer)
}

pub(crate) fn calendars_to_csv(calendars: &[Calendar]) -> Result<Vec<u8>, Error> {
    let extra_cols = extras_columns(calendars.iter().map(|c| &c.extras));

    let mut header: Vec<String> = vec![
        "service_id".into(),
        "monday".into(),
        "tuesday".into(),
        "wednesday".into(),
        "thursday".into(),
        "friday".into(),
        "saturday".into(),
        "sunday".into(),
        "start_date".into(),
        "end_date".into(),
    ];
    header.extend(extra_cols.iter().cloned());

    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, header, "calendar.txt")?;
    for c in calendars {
        let mut row: Vec<String> = vec![
            c.service_id.clone(),
            bool_field(c.monday),
            bool_field(c.tuesday),
            bool_field(c.wednesday),
            bool_field(c.thursday),
            bool_field(c.friday),
            bool_field(c.saturday),
            bool_field(c.sunday),
            format_date(&c.start_date),
            format_date(&c.end_date),
        ];
        row.extend(extra_cols.iter().map(|col| extras_value(&c.extras, col).to_owned()));
        write_row(&mut writer, row, "calendar.txt")?;
    }
    finish(writer)
}

pub(crate) fn calendar_dates_to_csv(calendar_dates: &[CalendarDate]) -> Result<Vec<u8>, Error> {
    let extra_cols = extras_columns(calendar_dates.iter().map(|c| &c.extras));

    let mut header: Vec<String> =
        vec!["service_id".into(), "date".into(), "exception_type".into()];
    header.extend(extra_cols.iter().cloned());

    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, header, "calendar_dates.txt")?;
    for c in calendar_dates {
        let mut row: Vec<String> = vec![
            c.service_id.clone(),
            format_date(&c.date),
            c.exception_type.value().to_string(),
        ];
        row.extend(extra_cols.iter().map(|col| extras_value(&c.extras, col).to_owned()));
        write_row(&mut writer, row, "calendar_dates.txt")?;
    }
    finish(writer)
}

pub(crate) fn shapes_to_csv(shapes: &[Shape]) -> Result<Vec<u8>, Error> {
    let with_dist = shapes.iter().any(|s| s.dist_traveled.is_some());
    let extra_cols = extras_columns(shapes.iter().map(|s| &s.extras));

    let mut header: Vec<String> = vec![
        "shape_id".into(),
        "shape_pt_lat".into(),
        "shape_pt_lon".into(),
        "shape_pt_sequence".into(),
    ];
    if with_dist {
        header.push("shape_dist_traveled".into());
    }
    header.extend(extra_cols.iter().cloned());

    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, header, "shapes.txt")?;
    for s in shapes {
        let mut row: Vec<String> = vec![
            s.id.clone(),
            s.latitude.to_string(),
            s.longitude.to_string(),
            s.sequence.to_string(),
        ];
        if with_dist {
            row.push(opt_f32(&s.dist_traveled));
        }
        row.extend(extra_cols.iter().map(|c| extras_value(&s.extras, c).to_owned()));
        write_row(&mut writer, row, "shapes.txt")?;
    }
    finish(writer)
}

fn bool_field(value: bool) -> String {
    if value {
        "1".into()
    } else {
        "0".into()
    }
}
