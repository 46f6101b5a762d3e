//! Streaming TransXChange parser.
//!
//! Walks the XML event by event and materializes only the subtrees the
//! converter needs. Element matching is by local name so documents mixing
//! default and prefixed namespaces parse identically. Unknown elements are
//! skipped; malformed XML produces an empty document with the failure in the
//! diagnostic bag rather than an error.

use std::path::Path;

use chrono::NaiveDate;
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::duration::parse_duration_seconds;
use super::model::*;
use crate::error::Error;

type XmlReader<'a> = Reader<&'a [u8]>;
type XResult<T> = Result<T, quick_xml::Error>;

impl TxcDocument {
    /// Loads a TXC document from a file.
    ///
    /// Missing files are an error; malformed content is not (see
    /// [TxcDocument::diagnostics]).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<TxcDocument, Error> {
        let p = path.as_ref();
        if !p.is_file() {
            return Err(Error::TxcNotFound { path: p.display().to_string() });
        }
        let bytes = std::fs::read(p)?;
        let filename = p.file_name().and_then(|f| f.to_str()).map(String::from);
        Ok(parse_document(&bytes, filename))
    }

    /// Parses a TXC document from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> TxcDocument {
        parse_document(bytes, None)
    }

    /// Parses a TXC document from a string.
    pub fn from_str(content: &str) -> TxcDocument {
        parse_document(content.as_bytes(), None)
    }
}

/// Parses a whole document, soft-failing into the diagnostic bag.
pub(crate) fn parse_document(bytes: &[u8], filename: Option<String>) -> TxcDocument {
    let mut doc = TxcDocument { filename, ..Default::default() };
    match parse_root(bytes, &mut doc) {
        Ok(found_root) => {
            if !found_root {
                doc.diagnostics.push(TxcDiagnostic {
                    element: "TransXChange".to_owned(),
                    line: 0,
                    reason: "no TransXChange root element found".to_owned(),
                });
            }
        }
        Err((err, pos)) => {
            doc.diagnostics.push(TxcDiagnostic {
                element: "TransXChange".to_owned(),
                line: line_at(bytes, pos),
                reason: format!("malformed XML: {}", err),
            });
        }
    }
    debug!(
        "parsed TXC document{}: {} operators, {} services, {} stop points, {} vehicle journeys",
        doc.filename.as_deref().map(|f| format!(" {}", f)).unwrap_or_default(),
        doc.operator_count(),
        doc.service_count(),
        doc.stop_point_count(),
        doc.vehicle_journey_count(),
    );
    doc
}

fn parse_root(bytes: &[u8], doc: &mut TxcDocument) -> Result<bool, (quick_xml::Error, usize)> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut found_root = false;

    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| (e, reader.buffer_position() as usize))?;
        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "TransXChange" {
                    found_root = true;
                    doc.schema_version = attr(&e, "SchemaVersion").unwrap_or_default();
                } else if found_root {
                    dispatch_section(&name, &mut reader, &mut buf, doc)
                        .map_err(|e| (e, reader.buffer_position() as usize))?;
                } else {
                    skip_element(&mut reader, &mut buf)
                        .map_err(|e| (e, reader.buffer_position() as usize))?;
                }
            }
            Event::Empty(e) => {
                if local_name(&e) == "TransXChange" {
                    found_root = true;
                    doc.schema_version = attr(&e, "SchemaVersion").unwrap_or_default();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found_root)
}

fn dispatch_section(
    name: &str,
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<()> {
    match name {
        "Operators" => parse_operators(reader, buf, doc),
        "StopPoints" => parse_stop_points(reader, buf, doc),
        "RouteSections" => parse_route_sections(reader, buf, doc),
        "Routes" => parse_routes(reader, buf, doc),
        "JourneyPatternSections" => parse_journey_pattern_sections(reader, buf, doc),
        "Services" => parse_services(reader, buf, doc),
        "VehicleJourneys" => parse_vehicle_journeys(reader, buf, doc),
        _ => skip_element(reader, buf),
    }
}

fn parse_operators(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "Operator" || name == "LicensedOperator" {
                    let id = attr(&e, "id").unwrap_or_default();
                    let operator = parse_operator(reader, buf, id)?;
                    doc.operators.push(operator);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_operator(reader: &mut XmlReader, buf: &mut Vec<u8>, id: String) -> XResult<Operator> {
    let mut operator = Operator { id, ..Default::default() };
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "NationalOperatorCode" => {
                        operator.national_operator_code = non_empty(read_text(reader, buf)?)
                    }
                    "OperatorCode" => operator.operator_code = non_empty(read_text(reader, buf)?),
                    "OperatorShortName" => {
                        operator.short_name = non_empty(read_text(reader, buf)?)
                    }
                    "TradingName" => operator.trading_name = non_empty(read_text(reader, buf)?),
                    "LicenceNumber" => {
                        operator.license_number = non_empty(read_text(reader, buf)?)
                    }
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(operator)
}

fn parse_stop_points(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "AnnotatedStopPointRef" || name == "StopPoint" {
                    let mut stop = AnnotatedStopPoint::default();
                    parse_stop_point_children(reader, buf, &mut stop)?;
                    doc.stop_points.push(stop);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_stop_point_children(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    stop: &mut AnnotatedStopPoint,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "StopPointRef" | "AtcoCode" => stop.atco_code = read_text(reader, buf)?,
                    "CommonName" => stop.common_name = read_text(reader, buf)?,
                    // Descriptor and Place wrap the same children one level down.
                    "Descriptor" | "Place" => parse_stop_point_children(reader, buf, stop)?,
                    "Location" | "Translation" => parse_stop_location(reader, buf, stop)?,
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_stop_location(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    stop: &mut AnnotatedStopPoint,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "Latitude" => stop.latitude = read_text(reader, buf)?.parse().ok(),
                    "Longitude" => stop.longitude = read_text(reader, buf)?.parse().ok(),
                    "Translation" => parse_stop_location(reader, buf, stop)?,
                    // Grid references (Easting/Northing) are not converted.
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_route_sections(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "RouteSection" {
                    let id = attr(&e, "id").unwrap_or_default();
                    let section = parse_route_section(reader, buf, id)?;
                    doc.route_sections.push(section);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_route_section(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    id: String,
) -> XResult<RouteSection> {
    let mut section = RouteSection { id, links: Vec::new() };
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "RouteLink" {
                    let link_id = attr(&e, "id").unwrap_or_default();
                    let link = parse_route_link(reader, buf, link_id)?;
                    section.links.push(link);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(section)
}

fn parse_route_link(reader: &mut XmlReader, buf: &mut Vec<u8>, id: String) -> XResult<RouteLink> {
    let mut link = RouteLink { id, ..Default::default() };
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "From" => link.from_stop = parse_stop_ref(reader, buf)?,
                    "To" => link.to_stop = parse_stop_ref(reader, buf)?,
                    "Distance" => link.distance = read_text(reader, buf)?.parse().ok(),
                    "Track" | "Mapping" => parse_track(reader, buf, &mut link.locations)?,
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(link)
}

fn parse_stop_ref(reader: &mut XmlReader, buf: &mut Vec<u8>) -> XResult<Option<String>> {
    let mut stop_ref = None;
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "StopPointRef" {
                    stop_ref = non_empty(read_text(reader, buf)?);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(stop_ref)
}

fn parse_track(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    locations: &mut Vec<(f64, f64)>,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "Mapping" => parse_track(reader, buf, locations)?,
                    "Location" => {
                        if let Some(pair) = parse_location_pair(reader, buf)? {
                            locations.push(pair);
                        }
                    }
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_location_pair(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
) -> XResult<Option<(f64, f64)>> {
    let mut latitude: Option<f64> = None;
    let mut longitude: Option<f64> = None;
    parse_location_fields(reader, buf, &mut latitude, &mut longitude)?;
    Ok(latitude.zip(longitude))
}

fn parse_location_fields(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    latitude: &mut Option<f64>,
    longitude: &mut Option<f64>,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "Latitude" => *latitude = read_text(reader, buf)?.parse().ok(),
                    "Longitude" => *longitude = read_text(reader, buf)?.parse().ok(),
                    "Translation" => parse_location_fields(reader, buf, latitude, longitude)?,
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_routes(reader: &mut XmlReader, buf: &mut Vec<u8>, doc: &mut TxcDocument) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "Route" {
                    let id = attr(&e, "id").unwrap_or_default();
                    let route = parse_route(reader, buf, id)?;
                    doc.routes.push(route);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_route(reader: &mut XmlReader, buf: &mut Vec<u8>, id: String) -> XResult<TxcRoute> {
    let mut route = TxcRoute { id, ..Default::default() };
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "PrivateCode" => route.private_code = non_empty(read_text(reader, buf)?),
                    "Description" => route.description = non_empty(read_text(reader, buf)?),
                    "RouteSectionRef" => {
                        if let Some(section_ref) = non_empty(read_text(reader, buf)?) {
                            route.section_refs.push(section_ref);
                        }
                    }
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(route)
}

fn parse_journey_pattern_sections(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "JourneyPatternSection" {
                    let id = attr(&e, "id").unwrap_or_default();
                    let section = parse_journey_pattern_section(reader, buf, id, doc)?;
                    doc.journey_pattern_sections.push(section);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_journey_pattern_section(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    id: String,
    doc: &mut TxcDocument,
) -> XResult<JourneyPatternSection> {
    let mut section = JourneyPatternSection { id, timing_links: Vec::new() };
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "JourneyPatternTimingLink" {
                    let link_id = attr(&e, "id").unwrap_or_default();
                    let link = parse_timing_link(reader, buf, link_id, doc)?;
                    section.timing_links.push(link);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(section)
}

fn parse_timing_link(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    id: String,
    doc: &mut TxcDocument,
) -> XResult<JourneyPatternTimingLink> {
    let mut link = JourneyPatternTimingLink { id, ..Default::default() };
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "From" => link.from = parse_timing_stop(reader, buf, doc)?,
                    "To" => link.to = parse_timing_stop(reader, buf, doc)?,
                    "RouteLinkRef" => link.route_link_ref = non_empty(read_text(reader, buf)?),
                    "RunTime" => {
                        let raw = read_text(reader, buf)?;
                        link.run_time_seconds = parse_duration_seconds(&raw);
                        if link.run_time_seconds.is_none() {
                            doc.diagnostics.push(TxcDiagnostic {
                                element: "RunTime".to_owned(),
                                line: 0,
                                reason: format!("unparsable duration '{}'", raw),
                            });
                        }
                    }
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(link)
}

fn parse_timing_stop(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<TimingStop> {
    let mut stop = TimingStop::default();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "StopPointRef" => stop.stop_ref = read_text(reader, buf)?,
                    "WaitTime" => {
                        let raw = read_text(reader, buf)?;
                        stop.wait_seconds = parse_duration_seconds(&raw);
                        if stop.wait_seconds.is_none() {
                            doc.diagnostics.push(TxcDiagnostic {
                                element: "WaitTime".to_owned(),
                                line: 0,
                                reason: format!("unparsable duration '{}'", raw),
                            });
                        }
                    }
                    "Activity" => stop.activity = non_empty(read_text(reader, buf)?),
                    "TimingStatus" => stop.timing_status = non_empty(read_text(reader, buf)?),
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(stop)
}

fn parse_services(reader: &mut XmlReader, buf: &mut Vec<u8>, doc: &mut TxcDocument) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "Service" {
                    let service = parse_service(reader, buf, doc)?;
                    doc.services.push(service);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_service(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<TxcService> {
    let mut service = TxcService::default();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "ServiceCode" => service.service_code = read_text(reader, buf)?,
                    "Lines" => parse_lines(reader, buf, &mut service.lines)?,
                    "Description" => service.description = non_empty(read_text(reader, buf)?),
                    "Mode" => service.mode = non_empty(read_text(reader, buf)?),
                    "RegisteredOperatorRef" => {
                        service.registered_operator_ref = non_empty(read_text(reader, buf)?)
                    }
                    "OperatingPeriod" => {
                        service.operating_period = Some(parse_operating_period(reader, buf)?)
                    }
                    "OperatingProfile" => {
                        service.operating_profile =
                            Some(parse_operating_profile(reader, buf, doc)?)
                    }
                    "StandardService" => parse_standard_service(reader, buf, &mut service)?,
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(service)
}

fn parse_lines(reader: &mut XmlReader, buf: &mut Vec<u8>, lines: &mut Vec<TxcLine>) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "Line" {
                    let id = attr(&e, "id").unwrap_or_default();
                    let mut line = TxcLine { id, name: String::new() };
                    parse_line(reader, buf, &mut line)?;
                    lines.push(line);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_line(reader: &mut XmlReader, buf: &mut Vec<u8>, line: &mut TxcLine) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "LineName" {
                    line.name = read_text(reader, buf)?;
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_operating_period(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
) -> XResult<OperatingPeriod> {
    let mut period = OperatingPeriod::default();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "StartDate" => period.start = parse_iso_date(&read_text(reader, buf)?),
                    "EndDate" => period.end = parse_iso_date(&read_text(reader, buf)?),
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(period)
}

fn parse_standard_service(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    service: &mut TxcService,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "Origin" => service.origin = non_empty(read_text(reader, buf)?),
                    "Destination" => service.destination = non_empty(read_text(reader, buf)?),
                    "JourneyPattern" => {
                        let id = attr(&e, "id").unwrap_or_default();
                        let pattern = parse_journey_pattern(reader, buf, id)?;
                        service.journey_patterns.push(pattern);
                    }
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_journey_pattern(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    id: String,
) -> XResult<JourneyPattern> {
    let mut pattern = JourneyPattern { id, ..Default::default() };
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "Direction" => pattern.direction = non_empty(read_text(reader, buf)?),
                    "RouteRef" => pattern.route_ref = non_empty(read_text(reader, buf)?),
                    "JourneyPatternSectionRefs" => {
                        if let Some(section_ref) = non_empty(read_text(reader, buf)?) {
                            pattern.section_refs.push(section_ref);
                        }
                    }
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(pattern)
}

fn parse_vehicle_journeys(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "VehicleJourney" {
                    let journey = parse_vehicle_journey(reader, buf, doc)?;
                    doc.vehicle_journeys.push(journey);
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_vehicle_journey(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<VehicleJourney> {
    let mut journey = VehicleJourney::default();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "VehicleJourneyCode" => journey.code = non_empty(read_text(reader, buf)?),
                    "PrivateCode" => journey.private_code = non_empty(read_text(reader, buf)?),
                    "OperatorRef" => journey.operator_ref = non_empty(read_text(reader, buf)?),
                    "ServiceRef" => journey.service_ref = non_empty(read_text(reader, buf)?),
                    "LineRef" => journey.line_ref = non_empty(read_text(reader, buf)?),
                    "JourneyPatternRef" => {
                        journey.journey_pattern_ref = non_empty(read_text(reader, buf)?)
                    }
                    "DepartureTime" => {
                        let raw = read_text(reader, buf)?;
                        journey.departure_seconds = gtfs_store::parse_time(&raw).ok();
                        if journey.departure_seconds.is_none() {
                            doc.diagnostics.push(TxcDiagnostic {
                                element: "DepartureTime".to_owned(),
                                line: 0,
                                reason: format!("unparsable time '{}'", raw),
                            });
                        }
                    }
                    "OperatingProfile" => {
                        journey.operating_profile =
                            Some(parse_operating_profile(reader, buf, doc)?)
                    }
                    // 2.5 carries the on-vehicle journey code one level down.
                    "Operational" => parse_operational(reader, buf, &mut journey)?,
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(journey)
}

fn parse_operational(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    journey: &mut VehicleJourney,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "TicketMachine" => parse_operational(reader, buf, journey)?,
                    "JourneyCode" => journey.journey_code = non_empty(read_text(reader, buf)?),
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_operating_profile(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    doc: &mut TxcDocument,
) -> XResult<OperatingProfile> {
    let mut profile = OperatingProfile::default();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "RegularDayType" => {
                        parse_regular_day_type(reader, buf, &mut profile.regular_days)?
                    }
                    "PeriodicDayType" => {
                        doc.diagnostics.push(TxcDiagnostic {
                            element: "PeriodicDayType".to_owned(),
                            line: 0,
                            reason: "periodic day types are not expanded".to_owned(),
                        });
                        skip_element(reader, buf)?;
                    }
                    "SpecialDaysOperation" => parse_special_days(reader, buf, &mut profile)?,
                    "BankHolidayOperation" => parse_bank_holidays(reader, buf, &mut profile)?,
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(profile)
}

fn parse_regular_day_type(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    days: &mut RegularDays,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "DaysOfWeek" => parse_days_of_week(reader, buf, &mut days.weekdays)?,
                    "HolidaysOnly" => {
                        days.holidays_only = true;
                        skip_element(reader, buf)?;
                    }
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::Empty(e) => {
                if local_name(&e) == "HolidaysOnly" {
                    days.holidays_only = true;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_days_of_week(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    weekdays: &mut [bool; 7],
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                apply_day_name(&name, weekdays);
                skip_element(reader, buf)?;
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                apply_day_name(&name, weekdays);
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

/// Maps a TXC day-type element name onto the Monday-first weekday flags.
fn apply_day_name(name: &str, weekdays: &mut [bool; 7]) {
    let set = |w: &mut [bool; 7], range: std::ops::RangeInclusive<usize>| {
        for i in range {
            w[i] = true;
        }
    };
    match name {
        "Monday" => weekdays[0] = true,
        "Tuesday" => weekdays[1] = true,
        "Wednesday" => weekdays[2] = true,
        "Thursday" => weekdays[3] = true,
        "Friday" => weekdays[4] = true,
        "Saturday" => weekdays[5] = true,
        "Sunday" => weekdays[6] = true,
        "MondayToFriday" => set(weekdays, 0..=4),
        "MondayToSaturday" => set(weekdays, 0..=5),
        "MondayToSunday" => set(weekdays, 0..=6),
        "Weekend" => set(weekdays, 5..=6),
        "NotSaturday" => {
            set(weekdays, 0..=4);
            weekdays[6] = true;
        }
        "NotSunday" => set(weekdays, 0..=5),
        _ => {}
    }
}

fn parse_special_days(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    profile: &mut OperatingProfile,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "DaysOfOperation" => {
                        parse_date_ranges(reader, buf, &mut profile.special_operation)?
                    }
                    "DaysOfNonOperation" => {
                        parse_date_ranges(reader, buf, &mut profile.special_non_operation)?
                    }
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_date_ranges(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    ranges: &mut Vec<DateRange>,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "DateRange" {
                    if let Some(range) = parse_date_range(reader, buf)? {
                        ranges.push(range);
                    }
                } else {
                    skip_element(reader, buf)?;
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_date_range(reader: &mut XmlReader, buf: &mut Vec<u8>) -> XResult<Option<DateRange>> {
    let mut start = None;
    let mut end = None;
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "StartDate" => start = parse_iso_date(&read_text(reader, buf)?),
                    "EndDate" => end = parse_iso_date(&read_text(reader, buf)?),
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    // A single-day range may omit its end date.
    Ok(start.map(|s| DateRange { start: s, end: end.unwrap_or(s) }))
}

fn parse_bank_holidays(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    profile: &mut OperatingProfile,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "DaysOfOperation" => {
                        parse_holiday_names(reader, buf, &mut profile.bank_holiday_operation)?
                    }
                    "DaysOfNonOperation" => {
                        parse_holiday_names(reader, buf, &mut profile.bank_holiday_non_operation)?
                    }
                    _ => skip_element(reader, buf)?,
                }
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_holiday_names(
    reader: &mut XmlReader,
    buf: &mut Vec<u8>,
    names: &mut Vec<String>,
) -> XResult<()> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                names.push(name);
                skip_element(reader, buf)?;
            }
            Event::Empty(e) => names.push(local_name(&e)),
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

/// Collects the text content of the current element, through nested markup.
fn read_text(reader: &mut XmlReader, buf: &mut Vec<u8>) -> XResult<String> {
    let mut out = String::new();
    let mut depth = 0u32;
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Event::Text(t) => {
                if let Ok(text) = t.unescape() {
                    out.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out.trim().to_owned())
}

/// Consumes the rest of the current element, nested children included.
fn skip_element(reader: &mut XmlReader, buf: &mut Vec<u8>) -> XResult<()> {
    let mut depth = 0u32;
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn line_at(bytes: &[u8], pos: usize) -> u64 {
    let end = pos.min(bytes.len());
    bytes[..end].iter().filter(|&&b| b == b'\n').count() as u64 + 1
}
