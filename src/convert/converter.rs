//! The TXC → GTFS conversion engine.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use gtfs_store::{
    Agency, Calendar, CalendarDate, DirectionType, GtfsFeed, Route, RouteType, Shape, Stop,
    StopTime, Trip,
};
use log::info;
use rayon::prelude::*;
use sha2::{Digest, Sha256};

use super::calendar::{expand_profile, mint_service_id, to_calendar_rows};
use super::options::{Conversion, ConversionStats, ConvertOptions};
use crate::error::{Error, Result};
use crate::txc::{
    JourneyPattern, JourneyPatternTimingLink, OperatingProfile, TxcDocument, TxcLine, TxcService,
};

/// Converts TXC documents into GTFS feeds.
///
/// Conversion is deterministic: identical documents and options produce
/// byte-identical feeds, single or batched.
pub struct TxcConverter {
    options: ConvertOptions,
}

/// Pre-mapped artifacts of one document, merged in input order afterwards.
#[derive(Default)]
struct DocumentArtifacts {
    agencies: Vec<Agency>,
    stops: Vec<Stop>,
    routes: Vec<Route>,
    trips: Vec<Trip>,
    stop_times: Vec<StopTime>,
    calendars: Vec<(Calendar, Vec<CalendarDate>)>,
    shapes: Vec<Shape>,
    warnings: Vec<String>,
}

impl TxcConverter {
    /// Creates a converter with the given options.
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    /// Creates a converter with default options.
    pub fn with_defaults() -> Self {
        Self::new(ConvertOptions::default())
    }

    /// Converts a single document.
    pub fn convert(&self, doc: &TxcDocument) -> Result<Conversion> {
        let artifacts = self.convert_document(doc, None)?;
        Ok(assemble(vec![artifacts]))
    }

    /// Converts a batch of documents into one merged feed.
    ///
    /// Documents are pre-mapped in parallel, then merged single-threadedly in
    /// input order. With more than one document, trip and shape ids are
    /// prefixed with a per-document discriminator so batches never collide;
    /// a one-document batch is identical to [TxcConverter::convert].
    pub fn convert_batch(&self, docs: &[TxcDocument]) -> Result<Conversion> {
        let prefix_ids = docs.len() > 1;
        let mapped: Vec<Result<DocumentArtifacts>> = docs
            .par_iter()
            .enumerate()
            .map(|(ordinal, doc)| {
                let disc = if prefix_ids { Some(discriminator(doc, ordinal)) } else { None };
                self.convert_document(doc, disc.as_deref())
            })
            .collect();

        let mut artifacts = Vec::with_capacity(mapped.len());
        for result in mapped {
            self.check_cancelled()?;
            artifacts.push(result?);
        }
        Ok(assemble(artifacts))
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.options.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    fn convert_document(
        &self,
        doc: &TxcDocument,
        disc: Option<&str>,
    ) -> Result<DocumentArtifacts> {
        self.check_cancelled()?;
        let mut art = DocumentArtifacts::default();

        for operator in &doc.operators {
            art.agencies.push(Agency {
                id: Some(operator.code().to_owned()),
                name: operator.display_name().to_owned(),
                url: self.options.default_agency_url.clone(),
                timezone: self.options.default_timezone.clone(),
                ..Agency::default()
            });
        }
        if doc.operators.is_empty() && !doc.services.is_empty() {
            art.warnings.push(document_label(doc, "document has services but no operators"));
        }

        for stop_point in &doc.stop_points {
            art.stops.push(Stop {
                id: stop_point.atco_code.clone(),
                name: stop_point.common_name.clone(),
                latitude: stop_point.latitude,
                longitude: stop_point.longitude,
                ..Stop::default()
            });
        }

        for service in &doc.services {
            let agency_id = self.agency_for_service(doc, service);
            for line in &service.lines {
                art.routes.push(Route {
                    id: route_id(service, line),
                    short_name: Some(if line.name.is_empty() {
                        line.id.clone()
                    } else {
                        line.name.clone()
                    }),
                    long_name: service.description.clone(),
                    route_type: mode_to_route_type(service.mode.as_deref()),
                    agency_id: agency_id.clone(),
                    ..Route::default()
                });
            }
            if service.lines.is_empty() {
                art.warnings.push(format!(
                    "service {} has no lines; vehicle journeys cannot be routed",
                    service.service_code
                ));
            }
        }

        let patterns: HashMap<&str, (&TxcService, &JourneyPattern)> = doc
            .services
            .iter()
            .flat_map(|s| s.journey_patterns.iter().map(move |jp| (jp.id.as_str(), (s, jp))))
            .collect();

        let mut minted: HashSet<String> = HashSet::new();
        let mut shape_cache: HashMap<String, Option<String>> = HashMap::new();

        for (index, journey) in doc.vehicle_journeys.iter().enumerate() {
            let trip_code = journey
                .code
                .clone()
                .or_else(|| journey.private_code.clone())
                .unwrap_or_else(|| format!("VJ{}", index + 1));
            let trip_id = prefixed(disc, &trip_code);

            let jp_ref = match &journey.journey_pattern_ref {
                Some(r) => r.as_str(),
                None => {
                    art.warnings.push(format!(
                        "vehicle journey {} has no journey pattern reference; skipped",
                        trip_code
                    ));
                    continue;
                }
            };
            let (service, pattern) = match patterns.get(jp_ref) {
                Some(found) => *found,
                None => {
                    art.warnings.push(format!(
                        "vehicle journey {} references unknown journey pattern {}; skipped",
                        trip_code, jp_ref
                    ));
                    continue;
                }
            };
            let line = match self.line_for_journey(service, journey) {
                Some(line) => line,
                None => {
                    art.warnings.push(format!(
                        "vehicle journey {} has no line on service {}; skipped",
                        trip_code, service.service_code
                    ));
                    continue;
                }
            };
            let departure = match journey.departure_seconds {
                Some(seconds) => seconds,
                None => {
                    art.warnings.push(format!(
                        "vehicle journey {} has no departure time; skipped",
                        trip_code
                    ));
                    continue;
                }
            };

            let links = self.collect_links(doc, pattern, &trip_code, &mut art.warnings);
            if links.is_empty() {
                art.warnings.push(format!(
                    "journey pattern {} resolves to no timing links; vehicle journey {} skipped",
                    pattern.id, trip_code
                ));
                continue;
            }

            // Journey-level profile overrides the service-level one.
            let default_profile;
            let profile: &OperatingProfile = match (&journey.operating_profile, &service.operating_profile) {
                (Some(own), _) => own,
                (None, Some(shared)) => shared,
                (None, None) => {
                    default_profile = OperatingProfile::monday_to_friday();
                    &default_profile
                }
            };
            let window = self.service_window(service, &mut art.warnings);
            let expanded =
                expand_profile(profile, window, self.options.region, &mut art.warnings);
            let service_id = mint_service_id(&expanded);
            if minted.insert(service_id.clone()) {
                art.calendars.push(to_calendar_rows(&service_id, &expanded));
            }

            let shape_id = if self.options.include_shapes {
                self.shape_for_pattern(doc, pattern, disc, &mut shape_cache, &mut art.shapes)
            } else {
                None
            };

            let inbound = pattern.direction.as_deref() == Some("inbound");
            art.trips.push(Trip {
                id: trip_id.clone(),
                route_id: route_id(service, line),
                service_id,
                headsign: if inbound {
                    service.origin.clone()
                } else {
                    service.destination.clone()
                },
                direction_id: pattern.direction.as_deref().map(|d| {
                    if d == "inbound" {
                        DirectionType::Inbound
                    } else {
                        DirectionType::Outbound
                    }
                }),
                shape_id,
                ..Trip::default()
            });

            expand_stop_times(&trip_id, departure, &links, &mut art.stop_times, &mut art.warnings);
        }

        Ok(art)
    }

    fn agency_for_service(&self, doc: &TxcDocument, service: &TxcService) -> Option<String> {
        service
            .registered_operator_ref
            .as_deref()
            .and_then(|r| doc.operator_by_id(r))
            .or_else(|| doc.operators.first())
            .map(|o| o.code().to_owned())
    }

    fn line_for_journey<'a>(
        &self,
        service: &'a TxcService,
        journey: &crate::txc::VehicleJourney,
    ) -> Option<&'a TxcLine> {
        journey
            .line_ref
            .as_deref()
            .and_then(|r| service.lines.iter().find(|l| l.id == r))
            .or_else(|| service.lines.first())
    }

    fn collect_links<'a>(
        &self,
        doc: &'a TxcDocument,
        pattern: &JourneyPattern,
        trip_code: &str,
        warnings: &mut Vec<String>,
    ) -> Vec<&'a JourneyPatternTimingLink> {
        let mut links = Vec::new();
        for section_ref in &pattern.section_refs {
            match doc.journey_pattern_section(section_ref) {
                Some(section) => links.extend(section.timing_links.iter()),
                None => warnings.push(format!(
                    "vehicle journey {} references unknown journey pattern section {}",
                    trip_code, section_ref
                )),
            }
        }
        links
    }

    /// The service window: explicit options win, then the OperatingPeriod.
    /// An open end closes one year after the start.
    fn service_window(
        &self,
        service: &TxcService,
        warnings: &mut Vec<String>,
    ) -> (NaiveDate, NaiveDate) {
        let period = service.operating_period.unwrap_or_default();
        let start = self.options.calendar_start.or(period.start).unwrap_or_else(|| {
            warnings.push(format!(
                "service {} has no operating period start; defaulting to 2000-01-01",
                service.service_code
            ));
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
        });
        let end = self
            .options
            .calendar_end
            .or(period.end)
            .unwrap_or_else(|| start + Duration::days(365));
        (start, end.max(start))
    }

    /// Builds (once per journey pattern) the shape from the concatenated
    /// route-link geometry, and returns its id.
    fn shape_for_pattern(
        &self,
        doc: &TxcDocument,
        pattern: &JourneyPattern,
        disc: Option<&str>,
        cache: &mut HashMap<String, Option<String>>,
        shapes: &mut Vec<Shape>,
    ) -> Option<String> {
        if let Some(cached) = cache.get(&pattern.id) {
            return cached.clone();
        }
        let mut points: Vec<(f64, f64)> = Vec::new();
        if let Some(route) = pattern.route_ref.as_deref().and_then(|r| doc.route_by_id(r)) {
            for section_ref in &route.section_refs {
                if let Some(section) = doc.route_section(section_ref) {
                    for link in &section.links {
                        points.extend(link.locations.iter().copied());
                    }
                }
            }
        }
        let shape_id = if points.is_empty() {
            None
        } else {
            let id = prefixed(disc, &format!("shp_{}", pattern.id));
            for (offset, (latitude, longitude)) in points.into_iter().enumerate() {
                shapes.push(Shape {
                    id: id.clone(),
                    latitude,
                    longitude,
                    sequence: offset as u32 + 1,
                    ..Shape::default()
                });
            }
            Some(id)
        };
        cache.insert(pattern.id.clone(), shape_id.clone());
        shape_id
    }
}

/// Walks the timing links and materializes absolute stop times.
///
/// The cursor starts at the journey departure; each link adds its run time
/// for the arrival at its to-stop, and the departure adds the wait at that
/// stop plus the wait before the next link.
fn expand_stop_times(
    trip_id: &str,
    departure: u32,
    links: &[&JourneyPatternTimingLink],
    stop_times: &mut Vec<StopTime>,
    warnings: &mut Vec<String>,
) {
    let first_wait = links[0].from.wait_seconds.unwrap_or(0);
    stop_times.push(StopTime {
        trip_id: trip_id.to_owned(),
        arrival_time: Some(departure),
        departure_time: Some(departure + first_wait),
        stop_id: links[0].from.stop_ref.clone(),
        stop_sequence: 1,
        ..StopTime::default()
    });

    let mut cursor = departure + first_wait;
    for (index, link) in links.iter().enumerate() {
        let run = match link.run_time_seconds {
            Some(seconds) => seconds,
            None => {
                warnings.push(format!(
                    "timing link {} of trip {} has no run time; assuming 0 seconds",
                    link.id, trip_id
                ));
                0
            }
        };
        cursor += run;
        let wait_here = link.to.wait_seconds.unwrap_or(0);
        let wait_next = links.get(index + 1).and_then(|next| next.from.wait_seconds).unwrap_or(0);
        let leave = cursor + wait_here + wait_next;
        stop_times.push(StopTime {
            trip_id: trip_id.to_owned(),
            arrival_time: Some(cursor),
            departure_time: Some(leave),
            stop_id: link.to.stop_ref.clone(),
            stop_sequence: index as u32 + 2,
            ..StopTime::default()
        });
        cursor = leave;
    }
}

/// Merges pre-mapped documents in input order, deduplicating agencies, stops,
/// routes, services and shapes by their keys. Trips are never collapsed.
fn assemble(artifacts: Vec<DocumentArtifacts>) -> Conversion {
    let mut feed = GtfsFeed::default();
    let mut warnings = Vec::new();
    let mut seen_agencies = HashSet::new();
    let mut seen_stops = HashSet::new();
    let mut seen_routes = HashSet::new();
    let mut seen_services = HashSet::new();
    let mut seen_shapes: HashSet<String> = HashSet::new();
    let mut shape_ids = HashSet::new();

    for art in artifacts {
        for agency in art.agencies {
            if seen_agencies.insert(agency.id.clone().unwrap_or_default()) {
                feed.agencies.push(agency);
            }
        }
        for stop in art.stops {
            if seen_stops.insert(stop.id.clone()) {
                feed.stops.push(stop);
            }
        }
        for route in art.routes {
            if seen_routes.insert(route.id.clone()) {
                feed.routes.push(route);
            }
        }
        for (calendar, dates) in art.calendars {
            if seen_services.insert(calendar.service_id.clone()) {
                feed.calendars.push(calendar);
                feed.calendar_dates.extend(dates);
            }
        }
        let mut local_ids = HashSet::new();
        for point in art.shapes {
            if seen_shapes.contains(&point.id) {
                continue;
            }
            local_ids.insert(point.id.clone());
            shape_ids.insert(point.id.clone());
            feed.shapes.push(point);
        }
        seen_shapes.extend(local_ids);
        feed.trips.extend(art.trips);
        feed.stop_times.extend(art.stop_times);
        warnings.extend(art.warnings);
    }

    let stats = ConversionStats {
        agencies: feed.agencies.len(),
        stops: feed.stops.len(),
        routes: feed.routes.len(),
        trips: feed.trips.len(),
        stop_times: feed.stop_times.len(),
        calendars: feed.calendars.len(),
        calendar_exceptions: feed.calendar_dates.len(),
        shapes_generated: shape_ids.len(),
    };
    info!(
        "converted TXC to GTFS: {} trips, {} stop times, {} calendars, {} warnings",
        stats.trips,
        stats.stop_times,
        stats.calendars,
        warnings.len()
    );
    Conversion { feed, stats, warnings }
}

fn route_id(service: &TxcService, line: &TxcLine) -> String {
    format!("{}:{}", service.service_code, line.id)
}

fn prefixed(disc: Option<&str>, id: &str) -> String {
    match disc {
        Some(prefix) => format!("{}:{}", prefix, id),
        None => id.to_owned(),
    }
}

/// A stable per-document discriminator: the filename hash, else the ordinal.
fn discriminator(doc: &TxcDocument, ordinal: usize) -> String {
    let mut hasher = Sha256::new();
    match &doc.filename {
        Some(name) => hasher.update(name.as_bytes()),
        None => hasher.update(format!("ordinal:{}", ordinal).as_bytes()),
    }
    let digest = hasher.finalize();
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}

/// TXC Mode to GTFS route_type. Every mapping stays in the base 0..12 range;
/// coach services ride on the bus type, and unrecognized modes default to it.
fn mode_to_route_type(mode: Option<&str>) -> RouteType {
    match mode.map(|m| m.to_ascii_lowercase()).as_deref() {
        Some("tram") => RouteType::Tramway,
        Some("underground") | Some("metro") => RouteType::Subway,
        Some("rail") => RouteType::Rail,
        Some("ferry") => RouteType::Ferry,
        Some("coach") => RouteType::Bus,
        _ => RouteType::Bus,
    }
}

fn document_label(doc: &TxcDocument, message: &str) -> String {
    match &doc.filename {
        Some(name) => format!("{}: {}", name, message),
        None => message.to_owned(),
    }
}
