use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use once_cell::sync::OnceCell;

use crate::{
    Agency, Calendar, CalendarDate, Error, Exception, GtfsFeed, LazyGtfsFeed, Route, Shape, Stop,
    StopTime, Trip,
};

/// A date given to the filter, normalized before use.
///
/// Strings are sniffed between the two accepted layouts; anything else fails
/// with [Error::InvalidDate] when resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateInput {
    /// `YYYY-MM-DD`
    Iso8601(String),
    /// `YYYYMMDD`, as written inside GTFS files
    Compact(String),
    /// An already-parsed date
    Native(NaiveDate),
}

impl From<&str> for DateInput {
    fn from(s: &str) -> Self {
        if s.contains('-') {
            DateInput::Iso8601(s.to_owned())
        } else {
            DateInput::Compact(s.to_owned())
        }
    }
}

impl From<String> for DateInput {
    fn from(s: String) -> Self {
        DateInput::from(s.as_str())
    }
}

impl From<NaiveDate> for DateInput {
    fn from(d: NaiveDate) -> Self {
        DateInput::Native(d)
    }
}

impl DateInput {
    /// Normalizes to a [NaiveDate], failing on malformed strings.
    pub fn resolve(&self) -> Result<NaiveDate, Error> {
        match self {
            DateInput::Iso8601(s) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| Error::InvalidDate {
                    value: s.clone(),
                    expected: "YYYY-MM-DD".to_owned(),
                })
            }
            DateInput::Compact(s) => {
                NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| Error::InvalidDate {
                    value: s.clone(),
                    expected: "YYYYMMDD".to_owned(),
                })
            }
            DateInput::Native(d) => Ok(*d),
        }
    }
}

/// Read access to the eight feed tables, eager or lazy.
///
/// Implemented by [GtfsFeed] (infallible) and [LazyGtfsFeed] (materializes the
/// table on first touch), so one [GtfsFilter] serves both.
pub trait FeedTables {
    /// All agencies
    fn agencies(&self) -> Result<&[Agency], Error>;
    /// All stops
    fn stops(&self) -> Result<&[Stop], Error>;
    /// All routes
    fn routes(&self) -> Result<&[Route], Error>;
    /// All trips
    fn trips(&self) -> Result<&[Trip], Error>;
    /// All stop times
    fn stop_times(&self) -> Result<&[StopTime], Error>;
    /// All calendars
    fn calendars(&self) -> Result<&[Calendar], Error>;
    /// All calendar exceptions
    fn calendar_dates(&self) -> Result<&[CalendarDate], Error>;
    /// All shape points
    fn shapes(&self) -> Result<&[Shape], Error>;
}

impl FeedTables for GtfsFeed {
    fn agencies(&self) -> Result<&[Agency], Error> {
        Ok(&self.agencies)
    }
    fn stops(&self) -> Result<&[Stop], Error> {
        Ok(&self.stops)
    }
    fn routes(&self) -> Result<&[Route], Error> {
        Ok(&self.routes)
    }
    fn trips(&self) -> Result<&[Trip], Error> {
        Ok(&self.trips)
    }
    fn stop_times(&self) -> Result<&[StopTime], Error> {
        Ok(&self.stop_times)
    }
    fn calendars(&self) -> Result<&[Calendar], Error> {
        Ok(&self.calendars)
    }
    fn calendar_dates(&self) -> Result<&[CalendarDate], Error> {
        Ok(&self.calendar_dates)
    }
    fn shapes(&self) -> Result<&[Shape], Error> {
        Ok(&self.shapes)
    }
}

impl FeedTables for LazyGtfsFeed {
    fn agencies(&self) -> Result<&[Agency], Error> {
        LazyGtfsFeed::agencies(self)
    }
    fn stops(&self) -> Result<&[Stop], Error> {
        LazyGtfsFeed::stops(self)
    }
    fn routes(&self) -> Result<&[Route], Error> {
        LazyGtfsFeed::routes(self)
    }
    fn trips(&self) -> Result<&[Trip], Error> {
        LazyGtfsFeed::trips(self)
    }
    fn stop_times(&self) -> Result<&[StopTime], Error> {
        LazyGtfsFeed::stop_times(self)
    }
    fn calendars(&self) -> Result<&[Calendar], Error> {
        LazyGtfsFeed::calendars(self)
    }
    fn calendar_dates(&self) -> Result<&[CalendarDate], Error> {
        LazyGtfsFeed::calendar_dates(self)
    }
    fn shapes(&self) -> Result<&[Shape], Error> {
        LazyGtfsFeed::shapes(self)
    }
}

type IdIndex = HashMap<String, usize>;
type GroupIndex = HashMap<String, Vec<usize>>;

/// Query layer over a feed: by-id lookups, relational joins and date
/// predicates with amortized O(1) access after the first touch.
///
/// Every index family sits behind its own single-initialization guard and is
/// built by the first call that needs it; concurrent readers block on the
/// guard and then share the built map. The filter borrows the feed and never
/// mutates it.
pub struct GtfsFilter<'a, S: FeedTables> {
    feed: &'a S,
    agencies_by_id: OnceCell<IdIndex>,
    stops_by_id: OnceCell<IdIndex>,
    routes_by_id: OnceCell<IdIndex>,
    trips_by_id: OnceCell<IdIndex>,
    calendars_by_id: OnceCell<IdIndex>,
    trips_by_route: OnceCell<GroupIndex>,
    trips_by_service: OnceCell<GroupIndex>,
    stop_times_by_trip: OnceCell<GroupIndex>,
    stop_times_by_stop: OnceCell<GroupIndex>,
    calendar_dates_by_service: OnceCell<GroupIndex>,
    shape_points_by_id: OnceCell<GroupIndex>,
}

impl<'a, S: FeedTables> GtfsFilter<'a, S> {
    /// Wraps a feed. No index is built until a query needs it.
    pub fn new(feed: &'a S) -> Self {
        Self {
            feed,
            agencies_by_id: OnceCell::new(),
            stops_by_id: OnceCell::new(),
            routes_by_id: OnceCell::new(),
            trips_by_id: OnceCell::new(),
            calendars_by_id: OnceCell::new(),
            trips_by_route: OnceCell::new(),
            trips_by_service: OnceCell::new(),
            stop_times_by_trip: OnceCell::new(),
            stop_times_by_stop: OnceCell::new(),
            calendar_dates_by_service: OnceCell::new(),
            shape_points_by_id: OnceCell::new(),
        }
    }

    /// Gets a [Stop] by its `stop_id`.
    pub fn stop(&self, id: &str) -> Result<Option<&'a Stop>, Error> {
        let stops = self.feed.stops()?;
        let index = self.stops_by_id.get_or_try_init(|| {
            Ok::<_, Error>(build_id_index(stops.iter().map(|s| s.id.as_str())))
        })?;
        Ok(index.get(id).map(|&i| &stops[i]))
    }

    /// Gets a [Route] by its `route_id`.
    pub fn route(&self, id: &str) -> Result<Option<&'a Route>, Error> {
        let routes = self.feed.routes()?;
        let index = self.routes_by_id.get_or_try_init(|| {
            Ok::<_, Error>(build_id_index(routes.iter().map(|r| r.id.as_str())))
        })?;
        Ok(index.get(id).map(|&i| &routes[i]))
    }

    /// Gets a [Trip] by its `trip_id`.
    pub fn trip(&self, id: &str) -> Result<Option<&'a Trip>, Error> {
        let trips = self.feed.trips()?;
        let index = self.trips_by_id.get_or_try_init(|| {
            Ok::<_, Error>(build_id_index(trips.iter().map(|t| t.id.as_str())))
        })?;
        Ok(index.get(id).map(|&i| &trips[i]))
    }

    /// Gets an [Agency] by its `agency_id`.
    pub fn agency(&self, id: &str) -> Result<Option<&'a Agency>, Error> {
        let agencies = self.feed.agencies()?;
        let index = self.agencies_by_id.get_or_try_init(|| {
            Ok::<_, Error>(build_id_index(
                agencies.iter().map(|a| a.id.as_deref().unwrap_or("")),
            ))
        })?;
        Ok(index.get(id).map(|&i| &agencies[i]))
    }

    /// Gets a [Calendar] by its `service_id`.
    pub fn calendar(&self, service_id: &str) -> Result<Option<&'a Calendar>, Error> {
        let calendars = self.feed.calendars()?;
        let index = self.calendars_by_id.get_or_try_init(|| {
            Ok::<_, Error>(build_id_index(calendars.iter().map(|c| c.service_id.as_str())))
        })?;
        Ok(index.get(service_id).map(|&i| &calendars[i]))
    }

    /// All trips running on a route, in feed order.
    pub fn trips_for_route(&self, route_id: &str) -> Result<Vec<&'a Trip>, Error> {
        let trips = self.feed.trips()?;
        let index = self.trips_by_route_index()?;
        Ok(collect(index, route_id, trips))
    }

    /// All stop times of a route, trip by trip, each trip in sequence order.
    pub fn stop_times_for_route(&self, route_id: &str) -> Result<Vec<&'a StopTime>, Error> {
        let mut result = Vec::new();
        for trip in self.trips_for_route(route_id)? {
            result.extend(self.stop_times_for_trip(&trip.id)?);
        }
        Ok(result)
    }

    /// Distinct stops served by a route, in first-seen order.
    pub fn stops_for_route(&self, route_id: &str) -> Result<Vec<&'a Stop>, Error> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for stop_time in self.stop_times_for_route(route_id)? {
            if seen.insert(stop_time.stop_id.as_str()) {
                if let Some(stop) = self.stop(&stop_time.stop_id)? {
                    result.push(stop);
                }
            }
        }
        Ok(result)
    }

    /// Stop times of one trip, sorted by `stop_sequence`.
    pub fn stop_times_for_trip(&self, trip_id: &str) -> Result<Vec<&'a StopTime>, Error> {
        let stop_times = self.feed.stop_times()?;
        let index = self.stop_times_by_trip_index()?;
        Ok(collect(index, trip_id, stop_times))
    }

    /// Stops of one trip, in travel order. Dangling stop references are skipped.
    pub fn stops_for_trip(&self, trip_id: &str) -> Result<Vec<&'a Stop>, Error> {
        let mut result = Vec::new();
        for stop_time in self.stop_times_for_trip(trip_id)? {
            if let Some(stop) = self.stop(&stop_time.stop_id)? {
                result.push(stop);
            }
        }
        Ok(result)
    }

    /// All stop times at one stop, in feed order.
    pub fn stop_times_at_stop(&self, stop_id: &str) -> Result<Vec<&'a StopTime>, Error> {
        let stop_times = self.feed.stop_times()?;
        let index = self.stop_times_by_stop_index()?;
        Ok(collect(index, stop_id, stop_times))
    }

    /// Distinct trips calling at one stop, in first-seen order.
    pub fn trips_serving_stop(&self, stop_id: &str) -> Result<Vec<&'a Trip>, Error> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for stop_time in self.stop_times_at_stop(stop_id)? {
            if seen.insert(stop_time.trip_id.as_str()) {
                if let Some(trip) = self.trip(&stop_time.trip_id)? {
                    result.push(trip);
                }
            }
        }
        Ok(result)
    }

    /// Distinct routes calling at one stop, in first-seen order.
    pub fn routes_serving_stop(&self, stop_id: &str) -> Result<Vec<&'a Route>, Error> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for trip in self.trips_serving_stop(stop_id)? {
            if seen.insert(trip.route_id.as_str()) {
                if let Some(route) = self.route(&trip.route_id)? {
                    result.push(route);
                }
            }
        }
        Ok(result)
    }

    /// All routes operated by one agency, in feed order.
    pub fn routes_for_agency(&self, agency_id: &str) -> Result<Vec<&'a Route>, Error> {
        Ok(self
            .feed
            .routes()?
            .iter()
            .filter(|r| r.agency_id.as_deref() == Some(agency_id))
            .collect())
    }

    /// All trips operated by one agency, in feed order.
    pub fn trips_for_agency(&self, agency_id: &str) -> Result<Vec<&'a Trip>, Error> {
        let route_ids: HashSet<&str> =
            self.routes_for_agency(agency_id)?.iter().map(|r| r.id.as_str()).collect();
        Ok(self
            .feed
            .trips()?
            .iter()
            .filter(|t| route_ids.contains(t.route_id.as_str()))
            .collect())
    }

    /// All trips bound to one service, in feed order.
    pub fn trips_for_service(&self, service_id: &str) -> Result<Vec<&'a Trip>, Error> {
        let trips = self.feed.trips()?;
        let index = self.trips_by_service.get_or_try_init(|| {
            Ok::<_, Error>(build_group_index(trips.iter().map(|t| t.service_id.as_str())))
        })?;
        Ok(collect(index, service_id, trips))
    }

    /// Services active on a date, after applying calendar-date exceptions.
    ///
    /// Services defined only through `calendar_dates.txt` are represented by a
    /// synthetic calendar with all-false weekdays and `start = end = date`.
    pub fn active_services_on<D: Into<DateInput>>(&self, date: D) -> Result<Vec<Calendar>, Error> {
        let date = date.into().resolve()?;
        let calendars = self.feed.calendars()?;

        let mut added: Vec<&str> = Vec::new();
        let mut removed: HashSet<&str> = HashSet::new();
        for exception in self.feed.calendar_dates()? {
            if exception.date == date {
                match exception.exception_type {
                    Exception::Added => added.push(exception.service_id.as_str()),
                    Exception::Removed => {
                        removed.insert(exception.service_id.as_str());
                    }
                }
            }
        }

        let mut result: Vec<Calendar> = Vec::new();
        let mut covered: HashSet<&str> = HashSet::new();
        for calendar in calendars {
            covered.insert(calendar.service_id.as_str());
            let base_active = calendar.start_date <= date
                && date <= calendar.end_date
                && calendar.valid_weekday(date);
            let net_active = (base_active || added.contains(&calendar.service_id.as_str()))
                && !removed.contains(calendar.service_id.as_str());
            if net_active {
                result.push(calendar.clone());
            }
        }
        for service_id in added {
            if !covered.contains(service_id) && !removed.contains(service_id) {
                result.push(synthetic_calendar(service_id, date));
            }
        }
        Ok(result)
    }

    /// Union of the trips of every service active on the date, in feed order.
    pub fn trips_on_date<D: Into<DateInput>>(&self, date: D) -> Result<Vec<&'a Trip>, Error> {
        let active: HashSet<String> = self
            .active_services_on(date)?
            .into_iter()
            .map(|c| c.service_id)
            .collect();
        Ok(self
            .feed
            .trips()?
            .iter()
            .filter(|t| active.contains(&t.service_id))
            .collect())
    }

    /// The shape points of a trip's shape, sorted by sequence. Empty when the
    /// trip has no shape.
    pub fn shape_for_trip(&self, trip_id: &str) -> Result<Vec<&'a Shape>, Error> {
        let shape_id = match self.trip(trip_id)? {
            Some(trip) => match &trip.shape_id {
                Some(id) => id.clone(),
                None => return Ok(Vec::new()),
            },
            None => return Ok(Vec::new()),
        };
        let shapes = self.feed.shapes()?;
        let index = self.shape_points_by_id.get_or_try_init(|| {
            let mut groups = build_group_index(shapes.iter().map(|s| s.id.as_str()));
            for points in groups.values_mut() {
                points.sort_by_key(|&i| shapes[i].sequence);
            }
            Ok::<_, Error>(groups)
        })?;
        Ok(collect(index, &shape_id, shapes))
    }

    /// Span from the first departure to the last arrival of the trip, in
    /// seconds. `None` when the trip has fewer than two timed stops.
    pub fn trip_duration_seconds(&self, trip_id: &str) -> Result<Option<u32>, Error> {
        let stop_times = self.stop_times_for_trip(trip_id)?;
        let first = stop_times.iter().find_map(|st| st.departure_time.or(st.arrival_time));
        let last = stop_times.iter().rev().find_map(|st| st.arrival_time.or(st.departure_time));
        Ok(match (first, last) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        })
    }

    /// Number of distinct stops served by a route.
    pub fn route_stop_count(&self, route_id: &str) -> Result<usize, Error> {
        Ok(self.stops_for_route(route_id)?.len())
    }

    /// Number of trips running on a route.
    pub fn route_trip_count(&self, route_id: &str) -> Result<usize, Error> {
        Ok(self.trips_for_route(route_id)?.len())
    }

    /// Number of distinct trips calling at a stop.
    pub fn stop_trip_count(&self, stop_id: &str) -> Result<usize, Error> {
        Ok(self.trips_serving_stop(stop_id)?.len())
    }

    /// All calendar exceptions of one service, in feed order.
    pub fn calendar_dates_for_service(
        &self,
        service_id: &str,
    ) -> Result<Vec<&'a CalendarDate>, Error> {
        let calendar_dates = self.feed.calendar_dates()?;
        let index = self.calendar_dates_by_service.get_or_try_init(|| {
            Ok::<_, Error>(build_group_index(
                calendar_dates.iter().map(|c| c.service_id.as_str()),
            ))
        })?;
        Ok(collect(index, service_id, calendar_dates))
    }

    fn trips_by_route_index(&self) -> Result<&GroupIndex, Error> {
        let trips = self.feed.trips()?;
        self.trips_by_route.get_or_try_init(|| {
            Ok(build_group_index(trips.iter().map(|t| t.route_id.as_str())))
        })
    }

    fn stop_times_by_trip_index(&self) -> Result<&GroupIndex, Error> {
        let stop_times = self.feed.stop_times()?;
        self.stop_times_by_trip.get_or_try_init(|| {
            let mut groups = build_group_index(stop_times.iter().map(|st| st.trip_id.as_str()));
            // Sorted once at build time so every later query reads in order.
            for indices in groups.values_mut() {
                indices.sort_by_key(|&i| stop_times[i].stop_sequence);
            }
            Ok(groups)
        })
    }

    fn stop_times_by_stop_index(&self) -> Result<&GroupIndex, Error> {
        let stop_times = self.feed.stop_times()?;
        self.stop_times_by_stop.get_or_try_init(|| {
            Ok(build_group_index(stop_times.iter().map(|st| st.stop_id.as_str())))
        })
    }
}

fn build_id_index<'i>(ids: impl Iterator<Item = &'i str>) -> IdIndex {
    let mut index = IdIndex::new();
    for (i, id) in ids.enumerate() {
        index.entry(id.to_owned()).or_insert(i);
    }
    index
}

fn build_group_index<'i>(keys: impl Iterator<Item = &'i str>) -> GroupIndex {
    let mut index = GroupIndex::new();
    for (i, key) in keys.enumerate() {
        index.entry(key.to_owned()).or_default().push(i);
    }
    index
}

fn collect<'a, T>(index: &GroupIndex, key: &str, items: &'a [T]) -> Vec<&'a T> {
    index
        .get(key)
        .map(|indices| indices.iter().map(|&i| &items[i]).collect())
        .unwrap_or_default()
}

fn synthetic_calendar(service_id: &str, date: NaiveDate) -> Calendar {
    Calendar {
        service_id: service_id.to_owned(),
        monday: false,
        tuesday: false,
        wednesday: false,
        thursday: false,
        friday: false,
        saturday: false,
        sunday: false,
        start_date: date,
        end_date: date,
        extras: Vec::new(),
    }
}
