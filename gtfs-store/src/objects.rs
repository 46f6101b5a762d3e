pub use crate::enums::*;
use crate::serde_helpers::*;
use chrono::{Datelike, NaiveDate, Weekday};
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use std::fmt;

/// Objects that have an identifier implement this trait
///
/// Those identifiers are technical and should not be shown to travellers
pub trait Id {
    /// Identifier of the object
    fn id(&self) -> &str;
}

/// Unknown columns captured in round-trip mode, in header order.
///
/// Empty unless the feed was loaded with [crate::GtfsReader::round_trip].
pub type Extras = Vec<(String, String)>;

/// General information about the agency running the network. See <https://gtfs.org/reference/static/#agencytxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Agency {
    /// Unique technical (not for the traveller) identifier for the Agency
    #[serde(rename = "agency_id", default)]
    pub id: Option<String>,
    /// Full name of the transit agency
    #[serde(rename = "agency_name")]
    pub name: String,
    /// URL of the transit agency's website
    #[serde(rename = "agency_url")]
    pub url: String,
    /// IANA timezone where the transit agency is located
    #[serde(rename = "agency_timezone")]
    pub timezone: String,
    /// Primary language used by this transit agency
    #[serde(rename = "agency_lang", default)]
    pub lang: Option<String>,
    /// A voice telephone number for the specified agency
    #[serde(rename = "agency_phone", default)]
    pub phone: Option<String>,
    /// URL of a web page where a rider can purchase fare instruments
    #[serde(rename = "agency_fare_url", default)]
    pub fare_url: Option<String>,
    /// Email address actively monitored by the agency's customer service department
    #[serde(rename = "agency_email", default)]
    pub email: Option<String>,
    /// Unknown columns, kept only in round-trip mode
    #[serde(skip)]
    pub extras: Extras,
}

impl Id for Agency {
    fn id(&self) -> &str {
        match &self.id {
            None => "",
            Some(id) => id,
        }
    }
}

impl fmt::Display for Agency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A physical stop or station. See <https://gtfs.org/reference/static/#stopstxt>
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Stop {
    /// Unique technical identifier (not for the traveller) of the stop
    #[serde(rename = "stop_id")]
    pub id: String,
    /// Short text or a number that identifies the location for riders
    #[serde(rename = "stop_code", default)]
    pub code: Option<String>,
    /// Name of the location
    #[serde(rename = "stop_name", default)]
    pub name: String,
    /// Description of the location
    #[serde(rename = "stop_desc", default)]
    pub description: Option<String>,
    /// Latitude of the stop
    #[serde(
        deserialize_with = "de_with_optional_float",
        serialize_with = "serialize_float_as_str",
        rename = "stop_lat",
        default
    )]
    pub latitude: Option<f64>,
    /// Longitude of the stop
    #[serde(
        deserialize_with = "de_with_optional_float",
        serialize_with = "serialize_float_as_str",
        rename = "stop_lon",
        default
    )]
    pub longitude: Option<f64>,
    /// Identifies the fare zone for a stop
    #[serde(default)]
    pub zone_id: Option<String>,
    /// URL of a web page about the location
    #[serde(rename = "stop_url", default)]
    pub url: Option<String>,
    /// Defines hierarchy between the different locations
    #[serde(default)]
    pub parent_station: Option<String>,
    /// Timezone of the location
    #[serde(rename = "stop_timezone", default)]
    pub timezone: Option<String>,
    /// Platform identifier for a platform stop (a stop belonging to a station)
    #[serde(default)]
    pub platform_code: Option<String>,
    /// Unknown columns, kept only in round-trip mode
    #[serde(skip)]
    pub extras: Extras,
}

impl Id for Stop {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A route is a commercial line. See <https://gtfs.org/reference/static/#routestxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Route {
    /// Unique technical (not for the traveller) identifier for the route
    #[serde(rename = "route_id")]
    pub id: String,
    /// Short name of a route, e.g. "32" or "Green"
    #[serde(rename = "route_short_name", default)]
    pub short_name: Option<String>,
    /// Full name of a route, generally more descriptive than the short name
    #[serde(rename = "route_long_name", default)]
    pub long_name: Option<String>,
    /// Description of a route
    #[serde(rename = "route_desc", default)]
    pub desc: Option<String>,
    /// Indicates the type of transportation used on a route
    pub route_type: RouteType,
    /// URL of a web page about the particular route
    #[serde(rename = "route_url", default)]
    pub url: Option<String>,
    /// Agency for the specified route
    #[serde(default)]
    pub agency_id: Option<String>,
    /// Orders the routes for presentation; smaller values are displayed first
    #[serde(rename = "route_sort_order", default)]
    pub order: Option<u32>,
    /// Route color designation that matches public facing material
    #[serde(
        deserialize_with = "deserialize_route_color",
        serialize_with = "serialize_color",
        rename = "route_color",
        default = "default_route_color"
    )]
    pub color: RGB8,
    /// Legible color to use for text drawn against a background of [Route::color]
    #[serde(
        deserialize_with = "deserialize_route_text_color",
        serialize_with = "serialize_color",
        rename = "route_text_color",
        default
    )]
    pub text_color: RGB8,
    /// Unknown columns, kept only in round-trip mode
    #[serde(skip)]
    pub extras: Extras,
}

impl Id for Route {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.long_name, &self.short_name) {
            (Some(long), _) if !long.is_empty() => write!(f, "{}", long),
            (_, Some(short)) => write!(f, "{}", short),
            _ => write!(f, "{}", self.id),
        }
    }
}

/// A Trip is a vehicle that follows a sequence of [StopTime] on certain days. See <https://gtfs.org/reference/static/#tripstxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Trip {
    /// Unique technical (not for the traveller) identifier for the Trip
    #[serde(rename = "trip_id")]
    pub id: String,
    /// References along which [Route] this trip runs
    pub route_id: String,
    /// References the [Calendar] on which this trip runs
    pub service_id: String,
    /// Text that appears on signage identifying the trip's destination to riders
    #[serde(rename = "trip_headsign", default)]
    pub headsign: Option<String>,
    /// Public facing text used to identify the trip to riders
    #[serde(rename = "trip_short_name", default)]
    pub short_name: Option<String>,
    /// Indicates the direction of travel for a trip
    #[serde(default)]
    pub direction_id: Option<DirectionType>,
    /// Identifies the vehicle block to which the trip belongs
    #[serde(default)]
    pub block_id: Option<String>,
    /// Shape of the trip
    #[serde(default)]
    pub shape_id: Option<String>,
    /// Unknown columns, kept only in round-trip mode
    #[serde(skip)]
    pub extras: Extras,
}

impl Id for Trip {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Trip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "route id: {}, service id: {}", self.route_id, self.service_id)
    }
}

/// The moment where a vehicle, running on a [Trip], stops at a [Stop]. See <https://gtfs.org/reference/static/#stop_timestxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct StopTime {
    /// [Trip] to which this stop time belongs to
    pub trip_id: String,
    /// Arrival time, in seconds since midnight of the service day.
    /// May exceed 24:00:00 to denote the next day.
    #[serde(
        deserialize_with = "deserialize_optional_time",
        serialize_with = "serialize_optional_time",
        default
    )]
    pub arrival_time: Option<u32>,
    /// Departure time, in seconds since midnight of the service day
    #[serde(
        deserialize_with = "deserialize_optional_time",
        serialize_with = "serialize_optional_time",
        default
    )]
    pub departure_time: Option<u32>,
    /// Identifier of the [Stop] where the vehicle stops
    pub stop_id: String,
    /// Order of stops for a particular trip. Must increase along the trip but need not be consecutive
    pub stop_sequence: u32,
    /// Text that appears on signage identifying the trip's destination to riders
    #[serde(rename = "stop_headsign", default)]
    pub headsign: Option<String>,
    /// Actual distance traveled along the associated shape up to this stop
    #[serde(deserialize_with = "de_with_optional_f32", default)]
    pub shape_dist_traveled: Option<f32>,
    /// Unknown columns, kept only in round-trip mode
    #[serde(skip)]
    pub extras: Extras,
}

/// A calendar describes on which days the vehicle runs. See <https://gtfs.org/reference/static/#calendartxt>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Calendar {
    /// Unique technical identifier (not for the traveller) of this calendar
    pub service_id: String,
    /// Does the service run on mondays
    #[serde(deserialize_with = "deserialize_bool", serialize_with = "serialize_bool")]
    pub monday: bool,
    /// Does the service run on tuesdays
    #[serde(deserialize_with = "deserialize_bool", serialize_with = "serialize_bool")]
    pub tuesday: bool,
    /// Does the service run on wednesdays
    #[serde(deserialize_with = "deserialize_bool", serialize_with = "serialize_bool")]
    pub wednesday: bool,
    /// Does the service run on thursdays
    #[serde(deserialize_with = "deserialize_bool", serialize_with = "serialize_bool")]
    pub thursday: bool,
    /// Does the service run on fridays
    #[serde(deserialize_with = "deserialize_bool", serialize_with = "serialize_bool")]
    pub friday: bool,
    /// Does the service run on saturdays
    #[serde(deserialize_with = "deserialize_bool", serialize_with = "serialize_bool")]
    pub saturday: bool,
    /// Does the service run on sundays
    #[serde(deserialize_with = "deserialize_bool", serialize_with = "serialize_bool")]
    pub sunday: bool,
    /// First service day of the service interval
    #[serde(deserialize_with = "deserialize_date", serialize_with = "serialize_date")]
    pub start_date: NaiveDate,
    /// Last service day of the service interval, included
    #[serde(deserialize_with = "deserialize_date", serialize_with = "serialize_date")]
    pub end_date: NaiveDate,
    /// Unknown columns, kept only in round-trip mode
    #[serde(skip)]
    pub extras: Extras,
}

impl Id for Calendar {
    fn id(&self) -> &str {
        &self.service_id
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} - {}", self.service_id, self.start_date, self.end_date)
    }
}

impl Calendar {
    /// Returns true if there is a service running on the weekday of that date
    pub fn valid_weekday(&self, date: NaiveDate) -> bool {
        match date.weekday() {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

/// Defines a specific date that is added to or removed from a [Calendar]. See <https://gtfs.org/reference/static/#calendar_datestxt>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CalendarDate {
    /// Identifier of the service that is modified at this date
    pub service_id: String,
    /// Date where the service is added or removed
    #[serde(deserialize_with = "deserialize_date", serialize_with = "serialize_date")]
    pub date: NaiveDate,
    /// Is the service added or removed
    pub exception_type: Exception,
    /// Unknown columns, kept only in round-trip mode
    #[serde(skip)]
    pub extras: Extras,
}

/// A single geographical point describing the shape of a [Trip]. See <https://gtfs.org/reference/static/#shapestxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Shape {
    /// Unique technical (not for the traveller) identifier for the Shape
    #[serde(rename = "shape_id")]
    pub id: String,
    /// Latitude of a shape point
    #[serde(rename = "shape_pt_lat", default)]
    pub latitude: f64,
    /// Longitude of a shape point
    #[serde(rename = "shape_pt_lon", default)]
    pub longitude: f64,
    /// Sequence in which the shape points connect to form the shape
    #[serde(rename = "shape_pt_sequence")]
    pub sequence: u32,
    /// Actual distance traveled along the shape from the first shape point
    #[serde(rename = "shape_dist_traveled", deserialize_with = "de_with_optional_f32", default)]
    pub dist_traveled: Option<f32>,
    /// Unknown columns, kept only in round-trip mode
    #[serde(skip)]
    pub extras: Extras,
}

impl Id for Shape {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Table metadata used by the codec: file name, known column set, extras slot.
pub(crate) trait GtfsRecord {
    const FILE_NAME: &'static str;
    const KNOWN_COLUMNS: &'static [&'static str];
    fn extras_mut(&mut self) -> &mut Extras;
}

macro_rules! gtfs_record {
    ($ty:ty, $file:literal, [$($col:literal),+ $(,)?]) => {
        impl GtfsRecord for $ty {
            const FILE_NAME: &'static str = $file;
            const KNOWN_COLUMNS: &'static [&'static str] = &[$($col),+];
            fn extras_mut(&mut self) -> &mut Extras {
                &mut self.extras
            }
        }
    };
}

gtfs_record!(
    Agency,
    "agency.txt",
    [
        "agency_id",
        "agency_name",
        "agency_url",
        "agency_timezone",
        "agency_lang",
        "agency_phone",
        "agency_fare_url",
        "agency_email",
    ]
);

gtfs_record!(
    Stop,
    "stops.txt",
    [
        "stop_id",
        "stop_code",
        "stop_name",
        "stop_desc",
        "stop_lat",
        "stop_lon",
        "zone_id",
        "stop_url",
        "parent_station",
        "stop_timezone",
        "platform_code",
    ]
);

gtfs_record!(
    Route,
    "routes.txt",
    [
        "route_id",
        "route_short_name",
        "route_long_name",
        "route_desc",
        "route_type",
        "route_url",
        "agency_id",
        "route_sort_order",
        "route_color",
        "route_text_color",
    ]
);

gtfs_record!(
    Trip,
    "trips.txt",
    [
        "trip_id",
        "route_id",
        "service_id",
        "trip_headsign",
        "trip_short_name",
        "direction_id",
        "block_id",
        "shape_id",
    ]
);

gtfs_record!(
    StopTime,
    "stop_times.txt",
    [
        "trip_id",
        "arrival_time",
        "departure_time",
        "stop_id",
        "stop_sequence",
        "stop_headsign",
        "shape_dist_traveled",
    ]
);

gtfs_record!(
    Calendar,
    "calendar.txt",
    [
        "service_id",
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
        "start_date",
        "end_date",
    ]
);

gtfs_record!(CalendarDate, "calendar_dates.txt", ["service_id", "date", "exception_type"]);

gtfs_record!(
    Shape,
    "shapes.txt",
    [
        "shape_id",
        "shape_pt_lat",
        "shape_pt_lon",
        "shape_pt_sequence",
        "shape_dist_traveled",
    ]
);
