use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// Describes the kind of [crate::Route]. See <https://gtfs.org/reference/static/#routestxt> `route_type`
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RouteType {
    /// Tram, Streetcar, Light rail. Any light rail or street level system within a metropolitan area
    Tramway,
    /// Any underground rail system within a metropolitan area
    Subway,
    /// Used for intercity or long-distance travel
    Rail,
    /// Used for short- and long-distance bus routes
    #[default]
    Bus,
    /// Used for short- and long-distance boat service
    Ferry,
    /// Used for street-level rail cars where the cable runs beneath the vehicle
    CableCar,
    /// Aerial lift, suspended cable car
    Gondola,
    /// Any rail system designed for steep inclines
    Funicular,
    /// (extended) Used for intercity bus services
    Coach,
    /// (extended) Airplanes
    Air,
    /// (extended) Taxi, Cab
    Taxi,
    /// (extended) any other value
    Other(i32),
}

impl RouteType {
    /// The numeric wire value of this route type.
    pub fn value(self) -> i32 {
        match self {
            RouteType::Tramway => 0,
            RouteType::Subway => 1,
            RouteType::Rail => 2,
            RouteType::Bus => 3,
            RouteType::Ferry => 4,
            RouteType::CableCar => 5,
            RouteType::Gondola => 6,
            RouteType::Funicular => 7,
            RouteType::Coach => 200,
            RouteType::Air => 1100,
            RouteType::Taxi => 1500,
            RouteType::Other(i) => i,
        }
    }
}

impl From<i32> for RouteType {
    fn from(i: i32) -> RouteType {
        let hundreds = i / 100;
        match (i, hundreds) {
            (0, _) | (_, 9) => RouteType::Tramway,
            (1, _) | (_, 4) => RouteType::Subway,
            (2, _) | (_, 1) => RouteType::Rail,
            (3, _) | (_, 7) | (_, 8) => RouteType::Bus,
            (4, _) | (_, 10) | (_, 12) => RouteType::Ferry,
            (5, _) => RouteType::CableCar,
            (6, _) | (_, 13) => RouteType::Gondola,
            (7, _) | (_, 14) => RouteType::Funicular,
            (_, 2) => RouteType::Coach,
            (_, 11) => RouteType::Air,
            (_, 15) => RouteType::Taxi,
            _ => RouteType::Other(i),
        }
    }
}

impl<'de> Deserialize<'de> for RouteType {
    fn deserialize<D>(deserializer: D) -> Result<RouteType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let i = i32::deserialize(deserializer)?;
        Ok(RouteType::from(i))
    }
}

impl Serialize for RouteType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Note: for extended route types, we might loose the initial precise route type
        serializer.serialize_i32(self.value())
    }
}

/// Is the service added or removed on a [crate::CalendarDate]. See <https://gtfs.org/reference/static/#calendar_datestxt>
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Exception {
    /// Service is added for the date
    Added,
    /// Service is removed for the date
    Removed,
}

impl Exception {
    /// The numeric wire value (1 added, 2 removed).
    pub fn value(self) -> u8 {
        match self {
            Exception::Added => 1,
            Exception::Removed => 2,
        }
    }
}

impl<'de> Deserialize<'de> for Exception {
    fn deserialize<D>(deserializer: D) -> Result<Exception, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        match s.as_str() {
            "1" => Ok(Exception::Added),
            "2" => Ok(Exception::Removed),
            other => Err(serde::de::Error::custom(format!(
                "invalid exception_type '{}', expected 1 or 2",
                other
            ))),
        }
    }
}

impl Serialize for Exception {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.value())
    }
}

/// Indicates the direction of travel for a trip. See <https://gtfs.org/reference/static/#tripstxt> `direction_id`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DirectionType {
    /// Travel in one direction (e.g. outbound travel)
    Outbound,
    /// Travel in the opposite direction (e.g. inbound travel)
    Inbound,
}

impl<'de> Deserialize<'de> for DirectionType {
    fn deserialize<D>(deserializer: D) -> Result<DirectionType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        match s.as_str() {
            "0" => Ok(DirectionType::Outbound),
            "1" => Ok(DirectionType::Inbound),
            other => Err(serde::de::Error::custom(format!(
                "invalid direction_id '{}', expected 0 or 1",
                other
            ))),
        }
    }
}

impl Serialize for DirectionType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(match self {
            DirectionType::Outbound => 0,
            DirectionType::Inbound => 1,
        })
    }
}
