use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;

use crate::error::ParseWarning;
use crate::objects::GtfsRecord;
use crate::reader::{count_rows, map_zip_entries, TABLE_ORDER};
use crate::{
    writer, Agency, Calendar, CalendarDate, Error, GtfsFeed, GtfsReader, Route, Shape, Stop,
    StopTime, Trip,
};

#[derive(Debug)]
enum LazySource {
    Directory(PathBuf),
    /// The whole archive is held in memory; entries are re-opened per table.
    Zip(Vec<u8>),
}

#[derive(Debug, Default)]
struct TableCells {
    agencies: OnceCell<Vec<Agency>>,
    stops: OnceCell<Vec<Stop>>,
    routes: OnceCell<Vec<Route>>,
    trips: OnceCell<Vec<Trip>>,
    stop_times: OnceCell<Vec<StopTime>>,
    calendars: OnceCell<Vec<Calendar>>,
    calendar_dates: OnceCell<Vec<CalendarDate>>,
    shapes: OnceCell<Vec<Shape>>,
}

#[derive(Debug, Default)]
struct CountCells {
    agencies: OnceCell<usize>,
    stops: OnceCell<usize>,
    routes: OnceCell<usize>,
    trips: OnceCell<usize>,
    stop_times: OnceCell<usize>,
    calendars: OnceCell<usize>,
    calendar_dates: OnceCell<usize>,
    shapes: OnceCell<usize>,
}

/// A GTFS feed whose tables are parsed on first access.
///
/// The constructor only verifies that the mandatory files are present; no row
/// is parsed until a table is touched. Each table sits behind its own
/// single-initialization guard: the first caller parses, concurrent callers
/// block on the same guard, later callers read the cached vector. Counts use a
/// streaming row counter and never materialize records.
///
/// Writing a lazy feed re-emits the original bytes of every table that was
/// never materialized, so an untouched feed round-trips its source content.
#[derive(Debug)]
pub struct LazyGtfsFeed {
    source: LazySource,
    reader: GtfsReader,
    zip_mapping: HashMap<&'static str, usize>,
    tables: TableCells,
    counts: CountCells,
    warnings: Mutex<Vec<ParseWarning>>,
}

impl LazyGtfsFeed {
    /// Opens a lazy feed from a directory or a zipped archive, guessing from
    /// the path kind.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::with_reader(path, GtfsReader::new())
    }

    /// Opens a lazy feed with a configured [GtfsReader].
    pub fn with_reader<P: AsRef<Path>>(path: P, reader: GtfsReader) -> Result<Self, Error> {
        let p = path.as_ref();
        if p.is_dir() {
            Self::from_directory_with(p, reader)
        } else if p.is_file() {
            let bytes = std::fs::read(p)?;
            Self::from_zip_bytes_with(bytes, reader)
        } else {
            Err(Error::FeedNotFound { path: p.display().to_string() })
        }
    }

    /// Opens a lazy feed over an unpacked GTFS directory.
    pub fn from_directory<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_directory_with(path.as_ref(), GtfsReader::new())
    }

    /// Opens a lazy feed over in-memory ZIP bytes.
    pub fn from_zip_bytes(bytes: Vec<u8>) -> Result<Self, Error> {
        Self::from_zip_bytes_with(bytes, GtfsReader::new())
    }

    fn from_directory_with(dir: &Path, reader: GtfsReader) -> Result<Self, Error> {
        if !dir.is_dir() {
            return Err(Error::FeedNotFound { path: dir.display().to_string() });
        }
        crate::reader::check_required_files(dir.display().to_string(), |name| {
            dir.join(name).is_file()
        })?;
        Ok(Self {
            source: LazySource::Directory(dir.to_path_buf()),
            reader,
            zip_mapping: HashMap::new(),
            tables: TableCells::default(),
            counts: CountCells::default(),
            warnings: Mutex::new(Vec::new()),
        })
    }

    fn from_zip_bytes_with(bytes: Vec<u8>, reader: GtfsReader) -> Result<Self, Error> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))?;
        let zip_mapping = map_zip_entries(&mut archive)?;
        crate::reader::check_required_files("<zip>".to_string(), |name| {
            zip_mapping.contains_key(name)
        })?;
        Ok(Self {
            source: LazySource::Zip(bytes),
            reader,
            zip_mapping,
            tables: TableCells::default(),
            counts: CountCells::default(),
            warnings: Mutex::new(Vec::new()),
        })
    }

    /// All agencies, parsed on first access.
    pub fn agencies(&self) -> Result<&[Agency], Error> {
        self.table(&self.tables.agencies)
    }

    /// All stops, parsed on first access.
    pub fn stops(&self) -> Result<&[Stop], Error> {
        self.table(&self.tables.stops)
    }

    /// All routes, parsed on first access.
    pub fn routes(&self) -> Result<&[Route], Error> {
        self.table(&self.tables.routes)
    }

    /// All trips, parsed on first access.
    pub fn trips(&self) -> Result<&[Trip], Error> {
        self.table(&self.tables.trips)
    }

    /// All stop times, parsed on first access.
    pub fn stop_times(&self) -> Result<&[StopTime], Error> {
        self.table(&self.tables.stop_times)
    }

    /// All calendars, parsed on first access.
    pub fn calendars(&self) -> Result<&[Calendar], Error> {
        self.table(&self.tables.calendars)
    }

    /// All calendar exceptions, parsed on first access.
    pub fn calendar_dates(&self) -> Result<&[CalendarDate], Error> {
        self.table(&self.tables.calendar_dates)
    }

    /// All shape points, parsed on first access.
    pub fn shapes(&self) -> Result<&[Shape], Error> {
        self.table(&self.tables.shapes)
    }

    /// Number of agencies, without materializing the table.
    pub fn agency_count(&self) -> Result<usize, Error> {
        self.count(&self.tables.agencies, &self.counts.agencies, "agency.txt")
    }

    /// Number of stops, without materializing the table.
    pub fn stop_count(&self) -> Result<usize, Error> {
        self.count(&self.tables.stops, &self.counts.stops, "stops.txt")
    }

    /// Number of routes, without materializing the table.
    pub fn route_count(&self) -> Result<usize, Error> {
        self.count(&self.tables.routes, &self.counts.routes, "routes.txt")
    }

    /// Number of trips, without materializing the table.
    pub fn trip_count(&self) -> Result<usize, Error> {
        self.count(&self.tables.trips, &self.counts.trips, "trips.txt")
    }

    /// Number of stop times, without materializing the table.
    pub fn stop_time_count(&self) -> Result<usize, Error> {
        self.count(&self.tables.stop_times, &self.counts.stop_times, "stop_times.txt")
    }

    /// Number of calendars, without materializing the table.
    pub fn calendar_count(&self) -> Result<usize, Error> {
        self.count(&self.tables.calendars, &self.counts.calendars, "calendar.txt")
    }

    /// Number of calendar exceptions, without materializing the table.
    pub fn calendar_date_count(&self) -> Result<usize, Error> {
        self.count(&self.tables.calendar_dates, &self.counts.calendar_dates, "calendar_dates.txt")
    }

    /// Number of shape points, without materializing the table.
    pub fn shape_point_count(&self) -> Result<usize, Error> {
        self.count(&self.tables.shapes, &self.counts.shapes, "shapes.txt")
    }

    /// Row-level diagnostics collected by the tables materialized so far.
    pub fn warnings(&self) -> Vec<ParseWarning> {
        self.warnings.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Forces every table and converts into an eager [GtfsFeed].
    pub fn materialize(self) -> Result<GtfsFeed, Error> {
        self.agencies()?;
        self.stops()?;
        self.routes()?;
        self.trips()?;
        self.stop_times()?;
        self.calendars()?;
        self.calendar_dates()?;
        self.shapes()?;
        Ok(GtfsFeed {
            agencies: self.tables.agencies.into_inner().unwrap_or_default(),
            stops: self.tables.stops.into_inner().unwrap_or_default(),
            routes: self.tables.routes.into_inner().unwrap_or_default(),
            trips: self.tables.trips.into_inner().unwrap_or_default(),
            stop_times: self.tables.stop_times.into_inner().unwrap_or_default(),
            calendars: self.tables.calendars.into_inner().unwrap_or_default(),
            calendar_dates: self.tables.calendar_dates.into_inner().unwrap_or_default(),
            shapes: self.tables.shapes.into_inner().unwrap_or_default(),
            warnings: self.warnings.into_inner().unwrap_or_default(),
        })
    }

    /// Writes the feed as a deterministic ZIP archive in memory.
    ///
    /// Tables that were never materialized are copied byte-for-byte from the
    /// source instead of being re-serialized.
    pub fn write_to_zip_bytes(&self) -> Result<Vec<u8>, Error> {
        let files = self.table_files()?;
        writer::write_files_to_zip_bytes(&files)
    }

    /// Writes the feed as one file per table under `path`, copying original
    /// bytes for tables that were never materialized.
    pub fn write_to_directory<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let files = self.table_files()?;
        writer::write_files_to_directory(&files, path.as_ref())
    }

    fn table_files(&self) -> Result<Vec<(&'static str, Vec<u8>)>, Error> {
        let mut files = Vec::new();
        for name in TABLE_ORDER {
            let serialized = match *name {
                "agency.txt" => self.tables.agencies.get().map(|v| writer::agencies_to_csv(v)),
                "stops.txt" => self.tables.stops.get().map(|v| writer::stops_to_csv(v)),
                "routes.txt" => self.tables.routes.get().map(|v| writer::routes_to_csv(v)),
                "trips.txt" => self.tables.trips.get().map(|v| writer::trips_to_csv(v)),
                "stop_times.txt" => {
                    self.tables.stop_times.get().map(|v| writer::stop_times_to_csv(v))
                }
                "calendar.txt" => self
                    .tables
                    .calendars
                    .get()
                    .filter(|v| !v.is_empty())
                    .map(|v| writer::calendars_to_csv(v)),
                "calendar_dates.txt" => self
                    .tables
                    .calendar_dates
                    .get()
                    .filter(|v| !v.is_empty())
                    .map(|v| writer::calendar_dates_to_csv(v)),
                "shapes.txt" => self
                    .tables
                    .shapes
                    .get()
                    .filter(|v| !v.is_empty())
                    .map(|v| writer::shapes_to_csv(v)),
                _ => None,
            };
            match serialized {
                Some(bytes) => files.push((*name, bytes?)),
                None => {
                    if let Some(bytes) = self.raw_table_bytes(name)? {
                        files.push((*name, bytes));
                    }
                }
            }
        }
        Ok(files)
    }

    fn table<'a, O>(&self, cell: &'a OnceCell<Vec<O>>) -> Result<&'a [O], Error>
    where
        O: DeserializeOwned + GtfsRecord,
    {
        cell.get_or_try_init(|| self.load_table::<O>()).map(|v| v.as_slice())
    }

    fn load_table<O>(&self) -> Result<Vec<O>, Error>
    where
        O: DeserializeOwned + GtfsRecord,
    {
        self.reader.check_cancelled()?;
        let mut warnings = Vec::new();
        let objs = match &self.source {
            LazySource::Directory(dir) => {
                let path = dir.join(O::FILE_NAME);
                if !path.is_file() {
                    return Ok(Vec::new());
                }
                let file = File::open(&path).map_err(|e| Error::NamedFileIo {
                    file_name: O::FILE_NAME.to_owned(),
                    source: Box::new(e),
                })?;
                self.reader.read_objs(BufReader::new(file), O::FILE_NAME, &mut warnings)?
            }
            LazySource::Zip(bytes) => match self.zip_mapping.get(O::FILE_NAME) {
                None => return Ok(Vec::new()),
                Some(index) => {
                    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))?;
                    let entry = archive.by_index(*index).map_err(|e| Error::NamedFileIo {
                        file_name: O::FILE_NAME.to_owned(),
                        source: Box::new(e),
                    })?;
                    self.reader.read_objs(entry, O::FILE_NAME, &mut warnings)?
                }
            },
        };
        if let Ok(mut sink) = self.warnings.lock() {
            sink.extend(warnings);
        }
        Ok(objs)
    }

    fn count<O>(
        &self,
        table: &OnceCell<Vec<O>>,
        cell: &OnceCell<usize>,
        file_name: &'static str,
    ) -> Result<usize, Error> {
        if let Some(rows) = table.get() {
            return Ok(rows.len());
        }
        cell.get_or_try_init(|| self.count_table(file_name)).copied()
    }

    fn count_table(&self, file_name: &'static str) -> Result<usize, Error> {
        match &self.source {
            LazySource::Directory(dir) => {
                let path = dir.join(file_name);
                if !path.is_file() {
                    return Ok(0);
                }
                let file = File::open(&path).map_err(|e| Error::NamedFileIo {
                    file_name: file_name.to_owned(),
                    source: Box::new(e),
                })?;
                count_rows(BufReader::new(file), file_name)
            }
            LazySource::Zip(bytes) => match self.zip_mapping.get(file_name) {
                None => Ok(0),
                Some(index) => {
                    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))?;
                    let entry = archive.by_index(*index)?;
                    count_rows(entry, file_name)
                }
            },
        }
    }

    fn raw_table_bytes(&self, file_name: &'static str) -> Result<Option<Vec<u8>>, Error> {
        match &self.source {
            LazySource::Directory(dir) => {
                let path = dir.join(file_name);
                if !path.is_file() {
                    return Ok(None);
                }
                Ok(Some(std::fs::read(path)?))
            }
            LazySource::Zip(bytes) => match self.zip_mapping.get(file_name) {
                None => Ok(None),
                Some(index) => {
                    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))?;
                    let mut entry = archive.by_index(*index)?;
                    let mut out = Vec::with_capacity(entry.size() as usize);
                    entry.read_to_end(&mut out)?;
                    Ok(Some(out))
                }
            },
        }
    }
}
