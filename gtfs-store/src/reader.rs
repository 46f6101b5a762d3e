use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use log::{debug, warn};
use serde::de::DeserializeOwned;

use crate::error::ParseWarning;
use crate::objects::GtfsRecord;
use crate::{CancelToken, Error, GtfsFeed};

/// Tables that must be present in every feed.
pub(crate) const REQUIRED_FILES: &[&str] =
    &["agency.txt", "stops.txt", "routes.txt", "trips.txt", "stop_times.txt"];

/// At least one of these must be present.
pub(crate) const CALENDAR_FILES: &[&str] = &["calendar.txt", "calendar_dates.txt"];

/// Canonical table order, used for ZIP entry mapping and write ordering.
pub(crate) const TABLE_ORDER: &[&str] = &[
    "agency.txt",
    "stops.txt",
    "routes.txt",
    "trips.txt",
    "stop_times.txt",
    "calendar.txt",
    "calendar_dates.txt",
    "shapes.txt",
];

/// Allows to parameterize how the parsing library behaves
///
/// ```no_run
/// use gtfs_store::GtfsReader;
///
/// let feed = GtfsReader::new()
///     .strict(true)        // surface the first bad row instead of skipping it
///     .round_trip(true)    // keep unknown columns for byte-faithful re-export
///     .read_from_path("fixtures/gtfs.zip")?;
/// # Ok::<(), gtfs_store::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct GtfsReader {
    strict: bool,
    round_trip: bool,
    cancel: Option<CancelToken>,
}

impl GtfsReader {
    /// Creates a reader with the default behaviour: lenient, no unknown-column retention.
    pub fn new() -> Self {
        Self::default()
    }

    /// In strict mode the first row-level parse failure aborts the load.
    /// The default (lenient) skips bad rows and records a [ParseWarning] each.
    /// Returns Self and can be chained
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Keep unknown columns on each record so a later write reproduces them.
    /// Off by default: unknown columns are discarded.
    /// Returns Self and can be chained
    pub fn round_trip(mut self, round_trip: bool) -> Self {
        self.round_trip = round_trip;
        self
    }

    /// Attach a cancellation token, checked between tables.
    /// Returns Self and can be chained
    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), Error> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    /// Reads a feed from a local directory or a zipped archive, guessing from
    /// the path kind.
    pub fn read_from_path<P: AsRef<Path>>(&self, path: P) -> Result<GtfsFeed, Error> {
        let p = path.as_ref();
        if p.is_file() {
            let reader = File::open(p)?;
            self.read_from_reader(reader)
        } else if p.is_dir() {
            self.read_from_directory(p)
        } else {
            Err(Error::FeedNotFound { path: p.display().to_string() })
        }
    }

    /// Reads a feed from an unpacked GTFS directory.
    pub fn read_from_directory<P: AsRef<Path>>(&self, path: P) -> Result<GtfsFeed, Error> {
        let dir = path.as_ref();
        if !dir.is_dir() {
            return Err(Error::FeedNotFound { path: dir.display().to_string() });
        }
        check_required_files(dir.display().to_string(), |name| dir.join(name).is_file())?;

        let mut warnings = Vec::new();
        let mut feed = GtfsFeed::default();
        self.check_cancelled()?;
        feed.agencies = self.read_table_from_dir(dir, &mut warnings)?;
        self.check_cancelled()?;
        feed.stops = self.read_table_from_dir(dir, &mut warnings)?;
        self.check_cancelled()?;
        feed.routes = self.read_table_from_dir(dir, &mut warnings)?;
        self.check_cancelled()?;
        feed.trips = self.read_table_from_dir(dir, &mut warnings)?;
        self.check_cancelled()?;
        feed.stop_times = self.read_table_from_dir(dir, &mut warnings)?;
        self.check_cancelled()?;
        feed.calendars = self.read_optional_table_from_dir(dir, &mut warnings)?;
        self.check_cancelled()?;
        feed.calendar_dates = self.read_optional_table_from_dir(dir, &mut warnings)?;
        self.check_cancelled()?;
        feed.shapes = self.read_optional_table_from_dir(dir, &mut warnings)?;
        feed.warnings = warnings;
        debug!("loaded GTFS feed from directory {}", dir.display());
        Ok(feed)
    }

    /// Reads a feed from a zipped archive given as a path.
    pub fn read_from_zip_path<P: AsRef<Path>>(&self, path: P) -> Result<GtfsFeed, Error> {
        let file = File::open(path.as_ref()).map_err(|e| Error::NamedFileIo {
            file_name: path.as_ref().display().to_string(),
            source: Box::new(e),
        })?;
        self.read_from_reader(file)
    }

    /// Reads a feed from zipped archive bytes held in memory.
    pub fn read_from_zip_bytes(&self, bytes: &[u8]) -> Result<GtfsFeed, Error> {
        self.read_from_reader(Cursor::new(bytes))
    }

    /// Reads for any object implementing [Read] and [Seek] over a ZIP archive.
    pub fn read_from_reader<T: Read + Seek>(&self, reader: T) -> Result<GtfsFeed, Error> {
        let mut archive = zip::ZipArchive::new(BufReader::new(reader))?;
        let mapping = map_zip_entries(&mut archive)?;
        check_required_files("<zip>".to_string(), |name| mapping.contains_key(name))?;

        let mut warnings = Vec::new();
        let mut feed = GtfsFeed::default();
        self.check_cancelled()?;
        feed.agencies = self.read_table_from_zip(&mut archive, &mapping, &mut warnings)?;
        self.check_cancelled()?;
        feed.stops = self.read_table_from_zip(&mut archive, &mapping, &mut warnings)?;
        self.check_cancelled()?;
        feed.routes = self.read_table_from_zip(&mut archive, &mapping, &mut warnings)?;
        self.check_cancelled()?;
        feed.trips = self.read_table_from_zip(&mut archive, &mapping, &mut warnings)?;
        self.check_cancelled()?;
        feed.stop_times = self.read_table_from_zip(&mut archive, &mapping, &mut warnings)?;
        self.check_cancelled()?;
        feed.calendars = self.read_table_from_zip(&mut archive, &mapping, &mut warnings)?;
        self.check_cancelled()?;
        feed.calendar_dates = self.read_table_from_zip(&mut archive, &mapping, &mut warnings)?;
        self.check_cancelled()?;
        feed.shapes = self.read_table_from_zip(&mut archive, &mapping, &mut warnings)?;
        feed.warnings = warnings;
        Ok(feed)
    }

    fn read_table_from_dir<O>(
        &self,
        dir: &Path,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<Vec<O>, Error>
    where
        O: DeserializeOwned + GtfsRecord,
    {
        let path = dir.join(O::FILE_NAME);
        let file = File::open(path).map_err(|e| Error::NamedFileIo {
            file_name: O::FILE_NAME.to_owned(),
            source: Box::new(e),
        })?;
        self.read_objs(BufReader::new(file), O::FILE_NAME, warnings)
    }

    fn read_optional_table_from_dir<O>(
        &self,
        dir: &Path,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<Vec<O>, Error>
    where
        O: DeserializeOwned + GtfsRecord,
    {
        if dir.join(O::FILE_NAME).is_file() {
            self.read_table_from_dir(dir, warnings)
        } else {
            Ok(Vec::new())
        }
    }

    fn read_table_from_zip<O, T>(
        &self,
        archive: &mut zip::ZipArchive<T>,
        mapping: &HashMap<&'static str, usize>,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<Vec<O>, Error>
    where
        O: DeserializeOwned + GtfsRecord,
        T: Read + Seek,
    {
        match mapping.get(O::FILE_NAME) {
            Some(index) => {
                let entry = archive.by_index(*index).map_err(|e| Error::NamedFileIo {
                    file_name: O::FILE_NAME.to_owned(),
                    source: Box::new(e),
                })?;
                self.read_objs(entry, O::FILE_NAME, warnings)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Parses one CSV table, skipping unusable rows in lenient mode.
    pub(crate) fn read_objs<O, T>(
        &self,
        mut reader: T,
        file_name: &str,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<Vec<O>, Error>
    where
        O: DeserializeOwned + GtfsRecord,
        T: Read,
    {
        // A UTF-8 BOM before the first header is tolerated and stripped.
        let mut bom = [0u8; 3];
        let mut got = 0;
        while got < 3 {
            let n = reader.read(&mut bom[got..]).map_err(|e| Error::NamedFileIo {
                file_name: file_name.to_owned(),
                source: Box::new(e),
            })?;
            if n == 0 {
                break;
            }
            got += n;
        }
        let head: &[u8] = if got == 3 && bom == [0xef, 0xbb, 0xbf] { &[] } else { &bom[..got] };

        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Fields)
            .from_reader(head.chain(reader));

        // Header names are matched trimmed and lowercased; the verbatim
        // spelling is kept for unknown columns re-emitted in round-trip mode.
        let raw_headers = csv_reader
            .headers()
            .map_err(|e| Error::Csv { file_name: file_name.to_owned(), source: e })?
            .clone();
        let headers: csv::StringRecord =
            raw_headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let expected_columns = headers.len();
        let unknown_columns: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !O::KNOWN_COLUMNS.iter().any(|k| k == h))
            .map(|(i, _)| i)
            .collect();

        let mut rec = csv::StringRecord::new();
        let mut objs = Vec::new();

        while csv_reader
            .read_record(&mut rec)
            .map_err(|e| Error::Csv { file_name: file_name.to_owned(), source: e })?
        {
            let line = rec.position().map(|p| p.line()).unwrap_or(0);

            if rec.len() != expected_columns {
                let reason =
                    format!("expected {} columns, found {}", expected_columns, rec.len());
                if self.strict {
                    return Err(Error::FeedParse {
                        file: file_name.to_owned(),
                        line,
                        column: "<row>".to_owned(),
                        reason,
                    });
                }
                warn!("{}:{}: {}", file_name, line, reason);
                warnings.push(ParseWarning {
                    file: file_name.to_owned(),
                    line,
                    column: None,
                    reason,
                });
                continue;
            }

            let mut obj: O = match rec.deserialize(Some(&headers)) {
                Ok(obj) => obj,
                Err(e) => {
                    let column = deserialize_column(&e, &headers);
                    if self.strict {
                        return Err(Error::FeedParse {
                            file: file_name.to_owned(),
                            line,
                            column: column.unwrap_or_else(|| "<row>".to_owned()),
                            reason: e.to_string(),
                        });
                    }
                    warn!("{}:{}: skipped row: {}", file_name, line, e);
                    warnings.push(ParseWarning {
                        file: file_name.to_owned(),
                        line,
                        column,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if self.round_trip && !unknown_columns.is_empty() {
                let extras = obj.extras_mut();
                for &i in &unknown_columns {
                    if let (Some(header), Some(value)) = (raw_headers.get(i), rec.get(i)) {
                        extras.push((header.to_owned(), value.to_owned()));
                    }
                }
            }

            objs.push(obj);
        }
        Ok(objs)
    }
}

/// Fails with [Error::FeedFileMissing] listing every absent mandatory file.
pub(crate) fn check_required_files(
    path: String,
    exists: impl Fn(&str) -> bool,
) -> Result<(), Error> {
    let mut missing: Vec<String> =
        REQUIRED_FILES.iter().filter(|f| !exists(f)).map(|f| f.to_string()).collect();
    if !CALENDAR_FILES.iter().any(|f| exists(f)) {
        missing.extend(CALENDAR_FILES.iter().map(|f| f.to_string()));
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::FeedFileMissing { path, missing })
    }
}

/// Maps canonical table names to ZIP entry indices. Entries nested in a
/// subdirectory (a common packaging mistake) are matched by file name.
pub(crate) fn map_zip_entries<T: Read + Seek>(
    archive: &mut zip::ZipArchive<T>,
) -> Result<HashMap<&'static str, usize>, Error> {
    let mut mapping = HashMap::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name().to_owned();
        let path = Path::new(&name);
        for table in TABLE_ORDER {
            if path.file_name() == Some(std::ffi::OsStr::new(table))
                && !name.starts_with("__MACOSX")
            {
                mapping.entry(*table).or_insert(i);
                break;
            }
        }
    }
    Ok(mapping)
}

/// Counts the data rows of one CSV table without building row records.
pub(crate) fn count_rows<T: Read>(reader: T, file_name: &str) -> Result<usize, Error> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut rec = csv::ByteRecord::new();
    let mut count = 0;
    while csv_reader
        .read_byte_record(&mut rec)
        .map_err(|e| Error::Csv { file_name: file_name.to_owned(), source: e })?
    {
        count += 1;
    }
    Ok(count)
}

fn deserialize_column(err: &csv::Error, headers: &csv::StringRecord) -> Option<String> {
    match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => err
            .field()
            .and_then(|i| headers.get(i as usize))
            .map(|s| s.to_owned()),
        _ => None,
    }
}
