/*! Storage, codec and query layer for [GTFS](https://gtfs.org/) static feeds.

A GTFS feed is a collection of CSV files (often bundled as a zip file). Each
file holds a collection of one record type (stops, routes, trips, …) related
through unique identifiers. This crate reads a feed into plain Rust structs,
writes it back deterministically, and answers relational queries over it.

## Design decisions

### Eager and lazy representations

[GtfsFeed] parses everything up front and owns the eight tables as ordered
vectors, staying as close as possible to the CSV representation.
[LazyGtfsFeed] holds the raw source and parses each table behind its own
once-initialization guard on first access; row counts are answered by a
streaming counter that never materializes records.

### Lenient by default

Rows that cannot be parsed are skipped and recorded as [ParseWarning]s; the
[GtfsReader] builder switches to strict mode where the first bad row aborts
with the file, line and column. Unknown columns are discarded unless
round-trip retention is requested.

### Queries borrow, never copy

[GtfsFilter] wraps a feed (eager or lazy) and builds hash indexes on demand,
one guard per index family, so by-id lookups and joins are amortized O(1)
after first touch and the feed itself is never mutated.
*/
#![warn(missing_docs)]

mod cancel;
mod enums;
pub mod error;
mod feed;
mod filter;
mod lazy;
mod objects;
pub(crate) mod reader;
mod serde_helpers;
mod writer;

#[cfg(test)]
mod tests;

pub use cancel::CancelToken;
pub use enums::*;
pub use error::{Error, ParseWarning};
pub use feed::{GtfsFeed, StopTimeColumns};
pub use filter::{DateInput, FeedTables, GtfsFilter};
pub use lazy::LazyGtfsFeed;
pub use objects::*;
pub use reader::GtfsReader;
pub use serde_helpers::{format_time, parse_time};
