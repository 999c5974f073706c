//! Small shared helpers: wall clock and date-partition keys.

use chrono::{NaiveDate, Utc};

/// Bytes per megabyte; `index_file_size` crosses the public API in MB
pub const ONE_MB: u64 = 1 << 20;

/// Current UTC day, the default partition key for inserts and queries
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Wall clock in unix milliseconds
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Wall clock in unix microseconds; seeds the vector id generator
pub fn unix_micros() -> i64 {
    Utc::now().timestamp_micros()
}
