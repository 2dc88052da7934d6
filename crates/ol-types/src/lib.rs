pub mod dates;
pub mod records;

pub use dates::{ensure_not_future, parse_snapshot_date, DateError, SNAPSHOT_DATE_FORMAT};
pub use records::{Record, RecordSet, Value, EMPTY_BINARY_SENTINEL};
