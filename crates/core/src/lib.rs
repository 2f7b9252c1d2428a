pub mod reading;
pub mod topics;

pub use reading::{local_timestamp, status_text, Reading, ReadingError, TIMESTAMP_KEY};
pub use topics::STATUS_KEY;
