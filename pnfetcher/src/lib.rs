pub mod client;
pub mod cursor;
pub mod error;
pub mod mapper;
pub mod models;

pub use crate::client::{ArangoClient, ObservationSource};
pub use crate::cursor::ObservationCursor;
pub use crate::error::{Result, SourceError};
pub use crate::mapper::{map_record, MapOutcome, SkipReason};
