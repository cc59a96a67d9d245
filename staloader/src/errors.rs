use thiserror::Error;

use crate::ids::EntityId;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("service returned error: {0}")]
    Api(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no entity id in creation response for {0}")]
    MissingEntityId(String),

    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("group {key} holds {actual} observations, expected {expected}")]
    GroupShape {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot classify datastream '{name}' of party {party}")]
    DatastreamSet { party: EntityId, name: String },

    #[error("party {party} has no {slot} datastream")]
    MissingDatastream { party: EntityId, slot: &'static str },
}

impl LoaderError {
    /// Whether the error is contained to a single source record. Record-scoped
    /// errors are logged and the record abandoned; everything else ends the run.
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            LoaderError::GroupShape { .. }
                | LoaderError::DatastreamSet { .. }
                | LoaderError::MissingDatastream { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;
