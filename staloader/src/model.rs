use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::EntityId;

/// License key the target service pre-loads; the sentinel for source license
/// strings outside the known mapping table.
pub const UNKNOWN_LICENSE: &str = "unknown";

/// One source record, mapped and enriched, ready for graph construction.
/// Filled by the source-side mapper; consumed by [`crate::graph`].
#[derive(Debug, Clone)]
pub struct PreparedRecord {
    /// Natural key of the source record; becomes the group name and is the
    /// authoritative duplicate signal.
    pub key: String,
    pub author: AuthorRef,
    /// Target-side license key (one of the pre-loaded licenses, or
    /// [`UNKNOWN_LICENSE`]).
    pub license: String,
    pub project: String,
    pub observed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Point location, when both coordinates were present on the source.
    pub location: Option<GeoPoint>,
    /// The source's full geolocation bag (includes the locality name);
    /// carried verbatim into the feature's property bag.
    pub location_properties: Value,
    /// Surviving (non-deleted, plant-bearing) images, in source order. This
    /// order drives observation insertion and must not be reshuffled.
    pub images: Vec<PreparedImage>,
    pub determination: Determination,
    /// Aggregated vote summaries, passed through verbatim.
    pub votes: VoteSummary,
    pub submitted: Value,
    pub valid: bool,
    /// Free-form device description of the author's client.
    pub device: Value,
    pub source_url: String,
}

impl PreparedRecord {
    /// Observations a successfully built group must hold: an image and an
    /// organ observation per surviving image, plus the determination.
    pub fn expected_observations(&self) -> usize {
        2 * self.images.len() + 1
    }
}

#[derive(Debug, Clone)]
pub struct AuthorRef {
    /// Stable external author id, the party's natural key.
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Public mirror URL of the image, the observation's result value.
    pub media_url: String,
    /// Organ tag (current vote winner, falling back to the submitted tag).
    pub organ: String,
}

#[derive(Debug, Clone)]
pub struct Determination {
    pub name: String,
    /// Present only when the species lookup matched upstream; omitted
    /// parameters stay omitted, never defaulted.
    pub taxonomy: Option<Taxonomy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Taxonomy {
    pub family: String,
    pub genus: String,
    #[serde(rename = "scientificNameWithoutAuthor")]
    pub scientific_name_without_author: String,
    #[serde(rename = "scientificNameAuthorship")]
    pub scientific_name_authorship: String,
    #[serde(rename = "taxonomicStatus")]
    pub taxonomic_status: String,
    pub synonyms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gbif: Option<GbifRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GbifRef {
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct VoteSummary {
    pub determinations: Value,
    pub images: Value,
}

/// A datastream as listed under a party, prior to classification.
#[derive(Debug, Clone, Deserialize)]
pub struct DatastreamRef {
    #[serde(rename = "@iot.id")]
    pub id: EntityId,
    pub name: String,
}

/// The three per-party channels every author owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastreamKind {
    Pictures,
    Taxons,
    Organs,
}

impl DatastreamKind {
    /// Classifies a datastream by the naming convention used at creation.
    /// Returns `None` for names outside the convention; callers must treat
    /// that as a corrupt datastream set, not fall back.
    pub fn classify(name: &str) -> Option<Self> {
        if name.starts_with("Pictures") {
            Some(DatastreamKind::Pictures)
        } else if name.starts_with("Taxons") {
            Some(DatastreamKind::Taxons)
        } else if name.starts_with("Organs") {
            Some(DatastreamKind::Organs)
        } else {
            None
        }
    }

    pub fn slot(&self) -> &'static str {
        match self {
            DatastreamKind::Pictures => "pictures",
            DatastreamKind::Taxons => "taxons",
            DatastreamKind::Organs => "organs",
        }
    }
}
