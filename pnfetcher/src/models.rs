//! Raw observation records as the source store returns them, including the
//! query-side enrichments (species join, aggregated votes).
//!
//! The source data is loosely structured: most fields may be absent, null,
//! or numerically typed where a string is expected. Deserialization is
//! deliberately lenient; admission filtering decides what to do with the
//! gaps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct RawObservation {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub partner: Option<Partner>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub project_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date_obs: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub computed: Option<Computed>,
    #[serde(default)]
    pub submitted: Value,
    #[serde(default)]
    pub geoloc: Value,
    #[serde(default)]
    pub client: Value,
    #[serde(default)]
    pub images: Vec<RawImage>,
    /// Species matched against the taxonomy collections, when any.
    #[serde(default)]
    pub species: Option<Species>,
    /// Aggregated determination votes, passed through as-is.
    #[serde(default)]
    pub determinations_votes: Value,
    /// Aggregated per-image organ/quality votes, passed through as-is.
    #[serde(default)]
    pub images_votes: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Partner {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Computed {
    #[serde(default)]
    pub censored: bool,
    #[serde(default)]
    pub malformed: bool,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub current_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawImage {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub computed: Option<ImageComputed>,
    #[serde(default)]
    pub submitted: Option<ImageSubmitted>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ImageComputed {
    #[serde(default)]
    pub noplant: bool,
    #[serde(default)]
    pub current_organ: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ImageSubmitted {
    #[serde(default)]
    pub organ: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Species {
    #[serde(default)]
    pub family: Option<NameBlock>,
    #[serde(default)]
    pub genus: Option<NameBlock>,
    #[serde(rename = "scientificNameWithoutAuthor", default)]
    pub scientific_name_without_author: Option<String>,
    #[serde(rename = "scientificNameAuthorship", default)]
    pub scientific_name_authorship: Option<String>,
    #[serde(rename = "taxonomicStatus", default)]
    pub taxonomic_status: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(rename = "gbifId", default, deserialize_with = "lenient_string")]
    pub gbif_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameBlock {
    #[serde(rename = "scientificName", default)]
    pub scientific_name: Option<String>,
}

/// Accepts strings and numbers, stringifying the latter; anything else is
/// treated as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts epoch milliseconds or an RFC 3339 string; anything else is absent.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    })
}
