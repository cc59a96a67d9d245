//! Pure mapping of raw source records into prepared records.
//!
//! No I/O happens here: admission filtering, license mapping, image
//! filtering and taxonomic enrichment are all decided from the record
//! alone. Skipped records are an expected outcome, not an error.

use std::fmt;

use log::{debug, error};
use serde_json::{json, Value};
use staloader::model::{
    AuthorRef, Determination, GbifRef, GeoPoint, PreparedImage, PreparedRecord, Taxonomy,
    VoteSummary, UNKNOWN_LICENSE,
};

use crate::models::RawObservation;

/// The partner whose records this pipeline owns; anything else is skipped.
const OWN_PARTNER: &str = "c4c";

const IDENTIFY_URL: &str = "https://identify.plantnet.org";

/// Why a record was excluded from migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Deleted,
    Censored,
    Malformed,
    Copyrighted,
    ForeignPartner(String),
    /// Data-quality defect on an otherwise admitted record.
    MissingAuthor,
}

impl SkipReason {
    /// Missing author ids are defects worth an error-level line; the other
    /// reasons are routine filtering.
    pub fn is_defect(&self) -> bool {
        matches!(self, SkipReason::MissingAuthor)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Deleted => write!(f, "deleted"),
            SkipReason::Censored => write!(f, "censored"),
            SkipReason::Malformed => write!(f, "malformed"),
            SkipReason::Copyrighted => write!(f, "copyrighted"),
            SkipReason::ForeignPartner(id) => write!(f, "partner {id}"),
            SkipReason::MissingAuthor => write!(f, "no author id"),
        }
    }
}

#[derive(Debug)]
pub enum MapOutcome {
    Ready(Box<PreparedRecord>),
    Skipped { key: String, reason: SkipReason },
}

/// Maps a source license string onto the target's pre-loaded license keys.
/// Strings outside the table map to the `unknown` sentinel; that is logged
/// but never refused.
pub fn map_license(raw: Option<&str>) -> &'static str {
    match raw {
        Some("cc-by") => "CC_BY",
        Some("cc-by-nc") => "CC_BY_NC",
        Some("cc-by-sa") => "CC_BY_SA",
        Some("cc-by-nc-sa") => "CC_BY_NC_SA",
        // there should be none of the ND variants in the source
        Some("cc-by-nd") => "CC_BY_ND",
        Some("cc-by-nc-nd") => "CC_BY_NC_ND",
        Some("gpl") => "CC_BY_SA",
        Some("public") => "CC_PD",
        other => {
            debug!("unknown license: {}", other.unwrap_or("<none>"));
            UNKNOWN_LICENSE
        }
    }
}

fn admission(raw: &RawObservation) -> Option<SkipReason> {
    if raw.deleted {
        return Some(SkipReason::Deleted);
    }
    let computed = raw.computed.clone().unwrap_or_default();
    if computed.censored {
        return Some(SkipReason::Censored);
    }
    if computed.malformed {
        return Some(SkipReason::Malformed);
    }
    if raw.license.as_deref() == Some("©") {
        return Some(SkipReason::Copyrighted);
    }
    if let Some(partner_id) = raw.partner.as_ref().and_then(|partner| partner.id.clone()) {
        if partner_id != OWN_PARTNER {
            return Some(SkipReason::ForeignPartner(partner_id));
        }
    }
    None
}

fn skip(raw: &RawObservation, reason: SkipReason) -> MapOutcome {
    if reason.is_defect() {
        error!("obs {} skipped: {reason}", raw.key);
    } else {
        debug!("skip {reason} obs: {}", raw.key);
    }
    MapOutcome::Skipped {
        key: raw.key.clone(),
        reason,
    }
}

fn taxonomy_of(raw: &RawObservation) -> Option<Taxonomy> {
    let species = raw.species.as_ref()?;
    Some(Taxonomy {
        family: species
            .family
            .as_ref()
            .and_then(|block| block.scientific_name.clone())
            .unwrap_or_default(),
        genus: species
            .genus
            .as_ref()
            .and_then(|block| block.scientific_name.clone())
            .unwrap_or_default(),
        scientific_name_without_author: species
            .scientific_name_without_author
            .clone()
            .unwrap_or_default(),
        scientific_name_authorship: species.scientific_name_authorship.clone().unwrap_or_default(),
        taxonomic_status: species.taxonomic_status.clone().unwrap_or_default(),
        synonyms: species.synonyms.clone(),
        gbif: species
            .gbif_id
            .clone()
            .map(|id| GbifRef { id }),
    })
}

/// Maps one raw record. `media_root` is the public mirror the image ids are
/// appended to.
pub fn map_record(raw: &RawObservation, media_root: &str) -> MapOutcome {
    if let Some(reason) = admission(raw) {
        return skip(raw, reason);
    }

    let author = match raw.author.as_ref().and_then(|author| author.id.clone()) {
        Some(id) if !id.is_empty() => AuthorRef {
            id,
            name: raw
                .author
                .as_ref()
                .and_then(|author| author.name.clone())
                .unwrap_or_default(),
        },
        _ => return skip(raw, SkipReason::MissingAuthor),
    };

    // A record without an observation date cannot be represented; treat it
    // like the other malformed source data.
    let observed_at = match raw.date_obs {
        Some(at) => at,
        None => return skip(raw, SkipReason::Malformed),
    };

    let mut images = Vec::with_capacity(raw.images.len());
    for image in &raw.images {
        let image_id = image.id.clone().unwrap_or_default();
        if image.deleted {
            debug!("skip deleted image: {}/{image_id}", raw.key);
            continue;
        }
        let computed = image.computed.clone().unwrap_or_default();
        if computed.noplant {
            debug!("skip noplant image: {}/{image_id}", raw.key);
            continue;
        }
        let organ = computed
            .current_organ
            .or_else(|| image.submitted.as_ref().and_then(|s| s.organ.clone()))
            .unwrap_or_default();
        images.push(PreparedImage {
            media_url: format!("{media_root}{image_id}"),
            organ,
        });
    }

    let computed = raw.computed.clone().unwrap_or_default();
    let determination_name = computed
        .current_name
        .clone()
        .or_else(|| {
            raw.submitted
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();

    let location = match (
        raw.geoloc.get("lat").and_then(Value::as_f64),
        raw.geoloc.get("lon").and_then(Value::as_f64),
    ) {
        (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
        _ => None,
    };
    let location_properties = if raw.geoloc.is_object() {
        raw.geoloc.clone()
    } else {
        json!({})
    };

    let project = raw.project_id.clone().unwrap_or_default();

    MapOutcome::Ready(Box::new(PreparedRecord {
        source_url: format!("{IDENTIFY_URL}/{project}/observations/{}", raw.key),
        key: raw.key.clone(),
        author,
        license: map_license(raw.license.as_deref()).to_string(),
        project,
        observed_at,
        created_at: raw.date_created.unwrap_or(observed_at),
        updated_at: raw.date_updated.unwrap_or(observed_at),
        location,
        location_properties,
        images,
        determination: Determination {
            name: determination_name,
            taxonomy: taxonomy_of(raw),
        },
        votes: VoteSummary {
            determinations: raw.determinations_votes.clone(),
            images: raw.images_votes.clone(),
        },
        submitted: raw.submitted.clone(),
        valid: computed.valid,
        device: raw.client.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MEDIA_ROOT: &str = "https://bs.plantnet.org/image/o/";

    fn raw(value: Value) -> RawObservation {
        serde_json::from_value(value).unwrap()
    }

    fn base_record() -> Value {
        json!({
            "_key": "1000000010",
            "license": "cc-by-sa",
            "project_id": "the-plant-list",
            "author": { "id": 42, "name": "tester" },
            "date_obs": 1622548800000i64,
            "computed": { "current_name": "Acer campestre L.", "valid": true },
            "submitted": { "name": "Acer sp." },
            "geoloc": { "lat": 45.0, "lon": 5.0, "locality": "Grenoble" },
            "images": [
                { "id": "img-1", "computed": { "current_organ": "leaf" } },
                { "id": "img-2", "submitted": { "organ": "flower" } }
            ]
        })
    }

    fn ready(outcome: MapOutcome) -> PreparedRecord {
        match outcome {
            MapOutcome::Ready(record) => *record,
            MapOutcome::Skipped { key, reason } => panic!("{key} skipped: {reason}"),
        }
    }

    #[test]
    fn maps_admitted_record() {
        let record = ready(map_record(&raw(base_record()), MEDIA_ROOT));
        assert_eq!(record.key, "1000000010");
        assert_eq!(record.author.id, "42");
        assert_eq!(record.license, "CC_BY_SA");
        assert_eq!(record.determination.name, "Acer campestre L.");
        assert_eq!(record.images.len(), 2);
        assert_eq!(
            record.images[0].media_url,
            "https://bs.plantnet.org/image/o/img-1"
        );
        assert_eq!(record.images[0].organ, "leaf");
        assert_eq!(record.images[1].organ, "flower");
        assert_eq!(record.location, Some(GeoPoint { lat: 45.0, lon: 5.0 }));
        assert_eq!(record.expected_observations(), 5);
        assert_eq!(
            record.source_url,
            "https://identify.plantnet.org/the-plant-list/observations/1000000010"
        );
    }

    #[test]
    fn license_table_is_fixed_and_unknowns_fall_through() {
        assert_eq!(map_license(Some("cc-by-nc-sa")), "CC_BY_NC_SA");
        assert_eq!(map_license(Some("cc-by")), "CC_BY");
        assert_eq!(map_license(Some("gpl")), "CC_BY_SA");
        assert_eq!(map_license(Some("public")), "CC_PD");
        assert_eq!(map_license(Some("wtfpl")), UNKNOWN_LICENSE);
        assert_eq!(map_license(None), UNKNOWN_LICENSE);
    }

    #[test]
    fn admission_filter_skips_each_marker() {
        let cases = [
            (json!({ "_key": "1", "deleted": true }), SkipReason::Deleted),
            (
                json!({ "_key": "2", "computed": { "censored": true } }),
                SkipReason::Censored,
            ),
            (
                json!({ "_key": "3", "computed": { "malformed": true } }),
                SkipReason::Malformed,
            ),
            (
                json!({ "_key": "4", "license": "©" }),
                SkipReason::Copyrighted,
            ),
            (
                json!({ "_key": "5", "partner": { "id": "inat" } }),
                SkipReason::ForeignPartner("inat".to_string()),
            ),
        ];
        for (value, expected) in cases {
            match map_record(&raw(value), MEDIA_ROOT) {
                MapOutcome::Skipped { reason, .. } => assert_eq!(reason, expected),
                MapOutcome::Ready(record) => panic!("{} admitted", record.key),
            }
        }
    }

    #[test]
    fn own_partner_records_are_admitted() {
        let mut value = base_record();
        value["partner"] = json!({ "id": "c4c" });
        ready(map_record(&raw(value), MEDIA_ROOT));
    }

    #[test]
    fn missing_author_id_is_a_defect_skip() {
        let mut value = base_record();
        value["author"] = json!({ "name": "anonymous" });
        match map_record(&raw(value), MEDIA_ROOT) {
            MapOutcome::Skipped { reason, .. } => {
                assert_eq!(reason, SkipReason::MissingAuthor);
                assert!(reason.is_defect());
            }
            MapOutcome::Ready(_) => panic!("admitted without author"),
        }
    }

    #[test]
    fn deleted_and_noplant_images_are_dropped() {
        let mut value = base_record();
        value["images"] = json!([
            { "id": "keep", "computed": { "current_organ": "bark" } },
            { "id": "gone", "deleted": true },
            { "id": "weed", "computed": { "noplant": true } }
        ]);
        let record = ready(map_record(&raw(value), MEDIA_ROOT));
        assert_eq!(record.images.len(), 1);
        assert_eq!(record.expected_observations(), 3);
    }

    #[test]
    fn taxonomy_only_present_on_species_match() {
        let without = ready(map_record(&raw(base_record()), MEDIA_ROOT));
        assert!(without.determination.taxonomy.is_none());

        let mut value = base_record();
        value["species"] = json!({
            "family": { "scientificName": "Sapindaceae" },
            "genus": { "scientificName": "Acer" },
            "scientificNameWithoutAuthor": "Acer campestre",
            "scientificNameAuthorship": "L.",
            "taxonomicStatus": "accepted",
            "synonyms": ["Acer austriacum Tratt."],
            "gbifId": 3189866
        });
        let with = ready(map_record(&raw(value), MEDIA_ROOT));
        let taxonomy = with.determination.taxonomy.unwrap();
        assert_eq!(taxonomy.family, "Sapindaceae");
        assert_eq!(taxonomy.genus, "Acer");
        assert_eq!(taxonomy.gbif.unwrap().id, "3189866");
    }

    #[test]
    fn determination_falls_back_to_submitted_name() {
        let mut value = base_record();
        value["computed"] = json!({});
        let record = ready(map_record(&raw(value), MEDIA_ROOT));
        assert_eq!(record.determination.name, "Acer sp.");
        assert!(!record.valid);
    }

    #[test]
    fn record_without_observation_date_is_malformed() {
        let mut value = base_record();
        value.as_object_mut().unwrap().remove("date_obs");
        match map_record(&raw(value), MEDIA_ROOT) {
            MapOutcome::Skipped { reason, .. } => assert_eq!(reason, SkipReason::Malformed),
            MapOutcome::Ready(_) => panic!("admitted without a date"),
        }
    }

    #[test]
    fn missing_geolocation_yields_no_point() {
        let mut value = base_record();
        value["geoloc"] = json!({ "locality": "somewhere" });
        let record = ready(map_record(&raw(value), MEDIA_ROOT));
        assert!(record.location.is_none());
        assert_eq!(record.location_properties["locality"], "somewhere");
    }
}
