//! Creation payloads for the target service's collections.
//!
//! Field sets follow the STAplus data model: linked entities are referenced
//! with `{"@iot.id": …}` objects, timestamps are RFC 3339.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::ids::EntityId;
use crate::model::{AuthorRef, PreparedRecord};

pub const PROJECT_NAME: &str = "Pl@ntNet DaaS STAPLUS";
pub const PICTURE_PROPERTY_NAME: &str = "Picture";
pub const TAXON_PROPERTY_NAME: &str = "Taxon";
pub const ORGAN_PROPERTY_NAME: &str = "Organ";
pub const CAMERA_SENSOR_NAME: &str = "Generic camera";
pub const APP_SENSOR_NAME: &str = "Pl@ntNet AI";

pub const IDENTIFICATION_ROLE: &str = "dwc:Identification";
pub const ORGAN_OF_ROLE: &str = "organOf";

/// The per-author datastream ids, resolved either by creation or by lookup.
#[derive(Debug, Clone)]
pub struct AuthorStreams {
    pub pictures: EntityId,
    pub taxons: EntityId,
    pub organs: EntityId,
}

pub fn project_payload() -> Value {
    json!({
        "name": PROJECT_NAME,
        "description": "Sharing Pl@ntNet botanical observations in STAPLUS format",
        "url": "https://identify.plantnet.org",
        "termsOfUse": "This is a read-only copy of Pl@ntNet plant observations data, for internal usage by Cos4Cloud members only",
        "privacyPolicy": "This project stores the user's globally unique identifier that cannot be used to retrieve personal information",
        "creationTime": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "classification": "public"
    })
}

pub fn picture_property_payload() -> Value {
    json!({
        "name": PICTURE_PROPERTY_NAME,
        "definition": "https://www.merriam-webster.com/dictionary/picture",
        "description": "The plant image taken by the camera"
    })
}

pub fn taxon_property_payload() -> Value {
    json!({
        "name": TAXON_PROPERTY_NAME,
        "definition": "https://www.merriam-webster.com/dictionary/taxon",
        "description": "The species determination proposal given by the Pl@ntNet app/website for the observed plant"
    })
}

pub fn organ_property_payload() -> Value {
    json!({
        "name": ORGAN_PROPERTY_NAME,
        "definition": "https://www.merriam-webster.com/dictionary/organ",
        "description": "The organ submitted through the Pl@ntNet app/website for the observed plant"
    })
}

pub fn camera_sensor_payload() -> Value {
    json!({
        "name": CAMERA_SENSOR_NAME,
        "description": "Generic camera of any telephone/computer",
        "encodingType": "image/jpeg",
        "metadata": ""
    })
}

pub fn app_sensor_payload() -> Value {
    json!({
        "name": APP_SENSOR_NAME,
        "description": "Pl@ntNet AI called from generic app/website running on any telephone/computer",
        "encodingType": "application/json",
        "metadata": ""
    })
}

pub fn party_payload(author: &AuthorRef) -> Value {
    json!({
        "name": author.name,
        "description": format!("Pl@ntNet user: {} (PN id: {})", author.name, author.id),
        "role": "individual",
        "authId": author.id,
        "displayName": author.name
    })
}

pub fn thing_payload(party: &EntityId, author: &AuthorRef, device: &Value) -> Value {
    json!({
        "name": format!("Generic device of Party@iot.id:{party}"),
        "description": format!("Telephone/computer of user: {} (PN id:{})", author.name, author.id),
        "properties": device
    })
}

/// Linked-entity ids shared by the three datastream payloads of one author.
#[derive(Debug, Clone, Copy)]
pub struct DatastreamLinks<'a> {
    pub party: &'a EntityId,
    pub thing: &'a EntityId,
    pub project: &'a EntityId,
    pub sensor: &'a EntityId,
    pub observed_property: &'a EntityId,
    pub license: &'a EntityId,
}

fn datastream_payload(
    links: &DatastreamLinks<'_>,
    name: String,
    description: String,
    observation_type: &str,
    unit: Value,
) -> Value {
    json!({
        "unitOfMeasurement": unit,
        "name": name,
        "description": description,
        "observationType": observation_type,
        "ObservedProperty": links.observed_property.as_ref_value(),
        "License": links.license.as_ref_value(),
        "Sensor": links.sensor.as_ref_value(),
        "Party": links.party.as_ref_value(),
        "Thing": links.thing.as_ref_value(),
        "Project": links.project.as_ref_value()
    })
}

pub fn pictures_datastream_payload(links: &DatastreamLinks<'_>, author: &AuthorRef) -> Value {
    datastream_payload(
        links,
        format!("Pictures datastream of Party@iot.id:{}", links.party),
        format!(
            "Datastream of pictures produced by user: {} (PN id:{})",
            author.name, author.id
        ),
        "Picture",
        json!({
            "name": "n/a",
            "symbol": "",
            "definition": "https://www.merriam-webster.com/dictionary/picture"
        }),
    )
}

pub fn taxons_datastream_payload(links: &DatastreamLinks<'_>, author: &AuthorRef) -> Value {
    datastream_payload(
        links,
        format!("Taxons datastream of Party@iot.id:{}", links.party),
        format!(
            "Datastream of species determinations produced by user: {} (PN id:{})",
            author.name, author.id
        ),
        "Plant species",
        json!({
            "name": "Pl@ntNet species",
            "symbol": "",
            "definition": "https://identify.plantnet.org/the-plant-list/species"
        }),
    )
}

pub fn organs_datastream_payload(links: &DatastreamLinks<'_>, author: &AuthorRef) -> Value {
    datastream_payload(
        links,
        format!("Organs datastream of Party@iot.id:{}", links.party),
        format!(
            "Datastream of organ tags produced by user: {} (PN id:{})",
            author.name, author.id
        ),
        "Plant organ",
        json!({
            "name": "Pl@ntNet organ",
            "symbol": "",
            "definition": "bark, flower, fruit, habit, leaf…"
        }),
    )
}

/// The feature of interest: the located physical plant. With coordinates the
/// feature is a GeoJSON point, coordinates ordered longitude first; without
/// them the encoding degrades to a bare property bag, since GeoJSON rejects
/// empty coordinate arrays.
pub fn feature_payload(record: &PreparedRecord) -> Value {
    let locality = record
        .location_properties
        .get("locality")
        .and_then(Value::as_str)
        .unwrap_or("");
    let feature = match record.location {
        Some(point) => json!({
            "type": "Point",
            "coordinates": [point.lon, point.lat]
        }),
        None => json!({}),
    };
    json!({
        "name": locality,
        "description": format!("Location of plant observed (PN observation id:{})", record.key),
        "encodingType": if record.location.is_some() { "application/geo+json" } else { "application/json" },
        "feature": feature,
        "properties": record.location_properties
    })
}

/// The group payload with its embedded observations.
///
/// Observation order is a load-bearing contract: the service assigns ids in
/// insertion order and the relation pairing after creation walks the expanded
/// array positionally (image, organ, image, organ, …, determination last).
pub fn group_payload(
    record: &PreparedRecord,
    feature: &EntityId,
    streams: &AuthorStreams,
) -> Value {
    let at = record
        .observed_at
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut observations = Vec::with_capacity(record.expected_observations());
    for image in &record.images {
        observations.push(json!({
            "phenomenonTime": at,
            "resultTime": at,
            "result": image.media_url,
            "FeatureOfInterest": feature.as_ref_value(),
            "Datastream": streams.pictures.as_ref_value()
        }));
        observations.push(json!({
            "phenomenonTime": at,
            "resultTime": at,
            "result": image.organ,
            "FeatureOfInterest": feature.as_ref_value(),
            "Datastream": streams.organs.as_ref_value()
        }));
    }
    let mut determination = json!({
        "phenomenonTime": at,
        "resultTime": at,
        "result": record.determination.name,
        "FeatureOfInterest": feature.as_ref_value(),
        "Datastream": streams.taxons.as_ref_value()
    });
    if let Some(taxonomy) = &record.determination.taxonomy {
        determination["parameters"] = serde_json::to_value(taxonomy).unwrap_or(Value::Null);
    }
    observations.push(determination);

    json!({
        "name": record.key,
        "description": format!(
            "Pl@ntNet Observation: picture(s), organ(s) and current determination (PN id:{})",
            record.key
        ),
        "creationTime": at,
        "Observations": observations,
        "properties": {
            "url": record.source_url,
            "project_id": record.project,
            "date_updated": record.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "date_observed": at,
            "date_created": record.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "submitted": record.submitted,
            "valid": record.valid,
            "votes": {
                "determinations": record.votes.determinations,
                "images": record.votes.images
            }
        }
    })
}

pub fn identification_relation(determination: &EntityId, picture: &EntityId) -> Value {
    json!({
        "role": IDENTIFICATION_ROLE,
        "Subject": determination.as_ref_value(),
        "Object": picture.as_ref_value()
    })
}

pub fn organ_relation(organ: &EntityId, picture: &EntityId) -> Value {
    json!({
        "role": ORGAN_OF_ROLE,
        "Subject": organ.as_ref_value(),
        "Object": picture.as_ref_value()
    })
}
