//! Idempotent lookup-or-create of shared reference entities.

use log::debug;
use serde_json::Value;

use crate::client::StaService;
use crate::entities::{self, AuthorStreams, DatastreamLinks};
use crate::errors::{LoaderError, Result};
use crate::ids::EntityId;
use crate::model::{DatastreamKind, PreparedRecord};

/// Looks up `collection` by a natural-key property and creates the entity
/// only when absent. Converges on the same id across repeated calls with
/// identical arguments, issuing at most one creation.
pub async fn ensure(
    service: &dyn StaService,
    collection: &str,
    property: &str,
    value: &str,
    payload: Value,
) -> Result<EntityId> {
    if let Some(id) = service.find_id(collection, property, value).await? {
        debug!("{collection} already exists: {property}={value} / {id}");
        return Ok(id);
    }
    debug!("create {collection}: {property}={value}");
    service.create(collection, payload).await
}

/// Ids of the dataset-wide entities every datastream references: the project,
/// the three observed properties and the two generic sensors.
#[derive(Debug, Clone)]
pub struct CommonEntities {
    pub project: EntityId,
    pub picture_property: EntityId,
    pub taxon_property: EntityId,
    pub organ_property: EntityId,
    pub camera_sensor: EntityId,
    pub app_sensor: EntityId,
}

impl CommonEntities {
    /// Resolves (creating when absent) the shared reference entities. Run
    /// once at pipeline start.
    pub async fn bootstrap(service: &dyn StaService) -> Result<Self> {
        let project = ensure(
            service,
            "Projects",
            "name",
            entities::PROJECT_NAME,
            entities::project_payload(),
        )
        .await?;
        let picture_property = ensure(
            service,
            "ObservedProperties",
            "name",
            entities::PICTURE_PROPERTY_NAME,
            entities::picture_property_payload(),
        )
        .await?;
        let taxon_property = ensure(
            service,
            "ObservedProperties",
            "name",
            entities::TAXON_PROPERTY_NAME,
            entities::taxon_property_payload(),
        )
        .await?;
        let organ_property = ensure(
            service,
            "ObservedProperties",
            "name",
            entities::ORGAN_PROPERTY_NAME,
            entities::organ_property_payload(),
        )
        .await?;
        let camera_sensor = ensure(
            service,
            "Sensors",
            "name",
            entities::CAMERA_SENSOR_NAME,
            entities::camera_sensor_payload(),
        )
        .await?;
        let app_sensor = ensure(
            service,
            "Sensors",
            "name",
            entities::APP_SENSOR_NAME,
            entities::app_sensor_payload(),
        )
        .await?;
        Ok(Self {
            project,
            picture_property,
            taxon_property,
            organ_property,
            camera_sensor,
            app_sensor,
        })
    }
}

/// Resolves the record author's party and its three datastreams.
///
/// First record of a never-seen author: create the party, then its thing
/// (sequential, the thing references the party), then the three datastreams
/// concurrently. Any later record of the same author finds the party by its
/// external id and classifies the existing datastreams instead.
pub async fn resolve_author(
    service: &dyn StaService,
    common: &CommonEntities,
    record: &PreparedRecord,
) -> Result<AuthorStreams> {
    let author = &record.author;
    if let Some(party) = service.find_id("Parties", "authId", &author.id).await? {
        return classify_party_streams(service, &party).await;
    }

    let party = service
        .create("Parties", entities::party_payload(author))
        .await?;
    let thing = service
        .create(
            "Things",
            entities::thing_payload(&party, author, &record.device),
        )
        .await?;

    let license = EntityId::Text(record.license.clone());
    let base = DatastreamLinks {
        party: &party,
        thing: &thing,
        project: &common.project,
        sensor: &common.camera_sensor,
        observed_property: &common.picture_property,
        license: &license,
    };
    let pictures_links = base;
    let taxons_links = DatastreamLinks {
        sensor: &common.app_sensor,
        observed_property: &common.taxon_property,
        ..base
    };
    let organs_links = DatastreamLinks {
        sensor: &common.app_sensor,
        observed_property: &common.organ_property,
        ..base
    };

    let (pictures, taxons, organs) = tokio::try_join!(
        service.create(
            "Datastreams",
            entities::pictures_datastream_payload(&pictures_links, author),
        ),
        service.create(
            "Datastreams",
            entities::taxons_datastream_payload(&taxons_links, author),
        ),
        service.create(
            "Datastreams",
            entities::organs_datastream_payload(&organs_links, author),
        ),
    )?;

    Ok(AuthorStreams {
        pictures,
        taxons,
        organs,
    })
}

/// Sorts an existing party's datastreams into the three expected slots.
/// A name outside the convention, or a missing slot, means the author's
/// datastream set is corrupt; both are record-scoped errors, never guesses.
async fn classify_party_streams(
    service: &dyn StaService,
    party: &EntityId,
) -> Result<AuthorStreams> {
    let mut pictures = None;
    let mut taxons = None;
    let mut organs = None;
    for stream in service.party_datastreams(party).await? {
        let kind =
            DatastreamKind::classify(&stream.name).ok_or_else(|| LoaderError::DatastreamSet {
                party: party.clone(),
                name: stream.name.clone(),
            })?;
        match kind {
            DatastreamKind::Pictures => pictures = Some(stream.id),
            DatastreamKind::Taxons => taxons = Some(stream.id),
            DatastreamKind::Organs => organs = Some(stream.id),
        }
    }
    let missing = |slot: &'static str| LoaderError::MissingDatastream {
        party: party.clone(),
        slot,
    };
    Ok(AuthorStreams {
        pictures: pictures.ok_or_else(|| missing(DatastreamKind::Pictures.slot()))?,
        taxons: taxons.ok_or_else(|| missing(DatastreamKind::Taxons.slot()))?,
        organs: organs.ok_or_else(|| missing(DatastreamKind::Organs.slot()))?,
    })
}
