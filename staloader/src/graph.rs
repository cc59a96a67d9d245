//! Per-record construction of the dependent entity graph.

use futures::future::try_join_all;
use log::debug;

use crate::client::StaService;
use crate::entities::{self, AuthorStreams};
use crate::errors::{LoaderError, Result};
use crate::ids::EntityId;
use crate::model::PreparedRecord;

/// What one successfully migrated record produced.
#[derive(Debug, Clone)]
pub struct GraphOutcome {
    pub group: EntityId,
    pub observations: usize,
    pub relations: usize,
}

/// Builds the full graph for one record: feature of interest, group with its
/// embedded observations, then the relation edges, and finally the group
/// patch attaching them.
///
/// Relation derivation relies on stored observation order: the creation call
/// does not return child ids, so the group is re-fetched and its expanded
/// array is walked positionally: (image, organ) pairs in insertion order,
/// determination last. The target API offers no correlation tags that could
/// replace this ordering contract.
pub async fn build_graph(
    service: &dyn StaService,
    record: &PreparedRecord,
    streams: &AuthorStreams,
) -> Result<GraphOutcome> {
    let feature = service
        .create("FeaturesOfInterest", entities::feature_payload(record))
        .await?;

    let group = service
        .create(
            "Groups",
            entities::group_payload(record, &feature, streams),
        )
        .await?;

    let observations = service.group_observations(&group).await?;
    let expected = record.expected_observations();
    if observations.len() != expected {
        return Err(LoaderError::GroupShape {
            key: record.key.clone(),
            expected,
            actual: observations.len(),
        });
    }

    let determination = &observations[observations.len() - 1];
    let mut payloads = Vec::with_capacity(2 * record.images.len());
    for pair in observations[..observations.len() - 1].chunks(2) {
        let picture = &pair[0];
        let organ = &pair[1];
        payloads.push(entities::identification_relation(determination, picture));
        payloads.push(entities::organ_relation(organ, picture));
    }

    let relations = try_join_all(
        payloads
            .into_iter()
            .map(|payload| service.create("Relations", payload)),
    )
    .await?;
    service.set_group_relations(&group, &relations).await?;

    debug!(
        "built group {group} for record {}: {expected} observations, {} relations",
        record.key,
        relations.len()
    );

    Ok(GraphOutcome {
        group,
        observations: expected,
        relations: relations.len(),
    })
}
