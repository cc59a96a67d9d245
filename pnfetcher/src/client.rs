use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Result, SourceError};
use crate::models::RawObservation;

/// One key-ordered page of raw observations, enriched query-side with the
/// species match and the aggregated votes.
///
/// `after_key` is an exclusive lower bound on the record's natural key;
/// results are sorted ascending by that key and capped at `page_size`.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn page_after(&self, after_key: &str, page_size: usize) -> Result<Vec<RawObservation>>;
}

/// The page query. The sub-queries replicate the enrichment the loader needs:
/// the species entry matching the observation's current determination within
/// its project's checklist (plus the GBIF id), the aggregated determination
/// votes, and the per-image organ/quality vote summaries.
const PAGE_QUERY: &str = r#"
FOR o IN observations
    FILTER o._key > @after
    SORT o._key
    LIMIT @pageSize
    LET species = (
        FOR p IN projects
            FILTER p._key == o.project_id
            FOR t IN taxa
                FILTER t.name == o.computed.current_name
                FILTER t.species_list
                FOR sp IN t.species_list
                    FILTER sp.nameAccordingTo == p._pn_key
                    RETURN MERGE(sp, { gbifId: t.gbif.id })
    )[0]
    LET determinations_votes = (
        FILTER o.computed.votes
        FOR v IN o.computed.votes
            RETURN { name: v.name, plus: v.plus, score: v.score.total }
    )
    LET images_votes = (
        FILTER o.images
        FOR i IN o.images
            LET images_organs = (
                LET icov = (i.computed.organs_votes == NULL ? {} : i.computed.organs_votes)
                FOR org IN ATTRIBUTES(icov)
                    RETURN {
                        name: org,
                        plus: i.computed.organs_votes[org].plus,
                        score: i.computed.organs_votes[org].score.total
                    }
            )
            RETURN {
                id: i.id,
                quality: {
                    plus: i.computed.quality_votes.plus,
                    minus: i.computed.quality_votes.minus,
                    score: i.computed.quality_votes.score.total
                },
                organs: images_organs
            }
    )
    RETURN MERGE(o, { species, determinations_votes, images_votes })
"#;

#[derive(Debug, Deserialize)]
struct CursorResponse {
    #[serde(default)]
    error: bool,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
    #[serde(default)]
    result: Vec<RawObservation>,
    #[serde(rename = "hasMore", default)]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
}

/// Client for the document store's HTTP cursor endpoint.
pub struct ArangoClient {
    http: reqwest::Client,
    cursor_url: String,
    username: String,
    password: String,
}

impl ArangoClient {
    pub fn new(base_url: &str, database: &str, username: &str, password: &str) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            cursor_url: format!(
                "{}/_db/{database}/_api/cursor",
                base_url.trim_end_matches('/')
            ),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    async fn read_cursor_response(&self, response: reqwest::Response) -> Result<CursorResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(format!("HTTP {status}: {body}")));
        }
        let body: CursorResponse = response.json().await?;
        if body.error {
            return Err(SourceError::Api(
                body.error_message
                    .unwrap_or_else(|| "unspecified cursor error".to_string()),
            ));
        }
        Ok(body)
    }
}

#[async_trait]
impl ObservationSource for ArangoClient {
    async fn page_after(&self, after_key: &str, page_size: usize) -> Result<Vec<RawObservation>> {
        let response = self
            .http
            .post(&self.cursor_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({
                "query": PAGE_QUERY,
                "bindVars": { "after": after_key, "pageSize": page_size },
                "batchSize": page_size
            }))
            .send()
            .await?;
        let mut body = self.read_cursor_response(response).await?;
        let mut records = std::mem::take(&mut body.result);

        // The batch size matches the query LIMIT, so continuation batches
        // only appear if the server trims batches below the requested size.
        while body.has_more {
            let id = body.id.clone().ok_or_else(|| {
                SourceError::Cursor("continuation expected but no cursor id returned".to_string())
            })?;
            let response = self
                .http
                .put(format!("{}/{id}", self.cursor_url))
                .basic_auth(&self.username, Some(&self.password))
                .send()
                .await?;
            body = self.read_cursor_response(response).await?;
            records.append(&mut body.result);
        }

        debug!("fetched {} records after key {after_key}", records.len());
        Ok(records)
    }
}
