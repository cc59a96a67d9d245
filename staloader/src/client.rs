use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use serde_json::Value;

use crate::errors::{LoaderError, Result};
use crate::ids::EntityId;
use crate::model::DatastreamRef;

/// Expansion used by the inspection commands: a group with everything an
/// operator needs to eyeball one migrated record.
const GROUP_FULL_EXPAND: &str = "Observations,Relations,Observations/FeatureOfInterest,Observations/Datastream,Observations/Datastream/Party,Observations/Datastream/License,Observations/Datastream/Project";

/// The operations the pipeline needs from the entity-graph service.
///
/// Implemented over HTTP by [`StaClient`]; test suites substitute in-memory
/// implementations.
#[async_trait]
pub trait StaService: Send + Sync {
    /// Looks up an entity by a natural-key property. Returns its id when a
    /// row with exactly that property value exists.
    async fn find_id(
        &self,
        collection: &str,
        property: &str,
        value: &str,
    ) -> Result<Option<EntityId>>;

    /// Creates an entity and returns the service-assigned id.
    async fn create(&self, collection: &str, payload: Value) -> Result<EntityId>;

    /// Lists a party's datastreams (id and name).
    async fn party_datastreams(&self, party: &EntityId) -> Result<Vec<DatastreamRef>>;

    /// Reads a group's observation ids in stored order.
    async fn group_observations(&self, group: &EntityId) -> Result<Vec<EntityId>>;

    /// Attaches relation references to an existing group.
    async fn set_group_relations(&self, group: &EntityId, relations: &[EntityId]) -> Result<()>;

    /// Fully expanded group, for inspection.
    async fn group_details(&self, group: &EntityId) -> Result<Value>;

    /// Fully expanded groups of one source author, for inspection.
    async fn author_groups(&self, auth_id: &str) -> Result<Value>;
}

/// HTTP client for a SensorThings-PLUS service, authenticating every call
/// with a fixed basic-auth credential pair.
pub struct StaClient {
    http: reqwest::Client,
    root: String,
}

impl StaClient {
    pub fn new(root_url: &str, username: &str, password: &str) -> Result<Self> {
        let token = BASE64.encode(format!("{username}:{password}"));
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {token}"))
                .map_err(|err| LoaderError::Config(format!("invalid credentials: {err}")))?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            root: root_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{collection}", self.root)
    }

    fn entity_url(&self, collection: &str, id: &EntityId) -> String {
        format!("{}/{}", self.root, id.path_segment(collection))
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(LoaderError::Api(format!("HTTP {status} for {url}: {body}")));
        }
        Ok(response.json().await?)
    }
}

fn property_matches(row: &Value, property: &str, wanted: &str) -> bool {
    match row.get(property) {
        Some(Value::String(s)) => s == wanted,
        Some(Value::Number(n)) => n.to_string() == wanted,
        _ => false,
    }
}

#[async_trait]
impl StaService for StaClient {
    async fn find_id(
        &self,
        collection: &str,
        property: &str,
        value: &str,
    ) -> Result<Option<EntityId>> {
        let response = self
            .http
            .get(self.collection_url(collection))
            .query(&[("$filter", format!("{property} eq '{value}'"))])
            .send()
            .await?;
        let body = self.read_json(response).await?;
        let rows = body
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                LoaderError::UnexpectedShape(format!("{collection} query returned no value array"))
            })?;
        Ok(rows
            .iter()
            .find(|row| property_matches(row, property, value))
            .and_then(|row| row.get("@iot.id"))
            .and_then(EntityId::from_value))
    }

    async fn create(&self, collection: &str, payload: Value) -> Result<EntityId> {
        let response = self
            .http
            .post(self.collection_url(collection))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoaderError::Api(format!(
                "HTTP {status} creating {collection}: {body}"
            )));
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| LoaderError::MissingEntityId(collection.to_string()))?;
        EntityId::from_location(location)
    }

    async fn party_datastreams(&self, party: &EntityId) -> Result<Vec<DatastreamRef>> {
        let response = self
            .http
            .get(self.entity_url("Parties", party))
            .query(&[("$expand", "Datastreams")])
            .send()
            .await?;
        let body = self.read_json(response).await?;
        let streams = body
            .get("Datastreams")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                LoaderError::UnexpectedShape(format!("party {party} has no Datastreams expansion"))
            })?;
        streams
            .iter()
            .map(|stream| Ok(serde_json::from_value(stream.clone())?))
            .collect()
    }

    async fn group_observations(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        // $top raised over the service default (100) for records with many images.
        let response = self
            .http
            .get(self.entity_url("Groups", group))
            .query(&[("$expand", "Observations"), ("$top", "1000")])
            .send()
            .await?;
        let body = self.read_json(response).await?;
        let observations = body
            .get("Observations")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                LoaderError::UnexpectedShape(format!("group {group} has no Observations expansion"))
            })?;
        observations
            .iter()
            .map(|row| {
                row.get("@iot.id")
                    .and_then(EntityId::from_value)
                    .ok_or_else(|| {
                        LoaderError::UnexpectedShape(format!(
                            "observation without @iot.id in group {group}"
                        ))
                    })
            })
            .collect()
    }

    async fn set_group_relations(&self, group: &EntityId, relations: &[EntityId]) -> Result<()> {
        let references: Vec<Value> = relations.iter().map(EntityId::as_ref_value).collect();
        let response = self
            .http
            .patch(self.entity_url("Groups", group))
            .json(&serde_json::json!({ "Relations": references }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoaderError::Api(format!(
                "HTTP {status} patching group {group}: {body}"
            )));
        }
        Ok(())
    }

    async fn group_details(&self, group: &EntityId) -> Result<Value> {
        let response = self
            .http
            .get(self.entity_url("Groups", group))
            .query(&[("$expand", GROUP_FULL_EXPAND)])
            .send()
            .await?;
        self.read_json(response).await
    }

    async fn author_groups(&self, auth_id: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.collection_url("Groups"))
            .query(&[
                ("$expand", GROUP_FULL_EXPAND.to_string()),
                (
                    "$filter",
                    format!("Observations/Datastream/Party/authId eq '{auth_id}'"),
                ),
            ])
            .send()
            .await?;
        self.read_json(response).await
    }
}
