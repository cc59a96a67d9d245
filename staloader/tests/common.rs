//! In-memory stand-in for the entity-graph service, shared by the
//! integration suites.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use staloader::client::StaService;
use staloader::errors::Result;
use staloader::ids::EntityId;
use staloader::model::DatastreamRef;

#[derive(Default)]
struct Store {
    next_id: i64,
    /// collection name -> rows (payload with an injected `@iot.id`)
    rows: HashMap<String, Vec<Value>>,
    /// ids of a group's embedded observations, in insertion order
    group_observations: HashMap<String, Vec<EntityId>>,
    creations: HashMap<String, usize>,
    /// fault injection: silently drop this many embedded observations
    lose_observations: usize,
}

impl Store {
    fn assign_id(&mut self, collection: &str) -> EntityId {
        self.next_id += 1;
        // Parties get UUID-shaped ids so both encodings stay exercised.
        if collection == "Parties" {
            EntityId::Text(format!("00000000-0000-4000-8000-{:012}", self.next_id))
        } else {
            EntityId::Long(self.next_id)
        }
    }

    fn insert(&mut self, collection: &str, id: &EntityId, mut payload: Value) {
        payload["@iot.id"] = serde_json::to_value(id).unwrap();
        self.rows
            .entry(collection.to_string())
            .or_default()
            .push(payload);
        *self.creations.entry(collection.to_string()).or_default() += 1;
    }
}

#[derive(Default)]
pub struct MockSta {
    store: Mutex<Store>,
}

impl MockSta {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many creations this collection has seen.
    pub fn created(&self, collection: &str) -> usize {
        *self
            .store
            .lock()
            .unwrap()
            .creations
            .get(collection)
            .unwrap_or(&0)
    }

    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.store
            .lock()
            .unwrap()
            .rows
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn observation_ids(&self, group: &EntityId) -> Vec<EntityId> {
        self.store
            .lock()
            .unwrap()
            .group_observations
            .get(&group.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Makes subsequent group creations lose their trailing embedded
    /// observations, simulating a service that misbehaved mid-creation.
    pub fn lose_observations(&self, count: usize) {
        self.store.lock().unwrap().lose_observations = count;
    }

    /// Seeds an entity as if a previous run had created it.
    pub fn seed(&self, collection: &str, payload: Value) -> EntityId {
        let mut store = self.store.lock().unwrap();
        let id = store.assign_id(collection);
        store.insert(collection, &id, payload);
        id
    }
}

fn matches(row: &Value, property: &str, wanted: &str) -> bool {
    match row.get(property) {
        Some(Value::String(s)) => s == wanted,
        Some(Value::Number(n)) => n.to_string() == wanted,
        _ => false,
    }
}

#[async_trait]
impl StaService for MockSta {
    async fn find_id(
        &self,
        collection: &str,
        property: &str,
        value: &str,
    ) -> Result<Option<EntityId>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .rows
            .get(collection)
            .into_iter()
            .flatten()
            .find(|row| matches(row, property, value))
            .and_then(|row| row.get("@iot.id"))
            .and_then(EntityId::from_value))
    }

    async fn create(&self, collection: &str, mut payload: Value) -> Result<EntityId> {
        let mut store = self.store.lock().unwrap();
        let id = store.assign_id(collection);
        if collection == "Groups" {
            // Embedded observations become entities of their own, keeping
            // insertion order, as the real service does.
            let embedded = payload["Observations"].take();
            let mut embedded = embedded.as_array().cloned().unwrap_or_default();
            embedded.truncate(embedded.len().saturating_sub(store.lose_observations));
            let mut ids = Vec::new();
            for observation in embedded {
                let obs_id = store.assign_id("Observations");
                store.insert("Observations", &obs_id, observation);
                ids.push(obs_id);
            }
            store.group_observations.insert(id.to_string(), ids);
        }
        store.insert(collection, &id, payload);
        Ok(id)
    }

    async fn party_datastreams(&self, party: &EntityId) -> Result<Vec<DatastreamRef>> {
        let wanted = serde_json::to_value(party).unwrap();
        let store = self.store.lock().unwrap();
        Ok(store
            .rows
            .get("Datastreams")
            .into_iter()
            .flatten()
            .filter(|row| row["Party"]["@iot.id"] == wanted)
            .map(|row| serde_json::from_value(row.clone()).unwrap())
            .collect())
    }

    async fn group_observations(&self, group: &EntityId) -> Result<Vec<EntityId>> {
        Ok(self.observation_ids(group))
    }

    async fn set_group_relations(&self, group: &EntityId, relations: &[EntityId]) -> Result<()> {
        let wanted = serde_json::to_value(group).unwrap();
        let references: Vec<Value> = relations.iter().map(EntityId::as_ref_value).collect();
        let mut store = self.store.lock().unwrap();
        if let Some(row) = store
            .rows
            .get_mut("Groups")
            .into_iter()
            .flatten()
            .find(|row| row["@iot.id"] == wanted)
        {
            row["Relations"] = Value::Array(references);
        }
        Ok(())
    }

    async fn group_details(&self, group: &EntityId) -> Result<Value> {
        let wanted = serde_json::to_value(group).unwrap();
        let store = self.store.lock().unwrap();
        Ok(store
            .rows
            .get("Groups")
            .into_iter()
            .flatten()
            .find(|row| row["@iot.id"] == wanted)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn author_groups(&self, _auth_id: &str) -> Result<Value> {
        Ok(json!({ "value": [] }))
    }
}
