//! Firestore REST (v1) implementation of the remote label collection.
//!
//! Batches go through `documents:commit`, which applies every write or none.
//! Each document is created with `currentDocument.exists = false` and gets
//! its `created_at` from a `REQUEST_TIME` server transform.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{NewRemoteLabel, RemoteLabelRecord, RemoteStore};
use crate::{db::Category, error::RemoteError};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FirestoreConfig {
    pub project_id: String,
    pub api_key: Option<String>,
    /// Bearer token for authenticated projects; unused when rules allow the API key alone.
    pub auth_token: Option<String>,
    pub database: String,
    pub collection: String,
    /// Overridable for the local emulator.
    pub base_url: String,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_key: None,
            auth_token: None,
            database: "(default)".into(),
            collection: "labels_master".into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }
}

impl FirestoreConfig {
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }

    fn document_name(&self, document_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.documents_root(),
            self.collection,
            document_id
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

pub struct FirestoreRemote {
    client: reqwest::Client,
    config: FirestoreConfig,
}

impl FirestoreRemote {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        if config.project_id.is_empty() {
            bail!("firestore remote requires a project_id");
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = match &self.config.api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        };
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        error!("Firestore request failed ({status}): {message}");
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteStore for FirestoreRemote {
    async fn commit_batch(&self, labels: &[NewRemoteLabel]) -> Result<Vec<String>, RemoteError> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = labels.iter().map(|_| new_document_id()).collect();
        let body = commit_body(&self.config, &ids, labels);
        let url = self
            .config
            .url(&format!("{}:commit", self.config.documents_root()));

        debug!("Committing {} label documents to Firestore", labels.len());
        self.send(self.client.post(&url).json(&body)).await?;
        Ok(ids)
    }

    async fn find_label(
        &self,
        user_id: &str,
        picture_id: &str,
    ) -> Result<Option<RemoteLabelRecord>, RemoteError> {
        let body = query_body(&self.config, user_id, picture_id);
        let url = self
            .config
            .url(&format!("{}:runQuery", self.config.documents_root()));

        let response = self.send(self.client.post(&url).json(&body)).await?;
        let items: Vec<RunQueryItem> = response
            .json()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))?;

        items
            .into_iter()
            .find_map(|item| item.document)
            .map(|document| document.into_record())
            .transpose()
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), RemoteError> {
        let url = self.config.url(&self.config.document_name(document_id));
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_connect() {
        RemoteError::Offline
    } else {
        RemoteError::Transport(err.to_string())
    }
}

/// Firestore-style 20 character id.
fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()[..20].to_string()
}

fn commit_body(config: &FirestoreConfig, ids: &[String], labels: &[NewRemoteLabel]) -> Value {
    let writes: Vec<Value> = ids
        .iter()
        .zip(labels)
        .map(|(id, label)| {
            json!({
                "update": {
                    "name": config.document_name(id),
                    "fields": {
                        "user_id": { "stringValue": label.user_id },
                        "picture_id": { "stringValue": label.picture_id },
                        "category": { "stringValue": label.category.as_str() },
                    },
                },
                "updateTransforms": [
                    { "fieldPath": "created_at", "setToServerValue": "REQUEST_TIME" }
                ],
                "currentDocument": { "exists": false },
            })
        })
        .collect();

    json!({ "writes": writes })
}

fn query_body(config: &FirestoreConfig, user_id: &str, picture_id: &str) -> Value {
    let equals = |field: &str, value: &str| {
        json!({
            "fieldFilter": {
                "field": { "fieldPath": field },
                "op": "EQUAL",
                "value": { "stringValue": value },
            }
        })
    };

    json!({
        "structuredQuery": {
            "from": [{ "collectionId": config.collection }],
            "where": {
                "compositeFilter": {
                    "op": "AND",
                    "filters": [equals("user_id", user_id), equals("picture_id", picture_id)],
                }
            },
            "limit": 1,
        }
    })
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
}

impl Document {
    fn string_field(&self, field: &str) -> Result<String, RemoteError> {
        self.fields
            .get(field)
            .and_then(|v| v.get("stringValue"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Decode(format!("{} is missing {field}", self.name)))
    }

    fn into_record(self) -> Result<RemoteLabelRecord, RemoteError> {
        let category = self
            .string_field("category")?
            .parse::<Category>()
            .map_err(|err| RemoteError::Decode(err.to_string()))?;
        let created_at = self
            .fields
            .get("created_at")
            .and_then(|v| v.get("timestampValue"))
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(RemoteLabelRecord {
            id: self
                .name
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
            user_id: self.string_field("user_id")?,
            picture_id: self.string_field("picture_id")?,
            category,
            created_at,
        })
    }
}
