//! Scenario backend that talks to the REST API.
//!
//! This is the durable side as seen from a client: every call goes over HTTP,
//! and transport failures or a server without a database surface as
//! `StoreError::Unavailable` so the reconciler can fall back.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::{ScenarioBackend, StoreError};
use crate::models::{Scenario, ScenarioDraft, ScenarioId};

pub struct HttpScenarioBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpScenarioBackend {
    /// `base_url` is the API root, e.g. `http://localhost:4000/api`.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn scenario_url(&self, id: &ScenarioId) -> String {
        // Both id forms are URL-safe: UUIDs, optionally prefixed with `local-`.
        self.url(&format!("/scenarios/{id}"))
    }

    /// Send a request and unwrap the `{ok, ...}` envelope.
    async fn call(
        &self,
        request: reqwest::RequestBuilder,
        id: Option<&ScenarioId>,
    ) -> Result<Value, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("unreadable response ({status}): {e}")))?;

        let ok = body.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if ok && status.is_success() {
            return Ok(body);
        }

        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request rejected")
            .to_string();
        Err(match (status, id) {
            (StatusCode::NOT_FOUND, Some(id)) => StoreError::NotFound(id.clone()),
            (s, _) if s.is_server_error() => StoreError::Unavailable(message),
            (StatusCode::BAD_REQUEST, _) => StoreError::Validation(message),
            _ => StoreError::Backend(format!("{status}: {message}")),
        })
    }
}

fn field<T: DeserializeOwned>(body: &mut Value, key: &str) -> Result<T, StoreError> {
    let value = body
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| StoreError::Backend(format!("response has no `{key}`")))?;
    serde_json::from_value(value).map_err(|e| StoreError::Backend(format!("bad `{key}`: {e}")))
}

#[async_trait]
impl ScenarioBackend for HttpScenarioBackend {
    async fn create(&self, draft: ScenarioDraft) -> Result<Scenario, StoreError> {
        let request = self.client.post(self.url("/scenarios")).json(&draft.input);
        let mut body = self.call(request, None).await?;
        let id: ScenarioId = field(&mut body, "id")?;
        Ok(draft.into_scenario(id))
    }

    async fn list(&self) -> Result<Vec<Scenario>, StoreError> {
        let request = self.client.get(self.url("/scenarios"));
        let mut body = self.call(request, None).await?;
        field(&mut body, "scenarios")
    }

    async fn get(&self, id: &ScenarioId) -> Result<Scenario, StoreError> {
        let request = self.client.get(self.scenario_url(id));
        let mut body = self.call(request, Some(id)).await?;
        match body.get("scenario") {
            None | Some(Value::Null) => Err(StoreError::NotFound(id.clone())),
            Some(_) => field(&mut body, "scenario"),
        }
    }

    async fn delete(&self, id: &ScenarioId) -> Result<bool, StoreError> {
        let request = self.client.delete(self.scenario_url(id));
        let body = self.call(request, Some(id)).await?;
        // Servers that do not report `deleted` are taken at their word.
        Ok(body.get("deleted").and_then(Value::as_bool).unwrap_or(true))
    }
}
